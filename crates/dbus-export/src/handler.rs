// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Method handlers and their return values.

use crate::error::MethodFault;
use crate::value::Value;
use std::fmt;

/// Result of a method handler.
pub type MethodResult = Result<Returns, MethodFault>;

/// Handler trait for exported methods.
///
/// Implement this trait (or pass a closure) to define method logic.
pub trait MethodHandler: Send + Sync + 'static {
    /// Handle a call.
    ///
    /// # Arguments
    /// * `args` - Positional parameters of the call, in order
    ///
    /// # Returns
    /// Ok(values) on success, or a fault to report to the caller
    fn call(&self, args: &[Value]) -> MethodResult;
}

/// A function-based method handler.
impl<F> MethodHandler for F
where
    F: Fn(&[Value]) -> MethodResult + Send + Sync + 'static,
{
    fn call(&self, args: &[Value]) -> MethodResult {
        self(args)
    }
}

/// Ordered return values of a handler.
///
/// A scalar converts to a one-element sequence, a `Vec<Value>` is used as is
/// and `()` means no return values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Returns(Vec<Value>);

impl Returns {
    /// No return values.
    pub fn none() -> Self {
        Self(Vec::new())
    }

    /// A single return value.
    pub fn one(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<()> for Returns {
    fn from(_: ()) -> Self {
        Self::none()
    }
}

impl From<Vec<Value>> for Returns {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

macro_rules! impl_returns_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Returns {
                fn from(v: $ty) -> Self {
                    Self::one(v)
                }
            }
        )*
    };
}

impl_returns_scalar!(Value, u8, bool, i16, u16, i32, u32, i64, u64, f64, String, &str);

/// Key of a bound handler: interface name plus method name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerKey {
    pub interface: String,
    pub member: String,
}

impl HandlerKey {
    pub fn new(interface: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            member: member.into(),
        }
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.interface, self.member)
    }
}
