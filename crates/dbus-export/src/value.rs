// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic value types carried in message bodies.

use crate::signature::TypeCode;

/// A dynamic value that can hold any bus type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    // Basic types
    Byte(u8),
    Bool(bool),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    UnixFd(u32),
    String(String),
    ObjectPath(String),
    Signature(String),

    // Containers
    Array(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Struct(Vec<Value>),
    Variant(Box<Value>),
}

impl Value {
    /// Leading type code this value marshals as.
    pub fn type_code(&self) -> TypeCode {
        match self {
            Self::Byte(_) => TypeCode::Byte,
            Self::Bool(_) => TypeCode::Boolean,
            Self::Int16(_) => TypeCode::Int16,
            Self::UInt16(_) => TypeCode::UInt16,
            Self::Int32(_) => TypeCode::Int32,
            Self::UInt32(_) => TypeCode::UInt32,
            Self::Int64(_) => TypeCode::Int64,
            Self::UInt64(_) => TypeCode::UInt64,
            Self::Double(_) => TypeCode::Double,
            Self::UnixFd(_) => TypeCode::UnixFd,
            Self::String(_) => TypeCode::String,
            Self::ObjectPath(_) => TypeCode::ObjectPath,
            Self::Signature(_) => TypeCode::Signature,
            Self::Array(_) | Self::Dict(_) => TypeCode::Array,
            Self::Struct(_) => TypeCode::Struct,
            Self::Variant(_) => TypeCode::Variant,
        }
    }

    /// Wrap a value in a variant.
    pub fn variant(inner: impl Into<Value>) -> Self {
        Self::Variant(Box::new(inner.into()))
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as u8.
    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Self::Byte(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as i32.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as u32.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as u64.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as a string slice (strings, object paths and signatures).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) | Self::ObjectPath(v) | Self::Signature(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get array elements.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get struct fields.
    pub fn as_struct(&self) -> Option<&[Value]> {
        match self {
            Self::Struct(v) => Some(v),
            _ => None,
        }
    }

    /// Look up a dictionary entry by string key.
    pub fn dict_get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Dict(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Unwrap one level of variant, if any.
    pub fn variant_inner(&self) -> Option<&Value> {
        match self {
            Self::Variant(inner) => Some(inner),
            _ => None,
        }
    }
}

// Conversion traits
macro_rules! impl_from_basic {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from_basic! {
    u8 => Byte,
    bool => Bool,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f64 => Double,
    String => String,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}
