// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Parsed bus messages as consumed and produced by the dispatch core.
//!
//! Marshalling to and from bytes belongs to the transport; this module only
//! models header fields and the typed body.
//!
//! # Correlation
//!
//! A reply carries `reply_serial` = the call's `serial` and is addressed to
//! the call's `sender`.

use crate::signature::{Signature, TypeCode};
use crate::value::Value;

/// Message type, as found in the fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    MethodCall,
    MethodReturn,
    Error,
    Signal,
}

/// A bus message with header fields and a typed body.
///
/// The body is stored as two parallel lists: one signature per value.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub kind: MessageKind,
    /// Serial assigned by the sender (0 = not yet assigned).
    pub serial: u32,
    /// Serial of the call this message answers.
    pub reply_serial: Option<u32>,
    pub sender: Option<String>,
    pub destination: Option<String>,
    pub path: Option<String>,
    pub interface: Option<String>,
    pub member: Option<String>,
    /// Error name, set on [`MessageKind::Error`] messages only.
    pub error_name: Option<String>,
    signature: Vec<Signature>,
    body: Vec<Value>,
}

impl Message {
    fn empty(kind: MessageKind) -> Self {
        Self {
            kind,
            serial: 0,
            reply_serial: None,
            sender: None,
            destination: None,
            path: None,
            interface: None,
            member: None,
            error_name: None,
            signature: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Create a method call.
    pub fn method_call(
        path: impl Into<String>,
        interface: impl Into<String>,
        member: impl Into<String>,
    ) -> Self {
        Self {
            path: Some(path.into()),
            interface: Some(interface.into()),
            member: Some(member.into()),
            ..Self::empty(MessageKind::MethodCall)
        }
    }

    /// Create a signal emission.
    pub fn signal(
        path: impl Into<String>,
        interface: impl Into<String>,
        member: impl Into<String>,
    ) -> Self {
        Self {
            path: Some(path.into()),
            interface: Some(interface.into()),
            member: Some(member.into()),
            ..Self::empty(MessageKind::Signal)
        }
    }

    /// Create a successful method return correlated with `original`.
    pub fn reply_to(original: &Message) -> Self {
        Self {
            reply_serial: Some(original.serial),
            destination: original.sender.clone(),
            ..Self::empty(MessageKind::MethodReturn)
        }
    }

    /// Create an error reply correlated with `original`.
    ///
    /// The description travels as a single string argument.
    pub fn error_reply(
        original: &Message,
        error_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let mut reply = Self {
            kind: MessageKind::Error,
            error_name: Some(error_name.into()),
            ..Self::reply_to(original)
        };
        reply.add_param(
            Signature::basic(TypeCode::String),
            Value::String(description.into()),
        );
        reply
    }

    pub fn with_serial(mut self, serial: u32) -> Self {
        self.serial = serial;
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Append a typed parameter (builder form of [`Message::add_param`]).
    pub fn with_param(mut self, signature: Signature, value: impl Into<Value>) -> Self {
        self.add_param(signature, value.into());
        self
    }

    /// Append a typed parameter to the body.
    pub fn add_param(&mut self, signature: Signature, value: Value) {
        self.signature.push(signature);
        self.body.push(value);
    }

    /// Body values, in order.
    pub fn body(&self) -> &[Value] {
        &self.body
    }

    /// Body signatures, in order.
    pub fn signature(&self) -> &[Signature] {
        &self.signature
    }

    /// Body as ordered `(signature, value)` pairs.
    pub fn params(&self) -> impl Iterator<Item = (&Signature, &Value)> {
        self.signature.iter().zip(self.body.iter())
    }

    /// Whether this is a method call expecting dispatch.
    pub fn is_method_call(&self) -> bool {
        self.kind == MessageKind::MethodCall
    }

    /// Human-readable description of an error message.
    pub fn error_description(&self) -> Option<&str> {
        if self.kind != MessageKind::Error {
            return None;
        }
        self.body.first().and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call() -> Message {
        Message::method_call("/calc", "com.example.Calc", "Add")
            .with_serial(7)
            .with_sender(":1.42")
            .with_param(Signature::new("i").unwrap(), 2i32)
            .with_param(Signature::new("i").unwrap(), 3i32)
    }

    #[test]
    fn test_reply_correlation() {
        let call = call();
        let reply = Message::reply_to(&call);

        assert_eq!(reply.kind, MessageKind::MethodReturn);
        assert_eq!(reply.reply_serial, Some(7));
        assert_eq!(reply.destination.as_deref(), Some(":1.42"));
        assert_eq!(reply.serial, 0);
        assert!(reply.body().is_empty());
    }

    #[test]
    fn test_error_reply() {
        let err = Message::error_reply(&call(), "com.example.Error.Bad", "nope");

        assert_eq!(err.kind, MessageKind::Error);
        assert_eq!(err.error_name.as_deref(), Some("com.example.Error.Bad"));
        assert_eq!(err.error_description(), Some("nope"));
        assert_eq!(err.reply_serial, Some(7));
        assert_eq!(err.signature()[0].as_str(), "s");
    }

    #[test]
    fn test_params_are_ordered() {
        let call = call();
        let values: Vec<i32> = call.params().filter_map(|(_, v)| v.as_i32()).collect();
        assert_eq!(values, vec![2, 3]);
        assert!(call.is_method_call());
        assert_eq!(call.error_description(), None);
    }
}
