// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Object export and method dispatch for a D-Bus style message bus.
//!
//! This crate lets an application publish objects on a bus, declare the
//! interfaces those objects implement, answer inbound method calls and emit
//! signals.
//!
//! # Overview
//!
//! - **Declaration**: an [`InterfaceRegistry`] collects interfaces, each a
//!   named set of methods (with handlers) and signals.
//! - **Export**: an [`ExportableObject`] snapshots the registry when built
//!   and is published at a path on a [`Service`].
//! - **Dispatch**: inbound method calls are resolved against the object's
//!   interfaces, the handler runs, and exactly one reply or error goes back
//!   through the service's [`Transport`].
//! - **Signals**: a [`SignalHandle`] builds a signal message from positional
//!   values and sends it from an object.
//!
//! # Example
//!
//! ```rust
//! use dbus_export::{
//!     ExportableObject, InterfaceRegistry, MemoryTransport, Message, Returns, Service,
//!     Signature, Value,
//! };
//! use std::sync::Arc;
//!
//! let registry = InterfaceRegistry::new();
//! registry.declare_interface("com.example.Calc", |d| {
//!     d.define_method("Add", "in a:i, in b:i, out sum:i", |args: &[Value]| {
//!         let a = args[0].as_i32().unwrap_or_default();
//!         let b = args[1].as_i32().unwrap_or_default();
//!         Ok(Returns::one(a + b))
//!     })?;
//!     Ok(())
//! })?;
//!
//! let transport = Arc::new(MemoryTransport::new());
//! let service = Service::new("com.example.Calculator", transport.clone());
//! service.publish(ExportableObject::new("/calc", &registry)?)?;
//!
//! let call = Message::method_call("/calc", "com.example.Calc", "Add")
//!     .with_param(Signature::new("i")?, 2i32)
//!     .with_param(Signature::new("i")?, 3i32);
//! let reply = service.route(&call)?.expect("method calls are answered");
//! assert_eq!(reply.body(), &[Value::Int32(5)]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Faults
//!
//! Handlers return [`MethodFault::Application`] for domain errors; its name
//! and description reach the caller verbatim. Any other failure, including a
//! panic, is reported as `org.freedesktop.DBus.Error.Failed`.

mod config;
mod descriptor;
mod error;
mod handler;
mod message;
mod object;
mod parser;
mod registry;
mod service;
mod signature;
mod value;

pub use config::{ConfigError, ExportConfig, RedeclarePolicy};
pub use descriptor::{
    validate_interface_name, validate_member_name, InterfaceDescriptor, MethodDescriptor,
    SignalDescriptor, MAX_NAME_LEN,
};
pub use error::{names, ExportError, ExportResult, MethodFault, TransportError};
pub use handler::{HandlerKey, MethodHandler, MethodResult, Returns};
pub use message::{Message, MessageKind};
pub use object::{validate_path, ExportableObject};
pub use parser::{MethodPrototype, PrototypeError, PrototypeParser, SignatureParser};
pub use registry::{Declarator, InterfaceMap, InterfaceRegistry, SignalHandle};
pub use service::{MemoryTransport, Service, Transport};
pub use signature::{Arg, Signature, SignatureError, TypeCode, MAX_SIGNATURE_LEN};
pub use value::Value;

#[cfg(test)]
mod tests;
