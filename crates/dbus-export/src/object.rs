// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Exportable objects and call dispatch.
//!
//! An [`ExportableObject`] snapshots the registry's interface map when it is
//! built, resolves each inbound method call against that snapshot, runs the
//! bound handler and hands exactly one reply (or error) to its service.

use crate::config::ExportConfig;
use crate::descriptor::{InterfaceDescriptor, MethodDescriptor, SignalDescriptor};
use crate::error::{catch_handler_panic, names, ExportError, ExportResult, MethodFault};
use crate::handler::{HandlerKey, MethodHandler, MethodResult};
use crate::message::Message;
use crate::registry::{InterfaceMap, InterfaceRegistry};
use crate::service::Service;
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

const INTROSPECT_DOCTYPE: &str = "<!DOCTYPE node PUBLIC \
\"-//freedesktop//DTD D-BUS Object Introspection 1.0//EN\"\n\
\"http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd\">\n";

/// Validate an object path: `/` or `/seg/seg` with `[A-Za-z0-9_]+` segments.
pub fn validate_path(path: &str) -> ExportResult<()> {
    let valid = path == "/"
        || path.strip_prefix('/').is_some_and(|rest| {
            rest.split('/').all(|seg| {
                !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            })
        });
    if valid {
        Ok(())
    } else {
        Err(ExportError::InvalidPath(path.to_string()))
    }
}

type HandlerTable = HashMap<HandlerKey, Arc<dyn MethodHandler>>;

fn seed_handlers(table: &mut HandlerTable, intf: &InterfaceDescriptor) {
    for (member, handler) in intf.handlers() {
        table.insert(
            HandlerKey::new(intf.name(), member.as_str()),
            Arc::clone(handler),
        );
    }
}

/// An object exported at a path.
pub struct ExportableObject {
    path: String,
    /// Snapshot taken at construction, plus `implements` additions.
    intfs: InterfaceMap,
    /// Live handlers, seeded from `intfs`.
    handlers: RwLock<HandlerTable>,
    /// Owning service, used only to reach the transport.
    service: RwLock<Weak<Service>>,
    config: ExportConfig,
    calls_dispatched: AtomicU64,
    calls_failed: AtomicU64,
}

impl ExportableObject {
    /// Create an object at `path` exporting every interface currently in
    /// `registry`.
    pub fn new(path: impl Into<String>, registry: &InterfaceRegistry) -> ExportResult<Self> {
        Self::with_config(path, registry, ExportConfig::default())
    }

    /// Like [`new`](Self::new) with explicit dispatch settings.
    pub fn with_config(
        path: impl Into<String>,
        registry: &InterfaceRegistry,
        config: ExportConfig,
    ) -> ExportResult<Self> {
        let path = path.into();
        validate_path(&path)?;

        let intfs = registry.interfaces();
        let mut handlers = HandlerTable::new();
        for intf in intfs.values() {
            seed_handlers(&mut handlers, intf);
        }

        Ok(Self {
            path,
            intfs,
            handlers: RwLock::new(handlers),
            service: RwLock::new(Weak::new()),
            config,
            calls_dispatched: AtomicU64::new(0),
            calls_failed: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// State that this object implements `intf`, replacing any interface of
    /// the same name.
    pub fn implements(&mut self, intf: Arc<InterfaceDescriptor>) {
        let handlers = self.handlers.get_mut();
        handlers.retain(|key, _| key.interface != intf.name());
        seed_handlers(handlers, &intf);
        self.intfs.insert(intf.name().to_string(), intf);
    }

    /// Replace the handler of one method on this object only.
    pub fn bind_handler<F>(&self, interface: &str, member: &str, handler: F) -> ExportResult<()>
    where
        F: Fn(&[Value]) -> MethodResult + Send + Sync + 'static,
    {
        let intf = self
            .intfs
            .get(interface)
            .ok_or_else(|| ExportError::UnknownInterface(interface.to_string()))?;
        if intf.method(member).is_none() {
            return Err(ExportError::UnknownMember {
                interface: interface.to_string(),
                member: member.to_string(),
            });
        }
        self.handlers
            .write()
            .insert(HandlerKey::new(interface, member), Arc::new(handler));
        Ok(())
    }

    pub fn interface(&self, name: &str) -> Option<&Arc<InterfaceDescriptor>> {
        self.intfs.get(name)
    }

    /// Exported interface names, sorted.
    pub fn interface_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.intfs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Bind this object to the service that sends its messages.
    pub fn set_service(&self, service: &Arc<Service>) {
        *self.service.write() = Arc::downgrade(service);
    }

    pub(crate) fn clear_service(&self) {
        *self.service.write() = Weak::new();
    }

    /// The bound service, if it is still alive.
    pub fn service(&self) -> ExportResult<Arc<Service>> {
        self.service
            .read()
            .upgrade()
            .ok_or_else(|| ExportError::ServiceNotBound(self.path.clone()))
    }

    pub fn is_bound(&self) -> bool {
        self.service.read().strong_count() > 0
    }

    /// Dispatch one inbound message.
    ///
    /// Method calls produce exactly one reply or error, sent through the
    /// bound service and returned. Other message kinds are ignored.
    ///
    /// # Errors
    /// [`ExportError::ServiceNotBound`] when no service is bound (checked
    /// before the handler runs), or a transport error from sending.
    pub fn dispatch(&self, message: &Message) -> ExportResult<Option<Message>> {
        if !message.is_method_call() {
            log::debug!("Object '{}': ignoring {:?} message", self.path, message.kind);
            return Ok(None);
        }

        let service = self.service()?;
        let reply = self.process_call(message);
        service.send(reply).map(Some)
    }

    /// Resolve and run one call, producing its reply or error.
    fn process_call(&self, msg: &Message) -> Message {
        let interface = msg.interface.as_deref().unwrap_or_default();
        let member = msg.member.as_deref().unwrap_or_default();
        self.calls_dispatched.fetch_add(1, Ordering::Relaxed);

        let Some(intf) = self.intfs.get(interface) else {
            if self.config.log_routing_failures {
                log::warn!("InterfaceNotInObject {} (object '{}')", interface, self.path);
            }
            return self.error_reply(msg, names::UNKNOWN_INTERFACE, interface);
        };

        let Some(method) = intf.method(member) else {
            if self.config.log_routing_failures {
                log::warn!("MethodNotInInterface {} {}", interface, member);
            }
            return self.error_reply(msg, names::UNKNOWN_METHOD, &format!("{interface} {member}"));
        };

        if self.config.validate_args {
            if let Err(reason) = check_args(method, msg.body()) {
                if self.config.log_routing_failures {
                    log::warn!("Invalid arguments for {}.{}: {}", interface, member, reason);
                }
                return self.error_reply(msg, names::INVALID_ARGS, &reason);
            }
        }

        let key = HandlerKey::new(interface, member);
        // Clone out of the table so a handler may rebind without deadlocking
        let handler = self.handlers.read().get(&key).cloned();
        let result = match handler {
            Some(handler) => catch_handler_panic(self.config.include_backtrace, || {
                handler.call(msg.body())
            }),
            None => Err(MethodFault::internal(
                "UnboundMethod",
                format!("no handler bound for {key}"),
            )),
        };

        match result.and_then(|returns| method_return(msg, method, returns.into_values())) {
            Ok(reply) => {
                log::debug!("Call {} on '{}' replied", key, self.path);
                reply
            }
            Err(fault) => self.fault_reply(msg, &key, fault),
        }
    }

    fn fault_reply(&self, msg: &Message, key: &HandlerKey, fault: MethodFault) -> Message {
        match fault {
            MethodFault::Application { name, description } => {
                log::debug!("Call {} raised {}: {}", key, name, description);
                self.error_reply(msg, &name, &description)
            }
            fault @ MethodFault::Internal { .. } => {
                log::error!("Call {} on '{}' failed: {}", key, self.path, fault);
                let description = self
                    .config
                    .clamp_description(fault.describe(self.config.include_backtrace));
                self.error_reply(msg, names::FAILED, &description)
            }
        }
    }

    fn error_reply(&self, msg: &Message, name: &str, description: &str) -> Message {
        self.calls_failed.fetch_add(1, Ordering::Relaxed);
        Message::error_reply(msg, name, description)
    }

    /// Emit `signal` of `interface` from this object.
    ///
    /// `args` are typed by the signal's declared arguments, in order.
    pub fn emit(
        &self,
        interface: &str,
        signal: &SignalDescriptor,
        args: Vec<Value>,
    ) -> ExportResult<Message> {
        let service = self.service()?;
        service.emit_signal(&self.path, interface, signal, args)
    }

    /// Emit a signal looked up by name in this object's interfaces.
    pub fn emit_named(
        &self,
        interface: &str,
        signal: &str,
        args: Vec<Value>,
    ) -> ExportResult<Message> {
        let intf = self
            .intfs
            .get(interface)
            .ok_or_else(|| ExportError::UnknownInterface(interface.to_string()))?;
        let descriptor = intf
            .signal(signal)
            .ok_or_else(|| ExportError::UnknownMember {
                interface: interface.to_string(),
                member: signal.to_string(),
            })?;
        self.emit(interface, descriptor, args)
    }

    /// Introspection XML describing every exported interface.
    pub fn introspect(&self) -> String {
        let mut xml = String::from(INTROSPECT_DOCTYPE);
        xml.push_str("<node>\n");
        for name in self.interface_names() {
            if let Some(intf) = self.intfs.get(name) {
                intf.write_xml(&mut xml, "  ");
            }
        }
        xml.push_str("</node>\n");
        xml
    }

    /// Number of method calls processed.
    pub fn calls_dispatched(&self) -> u64 {
        self.calls_dispatched.load(Ordering::Relaxed)
    }

    /// Number of method calls answered with an error.
    pub fn calls_failed(&self) -> u64 {
        self.calls_failed.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for ExportableObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportableObject")
            .field("path", &self.path)
            .field("interfaces", &self.interface_names())
            .field("bound", &self.is_bound())
            .finish_non_exhaustive()
    }
}


/// Build the method return, pairing declared returns with `values` in order.
///
/// Surplus values or declared returns are dropped; a value whose type does
/// not match its declared return is an `InvalidReturnType` fault.
fn method_return(
    msg: &Message,
    method: &MethodDescriptor,
    values: Vec<Value>,
) -> Result<Message, MethodFault> {
    let mut reply = Message::reply_to(msg);
    for (index, (arg, value)) in method.returns.iter().zip(values).enumerate() {
        if !arg.signature.accepts(&value) {
            return Err(MethodFault::internal(
                "InvalidReturnType",
                format!(
                    "return {} of {}: expected '{}', got '{}'",
                    index,
                    method.name,
                    arg.signature,
                    value.type_code()
                ),
            ));
        }
        reply.add_param(arg.signature.clone(), value);
    }
    Ok(reply)
}

/// Check arity and leading type codes of `args` against `method`.
fn check_args(method: &MethodDescriptor, args: &[Value]) -> Result<(), String> {
    if args.len() != method.params.len() {
        return Err(format!(
            "{} expects {} argument(s), got {}",
            method.name,
            method.params.len(),
            args.len()
        ));
    }
    for (index, (param, value)) in method.params.iter().zip(args).enumerate() {
        if !param.signature.accepts(value) {
            return Err(format!(
                "argument {} of {}: expected '{}', got '{}'",
                index,
                method.name,
                param.signature,
                value.type_code()
            ));
        }
    }
    Ok(())
}
