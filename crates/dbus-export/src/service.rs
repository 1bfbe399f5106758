// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Services: the bus-facing owner of exported objects.
//!
//! A [`Service`] holds its objects by path, routes inbound method calls to
//! them and stamps outbound messages with serials before handing them to a
//! [`Transport`].

use crate::descriptor::SignalDescriptor;
use crate::error::{names, ExportError, ExportResult, TransportError};
use crate::message::Message;
use crate::object::ExportableObject;
use crate::value::Value;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Outbound side of a bus connection.
pub trait Transport: Send + Sync {
    /// Marshal and write one message.
    fn send(&self, message: &Message) -> Result<(), TransportError>;
}

/// In-process transport recording every message it is given.
///
/// Used for tests and for embedding the dispatcher without a bus.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<Message>>,
    closed: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far, in order.
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }

    /// Drain the recorded messages.
    pub fn take(&self) -> Vec<Message> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn last(&self) -> Option<Message> {
        self.sent.lock().last().cloned()
    }

    /// Make every later send fail with [`TransportError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl Transport for MemoryTransport {
    fn send(&self, message: &Message) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

/// A named service exporting objects over one transport.
pub struct Service {
    name: String,
    transport: Arc<dyn Transport>,
    objects: RwLock<HashMap<String, Arc<ExportableObject>>>,
    next_serial: AtomicU32,
    messages_sent: AtomicU64,
}

impl Service {
    /// Create a service; objects hold a weak reference back to it.
    pub fn new(name: impl Into<String>, transport: Arc<dyn Transport>) -> Arc<Self> {
        let name = name.into();
        log::info!("Service '{}' created", name);
        Arc::new(Self {
            name,
            transport,
            objects: RwLock::new(HashMap::new()),
            next_serial: AtomicU32::new(1),
            messages_sent: AtomicU64::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish `object` at its path and bind it to this service.
    ///
    /// # Errors
    /// [`ExportError::PathInUse`] if another object holds the path.
    pub fn publish(self: &Arc<Self>, object: ExportableObject) -> ExportResult<Arc<ExportableObject>> {
        let mut objects = self.objects.write();
        if objects.contains_key(object.path()) {
            return Err(ExportError::PathInUse(object.path().to_string()));
        }

        object.set_service(self);
        let object = Arc::new(object);
        objects.insert(object.path().to_string(), Arc::clone(&object));
        log::info!(
            "Service '{}': published '{}' ({} interfaces)",
            self.name,
            object.path(),
            object.interface_names().len()
        );
        Ok(object)
    }

    /// Remove the object at `path` and unbind it.
    pub fn unpublish(&self, path: &str) -> Option<Arc<ExportableObject>> {
        let object = self.objects.write().remove(path)?;
        object.clear_service();
        log::info!("Service '{}': unpublished '{}'", self.name, path);
        Some(object)
    }

    pub fn object(&self, path: &str) -> Option<Arc<ExportableObject>> {
        self.objects.read().get(path).cloned()
    }

    /// Published paths, sorted.
    pub fn object_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.read().keys().cloned().collect();
        paths.sort_unstable();
        paths
    }

    /// Route an inbound message to the object at its path.
    ///
    /// Method calls to an unknown path are answered with
    /// `org.freedesktop.DBus.Error.UnknownObject`; other messages are ignored.
    pub fn route(&self, message: &Message) -> ExportResult<Option<Message>> {
        if !message.is_method_call() {
            return Ok(None);
        }

        let path = message.path.as_deref().unwrap_or_default();
        match self.object(path) {
            Some(object) => object.dispatch(message),
            None => {
                log::warn!("Service '{}': no object at '{}'", self.name, path);
                self.send(Message::error_reply(message, names::UNKNOWN_OBJECT, path))
                    .map(Some)
            }
        }
    }

    /// Stamp `message` with the next serial and send it.
    ///
    /// Returns the message as sent.
    pub fn send(&self, mut message: Message) -> ExportResult<Message> {
        message.serial = self.allocate_serial();
        self.transport.send(&message)?;
        self.messages_sent.fetch_add(1, Ordering::Relaxed);

        log::debug!(
            "Service '{}': sent {:?} serial={} reply_serial={:?}",
            self.name,
            message.kind,
            message.serial,
            message.reply_serial
        );
        Ok(message)
    }

    /// Build and send a signal from the object at `path`.
    ///
    /// Values are paired with the signal's declared arguments in order;
    /// surplus values or arguments are dropped.
    pub fn emit_signal(
        &self,
        path: &str,
        interface: &str,
        signal: &SignalDescriptor,
        args: Vec<Value>,
    ) -> ExportResult<Message> {
        if args.len() != signal.args.len() {
            log::warn!(
                "Signal {}.{}: {} value(s) for {} declared argument(s)",
                interface,
                signal.name,
                args.len(),
                signal.args.len()
            );
        }

        let mut message = Message::signal(path, interface, signal.name.as_str());
        for (arg, value) in signal.args.iter().zip(args) {
            message.add_param(arg.signature.clone(), value);
        }
        self.send(message)
    }

    /// Total messages handed to the transport.
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    /// Serials are non-zero; skip 0 on wrap-around.
    fn allocate_serial(&self) -> u32 {
        loop {
            let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
            if serial != 0 {
                return serial;
            }
        }
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("objects", &self.object_paths())
            .field("messages_sent", &self.messages_sent())
            .finish_non_exhaustive()
    }
}
