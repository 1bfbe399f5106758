// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for object export and call dispatch.
//!
//! Two layers:
//! - [`ExportError`]: faults of this crate's own API (declaration,
//!   publication, sending). Returned to the local caller.
//! - [`MethodFault`]: faults raised by method handlers. Never returned to the
//!   local caller; the dispatcher turns them into error replies for the
//!   remote caller.

use crate::config::ConfigError;
use crate::parser::PrototypeError;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use thiserror::Error;

/// Well-known error names placed on the wire.
pub mod names {
    /// No exported interface with the requested name.
    pub const UNKNOWN_INTERFACE: &str = "org.freedesktop.DBus.Error.UnknownInterface";
    /// Interface found, member not declared in it.
    pub const UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";
    /// No object published at the requested path.
    pub const UNKNOWN_OBJECT: &str = "org.freedesktop.DBus.Error.UnknownObject";
    /// Arguments do not match the method's declared parameters.
    pub const INVALID_ARGS: &str = "org.freedesktop.DBus.Error.InvalidArgs";
    /// Generic handler failure.
    pub const FAILED: &str = "org.freedesktop.DBus.Error.Failed";
}

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors raised by the transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors of the export API itself.
#[derive(Debug, Error)]
pub enum ExportError {
    /// `define_method`/`define_signal` called outside `declare_interface`.
    #[error("no interface is being declared")]
    NoActiveInterface,

    /// `declare_interface` called from inside another declaration body.
    #[error("cannot declare '{inner}' while '{outer}' is being declared")]
    NestedDeclaration { outer: String, inner: String },

    /// Redeclaration refused by [`RedeclarePolicy::Reject`](crate::RedeclarePolicy::Reject).
    #[error("interface '{0}' is already declared")]
    DuplicateInterface(String),

    #[error("invalid {kind} name '{name}'")]
    InvalidName { kind: &'static str, name: String },

    #[error("invalid object path '{0}'")]
    InvalidPath(String),

    #[error("bad prototype for '{member}': {source}")]
    Prototype {
        member: String,
        #[source]
        source: PrototypeError,
    },

    /// The object does not export the named interface.
    #[error("interface '{0}' is not exported by this object")]
    UnknownInterface(String),

    /// The interface does not declare the named member.
    #[error("'{interface}' has no member '{member}'")]
    UnknownMember { interface: String, member: String },

    /// The object has no service to send through.
    #[error("object '{0}' is not bound to a service")]
    ServiceNotBound(String),

    #[error("an object is already published at '{0}'")]
    PathInUse(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Fault raised by a method handler.
///
/// `Application` faults are the supported channel for domain errors: their
/// name and description reach the remote caller verbatim. Everything else is
/// `Internal` and is reported as [`names::FAILED`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFault {
    Application {
        name: String,
        description: String,
    },
    Internal {
        kind: String,
        message: String,
        trace: Option<String>,
    },
}

impl MethodFault {
    /// Application fault with an explicit error name.
    pub fn application(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Application {
            name: name.into(),
            description: description.into(),
        }
    }

    /// Application fault under the generic [`names::FAILED`] name.
    pub fn failed(description: impl Into<String>) -> Self {
        Self::application(names::FAILED, description)
    }

    /// Unclassified fault. Captures a backtrace of the call site unless
    /// dispatch runs with backtraces disabled.
    pub fn internal(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal {
            kind: kind.into(),
            message: message.into(),
            trace: capture_trace(),
        }
    }

    /// Unclassified fault from any error value; the kind is its type name.
    pub fn from_error<E: std::error::Error>(err: E) -> Self {
        Self::internal(std::any::type_name::<E>(), err.to_string())
    }

    /// Unclassified fault from a caught panic payload and the trace recorded
    /// at the panic site.
    pub(crate) fn from_panic(
        payload: &(dyn std::any::Any + Send),
        trace: Option<String>,
    ) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::Internal {
            kind: "panic".to_string(),
            message,
            trace,
        }
    }

    /// Wire error name this fault is reported under.
    pub fn error_name(&self) -> &str {
        match self {
            Self::Application { name, .. } => name,
            Self::Internal { .. } => names::FAILED,
        }
    }

    /// Wire description. Internal faults embed kind and message, plus the
    /// trace when `with_trace` is set and one was captured.
    pub fn describe(&self, with_trace: bool) -> String {
        match self {
            Self::Application { description, .. } => description.clone(),
            Self::Internal {
                kind,
                message,
                trace,
            } => match trace {
                Some(trace) if with_trace => {
                    format!("{kind}: {message}\n==== Backtrace ====\n{trace}")
                }
                _ => format!("{kind}: {message}"),
            },
        }
    }
}

impl fmt::Display for MethodFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Application { name, description } => write!(f, "{name}: {description}"),
            Self::Internal { kind, message, .. } => write!(f, "{kind}: {message}"),
        }
    }
}

impl std::error::Error for MethodFault {}

impl From<ExportError> for MethodFault {
    fn from(err: ExportError) -> Self {
        Self::from_error(err)
    }
}

thread_local! {
    /// Whether faults raised on this thread record a backtrace.
    static CAPTURE_TRACES: Cell<bool> = const { Cell::new(true) };
    /// Set while a handler runs under [`catch_handler_panic`].
    static IN_HANDLER: Cell<bool> = const { Cell::new(false) };
    /// Trace recorded by the panic hook for the running handler.
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Independent of `RUST_BACKTRACE`.
fn capture_trace() -> Option<String> {
    CAPTURE_TRACES
        .with(Cell::get)
        .then(|| Backtrace::force_capture().to_string())
}

/// Chain a hook that records the panic-site backtrace of handlers.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let tracing = IN_HANDLER.with(Cell::get) && CAPTURE_TRACES.with(Cell::get);
            if tracing {
                let trace = Backtrace::force_capture().to_string();
                PANIC_TRACE.with(|slot| {
                    if let Ok(mut slot) = slot.try_borrow_mut() {
                        *slot = Some(trace);
                    }
                });
            }
            previous(info);
        }));
    });
}

/// Run a handler call, turning a panic into an internal fault.
///
/// `with_trace` decides whether faults raised during the call, the panic
/// included, carry a backtrace. Thread state is restored on return, so calls
/// may nest.
pub(crate) fn catch_handler_panic<R, F>(with_trace: bool, call: F) -> Result<R, MethodFault>
where
    F: FnOnce() -> Result<R, MethodFault>,
{
    if with_trace {
        install_panic_hook();
    }
    let saved_capture = CAPTURE_TRACES.with(|c| c.replace(with_trace));
    let saved_handler = IN_HANDLER.with(|c| c.replace(true));
    PANIC_TRACE.with(|slot| slot.borrow_mut().take());

    let outcome = panic::catch_unwind(AssertUnwindSafe(call));

    IN_HANDLER.with(|c| c.set(saved_handler));
    CAPTURE_TRACES.with(|c| c.set(saved_capture));
    outcome.unwrap_or_else(|payload| {
        let trace = PANIC_TRACE.with(|slot| slot.borrow_mut().take());
        Err(MethodFault::from_panic(payload.as_ref(), trace))
    })
}
