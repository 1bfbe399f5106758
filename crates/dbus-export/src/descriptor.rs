// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Interface, method and signal descriptors.

use crate::error::{ExportError, ExportResult};
use crate::handler::MethodHandler;
use crate::signature::Arg;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write as _};
use std::sync::Arc;

/// Maximum length of interface and member names.
pub const MAX_NAME_LEN: usize = 255;

/// `[A-Za-z_][A-Za-z0-9_]*`
fn is_name_element(element: &str) -> bool {
    let mut chars = element.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate a reverse-DNS interface name such as `com.example.Calc`.
pub fn validate_interface_name(name: &str) -> ExportResult<()> {
    let valid = name.len() <= MAX_NAME_LEN
        && name.split('.').count() >= 2
        && name.split('.').all(is_name_element);
    if valid {
        Ok(())
    } else {
        Err(ExportError::InvalidName {
            kind: "interface",
            name: name.to_string(),
        })
    }
}

/// Validate a method or signal name such as `Add`.
pub fn validate_member_name(name: &str) -> ExportResult<()> {
    if name.len() <= MAX_NAME_LEN && is_name_element(name) {
        Ok(())
    } else {
        Err(ExportError::InvalidName {
            kind: "member",
            name: name.to_string(),
        })
    }
}

/// An exported method: name, ordered parameters, ordered returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: String,
    pub params: Vec<Arg>,
    pub returns: Vec<Arg>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, params: Vec<Arg>, returns: Vec<Arg>) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
        }
    }
}

/// An exported signal: name and ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalDescriptor {
    pub name: String,
    pub args: Vec<Arg>,
}

impl SignalDescriptor {
    pub fn new(name: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// A named interface with its methods, signals and bound handlers.
///
/// Built during one declaration, then shared behind an `Arc`.
#[derive(Clone)]
pub struct InterfaceDescriptor {
    name: String,
    methods: BTreeMap<String, Arc<MethodDescriptor>>,
    signals: BTreeMap<String, Arc<SignalDescriptor>>,
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
}

impl InterfaceDescriptor {
    /// Create an empty interface descriptor.
    pub fn new(name: impl Into<String>) -> ExportResult<Self> {
        let name = name.into();
        validate_interface_name(&name)?;
        Ok(Self {
            name,
            methods: BTreeMap::new(),
            signals: BTreeMap::new(),
            handlers: HashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add or replace a method; a previous handler for it is dropped.
    pub fn define_method(
        &mut self,
        method: MethodDescriptor,
    ) -> ExportResult<Arc<MethodDescriptor>> {
        validate_member_name(&method.name)?;
        let method = Arc::new(method);
        self.handlers.remove(&method.name);
        self.methods.insert(method.name.clone(), Arc::clone(&method));
        Ok(method)
    }

    /// Add or replace a signal.
    pub fn define_signal(
        &mut self,
        signal: SignalDescriptor,
    ) -> ExportResult<Arc<SignalDescriptor>> {
        validate_member_name(&signal.name)?;
        let signal = Arc::new(signal);
        self.signals.insert(signal.name.clone(), Arc::clone(&signal));
        Ok(signal)
    }

    /// Bind the handler for a declared method.
    pub fn bind(&mut self, member: &str, handler: Arc<dyn MethodHandler>) -> ExportResult<()> {
        if !self.methods.contains_key(member) {
            return Err(ExportError::UnknownMember {
                interface: self.name.clone(),
                member: member.to_string(),
            });
        }
        self.handlers.insert(member.to_string(), handler);
        Ok(())
    }

    /// Builder form of [`define_method`](Self::define_method) plus [`bind`](Self::bind).
    pub fn with_method<F>(mut self, method: MethodDescriptor, handler: F) -> ExportResult<Self>
    where
        F: MethodHandler,
    {
        let name = method.name.clone();
        self.define_method(method)?;
        self.bind(&name, Arc::new(handler))?;
        Ok(self)
    }

    /// Builder form of [`define_signal`](Self::define_signal).
    pub fn with_signal(mut self, signal: SignalDescriptor) -> ExportResult<Self> {
        self.define_signal(signal)?;
        Ok(self)
    }

    pub fn method(&self, name: &str) -> Option<&Arc<MethodDescriptor>> {
        self.methods.get(name)
    }

    pub fn signal(&self, name: &str) -> Option<&Arc<SignalDescriptor>> {
        self.signals.get(name)
    }

    pub fn handler(&self, member: &str) -> Option<&Arc<dyn MethodHandler>> {
        self.handlers.get(member)
    }

    /// Methods, ordered by name.
    pub fn methods(&self) -> impl Iterator<Item = &Arc<MethodDescriptor>> {
        self.methods.values()
    }

    /// Signals, ordered by name.
    pub fn signals(&self) -> impl Iterator<Item = &Arc<SignalDescriptor>> {
        self.signals.values()
    }

    pub(crate) fn handlers(&self) -> impl Iterator<Item = (&String, &Arc<dyn MethodHandler>)> {
        self.handlers.iter()
    }

    /// Render this interface as an introspection `<interface>` element.
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        self.write_xml(&mut xml, "  ");
        xml
    }

    pub(crate) fn write_xml(&self, out: &mut String, indent: &str) {
        let _ = writeln!(out, "{indent}<interface name=\"{}\">", self.name);
        for method in self.methods.values() {
            let _ = writeln!(out, "{indent}  <method name=\"{}\">", method.name);
            for arg in &method.params {
                write_arg(out, indent, arg, Some("in"));
            }
            for arg in &method.returns {
                write_arg(out, indent, arg, Some("out"));
            }
            let _ = writeln!(out, "{indent}  </method>");
        }
        for signal in self.signals.values() {
            let _ = writeln!(out, "{indent}  <signal name=\"{}\">", signal.name);
            for arg in &signal.args {
                write_arg(out, indent, arg, None);
            }
            let _ = writeln!(out, "{indent}  </signal>");
        }
        let _ = writeln!(out, "{indent}</interface>");
    }
}

fn write_arg(out: &mut String, indent: &str, arg: &Arg, direction: Option<&str>) {
    let _ = write!(out, "{indent}    <arg");
    if let Some(name) = &arg.name {
        let _ = write!(out, " name=\"{}\"", escape_xml(name));
    }
    let _ = write!(out, " type=\"{}\"", arg.signature);
    if let Some(direction) = direction {
        let _ = write!(out, " direction=\"{direction}\"");
    }
    let _ = writeln!(out, "/>");
}

/// Argument names come from free-form prototypes; everything else is a
/// validated identifier or signature.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl fmt::Debug for InterfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bound: Vec<&String> = self.handlers.keys().collect();
        bound.sort();
        f.debug_struct("InterfaceDescriptor")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .field("signals", &self.signals)
            .field("bound", &bound)
            .finish()
    }
}
