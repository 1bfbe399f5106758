// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Interface registry and declaration scopes.
//!
//! Interfaces are declared through a [`Declarator`], which holds the
//! registry's declaration lock for its whole lifetime. The "interface being
//! declared" cursor lives inside the `Declarator`, so two declarations can
//! never observe the same cursor.
//!
//! # Example
//!
//! ```rust
//! use dbus_export::{InterfaceRegistry, MethodFault, MethodResult, Returns, Value};
//!
//! let registry = InterfaceRegistry::new();
//! registry
//!     .declare_interface("com.example.Calc", |intf| {
//!         intf.define_method("Add", "in a:i, in b:i, out sum:i", |args: &[Value]| -> MethodResult {
//!             let (Some(a), Some(b)) = (args[0].as_i32(), args[1].as_i32()) else {
//!                 return Err(MethodFault::failed("expected two integers"));
//!             };
//!             Ok(Returns::one(a + b))
//!         })?;
//!         intf.define_signal("Overflow", "value:x")?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! assert!(registry.contains("com.example.Calc"));
//! ```

use crate::config::{ExportConfig, RedeclarePolicy};
use crate::descriptor::{InterfaceDescriptor, MethodDescriptor, SignalDescriptor};
use crate::error::{ExportError, ExportResult};
use crate::handler::{MethodHandler, MethodResult};
use crate::message::Message;
use crate::object::ExportableObject;
use crate::parser::{PrototypeParser, SignatureParser};
use crate::value::Value;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

/// Interface name to shared descriptor.
pub type InterfaceMap = HashMap<String, Arc<InterfaceDescriptor>>;

/// Process-wide registry, created on first use with the default config.
static GLOBAL_REGISTRY: OnceLock<InterfaceRegistry> = OnceLock::new();

/// Catalog of declared interfaces.
pub struct InterfaceRegistry {
    interfaces: RwLock<InterfaceMap>,
    /// Held by the active [`Declarator`].
    declaring: Mutex<()>,
    policy: RedeclarePolicy,
    parser: Arc<dyn SignatureParser>,
}

impl InterfaceRegistry {
    /// Create an empty registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&ExportConfig::default())
    }

    /// Create an empty registry honouring `config.redeclare_policy`.
    pub fn with_config(config: &ExportConfig) -> Self {
        Self {
            interfaces: RwLock::new(HashMap::new()),
            declaring: Mutex::new(()),
            policy: config.redeclare_policy,
            parser: Arc::new(PrototypeParser),
        }
    }

    /// Use a custom prototype parser.
    pub fn with_parser(mut self, parser: impl SignatureParser + 'static) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    /// The process-wide registry.
    pub fn global() -> &'static InterfaceRegistry {
        GLOBAL_REGISTRY.get_or_init(InterfaceRegistry::new)
    }

    pub fn policy(&self) -> RedeclarePolicy {
        self.policy
    }

    /// Enter the exclusive declaration section.
    ///
    /// Blocks while another declarator is alive, including one held by the
    /// calling thread. Declaration bodies nest through
    /// [`Declarator::declare_interface`], which reports
    /// [`ExportError::NestedDeclaration`] instead of blocking.
    pub fn declarator(&self) -> Declarator<'_> {
        Declarator {
            registry: self,
            _section: self.declaring.lock(),
            current: None,
        }
    }

    /// Declare (or redeclare) one interface.
    ///
    /// Shorthand for `self.declarator().declare_interface(name, body)`.
    pub fn declare_interface<'r, F>(
        &'r self,
        name: &str,
        body: F,
    ) -> ExportResult<Arc<InterfaceDescriptor>>
    where
        F: FnOnce(&mut Declarator<'r>) -> ExportResult<()>,
    {
        self.declarator().declare_interface(name, body)
    }

    /// Point-in-time copy of the interface map.
    pub fn interfaces(&self) -> InterfaceMap {
        self.interfaces.read().clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<InterfaceDescriptor>> {
        self.interfaces.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.interfaces.read().contains_key(name)
    }

    /// Remove an interface. Objects built earlier keep their copy.
    pub fn remove(&self, name: &str) -> Option<Arc<InterfaceDescriptor>> {
        let removed = self.interfaces.write().remove(name);
        if removed.is_some() {
            log::debug!("Interface registry: removed '{}'", name);
        }
        removed
    }

    /// Declared interface names, sorted.
    pub fn list_interfaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.interfaces.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.interfaces.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.read().is_empty()
    }
}

impl Default for InterfaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InterfaceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceRegistry")
            .field("interfaces", &self.list_interfaces())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Exclusive declaration scope over an [`InterfaceRegistry`].
///
/// Holds the registry's declaration lock until dropped.
pub struct Declarator<'r> {
    registry: &'r InterfaceRegistry,
    _section: MutexGuard<'r, ()>,
    current: Option<InterfaceDescriptor>,
}

impl<'r> Declarator<'r> {
    /// Declare an interface: make it the current target, run `body`, then
    /// clear the target and commit the descriptor.
    ///
    /// The target is cleared whether `body` succeeds, fails or panics; a
    /// failing body commits nothing and a panic is resumed after clearing.
    pub fn declare_interface<F>(
        &mut self,
        name: &str,
        body: F,
    ) -> ExportResult<Arc<InterfaceDescriptor>>
    where
        F: FnOnce(&mut Self) -> ExportResult<()>,
    {
        if let Some(outer) = &self.current {
            return Err(ExportError::NestedDeclaration {
                outer: outer.name().to_string(),
                inner: name.to_string(),
            });
        }

        let target = match (self.registry.policy, self.registry.get(name)) {
            (RedeclarePolicy::Reject, Some(_)) => {
                return Err(ExportError::DuplicateInterface(name.to_string()));
            }
            (RedeclarePolicy::Extend, Some(existing)) => (*existing).clone(),
            _ => InterfaceDescriptor::new(name)?,
        };

        self.current = Some(target);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut *self)));
        let declared = self.current.take();
        match outcome {
            Ok(result) => result?,
            Err(payload) => panic::resume_unwind(payload),
        }

        let declared = Arc::new(declared.ok_or(ExportError::NoActiveInterface)?);
        let previous = self
            .registry
            .interfaces
            .write()
            .insert(name.to_string(), Arc::clone(&declared));
        if previous.is_some() {
            log::debug!("Interface registry: redeclared '{}'", name);
        } else {
            log::debug!("Interface registry: declared '{}'", name);
        }
        Ok(declared)
    }

    /// Define a method on the interface being declared and bind `handler`.
    pub fn define_method<F>(
        &mut self,
        name: &str,
        prototype: &str,
        handler: F,
    ) -> ExportResult<Arc<MethodDescriptor>>
    where
        F: Fn(&[Value]) -> MethodResult + Send + Sync + 'static,
    {
        self.define_method_with(name, prototype, Arc::new(handler))
    }

    /// Like [`define_method`](Self::define_method), for an already shared handler.
    pub fn define_method_with(
        &mut self,
        name: &str,
        prototype: &str,
        handler: Arc<dyn MethodHandler>,
    ) -> ExportResult<Arc<MethodDescriptor>> {
        let registry = self.registry;
        let current = self.current.as_mut().ok_or(ExportError::NoActiveInterface)?;
        let parsed = registry
            .parser
            .parse_method(prototype)
            .map_err(|source| ExportError::Prototype {
                member: name.to_string(),
                source,
            })?;

        let method = current.define_method(MethodDescriptor::new(
            name,
            parsed.params,
            parsed.returns,
        ))?;
        current.bind(name, handler)?;
        log::debug!("  method {}.{}({})", current.name(), name, prototype);
        Ok(method)
    }

    /// Define a signal on the interface being declared.
    ///
    /// The returned handle is what application code emits through.
    pub fn define_signal(&mut self, name: &str, prototype: &str) -> ExportResult<SignalHandle> {
        let registry = self.registry;
        let current = self.current.as_mut().ok_or(ExportError::NoActiveInterface)?;
        let args = registry
            .parser
            .parse_signal(prototype)
            .map_err(|source| ExportError::Prototype {
                member: name.to_string(),
                source,
            })?;

        let signal = current.define_signal(SignalDescriptor::new(name, args))?;
        log::debug!("  signal {}.{}({})", current.name(), name, prototype);
        Ok(SignalHandle {
            interface: current.name().to_string(),
            signal,
        })
    }

    /// Name of the interface currently being declared.
    pub fn current_interface(&self) -> Option<&str> {
        self.current.as_ref().map(InterfaceDescriptor::name)
    }
}

/// Emission handle for a declared signal.
#[derive(Debug, Clone)]
pub struct SignalHandle {
    interface: String,
    signal: Arc<SignalDescriptor>,
}

impl SignalHandle {
    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn descriptor(&self) -> &Arc<SignalDescriptor> {
        &self.signal
    }

    /// Emit this signal from `object` with the given arguments.
    pub fn emit(&self, object: &ExportableObject, args: Vec<Value>) -> ExportResult<Message> {
        object.emit(&self.interface, &self.signal, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Returns;
    use std::thread;

    fn noop(_: &[Value]) -> MethodResult {
        Ok(Returns::none())
    }

    #[test]
    fn declare_and_lookup() {
        let registry = InterfaceRegistry::new();
        let intf = registry
            .declare_interface("com.example.Calc", |d| {
                assert_eq!(d.current_interface(), Some("com.example.Calc"));
                d.define_method("Add", "in a:i, in b:i, out sum:i", noop)?;
                d.define_signal("Overflow", "value:x")?;
                Ok(())
            })
            .unwrap();

        assert_eq!(intf.method("Add").unwrap().params.len(), 2);
        assert!(intf.handler("Add").is_some());
        assert!(intf.signal("Overflow").is_some());
        assert_eq!(registry.list_interfaces(), vec!["com.example.Calc"]);
    }

    #[test]
    fn define_outside_declaration_fails() {
        let registry = InterfaceRegistry::new();
        let mut d = registry.declarator();

        assert!(matches!(
            d.define_method("Add", "", noop),
            Err(ExportError::NoActiveInterface)
        ));
        assert!(matches!(
            d.define_signal("Changed", ""),
            Err(ExportError::NoActiveInterface)
        ));
    }

    #[test]
    fn failing_body_commits_nothing_and_clears_cursor() {
        let registry = InterfaceRegistry::new();
        let mut d = registry.declarator();

        let result = d.declare_interface("com.example.Broken", |d| {
            d.define_method("Ok", "", noop)?;
            d.define_method("Bad", "in x:?", noop)?;
            Ok(())
        });
        assert!(matches!(result, Err(ExportError::Prototype { .. })));
        assert_eq!(d.current_interface(), None);
        assert!(matches!(
            d.define_method("Late", "", noop),
            Err(ExportError::NoActiveInterface)
        ));
        drop(d);

        assert!(!registry.contains("com.example.Broken"));
    }

    #[test]
    fn panicking_body_releases_section() {
        let registry = InterfaceRegistry::new();

        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            registry.declare_interface("com.example.Panicky", |d| {
                d.define_method("Ok", "", noop)?;
                panic!("declaration blew up");
            })
        }));
        assert!(unwound.is_err());
        assert!(registry.is_empty());

        // The declaration section was released: this does not block
        registry
            .declare_interface("com.example.After", |d| {
                d.define_method("Ok", "", noop)?;
                Ok(())
            })
            .unwrap();
        assert_eq!(registry.list_interfaces(), vec!["com.example.After"]);
    }

    #[test]
    fn panicking_body_clears_cursor_of_held_declarator() {
        let registry = InterfaceRegistry::new();
        let mut d = registry.declarator();

        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            d.declare_interface("com.example.Panicky", |_| panic!("declaration blew up"))
        }));
        assert!(unwound.is_err());
        assert_eq!(d.current_interface(), None);
        assert!(matches!(
            d.define_method("Stray", "", noop),
            Err(ExportError::NoActiveInterface)
        ));
        drop(d);

        assert!(!registry.contains("com.example.Panicky"));
    }

    #[test]
    fn nested_declaration_is_rejected() {
        let registry = InterfaceRegistry::new();
        let result = registry.declare_interface("com.example.Outer", |d| {
            d.declare_interface("com.example.Inner", |_| Ok(()))?;
            Ok(())
        });

        assert!(matches!(
            result,
            Err(ExportError::NestedDeclaration { ref outer, ref inner })
                if outer == "com.example.Outer" && inner == "com.example.Inner"
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn invalid_names_are_rejected() {
        let registry = InterfaceRegistry::new();
        assert!(matches!(
            registry.declare_interface("NoDots", |_| Ok(())),
            Err(ExportError::InvalidName { kind: "interface", .. })
        ));
        assert!(matches!(
            registry.declare_interface("com.example.Calc", |d| {
                d.define_method("Bad Name", "", noop)?;
                Ok(())
            }),
            Err(ExportError::InvalidName { kind: "member", .. })
        ));
    }

    #[test]
    fn redeclare_replace_drops_old_members() {
        let registry = InterfaceRegistry::new();
        registry
            .declare_interface("com.example.X", |d| {
                d.define_method("Old", "", noop)?;
                Ok(())
            })
            .unwrap();
        registry
            .declare_interface("com.example.X", |d| {
                d.define_method("New", "", noop)?;
                Ok(())
            })
            .unwrap();

        let intf = registry.get("com.example.X").unwrap();
        assert!(intf.method("Old").is_none());
        assert!(intf.method("New").is_some());
    }

    #[test]
    fn redeclare_reject_and_extend() {
        let config = ExportConfig::default().redeclare_policy(RedeclarePolicy::Reject);
        let registry = InterfaceRegistry::with_config(&config);
        registry.declare_interface("com.example.X", |_| Ok(())).unwrap();
        assert!(matches!(
            registry.declare_interface("com.example.X", |_| Ok(())),
            Err(ExportError::DuplicateInterface(name)) if name == "com.example.X"
        ));

        let config = ExportConfig::default().redeclare_policy(RedeclarePolicy::Extend);
        let registry = InterfaceRegistry::with_config(&config);
        registry
            .declare_interface("com.example.X", |d| {
                d.define_method("First", "", noop)?;
                Ok(())
            })
            .unwrap();
        registry
            .declare_interface("com.example.X", |d| {
                d.define_method("Second", "", noop)?;
                Ok(())
            })
            .unwrap();

        let intf = registry.get("com.example.X").unwrap();
        assert!(intf.method("First").is_some());
        assert!(intf.method("Second").is_some());
        assert!(intf.handler("First").is_some());
    }

    #[test]
    fn concurrent_declarations_are_serialized() {
        let registry = Arc::new(InterfaceRegistry::new());
        let workers: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let name = format!("com.example.Worker{i}");
                    registry
                        .declare_interface(&name, |d| {
                            for m in 0..16 {
                                d.define_method(&format!("M{m}"), "in x:i, out y:i", noop)?;
                                assert_eq!(d.current_interface(), Some(name.as_str()));
                            }
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(registry.len(), 8);
        for name in registry.list_interfaces() {
            assert_eq!(registry.get(&name).unwrap().methods().count(), 16);
        }
    }

    #[test]
    fn remove_does_not_affect_snapshots() {
        let registry = InterfaceRegistry::new();
        registry.declare_interface("com.example.X", |_| Ok(())).unwrap();

        let snapshot = registry.interfaces();
        assert!(registry.remove("com.example.X").is_some());
        assert!(registry.remove("com.example.X").is_none());
        assert!(snapshot.contains_key("com.example.X"));
    }

    #[test]
    fn global_registry_is_shared() {
        let name = "com.example.GlobalRegistryTest";
        InterfaceRegistry::global()
            .declare_interface(name, |d| {
                d.define_method("Ping", "", noop)?;
                Ok(())
            })
            .unwrap();

        assert!(InterfaceRegistry::global().contains(name));
        InterfaceRegistry::global().remove(name);
    }
}
