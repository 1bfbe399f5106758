// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cross-module tests: declaration, export, dispatch and emission together.

use super::*;
use std::sync::Arc;
use std::thread;

fn int() -> Signature {
    Signature::new("i").unwrap()
}

struct Bus {
    transport: Arc<MemoryTransport>,
    service: Arc<Service>,
}

impl Bus {
    fn new() -> Self {
        let transport = Arc::new(MemoryTransport::new());
        let service = Service::new("com.example.Test", transport.clone());
        Self { transport, service }
    }
}

fn declare_calc(registry: &InterfaceRegistry) -> SignalHandle {
    let mut overflow = None;
    registry
        .declare_interface("com.example.Calc", |d| {
            d.define_method("Add", "in a:i, in b:i, out sum:i", |args: &[Value]| {
                let a = args[0].as_i32().unwrap_or_default();
                let b = args[1].as_i32().unwrap_or_default();
                match a.checked_add(b) {
                    Some(sum) => Ok(Returns::one(sum)),
                    None => Err(MethodFault::application(
                        "com.example.Calc.Error.Overflow",
                        format!("{a} + {b} overflows"),
                    )),
                }
            })?;
            overflow = Some(d.define_signal("Overflow", "a:i, b:i")?);
            Ok(())
        })
        .unwrap();
    overflow.unwrap()
}

#[test]
fn test_add_scenario() {
    let registry = InterfaceRegistry::new();
    declare_calc(&registry);
    let bus = Bus::new();
    bus.service
        .publish(ExportableObject::new("/calc", &registry).unwrap())
        .unwrap();

    let call = Message::method_call("/calc", "com.example.Calc", "Add")
        .with_serial(42)
        .with_sender(":1.3")
        .with_param(int(), 2i32)
        .with_param(int(), 3i32);
    let reply = bus.service.route(&call).unwrap().unwrap();

    assert_eq!(reply.kind, MessageKind::MethodReturn);
    assert_eq!(reply.reply_serial, Some(42));
    assert_eq!(reply.params().count(), 1);
    assert_eq!(reply.signature()[0].as_str(), "i");
    assert_eq!(reply.body()[0], Value::Int32(5));
    assert_eq!(bus.transport.sent(), vec![reply]);
}

#[test]
fn test_subtract_scenario() {
    let registry = InterfaceRegistry::new();
    declare_calc(&registry);
    let bus = Bus::new();
    bus.service
        .publish(ExportableObject::new("/calc", &registry).unwrap())
        .unwrap();

    let call = Message::method_call("/calc", "com.example.Calc", "Subtract").with_serial(9);
    let reply = bus.service.route(&call).unwrap().unwrap();

    assert_eq!(reply.kind, MessageKind::Error);
    assert_eq!(reply.error_name.as_deref(), Some(names::UNKNOWN_METHOD));
    assert_eq!(reply.error_description(), Some("com.example.Calc Subtract"));
    assert_eq!(reply.reply_serial, Some(9));
}

#[test]
fn test_application_fault_round_trip() {
    let registry = InterfaceRegistry::new();
    declare_calc(&registry);
    let bus = Bus::new();
    bus.service
        .publish(ExportableObject::new("/calc", &registry).unwrap())
        .unwrap();

    let call = Message::method_call("/calc", "com.example.Calc", "Add")
        .with_param(int(), i32::MAX)
        .with_param(int(), 1i32);
    let reply = bus.service.route(&call).unwrap().unwrap();

    assert_eq!(
        reply.error_name.as_deref(),
        Some("com.example.Calc.Error.Overflow")
    );
    assert_eq!(
        reply.error_description(),
        Some("2147483647 + 1 overflows")
    );
}

#[test]
fn test_signal_handle_emission() {
    let registry = InterfaceRegistry::new();
    let overflow = declare_calc(&registry);
    assert_eq!(overflow.interface(), "com.example.Calc");

    // Not yet published: emission fails loudly
    let object = ExportableObject::new("/calc", &registry).unwrap();
    let err = overflow
        .emit(&object, vec![Value::from(1i32), Value::from(2i32)])
        .unwrap_err();
    assert!(matches!(err, ExportError::ServiceNotBound(_)));

    let bus = Bus::new();
    let object = bus.service.publish(object).unwrap();
    let signal = overflow
        .emit(&object, vec![Value::from(1i32), Value::from(2i32)])
        .unwrap();

    assert_eq!(signal.kind, MessageKind::Signal);
    assert_eq!(signal.path.as_deref(), Some("/calc"));
    assert_eq!(signal.interface.as_deref(), Some("com.example.Calc"));
    assert_eq!(signal.member.as_deref(), Some("Overflow"));
    assert_eq!(signal.signature(), &[int(), int()]);
    assert_eq!(signal.serial, 1);
    assert_eq!(bus.service.messages_sent(), 1);
}

#[test]
fn test_redeclare_policies_seen_by_objects() {
    // Replace: objects built afterwards lose the earlier members
    let registry = InterfaceRegistry::new();
    declare_calc(&registry);
    registry
        .declare_interface("com.example.Calc", |d| {
            d.define_method("Mul", "in a:i, in b:i, out p:i", |args: &[Value]| {
                let a = args[0].as_i32().unwrap_or_default();
                let b = args[1].as_i32().unwrap_or_default();
                Ok(Returns::one(a * b))
            })?;
            Ok(())
        })
        .unwrap();
    let object = ExportableObject::new("/calc", &registry).unwrap();
    let calc = object.interface("com.example.Calc").unwrap();
    assert!(calc.method("Add").is_none());
    assert!(calc.method("Mul").is_some());
    assert!(calc.signal("Overflow").is_none());

    // Extend: earlier members survive
    let registry =
        InterfaceRegistry::with_config(&ExportConfig::default().redeclare_policy(RedeclarePolicy::Extend));
    declare_calc(&registry);
    registry
        .declare_interface("com.example.Calc", |d| {
            d.define_method("Neg", "in a:i, out b:i", |args: &[Value]| {
                Ok(Returns::one(-args[0].as_i32().unwrap_or_default()))
            })?;
            Ok(())
        })
        .unwrap();
    let object = ExportableObject::new("/calc", &registry).unwrap();
    let calc = object.interface("com.example.Calc").unwrap();
    assert!(calc.method("Add").is_some());
    assert!(calc.method("Neg").is_some());
    assert!(calc.handler("Add").is_some());

    // Reject: the first declaration stays
    let registry =
        InterfaceRegistry::with_config(&ExportConfig::default().redeclare_policy(RedeclarePolicy::Reject));
    declare_calc(&registry);
    let err = registry
        .declare_interface("com.example.Calc", |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, ExportError::DuplicateInterface(_)));
    assert!(registry.get("com.example.Calc").unwrap().method("Add").is_some());
}

#[test]
fn test_config_file_drives_dispatch() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "validate_args = true").unwrap();
    writeln!(file, "include_backtrace = false").unwrap();
    writeln!(file, "log_routing_failures = false").unwrap();
    let config = ExportConfig::from_file(file.path()).unwrap();

    let registry = InterfaceRegistry::with_config(&config);
    registry
        .declare_interface("com.example.Fs", |d| {
            d.define_method("Read", "in path:s, out data:ay", |args: &[Value]| {
                std::fs::read(args[0].as_str().unwrap_or_default())
                    .map(|bytes| Returns::one(Value::from(bytes)))
                    .map_err(MethodFault::from_error)
            })?;
            Ok(())
        })
        .unwrap();

    let bus = Bus::new();
    let object = bus
        .service
        .publish(ExportableObject::with_config("/fs", &registry, config).unwrap())
        .unwrap();

    let call = Message::method_call("/fs", "com.example.Fs", "Read")
        .with_param(Signature::new("s").unwrap(), "/nonexistent/file");
    let reply = object.dispatch(&call).unwrap().unwrap();
    assert_eq!(reply.error_name.as_deref(), Some(names::FAILED));
    let description = reply.error_description().unwrap();
    assert!(description.contains("io::error::Error: "), "{description}");
    assert!(!description.contains("==== Backtrace ===="));

    let bad = Message::method_call("/fs", "com.example.Fs", "Read").with_param(int(), 7i32);
    let reply = object.dispatch(&bad).unwrap().unwrap();
    assert_eq!(reply.error_name.as_deref(), Some(names::INVALID_ARGS));
}

#[test]
fn test_concurrent_dispatch_on_shared_object() {
    let registry = InterfaceRegistry::new();
    declare_calc(&registry);
    let bus = Bus::new();
    let object = bus
        .service
        .publish(ExportableObject::new("/calc", &registry).unwrap())
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let object = Arc::clone(&object);
            thread::spawn(move || {
                for j in 0..25 {
                    let call = Message::method_call("/calc", "com.example.Calc", "Add")
                        .with_param(int(), i)
                        .with_param(int(), j);
                    let reply = object.dispatch(&call).unwrap().unwrap();
                    assert_eq!(reply.body(), &[Value::Int32(i + j)]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let sent = bus.transport.sent();
    assert_eq!(sent.len(), 200);
    let mut serials: Vec<u32> = sent.iter().map(|m| m.serial).collect();
    serials.sort_unstable();
    serials.dedup();
    assert_eq!(serials.len(), 200);
    assert_eq!(object.calls_dispatched(), 200);
}

#[test]
fn test_handler_can_rebind_itself() {
    let registry = InterfaceRegistry::new();
    registry
        .declare_interface("com.example.Once", |d| {
            d.define_method("Fire", "out n:u", |_: &[Value]| Ok(Returns::one(1u32)))?;
            Ok(())
        })
        .unwrap();
    let bus = Bus::new();
    let object = bus
        .service
        .publish(ExportableObject::new("/once", &registry).unwrap())
        .unwrap();

    let weak = Arc::downgrade(&object);
    object
        .bind_handler("com.example.Once", "Fire", move |_: &[Value]| {
            if let Some(object) = weak.upgrade() {
                object.bind_handler("com.example.Once", "Fire", |_: &[Value]| {
                    Err(MethodFault::application("com.example.Once.Error.Spent", "already fired"))
                })?;
            }
            Ok(Returns::one(2u32))
        })
        .unwrap();

    let call = Message::method_call("/once", "com.example.Once", "Fire");
    let first = object.dispatch(&call).unwrap().unwrap();
    assert_eq!(first.body(), &[Value::UInt32(2)]);

    let second = object.dispatch(&call).unwrap().unwrap();
    assert_eq!(
        second.error_name.as_deref(),
        Some("com.example.Once.Error.Spent")
    );
}

#[test]
fn test_introspection_after_publish() {
    let registry = InterfaceRegistry::new();
    declare_calc(&registry);
    registry
        .declare_interface("com.example.Meta", |d| {
            d.define_method("Version", "out v:s", |_: &[Value]| Ok(Returns::one("1.0")))?;
            Ok(())
        })
        .unwrap();
    let object = ExportableObject::new("/calc", &registry).unwrap();

    let xml = object.introspect();
    let calc = xml.find("com.example.Calc").unwrap();
    let meta = xml.find("com.example.Meta").unwrap();
    assert!(calc < meta, "interfaces are sorted by name");
    assert!(xml.contains("<arg name=\"sum\" type=\"i\" direction=\"out\"/>"));
    assert!(xml.contains("<signal name=\"Overflow\">"));
}
