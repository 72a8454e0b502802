//! Fixture plugin shared by the integration tests
//!
//! Registers the `Tether.Test` namespace with one type per bridge feature:
//! value structs, an enumeration, synchronous and deferred methods, static
//! and instance events, and properties.

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver};
use parking_lot::Mutex;
use tether_engine::sdk::{
    CallConvention, CompletionStyle, EnumValue, EventDef, EventSource, MethodDef, NativeCall,
    NativeError, NativeResult, NativeValue, ObjectRef, PropertyDef, TypeBuilder, TypeDescriptor,
    TypeRef,
};
use tether_engine::{Bridge, BridgeConfig, BridgeResult, Listener, Reply, ScriptValue};

pub const NAMESPACE: &str = "Tether.Test";
pub const PREFIX: &str = "tether_test";

pub const TEST_STRUCT: &str = "tether_test::TestStruct";
pub const TEST_PLAIN_STRUCT: &str = "tether_test::TestPlainStruct";
pub const TEST_ONE_WAY_STRUCT: &str = "tether_test::TestOneWayStruct";
pub const TEST_ENUM: &str = "tether_test::TestEnum";
pub const TEST_METHODS: &str = "tether_test::TestMethods";
pub const TEST_ASYNC: &str = "tether_test::TestAsync";
pub const TEST_EVENT: &str = "tether_test::TestEvent";
pub const TEST_EVENTS: &str = "tether_test::TestEvents";
pub const TEST_PROPERTIES: &str = "tether_test::TestProperties";

const CONFIG: &str = r#"
value_types = ["Tether.Test.TestEvent"]

[[namespaces]]
namespace = "Tether.Test"
prefix = "tether_test"
"#;

/// How long a test waits for a deferred completion
pub const TIMEOUT: Duration = Duration::from_secs(5);

pub struct Fixture {
    pub bridge: Bridge,
    /// Backing source of `TestEvents.staticChanged`
    pub static_events: EventSource,
    /// Lines written by `TestMethods.log`
    pub log: Arc<Mutex<Vec<String>>>,
}

pub fn fixture() -> Fixture {
    let config = BridgeConfig::parse(CONFIG).unwrap();
    let bridge = Bridge::with_config(&config).unwrap();
    let static_events = EventSource::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    for descriptor in [
        struct_type(TEST_STRUCT, true),
        struct_type(TEST_PLAIN_STRUCT, false),
        one_way_struct_type(),
        enum_type(),
        methods_type(log.clone()),
        async_type(),
        event_type(),
        events_type(static_events.clone()),
        properties_type(),
    ] {
        bridge.register_type(descriptor).unwrap();
    }

    Fixture {
        bridge,
        static_events,
        log,
    }
}

// ============================================================================
// Script-side helpers
// ============================================================================

pub fn script_name(native: &str) -> String {
    native.replace("tether_test::", "Tether.Test.")
}

/// Reply that forwards its single outcome into a channel
pub fn channel_reply() -> (Reply, Receiver<BridgeResult<ScriptValue>>) {
    let (tx, rx) = channel::bounded(1);
    let reply = Reply::from_fn(move |outcome| {
        let _ = tx.send(outcome);
    });
    (reply, rx)
}

/// Wait for the outcome of a reply
pub fn wait(rx: &Receiver<BridgeResult<ScriptValue>>) -> BridgeResult<ScriptValue> {
    rx.recv_timeout(TIMEOUT).expect("reply never delivered")
}

/// Invoke a static method and wait for its outcome.
///
/// Synchronous failures come back the same way as deferred ones.
pub fn call_static(
    bridge: &Bridge,
    native: &str,
    method: &str,
    args: &[ScriptValue],
) -> BridgeResult<ScriptValue> {
    let (reply, rx) = channel_reply();
    bridge.invoke_static_method(&script_name(native), method, args, reply)?;
    wait(&rx)
}

/// Invoke an instance method and wait for its outcome
pub fn call_method(
    bridge: &Bridge,
    instance: &ScriptValue,
    method: &str,
    args: &[ScriptValue],
) -> BridgeResult<ScriptValue> {
    let (reply, rx) = channel_reply();
    bridge.invoke_method(instance, method, args, reply)?;
    wait(&rx)
}

/// Listener recording every payload
pub fn recorder(identity: &str) -> (Listener, Receiver<ScriptValue>) {
    let (tx, rx) = channel::unbounded();
    let listener = Listener::new(identity, move |payload| {
        let _ = tx.send(payload);
    });
    (listener, rx)
}

// ============================================================================
// TestStruct / TestPlainStruct
// ============================================================================

#[derive(Default)]
pub struct TestStruct {
    string_value: Mutex<String>,
    int_value: Mutex<i32>,
    date_value: Mutex<Option<DateTime<Utc>>>,
    enum_value: Mutex<i64>,
}

/// Struct with read-write fields; `by_value` marks it marshal-by-value
fn struct_type(native: &'static str, by_value: bool) -> TypeDescriptor {
    let builder = TypeBuilder::class(native)
        .constructor(
            MethodDef::constructor()
                .body(move |_| Ok(ObjectRef::new(native, TestStruct::default()).into())),
        )
        .property(
            PropertyDef::new("string_value", TypeRef::String)
                .getter(|call| Ok(call.this::<TestStruct>()?.string_value.lock().clone().into()))
                .setter(|call| {
                    *call.this::<TestStruct>()?.string_value.lock() = call.arg(0)?;
                    Ok(())
                }),
        )
        .property(
            PropertyDef::new("int_value", TypeRef::I32)
                .getter(|call| Ok((*call.this::<TestStruct>()?.int_value.lock()).into()))
                .setter(|call| {
                    *call.this::<TestStruct>()?.int_value.lock() = call.arg(0)?;
                    Ok(())
                }),
        )
        .property(
            PropertyDef::new("date_value", TypeRef::optional(TypeRef::Date))
                .getter(|call| Ok((*call.this::<TestStruct>()?.date_value.lock()).into()))
                .setter(|call| {
                    *call.this::<TestStruct>()?.date_value.lock() = call.arg(0)?;
                    Ok(())
                }),
        )
        .property(
            PropertyDef::new("enum_value", TypeRef::enumeration(TEST_ENUM))
                .getter(|call| {
                    let value = *call.this::<TestStruct>()?.enum_value.lock();
                    Ok(EnumValue::new(TEST_ENUM, value).into())
                })
                .setter(|call| {
                    let member: EnumValue = call.arg(0)?;
                    *call.this::<TestStruct>()?.enum_value.lock() = member.value;
                    Ok(())
                }),
        )
        .method(
            MethodDef::new("update_value")
                .param(TypeRef::String)
                .body(|call| {
                    let value: String = call.arg(0)?;
                    *call.this::<TestStruct>()?.string_value.lock() = value;
                    Ok(NativeValue::Null)
                }),
        )
        .method(
            MethodDef::new("describe")
                .returns(TypeRef::String)
                .body(|call| {
                    let this = call.this::<TestStruct>()?;
                    let text = format!("{}:{}", this.string_value.lock(), this.int_value.lock());
                    Ok(text.into())
                }),
        );
    if by_value {
        builder.marshal_by_value().build()
    } else {
        builder.build()
    }
}

// ============================================================================
// TestOneWayStruct
// ============================================================================

pub struct TestOneWayStruct {
    string_value: Mutex<String>,
    created: i32,
}

fn one_way_struct_type() -> TypeDescriptor {
    TypeBuilder::class(TEST_ONE_WAY_STRUCT)
        .marshal_by_value()
        .constructor(MethodDef::constructor().body(|_| {
            Ok(ObjectRef::new(
                TEST_ONE_WAY_STRUCT,
                TestOneWayStruct {
                    string_value: Mutex::new(String::new()),
                    created: 7,
                },
            )
            .into())
        }))
        .property(
            PropertyDef::new("string_value", TypeRef::String)
                .getter(|call| {
                    Ok(call.this::<TestOneWayStruct>()?.string_value.lock().clone().into())
                })
                .setter(|call| {
                    *call.this::<TestOneWayStruct>()?.string_value.lock() = call.arg(0)?;
                    Ok(())
                }),
        )
        .property(
            PropertyDef::new("created", TypeRef::I32)
                .getter(|call| Ok(call.this::<TestOneWayStruct>()?.created.into())),
        )
        .build()
}

// ============================================================================
// TestEnum
// ============================================================================

fn enum_type() -> TypeDescriptor {
    TypeBuilder::enumeration(TEST_ENUM, [("First", 0), ("Second", 1), ("Third", 2)]).build()
}

// ============================================================================
// TestMethods
// ============================================================================

fn echo(call: &mut NativeCall<'_>) -> NativeResult<NativeValue> {
    Ok(call.raw_arg(0)?.clone())
}

fn static_echo(name: &str, ty: TypeRef) -> MethodDef {
    MethodDef::new(name)
        .as_static()
        .param(ty.clone())
        .returns(ty)
        .body(echo)
}

fn methods_type(log: Arc<Mutex<Vec<String>>>) -> TypeDescriptor {
    TypeBuilder::class(TEST_METHODS)
        .method(
            MethodDef::new("echo")
                .as_static()
                .param(TypeRef::String)
                .param(TypeRef::Bool)
                .returns(TypeRef::String)
                .convention(CallConvention::ErrorOut)
                .body(|call| {
                    if call.arg::<bool>(1)? {
                        call.set_error("Echo failed");
                        return Ok(NativeValue::Null);
                    }
                    Ok(call.raw_arg(0)?.clone())
                }),
        )
        .method(
            MethodDef::new("log")
                .as_static()
                .param(TypeRef::String)
                .body(move |call| {
                    log.lock().push(call.arg(0)?);
                    Ok(NativeValue::Null)
                }),
        )
        .method(
            MethodDef::new("add")
                .as_static()
                .param(TypeRef::I32)
                .param(TypeRef::I32)
                .returns(TypeRef::I32)
                .body(|call| {
                    let (a, b): (i32, i32) = (call.arg(0)?, call.arg(1)?);
                    a.checked_add(b)
                        .map(NativeValue::from)
                        .ok_or_else(|| NativeError::failure("Overflow"))
                }),
        )
        .method(static_echo("echo_data", TypeRef::Json))
        .method(static_echo("echo_nullable_int", TypeRef::optional(TypeRef::I32)))
        .method(static_echo("echo_byte", TypeRef::U8))
        .method(static_echo("echo_double", TypeRef::F64))
        .method(static_echo("echo_uuid", TypeRef::Uuid))
        .method(static_echo("echo_uri", TypeRef::Uri))
        .method(static_echo("echo_date", TypeRef::Date))
        .method(static_echo("echo_enum", TypeRef::enumeration(TEST_ENUM)))
        .method(static_echo("echo_list", TypeRef::list(TypeRef::I32)))
        .method(static_echo("echo_struct", TypeRef::object(TEST_STRUCT)))
        .method(static_echo("echo_plain_struct", TypeRef::object(TEST_PLAIN_STRUCT)))
        .method(static_echo("echo_one_way_struct", TypeRef::object(TEST_ONE_WAY_STRUCT)))
        // Same script arity, different conventions
        .method(
            MethodDef::new("pick")
                .as_static()
                .param(TypeRef::String)
                .returns(TypeRef::String)
                .convention(CallConvention::ErrorOut)
                .body(echo),
        )
        .method(
            MethodDef::new("pick")
                .as_static()
                .param(TypeRef::String)
                .returns(TypeRef::String)
                .convention(CallConvention::RESULT_CATCH)
                .body(echo),
        )
        .method(MethodDef::new("reserved").as_static())
        // Bodies returning nothing for a declared result
        .method(
            MethodDef::new("blank_int")
                .as_static()
                .returns(TypeRef::I32)
                .body(|_| Ok(NativeValue::Null)),
        )
        .method(
            MethodDef::new("blank_label")
                .as_static()
                .returns(TypeRef::optional(TypeRef::String))
                .body(|_| Ok(NativeValue::Null)),
        )
        .method(
            MethodDef::new("fail_direct")
                .as_static()
                .body(|_| Err(NativeError::failure("Direct failure"))),
        )
        .method(
            MethodDef::new("panic_direct")
                .as_static()
                .body(|_| panic!("native panic")),
        )
        .build()
}

// ============================================================================
// TestAsync
// ============================================================================

fn async_type() -> TypeDescriptor {
    TypeBuilder::class(TEST_ASYNC)
        .method(
            MethodDef::new("delay")
                .as_static()
                .param(TypeRef::U32)
                .convention(CallConvention::THEN_CATCH)
                .body(|call| {
                    let millis: u32 = call.arg(0)?;
                    let done = call.take_completer();
                    thread::spawn(move || {
                        thread::sleep(Duration::from_millis(millis.into()));
                        if let Some(done) = done {
                            done.complete(());
                        }
                    });
                    Ok(NativeValue::Null)
                }),
        )
        .method(
            MethodDef::new("compute")
                .as_static()
                .param(TypeRef::I32)
                .param(TypeRef::I32)
                .returns(TypeRef::I32)
                .convention(CallConvention::RESULT_CATCH)
                .body(|call| {
                    let (a, b): (i32, i32) = (call.arg(0)?, call.arg(1)?);
                    let done = call.take_completer();
                    thread::spawn(move || {
                        if let Some(done) = done {
                            done.complete(a * b);
                        }
                    });
                    Ok(NativeValue::Null)
                }),
        )
        .method(
            MethodDef::new("fail_later")
                .as_static()
                .param(TypeRef::String)
                .returns(TypeRef::String)
                .convention(CallConvention::RESULT_CATCH)
                .body(|call| {
                    let message: String = call.arg(0)?;
                    let done = call.take_completer();
                    thread::spawn(move || {
                        if let Some(done) = done {
                            done.fail(message);
                        }
                    });
                    Ok(NativeValue::Null)
                }),
        )
        .method(
            MethodDef::new("raise_sync")
                .as_static()
                .convention(CallConvention::THEN_CATCH)
                .body(|_| Err(NativeError::failure("Raised before completing"))),
        )
        .method(
            MethodDef::new("forget")
                .as_static()
                .convention(CallConvention::THEN_CATCH)
                .body(|call| {
                    drop(call.take_completer());
                    Ok(NativeValue::Null)
                }),
        )
        .method(
            MethodDef::new("checked")
                .as_static()
                .param(TypeRef::Bool)
                .returns(TypeRef::String)
                .convention(CallConvention::Deferred {
                    style: CompletionStyle::ResultCatch,
                    out_error: true,
                })
                .body(|call| {
                    if call.arg::<bool>(0)? {
                        call.set_error("Check failed");
                        return Ok(NativeValue::Null);
                    }
                    Ok("checked".into())
                }),
        )
        .build()
}

// ============================================================================
// TestEvent / TestEvents
// ============================================================================

#[derive(Default)]
pub struct TestEvent {
    counter: Mutex<i32>,
}

impl TestEvent {
    fn object(counter: i32) -> ObjectRef {
        ObjectRef::new(
            TEST_EVENT,
            TestEvent {
                counter: Mutex::new(counter),
            },
        )
    }
}

/// Value type through configuration rather than the builder
fn event_type() -> TypeDescriptor {
    TypeBuilder::class(TEST_EVENT)
        .constructor(
            MethodDef::constructor()
                .body(|_| Ok(ObjectRef::new(TEST_EVENT, TestEvent::default()).into())),
        )
        .property(
            PropertyDef::new("counter", TypeRef::I32)
                .getter(|call| Ok((*call.this::<TestEvent>()?.counter.lock()).into()))
                .setter(|call| {
                    *call.this::<TestEvent>()?.counter.lock() = call.arg(0)?;
                    Ok(())
                }),
        )
        .build()
}

pub struct TestEvents {
    changed: EventSource,
}

fn events_of(object: &ObjectRef) -> NativeResult<&TestEvents> {
    object
        .downcast::<TestEvents>()
        .ok_or_else(|| NativeError::argument("Not a TestEvents instance"))
}

fn events_type(static_events: EventSource) -> TypeDescriptor {
    let raise_source = static_events.clone();
    TypeBuilder::class(TEST_EVENTS)
        .constructor(MethodDef::constructor().body(|_| {
            Ok(ObjectRef::new(
                TEST_EVENTS,
                TestEvents {
                    changed: EventSource::new(),
                },
            )
            .into())
        }))
        .event(EventDef::static_source(
            "static_changed",
            TypeRef::object(TEST_EVENT),
            static_events,
        ))
        .event(EventDef::instance(
            "changed",
            TypeRef::object(TEST_EVENT),
            |object| Ok(events_of(object)?.changed.clone()),
        ))
        .event(EventDef::instance("renamed", TypeRef::String, |object| {
            Ok(events_of(object)?.changed.clone())
        }))
        .method(
            MethodDef::new("raise_static")
                .as_static()
                .param(TypeRef::I32)
                .body(move |call| {
                    raise_source.raise(None, TestEvent::object(call.arg(0)?).into());
                    Ok(NativeValue::Null)
                }),
        )
        .method(
            MethodDef::new("raise")
                .param(TypeRef::I32)
                .body(|call| {
                    let receiver = call.receiver()?;
                    let args = TestEvent::object(call.arg(0)?);
                    events_of(receiver)?.changed.raise(Some(receiver), args.into());
                    Ok(NativeValue::Null)
                }),
        )
        .method(
            MethodDef::new("listener_count")
                .returns(TypeRef::U32)
                .body(|call| {
                    let count = events_of(call.receiver()?)?.changed.handler_count();
                    Ok(NativeValue::U32(count as u32))
                }),
        )
        .build()
}

// ============================================================================
// TestProperties
// ============================================================================

pub struct TestProperties {
    value: Mutex<i32>,
    label: Mutex<Option<String>>,
}

fn properties_type() -> TypeDescriptor {
    let static_value = Arc::new(Mutex::new(String::from("initial")));
    let read = static_value.clone();
    TypeBuilder::class(TEST_PROPERTIES)
        .constructor(MethodDef::constructor().body(|_| {
            Ok(ObjectRef::new(
                TEST_PROPERTIES,
                TestProperties {
                    value: Mutex::new(0),
                    label: Mutex::new(None),
                },
            )
            .into())
        }))
        .constructor(MethodDef::constructor().param(TypeRef::I32).body(|call| {
            Ok(ObjectRef::new(
                TEST_PROPERTIES,
                TestProperties {
                    value: Mutex::new(call.arg(0)?),
                    label: Mutex::new(None),
                },
            )
            .into())
        }))
        .property(
            PropertyDef::new("static_value", TypeRef::String)
                .as_static()
                .getter(move |_| Ok(read.lock().clone().into()))
                .setter(move |call| {
                    *static_value.lock() = call.arg(0)?;
                    Ok(())
                }),
        )
        .property(
            PropertyDef::new("value", TypeRef::I32)
                .getter(|call| Ok((*call.this::<TestProperties>()?.value.lock()).into()))
                .setter(|call| {
                    *call.this::<TestProperties>()?.value.lock() = call.arg(0)?;
                    Ok(())
                }),
        )
        .property(
            PropertyDef::new("label", TypeRef::optional(TypeRef::String))
                .getter(|call| Ok(call.this::<TestProperties>()?.label.lock().clone().into()))
                .setter(|call| {
                    *call.this::<TestProperties>()?.label.lock() = call.arg(0)?;
                    Ok(())
                }),
        )
        .property(
            PropertyDef::new("read_only", TypeRef::String)
                .getter(|_| Ok("fixed".into())),
        )
        .build()
}
