//! Host requests routed through `Bridge::dispatch`

mod common;

use common::*;
use serde_json::json;
use tether_engine::{BridgeError, BridgeRequest, BridgeResult, ErrorCode, ScriptValue};

fn dispatch(f: &Fixture, request: ScriptValue) -> BridgeResult<ScriptValue> {
    let request = BridgeRequest::from_script(request)?;
    let (reply, rx) = channel_reply();
    f.bridge.dispatch(request, reply);
    let outcome = wait(&rx);
    assert!(rx.try_recv().is_err(), "reply delivered more than once");
    outcome
}

fn code(result: BridgeResult<ScriptValue>) -> ErrorCode {
    result.map_err(|e| e.code()).unwrap_err()
}

#[test]
fn test_instance_round_trip() {
    let f = fixture();
    let instance = dispatch(
        &f,
        json!({"method": "createInstance", "type": "Tether.Test.TestProperties", "arguments": [4]}),
    )
    .unwrap();
    assert_eq!(instance["type"], json!("Tether.Test.TestProperties"));

    let value = dispatch(
        &f,
        json!({"method": "getProperty", "instance": instance, "property": "value"}),
    );
    assert_eq!(value, Ok(json!(4)));

    let set = dispatch(
        &f,
        json!({"method": "setProperty", "instance": instance, "property": "label", "value": "x"}),
    );
    assert_eq!(set, Ok(ScriptValue::Null));

    let released = dispatch(&f, json!({"method": "releaseInstance", "instance": instance}));
    assert_eq!(released, Ok(ScriptValue::Null));
    let again = dispatch(&f, json!({"method": "releaseInstance", "instance": instance}));
    assert_eq!(code(again), ErrorCode::InstanceNotFound);
}

#[test]
fn test_static_members() {
    let f = fixture();
    let echoed = dispatch(
        &f,
        json!({
            "method": "invokeStaticMethod",
            "type": "Tether.Test.TestMethods",
            "methodName": "echo",
            "arguments": ["abc", false],
        }),
    );
    assert_eq!(echoed, Ok(json!("abc")));

    let set = dispatch(
        &f,
        json!({
            "method": "setStaticProperty",
            "type": "Tether.Test.TestProperties",
            "property": "staticValue",
            "value": "via dispatch",
        }),
    );
    assert_eq!(set, Ok(ScriptValue::Null));
    let read = dispatch(
        &f,
        json!({
            "method": "getStaticProperty",
            "type": "Tether.Test.TestProperties",
            "property": "staticValue",
        }),
    );
    assert_eq!(read, Ok(json!("via dispatch")));
}

#[test]
fn test_synchronous_failures_reach_the_reply() {
    let f = fixture();
    let failed = dispatch(
        &f,
        json!({
            "method": "invokeStaticMethod",
            "type": "Tether.Test.TestMethods",
            "methodName": "echo",
            "arguments": ["abc", true],
        }),
    );
    assert_eq!(
        failed.map_err(|e| e.to_script()),
        Err(json!({"code": "NativeFailure", "message": "Echo failed"}))
    );

    let missing = dispatch(
        &f,
        json!({"method": "invokeStaticMethod", "type": "Tether.Test.Nope", "methodName": "x"}),
    );
    assert_eq!(code(missing), ErrorCode::ClassNotFound);
}

#[test]
fn test_deferred_invocation() {
    let f = fixture();
    let computed = dispatch(
        &f,
        json!({
            "method": "invokeStaticMethod",
            "type": "Tether.Test.TestAsync",
            "methodName": "compute",
            "arguments": [3, 5],
        }),
    );
    assert_eq!(computed, Ok(json!(15)));

    let forgotten = dispatch(
        &f,
        json!({"method": "invokeStaticMethod", "type": "Tether.Test.TestAsync", "methodName": "forget"}),
    );
    assert_eq!(code(forgotten), ErrorCode::NativeFailure);
}

#[test]
fn test_instance_method() {
    let f = fixture();
    let instance = dispatch(
        &f,
        json!({"method": "createInstance", "type": "Tether.Test.TestStruct"}),
    )
    .unwrap();
    dispatch(
        &f,
        json!({
            "method": "invokeMethod",
            "instance": instance,
            "methodName": "updateValue",
            "arguments": ["dispatched"],
        }),
    )
    .unwrap();
    let described = dispatch(
        &f,
        json!({"method": "invokeMethod", "instance": instance, "methodName": "describe"}),
    );
    assert_eq!(described, Ok(json!("dispatched:0")));
}

#[test]
fn test_instance_listeners() {
    let f = fixture();
    let instance = dispatch(
        &f,
        json!({"method": "createInstance", "type": "Tether.Test.TestEvents"}),
    )
    .unwrap();
    let added = dispatch(
        &f,
        json!({"method": "addEventListener", "instance": instance, "event": "changed", "listener": "l"}),
    );
    assert_eq!(added, Ok(ScriptValue::Null));
    assert_eq!(f.bridge.events().listener_count(), 1);

    let removed = dispatch(
        &f,
        json!({"method": "removeEventListener", "instance": instance, "event": "changed", "listener": "l"}),
    );
    assert_eq!(removed, Ok(ScriptValue::Null));
    assert_eq!(f.bridge.events().listener_count(), 0);
}

#[test]
fn test_malformed_request() {
    let err: BridgeError = BridgeRequest::from_script(json!({"method": "teleport"})).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}
