use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use crossbeam::channel;
use serde_json::json;
use tether_engine::sdk::{
    CallConvention, MethodDef, NativeValue, ObjectRef, PropertyDef, TypeBuilder, TypeRef,
};
use tether_engine::{Bridge, BridgeConfig, BridgeRequest, Reply, ScriptValue};

struct Point {
    x: i32,
    y: i32,
}

fn bridge() -> Bridge {
    let bridge = Bridge::with_config(
        &BridgeConfig::new()
            .with_namespace("Bench", "bench")
            .with_value_type("Bench.Point"),
    )
    .unwrap();
    bridge
        .register_type(
            TypeBuilder::class("bench::Math")
                .method(
                    MethodDef::new("add")
                        .as_static()
                        .param(TypeRef::I32)
                        .param(TypeRef::I32)
                        .returns(TypeRef::I32)
                        .body(|call| {
                            let (a, b): (i32, i32) = (call.arg(0)?, call.arg(1)?);
                            Ok(NativeValue::I32(a.wrapping_add(b)))
                        }),
                )
                .method(
                    MethodDef::new("echo")
                        .as_static()
                        .param(TypeRef::String)
                        .returns(TypeRef::String)
                        .convention(CallConvention::ErrorOut)
                        .body(|call| Ok(call.raw_arg(0)?.clone())),
                )
                .method(
                    MethodDef::new("origin")
                        .as_static()
                        .returns(TypeRef::object("bench::Point"))
                        .body(|_| Ok(ObjectRef::new("bench::Point", Point { x: 0, y: 0 }).into())),
                )
                .build(),
        )
        .unwrap();
    bridge
        .register_type(
            TypeBuilder::class("bench::Point")
                .property(
                    PropertyDef::new("x", TypeRef::I32)
                        .getter(|call| Ok(call.this::<Point>()?.x.into())),
                )
                .property(
                    PropertyDef::new("y", TypeRef::I32)
                        .getter(|call| Ok(call.this::<Point>()?.y.into())),
                )
                .build(),
        )
        .unwrap();
    bridge
}

fn invoke(bridge: &Bridge, method: &str, args: &[ScriptValue]) -> ScriptValue {
    let (tx, rx) = channel::bounded(1);
    let reply = Reply::from_fn(move |outcome| {
        let _ = tx.send(outcome);
    });
    bridge
        .invoke_static_method("Bench.Math", method, args, reply)
        .unwrap();
    rx.recv().unwrap().unwrap()
}

fn bench_invoke(c: &mut Criterion) {
    let bridge = bridge();
    let mut group = c.benchmark_group("invoke");

    group.bench_function("add", |b| {
        b.iter(|| invoke(&bridge, "add", black_box(&[json!(20), json!(22)])));
    });

    for len in [8usize, 256, 4096] {
        let text = json!("x".repeat(len));
        group.bench_with_input(BenchmarkId::new("echo", len), &text, |b, text| {
            b.iter(|| invoke(&bridge, "echo", std::slice::from_ref(black_box(text))));
        });
    }

    group.bench_function("value_struct", |b| {
        b.iter(|| invoke(&bridge, "origin", &[]));
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let bridge = bridge();
    let request = json!({
        "method": "invokeStaticMethod",
        "type": "Bench.Math",
        "methodName": "add",
        "arguments": [1, 2],
    });

    c.bench_function("dispatch_decoded", |b| {
        b.iter(|| {
            let request = BridgeRequest::from_script(black_box(request.clone())).unwrap();
            bridge.dispatch(request, Reply::from_fn(|r| drop(black_box(r))));
        });
    });
}

criterion_group!(benches, bench_invoke, bench_dispatch);
criterion_main!(benches);
