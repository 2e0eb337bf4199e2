//! Cycle collection through the public API

use esrun::{JsValue, Runtime, RuntimeOptions};

/// Runtime that only collects when asked
fn manual_runtime() -> Runtime {
    Runtime::with_options(RuntimeOptions::new().gc_threshold(0).console(false))
}

fn run(runtime: &mut Runtime, source: &str) -> JsValue {
    match runtime.run_string(source) {
        Ok(value) => value,
        Err(err) => panic!("script failed: {err}"),
    }
}

#[test]
fn test_unreachable_cycle_is_collected() {
    let mut runtime = manual_runtime();
    run(&mut runtime, "function make() { const a = {}; const b = { a }; a.b = b; } make();");
    assert!(runtime.collect_garbage() >= 2);
    assert_eq!(runtime.collect_garbage(), 0);
}

#[test]
fn test_self_reference_is_collected() {
    let mut runtime = manual_runtime();
    run(&mut runtime, "(function () { const o = {}; o.self = o; })();");
    assert!(runtime.collect_garbage() >= 1);
}

#[test]
fn test_reachable_cycles_survive() {
    let mut runtime = manual_runtime();
    run(&mut runtime, "var keep = { name: 'kept' }; keep.self = keep; let list = [keep]; keep.list = list;");
    runtime.collect_garbage();
    assert_eq!(
        run(&mut runtime, "keep.self === keep && list[0].name === 'kept' && keep.list === list"),
        JsValue::Bool(true)
    );
}

#[test]
fn test_closure_environments_survive() {
    let mut runtime = manual_runtime();
    run(&mut runtime, "function counter() { let n = 0; return () => ++n; } var next = counter(); next();");
    runtime.collect_garbage();
    assert_eq!(run(&mut runtime, "next(); next()"), JsValue::from(3));
}

#[test]
fn test_closure_cycles_are_collected() {
    let mut runtime = manual_runtime();
    run(&mut runtime, "function mk() { const o = {}; o.f = () => o; } for (let i = 0; i < 50; i++) mk();");
    assert!(runtime.collect_garbage() >= 100);
}

#[test]
fn test_host_held_values_survive() {
    let mut runtime = manual_runtime();
    let obj = runtime.new_object();
    assert!(runtime.set("hostObj", JsValue::Object(obj.clone())).is_ok());
    run(&mut runtime, "hostObj.self = hostObj; hostObj.tag = 'live'; delete globalThis.hostObj;");
    runtime.collect_garbage();
    assert!(obj.borrow().get_own(&esrun::PropertyKey::from("tag")).is_some());
}

#[test]
fn test_stats_track_collections() {
    let mut runtime = manual_runtime();
    let before = runtime.gc_stats();
    run(&mut runtime, "(function () { const a = []; a.push(a); })();");
    let freed = runtime.collect_garbage();
    let after = runtime.gc_stats();
    assert_eq!(after.collections, before.collections + 1);
    assert_eq!(after.last_freed, freed);
    assert_eq!(after.total_freed, before.total_freed + freed);
    assert!(after.tracked_objects > 0);
}

#[test]
fn test_threshold_triggers_collection() {
    let mut runtime = Runtime::with_options(RuntimeOptions::new().gc_threshold(50).console(false));
    run(
        &mut runtime,
        "function mk() { const o = {}; o.self = o; } for (let i = 0; i < 500; i++) mk();",
    );
    let stats = runtime.gc_stats();
    assert!(stats.collections > 0);
    assert!(stats.total_freed > 0);
}

#[test]
fn test_collected_objects_stay_consistent() {
    let mut runtime = Runtime::with_options(RuntimeOptions::new().gc_threshold(1).console(false));
    let src = r#"
        const m = new Map();
        for (let i = 0; i < 20; i++) {
            const node = { i };
            node.self = node;
            if (i % 2 === 0) m.set(i, node);
        }
        let sum = 0;
        for (const [k, v] of m) sum += v.self.i;
        sum
    "#;
    assert_eq!(run(&mut runtime, src), JsValue::from(90));
}

#[test]
fn test_generators_survive_collection() {
    let mut runtime = manual_runtime();
    run(&mut runtime, "function* g() { const o = {}; o.o = o; yield 1; yield o.o === o; } var it = g(); it.next();");
    runtime.collect_garbage();
    assert_eq!(run(&mut runtime, "it.next().value"), JsValue::Bool(true));
}
