//! Promise tests: job ordering and combinators

use super::{create_test_runtime, eval};
use esrun::JsValue;

/// Run `src`, then evaluate `expr` in the same runtime
fn settle(src: &str, expr: &str) -> JsValue {
    let mut runtime = create_test_runtime();
    if let Err(e) = runtime.run_string(src) {
        panic!("script failed: {e}");
    }
    match runtime.run_string(expr) {
        Ok(v) => v,
        Err(e) => panic!("expression failed: {e}"),
    }
}

#[test]
fn test_microtask_ordering() {
    let src = r#"
        var order = [];
        Promise.resolve().then(() => order.push('A')).then(() => order.push('B'));
        Promise.resolve().then(() => order.push('C'));
    "#;
    assert_eq!(settle(src, "order.join()"), JsValue::from("A,C,B"));
}

#[test]
fn test_then_runs_after_sync_code() {
    let src = "var log = []; Promise.resolve().then(() => log.push('job')); log.push('sync');";
    assert_eq!(settle(src, "log.join()"), JsValue::from("sync,job"));
}

#[test]
fn test_executor_runs_synchronously() {
    assert_eq!(eval("let ran = false; new Promise(() => { ran = true; }); ran"), JsValue::Bool(true));
}

#[test]
fn test_resolve_with_promise_adopts_state() {
    let src = "var v; new Promise(r => r(Promise.resolve(7))).then(x => v = x);";
    assert_eq!(settle(src, "v"), JsValue::from(7));
}

#[test]
fn test_chaining_and_catch() {
    let src = r#"
        var result;
        Promise.resolve(1)
            .then(x => { throw new Error('at ' + x); })
            .then(() => 'skipped')
            .catch(e => e.message)
            .then(m => result = m);
    "#;
    assert_eq!(settle(src, "result"), JsValue::from("at 1"));
}

#[test]
fn test_finally_passes_value_through() {
    let src = "var r, ran = false; Promise.resolve(5).finally(() => { ran = true; return 99; }).then(v => r = v);";
    assert_eq!(settle(src, "[r, ran].join()"), JsValue::from("5,true"));
}

#[test]
fn test_promise_all() {
    let src = "var r; Promise.all([1, Promise.resolve(2), new Promise(res => res(3))]).then(v => r = v.join());";
    assert_eq!(settle(src, "r"), JsValue::from("1,2,3"));
    let src = "var r; Promise.all([Promise.resolve(1), Promise.reject('bad')]).catch(e => r = e);";
    assert_eq!(settle(src, "r"), JsValue::from("bad"));
    let src = "var r; Promise.all([]).then(v => r = v.length);";
    assert_eq!(settle(src, "r"), JsValue::from(0));
}

#[test]
fn test_promise_all_settled() {
    let src = r#"
        var r;
        Promise.allSettled([Promise.resolve(1), Promise.reject('no')])
            .then(rs => r = rs.map(x => x.status + ':' + (x.value ?? x.reason)).join());
    "#;
    assert_eq!(settle(src, "r"), JsValue::from("fulfilled:1,rejected:no"));
}

#[test]
fn test_promise_race_and_any() {
    let src = "var r; Promise.race([new Promise(() => {}), Promise.resolve('fast')]).then(v => r = v);";
    assert_eq!(settle(src, "r"), JsValue::from("fast"));
    let src = "var r; Promise.any([Promise.reject(1), Promise.resolve(2)]).then(v => r = v);";
    assert_eq!(settle(src, "r"), JsValue::from(2));
    let src = "var r; Promise.any([Promise.reject(1)]).catch(e => r = e.constructor.name + ':' + e.errors.length);";
    assert_eq!(settle(src, "r"), JsValue::from("AggregateError:1"));
}

#[test]
fn test_resolve_functions_are_one_shot() {
    let src = "var r; new Promise((res, rej) => { res('first'); res('second'); rej('third'); }).then(v => r = v);";
    assert_eq!(settle(src, "r"), JsValue::from("first"));
}

#[test]
fn test_executor_throw_rejects() {
    let src = "var r; new Promise(() => { throw 'thrown'; }).catch(e => r = e);";
    assert_eq!(settle(src, "r"), JsValue::from("thrown"));
}

#[test]
fn test_self_resolution_is_type_error() {
    let src = "var r; const p = new Promise(res => setTimeoutLike(() => res(p))); function setTimeoutLike(f) { Promise.resolve().then(f); } p.catch(e => r = e instanceof TypeError);";
    assert_eq!(settle(src, "r"), JsValue::Bool(true));
}

#[test]
fn test_queue_microtask() {
    let src = "var log = []; queueMicrotask(() => log.push('micro')); Promise.resolve().then(() => log.push('then')); log.push('sync');";
    assert_eq!(settle(src, "log.join()"), JsValue::from("sync,micro,then"));
}

#[test]
fn test_promise_with_resolvers() {
    let src = "var r; const { promise, resolve } = Promise.withResolvers(); promise.then(v => r = v); resolve('ok');";
    assert_eq!(settle(src, "r"), JsValue::from("ok"));
}

#[test]
fn test_jobs_run_when_script_throws() {
    let mut runtime = create_test_runtime();
    let result = runtime.run_string("var ran = false; Promise.resolve().then(() => { ran = true; }); throw new Error('late');");
    assert!(result.is_err());
    assert_eq!(runtime.get("ran").ok().flatten(), Some(JsValue::Bool(true)));
}
