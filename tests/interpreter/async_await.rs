//! Async function tests. `eval` drains the microtask queue before
//! returning, so values assigned from continuations are visible.

use super::{create_test_runtime, eval, throws_error};
use esrun::JsValue;

#[test]
fn test_async_result_after_drain() {
    assert_eq!(
        eval("async function g() { return 1; } let v; g().then(x => v = x); v"),
        JsValue::Undefined
    );
    let mut runtime = create_test_runtime();
    let result = runtime.run_string("async function g() { return 1; } var v; g().then(x => v = x);");
    assert!(result.is_ok());
    assert_eq!(runtime.get("v").ok().flatten(), Some(JsValue::from(1)));
}

#[test]
fn test_await_sequencing() {
    let mut runtime = create_test_runtime();
    let src = r#"
        var log = [];
        async function f() {
            log.push('start');
            const x = await 10;
            log.push('after ' + x);
            return x * 2;
        }
        f().then(v => log.push('result ' + v));
        log.push('sync end');
    "#;
    assert!(runtime.run_string(src).is_ok());
    assert_eq!(
        runtime.run_string("log.join('|')").ok(),
        Some(JsValue::from("start|sync end|after 10|result 20"))
    );
}

#[test]
fn test_await_rejection_is_catchable() {
    let mut runtime = create_test_runtime();
    let src = r#"
        var out;
        async function f() {
            try { await Promise.reject(new Error('nope')); }
            catch (e) { return 'caught ' + e.message; }
        }
        f().then(v => out = v);
    "#;
    assert!(runtime.run_string(src).is_ok());
    assert_eq!(runtime.get("out").ok().flatten(), Some(JsValue::from("caught nope")));
}

#[test]
fn test_async_throw_rejects() {
    let mut runtime = create_test_runtime();
    let src = "var msg; async function f() { throw new TypeError('bad'); } f().catch(e => msg = e.name + ':' + e.message);";
    assert!(runtime.run_string(src).is_ok());
    assert_eq!(runtime.get("msg").ok().flatten(), Some(JsValue::from("TypeError:bad")));
}

#[test]
fn test_async_arrow_and_method() {
    let mut runtime = create_test_runtime();
    let src = r#"
        var total = 0;
        const add = async (a, b) => a + b;
        const o = { async twice(x) { return 2 * await add(x, 0); } };
        o.twice(21).then(v => total = v);
    "#;
    assert!(runtime.run_string(src).is_ok());
    assert_eq!(runtime.get("total").ok().flatten(), Some(JsValue::from(42)));
}

#[test]
fn test_await_thenable() {
    let mut runtime = create_test_runtime();
    let src = r#"
        var got;
        const thenable = { then(resolve) { resolve('from thenable'); } };
        (async () => { got = await thenable; })();
    "#;
    assert!(runtime.run_string(src).is_ok());
    assert_eq!(runtime.get("got").ok().flatten(), Some(JsValue::from("from thenable")));
}

#[test]
fn test_await_in_loop() {
    let mut runtime = create_test_runtime();
    let src = r#"
        var sum = 0;
        async function f() { for (let i = 1; i <= 4; i++) sum += await Promise.resolve(i); }
        f();
    "#;
    assert!(runtime.run_string(src).is_ok());
    assert_eq!(runtime.get("sum").ok().flatten(), Some(JsValue::from(10)));
}

#[test]
fn test_async_finally_runs() {
    let mut runtime = create_test_runtime();
    let src = r#"
        var log = [];
        async function f() {
            try { await null; throw 'x'; }
            finally { log.push('finally'); }
        }
        f().catch(e => log.push('caught ' + e));
    "#;
    assert!(runtime.run_string(src).is_ok());
    assert_eq!(runtime.run_string("log.join()").ok(), Some(JsValue::from("finally,caught x")));
}

#[test]
fn test_await_outside_async_is_syntax_error() {
    assert!(throws_error("function f() { await 1; }", "SyntaxError"));
}

#[test]
fn test_async_function_returns_promise() {
    assert_eq!(eval("async function f() {} f() instanceof Promise"), JsValue::Bool(true));
    assert_eq!(
        eval("async function f() {} Object.prototype.toString.call(f)"),
        JsValue::from("[object AsyncFunction]")
    );
}
