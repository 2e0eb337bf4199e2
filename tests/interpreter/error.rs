//! Error object tests and the host-facing error bands

use super::{create_test_runtime, eval, eval_result, throws_error};
use esrun::{JsError, JsValue};

#[test]
fn test_error_properties() {
    assert_eq!(eval("new Error('boom').message"), JsValue::from("boom"));
    assert_eq!(eval("new TypeError('t').name"), JsValue::from("TypeError"));
    assert_eq!(eval("String(new RangeError('r'))"), JsValue::from("RangeError: r"));
    assert_eq!(eval("String(new Error())"), JsValue::from("Error"));
    assert_eq!(eval("Error('no new') instanceof Error"), JsValue::Bool(true));
    assert_eq!(eval("new URIError('u') instanceof Error"), JsValue::Bool(true));
    assert_eq!(eval("Object.keys(new Error('x')).length"), JsValue::from(0));
}

#[test]
fn test_error_cause() {
    assert_eq!(eval("new Error('outer', { cause: 'inner' }).cause"), JsValue::from("inner"));
    assert_eq!(eval("'cause' in new Error('x', {})"), JsValue::Bool(false));
}

#[test]
fn test_aggregate_error() {
    assert_eq!(
        eval("const e = new AggregateError([1, 2], 'many'); e.errors.length + ':' + e.message"),
        JsValue::from("2:many")
    );
}

#[test]
fn test_error_to_string_generic() {
    assert_eq!(
        eval("Error.prototype.toString.call({ name: 'Custom', message: 'msg' })"),
        JsValue::from("Custom: msg")
    );
    assert_eq!(eval("Error.prototype.toString.call({ message: 'only' })"), JsValue::from("Error: only"));
}

#[test]
fn test_engine_errors_have_messages() {
    assert!(throws_error("null.prop", "TypeError"));
    assert!(throws_error("missingVariable", "ReferenceError: missingVariable is not defined"));
    assert!(throws_error("decodeURIComponent('%')", "URIError"));
    assert!(throws_error("(1).toFixed(101)", "RangeError"));
}

#[test]
fn test_syntax_error_reports_position() {
    let Err(JsError::Parse(errors)) = eval_result("let a = 1;\nlet = = 2;") else {
        panic!("expected a syntax error");
    };
    let Some(first) = errors.first() else {
        panic!("no errors");
    };
    assert_eq!(first.source_name, "<eval>");
    assert_eq!(first.line, 2);
}

#[test]
fn test_uncaught_exception_carries_value() {
    let Err(JsError::Exception(exc)) = eval_result("throw { code: 42 }") else {
        panic!("expected an exception");
    };
    let JsValue::Object(obj) = &exc.value else {
        panic!("expected the thrown object");
    };
    assert!(obj.borrow().get_own(&esrun::PropertyKey::from("code")).is_some());
}

#[test]
fn test_uncaught_error_message() {
    let Err(JsError::Exception(exc)) = eval_result("function fail() { throw new TypeError('bad input'); }\nfail();") else {
        panic!("expected an exception");
    };
    assert_eq!(exc.message, "TypeError: bad input");
    let text = exc.to_string();
    assert!(text.starts_with("TypeError: bad input\n    at fail (<eval>:1:"), "{text}");
}

#[test]
fn test_stack_overflow_is_uncatchable() {
    let result = eval_result("function r() { return 1 + r(); } try { r(); } catch (e) { 'caught'; }");
    assert!(matches!(result, Err(JsError::StackOverflow { .. })));
}

#[test]
fn test_native_recursion_overflows_cleanly() {
    let cases = [
        "let a = []; for (let i = 0; i < 5000; i++) a = [a]; JSON.stringify(a)",
        "let s = '1'; for (let i = 0; i < 5000; i++) s = '[' + s + ']'; JSON.parse(s)",
        "let p = {}; for (let i = 0; i < 3000; i++) p = new Proxy(p, {}); p.x",
        "let f = () => 1; for (let i = 0; i < 3000; i++) { f = f.bind(null); Object.defineProperty(f, 'name', { value: '' }); } f()",
        "const p = new Proxy({}, { get(t, k, r) { return r[k]; } }); p.x",
        "function f() { return [1].map(f); } f()",
        "const o = { toString() { return String(o); } }; String(o)",
        "const a = [1]; a.push(a); a.flat(Infinity)",
    ];
    for src in cases {
        let result = eval_result(src);
        assert!(matches!(result, Err(JsError::StackOverflow { .. })), "{src}: {result:?}");
    }
}

#[test]
fn test_moderate_native_nesting_succeeds() {
    assert_eq!(
        eval("let a = 1; for (let i = 0; i < 500; i++) a = [a]; JSON.stringify(a).length"),
        JsValue::from(1001)
    );
    assert_eq!(
        eval("let p = { x: 7 }; for (let i = 0; i < 500; i++) p = new Proxy(p, {}); p.x"),
        JsValue::from(7)
    );
    assert_eq!(eval("let d = '0'; for (let i = 0; i < 500; i++) d = '[' + d + ']'; JSON.parse(d).flat(Infinity)[0]"), JsValue::from(0));
}

#[test]
fn test_long_object_chains_are_released() {
    assert_eq!(
        eval("let a = []; for (let i = 0; i < 100000; i++) a = [a]; a = null; 'released'"),
        JsValue::from("released")
    );
}

#[test]
fn test_runtime_recovers_after_stack_overflow() {
    let mut runtime = create_test_runtime();
    runtime.set_max_call_stack_size(50);
    let overflow = runtime.run_string("function deep(n) { return n === 0 ? 0 : 1 + deep(n - 1); } deep(100)");
    assert!(matches!(overflow, Err(JsError::StackOverflow { .. })));
    assert_eq!(runtime.run_string("deep(10)").ok(), Some(JsValue::from(10)));
}

#[test]
fn test_error_stack_property() {
    let src = "function inner() { return new Error('trace'); }\nfunction outer() { const e = inner(); return e; }\nouter().stack";
    let JsValue::String(stack) = eval(src) else {
        panic!("expected a string stack");
    };
    let stack = stack.to_string();
    let mut lines = stack.lines();
    assert_eq!(lines.next(), Some("Error: trace"));
    assert!(lines.next().is_some_and(|l| l.starts_with("    at inner (<eval>:1:")), "{stack}");
    assert!(lines.next().is_some_and(|l| l.starts_with("    at outer (<eval>:2:")), "{stack}");
}
