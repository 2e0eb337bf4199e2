//! Global object and global function tests

use super::{create_test_runtime, eval, throws_error};
use esrun::JsValue;

#[test]
fn test_global_this() {
    assert_eq!(eval("typeof globalThis"), JsValue::from("object"));
    assert_eq!(eval("var shared = 5; globalThis.shared"), JsValue::from(5));
    assert_eq!(eval("globalThis.fromProperty = 'x'; fromProperty"), JsValue::from("x"));
    assert_eq!(eval("let hidden = 1; globalThis.hidden"), JsValue::Undefined);
    assert_eq!(eval("globalThis.globalThis === globalThis"), JsValue::Bool(true));
    assert_eq!(eval("function declared() {} typeof globalThis.declared"), JsValue::from("function"));
}

#[test]
fn test_global_value_properties() {
    assert_eq!(eval("Number.isNaN(NaN)"), JsValue::Bool(true));
    assert_eq!(eval("Infinity > 1e308"), JsValue::Bool(true));
    assert_eq!(eval("undefined = 1; undefined"), JsValue::Undefined);
    assert_eq!(eval("Object.getOwnPropertyDescriptor(globalThis, 'NaN').writable"), JsValue::Bool(false));
}

#[test]
fn test_encode_uri_component() {
    assert_eq!(eval("encodeURIComponent('a b&c=d')"), JsValue::from("a%20b%26c%3Dd"));
    assert_eq!(eval("encodeURIComponent('€')"), JsValue::from("%E2%82%AC"));
    assert_eq!(eval("encodeURIComponent('😀')"), JsValue::from("%F0%9F%98%80"));
    assert_eq!(eval("encodeURIComponent(\"-_.!~*'()\")"), JsValue::from("-_.!~*'()"));
    assert!(throws_error("encodeURIComponent('\\uD800')", "URIError"));
}

#[test]
fn test_encode_uri_keeps_reserved() {
    assert_eq!(
        eval("encodeURI('http://x.com/a b?q=1&r=ü#frag')"),
        JsValue::from("http://x.com/a%20b?q=1&r=%C3%BC#frag")
    );
}

#[test]
fn test_decode() {
    assert_eq!(eval("decodeURIComponent('a%20b%26c')"), JsValue::from("a b&c"));
    assert_eq!(eval("decodeURIComponent('%E2%82%AC')"), JsValue::from("€"));
    assert_eq!(eval("decodeURI('%23%20')"), JsValue::from("%23 "));
    assert_eq!(eval("decodeURIComponent('%23')"), JsValue::from("#"));
    assert!(throws_error("decodeURIComponent('%E2%82')", "URIError"));
    assert!(throws_error("decodeURIComponent('%zz')", "URIError"));
}

#[test]
fn test_queue_microtask_order() {
    let mut runtime = create_test_runtime();
    let src = r#"
        var log = [];
        queueMicrotask(() => log.push('micro'));
        Promise.resolve().then(() => log.push('promise'));
        log.push('sync');
    "#;
    assert!(runtime.run_string(src).is_ok());
    assert_eq!(runtime.run_string("log.join()").ok(), Some(JsValue::from("sync,micro,promise")));
}

#[test]
fn test_queue_microtask_requires_callable() {
    assert!(throws_error("queueMicrotask(1)", "TypeError"));
}

#[test]
fn test_microtask_error_does_not_stop_queue() {
    let mut runtime = create_test_runtime();
    let src = "var after = false; queueMicrotask(() => { throw new Error('late'); }); queueMicrotask(() => { after = true; }); 'done'";
    assert_eq!(runtime.run_string(src).ok(), Some(JsValue::from("done")));
    assert_eq!(runtime.get("after").ok().flatten(), Some(JsValue::Bool(true)));
}

#[test]
fn test_globals_persist_between_runs() {
    let mut runtime = create_test_runtime();
    assert!(runtime.run_string("var counter = 1; let lexical = 10; function bump() { counter++; lexical++; }").is_ok());
    assert!(runtime.run_string("bump(); bump();").is_ok());
    assert_eq!(runtime.run_string("counter + lexical").ok(), Some(JsValue::from(15)));
}

#[test]
fn test_redeclared_lexical_global() {
    let mut runtime = create_test_runtime();
    assert!(runtime.run_string("let once = 1;").is_ok());
    let again = runtime.run_string("let once = 2;");
    assert!(again.is_err_and(|e| e.to_string().contains("SyntaxError")));
}
