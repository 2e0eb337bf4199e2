//! Strict and sloppy mode differences

use super::{create_test_runtime, eval, eval_result, throws_error};
use esrun::{JsError, JsValue};

#[test]
fn test_undeclared_assignment() {
    assert_eq!(eval("implicitGlobal = 3; globalThis.implicitGlobal"), JsValue::from(3));
    assert!(throws_error("'use strict'; notDeclared = 3;", "ReferenceError"));
    assert!(throws_error("function f() { 'use strict'; alsoMissing = 1; } f();", "ReferenceError"));
}

#[test]
fn test_this_in_plain_calls() {
    assert_eq!(eval("function f() { return this; } f() === globalThis"), JsValue::Bool(true));
    assert_eq!(eval("'use strict'; function f() { return this; } f()"), JsValue::Undefined);
    assert_eq!(eval("function f() { 'use strict'; return typeof this; } f.call(5)"), JsValue::from("number"));
    assert_eq!(eval("function f() { return typeof this; } f.call(5)"), JsValue::from("object"));
}

#[test]
fn test_frozen_writes() {
    assert_eq!(eval("const o = Object.freeze({ a: 1 }); o.a = 2; o.a"), JsValue::from(1));
    assert!(throws_error("'use strict'; const o = Object.freeze({ a: 1 }); o.a = 2;", "TypeError"));
    assert!(throws_error("'use strict'; const o = Object.freeze({}); o.added = 1;", "TypeError"));
    assert!(throws_error("'use strict'; const o = { get only() { return 1; } }; o.only = 2;", "TypeError"));
}

#[test]
fn test_delete_non_configurable() {
    assert_eq!(eval("delete Object.prototype"), JsValue::Bool(false));
    assert!(throws_error("'use strict'; delete Object.prototype;", "TypeError"));
}

#[test]
fn test_read_only_globals() {
    assert_eq!(eval("NaN = 1; Number.isNaN(NaN)"), JsValue::Bool(true));
    assert!(throws_error("'use strict'; Infinity = 1;", "TypeError"));
}

#[test]
fn test_classes_are_strict() {
    assert!(throws_error("class A { m() { leaked = 1; } } new A().m();", "ReferenceError"));
}

#[test]
fn test_early_errors() {
    for src in [
        "'use strict'; var eval = 1;",
        "'use strict'; with ({}) {}",
        "function f(a, a) { 'use strict'; }",
        "'use strict'; 010",
        "'use strict'; var x; delete x;",
        "'use strict'; let static = 1;",
    ] {
        assert!(matches!(eval_result(src), Err(JsError::Parse(_))), "{src}");
    }
}

#[test]
fn test_sloppy_with_statement() {
    assert_eq!(eval("const o = { a: 1 }; let r; with (o) { r = a + 1; } r"), JsValue::from(2));
}

#[test]
fn test_compile_strict_flag() {
    let runtime = create_test_runtime();
    let sloppy = runtime.compile("s.js", "undeclaredSloppy = 1", false);
    let strict = runtime.compile("s.js", "undeclaredStrict = 1", true);
    assert!(sloppy.is_ok_and(|p| !p.is_strict()));
    assert!(strict.is_ok_and(|p| p.is_strict()));

    let mut runtime = create_test_runtime();
    let Ok(program) = runtime.compile("s.js", "undeclaredStrict = 1", true) else {
        panic!("compile failed");
    };
    assert!(runtime.run(&program).is_err_and(|e| e.to_string().contains("ReferenceError")));
    assert!(matches!(runtime.compile("w.js", "with ({}) {}", true), Err(JsError::Parse(_))));
}

#[test]
fn test_arguments_are_unmapped() {
    assert_eq!(eval("function f(a) { arguments[0] = 9; return a; } f(1)"), JsValue::from(1));
    assert_eq!(eval("function f(a) { a = 9; return arguments[0]; } f(1)"), JsValue::from(1));
}
