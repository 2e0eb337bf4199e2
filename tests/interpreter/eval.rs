//! Global `eval`. Every call evaluates in the global scope.

use super::{eval, throws_error};
use esrun::JsValue;

#[test]
fn test_eval_returns_completion_value() {
    assert_eq!(eval("eval('1 + 2')"), JsValue::from(3));
    assert_eq!(eval("eval('if (true) { \"yes\"; } else { \"no\"; }')"), JsValue::from("yes"));
    assert_eq!(eval("eval('')"), JsValue::Undefined);
    assert_eq!(eval("eval('var unused = 1;')"), JsValue::Undefined);
}

#[test]
fn test_non_string_argument_is_returned() {
    assert_eq!(eval("eval(42)"), JsValue::from(42));
    assert_eq!(eval("const o = {}; eval(o) === o"), JsValue::Bool(true));
    assert_eq!(eval("eval()"), JsValue::Undefined);
}

#[test]
fn test_var_declarations_become_globals() {
    assert_eq!(eval("eval('var fromEval = 7'); fromEval"), JsValue::from(7));
    assert_eq!(eval("eval('function made() { return 3; }'); made()"), JsValue::from(3));
}

#[test]
fn test_sees_globals_not_locals() {
    assert_eq!(eval("var g = 'global'; eval('g')"), JsValue::from("global"));
    assert_eq!(
        eval("function f() { var local = 1; return eval('typeof local'); } f()"),
        JsValue::from("undefined")
    );
    assert_eq!(
        eval("var shadow = 'outer'; function f() { var shadow = 'inner'; return eval('shadow'); } f()"),
        JsValue::from("outer")
    );
}

#[test]
fn test_syntax_errors_are_catchable() {
    assert_eq!(
        eval("try { eval('let = ;'); } catch (e) { e instanceof SyntaxError; }"),
        JsValue::Bool(true)
    );
    assert!(throws_error("eval('}')", "SyntaxError"));
}

#[test]
fn test_runtime_errors_propagate() {
    assert_eq!(
        eval("try { eval('null.x'); } catch (e) { e.constructor.name; }"),
        JsValue::from("TypeError")
    );
}

#[test]
fn test_nested_eval() {
    assert_eq!(eval("eval('eval(\"2 * 21\")')"), JsValue::from(42));
}

#[test]
fn test_eval_through_alias() {
    assert_eq!(eval("const e = eval; e('typeof e')"), JsValue::from("function"));
    assert_eq!(eval("(0, eval)('this') === globalThis"), JsValue::Bool(true));
}
