//! Function tests: closures, arguments, this binding, bind/call/apply

use super::{eval, throws_error};
use esrun::JsValue;

#[test]
fn test_square() {
    assert_eq!(eval("function f(x) { return x * x; } f(7)"), JsValue::from(49));
}

#[test]
fn test_recursion() {
    assert_eq!(
        eval("function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); } fib(20)"),
        JsValue::from(6765)
    );
}

#[test]
fn test_closures_capture_bindings() {
    assert_eq!(
        eval("function counter() { let n = 0; return () => ++n; } const c = counter(); c(); c(); c()"),
        JsValue::from(3)
    );
    assert_eq!(
        eval("const a = counter(), b = counter(); a(); a(); function counter() { let n = 0; return () => ++n; } b()"),
        JsValue::from(1)
    );
}

#[test]
fn test_default_parameters() {
    assert_eq!(eval("function f(a, b = a + 1) { return b; } f(1)"), JsValue::from(2));
    assert_eq!(eval("function f(a = 5) { return a; } f(undefined)"), JsValue::from(5));
    assert_eq!(eval("function f(a = 5) { return a; } f(null)"), JsValue::Null);
    assert_eq!(eval("function f(a, b = 2, c) {} f.length"), JsValue::from(1));
}

#[test]
fn test_rest_parameters() {
    assert_eq!(eval("function f(a, ...r) { return r.length; } f(1, 2, 3)"), JsValue::from(2));
    assert_eq!(eval("function f(...r) { return Array.isArray(r); } f()"), JsValue::Bool(true));
    assert_eq!(eval("((...args) => args.join('-'))(1, 2)"), JsValue::from("1-2"));
}

#[test]
fn test_arguments_object() {
    assert_eq!(eval("function f() { return arguments.length; } f(1, 2, 3)"), JsValue::from(3));
    assert_eq!(eval("function f() { return arguments[1]; } f('a', 'b')"), JsValue::from("b"));
    assert_eq!(
        eval("function f() { return Array.prototype.slice.call(arguments).join(); } f(1, 2)"),
        JsValue::from("1,2")
    );
    assert_eq!(
        eval("function f() { return [...arguments].length; } f(1, 2)"),
        JsValue::from(2)
    );
}

#[test]
fn test_this_binding() {
    assert_eq!(eval("const o = { v: 1, get() { return this.v; } }; o.get()"), JsValue::from(1));
    assert_eq!(
        eval("const o = { v: 2, get() { return (() => this.v)(); } }; o.get()"),
        JsValue::from(2)
    );
    assert_eq!(eval("function f() { return this; } f() === globalThis"), JsValue::Bool(true));
    assert_eq!(eval("'use strict'; function f() { return this; } f()"), JsValue::Undefined);
}

#[test]
fn test_call_apply_bind() {
    assert_eq!(eval("function f(a, b) { return this.x + a + b; } f.call({ x: 1 }, 2, 3)"), JsValue::from(6));
    assert_eq!(eval("function f(a, b) { return this.x + a + b; } f.apply({ x: 1 }, [2, 3])"), JsValue::from(6));
    assert_eq!(
        eval("function f(a, b) { return this.x + a + b; } const g = f.bind({ x: 10 }, 1); g(2)"),
        JsValue::from(13)
    );
    assert_eq!(eval("function f(a, b, c) {} f.bind(null, 1).length"), JsValue::from(2));
    assert_eq!(eval("function named() {} named.bind(null).name"), JsValue::from("bound named"));
}

#[test]
fn test_bound_constructor() {
    assert_eq!(
        eval("function P(x, y) { this.s = x + y; } const B = P.bind(null, 1); const p = new B(2); p.s + (p instanceof P ? 10 : 0)"),
        JsValue::from(13)
    );
}

#[test]
fn test_function_names() {
    assert_eq!(eval("function foo() {} foo.name"), JsValue::from("foo"));
    assert_eq!(eval("const bar = () => {}; bar.name"), JsValue::from("bar"));
    assert_eq!(eval("const o = { baz() {} }; o.baz.name"), JsValue::from("baz"));
    assert_eq!(eval("const o = { get q() { return 1; } }; Object.getOwnPropertyDescriptor(o, 'q').get.name"), JsValue::from("get q"));
    assert_eq!(eval("const s = Symbol('desc'); const o = { [s]() {} }; o[s].name"), JsValue::from("[desc]"));
}

#[test]
fn test_new_target() {
    assert_eq!(eval("function F() { return new.target === F; } new F() instanceof F"), JsValue::Bool(true));
    assert_eq!(eval("let t; function F() { t = new.target === F; } new F(); t"), JsValue::Bool(true));
    assert_eq!(eval("function F() { return new.target; } F()"), JsValue::Undefined);
}

#[test]
fn test_constructor_return_override() {
    assert_eq!(eval("function F() { this.a = 1; return { a: 2 }; } new F().a"), JsValue::from(2));
    assert_eq!(eval("function F() { this.a = 1; return 5; } new F().a"), JsValue::from(1));
}

#[test]
fn test_arrow_functions_are_not_constructors() {
    assert!(throws_error("const A = () => {}; new A();", "TypeError"));
    assert!(throws_error("const o = { m() {} }; new o.m();", "TypeError"));
}

#[test]
fn test_calling_non_function() {
    assert!(throws_error("const x = 1; x();", "TypeError"));
    assert!(throws_error("const o = {}; o.missing();", "TypeError"));
    assert!(throws_error("undefined.foo", "TypeError"));
}

#[test]
fn test_function_constructor() {
    assert_eq!(eval("new Function('a', 'b', 'return a * b')(6, 7)"), JsValue::from(42));
    assert_eq!(eval("Function('return 1 + 1')()"), JsValue::from(2));
    assert!(throws_error("new Function('return (')", "SyntaxError"));
}

#[test]
fn test_function_to_string() {
    assert_eq!(
        eval("function add(a, b) { return a + b; } add.toString()"),
        JsValue::from("function add() { [native code] }")
    );
    assert_eq!(
        eval("Math.max.toString()"),
        JsValue::from("function max() { [native code] }")
    );
}

#[test]
fn test_iife_and_immediate_arrow() {
    assert_eq!(eval("(function() { return 'iife'; })()"), JsValue::from("iife"));
    assert_eq!(eval("(() => ({ a: 1 }))().a"), JsValue::from(1));
}

#[test]
fn test_higher_order() {
    assert_eq!(
        eval("const compose = (f, g) => x => f(g(x)); compose(x => x + 1, x => x * 2)(5)"),
        JsValue::from(11)
    );
    assert_eq!(
        eval("const curry = a => b => c => a + b + c; curry(1)(2)(3)"),
        JsValue::from(6)
    );
}

#[test]
fn test_deep_recursion_overflows() {
    assert!(throws_error("function r() { return 1 + r(); } r()", "Maximum call stack size exceeded"));
}

#[test]
fn test_named_function_expression_binding() {
    assert_eq!(
        eval("const f = function fact(n) { return n <= 1 ? 1 : n * fact(n - 1); }; f(5)"),
        JsValue::from(120)
    );
    assert_eq!(eval("const f = function inner() {}; typeof inner"), JsValue::from("undefined"));
}

#[test]
fn test_tail_calls_run_in_constant_frames() {
    assert_eq!(eval("function f(n) { return n === 0 ? 'done' : f(n - 1); } f(50000)"), JsValue::from("done"));
    assert_eq!(
        eval("const even = n => n === 0 ? true : odd(n - 1); const odd = n => n === 0 ? false : even(n - 1); even(100001)"),
        JsValue::Bool(false)
    );
    assert_eq!(
        eval("function sum(n, acc) { if (n === 0) return acc; return (sum(n - 1, acc + n)); } sum(100000, 0) === 5000050000"),
        JsValue::Bool(true)
    );
}

#[test]
fn test_tail_calls_keep_pending_work() {
    assert_eq!(
        eval("let log = []; function g() { return 1; } function f() { try { return g(); } finally { log.push('f'); } } f() + log.join()"),
        JsValue::from("1f")
    );
    assert_eq!(
        eval("function g() { throw new Error('x'); } function f() { try { return g(); } catch (e) { return 'caught'; } } f()"),
        JsValue::from("caught")
    );
    assert_eq!(eval("function g() { return 5; } function F() { this.x = 1; return g(); } new F().x"), JsValue::from(1));
    assert_eq!(eval("function g(a, b) { return a + b; } function f() { return g.apply(null, [2, 3]); } f()"), JsValue::from(5));
}
