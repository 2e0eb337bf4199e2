//! Generator tests

use super::{eval, throws_error};
use esrun::JsValue;

#[test]
fn test_basic_generator() {
    assert_eq!(
        eval("function* g() { yield 1; yield 2; return 3; } const it = g(); [it.next().value, it.next().value, it.next().value, it.next().done].join()"),
        JsValue::from("1,2,3,true")
    );
}

#[test]
fn test_generator_is_lazy() {
    assert_eq!(
        eval("let started = false; function* g() { started = true; yield 1; } const it = g(); started"),
        JsValue::Bool(false)
    );
}

#[test]
fn test_next_passes_values_in() {
    assert_eq!(
        eval("function* g() { const a = yield 'first'; const b = yield a * 2; return a + b; } const it = g(); it.next(); it.next(5); it.next(10).value"),
        JsValue::from(15)
    );
}

#[test]
fn test_spread_and_for_of() {
    assert_eq!(eval("function* g() { yield* [1, 2]; yield 3; } [...g()].join()"), JsValue::from("1,2,3"));
    assert_eq!(
        eval("function* range(n) { for (let i = 0; i < n; i++) yield i; } let s = 0; for (const x of range(5)) s += x; s"),
        JsValue::from(10)
    );
}

#[test]
fn test_yield_star_delegates_return_value() {
    assert_eq!(
        eval("function* inner() { yield 1; return 'done'; } function* outer() { const r = yield* inner(); yield r; } [...outer()].join()"),
        JsValue::from("1,done")
    );
}

#[test]
fn test_return_runs_finally() {
    assert_eq!(
        eval("let cleaned = false; function* g() { try { yield 1; yield 2; } finally { cleaned = true; } } const it = g(); it.next(); const r = it.return(9); [r.value, r.done, cleaned].join()"),
        JsValue::from("9,true,true")
    );
}

#[test]
fn test_throw_into_generator() {
    assert_eq!(
        eval("function* g() { try { yield 1; } catch (e) { yield 'caught ' + e; } } const it = g(); it.next(); it.throw('boom').value"),
        JsValue::from("caught boom")
    );
    assert!(throws_error("function* g() { yield 1; } const it = g(); it.throw(new Error('unhandled'))", "unhandled"));
}

#[test]
fn test_return_before_start() {
    assert_eq!(
        eval("function* g() { yield 1; } const it = g(); const r = it.return(4); [r.value, r.done, it.next().done].join()"),
        JsValue::from("4,true,true")
    );
}

#[test]
fn test_generator_reentry_throws() {
    assert!(throws_error("function* g() { it.next(); yield 1; } const it = g(); it.next();", "TypeError"));
}

#[test]
fn test_generator_methods_and_this() {
    assert_eq!(
        eval("const o = { items: [3, 4], *each() { for (const x of this.items) yield x * 10; } }; [...o.each()].join()"),
        JsValue::from("30,40")
    );
}

#[test]
fn test_infinite_generator_with_break() {
    assert_eq!(
        eval("function* nat() { let n = 0; while (true) yield n++; } let last; for (const n of nat()) { if (n > 100) break; last = n; } last"),
        JsValue::from(100)
    );
}

#[test]
fn test_generator_prototype_chain() {
    assert_eq!(
        eval("function* g() {} const it = g(); it[Symbol.iterator]() === it && Object.prototype.toString.call(it)"),
        JsValue::from("[object Generator]")
    );
    assert!(throws_error("function* g() {} new g()", "TypeError"));
}

#[test]
fn test_destructuring_from_generator() {
    assert_eq!(
        eval("function* g() { yield 'a'; yield 'b'; yield 'c'; } const [x, ...rest] = g(); x + rest.join('')"),
        JsValue::from("abc")
    );
}
