//! Proxy and Reflect tests

use super::{eval, throws_error};
use esrun::JsValue;

#[test]
fn test_get_trap() {
    assert_eq!(
        eval("const p = new Proxy({}, { get: (_, k) => k.toUpperCase() }); p.foo"),
        JsValue::from("FOO")
    );
}

#[test]
fn test_missing_traps_forward_to_target() {
    assert_eq!(
        eval("const t = { a: 1 }; const p = new Proxy(t, {}); p.b = 2; p.a + t.b + ('a' in p ? 10 : 0)"),
        JsValue::from(13)
    );
    assert_eq!(eval("const p = new Proxy([1, 2, 3], {}); p.length + p[2]"), JsValue::from(6));
}

#[test]
fn test_set_and_has_traps() {
    let src = r#"
        const log = [];
        const p = new Proxy({}, {
            set(t, k, v) { log.push('set ' + k); t[k] = v * 2; return true; },
            has(t, k) { log.push('has ' + k); return k.startsWith('x'); },
        });
        p.n = 5;
        const hasX = 'xyz' in p;
        log.join() + '|' + p.n + '|' + hasX
    "#;
    assert_eq!(eval(src), JsValue::from("set n,has xyz|10|true"));
}

#[test]
fn test_set_trap_returning_false_in_strict() {
    assert!(throws_error("'use strict'; const p = new Proxy({}, { set: () => false }); p.x = 1;", "TypeError"));
    assert_eq!(eval("const p = new Proxy({}, { set: () => false }); p.x = 1; p.x"), JsValue::Undefined);
}

#[test]
fn test_delete_and_own_keys_traps() {
    assert_eq!(
        eval("const p = new Proxy({ a: 1, b: 2 }, { ownKeys: () => ['b', 'a'] }); Object.keys(p).join()"),
        JsValue::from("b,a")
    );
    assert_eq!(
        eval("let deleted; const p = new Proxy({ a: 1 }, { deleteProperty(t, k) { deleted = k; return delete t[k]; } }); delete p.a; deleted"),
        JsValue::from("a")
    );
}

#[test]
fn test_apply_and_construct_traps() {
    assert_eq!(
        eval("const p = new Proxy(function (a) { return a; }, { apply: (t, thisArg, args) => t(...args) * 10 }); p(4)"),
        JsValue::from(40)
    );
    assert_eq!(
        eval("const P = new Proxy(class { constructor(v) { this.v = v; } }, { construct(t, args) { return new t(args[0] + 1); } }); new P(1).v"),
        JsValue::from(2)
    );
    assert_eq!(eval("typeof new Proxy(function () {}, {})"), JsValue::from("function"));
    assert_eq!(eval("typeof new Proxy({}, {})"), JsValue::from("object"));
}

#[test]
fn test_get_prototype_of_trap() {
    assert_eq!(
        eval("const p = new Proxy({}, { getPrototypeOf: () => Array.prototype }); p instanceof Array"),
        JsValue::Bool(true)
    );
}

#[test]
fn test_invariants_are_enforced() {
    let src = r#"
        const t = {};
        Object.defineProperty(t, 'fixed', { value: 1, writable: false, configurable: false });
        const p = new Proxy(t, { get: () => 2 });
        p.fixed
    "#;
    assert!(throws_error(src, "TypeError"));
    assert!(throws_error(
        "const t = Object.preventExtensions({ a: 1 }); const p = new Proxy(t, { ownKeys: () => [] }); Object.keys(p)",
        "TypeError"
    ));
}

#[test]
fn test_revocable() {
    assert_eq!(eval("const { proxy, revoke } = Proxy.revocable({ a: 1 }, {}); proxy.a"), JsValue::from(1));
    assert!(throws_error("const { proxy, revoke } = Proxy.revocable({ a: 1 }, {}); revoke(); proxy.a", "TypeError"));
    assert!(throws_error("const r = Proxy.revocable({}, {}); r.revoke(); 'x' in r.proxy", "TypeError"));
}

#[test]
fn test_proxy_requires_objects() {
    assert!(throws_error("new Proxy(1, {})", "TypeError"));
    assert!(throws_error("Proxy({}, {})", "TypeError"));
}

#[test]
fn test_proxy_of_proxy() {
    assert_eq!(
        eval("const inner = new Proxy({}, { get: (_, k) => 'inner:' + String(k) }); const outer = new Proxy(inner, {}); outer.z"),
        JsValue::from("inner:z")
    );
}

#[test]
fn test_reflect() {
    assert_eq!(eval("Reflect.has({ a: 1 }, 'a')"), JsValue::Bool(true));
    assert_eq!(eval("Reflect.ownKeys({ a: 1, [Symbol.iterator]: 0 }).length"), JsValue::from(2));
    assert_eq!(eval("Reflect.apply(Math.max, null, [1, 3, 2])"), JsValue::from(3));
    assert_eq!(eval("class A { constructor(x) { this.x = x; } } Reflect.construct(A, [7]).x"), JsValue::from(7));
    assert_eq!(eval("const o = {}; Reflect.defineProperty(o, 'k', { value: 1 }) && o.k"), JsValue::from(1));
    assert_eq!(eval("const o = Object.freeze({ a: 1 }); Reflect.set(o, 'a', 2)"), JsValue::Bool(false));
    assert_eq!(
        eval("const o = { get v() { return this.n; } }; Reflect.get(o, 'v', { n: 'receiver' })"),
        JsValue::from("receiver")
    );
    assert!(throws_error("Reflect.get(1, 'a')", "TypeError"));
}
