//! Object tests: property descriptors, prototypes, integrity levels

use super::{eval, throws_error};
use esrun::JsValue;

#[test]
fn test_literal_and_access() {
    assert_eq!(eval("const o = { a: 1, 'b-c': 2, 3: 'three' }; o.a + o['b-c']"), JsValue::from(3));
    assert_eq!(eval("const o = { 3: 'three' }; o[3] + o['3']"), JsValue::from("threethree"));
    assert_eq!(eval("const a = 1, b = 2; const o = { a, b }; o.a + o.b"), JsValue::from(3));
    assert_eq!(eval("({}).missing"), JsValue::Undefined);
}

#[test]
fn test_non_writable_property_keeps_value() {
    let src = r#"
        const o = {};
        Object.defineProperty(o, 'k', { value: 1, writable: false, configurable: true, enumerable: true });
        o.k = 2;
        o.k
    "#;
    assert_eq!(eval(src), JsValue::from(1));
    let strict = r#"
        'use strict';
        const o = {};
        Object.defineProperty(o, 'k', { value: 1, writable: false });
        o.k = 2;
    "#;
    assert!(throws_error(strict, "TypeError"));
}

#[test]
fn test_define_property_defaults() {
    assert_eq!(
        eval("const o = {}; Object.defineProperty(o, 'x', { value: 1 }); const d = Object.getOwnPropertyDescriptor(o, 'x'); [d.writable, d.enumerable, d.configurable].join()"),
        JsValue::from("false,false,false")
    );
    assert_eq!(
        eval("const d = Object.getOwnPropertyDescriptor({ x: 1 }, 'x'); [d.writable, d.enumerable, d.configurable].join()"),
        JsValue::from("true,true,true")
    );
    assert!(throws_error(
        "const o = {}; Object.defineProperty(o, 'x', { value: 1 }); Object.defineProperty(o, 'x', { value: 2 });",
        "TypeError"
    ));
    assert!(throws_error("Object.defineProperty({}, 'x', { get() {}, value: 1 })", "TypeError"));
}

#[test]
fn test_accessor_properties() {
    assert_eq!(
        eval("const o = { _v: 1, get v() { return this._v * 10; }, set v(x) { this._v = x; } }; o.v = 5; o.v"),
        JsValue::from(50)
    );
    assert_eq!(
        eval("const o = {}; Object.defineProperty(o, 'now', { get: () => 'computed' }); o.now"),
        JsValue::from("computed")
    );
    assert_eq!(eval("const o = { get only() { return 1; } }; o.only = 2; o.only"), JsValue::from(1));
}

#[test]
fn test_prototype_chain() {
    assert_eq!(eval("const p = { greet() { return 'hi'; } }; const o = Object.create(p); o.greet()"), JsValue::from("hi"));
    assert_eq!(eval("Object.getPrototypeOf(Object.create(null))"), JsValue::Null);
    assert_eq!(eval("const o = {}; Object.setPrototypeOf(o, Array.prototype); o instanceof Array"), JsValue::Bool(true));
    assert_eq!(eval("({ __proto__: { inherited: 1 } }).inherited"), JsValue::from(1));
}

#[test]
fn test_prototype_cycle_rejected() {
    assert!(throws_error("const a = {}; const b = Object.create(a); Object.setPrototypeOf(a, b);", "TypeError"));
    assert_eq!(
        eval("const a = {}; const b = Object.create(a); Reflect.setPrototypeOf(a, b)"),
        JsValue::Bool(false)
    );
}

#[test]
fn test_keys_values_entries() {
    assert_eq!(eval("Object.keys({ a: 1, b: 2 }).join()"), JsValue::from("a,b"));
    assert_eq!(eval("Object.values({ a: 1, b: 2 }).join()"), JsValue::from("1,2"));
    assert_eq!(eval("Object.entries({ a: 1 }).map(e => e.join('=')).join()"), JsValue::from("a=1"));
    assert_eq!(eval("Object.fromEntries([['x', 1], ['y', 2]]).y"), JsValue::from(2));
    assert_eq!(eval("Object.fromEntries(new Map([['m', 3]])).m"), JsValue::from(3));
    assert_eq!(
        eval("const s = Symbol(); const o = { [s]: 1, a: 2 }; Object.keys(o).length + Object.getOwnPropertySymbols(o).length"),
        JsValue::from(2)
    );
    assert_eq!(
        eval("Object.getOwnPropertyNames([1, 2]).join()"),
        JsValue::from("0,1,length")
    );
}

#[test]
fn test_assign() {
    assert_eq!(eval("const t = Object.assign({ a: 1 }, { b: 2 }, null, { a: 3 }); t.a + t.b"), JsValue::from(5));
    assert_eq!(eval("Object.assign({}, 'ab')[1]"), JsValue::from("b"));
}

#[test]
fn test_freeze_and_seal() {
    assert_eq!(eval("const o = Object.freeze({ a: 1 }); o.a = 2; o.b = 3; o.a + (o.b === undefined ? 0 : 100)"), JsValue::from(1));
    assert_eq!(eval("Object.isFrozen(Object.freeze({}))"), JsValue::Bool(true));
    assert_eq!(eval("const o = Object.seal({ a: 1 }); o.a = 2; delete o.a; o.a"), JsValue::from(2));
    assert_eq!(eval("Object.isSealed(Object.seal({ a: 1 })) && !Object.isFrozen(Object.seal({ a: 1 }))"), JsValue::Bool(true));
    assert_eq!(eval("const o = Object.preventExtensions({}); o.x = 1; Object.isExtensible(o) || o.x"), JsValue::Undefined);
    assert!(throws_error("'use strict'; const o = Object.freeze({ a: 1 }); o.a = 2;", "TypeError"));
    assert!(throws_error("'use strict'; const o = Object.freeze({ a: 1 }); delete o.a;", "TypeError"));
}

#[test]
fn test_has_own() {
    assert_eq!(eval("({ a: 1 }).hasOwnProperty('a')"), JsValue::Bool(true));
    assert_eq!(eval("Object.hasOwn(Object.create({ a: 1 }), 'a')"), JsValue::Bool(false));
    assert_eq!(eval("({ a: 1 }).propertyIsEnumerable('a')"), JsValue::Bool(true));
    assert_eq!(eval("Object.prototype.isPrototypeOf.call(Array.prototype, [])"), JsValue::Bool(true));
}

#[test]
fn test_object_to_string_tags() {
    assert_eq!(eval("Object.prototype.toString.call([])"), JsValue::from("[object Array]"));
    assert_eq!(eval("Object.prototype.toString.call(null)"), JsValue::from("[object Null]"));
    assert_eq!(eval("Object.prototype.toString.call(new Map())"), JsValue::from("[object Map]"));
    assert_eq!(eval("Object.prototype.toString.call({ [Symbol.toStringTag]: 'Custom' })"), JsValue::from("[object Custom]"));
}

#[test]
fn test_to_primitive_order() {
    assert_eq!(eval("const o = { valueOf() { return 10; }, toString() { return 'str'; } }; o + 1"), JsValue::from(11));
    assert_eq!(eval("const o = { valueOf() { return 10; }, toString() { return 'str'; } }; `${o}`"), JsValue::from("str"));
    assert!(throws_error("const o = { valueOf() { return {}; }, toString() { return {}; } }; o + 1", "TypeError"));
}

#[test]
fn test_computed_keys_and_methods() {
    assert_eq!(eval("const k = 'dyn'; const o = { [k + 1]: 'v' }; o.dyn1"), JsValue::from("v"));
    assert_eq!(eval("const o = { [1 + 1]: 'two' }; o['2']"), JsValue::from("two"));
}

#[test]
fn test_property_order() {
    assert_eq!(
        eval("const o = {}; o.z = 1; o[10] = 1; o.a = 1; o[2] = 1; Reflect.ownKeys(o).join()"),
        JsValue::from("2,10,z,a")
    );
    assert_eq!(
        eval("const o = { a: 1, b: 2 }; delete o.a; o.a = 3; Object.keys(o).join()"),
        JsValue::from("b,a")
    );
}

#[test]
fn test_many_properties() {
    assert_eq!(
        eval("const o = {}; for (let i = 0; i < 200; i++) o['k' + i] = i; delete o.k5; Object.keys(o).length + o.k199"),
        JsValue::from(398)
    );
}

#[test]
fn test_instanceof() {
    assert_eq!(eval("[] instanceof Object"), JsValue::Bool(true));
    assert_eq!(eval("const O = { [Symbol.hasInstance](v) { return v === 1; } }; 1 instanceof O"), JsValue::Bool(true));
    assert!(throws_error("({}) instanceof 5", "TypeError"));
}

#[test]
fn test_global_this() {
    assert_eq!(eval("var gv = 3; globalThis.gv"), JsValue::from(3));
    assert_eq!(eval("let lv = 3; globalThis.lv"), JsValue::Undefined);
    assert_eq!(eval("globalThis.globalThis === globalThis"), JsValue::Bool(true));
}
