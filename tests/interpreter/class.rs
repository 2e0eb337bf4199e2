//! Class tests: fields, private names, accessors, inheritance, super

use super::{eval, throws_error};
use esrun::JsValue;

#[test]
fn test_private_field_getter() {
    assert_eq!(eval("class A { #x = 5; get x() { return this.#x; } } new A().x"), JsValue::from(5));
}

#[test]
fn test_constructor_and_methods() {
    assert_eq!(
        eval("class Point { constructor(x, y) { this.x = x; this.y = y; } sum() { return this.x + this.y; } } new Point(2, 3).sum()"),
        JsValue::from(5)
    );
}

#[test]
fn test_public_fields_run_per_instance() {
    assert_eq!(
        eval("let n = 0; class A { id = ++n; } new A(); new A().id"),
        JsValue::from(2)
    );
    assert_eq!(eval("class A { a = 1; b = this.a + 1; } new A().b"), JsValue::from(2));
}

#[test]
fn test_private_methods_and_accessors() {
    let src = r#"
        class Counter {
            #count = 0;
            #step() { this.#count++; }
            get #doubled() { return this.#count * 2; }
            tick() { this.#step(); return this.#doubled; }
        }
        const c = new Counter();
        c.tick();
        c.tick()
    "#;
    assert_eq!(eval(src), JsValue::from(4));
}

#[test]
fn test_private_brand_check() {
    assert_eq!(
        eval("class A { #p; static has(o) { return #p in o; } } A.has(new A()) && !A.has({})"),
        JsValue::Bool(true)
    );
    assert!(throws_error("class A { #p = 1; static read(o) { return o.#p; } } A.read({})", "TypeError"));
}

#[test]
fn test_private_names_are_per_class() {
    let src = r#"
        function make() { return class { #v = 1; static get(o) { return o.#v; } }; }
        const A = make(), B = make();
        try { A.get(new B()); 'leaked' } catch (e) { e.name }
    "#;
    assert_eq!(eval(src), JsValue::from("TypeError"));
}

#[test]
fn test_static_members() {
    assert_eq!(eval("class A { static n = 3; static twice() { return this.n * 2; } } A.twice()"), JsValue::from(6));
    assert_eq!(eval("class A { static #secret = 7; static reveal() { return A.#secret; } } A.reveal()"), JsValue::from(7));
    assert_eq!(eval("class A { static { this.init = 'done'; } } A.init"), JsValue::from("done"));
}

#[test]
fn test_inheritance_and_super() {
    let src = r#"
        class Animal {
            constructor(name) { this.name = name; }
            speak() { return this.name + ' makes a sound'; }
        }
        class Dog extends Animal {
            constructor(name) { super(name); this.kind = 'dog'; }
            speak() { return super.speak() + ' (woof)'; }
        }
        const d = new Dog('Rex');
        d.speak() + '|' + (d instanceof Animal) + '|' + d.kind
    "#;
    assert_eq!(eval(src), JsValue::from("Rex makes a sound (woof)|true|dog"));
}

#[test]
fn test_default_derived_constructor_forwards_arguments() {
    assert_eq!(
        eval("class A { constructor(a, b) { this.s = a + b; } } class B extends A {} new B(2, 3).s"),
        JsValue::from(5)
    );
}

#[test]
fn test_this_before_super_throws() {
    assert!(throws_error("class A {} class B extends A { constructor() { this.x = 1; super(); } } new B()", "ReferenceError"));
    assert!(throws_error("class A {} class B extends A { constructor() {} } new B()", "ReferenceError"));
}

#[test]
fn test_super_called_twice_throws() {
    assert!(throws_error("class A {} class B extends A { constructor() { super(); super(); } } new B()", "ReferenceError"));
}

#[test]
fn test_static_inheritance() {
    assert_eq!(
        eval("class A { static create() { return new this(); } } class B extends A {} B.create() instanceof B"),
        JsValue::Bool(true)
    );
    assert_eq!(eval("class A { static k = 'a'; } class B extends A {} B.k"), JsValue::from("a"));
    assert_eq!(eval("class A {} class B extends A {} Object.getPrototypeOf(B) === A"), JsValue::Bool(true));
}

#[test]
fn test_extending_builtins() {
    assert_eq!(
        eval("class MyArr extends Array { sum() { return this.reduce((a, b) => a + b, 0); } } const m = new MyArr(); m.push(1, 2, 3); m.sum() + m.length"),
        JsValue::from(9)
    );
    assert_eq!(
        eval("class MyErr extends Error { constructor(m) { super(m); this.name = 'MyErr'; } } const e = new MyErr('bad'); e instanceof Error && e.message === 'bad' && String(e)"),
        JsValue::from("MyErr: bad")
    );
}

#[test]
fn test_extends_null_and_non_constructor() {
    assert!(throws_error("class A extends 5 {}", "TypeError"));
    assert_eq!(eval("class A extends null {} Object.getPrototypeOf(A.prototype)"), JsValue::Null);
}

#[test]
fn test_class_constructor_requires_new() {
    assert!(throws_error("class A {} A()", "TypeError"));
}

#[test]
fn test_accessors() {
    let src = r#"
        class Temp {
            #c = 0;
            get f() { return this.#c * 9 / 5 + 32; }
            set f(v) { this.#c = (v - 32) * 5 / 9; }
        }
        const t = new Temp();
        t.f = 212;
        t.f
    "#;
    assert_eq!(eval(src), JsValue::from(212));
}

#[test]
fn test_computed_and_symbol_members() {
    assert_eq!(
        eval("const k = 'dyn'; class A { [k + 'amic']() { return 1; } } new A().dynamic()"),
        JsValue::from(1)
    );
    assert_eq!(
        eval("class R { *[Symbol.iterator]() { yield 1; yield 2; } } [...new R()].join()"),
        JsValue::from("1,2")
    );
}

#[test]
fn test_methods_are_not_enumerable() {
    assert_eq!(eval("class A { m() {} } Object.keys(A.prototype).length"), JsValue::from(0));
    assert_eq!(eval("class A { f = 1; } Object.keys(new A()).join()"), JsValue::from("f"));
}

#[test]
fn test_class_expressions_and_name() {
    assert_eq!(eval("const C = class {}; C.name"), JsValue::from("C"));
    assert_eq!(eval("const C = class Inner { who() { return Inner.name; } }; new C().who()"), JsValue::from("Inner"));
}

#[test]
fn test_super_property_in_object_literal() {
    assert_eq!(
        eval("const base = { hi() { return 'base'; } }; const o = { __proto__: base, hi() { return super.hi() + '+o'; } }; o.hi()"),
        JsValue::from("base+o")
    );
}

#[test]
fn test_class_binding_is_immutable_inside() {
    assert!(throws_error("class A { static f() { A = 1; } } A.f()", "TypeError"));
}
