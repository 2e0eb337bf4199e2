//! Symbol tests

use super::{eval, throws_error};
use esrun::JsValue;

#[test]
fn test_uniqueness_and_description() {
    assert_eq!(eval("Symbol('a') === Symbol('a')"), JsValue::Bool(false));
    assert_eq!(eval("Symbol('a').description"), JsValue::from("a"));
    assert_eq!(eval("Symbol().description"), JsValue::Undefined);
    assert_eq!(eval("Symbol('x').toString()"), JsValue::from("Symbol(x)"));
    assert!(throws_error("new Symbol()", "TypeError"));
}

#[test]
fn test_registry() {
    assert_eq!(eval("Symbol.for('app') === Symbol.for('app')"), JsValue::Bool(true));
    assert_eq!(eval("Symbol.keyFor(Symbol.for('app'))"), JsValue::from("app"));
    assert_eq!(eval("Symbol.keyFor(Symbol('local'))"), JsValue::Undefined);
    assert_eq!(eval("Symbol.keyFor(Symbol.iterator)"), JsValue::Undefined);
}

#[test]
fn test_symbols_as_keys() {
    assert_eq!(eval("const s = Symbol(); const o = { [s]: 1 }; o[s]"), JsValue::from(1));
    assert_eq!(eval("const s = Symbol(); const o = { [s]: 1 }; JSON.stringify(o)"), JsValue::from("{}"));
    assert_eq!(eval("const s = Symbol(); const o = { [s]: 1, a: 2 }; Object.keys(o).join()"), JsValue::from("a"));
}

#[test]
fn test_well_known_symbols() {
    assert_eq!(
        eval("const o = { *[Symbol.iterator]() { yield 'x'; yield 'y'; } }; [...o].join('')"),
        JsValue::from("xy")
    );
    assert_eq!(
        eval("const o = { [Symbol.toPrimitive](hint) { return hint === 'number' ? 42 : 'str'; } }; (+o) + '|' + `${o}`"),
        JsValue::from("42|str")
    );
    assert_eq!(
        eval("class Even { static [Symbol.hasInstance](n) { return n % 2 === 0; } } 4 instanceof Even"),
        JsValue::Bool(true)
    );
}

#[test]
fn test_symbol_wrapper() {
    assert_eq!(eval("typeof Object(Symbol())"), JsValue::from("object"));
    assert_eq!(eval("const s = Symbol('w'); Object(s).valueOf() === s"), JsValue::Bool(true));
    assert!(throws_error("Symbol() + 1", "TypeError"));
}
