//! Set and WeakSet tests

use super::{eval, throws_error};
use esrun::JsValue;

#[test]
fn test_basic_operations() {
    assert_eq!(eval("const s = new Set([1, 2, 2, 3]); s.size"), JsValue::from(3));
    assert_eq!(eval("const s = new Set(); s.add(1).add(1); s.size"), JsValue::from(1));
    assert_eq!(eval("const s = new Set('hello'); [...s].join('')"), JsValue::from("helo"));
    assert_eq!(eval("const s = new Set([NaN, NaN, 0, -0]); s.size"), JsValue::from(2));
    assert_eq!(eval("const s = new Set([1]); s.delete(1) && !s.has(1)"), JsValue::Bool(true));
}

#[test]
fn test_set_algebra() {
    assert_eq!(eval("[...new Set([1, 2, 3]).union(new Set([3, 4]))].join()"), JsValue::from("1,2,3,4"));
    assert_eq!(eval("[...new Set([1, 2, 3]).intersection(new Set([3, 2, 9]))].join()"), JsValue::from("2,3"));
    assert_eq!(eval("[...new Set([1, 2, 3]).difference(new Set([2]))].join()"), JsValue::from("1,3"));
    assert_eq!(eval("[...new Set([1, 2]).symmetricDifference(new Set([2, 3]))].join()"), JsValue::from("1,3"));
    assert_eq!(eval("new Set([1]).isSubsetOf(new Set([1, 2]))"), JsValue::Bool(true));
    assert_eq!(eval("new Set([1, 2]).isSupersetOf(new Set([2]))"), JsValue::Bool(true));
    assert_eq!(eval("new Set([1]).isDisjointFrom(new Set([2]))"), JsValue::Bool(true));
}

#[test]
fn test_iteration() {
    assert_eq!(eval("[...new Set(['a', 'b']).entries()].map(e => e.join('')).join()"), JsValue::from("aa,bb"));
    assert_eq!(eval("Set.prototype.keys === Set.prototype.values"), JsValue::Bool(true));
    assert_eq!(
        eval("const s = new Set([1, 2]); const seen = []; s.forEach(v => { seen.push(v); if (v === 1) s.add(3); }); seen.join()"),
        JsValue::from("1,2,3")
    );
}

#[test]
fn test_weak_set() {
    assert_eq!(eval("const o = {}; const w = new WeakSet([o]); w.has(o) && !w.has({})"), JsValue::Bool(true));
    assert!(throws_error("new WeakSet().add(1)", "TypeError"));
}

#[test]
fn test_dedupe_objects_by_identity() {
    assert_eq!(eval("const o = {}; new Set([o, o, {}]).size"), JsValue::from(2));
}
