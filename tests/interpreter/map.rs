//! Map and WeakMap tests

use super::{eval, throws_error};
use esrun::JsValue;

#[test]
fn test_basic_operations() {
    assert_eq!(eval("const m = new Map(); m.set('a', 1).set('b', 2); m.get('b') + m.size"), JsValue::from(4));
    assert_eq!(eval("const m = new Map([[1, 'one']]); m.has(1) && !m.has('1')"), JsValue::Bool(true));
    assert_eq!(eval("const m = new Map([[1, 'one']]); m.delete(1) && m.size === 0 && !m.delete(1)"), JsValue::Bool(true));
    assert_eq!(eval("const m = new Map([[1, 1], [2, 2]]); m.clear(); m.size"), JsValue::from(0));
}

#[test]
fn test_key_equality() {
    assert_eq!(eval("const m = new Map(); m.set(NaN, 'nan'); m.get(NaN)"), JsValue::from("nan"));
    assert_eq!(eval("const m = new Map(); m.set(-0, 'zero'); m.get(0)"), JsValue::from("zero"));
    assert_eq!(eval("const m = new Map(); m.set(-0, 1); Object.is([...m.keys()][0], 0)"), JsValue::Bool(true));
    assert_eq!(eval("const m = new Map(); m.set({}, 1); m.get({})"), JsValue::Undefined);
    assert_eq!(eval("const k = {}; const m = new Map([[k, 'obj']]); m.get(k)"), JsValue::from("obj"));
}

#[test]
fn test_insertion_order() {
    assert_eq!(
        eval("const m = new Map([['z', 1], ['a', 2]]); m.set('z', 3); [...m].map(([k, v]) => k + v).join()"),
        JsValue::from("z3,a2")
    );
    assert_eq!(
        eval("const m = new Map([['a', 1], ['b', 2]]); m.delete('a'); m.set('a', 1); [...m.keys()].join()"),
        JsValue::from("b,a")
    );
}

#[test]
fn test_iteration_sees_live_updates() {
    assert_eq!(
        eval("const m = new Map([[1, 1]]); const seen = []; for (const [k] of m) { seen.push(k); if (k < 4) m.set(k + 1, 1); } seen.join()"),
        JsValue::from("1,2,3,4")
    );
    assert_eq!(
        eval("const m = new Map([[1, 1], [2, 2], [3, 3]]); const seen = []; m.forEach((v, k) => { seen.push(k); m.delete(2); }); seen.join()"),
        JsValue::from("1,3")
    );
}

#[test]
fn test_for_each_arguments() {
    assert_eq!(
        eval("const out = []; new Map([['k', 'v']]).forEach(function (v, k, map) { out.push(v, k, map.size, this.tag); }, { tag: 't' }); out.join()"),
        JsValue::from("v,k,1,t")
    );
}

#[test]
fn test_group_by() {
    assert_eq!(
        eval("const g = Map.groupBy([1, 2, 3], x => x > 1); g.get(true).join() + '|' + g.get(false).join()"),
        JsValue::from("2,3|1")
    );
}

#[test]
fn test_map_requires_new() {
    assert!(throws_error("Map()", "TypeError"));
    assert!(throws_error("new Map([1])", "TypeError"));
}

#[test]
fn test_weak_map() {
    assert_eq!(eval("const k = {}; const w = new WeakMap([[k, 1]]); w.get(k) + (w.has({}) ? 10 : 0)"), JsValue::from(1));
    assert_eq!(eval("const k = {}; const w = new WeakMap(); w.set(k, 1); w.delete(k); w.has(k)"), JsValue::Bool(false));
    assert!(throws_error("new WeakMap().set('str', 1)", "TypeError"));
    assert_eq!(eval("new WeakMap().get(1)"), JsValue::Undefined);
}

#[test]
fn test_map_iterator_protocol() {
    assert_eq!(
        eval("const it = new Map([['a', 1]]).entries(); const r = it.next(); r.value.join() + '|' + it.next().done"),
        JsValue::from("a,1|true")
    );
    assert_eq!(eval("Map.prototype[Symbol.iterator] === Map.prototype.entries"), JsValue::Bool(true));
}
