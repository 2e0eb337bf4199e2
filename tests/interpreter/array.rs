//! Array tests

use super::{eval, eval_string, throws_error};
use esrun::JsValue;

#[test]
fn test_map_join() {
    assert_eq!(eval(r#"const a = [1, 2, 3]; a.map(x => x + 1).join(",")"#), JsValue::from("2,3,4"));
}

#[test]
fn test_index_write_then_read() {
    assert_eq!(eval("const a = [1, 2, 3]; const x = { k: 1 }; a[1] = x; a[1] === x"), JsValue::Bool(true));
    assert_eq!(eval("const a = []; a[0] = 'v'; a[0]"), JsValue::from("v"));
}

#[test]
fn test_length_semantics() {
    assert_eq!(eval("const a = [1, 2, 3]; a[9] = 0; a.length"), JsValue::from(10));
    assert_eq!(eval("const a = [1, 2, 3]; a.length = 1; a.join()"), JsValue::from("1"));
    assert_eq!(eval("const a = [1, 2, 3]; a.length = 5; a[4]"), JsValue::Undefined);
    assert!(throws_error("const a = []; a.length = -1;", "RangeError"));
    assert_eq!(eval("new Array(3).length"), JsValue::from(3));
    assert_eq!(eval("new Array(3, 4).length"), JsValue::from(2));
}

#[test]
fn test_holes() {
    assert_eq!(eval("const a = [1, , 3]; 1 in a"), JsValue::Bool(false));
    assert_eq!(eval("[1, , 3].join('-')"), JsValue::from("1--3"));
    assert_eq!(eval("let n = 0; [1, , 3].forEach(() => n++); n"), JsValue::from(2));
    assert_eq!(eval("[, 'a'].findIndex(x => x === undefined)"), JsValue::from(0));
}

#[test]
fn test_push_pop_shift_unshift() {
    assert_eq!(eval("const a = [1, 2]; a.push(3, 4)"), JsValue::from(4));
    assert_eq!(eval("const a = [1, 2]; a.pop()"), JsValue::from(2));
    assert_eq!(eval("[].pop()"), JsValue::Undefined);
    assert_eq!(eval("const a = [1, 2]; a.shift() + a.length"), JsValue::from(2));
    assert_eq!(eval("const a = [3]; a.unshift(1, 2); a.join()"), JsValue::from("1,2,3"));
}

#[test]
fn test_splice() {
    assert_eq!(eval("const a = [1, 2, 3, 4]; a.splice(1, 2).join() + '|' + a.join()"), JsValue::from("2,3|1,4"));
    assert_eq!(eval("const a = [1, 4]; a.splice(1, 0, 2, 3); a.join()"), JsValue::from("1,2,3,4"));
    assert_eq!(eval("const a = [1, 2, 3]; a.splice(-1); a.join()"), JsValue::from("1,2"));
}

#[test]
fn test_slice_and_concat() {
    assert_eq!(eval("[1, 2, 3, 4].slice(1, -1).join()"), JsValue::from("2,3"));
    assert_eq!(eval("[1].concat([2, 3], 4, [[5]]).length"), JsValue::from(5));
}

#[test]
fn test_search_methods() {
    assert_eq!(eval("[1, 2, 3, 2].indexOf(2)"), JsValue::from(1));
    assert_eq!(eval("[1, 2, 3, 2].lastIndexOf(2)"), JsValue::from(3));
    assert_eq!(eval("[NaN].indexOf(NaN)"), JsValue::from(-1));
    assert_eq!(eval("[NaN].includes(NaN)"), JsValue::Bool(true));
    assert_eq!(eval("[5, 12, 8].find(x => x > 6)"), JsValue::from(12));
    assert_eq!(eval("[5, 12, 8].findLast(x => x > 6)"), JsValue::from(8));
    assert_eq!(eval("[5, 12, 8].findLastIndex(x => x > 100)"), JsValue::from(-1));
}

#[test]
fn test_iteration_callbacks() {
    assert_eq!(eval("[1, 2, 3, 4].filter(x => x % 2 === 0).join()"), JsValue::from("2,4"));
    assert_eq!(eval("[1, 2, 3].reduce((a, b) => a + b)"), JsValue::from(6));
    assert_eq!(eval("['a', 'b'].reduceRight((a, b) => a + b, '')"), JsValue::from("ba"));
    assert_eq!(eval("[1, 2].every(x => x > 0) && ![1, -2].every(x => x > 0)"), JsValue::Bool(true));
    assert_eq!(eval("[1, 2].some(x => x > 1)"), JsValue::Bool(true));
    assert_eq!(eval("[10, 20].map((x, i, arr) => x + i + arr.length).join()"), JsValue::from("12,23"));
    assert!(throws_error("[].reduce((a, b) => a + b)", "TypeError"));
}

#[test]
fn test_sort() {
    assert_eq!(eval("[3, 1, 10, 2].sort().join()"), JsValue::from("1,10,2,3"));
    assert_eq!(eval("[3, 1, 10, 2].sort((a, b) => a - b).join()"), JsValue::from("1,2,3,10"));
    assert_eq!(eval("[undefined, 3, , 1].sort().length"), JsValue::from(4));
    assert_eq!(eval("String([undefined, 3, 1].sort())"), JsValue::from("1,3,"));
    assert_eq!(
        eval("const people = [{ n: 'b', a: 1 }, { n: 'a', a: 1 }, { n: 'c', a: 0 }]; people.sort((x, y) => x.a - y.a).map(p => p.n).join('')"),
        JsValue::from("cba")
    );
}

#[test]
fn test_reverse_fill_copy_within() {
    assert_eq!(eval("[1, 2, 3].reverse().join()"), JsValue::from("3,2,1"));
    assert_eq!(eval("new Array(3).fill(7).join()"), JsValue::from("7,7,7"));
    assert_eq!(eval("[1, 2, 3, 4, 5].copyWithin(0, 3).join()"), JsValue::from("4,5,3,4,5"));
}

#[test]
fn test_flat_and_flat_map() {
    assert_eq!(eval("[1, [2, [3, [4]]]].flat().length"), JsValue::from(3));
    assert_eq!(eval("[1, [2, [3, [4]]]].flat(Infinity).join()"), JsValue::from("1,2,3,4"));
    assert_eq!(eval("[1, 2].flatMap(x => [x, x * 10]).join()"), JsValue::from("1,10,2,20"));
}

#[test]
fn test_non_mutating_copies() {
    assert_eq!(eval("const a = [3, 1, 2]; const b = a.toSorted(); a.join() + '|' + b.join()"), JsValue::from("3,1,2|1,2,3"));
    assert_eq!(eval("const a = [1, 2]; a.toReversed().join() + '|' + a.join()"), JsValue::from("2,1|1,2"));
    assert_eq!(eval("[1, 2, 3].toSpliced(1, 1, 'x').join()"), JsValue::from("1,x,3"));
    assert_eq!(eval("[1, 2, 3].with(-1, 9).join()"), JsValue::from("1,2,9"));
    assert!(throws_error("[1].with(5, 0)", "RangeError"));
}

#[test]
fn test_at() {
    assert_eq!(eval("[1, 2, 3].at(-1)"), JsValue::from(3));
    assert_eq!(eval("[1, 2, 3].at(5)"), JsValue::Undefined);
}

#[test]
fn test_array_from_and_of() {
    assert_eq!(eval("Array.from('abc').join()"), JsValue::from("a,b,c"));
    assert_eq!(eval("Array.from({ length: 3 }, (_, i) => i * i).join()"), JsValue::from("0,1,4"));
    assert_eq!(eval("Array.from(new Set([1, 1, 2])).length"), JsValue::from(2));
    assert_eq!(eval("Array.of(7).length"), JsValue::from(1));
    assert_eq!(eval("Array.isArray([]) && !Array.isArray({ length: 0 })"), JsValue::Bool(true));
}

#[test]
fn test_iterators() {
    assert_eq!(eval("[...['a', 'b'].keys()].join()"), JsValue::from("0,1"));
    assert_eq!(eval("[...['a', 'b'].entries()].map(e => e.join(':')).join()"), JsValue::from("0:a,1:b"));
    assert_eq!(eval("[...['a', 'b'].values()].join()"), JsValue::from("a,b"));
    assert_eq!(eval("[][Symbol.iterator] === [].values"), JsValue::Bool(true));
}

#[test]
fn test_join_and_to_string() {
    assert_eq!(eval("[1, null, undefined, 'x'].join()"), JsValue::from("1,,,x"));
    assert_eq!(eval("[[1, 2], [3]].toString()"), JsValue::from("1,2,3"));
    assert_eq!(eval_string("const a = [1]; a.push(a); a.join('|')"), "1|");
}

#[test]
fn test_generic_methods_on_array_likes() {
    assert_eq!(
        eval("Array.prototype.map.call({ length: 2, 0: 'a', 1: 'b' }, s => s.toUpperCase()).join('')"),
        JsValue::from("AB")
    );
    assert_eq!(eval("const o = { length: 0 }; Array.prototype.push.call(o, 1, 2); o.length"), JsValue::from(2));
}

#[test]
fn test_species_and_subclass_results() {
    assert_eq!(
        eval("class L extends Array {} const l = L.from([1, 2, 3]); l.filter(x => x > 1) instanceof L"),
        JsValue::Bool(true)
    );
}

#[test]
fn test_group_by() {
    assert_eq!(
        eval("const g = Object.groupBy([1, 2, 3, 4], x => x % 2 ? 'odd' : 'even'); g.odd.join() + '|' + g.even.join()"),
        JsValue::from("1,3|2,4")
    );
}
