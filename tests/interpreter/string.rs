//! String tests

use super::{eval, throws_error};
use esrun::JsValue;

#[test]
fn test_length_counts_code_units() {
    assert_eq!(eval("'hello'.length"), JsValue::from(5));
    assert_eq!(eval("'é'.length"), JsValue::from(1));
    assert_eq!(eval("'𝄞'.length"), JsValue::from(2));
    assert_eq!(eval("'𝄞'.charCodeAt(0)"), JsValue::from(0xD834));
    assert_eq!(eval("'𝄞'.codePointAt(0)"), JsValue::from(0x1D11E));
    assert_eq!(eval("[...'a𝄞b'].length"), JsValue::from(3));
}

#[test]
fn test_indexing() {
    assert_eq!(eval("'abc'[1]"), JsValue::from("b"));
    assert_eq!(eval("'abc'[5]"), JsValue::Undefined);
    assert_eq!(eval("'abc'.charAt(5)"), JsValue::from(""));
    assert_eq!(eval("'abc'.at(-1)"), JsValue::from("c"));
    assert_eq!(eval("Number.isNaN('abc'.charCodeAt(9))"), JsValue::Bool(true));
}

#[test]
fn test_search() {
    assert_eq!(eval("'hello world'.indexOf('o')"), JsValue::from(4));
    assert_eq!(eval("'hello world'.lastIndexOf('o')"), JsValue::from(7));
    assert_eq!(eval("'hello'.indexOf('')"), JsValue::from(0));
    assert_eq!(eval("'hello'.includes('ell')"), JsValue::Bool(true));
    assert_eq!(eval("'hello'.startsWith('he') && 'hello'.endsWith('lo')"), JsValue::Bool(true));
    assert_eq!(eval("'hello'.startsWith('l', 2)"), JsValue::Bool(true));
}

#[test]
fn test_slicing() {
    assert_eq!(eval("'hello'.slice(1, -1)"), JsValue::from("ell"));
    assert_eq!(eval("'hello'.substring(3, 1)"), JsValue::from("el"));
    assert_eq!(eval("'hello'.substr(-3, 2)"), JsValue::from("ll"));
    assert_eq!(eval("'hello'.slice(-2)"), JsValue::from("lo"));
}

#[test]
fn test_case_and_trim() {
    assert_eq!(eval("'MiXeD'.toLowerCase()"), JsValue::from("mixed"));
    assert_eq!(eval("'straße'.toUpperCase()"), JsValue::from("STRASSE"));
    assert_eq!(eval("'  pad  '.trim() + '|'"), JsValue::from("pad|"));
    assert_eq!(eval("'  pad  '.trimStart()"), JsValue::from("pad  "));
    assert_eq!(eval("'\\n\\t x \\u00a0'.trimEnd()"), JsValue::from("\n\t x"));
}

#[test]
fn test_split() {
    assert_eq!(eval("'a,b,c'.split(',').length"), JsValue::from(3));
    assert_eq!(eval("'abc'.split('').join('-')"), JsValue::from("a-b-c"));
    assert_eq!(eval("'a,b,c'.split(',', 2).join()"), JsValue::from("a,b"));
    assert_eq!(eval("'abc'.split().length"), JsValue::from(1));
    assert_eq!(eval("''.split(',').length"), JsValue::from(1));
}

#[test]
fn test_pad_and_repeat() {
    assert_eq!(eval("'5'.padStart(3, '0')"), JsValue::from("005"));
    assert_eq!(eval("'ab'.padEnd(7, 'xyz')"), JsValue::from("abxyzxy"));
    assert_eq!(eval("'ab'.repeat(3)"), JsValue::from("ababab"));
    assert!(throws_error("'a'.repeat(-1)", "RangeError"));
}

#[test]
fn test_replace_with_strings() {
    assert_eq!(eval("'aaa'.replace('a', 'b')"), JsValue::from("baa"));
    assert_eq!(eval("'aaa'.replaceAll('a', 'b')"), JsValue::from("bbb"));
    assert_eq!(eval("'price: X'.replace('X', '$$5')"), JsValue::from("price: $5"));
    assert_eq!(eval("'abc'.replace('b', '[$&]')"), JsValue::from("a[b]c"));
    assert_eq!(eval("'abc'.replace('b', (m, i) => m.toUpperCase() + i)"), JsValue::from("aB1c"));
}

#[test]
fn test_from_char_code_and_raw() {
    assert_eq!(eval("String.fromCharCode(72, 105)"), JsValue::from("Hi"));
    assert_eq!(eval("String.fromCodePoint(0x1F600).length"), JsValue::from(2));
    assert_eq!(eval("String.raw`a\\nb${1}`"), JsValue::from("a\\nb1"));
    assert!(throws_error("String.fromCodePoint(-1)", "RangeError"));
}

#[test]
fn test_lone_surrogates() {
    assert_eq!(eval("'\\uD800'.length"), JsValue::from(1));
    assert_eq!(eval("'\\uD800'.isWellFormed()"), JsValue::Bool(false));
    assert_eq!(eval("'\\uD800x'.toWellFormed().charCodeAt(0)"), JsValue::from(0xFFFD));
    assert_eq!(eval("('\\uD83D' + '\\uDE00') === '😀'"), JsValue::Bool(true));
}

#[test]
fn test_string_object_wrapper() {
    assert_eq!(eval("typeof new String('x')"), JsValue::from("object"));
    assert_eq!(eval("new String('abc').length"), JsValue::from(3));
    assert_eq!(eval("Object.keys(new String('ab')).join()"), JsValue::from("0,1"));
    assert_eq!(eval("new String('x') == 'x'"), JsValue::Bool(true));
}

#[test]
fn test_string_conversion() {
    assert_eq!(eval("String(null) + String(undefined)"), JsValue::from("nullundefined"));
    assert_eq!(eval("String(Symbol('s'))"), JsValue::from("Symbol(s)"));
    assert!(throws_error("'' + Symbol('s')", "TypeError"));
    assert_eq!(eval("String({ toString() { return 'custom'; } })"), JsValue::from("custom"));
    assert_eq!(eval("`${{ [Symbol.toPrimitive]() { return 'prim'; } }}`"), JsValue::from("prim"));
}

#[test]
fn test_comparison_and_locale_compare() {
    assert_eq!(eval("'a'.localeCompare('b')"), JsValue::from(-1));
    assert_eq!(eval("'b'.localeCompare('a')"), JsValue::from(1));
    assert_eq!(eval("'a'.localeCompare('a')"), JsValue::from(0));
}

#[test]
fn test_string_iterator() {
    assert_eq!(
        eval("const it = 'ab'[Symbol.iterator](); it.next().value + it.next().value + it.next().done"),
        JsValue::from("abtrue")
    );
}

#[test]
fn test_concat_builds_long_strings() {
    assert_eq!(eval("let s = ''; for (let i = 0; i < 1000; i++) s += 'x'; s.length"), JsValue::from(1000));
    assert_eq!(eval("'a'.concat(1, null)"), JsValue::from("a1null"));
}
