//! JSON tests

use super::{eval, throws_error};
use esrun::JsValue;

#[test]
fn test_stringify_nested() {
    assert_eq!(eval("JSON.stringify({a:1,b:[2,3]})"), JsValue::from(r#"{"a":1,"b":[2,3]}"#));
}

#[test]
fn test_stringify_primitives() {
    assert_eq!(eval("JSON.stringify('he said \"hi\"\\n')"), JsValue::from(r#""he said \"hi\"\n""#));
    assert_eq!(eval("JSON.stringify(null)"), JsValue::from("null"));
    assert_eq!(eval("JSON.stringify(NaN)"), JsValue::from("null"));
    assert_eq!(eval("JSON.stringify(undefined)"), JsValue::Undefined);
    assert_eq!(eval("JSON.stringify(1e21)"), JsValue::from("1e+21"));
    assert_eq!(eval("JSON.stringify('\\u2028')"), JsValue::from("\"\u{2028}\""));
    assert_eq!(eval("JSON.stringify('\\uD800')"), JsValue::from(r#""\ud800""#));
}

#[test]
fn test_stringify_skips_unrepresentable() {
    assert_eq!(
        eval("JSON.stringify({ u: undefined, f() {}, s: Symbol(), keep: 1 })"),
        JsValue::from(r#"{"keep":1}"#)
    );
    assert_eq!(eval("JSON.stringify([undefined, () => 1])"), JsValue::from("[null,null]"));
}

#[test]
fn test_stringify_indent() {
    assert_eq!(
        eval("JSON.stringify({ a: [1], b: {} }, null, 2)"),
        JsValue::from("{\n  \"a\": [\n    1\n  ],\n  \"b\": {}\n}")
    );
    assert_eq!(eval("JSON.stringify([1, 2], null, '--')"), JsValue::from("[\n--1,\n--2\n]"));
}

#[test]
fn test_stringify_replacer() {
    assert_eq!(
        eval("JSON.stringify({ a: 1, b: 2, c: 3 }, ['c', 'a'])"),
        JsValue::from(r#"{"c":3,"a":1}"#)
    );
    assert_eq!(
        eval("JSON.stringify({ a: 1, b: 'x' }, (k, v) => typeof v === 'number' ? v * 10 : v)"),
        JsValue::from(r#"{"a":10,"b":"x"}"#)
    );
}

#[test]
fn test_stringify_to_json() {
    assert_eq!(
        eval("JSON.stringify({ d: { toJSON(key) { return 'custom:' + key; } } })"),
        JsValue::from(r#"{"d":"custom:d"}"#)
    );
    assert_eq!(
        eval("JSON.stringify(new Date(0))"),
        JsValue::from(r#""1970-01-01T00:00:00.000Z""#)
    );
}

#[test]
fn test_stringify_cycle_throws() {
    assert!(throws_error("const o = {}; o.self = o; JSON.stringify(o)", "TypeError"));
}

#[test]
fn test_stringify_boxed_primitives() {
    assert_eq!(
        eval("JSON.stringify([new Number(3), new String('s'), new Boolean(false)])"),
        JsValue::from(r#"[3,"s",false]"#)
    );
}

#[test]
fn test_parse() {
    assert_eq!(eval(r#"JSON.parse('{"a":[1,2,{"b":null}]}').a[2].b"#), JsValue::Null);
    assert_eq!(eval("JSON.parse('\"\\\\u0041\"')"), JsValue::from("A"));
    assert_eq!(eval("JSON.parse(' 42 ')"), JsValue::from(42));
    assert_eq!(eval("JSON.parse('-0.5e1')"), JsValue::from(-5));
    assert_eq!(eval(r#"Object.keys(JSON.parse('{"z":1,"a":2}')).join()"#), JsValue::from("z,a"));
}

#[test]
fn test_parse_errors() {
    assert!(throws_error("JSON.parse('{a:1}')", "SyntaxError"));
    assert!(throws_error("JSON.parse('[1,]')", "SyntaxError"));
    assert!(throws_error("JSON.parse('')", "SyntaxError"));
    assert!(throws_error("JSON.parse(\"'single'\")", "SyntaxError"));
    assert!(throws_error("JSON.parse('01')", "SyntaxError"));
    assert!(throws_error("JSON.parse('1.')", "SyntaxError"));
    assert!(throws_error("JSON.parse('+1')", "SyntaxError"));
    assert!(throws_error("JSON.parse('\"\\\\x41\"')", "SyntaxError"));
    assert!(throws_error("JSON.parse('\"a\\tb\"')", "SyntaxError"));
    assert!(throws_error("JSON.parse('[1] x')", "SyntaxError"));
}

#[test]
fn test_parse_numbers_beyond_double_range() {
    assert_eq!(eval("JSON.parse('1e400') === Infinity"), JsValue::Bool(true));
    assert_eq!(eval("JSON.parse('-1e400') === -Infinity"), JsValue::Bool(true));
    assert_eq!(eval("JSON.parse('1e-400')"), JsValue::from(0));
    assert_eq!(eval("Object.is(JSON.parse('-0'), -0)"), JsValue::Bool(true));
    assert_eq!(eval("JSON.parse('123456789012345678901234567890') === 1.2345678901234568e29"), JsValue::Bool(true));
}

#[test]
fn test_parse_keeps_lone_surrogates() {
    assert_eq!(eval(r#"JSON.parse('"\\ud800"').length"#), JsValue::from(1));
    assert_eq!(eval(r#"JSON.parse('"\\ud800"').charCodeAt(0)"#), JsValue::from(0xD800));
    assert_eq!(eval(r#"JSON.parse('"\\ud83d\\ude00"') === '\u{1F600}'"#), JsValue::Bool(true));
}

#[test]
fn test_parse_duplicate_keys_keep_first_position() {
    assert_eq!(
        eval(r#"const o = JSON.parse('{"a":1,"b":2,"a":3}'); Object.keys(o).join() + ':' + o.a"#),
        JsValue::from("a,b:3")
    );
}

#[test]
fn test_parse_reviver() {
    assert_eq!(
        eval(r#"JSON.parse('{"a":1,"b":{"c":2}}', (k, v) => typeof v === 'number' ? v + 1 : v).b.c"#),
        JsValue::from(3)
    );
    assert_eq!(
        eval(r#"const o = JSON.parse('{"drop":1,"keep":2}', (k, v) => k === 'drop' ? undefined : v); Object.keys(o).join()"#),
        JsValue::from("keep")
    );
}

#[test]
fn test_round_trip() {
    assert_eq!(
        eval(r#"const src = '{"name":"esrun","tags":["a","b"],"n":1.5,"ok":true,"none":null}'; JSON.stringify(JSON.parse(src)) === src"#),
        JsValue::Bool(true)
    );
}
