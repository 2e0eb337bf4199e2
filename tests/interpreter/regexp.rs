//! RegExp tests

use super::{eval, throws_error};
use esrun::JsValue;

#[test]
fn test_test_and_exec() {
    assert_eq!(eval("/h.llo/.test('say hello')"), JsValue::Bool(true));
    assert_eq!(eval("/^\\d+$/.test('12a')"), JsValue::Bool(false));
    assert_eq!(eval("const m = /(\\d+)-(\\d+)/.exec('range 10-20'); m[0] + '|' + m[1] + '|' + m[2] + '|' + m.index"), JsValue::from("10-20|10|20|6"));
    assert_eq!(eval("/x/.exec('abc')"), JsValue::Null);
}

#[test]
fn test_flags() {
    assert_eq!(eval("/a/gi.flags"), JsValue::from("gi"));
    assert_eq!(eval("/a/i.test('A')"), JsValue::Bool(true));
    assert_eq!(eval("/^b/m.test('a\\nb')"), JsValue::Bool(true));
    assert_eq!(eval("/a.b/s.test('a\\nb')"), JsValue::Bool(true));
    assert_eq!(eval("/a/g.global && !/a/.global"), JsValue::Bool(true));
    assert!(throws_error("new RegExp('a', 'gg')", "SyntaxError"));
}

#[test]
fn test_global_last_index() {
    assert_eq!(
        eval("const r = /o/g; const s = 'foo boo'; const idx = []; while (r.exec(s)) idx.push(r.lastIndex); idx.join()"),
        JsValue::from("2,3,6,7")
    );
    assert_eq!(eval("const r = /a/y; r.test('ba')"), JsValue::Bool(false));
}

#[test]
fn test_named_groups() {
    assert_eq!(
        eval("const m = /(?<year>\\d{4})-(?<month>\\d{2})/.exec('2024-05'); m.groups.year + '/' + m.groups.month"),
        JsValue::from("2024/05")
    );
    assert_eq!(
        eval("'2024-05'.replace(/(?<y>\\d+)-(?<m>\\d+)/, '$<m>/$<y>')"),
        JsValue::from("05/2024")
    );
}

#[test]
fn test_string_methods_with_regexp() {
    assert_eq!(eval("'a1b22c333'.match(/\\d+/g).join()"), JsValue::from("1,22,333"));
    assert_eq!(eval("'abc'.match(/z/g)"), JsValue::Null);
    assert_eq!(eval("'a-b_c'.split(/[-_]/).join()"), JsValue::from("a,b,c"));
    assert_eq!(eval("'a1b2'.replace(/\\d/g, d => d * 2)"), JsValue::from("a2b4"));
    assert_eq!(eval("'John Smith'.replace(/(\\w+)\\s(\\w+)/, '$2, $1')"), JsValue::from("Smith, John"));
    assert_eq!(eval("'xaxbx'.search(/b/)"), JsValue::from(3));
    assert_eq!(eval("'aaa'.replaceAll(/a/g, 'b')"), JsValue::from("bbb"));
    assert!(throws_error("'aaa'.replaceAll(/a/, 'b')", "TypeError"));
}

#[test]
fn test_match_all() {
    assert_eq!(
        eval("[...'t1 t22'.matchAll(/t(\\d+)/g)].map(m => m[1] + '@' + m.index).join()"),
        JsValue::from("1@0,22@3")
    );
}

#[test]
fn test_indices_are_code_units() {
    assert_eq!(eval("/b/.exec('😀b').index"), JsValue::from(2));
    assert_eq!(eval("'é😀x'.search(/x/)"), JsValue::from(3));
}

#[test]
fn test_source_and_to_string() {
    assert_eq!(eval("/a\\/b/g.source"), JsValue::from("a\\/b"));
    assert_eq!(eval("String(/ab+c/i)"), JsValue::from("/ab+c/i"));
    assert_eq!(eval("new RegExp('').source"), JsValue::from("(?:)"));
    assert_eq!(eval("new RegExp(/x/g, 'i').flags"), JsValue::from("i"));
}

#[test]
fn test_invalid_pattern() {
    assert!(throws_error("new RegExp('(')", "SyntaxError"));
}

#[test]
fn test_lookaround_and_backreference() {
    assert_eq!(eval("/(?<=\\$)\\d+/.exec('cost $42')[0]"), JsValue::from("42"));
    assert_eq!(eval("/(a)\\1/.test('aa')"), JsValue::Bool(true));
    assert_eq!(eval("/foo(?!bar)/.test('foobar')"), JsValue::Bool(false));
}

#[test]
fn test_unicode_property_escapes() {
    assert_eq!(eval("/\\p{L}/u.test('é')"), JsValue::Bool(true));
    assert_eq!(eval("/^\\p{Lu}+$/u.test('ABC') && !/^\\p{Lu}+$/u.test('AbC')"), JsValue::Bool(true));
    assert_eq!(eval("new RegExp('\\\\P{N}', 'u').test('7')"), JsValue::Bool(false));
    assert_eq!(eval("'a1b2'.replace(/\\p{Nd}/gu, '#')"), JsValue::from("a#b#"));
}
