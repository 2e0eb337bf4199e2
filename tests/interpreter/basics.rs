//! Basic language tests: operators, bindings, literals and coercions

use super::{eval, eval_string, throws_error};
use esrun::JsValue;

#[test]
fn test_arithmetic() {
    assert_eq!(eval("1 + 2 * 3"), JsValue::from(7));
    assert_eq!(eval("(1 + 2) * 3"), JsValue::from(9));
    assert_eq!(eval("7 % 3"), JsValue::from(1));
    assert_eq!(eval("-7 % 3"), JsValue::from(-1));
    assert_eq!(eval("2 ** 10"), JsValue::from(1024));
    assert_eq!(eval("1 / 4"), JsValue::from(0.25));
}

#[test]
fn test_integer_overflow_widens() {
    assert_eq!(eval("2147483647 + 1"), JsValue::from(2147483648.0));
    assert_eq!(eval("9007199254740992 + 1"), JsValue::from(9007199254740992.0));
    assert_eq!(eval("-2147483648 - 1"), JsValue::from(-2147483649.0));
}

#[test]
fn test_negative_zero() {
    assert_eq!(eval("-0"), JsValue::from(-0.0));
    assert_eq!(eval("0 * -1"), JsValue::from(-0.0));
    assert_eq!(eval("Object.is(-0, 0)"), JsValue::Bool(false));
    assert_eq!(eval("-0 === 0"), JsValue::Bool(true));
    assert_eq!(eval("1 / -0"), JsValue::from(f64::NEG_INFINITY));
}

#[test]
fn test_nan() {
    assert_eq!(eval("NaN === NaN"), JsValue::Bool(false));
    assert_eq!(eval("Object.is(NaN, 0 / 0)"), JsValue::Bool(true));
    assert_eq!(eval("typeof NaN"), JsValue::from("number"));
}

#[test]
fn test_string_concatenation() {
    assert_eq!(eval("'a' + 1 + 2"), JsValue::from("a12"));
    assert_eq!(eval("1 + 2 + 'a'"), JsValue::from("3a"));
    assert_eq!(eval("'x' + null + undefined + true"), JsValue::from("xnullundefinedtrue"));
    assert_eq!(eval("[1, 2] + ''"), JsValue::from("1,2"));
    assert_eq!(eval("({}) + ''"), JsValue::from("[object Object]"));
}

#[test]
fn test_float_formatting() {
    assert_eq!(eval("(0.1 + 0.2).toString()"), JsValue::from("0.30000000000000004"));
    assert_eq!(eval("String(1e21)"), JsValue::from("1e+21"));
    assert_eq!(eval("String(123456789012345680000)"), JsValue::from("123456789012345680000"));
    assert_eq!(eval("String(0.000001)"), JsValue::from("0.000001"));
    assert_eq!(eval("String(1e-7)"), JsValue::from("1e-7"));
    assert_eq!(eval("String(-1.5)"), JsValue::from("-1.5"));
}

#[test]
fn test_typeof() {
    assert_eq!(eval("typeof undefined"), JsValue::from("undefined"));
    assert_eq!(eval("typeof null"), JsValue::from("object"));
    assert_eq!(eval("typeof 1"), JsValue::from("number"));
    assert_eq!(eval("typeof ''"), JsValue::from("string"));
    assert_eq!(eval("typeof Symbol()"), JsValue::from("symbol"));
    assert_eq!(eval("typeof function() {}"), JsValue::from("function"));
    assert_eq!(eval("typeof class {}"), JsValue::from("function"));
    assert_eq!(eval("typeof notDeclared"), JsValue::from("undefined"));
}

#[test]
fn test_loose_equality() {
    assert_eq!(eval("null == undefined"), JsValue::Bool(true));
    assert_eq!(eval("null == 0"), JsValue::Bool(false));
    assert_eq!(eval("'1' == 1"), JsValue::Bool(true));
    assert_eq!(eval("true == 1"), JsValue::Bool(true));
    assert_eq!(eval("[2] == 2"), JsValue::Bool(true));
    assert_eq!(eval("'' == 0"), JsValue::Bool(true));
    assert_eq!(eval("'1' === 1"), JsValue::Bool(false));
}

#[test]
fn test_relational_operators() {
    assert_eq!(eval("'a' < 'b'"), JsValue::Bool(true));
    assert_eq!(eval("'10' < '9'"), JsValue::Bool(true));
    assert_eq!(eval("'10' < 9"), JsValue::Bool(false));
    assert_eq!(eval("NaN <= NaN"), JsValue::Bool(false));
    assert_eq!(eval("null >= 0"), JsValue::Bool(true));
}

#[test]
fn test_bitwise_operators() {
    assert_eq!(eval("5 & 3"), JsValue::from(1));
    assert_eq!(eval("5 | 3"), JsValue::from(7));
    assert_eq!(eval("5 ^ 3"), JsValue::from(6));
    assert_eq!(eval("~5"), JsValue::from(-6));
    assert_eq!(eval("1 << 31"), JsValue::from(-2147483648));
    assert_eq!(eval("-16 >> 2"), JsValue::from(-4));
    assert_eq!(eval("-1 >>> 0"), JsValue::from(4294967295.0));
    assert_eq!(eval("4294967296 | 0"), JsValue::from(0));
}

#[test]
fn test_logical_and_nullish() {
    assert_eq!(eval("0 || 'fallback'"), JsValue::from("fallback"));
    assert_eq!(eval("0 ?? 'fallback'"), JsValue::from(0));
    assert_eq!(eval("null ?? undefined ?? 3"), JsValue::from(3));
    assert_eq!(eval("1 && 2"), JsValue::from(2));
    assert_eq!(eval("let n = 0; false && n++; n"), JsValue::from(0));
}

#[test]
fn test_logical_assignment() {
    assert_eq!(eval("let a = null; a ??= 5; a"), JsValue::from(5));
    assert_eq!(eval("let a = 1; a ||= 5; a"), JsValue::from(1));
    assert_eq!(eval("let a = 1; a &&= 7; a"), JsValue::from(7));
    assert_eq!(eval("const o = { x: 0 }; o.x ||= 9; o.x"), JsValue::from(9));
}

#[test]
fn test_update_expressions() {
    assert_eq!(eval("let i = 1; i++ + i"), JsValue::from(3));
    assert_eq!(eval("let i = 1; ++i + i"), JsValue::from(4));
    assert_eq!(eval("const o = { n: '5' }; o.n++; o.n"), JsValue::from(6));
    assert_eq!(eval("let s = '5'; s++"), JsValue::from(5));
}

#[test]
fn test_optional_chaining() {
    assert_eq!(eval("const o = null; o?.a.b.c"), JsValue::Undefined);
    assert_eq!(eval("const o = { a: { b: 2 } }; o?.a?.b"), JsValue::from(2));
    assert_eq!(eval("const o = {}; o.f?.()"), JsValue::Undefined);
    assert_eq!(eval("const o = { f() { return 4; } }; o.f?.()"), JsValue::from(4));
    assert_eq!(eval("const a = null; a?.[0]"), JsValue::Undefined);
}

#[test]
fn test_template_literals() {
    assert_eq!(eval("const n = 3; `n=${n}, twice=${n * 2}`"), JsValue::from("n=3, twice=6"));
    assert_eq!(eval("`a${`b${'c'}`}`"), JsValue::from("abc"));
    assert_eq!(eval("`line\\nbreak`.length"), JsValue::from(10));
}

#[test]
fn test_tagged_templates() {
    assert_eq!(
        eval("function tag(s, ...v) { return s.raw.join('|') + v.join(','); } tag`a${1}b\\n${2}`"),
        JsValue::from("a|b\\n|1,2")
    );
    assert_eq!(
        eval("function id(s) { return s; } function f() { return id`x`; } f() === f()"),
        JsValue::Bool(true)
    );
}

#[test]
fn test_var_hoisting() {
    assert_eq!(eval("typeof x; var x = 1; x"), JsValue::from(1));
    assert_eq!(eval("function f() { return v; var v = 2; } f()"), JsValue::Undefined);
    assert_eq!(eval("g(); function g() { return 3; } g()"), JsValue::from(3));
}

#[test]
fn test_let_tdz() {
    assert!(throws_error("x; let x = 1;", "ReferenceError"));
    assert!(throws_error("{ f(); let y = 1; function f() { return y; } }", "ReferenceError"));
    assert!(throws_error("typeof z; let z;", "ReferenceError"));
}

#[test]
fn test_const_reassignment() {
    assert!(throws_error("const c = 1; c = 2;", "TypeError"));
    assert!(throws_error("const c = 1; c += 2;", "TypeError"));
    assert!(throws_error("for (const i = 0; i < 2; i++) {}", "TypeError"));
}

#[test]
fn test_block_scoping() {
    assert_eq!(eval("let x = 1; { let x = 2; } x"), JsValue::from(1));
    assert_eq!(
        eval("const fs = []; for (let i = 0; i < 3; i++) fs.push(() => i); fs.map(f => f()).join()"),
        JsValue::from("0,1,2")
    );
    assert_eq!(
        eval("const fs = []; for (var i = 0; i < 3; i++) fs.push(() => i); fs.map(f => f()).join()"),
        JsValue::from("3,3,3")
    );
}

#[test]
fn test_destructuring() {
    assert_eq!(eval("const [a, , b = 5] = [1, 2]; a + b"), JsValue::from(6));
    assert_eq!(eval("const { x, y: { z } } = { x: 1, y: { z: 2 } }; x + z"), JsValue::from(3));
    assert_eq!(eval("const { a, ...rest } = { a: 1, b: 2, c: 3 }; Object.keys(rest).join()"), JsValue::from("b,c"));
    assert_eq!(eval("const [h, ...t] = 'abc'; t.join('')"), JsValue::from("bc"));
    assert_eq!(eval("let a = 1, b = 2; [a, b] = [b, a]; a * 10 + b"), JsValue::from(21));
    assert_eq!(eval("const { k = 'def' } = {}; k"), JsValue::from("def"));
    assert_eq!(eval("const { ['dyn' + 1]: d } = { dyn1: 4 }; d"), JsValue::from(4));
}

#[test]
fn test_destructuring_null_throws() {
    assert!(throws_error("const { a } = null;", "TypeError"));
    assert!(throws_error("const [a] = 1;", "TypeError"));
}

#[test]
fn test_spread() {
    assert_eq!(eval("Math.max(...[1, 5, 3])"), JsValue::from(5));
    assert_eq!(eval("[0, ...[1, 2], 3].length"), JsValue::from(4));
    assert_eq!(eval("const o = { ...{ a: 1 }, b: 2, ...null }; o.a + o.b"), JsValue::from(3));
    assert_eq!(eval("[...'hi', ...new Set([1, 1, 2])].join()"), JsValue::from("h,i,1,2"));
}

#[test]
fn test_comma_and_void() {
    assert_eq!(eval("(1, 2, 3)"), JsValue::from(3));
    assert_eq!(eval("void 0"), JsValue::Undefined);
}

#[test]
fn test_in_and_delete() {
    assert_eq!(eval("'a' in { a: 1 }"), JsValue::Bool(true));
    assert_eq!(eval("0 in [1]"), JsValue::Bool(true));
    assert_eq!(eval("const o = { a: 1 }; delete o.a; 'a' in o"), JsValue::Bool(false));
    assert!(throws_error("'a' in 1", "TypeError"));
}

#[test]
fn test_completion_value() {
    assert_eq!(eval("1; 2; 3"), JsValue::from(3));
    assert_eq!(eval("let x = 5;"), JsValue::Undefined);
    assert_eq!(eval("if (true) { 'then'; } else { 'else'; }"), JsValue::from("then"));
    assert_eq!(eval("var i = 0; while (i < 3) { i++; }"), JsValue::from(2));
}

#[test]
fn test_boolean_coercion() {
    assert_eq!(eval("!!''"), JsValue::Bool(false));
    assert_eq!(eval("!!'0'"), JsValue::Bool(true));
    assert_eq!(eval("!![]"), JsValue::Bool(true));
    assert_eq!(eval("!!NaN"), JsValue::Bool(false));
    assert_eq!(eval("Boolean(new Boolean(false))"), JsValue::Bool(true));
    assert_eq!(eval("new Boolean(false).valueOf()"), JsValue::Bool(false));
    assert_eq!(eval("String(true)"), JsValue::from("true"));
}

#[test]
fn test_unicode_strings() {
    assert_eq!(eval_string("'caf\\u00e9'"), "café");
    assert_eq!(eval("'😀'.length"), JsValue::from(2));
    assert_eq!(eval("'\\u{1F600}' === '😀'"), JsValue::Bool(true));
}

#[test]
fn test_labeled_break_and_continue() {
    assert_eq!(
        eval("let n = 0; outer: for (let i = 0; i < 3; i++) { for (let j = 0; j < 3; j++) { if (j === 1) continue outer; if (i === 2) break outer; n++; } } n"),
        JsValue::from(2)
    );
    assert_eq!(eval("block: { if (true) break block; 'unreached'; } 'done'"), JsValue::from("done"));
}
