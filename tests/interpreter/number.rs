//! Number formatting, parsing and the Number constructor

use super::{eval, throws_error};
use esrun::JsValue;

#[test]
fn test_shortest_round_trip_formatting() {
    assert_eq!(eval("(0.1 + 0.2).toString()"), JsValue::from("0.30000000000000004"));
    assert_eq!(eval("String(1e21)"), JsValue::from("1e+21"));
    assert_eq!(eval("String(123456789012345680000)"), JsValue::from("123456789012345680000"));
    assert_eq!(eval("String(5e-7)"), JsValue::from("5e-7"));
    assert_eq!(eval("String(0.000001)"), JsValue::from("0.000001"));
    assert_eq!(eval("String(-0)"), JsValue::from("0"));
    assert_eq!(eval("String(1 / 3)"), JsValue::from("0.3333333333333333"));
    assert_eq!(eval("String(Number.MAX_VALUE)"), JsValue::from("1.7976931348623157e+308"));
    assert_eq!(eval("String(Number.MIN_VALUE)"), JsValue::from("5e-324"));
    assert_eq!(eval("String(-Infinity)"), JsValue::from("-Infinity"));
}

#[test]
fn test_to_string_radix() {
    assert_eq!(eval("(255).toString(16)"), JsValue::from("ff"));
    assert_eq!(eval("(255).toString(2)"), JsValue::from("11111111"));
    assert_eq!(eval("(-35).toString(36)"), JsValue::from("-z"));
    assert_eq!(eval("(0.5).toString(2)"), JsValue::from("0.1"));
    assert!(throws_error("(1).toString(37)", "RangeError"));
}

#[test]
fn test_to_fixed() {
    assert_eq!(eval("(3.14159).toFixed(2)"), JsValue::from("3.14"));
    assert_eq!(eval("(123.456).toFixed(1)"), JsValue::from("123.5"));
    assert_eq!(eval("(0).toFixed(2)"), JsValue::from("0.00"));
    assert_eq!(eval("(0.001).toFixed(1)"), JsValue::from("0.0"));
    assert_eq!(eval("(42).toFixed()"), JsValue::from("42"));
    assert_eq!(eval("(1e21).toFixed(2)"), JsValue::from("1e+21"));
    assert_eq!(eval("(-2.25).toFixed(3)"), JsValue::from("-2.250"));
    assert_eq!(eval("NaN.toFixed(2)"), JsValue::from("NaN"));
}

#[test]
fn test_to_precision_and_exponential() {
    assert_eq!(eval("(123.456).toPrecision(4)"), JsValue::from("123.5"));
    assert_eq!(eval("(0.000123).toPrecision(2)"), JsValue::from("0.00012"));
    assert_eq!(eval("(123456).toPrecision(2)"), JsValue::from("1.2e+5"));
    assert_eq!(eval("(0).toPrecision(3)"), JsValue::from("0.00"));
    assert_eq!(eval("(5).toPrecision()"), JsValue::from("5"));
    assert_eq!(eval("(12345).toExponential(2)"), JsValue::from("1.23e+4"));
    assert_eq!(eval("(0).toExponential()"), JsValue::from("0e+0"));
    assert_eq!(eval("(0.00015).toExponential()"), JsValue::from("1.5e-4"));
    assert!(throws_error("(1).toPrecision(0)", "RangeError"));
    assert!(throws_error("(1).toFixed(101)", "RangeError"));
}

#[test]
fn test_string_to_number() {
    assert_eq!(eval("Number('42')"), JsValue::from(42));
    assert_eq!(eval("Number('  12  ')"), JsValue::from(12));
    assert_eq!(eval("Number('')"), JsValue::from(0));
    assert_eq!(eval("Number('0x1f')"), JsValue::from(31));
    assert_eq!(eval("Number('0b101')"), JsValue::from(5));
    assert_eq!(eval("Number('0o17')"), JsValue::from(15));
    assert_eq!(eval("Number('1e3')"), JsValue::from(1000));
    assert_eq!(eval("Number('.5')"), JsValue::from(0.5));
    assert_eq!(eval("Number('-Infinity')"), JsValue::from(f64::NEG_INFINITY));
    assert_eq!(eval("Number.isNaN(Number('12px'))"), JsValue::Bool(true));
    assert_eq!(eval("Number.isNaN(Number('1_000'))"), JsValue::Bool(true));
    assert_eq!(eval("+[]"), JsValue::from(0));
    assert_eq!(eval("+[7]"), JsValue::from(7));
    assert_eq!(eval("Number(null) + Number(true)"), JsValue::from(1));
    assert_eq!(eval("Number.isNaN(Number(undefined))"), JsValue::Bool(true));
}

#[test]
fn test_parse_int_and_float() {
    assert_eq!(eval("parseInt('42px')"), JsValue::from(42));
    assert_eq!(eval("parseInt('  -17')"), JsValue::from(-17));
    assert_eq!(eval("parseInt('0x1f')"), JsValue::from(31));
    assert_eq!(eval("parseInt('ff', 16)"), JsValue::from(255));
    assert_eq!(eval("parseInt('101', 2)"), JsValue::from(5));
    assert_eq!(eval("parseInt('12.9')"), JsValue::from(12));
    assert_eq!(eval("Number.isNaN(parseInt('abc'))"), JsValue::Bool(true));
    assert_eq!(eval("Number.isNaN(parseInt('1', 1))"), JsValue::Bool(true));
    assert_eq!(eval("parseFloat('3.14abc')"), JsValue::from(3.14));
    assert_eq!(eval("parseFloat('.5e1')"), JsValue::from(5));
    assert_eq!(eval("parseFloat('-Infinityx')"), JsValue::from(f64::NEG_INFINITY));
    assert_eq!(eval("Number.parseInt === parseInt && Number.parseFloat === parseFloat"), JsValue::Bool(true));
}

#[test]
fn test_number_predicates() {
    assert_eq!(eval("Number.isInteger(5.0)"), JsValue::Bool(true));
    assert_eq!(eval("Number.isInteger(5.5)"), JsValue::Bool(false));
    assert_eq!(eval("Number.isInteger('5')"), JsValue::Bool(false));
    assert_eq!(eval("Number.isSafeInteger(Number.MAX_SAFE_INTEGER)"), JsValue::Bool(true));
    assert_eq!(eval("Number.isSafeInteger(2 ** 53)"), JsValue::Bool(false));
    assert_eq!(eval("Number.isFinite('1')"), JsValue::Bool(false));
    assert_eq!(eval("isFinite('1')"), JsValue::Bool(true));
    assert_eq!(eval("Number.isNaN('NaN')"), JsValue::Bool(false));
    assert_eq!(eval("isNaN('NaN')"), JsValue::Bool(true));
    assert_eq!(eval("Number.EPSILON > 0 && Number.EPSILON < 1e-15"), JsValue::Bool(true));
}

#[test]
fn test_integer_and_float_arithmetic() {
    assert_eq!(eval("2 ** 53 + 1"), JsValue::from(9007199254740992.0));
    assert_eq!(eval("2147483647 + 1"), JsValue::from(2147483648_i64));
    assert_eq!(eval("(2147483647 + 1) | 0"), JsValue::from(-2147483648_i64));
    assert_eq!(eval("-1 >>> 0"), JsValue::from(4294967295_i64));
    assert_eq!(eval("7 % -3"), JsValue::from(1));
    assert_eq!(eval("-7 % 3"), JsValue::from(-1));
    assert_eq!(eval("Object.is(-0 * 1, -0)"), JsValue::Bool(true));
    assert_eq!(eval("Object.is(0 * -1, -0)"), JsValue::Bool(true));
    assert_eq!(eval("1 / 0"), JsValue::from(f64::INFINITY));
    assert_eq!(eval("5 / 2"), JsValue::from(2.5));
}

#[test]
fn test_number_wrapper() {
    assert_eq!(eval("typeof new Number(5)"), JsValue::from("object"));
    assert_eq!(eval("new Number(5) + 1"), JsValue::from(6));
    assert_eq!(eval("Number.prototype.valueOf.call(new Number(3))"), JsValue::from(3));
    assert!(throws_error("Number.prototype.toFixed.call('1', 2)", "TypeError"));
}
