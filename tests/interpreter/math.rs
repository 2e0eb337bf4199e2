//! Math object tests

use super::{create_test_runtime, eval};
use esrun::JsValue;

#[test]
fn test_rounding() {
    assert_eq!(eval("Math.floor(-4.5)"), JsValue::from(-5));
    assert_eq!(eval("Math.ceil(4.1)"), JsValue::from(5));
    assert_eq!(eval("Math.round(2.5)"), JsValue::from(3));
    assert_eq!(eval("Math.round(-2.5)"), JsValue::from(-2));
    assert_eq!(eval("Object.is(Math.round(-0.4), -0)"), JsValue::Bool(true));
    assert_eq!(eval("Math.trunc(-4.7)"), JsValue::from(-4));
    assert_eq!(eval("Math.sign(-3)"), JsValue::from(-1));
    assert_eq!(eval("Math.fround(5.5)"), JsValue::from(5.5));
    assert_eq!(eval("Math.fround(0.1) === 0.1"), JsValue::Bool(false));
}

#[test]
fn test_min_max() {
    assert_eq!(eval("Math.max(1, 3, 2)"), JsValue::from(3));
    assert_eq!(eval("Math.min(1, '0')"), JsValue::from(0));
    assert_eq!(eval("Math.max()"), JsValue::from(f64::NEG_INFINITY));
    assert_eq!(eval("Math.min()"), JsValue::from(f64::INFINITY));
    assert_eq!(eval("Number.isNaN(Math.max(1, NaN))"), JsValue::Bool(true));
    assert_eq!(eval("Object.is(Math.max(-0, 0), 0)"), JsValue::Bool(true));
    assert_eq!(eval("Object.is(Math.min(0, -0), -0)"), JsValue::Bool(true));
    assert_eq!(eval("Math.max(...[4, 9, 2])"), JsValue::from(9));
}

#[test]
fn test_powers_and_roots() {
    assert_eq!(eval("Math.pow(2, 10)"), JsValue::from(1024));
    assert_eq!(eval("Math.sqrt(16)"), JsValue::from(4));
    assert_eq!(eval("Math.cbrt(27)"), JsValue::from(3));
    assert_eq!(eval("Math.hypot(3, 4)"), JsValue::from(5));
    assert_eq!(eval("Number.isNaN(Math.pow(1, Infinity))"), JsValue::Bool(true));
    assert_eq!(eval("Number.isNaN(Math.sqrt(-1))"), JsValue::Bool(true));
    assert_eq!(eval("Math.exp(0) + Math.log(1)"), JsValue::from(1));
    assert_eq!(eval("Math.log2(8)"), JsValue::from(3));
}

#[test]
fn test_trigonometry() {
    assert_eq!(eval("Math.sin(0)"), JsValue::from(0));
    assert_eq!(eval("Math.cos(0)"), JsValue::from(1));
    assert_eq!(eval("Math.abs(Math.sin(Math.PI / 2) - 1) < 1e-15"), JsValue::Bool(true));
    assert_eq!(eval("Math.atan2(1, 1) === Math.PI / 4"), JsValue::Bool(true));
    assert_eq!(eval("Math.tanh(Infinity)"), JsValue::from(1));
}

#[test]
fn test_integer_helpers() {
    assert_eq!(eval("Math.clz32(1)"), JsValue::from(31));
    assert_eq!(eval("Math.clz32(0)"), JsValue::from(32));
    assert_eq!(eval("Math.imul(0xffffffff, 5)"), JsValue::from(-5));
    assert_eq!(eval("Math.imul(3, 4)"), JsValue::from(12));
}

#[test]
fn test_constants() {
    assert_eq!(eval("Math.PI"), JsValue::from(std::f64::consts::PI));
    assert_eq!(eval("Math.E"), JsValue::from(std::f64::consts::E));
    assert_eq!(eval("Math.SQRT2"), JsValue::from(std::f64::consts::SQRT_2));
    assert_eq!(eval("Math.PI = 3; Math.PI === 3"), JsValue::Bool(false));
    assert_eq!(eval("typeof Math"), JsValue::from("object"));
}

#[test]
fn test_random_uses_source() {
    let mut runtime = create_test_runtime();
    runtime.set_rand_source(|| 0.25);
    assert_eq!(runtime.run_string("Math.random()").ok(), Some(JsValue::from(0.25)));
}

#[test]
fn test_random_sequence() {
    let mut runtime = create_test_runtime();
    let mut next = 0.0;
    runtime.set_rand_source(move || {
        next += 0.125;
        next
    });
    assert_eq!(
        runtime.run_string("[Math.random(), Math.random(), Math.random()].join()").ok(),
        Some(JsValue::from("0.125,0.25,0.375"))
    );
}

#[test]
fn test_default_random_in_range() {
    assert_eq!(
        eval("let ok = true; for (let i = 0; i < 100; i++) { const r = Math.random(); if (r < 0 || r >= 1) ok = false; } ok"),
        JsValue::Bool(true)
    );
}
