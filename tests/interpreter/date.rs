//! Date tests. The default time provider reports UTC as local time.

use super::{eval, throws_error};
use esrun::platform::FnTimeProvider;
use esrun::{JsValue, Runtime, RuntimeOptions};

#[test]
fn test_epoch_and_components() {
    assert_eq!(eval("new Date(0).toISOString()"), JsValue::from("1970-01-01T00:00:00.000Z"));
    assert_eq!(eval("const d = new Date(Date.UTC(2024, 1, 29, 13, 5, 9, 7)); d.getUTCFullYear() * 100 + d.getUTCMonth()"), JsValue::from(202401));
    assert_eq!(eval("new Date(Date.UTC(2024, 1, 29)).getUTCDate()"), JsValue::from(29));
    assert_eq!(eval("new Date(Date.UTC(2024, 1, 29)).getUTCDay()"), JsValue::from(4));
    assert_eq!(eval("new Date(Date.UTC(2020, 0, 1, 12, 30, 15, 250)).getUTCMilliseconds()"), JsValue::from(250));
}

#[test]
fn test_component_constructor_overflows() {
    assert_eq!(eval("new Date(2024, 0, 32).getDate()"), JsValue::from(1));
    assert_eq!(eval("new Date(2024, 12, 1).getFullYear()"), JsValue::from(2025));
    assert_eq!(eval("new Date(99, 0).getFullYear()"), JsValue::from(1999));
}

#[test]
fn test_parse_iso() {
    assert_eq!(eval("Date.parse('2024-03-10T12:00:00Z')"), JsValue::from(1710072000000_i64));
    assert_eq!(eval("Date.parse('2024-03-10')"), JsValue::from(1710028800000_i64));
    assert_eq!(eval("Date.parse('2024-03-10T12:00:00+02:00')"), JsValue::from(1710064800000_i64));
    assert_eq!(eval("Date.parse('+010000-01-01T00:00:00Z') > 0"), JsValue::Bool(true));
    assert_eq!(eval("Number.isNaN(Date.parse('not a date'))"), JsValue::Bool(true));
}

#[test]
fn test_parse_legacy_formats() {
    assert_eq!(
        eval("Date.parse('Sun, 10 Mar 2024 12:00:00 GMT') === Date.parse('2024-03-10T12:00:00Z')"),
        JsValue::Bool(true)
    );
    assert_eq!(
        eval("new Date('March 10, 2024').getDate()"),
        JsValue::from(10)
    );
}

#[test]
fn test_string_forms() {
    assert_eq!(
        eval("new Date(Date.UTC(2024, 2, 10, 8, 5, 3)).toString()"),
        JsValue::from("Sun Mar 10 2024 08:05:03 GMT+0000 (Coordinated Universal Time)")
    );
    assert_eq!(
        eval("new Date(Date.UTC(2024, 2, 10, 8, 5, 3)).toUTCString()"),
        JsValue::from("Sun, 10 Mar 2024 08:05:03 GMT")
    );
    assert_eq!(eval("new Date(Date.UTC(2024, 2, 10)).toDateString()"), JsValue::from("Sun Mar 10 2024"));
    assert_eq!(eval("new Date(Date.UTC(2024, 2, 10, 15, 4, 5)).toLocaleTimeString()"), JsValue::from("3:04:05 PM"));
    assert_eq!(eval("new Date(Date.UTC(2024, 2, 10)).toLocaleDateString()"), JsValue::from("3/10/2024"));
}

#[test]
fn test_invalid_date() {
    assert_eq!(eval("String(new Date(NaN))"), JsValue::from("Invalid Date"));
    assert_eq!(eval("Number.isNaN(new Date('garbage').getTime())"), JsValue::Bool(true));
    assert!(throws_error("new Date(NaN).toISOString()", "RangeError"));
    assert_eq!(eval("new Date(NaN).toJSON()"), JsValue::Null);
    assert_eq!(eval("Number.isNaN(new Date(8.64e15 + 1).getTime())"), JsValue::Bool(true));
}

#[test]
fn test_setters() {
    assert_eq!(
        eval("const d = new Date(0); d.setUTCFullYear(2000); d.setUTCMonth(5, 15); d.toISOString()"),
        JsValue::from("2000-06-15T00:00:00.000Z")
    );
    assert_eq!(
        eval("const d = new Date(0); d.setUTCHours(25); d.getUTCDate() * 100 + d.getUTCHours()"),
        JsValue::from(201)
    );
    assert_eq!(eval("const d = new Date(0); d.setTime(1000)"), JsValue::from(1000));
}

#[test]
fn test_arithmetic_and_comparison() {
    assert_eq!(eval("new Date(5000) - new Date(2000)"), JsValue::from(3000));
    assert_eq!(eval("new Date(1) < new Date(2)"), JsValue::Bool(true));
    assert_eq!(eval("typeof (new Date(0) + 1)"), JsValue::from("string"));
}

#[test]
fn test_date_called_as_function_returns_string() {
    assert_eq!(eval("typeof Date()"), JsValue::from("string"));
}

#[test]
fn test_time_source() {
    let mut runtime = Runtime::new();
    runtime.set_time_source(|| 1_000_000.0);
    assert_eq!(runtime.run_string("Date.now()").ok(), Some(JsValue::from(1_000_000)));
    assert_eq!(runtime.run_string("new Date().getTime()").ok(), Some(JsValue::from(1_000_000)));
}

#[test]
fn test_local_offset_from_provider() {
    let options = RuntimeOptions::new().time_provider(FnTimeProvider::new(|| 0.0).with_offset_minutes(120));
    let mut runtime = Runtime::with_options(options);
    assert_eq!(
        runtime.run_string("const d = new Date(0); [d.getHours(), d.getTimezoneOffset()].join()").ok(),
        Some(JsValue::from("2,-120"))
    );
    assert_eq!(
        runtime.run_string("new Date(1970, 0, 1, 2).getTime()").ok(),
        Some(JsValue::from(0))
    );
    assert_eq!(
        runtime.run_string("new Date(0).toString()").ok(),
        Some(JsValue::from("Thu Jan 01 1970 02:00:00 GMT+0200"))
    );
}
