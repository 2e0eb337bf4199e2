//! console builtin, observed through a capturing provider

use std::cell::RefCell;
use std::rc::Rc;

use esrun::platform::{ConsoleLevel, ConsoleProvider};
use esrun::{JsValue, Runtime, RuntimeOptions};

type Lines = Rc<RefCell<Vec<(ConsoleLevel, String)>>>;

struct Capture {
    lines: Lines,
}

impl ConsoleProvider for Capture {
    fn write(&self, level: ConsoleLevel, message: &str) {
        self.lines.borrow_mut().push((level, message.to_string()));
    }

    fn clear(&self) {
        self.lines.borrow_mut().clear();
    }
}

/// Run `source` and return everything the console printed
fn console_output(source: &str) -> Vec<(ConsoleLevel, String)> {
    let lines = Lines::default();
    let options = RuntimeOptions::new()
        .console(true)
        .gc_threshold(1)
        .console_provider(Capture { lines: lines.clone() });
    let mut runtime = Runtime::with_options(options);
    let result = runtime.run_string(source);
    assert!(result.is_ok(), "{result:?}");
    lines.take()
}

fn printed(source: &str) -> Vec<String> {
    console_output(source).into_iter().map(|(_, line)| line).collect()
}

#[test]
fn test_methods_return_undefined() {
    let mut runtime = Runtime::with_options(RuntimeOptions::new().console(true).console_provider(Capture { lines: Lines::default() }));
    assert_eq!(runtime.run_string("console.log('test')").ok(), Some(JsValue::Undefined));
    assert_eq!(runtime.run_string("console.error('test')").ok(), Some(JsValue::Undefined));
}

#[test]
fn test_levels() {
    let out = console_output("console.log('l'); console.info('i'); console.debug('d'); console.warn('w'); console.error('e');");
    let levels: Vec<ConsoleLevel> = out.iter().map(|(level, _)| *level).collect();
    assert_eq!(
        levels,
        vec![ConsoleLevel::Log, ConsoleLevel::Info, ConsoleLevel::Debug, ConsoleLevel::Warn, ConsoleLevel::Error]
    );
}

#[test]
fn test_arguments_and_nested_values() {
    assert_eq!(printed("console.log('a', 1, true, null, undefined)"), vec!["a 1 true null undefined"]);
    assert_eq!(printed("console.log([1, 'two', [3]])"), vec!["[ 1, 'two', [ 3 ] ]"]);
    assert_eq!(printed("console.log({ a: 1, nested: { b: 'x' } })"), vec!["{ a: 1, nested: { b: 'x' } }"]);
    assert_eq!(printed("console.log({})"), vec!["{}"]);
}

#[test]
fn test_special_objects() {
    assert_eq!(printed("console.log(function named() {})"), vec!["[Function: named]"]);
    assert_eq!(printed("console.log(new Map([['k', 1]]))"), vec!["Map(1) { 'k' => 1 }"]);
    assert_eq!(printed("console.log(new Set([1, 2]))"), vec!["Set(2) { 1, 2 }"]);
    assert_eq!(printed("console.log(/ab/g)"), vec!["/ab/g"]);
    assert_eq!(printed("console.log(new Date(0))"), vec!["1970-01-01T00:00:00.000Z"]);
    assert_eq!(printed("class Point { constructor() { this.x = 1; } } console.log(new Point())"), vec!["Point { x: 1 }"]);
    assert_eq!(printed("console.log(Promise.resolve(4))"), vec!["Promise { 4 }"]);
    assert_eq!(printed("console.log(new Uint8Array([1, 2]))"), vec!["Uint8Array(2) [ 1, 2 ]"]);
}

#[test]
fn test_cycles() {
    assert_eq!(printed("const o = { name: 'loop' }; o.self = o; console.log(o)"), vec!["{ name: 'loop', self: [Circular] }"]);
}

#[test]
fn test_depth_limit() {
    assert_eq!(printed("console.log({ a: { b: { c: { d: 1 } } } })"), vec!["{ a: { b: { c: [Object] } } }"]);
}

#[test]
fn test_format_directives() {
    assert_eq!(printed("console.log('%s has %d items', 'cart', 3.7)"), vec!["cart has 3.7 items"]);
    assert_eq!(printed("console.log('%i%%', 42.9)"), vec!["42%"]);
    assert_eq!(printed("console.log('%j', { a: [1] })"), vec!["{\"a\":[1]}"]);
    assert_eq!(printed("console.log('%c styled', 'color: red')"), vec![" styled"]);
    assert_eq!(printed("console.log('%o', [1])"), vec!["[ 1 ]"]);
    assert_eq!(printed("console.log('missing %s')"), vec!["missing %s"]);
}

#[test]
fn test_errors_print_stack() {
    let out = printed("function f() { return new Error('oops'); }\nconsole.log(f())");
    let first = out.first().map(String::as_str).unwrap_or_default();
    assert!(first.starts_with("Error: oops\n    at f (<eval>:1:"), "{first}");
}

#[test]
fn test_count() {
    assert_eq!(
        printed("console.count(); console.count(); console.count('x'); console.countReset(); console.count();"),
        vec!["default: 1", "default: 2", "x: 1", "default: 1"]
    );
}

#[test]
fn test_timers() {
    let out = printed("console.time('t'); console.timeEnd('t'); console.timeEnd('t');");
    assert_eq!(out.len(), 2);
    assert!(out.first().is_some_and(|l| l.starts_with("t: ") && l.ends_with("ms")), "{out:?}");
    assert_eq!(out.get(1).map(String::as_str), Some("Timer 't' does not exist"));
}

#[test]
fn test_assert() {
    assert_eq!(
        printed("console.assert(true, 'hidden'); console.assert(false, 'shown', 1); console.assert(0);"),
        vec!["Assertion failed: shown 1", "Assertion failed"]
    );
}

#[test]
fn test_trace_and_clear() {
    let out = printed("function t() { console.trace('here'); }\nt();");
    let first = out.first().map(String::as_str).unwrap_or_default();
    assert!(first.starts_with("Trace: here\n    at t (<eval>:1:"), "{first}");

    assert!(printed("console.log('gone'); console.clear();").is_empty());
}

#[test]
fn test_formatting_never_runs_getters() {
    assert_eq!(
        printed("let calls = 0; console.log({ get g() { calls++; return 1; } }); console.log(calls)"),
        vec!["{ g: [Getter] }", "0"]
    );
}

#[test]
fn test_console_can_be_disabled() {
    let mut runtime = Runtime::with_options(RuntimeOptions::new().console(false));
    assert_eq!(runtime.run_string("typeof console").ok(), Some(JsValue::from("undefined")));
}
