//! Interrupting running scripts

use std::thread;
use std::time::Duration;

use super::create_test_runtime;
use esrun::{JsError, JsValue};

#[test]
fn test_interrupt_from_host_function() {
    let mut runtime = create_test_runtime();
    let handle = runtime.interrupt_handle();
    let installed = runtime.set_function("stopNow", move || handle.interrupt("halt"));
    assert!(installed.is_ok());

    let result = runtime.run_string("let i = 0; while (true) { i++; if (i === 10) stopNow(); }");
    let Err(JsError::Interrupted(info)) = result else {
        panic!("expected an interrupt, got {result:?}");
    };
    assert_eq!(info.value_as::<&str>(), Some(&"halt"));
    assert!(!info.stack.is_empty());
    assert_eq!(runtime.get("i").ok().flatten(), Some(JsValue::from(10)));
}

#[test]
fn test_interrupt_from_another_thread() {
    let mut runtime = create_test_runtime();
    let handle = runtime.interrupt_handle();
    let timer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        handle.interrupt(42_i32);
    });

    let result = runtime.run_string("for (;;) {}");
    assert!(timer.join().is_ok());
    let Err(JsError::Interrupted(info)) = result else {
        panic!("expected an interrupt, got {result:?}");
    };
    assert_eq!(info.value_as::<i32>(), Some(&42));
    assert_eq!(info.value_as::<&str>(), None);
}

#[test]
fn test_interrupt_is_uncatchable() {
    let mut runtime = create_test_runtime();
    runtime.interrupt("stop");
    let result = runtime.run_string("var caught = false; var cleaned = false; try { while (true) {} } catch (e) { caught = true; } finally { cleaned = true; }");
    assert!(matches!(result, Err(JsError::Interrupted(_))));
    assert_eq!(runtime.get("caught").ok().flatten(), Some(JsValue::Bool(false)));
    assert_eq!(runtime.get("cleaned").ok().flatten(), Some(JsValue::Bool(false)));
}

#[test]
fn test_interrupt_clears_job_queue() {
    let mut runtime = create_test_runtime();
    runtime.interrupt("stop");
    let result = runtime.run_string("var ran = false; Promise.resolve().then(() => { ran = true; }); while (true) {}");
    assert!(matches!(result, Err(JsError::Interrupted(_))));
    assert_eq!(runtime.run_string("ran").ok(), Some(JsValue::Bool(false)));
}

#[test]
fn test_interrupt_inside_async_job() {
    let mut runtime = create_test_runtime();
    let handle = runtime.interrupt_handle();
    assert!(runtime.set_function("stopNow", move || handle.interrupt("in job")).is_ok());
    let result = runtime.run_string("Promise.resolve().then(() => { stopNow(); while (true) {} }); 'sync part'");
    let Err(JsError::Interrupted(info)) = result else {
        panic!("expected an interrupt, got {result:?}");
    };
    assert_eq!(info.value_as::<&str>(), Some(&"in job"));
}

#[test]
fn test_runtime_reusable_after_interrupt() {
    let mut runtime = create_test_runtime();
    runtime.interrupt("first");
    assert!(runtime.run_string("while (true) {}").is_err());
    assert_eq!(runtime.run_string("function f(n) { return n + 1; } f(1)").ok(), Some(JsValue::from(2)));
}

#[test]
fn test_clear_interrupt() {
    let mut runtime = create_test_runtime();
    runtime.interrupt("unused");
    runtime.clear_interrupt();
    assert_eq!(
        runtime.run_string("let n = 0; for (let i = 0; i < 100; i++) n += i; n").ok(),
        Some(JsValue::from(4950))
    );

    let handle = runtime.interrupt_handle();
    handle.interrupt("also unused");
    handle.clear();
    assert_eq!(runtime.run_string("[1, 2, 3].map(x => x * 2).join()").ok(), Some(JsValue::from("2,4,6")));
}

#[test]
fn test_interrupt_display() {
    let mut runtime = create_test_runtime();
    runtime.interrupt(());
    let result = runtime.run_string("while (true) {}");
    assert!(result.is_err_and(|e| e.to_string().starts_with("InterruptedError")));
}
