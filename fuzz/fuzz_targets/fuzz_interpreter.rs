#![no_main]

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use esrun::{Program, Runtime, RuntimeOptions};
use libfuzzer_sys::fuzz_target;

const TIME_LIMIT: Duration = Duration::from_millis(200);

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // Smaller limit for interpreter (more expensive per byte)
    if source.len() > 10_000 {
        return;
    }

    let Ok(program) = Program::compile("fuzz.js", source, false) else {
        return;
    };

    let options = RuntimeOptions::new().max_call_stack_size(256).gc_threshold(1_000);
    let mut runtime = Runtime::with_options(options);

    // Watchdog: interrupt infinite loops unless the run finishes first
    let handle = runtime.interrupt_handle();
    let (done_tx, done_rx) = mpsc::channel::<()>();
    let watchdog = thread::spawn(move || {
        if done_rx.recv_timeout(TIME_LIMIT).is_err() {
            handle.interrupt("timeout");
        }
    });

    // Errors are expected; panics are not
    let _ = runtime.run(&program);
    let _ = done_tx.send(());
    let _ = watchdog.join();
    runtime.clear_interrupt();
    runtime.collect_garbage();
});
