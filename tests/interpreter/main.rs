//! Integration tests for the interpreter, organized by feature
//!
//! These tests exercise the engine through the public `Runtime` API.
//!
//! ## Aggressive Test Defaults
//!
//! Tests use aggressive defaults to catch bugs early:
//! - `GC_THRESHOLD=1` - cycle collection on every allocation
//!
//! Override via environment variables:
//!
//! ```bash
//! cargo test                           # Default: aggressive settings
//! GC_THRESHOLD=100 cargo test          # Less aggressive GC for faster runs
//! RUST_LOG=esrun=debug cargo test      # Engine tracing on stderr
//! ```

mod api;
mod array;
mod async_await;
mod async_iter;
mod basics;
mod class;
mod console;
mod control_flow;
mod date;
mod error;
mod eval;
mod function;
mod gc;
mod generator;
mod global;
mod interrupt;
mod json;
mod map;
mod math;
mod number;
mod object;
mod promise;
mod proxy;
mod regexp;
mod set;
mod stack;
mod strict;
mod string;
mod symbol;
mod typed_array;

use std::sync::Once;

use esrun::{JsError, JsValue, Runtime, RuntimeOptions};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route engine tracing to the test writer when `RUST_LOG` is set
fn init_tracing() {
    TRACING.call_once(|| {
        if std::env::var_os("RUST_LOG").is_some() {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        }
    });
}

/// Create a new runtime with aggressive defaults for testing:
/// - GC_THRESHOLD=1 (collect on every allocation) to catch GC bugs
pub fn create_test_runtime() -> Runtime {
    init_tracing();
    // GC_THRESHOLD=100 cargo test  # Faster runs
    // GC_THRESHOLD=0 cargo test    # Disable automatic GC
    let gc_threshold = std::env::var("GC_THRESHOLD")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1);
    Runtime::with_options(RuntimeOptions::new().gc_threshold(gc_threshold).console(false))
}

/// Evaluate a script and return its completion value.
/// Microtasks are drained before this returns.
#[allow(clippy::expect_used)]
pub fn eval(source: &str) -> JsValue {
    eval_result(source).expect("eval failed")
}

/// Evaluate and return the Result for error testing
pub fn eval_result(source: &str) -> Result<JsValue, JsError> {
    let mut runtime = create_test_runtime();
    runtime.run_string(source)
}

/// Evaluate and render the completion value as a Rust string
pub fn eval_string(source: &str) -> String {
    match eval(source) {
        JsValue::String(s) => s.to_string(),
        other => panic!("expected a string, got {other:?}"),
    }
}

/// Helper to check if evaluation throws an error containing a specific message
pub fn throws_error(source: &str, error_contains: &str) -> bool {
    match eval_result(source) {
        Err(e) => e.to_string().contains(error_contains),
        Ok(_) => false,
    }
}
