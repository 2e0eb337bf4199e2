//! Async generator and `for await` tests

use super::create_test_runtime;
use esrun::JsValue;

fn run_and_get(src: &str, name: &str) -> Option<JsValue> {
    let mut runtime = create_test_runtime();
    if let Err(e) = runtime.run_string(src) {
        panic!("script failed: {e}");
    }
    runtime.get(name).ok().flatten()
}

#[test]
fn test_for_await_over_async_generator() {
    let src = r#"
        var out = [];
        async function* numbers() { yield 1; yield await Promise.resolve(2); yield 3; }
        (async () => { for await (const n of numbers()) out.push(n); out.push('end'); })();
    "#;
    let mut runtime = create_test_runtime();
    assert!(runtime.run_string(src).is_ok());
    assert_eq!(runtime.run_string("out.join()").ok(), Some(JsValue::from("1,2,3,end")));
}

#[test]
fn test_for_await_over_sync_iterable_of_promises() {
    let src = r#"
        var total = 0;
        (async () => { for await (const v of [Promise.resolve(1), 2, Promise.resolve(3)]) total += v; })();
    "#;
    assert_eq!(run_and_get(src, "total"), Some(JsValue::from(6)));
}

#[test]
fn test_async_generator_next_returns_promises() {
    let src = r#"
        var result;
        async function* g() { yield 'a'; }
        const it = g();
        const p = it.next();
        result = p instanceof Promise;
    "#;
    assert_eq!(run_and_get(src, "result"), Some(JsValue::Bool(true)));
}

#[test]
fn test_async_generator_requests_queue() {
    let src = r#"
        var seen = '';
        async function* g() { yield 1; yield 2; }
        const it = g();
        Promise.all([it.next(), it.next(), it.next()]).then(rs => {
            seen = rs.map(r => r.done ? 'done' : r.value).join();
        });
    "#;
    assert_eq!(run_and_get(src, "seen"), Some(JsValue::from("1,2,done")));
}

#[test]
fn test_for_await_break_calls_return() {
    let src = r#"
        var cleaned = false;
        async function* g() { try { yield 1; yield 2; } finally { cleaned = true; } }
        (async () => { for await (const v of g()) break; })();
    "#;
    assert_eq!(run_and_get(src, "cleaned"), Some(JsValue::Bool(true)));
}

#[test]
fn test_custom_async_iterator() {
    let src = r#"
        var collected = [];
        const source = {
            [Symbol.asyncIterator]() {
                let i = 0;
                return { next() { return Promise.resolve({ value: i, done: i++ >= 3 }); } };
            },
        };
        (async () => { for await (const v of source) collected.push(v); })();
    "#;
    let mut runtime = create_test_runtime();
    assert!(runtime.run_string(src).is_ok());
    assert_eq!(runtime.run_string("collected.join()").ok(), Some(JsValue::from("0,1,2")));
}
