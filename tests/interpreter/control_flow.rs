//! Control flow tests: loops, switch, exceptions, iterator closing

use super::{eval, throws_error};
use esrun::JsValue;

#[test]
fn test_try_catch_finally_order() {
    assert_eq!(
        eval(r#"let r = 0; try { throw "e" } catch (e) { r = e } finally { r += "!" }; r"#),
        JsValue::from("e!")
    );
}

#[test]
fn test_finally_runs_once_and_rethrows() {
    assert_eq!(
        eval("let n = 0; try { try { throw new Error('x'); } finally { n++; } } catch (e) { n += 10; } n"),
        JsValue::from(11)
    );
    assert!(throws_error("try { throw new RangeError('kept'); } finally { 1; }", "RangeError: kept"));
}

#[test]
fn test_finally_overrides_return() {
    assert_eq!(eval("function f() { try { return 1; } finally { return 2; } } f()"), JsValue::from(2));
    assert_eq!(
        eval("let log = []; function f() { try { return log.push('try'); } finally { log.push('finally'); } } f(); log.join()"),
        JsValue::from("try,finally")
    );
    assert_eq!(
        eval("function f() { try { throw 1; } finally { return 'swallowed'; } } f()"),
        JsValue::from("swallowed")
    );
}

#[test]
fn test_finally_with_break_and_continue() {
    assert_eq!(
        eval("let log = ''; for (let i = 0; i < 3; i++) { try { if (i === 1) continue; if (i === 2) break; log += i; } finally { log += 'f'; } } log"),
        JsValue::from("0fff")
    );
    assert_eq!(
        eval("let n = 0; outer: for (;;) { for (;;) { try { break outer; } finally { n++; } } } n"),
        JsValue::from(1)
    );
}

#[test]
fn test_nested_finally_unwinds_in_order() {
    assert_eq!(
        eval("const log = []; function f() { try { try { return 'r'; } finally { log.push(1); } } finally { log.push(2); } } f() + log.join()"),
        JsValue::from("r1,2")
    );
}

#[test]
fn test_catch_binding_forms() {
    assert_eq!(eval("try { throw { code: 7 }; } catch ({ code }) { code }"), JsValue::from(7));
    assert_eq!(eval("let ok = false; try { throw 1; } catch { ok = true; } ok"), JsValue::Bool(true));
    assert_eq!(eval("let e = 'outer'; try { throw 'inner'; } catch (e) {} e"), JsValue::from("outer"));
}

#[test]
fn test_errors_from_natives_are_catchable() {
    assert_eq!(eval("try { null.x; } catch (e) { e instanceof TypeError }"), JsValue::Bool(true));
    assert_eq!(eval("try { undefinedName; } catch (e) { e.name }"), JsValue::from("ReferenceError"));
    assert_eq!(eval("try { new Array(-1); } catch (e) { e.constructor === RangeError }"), JsValue::Bool(true));
}

#[test]
fn test_switch() {
    let src = "function f(x) { switch (x) { case 1: return 'one'; case 2: case 3: return 'few'; default: return 'many'; } }";
    assert_eq!(eval(&format!("{src} f(1)")), JsValue::from("one"));
    assert_eq!(eval(&format!("{src} f(3)")), JsValue::from("few"));
    assert_eq!(eval(&format!("{src} f(9)")), JsValue::from("many"));
}

#[test]
fn test_switch_fallthrough_and_default_position() {
    assert_eq!(
        eval("let s = ''; switch (2) { case 1: s += 'a'; default: s += 'd'; case 2: s += 'b'; case 3: s += 'c'; break; case 4: s += 'x'; } s"),
        JsValue::from("bc")
    );
    assert_eq!(
        eval("let s = ''; switch (9) { case 1: s += 'a'; default: s += 'd'; case 2: s += 'b'; } s"),
        JsValue::from("db")
    );
    assert_eq!(eval("switch ('1') { case 1: 'number'; break; default: 'strict'; }"), JsValue::from("strict"));
}

#[test]
fn test_loops() {
    assert_eq!(eval("let s = 0; for (let i = 1; i <= 10; i++) s += i; s"), JsValue::from(55));
    assert_eq!(eval("let i = 0; do { i++; } while (i < 5); i"), JsValue::from(5));
    assert_eq!(eval("let i = 10; do { i++; } while (false); i"), JsValue::from(11));
    assert_eq!(eval("let n = 0; while (true) { if (++n > 4) break; } n"), JsValue::from(5));
}

#[test]
fn test_for_in() {
    assert_eq!(eval("const ks = []; for (const k in { a: 1, b: 2 }) ks.push(k); ks.join()"), JsValue::from("a,b"));
    assert_eq!(eval("const ks = []; for (const k in [7, 8]) ks.push(k); ks.join()"), JsValue::from("0,1"));
    assert_eq!(
        eval("const ks = []; for (const k in { a: 1, [Symbol('s')]: 2, b: 3 }) ks.push(k); ks.join()"),
        JsValue::from("a,b")
    );
    assert_eq!(
        eval("const p = { inherited: 1 }; const o = Object.create(p); o.own = 2; const ks = []; for (const k in o) ks.push(k); ks.join()"),
        JsValue::from("own,inherited")
    );
    assert_eq!(eval("let n = 0; for (const k in null) n++; n"), JsValue::from(0));
}

#[test]
fn test_for_in_integer_keys_first() {
    assert_eq!(
        eval("const o = { b: 1, 2: 1, a: 1, 1: 1 }; Object.keys(o).join()"),
        JsValue::from("1,2,b,a")
    );
}

#[test]
fn test_for_of() {
    assert_eq!(eval("let s = 0; for (const x of [1, 2, 3]) s += x; s"), JsValue::from(6));
    assert_eq!(eval("let s = ''; for (const c of 'abc') s = c + s; s"), JsValue::from("cba"));
    assert_eq!(
        eval("let s = 0; for (const [k, v] of new Map([['a', 1], ['b', 2]])) s += v; s"),
        JsValue::from(3)
    );
    assert!(throws_error("for (const x of {}) {}", "TypeError"));
}

#[test]
fn test_for_of_closes_iterator_on_break() {
    let src = r#"
        let closed = 0;
        const iterable = {
            [Symbol.iterator]() {
                let i = 0;
                return {
                    next() { return { value: i++, done: false }; },
                    return() { closed++; return {}; },
                };
            },
        };
        for (const x of iterable) { if (x === 2) break; }
        closed
    "#;
    assert_eq!(eval(src), JsValue::from(1));
}

#[test]
fn test_for_of_closes_iterator_on_throw_and_return() {
    let src = r#"
        let closed = 0;
        const iterable = {
            [Symbol.iterator]() {
                return {
                    next() { return { value: 1, done: false }; },
                    return() { closed++; return {}; },
                };
            },
        };
        try { for (const x of iterable) throw new Error('stop'); } catch (e) {}
        function f() { for (const x of iterable) return x; }
        f();
        closed
    "#;
    assert_eq!(eval(src), JsValue::from(2));
}

#[test]
fn test_for_of_does_not_close_exhausted_iterator() {
    let src = r#"
        let closed = 0;
        const iterable = {
            [Symbol.iterator]() {
                let i = 0;
                return {
                    next() { return { value: i, done: i++ >= 2 }; },
                    return() { closed++; return {}; },
                };
            },
        };
        for (const x of iterable) {}
        closed
    "#;
    assert_eq!(eval(src), JsValue::from(0));
}

#[test]
fn test_throw_non_error_values() {
    assert_eq!(eval("try { throw 42; } catch (e) { e }"), JsValue::from(42));
    assert_eq!(eval("try { throw null; } catch (e) { e }"), JsValue::Null);
    assert!(throws_error("throw 'plain string'", "plain string"));
}

#[test]
fn test_conditional_operator() {
    assert_eq!(eval("const x = 5; x > 3 ? 'big' : 'small'"), JsValue::from("big"));
    assert_eq!(eval("false ? 1 : null ? 2 : 3"), JsValue::from(3));
}
