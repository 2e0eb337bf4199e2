//! Tests for the bytecode compiler
//!
//! These tests compile whole scripts and inspect the resulting `Program`:
//! opcodes, constant pools, handler tables and position tables.

use std::sync::Arc;

use esrun::JsError;
use esrun::compiler::{Constant, FunctionCode, Op, Program};

fn compile(source: &str) -> Arc<Program> {
    match Program::compile("test.js", source, false) {
        Ok(p) => p,
        Err(e) => panic!("compile failed for {source:?}: {e}"),
    }
}

fn contains_op<F: Fn(&Op) -> bool>(code: &FunctionCode, predicate: F) -> bool {
    code.code.iter().any(predicate)
}

fn first_nested(program: &Program) -> Arc<FunctionCode> {
    match program.code().nested().next() {
        Some(f) => f.clone(),
        None => panic!("no nested function"),
    }
}

#[test]
fn test_small_integers_skip_the_pool() {
    let program = compile("42;");
    assert!(contains_op(program.code(), |op| matches!(op, Op::Int { value: 42 })));
}

#[test]
fn test_fractions_use_the_pool() {
    let program = compile("1.5;");
    assert!(
        program
            .code()
            .constants
            .iter()
            .any(|c| matches!(c, Constant::Number(n) if *n == 1.5))
    );
}

#[test]
fn test_global_declarations() {
    let program = compile("var v; let l; const c = 1; function f() {}");
    let decls = program.code().constants.iter().find_map(|c| match c {
        Constant::GlobalDecls(d) => Some(d.clone()),
        _ => None,
    });
    let Some(decls) = decls else {
        panic!("missing global declarations");
    };
    assert!(decls.vars.iter().any(|n| *n == "v"));
    assert!(decls.functions.iter().any(|n| *n == "f"));
    assert!(decls.lexical.iter().any(|(n, is_const)| *n == "l" && !is_const));
    assert!(decls.lexical.iter().any(|(n, is_const)| *n == "c" && *is_const));
}

#[test]
fn test_property_access_uses_named_ops() {
    let program = compile("o.p = o.q;");
    let code = program.code();
    assert!(contains_op(code, |op| matches!(op, Op::GetProp { .. })));
    assert!(contains_op(code, |op| matches!(op, Op::SetProp { .. })));
    assert!(contains_op(compile("o[k];").code(), |op| matches!(op, Op::GetElem)));
}

#[test]
fn test_function_flags() {
    let generator = first_nested(&compile("function* g() { yield 1; }"));
    assert!(generator.flags.is_generator());
    assert!(contains_op(&generator, |op| matches!(op, Op::Yield)));

    let arrow = first_nested(&compile("const f = async () => 1;"));
    assert!(arrow.flags.is_async());
    assert!(arrow.flags.is_arrow());
    assert!(!arrow.flags.is_constructor());
}

#[test]
fn test_strictness_is_inherited() {
    let program = match Program::compile("strict.js", "function f() {}", true) {
        Ok(p) => p,
        Err(e) => panic!("compile failed: {e}"),
    };
    assert!(program.is_strict());
    assert!(first_nested(&program).flags.is_strict());
    assert!(!first_nested(&compile("function f() {}")).flags.is_strict());
}

#[test]
fn test_function_length() {
    let f = first_nested(&compile("function f(a, b = 1, c) {}"));
    assert_eq!(f.length, 1);
    assert_eq!(f.name, "f");
}

#[test]
fn test_positions_map_to_lines() {
    let program = compile("a;\n\nb();");
    let code = program.code();
    let call = code.code.iter().position(|op| matches!(op, Op::Call { .. }));
    let Some(pc) = call else {
        panic!("no call emitted");
    };
    assert_eq!(code.position(pc).map(|(line, _)| line), Some(3));
}

#[test]
fn test_source_name_is_kept() {
    assert_eq!(compile("1;").source_name(), "test.js");
}

#[test]
fn test_syntax_errors_carry_the_source_name() {
    let Err(JsError::Parse(errors)) = Program::compile("bad.js", "let x = ;", false) else {
        panic!("expected a syntax error");
    };
    assert!(!errors.0.is_empty());
    assert!(errors.0.iter().all(|e| e.source_name == "bad.js"));
}

#[test]
fn test_programs_are_shareable() {
    let program = compile("var shared = 1;");
    let clone = program.clone();
    let handle = std::thread::spawn(move || clone.function_count());
    assert_eq!(handle.join().ok(), Some(1));
}

#[test]
fn test_returned_calls_are_tail_calls() {
    let plain = first_nested(&compile("function f(n) { return f(n - 1); }"));
    assert!(contains_op(&plain, |op| matches!(op, Op::TailCall { argc: 1 })));

    for source in [
        "async function f() { return g(); }",
        "function* f() { return g(); }",
        "function f() { return 1 + g(); }",
        "function f() { return a?.b(); }",
    ] {
        let f = first_nested(&compile(source));
        assert!(!contains_op(&f, |op| matches!(op, Op::TailCall { .. })), "{source}");
    }
}
