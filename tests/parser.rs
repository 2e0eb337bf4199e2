//! Tests for the parser
//!
//! These tests check the shape of the AST for representative constructs and
//! the errors reported for invalid scripts.

use esrun::JsError;
use esrun::ast::{
    BinaryOp, ClassMember, Expression, LiteralValue, LogicalOp, MemberProperty, Pattern, Script,
    Statement, VariableKind,
};
use esrun::parser::parse;
use esrun::string_dict::StringDict;

fn parse_script(source: &str) -> Result<Script, JsError> {
    let mut dict = StringDict::new();
    parse(source, "test.js", false, &mut dict)
}

fn parse_ok(source: &str) -> Script {
    match parse_script(source) {
        Ok(script) => script,
        Err(err) => panic!("unexpected parse error for {source:?}: {err}"),
    }
}

/// The expression of the only statement
fn expression(source: &str) -> Expression {
    let script = parse_ok(source);
    match script.body.into_iter().next() {
        Some(Statement::Expression(e)) => e.expression,
        other => panic!("expected an expression statement, got {other:?}"),
    }
}

#[test]
fn test_multiplication_binds_tighter() {
    let Expression::Binary(add) = expression("1 + 2 * 3;") else {
        panic!("expected binary");
    };
    assert_eq!(add.operator, BinaryOp::Add);
    assert!(matches!(&*add.right, Expression::Binary(m) if m.operator == BinaryOp::Mul));
}

#[test]
fn test_exponent_is_right_associative() {
    let Expression::Binary(outer) = expression("2 ** 3 ** 2;") else {
        panic!("expected binary");
    };
    assert_eq!(outer.operator, BinaryOp::Exp);
    assert!(matches!(&*outer.left, Expression::Literal(l) if l.value == LiteralValue::Number(2.0)));
    assert!(matches!(&*outer.right, Expression::Binary(inner) if inner.operator == BinaryOp::Exp));
}

#[test]
fn test_unary_before_exponent_is_error() {
    assert!(matches!(parse_script("-2 ** 2;"), Err(JsError::Parse(_))));
    parse_ok("(-2) ** 2;");
}

#[test]
fn test_logical_operators() {
    let Expression::Logical(or) = expression("a && b || c;") else {
        panic!("expected logical");
    };
    assert_eq!(or.operator, LogicalOp::Or);
    assert!(matches!(&*or.left, Expression::Logical(and) if and.operator == LogicalOp::And));
}

#[test]
fn test_optional_chain() {
    assert!(matches!(expression("a?.b.c;"), Expression::OptionalChain(_)));
    assert!(matches!(expression("a.b;"), Expression::Member(_)));
}

#[test]
fn test_private_member_access() {
    let script = parse_ok("class A { #x = 1; read() { return this.#x; } }");
    let Some(Statement::ClassDeclaration(class)) = script.body.first() else {
        panic!("expected class");
    };
    assert_eq!(class.members.len(), 2);
    assert!(matches!(class.members.first(), Some(ClassMember::Field(_))));
    assert!(matches!(class.members.get(1), Some(ClassMember::Method(_))));
}

#[test]
fn test_member_property_kinds() {
    let Expression::Member(m) = expression("a[b];") else {
        panic!("expected member");
    };
    assert!(matches!(m.property, MemberProperty::Expression(_)));
    let Expression::Member(m) = expression("a.if;") else {
        panic!("expected member");
    };
    assert!(matches!(&m.property, MemberProperty::Identifier(name) if *name == "if"));
}

#[test]
fn test_function_flags() {
    let script = parse_ok("async function* g() { yield 1; await 2; }");
    let Some(Statement::FunctionDeclaration(f)) = script.body.first() else {
        panic!("expected function");
    };
    assert!(f.is_async);
    assert!(f.is_generator);
    assert_eq!(f.id.as_ref().map(|id| id.name.to_string()), Some("g".to_string()));
}

#[test]
fn test_destructuring_declaration() {
    let script = parse_ok("const { a, b: [c, d = 1], ...rest } = obj;");
    let Some(Statement::Variable(decl)) = script.body.first() else {
        panic!("expected declaration");
    };
    assert_eq!(decl.kind, VariableKind::Const);
    assert!(matches!(decl.declarations.first().map(|d| &d.id), Some(Pattern::Object(_))));
}

#[test]
fn test_use_strict_directive() {
    assert!(parse_ok("'use strict'; x = 1;").strict);
    assert!(!parse_ok("x = 1; 'use strict';").strict);
    let mut dict = StringDict::new();
    assert!(parse("x = 1;", "test.js", true, &mut dict).is_ok_and(|s| s.strict));
}

#[test]
fn test_statement_spans() {
    let script = parse_ok("let a = 1;\n  foo(a);");
    let spans: Vec<(u32, u32)> = script.body.iter().map(|s| (s.span().line, s.span().column)).collect();
    assert_eq!(spans, vec![(1, 1), (2, 3)]);
}

#[test]
fn test_error_positions() {
    let Err(JsError::Parse(errors)) = parse_script("let ok = 1;\nlet bad = ;") else {
        panic!("expected a syntax error");
    };
    let Some(first) = errors.first() else {
        panic!("no errors collected");
    };
    assert_eq!(first.source_name, "test.js");
    assert_eq!(first.line, 2);
    assert_eq!(first.column, 11);
}

#[test]
fn test_accessor_and_spread_syntax() {
    parse_ok("const o = { get x() { return 1; }, set x(v) {}, ...other, [k]: 2, m() {} };");
    parse_ok("f(...args, last); new C(...xs);");
    parse_ok("const [first, , third = 3, ...others] = list;");
}

#[test]
fn test_return_outside_function() {
    assert!(parse_script("return 1;").is_err());
    parse_ok("function f() { return 1; }");
}

#[test]
fn test_yield_and_await_contexts() {
    parse_ok("function f() { var yield = 1; var await = 2; }");
    assert!(parse_script("function* g() { var yield = 1; }").is_err());
    assert!(parse_script("async function f() { var await = 1; }").is_err());
}

#[test]
fn test_deep_nesting_is_a_syntax_error() {
    parse_ok(&format!("x = {}1{};", "(".repeat(400), ")".repeat(400)));
    parse_ok(&format!("x = {}1;", "!".repeat(800)));

    let deep = format!("x = {}1{};", "(".repeat(5000), ")".repeat(5000));
    let Err(JsError::Parse(errors)) = parse_script(&deep) else {
        panic!("expected a syntax error");
    };
    assert!(errors.0.iter().any(|e| e.message == "Maximum nesting depth exceeded"));

    let blocks = format!("{}{}", "{".repeat(5000), "}".repeat(5000));
    assert!(matches!(parse_script(&blocks), Err(JsError::Parse(_))));
}

#[test]
fn test_rest_target_rejects_trailing_comma() {
    for source in ["[a, ...b,] = [];", "({...a,} = {});", "for ([a, ...b,] of []) {}", "let [x, ...y,] = [];"] {
        assert!(matches!(parse_script(source), Err(JsError::Parse(_))), "{source}");
    }
    let Err(JsError::Parse(errors)) = parse_script("[a, ...b,] = [];") else {
        panic!("expected a syntax error");
    };
    let first = errors.first().map(|e| (e.message.as_str(), e.column));
    assert_eq!(first, Some(("Rest element may not have a trailing comma", 9)));

    parse_ok("[a, ...b] = [];");
    parse_ok("[a, b,] = [];");
    parse_ok("({a, ...b} = {});");
    parse_ok("x = [a, ...b,];");
    parse_ok("x = {...a,};");
}
