//! Parser for ECMAScript source code
//!
//! Recursive descent for statements, precedence climbing for binary
//! operators. Errors are collected rather than returned immediately: after a
//! failed statement the parser skips ahead to the next statement boundary and
//! carries on, so one compilation reports every independent error.

mod expr;
mod function;
mod pattern;
mod stmt;

use std::sync::Arc;

use crate::ast::*;
use crate::error::{JsError, ParseError, ParseErrors};
use crate::lexer::{Lexer, Span, Token, TokenKind};
use crate::string::JsString;
use crate::string_dict::StringDict;

/// Loads the text of a source map named by `sourceMappingURL`. Receives the
/// URL and the name of the script being compiled.
pub type SourceMapLoader = dyn Fn(&str, &str) -> Option<String> + Send + Sync;

/// Options applied when compiling scripts
#[derive(Clone, Default)]
pub struct ParserOptions {
    /// Loader for source maps that are not inline `data:` URLs
    pub source_map_loader: Option<Arc<SourceMapLoader>>,
    /// Ignore `sourceMappingURL` comments
    pub disable_source_maps: bool,
}

impl std::fmt::Debug for ParserOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserOptions")
            .field("source_map_loader", &self.source_map_loader.is_some())
            .field("disable_source_maps", &self.disable_source_maps)
            .finish()
    }
}

/// Marker for a failure that has already been recorded
#[derive(Debug, Clone, Copy)]
pub(crate) struct Failed;

pub(crate) type PResult<T> = Result<T, Failed>;

/// Nested expressions and statements allowed before parsing gives up
pub(crate) const MAX_NESTING: u32 = 2000;

#[derive(Debug, Clone)]
struct Label {
    name: JsString,
    is_loop: bool,
}

/// Function-level parsing context, saved and restored at function
/// boundaries
#[derive(Debug, Clone, Default)]
struct Context {
    strict: bool,
    in_function: bool,
    in_generator: bool,
    in_async: bool,
    allow_super_call: bool,
    allow_super_property: bool,
    allow_new_target: bool,
    /// `arguments` is an early error in field initializers and static blocks
    in_class_field: bool,
    /// Inside formal parameters: `yield`/`await` expressions are errors
    in_params: bool,
    labels: Vec<Label>,
    breakable: u32,
    iteration: u32,
}

/// Private names declared and referenced in one class body
#[derive(Debug, Default)]
struct PrivateScope {
    declared: Vec<(JsString, PrivateKind)>,
    used: Vec<(JsString, Span)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrivateKind {
    Field,
    Method,
    Getter,
    Setter,
    Accessor,
}

/// Parser for ECMAScript source code
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    previous: Token,
    source_name: String,
    errors: Vec<ParseError>,
    ctx: Context,
    /// `in` is not a binary operator (for-statement heads)
    no_in: bool,
    next_scope: u32,
    /// Object-literal errors that disappear if the literal turns out to be
    /// a destructuring pattern (`{a = 1}`, duplicate `__proto__`)
    cover_init: Vec<(Span, &'static str)>,
    private_scopes: Vec<PrivateScope>,
    depth: u32,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, source_name: &str, string_dict: &'a mut StringDict) -> Self {
        let mut lexer = Lexer::new(source, string_dict);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            previous: Token::eof(0, 1, 1),
            source_name: source_name.to_string(),
            errors: Vec::new(),
            ctx: Context::default(),
            no_in: false,
            next_scope: 0,
            cover_init: Vec::new(),
            private_scopes: Vec::new(),
            depth: 0,
        }
    }

    /// Parse a complete script
    pub fn parse_script(mut self, strict: bool) -> Result<Script, JsError> {
        let start = self.current.span;
        self.ctx.strict = strict;
        let scope = self.new_scope();
        let (body, _) = self.parse_directives_and_body(|p| p.is_at_end());
        let strict = self.ctx.strict;
        let span = self.span_from(start);
        let source_mapping_url = self.lexer.source_mapping_url().map(str::to_string);
        self.finish()?;
        Ok(Script {
            body,
            strict,
            scope,
            scope_count: self.next_scope,
            source_mapping_url,
            span,
        })
    }

    /// Fold lexer and parser diagnostics into the final result
    fn finish(&mut self) -> Result<(), JsError> {
        for err in self.lexer.take_errors() {
            self.errors.push(ParseError {
                source_name: self.source_name.clone(),
                line: err.span.line,
                column: err.span.column,
                message: err.message,
            });
        }
        if self.errors.is_empty() {
            return Ok(());
        }
        self.errors.sort_by_key(|e| (e.line, e.column));
        self.errors
            .dedup_by(|a, b| a.line == b.line && a.column == b.column);
        Err(JsError::Parse(ParseErrors(std::mem::take(&mut self.errors))))
    }

    // ============ DIAGNOSTICS ============

    fn error_at(&mut self, span: Span, message: impl Into<String>) -> Failed {
        self.errors.push(ParseError {
            source_name: self.source_name.clone(),
            line: span.line,
            column: span.column,
            message: message.into(),
        });
        Failed
    }

    /// Descend one level of nesting
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING {
            let span = self.current.span;
            return Err(self.error_at(span, "Maximum nesting depth exceeded"));
        }
        self.depth += 1;
        let result = crate::stack::guard(|| f(self));
        self.depth -= 1;
        result
    }

    fn unexpected(&mut self) -> Failed {
        let span = self.current.span;
        let message = match &self.current.kind {
            TokenKind::Eof => "Unexpected end of input".to_string(),
            TokenKind::Invalid(_) => return Failed,
            _ => format!("Unexpected token '{}'", self.current_text()),
        };
        self.error_at(span, message)
    }

    fn current_text(&self) -> &str {
        self.lexer
            .source()
            .get(self.current.span.start..self.current.span.end)
            .unwrap_or("")
    }

    /// Skip to a plausible statement start after an error. Always makes
    /// progress past `stmt_start` unless the input is exhausted.
    fn synchronize(&mut self, stmt_start: usize) {
        loop {
            let progressed = self.current.span.start != stmt_start;
            match &self.current.kind {
                TokenKind::Eof => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace if progressed => return,
                TokenKind::Var
                | TokenKind::Const
                | TokenKind::Function
                | TokenKind::Class
                | TokenKind::If
                | TokenKind::For
                | TokenKind::While
                | TokenKind::Do
                | TokenKind::Return
                | TokenKind::Try
                | TokenKind::Throw
                | TokenKind::Switch
                    if progressed =>
                {
                    return;
                }
                _ if self.current.newline_before && progressed => return,
                _ => self.advance(),
            }
        }
    }

    // ============ TOKENS ============

    fn advance(&mut self) {
        let next = self.lexer.next_token();
        self.previous = std::mem::replace(&mut self.current, next);
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current.kind == *kind
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn require_token(&mut self, kind: &TokenKind) -> PResult<()> {
        if self.match_token(kind) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    /// Unescaped contextual keyword such as `of`, `async`, `get`
    fn check_contextual(&self, name: &str) -> bool {
        self.current.is_contextual(name)
    }

    fn match_contextual(&mut self, name: &str) -> bool {
        if self.check_contextual(name) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Look at the token after the current one
    fn peek(&mut self) -> Token {
        let checkpoint = self.lexer.checkpoint();
        let token = self.lexer.next_token();
        self.lexer.restore(checkpoint);
        token
    }

    fn is_at_end(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    /// Automatic semicolon insertion
    fn expect_semicolon(&mut self) -> PResult<()> {
        if self.match_token(&TokenKind::Semicolon) {
            return Ok(());
        }
        if matches!(self.current.kind, TokenKind::RBrace | TokenKind::Eof)
            || self.current.newline_before
        {
            return Ok(());
        }
        Err(self.unexpected())
    }

    fn span_from(&self, start: Span) -> Span {
        start.to(self.previous.span)
    }

    fn new_scope(&mut self) -> ScopeId {
        let id = ScopeId(self.next_scope);
        self.next_scope += 1;
        id
    }

    fn with_no_in<T>(&mut self, no_in: bool, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.no_in, no_in);
        let result = f(self);
        self.no_in = saved;
        result
    }

    // ============ IDENTIFIERS ============

    /// Words that cannot be identifiers in strict code
    fn is_strict_reserved(name: &JsString) -> bool {
        [
            "implements",
            "interface",
            "let",
            "package",
            "private",
            "protected",
            "public",
            "static",
            "yield",
        ]
        .iter()
        .any(|w| *name == **w)
    }

    /// The current token can start an IdentifierReference
    fn check_identifier(&self) -> bool {
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                !(self.ctx.in_async && *name == "await" || self.ctx.in_generator && *name == "yield")
            }
            _ => false,
        }
    }

    /// Parse an identifier used as a reference or binding
    fn parse_identifier(&mut self) -> PResult<Identifier> {
        let span = self.current.span;
        let name = match &self.current.kind {
            TokenKind::Identifier(name) => name.clone(),
            TokenKind::EscapedKeyword(name) => {
                let name = name.clone();
                self.advance();
                return Err(self.error_at(
                    span,
                    format!("Keyword must not contain escaped characters: '{name}'"),
                ));
            }
            _ => return Err(self.unexpected()),
        };
        self.advance();
        self.validate_identifier(&name, span)?;
        Ok(Identifier { name, span })
    }

    fn validate_identifier(&mut self, name: &JsString, span: Span) -> PResult<()> {
        if self.ctx.strict && Self::is_strict_reserved(name) {
            return Err(self.error_at(
                span,
                format!("Unexpected strict mode reserved word '{name}'"),
            ));
        }
        if *name == "yield" && (self.ctx.in_generator || self.ctx.strict) {
            return Err(self.error_at(span, "Unexpected identifier 'yield'"));
        }
        if *name == "await" && self.ctx.in_async {
            return Err(self.error_at(span, "Unexpected reserved word 'await'"));
        }
        if *name == "arguments" && self.ctx.in_class_field {
            return Err(self.error_at(
                span,
                "'arguments' is not allowed in class field initializer or static initialization block",
            ));
        }
        Ok(())
    }

    /// Identifier that introduces a binding
    fn parse_binding_identifier(&mut self) -> PResult<Identifier> {
        let id = self.parse_identifier()?;
        self.validate_binding_name(&id)?;
        Ok(id)
    }

    fn validate_binding_name(&mut self, id: &Identifier) -> PResult<()> {
        if self.ctx.strict && (id.name == "eval" || id.name == "arguments") {
            return Err(self.error_at(
                id.span,
                format!("Unexpected eval or arguments in strict mode: '{}'", id.name),
            ));
        }
        Ok(())
    }

    /// Any IdentifierName (reserved words included): property names
    fn parse_identifier_name(&mut self) -> PResult<JsString> {
        match self.current.kind.identifier_name() {
            Some(name) => {
                self.advance();
                Ok(name)
            }
            None => Err(self.unexpected()),
        }
    }

    // ============ PRIVATE NAMES ============

    fn declare_private(&mut self, name: &JsString, kind: PrivateKind, span: Span) -> PResult<()> {
        let Some(scope) = self.private_scopes.last_mut() else {
            return Err(self.error_at(span, "Private field must be declared in an enclosing class"));
        };
        if let Some(existing) = scope.declared.iter_mut().find(|(n, _)| n == name) {
            let merged = match (existing.1, kind) {
                (PrivateKind::Getter, PrivateKind::Setter)
                | (PrivateKind::Setter, PrivateKind::Getter) => Some(PrivateKind::Accessor),
                _ => None,
            };
            return match merged {
                Some(k) => {
                    existing.1 = k;
                    Ok(())
                }
                None => Err(self.error_at(
                    span,
                    format!("Identifier '#{name}' has already been declared"),
                )),
            };
        }
        scope.declared.push((name.clone(), kind));
        Ok(())
    }

    fn use_private(&mut self, name: &JsString, span: Span) -> PResult<()> {
        match self.private_scopes.last_mut() {
            Some(scope) => {
                scope.used.push((name.clone(), span));
                Ok(())
            }
            None => Err(self.error_at(
                span,
                format!("Private field '#{name}' must be declared in an enclosing class"),
            )),
        }
    }

    /// Resolve references at the end of a class body; unresolved names move
    /// to the enclosing class or become errors
    fn close_private_scope(&mut self) {
        let Some(scope) = self.private_scopes.pop() else {
            return;
        };
        for (name, span) in scope.used {
            if scope.declared.iter().any(|(n, _)| *n == name) {
                continue;
            }
            match self.private_scopes.last_mut() {
                Some(outer) => outer.used.push((name, span)),
                None => {
                    self.error_at(
                        span,
                        format!("Private field '#{name}' must be declared in an enclosing class"),
                    );
                }
            }
        }
    }

    // ============ COVER GRAMMAR ============

    /// Report cover-grammar errors for literals that never became patterns
    fn flush_cover_init(&mut self) {
        for (span, message) in std::mem::take(&mut self.cover_init) {
            self.error_at(span, message);
        }
    }

    /// Drop the pending cover error recorded at exactly `span`
    fn clear_cover_init(&mut self, span: Span) {
        self.cover_init
            .retain(|(s, _)| s.start != span.start || s.end != span.end);
    }
}

/// Parse a script, collecting every syntax error
pub fn parse(
    source: &str,
    source_name: &str,
    strict: bool,
    string_dict: &mut StringDict,
) -> Result<Script, JsError> {
    Parser::new(source, source_name, string_dict).parse_script(strict)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Script {
        let mut dict = StringDict::new();
        match parse(source, "test.js", false, &mut dict) {
            Ok(script) => script,
            Err(err) => panic!("unexpected parse error for {source:?}: {err}"),
        }
    }

    fn parse_err(source: &str) -> ParseErrors {
        let mut dict = StringDict::new();
        match parse(source, "test.js", false, &mut dict) {
            Ok(_) => panic!("expected a syntax error for {source:?}"),
            Err(JsError::Parse(errors)) => errors,
            Err(other) => panic!("unexpected error kind: {other}"),
        }
    }

    #[test]
    fn test_variable_declaration() {
        let script = parse_ok("let x = 1, y; const z = x;");
        assert_eq!(script.body.len(), 2);
        assert!(matches!(&script.body[0], Statement::Variable(v) if v.declarations.len() == 2));
    }

    #[test]
    fn test_arrow_reinterpretation() {
        let script = parse_ok("const f = (a, {b, c = 2}, [d], ...e) => a;");
        let Statement::Variable(decl) = &script.body[0] else {
            panic!("expected declaration");
        };
        let Some(Expression::ArrowFunction(f)) = &decl.declarations[0].init else {
            panic!("expected arrow");
        };
        assert_eq!(f.params.len(), 3);
        assert!(f.rest.is_some());
        assert!(!f.simple_params);
    }

    #[test]
    fn test_parenthesized_is_not_arrow() {
        let script = parse_ok("(a, b);");
        let Statement::Expression(e) = &script.body[0] else {
            panic!("expected expression");
        };
        assert!(matches!(e.expression, Expression::Parenthesized(..)));
    }

    #[test]
    fn test_nullish_mixing_is_error() {
        parse_err("a && b ?? c");
        parse_err("a ?? b || c");
        parse_ok("(a && b) ?? c");
        parse_ok("a ?? (b || c)");
    }

    #[test]
    fn test_errors_are_collected_with_recovery() {
        let errors = parse_err("let = ;\nvar ok = 1;\nif (;\n");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.first().map(|e| e.line), Some(1));
    }

    #[test]
    fn test_escaped_keyword_rejected() {
        parse_err("var x = 1; i\\u0066 (x) {}");
    }

    #[test]
    fn test_labels() {
        parse_ok("outer: for (;;) { inner: for (;;) { continue outer; } }");
        parse_err("for (;;) { break missing; }");
        parse_err("lbl: { continue lbl; }");
        parse_err("break;");
    }

    #[test]
    fn test_for_heads() {
        parse_ok("for (var i = 0; i < 3; i++) {}");
        parse_ok("for (const k in o) {}");
        parse_ok("for (let [a, b] of pairs) {}");
        parse_ok("for (x.y of list) {}");
        parse_err("for (let k = 1 in o) {}");
        parse_err("for (const v = 0 of list) {}");
    }

    #[test]
    fn test_class_rules() {
        parse_ok("class A extends B { #x = 1; static #y; get x() { return this.#x; } constructor() { super(); } }");
        parse_err("class A { constructor() {} constructor() {} }");
        parse_err("class A { get constructor() {} }");
        parse_err("class A { m() { this.#missing; } }");
        parse_err("class A { constructor() { super(); } }");
        parse_err("class A { #a; #a; }");
    }

    #[test]
    fn test_strict_mode_rules() {
        parse_err("'use strict'; var eval = 1;");
        parse_err("'use strict'; with (o) {}");
        parse_err("function f(a, a) { 'use strict'; }");
        parse_ok("function f(a, a) {}");
        parse_err("'use strict'; 010");
    }

    #[test]
    fn test_cover_initializer() {
        parse_ok("({a = 1} = {});");
        parse_err("({a = 1});");
    }

    #[test]
    fn test_template_and_regex() {
        parse_ok("tag`a${b}c${d}e`; x = /ab+c/gi.test(s);");
        parse_err("`bad \\unicode`");
        parse_ok("tag`bad \\unicode`");
        parse_err("/a/gg");
    }

    #[test]
    fn test_asi() {
        let script = parse_ok("a = 1\nb = 2\nreturn_ = 3");
        assert_eq!(script.body.len(), 3);
        parse_err("a = 1 b = 2");
    }

    #[test]
    fn test_source_mapping_url_is_recorded() {
        let script = parse_ok("x;\n//# sourceMappingURL=out.js.map");
        assert_eq!(script.source_mapping_url.as_deref(), Some("out.js.map"));
    }
}
