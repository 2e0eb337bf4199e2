//! Functions, arrows, methods and classes

use super::{Context, PResult, Parser, PrivateKind, PrivateScope};
use crate::ast::*;
use crate::lexer::{Span, TokenKind};
use crate::string::JsString;

/// Parameter list shared by every function form
struct Params {
    params: Vec<Pattern>,
    rest: Option<Pattern>,
}

impl Params {
    fn is_simple(&self) -> bool {
        self.rest.is_none() && self.params.iter().all(|p| matches!(p, Pattern::Identifier(_)))
    }
}

impl<'a> Parser<'a> {
    /// Switch to a fresh function context, returning the one to restore
    fn enter_function(&mut self, kind: FunctionKind, is_async: bool, is_generator: bool) -> Context {
        let outer = std::mem::take(&mut self.ctx);
        let is_arrow = kind == FunctionKind::Arrow;
        self.ctx = Context {
            strict: outer.strict,
            in_function: kind != FunctionKind::ClassStaticBlock,
            in_generator: is_generator,
            in_async: is_async,
            allow_super_call: if is_arrow {
                outer.allow_super_call
            } else {
                kind == FunctionKind::DerivedConstructor
            },
            allow_super_property: kind.has_home_object() || is_arrow && outer.allow_super_property,
            allow_new_target: !is_arrow || outer.allow_new_target,
            in_class_field: kind == FunctionKind::ClassStaticBlock
                || is_arrow && outer.in_class_field,
            in_params: false,
            labels: Vec::new(),
            breakable: 0,
            iteration: 0,
        };
        outer
    }

    pub(super) fn parse_function_declaration(&mut self, is_async: bool) -> PResult<Function> {
        let start = self.current.span;
        if is_async {
            self.advance();
        }
        self.require_token(&TokenKind::Function)?;
        let is_generator = self.match_token(&TokenKind::Star);
        let id = self.parse_binding_identifier()?;
        self.parse_function_rest(start, Some(id), FunctionKind::Normal, is_async, is_generator)
    }

    pub(super) fn parse_function_expression(&mut self, is_async: bool) -> PResult<Function> {
        let start = self.current.span;
        if is_async {
            self.advance();
        }
        self.require_token(&TokenKind::Function)?;
        let is_generator = self.match_token(&TokenKind::Star);
        let id = if matches!(
            self.current.kind,
            TokenKind::Identifier(_) | TokenKind::EscapedKeyword(_)
        ) {
            // The name of a generator or async expression is bound inside it
            let saved = (self.ctx.in_generator, self.ctx.in_async);
            self.ctx.in_generator = is_generator;
            self.ctx.in_async = is_async;
            let id = self.parse_binding_identifier();
            (self.ctx.in_generator, self.ctx.in_async) = saved;
            Some(id?)
        } else {
            None
        };
        self.parse_function_rest(start, id, FunctionKind::Normal, is_async, is_generator)
    }

    /// Object literal or class method, accessor or constructor; the key has
    /// been consumed
    pub(super) fn parse_method(
        &mut self,
        start: Span,
        kind: FunctionKind,
        is_async: bool,
        is_generator: bool,
    ) -> PResult<Function> {
        let function = self.parse_function_rest(start, None, kind, is_async, is_generator)?;
        match kind {
            FunctionKind::Getter if !function.params.is_empty() || function.rest.is_some() => {
                Err(self.error_at(start, "Getter must not have any formal parameters."))
            }
            FunctionKind::Setter if function.rest.is_some() => Err(self.error_at(
                start,
                "Setter function argument must not be a rest parameter",
            )),
            FunctionKind::Setter if function.params.len() != 1 => {
                Err(self.error_at(start, "Setter must have exactly one formal parameter."))
            }
            _ => Ok(function),
        }
    }

    /// Parameters and body of any non-arrow function
    fn parse_function_rest(
        &mut self,
        start: Span,
        id: Option<Identifier>,
        kind: FunctionKind,
        is_async: bool,
        is_generator: bool,
    ) -> PResult<Function> {
        let outer = self.enter_function(kind, is_async, is_generator);
        let scope = self.new_scope();
        let result = self.parse_params_and_body(kind);
        let strict = self.ctx.strict;
        self.ctx = outer;
        let (params, body, has_use_strict) = result?;

        let simple_params = params.is_simple();
        self.validate_function(
            id.as_ref(),
            &params,
            kind,
            strict,
            has_use_strict,
        )?;
        Ok(Function {
            id,
            params: params.params,
            rest: params.rest,
            body: FunctionBody::Block(body),
            kind,
            is_async,
            is_generator,
            strict,
            simple_params,
            scope,
            span: self.span_from(start),
        })
    }

    fn parse_params_and_body(
        &mut self,
        kind: FunctionKind,
    ) -> PResult<(Params, Vec<Statement>, bool)> {
        let params = if kind == FunctionKind::ClassStaticBlock {
            Params {
                params: Vec::new(),
                rest: None,
            }
        } else {
            self.parse_formal_parameters()?
        };
        let (body, has_use_strict) = self.parse_function_body()?;
        Ok((params, body, has_use_strict))
    }

    fn parse_formal_parameters(&mut self) -> PResult<Params> {
        self.require_token(&TokenKind::LParen)?;
        self.ctx.in_params = true;
        let result = self.with_no_in(false, |p| -> PResult<Params> {
            let mut params = Vec::new();
            let mut rest = None;
            while !p.check(&TokenKind::RParen) {
                if p.match_token(&TokenKind::DotDotDot) {
                    rest = Some(p.parse_binding_target()?);
                    if p.check(&TokenKind::Eq) {
                        let span = p.current.span;
                        return Err(
                            p.error_at(span, "Rest parameter may not have a default initializer")
                        );
                    }
                    if !p.check(&TokenKind::RParen) {
                        let span = p.current.span;
                        return Err(
                            p.error_at(span, "Rest parameter must be last formal parameter")
                        );
                    }
                    break;
                }
                params.push(p.parse_binding_element()?);
                if !p.check(&TokenKind::RParen) {
                    p.require_token(&TokenKind::Comma)?;
                }
            }
            Ok(Params { params, rest })
        });
        self.ctx.in_params = false;
        let params = result?;
        self.require_token(&TokenKind::RParen)?;
        Ok(params)
    }

    /// `{ ... }` function body; returns the statements and whether it
    /// declared `"use strict"`
    fn parse_function_body(&mut self) -> PResult<(Vec<Statement>, bool)> {
        self.require_token(&TokenKind::LBrace)?;
        let saved_cover = std::mem::take(&mut self.cover_init);
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let (body, has_use_strict) = self.parse_directives_and_body(|p| p.check(&TokenKind::RBrace));
        self.no_in = saved_no_in;
        self.cover_init = saved_cover;
        self.require_token(&TokenKind::RBrace)?;
        Ok((body, has_use_strict))
    }

    /// Early errors that depend on the final strictness of a function
    fn validate_function(
        &mut self,
        id: Option<&Identifier>,
        params: &Params,
        kind: FunctionKind,
        strict: bool,
        has_use_strict: bool,
    ) -> PResult<()> {
        let simple = params.is_simple();
        if has_use_strict && !simple {
            let span = params
                .params
                .first()
                .map(Pattern::span)
                .or(params.rest.as_ref().map(Pattern::span))
                .unwrap_or_default();
            return Err(self.error_at(
                span,
                "Illegal 'use strict' directive in function with non-simple parameter list",
            ));
        }

        if strict {
            if let Some(id) = id {
                if id.name == "eval" || id.name == "arguments" {
                    return Err(self.error_at(
                        id.span,
                        format!("Unexpected eval or arguments in strict mode: '{}'", id.name),
                    ));
                }
            }
        }

        let mut names = Vec::new();
        for p in &params.params {
            p.bound_names(&mut names);
        }
        if let Some(rest) = &params.rest {
            rest.bound_names(&mut names);
        }

        let unique_required = strict
            || !simple
            || !matches!(kind, FunctionKind::Normal);
        for (i, name) in names.iter().enumerate() {
            if strict {
                if name.name == "eval" || name.name == "arguments" {
                    return Err(self.error_at(
                        name.span,
                        format!("Unexpected eval or arguments in strict mode: '{}'", name.name),
                    ));
                }
                if Self::is_strict_reserved(&name.name) {
                    return Err(self.error_at(
                        name.span,
                        format!("Unexpected strict mode reserved word '{}'", name.name),
                    ));
                }
            }
            if unique_required && names.iter().take(i).any(|n| n.name == name.name) {
                return Err(self.error_at(
                    name.span,
                    "Duplicate parameter name not allowed in this context",
                ));
            }
        }
        Ok(())
    }

    // ============ ARROWS ============

    /// Arrow function whose parameters have already been parsed
    pub(super) fn parse_arrow_function(
        &mut self,
        start: Span,
        params: Vec<Pattern>,
        rest: Option<Pattern>,
        is_async: bool,
    ) -> PResult<Expression> {
        if self.current.newline_before {
            return Err(self.unexpected());
        }
        self.require_token(&TokenKind::Arrow)?;
        let params = Params { params, rest };

        let outer = self.enter_function(FunctionKind::Arrow, is_async, false);
        let scope = self.new_scope();
        let result = if self.check(&TokenKind::LBrace) {
            self.parse_function_body()
                .map(|(body, strict)| (FunctionBody::Block(body), strict))
        } else {
            self.parse_assignment_expression()
                .map(|e| (FunctionBody::Expression(Box::new(e)), false))
        };
        let strict = self.ctx.strict;
        self.ctx = outer;
        let (body, has_use_strict) = result?;

        self.validate_function(None, &params, FunctionKind::Arrow, strict, has_use_strict)?;
        let simple_params = params.is_simple();
        Ok(Expression::ArrowFunction(Box::new(Function {
            id: None,
            params: params.params,
            rest: params.rest,
            body,
            kind: FunctionKind::Arrow,
            is_async,
            is_generator: false,
            strict,
            simple_params,
            scope,
            span: self.span_from(start),
        })))
    }

    // ============ CLASSES ============

    pub(super) fn parse_class(&mut self, is_declaration: bool) -> PResult<Class> {
        let start = self.current.span;
        self.advance();

        let outer_strict = std::mem::replace(&mut self.ctx.strict, true);
        let result = self.parse_class_inner(start, is_declaration);
        self.ctx.strict = outer_strict;
        result
    }

    fn parse_class_inner(&mut self, start: Span, is_declaration: bool) -> PResult<Class> {
        let id = if matches!(
            self.current.kind,
            TokenKind::Identifier(_) | TokenKind::EscapedKeyword(_)
        ) {
            Some(self.parse_binding_identifier()?)
        } else {
            None
        };
        if is_declaration && id.is_none() {
            return Err(self.unexpected());
        }
        let scope = self.new_scope();

        let super_class = if self.match_token(&TokenKind::Extends) {
            Some(Box::new(self.parse_lhs_expression()?))
        } else {
            None
        };
        let derived = super_class.is_some();

        self.require_token(&TokenKind::LBrace)?;
        let instance_init_scope = self.new_scope();
        let static_init_scope = self.new_scope();

        self.private_scopes.push(PrivateScope::default());
        let body = self.parse_class_body(derived);
        self.close_private_scope();
        let (constructor, members) = body?;

        self.require_token(&TokenKind::RBrace)?;
        Ok(Class {
            id,
            super_class,
            constructor,
            members,
            scope,
            instance_init_scope,
            static_init_scope,
            span: self.span_from(start),
        })
    }

    fn parse_class_body(
        &mut self,
        derived: bool,
    ) -> PResult<(Option<Box<Function>>, Vec<ClassMember>)> {
        let mut constructor = None;
        let mut members = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.match_token(&TokenKind::Semicolon) {
                continue;
            }
            let start = self.current.span;
            match self.parse_class_member(derived)? {
                ClassElement::Member(member) => members.push(member),
                ClassElement::Constructor(function) => {
                    if constructor.is_some() {
                        return Err(self.error_at(start, "A class may only have one constructor"));
                    }
                    constructor = Some(Box::new(function));
                }
            }
        }
        Ok((constructor, members))
    }

    fn parse_class_member(&mut self, derived: bool) -> PResult<ClassElement> {
        let start = self.current.span;

        let mut is_static = false;
        if self.check_contextual("static") && self.modifier_applies() {
            self.advance();
            if self.check(&TokenKind::LBrace) {
                let block = self.parse_static_block(start)?;
                return Ok(ClassElement::Member(ClassMember::StaticBlock(Box::new(block))));
            }
            is_static = true;
        }

        let mut is_async = false;
        let mut is_generator = false;
        let mut accessor = None;
        if self.check_contextual("async") && self.modifier_applies() {
            self.advance();
            is_async = true;
        } else if (self.check_contextual("get") || self.check_contextual("set"))
            && self.modifier_applies()
        {
            accessor = Some(if self.check_contextual("get") {
                MethodKind::Get
            } else {
                MethodKind::Set
            });
            self.advance();
        }
        if accessor.is_none() && self.match_token(&TokenKind::Star) {
            is_generator = true;
        }

        let key_span = self.current.span;
        let key = if let TokenKind::PrivateName(name) = &self.current.kind {
            let name = name.clone();
            if name == "constructor" {
                return Err(self.error_at(key_span, "Classes may not have a private field named '#constructor'"));
            }
            self.advance();
            PropertyName::Private(name)
        } else {
            self.parse_property_name()?
        };

        let is_method = accessor.is_some() || is_async || is_generator || self.check(&TokenKind::LParen);
        if !is_method {
            return self.parse_class_field(start, key, key_span, is_static);
        }

        if is_static && key.is_static_name("prototype") {
            return Err(self.error_at(
                key_span,
                "Classes may not have a static property named 'prototype'",
            ));
        }

        if !is_static && key.is_static_name("constructor") {
            let problem = if accessor.is_some() {
                Some("Class constructor may not be an accessor")
            } else if is_generator {
                Some("Class constructor may not be a generator")
            } else if is_async {
                Some("Class constructor may not be an async method")
            } else {
                None
            };
            if let Some(message) = problem {
                return Err(self.error_at(key_span, message));
            }
            let kind = if derived {
                FunctionKind::DerivedConstructor
            } else {
                FunctionKind::ClassConstructor
            };
            let function = self.parse_method(start, kind, false, false)?;
            return Ok(ClassElement::Constructor(function));
        }

        let method_kind = accessor.unwrap_or(MethodKind::Method);
        if let PropertyName::Private(name) = &key {
            let private_kind = match method_kind {
                MethodKind::Method => PrivateKind::Method,
                MethodKind::Get => PrivateKind::Getter,
                MethodKind::Set => PrivateKind::Setter,
            };
            let name = name.clone();
            self.declare_private(&name, private_kind, key_span)?;
        }
        let fn_kind = match method_kind {
            MethodKind::Method => FunctionKind::Method,
            MethodKind::Get => FunctionKind::Getter,
            MethodKind::Set => FunctionKind::Setter,
        };
        let function = self.parse_method(start, fn_kind, is_async, is_generator)?;
        Ok(ClassElement::Member(ClassMember::Method(ClassMethod {
            key,
            function: Box::new(function),
            kind: method_kind,
            is_static,
            span: self.span_from(start),
        })))
    }

    fn parse_class_field(
        &mut self,
        start: Span,
        key: PropertyName,
        key_span: Span,
        is_static: bool,
    ) -> PResult<ClassElement> {
        if key.is_static_name("constructor") {
            return Err(self.error_at(key_span, "Classes may not have a field named 'constructor'"));
        }
        if is_static && key.is_static_name("prototype") {
            return Err(self.error_at(
                key_span,
                "Classes may not have a static property named 'prototype'",
            ));
        }
        if let PropertyName::Private(name) = &key {
            let name: JsString = name.clone();
            self.declare_private(&name, PrivateKind::Field, key_span)?;
        }

        let value = if self.match_token(&TokenKind::Eq) {
            // Initializers run as methods of the instance (or the class)
            let outer = self.enter_function(FunctionKind::Method, false, false);
            self.ctx.in_function = false;
            self.ctx.in_class_field = true;
            let value = self.with_no_in(false, |p| p.parse_assignment_expression());
            self.ctx = outer;
            Some(value?)
        } else {
            None
        };
        self.expect_semicolon()?;

        Ok(ClassElement::Member(ClassMember::Field(ClassField {
            key,
            value,
            is_static,
            span: self.span_from(start),
        })))
    }

    fn parse_static_block(&mut self, start: Span) -> PResult<Function> {
        let outer = self.enter_function(FunctionKind::ClassStaticBlock, false, false);
        let scope = self.new_scope();
        let result = self.parse_function_body();
        self.ctx = outer;
        let (body, _) = result?;
        Ok(Function {
            id: None,
            params: Vec::new(),
            rest: None,
            body: FunctionBody::Block(body),
            kind: FunctionKind::ClassStaticBlock,
            is_async: false,
            is_generator: false,
            strict: true,
            simple_params: true,
            scope,
            span: self.span_from(start),
        })
    }
}

enum ClassElement {
    Member(ClassMember),
    Constructor(Function),
}
