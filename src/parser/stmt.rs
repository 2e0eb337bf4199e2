//! Statements and declarations

use super::{Failed, Label, PResult, Parser};
use crate::ast::*;
use crate::lexer::{Span, TokenKind};

impl<'a> Parser<'a> {
    /// Parse a statement list up to `at_end`, honouring a leading
    /// `"use strict"` directive. Returns the statements and whether the
    /// prologue contained that directive.
    pub(super) fn parse_directives_and_body(
        &mut self,
        at_end: fn(&Self) -> bool,
    ) -> (Vec<Statement>, bool) {
        let mut body = Vec::new();
        let mut in_prologue = true;
        let mut prologue_octal: Option<Span> = None;
        let mut has_use_strict = false;

        while !at_end(self) && !self.is_at_end() {
            let stmt_start = self.current.span;
            let directive = in_prologue && matches!(self.current.kind, TokenKind::String(_));
            if directive && self.current.legacy_octal {
                prologue_octal.get_or_insert(stmt_start);
            }
            match self.parse_statement_list_item() {
                Ok(stmt) => {
                    if in_prologue {
                        match self.directive_text(&stmt) {
                            Some(text) => {
                                if text == "'use strict'" || text == "\"use strict\"" {
                                    has_use_strict = true;
                                    self.ctx.strict = true;
                                    if let Some(span) = prologue_octal {
                                        self.error_at(
                                            span,
                                            "Octal escape sequences are not allowed in strict mode",
                                        );
                                    }
                                    if self.current.legacy_octal {
                                        let span = self.current.span;
                                        self.error_at(
                                            span,
                                            "Octal literals are not allowed in strict mode",
                                        );
                                    }
                                }
                            }
                            None => in_prologue = false,
                        }
                    }
                    body.push(stmt);
                }
                Err(Failed) => {
                    in_prologue = false;
                    self.synchronize(stmt_start.start);
                }
            }
            self.flush_cover_init();
        }
        (body, has_use_strict)
    }

    /// Source text of a directive: an expression statement made of a lone
    /// string literal
    fn directive_text(&self, stmt: &Statement) -> Option<&'a str> {
        let Statement::Expression(es) = stmt else {
            return None;
        };
        let Expression::Literal(Literal {
            value: LiteralValue::String(_),
            span,
        }) = &es.expression
        else {
            return None;
        };
        self.lexer.source().get(span.start..span.end)
    }

    /// Statements inside `{ ... }` with per-statement recovery
    pub(super) fn parse_statement_list_until_rbrace(&mut self) -> Vec<Statement> {
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let stmt_start = self.current.span.start;
            match self.parse_statement_list_item() {
                Ok(stmt) => body.push(stmt),
                Err(Failed) => self.synchronize(stmt_start),
            }
            self.flush_cover_init();
        }
        body
    }

    /// StatementListItem: a statement or a declaration
    pub(super) fn parse_statement_list_item(&mut self) -> PResult<Statement> {
        if self.is_let_declaration() {
            let decl = self.parse_variable_declaration(VariableKind::Let, false)?;
            self.expect_semicolon()?;
            return Ok(Statement::Variable(decl));
        }
        if self.is_async_function() {
            let f = self.parse_function_declaration(true)?;
            return Ok(Statement::FunctionDeclaration(Box::new(f)));
        }
        match &self.current.kind {
            TokenKind::Function => {
                let f = self.parse_function_declaration(false)?;
                Ok(Statement::FunctionDeclaration(Box::new(f)))
            }
            TokenKind::Class => {
                let c = self.parse_class(true)?;
                Ok(Statement::ClassDeclaration(Box::new(c)))
            }
            TokenKind::Const => {
                let decl = self.parse_variable_declaration(VariableKind::Const, false)?;
                self.expect_semicolon()?;
                Ok(Statement::Variable(decl))
            }
            _ => self.parse_statement(),
        }
    }

    /// `let` followed by something that can only start a binding
    pub(super) fn is_let_declaration(&mut self) -> bool {
        if !self.check_contextual("let") {
            return false;
        }
        let next = self.peek();
        match &next.kind {
            TokenKind::LBrace | TokenKind::LBracket => true,
            TokenKind::Identifier(_) | TokenKind::EscapedKeyword(_) => true,
            _ => false,
        }
    }

    /// `async function` with no line break between the two
    pub(super) fn is_async_function(&mut self) -> bool {
        if !self.check_contextual("async") {
            return false;
        }
        let next = self.peek();
        next.kind == TokenKind::Function && !next.newline_before
    }

    /// Statement position: declarations other than `var` are not allowed
    pub(super) fn parse_statement(&mut self) -> PResult<Statement> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> PResult<Statement> {
        let start = self.current.span;
        if self.is_let_declaration() {
            return Err(self.error_at(
                start,
                "Lexical declaration cannot appear in a single-statement context",
            ));
        }
        if matches!(self.current.kind, TokenKind::Identifier(_))
            && self.peek().kind == TokenKind::Colon
        {
            return self.parse_labeled_statement();
        }
        match &self.current.kind {
            TokenKind::LBrace => Ok(Statement::Block(self.parse_block()?)),
            TokenKind::Var => {
                let decl = self.parse_variable_declaration(VariableKind::Var, false)?;
                self.expect_semicolon()?;
                Ok(Statement::Variable(decl))
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::Empty(start))
            }
            TokenKind::If => self.parse_if_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Break => self.parse_break_statement(),
            TokenKind::Continue => self.parse_continue_statement(),
            TokenKind::Throw => self.parse_throw_statement(),
            TokenKind::Try => self.parse_try_statement(),
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::With => self.parse_with_statement(),
            TokenKind::Debugger => {
                self.advance();
                self.expect_semicolon()?;
                Ok(Statement::Debugger(self.span_from(start)))
            }
            TokenKind::Function | TokenKind::Class | TokenKind::Const => Err(self.error_at(
                start,
                "Declarations are not allowed in single-statement context",
            )),
            TokenKind::Import | TokenKind::Export => {
                Err(self.error_at(start, "Cannot use import statement outside a module"))
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_expression_statement(&mut self) -> PResult<Statement> {
        let start = self.current.span;
        let expression = self.parse_expression()?;
        self.expect_semicolon()?;
        Ok(Statement::Expression(ExpressionStatement {
            expression,
            span: self.span_from(start),
        }))
    }

    // ============ DECLARATIONS ============

    /// `var`/`let`/`const` declaration list. In a for-statement head the
    /// missing-initializer checks are left to the caller.
    pub(super) fn parse_variable_declaration(
        &mut self,
        kind: VariableKind,
        in_for_head: bool,
    ) -> PResult<VariableDeclaration> {
        let start = self.current.span;
        self.advance();
        let mut declarations = Vec::new();
        loop {
            let decl_start = self.current.span;
            let id = self.parse_binding_target()?;
            if kind != VariableKind::Var {
                let mut names = Vec::new();
                id.bound_names(&mut names);
                if let Some(bad) = names.iter().find(|n| n.name == "let") {
                    let span = bad.span;
                    return Err(
                        self.error_at(span, "let is disallowed as a lexically bound name")
                    );
                }
            }
            let init = if self.match_token(&TokenKind::Eq) {
                Some(self.parse_assignment_expression()?)
            } else {
                None
            };
            let span = self.span_from(decl_start);
            let declarator = VariableDeclarator { id, init, span };
            if !in_for_head {
                self.check_declarator_initializer(kind, &declarator)?;
            }
            declarations.push(declarator);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        Ok(VariableDeclaration {
            kind,
            declarations,
            span: self.span_from(start),
        })
    }

    pub(super) fn check_declarator_initializer(
        &mut self,
        kind: VariableKind,
        declarator: &VariableDeclarator,
    ) -> PResult<()> {
        if declarator.init.is_some() {
            return Ok(());
        }
        if kind == VariableKind::Const {
            return Err(self.error_at(declarator.span, "Missing initializer in const declaration"));
        }
        if !matches!(declarator.id, Pattern::Identifier(_)) {
            return Err(self.error_at(
                declarator.span,
                "Missing initializer in destructuring declaration",
            ));
        }
        Ok(())
    }

    // ============ BLOCKS & CONTROL FLOW ============

    pub(super) fn parse_block(&mut self) -> PResult<BlockStatement> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;
        let scope = self.new_scope();
        let body = self.parse_statement_list_until_rbrace();
        self.require_token(&TokenKind::RBrace)?;
        Ok(BlockStatement {
            body,
            scope,
            span: self.span_from(start),
        })
    }

    fn parse_parenthesized_condition(&mut self) -> PResult<Expression> {
        self.require_token(&TokenKind::LParen)?;
        let test = self.with_no_in(false, |p| p.parse_expression())?;
        self.require_token(&TokenKind::RParen)?;
        Ok(test)
    }

    fn parse_if_statement(&mut self) -> PResult<Statement> {
        let start = self.current.span;
        self.advance();
        let test = self.parse_parenthesized_condition()?;
        let consequent = Box::new(self.parse_if_branch()?);
        let alternate = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.parse_if_branch()?))
        } else {
            None
        };
        Ok(Statement::If(IfStatement {
            test,
            consequent,
            alternate,
            span: self.span_from(start),
        }))
    }

    /// Sloppy code may declare a function directly as an `if` branch; it
    /// behaves as if wrapped in a block
    fn parse_if_branch(&mut self) -> PResult<Statement> {
        if self.check(&TokenKind::Function) && !self.ctx.strict {
            let start = self.current.span;
            let scope = self.new_scope();
            let f = self.parse_function_declaration(false)?;
            if f.is_generator {
                return Err(self.error_at(start, "Generators can only be declared in a block"));
            }
            return Ok(Statement::Block(BlockStatement {
                body: vec![Statement::FunctionDeclaration(Box::new(f))],
                scope,
                span: self.span_from(start),
            }));
        }
        self.parse_statement()
    }

    /// Parse a loop body with `break`/`continue` enabled
    fn parse_loop_body(&mut self) -> PResult<Statement> {
        self.ctx.breakable += 1;
        self.ctx.iteration += 1;
        let body = self.parse_statement();
        self.ctx.breakable -= 1;
        self.ctx.iteration -= 1;
        body
    }

    fn parse_while_statement(&mut self) -> PResult<Statement> {
        let start = self.current.span;
        self.advance();
        let test = self.parse_parenthesized_condition()?;
        let body = Box::new(self.parse_loop_body()?);
        Ok(Statement::While(WhileStatement {
            test,
            body,
            span: self.span_from(start),
        }))
    }

    fn parse_do_while_statement(&mut self) -> PResult<Statement> {
        let start = self.current.span;
        self.advance();
        let body = Box::new(self.parse_loop_body()?);
        self.require_token(&TokenKind::While)?;
        let test = self.parse_parenthesized_condition()?;
        // `do ; while (x) y` inserts a semicolon after the `)`
        self.match_token(&TokenKind::Semicolon);
        Ok(Statement::DoWhile(DoWhileStatement {
            body,
            test,
            span: self.span_from(start),
        }))
    }

    fn parse_for_statement(&mut self) -> PResult<Statement> {
        let start = self.current.span;
        self.advance();

        let await_span = self.current.span;
        let is_await = self.match_contextual("await");
        if is_await && !self.ctx.in_async {
            return Err(self.error_at(
                await_span,
                "for await is only valid in async functions",
            ));
        }

        self.require_token(&TokenKind::LParen)?;
        let scope = self.new_scope();

        let var_kind = if self.is_let_declaration() {
            Some(VariableKind::Let)
        } else {
            match self.current.kind {
                TokenKind::Var => Some(VariableKind::Var),
                TokenKind::Const => Some(VariableKind::Const),
                _ => None,
            }
        };

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else if let Some(kind) = var_kind {
            let decl = self.with_no_in(true, |p| p.parse_variable_declaration(kind, true))?;
            if self.check(&TokenKind::In) || self.check_contextual("of") {
                let is_of = self.check_contextual("of");
                let left = self.for_declaration_left(decl, is_of)?;
                return self.parse_for_in_of_tail(start, left, is_of, is_await, scope);
            }
            for declarator in &decl.declarations {
                self.check_declarator_initializer(kind, declarator)?;
            }
            Some(ForInit::Variable(decl))
        } else {
            let expr_start = self.current.span;
            let starts_with_let = self.check_contextual("let");
            let expr = self.with_no_in(true, |p| p.parse_expression())?;
            if self.check(&TokenKind::In) || self.check_contextual("of") {
                let is_of = self.check_contextual("of");
                if is_of && starts_with_let {
                    return Err(self.error_at(
                        expr_start,
                        "The left-hand side of a for-of loop may not be 'let'",
                    ));
                }
                let pattern = self.expression_to_assignment_pattern(expr)?;
                return self.parse_for_in_of_tail(
                    start,
                    ForInOfLeft::Pattern(pattern),
                    is_of,
                    is_await,
                    scope,
                );
            }
            Some(ForInit::Expression(expr))
        };

        if is_await {
            return Err(self.error_at(await_span, "for await requires an of clause"));
        }

        self.require_token(&TokenKind::Semicolon)?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.require_token(&TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.require_token(&TokenKind::RParen)?;
        let body = Box::new(self.parse_loop_body()?);

        Ok(Statement::For(ForStatement {
            init,
            test,
            update,
            body,
            scope,
            span: self.span_from(start),
        }))
    }

    fn for_declaration_left(
        &mut self,
        decl: VariableDeclaration,
        is_of: bool,
    ) -> PResult<ForInOfLeft> {
        let loop_kind = if is_of { "for-of" } else { "for-in" };
        let span = decl.span;
        let kind = decl.kind;
        let mut declarations = decl.declarations;
        if declarations.len() != 1 {
            return Err(self.error_at(
                span,
                format!("Invalid left-hand side in {loop_kind} loop: Must have a single binding."),
            ));
        }
        let Some(declarator) = declarations.pop() else {
            return Err(self.unexpected());
        };
        if declarator.init.is_some() {
            return Err(self.error_at(
                declarator.span,
                format!("{loop_kind} loop variable declaration may not have an initializer."),
            ));
        }
        Ok(ForInOfLeft::Variable(kind, declarator.id))
    }

    fn parse_for_in_of_tail(
        &mut self,
        start: Span,
        left: ForInOfLeft,
        is_of: bool,
        is_await: bool,
        scope: ScopeId,
    ) -> PResult<Statement> {
        // `in` or `of`
        self.advance();
        let right = if is_of {
            self.with_no_in(false, |p| p.parse_assignment_expression())?
        } else {
            self.with_no_in(false, |p| p.parse_expression())?
        };
        self.require_token(&TokenKind::RParen)?;
        let body = Box::new(self.parse_loop_body()?);
        let span = self.span_from(start);
        if is_of {
            Ok(Statement::ForOf(ForOfStatement {
                left,
                right,
                body,
                is_await,
                scope,
                span,
            }))
        } else {
            if is_await {
                return Err(self.error_at(start, "for await requires an of clause"));
            }
            Ok(Statement::ForIn(ForInStatement {
                left,
                right,
                body,
                scope,
                span,
            }))
        }
    }

    fn parse_switch_statement(&mut self) -> PResult<Statement> {
        let start = self.current.span;
        self.advance();
        let discriminant = self.parse_parenthesized_condition()?;
        self.require_token(&TokenKind::LBrace)?;
        let scope = self.new_scope();

        self.ctx.breakable += 1;
        let cases = self.parse_switch_cases();
        self.ctx.breakable -= 1;
        let cases = cases?;

        self.require_token(&TokenKind::RBrace)?;
        Ok(Statement::Switch(SwitchStatement {
            discriminant,
            cases,
            scope,
            span: self.span_from(start),
        }))
    }

    fn parse_switch_cases(&mut self) -> PResult<Vec<SwitchCase>> {
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let case_start = self.current.span;
            let test = if self.match_token(&TokenKind::Case) {
                Some(self.parse_expression()?)
            } else if self.match_token(&TokenKind::Default) {
                if seen_default {
                    return Err(self.error_at(
                        case_start,
                        "More than one default clause in switch statement",
                    ));
                }
                seen_default = true;
                None
            } else {
                return Err(self.unexpected());
            };
            self.require_token(&TokenKind::Colon)?;

            let mut consequent = Vec::new();
            while !matches!(
                self.current.kind,
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                let stmt_start = self.current.span.start;
                match self.parse_statement_list_item() {
                    Ok(stmt) => consequent.push(stmt),
                    Err(Failed) => self.synchronize(stmt_start),
                }
                self.flush_cover_init();
            }
            cases.push(SwitchCase {
                test,
                consequent,
                span: self.span_from(case_start),
            });
        }
        Ok(cases)
    }

    fn parse_try_statement(&mut self) -> PResult<Statement> {
        let start = self.current.span;
        self.advance();
        let block = self.parse_block()?;

        let handler = if self.check(&TokenKind::Catch) {
            let catch_start = self.current.span;
            self.advance();
            let scope = self.new_scope();
            let param = if self.match_token(&TokenKind::LParen) {
                let param = self.parse_binding_target()?;
                self.require_token(&TokenKind::RParen)?;
                Some(param)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause {
                param,
                body,
                scope,
                span: self.span_from(catch_start),
            })
        } else {
            None
        };

        let finalizer = if self.match_token(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            let span = self.current.span;
            return Err(self.error_at(span, "Missing catch or finally after try"));
        }

        Ok(Statement::Try(TryStatement {
            block,
            handler,
            finalizer,
            span: self.span_from(start),
        }))
    }

    fn parse_with_statement(&mut self) -> PResult<Statement> {
        let start = self.current.span;
        if self.ctx.strict {
            return Err(self.error_at(start, "Strict mode code may not include a with statement"));
        }
        self.advance();
        let object = self.parse_parenthesized_condition()?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::With(WithStatement {
            object,
            body,
            span: self.span_from(start),
        }))
    }

    // ============ JUMPS ============

    fn parse_return_statement(&mut self) -> PResult<Statement> {
        let start = self.current.span;
        if !self.ctx.in_function {
            return Err(self.error_at(start, "Illegal return statement"));
        }
        self.advance();
        let argument = if self.at_statement_terminator() {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_semicolon()?;
        Ok(Statement::Return(ReturnStatement {
            argument,
            span: self.span_from(start),
        }))
    }

    fn at_statement_terminator(&self) -> bool {
        matches!(
            self.current.kind,
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        ) || self.current.newline_before
    }

    /// Optional label after `break`/`continue` on the same line
    fn parse_jump_label(&mut self) -> PResult<Option<Identifier>> {
        if self.current.newline_before || !matches!(self.current.kind, TokenKind::Identifier(_)) {
            return Ok(None);
        }
        self.parse_identifier().map(Some)
    }

    fn parse_break_statement(&mut self) -> PResult<Statement> {
        let start = self.current.span;
        self.advance();
        let label = self.parse_jump_label()?;
        match &label {
            Some(id) => {
                if !self.ctx.labels.iter().any(|l| l.name == id.name) {
                    return Err(
                        self.error_at(id.span, format!("Undefined label '{}'", id.name))
                    );
                }
            }
            None if self.ctx.breakable == 0 => {
                return Err(self.error_at(start, "Illegal break statement"));
            }
            None => {}
        }
        self.expect_semicolon()?;
        Ok(Statement::Break(BreakStatement {
            label,
            span: self.span_from(start),
        }))
    }

    fn parse_continue_statement(&mut self) -> PResult<Statement> {
        let start = self.current.span;
        self.advance();
        let label = self.parse_jump_label()?;
        if self.ctx.iteration == 0 {
            return Err(self.error_at(
                start,
                "Illegal continue statement: no surrounding iteration statement",
            ));
        }
        if let Some(id) = &label {
            match self.ctx.labels.iter().rev().find(|l| l.name == id.name) {
                None => {
                    return Err(
                        self.error_at(id.span, format!("Undefined label '{}'", id.name))
                    );
                }
                Some(l) if !l.is_loop => {
                    return Err(self.error_at(
                        id.span,
                        format!(
                            "Illegal continue statement: '{}' does not denote an iteration statement",
                            id.name
                        ),
                    ));
                }
                Some(_) => {}
            }
        }
        self.expect_semicolon()?;
        Ok(Statement::Continue(ContinueStatement {
            label,
            span: self.span_from(start),
        }))
    }

    fn parse_throw_statement(&mut self) -> PResult<Statement> {
        let start = self.current.span;
        self.advance();
        if self.current.newline_before {
            return Err(self.error_at(start, "Illegal newline after throw"));
        }
        let argument = self.parse_expression()?;
        self.expect_semicolon()?;
        Ok(Statement::Throw(ThrowStatement {
            argument,
            span: self.span_from(start),
        }))
    }

    /// `a: b: stmt`: every label in the chain targets the same statement
    fn parse_labeled_statement(&mut self) -> PResult<Statement> {
        let mut chain = Vec::new();
        while matches!(self.current.kind, TokenKind::Identifier(_))
            && self.peek().kind == TokenKind::Colon
        {
            let start = self.current.span;
            let label = self.parse_identifier()?;
            self.advance();
            if self.ctx.labels.iter().any(|l| l.name == label.name)
                || chain.iter().any(|(l, _): &(Identifier, Span)| l.name == label.name)
            {
                return Err(self.error_at(
                    label.span,
                    format!("Label '{}' has already been declared", label.name),
                ));
            }
            chain.push((label, start));
        }

        let is_loop = matches!(
            self.current.kind,
            TokenKind::For | TokenKind::While | TokenKind::Do
        );
        let depth = self.ctx.labels.len();
        for (label, _) in &chain {
            self.ctx.labels.push(Label {
                name: label.name.clone(),
                is_loop,
            });
        }
        let body = if self.check(&TokenKind::Function) && !self.ctx.strict {
            self.parse_function_declaration(false)
                .map(|f| Statement::FunctionDeclaration(Box::new(f)))
        } else {
            self.parse_statement()
        };
        self.ctx.labels.truncate(depth);
        let mut stmt = body?;

        while let Some((label, start)) = chain.pop() {
            stmt = Statement::Labeled(LabeledStatement {
                label,
                body: Box::new(stmt),
                span: self.span_from(start),
            });
        }
        Ok(stmt)
    }
}
