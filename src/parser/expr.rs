//! Expressions

use super::{PResult, Parser};
use crate::ast::*;
use crate::lexer::{Span, TemplateChunk, TokenKind};

/// Binary or short-circuit operator found in infix position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

const RELATIONAL_PRECEDENCE: u8 = 8;

/// An element of a parenthesized list that may turn out to be arrow
/// parameters
enum ParenItem {
    Expression(Expression),
    Rest(Pattern),
}

struct ParenCover {
    items: Vec<ParenItem>,
    trailing_comma: bool,
    span: Span,
}

impl<'a> Parser<'a> {
    /// Expression: comma-separated assignment expressions
    pub(super) fn parse_expression(&mut self) -> PResult<Expression> {
        let start = self.current.span;
        let first = self.parse_assignment_expression()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut expressions = vec![first];
        while self.match_token(&TokenKind::Comma) {
            expressions.push(self.parse_assignment_expression()?);
        }
        Ok(Expression::Sequence(SequenceExpression {
            expressions,
            span: self.span_from(start),
        }))
    }

    pub(super) fn parse_assignment_expression(&mut self) -> PResult<Expression> {
        self.nested(Self::parse_assignment_expression_inner)
    }

    fn parse_assignment_expression_inner(&mut self) -> PResult<Expression> {
        let start = self.current.span;

        if self.ctx.in_generator && self.check_contextual("yield") {
            return self.parse_yield_expression();
        }

        // Arrow functions and their cover forms
        if self.check_identifier() {
            let next = self.peek();
            if next.kind == TokenKind::Arrow && !next.newline_before {
                let param = self.parse_binding_identifier()?;
                return self.parse_arrow_function(start, vec![Pattern::Identifier(param)], None, false);
            }
            if self.check_contextual("async") && !next.newline_before {
                match next.kind {
                    TokenKind::Identifier(_) => {
                        self.advance();
                        let param = self.with_async_context(|p| p.parse_binding_identifier())?;
                        if self.current.newline_before || !self.check(&TokenKind::Arrow) {
                            return Err(self.unexpected());
                        }
                        return self.parse_arrow_function(
                            start,
                            vec![Pattern::Identifier(param)],
                            None,
                            true,
                        );
                    }
                    TokenKind::LParen => return self.parse_async_call_or_arrow(start),
                    _ => {}
                }
            }
        }
        if self.check(&TokenKind::LParen) {
            let cover = self.parse_paren_cover()?;
            if self.check(&TokenKind::Arrow) && !self.current.newline_before {
                let (params, rest) = self.paren_items_to_params(cover.items)?;
                return self.parse_arrow_function(start, params, rest, false);
            }
            let primary = self.paren_cover_to_expression(cover)?;
            let expr = self.parse_call_tail(start, primary, true)?;
            let expr = self.parse_postfix_from(start, expr)?;
            let expr = self.parse_conditional_expression(Some(expr))?;
            return self.finish_assignment(start, expr);
        }

        let lhs = self.parse_conditional_expression(None)?;
        self.finish_assignment(start, lhs)
    }

    /// Apply a trailing assignment operator to an already parsed left side
    fn finish_assignment(&mut self, start: Span, lhs: Expression) -> PResult<Expression> {
        let Some(operator) = self.current_assignment_op() else {
            return Ok(lhs);
        };
        let op_span = self.current.span;
        self.advance();

        let target = if operator == AssignmentOp::Assign
            && matches!(lhs, Expression::Object(_) | Expression::Array(_))
        {
            AssignmentTarget::Pattern(self.expression_to_assignment_pattern(lhs)?)
        } else {
            if !self.is_simple_target(&lhs) {
                return Err(self.error_at(op_span, "Invalid left-hand side in assignment"));
            }
            self.check_strict_assignment_name(&lhs)?;
            AssignmentTarget::Simple(Box::new(lhs))
        };
        let right = self.parse_assignment_expression()?;
        Ok(Expression::Assignment(AssignmentExpression {
            operator,
            target,
            right: Box::new(right),
            span: self.span_from(start),
        }))
    }

    fn current_assignment_op(&self) -> Option<AssignmentOp> {
        Some(match self.current.kind {
            TokenKind::Eq => AssignmentOp::Assign,
            TokenKind::PlusEq => AssignmentOp::AddAssign,
            TokenKind::MinusEq => AssignmentOp::SubAssign,
            TokenKind::StarEq => AssignmentOp::MulAssign,
            TokenKind::SlashEq => AssignmentOp::DivAssign,
            TokenKind::PercentEq => AssignmentOp::ModAssign,
            TokenKind::StarStarEq => AssignmentOp::ExpAssign,
            TokenKind::AmpEq => AssignmentOp::BitAndAssign,
            TokenKind::PipeEq => AssignmentOp::BitOrAssign,
            TokenKind::CaretEq => AssignmentOp::BitXorAssign,
            TokenKind::LtLtEq => AssignmentOp::LShiftAssign,
            TokenKind::GtGtEq => AssignmentOp::RShiftAssign,
            TokenKind::GtGtGtEq => AssignmentOp::URShiftAssign,
            TokenKind::AmpAmpEq => AssignmentOp::AndAssign,
            TokenKind::PipePipeEq => AssignmentOp::OrAssign,
            TokenKind::QuestionQuestionEq => AssignmentOp::NullishAssign,
            _ => return None,
        })
    }

    /// Identifier or property reference, possibly parenthesized
    pub(super) fn is_simple_target(&self, expr: &Expression) -> bool {
        matches!(
            expr.unparenthesized(),
            Expression::Identifier(_) | Expression::Member(_) | Expression::SuperMember(_)
        )
    }

    pub(super) fn check_strict_assignment_name(&mut self, expr: &Expression) -> PResult<()> {
        if let Expression::Identifier(id) = expr.unparenthesized() {
            if self.ctx.strict && (id.name == "eval" || id.name == "arguments") {
                let span = id.span;
                return Err(self.error_at(span, "Unexpected eval or arguments in strict mode"));
            }
        }
        Ok(())
    }

    fn with_async_context<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.ctx.in_async;
        self.ctx.in_async = true;
        let result = f(self);
        self.ctx.in_async = saved;
        result
    }

    fn parse_yield_expression(&mut self) -> PResult<Expression> {
        let start = self.current.span;
        if self.ctx.in_params {
            return Err(self.error_at(start, "Yield expression not allowed in formal parameter"));
        }
        self.advance();
        let mut delegate = false;
        let argument = if self.current.newline_before {
            None
        } else if self.match_token(&TokenKind::Star) {
            delegate = true;
            Some(Box::new(self.parse_assignment_expression()?))
        } else if self.yield_has_argument() {
            Some(Box::new(self.parse_assignment_expression()?))
        } else {
            None
        };
        Ok(Expression::Yield(YieldExpression {
            argument,
            delegate,
            span: self.span_from(start),
        }))
    }

    fn yield_has_argument(&self) -> bool {
        !matches!(
            self.current.kind,
            TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
                | TokenKind::Comma
                | TokenKind::Semicolon
                | TokenKind::Colon
                | TokenKind::Question
                | TokenKind::Arrow
                | TokenKind::In
                | TokenKind::Eof
                | TokenKind::TemplateMiddle(_)
                | TokenKind::TemplateTail(_)
        )
    }

    // ============ ARROW COVER GRAMMAR ============

    /// `( ... )` parsed loosely enough to become either an expression or
    /// arrow parameters
    fn parse_paren_cover(&mut self) -> PResult<ParenCover> {
        let start = self.current.span;
        self.require_token(&TokenKind::LParen)?;
        let mut items = Vec::new();
        let mut trailing_comma = false;
        self.with_no_in(false, |p| -> PResult<()> {
            while !p.check(&TokenKind::RParen) {
                if p.match_token(&TokenKind::DotDotDot) {
                    items.push(ParenItem::Rest(p.parse_binding_target()?));
                    if !p.check(&TokenKind::RParen) {
                        let span = p.current.span;
                        return Err(
                            p.error_at(span, "Rest parameter must be last formal parameter")
                        );
                    }
                    break;
                }
                items.push(ParenItem::Expression(p.parse_assignment_expression()?));
                if !p.match_token(&TokenKind::Comma) {
                    break;
                }
                trailing_comma = p.check(&TokenKind::RParen);
            }
            Ok(())
        })?;
        self.require_token(&TokenKind::RParen)?;
        Ok(ParenCover {
            items,
            trailing_comma,
            span: self.span_from(start),
        })
    }

    fn paren_cover_to_expression(&mut self, cover: ParenCover) -> PResult<Expression> {
        if cover.items.is_empty() || cover.trailing_comma {
            return Err(self.unexpected());
        }
        let mut expressions = Vec::with_capacity(cover.items.len());
        for item in cover.items {
            match item {
                ParenItem::Expression(e) => expressions.push(e),
                ParenItem::Rest(_) => return Err(self.unexpected()),
            }
        }
        let inner = if expressions.len() == 1 {
            expressions.pop().ok_or(super::Failed)?
        } else {
            let first = expressions.first().map(Expression::span).unwrap_or(cover.span);
            let last = expressions.last().map(Expression::span).unwrap_or(cover.span);
            Expression::Sequence(SequenceExpression {
                expressions,
                span: first.to(last),
            })
        };
        Ok(Expression::Parenthesized(Box::new(inner), cover.span))
    }

    fn paren_items_to_params(
        &mut self,
        items: Vec<ParenItem>,
    ) -> PResult<(Vec<Pattern>, Option<Pattern>)> {
        let mut params = Vec::with_capacity(items.len());
        let mut rest = None;
        for item in items {
            match item {
                ParenItem::Expression(e) => params.push(self.expression_to_binding_pattern(e)?),
                ParenItem::Rest(p) => rest = Some(p),
            }
        }
        Ok((params, rest))
    }

    /// `async(...)`: a call to something named `async`, or the head of an
    /// async arrow function
    fn parse_async_call_or_arrow(&mut self, start: Span) -> PResult<Expression> {
        let callee = self.parse_identifier()?;
        let args_start = self.current.span;
        let arguments = self.parse_arguments()?;
        if self.check(&TokenKind::Arrow) && !self.current.newline_before {
            let mut params = Vec::with_capacity(arguments.len());
            let mut rest = None;
            let count = arguments.len();
            for (i, arg) in arguments.into_iter().enumerate() {
                match arg {
                    Argument::Expression(e) => params.push(self.expression_to_binding_pattern(e)?),
                    Argument::Spread(spread) if i + 1 == count => {
                        rest = Some(self.expression_to_binding_pattern(*spread.argument)?);
                    }
                    Argument::Spread(spread) => {
                        return Err(self.error_at(
                            spread.span,
                            "Rest parameter must be last formal parameter",
                        ));
                    }
                }
            }
            return self.parse_arrow_function(start, params, rest, true);
        }
        let call = Expression::Call(CallExpression {
            callee: Box::new(Expression::Identifier(callee)),
            arguments,
            optional: false,
            span: self.span_from(args_start),
        });
        let expr = self.parse_call_tail(start, call, true)?;
        let expr = self.parse_postfix_from(start, expr)?;
        let expr = self.parse_conditional_expression(Some(expr))?;
        self.finish_assignment(start, expr)
    }

    // ============ CONDITIONAL & BINARY ============

    /// ConditionalExpression; `first` is an already parsed leading operand
    fn parse_conditional_expression(&mut self, first: Option<Expression>) -> PResult<Expression> {
        let start = first.as_ref().map(Expression::span).unwrap_or(self.current.span);
        let test = self.parse_binary_expression(0, first)?;
        if !self.match_token(&TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.with_no_in(false, |p| p.parse_assignment_expression())?;
        self.require_token(&TokenKind::Colon)?;
        let alternate = self.parse_assignment_expression()?;
        Ok(Expression::Conditional(ConditionalExpression {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
            span: self.span_from(start),
        }))
    }

    /// Precedence climbing over binary and short-circuit operators
    fn parse_binary_expression(
        &mut self,
        min_prec: u8,
        first: Option<Expression>,
    ) -> PResult<Expression> {
        let start = first.as_ref().map(Expression::span).unwrap_or(self.current.span);
        let mut left = match first {
            Some(expr) => expr,
            None => self.parse_binary_operand(min_prec)?,
        };

        while let Some((op, prec, right_assoc)) = self.current_binary_op() {
            if prec < min_prec {
                break;
            }
            let op_span = self.current.span;
            if op == Infix::Binary(BinaryOp::Exp)
                && matches!(left, Expression::Unary(_) | Expression::Await(_))
            {
                return Err(self.error_at(
                    op_span,
                    "Unary operator used immediately before exponentiation expression. Parenthesis must be used to disambiguate operator precedence",
                ));
            }
            self.advance();
            let next_min = if right_assoc { prec } else { prec + 1 };
            let right = self.parse_binary_expression(next_min, None)?;
            let span = self.span_from(start);
            left = match op {
                Infix::Binary(operator) => Expression::Binary(BinaryExpression {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                }),
                Infix::Logical(operator) => {
                    if Self::mixes_nullish(operator, &left) || Self::mixes_nullish(operator, &right) {
                        return Err(self.error_at(
                            op_span,
                            "Unexpected token: '??' cannot be mixed with '&&' or '||' without parentheses",
                        ));
                    }
                    Expression::Logical(LogicalExpression {
                        operator,
                        left: Box::new(left),
                        right: Box::new(right),
                        span,
                    })
                }
            };
        }
        Ok(left)
    }

    /// `??` next to an unparenthesized `&&`/`||` operand, or the reverse
    fn mixes_nullish(op: LogicalOp, operand: &Expression) -> bool {
        let Expression::Logical(inner) = operand else {
            return false;
        };
        match op {
            LogicalOp::NullishCoalescing => inner.operator != LogicalOp::NullishCoalescing,
            LogicalOp::And | LogicalOp::Or => inner.operator == LogicalOp::NullishCoalescing,
        }
    }

    /// Unary operand, or `#x in obj`
    fn parse_binary_operand(&mut self, min_prec: u8) -> PResult<Expression> {
        let TokenKind::PrivateName(name) = &self.current.kind else {
            return self.parse_unary_expression();
        };
        let name = name.clone();
        let start = self.current.span;
        if min_prec > RELATIONAL_PRECEDENCE || self.no_in || self.peek().kind != TokenKind::In {
            return Err(self.unexpected());
        }
        self.use_private(&name, start)?;
        self.advance();
        self.advance();
        let right = self.parse_binary_expression(RELATIONAL_PRECEDENCE + 1, None)?;
        Ok(Expression::PrivateIn(PrivateInExpression {
            name,
            right: Box::new(right),
            span: self.span_from(start),
        }))
    }

    /// Operator, precedence and right-associativity of the current token
    fn current_binary_op(&self) -> Option<(Infix, u8, bool)> {
        use BinaryOp as B;
        let (op, prec) = match self.current.kind {
            TokenKind::QuestionQuestion => (Infix::Logical(LogicalOp::NullishCoalescing), 1),
            TokenKind::PipePipe => (Infix::Logical(LogicalOp::Or), 2),
            TokenKind::AmpAmp => (Infix::Logical(LogicalOp::And), 3),
            TokenKind::Pipe => (Infix::Binary(B::BitOr), 4),
            TokenKind::Caret => (Infix::Binary(B::BitXor), 5),
            TokenKind::Amp => (Infix::Binary(B::BitAnd), 6),
            TokenKind::EqEq => (Infix::Binary(B::Eq), 7),
            TokenKind::BangEq => (Infix::Binary(B::NotEq), 7),
            TokenKind::EqEqEq => (Infix::Binary(B::StrictEq), 7),
            TokenKind::BangEqEq => (Infix::Binary(B::StrictNotEq), 7),
            TokenKind::Lt => (Infix::Binary(B::Lt), RELATIONAL_PRECEDENCE),
            TokenKind::LtEq => (Infix::Binary(B::LtEq), RELATIONAL_PRECEDENCE),
            TokenKind::Gt => (Infix::Binary(B::Gt), RELATIONAL_PRECEDENCE),
            TokenKind::GtEq => (Infix::Binary(B::GtEq), RELATIONAL_PRECEDENCE),
            TokenKind::Instanceof => (Infix::Binary(B::Instanceof), RELATIONAL_PRECEDENCE),
            TokenKind::In if !self.no_in => (Infix::Binary(B::In), RELATIONAL_PRECEDENCE),
            TokenKind::LtLt => (Infix::Binary(B::LShift), 9),
            TokenKind::GtGt => (Infix::Binary(B::RShift), 9),
            TokenKind::GtGtGt => (Infix::Binary(B::URShift), 9),
            TokenKind::Plus => (Infix::Binary(B::Add), 10),
            TokenKind::Minus => (Infix::Binary(B::Sub), 10),
            TokenKind::Star => (Infix::Binary(B::Mul), 11),
            TokenKind::Slash => (Infix::Binary(B::Div), 11),
            TokenKind::Percent => (Infix::Binary(B::Mod), 11),
            TokenKind::StarStar => (Infix::Binary(B::Exp), 12),
            _ => return None,
        };
        Some((op, prec, op == Infix::Binary(B::Exp)))
    }

    // ============ UNARY & UPDATE ============

    fn parse_unary_expression(&mut self) -> PResult<Expression> {
        self.nested(Self::parse_unary_expression_inner)
    }

    fn parse_unary_expression_inner(&mut self) -> PResult<Expression> {
        let start = self.current.span;
        let operator = match self.current.kind {
            TokenKind::Delete => Some(UnaryOp::Delete),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Bang => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(operator) = operator {
            self.advance();
            let argument = self.parse_unary_expression()?;
            if operator == UnaryOp::Delete {
                match argument.unparenthesized() {
                    Expression::Identifier(_) if self.ctx.strict => {
                        return Err(self.error_at(
                            start,
                            "Delete of an unqualified identifier in strict mode.",
                        ));
                    }
                    Expression::Member(MemberExpression {
                        property: MemberProperty::Private(_),
                        ..
                    }) => {
                        return Err(self.error_at(start, "Private fields can not be deleted"));
                    }
                    _ => {}
                }
            }
            return Ok(Expression::Unary(UnaryExpression {
                operator,
                argument: Box::new(argument),
                span: self.span_from(start),
            }));
        }

        let update = match self.current.kind {
            TokenKind::PlusPlus => Some(UpdateOp::Increment),
            TokenKind::MinusMinus => Some(UpdateOp::Decrement),
            _ => None,
        };
        if let Some(operator) = update {
            self.advance();
            let argument = self.parse_unary_expression()?;
            if !self.is_simple_target(&argument) {
                return Err(self.error_at(
                    argument.span(),
                    "Invalid left-hand side expression in prefix operation",
                ));
            }
            self.check_strict_assignment_name(&argument)?;
            return Ok(Expression::Update(UpdateExpression {
                operator,
                argument: Box::new(argument),
                prefix: true,
                span: self.span_from(start),
            }));
        }

        if self.ctx.in_async && self.check_contextual("await") {
            if self.ctx.in_params {
                return Err(self.error_at(start, "Illegal await-expression in formal parameters"));
            }
            self.advance();
            let argument = self.parse_unary_expression()?;
            return Ok(Expression::Await(AwaitExpression {
                argument: Box::new(argument),
                span: self.span_from(start),
            }));
        }

        let expr = self.parse_lhs_expression()?;
        self.parse_postfix_from(start, expr)
    }

    /// Postfix `++`/`--`, which may not follow a line break
    fn parse_postfix_from(&mut self, start: Span, expr: Expression) -> PResult<Expression> {
        if self.current.newline_before {
            return Ok(expr);
        }
        let operator = match self.current.kind {
            TokenKind::PlusPlus => UpdateOp::Increment,
            TokenKind::MinusMinus => UpdateOp::Decrement,
            _ => return Ok(expr),
        };
        if !self.is_simple_target(&expr) {
            let span = self.current.span;
            return Err(self.error_at(
                span,
                "Invalid left-hand side expression in postfix operation",
            ));
        }
        self.check_strict_assignment_name(&expr)?;
        self.advance();
        Ok(Expression::Update(UpdateExpression {
            operator,
            argument: Box::new(expr),
            prefix: false,
            span: self.span_from(start),
        }))
    }

    // ============ CALLS & MEMBERS ============

    pub(super) fn parse_lhs_expression(&mut self) -> PResult<Expression> {
        let start = self.current.span;
        let expr = match self.current.kind {
            TokenKind::New => self.parse_new_expression()?,
            TokenKind::Super => self.parse_super_expression(true)?,
            _ => self.parse_primary_expression()?,
        };
        self.parse_call_tail(start, expr, true)
    }

    /// Member accesses, calls, optional links and tagged templates following
    /// `expr`. Without `allow_call` this stops at the first `(` (the callee
    /// of `new`).
    fn parse_call_tail(
        &mut self,
        start: Span,
        mut expr: Expression,
        allow_call: bool,
    ) -> PResult<Expression> {
        let mut in_chain = false;
        loop {
            match &self.current.kind {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.parse_member_name()?;
                    expr = Expression::Member(MemberExpression {
                        object: Box::new(expr),
                        property,
                        optional: false,
                        span: self.span_from(start),
                    });
                }
                TokenKind::QuestionDot => {
                    if !allow_call {
                        let span = self.current.span;
                        return Err(
                            self.error_at(span, "Invalid optional chain from new expression")
                        );
                    }
                    in_chain = true;
                    self.advance();
                    expr = match &self.current.kind {
                        TokenKind::LParen => {
                            let arguments = self.parse_arguments()?;
                            Expression::Call(CallExpression {
                                callee: Box::new(expr),
                                arguments,
                                optional: true,
                                span: self.span_from(start),
                            })
                        }
                        TokenKind::LBracket => {
                            let property = self.parse_computed_member()?;
                            Expression::Member(MemberExpression {
                                object: Box::new(expr),
                                property,
                                optional: true,
                                span: self.span_from(start),
                            })
                        }
                        TokenKind::TemplateNoSub(_) | TokenKind::TemplateHead(_) => {
                            let span = self.current.span;
                            return Err(
                                self.error_at(span, "Invalid tagged template on optional chain")
                            );
                        }
                        _ => {
                            let property = self.parse_member_name()?;
                            Expression::Member(MemberExpression {
                                object: Box::new(expr),
                                property,
                                optional: true,
                                span: self.span_from(start),
                            })
                        }
                    };
                }
                TokenKind::LBracket => {
                    let property = self.parse_computed_member()?;
                    expr = Expression::Member(MemberExpression {
                        object: Box::new(expr),
                        property,
                        optional: false,
                        span: self.span_from(start),
                    });
                }
                TokenKind::LParen if allow_call => {
                    let arguments = self.parse_arguments()?;
                    expr = Expression::Call(CallExpression {
                        callee: Box::new(expr),
                        arguments,
                        optional: false,
                        span: self.span_from(start),
                    });
                }
                TokenKind::TemplateNoSub(_) | TokenKind::TemplateHead(_) => {
                    if in_chain {
                        let span = self.current.span;
                        return Err(
                            self.error_at(span, "Invalid tagged template on optional chain")
                        );
                    }
                    let quasi = self.parse_template_literal(true)?;
                    expr = Expression::TaggedTemplate(TaggedTemplateExpression {
                        tag: Box::new(expr),
                        quasi,
                        span: self.span_from(start),
                    });
                }
                _ => break,
            }
        }
        if in_chain {
            expr = Expression::OptionalChain(OptionalChainExpression {
                expression: Box::new(expr),
                span: self.span_from(start),
            });
        }
        Ok(expr)
    }

    /// Property after `.` or `?.`: an IdentifierName or a private name
    fn parse_member_name(&mut self) -> PResult<MemberProperty> {
        if let TokenKind::PrivateName(name) = &self.current.kind {
            let name = name.clone();
            let span = self.current.span;
            self.use_private(&name, span)?;
            self.advance();
            return Ok(MemberProperty::Private(name));
        }
        Ok(MemberProperty::Identifier(self.parse_identifier_name()?))
    }

    fn parse_computed_member(&mut self) -> PResult<MemberProperty> {
        self.require_token(&TokenKind::LBracket)?;
        let property = self.with_no_in(false, |p| p.parse_expression())?;
        self.require_token(&TokenKind::RBracket)?;
        Ok(MemberProperty::Expression(Box::new(property)))
    }

    pub(super) fn parse_arguments(&mut self) -> PResult<Vec<Argument>> {
        self.require_token(&TokenKind::LParen)?;
        let mut arguments = Vec::new();
        self.with_no_in(false, |p| -> PResult<()> {
            while !p.check(&TokenKind::RParen) {
                let start = p.current.span;
                if p.match_token(&TokenKind::DotDotDot) {
                    let argument = p.parse_assignment_expression()?;
                    arguments.push(Argument::Spread(SpreadElement {
                        argument: Box::new(argument),
                        span: p.span_from(start),
                    }));
                } else {
                    arguments.push(Argument::Expression(p.parse_assignment_expression()?));
                }
                if !p.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            Ok(())
        })?;
        self.require_token(&TokenKind::RParen)?;
        Ok(arguments)
    }

    fn parse_new_expression(&mut self) -> PResult<Expression> {
        let start = self.current.span;
        self.advance();

        if self.match_token(&TokenKind::Dot) {
            if !self.check_contextual("target") {
                return Err(self.unexpected());
            }
            self.advance();
            let span = self.span_from(start);
            if !self.ctx.allow_new_target {
                return Err(self.error_at(span, "new.target expression is not allowed here"));
            }
            return Ok(Expression::NewTarget(span));
        }

        let callee_start = self.current.span;
        let callee = match self.current.kind {
            TokenKind::New => self.parse_new_expression()?,
            TokenKind::Super => self.parse_super_expression(false)?,
            _ => self.parse_primary_expression()?,
        };
        let callee = self.parse_call_tail(callee_start, callee, false)?;
        let arguments = if self.check(&TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expression::New(NewExpression {
            callee: Box::new(callee),
            arguments,
            span: self.span_from(start),
        }))
    }

    /// `super(...)`, `super.x` or `super[x]`
    fn parse_super_expression(&mut self, allow_call: bool) -> PResult<Expression> {
        let start = self.current.span;
        self.advance();
        match &self.current.kind {
            TokenKind::LParen if allow_call => {
                if !self.ctx.allow_super_call {
                    return Err(self.error_at(start, "'super' keyword unexpected here"));
                }
                let arguments = self.parse_arguments()?;
                Ok(Expression::SuperCall(SuperCallExpression {
                    arguments,
                    span: self.span_from(start),
                }))
            }
            TokenKind::Dot | TokenKind::LBracket => {
                if !self.ctx.allow_super_property {
                    return Err(self.error_at(start, "'super' keyword unexpected here"));
                }
                let property = if self.match_token(&TokenKind::Dot) {
                    if matches!(self.current.kind, TokenKind::PrivateName(_)) {
                        let span = self.current.span;
                        return Err(self.error_at(span, "Unexpected private field"));
                    }
                    MemberProperty::Identifier(self.parse_identifier_name()?)
                } else {
                    self.parse_computed_member()?
                };
                Ok(Expression::SuperMember(SuperMemberExpression {
                    property,
                    span: self.span_from(start),
                }))
            }
            _ => Err(self.error_at(start, "'super' keyword unexpected here")),
        }
    }

    // ============ PRIMARY ============

    fn parse_primary_expression(&mut self) -> PResult<Expression> {
        let start = self.current.span;
        if self.is_async_function() {
            let f = self.parse_function_expression(true)?;
            return Ok(Expression::Function(Box::new(f)));
        }
        let literal = |value| {
            Ok(Expression::Literal(Literal {
                value,
                span: start,
            }))
        };
        match &self.current.kind {
            TokenKind::This => {
                self.advance();
                Ok(Expression::This(start))
            }
            TokenKind::Number(n) => {
                let n = *n;
                if self.ctx.strict && self.current.legacy_octal {
                    return Err(
                        self.error_at(start, "Octal literals are not allowed in strict mode.")
                    );
                }
                self.advance();
                literal(LiteralValue::Number(n))
            }
            TokenKind::String(s) => {
                let s = s.clone();
                if self.ctx.strict && self.current.legacy_octal {
                    return Err(self.error_at(
                        start,
                        "Octal escape sequences are not allowed in strict mode.",
                    ));
                }
                self.advance();
                literal(LiteralValue::String(s))
            }
            TokenKind::True => {
                self.advance();
                literal(LiteralValue::Boolean(true))
            }
            TokenKind::False => {
                self.advance();
                literal(LiteralValue::Boolean(false))
            }
            TokenKind::Null => {
                self.advance();
                literal(LiteralValue::Null)
            }
            TokenKind::Slash | TokenKind::SlashEq => self.parse_regexp_literal(),
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            TokenKind::LParen => {
                let cover = self.parse_paren_cover()?;
                if self.check(&TokenKind::Arrow) {
                    let span = self.current.span;
                    return Err(self.error_at(span, "Malformed arrow function parameter list"));
                }
                self.paren_cover_to_expression(cover)
            }
            TokenKind::Function => {
                let f = self.parse_function_expression(false)?;
                Ok(Expression::Function(Box::new(f)))
            }
            TokenKind::Class => {
                let c = self.parse_class(false)?;
                Ok(Expression::Class(Box::new(c)))
            }
            TokenKind::TemplateNoSub(_) | TokenKind::TemplateHead(_) => {
                Ok(Expression::Template(self.parse_template_literal(false)?))
            }
            TokenKind::Identifier(_) | TokenKind::EscapedKeyword(_) => {
                Ok(Expression::Identifier(self.parse_identifier()?))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_regexp_literal(&mut self) -> PResult<Expression> {
        let token = self.lexer.rescan_as_regexp(self.current.span);
        self.current = token;
        let start = self.current.span;
        let TokenKind::RegExp { pattern, flags } = &self.current.kind else {
            return Err(self.unexpected());
        };
        let (pattern, flags) = (pattern.clone(), flags.clone());
        if !valid_regexp_flags(&flags) {
            return Err(self.error_at(
                start,
                format!("Invalid regular expression flags '{flags}'"),
            ));
        }
        self.advance();
        Ok(Expression::Literal(Literal {
            value: LiteralValue::RegExp { pattern, flags },
            span: start,
        }))
    }

    fn parse_array_literal(&mut self) -> PResult<Expression> {
        let start = self.current.span;
        self.advance();
        let mut elements = Vec::new();
        let mut trailing_comma = None;
        self.with_no_in(false, |p| -> PResult<()> {
            while !p.check(&TokenKind::RBracket) {
                trailing_comma = None;
                if p.match_token(&TokenKind::Comma) {
                    elements.push(None);
                    continue;
                }
                let el_start = p.current.span;
                let element = if p.match_token(&TokenKind::DotDotDot) {
                    let argument = p.parse_assignment_expression()?;
                    ArrayElement::Spread(SpreadElement {
                        argument: Box::new(argument),
                        span: p.span_from(el_start),
                    })
                } else {
                    ArrayElement::Expression(p.parse_assignment_expression()?)
                };
                elements.push(Some(element));
                if !p.check(&TokenKind::RBracket) {
                    let comma = p.current.span;
                    p.require_token(&TokenKind::Comma)?;
                    trailing_comma = Some(comma);
                }
            }
            Ok(())
        })?;
        self.require_token(&TokenKind::RBracket)?;
        Ok(Expression::Array(ArrayExpression {
            elements,
            trailing_comma,
            span: self.span_from(start),
        }))
    }

    fn parse_object_literal(&mut self) -> PResult<Expression> {
        let start = self.current.span;
        self.advance();
        let mut properties = Vec::new();
        let mut seen_proto = false;
        let mut trailing_comma = None;
        self.with_no_in(false, |p| -> PResult<()> {
            while !p.check(&TokenKind::RBrace) {
                trailing_comma = None;
                let prop_start = p.current.span;
                if p.match_token(&TokenKind::DotDotDot) {
                    let argument = p.parse_assignment_expression()?;
                    properties.push(ObjectProperty::Spread(SpreadElement {
                        argument: Box::new(argument),
                        span: p.span_from(prop_start),
                    }));
                } else {
                    let prop = p.parse_object_property()?;
                    if prop.kind == PropertyKind::Proto {
                        if seen_proto {
                            p.cover_init.push((
                                prop.span,
                                "Duplicate __proto__ fields are not allowed in object literals",
                            ));
                        }
                        seen_proto = true;
                    }
                    properties.push(ObjectProperty::Property(prop));
                }
                if !p.check(&TokenKind::RBrace) {
                    let comma = p.current.span;
                    p.require_token(&TokenKind::Comma)?;
                    trailing_comma = Some(comma);
                }
            }
            Ok(())
        })?;
        self.require_token(&TokenKind::RBrace)?;
        Ok(Expression::Object(ObjectExpression {
            properties,
            trailing_comma,
            span: self.span_from(start),
        }))
    }

    /// Whether the token after `get`/`set`/`async` begins a property name,
    /// making the word a modifier rather than the key itself
    pub(super) fn modifier_applies(&mut self) -> bool {
        let next = self.peek();
        if next.newline_before && self.check_contextual("async") {
            return false;
        }
        !matches!(
            next.kind,
            TokenKind::Comma
                | TokenKind::Colon
                | TokenKind::LParen
                | TokenKind::RBrace
                | TokenKind::Eq
                | TokenKind::Semicolon
                | TokenKind::Eof
        )
    }

    fn parse_object_property(&mut self) -> PResult<Property> {
        let start = self.current.span;

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
                PropertyKind::Get
            } else {
                PropertyKind::Set
            });
            self.advance();
        }
        if accessor.is_none() && self.match_token(&TokenKind::Star) {
            is_generator = true;
        }

        let key_token = self.current.clone();
        let key = self.parse_property_name()?;

        if let Some(kind) = accessor {
            let fn_kind = if kind == PropertyKind::Get {
                FunctionKind::Getter
            } else {
                FunctionKind::Setter
            };
            let function = self.parse_method(start, fn_kind, false, false)?;
            return Ok(Property {
                key,
                value: Expression::Function(Box::new(function)),
                kind,
                shorthand: false,
                span: self.span_from(start),
            });
        }

        if is_async || is_generator || self.check(&TokenKind::LParen) {
            let function = self.parse_method(start, FunctionKind::Method, is_async, is_generator)?;
            return Ok(Property {
                key,
                value: Expression::Function(Box::new(function)),
                kind: PropertyKind::Method,
                shorthand: false,
                span: self.span_from(start),
            });
        }

        if self.match_token(&TokenKind::Colon) {
            let value = self.parse_assignment_expression()?;
            let kind = if key.is_static_name("__proto__") {
                PropertyKind::Proto
            } else {
                PropertyKind::Init
            };
            return Ok(Property {
                key,
                value,
                kind,
                shorthand: false,
                span: self.span_from(start),
            });
        }

        // Shorthand `{ a }` or cover-initialized `{ a = 1 }`
        let TokenKind::Identifier(name) = &key_token.kind else {
            return Err(self.unexpected());
        };
        let id = Identifier {
            name: name.clone(),
            span: key_token.span,
        };
        self.validate_identifier(&id.name, id.span)?;
        let value = if self.match_token(&TokenKind::Eq) {
            let right = self.parse_assignment_expression()?;
            let span = self.span_from(start);
            self.cover_init.push((span, "Invalid shorthand property initializer"));
            Expression::Assignment(AssignmentExpression {
                operator: AssignmentOp::Assign,
                target: AssignmentTarget::Simple(Box::new(Expression::Identifier(id))),
                right: Box::new(right),
                span,
            })
        } else {
            Expression::Identifier(id)
        };
        Ok(Property {
            key,
            value,
            kind: PropertyKind::Init,
            shorthand: true,
            span: self.span_from(start),
        })
    }

    /// Literal, identifier or computed property key
    pub(super) fn parse_property_name(&mut self) -> PResult<PropertyName> {
        match &self.current.kind {
            TokenKind::String(s) => {
                let s = s.clone();
                if self.ctx.strict && self.current.legacy_octal {
                    let span = self.current.span;
                    return Err(self.error_at(
                        span,
                        "Octal escape sequences are not allowed in strict mode.",
                    ));
                }
                self.advance();
                Ok(PropertyName::String(s))
            }
            TokenKind::Number(n) => {
                let n = *n;
                if self.ctx.strict && self.current.legacy_octal {
                    let span = self.current.span;
                    return Err(
                        self.error_at(span, "Octal literals are not allowed in strict mode.")
                    );
                }
                self.advance();
                Ok(PropertyName::Number(n))
            }
            TokenKind::LBracket => {
                self.advance();
                let expr = self.with_no_in(false, |p| p.parse_assignment_expression())?;
                self.require_token(&TokenKind::RBracket)?;
                Ok(PropertyName::Computed(Box::new(expr)))
            }
            _ => Ok(PropertyName::Identifier(self.parse_identifier_name()?)),
        }
    }

    // ============ TEMPLATES ============

    pub(super) fn parse_template_literal(&mut self, tagged: bool) -> PResult<TemplateLiteral> {
        let start = self.current.span;
        let mut quasis = Vec::new();
        let mut expressions = Vec::new();

        let head = match &self.current.kind {
            TokenKind::TemplateNoSub(chunk) => Some((chunk.clone(), true)),
            TokenKind::TemplateHead(chunk) => Some((chunk.clone(), false)),
            _ => None,
        };
        let Some((chunk, mut done)) = head else {
            return Err(self.unexpected());
        };
        self.push_template_chunk(&mut quasis, chunk, tagged)?;
        self.advance();

        while !done {
            expressions.push(self.with_no_in(false, |p| p.parse_expression())?);
            if !self.check(&TokenKind::RBrace) {
                return Err(self.unexpected());
            }
            let token = self.lexer.rescan_template_continuation(self.current.span);
            self.current = token;
            let chunk = match &self.current.kind {
                TokenKind::TemplateMiddle(chunk) => chunk.clone(),
                TokenKind::TemplateTail(chunk) => {
                    done = true;
                    chunk.clone()
                }
                _ => return Err(self.unexpected()),
            };
            self.push_template_chunk(&mut quasis, chunk, tagged)?;
            self.advance();
        }

        Ok(TemplateLiteral {
            quasis,
            expressions,
            span: self.span_from(start),
        })
    }

    fn push_template_chunk(
        &mut self,
        quasis: &mut Vec<TemplateElement>,
        chunk: TemplateChunk,
        tagged: bool,
    ) -> PResult<()> {
        let span = self.current.span;
        if chunk.cooked.is_none() && !tagged {
            return Err(self.error_at(span, "Invalid escape sequence in template"));
        }
        quasis.push(TemplateElement {
            cooked: chunk.cooked,
            raw: chunk.raw,
            span,
        });
        Ok(())
    }
}

/// Flags drawn from `dgimsuyv` without repeats; `u` and `v` exclude each
/// other
fn valid_regexp_flags(flags: &str) -> bool {
    let mut seen = String::new();
    for c in flags.chars() {
        if !"dgimsuyv".contains(c) || seen.contains(c) {
            return false;
        }
        seen.push(c);
    }
    !(seen.contains('u') && seen.contains('v'))
}
