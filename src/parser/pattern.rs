//! Binding patterns and the cover grammar that turns expressions into
//! patterns

use super::{PResult, Parser};
use crate::ast::*;
use crate::lexer::TokenKind;

const INVALID_TARGET: &str = "Invalid destructuring assignment target";
const REST_TRAILING_COMMA: &str = "Rest element may not have a trailing comma";

impl<'a> Parser<'a> {
    /// BindingIdentifier or BindingPattern
    pub(super) fn parse_binding_target(&mut self) -> PResult<Pattern> {
        match self.current.kind {
            TokenKind::LBracket => self.parse_array_binding(),
            TokenKind::LBrace => self.parse_object_binding(),
            _ => Ok(Pattern::Identifier(self.parse_binding_identifier()?)),
        }
    }

    /// Binding target with an optional default
    pub(super) fn parse_binding_element(&mut self) -> PResult<Pattern> {
        let start = self.current.span;
        let target = self.parse_binding_target()?;
        if !self.match_token(&TokenKind::Eq) {
            return Ok(target);
        }
        let right = self.with_no_in(false, |p| p.parse_assignment_expression())?;
        Ok(Pattern::Assignment(AssignmentPattern {
            left: Box::new(target),
            right: Box::new(right),
            span: self.span_from(start),
        }))
    }

    fn parse_array_binding(&mut self) -> PResult<Pattern> {
        let start = self.current.span;
        self.advance();
        let mut elements = Vec::new();
        let mut rest = None;
        while !self.check(&TokenKind::RBracket) {
            if self.match_token(&TokenKind::Comma) {
                elements.push(None);
                continue;
            }
            if self.match_token(&TokenKind::DotDotDot) {
                rest = Some(Box::new(self.parse_binding_target()?));
                if !self.check(&TokenKind::RBracket) {
                    let span = self.current.span;
                    return Err(self.error_at(span, "Rest element must be last element"));
                }
                break;
            }
            elements.push(Some(self.parse_binding_element()?));
            if !self.check(&TokenKind::RBracket) {
                self.require_token(&TokenKind::Comma)?;
            }
        }
        self.require_token(&TokenKind::RBracket)?;
        Ok(Pattern::Array(ArrayPattern {
            elements,
            rest,
            span: self.span_from(start),
        }))
    }

    fn parse_object_binding(&mut self) -> PResult<Pattern> {
        let start = self.current.span;
        self.advance();
        let mut properties = Vec::new();
        let mut rest = None;
        while !self.check(&TokenKind::RBrace) {
            if self.match_token(&TokenKind::DotDotDot) {
                rest = Some(Box::new(Pattern::Identifier(self.parse_binding_identifier()?)));
                if !self.check(&TokenKind::RBrace) {
                    let span = self.current.span;
                    return Err(self.error_at(span, "Rest element must be last element"));
                }
                break;
            }

            let prop_start = self.current.span;
            let key_token = self.current.clone();
            let key = self.parse_property_name()?;
            let (value, shorthand) = if self.match_token(&TokenKind::Colon) {
                (self.parse_binding_element()?, false)
            } else {
                let TokenKind::Identifier(name) = &key_token.kind else {
                    return Err(self.unexpected());
                };
                let id = Identifier {
                    name: name.clone(),
                    span: key_token.span,
                };
                self.validate_identifier(&id.name, id.span)?;
                self.validate_binding_name(&id)?;
                let target = Pattern::Identifier(id);
                let value = if self.match_token(&TokenKind::Eq) {
                    let right = self.with_no_in(false, |p| p.parse_assignment_expression())?;
                    Pattern::Assignment(AssignmentPattern {
                        left: Box::new(target),
                        right: Box::new(right),
                        span: self.span_from(prop_start),
                    })
                } else {
                    target
                };
                (value, true)
            };
            properties.push(ObjectPatternProperty {
                key,
                value,
                shorthand,
                span: self.span_from(prop_start),
            });
            if !self.check(&TokenKind::RBrace) {
                self.require_token(&TokenKind::Comma)?;
            }
        }
        self.require_token(&TokenKind::RBrace)?;
        Ok(Pattern::Object(ObjectPattern {
            properties,
            rest,
            span: self.span_from(start),
        }))
    }

    // ============ COVER CONVERSION ============

    /// Left side of a destructuring assignment or `for-in/of` head:
    /// property references are valid targets
    pub(super) fn expression_to_assignment_pattern(&mut self, expr: Expression) -> PResult<Pattern> {
        self.expression_to_pattern(expr, false)
    }

    /// Arrow function parameter: only identifiers may be bound. Defaults
    /// are allowed at the top level.
    pub(super) fn expression_to_binding_pattern(&mut self, expr: Expression) -> PResult<Pattern> {
        self.element_to_pattern(expr, true)
    }

    /// Element position: `target = default` becomes an assignment pattern
    fn element_to_pattern(&mut self, expr: Expression, binding: bool) -> PResult<Pattern> {
        let Expression::Assignment(assign) = expr else {
            return self.expression_to_pattern(expr, binding);
        };
        if assign.operator != AssignmentOp::Assign {
            return Err(self.error_at(assign.span, INVALID_TARGET));
        }
        let left = match assign.target {
            AssignmentTarget::Simple(target) => self.expression_to_pattern(*target, binding)?,
            AssignmentTarget::Pattern(pattern) => {
                if binding {
                    self.validate_binding_pattern(&pattern)?;
                }
                pattern
            }
        };
        Ok(Pattern::Assignment(AssignmentPattern {
            left: Box::new(left),
            right: assign.right,
            span: assign.span,
        }))
    }

    fn expression_to_pattern(&mut self, expr: Expression, binding: bool) -> PResult<Pattern> {
        match expr {
            Expression::Identifier(id) => {
                if binding {
                    self.validate_binding_name(&id)?;
                } else if self.ctx.strict && (id.name == "eval" || id.name == "arguments") {
                    return Err(self.error_at(id.span, "Unexpected eval or arguments in strict mode"));
                }
                Ok(Pattern::Identifier(id))
            }
            Expression::Member(_) | Expression::SuperMember(_) if !binding => {
                Ok(Pattern::Expression(Box::new(expr)))
            }
            Expression::Parenthesized(inner, span) if !binding => match *inner {
                e @ (Expression::Identifier(_)
                | Expression::Member(_)
                | Expression::SuperMember(_)
                | Expression::Parenthesized(..)) => self.expression_to_pattern(e, binding),
                _ => Err(self.error_at(span, INVALID_TARGET)),
            },
            Expression::Object(obj) => self.object_to_pattern(obj, binding),
            Expression::Array(arr) => self.array_to_pattern(arr, binding),
            other => {
                let span = other.span();
                Err(self.error_at(span, INVALID_TARGET))
            }
        }
    }

    fn object_to_pattern(&mut self, obj: ObjectExpression, binding: bool) -> PResult<Pattern> {
        let count = obj.properties.len();
        let mut properties = Vec::with_capacity(count);
        let mut rest = None;
        for (i, prop) in obj.properties.into_iter().enumerate() {
            match prop {
                ObjectProperty::Property(p) => {
                    self.clear_cover_init(p.span);
                    if !matches!(p.kind, PropertyKind::Init | PropertyKind::Proto) {
                        return Err(self.error_at(p.span, INVALID_TARGET));
                    }
                    let value = self.element_to_pattern(p.value, binding)?;
                    properties.push(ObjectPatternProperty {
                        key: p.key,
                        value,
                        shorthand: p.shorthand,
                        span: p.span,
                    });
                }
                ObjectProperty::Spread(spread) => {
                    if i + 1 != count {
                        return Err(self.error_at(spread.span, "Rest element must be last element"));
                    }
                    if let Some(comma) = obj.trailing_comma {
                        return Err(self.error_at(comma, REST_TRAILING_COMMA));
                    }
                    let target = self.expression_to_pattern(*spread.argument, binding)?;
                    if matches!(target, Pattern::Object(_) | Pattern::Array(_)) {
                        return Err(self.error_at(
                            spread.span,
                            "`...` must be followed by an assignable reference in assignment contexts",
                        ));
                    }
                    rest = Some(Box::new(target));
                }
            }
        }
        Ok(Pattern::Object(ObjectPattern {
            properties,
            rest,
            span: obj.span,
        }))
    }

    fn array_to_pattern(&mut self, arr: ArrayExpression, binding: bool) -> PResult<Pattern> {
        let count = arr.elements.len();
        let mut elements = Vec::with_capacity(count);
        let mut rest = None;
        for (i, element) in arr.elements.into_iter().enumerate() {
            match element {
                None => elements.push(None),
                Some(ArrayElement::Expression(e)) => {
                    elements.push(Some(self.element_to_pattern(e, binding)?));
                }
                Some(ArrayElement::Spread(spread)) => {
                    if i + 1 != count {
                        return Err(self.error_at(spread.span, "Rest element must be last element"));
                    }
                    if let Some(comma) = arr.trailing_comma {
                        return Err(self.error_at(comma, REST_TRAILING_COMMA));
                    }
                    if matches!(*spread.argument, Expression::Assignment(_)) {
                        return Err(self.error_at(spread.span, "Rest element may not have a default initializer"));
                    }
                    rest = Some(Box::new(self.expression_to_pattern(*spread.argument, binding)?));
                }
            }
        }
        Ok(Pattern::Array(ArrayPattern {
            elements,
            rest,
            span: arr.span,
        }))
    }

    /// A pattern converted under assignment rules, now used as a binding
    fn validate_binding_pattern(&mut self, pattern: &Pattern) -> PResult<()> {
        match pattern {
            Pattern::Identifier(id) => self.validate_binding_name(id),
            Pattern::Expression(e) => {
                let span = e.span();
                Err(self.error_at(span, INVALID_TARGET))
            }
            Pattern::Assignment(a) => self.validate_binding_pattern(&a.left),
            Pattern::Object(o) => {
                for prop in &o.properties {
                    self.validate_binding_pattern(&prop.value)?;
                }
                match &o.rest {
                    Some(rest) => self.validate_binding_pattern(rest),
                    None => Ok(()),
                }
            }
            Pattern::Array(a) => {
                for el in a.elements.iter().flatten() {
                    self.validate_binding_pattern(el)?;
                }
                match &a.rest {
                    Some(rest) => self.validate_binding_pattern(rest),
                    None => Ok(()),
                }
            }
        }
    }
}
