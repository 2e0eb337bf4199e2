//! Expression compilation
//!
//! Every expression leaves exactly one value on the operand stack.

use super::Compiler;
use super::compile_function::BindMode;
use super::scope::{Resolved, private_binding};
use super::{Constant, MethodKind, Op};
use crate::ast::{
    Argument, ArrayElement, AssignmentExpression, AssignmentOp, AssignmentTarget, BinaryOp,
    CallExpression, Expression, FunctionKind, LiteralValue, LogicalOp, MemberExpression, MemberProperty,
    ObjectExpression, ObjectProperty, PropertyKind, PropertyName, TemplateLiteral, UnaryExpression,
    UnaryOp, UpdateExpression, UpdateOp, YieldExpression,
};
use crate::error::JsError;
use crate::string::JsString;

/// A reference that assignment operators read and write
enum Reference<'e> {
    Name(&'e JsString),
    /// [obj]
    Prop(JsString),
    /// [obj, key]
    Elem,
    /// [obj, sym]
    Private,
    /// [this, func, key]
    Super,
}

impl Compiler<'_> {
    /// Compile an expression, leaving its value on the stack
    pub(crate) fn compile_expression(&mut self, expr: &Expression) -> Result<(), JsError> {
        crate::stack::guard(|| self.compile_expression_inner(expr))
    }

    fn compile_expression_inner(&mut self, expr: &Expression) -> Result<(), JsError> {
        self.set_span(expr.span());

        match expr {
            Expression::Literal(lit) => self.compile_literal(&lit.value),

            Expression::Array(arr) => {
                self.emit(Op::NewArray {
                    capacity: arr.elements.len() as u32,
                });
                for element in &arr.elements {
                    match element {
                        Some(ArrayElement::Expression(e)) => {
                            self.compile_expression(e)?;
                            self.emit(Op::ArrayPush);
                        }
                        Some(ArrayElement::Spread(s)) => {
                            self.compile_expression(&s.argument)?;
                            self.emit(Op::ArraySpread);
                        }
                        None => {
                            self.emit(Op::ArrayHole);
                        }
                    }
                }
                Ok(())
            }

            Expression::Object(obj) => self.compile_object(obj),

            Expression::Function(f) => {
                let name = f.id.as_ref().map(|id| id.name.clone()).unwrap_or_default();
                let idx = self.compile_function(f, name)?;
                self.emit(Op::Closure { idx });
                Ok(())
            }

            Expression::ArrowFunction(f) => {
                let idx = self.compile_function(f, JsString::empty())?;
                self.emit(Op::Closure { idx });
                Ok(())
            }

            Expression::Class(c) => self.compile_class(c, None),

            Expression::Template(t) => self.compile_template(t),

            Expression::TaggedTemplate(t) => {
                self.compile_callee(&t.tag)?;
                let cooked = t.quasi.quasis.iter().map(|q| q.cooked.clone()).collect();
                let raw = t.quasi.quasis.iter().map(|q| q.raw.clone()).collect();
                let idx = self
                    .func
                    .builder
                    .add_constant(Constant::Template { cooked, raw })?;
                self.emit(Op::TemplateObject { idx });
                for e in &t.quasi.expressions {
                    self.compile_expression(e)?;
                }
                self.emit(Op::Call {
                    argc: t.quasi.expressions.len() as u32 + 1,
                });
                Ok(())
            }

            Expression::Identifier(id) => {
                if id.name == "undefined" {
                    if let Resolved::Global { withs } = self.resolve_name(&id.name) {
                        if withs.is_empty() {
                            self.emit(Op::Undefined);
                            return Ok(());
                        }
                    }
                }
                self.emit_load_name(&id.name)
            }

            Expression::This(_) => self.emit_this(),

            Expression::NewTarget(_) => self.emit_new_target(),

            Expression::Unary(u) => self.compile_unary(u),

            Expression::Binary(b) => {
                self.compile_expression(&b.left)?;
                self.compile_expression(&b.right)?;
                self.emit(binary_op(b.operator));
                Ok(())
            }

            Expression::Logical(l) => {
                self.compile_expression(&l.left)?;
                let end = self.jump(short_circuit(l.operator));
                self.compile_expression(&l.right)?;
                self.patch(end);
                Ok(())
            }

            Expression::Conditional(c) => {
                self.compile_expression(&c.test)?;
                let else_jump = self.jump(Op::JumpIfFalse { target: 0 });
                self.compile_expression(&c.consequent)?;
                let end = self.jump(Op::Jump { target: 0 });
                self.patch(else_jump);
                self.compile_expression(&c.alternate)?;
                self.patch(end);
                Ok(())
            }

            Expression::Assignment(a) => self.compile_assignment(a),

            Expression::Update(u) => self.compile_update(u),

            Expression::Sequence(seq) => {
                let count = seq.expressions.len();
                for (i, e) in seq.expressions.iter().enumerate() {
                    self.compile_expression(e)?;
                    if i + 1 < count {
                        self.emit(Op::Pop);
                    }
                }
                if count == 0 {
                    self.emit(Op::Undefined);
                }
                Ok(())
            }

            Expression::PrivateIn(p) => {
                self.emit_private_name(&p.name)?;
                self.compile_expression(&p.right)?;
                self.emit(Op::PrivateIn);
                Ok(())
            }

            Expression::Member(m) => self.compile_member(m),

            Expression::SuperMember(m) => {
                self.emit_this()?;
                self.emit_home_function()?;
                self.compile_super_key(&m.property)?;
                self.emit(Op::SuperGet);
                Ok(())
            }

            Expression::OptionalChain(chain) => {
                self.func.optional_exits.push(Vec::new());
                let result = self.compile_expression(&chain.expression);
                let exits = self.func.optional_exits.pop().unwrap_or_default();
                result?;
                let end = self.jump(Op::Jump { target: 0 });
                for j in exits {
                    self.patch(j);
                }
                self.emit(Op::Undefined);
                self.patch(end);
                Ok(())
            }

            Expression::Call(call) => self.compile_call(call),

            Expression::SuperCall(call) => {
                self.emit_home_function()?;
                self.emit_new_target()?;
                self.compile_argument_array(&call.arguments)?;
                self.emit(Op::SuperCall);
                if let Some(slot) = self.derived_this_slot() {
                    self.emit(Op::Dup);
                    self.emit(Op::BindThis { slot });
                }
                Ok(())
            }

            Expression::New(n) => {
                self.compile_expression(&n.callee)?;
                match self.compile_arguments(&n.arguments)? {
                    Some(argc) => self.emit(Op::New { argc }),
                    None => self.emit(Op::NewSpread),
                };
                Ok(())
            }

            Expression::Yield(y) => self.compile_yield(y),

            Expression::Await(a) => {
                self.compile_expression(&a.argument)?;
                self.emit(Op::Await);
                Ok(())
            }

            Expression::Parenthesized(inner, _) => self.compile_expression(inner),
        }
    }

    /// NamedEvaluation: anonymous functions and classes take `name`
    pub(crate) fn compile_expression_named(&mut self, expr: &Expression, name: &JsString) -> Result<(), JsError> {
        match expr.unparenthesized() {
            Expression::Function(f) | Expression::ArrowFunction(f) if f.id.is_none() => {
                self.set_span(f.span);
                let idx = self.compile_function(f, name.clone())?;
                self.emit(Op::Closure { idx });
                Ok(())
            }
            Expression::Class(c) if c.id.is_none() => self.compile_class(c, Some(name)),
            _ => self.compile_expression(expr),
        }
    }

    /// [] -> [private name symbol]
    pub(crate) fn emit_private_name(&mut self, name: &JsString) -> Result<(), JsError> {
        self.emit_load_name(&private_binding(name))
    }

    /// [] -> [property key] for `super.x` and `super[x]`
    pub(crate) fn compile_super_key(&mut self, property: &MemberProperty) -> Result<(), JsError> {
        match property {
            MemberProperty::Identifier(name) => self.func.builder.emit_string(name.clone()),
            MemberProperty::Expression(key) => {
                self.compile_expression(key)?;
                self.emit(Op::ToPropertyKey);
                Ok(())
            }
            MemberProperty::Private(_) => Err(JsError::syntax_error(
                "Unexpected private field after 'super'",
            )),
        }
    }

    fn compile_literal(&mut self, value: &LiteralValue) -> Result<(), JsError> {
        match value {
            LiteralValue::Null => {
                self.emit(Op::Null);
            }
            LiteralValue::Boolean(true) => {
                self.emit(Op::True);
            }
            LiteralValue::Boolean(false) => {
                self.emit(Op::False);
            }
            LiteralValue::Number(n) => self.func.builder.emit_number(*n)?,
            LiteralValue::String(s) => self.func.builder.emit_string(s.clone())?,
            LiteralValue::RegExp { pattern, flags } => {
                let idx = self.func.builder.add_constant(Constant::RegExp {
                    pattern: JsString::from(pattern.as_str()),
                    flags: JsString::from(flags.as_str()),
                })?;
                self.emit(Op::RegExp { idx });
            }
        }
        Ok(())
    }

    fn compile_object(&mut self, obj: &ObjectExpression) -> Result<(), JsError> {
        self.emit(Op::NewObject);
        for prop in &obj.properties {
            let prop = match prop {
                ObjectProperty::Spread(s) => {
                    self.compile_expression(&s.argument)?;
                    self.emit(Op::CopyDataProperties);
                    continue;
                }
                ObjectProperty::Property(p) => p,
            };
            self.set_span(prop.span);
            let kind = match prop.kind {
                PropertyKind::Proto => {
                    self.compile_expression(&prop.value)?;
                    self.emit(Op::SetProto);
                    continue;
                }
                PropertyKind::Init => None,
                PropertyKind::Method => Some(MethodKind::Method),
                PropertyKind::Get => Some(MethodKind::Getter),
                PropertyKind::Set => Some(MethodKind::Setter),
            };
            let static_name = prop.key.static_name();

            if let Some(kind) = kind {
                self.compile_property_key(&prop.key)?;
                match &prop.value {
                    Expression::Function(f) => {
                        let idx = self.compile_function(f, static_name.unwrap_or_default())?;
                        self.emit(Op::Closure { idx });
                    }
                    other => self.compile_expression(other)?,
                }
                self.emit(Op::DefineMethod {
                    kind,
                    enumerable: true,
                });
                continue;
            }

            match static_name {
                Some(name) => {
                    self.compile_expression_named(&prop.value, &name)?;
                    let name = self.name_const(&name)?;
                    self.emit(Op::DefineField { name });
                }
                None => {
                    self.compile_property_key(&prop.key)?;
                    self.compile_expression(&prop.value)?;
                    if prop.value.unparenthesized().is_anonymous_function_definition() {
                        self.emit(Op::SetFunctionName { prefix: None });
                    }
                    self.emit(Op::DefineElemField);
                }
            }
        }
        Ok(())
    }

    /// [] -> [key] for object literal and class element names
    pub(crate) fn compile_property_key(&mut self, key: &PropertyName) -> Result<(), JsError> {
        match key {
            PropertyName::Computed(e) => {
                self.compile_expression(e)?;
                self.emit(Op::ToPropertyKey);
                Ok(())
            }
            PropertyName::Private(name) => self.emit_private_name(name),
            other => {
                let name = other.static_name().unwrap_or_default();
                self.func.builder.emit_string(name)
            }
        }
    }

    fn compile_template(&mut self, t: &TemplateLiteral) -> Result<(), JsError> {
        let mut quasis = t.quasis.iter();
        let first = quasis
            .next()
            .and_then(|q| q.cooked.clone())
            .unwrap_or_default();
        self.func.builder.emit_string(first)?;
        for (e, q) in t.expressions.iter().zip(quasis) {
            self.compile_expression(e)?;
            self.emit(Op::ToString);
            self.emit(Op::Add);
            let text = q.cooked.clone().unwrap_or_default();
            if !text.is_empty() {
                self.func.builder.emit_string(text)?;
                self.emit(Op::Add);
            }
        }
        Ok(())
    }

    fn compile_unary(&mut self, u: &UnaryExpression) -> Result<(), JsError> {
        match u.operator {
            UnaryOp::Typeof => {
                if let Expression::Identifier(id) = u.argument.unparenthesized() {
                    return self.emit_typeof_name(&id.name);
                }
                self.compile_expression(&u.argument)?;
                self.emit(Op::Typeof);
            }
            UnaryOp::Delete => return self.compile_delete(&u.argument),
            UnaryOp::Void => {
                self.compile_expression(&u.argument)?;
                self.emit(Op::Pop);
                self.emit(Op::Undefined);
            }
            UnaryOp::Minus => {
                self.compile_expression(&u.argument)?;
                self.emit(Op::Neg);
            }
            UnaryOp::Plus => {
                self.compile_expression(&u.argument)?;
                self.emit(Op::ToNumber);
            }
            UnaryOp::Not => {
                self.compile_expression(&u.argument)?;
                self.emit(Op::Not);
            }
            UnaryOp::BitNot => {
                self.compile_expression(&u.argument)?;
                self.emit(Op::BitNot);
            }
        }
        Ok(())
    }

    fn compile_delete(&mut self, target: &Expression) -> Result<(), JsError> {
        let strict = self.is_strict();
        match target.unparenthesized() {
            Expression::Identifier(id) => self.emit_delete_name(&id.name),
            Expression::Member(m) => self.compile_delete_member(m, strict),
            Expression::OptionalChain(chain) => {
                let Expression::Member(m) = chain.expression.unparenthesized() else {
                    self.compile_expression(target)?;
                    self.emit(Op::Pop);
                    self.emit(Op::True);
                    return Ok(());
                };
                self.func.optional_exits.push(Vec::new());
                let result = self.compile_delete_member(m, strict);
                let exits = self.func.optional_exits.pop().unwrap_or_default();
                result?;
                let end = self.jump(Op::Jump { target: 0 });
                for j in exits {
                    self.patch(j);
                }
                self.emit(Op::True);
                self.patch(end);
                Ok(())
            }
            Expression::SuperMember(m) => {
                self.emit_this()?;
                self.emit(Op::Pop);
                self.compile_super_key(&m.property)?;
                self.emit(Op::Pop);
                let message = self
                    .func
                    .builder
                    .add_str("Unsupported reference to 'super'")?;
                self.emit(Op::ThrowReferenceError { message });
                self.emit(Op::True);
                Ok(())
            }
            other => {
                self.compile_expression(other)?;
                self.emit(Op::Pop);
                self.emit(Op::True);
                Ok(())
            }
        }
    }

    fn compile_delete_member(&mut self, m: &MemberExpression, strict: bool) -> Result<(), JsError> {
        self.compile_member_object(m)?;
        match &m.property {
            MemberProperty::Identifier(name) => {
                let name = self.name_const(name)?;
                self.emit(Op::DeleteProp { name, strict });
            }
            MemberProperty::Expression(key) => {
                self.compile_expression(key)?;
                self.emit(Op::DeleteElem { strict });
            }
            MemberProperty::Private(_) => {
                return Err(JsError::syntax_error(
                    "Private fields can not be deleted",
                ));
            }
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Members and calls
    // ───────────────────────────────────────────────────────────────────────

    /// Short-circuit the innermost optional chain when the top `pop` values
    /// start with a nullish one
    fn emit_optional_check(&mut self, pop: u32) -> Result<(), JsError> {
        if self.func.optional_exits.is_empty() {
            return Err(JsError::syntax_error("Invalid optional chain"));
        }
        let j = self.jump(Op::JumpIfNullish { target: 0, pop });
        if let Some(exits) = self.func.optional_exits.last_mut() {
            exits.push(j);
        }
        Ok(())
    }

    /// [] -> [obj], with the optional check of `obj?.x`
    fn compile_member_object(&mut self, m: &MemberExpression) -> Result<(), JsError> {
        self.compile_expression(&m.object)?;
        if m.optional {
            self.emit_optional_check(1)?;
        }
        Ok(())
    }

    fn compile_member(&mut self, m: &MemberExpression) -> Result<(), JsError> {
        self.compile_member_object(m)?;
        self.set_span(m.span);
        match &m.property {
            MemberProperty::Identifier(name) => {
                let name = self.name_const(name)?;
                let cache = self.func.builder.alloc_cache();
                self.emit(Op::GetProp { name, cache });
            }
            MemberProperty::Expression(key) => {
                self.compile_expression(key)?;
                self.emit(Op::GetElem);
            }
            MemberProperty::Private(name) => {
                self.emit_private_name(name)?;
                self.emit(Op::GetPrivate);
            }
        }
        Ok(())
    }

    /// [] -> [this, fn]
    fn compile_callee(&mut self, callee: &Expression) -> Result<(), JsError> {
        match callee.unparenthesized() {
            Expression::Member(m) => {
                self.compile_member_object(m)?;
                self.set_span(m.span);
                match &m.property {
                    MemberProperty::Identifier(name) => {
                        let name = self.name_const(name)?;
                        let cache = self.func.builder.alloc_cache();
                        self.emit(Op::GetMethod { name, cache });
                    }
                    MemberProperty::Expression(key) => {
                        self.compile_expression(key)?;
                        self.emit(Op::GetElemMethod);
                    }
                    MemberProperty::Private(name) => {
                        self.emit(Op::Dup);
                        self.emit_private_name(name)?;
                        self.emit(Op::GetPrivate);
                    }
                }
            }
            Expression::SuperMember(m) => {
                self.emit_this()?;
                self.emit_this()?;
                self.emit_home_function()?;
                self.compile_super_key(&m.property)?;
                self.emit(Op::SuperGet);
            }
            Expression::Identifier(id) => self.emit_load_callee_name(&id.name)?,
            other => {
                self.emit(Op::Undefined);
                self.compile_expression(other)?;
            }
        }
        Ok(())
    }

    fn compile_call(&mut self, call: &CallExpression) -> Result<(), JsError> {
        self.compile_callee(&call.callee)?;
        if call.optional {
            self.emit_optional_check(2)?;
        }
        let argc = self.compile_arguments(&call.arguments)?;
        self.set_span(call.span);
        match argc {
            Some(argc) => self.emit(Op::Call { argc }),
            None => self.emit(Op::CallSpread),
        };
        Ok(())
    }

    /// Operand of `return`: calls in tail position become `TailCall`
    pub(crate) fn compile_returned(&mut self, expr: &Expression) -> Result<(), JsError> {
        match expr {
            Expression::Call(call) if !call.optional => self.compile_tail_call(call),
            Expression::Parenthesized(inner, _) => self.compile_returned(inner),
            Expression::Conditional(c) => {
                self.compile_expression(&c.test)?;
                let else_jump = self.jump(Op::JumpIfFalse { target: 0 });
                self.compile_returned(&c.consequent)?;
                let end = self.jump(Op::Jump { target: 0 });
                self.patch(else_jump);
                self.compile_returned(&c.alternate)?;
                self.patch(end);
                Ok(())
            }
            _ => self.compile_expression(expr),
        }
    }

    fn compile_tail_call(&mut self, call: &CallExpression) -> Result<(), JsError> {
        self.compile_callee(&call.callee)?;
        let argc = self.compile_arguments(&call.arguments)?;
        self.set_span(call.span);
        match argc {
            Some(argc) => self.emit(Op::TailCall { argc }),
            None => self.emit(Op::CallSpread),
        };
        Ok(())
    }

    /// Generators and async functions keep their frame across suspensions,
    /// and derived constructors check the returned value against `this`
    pub(crate) fn tail_calls_allowed(&self) -> bool {
        !self.func.is_async && !self.func.is_generator && self.func.kind != FunctionKind::DerivedConstructor
    }

    /// Push the arguments one by one and return their count, or build an
    /// array and return `None` when a spread is present
    fn compile_arguments(&mut self, args: &[Argument]) -> Result<Option<u32>, JsError> {
        if args.iter().any(|a| matches!(a, Argument::Spread(_))) {
            self.compile_argument_array(args)?;
            return Ok(None);
        }
        for arg in args {
            if let Argument::Expression(e) = arg {
                self.compile_expression(e)?;
            }
        }
        Ok(Some(args.len() as u32))
    }

    fn compile_argument_array(&mut self, args: &[Argument]) -> Result<(), JsError> {
        self.emit(Op::NewArray {
            capacity: args.len() as u32,
        });
        for arg in args {
            match arg {
                Argument::Expression(e) => {
                    self.compile_expression(e)?;
                    self.emit(Op::ArrayPush);
                }
                Argument::Spread(s) => {
                    self.compile_expression(&s.argument)?;
                    self.emit(Op::ArraySpread);
                }
            }
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Assignment
    // ───────────────────────────────────────────────────────────────────────

    /// Evaluate the parts of an assignment target that come before the
    /// value
    fn compile_reference<'e>(&mut self, target: &'e Expression) -> Result<Reference<'e>, JsError> {
        match target.unparenthesized() {
            Expression::Identifier(id) => Ok(Reference::Name(&id.name)),
            Expression::Member(m) => {
                self.compile_expression(&m.object)?;
                match &m.property {
                    MemberProperty::Identifier(name) => Ok(Reference::Prop(name.clone())),
                    MemberProperty::Expression(key) => {
                        self.compile_expression(key)?;
                        self.emit(Op::ToPropertyKey);
                        Ok(Reference::Elem)
                    }
                    MemberProperty::Private(name) => {
                        self.emit_private_name(name)?;
                        Ok(Reference::Private)
                    }
                }
            }
            Expression::SuperMember(m) => {
                self.emit_this()?;
                self.emit_home_function()?;
                self.compile_super_key(&m.property)?;
                Ok(Reference::Super)
            }
            _ => Err(JsError::syntax_error("Invalid left-hand side in assignment")),
        }
    }

    /// [ref parts] -> [ref parts, current value]
    fn emit_reference_get(&mut self, reference: &Reference<'_>) -> Result<(), JsError> {
        match reference {
            Reference::Name(name) => self.emit_load_name(name)?,
            Reference::Prop(name) => {
                self.emit(Op::Dup);
                let name = self.name_const(name)?;
                let cache = self.func.builder.alloc_cache();
                self.emit(Op::GetProp { name, cache });
            }
            Reference::Elem => {
                self.emit(Op::Dup2);
                self.emit(Op::GetElem);
            }
            Reference::Private => {
                self.emit(Op::Dup2);
                self.emit(Op::GetPrivate);
            }
            Reference::Super => {
                self.emit(Op::Pick { depth: 2 });
                self.emit(Op::Pick { depth: 2 });
                self.emit(Op::Pick { depth: 2 });
                self.emit(Op::SuperGet);
            }
        }
        Ok(())
    }

    /// [ref parts, value] -> [value]
    fn emit_reference_put(&mut self, reference: &Reference<'_>) -> Result<(), JsError> {
        let strict = self.is_strict();
        match reference {
            Reference::Name(name) => self.emit_assign_name(name)?,
            Reference::Prop(name) => {
                let name = self.name_const(name)?;
                let cache = self.func.builder.alloc_cache();
                self.emit(Op::SetProp { name, cache, strict });
            }
            Reference::Elem => {
                self.emit(Op::SetElem { strict });
            }
            Reference::Private => {
                self.emit(Op::SetPrivate);
            }
            Reference::Super => {
                self.emit(Op::SuperSet { strict });
            }
        }
        Ok(())
    }

    /// [ref parts, value] -> [value], dropping the reference parts
    fn emit_reference_discard(&mut self, reference: &Reference<'_>) {
        match reference {
            Reference::Name(_) => {}
            Reference::Prop(_) => {
                self.emit(Op::Swap);
                self.emit(Op::Pop);
            }
            Reference::Elem | Reference::Private => {
                self.emit(Op::Rot3);
                self.emit(Op::Pop);
                self.emit(Op::Pop);
            }
            Reference::Super => {
                self.emit(Op::Rot4);
                self.emit(Op::Pop);
                self.emit(Op::Pop);
                self.emit(Op::Pop);
            }
        }
    }

    fn compile_assignment(&mut self, a: &AssignmentExpression) -> Result<(), JsError> {
        let target = match &a.target {
            AssignmentTarget::Pattern(pattern) => {
                self.compile_expression(&a.right)?;
                self.emit(Op::Dup);
                return self.compile_pattern_at(pattern, BindMode::Assign, None);
            }
            AssignmentTarget::Simple(target) => target,
        };

        let reference = self.compile_reference(target)?;
        let value_name = match &reference {
            Reference::Name(name) => Some(*name),
            _ => None,
        };

        if a.operator == AssignmentOp::Assign {
            match value_name {
                Some(name) => self.compile_expression_named(&a.right, name)?,
                None => self.compile_expression(&a.right)?,
            }
            self.set_span(a.span);
            return self.emit_reference_put(&reference);
        }

        if let Some(op) = a.operator.binary_op() {
            self.emit_reference_get(&reference)?;
            self.compile_expression(&a.right)?;
            self.set_span(a.span);
            self.emit(binary_op(op));
            return self.emit_reference_put(&reference);
        }

        let Some(logical) = a.operator.logical_op() else {
            return Err(JsError::syntax_error("Invalid assignment operator"));
        };
        self.emit_reference_get(&reference)?;
        let short = self.jump(short_circuit(logical));
        match value_name {
            Some(name) => self.compile_expression_named(&a.right, name)?,
            None => self.compile_expression(&a.right)?,
        }
        self.emit_reference_put(&reference)?;
        let end = self.jump(Op::Jump { target: 0 });
        self.patch(short);
        self.emit_reference_discard(&reference);
        self.patch(end);
        Ok(())
    }

    fn compile_update(&mut self, u: &UpdateExpression) -> Result<(), JsError> {
        let step = match u.operator {
            UpdateOp::Increment => Op::Inc,
            UpdateOp::Decrement => Op::Dec,
        };
        let reference = self.compile_reference(&u.argument)?;
        self.emit_reference_get(&reference)?;
        self.emit(Op::ToNumeric);
        self.set_span(u.span);

        if u.prefix {
            self.emit(step);
            return self.emit_reference_put(&reference);
        }

        // Postfix: keep the old value under the reference parts
        match &reference {
            Reference::Name(_) => {
                self.emit(Op::Dup);
                self.emit(step);
                self.emit_reference_put(&reference)?;
                self.emit(Op::Pop);
            }
            Reference::Prop(_) => {
                self.emit(Op::Dup);
                self.emit(Op::Rot3);
                self.emit(step);
                self.emit_reference_put(&reference)?;
                self.emit(Op::Pop);
            }
            Reference::Elem | Reference::Private => {
                self.emit(Op::Dup);
                self.emit(Op::Rot4);
                self.emit(step);
                self.emit_reference_put(&reference)?;
                self.emit(Op::Pop);
            }
            Reference::Super => {
                let temp = self.alloc_temp();
                self.emit(Op::Dup);
                self.emit(Op::Store { slot: temp });
                self.emit(step);
                self.emit_reference_put(&reference)?;
                self.emit(Op::Pop);
                self.emit(Op::Load { slot: temp });
            }
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Generators
    // ───────────────────────────────────────────────────────────────────────

    fn compile_yield(&mut self, y: &YieldExpression) -> Result<(), JsError> {
        let is_async = self.func.is_async;
        match &y.argument {
            Some(arg) => self.compile_expression(arg)?,
            None => {
                self.emit(Op::Undefined);
            }
        }
        self.set_span(y.span);

        if !y.delegate {
            if is_async {
                self.emit(Op::Await);
            }
            self.emit(Op::Yield);
            return Ok(());
        }

        if is_async {
            self.emit(Op::GetAsyncIterator);
        } else {
            self.emit(Op::GetIterator);
        }
        self.emit(Op::Undefined);
        let top = self.offset();
        let done = self.jump(Op::YieldStar { target: 0 });
        self.func.builder.emit_jump_to(top);
        self.patch(done);
        // [iter, next, done, value] -> [value]
        self.emit(Op::Rot4);
        self.emit(Op::Pop);
        self.emit(Op::Pop);
        self.emit(Op::Pop);
        Ok(())
    }
}

fn binary_op(op: BinaryOp) -> Op {
    match op {
        BinaryOp::Add => Op::Add,
        BinaryOp::Sub => Op::Sub,
        BinaryOp::Mul => Op::Mul,
        BinaryOp::Div => Op::Div,
        BinaryOp::Mod => Op::Mod,
        BinaryOp::Exp => Op::Exp,
        BinaryOp::Eq => Op::Eq,
        BinaryOp::NotEq => Op::NotEq,
        BinaryOp::StrictEq => Op::StrictEq,
        BinaryOp::StrictNotEq => Op::StrictNotEq,
        BinaryOp::Lt => Op::Lt,
        BinaryOp::LtEq => Op::LtEq,
        BinaryOp::Gt => Op::Gt,
        BinaryOp::GtEq => Op::GtEq,
        BinaryOp::BitAnd => Op::BitAnd,
        BinaryOp::BitOr => Op::BitOr,
        BinaryOp::BitXor => Op::BitXor,
        BinaryOp::LShift => Op::Shl,
        BinaryOp::RShift => Op::Shr,
        BinaryOp::URShift => Op::UShr,
        BinaryOp::In => Op::In,
        BinaryOp::Instanceof => Op::InstanceOf,
    }
}

fn short_circuit(op: LogicalOp) -> Op {
    match op {
        LogicalOp::And => Op::JumpIfFalseKeep { target: 0 },
        LogicalOp::Or => Op::JumpIfTrueKeep { target: 0 },
        LogicalOp::NullishCoalescing => Op::JumpIfNotNullishKeep { target: 0 },
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::{Op, compile};
    use crate::parser::ParserOptions;

    fn ops(source: &str) -> Vec<Op> {
        match compile(source, "test.js", false, &ParserOptions::default()) {
            Ok(p) => p.code().code.clone(),
            Err(e) => panic!("compile failed for {source:?}: {e}"),
        }
    }

    #[test]
    fn undefined_is_a_constant_at_top_level() {
        let code = ops("undefined;");
        assert!(code.iter().any(|op| matches!(op, Op::Undefined)));
        assert!(!code.iter().any(|op| matches!(op, Op::GetGlobal { .. })));
    }

    #[test]
    fn method_calls_keep_the_receiver() {
        let code = ops("a.b(1, 2);");
        assert!(code.iter().any(|op| matches!(op, Op::GetMethod { .. })));
        assert!(code.iter().any(|op| matches!(op, Op::Call { argc: 2 })));
    }

    #[test]
    fn spread_arguments_use_an_array() {
        let code = ops("f(...xs);");
        assert!(code.iter().any(|op| matches!(op, Op::ArraySpread)));
        assert!(code.iter().any(|op| matches!(op, Op::CallSpread)));
    }

    #[test]
    fn optional_chains_short_circuit() {
        let code = ops("a?.b.c;");
        assert!(
            code.iter()
                .any(|op| matches!(op, Op::JumpIfNullish { pop: 1, .. }))
        );
        let code = ops("a.b?.();");
        assert!(
            code.iter()
                .any(|op| matches!(op, Op::JumpIfNullish { pop: 2, .. }))
        );
    }

    #[test]
    fn compound_member_assignment_reads_once() {
        let code = ops("o[k] += 1;");
        assert_eq!(code.iter().filter(|op| matches!(op, Op::GetElem)).count(), 1);
        assert!(code.iter().any(|op| matches!(op, Op::Dup2)));
        assert!(code.iter().any(|op| matches!(op, Op::SetElem { .. })));
    }

    #[test]
    fn templates_convert_substitutions() {
        let code = ops("`a${x}b`;");
        assert!(code.iter().any(|op| matches!(op, Op::ToString)));
    }
}
