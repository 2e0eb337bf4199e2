//! Destructuring and binding patterns
//!
//! Every pattern consumes the value on top of the stack. `base` is the
//! operand stack height below that value when it is known statically; array
//! patterns need it to register an iterator-close region.

use super::Compiler;
use super::compile_function::BindMode;
use super::{HandlerKind, Op, Slot};
use crate::ast::{ArrayPattern, Expression, MemberProperty, ObjectPattern, Pattern, PropertyName};
use crate::error::JsError;

impl Compiler<'_> {
    /// [value] -> []
    pub(crate) fn compile_pattern(&mut self, pattern: &Pattern, mode: BindMode) -> Result<(), JsError> {
        let base = self.func.held;
        self.compile_pattern_at(pattern, mode, Some(base))
    }

    pub(crate) fn compile_pattern_at(
        &mut self,
        pattern: &Pattern,
        mode: BindMode,
        base: Option<u32>,
    ) -> Result<(), JsError> {
        match pattern {
            Pattern::Identifier(id) => match mode {
                BindMode::Init => self.emit_init_name(&id.name),
                BindMode::Assign => {
                    self.emit_assign_name(&id.name)?;
                    self.emit(Op::Pop);
                    Ok(())
                }
            },
            Pattern::Assignment(a) => {
                let present = self.jump(Op::JumpIfNotUndefined { target: 0 });
                match a.left.as_ref() {
                    Pattern::Identifier(id) => self.compile_expression_named(&a.right, &id.name)?,
                    _ => self.compile_expression(&a.right)?,
                }
                self.patch(present);
                self.compile_pattern_at(&a.left, mode, base)
            }
            Pattern::Object(o) => self.compile_object_pattern(o, mode, base),
            Pattern::Array(a) => self.compile_array_pattern(a, mode, base),
            Pattern::Expression(target) => self.compile_target_store(target),
        }
    }

    /// [value] -> []: store into a member expression (or any simple target)
    fn compile_target_store(&mut self, target: &Expression) -> Result<(), JsError> {
        let strict = self.is_strict();
        match target.unparenthesized() {
            Expression::Identifier(id) => {
                self.emit_assign_name(&id.name)?;
            }
            Expression::Member(m) => {
                self.compile_expression(&m.object)?;
                match &m.property {
                    MemberProperty::Identifier(name) => {
                        // [v, obj] -> [obj, v]
                        self.emit(Op::Swap);
                        let name = self.name_const(name)?;
                        let cache = self.func.builder.alloc_cache();
                        self.emit(Op::SetProp { name, cache, strict });
                    }
                    MemberProperty::Expression(key) => {
                        self.compile_expression(key)?;
                        self.emit(Op::ToPropertyKey);
                        // [v, obj, key] -> [obj, key, v]
                        self.emit(Op::Rot3);
                        self.emit(Op::Rot3);
                        self.emit(Op::SetElem { strict });
                    }
                    MemberProperty::Private(name) => {
                        self.emit(Op::Swap);
                        self.emit_private_name(name)?;
                        // [obj, v, sym] -> [obj, sym, v]
                        self.emit(Op::Swap);
                        self.emit(Op::SetPrivate);
                    }
                }
            }
            Expression::SuperMember(m) => {
                // [v] -> [this, func, key, v]
                self.emit_this()?;
                self.emit_home_function()?;
                self.compile_super_key(&m.property)?;
                self.emit(Op::Rot4);
                self.emit(Op::Rot4);
                self.emit(Op::Rot4);
                self.emit(Op::SuperSet { strict });
            }
            _ => {
                let msg = self
                    .func
                    .builder
                    .add_str("Invalid destructuring assignment target")?;
                self.emit(Op::ThrowTypeError { message: msg });
            }
        }
        self.emit(Op::Pop);
        Ok(())
    }

    fn compile_object_pattern(
        &mut self,
        pattern: &ObjectPattern,
        mode: BindMode,
        base: Option<u32>,
    ) -> Result<(), JsError> {
        self.emit(Op::RequireObjectCoercible);
        let inner = base.map(|b| b + 1);
        // Computed keys are kept for the rest element
        let mut keys: Vec<KeyRef> = Vec::new();
        for prop in &pattern.properties {
            self.set_span(prop.span);
            self.emit(Op::Dup);
            match &prop.key {
                PropertyName::Computed(expr) => {
                    self.compile_expression(expr)?;
                    self.emit(Op::ToPropertyKey);
                    if pattern.rest.is_some() {
                        let temp = self.alloc_temp();
                        self.emit(Op::Dup);
                        self.emit(Op::Store { slot: temp });
                        keys.push(KeyRef::Temp(temp));
                    }
                    self.emit(Op::GetElem);
                }
                key => {
                    let Some(name) = key.static_name() else {
                        continue;
                    };
                    let idx = self.name_const(&name)?;
                    keys.push(KeyRef::Const(idx));
                    let cache = self.func.builder.alloc_cache();
                    self.emit(Op::GetProp { name: idx, cache });
                }
            }
            self.compile_pattern_at(&prop.value, mode, inner)?;
        }
        if let Some(rest) = &pattern.rest {
            self.emit(Op::Dup);
            for key in &keys {
                match *key {
                    KeyRef::Const(idx) => self.emit(Op::Const { idx }),
                    KeyRef::Temp(slot) => self.emit(Op::Load { slot }),
                };
            }
            self.emit(Op::CopyRest {
                excluded: keys.len() as u32,
            });
            self.compile_pattern_at(rest, mode, inner)?;
        }
        self.emit(Op::Pop);
        Ok(())
    }

    fn compile_array_pattern(
        &mut self,
        pattern: &ArrayPattern,
        mode: BindMode,
        base: Option<u32>,
    ) -> Result<(), JsError> {
        self.emit(Op::GetIterator);
        let inner = base.map(|b| b + 3);
        let start = self.offset();
        for element in &pattern.elements {
            self.emit(Op::IterStepOrUndefined);
            match element {
                Some(p) => self.compile_pattern_at(p, mode, inner)?,
                None => {
                    self.emit(Op::Pop);
                }
            }
        }
        if let Some(rest) = &pattern.rest {
            self.emit(Op::IterRest);
            self.compile_pattern_at(rest, mode, inner)?;
        }
        if let Some(stack) = inner {
            let depth = self.func.scope_depth;
            self.func
                .builder
                .add_handler(start, start, HandlerKind::IterClose, stack, depth);
        }
        self.emit(Op::IterClose);
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum KeyRef {
    Const(u32),
    Temp(Slot),
}
