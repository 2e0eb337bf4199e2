//! Class compilation
//!
//! A class definition runs in its own scope holding the class name, the
//! private names and the evaluated computed field keys. Field initializers
//! and static blocks are compiled into two synthetic methods: the instance
//! initializer runs on every new object, the static one once on the
//! constructor.

use super::Compiler;
use super::scope::{computed_key_binding, private_method_binding};
use super::{
    BytecodeBuilder, FunctionCode, FunctionFlags, FunctionMeta, FunctionState, MethodKind, Op,
    PrivateKind,
};
use crate::ast::{
    Class, ClassField, ClassMember, ClassMethod, FunctionKind, MethodKind as ElementKind,
    PropertyName, ScopeId,
};
use crate::error::JsError;
use crate::string::JsString;

const HASH: u16 = b'#' as u16;

impl Compiler<'_> {
    /// [] -> [ctor]
    pub(crate) fn compile_class(&mut self, c: &Class, name: Option<&JsString>) -> Result<(), JsError> {
        let class_name = c
            .id
            .as_ref()
            .map(|id| id.name.clone())
            .or_else(|| name.cloned())
            .unwrap_or_default();
        self.set_span(c.span);
        let outer_strict = self.func.strict;
        self.func.strict = true;
        let result = self.compile_class_body(c, class_name);
        self.func.strict = outer_strict;
        result
    }

    fn compile_class_body(&mut self, c: &Class, class_name: JsString) -> Result<(), JsError> {
        self.enter_scope(c.scope);

        let res = self.res;
        for b in &res.scope(c.scope).bindings {
            if b.name.code_unit_at(0) == Some(HASH) {
                let name = self.name_const(&b.name)?;
                self.emit(Op::NewPrivateName { name });
                let slot = self.slot_of(c.scope, b);
                self.emit(Op::Init { slot });
            }
        }

        let derived = match &c.super_class {
            Some(heritage) => {
                self.compile_expression(heritage)?;
                true
            }
            None => false,
        };

        let ctor = match &c.constructor {
            Some(f) => self.compile_function_code(f, class_name.clone())?,
            None => self.default_constructor(c, class_name.clone(), derived),
        };
        let idx = self.func.builder.add_function(ctor)?;
        self.set_span(c.span);
        self.emit(Op::CreateClass { idx, derived });

        // [ctor, proto]
        for (i, member) in c.members.iter().enumerate() {
            match member {
                ClassMember::Method(m) => self.compile_class_method(c, m, i)?,
                ClassMember::Field(field) => {
                    if let PropertyName::Computed(key) = &field.key {
                        self.set_span(field.span);
                        self.compile_expression(key)?;
                        self.emit(Op::ToPropertyKey);
                        self.emit_init_hidden(c.scope, &computed_key_binding(i))?;
                    }
                }
                ClassMember::StaticBlock(_) => {}
            }
        }

        if needs_initializer(c, false) {
            let init = self.compile_initializer(c, false)?;
            let idx = self.func.builder.add_function(init)?;
            self.emit(Op::Closure { idx });
            self.emit(Op::SetClassFields);
        }

        if let Some(id) = &c.id {
            self.emit(Op::Pick { depth: 1 });
            self.emit_init_hidden(c.scope, &id.name)?;
        }

        if needs_initializer(c, true) {
            let init = self.compile_initializer(c, true)?;
            let idx = self.func.builder.add_function(init)?;
            // Call it with the constructor as both receiver and home object
            self.emit(Op::Pick { depth: 1 });
            self.emit(Op::Closure { idx });
            self.emit(Op::SetHomeObject);
            self.emit(Op::Pick { depth: 2 });
            self.emit(Op::Swap);
            self.emit(Op::Call { argc: 0 });
            self.emit(Op::Pop);
        }

        self.emit(Op::Pop);
        self.exit_scope(c.scope);
        Ok(())
    }

    /// [value] -> [] into a binding of the class scope
    fn emit_init_hidden(&mut self, scope: ScopeId, name: &JsString) -> Result<(), JsError> {
        let Some(binding) = self.res.scope(scope).binding(name) else {
            return Err(JsError::syntax_error(format!(
                "Unresolved class binding '{name}'"
            )));
        };
        let slot = self.slot_of(scope, binding);
        self.emit(Op::Init { slot });
        Ok(())
    }

    /// [ctor, proto] -> [ctor, proto]
    fn compile_class_method(&mut self, c: &Class, m: &ClassMethod, index: usize) -> Result<(), JsError> {
        self.set_span(m.span);
        if let PropertyName::Private(name) = &m.key {
            let prefix = match m.kind {
                ElementKind::Method => "",
                ElementKind::Get => "get ",
                ElementKind::Set => "set ",
            };
            let fn_name = JsString::from(format!("{prefix}#{name}"));
            let idx = self.compile_function(&m.function, fn_name)?;
            // Home object: the constructor for static methods, else the prototype
            self.emit(Op::Pick {
                depth: u32::from(m.is_static),
            });
            self.emit(Op::Closure { idx });
            self.emit(Op::SetHomeObject);
            return self.emit_init_hidden(c.scope, &private_method_binding(index));
        }

        self.compile_property_key(&m.key)?;
        let name = m.key.static_name().unwrap_or_default();
        let idx = self.compile_function(&m.function, name)?;
        self.emit(Op::Closure { idx });
        self.emit(Op::DefineClassMethod {
            kind: method_kind(m.kind),
            is_static: m.is_static,
        });
        Ok(())
    }

    fn default_constructor(&mut self, c: &Class, name: JsString, derived: bool) -> FunctionCode {
        let mut b = BytecodeBuilder::new();
        b.set_span(c.span);
        let mut flags = FunctionFlags::new(
            FunctionFlags::CONSTRUCTOR
                | FunctionFlags::CLASS_CONSTRUCTOR
                | FunctionFlags::METHOD
                | FunctionFlags::STRICT,
        );
        let kind = if derived {
            flags.set(FunctionFlags::DERIVED);
            // constructor(...args) { super(...args); }
            b.emit(Op::Callee);
            b.emit(Op::NewTarget);
            b.emit(Op::RestArgs { from: 0 });
            b.emit(Op::SuperCall);
            b.emit(Op::Return);
            FunctionKind::DerivedConstructor
        } else {
            b.emit(Op::Undefined);
            b.emit(Op::Return);
            FunctionKind::ClassConstructor
        };
        b.finish(FunctionMeta {
            name,
            kind,
            flags,
            length: 0,
            local_count: 0,
            source: self.source.clone(),
            span: c.span,
        })
    }

    /// Compile the instance or static initializer method
    fn compile_initializer(&mut self, c: &Class, is_static: bool) -> Result<FunctionCode, JsError> {
        let scope = if is_static {
            c.static_init_scope
        } else {
            c.instance_init_scope
        };
        let local_count = self.res.scope(scope).local_count;
        let state = FunctionState::new(scope, FunctionKind::Method, true, local_count);
        let outer = std::mem::replace(&mut self.func, state);
        self.chain.push(scope);
        self.set_span(c.span);

        let result = self.compile_initializer_body(c, scope, is_static);

        self.chain.pop();
        let state = std::mem::replace(&mut self.func, outer);
        result?;

        Ok(state.builder.finish(FunctionMeta {
            name: JsString::empty(),
            kind: FunctionKind::Method,
            flags: FunctionFlags::new(FunctionFlags::METHOD | FunctionFlags::STRICT),
            length: 0,
            local_count: state.local_count,
            source: self.source.clone(),
            span: c.span,
        }))
    }

    fn compile_initializer_body(&mut self, c: &Class, scope: ScopeId, is_static: bool) -> Result<(), JsError> {
        self.emit_prologue(scope, FunctionKind::Method);

        // Private methods are installed before any field is evaluated
        for (i, member) in c.members.iter().enumerate() {
            let ClassMember::Method(m) = member else {
                continue;
            };
            let PropertyName::Private(name) = &m.key else {
                continue;
            };
            if m.is_static != is_static {
                continue;
            }
            self.set_span(m.span);
            self.emit(Op::This);
            self.emit_private_name(name)?;
            self.emit_load_name(&private_method_binding(i))?;
            let kind = match m.kind {
                ElementKind::Method => PrivateKind::Method,
                ElementKind::Get => PrivateKind::Getter,
                ElementKind::Set => PrivateKind::Setter,
            };
            self.emit(Op::AddPrivate { kind });
            self.emit(Op::Pop);
        }

        for (i, member) in c.members.iter().enumerate() {
            match member {
                ClassMember::Field(field) if field.is_static == is_static => {
                    self.compile_field(field, i)?;
                }
                ClassMember::StaticBlock(block) if is_static => {
                    self.set_span(block.span);
                    let idx = self.compile_function(block, JsString::empty())?;
                    self.emit(Op::This);
                    self.emit(Op::This);
                    self.emit(Op::Closure { idx });
                    self.emit(Op::SetHomeObject);
                    self.emit(Op::Call { argc: 0 });
                    self.emit(Op::Pop);
                }
                _ => {}
            }
        }

        self.emit(Op::Undefined);
        self.emit(Op::Return);
        Ok(())
    }

    /// Define one field on `this`
    fn compile_field(&mut self, field: &ClassField, index: usize) -> Result<(), JsError> {
        self.set_span(field.span);
        self.emit(Op::This);
        match &field.key {
            PropertyName::Private(name) => {
                self.emit_private_name(name)?;
                let fn_name = JsString::from(format!("#{name}"));
                self.compile_field_value(field, Some(&fn_name))?;
                self.emit(Op::AddPrivate {
                    kind: PrivateKind::Field,
                });
            }
            PropertyName::Computed(_) => {
                self.emit_load_name(&computed_key_binding(index))?;
                self.compile_field_value(field, None)?;
                let anonymous = field
                    .value
                    .as_ref()
                    .is_some_and(|v| v.unparenthesized().is_anonymous_function_definition());
                if anonymous {
                    self.emit(Op::SetFunctionName { prefix: None });
                }
                self.emit(Op::DefineElemField);
            }
            key => {
                let name = key.static_name().unwrap_or_default();
                self.compile_field_value(field, Some(&name))?;
                let name = self.name_const(&name)?;
                self.emit(Op::DefineField { name });
            }
        }
        self.emit(Op::Pop);
        Ok(())
    }

    fn compile_field_value(&mut self, field: &ClassField, name: Option<&JsString>) -> Result<(), JsError> {
        match (&field.value, name) {
            (Some(value), Some(name)) => self.compile_expression_named(value, name),
            (Some(value), None) => self.compile_expression(value),
            (None, _) => {
                self.emit(Op::Undefined);
                Ok(())
            }
        }
    }
}

fn method_kind(kind: ElementKind) -> MethodKind {
    match kind {
        ElementKind::Method => MethodKind::Method,
        ElementKind::Get => MethodKind::Getter,
        ElementKind::Set => MethodKind::Setter,
    }
}

/// Whether the instance (or static) initializer has anything to do
fn needs_initializer(c: &Class, is_static: bool) -> bool {
    c.members.iter().any(|m| match m {
        ClassMember::Field(f) => f.is_static == is_static,
        ClassMember::Method(m) => m.is_static == is_static && matches!(m.key, PropertyName::Private(_)),
        ClassMember::StaticBlock(_) => is_static,
    })
}

#[cfg(test)]
mod tests {
    use crate::compiler::{Op, Program, compile};
    use crate::parser::ParserOptions;

    fn compile_ok(source: &str) -> Program {
        match compile(source, "test.js", false, &ParserOptions::default()) {
            Ok(p) => p,
            Err(e) => panic!("compile failed for {source:?}: {e}"),
        }
    }

    #[test]
    fn fields_get_an_initializer() {
        let program = compile_ok("class A { x = 1; #y = 2; }");
        let code = &program.code().code;
        assert!(code.iter().any(|op| matches!(op, Op::SetClassFields)));
        assert!(code.iter().any(|op| matches!(op, Op::NewPrivateName { .. })));
    }

    #[test]
    fn plain_classes_skip_initializers() {
        let program = compile_ok("class A { m() {} static s() {} }");
        let code = &program.code().code;
        assert!(!code.iter().any(|op| matches!(op, Op::SetClassFields)));
        assert_eq!(
            code.iter()
                .filter(|op| matches!(op, Op::DefineClassMethod { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn derived_classes_synthesize_a_constructor() {
        let program = compile_ok("class B extends Object {}");
        assert!(
            program
                .code()
                .code
                .iter()
                .any(|op| matches!(op, Op::CreateClass { derived: true, .. }))
        );
        assert!(
            program
                .code()
                .nested()
                .any(|f| f.code.iter().any(|op| matches!(op, Op::SuperCall)))
        );
    }
}
