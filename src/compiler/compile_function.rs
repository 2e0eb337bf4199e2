//! Function compilation: prologue, parameters, hoisting

use super::scope::{BindingKind, HIDDEN_FUNC, HIDDEN_NEW_TARGET, HIDDEN_THIS, unlabel};
use super::{Compiler, ConstantIndex, FunctionCode, FunctionFlags, FunctionMeta, FunctionState, Op};
use crate::ast::{Function, FunctionBody, FunctionKind, Pattern, ScopeId, Statement};
use crate::error::JsError;
use crate::string::JsString;

/// How a destructuring target is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindMode {
    /// Declarations: initialize the binding in place
    Init,
    /// Assignments and `var`: PutValue through the scope chain
    Assign,
}

impl Compiler<'_> {
    /// Create closures for the function declarations of a statement list
    pub(crate) fn hoist_functions(&mut self, body: &[Statement]) -> Result<(), JsError> {
        for stmt in body {
            if let Statement::FunctionDeclaration(f) = unlabel(stmt) {
                let Some(id) = &f.id else {
                    continue;
                };
                let idx = self.compile_function(f, id.name.clone())?;
                self.emit(Op::Closure { idx });
                self.emit_init_name(&id.name)?;
            }
        }
        Ok(())
    }

    /// Sloppy block function: copy the block binding to the var of the same
    /// name when its declaration is evaluated
    pub(crate) fn emit_annex_b_copy(&mut self, f: &Function) -> Result<(), JsError> {
        let Some(id) = &f.id else {
            return Ok(());
        };
        self.emit_load_name(&id.name)?;
        match self.scope_slot(self.func.scope, &id.name.to_string()) {
            Some(slot) if !self.is_script_function() => {
                self.emit(Op::Store { slot });
            }
            _ => {
                let name = self.name_const(&id.name)?;
                self.emit(Op::SetGlobal {
                    name,
                    strict: false,
                });
                self.emit(Op::Pop);
            }
        }
        Ok(())
    }

    pub(crate) fn is_script_function(&self) -> bool {
        self.func.completion.is_some()
    }

    /// Compile a nested function into the current constant pool
    pub(crate) fn compile_function(&mut self, f: &Function, name: JsString) -> Result<ConstantIndex, JsError> {
        let code = self.compile_function_code(f, name)?;
        self.func.builder.add_function(code)
    }

    pub(crate) fn compile_function_code(&mut self, f: &Function, name: JsString) -> Result<FunctionCode, JsError> {
        let local_count = self.res.scope(f.scope).local_count;
        let mut state = FunctionState::new(f.scope, f.kind, f.strict, local_count);
        state.is_generator = f.is_generator;
        state.is_async = f.is_async;
        let outer = std::mem::replace(&mut self.func, state);
        self.chain.push(f.scope);
        self.set_span(f.span);

        let result = self.compile_function_body(f);

        self.chain.pop();
        let state = std::mem::replace(&mut self.func, outer);
        result?;

        Ok(state.builder.finish(FunctionMeta {
            name,
            kind: f.kind,
            flags: function_flags(f),
            length: f.expected_argument_count(),
            local_count: state.local_count,
            source: self.source.clone(),
            span: f.span,
        }))
    }

    fn compile_function_body(&mut self, f: &Function) -> Result<(), JsError> {
        self.emit_prologue(f.scope, f.kind);
        self.compile_parameters(f)?;

        if let FunctionBody::Block(body) = &f.body {
            self.hoist_functions(body)?;
        }

        if f.is_generator {
            self.emit(Op::GeneratorStart);
        }

        match &f.body {
            FunctionBody::Block(body) => {
                self.compile_statements(body)?;
                self.emit(Op::Undefined);
                self.emit_return()?;
            }
            FunctionBody::Expression(e) => {
                if self.tail_calls_allowed() {
                    self.compile_returned(e)?;
                } else {
                    self.compile_expression(e)?;
                }
                self.emit(Op::Return);
            }
        }
        Ok(())
    }

    /// Allocate the function's stash and give hidden, var and `arguments`
    /// bindings their initial values
    pub(crate) fn emit_prologue(&mut self, scope: ScopeId, kind: FunctionKind) {
        let res = self.res;
        let info = res.scope(scope);
        if info.has_stash() {
            self.emit(Op::PushScope {
                size: info.stash_size,
            });
            self.func.scope_depth += 1;
        }

        for b in &info.bindings {
            let slot = self.slot_of(scope, b);
            let init = match b.kind {
                BindingKind::Hidden if b.name == HIDDEN_THIS => {
                    if kind == FunctionKind::DerivedConstructor {
                        None
                    } else {
                        Some(Op::This)
                    }
                }
                BindingKind::Hidden if b.name == HIDDEN_NEW_TARGET => Some(Op::NewTarget),
                BindingKind::Hidden if b.name == HIDDEN_FUNC => Some(Op::Callee),
                BindingKind::FunctionName => Some(Op::Callee),
                BindingKind::Arguments => Some(Op::CreateArguments),
                BindingKind::Var | BindingKind::Param => Some(Op::Undefined),
                _ => None,
            };
            if let Some(op) = init {
                self.emit(op);
                self.emit(Op::Init { slot });
            }
        }
    }

    fn compile_parameters(&mut self, f: &Function) -> Result<(), JsError> {
        for (i, param) in f.params.iter().enumerate() {
            self.emit(Op::Arg { index: i as u32 });
            match param {
                Pattern::Identifier(id) => self.emit_init_name(&id.name)?,
                other => self.compile_pattern(other, BindMode::Init)?,
            }
        }
        if let Some(rest) = &f.rest {
            self.emit(Op::RestArgs {
                from: f.params.len() as u32,
            });
            self.compile_pattern(rest, BindMode::Init)?;
        }
        Ok(())
    }

    /// [value] -> (returns) with the checks a `return` needs in this function
    pub(crate) fn emit_return(&mut self) -> Result<(), JsError> {
        if self.func.kind == FunctionKind::DerivedConstructor {
            match self.scope_slot(self.func.scope, HIDDEN_THIS) {
                Some(this) => {
                    self.emit(Op::DerivedReturn { this });
                }
                None => {
                    self.emit(Op::Return);
                }
            }
            return Ok(());
        }
        if self.func.is_async && self.func.is_generator {
            self.emit(Op::Await);
        }
        self.emit(Op::Return);
        Ok(())
    }
}

pub(crate) fn function_flags(f: &Function) -> FunctionFlags {
    let mut flags = FunctionFlags::default();
    if f.strict {
        flags.set(FunctionFlags::STRICT);
    }
    if f.kind == FunctionKind::Arrow {
        flags.set(FunctionFlags::ARROW);
    }
    if f.is_generator {
        flags.set(FunctionFlags::GENERATOR);
    }
    if f.is_async {
        flags.set(FunctionFlags::ASYNC);
    }
    let plain = f.kind == FunctionKind::Normal && !f.is_async && !f.is_generator;
    if plain || f.kind.is_class_constructor() {
        flags.set(FunctionFlags::CONSTRUCTOR);
    }
    if f.kind.is_class_constructor() {
        flags.set(FunctionFlags::CLASS_CONSTRUCTOR);
    }
    if f.kind == FunctionKind::DerivedConstructor {
        flags.set(FunctionFlags::DERIVED);
    }
    if f.kind.has_home_object() {
        flags.set(FunctionFlags::METHOD);
    }
    flags
}
