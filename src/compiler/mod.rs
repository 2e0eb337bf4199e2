//! Bytecode compiler
//!
//! Compiles a parsed script to stack-machine bytecode in two passes: the
//! scope resolver decides where every binding lives, then the emitters walk
//! the AST once more and produce one `FunctionCode` per function.

mod builder;
mod bytecode;
mod compile_class;
mod compile_expr;
mod compile_function;
mod compile_pattern;
mod compile_stmt;
pub(crate) mod scope;

pub use builder::{BytecodeBuilder, FunctionMeta, JumpPlaceholder};
pub use bytecode::{
    Constant, ConstantIndex, FunctionCode, FunctionFlags, GlobalDecls, Handler, HandlerKind,
    JumpTarget, LineEntry, MethodKind, Op, PrivateKind, Program, Slot, SourceInfo, completion,
};

use std::sync::Arc;

use tracing::debug;

use crate::ast::{FunctionKind, ScopeId, Script};
use crate::error::JsError;
use crate::lexer::Span;
use crate::parser::{self, ParserOptions};
use crate::sourcemap;
use crate::string::JsString;
use crate::string_dict::StringDict;
use scope::{BindingKind, HIDDEN_FUNC, HIDDEN_NEW_TARGET, HIDDEN_THIS, Resolution, Resolved, ScopeKind};

/// Parse and compile a script
pub fn compile(
    source: &str,
    source_name: &str,
    strict: bool,
    options: &ParserOptions,
) -> Result<Program, JsError> {
    let mut dict = StringDict::with_common_strings();
    let script = parser::parse(source, source_name, strict, &mut dict)?;
    let source_map = script
        .source_mapping_url
        .as_deref()
        .and_then(|url| sourcemap::load(url, source_name, options));
    let info = Arc::new(SourceInfo {
        name: source_name.to_string(),
        source_map,
    });
    let resolution = scope::resolve(&script, source_name)?;
    let code = Compiler::new(&resolution, info).compile_script(&script)?;
    debug!(
        source = source_name,
        instructions = code.code.len(),
        "compiled script"
    );
    Ok(Program {
        code: Arc::new(code),
        strict: script.strict,
    })
}

impl Program {
    /// Compile without a runtime, using default parser options
    pub fn compile(name: &str, source: &str, strict: bool) -> Result<Arc<Program>, JsError> {
        compile(source, name, strict, &ParserOptions::default()).map(Arc::new)
    }
}

/// What a break or continue can target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlKind {
    Loop,
    /// `for await` loop; breaks out of it go through a close pad
    AsyncLoop,
    Switch,
    /// Labeled non-loop statement
    Label,
}

/// Context for a breakable statement
pub(crate) struct Control {
    pub kind: ControlKind,
    pub labels: Vec<JsString>,
    pub break_jumps: Vec<JumpPlaceholder>,
    pub continue_jumps: Vec<JumpPlaceholder>,
    /// Operand stack height and stash depth after the statement
    pub break_held: u32,
    pub break_depth: u32,
    /// Same at the continue target
    pub continue_held: u32,
    pub continue_depth: u32,
    pub continue_target: Option<usize>,
    /// Breaks that leave this `for await` loop: (jump to the close pad,
    /// index of the real target, is continue)
    pub async_exits: Vec<(JumpPlaceholder, usize, bool)>,
}

impl Control {
    fn new(kind: ControlKind, labels: Vec<JsString>, held: u32, depth: u32) -> Self {
        Control {
            kind,
            labels,
            break_jumps: Vec::new(),
            continue_jumps: Vec::new(),
            break_held: held,
            break_depth: depth,
            continue_held: held,
            continue_depth: depth,
            continue_target: None,
            async_exits: Vec::new(),
        }
    }
}

/// Compiler state of one function body
pub(crate) struct FunctionState {
    pub builder: BytecodeBuilder,
    pub scope: ScopeId,
    pub kind: FunctionKind,
    pub strict: bool,
    pub is_generator: bool,
    pub is_async: bool,
    /// Stashes pushed by this function so far
    pub scope_depth: u32,
    /// Operand stack items owned by enclosing statements
    pub held: u32,
    pub controls: Vec<Control>,
    /// Labels waiting for the next loop
    pub pending_labels: Vec<JsString>,
    /// Script completion value
    pub completion: Option<Slot>,
    pub local_count: u32,
    /// Short-circuit jumps of the optional chains being compiled
    pub optional_exits: Vec<Vec<JumpPlaceholder>>,
}

impl FunctionState {
    fn new(scope: ScopeId, kind: FunctionKind, strict: bool, local_count: u32) -> Self {
        FunctionState {
            builder: BytecodeBuilder::new(),
            scope,
            kind,
            strict,
            is_generator: false,
            is_async: false,
            scope_depth: 0,
            held: 0,
            controls: Vec::new(),
            pending_labels: Vec::new(),
            completion: None,
            local_count,
            optional_exits: Vec::new(),
        }
    }
}

/// Compiler state for converting AST to bytecode
pub struct Compiler<'r> {
    res: &'r Resolution,
    source: Arc<SourceInfo>,
    /// Scope chain at the current emission point, across functions
    chain: Vec<ScopeId>,
    func: FunctionState,
}

impl<'r> Compiler<'r> {
    pub fn new(res: &'r Resolution, source: Arc<SourceInfo>) -> Self {
        Compiler {
            res,
            source,
            chain: Vec::new(),
            func: FunctionState::new(ScopeId::default(), FunctionKind::Normal, false, 0),
        }
    }

    /// Compile the top level of a script
    pub fn compile_script(mut self, script: &Script) -> Result<FunctionCode, JsError> {
        let scope = self.res.scope(script.scope);
        let mut state = FunctionState::new(
            script.scope,
            FunctionKind::Normal,
            script.strict,
            scope.local_count,
        );
        let completion = Slot::Local(state.local_count);
        state.local_count += 1;
        state.completion = Some(completion);
        self.func = state;
        self.chain.push(script.scope);
        self.set_span(script.span);

        if scope.has_stash() {
            self.emit(Op::PushScope {
                size: scope.stash_size,
            });
            self.func.scope_depth += 1;
        }
        let decls = self.res.globals.clone();
        let idx = self
            .func
            .builder
            .add_constant(Constant::GlobalDecls(decls))?;
        self.emit(Op::DeclareGlobals { idx });
        self.emit(Op::Undefined);
        self.emit(Op::Store { slot: completion });

        self.hoist_functions(&script.body)?;
        self.compile_statements(&script.body)?;

        self.emit(Op::Load { slot: completion });
        self.emit(Op::Return);
        self.chain.pop();

        let mut flags = FunctionFlags::new(FunctionFlags::SCRIPT);
        if script.strict {
            flags.set(FunctionFlags::STRICT);
        }
        let state = std::mem::replace(
            &mut self.func,
            FunctionState::new(ScopeId::default(), FunctionKind::Normal, false, 0),
        );
        Ok(state.builder.finish(FunctionMeta {
            name: JsString::empty(),
            kind: FunctionKind::Normal,
            flags,
            length: 0,
            local_count: state.local_count,
            source: self.source.clone(),
            span: script.span,
        }))
    }

    // ───────────────────────────────────────────────────────────────────────
    // Emission helpers
    // ───────────────────────────────────────────────────────────────────────

    #[inline]
    pub(crate) fn emit(&mut self, op: Op) -> usize {
        self.func.builder.emit(op)
    }

    #[inline]
    pub(crate) fn set_span(&mut self, span: Span) {
        self.func.builder.set_span(span);
    }

    pub(crate) fn offset(&self) -> usize {
        self.func.builder.current_offset()
    }

    pub(crate) fn jump(&mut self, op: Op) -> JumpPlaceholder {
        self.func.builder.emit_jump(op)
    }

    pub(crate) fn patch(&mut self, placeholder: JumpPlaceholder) {
        self.func.builder.patch_jump(placeholder);
    }

    pub(crate) fn patch_to(&mut self, placeholder: JumpPlaceholder, target: usize) {
        self.func
            .builder
            .patch_jump_to(placeholder, target as JumpTarget);
    }

    pub(crate) fn name_const(&mut self, name: &JsString) -> Result<ConstantIndex, JsError> {
        self.func.builder.add_string(name.clone())
    }

    pub(crate) fn is_strict(&self) -> bool {
        self.func.strict
    }

    /// Fresh frame-local temporary
    pub(crate) fn alloc_temp(&mut self) -> Slot {
        let slot = Slot::Local(self.func.local_count);
        self.func.local_count += 1;
        slot
    }

    // ───────────────────────────────────────────────────────────────────────
    // Scopes
    // ───────────────────────────────────────────────────────────────────────

    /// Slot of `binding` declared in `scope`, seen from the current chain
    pub(crate) fn slot_of(&self, scope: ScopeId, binding: &scope::Binding) -> Slot {
        if !binding.captured {
            return Slot::Local(binding.index);
        }
        let depth = self
            .chain
            .iter()
            .rev()
            .take_while(|&&id| id != scope)
            .filter(|&&id| self.res.scope(id).has_stash())
            .count() as u32;
        Slot::Stash {
            depth,
            index: binding.index,
        }
    }

    /// Slot of a binding declared directly in `scope`
    pub(crate) fn scope_slot(&self, scope: ScopeId, name: &str) -> Option<Slot> {
        let binding = self.res.scope(scope).binding_str(name)?;
        Some(self.slot_of(scope, binding))
    }

    /// Enter a block-like scope: allocate its stash and reset lexical
    /// bindings to the TDZ
    pub(crate) fn enter_scope(&mut self, id: ScopeId) {
        self.chain.push(id);
        let info = self.res.scope(id);
        if info.has_stash() {
            self.emit(Op::PushScope {
                size: info.stash_size,
            });
            self.func.scope_depth += 1;
        }
        for b in &info.bindings {
            if !b.captured && b.kind.is_lexical() {
                self.emit(Op::Clear {
                    slot: Slot::Local(b.index),
                });
            }
        }
    }

    pub(crate) fn exit_scope(&mut self, id: ScopeId) {
        if self.res.scope(id).has_stash() {
            self.emit(Op::PopScope);
            self.func.scope_depth = self.func.scope_depth.saturating_sub(1);
        }
        if self.chain.last() == Some(&id) {
            self.chain.pop();
        }
    }

    /// Fresh copy of a loop head's stash for the next iteration
    pub(crate) fn copy_scope(&mut self, id: ScopeId) {
        if self.res.scope(id).has_stash() {
            self.emit(Op::CopyScope);
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Names
    // ───────────────────────────────────────────────────────────────────────

    fn resolve_name(&self, name: &JsString) -> Resolved<'r> {
        self.res.lookup(&self.chain, name)
    }

    /// Load `%with` objects in turn and try `op` on each, jumping to the
    /// returned placeholders when one has the name
    fn emit_with_chain(
        &mut self,
        withs: &[ScopeId],
        name: &JsString,
        op: impl Fn(ConstantIndex) -> Op,
    ) -> Result<Vec<JumpPlaceholder>, JsError> {
        let mut found = Vec::new();
        if withs.is_empty() {
            return Ok(found);
        }
        let idx = self.name_const(name)?;
        for &with in withs {
            if let Some(slot) = self.scope_slot(with, scope::HIDDEN_WITH) {
                self.emit(Op::Load { slot });
                found.push(self.jump(op(idx)));
            }
        }
        Ok(found)
    }

    fn load_binding(&mut self, scope: ScopeId, binding: &scope::Binding) -> Result<(), JsError> {
        let slot = self.slot_of(scope, binding);
        if binding.kind.is_lexical() {
            let name = self.name_const(&binding.name)?;
            self.emit(Op::LoadChecked { slot, name });
        } else {
            self.emit(Op::Load { slot });
        }
        Ok(())
    }

    /// [] -> [value]
    pub(crate) fn emit_load_name(&mut self, name: &JsString) -> Result<(), JsError> {
        match self.resolve_name(name) {
            Resolved::Binding {
                scope,
                binding,
                withs,
            } => {
                let found = self.emit_with_chain(&withs, name, |name| Op::WithGet { name, target: 0 })?;
                self.load_binding(scope, binding)?;
                for j in found {
                    self.patch(j);
                }
            }
            Resolved::Global { withs } => {
                let found = self.emit_with_chain(&withs, name, |name| Op::WithGet { name, target: 0 })?;
                let idx = self.name_const(name)?;
                self.emit(Op::GetGlobal { name: idx });
                for j in found {
                    self.patch(j);
                }
            }
        }
        Ok(())
    }

    /// [] -> [typeof value]; unresolvable names are "undefined"
    pub(crate) fn emit_typeof_name(&mut self, name: &JsString) -> Result<(), JsError> {
        match self.resolve_name(name) {
            Resolved::Global { withs } => {
                let found = self.emit_with_chain(&withs, name, |name| Op::WithGet { name, target: 0 })?;
                let idx = self.name_const(name)?;
                self.emit(Op::TypeofGlobal { name: idx });
                let done = self.jump(Op::Jump { target: 0 });
                for j in found {
                    self.patch(j);
                }
                if !withs.is_empty() {
                    self.emit(Op::Typeof);
                }
                self.patch(done);
            }
            Resolved::Binding { .. } => {
                self.emit_load_name(name)?;
                self.emit(Op::Typeof);
            }
        }
        Ok(())
    }

    /// [] -> [this, fn] for a call through a plain identifier
    pub(crate) fn emit_load_callee_name(&mut self, name: &JsString) -> Result<(), JsError> {
        let withs = match self.resolve_name(name) {
            Resolved::Binding { withs, .. } | Resolved::Global { withs } => withs,
        };
        let found = self.emit_with_chain(&withs, name, |name| Op::WithGetMethod { name, target: 0 })?;
        self.emit(Op::Undefined);
        match self.resolve_name(name) {
            Resolved::Binding { scope, binding, .. } => self.load_binding(scope, binding)?,
            Resolved::Global { .. } => {
                let idx = self.name_const(name)?;
                self.emit(Op::GetGlobal { name: idx });
            }
        }
        for j in found {
            self.patch(j);
        }
        Ok(())
    }

    /// [value] -> [value]: PutValue on an identifier reference
    pub(crate) fn emit_assign_name(&mut self, name: &JsString) -> Result<(), JsError> {
        let strict = self.is_strict();
        let withs = match self.resolve_name(name) {
            Resolved::Binding { withs, .. } | Resolved::Global { withs } => withs,
        };
        let mut found = Vec::new();
        if !withs.is_empty() {
            let idx = self.name_const(name)?;
            for &with in &withs {
                if let Some(slot) = self.scope_slot(with, scope::HIDDEN_WITH) {
                    self.emit(Op::Load { slot });
                    found.push(self.jump(Op::WithSet {
                        name: idx,
                        target: 0,
                        strict,
                    }));
                }
            }
        }
        match self.resolve_name(name) {
            Resolved::Binding { scope, binding, .. } => {
                let slot = self.slot_of(scope, binding);
                let name_idx = self.name_const(&binding.name)?;
                match binding.kind {
                    BindingKind::Const | BindingKind::ClassName => {
                        if binding.kind == BindingKind::Const {
                            // TDZ takes precedence over the const check
                            self.emit(Op::LoadChecked {
                                slot,
                                name: name_idx,
                            });
                            self.emit(Op::Pop);
                        }
                        self.emit(Op::ThrowConstAssign { name: name_idx });
                    }
                    BindingKind::FunctionName => {
                        if strict {
                            self.emit(Op::ThrowConstAssign { name: name_idx });
                        }
                    }
                    kind => {
                        self.emit(Op::Dup);
                        if kind.is_lexical() {
                            self.emit(Op::StoreChecked {
                                slot,
                                name: name_idx,
                            });
                        } else {
                            self.emit(Op::Store { slot });
                        }
                    }
                }
            }
            Resolved::Global { .. } => {
                let idx = self.name_const(name)?;
                self.emit(Op::SetGlobal { name: idx, strict });
            }
        }
        for j in found {
            self.patch(j);
        }
        Ok(())
    }

    /// [value] -> []: initialize a declared binding in the innermost scope
    /// that declares it
    pub(crate) fn emit_init_name(&mut self, name: &JsString) -> Result<(), JsError> {
        match self.resolve_name(name) {
            Resolved::Binding { scope, binding, .. } => {
                let slot = self.slot_of(scope, binding);
                self.emit(Op::Init { slot });
            }
            Resolved::Global { .. } => {
                let idx = self.name_const(name)?;
                let lexical = self.res.globals.lexical.iter().any(|(n, _)| n == name);
                if lexical {
                    self.emit(Op::InitGlobalLex { name: idx });
                } else {
                    let strict = self.is_strict();
                    self.emit(Op::SetGlobal { name: idx, strict });
                    self.emit(Op::Pop);
                }
            }
        }
        Ok(())
    }

    /// [] -> [bool]
    pub(crate) fn emit_delete_name(&mut self, name: &JsString) -> Result<(), JsError> {
        match self.resolve_name(name) {
            Resolved::Binding { .. } => {
                self.emit(Op::False);
            }
            Resolved::Global { .. } => {
                let idx = self.name_const(name)?;
                self.emit(Op::DeleteGlobal { name: idx });
            }
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // this / new.target / callee
    // ───────────────────────────────────────────────────────────────────────

    /// Emit a load of one of the function-level hidden values: directly in
    /// the function that owns it, through its hidden binding from arrows
    pub(crate) fn emit_function_value(&mut self, hidden: &str) -> Result<(), JsError> {
        let Some(owner) = self.res.this_scope(&self.chain) else {
            // Script level
            let own = self.func.kind != FunctionKind::Arrow;
            match hidden {
                HIDDEN_THIS if own => self.emit(Op::This),
                HIDDEN_THIS => self.emit(Op::GlobalThis),
                _ => self.emit(Op::Undefined),
            };
            return Ok(());
        };
        let derived = matches!(
            self.res.scope(owner).kind,
            ScopeKind::Function {
                kind: FunctionKind::DerivedConstructor,
                ..
            }
        );
        if owner == self.func.scope && !(derived && hidden == HIDDEN_THIS) {
            match hidden {
                HIDDEN_THIS => self.emit(Op::This),
                HIDDEN_NEW_TARGET => self.emit(Op::NewTarget),
                _ => self.emit(Op::Callee),
            };
            return Ok(());
        }
        let info = self.res.scope(owner);
        match info.binding_str(hidden) {
            Some(binding) => {
                let slot = self.slot_of(owner, binding);
                if derived && hidden == HIDDEN_THIS {
                    let name = self.func.builder.add_str(HIDDEN_THIS)?;
                    self.emit(Op::LoadChecked { slot, name });
                } else {
                    self.emit(Op::Load { slot });
                }
            }
            None => {
                self.emit(Op::Undefined);
            }
        }
        Ok(())
    }

    pub(crate) fn emit_this(&mut self) -> Result<(), JsError> {
        self.emit_function_value(HIDDEN_THIS)
    }

    pub(crate) fn emit_new_target(&mut self) -> Result<(), JsError> {
        self.emit_function_value(HIDDEN_NEW_TARGET)
    }

    /// The method whose home object `super` refers to
    pub(crate) fn emit_home_function(&mut self) -> Result<(), JsError> {
        self.emit_function_value(HIDDEN_FUNC)
    }

    /// Slot of the derived constructor `this` binding seen from here
    pub(crate) fn derived_this_slot(&self) -> Option<Slot> {
        let owner = self.res.this_scope(&self.chain)?;
        self.scope_slot(owner, HIDDEN_THIS)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Control flow
    // ───────────────────────────────────────────────────────────────────────

    pub(crate) fn push_control(&mut self, kind: ControlKind) {
        let labels = std::mem::take(&mut self.func.pending_labels);
        let control = Control::new(kind, labels, self.func.held, self.func.scope_depth);
        self.func.controls.push(control);
    }

    /// Set where `continue` lands for the innermost control
    pub(crate) fn set_continue(&mut self, target: usize, held: u32, depth: u32) {
        let jumps = match self.func.controls.last_mut() {
            Some(c) => {
                c.continue_held = held;
                c.continue_depth = depth;
                c.continue_target = Some(target);
                std::mem::take(&mut c.continue_jumps)
            }
            None => Vec::new(),
        };
        for j in jumps {
            self.patch_to(j, target);
        }
    }

    /// Pop the innermost control and patch its breaks to the current offset
    pub(crate) fn pop_control(&mut self) -> Option<Control> {
        let control = self.func.controls.pop()?;
        for j in &control.break_jumps {
            self.func.builder.patch_jump(*j);
        }
        Some(control)
    }

    /// Index of the control targeted by a break or continue
    fn find_control(&self, label: Option<&JsString>, is_continue: bool) -> Result<usize, JsError> {
        let found = self.func.controls.iter().rposition(|c| match label {
            Some(l) => c.labels.contains(l),
            None if is_continue => matches!(c.kind, ControlKind::Loop | ControlKind::AsyncLoop),
            None => c.kind != ControlKind::Label,
        });
        found.ok_or_else(|| match label {
            Some(l) => JsError::syntax_error(format!("Undefined label '{l}'")),
            None if is_continue => JsError::syntax_error("Illegal continue statement"),
            None => JsError::syntax_error("Illegal break statement"),
        })
    }

    pub(crate) fn emit_break(&mut self, label: Option<&JsString>, is_continue: bool) -> Result<(), JsError> {
        let target = self.find_control(label, is_continue)?;
        self.emit_jump_to_control(target, is_continue);
        Ok(())
    }

    /// Jump to control `target`, routing through the close pad of the
    /// innermost `for await` loop being left
    fn emit_jump_to_control(&mut self, target: usize, is_continue: bool) {
        let first_exited = if is_continue { target + 1 } else { target };
        let async_exit = (first_exited..self.func.controls.len())
            .rev()
            .find(|&i| {
                self.func
                    .controls
                    .get(i)
                    .is_some_and(|c| c.kind == ControlKind::AsyncLoop)
            });
        if let Some(i) = async_exit {
            let Some(c) = self.func.controls.get(i) else {
                return;
            };
            let (stack, scopes) = (c.break_held + 3, c.break_depth);
            let j = self.jump(Op::Break {
                target: 0,
                stack,
                scopes,
            });
            if let Some(c) = self.func.controls.get_mut(i) {
                c.async_exits.push((j, target, is_continue));
            }
            return;
        }
        let Some(c) = self.func.controls.get(target) else {
            return;
        };
        let (stack, scopes) = if is_continue {
            (c.continue_held, c.continue_depth)
        } else {
            (c.break_held, c.break_depth)
        };
        let j = self.jump(Op::Break {
            target: 0,
            stack,
            scopes,
        });
        let known = match self.func.controls.get_mut(target) {
            Some(c) if is_continue => {
                if c.continue_target.is_none() {
                    c.continue_jumps.push(j);
                }
                c.continue_target
            }
            Some(c) => {
                c.break_jumps.push(j);
                None
            }
            None => None,
        };
        if let Some(t) = known {
            self.patch_to(j, t);
        }
    }

    /// Emit the close pads of a finished `for await` loop. The loop's
    /// control has been popped; the pads run with its iterator record on
    /// the stack.
    pub(crate) fn emit_async_exit_pads(&mut self, control: Control) {
        for (j, target, is_continue) in control.async_exits {
            self.patch(j);
            self.emit(Op::AsyncIterClose);
            self.emit(Op::Await);
            self.emit(Op::Pop);
            self.emit(Op::Pop);
            self.emit(Op::Pop);
            self.emit(Op::Pop);
            self.emit_jump_to_control(target, is_continue);
        }
    }

    pub(crate) fn take_labels(&mut self) -> Vec<JsString> {
        std::mem::take(&mut self.func.pending_labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_ok(source: &str) -> Program {
        match compile(source, "test.js", false, &ParserOptions::default()) {
            Ok(p) => p,
            Err(e) => panic!("compile failed for {source:?}: {e}"),
        }
    }

    #[test]
    fn script_declares_globals_first() {
        let program = compile_ok("var x = 1;");
        assert!(matches!(
            program.code().code.get(0),
            Some(Op::DeclareGlobals { .. })
        ));
    }

    #[test]
    fn nested_functions_are_counted() {
        let program = compile_ok("function a() { return function b() { return () => 1; }; }");
        assert_eq!(program.function_count(), 4);
    }

    #[test]
    fn captured_variables_use_stashes() {
        let program = compile_ok("function f() { let x = 1; return () => x; }");
        let f = program.code().nested().next().cloned();
        let Some(f) = f else {
            panic!("missing nested function");
        };
        assert!(f.code.iter().any(|op| matches!(op, Op::PushScope { size: 1 })));
    }

    #[test]
    fn try_finally_registers_handlers() {
        let program = compile_ok("try { a(); } catch (e) { b(); } finally { c(); }");
        let kinds: Vec<HandlerKind> = program.code().handlers.iter().map(|h| h.kind).collect();
        assert_eq!(kinds, vec![HandlerKind::Catch, HandlerKind::Finally]);
    }

    #[test]
    fn for_of_registers_iterator_close() {
        let program = compile_ok("for (const x of xs) { if (x) break; }");
        assert!(
            program
                .code()
                .handlers
                .iter()
                .any(|h| h.kind == HandlerKind::IterClose)
        );
    }

    #[test]
    fn redeclaration_is_a_syntax_error() {
        assert!(matches!(
            compile("let a; let a;", "t.js", false, &ParserOptions::default()),
            Err(JsError::Parse(_))
        ));
    }

    #[test]
    fn source_map_is_attached() {
        let source = "x;\n//# sourceMappingURL=data:application/json;base64,eyJ2ZXJzaW9uIjozLCJzb3VyY2VzIjpbImEudHMiXSwibWFwcGluZ3MiOiJBQUFBIn0=";
        let program = compile_ok(source);
        assert!(program.code().source.source_map.is_some());
    }
}
