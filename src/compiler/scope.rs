//! Scope analysis
//!
//! First compiler pass. Walks a script once, records every declaration in
//! the scope that owns it, resolves every identifier reference against the
//! scope chain and marks bindings referenced across a function boundary as
//! captured. Captured bindings live in heap stashes; everything else gets a
//! frame-local slot.
//!
//! Top-level `var`/function declarations become global object properties and
//! top-level lexical declarations go to the runtime's global lexical record,
//! so neither has a binding here; references that fall off the chain are
//! global lookups.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::*;
use crate::compiler::bytecode::GlobalDecls;
use crate::error::{JsError, ParseError, ParseErrors};
use crate::lexer::Span;
use crate::string::JsString;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Class,
    /// Function declaration: var-like at function level, let-like in blocks
    Function,
    Param,
    CatchParam,
    /// Name of a named function expression inside its own body
    FunctionName,
    /// Inner name of a class inside its body
    ClassName,
    /// Implicit `arguments`
    Arguments,
    /// Engine-internal: `this`, `new.target`, private names, class keys
    Hidden,
}

impl BindingKind {
    /// Declarations with a temporal dead zone
    pub fn is_lexical(self) -> bool {
        matches!(
            self,
            BindingKind::Let | BindingKind::Const | BindingKind::Class | BindingKind::ClassName
        )
    }

    /// Bindings that reject assignment
    pub fn is_immutable(self) -> bool {
        matches!(
            self,
            BindingKind::Const | BindingKind::ClassName | BindingKind::FunctionName
        )
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: JsString,
    pub kind: BindingKind,
    pub captured: bool,
    /// Local slot or stash index, assigned after the walk
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Script,
    Function {
        kind: FunctionKind,
        /// Synthetic field initializer
        initializer: bool,
    },
    Block,
    Class,
    With,
}

impl ScopeKind {
    pub fn is_function(self) -> bool {
        matches!(self, ScopeKind::Function { .. } | ScopeKind::Script)
    }
}

#[derive(Debug, Clone)]
pub struct ScopeInfo {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Nearest enclosing function or script scope (itself for those)
    pub function: ScopeId,
    pub bindings: Vec<Binding>,
    /// Number of captured bindings; the scope allocates a stash when non-zero
    pub stash_size: u32,
    /// For function scopes: number of local slots used by the function
    pub local_count: u32,
}

impl ScopeInfo {
    fn new() -> Self {
        ScopeInfo {
            kind: ScopeKind::Block,
            parent: None,
            function: ScopeId(0),
            bindings: Vec::new(),
            stash_size: 0,
            local_count: 0,
        }
    }

    pub fn binding(&self, name: &JsString) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == *name)
    }

    pub fn binding_str(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == *name)
    }

    fn binding_mut(&mut self, name: &JsString) -> Option<&mut Binding> {
        self.bindings.iter_mut().find(|b| b.name == *name)
    }

    pub fn has_stash(&self) -> bool {
        self.stash_size > 0
    }
}

/// Result of resolving a name against a scope chain
#[derive(Debug, Clone)]
pub enum Resolved<'a> {
    Binding {
        scope: ScopeId,
        binding: &'a Binding,
        /// `with` scopes passed on the way, innermost first
        withs: Vec<ScopeId>,
    },
    Global {
        withs: Vec<ScopeId>,
    },
}

/// Output of the scope pass
#[derive(Debug)]
pub struct Resolution {
    scopes: Vec<ScopeInfo>,
    /// `with` statements keyed by span start
    with_scopes: FxHashMap<usize, ScopeId>,
    /// Sloppy block function declarations that also assign a var binding,
    /// keyed by span start
    annex_b: FxHashSet<usize>,
    pub globals: GlobalDecls,
}

pub const HIDDEN_THIS: &str = "this";
pub const HIDDEN_NEW_TARGET: &str = "new.target";
pub const HIDDEN_FUNC: &str = "%func";
pub const HIDDEN_WITH: &str = "%with";

pub fn private_binding(name: &JsString) -> JsString {
    JsString::from(format!("#{name}"))
}

pub fn computed_key_binding(index: usize) -> JsString {
    JsString::from(format!("%key{index}"))
}

pub fn private_method_binding(index: usize) -> JsString {
    JsString::from(format!("%private{index}"))
}

impl Resolution {
    pub fn scope(&self, id: ScopeId) -> &ScopeInfo {
        static EMPTY: std::sync::OnceLock<ScopeInfo> = std::sync::OnceLock::new();
        self.scopes
            .get(id.0 as usize)
            .unwrap_or_else(|| EMPTY.get_or_init(ScopeInfo::new))
    }

    pub fn with_scope(&self, span: Span) -> Option<ScopeId> {
        self.with_scopes.get(&span.start).copied()
    }

    pub fn is_annex_b(&self, span: Span) -> bool {
        self.annex_b.contains(&span.start)
    }

    /// Resolve `name` from the innermost scope of `chain`
    pub fn lookup(&self, chain: &[ScopeId], name: &JsString) -> Resolved<'_> {
        let mut withs = Vec::new();
        for &id in chain.iter().rev() {
            let info = self.scope(id);
            if info.kind == ScopeKind::With {
                withs.push(id);
                continue;
            }
            if let Some(binding) = info.binding(name) {
                return Resolved::Binding {
                    scope: id,
                    binding,
                    withs,
                };
            }
        }
        Resolved::Global { withs }
    }

    /// Function scope that provides `this` for code at the end of `chain`:
    /// the nearest non-arrow function, or `None` at script level
    pub fn this_scope(&self, chain: &[ScopeId]) -> Option<ScopeId> {
        for &id in chain.iter().rev() {
            let info = self.scope(id);
            match info.kind {
                ScopeKind::Script => return None,
                ScopeKind::Function { kind, .. } if kind != FunctionKind::Arrow => return Some(id),
                _ => {}
            }
        }
        None
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resolver
// ═══════════════════════════════════════════════════════════════════════════════

struct Resolver<'a> {
    scopes: Vec<ScopeInfo>,
    chain: Vec<ScopeId>,
    source_name: &'a str,
    errors: Vec<ParseError>,
    with_scopes: FxHashMap<usize, ScopeId>,
    annex_b: FxHashSet<usize>,
    globals: GlobalDecls,
    strict: bool,
}

/// Run the scope pass over a parsed script
pub fn resolve(script: &Script, source_name: &str) -> Result<Resolution, JsError> {
    let mut r = Resolver {
        scopes: vec![ScopeInfo::new(); script.scope_count as usize],
        chain: Vec::new(),
        source_name,
        errors: Vec::new(),
        with_scopes: FxHashMap::default(),
        annex_b: FxHashSet::default(),
        globals: GlobalDecls::default(),
        strict: script.strict,
    };
    r.enter(script.scope, ScopeKind::Script);
    r.declare_script(&script.body);
    r.walk_statements(&script.body);
    r.exit();
    if !r.errors.is_empty() {
        return Err(JsError::Parse(ParseErrors(r.errors)));
    }
    r.assign_slots();
    Ok(Resolution {
        scopes: r.scopes,
        with_scopes: r.with_scopes,
        annex_b: r.annex_b,
        globals: r.globals,
    })
}

impl<'a> Resolver<'a> {
    fn error(&mut self, span: Span, message: String) {
        self.errors.push(ParseError {
            source_name: self.source_name.to_string(),
            line: span.line,
            column: span.column,
            message,
        });
    }

    fn redeclared(&mut self, name: &JsString, span: Span) {
        self.error(span, format!("Identifier '{name}' has already been declared"));
    }

    fn info(&mut self, id: ScopeId) -> Option<&mut ScopeInfo> {
        self.scopes.get_mut(id.0 as usize)
    }

    fn current(&self) -> ScopeId {
        self.chain.last().copied().unwrap_or_default()
    }

    fn current_function(&self) -> ScopeId {
        self.scopes
            .get(self.current().0 as usize)
            .map(|s| s.function)
            .unwrap_or_default()
    }

    fn is_script_level(&self) -> bool {
        self.scopes
            .get(self.current_function().0 as usize)
            .is_some_and(|s| s.kind == ScopeKind::Script)
    }

    fn enter(&mut self, id: ScopeId, kind: ScopeKind) {
        let parent = self.chain.last().copied();
        let function = if kind.is_function() {
            id
        } else {
            self.current_function()
        };
        if id.0 as usize >= self.scopes.len() {
            self.scopes.resize(id.0 as usize + 1, ScopeInfo::new());
        }
        if let Some(info) = self.info(id) {
            info.kind = kind;
            info.parent = parent;
            info.function = function;
        }
        self.chain.push(id);
    }

    fn exit(&mut self) {
        self.chain.pop();
    }

    /// Fresh scope id for constructs the parser does not number
    fn synthetic_scope(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeInfo::new());
        id
    }

    fn add_binding(&mut self, scope: ScopeId, name: JsString, kind: BindingKind) {
        if let Some(info) = self.info(scope) {
            info.bindings.push(Binding {
                name,
                kind,
                captured: false,
                index: 0,
            });
        }
    }

    fn scope_binding(&self, scope: ScopeId, name: &JsString) -> Option<BindingKind> {
        self.scopes
            .get(scope.0 as usize)
            .and_then(|s| s.binding(name))
            .map(|b| b.kind)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Declarations
    // ───────────────────────────────────────────────────────────────────────

    /// Declare a lexical binding in `scope`
    fn declare_lexical(&mut self, scope: ScopeId, id: &Identifier, kind: BindingKind) {
        if let Some(existing) = self.scope_binding(scope, &id.name) {
            let sloppy_functions = !self.strict
                && existing == BindingKind::Function
                && kind == BindingKind::Function;
            if !sloppy_functions {
                self.redeclared(&id.name, id.span);
            }
            return;
        }
        self.add_binding(scope, id.name.clone(), kind);
    }

    /// Declare a var-scoped name at the current position: checks lexical
    /// conflicts from the current scope up to the function scope
    fn check_var_conflicts(&mut self, id: &Identifier) {
        let function = self.current_function();
        let chain: Vec<ScopeId> = self.chain.clone();
        for &scope in chain.iter().rev() {
            if let Some(kind) = self.scope_binding(scope, &id.name) {
                let conflict = kind.is_lexical() || (kind == BindingKind::Function && scope != function);
                if conflict {
                    self.redeclared(&id.name, id.span);
                    return;
                }
            }
            if scope == function {
                break;
            }
        }
        if self.is_script_level()
            && self
                .globals
                .lexical
                .iter()
                .any(|(n, _)| *n == id.name)
        {
            self.redeclared(&id.name, id.span);
        }
    }

    fn declare_var_name(&mut self, name: &JsString) {
        let function = self.current_function();
        if self.is_script_level() {
            if !self.globals.vars.contains(name) {
                self.globals.vars.push(name.clone());
            }
            return;
        }
        if self.scope_binding(function, name).is_none() {
            self.add_binding(function, name.clone(), BindingKind::Var);
        }
    }

    /// Declarations of a script's top level
    fn declare_script(&mut self, body: &[Statement]) {
        let mut vars = Vec::new();
        for stmt in body {
            collect_vars(stmt, &mut vars);
        }
        for id in &vars {
            if !self.globals.vars.contains(&id.name) {
                self.globals.vars.push(id.name.clone());
            }
        }
        for stmt in body {
            match unlabel(stmt) {
                Statement::FunctionDeclaration(f) => {
                    if let Some(id) = &f.id {
                        if self.globals.lexical.iter().any(|(n, _)| *n == id.name) {
                            self.redeclared(&id.name, id.span);
                        } else if !self.globals.functions.contains(&id.name) {
                            self.globals.functions.push(id.name.clone());
                        }
                    }
                }
                Statement::Variable(decl) if decl.kind != VariableKind::Var => {
                    let mut names = Vec::new();
                    for d in &decl.declarations {
                        d.id.bound_names(&mut names);
                    }
                    for id in names {
                        self.declare_global_lexical(id, decl.kind == VariableKind::Const);
                    }
                }
                Statement::ClassDeclaration(c) => {
                    if let Some(id) = &c.id {
                        self.declare_global_lexical(id, false);
                    }
                }
                _ => {}
            }
        }
    }

    fn declare_global_lexical(&mut self, id: &Identifier, is_const: bool) {
        let taken = self.globals.lexical.iter().any(|(n, _)| *n == id.name)
            || self.globals.vars.contains(&id.name)
            || self.globals.functions.contains(&id.name);
        if taken {
            self.redeclared(&id.name, id.span);
            return;
        }
        self.globals.lexical.push((id.name.clone(), is_const));
    }

    /// Lexically scoped declarations directly inside a block-like list
    fn declare_block(&mut self, scope: ScopeId, body: &[Statement]) {
        for stmt in body {
            self.declare_block_item(scope, stmt);
        }
    }

    fn declare_block_item(&mut self, scope: ScopeId, stmt: &Statement) {
        match unlabel(stmt) {
            Statement::Variable(decl) if decl.kind != VariableKind::Var => {
                let kind = if decl.kind == VariableKind::Const {
                    BindingKind::Const
                } else {
                    BindingKind::Let
                };
                let mut names = Vec::new();
                for d in &decl.declarations {
                    d.id.bound_names(&mut names);
                }
                for id in names {
                    self.declare_lexical(scope, id, kind);
                }
            }
            Statement::ClassDeclaration(c) => {
                if let Some(id) = &c.id {
                    self.declare_lexical(scope, id, BindingKind::Class);
                }
            }
            Statement::FunctionDeclaration(f) => {
                if let Some(id) = &f.id {
                    self.declare_lexical(scope, id, BindingKind::Function);
                }
            }
            _ => {}
        }
    }

    /// Sloppy-mode block functions also assign a var binding of the same
    /// name when that cannot clash with a lexical declaration
    fn annex_b_functions(&mut self, body: &[Statement]) {
        if self.strict {
            return;
        }
        for stmt in body {
            let Statement::FunctionDeclaration(f) = unlabel(stmt) else {
                continue;
            };
            if f.is_async || f.is_generator {
                continue;
            }
            let Some(id) = &f.id else {
                continue;
            };
            let function = self.current_function();
            let chain: Vec<ScopeId> = self.chain.clone();
            let mut blocked = false;
            // Skip the block that declares the function itself
            for &scope in chain.iter().rev().skip(1) {
                if let Some(kind) = self.scope_binding(scope, &id.name) {
                    blocked |= kind.is_lexical()
                        || kind == BindingKind::Param
                        || (kind == BindingKind::Function && scope != function);
                }
                if scope == function {
                    break;
                }
            }
            if self.is_script_level()
                && self.globals.lexical.iter().any(|(n, _)| *n == id.name)
            {
                blocked = true;
            }
            if !blocked {
                self.declare_var_name(&id.name);
                self.annex_b.insert(f.span.start);
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // References
    // ───────────────────────────────────────────────────────────────────────

    fn reference(&mut self, name: &JsString) {
        let mut crossed = false;
        let chain: Vec<ScopeId> = self.chain.clone();
        for &id in chain.iter().rev() {
            let Some(info) = self.scopes.get_mut(id.0 as usize) else {
                continue;
            };
            if info.kind == ScopeKind::With {
                if let Some(b) = info.binding_mut(&JsString::from(HIDDEN_WITH)) {
                    b.captured |= crossed;
                }
                continue;
            }
            if let Some(b) = info.binding_mut(name) {
                b.captured |= crossed;
                return;
            }
            match info.kind {
                ScopeKind::Script => return,
                ScopeKind::Function { kind, initializer } => {
                    let implicit_arguments = *name == "arguments"
                        && kind != FunctionKind::Arrow
                        && kind != FunctionKind::ClassStaticBlock
                        && !initializer;
                    if implicit_arguments {
                        info.bindings.push(Binding {
                            name: name.clone(),
                            kind: BindingKind::Arguments,
                            captured: crossed,
                            index: 0,
                        });
                        return;
                    }
                    crossed = true;
                }
                _ => {}
            }
        }
    }

    /// `this`, `new.target` or the running function seen from inside
    /// arrows: a hidden binding of the nearest non-arrow function
    fn hidden_reference(&mut self, name: &str) {
        let mut crossed = false;
        let chain: Vec<ScopeId> = self.chain.clone();
        for &id in chain.iter().rev() {
            let Some(info) = self.scopes.get_mut(id.0 as usize) else {
                continue;
            };
            match info.kind {
                ScopeKind::Script => return,
                ScopeKind::Function { kind, .. } if kind == FunctionKind::Arrow => crossed = true,
                ScopeKind::Function { kind, .. } => {
                    let derived_this = name == HIDDEN_THIS && kind == FunctionKind::DerivedConstructor;
                    if !crossed && !derived_this {
                        return;
                    }
                    match info.binding_mut(&JsString::from(name)) {
                        Some(b) => b.captured |= crossed,
                        None => info.bindings.push(Binding {
                            name: JsString::from(name),
                            kind: BindingKind::Hidden,
                            captured: crossed,
                            index: 0,
                        }),
                    }
                    return;
                }
                _ => {}
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Statements
    // ───────────────────────────────────────────────────────────────────────

    fn walk_statements(&mut self, body: &[Statement]) {
        for stmt in body {
            self.walk_statement(stmt);
        }
    }

    fn walk_block(&mut self, block: &BlockStatement) {
        self.enter(block.scope, ScopeKind::Block);
        self.declare_block(block.scope, &block.body);
        self.annex_b_functions(&block.body);
        self.walk_statements(&block.body);
        self.exit();
    }

    fn walk_var_declaration(&mut self, decl: &VariableDeclaration) {
        for d in &decl.declarations {
            if decl.kind == VariableKind::Var {
                let mut names = Vec::new();
                d.id.bound_names(&mut names);
                for id in names {
                    self.check_var_conflicts(id);
                }
            }
            self.walk_pattern(&d.id);
            if let Some(init) = &d.init {
                self.walk_expression(init);
            }
        }
    }

    fn walk_statement(&mut self, stmt: &Statement) {
        crate::stack::guard(|| self.walk_statement_inner(stmt));
    }

    fn walk_statement_inner(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Variable(decl) => self.walk_var_declaration(decl),
            Statement::FunctionDeclaration(f) => self.walk_function(f, false),
            Statement::ClassDeclaration(c) => self.walk_class(c),
            Statement::Block(b) => self.walk_block(b),
            Statement::If(s) => {
                self.walk_expression(&s.test);
                self.walk_statement(&s.consequent);
                if let Some(alt) = &s.alternate {
                    self.walk_statement(alt);
                }
            }
            Statement::Switch(s) => {
                self.walk_expression(&s.discriminant);
                self.enter(s.scope, ScopeKind::Block);
                for case in &s.cases {
                    for stmt in &case.consequent {
                        self.declare_block_item(s.scope, stmt);
                    }
                }
                for case in &s.cases {
                    self.annex_b_functions(&case.consequent);
                }
                for case in &s.cases {
                    if let Some(test) = &case.test {
                        self.walk_expression(test);
                    }
                    self.walk_statements(&case.consequent);
                }
                self.exit();
            }
            Statement::For(s) => {
                self.enter(s.scope, ScopeKind::Block);
                match &s.init {
                    Some(ForInit::Variable(decl)) => {
                        if decl.kind != VariableKind::Var {
                            let stmt = Statement::Variable(decl.clone());
                            self.declare_block_item(s.scope, &stmt);
                        }
                        self.walk_var_declaration(decl);
                    }
                    Some(ForInit::Expression(e)) => self.walk_expression(e),
                    None => {}
                }
                if let Some(test) = &s.test {
                    self.walk_expression(test);
                }
                if let Some(update) = &s.update {
                    self.walk_expression(update);
                }
                self.walk_statement(&s.body);
                self.exit();
            }
            Statement::ForIn(s) => self.walk_for_in_of(&s.left, &s.right, &s.body, s.scope),
            Statement::ForOf(s) => self.walk_for_in_of(&s.left, &s.right, &s.body, s.scope),
            Statement::While(s) => {
                self.walk_expression(&s.test);
                self.walk_statement(&s.body);
            }
            Statement::DoWhile(s) => {
                self.walk_statement(&s.body);
                self.walk_expression(&s.test);
            }
            Statement::Try(s) => {
                self.walk_block(&s.block);
                if let Some(handler) = &s.handler {
                    self.enter(handler.scope, ScopeKind::Block);
                    if let Some(param) = &handler.param {
                        let mut names = Vec::new();
                        param.bound_names(&mut names);
                        for id in names {
                            self.declare_lexical(handler.scope, id, BindingKind::CatchParam);
                        }
                        // Catch parameters may not be redeclared lexically in the body
                        for stmt in &handler.body.body {
                            let mut lexical = Vec::new();
                            lexical_names(stmt, &mut lexical);
                            for id in lexical {
                                if self.scope_binding(handler.scope, &id.name).is_some() {
                                    self.redeclared(&id.name, id.span);
                                }
                            }
                        }
                        self.walk_pattern(param);
                    }
                    self.walk_block(&handler.body);
                    self.exit();
                }
                if let Some(finalizer) = &s.finalizer {
                    self.walk_block(finalizer);
                }
            }
            Statement::With(s) => {
                self.walk_expression(&s.object);
                let scope = self.synthetic_scope();
                self.with_scopes.insert(s.span.start, scope);
                self.enter(scope, ScopeKind::With);
                self.add_binding(scope, JsString::from(HIDDEN_WITH), BindingKind::Hidden);
                self.walk_statement(&s.body);
                self.exit();
            }
            Statement::Return(s) => {
                if let Some(arg) = &s.argument {
                    self.walk_expression(arg);
                }
                if self.in_derived_constructor() {
                    self.hidden_reference(HIDDEN_THIS);
                }
            }
            Statement::Throw(s) => self.walk_expression(&s.argument),
            Statement::Expression(s) => self.walk_expression(&s.expression),
            Statement::Labeled(s) => self.walk_statement(&s.body),
            Statement::Break(_) | Statement::Continue(_) | Statement::Empty(_) | Statement::Debugger(_) => {}
        }
    }

    fn in_derived_constructor(&self) -> bool {
        for id in self.chain.iter().rev() {
            match self.scopes.get(id.0 as usize).map(|s| s.kind) {
                Some(ScopeKind::Function { kind: FunctionKind::Arrow, .. }) => {}
                Some(ScopeKind::Function { kind, .. }) => return kind == FunctionKind::DerivedConstructor,
                Some(ScopeKind::Script) => return false,
                _ => {}
            }
        }
        false
    }

    fn walk_for_in_of(&mut self, left: &ForInOfLeft, right: &Expression, body: &Statement, scope: ScopeId) {
        self.walk_expression(right);
        self.enter(scope, ScopeKind::Block);
        match left {
            ForInOfLeft::Variable(kind, pattern) => {
                let mut names = Vec::new();
                pattern.bound_names(&mut names);
                match kind {
                    VariableKind::Var => {
                        for id in names {
                            self.check_var_conflicts(id);
                        }
                    }
                    VariableKind::Let | VariableKind::Const => {
                        let binding_kind = if *kind == VariableKind::Const {
                            BindingKind::Const
                        } else {
                            BindingKind::Let
                        };
                        for id in names {
                            self.declare_lexical(scope, id, binding_kind);
                        }
                    }
                }
                self.walk_pattern(pattern);
            }
            ForInOfLeft::Pattern(pattern) => self.walk_pattern(pattern),
        }
        self.walk_statement(body);
        self.exit();
    }

    // ───────────────────────────────────────────────────────────────────────
    // Functions & classes
    // ───────────────────────────────────────────────────────────────────────

    fn walk_function(&mut self, f: &Function, is_expression: bool) {
        self.walk_function_in(f, is_expression, false);
    }

    fn walk_function_in(&mut self, f: &Function, is_expression: bool, initializer: bool) {
        let outer_strict = self.strict;
        self.strict = f.strict;
        let scope = f.scope;
        self.enter(
            scope,
            ScopeKind::Function {
                kind: f.kind,
                initializer,
            },
        );
        if f.kind == FunctionKind::DerivedConstructor {
            self.add_binding(scope, JsString::from(HIDDEN_THIS), BindingKind::Hidden);
        }

        // Parameters
        let mut params = Vec::new();
        for p in &f.params {
            p.bound_names(&mut params);
        }
        if let Some(rest) = &f.rest {
            rest.bound_names(&mut params);
        }
        for id in params {
            if self.scope_binding(scope, &id.name).is_none() {
                self.add_binding(scope, id.name.clone(), BindingKind::Param);
            }
        }

        // Hoisted declarations
        if let FunctionBody::Block(body) = &f.body {
            let mut vars = Vec::new();
            for stmt in body {
                collect_vars(stmt, &mut vars);
            }
            for id in vars {
                if self.scope_binding(scope, &id.name).is_none() {
                    self.add_binding(scope, id.name.clone(), BindingKind::Var);
                }
            }
            for stmt in body {
                match unlabel(stmt) {
                    Statement::FunctionDeclaration(decl) => {
                        if let Some(id) = &decl.id {
                            match self.scope_binding(scope, &id.name) {
                                Some(k) if k.is_lexical() => self.redeclared(&id.name, id.span),
                                Some(_) => {
                                    if let Some(b) = self.info(scope).and_then(|s| s.binding_mut(&id.name)) {
                                        if b.kind == BindingKind::Var {
                                            b.kind = BindingKind::Function;
                                        }
                                    }
                                }
                                None => self.add_binding(scope, id.name.clone(), BindingKind::Function),
                            }
                        }
                    }
                    Statement::Variable(decl) if decl.kind != VariableKind::Var => {
                        let mut names = Vec::new();
                        for d in &decl.declarations {
                            d.id.bound_names(&mut names);
                        }
                        let kind = if decl.kind == VariableKind::Const {
                            BindingKind::Const
                        } else {
                            BindingKind::Let
                        };
                        for id in names {
                            self.declare_lexical(scope, id, kind);
                        }
                    }
                    Statement::ClassDeclaration(c) => {
                        if let Some(id) = &c.id {
                            self.declare_lexical(scope, id, BindingKind::Class);
                        }
                    }
                    _ => {}
                }
            }
        }

        if is_expression {
            if let Some(id) = &f.id {
                if self.scope_binding(scope, &id.name).is_none() {
                    self.add_binding(scope, id.name.clone(), BindingKind::FunctionName);
                }
            }
        }

        for p in &f.params {
            self.walk_pattern(p);
        }
        if let Some(rest) = &f.rest {
            self.walk_pattern(rest);
        }
        match &f.body {
            FunctionBody::Block(body) => self.walk_statements(body),
            FunctionBody::Expression(e) => self.walk_expression(e),
        }
        self.exit();
        self.strict = outer_strict;
    }

    fn walk_class(&mut self, c: &Class) {
        let outer_strict = self.strict;
        self.strict = true;
        self.enter(c.scope, ScopeKind::Class);
        if let Some(id) = &c.id {
            self.add_binding(c.scope, id.name.clone(), BindingKind::ClassName);
        }
        for (i, member) in c.members.iter().enumerate() {
            match member {
                ClassMember::Method(m) => {
                    if let PropertyName::Private(name) = &m.key {
                        let binding = private_binding(name);
                        if self.scope_binding(c.scope, &binding).is_none() {
                            self.add_binding(c.scope, binding, BindingKind::Hidden);
                        }
                        self.add_binding(c.scope, private_method_binding(i), BindingKind::Hidden);
                    }
                }
                ClassMember::Field(field) => match &field.key {
                    PropertyName::Private(name) => {
                        let binding = private_binding(name);
                        if self.scope_binding(c.scope, &binding).is_none() {
                            self.add_binding(c.scope, binding, BindingKind::Hidden);
                        }
                    }
                    PropertyName::Computed(_) => {
                        self.add_binding(c.scope, computed_key_binding(i), BindingKind::Hidden);
                    }
                    _ => {}
                },
                ClassMember::StaticBlock(_) => {}
            }
        }
        // The instance initializer reads private names and keys through the
        // class scope; mark them captured so they live in its stash
        let hidden: Vec<JsString> = self
            .scopes
            .get(c.scope.0 as usize)
            .map(|s| {
                s.bindings
                    .iter()
                    .filter(|b| b.kind == BindingKind::Hidden)
                    .map(|b| b.name.clone())
                    .collect()
            })
            .unwrap_or_default();
        if let Some(info) = self.info(c.scope) {
            for b in &mut info.bindings {
                if hidden.contains(&b.name) {
                    b.captured = true;
                }
            }
        }

        if let Some(heritage) = &c.super_class {
            self.walk_expression(heritage);
        }
        if let Some(ctor) = &c.constructor {
            self.walk_function(ctor, false);
        }
        for member in &c.members {
            match member {
                ClassMember::Method(m) => {
                    self.walk_property_name(&m.key);
                    self.walk_function(&m.function, false);
                }
                ClassMember::Field(field) => {
                    self.walk_property_name(&field.key);
                    if let Some(value) = &field.value {
                        let scope = if field.is_static {
                            c.static_init_scope
                        } else {
                            c.instance_init_scope
                        };
                        self.enter(
                            scope,
                            ScopeKind::Function {
                                kind: FunctionKind::Method,
                                initializer: true,
                            },
                        );
                        self.walk_expression(value);
                        self.exit();
                    }
                }
                ClassMember::StaticBlock(block) => {
                    self.enter(
                        c.static_init_scope,
                        ScopeKind::Function {
                            kind: FunctionKind::Method,
                            initializer: true,
                        },
                    );
                    self.walk_function(block, false);
                    self.exit();
                }
            }
        }
        // Initializer scopes exist even when no field has a value
        for scope in [c.instance_init_scope, c.static_init_scope] {
            let parent = Some(c.scope);
            let function = scope;
            if let Some(info) = self.info(scope) {
                info.kind = ScopeKind::Function {
                    kind: FunctionKind::Method,
                    initializer: true,
                };
                info.parent = parent;
                info.function = function;
            }
        }
        self.exit();
        self.strict = outer_strict;
    }

    fn walk_property_name(&mut self, key: &PropertyName) {
        if let PropertyName::Computed(e) = key {
            self.walk_expression(e);
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Expressions & patterns
    // ───────────────────────────────────────────────────────────────────────

    fn walk_pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Identifier(id) => self.reference(&id.name),
            Pattern::Object(o) => {
                for prop in &o.properties {
                    self.walk_property_name(&prop.key);
                    self.walk_pattern(&prop.value);
                }
                if let Some(rest) = &o.rest {
                    self.walk_pattern(rest);
                }
            }
            Pattern::Array(a) => {
                for el in a.elements.iter().flatten() {
                    self.walk_pattern(el);
                }
                if let Some(rest) = &a.rest {
                    self.walk_pattern(rest);
                }
            }
            Pattern::Assignment(a) => {
                self.walk_pattern(&a.left);
                self.walk_expression(&a.right);
            }
            Pattern::Expression(e) => self.walk_expression(e),
        }
    }

    fn walk_arguments(&mut self, args: &[Argument]) {
        for arg in args {
            match arg {
                Argument::Expression(e) => self.walk_expression(e),
                Argument::Spread(s) => self.walk_expression(&s.argument),
            }
        }
    }

    fn walk_member_property(&mut self, property: &MemberProperty) {
        match property {
            MemberProperty::Expression(e) => self.walk_expression(e),
            MemberProperty::Private(name) => self.reference(&private_binding(name)),
            MemberProperty::Identifier(_) => {}
        }
    }

    fn walk_expression(&mut self, expr: &Expression) {
        crate::stack::guard(|| self.walk_expression_inner(expr));
    }

    fn walk_expression_inner(&mut self, expr: &Expression) {
        match expr {
            Expression::Literal(_) => {}
            Expression::Array(a) => {
                for el in a.elements.iter().flatten() {
                    match el {
                        ArrayElement::Expression(e) => self.walk_expression(e),
                        ArrayElement::Spread(s) => self.walk_expression(&s.argument),
                    }
                }
            }
            Expression::Object(o) => {
                for prop in &o.properties {
                    match prop {
                        ObjectProperty::Property(p) => {
                            self.walk_property_name(&p.key);
                            match &p.value {
                                Expression::Function(f) if p.kind != PropertyKind::Init => {
                                    self.walk_function(f, false)
                                }
                                value => self.walk_expression(value),
                            }
                        }
                        ObjectProperty::Spread(s) => self.walk_expression(&s.argument),
                    }
                }
            }
            Expression::Function(f) => self.walk_function(f, true),
            Expression::ArrowFunction(f) => self.walk_function(f, false),
            Expression::Class(c) => self.walk_class(c),
            Expression::Template(t) => {
                for e in &t.expressions {
                    self.walk_expression(e);
                }
            }
            Expression::TaggedTemplate(t) => {
                self.walk_expression(&t.tag);
                for e in &t.quasi.expressions {
                    self.walk_expression(e);
                }
            }
            Expression::Identifier(id) => self.reference(&id.name),
            Expression::This(_) => self.hidden_reference(HIDDEN_THIS),
            Expression::NewTarget(_) => self.hidden_reference(HIDDEN_NEW_TARGET),
            Expression::Unary(u) => self.walk_expression(&u.argument),
            Expression::Binary(b) => {
                self.walk_expression(&b.left);
                self.walk_expression(&b.right);
            }
            Expression::Logical(l) => {
                self.walk_expression(&l.left);
                self.walk_expression(&l.right);
            }
            Expression::Conditional(c) => {
                self.walk_expression(&c.test);
                self.walk_expression(&c.consequent);
                self.walk_expression(&c.alternate);
            }
            Expression::Assignment(a) => {
                match &a.target {
                    AssignmentTarget::Simple(e) => self.walk_expression(e),
                    AssignmentTarget::Pattern(p) => self.walk_pattern(p),
                }
                self.walk_expression(&a.right);
            }
            Expression::Update(u) => self.walk_expression(&u.argument),
            Expression::Sequence(s) => {
                for e in &s.expressions {
                    self.walk_expression(e);
                }
            }
            Expression::PrivateIn(p) => {
                self.reference(&private_binding(&p.name));
                self.walk_expression(&p.right);
            }
            Expression::Member(m) => {
                self.walk_expression(&m.object);
                self.walk_member_property(&m.property);
            }
            Expression::SuperMember(m) => {
                self.hidden_reference(HIDDEN_THIS);
                self.hidden_reference(HIDDEN_FUNC);
                self.walk_member_property(&m.property);
            }
            Expression::OptionalChain(o) => self.walk_expression(&o.expression),
            Expression::Call(c) => {
                self.walk_expression(&c.callee);
                self.walk_arguments(&c.arguments);
            }
            Expression::SuperCall(c) => {
                self.hidden_reference(HIDDEN_FUNC);
                self.hidden_reference(HIDDEN_NEW_TARGET);
                self.hidden_reference(HIDDEN_THIS);
                self.walk_arguments(&c.arguments);
            }
            Expression::New(n) => {
                self.walk_expression(&n.callee);
                self.walk_arguments(&n.arguments);
            }
            Expression::Yield(y) => {
                if let Some(arg) = &y.argument {
                    self.walk_expression(arg);
                }
            }
            Expression::Await(a) => self.walk_expression(&a.argument),
            Expression::Parenthesized(e, _) => self.walk_expression(e),
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Slot assignment
    // ───────────────────────────────────────────────────────────────────────

    fn assign_slots(&mut self) {
        let mut locals: FxHashMap<u32, u32> = FxHashMap::default();
        for i in 0..self.scopes.len() {
            let Some(scope) = self.scopes.get_mut(i) else {
                continue;
            };
            let function = scope.function.0;
            let counter = locals.entry(function).or_insert(0);
            let mut stash = 0;
            for b in &mut scope.bindings {
                if b.captured {
                    b.index = stash;
                    stash += 1;
                } else {
                    b.index = *counter;
                    *counter += 1;
                }
            }
            scope.stash_size = stash;
        }
        for (function, count) in locals {
            if let Some(info) = self.scopes.get_mut(function as usize) {
                info.local_count = count;
            }
        }
    }
}

/// `var` names declared anywhere in `stmt` outside nested functions
fn collect_vars<'a>(stmt: &'a Statement, out: &mut Vec<&'a Identifier>) {
    match stmt {
        Statement::Variable(decl) if decl.kind == VariableKind::Var => {
            for d in &decl.declarations {
                d.id.bound_names(out);
            }
        }
        Statement::Block(b) => {
            for s in &b.body {
                collect_vars(s, out);
            }
        }
        Statement::If(s) => {
            collect_vars(&s.consequent, out);
            if let Some(alt) = &s.alternate {
                collect_vars(alt, out);
            }
        }
        Statement::Switch(s) => {
            for case in &s.cases {
                for c in &case.consequent {
                    collect_vars(c, out);
                }
            }
        }
        Statement::For(s) => {
            if let Some(ForInit::Variable(decl)) = &s.init {
                if decl.kind == VariableKind::Var {
                    for d in &decl.declarations {
                        d.id.bound_names(out);
                    }
                }
            }
            collect_vars(&s.body, out);
        }
        Statement::ForIn(ForInStatement { left, body, .. }) | Statement::ForOf(ForOfStatement { left, body, .. }) => {
            if let ForInOfLeft::Variable(VariableKind::Var, pattern) = left {
                pattern.bound_names(out);
            }
            collect_vars(body, out);
        }
        Statement::While(s) => collect_vars(&s.body, out),
        Statement::DoWhile(s) => collect_vars(&s.body, out),
        Statement::Try(s) => {
            for b in &s.block.body {
                collect_vars(b, out);
            }
            if let Some(handler) = &s.handler {
                for b in &handler.body.body {
                    collect_vars(b, out);
                }
            }
            if let Some(finalizer) = &s.finalizer {
                for b in &finalizer.body {
                    collect_vars(b, out);
                }
            }
        }
        Statement::With(s) => collect_vars(&s.body, out),
        Statement::Labeled(s) => collect_vars(&s.body, out),
        _ => {}
    }
}

/// Statement behind any number of labels
pub fn unlabel(mut stmt: &Statement) -> &Statement {
    while let Statement::Labeled(l) = stmt {
        stmt = &l.body;
    }
    stmt
}

/// Lexically declared names of one statement
fn lexical_names<'a>(stmt: &'a Statement, out: &mut Vec<&'a Identifier>) {
    match stmt {
        Statement::Variable(decl) if decl.kind != VariableKind::Var => {
            for d in &decl.declarations {
                d.id.bound_names(out);
            }
        }
        Statement::ClassDeclaration(c) => out.extend(c.id.as_ref()),
        Statement::FunctionDeclaration(f) => out.extend(f.id.as_ref()),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::string_dict::StringDict;

    fn resolve_source(source: &str) -> Result<(Script, Resolution), JsError> {
        let mut dict = StringDict::new();
        let script = crate::parser::parse(source, "test.js", false, &mut dict)?;
        let resolution = resolve(&script, "test.js")?;
        Ok((script, resolution))
    }

    fn function_scope(script: &Script) -> Option<ScopeId> {
        script.body.iter().find_map(|s| match s {
            Statement::FunctionDeclaration(f) => Some(f.scope),
            _ => None,
        })
    }

    #[test]
    fn captured_bindings_go_to_the_stash() {
        let (script, res) = match resolve_source("function f(a, b) { let c = 1; return () => a + c; }") {
            Ok(r) => r,
            Err(e) => panic!("{e}"),
        };
        let scope = res.scope(function_scope(&script).unwrap_or_default());
        let captured: Vec<String> = scope
            .bindings
            .iter()
            .filter(|b| b.captured)
            .map(|b| b.name.to_string())
            .collect();
        assert_eq!(captured, vec!["a", "c"]);
        assert_eq!(scope.stash_size, 2);
        assert_eq!(scope.local_count, 1);
    }

    #[test]
    fn implicit_arguments_binding() {
        let (script, res) = match resolve_source("function f() { return arguments.length; }") {
            Ok(r) => r,
            Err(e) => panic!("{e}"),
        };
        let scope = res.scope(function_scope(&script).unwrap_or_default());
        assert!(scope.binding_str("arguments").is_some_and(|b| b.kind == BindingKind::Arguments));
    }

    #[test]
    fn arrow_this_uses_hidden_binding() {
        let (script, res) = match resolve_source("function f() { return () => this; }") {
            Ok(r) => r,
            Err(e) => panic!("{e}"),
        };
        let scope = res.scope(function_scope(&script).unwrap_or_default());
        assert!(scope.binding_str(HIDDEN_THIS).is_some_and(|b| b.captured));
    }

    #[test]
    fn top_level_declarations_are_global() {
        let (_, res) = match resolve_source("var a; function b() {} let c; const d = 1; class E {}") {
            Ok(r) => r,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(res.globals.vars.len(), 1);
        assert_eq!(res.globals.functions.len(), 1);
        let lexical: Vec<(String, bool)> = res
            .globals
            .lexical
            .iter()
            .map(|(n, c)| (n.to_string(), *c))
            .collect();
        assert_eq!(
            lexical,
            vec![("c".to_string(), false), ("d".to_string(), true), ("E".to_string(), false)]
        );
    }

    #[test]
    fn redeclaration_errors() {
        for source in [
            "let x; var x;",
            "let x; let x;",
            "function f() { let y; var y; }",
            "function f(a) { let a; }",
            "{ let z; { var z; } }",
            "try {} catch (e) { let e; }",
        ] {
            assert!(
                matches!(resolve_source(source), Err(JsError::Parse(_))),
                "expected redeclaration error for {source}"
            );
        }
    }

    #[test]
    fn allowed_redeclarations() {
        for source in [
            "var x; var x;",
            "function f() {} var f;",
            "function g(a) { var a; }",
            "try {} catch (e) { var e; }",
            "{ function h() {} function h() {} }",
        ] {
            assert!(resolve_source(source).is_ok(), "unexpected error for {source}");
        }
    }

    #[test]
    fn annex_b_block_function() {
        let (_, res) = match resolve_source("{ function inner() {} } inner();") {
            Ok(r) => r,
            Err(e) => panic!("{e}"),
        };
        assert!(res.globals.vars.iter().any(|v| *v == "inner"));
    }
}
