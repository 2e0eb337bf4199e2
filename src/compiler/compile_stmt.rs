//! Statement compilation
//!
//! Compiles AST statements to bytecode instructions.

use super::compile_function::BindMode;
use super::scope::HIDDEN_WITH;
use super::{Compiler, ControlKind, HandlerKind, Op, completion};
use crate::ast::{
    BlockStatement, DoWhileStatement, ForInOfLeft, ForInStatement, ForInit, ForOfStatement,
    ForStatement, IfStatement, LabeledStatement, Pattern, ScopeId, Statement, SwitchStatement,
    TryStatement, VariableDeclaration, VariableKind, WhileStatement, WithStatement,
};
use crate::error::JsError;

impl Compiler<'_> {
    /// Compile a sequence of statements
    pub(crate) fn compile_statements(&mut self, statements: &[Statement]) -> Result<(), JsError> {
        for stmt in statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    /// Compile a statement
    pub(crate) fn compile_statement(&mut self, stmt: &Statement) -> Result<(), JsError> {
        crate::stack::guard(|| self.compile_statement_inner(stmt))
    }

    fn compile_statement_inner(&mut self, stmt: &Statement) -> Result<(), JsError> {
        self.set_span(stmt.span());
        match stmt {
            Statement::Expression(expr_stmt) => {
                self.compile_expression(&expr_stmt.expression)?;
                match self.func.completion {
                    Some(slot) => self.emit(Op::Store { slot }),
                    None => self.emit(Op::Pop),
                };
                Ok(())
            }

            Statement::Variable(decl) => self.compile_variable_declaration(decl),

            Statement::FunctionDeclaration(f) => {
                // Hoisted; only the sloppy block copy happens here
                if self.res.is_annex_b(f.span) {
                    self.emit_annex_b_copy(f)?;
                }
                Ok(())
            }

            Statement::ClassDeclaration(class) => {
                self.compile_class(class, None)?;
                if let Some(id) = &class.id {
                    self.emit_init_name(&id.name)?;
                } else {
                    self.emit(Op::Pop);
                }
                Ok(())
            }

            Statement::Block(block) => self.compile_block(block),

            Statement::If(if_stmt) => self.compile_if(if_stmt),

            Statement::Switch(switch_stmt) => self.compile_switch(switch_stmt),

            Statement::For(for_stmt) => self.compile_for(for_stmt),

            Statement::ForIn(for_in) => self.compile_for_in(for_in),

            Statement::ForOf(for_of) => self.compile_for_of(for_of),

            Statement::While(while_stmt) => self.compile_while(while_stmt),

            Statement::DoWhile(do_while) => self.compile_do_while(do_while),

            Statement::Try(try_stmt) => self.compile_try(try_stmt),

            Statement::With(with_stmt) => self.compile_with(with_stmt),

            Statement::Return(ret) => {
                match &ret.argument {
                    Some(arg) if self.tail_calls_allowed() => self.compile_returned(arg)?,
                    Some(arg) => self.compile_expression(arg)?,
                    None => {
                        self.emit(Op::Undefined);
                    }
                }
                self.emit_return()
            }

            Statement::Break(b) => self.emit_break(b.label.as_ref().map(|l| &l.name), false),

            Statement::Continue(c) => self.emit_break(c.label.as_ref().map(|l| &l.name), true),

            Statement::Throw(throw) => {
                self.compile_expression(&throw.argument)?;
                self.emit(Op::Throw);
                Ok(())
            }

            Statement::Labeled(labeled) => self.compile_labeled(labeled),

            Statement::Empty(_) => Ok(()),

            Statement::Debugger(_) => {
                self.emit(Op::Debugger);
                Ok(())
            }
        }
    }

    fn compile_variable_declaration(&mut self, decl: &VariableDeclaration) -> Result<(), JsError> {
        for d in &decl.declarations {
            self.set_span(d.span);
            match (&d.init, decl.kind) {
                // `var x;` has no effect at run time
                (None, VariableKind::Var) => continue,
                (None, _) => {
                    self.emit(Op::Undefined);
                }
                (Some(init), _) => match &d.id {
                    Pattern::Identifier(id) => self.compile_expression_named(init, &id.name)?,
                    _ => self.compile_expression(init)?,
                },
            }
            let mode = if decl.kind == VariableKind::Var {
                BindMode::Assign
            } else {
                BindMode::Init
            };
            self.compile_pattern(&d.id, mode)?;
        }
        Ok(())
    }

    pub(crate) fn compile_block(&mut self, block: &BlockStatement) -> Result<(), JsError> {
        self.enter_scope(block.scope);
        self.hoist_functions(&block.body)?;
        self.compile_statements(&block.body)?;
        self.exit_scope(block.scope);
        Ok(())
    }

    fn compile_if(&mut self, stmt: &IfStatement) -> Result<(), JsError> {
        self.compile_expression(&stmt.test)?;
        let else_jump = self.jump(Op::JumpIfFalse { target: 0 });
        self.compile_statement(&stmt.consequent)?;
        match &stmt.alternate {
            Some(alt) => {
                let end_jump = self.jump(Op::Jump { target: 0 });
                self.patch(else_jump);
                self.compile_statement(alt)?;
                self.patch(end_jump);
            }
            None => self.patch(else_jump),
        }
        Ok(())
    }

    fn compile_labeled(&mut self, stmt: &LabeledStatement) -> Result<(), JsError> {
        self.func.pending_labels.push(stmt.label.name.clone());
        match stmt.body.as_ref() {
            Statement::Labeled(_)
            | Statement::For(_)
            | Statement::ForIn(_)
            | Statement::ForOf(_)
            | Statement::While(_)
            | Statement::DoWhile(_) => self.compile_statement(&stmt.body),
            body => {
                self.push_control(ControlKind::Label);
                self.compile_statement(body)?;
                self.pop_control();
                Ok(())
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Loops
    // ───────────────────────────────────────────────────────────────────────

    fn compile_while(&mut self, stmt: &WhileStatement) -> Result<(), JsError> {
        self.push_control(ControlKind::Loop);
        let start = self.offset();
        let (held, depth) = (self.func.held, self.func.scope_depth);
        self.set_continue(start, held, depth);
        self.compile_expression(&stmt.test)?;
        let exit = self.jump(Op::JumpIfFalse { target: 0 });
        self.compile_statement(&stmt.body)?;
        self.func.builder.emit_jump_to(start);
        self.patch(exit);
        self.pop_control();
        Ok(())
    }

    fn compile_do_while(&mut self, stmt: &DoWhileStatement) -> Result<(), JsError> {
        self.push_control(ControlKind::Loop);
        let start = self.offset();
        self.compile_statement(&stmt.body)?;
        let cont = self.offset();
        let (held, depth) = (self.func.held, self.func.scope_depth);
        self.set_continue(cont, held, depth);
        self.compile_expression(&stmt.test)?;
        let back = self.jump(Op::JumpIfTrue { target: 0 });
        self.patch_to(back, start);
        self.pop_control();
        Ok(())
    }

    fn compile_for(&mut self, stmt: &ForStatement) -> Result<(), JsError> {
        let labels = self.take_labels();
        self.enter_scope(stmt.scope);
        let per_iteration = matches!(&stmt.init, Some(ForInit::Variable(d)) if d.kind != VariableKind::Var);
        match &stmt.init {
            Some(ForInit::Variable(decl)) => self.compile_variable_declaration(decl)?,
            Some(ForInit::Expression(e)) => {
                self.compile_expression(e)?;
                self.emit(Op::Pop);
            }
            None => {}
        }
        if per_iteration {
            self.copy_scope(stmt.scope);
        }

        self.func.pending_labels = labels;
        self.push_control(ControlKind::Loop);
        let test = self.offset();
        let exit = match &stmt.test {
            Some(t) => {
                self.compile_expression(t)?;
                Some(self.jump(Op::JumpIfFalse { target: 0 }))
            }
            None => None,
        };
        self.compile_statement(&stmt.body)?;

        let cont = self.offset();
        let (held, depth) = (self.func.held, self.func.scope_depth);
        self.set_continue(cont, held, depth);
        if per_iteration {
            self.copy_scope(stmt.scope);
        }
        if let Some(update) = &stmt.update {
            self.compile_expression(update)?;
            self.emit(Op::Pop);
        }
        self.func.builder.emit_jump_to(test);
        if let Some(exit) = exit {
            self.patch(exit);
        }
        self.pop_control();
        self.exit_scope(stmt.scope);
        Ok(())
    }

    /// Bind the value on top of the stack to a `for-in`/`for-of` head
    fn compile_for_binding(&mut self, left: &ForInOfLeft) -> Result<(), JsError> {
        match left {
            ForInOfLeft::Variable(VariableKind::Var, pattern) => self.compile_pattern(pattern, BindMode::Assign),
            ForInOfLeft::Variable(_, pattern) => self.compile_pattern(pattern, BindMode::Init),
            ForInOfLeft::Pattern(pattern) => self.compile_pattern(pattern, BindMode::Assign),
        }
    }

    fn compile_for_in(&mut self, stmt: &ForInStatement) -> Result<(), JsError> {
        self.compile_expression(&stmt.right)?;
        self.emit(Op::ForInStart);
        // Breaks land after the iterator is popped
        self.push_control(ControlKind::Loop);
        self.func.held += 1;

        let next = self.offset();
        let (held, depth) = (self.func.held, self.func.scope_depth);
        self.set_continue(next, held, depth);
        let done = self.jump(Op::ForInNext { target: 0 });
        self.body_scope(stmt.scope, |c| {
            c.compile_for_binding(&stmt.left)?;
            c.compile_statement(&stmt.body)
        })?;
        self.func.builder.emit_jump_to(next);

        self.patch(done);
        self.emit(Op::Pop);
        self.func.held -= 1;
        self.pop_control();
        Ok(())
    }

    fn compile_for_of(&mut self, stmt: &ForOfStatement) -> Result<(), JsError> {
        self.compile_expression(&stmt.right)?;
        let kind = if stmt.is_await {
            self.emit(Op::GetAsyncIterator);
            ControlKind::AsyncLoop
        } else {
            self.emit(Op::GetIterator);
            ControlKind::Loop
        };
        self.push_control(kind);
        self.func.held += 3;
        let (held, depth) = (self.func.held, self.func.scope_depth);

        let region = self.offset();
        self.set_continue(region, held, depth);
        let done = if stmt.is_await {
            self.emit(Op::AsyncIterNext);
            self.emit(Op::Await);
            self.jump(Op::AsyncIterResult { target: 0 })
        } else {
            self.jump(Op::IterStep { target: 0 })
        };
        self.body_scope(stmt.scope, |c| {
            c.compile_for_binding(&stmt.left)?;
            c.compile_statement(&stmt.body)
        })?;
        self.func.builder.emit_jump_to(region);
        let handler_kind = if stmt.is_await {
            HandlerKind::AsyncIterClose
        } else {
            HandlerKind::IterClose
        };
        self.func
            .builder
            .add_handler(region, region, handler_kind, held, depth);

        self.patch(done);
        self.emit(Op::Pop);
        self.emit(Op::Pop);
        self.emit(Op::Pop);
        self.func.held -= 3;
        if let Some(control) = self.pop_control() {
            if !control.async_exits.is_empty() {
                let over = self.jump(Op::Jump { target: 0 });
                self.emit_async_exit_pads(control);
                self.patch(over);
            }
        }
        Ok(())
    }

    /// Fresh scope for one loop iteration
    fn body_scope(
        &mut self,
        scope: ScopeId,
        body: impl FnOnce(&mut Self) -> Result<(), JsError>,
    ) -> Result<(), JsError> {
        self.enter_scope(scope);
        body(self)?;
        self.exit_scope(scope);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Switch, try, with
    // ───────────────────────────────────────────────────────────────────────

    fn compile_switch(&mut self, stmt: &SwitchStatement) -> Result<(), JsError> {
        self.push_control(ControlKind::Switch);
        self.compile_expression(&stmt.discriminant)?;
        self.func.held += 1;
        self.enter_scope(stmt.scope);
        for case in &stmt.cases {
            self.hoist_functions(&case.consequent)?;
        }

        let mut case_jumps = Vec::with_capacity(stmt.cases.len());
        for case in &stmt.cases {
            if let Some(test) = &case.test {
                self.emit(Op::Dup);
                self.compile_expression(test)?;
                self.emit(Op::StrictEq);
                case_jumps.push(Some(self.jump(Op::JumpIfTrue { target: 0 })));
            } else {
                case_jumps.push(None);
            }
        }
        let default_jump = self.jump(Op::Jump { target: 0 });
        let mut default_target = None;

        for (case, jump) in stmt.cases.iter().zip(case_jumps) {
            match jump {
                Some(j) => self.patch(j),
                None => default_target = Some(self.offset()),
            }
            self.compile_statements(&case.consequent)?;
        }

        match default_target {
            Some(t) => self.patch_to(default_jump, t),
            None => self.patch(default_jump),
        }
        self.exit_scope(stmt.scope);
        self.emit(Op::Pop);
        self.func.held -= 1;
        self.pop_control();
        Ok(())
    }

    fn compile_try(&mut self, stmt: &TryStatement) -> Result<(), JsError> {
        let (held, depth) = (self.func.held, self.func.scope_depth);
        let start = self.offset();
        self.compile_block(&stmt.block)?;

        if let Some(handler) = &stmt.handler {
            let over = self.jump(Op::Jump { target: 0 });
            let try_end = self.offset();
            let catch_target = self.offset();
            // The protected range stops before the jump over the handler
            self.func
                .builder
                .add_handler_range(start, try_end - 1, catch_target, HandlerKind::Catch, held, depth);

            self.set_span(handler.span);
            self.enter_scope(handler.scope);
            match &handler.param {
                Some(param) => self.compile_pattern(param, BindMode::Init)?,
                None => {
                    self.emit(Op::Pop);
                }
            }
            self.compile_block(&handler.body)?;
            self.exit_scope(handler.scope);
            self.patch(over);
        }

        if let Some(finalizer) = &stmt.finalizer {
            let region_end = self.offset();
            self.emit(Op::Undefined);
            self.emit(Op::Int {
                value: completion::NORMAL as i32,
            });
            let target = self.offset();
            self.func.builder.add_handler_range(
                start,
                region_end,
                target,
                HandlerKind::Finally,
                held,
                depth,
            );
            self.func.held += 2;
            self.compile_block(finalizer)?;
            self.func.held -= 2;
            self.emit(Op::EndFinally);
        }
        Ok(())
    }

    fn compile_with(&mut self, stmt: &WithStatement) -> Result<(), JsError> {
        self.compile_expression(&stmt.object)?;
        self.emit(Op::RequireObjectCoercible);
        let Some(scope) = self.res.with_scope(stmt.span) else {
            self.emit(Op::Pop);
            return self.compile_statement(&stmt.body);
        };
        self.enter_scope(scope);
        if let Some(slot) = self.scope_slot(scope, HIDDEN_WITH) {
            self.emit(Op::Init { slot });
        }
        self.compile_statement(&stmt.body)?;
        self.exit_scope(scope);
        Ok(())
    }
}
