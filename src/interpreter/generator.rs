//! Generators, async functions and async generators
//!
//! All three park their suspended `Frame` inside the object that owns
//! them. Sync generators are driven by `next`/`throw`/`return`; async
//! bodies are driven by promise reactions that resume the parked frame.

use std::collections::VecDeque;

use crate::error::JsError;
use crate::gc::Tracer;
use crate::object::{JsObject, JsObjectRef, ObjectKind};
use crate::value::{JsValue, PropertyKey};

use super::builtins::promise::{self, ReactionHandler};
use super::frame::{Frame, Resume};
use super::realm::Intrinsic;
use super::vm::{Exit, Suspend};
use super::Interpreter;

// ═══════════════════════════════════════════════════════════════════════════════
// State
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorStatus {
    SuspendedStart,
    SuspendedYield,
    Executing,
    Completed,
}

pub struct GeneratorState {
    pub frame: Option<Box<Frame>>,
    pub status: GeneratorStatus,
}

impl GeneratorState {
    pub fn trace(&self, t: &mut Tracer<'_>) {
        if let Some(f) = &self.frame {
            f.trace(t);
        }
    }
}

pub struct AsyncFunctionState {
    /// Parked while awaiting
    pub frame: Option<Box<Frame>>,
    pub promise: JsObjectRef,
}

impl AsyncFunctionState {
    pub fn trace(&self, t: &mut Tracer<'_>) {
        if let Some(f) = &self.frame {
            f.trace(t);
        }
        t.edge(&self.promise);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncGeneratorStatus {
    SuspendedStart,
    SuspendedYield,
    /// Running or awaiting inside the body
    Executing,
    /// Awaiting the operand of `return()` on a finished generator
    AwaitingReturn,
    Completed,
}

/// A pending `next`/`throw`/`return` call
pub struct AsyncGeneratorRequest {
    pub completion: Resume,
    pub promise: JsObjectRef,
}

pub struct AsyncGeneratorState {
    pub frame: Option<Box<Frame>>,
    pub status: AsyncGeneratorStatus,
    pub queue: VecDeque<AsyncGeneratorRequest>,
}

impl AsyncGeneratorState {
    pub fn trace(&self, t: &mut Tracer<'_>) {
        if let Some(f) = &self.frame {
            f.trace(t);
        }
        for request in &self.queue {
            match &request.completion {
                Resume::Next(v) | Resume::Throw(v) | Resume::Return(v) => t.value(v),
            }
            t.edge(&request.promise);
        }
    }
}

fn with_generator<R>(obj: &JsObjectRef, f: impl FnOnce(&mut GeneratorState) -> R) -> Option<R> {
    match &mut obj.borrow_mut().kind {
        ObjectKind::Generator(state) => Some(f(state)),
        _ => None,
    }
}

fn with_async_generator<R>(obj: &JsObjectRef, f: impl FnOnce(&mut AsyncGeneratorState) -> R) -> Option<R> {
    match &mut obj.borrow_mut().kind {
        ObjectKind::AsyncGenerator(state) => Some(f(state)),
        _ => None,
    }
}

impl Interpreter {
    // ═══════════════════════════════════════════════════════════════════════
    // Sync generators
    // ═══════════════════════════════════════════════════════════════════════

    /// Run a generator function's prologue and wrap the parked frame
    pub(crate) fn start_generator(&mut self, func: &JsObjectRef, frame: Frame) -> Result<JsValue, JsError> {
        let is_async = frame.code.flags.is_async();
        let frame = match self.run_frame(frame)? {
            Exit::Suspend(frame, Suspend::Start) => frame,
            Exit::Suspend(..) | Exit::Return(_) => {
                return Err(JsError::type_error("Generator body did not start"));
            }
        };
        let proto = match self.get(func, &PropertyKey::from("prototype"))? {
            JsValue::Object(p) => p,
            _ if is_async => self.intrinsic(Intrinsic::AsyncGeneratorPrototype),
            _ => self.intrinsic(Intrinsic::GeneratorPrototype),
        };
        let kind = if is_async {
            ObjectKind::AsyncGenerator(Box::new(AsyncGeneratorState {
                frame: Some(frame),
                status: AsyncGeneratorStatus::SuspendedStart,
                queue: VecDeque::new(),
            }))
        } else {
            ObjectKind::Generator(Box::new(GeneratorState {
                frame: Some(frame),
                status: GeneratorStatus::SuspendedStart,
            }))
        };
        Ok(JsValue::Object(self.alloc(JsObject::new(kind, Some(proto)))))
    }

    /// `next`, `throw` and `return` on a sync generator
    pub(crate) fn generator_resume(&mut self, this: &JsValue, resume: Resume, method: &str) -> Result<JsValue, JsError> {
        let incompatible = || {
            JsError::type_error(format!(
                "{method} method called on incompatible receiver {}",
                this.display_hint()
            ))
        };
        let generator = this.as_object().ok_or_else(incompatible)?.clone();
        let taken = with_generator(&generator, |state| match state.status {
            GeneratorStatus::Executing => None,
            status => Some((status, state.frame.take())),
        })
        .ok_or_else(incompatible)?;
        let Some((status, frame)) = taken else {
            return Err(JsError::type_error("Generator is already running"));
        };

        let finished = |interp: &mut Interpreter, resume: Resume| match resume {
            Resume::Next(_) => Ok(interp.create_iter_result(JsValue::Undefined, true)),
            Resume::Return(v) => Ok(interp.create_iter_result(v, true)),
            Resume::Throw(v) => Err(JsError::Thrown(v)),
        };
        let mut frame = match frame {
            Some(f) if status != GeneratorStatus::Completed => f,
            _ => return finished(self, resume),
        };
        if status == GeneratorStatus::SuspendedStart {
            if !matches!(resume, Resume::Next(_)) {
                with_generator(&generator, |state| state.status = GeneratorStatus::Completed);
                return finished(self, resume);
            }
        } else {
            frame.resume = Some(resume);
        }

        with_generator(&generator, |state| state.status = GeneratorStatus::Executing);
        let result = self.run_frame(*frame);
        let park = |frame: Box<Frame>| {
            with_generator(&generator, |state| {
                state.frame = Some(frame);
                state.status = GeneratorStatus::SuspendedYield;
            });
        };
        match result {
            Ok(Exit::Suspend(frame, Suspend::Yield(v))) => {
                park(frame);
                Ok(self.create_iter_result(v, false))
            }
            Ok(Exit::Suspend(frame, Suspend::YieldResult(r))) => {
                park(frame);
                Ok(r)
            }
            Ok(Exit::Suspend(_, why)) => {
                with_generator(&generator, |state| state.status = GeneratorStatus::Completed);
                Err(JsError::type_error(format!("Unexpected generator suspension: {why:?}")))
            }
            Ok(Exit::Return(v)) => {
                with_generator(&generator, |state| state.status = GeneratorStatus::Completed);
                Ok(self.create_iter_result(v, true))
            }
            Err(err) => {
                with_generator(&generator, |state| state.status = GeneratorStatus::Completed);
                Err(err)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Async functions
    // ═══════════════════════════════════════════════════════════════════════

    pub(crate) fn start_async_function(&mut self, frame: Frame) -> Result<JsValue, JsError> {
        let promise = promise::new_promise(self);
        let proto = self.realm.object_prototype.clone();
        let owner = self.alloc(JsObject::new(
            ObjectKind::AsyncFunction(Box::new(AsyncFunctionState {
                frame: None,
                promise: promise.clone(),
            })),
            Some(proto),
        ));
        self.async_step(&owner, frame)?;
        Ok(JsValue::Object(promise))
    }

    fn async_step(&mut self, owner: &JsObjectRef, frame: Frame) -> Result<(), JsError> {
        let promise = match &owner.borrow().kind {
            ObjectKind::AsyncFunction(state) => state.promise.clone(),
            _ => return Ok(()),
        };
        match self.run_frame(frame) {
            Ok(Exit::Return(v)) => promise::resolve_promise(self, &promise, v),
            Ok(Exit::Suspend(frame, Suspend::Await(v))) => {
                if let ObjectKind::AsyncFunction(state) = &mut owner.borrow_mut().kind {
                    state.frame = Some(frame);
                }
                self.await_value(owner, v)
            }
            Ok(Exit::Suspend(_, why)) => {
                let err = JsError::type_error(format!("Unexpected async suspension: {why:?}"));
                let reason = self.error_value(&err);
                promise::reject_promise(self, &promise, reason);
                Ok(())
            }
            Err(err) if err.is_uncatchable() => Err(err),
            Err(err) => {
                let reason = self.error_value(&err);
                self.last_throw_stack = None;
                promise::reject_promise(self, &promise, reason);
                Ok(())
            }
        }
    }

    /// Subscribe `owner` to the settlement of `value`
    fn await_value(&mut self, owner: &JsObjectRef, value: JsValue) -> Result<(), JsError> {
        match promise::promise_resolve(self, value) {
            Ok(p) => {
                promise::perform_then(
                    self,
                    &p,
                    ReactionHandler::Resume(owner.clone()),
                    ReactionHandler::Resume(owner.clone()),
                    None,
                );
                Ok(())
            }
            Err(err) if err.is_uncatchable() => Err(err),
            Err(err) => {
                let reason = self.error_value(&err);
                self.resume_suspended(owner, Resume::Throw(reason))
            }
        }
    }

    /// Continue an async body after its awaited promise settled
    pub(crate) fn resume_suspended(&mut self, owner: &JsObjectRef, resume: Resume) -> Result<(), JsError> {
        let (frame, is_async_gen) = {
            let mut o = owner.borrow_mut();
            match &mut o.kind {
                ObjectKind::AsyncFunction(state) => (state.frame.take(), false),
                ObjectKind::AsyncGenerator(state) => (state.frame.take(), true),
                _ => (None, false),
            }
        };
        let Some(mut frame) = frame else {
            return Ok(());
        };
        frame.resume = Some(resume);
        if is_async_gen {
            self.async_generator_step(owner, *frame)
        } else {
            self.async_step(owner, *frame)
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Async generators
    // ═══════════════════════════════════════════════════════════════════════

    /// `next`, `throw` and `return` on an async generator; always returns a
    /// promise
    pub(crate) fn async_generator_enqueue(&mut self, this: &JsValue, completion: Resume, method: &str) -> Result<JsValue, JsError> {
        let promise = promise::new_promise(self);
        let queued = this.as_object().and_then(|generator| {
            with_async_generator(generator, |state| {
                state.queue.push_back(AsyncGeneratorRequest {
                    completion,
                    promise: promise.clone(),
                });
                !matches!(
                    state.status,
                    AsyncGeneratorStatus::Executing | AsyncGeneratorStatus::AwaitingReturn
                )
            })
        });
        match (queued, this) {
            (Some(idle), JsValue::Object(generator)) => {
                if idle {
                    self.async_generator_resume_next(generator)?;
                }
            }
            _ => {
                let err = JsError::type_error(format!(
                    "{method} method called on incompatible receiver {}",
                    this.display_hint()
                ));
                let reason = self.error_value(&err);
                promise::reject_promise(self, &promise, reason);
            }
        }
        Ok(JsValue::Object(promise))
    }

    /// Serve queued requests until the generator is busy or the queue is
    /// empty
    fn async_generator_resume_next(&mut self, generator: &JsObjectRef) -> Result<(), JsError> {
        loop {
            let next = with_async_generator(generator, |state| {
                let request = state.queue.front()?;
                Some((state.status, request.completion.clone()))
            })
            .flatten();
            let Some((mut status, completion)) = next else {
                return Ok(());
            };
            if matches!(
                status,
                AsyncGeneratorStatus::Executing | AsyncGeneratorStatus::AwaitingReturn
            ) {
                return Ok(());
            }
            if status == AsyncGeneratorStatus::SuspendedStart && !matches!(completion, Resume::Next(_)) {
                with_async_generator(generator, |state| {
                    state.status = AsyncGeneratorStatus::Completed;
                    state.frame = None;
                });
                status = AsyncGeneratorStatus::Completed;
            }
            if status == AsyncGeneratorStatus::Completed {
                match completion {
                    Resume::Next(_) => self.async_generator_settle(generator, Ok(JsValue::Undefined), true)?,
                    Resume::Throw(v) => self.async_generator_settle(generator, Err(v), true)?,
                    Resume::Return(v) => {
                        with_async_generator(generator, |state| state.status = AsyncGeneratorStatus::AwaitingReturn);
                        match promise::promise_resolve(self, v) {
                            Ok(p) => {
                                promise::perform_then(
                                    self,
                                    &p,
                                    ReactionHandler::AsyncGenReturn(generator.clone()),
                                    ReactionHandler::AsyncGenReturn(generator.clone()),
                                    None,
                                );
                                return Ok(());
                            }
                            Err(err) if err.is_uncatchable() => return Err(err),
                            Err(err) => {
                                let reason = self.error_value(&err);
                                with_async_generator(generator, |state| state.status = AsyncGeneratorStatus::Completed);
                                self.async_generator_settle(generator, Err(reason), true)?;
                            }
                        }
                    }
                }
                continue;
            }

            let frame = with_async_generator(generator, |state| {
                state.status = AsyncGeneratorStatus::Executing;
                state.frame.take()
            })
            .flatten();
            let Some(mut frame) = frame else {
                return Ok(());
            };
            if status == AsyncGeneratorStatus::SuspendedYield {
                frame.resume = Some(completion);
            }
            return self.async_generator_step(generator, *frame);
        }
    }

    fn async_generator_step(&mut self, generator: &JsObjectRef, frame: Frame) -> Result<(), JsError> {
        match self.run_frame(frame) {
            Ok(Exit::Suspend(frame, Suspend::Await(v))) => {
                with_async_generator(generator, |state| state.frame = Some(frame));
                self.await_value(generator, v)
            }
            Ok(Exit::Suspend(frame, Suspend::Yield(v) | Suspend::YieldResult(v))) => {
                with_async_generator(generator, |state| {
                    state.frame = Some(frame);
                    state.status = AsyncGeneratorStatus::SuspendedYield;
                });
                self.async_generator_settle(generator, Ok(v), false)?;
                self.async_generator_resume_next(generator)
            }
            Ok(Exit::Suspend(frame, Suspend::Start)) => {
                with_async_generator(generator, |state| {
                    state.frame = Some(frame);
                    state.status = AsyncGeneratorStatus::SuspendedStart;
                });
                Ok(())
            }
            Ok(Exit::Return(v)) => {
                with_async_generator(generator, |state| state.status = AsyncGeneratorStatus::Completed);
                self.async_generator_settle(generator, Ok(v), true)?;
                self.async_generator_resume_next(generator)
            }
            Err(err) if err.is_uncatchable() => Err(err),
            Err(err) => {
                let reason = self.error_value(&err);
                self.last_throw_stack = None;
                with_async_generator(generator, |state| state.status = AsyncGeneratorStatus::Completed);
                self.async_generator_settle(generator, Err(reason), true)?;
                self.async_generator_resume_next(generator)
            }
        }
    }

    /// Settle the oldest request
    fn async_generator_settle(&mut self, generator: &JsObjectRef, result: Result<JsValue, JsValue>, done: bool) -> Result<(), JsError> {
        let Some(request) = with_async_generator(generator, |state| state.queue.pop_front()).flatten() else {
            return Ok(());
        };
        match result {
            Ok(v) => {
                let iter_result = self.create_iter_result(v, done);
                promise::resolve_promise(self, &request.promise, iter_result)
            }
            Err(reason) => {
                promise::reject_promise(self, &request.promise, reason);
                Ok(())
            }
        }
    }

    /// The operand of `return()` on a finished async generator settled
    pub(crate) fn async_generator_return_settled(&mut self, generator: &JsObjectRef, result: Result<JsValue, JsValue>) -> Result<(), JsError> {
        with_async_generator(generator, |state| state.status = AsyncGeneratorStatus::Completed);
        self.async_generator_settle(generator, result, true)?;
        self.async_generator_resume_next(generator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::parser::ParserOptions;

    fn eval(interp: &mut Interpreter, source: &str) -> JsValue {
        let program = compile(source, "gen.js", false, &ParserOptions::default()).expect("compiles");
        let value = interp.run_program(program.code.clone()).expect("runs");
        interp.run_jobs().expect("jobs run");
        value
    }

    #[test]
    fn generator_runs_lazily_and_completes() {
        let mut interp = Interpreter::default();
        let v = eval(
            &mut interp,
            "var log = []; function* g() { log.push('start'); yield 1; yield 2; }
             var it = g(); log.push('created'); var a = it.next().value; var b = it.next().value;
             var c = it.next().done; log.concat([a, b, c]).join(',')",
        );
        assert_eq!(v, JsValue::from("created,start,1,2,true"));
    }

    #[test]
    fn return_before_start_skips_body() {
        let mut interp = Interpreter::default();
        let v = eval(
            &mut interp,
            "var ran = false; function* g() { ran = true; yield 1; }
             var it = g(); var r = it.return(5); [r.value, r.done, ran, it.next().done].join(',')",
        );
        assert_eq!(v, JsValue::from("5,true,false,true"));
    }

    #[test]
    fn reentrant_next_is_rejected() {
        let mut interp = Interpreter::default();
        let v = eval(
            &mut interp,
            "var it; function* g() { try { it.next(); } catch (e) { yield e.message; } }
             it = g(); it.next().value",
        );
        assert_eq!(v, JsValue::from("Generator is already running"));
    }

    #[test]
    fn async_function_settles_after_jobs() {
        let mut interp = Interpreter::default();
        eval(
            &mut interp,
            "var out = []; async function f() { out.push(1); await null; out.push(3); return 4; }
             f().then(v => out.push(v)); out.push(2);",
        );
        let v = eval(&mut interp, "out.join(',')");
        assert_eq!(v, JsValue::from("1,2,3,4"));
    }

    #[test]
    fn async_generator_queues_requests() {
        let mut interp = Interpreter::default();
        eval(
            &mut interp,
            "var out = []; async function* g() { yield 1; yield 2; }
             var it = g(); it.next().then(r => out.push(r.value)); it.next().then(r => out.push(r.value));
             it.next().then(r => out.push(r.done));",
        );
        let v = eval(&mut interp, "out.join(',')");
        assert_eq!(v, JsValue::from("1,2,true"));
    }
}
