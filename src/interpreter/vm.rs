//! Bytecode dispatch loop
//!
//! `run` executes the running frame and every script frame it calls inline
//! until the frame it started with returns or suspends. Errors unwind
//! through the handler tables of the frames on the way out; `finally`
//! blocks and iterator closing see returns and breaks the same way.

use std::sync::Arc;

use crate::compiler::{
    Constant, FunctionCode, Handler, HandlerKind, MethodKind, Op, PrivateKind, Slot, completion,
};
use crate::error::JsError;
use crate::number;
use crate::object::{
    Attributes, ClassKind, JsFunction, JsObject, JsObjectRef, ObjectKind, PrivateElement, Property,
    PropertyDescriptor,
};
use crate::string::JsString;
use crate::value::{JsSymbol, JsValue, PropertyKey};

use super::builtins::{iterator, regexp};
use super::call::Prepared;
use super::frame::{Frame, Resume, ResumeMode};
use super::ops::describe;
use super::realm::{Intrinsic, LexicalBinding};
use super::stash::{self, Stash};
use super::Interpreter;

/// How a frame run by `run` ended
pub(crate) enum Exit {
    Return(JsValue),
    /// The frame suspended; it comes back out so its owner can park it
    Suspend(Box<Frame>, Suspend),
}

/// Why a frame suspended
#[derive(Debug)]
pub(crate) enum Suspend {
    /// Generator prologue finished
    Start,
    Yield(JsValue),
    /// A sync `yield*` passes the inner iterator result through untouched
    YieldResult(JsValue),
    Await(JsValue),
}

/// Outcome of one instruction
enum Flow {
    Next,
    Exit(Exit),
}

fn invalid_private(verb: &str, name: &JsSymbol) -> JsError {
    let preposition = if verb == "read" { "from" } else { "to" };
    JsError::type_error(format!(
        "Cannot {verb} private member {} {preposition} an object whose class did not declare it",
        name.description().cloned().unwrap_or_default()
    ))
}

fn private_name(value: &JsValue) -> Result<JsSymbol, JsError> {
    match value {
        JsValue::Symbol(s) if s.is_private() => Ok(s.clone()),
        _ => Err(JsError::type_error("Invalid private name")),
    }
}

impl Interpreter {
    // ═══════════════════════════════════════════════════════════════════════
    // Entry points
    // ═══════════════════════════════════════════════════════════════════════

    /// Run compiled top-level code with the global object as `this`
    pub(crate) fn run_program(&mut self, code: Arc<FunctionCode>) -> Result<JsValue, JsError> {
        let mut frame = Frame::new(code, None);
        frame.this = JsValue::Object(self.global());
        self.run_to_return(frame)
    }

    /// Dispatch loop. `base` is the caller depth of the frame the loop
    /// started with.
    pub(super) fn run(&mut self, base: usize) -> Result<Exit, JsError> {
        loop {
            let flow = match self.frame.resume.take() {
                Some(resume) => self.apply_resume(resume, base),
                None => match self.frame.code.op(self.frame.pc).cloned() {
                    Some(op) => {
                        self.frame.pc += 1;
                        self.step(op, base)
                    }
                    None => self.unwind_return(JsValue::Undefined, base),
                },
            };
            match flow {
                Ok(Flow::Next) => {}
                Ok(Flow::Exit(exit)) => return Ok(exit),
                Err(err) => self.handle_error(err, base)?,
            }
        }
    }

    /// Switch back to the caller, returning the frame that was running
    fn leave_frame(&mut self) -> Frame {
        let caller = match self.frames.pop() {
            Some(f) => f,
            None => Frame::new(self.empty_code.clone(), None),
        };
        std::mem::replace(&mut self.frame, caller)
    }

    /// Hand a finished frame's value to its caller
    fn finish_frame(&mut self, value: JsValue, base: usize) -> Flow {
        let at_base = self.frames.len() <= base;
        self.leave_frame();
        if at_base {
            Flow::Exit(Exit::Return(value))
        } else {
            self.frame.push(value);
            Flow::Next
        }
    }

    fn suspend(&mut self, base: usize, why: Suspend) -> Result<Flow, JsError> {
        if self.frames.len() != base {
            return Err(JsError::type_error("Cannot suspend a nested call"));
        }
        let frame = self.leave_frame();
        Ok(Flow::Exit(Exit::Suspend(Box::new(frame), why)))
    }

    /// Continue a suspended frame at its `yield`/`await`
    fn apply_resume(&mut self, resume: Resume, base: usize) -> Result<Flow, JsError> {
        if self.frame.star_awaiting {
            return match resume {
                Resume::Next(v) => {
                    self.frame.push(v);
                    self.frame.pc = self.frame.current_pc();
                    Ok(Flow::Next)
                }
                Resume::Throw(v) => {
                    self.frame.star_awaiting = false;
                    Err(JsError::Thrown(v))
                }
                Resume::Return(v) => {
                    self.frame.star_awaiting = false;
                    self.unwind_return(v, base)
                }
            };
        }
        let delegating = matches!(
            self.frame.code.op(self.frame.current_pc()),
            Some(Op::YieldStar { .. })
        );
        if delegating {
            let (mode, value) = match resume {
                Resume::Next(v) => (ResumeMode::Next, v),
                Resume::Throw(v) => (ResumeMode::Throw, v),
                Resume::Return(v) => (ResumeMode::Return, v),
            };
            self.frame.resume_mode = mode;
            self.frame.push(value);
            return Ok(Flow::Next);
        }
        match resume {
            Resume::Next(v) => {
                self.frame.push(v);
                Ok(Flow::Next)
            }
            Resume::Throw(v) => Err(JsError::Thrown(v)),
            Resume::Return(v) => self.unwind_return(v, base),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Unwinding
    // ═══════════════════════════════════════════════════════════════════════

    /// Cut the operand stack and scope chain back to a handler's depth
    fn trim(&mut self, stack: u32, scopes: u32) {
        self.frame.stack.truncate(stack as usize);
        while self.frame.scope_depth > scopes {
            let parent = self.frame.stash.as_ref().and_then(|s| s.borrow().parent.clone());
            self.frame.stash = parent;
            self.frame.scope_depth -= 1;
        }
    }

    /// Iterator record guarded by `h`: (iterator, done)
    fn region_record(&self, h: &Handler) -> (JsValue, bool) {
        let top = h.stack as usize;
        let at = |i: usize| top.checked_sub(i).and_then(|i| self.frame.stack.get(i)).cloned().unwrap_or_default();
        (at(3), at(1).to_boolean())
    }

    fn mark_region_done(&mut self, h: &Handler) {
        if let Some(slot) = (h.stack as usize).checked_sub(1).and_then(|i| self.frame.stack.get_mut(i)) {
            *slot = JsValue::Bool(true);
        }
    }

    /// Close the iterator of a loop or destructuring region being left
    /// normally. A failure is reported from just before the region so
    /// handlers inside it do not see it.
    fn close_region(&mut self, h: &Handler) -> Result<(), JsError> {
        let (iter, done) = self.region_record(h);
        if done {
            return Ok(());
        }
        self.mark_region_done(h);
        let result = match h.kind {
            HandlerKind::AsyncIterClose => self.async_iterator_return(&iter).map(|_| ()),
            _ => self.iterator_close(&iter),
        };
        if let Err(err) = result {
            self.frame.pc = h.start as usize;
            return Err(err);
        }
        Ok(())
    }

    /// Call an async iterator's `return()`; the promise is not awaited
    pub(crate) fn async_iterator_return(&mut self, iter: &JsValue) -> Result<JsValue, JsError> {
        match self.get_method(iter, &PropertyKey::from("return"))? {
            Some(ret) => self.call_function(&ret, iter.clone(), &[]),
            None => Ok(JsValue::Undefined),
        }
    }

    /// `return` from the running frame, through `finally` blocks and
    /// iterator regions
    fn unwind_return(&mut self, value: JsValue, base: usize) -> Result<Flow, JsError> {
        let pc = self.frame.current_pc() as u32;
        let code = self.frame.code.clone();
        for h in code.handlers.iter().filter(|h| h.covers(pc)) {
            match h.kind {
                HandlerKind::Catch => {}
                HandlerKind::Finally => {
                    self.trim(h.stack, h.scopes);
                    self.frame.push(value);
                    self.frame.push(JsValue::int(completion::RETURN));
                    self.frame.pc = h.target as usize;
                    return Ok(Flow::Next);
                }
                HandlerKind::IterClose | HandlerKind::AsyncIterClose => self.close_region(h)?,
            }
        }
        let value = self.construct_result(value)?;
        Ok(self.finish_frame(value, base))
    }

    /// `[[Construct]]` return value rules
    fn construct_result(&mut self, value: JsValue) -> Result<JsValue, JsError> {
        if !self.frame.construct || value.is_object() {
            return Ok(value);
        }
        let derived = match self.frame.callee.as_ref().map(|c| c.borrow()) {
            Some(c) => matches!(c.function(), Some(JsFunction::Script(s)) if s.class_kind == ClassKind::Derived),
            None => false,
        };
        if derived && !value.is_undefined() {
            return Err(JsError::type_error(
                "Derived constructors may only return object or undefined",
            ));
        }
        if self.frame.this.is_object() {
            return Ok(self.frame.this.clone());
        }
        Err(JsError::reference_error(
            "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
        ))
    }

    /// `break`/`continue` through `finally` blocks and iterator regions.
    /// `break_pc` is re-run by `EndFinally` when a `finally` intercepts.
    fn do_break(
        &mut self,
        from_pc: usize,
        break_pc: usize,
        target: u32,
        stack: u32,
        scopes: u32,
    ) -> Result<Flow, JsError> {
        let from = from_pc as u32;
        let code = self.frame.code.clone();
        for h in code.handlers.iter().filter(|h| h.covers(from) && !h.covers(target)) {
            match h.kind {
                HandlerKind::Finally => {
                    self.trim(h.stack, h.scopes);
                    self.frame.push(JsValue::Undefined);
                    self.frame.push(JsValue::from(break_pc));
                    self.frame.pc = h.target as usize;
                    return Ok(Flow::Next);
                }
                HandlerKind::IterClose => self.close_region(h)?,
                // for-await exits go through their own close pads
                HandlerKind::AsyncIterClose | HandlerKind::Catch => {}
            }
        }
        self.trim(stack, scopes);
        self.frame.pc = target as usize;
        Ok(Flow::Next)
    }

    /// Route an error to the innermost handler, popping frames down to
    /// `base`. Returns `Err` when nothing catches it.
    fn handle_error(&mut self, err: JsError, base: usize) -> Result<(), JsError> {
        if err.is_uncatchable() {
            while self.frames.len() > base {
                self.leave_frame();
            }
            self.leave_frame();
            return Err(err);
        }
        if self.last_throw_stack.is_none() {
            self.last_throw_stack = Some(self.capture_stack());
        }
        let mut err = match err {
            JsError::Thrown(_) => err,
            other => JsError::Thrown(self.error_value(&other)),
        };
        loop {
            let pc = self.frame.current_pc() as u32;
            let code = self.frame.code.clone();
            for h in code.handlers.iter().filter(|h| h.covers(pc)) {
                match h.kind {
                    HandlerKind::Catch | HandlerKind::Finally => {
                        let value = match &err {
                            JsError::Thrown(v) => v.clone(),
                            other => self.error_value(other),
                        };
                        self.trim(h.stack, h.scopes);
                        self.frame.push(value);
                        if h.kind == HandlerKind::Catch {
                            self.last_throw_stack = None;
                        } else {
                            self.frame.push(JsValue::int(completion::THROW));
                        }
                        self.frame.pc = h.target as usize;
                        return Ok(());
                    }
                    HandlerKind::IterClose => {
                        let (iter, done) = self.region_record(h);
                        if !done {
                            self.mark_region_done(h);
                            err = self.iterator_close_with_error(&iter, err);
                        }
                    }
                    HandlerKind::AsyncIterClose => {
                        let (iter, done) = self.region_record(h);
                        if !done {
                            self.mark_region_done(h);
                            let saved = self.last_throw_stack.take();
                            match self.async_iterator_return(&iter) {
                                Err(close_err) if close_err.is_uncatchable() => err = close_err,
                                _ => self.last_throw_stack = saved,
                            }
                        }
                    }
                }
                if err.is_uncatchable() {
                    return self.handle_error(err, base);
                }
            }
            let at_base = self.frames.len() <= base;
            self.leave_frame();
            if at_base {
                return Err(err);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Bindings
    // ═══════════════════════════════════════════════════════════════════════

    fn read_slot(&self, slot: Slot) -> Option<JsValue> {
        match slot {
            Slot::Local(i) => self.frame.locals.get(i as usize).cloned().flatten(),
            Slot::Stash { depth, index } => stash::ancestor(&self.frame.stash, depth)
                .and_then(|s| s.borrow().slots.get(index as usize).cloned().flatten()),
        }
    }

    fn write_slot(&mut self, slot: Slot, value: Option<JsValue>) {
        match slot {
            Slot::Local(i) => {
                if let Some(local) = self.frame.locals.get_mut(i as usize) {
                    *local = value;
                }
            }
            Slot::Stash { depth, index } => {
                if let Some(s) = stash::ancestor(&self.frame.stash, depth) {
                    if let Some(cell) = s.borrow_mut().slots.get_mut(index as usize) {
                        *cell = value;
                    }
                }
            }
        }
    }

    fn tdz_error(name: &JsString) -> JsError {
        if *name == "this" {
            return JsError::reference_error(
                "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
            );
        }
        JsError::reference_error(format!("Cannot access '{name}' before initialization"))
    }

    fn name(&self, idx: u32) -> JsString {
        self.frame.code.string(idx)
    }

    fn declare_globals(&mut self, idx: u32) -> Result<(), JsError> {
        let decls = match self.frame.code.constant(idx) {
            Some(Constant::GlobalDecls(d)) => d.clone(),
            _ => return Ok(()),
        };
        let global = self.global();
        let redeclared = |name: &JsString| JsError::syntax_error(format!("Identifier '{name}' has already been declared"));
        for (name, _) in &decls.lexical {
            if self.realm.lexical.contains_key(name) {
                return Err(redeclared(name));
            }
            let key = PropertyKey::from(name);
            if let Some(desc) = self.get_own_property(&global, &key)? {
                if desc.configurable == Some(false) {
                    return Err(redeclared(name));
                }
            }
        }
        for name in decls.vars.iter().chain(decls.functions.iter()) {
            if self.realm.lexical.contains_key(name) {
                return Err(redeclared(name));
            }
        }
        for name in decls.functions.iter().chain(decls.vars.iter()) {
            let key = PropertyKey::from(name);
            if !self.has_own_property(&global, &key)? {
                self.define_property_or_throw(
                    &global,
                    key,
                    PropertyDescriptor::data(JsValue::Undefined, true, true, false),
                )?;
            }
        }
        for (name, is_const) in decls.lexical {
            self.realm.lexical.insert(
                name,
                LexicalBinding {
                    value: None,
                    mutable: !is_const,
                },
            );
        }
        Ok(())
    }

    fn get_global(&mut self, name: &JsString) -> Result<Option<JsValue>, JsError> {
        if let Some(binding) = self.realm.lexical.get(name) {
            return match &binding.value {
                Some(v) => Ok(Some(v.clone())),
                None => Err(Self::tdz_error(name)),
            };
        }
        let global = self.global();
        let key = PropertyKey::from(name);
        if !self.has_property(&global, &key)? {
            return Ok(None);
        }
        Ok(Some(self.get(&global, &key)?))
    }

    fn set_global(&mut self, name: &JsString, value: JsValue, strict: bool) -> Result<(), JsError> {
        if let Some(binding) = self.realm.lexical.get_mut(name) {
            if binding.value.is_none() {
                return Err(Self::tdz_error(name));
            }
            if !binding.mutable {
                return Err(JsError::type_error("Assignment to constant variable."));
            }
            binding.value = Some(value);
            return Ok(());
        }
        let global = self.global();
        let key = PropertyKey::from(name);
        if strict && !self.has_property(&global, &key)? {
            return Err(JsError::not_defined(name));
        }
        self.put_value(&JsValue::Object(global), key, value, strict)
    }

    /// `HasBinding` of an object environment record for `with`
    fn with_has(&mut self, obj: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
        if !self.has_property(obj, key)? {
            return Ok(false);
        }
        let unscopables = self.get(obj, &PropertyKey::Symbol(JsSymbol::unscopables()))?;
        if let JsValue::Object(u) = unscopables {
            if self.get(&u, key)?.to_boolean() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Helpers
    // ═══════════════════════════════════════════════════════════════════════

    fn enter(&mut self, prepared: Prepared) -> Result<Flow, JsError> {
        match prepared {
            Prepared::Frame(frame) => self.push_frame(frame)?,
            Prepared::Done(v) => self.frame.push(v),
        }
        Ok(Flow::Next)
    }

    fn call_op(&mut self, func: JsValue, this: JsValue, args: Vec<JsValue>) -> Result<Flow, JsError> {
        self.check_interrupt()?;
        self.maybe_collect();
        let prepared = self.prepare_call(&func, this, &args)?;
        self.enter(prepared)
    }

    /// The callee's frame replaces the running one unless this frame still
    /// has work after the call: a covering handler, or `[[Construct]]`
    /// result rules. The `Return` following the op then never runs.
    fn tail_call_op(&mut self, func: JsValue, this: JsValue, args: Vec<JsValue>) -> Result<Flow, JsError> {
        self.check_interrupt()?;
        self.maybe_collect();
        let pc = self.frame.current_pc() as u32;
        let pending = self.frame.construct || self.frame.code.handlers.iter().any(|h| h.covers(pc));
        match self.prepare_call(&func, this, &args)? {
            Prepared::Frame(frame) if !pending => {
                self.frame = frame;
                Ok(Flow::Next)
            }
            prepared => self.enter(prepared),
        }
    }

    fn new_op(&mut self, ctor: JsValue, args: Vec<JsValue>) -> Result<Flow, JsError> {
        self.check_interrupt()?;
        self.maybe_collect();
        let prepared = self.prepare_construct(&ctor, &args, None)?;
        self.enter(prepared)
    }

    /// Argument list from an array built by spread
    fn spread_values(&mut self, value: &JsValue) -> Result<Vec<JsValue>, JsError> {
        if let JsValue::Object(arr) = value {
            let a = arr.borrow();
            if a.array_length().is_some_and(|len| len as usize == a.elements.len()) {
                return Ok(a.elements.clone());
            }
        }
        self.create_list_from_array_like(value)
    }

    fn array_append(&mut self, arr: &JsValue, value: JsValue) -> Result<(), JsError> {
        let JsValue::Object(arr) = arr else {
            return Ok(());
        };
        let len = arr.borrow().array_length().unwrap_or(0);
        self.create_data_property_or_throw(arr, PropertyKey::Index(len), value)
    }

    fn numeric_binary(&mut self, op: &Op, a: JsValue, b: JsValue) -> Result<JsValue, JsError> {
        if let (JsValue::Int(x), JsValue::Int(y)) = (&a, &b) {
            let (x, y) = (*x, *y);
            match op {
                Op::Sub => return Ok(JsValue::int(x - y)),
                Op::Mul => {
                    if let Some(r) = x.checked_mul(y).filter(|r| *r != 0) {
                        return Ok(JsValue::int(r));
                    }
                }
                Op::Mod if x >= 0 && y > 0 => return Ok(JsValue::int(x % y)),
                _ => {}
            }
        }
        let x = self.to_number(&a)?;
        let y = self.to_number(&b)?;
        let r = match op {
            Op::Sub => x - y,
            Op::Mul => x * y,
            Op::Div => x / y,
            Op::Mod => x % y,
            Op::Exp => super::builtins::math::exponentiate(x, y),
            _ => f64::NAN,
        };
        Ok(JsValue::number(r))
    }

    fn bitwise(&mut self, op: &Op, a: JsValue, b: JsValue) -> Result<JsValue, JsError> {
        let x = self.to_int32(&a)?;
        match op {
            Op::UShr => {
                let x = x as u32;
                let shift = self.to_uint32(&b)? & 31;
                Ok(JsValue::from(x >> shift))
            }
            Op::Shl | Op::Shr => {
                let shift = self.to_uint32(&b)? & 31;
                let r = if matches!(op, Op::Shl) { x.wrapping_shl(shift) } else { x >> shift };
                Ok(JsValue::from(r))
            }
            _ => {
                let y = self.to_int32(&b)?;
                let r = match op {
                    Op::BitAnd => x & y,
                    Op::BitOr => x | y,
                    _ => x ^ y,
                };
                Ok(JsValue::from(r))
            }
        }
    }

    fn compare(&mut self, op: &Op, a: JsValue, b: JsValue) -> Result<bool, JsError> {
        if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
            return Ok(match op {
                Op::Lt => x < y,
                Op::LtEq => x <= y,
                Op::Gt => x > y,
                _ => x >= y,
            });
        }
        Ok(match op {
            Op::Lt => self.less_than(&a, &b, true)? == Some(true),
            Op::Gt => self.less_than(&b, &a, false)? == Some(true),
            Op::LtEq => self.less_than(&b, &a, false)? == Some(false),
            _ => self.less_than(&a, &b, true)? == Some(false),
        })
    }

    fn increment(&mut self, value: JsValue, delta: i64) -> Result<JsValue, JsError> {
        if let JsValue::Int(i) = value {
            return Ok(JsValue::int(i + delta));
        }
        let n = self.to_number(&value)?;
        Ok(JsValue::number(n + delta as f64))
    }

    /// Property read with the per-site inline cache
    fn get_named(&mut self, base: JsValue, name: u32, cache: u32) -> Result<JsValue, JsError> {
        let code = self.frame.code.clone();
        let key = PropertyKey::from(code.string(name));
        let JsValue::Object(obj) = &base else {
            return self.get_value(&base, &key);
        };
        if let Some(index) = code.cache_get(cache) {
            let o = obj.borrow();
            if !o.is_exotic() {
                if let Some((k, p)) = o.properties.get_index(index) {
                    if *k == key {
                        if let Some(v) = p.data_value() {
                            return Ok(v.clone());
                        }
                    }
                }
            }
        }
        let value = self.get_value(&base, &key)?;
        let o = obj.borrow();
        if !o.is_exotic() {
            if let Some((index, p)) = o.properties.get_full(&key) {
                if !p.is_accessor() {
                    code.cache_set(cache, index);
                }
            }
        }
        Ok(value)
    }

    /// Property write with the per-site inline cache
    fn set_named(&mut self, base: JsValue, name: u32, cache: u32, value: JsValue, strict: bool) -> Result<(), JsError> {
        let code = self.frame.code.clone();
        let key = PropertyKey::from(code.string(name));
        if let (JsValue::Object(obj), Some(index)) = (&base, code.cache_get(cache)) {
            let mut o = obj.borrow_mut();
            if !o.is_exotic() {
                if let Some((k, p)) = o.properties.get_index_mut(index) {
                    if *k == key && p.attrs.writable() && !p.is_accessor() {
                        p.value = crate::object::PropertyValue::Data(value);
                        return Ok(());
                    }
                }
            }
        }
        self.put_value(&base, key.clone(), value, strict)?;
        if let JsValue::Object(obj) = &base {
            let o = obj.borrow();
            if !o.is_exotic() {
                if let Some((index, _)) = o.properties.get_full(&key) {
                    code.cache_set(cache, index);
                }
            }
        }
        Ok(())
    }

    fn create_arguments(&mut self) -> JsValue {
        let args = self.frame.args.clone();
        let len = args.len();
        let values = self.intrinsic(Intrinsic::ArrayValues);
        let mut obj = JsObject::new(ObjectKind::Arguments, Some(self.realm.object_prototype.clone()));
        obj.elements = args;
        obj.define_property(PropertyKey::from("length"), Property::data(JsValue::from(len), Attributes::HIDDEN));
        obj.define_property(
            PropertyKey::Symbol(JsSymbol::iterator()),
            Property::data(JsValue::Object(values), Attributes::HIDDEN),
        );
        if self.frame.code.flags.is_strict() {
            let thrower = self.intrinsic(Intrinsic::ThrowTypeError);
            obj.define_property(
                PropertyKey::from("callee"),
                Property::accessor(Some(thrower.clone()), Some(thrower), Attributes::NONE),
            );
        } else {
            obj.define_property(
                PropertyKey::from("callee"),
                Property::data(JsValue::from(self.frame.callee.clone()), Attributes::HIDDEN),
            );
        }
        JsValue::Object(self.alloc(obj))
    }

    fn template_object(&mut self, idx: u32) -> Result<JsValue, JsError> {
        let code = self.frame.code.clone();
        let cache_key = (Arc::as_ptr(&code) as usize, idx);
        if let Some((_, obj)) = self.template_cache.get(&cache_key) {
            return Ok(JsValue::Object(obj.clone()));
        }
        let Some(Constant::Template { cooked, raw }) = code.constant(idx) else {
            return Err(JsError::type_error("Invalid template constant"));
        };
        let cooked: Vec<JsValue> = cooked
            .iter()
            .map(|c| c.clone().map(JsValue::String).unwrap_or_default())
            .collect();
        let raw: Vec<JsValue> = raw.iter().cloned().map(JsValue::String).collect();
        let raw_obj = self.create_array(raw);
        raw_obj.borrow_mut().set_integrity(true);
        let obj = self.create_array(cooked);
        {
            let mut o = obj.borrow_mut();
            o.define_property(PropertyKey::from("raw"), Property::data(JsValue::Object(raw_obj), Attributes::NONE));
            o.set_integrity(true);
        }
        self.template_cache.insert(cache_key, (code, obj.clone()));
        Ok(JsValue::Object(obj))
    }

    fn define_method(
        &mut self,
        target: &JsObjectRef,
        key: JsValue,
        func: JsValue,
        kind: MethodKind,
        enumerable: bool,
    ) -> Result<(), JsError> {
        let key = self.to_property_key(&key)?;
        self.set_home_object(&func, target);
        let (prefix, desc) = match kind {
            MethodKind::Method => (None, PropertyDescriptor::data(func.clone(), true, enumerable, true)),
            MethodKind::Getter => (
                Some("get"),
                PropertyDescriptor {
                    get: Some(func.clone()),
                    enumerable: Some(enumerable),
                    configurable: Some(true),
                    ..Default::default()
                },
            ),
            MethodKind::Setter => (
                Some("set"),
                PropertyDescriptor {
                    set: Some(func.clone()),
                    enumerable: Some(enumerable),
                    configurable: Some(true),
                    ..Default::default()
                },
            ),
        };
        self.set_function_name(&func, &key, prefix);
        self.define_property_or_throw(target, key, desc)
    }

    fn add_private(&mut self, obj: &JsValue, name: &JsValue, value: JsValue, kind: PrivateKind) -> Result<(), JsError> {
        let name = private_name(name)?;
        let JsValue::Object(obj) = obj else {
            return Err(JsError::type_error("Cannot define private member on a non-object"));
        };
        let mut o = obj.borrow_mut();
        let func = value.as_object().cloned();
        let existing = o.private_element_mut(&name);
        match (existing, kind) {
            (Some(PrivateElement::Accessor { get, .. }), PrivateKind::Getter) if get.is_none() => {
                *get = func;
                Ok(())
            }
            (Some(PrivateElement::Accessor { set, .. }), PrivateKind::Setter) if set.is_none() => {
                *set = func;
                Ok(())
            }
            (Some(_), _) => Err(JsError::type_error(format!(
                "Cannot initialize {} twice on the same object",
                name.description().cloned().unwrap_or_default()
            ))),
            (None, kind) => {
                let element = match kind {
                    PrivateKind::Field => PrivateElement::Field(value),
                    PrivateKind::Method => match func {
                        Some(f) => PrivateElement::Method(f),
                        None => PrivateElement::Field(value),
                    },
                    PrivateKind::Getter => PrivateElement::Accessor { get: func, set: None },
                    PrivateKind::Setter => PrivateElement::Accessor { get: None, set: func },
                };
                o.private_elements.push((name, element));
                Ok(())
            }
        }
    }

    fn get_private(&mut self, obj: &JsValue, name: &JsValue) -> Result<JsValue, JsError> {
        let name = private_name(name)?;
        let element = match obj {
            JsValue::Object(o) => o.borrow().private_element(&name).cloned(),
            _ => None,
        };
        match element {
            None => Err(invalid_private("read", &name)),
            Some(PrivateElement::Field(v)) => Ok(v),
            Some(PrivateElement::Method(m)) => Ok(JsValue::Object(m)),
            Some(PrivateElement::Accessor { get: Some(g), .. }) => {
                self.call_function(&JsValue::Object(g), obj.clone(), &[])
            }
            Some(PrivateElement::Accessor { get: None, .. }) => Err(JsError::type_error(format!(
                "'{}' was defined without a getter",
                name.description().cloned().unwrap_or_default()
            ))),
        }
    }

    fn set_private(&mut self, obj: &JsValue, name: &JsValue, value: JsValue) -> Result<(), JsError> {
        let name = private_name(name)?;
        let JsValue::Object(o) = obj else {
            return Err(invalid_private("write", &name));
        };
        let setter = {
            let mut b = o.borrow_mut();
            match b.private_element_mut(&name) {
                None => return Err(invalid_private("write", &name)),
                Some(PrivateElement::Field(v)) => {
                    *v = value;
                    return Ok(());
                }
                Some(PrivateElement::Method(_)) => {
                    return Err(JsError::type_error(format!(
                        "Private method '{}' is not writable",
                        name.description().cloned().unwrap_or_default()
                    )));
                }
                Some(PrivateElement::Accessor { set, .. }) => set.clone(),
            }
        };
        match setter {
            Some(s) => {
                self.call_function(&JsValue::Object(s), obj.clone(), &[value])?;
                Ok(())
            }
            None => Err(JsError::type_error(format!(
                "'{}' was defined without a setter",
                name.description().cloned().unwrap_or_default()
            ))),
        }
    }

    /// `[[HomeObject]].[[Prototype]]` of the method `func`
    fn super_base(&mut self, func: &JsValue) -> Result<Option<JsObjectRef>, JsError> {
        match self.home_object(func) {
            Some(home) => self.get_prototype_of(&home),
            None => Err(JsError::syntax_error("'super' keyword unexpected here")),
        }
    }

    fn super_call(&mut self, func: JsValue, new_target: JsValue, args: Vec<JsValue>) -> Result<JsValue, JsError> {
        let JsValue::Object(f) = &func else {
            return Err(JsError::syntax_error("'super' keyword unexpected here"));
        };
        let parent = self.get_prototype_of(f)?.map(JsValue::Object).unwrap_or(JsValue::Null);
        if !parent.is_constructor() {
            return Err(JsError::type_error(format!(
                "Super constructor {} of anonymous class is not a constructor",
                describe(&parent)
            )));
        }
        let this = self.construct(&parent, &args, Some(&new_target))?;
        let own_frame = self.frame.callee.as_ref().is_some_and(|c| c.ptr_eq(f));
        if own_frame {
            if self.frame.this.is_object() {
                return Err(JsError::reference_error("Super constructor may only be called once"));
            }
            self.frame.this = this.clone();
        }
        self.initialize_fields(f, &this)?;
        Ok(this)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Iteration
    // ═══════════════════════════════════════════════════════════════════════

    /// [iter, next, done] -> next value, or `None` once exhausted
    fn record_step(&mut self) -> Result<Option<JsValue>, JsError> {
        if self.frame.peek(0).to_boolean() {
            return Ok(None);
        }
        let next = self.frame.peek(1);
        let iter = self.frame.peek(2);
        self.frame.set_at_depth(0, JsValue::Bool(true));
        let result = self.call_function(&next, iter, &[])?;
        if !result.is_object() {
            return Err(JsError::type_error(format!(
                "Iterator result {} is not an object",
                describe(&result)
            )));
        }
        if self.get_value(&result, &PropertyKey::from("done"))?.to_boolean() {
            return Ok(None);
        }
        let value = self.get_value(&result, &PropertyKey::from("value"))?;
        self.frame.set_at_depth(0, JsValue::Bool(false));
        Ok(Some(value))
    }

    fn get_async_iterator(&mut self, value: &JsValue) -> Result<(JsValue, JsValue), JsError> {
        if let Some(method) = self.get_method(value, &PropertyKey::Symbol(JsSymbol::async_iterator()))? {
            let iter = self.call_function(&method, value.clone(), &[])?;
            if !iter.is_object() {
                return Err(JsError::type_error(
                    "Result of the Symbol.asyncIterator method is not an object",
                ));
            }
            let next = self.get_value(&iter, &PropertyKey::from("next"))?;
            return Ok((iter, next));
        }
        let record = self.get_iterator(value)?;
        let iter = iterator::create_async_from_sync_iterator(self, record);
        let next = self.get_value(&iter, &PropertyKey::from("next"))?;
        Ok((iter, next))
    }

    /// One step of `yield*`. Stack on entry: [iter, next, done, received].
    fn yield_star(&mut self, target: u32, base: usize) -> Result<Flow, JsError> {
        let is_async = self.frame.code.flags.is_async();
        let received = self.frame.pop();
        let mode = self.frame.resume_mode;
        let iter = self.frame.peek(2);

        let result = if is_async && self.frame.star_awaiting {
            self.frame.star_awaiting = false;
            received
        } else {
            let result = match mode {
                ResumeMode::Next => {
                    let next = self.frame.peek(1);
                    self.call_function(&next, iter.clone(), &[received])?
                }
                ResumeMode::Throw => match self.get_method(&iter, &PropertyKey::from("throw"))? {
                    Some(throw) => self.call_function(&throw, iter.clone(), &[received])?,
                    None => {
                        self.frame.resume_mode = ResumeMode::Next;
                        if is_async {
                            self.async_iterator_return(&iter)?;
                        } else {
                            self.iterator_close(&iter)?;
                        }
                        return Err(JsError::type_error("The iterator does not provide a 'throw' method"));
                    }
                },
                ResumeMode::Return => match self.get_method(&iter, &PropertyKey::from("return"))? {
                    Some(ret) => self.call_function(&ret, iter.clone(), &[received])?,
                    None => {
                        self.frame.resume_mode = ResumeMode::Next;
                        return self.unwind_return(received, base);
                    }
                },
            };
            if is_async {
                self.frame.star_awaiting = true;
                return self.suspend(base, Suspend::Await(result));
            }
            result
        };

        if !result.is_object() {
            self.frame.resume_mode = ResumeMode::Next;
            return Err(JsError::type_error(format!(
                "Iterator result {} is not an object",
                describe(&result)
            )));
        }
        let done = self.get_value(&result, &PropertyKey::from("done"))?.to_boolean();
        if done {
            self.frame.resume_mode = ResumeMode::Next;
            let value = self.get_value(&result, &PropertyKey::from("value"))?;
            if mode == ResumeMode::Return {
                return self.unwind_return(value, base);
            }
            self.frame.push(value);
            self.frame.pc = target as usize;
            return Ok(Flow::Next);
        }
        if is_async {
            let value = self.get_value(&result, &PropertyKey::from("value"))?;
            return self.suspend(base, Suspend::Yield(value));
        }
        self.suspend(base, Suspend::YieldResult(result))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Dispatch
    // ═══════════════════════════════════════════════════════════════════════

    fn step(&mut self, op: Op, base: usize) -> Result<Flow, JsError> {
        match op {
            // ───────────────────────────────────────────────────────────────
            // Constants & stack
            // ───────────────────────────────────────────────────────────────
            Op::Undefined => self.frame.push(JsValue::Undefined),
            Op::Null => self.frame.push(JsValue::Null),
            Op::True => self.frame.push(JsValue::Bool(true)),
            Op::False => self.frame.push(JsValue::Bool(false)),
            Op::Int { value } => self.frame.push(JsValue::from(value)),
            Op::Const { idx } => {
                let v = match self.frame.code.constant(idx) {
                    Some(Constant::Number(n)) => JsValue::number(*n),
                    Some(Constant::String(s)) => JsValue::String(s.clone()),
                    _ => JsValue::Undefined,
                };
                self.frame.push(v);
            }
            Op::Dup => {
                let v = self.frame.peek(0);
                self.frame.push(v);
            }
            Op::Dup2 => {
                let a = self.frame.peek(1);
                let b = self.frame.peek(0);
                self.frame.push(a);
                self.frame.push(b);
            }
            Op::Pop => {
                self.frame.pop();
            }
            Op::Swap => {
                let b = self.frame.pop();
                let a = self.frame.pop();
                self.frame.push(b);
                self.frame.push(a);
            }
            Op::Rot3 => {
                let c = self.frame.pop();
                let b = self.frame.pop();
                let a = self.frame.pop();
                self.frame.push(c);
                self.frame.push(a);
                self.frame.push(b);
            }
            Op::Rot4 => {
                let d = self.frame.pop();
                let rest = self.frame.pop_n(3);
                self.frame.push(d);
                self.frame.stack.extend(rest);
            }
            Op::Pick { depth } => {
                let v = self.frame.peek(depth as usize);
                self.frame.push(v);
            }

            // ───────────────────────────────────────────────────────────────
            // Bindings & scopes
            // ───────────────────────────────────────────────────────────────
            Op::Load { slot } => {
                let v = self.read_slot(slot).unwrap_or_default();
                self.frame.push(v);
            }
            Op::LoadChecked { slot, name } => match self.read_slot(slot) {
                Some(v) => self.frame.push(v),
                None => return Err(Self::tdz_error(&self.name(name))),
            },
            Op::Store { slot } => {
                let v = self.frame.pop();
                self.write_slot(slot, Some(v));
            }
            Op::StoreChecked { slot, name } => {
                if self.read_slot(slot).is_none() {
                    return Err(Self::tdz_error(&self.name(name)));
                }
                let v = self.frame.pop();
                self.write_slot(slot, Some(v));
            }
            Op::Init { slot } => {
                let v = self.frame.pop();
                self.write_slot(slot, Some(v));
            }
            Op::Clear { slot } => self.write_slot(slot, None),
            Op::ThrowConstAssign { .. } => {
                return Err(JsError::type_error("Assignment to constant variable."));
            }
            Op::PushScope { size } => {
                let stash = self.alloc_stash(Stash::new(size as usize, self.frame.stash.clone()));
                self.frame.stash = Some(stash);
                self.frame.scope_depth += 1;
            }
            Op::PopScope => {
                let depth = self.frame.scope_depth.saturating_sub(1);
                let stack = self.frame.stack.len() as u32;
                self.trim(stack, depth);
            }
            Op::CopyScope => {
                if let Some(current) = self.frame.stash.clone() {
                    let (slots, parent) = {
                        let s = current.borrow();
                        (s.slots.clone(), s.parent.clone())
                    };
                    let copy = self.alloc_stash(Stash { slots, parent });
                    self.frame.stash = Some(copy);
                }
            }

            // ───────────────────────────────────────────────────────────────
            // Globals
            // ───────────────────────────────────────────────────────────────
            Op::DeclareGlobals { idx } => self.declare_globals(idx)?,
            Op::GetGlobal { name } => {
                let name = self.name(name);
                match self.get_global(&name)? {
                    Some(v) => self.frame.push(v),
                    None => return Err(JsError::not_defined(&name)),
                }
            }
            Op::TypeofGlobal { name } => {
                let name = self.name(name);
                let v = self.get_global(&name)?.unwrap_or_default();
                self.frame.push(JsValue::from(v.type_of()));
            }
            Op::SetGlobal { name, strict } => {
                let name = self.name(name);
                let v = self.frame.peek(0);
                self.set_global(&name, v, strict)?;
            }
            Op::InitGlobalLex { name } => {
                let name = self.name(name);
                let v = self.frame.pop();
                if let Some(binding) = self.realm.lexical.get_mut(&name) {
                    binding.value = Some(v);
                }
            }
            Op::DeleteGlobal { name } => {
                let name = self.name(name);
                let deleted = if self.realm.lexical.contains_key(&name) {
                    false
                } else {
                    let global = self.global();
                    self.delete_property(&global, &PropertyKey::from(name))?
                };
                self.frame.push(JsValue::Bool(deleted));
            }

            // ───────────────────────────────────────────────────────────────
            // With
            // ───────────────────────────────────────────────────────────────
            Op::WithGet { name, target } => {
                let obj = self.frame.pop();
                let obj = self.to_object(&obj)?;
                let key = PropertyKey::from(self.name(name));
                if self.with_has(&obj, &key)? {
                    let v = self.get(&obj, &key)?;
                    self.frame.push(v);
                    self.frame.pc = target as usize;
                }
            }
            Op::WithGetMethod { name, target } => {
                let obj = self.frame.pop();
                let obj = self.to_object(&obj)?;
                let key = PropertyKey::from(self.name(name));
                if self.with_has(&obj, &key)? {
                    let f = self.get(&obj, &key)?;
                    self.frame.push(JsValue::Object(obj));
                    self.frame.push(f);
                    self.frame.pc = target as usize;
                }
            }
            Op::WithSet { name, target, strict } => {
                let obj = self.frame.pop();
                let obj = self.to_object(&obj)?;
                let key = PropertyKey::from(self.name(name));
                if self.with_has(&obj, &key)? {
                    let v = self.frame.peek(0);
                    self.put_value(&JsValue::Object(obj), key, v, strict)?;
                    self.frame.pc = target as usize;
                }
            }

            // ───────────────────────────────────────────────────────────────
            // Frame
            // ───────────────────────────────────────────────────────────────
            Op::This => {
                let v = self.frame.this.clone();
                self.frame.push(v);
            }
            Op::GlobalThis => {
                let g = self.global();
                self.frame.push(JsValue::Object(g));
            }
            Op::NewTarget => {
                let v = self.frame.new_target.clone();
                self.frame.push(v);
            }
            Op::Callee => {
                let v = JsValue::from(self.frame.callee.clone());
                let v = if v.is_null() { JsValue::Undefined } else { v };
                self.frame.push(v);
            }
            Op::Arg { index } => {
                let v = self.frame.args.get(index as usize).cloned().unwrap_or_default();
                self.frame.push(v);
            }
            Op::RestArgs { from } => {
                let rest = self.frame.args.get(from as usize..).map(<[JsValue]>::to_vec).unwrap_or_default();
                let arr = self.create_array(rest);
                self.frame.push(JsValue::Object(arr));
            }
            Op::CreateArguments => {
                let args = self.create_arguments();
                self.frame.push(args);
            }

            // ───────────────────────────────────────────────────────────────
            // Operators
            // ───────────────────────────────────────────────────────────────
            Op::Add => {
                let b = self.frame.pop();
                let a = self.frame.pop();
                let r = self.add(&a, &b)?;
                self.frame.push(r);
            }
            ref arith @ (Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Exp) => {
                let b = self.frame.pop();
                let a = self.frame.pop();
                let r = self.numeric_binary(arith, a, b)?;
                self.frame.push(r);
            }
            ref bits @ (Op::BitAnd | Op::BitOr | Op::BitXor | Op::Shl | Op::Shr | Op::UShr) => {
                let b = self.frame.pop();
                let a = self.frame.pop();
                let r = self.bitwise(bits, a, b)?;
                self.frame.push(r);
            }
            Op::Eq | Op::NotEq => {
                let b = self.frame.pop();
                let a = self.frame.pop();
                let eq = self.loose_equals(&a, &b)?;
                self.frame.push(JsValue::Bool(eq == matches!(op, Op::Eq)));
            }
            Op::StrictEq | Op::StrictNotEq => {
                let b = self.frame.pop();
                let a = self.frame.pop();
                let eq = a.strict_equals(&b);
                self.frame.push(JsValue::Bool(eq == matches!(op, Op::StrictEq)));
            }
            ref cmp @ (Op::Lt | Op::LtEq | Op::Gt | Op::GtEq) => {
                let b = self.frame.pop();
                let a = self.frame.pop();
                let r = self.compare(cmp, a, b)?;
                self.frame.push(JsValue::Bool(r));
            }
            Op::In => {
                let obj = self.frame.pop();
                let key = self.frame.pop();
                let JsValue::Object(o) = &obj else {
                    return Err(JsError::type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        key.display_hint(),
                        obj.display_hint()
                    )));
                };
                let key = self.to_property_key(&key)?;
                let r = self.has_property(o, &key)?;
                self.frame.push(JsValue::Bool(r));
            }
            Op::InstanceOf => {
                let target = self.frame.pop();
                let value = self.frame.pop();
                let r = self.instance_of(&value, &target)?;
                self.frame.push(JsValue::Bool(r));
            }
            Op::PrivateIn => {
                let obj = self.frame.pop();
                let name = private_name(&self.frame.pop())?;
                let JsValue::Object(o) = &obj else {
                    return Err(JsError::type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        name.description().cloned().unwrap_or_default(),
                        obj.display_hint()
                    )));
                };
                let r = o.borrow().private_element(&name).is_some();
                self.frame.push(JsValue::Bool(r));
            }
            Op::Neg => {
                let v = self.frame.pop();
                let r = match v {
                    JsValue::Int(i) if i != 0 => JsValue::int(-i),
                    other => JsValue::number(-self.to_number(&other)?),
                };
                self.frame.push(r);
            }
            Op::ToNumber => {
                let v = self.frame.pop();
                let n = self.to_number(&v)?;
                self.frame.push(JsValue::number(n));
            }
            Op::ToNumeric => {
                let v = self.frame.pop();
                let n = self.to_numeric(&v)?;
                self.frame.push(n);
            }
            Op::BitNot => {
                let v = self.frame.pop();
                let n = self.to_int32(&v)?;
                self.frame.push(JsValue::from(!n));
            }
            Op::Not => {
                let v = self.frame.pop();
                self.frame.push(JsValue::Bool(!v.to_boolean()));
            }
            Op::Typeof => {
                let v = self.frame.pop();
                self.frame.push(JsValue::from(v.type_of()));
            }
            Op::Inc | Op::Dec => {
                let v = self.frame.pop();
                let delta = if matches!(op, Op::Inc) { 1 } else { -1 };
                let r = self.increment(v, delta)?;
                self.frame.push(r);
            }
            Op::ToString => {
                let v = self.frame.pop();
                let s = self.to_string(&v)?;
                self.frame.push(JsValue::String(s));
            }
            Op::ToPropertyKey => {
                let v = self.frame.pop();
                let key = self.to_property_key(&v)?;
                self.frame.push(key.to_value());
            }
            Op::RequireObjectCoercible => {
                let v = self.frame.peek(0);
                if v.is_nullish() {
                    let shown = v.display_hint();
                    return Err(JsError::type_error(format!(
                        "Cannot destructure '{shown}' as it is {shown}."
                    )));
                }
            }

            // ───────────────────────────────────────────────────────────────
            // Control flow
            // ───────────────────────────────────────────────────────────────
            Op::Jump { target } => {
                if (target as usize) < self.frame.pc {
                    self.check_interrupt()?;
                    self.maybe_collect();
                }
                self.frame.pc = target as usize;
            }
            Op::JumpIfFalse { target } => {
                if !self.frame.pop().to_boolean() {
                    self.frame.pc = target as usize;
                }
            }
            Op::JumpIfTrue { target } => {
                if self.frame.pop().to_boolean() {
                    self.frame.pc = target as usize;
                }
            }
            Op::JumpIfFalseKeep { target } => {
                if self.frame.peek(0).to_boolean() {
                    self.frame.pop();
                } else {
                    self.frame.pc = target as usize;
                }
            }
            Op::JumpIfTrueKeep { target } => {
                if self.frame.peek(0).to_boolean() {
                    self.frame.pc = target as usize;
                } else {
                    self.frame.pop();
                }
            }
            Op::JumpIfNotNullishKeep { target } => {
                if self.frame.peek(0).is_nullish() {
                    self.frame.pop();
                } else {
                    self.frame.pc = target as usize;
                }
            }
            Op::JumpIfNullish { target, pop } => {
                if self.frame.peek(0).is_nullish() {
                    self.frame.pop_n(pop as usize);
                    self.frame.pc = target as usize;
                }
            }
            Op::JumpIfNotUndefined { target } => {
                if self.frame.peek(0).is_undefined() {
                    self.frame.pop();
                } else {
                    self.frame.pc = target as usize;
                }
            }
            Op::Break { target, stack, scopes } => {
                let pc = self.frame.current_pc();
                return self.do_break(pc, pc, target, stack, scopes);
            }
            Op::Return => {
                let v = self.frame.pop();
                return self.unwind_return(v, base);
            }
            Op::DerivedReturn { this } => {
                let v = self.frame.pop();
                let v = match v {
                    JsValue::Object(_) => v,
                    JsValue::Undefined => match self.read_slot(this) {
                        Some(t) => t,
                        None => return Err(Self::tdz_error(&JsString::from("this"))),
                    },
                    _ => {
                        return Err(JsError::type_error(
                            "Derived constructors may only return object or undefined",
                        ));
                    }
                };
                return self.unwind_return(v, base);
            }
            Op::Throw => {
                let v = self.frame.pop();
                return Err(JsError::Thrown(v));
            }
            Op::ThrowTypeError { message } => return Err(JsError::type_error(self.name(message).to_string())),
            Op::ThrowReferenceError { message } => {
                return Err(JsError::reference_error(self.name(message).to_string()));
            }
            Op::EndFinally => {
                let code = self.frame.pop();
                let value = self.frame.pop();
                let code = match code {
                    JsValue::Int(i) => i,
                    _ => completion::NORMAL,
                };
                match code {
                    completion::NORMAL => {}
                    completion::THROW => return Err(JsError::Thrown(value)),
                    completion::RETURN => return self.unwind_return(value, base),
                    break_pc if break_pc >= 0 => {
                        let break_pc = break_pc as usize;
                        if let Some(Op::Break { target, stack, scopes }) = self.frame.code.op(break_pc).cloned() {
                            let from = self.frame.current_pc();
                            return self.do_break(from, break_pc, target, stack, scopes);
                        }
                    }
                    _ => {}
                }
            }

            // ───────────────────────────────────────────────────────────────
            // Objects & properties
            // ───────────────────────────────────────────────────────────────
            Op::NewObject => {
                let obj = self.create_object();
                self.frame.push(JsValue::Object(obj));
            }
            Op::NewArray { capacity } => {
                let arr = self.create_array(Vec::with_capacity(capacity as usize));
                self.frame.push(JsValue::Object(arr));
            }
            Op::ArrayPush => {
                let v = self.frame.pop();
                let arr = self.frame.peek(0);
                self.array_append(&arr, v)?;
            }
            Op::ArrayHole => {
                if let JsValue::Object(arr) = self.frame.peek(0) {
                    let mut a = arr.borrow_mut();
                    let len = a.array_length().unwrap_or(0);
                    a.set_array_length(len.saturating_add(1));
                }
            }
            Op::ArraySpread => {
                let iterable = self.frame.pop();
                let arr = self.frame.peek(0);
                for v in self.iterate_to_vec(&iterable)? {
                    self.array_append(&arr, v)?;
                }
            }
            Op::GetProp { name, cache } => {
                let obj = self.frame.pop();
                let v = self.get_named(obj, name, cache)?;
                self.frame.push(v);
            }
            Op::SetProp { name, cache, strict } => {
                let v = self.frame.pop();
                let obj = self.frame.pop();
                self.set_named(obj, name, cache, v.clone(), strict)?;
                self.frame.push(v);
            }
            Op::GetElem => {
                let key = self.frame.pop();
                let obj = self.frame.pop();
                let v = self.get_element(&obj, &key)?;
                self.frame.push(v);
            }
            Op::SetElem { strict } => {
                let v = self.frame.pop();
                let key = self.frame.pop();
                let obj = self.frame.pop();
                if obj.is_nullish() {
                    return Err(JsError::type_error(format!(
                        "Cannot set properties of {} (setting '{}')",
                        obj.display_hint(),
                        key.display_hint()
                    )));
                }
                let key = self.to_property_key(&key)?;
                self.put_value(&obj, key, v.clone(), strict)?;
                self.frame.push(v);
            }
            Op::GetMethod { name, cache } => {
                let obj = self.frame.peek(0);
                let f = self.get_named(obj, name, cache)?;
                self.frame.push(f);
            }
            Op::GetElemMethod => {
                let key = self.frame.pop();
                let obj = self.frame.peek(0);
                let f = self.get_element(&obj, &key)?;
                self.frame.push(f);
            }
            Op::DeleteProp { name, strict } => {
                let obj = self.frame.pop();
                let key = PropertyKey::from(self.name(name));
                let r = self.delete_value(&obj, &key, strict)?;
                self.frame.push(JsValue::Bool(r));
            }
            Op::DeleteElem { strict } => {
                let key = self.frame.pop();
                let obj = self.frame.pop();
                if obj.is_nullish() {
                    return Err(JsError::type_error(format!(
                        "Cannot convert {} to object",
                        obj.display_hint()
                    )));
                }
                let key = self.to_property_key(&key)?;
                let r = self.delete_value(&obj, &key, strict)?;
                self.frame.push(JsValue::Bool(r));
            }
            Op::DefineField { name } => {
                let v = self.frame.pop();
                let obj = self.frame.peek(0);
                let key = PropertyKey::from(self.name(name));
                if let JsValue::Object(o) = &obj {
                    self.create_data_property_or_throw(o, key, v)?;
                }
            }
            Op::DefineElemField => {
                let v = self.frame.pop();
                let key = self.frame.pop();
                let obj = self.frame.peek(0);
                let key = self.to_property_key(&key)?;
                if let JsValue::Object(o) = &obj {
                    self.create_data_property_or_throw(o, key, v)?;
                }
            }
            Op::DefineMethod { kind, enumerable } => {
                let func = self.frame.pop();
                let key = self.frame.pop();
                if let JsValue::Object(o) = self.frame.peek(0) {
                    self.define_method(&o, key, func, kind, enumerable)?;
                }
            }
            Op::SetProto => {
                let proto = self.frame.pop();
                if let JsValue::Object(o) = self.frame.peek(0) {
                    match proto {
                        JsValue::Object(p) => o.borrow_mut().prototype = Some(p),
                        JsValue::Null => o.borrow_mut().prototype = None,
                        _ => {}
                    }
                }
            }
            Op::CopyDataProperties => {
                let source = self.frame.pop();
                if let JsValue::Object(target) = self.frame.peek(0) {
                    self.copy_data_properties(&target, &source, &[])?;
                }
            }
            Op::CopyRest { excluded } => {
                let keys = self.frame.pop_n(excluded as usize);
                let source = self.frame.pop();
                let mut excluded = Vec::with_capacity(keys.len());
                for k in &keys {
                    excluded.push(self.to_property_key(k)?);
                }
                let rest = self.create_object();
                self.copy_data_properties(&rest, &source, &excluded)?;
                self.frame.push(JsValue::Object(rest));
            }
            Op::SetFunctionName { prefix } => {
                let func = self.frame.peek(0);
                let key = self.frame.peek(1);
                let key = self.to_property_key(&key)?;
                let prefix = prefix.map(|p| self.name(p).to_string());
                self.set_function_name(&func, &key, prefix.as_deref());
            }

            // ───────────────────────────────────────────────────────────────
            // Calls
            // ───────────────────────────────────────────────────────────────
            Op::Call { argc } => {
                let args = self.frame.pop_n(argc as usize);
                let func = self.frame.pop();
                let this = self.frame.pop();
                return self.call_op(func, this, args);
            }
            Op::TailCall { argc } => {
                let args = self.frame.pop_n(argc as usize);
                let func = self.frame.pop();
                let this = self.frame.pop();
                return self.tail_call_op(func, this, args);
            }
            Op::CallSpread => {
                let args = self.frame.pop();
                let args = self.spread_values(&args)?;
                let func = self.frame.pop();
                let this = self.frame.pop();
                return self.call_op(func, this, args);
            }
            Op::New { argc } => {
                let args = self.frame.pop_n(argc as usize);
                let ctor = self.frame.pop();
                return self.new_op(ctor, args);
            }
            Op::NewSpread => {
                let args = self.frame.pop();
                let args = self.spread_values(&args)?;
                let ctor = self.frame.pop();
                return self.new_op(ctor, args);
            }
            Op::SuperCall => {
                let args = self.frame.pop();
                let args = self.spread_values(&args)?;
                let new_target = self.frame.pop();
                let func = self.frame.pop();
                let this = self.super_call(func, new_target, args)?;
                self.frame.push(this);
            }
            Op::BindThis { slot } => {
                let this = self.frame.pop();
                if self.read_slot(slot).is_some() {
                    return Err(JsError::reference_error("Super constructor may only be called once"));
                }
                self.write_slot(slot, Some(this));
            }
            Op::SuperGet => {
                let key = self.frame.pop();
                let func = self.frame.pop();
                let this = self.frame.pop();
                let key = self.to_property_key(&key)?;
                let v = match self.super_base(&func)? {
                    Some(proto) => self.get_with_receiver(&proto, &key, &this)?,
                    None => {
                        return Err(JsError::type_error(format!(
                            "Cannot read properties of null (reading '{key}')"
                        )));
                    }
                };
                self.frame.push(v);
            }
            Op::SuperSet { strict } => {
                let v = self.frame.pop();
                let key = self.frame.pop();
                let func = self.frame.pop();
                let this = self.frame.pop();
                let key = self.to_property_key(&key)?;
                let Some(proto) = self.super_base(&func)? else {
                    return Err(JsError::type_error(format!(
                        "Cannot set properties of null (setting '{key}')"
                    )));
                };
                let ok = self.set(&proto, key.clone(), v.clone(), &this)?;
                if !ok && strict {
                    return Err(JsError::type_error(format!(
                        "Cannot assign to read only property '{key}' of object"
                    )));
                }
                self.frame.push(v);
            }
            Op::Closure { idx } => {
                let Some(Constant::Function(code)) = self.frame.code.constant(idx).cloned() else {
                    return Err(JsError::type_error("Invalid function constant"));
                };
                let f = self.create_closure(code, self.frame.stash.clone());
                self.frame.push(JsValue::Object(f));
            }

            // ───────────────────────────────────────────────────────────────
            // Classes
            // ───────────────────────────────────────────────────────────────
            Op::CreateClass { idx, derived } => {
                let heritage = derived.then(|| self.frame.pop());
                let Some(Constant::Function(code)) = self.frame.code.constant(idx).cloned() else {
                    return Err(JsError::type_error("Invalid class constant"));
                };
                let (ctor, proto) = self.create_class(code, self.frame.stash.clone(), heritage)?;
                self.frame.push(JsValue::Object(ctor));
                self.frame.push(JsValue::Object(proto));
            }
            Op::DefineClassMethod { kind, is_static } => {
                let func = self.frame.pop();
                let key = self.frame.pop();
                let target = self.frame.peek(if is_static { 1 } else { 0 });
                if let JsValue::Object(t) = target {
                    self.define_method(&t, key, func, kind, false)?;
                }
            }
            Op::SetClassFields => {
                let init = self.frame.pop();
                let proto = self.frame.peek(0);
                let ctor = self.frame.peek(1);
                if let JsValue::Object(p) = &proto {
                    self.set_home_object(&init, p);
                }
                if let (JsValue::Object(c), JsValue::Object(i)) = (&ctor, &init) {
                    if let ObjectKind::Function(f) = &mut c.borrow_mut().kind {
                        if let JsFunction::Script(s) = f.as_mut() {
                            s.fields = Some(i.clone());
                        }
                    }
                }
            }
            Op::SetHomeObject => {
                let func = self.frame.pop();
                let home = self.frame.pop();
                if let JsValue::Object(h) = &home {
                    self.set_home_object(&func, h);
                }
                self.frame.push(func);
            }
            Op::NewPrivateName { name } => {
                let name = self.name(name);
                self.frame.push(JsValue::Symbol(JsSymbol::new_private(name)));
            }
            Op::AddPrivate { kind } => {
                let value = self.frame.pop();
                let name = self.frame.pop();
                let obj = self.frame.peek(0);
                self.add_private(&obj, &name, value, kind)?;
            }
            Op::GetPrivate => {
                let name = self.frame.pop();
                let obj = self.frame.pop();
                let v = self.get_private(&obj, &name)?;
                self.frame.push(v);
            }
            Op::SetPrivate => {
                let value = self.frame.pop();
                let name = self.frame.pop();
                let obj = self.frame.pop();
                self.set_private(&obj, &name, value.clone())?;
                self.frame.push(value);
            }

            // ───────────────────────────────────────────────────────────────
            // Iteration
            // ───────────────────────────────────────────────────────────────
            Op::GetIterator => {
                let v = self.frame.pop();
                let record = self.get_iterator(&v)?;
                self.frame.push(record.iterator);
                self.frame.push(record.next);
                self.frame.push(JsValue::Bool(false));
            }
            Op::GetAsyncIterator => {
                let v = self.frame.pop();
                let (iter, next) = self.get_async_iterator(&v)?;
                self.frame.push(iter);
                self.frame.push(next);
                self.frame.push(JsValue::Bool(false));
            }
            Op::IterStep { target } => match self.record_step()? {
                Some(v) => self.frame.push(v),
                None => self.frame.pc = target as usize,
            },
            Op::AsyncIterNext => {
                let next = self.frame.peek(1);
                let iter = self.frame.peek(2);
                let result = self.call_function(&next, iter, &[])?;
                self.frame.push(result);
            }
            Op::AsyncIterResult { target } => {
                let result = self.frame.pop();
                if !result.is_object() {
                    return Err(JsError::type_error(format!(
                        "Iterator result {} is not an object",
                        describe(&result)
                    )));
                }
                if self.get_value(&result, &PropertyKey::from("done"))?.to_boolean() {
                    self.frame.set_at_depth(0, JsValue::Bool(true));
                    self.frame.pc = target as usize;
                } else {
                    let v = self.get_value(&result, &PropertyKey::from("value"))?;
                    self.frame.push(v);
                }
            }
            Op::IterStepOrUndefined => {
                let v = self.record_step()?.unwrap_or_default();
                self.frame.push(v);
            }
            Op::IterRest => {
                let mut rest = Vec::new();
                while let Some(v) = self.record_step()? {
                    rest.push(v);
                }
                let arr = self.create_array(rest);
                self.frame.push(JsValue::Object(arr));
            }
            Op::IterClose => {
                let record = self.frame.pop_n(3);
                if let [iter, _, done] = record.as_slice() {
                    if !done.to_boolean() {
                        self.iterator_close(iter)?;
                    }
                }
            }
            Op::AsyncIterClose => {
                let done = self.frame.peek(0).to_boolean();
                let result = if done {
                    JsValue::Undefined
                } else {
                    self.frame.set_at_depth(0, JsValue::Bool(true));
                    let iter = self.frame.peek(2);
                    self.async_iterator_return(&iter)?
                };
                self.frame.push(result);
            }
            Op::ForInStart => {
                let v = self.frame.pop();
                let iter = iterator::create_for_in_iterator(self, &v)?;
                self.frame.push(JsValue::Object(iter));
            }
            Op::ForInNext { target } => {
                let JsValue::Object(iter) = self.frame.peek(0) else {
                    self.frame.pc = target as usize;
                    return Ok(Flow::Next);
                };
                match iterator::for_in_next(self, &iter)? {
                    Some(key) => self.frame.push(key),
                    None => self.frame.pc = target as usize,
                }
            }

            // ───────────────────────────────────────────────────────────────
            // Generators & async
            // ───────────────────────────────────────────────────────────────
            Op::GeneratorStart => return self.suspend(base, Suspend::Start),
            Op::Yield => {
                let v = self.frame.pop();
                return self.suspend(base, Suspend::Yield(v));
            }
            Op::YieldStar { target } => return self.yield_star(target, base),
            Op::Await => {
                let v = self.frame.pop();
                return self.suspend(base, Suspend::Await(v));
            }

            // ───────────────────────────────────────────────────────────────
            // Misc
            // ───────────────────────────────────────────────────────────────
            Op::RegExp { idx } => {
                let Some(Constant::RegExp { pattern, flags }) = self.frame.code.constant(idx).cloned() else {
                    return Err(JsError::type_error("Invalid regular expression constant"));
                };
                let re = regexp::create_regexp(self, &pattern, &flags)?;
                self.frame.push(JsValue::Object(re));
            }
            Op::TemplateObject { idx } => {
                let t = self.template_object(idx)?;
                self.frame.push(t);
            }
            Op::Debugger => tracing::debug!(pc = self.frame.current_pc(), "debugger statement"),
            Op::Nop => {}
        }
        Ok(Flow::Next)
    }

    /// `obj[key]` for any base value
    fn get_element(&mut self, obj: &JsValue, key: &JsValue) -> Result<JsValue, JsError> {
        if let (JsValue::Object(o), JsValue::Int(i)) = (obj, key) {
            if let Ok(index) = usize::try_from(*i) {
                let b = o.borrow();
                if matches!(b.kind, ObjectKind::Array(_)) {
                    if let Some(v) = b.elements.get(index) {
                        return Ok(v.clone());
                    }
                }
            }
        }
        if obj.is_nullish() {
            return Err(JsError::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                obj.display_hint(),
                key.display_hint()
            )));
        }
        let key = self.to_property_key(key)?;
        self.get_value(obj, &key)
    }

    fn alloc_stash(&self, stash: Stash) -> crate::gc::Gc<Stash> {
        self.heap.alloc(stash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::parser::ParserOptions;

    fn run(source: &str) -> Result<JsValue, JsError> {
        let mut interp = Interpreter::new(0, false);
        let program = compile(source, "test.js", false, &ParserOptions::default())?;
        interp.run_program(program.code.clone())
    }

    #[test]
    fn arithmetic_fast_paths_keep_negative_zero() {
        assert!(matches!(run("0 * -5"), Ok(JsValue::Float(f)) if f == 0.0 && f.is_sign_negative()));
        assert!(matches!(run("-4 % 2"), Ok(JsValue::Float(f)) if f.is_sign_negative()));
        assert_eq!(run("7 % 3").ok(), Some(JsValue::from(1)));
    }

    #[test]
    fn exponent_operator() {
        assert_eq!(run("2 ** 10").ok(), Some(JsValue::from(1024)));
        assert!(matches!(run("1 ** Infinity"), Ok(JsValue::Float(f)) if f.is_nan()));
    }

    #[test]
    fn finally_runs_on_break_and_return() {
        let source = "
            var log = [];
            function f() { try { return 'r'; } finally { log.push('f'); } }
            for (var i = 0; i < 3; i++) { try { if (i == 1) break; } finally { log.push(i); } }
            log.push(f());
            log.join(',')
        ";
        assert_eq!(run(source).ok(), Some(JsValue::from("0,1,f,r")));
    }

    #[test]
    fn uncaught_errors_leave_the_loop() {
        let result = run("null.x");
        assert!(matches!(result, Err(JsError::Thrown(_))));
    }
}
