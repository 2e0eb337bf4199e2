//! Call frames
//!
//! A frame is the activation of one `FunctionCode`: its operand stack, its
//! non-captured locals and the stash chain. Suspended generator and async
//! frames are moved into their generator objects and traced from there.

use std::sync::Arc;

use crate::compiler::FunctionCode;
use crate::gc::{Gc, Tracer};
use crate::interpreter::stash::Stash;
use crate::object::JsObjectRef;
use crate::value::JsValue;

/// How a suspended frame continues
#[derive(Debug, Clone)]
pub enum Resume {
    /// Push the value as the result of `yield`/`await`
    Next(JsValue),
    /// Throw at the suspension point
    Throw(JsValue),
    /// Return from the suspension point, running `finally` blocks
    Return(JsValue),
}

/// What a `yield*` delegation forwards to the inner iterator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMode {
    Next,
    Throw,
    Return,
}

pub struct Frame {
    pub code: Arc<FunctionCode>,
    /// Index of the next instruction
    pub pc: usize,
    pub stack: Vec<JsValue>,
    /// `None` marks an uninitialized lexical binding
    pub locals: Vec<Option<JsValue>>,
    pub stash: Option<Gc<Stash>>,
    /// Stashes pushed by this frame on top of the closure's
    pub scope_depth: u32,
    pub this: JsValue,
    pub callee: Option<JsObjectRef>,
    pub new_target: JsValue,
    pub args: Vec<JsValue>,
    /// Running as `[[Construct]]`: non-object returns yield `this`
    pub construct: bool,
    /// Set while suspended; consumed when the run loop picks the frame up
    pub resume: Option<Resume>,
    /// Delegation mode for the `yield*` at `pc - 1`
    pub resume_mode: ResumeMode,
    /// An async `yield*` is waiting for the inner result promise
    pub star_awaiting: bool,
}

impl Frame {
    pub fn new(code: Arc<FunctionCode>, stash: Option<Gc<Stash>>) -> Self {
        let locals = vec![None; code.local_count as usize];
        Frame {
            code,
            pc: 0,
            stack: Vec::with_capacity(8),
            locals,
            stash,
            scope_depth: 0,
            this: JsValue::Undefined,
            callee: None,
            new_target: JsValue::Undefined,
            args: Vec::new(),
            construct: false,
            resume: None,
            resume_mode: ResumeMode::Next,
            star_awaiting: false,
        }
    }

    #[inline]
    pub fn push(&mut self, v: JsValue) {
        self.stack.push(v);
    }

    #[inline]
    pub fn pop(&mut self) -> JsValue {
        self.stack.pop().unwrap_or_default()
    }

    /// Value `depth` items below the top
    #[inline]
    pub fn peek(&self, depth: usize) -> JsValue {
        self.stack
            .len()
            .checked_sub(depth + 1)
            .and_then(|i| self.stack.get(i))
            .cloned()
            .unwrap_or_default()
    }

    /// Pop `n` values in push order
    pub fn pop_n(&mut self, n: usize) -> Vec<JsValue> {
        let at = self.stack.len().saturating_sub(n);
        self.stack.split_off(at)
    }

    /// Overwrite the value `depth` items below the top
    pub fn set_at_depth(&mut self, depth: usize, v: JsValue) {
        if let Some(i) = self.stack.len().checked_sub(depth + 1) {
            if let Some(slot) = self.stack.get_mut(i) {
                *slot = v;
            }
        }
    }

    /// Pc of the instruction being executed
    #[inline]
    pub fn current_pc(&self) -> usize {
        self.pc.saturating_sub(1)
    }

    pub fn trace(&self, t: &mut Tracer<'_>) {
        t.values(&self.stack);
        for v in self.locals.iter().flatten() {
            t.value(v);
        }
        if let Some(s) = &self.stash {
            t.edge(s);
        }
        t.value(&self.this);
        t.object(&self.callee);
        t.value(&self.new_target);
        t.values(&self.args);
        match &self.resume {
            Some(Resume::Next(v) | Resume::Throw(v) | Resume::Return(v)) => t.value(v),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::parser::ParserOptions;

    fn frame() -> Option<Frame> {
        let program = compile("1", "test.js", false, &ParserOptions::default()).ok()?;
        Some(Frame::new(program.code.clone(), None))
    }

    #[test]
    fn stack_helpers() {
        let Some(mut f) = frame() else {
            panic!("compile failed");
        };
        f.push(JsValue::from(1));
        f.push(JsValue::from(2));
        f.push(JsValue::from(3));
        assert_eq!(f.peek(0), JsValue::from(3));
        assert_eq!(f.peek(2), JsValue::from(1));
        f.set_at_depth(1, JsValue::from(9));
        assert_eq!(f.pop_n(2), vec![JsValue::from(9), JsValue::from(3)]);
        assert_eq!(f.pop(), JsValue::from(1));
        assert_eq!(f.pop(), JsValue::Undefined);
    }
}
