//! BytecodeBuilder - helper for emitting bytecode instructions
//!
//! Owns the instruction vector of one function while it is compiled:
//! constant pool with deduplication, jump patching, the line table, the
//! handler table and inline cache allocation.

use std::sync::Arc;
use std::sync::atomic::AtomicU32;

use rustc_hash::FxHashMap;

use super::bytecode::{
    Constant, ConstantIndex, FunctionCode, FunctionFlags, Handler, HandlerKind, JumpTarget,
    LineEntry, Op, SourceInfo,
};
use crate::ast::FunctionKind;
use crate::error::JsError;
use crate::lexer::Span;
use crate::string::JsString;

/// Placeholder for a jump that needs to be patched later
#[derive(Debug, Clone, Copy)]
pub struct JumpPlaceholder {
    /// Index of the jump instruction in the code
    pub instruction_index: usize,
}

/// Builder for one function body
pub struct BytecodeBuilder {
    /// Bytecode instructions
    code: Vec<Op>,

    /// Constant pool
    constants: Vec<Constant>,

    /// String constant deduplication map
    string_map: FxHashMap<JsString, ConstantIndex>,

    /// Number constant deduplication map
    number_map: FxHashMap<u64, ConstantIndex>,

    /// Exception and cleanup regions, innermost first
    handlers: Vec<Handler>,

    /// Position table
    lines: Vec<LineEntry>,

    /// Current source span
    current_span: Option<Span>,

    /// Number of inline cache sites handed out
    cache_count: u32,
}

/// Everything about a function besides its code
pub struct FunctionMeta {
    pub name: JsString,
    pub kind: FunctionKind,
    pub flags: FunctionFlags,
    pub length: u32,
    pub local_count: u32,
    pub source: Arc<SourceInfo>,
    pub span: Span,
}

impl BytecodeBuilder {
    /// Create a new bytecode builder
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            constants: Vec::new(),
            string_map: FxHashMap::default(),
            number_map: FxHashMap::default(),
            handlers: Vec::new(),
            lines: Vec::new(),
            current_span: None,
            cache_count: 0,
        }
    }

    /// Set the current source span for the position table
    pub fn set_span(&mut self, span: Span) {
        self.current_span = Some(span);
    }

    /// Emit an instruction and return its index
    pub fn emit(&mut self, op: Op) -> usize {
        let index = self.code.len();

        if let Some(span) = self.current_span {
            // Only add if different from the last entry
            let should_add = self
                .lines
                .last()
                .is_none_or(|e| e.line != span.line || e.column != span.column);
            if should_add {
                self.lines.push(LineEntry {
                    pc: index as u32,
                    line: span.line,
                    column: span.column,
                });
            }
        }

        self.code.push(op);
        index
    }

    /// Emit a jump-like instruction whose target is patched later
    pub fn emit_jump(&mut self, op: Op) -> JumpPlaceholder {
        let index = self.emit(op);
        JumpPlaceholder {
            instruction_index: index,
        }
    }

    /// Emit a jump to a known target
    pub fn emit_jump_to(&mut self, target: usize) {
        self.emit(Op::Jump {
            target: target as JumpTarget,
        });
    }

    /// Patch a jump placeholder to jump to the current position
    pub fn patch_jump(&mut self, placeholder: JumpPlaceholder) {
        let target = self.code.len() as JumpTarget;
        self.patch_jump_to(placeholder, target);
    }

    /// Patch a jump placeholder to jump to a specific target
    pub fn patch_jump_to(&mut self, placeholder: JumpPlaceholder, target: JumpTarget) {
        if let Some(op) = self.code.get_mut(placeholder.instruction_index) {
            match op {
                Op::Jump { target: t }
                | Op::JumpIfFalse { target: t }
                | Op::JumpIfTrue { target: t }
                | Op::JumpIfFalseKeep { target: t }
                | Op::JumpIfTrueKeep { target: t }
                | Op::JumpIfNotNullishKeep { target: t }
                | Op::JumpIfNullish { target: t, .. }
                | Op::JumpIfNotUndefined { target: t }
                | Op::Break { target: t, .. }
                | Op::WithGet { target: t, .. }
                | Op::WithGetMethod { target: t, .. }
                | Op::WithSet { target: t, .. }
                | Op::IterStep { target: t }
                | Op::AsyncIterResult { target: t }
                | Op::ForInNext { target: t }
                | Op::YieldStar { target: t } => *t = target,
                _ => {}
            }
        }
    }

    /// Get the current instruction offset (for jump targets)
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Add a string constant to the pool (with deduplication)
    pub fn add_string(&mut self, s: JsString) -> Result<ConstantIndex, JsError> {
        if let Some(&idx) = self.string_map.get(&s) {
            return Ok(idx);
        }

        let idx = self.add_constant(Constant::String(s.clone()))?;
        self.string_map.insert(s, idx);
        Ok(idx)
    }

    /// Add a string constant from a `&str`
    pub fn add_str(&mut self, s: &str) -> Result<ConstantIndex, JsError> {
        self.add_string(JsString::from(s))
    }

    /// Add a number constant to the pool (with deduplication)
    pub fn add_number(&mut self, n: f64) -> Result<ConstantIndex, JsError> {
        let bits = n.to_bits();
        if let Some(&idx) = self.number_map.get(&bits) {
            return Ok(idx);
        }

        let idx = self.add_constant(Constant::Number(n))?;
        self.number_map.insert(bits, idx);
        Ok(idx)
    }

    /// Add a constant to the pool
    pub fn add_constant(&mut self, constant: Constant) -> Result<ConstantIndex, JsError> {
        if self.constants.len() >= u32::MAX as usize {
            return Err(JsError::range_error("Too many constants in one function"));
        }

        let idx = self.constants.len() as ConstantIndex;
        self.constants.push(constant);
        Ok(idx)
    }

    /// Add a nested function body
    pub fn add_function(&mut self, code: FunctionCode) -> Result<ConstantIndex, JsError> {
        self.add_constant(Constant::Function(Arc::new(code)))
    }

    /// Emit a push of a string constant
    pub fn emit_string(&mut self, s: JsString) -> Result<(), JsError> {
        let idx = self.add_string(s)?;
        self.emit(Op::Const { idx });
        Ok(())
    }

    /// Emit a push of a number
    pub fn emit_number(&mut self, n: f64) -> Result<(), JsError> {
        // Small integers skip the constant pool; -0 must not
        if n.fract() == 0.0
            && n >= f64::from(i32::MIN)
            && n <= f64::from(i32::MAX)
            && !(n == 0.0 && n.is_sign_negative())
        {
            self.emit(Op::Int { value: n as i32 });
            return Ok(());
        }

        let idx = self.add_number(n)?;
        self.emit(Op::Const { idx });
        Ok(())
    }

    /// Hand out a fresh inline cache site
    pub fn alloc_cache(&mut self) -> u32 {
        let c = self.cache_count;
        self.cache_count += 1;
        c
    }

    /// Register a protected region ending at the current offset
    pub fn add_handler(
        &mut self,
        start: usize,
        target: usize,
        kind: HandlerKind,
        stack: u32,
        scopes: u32,
    ) {
        let end = self.code.len();
        self.add_handler_range(start, end, target, kind, stack, scopes);
    }

    /// Register a protected region `[start, end)`
    pub fn add_handler_range(
        &mut self,
        start: usize,
        end: usize,
        target: usize,
        kind: HandlerKind,
        stack: u32,
        scopes: u32,
    ) {
        if start >= end {
            return;
        }
        self.handlers.push(Handler {
            start: start as u32,
            end: end as u32,
            target: target as u32,
            kind,
            stack,
            scopes,
        });
    }

    /// Last emitted instruction
    pub fn last_op(&self) -> Option<&Op> {
        self.code.last()
    }

    /// Finish building and return the function body
    pub fn finish(self, meta: FunctionMeta) -> FunctionCode {
        let caches = (0..self.cache_count)
            .map(|_| AtomicU32::new(u32::MAX))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        FunctionCode {
            name: meta.name,
            kind: meta.kind,
            flags: meta.flags,
            length: meta.length,
            code: self.code,
            constants: self.constants,
            handlers: self.handlers,
            lines: self.lines,
            local_count: meta.local_count,
            caches,
            source: meta.source,
            span: meta.span,
        }
    }
}

impl Default for BytecodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_deduplicated() {
        let mut b = BytecodeBuilder::new();
        let a = b.add_str("x").unwrap_or_default();
        let c = b.add_str("x").unwrap_or_default();
        let n1 = b.add_number(1.5).unwrap_or_default();
        let n2 = b.add_number(1.5).unwrap_or_default();
        assert_eq!(a, c);
        assert_eq!(n1, n2);
        assert_ne!(a, n1);
    }

    #[test]
    fn jumps_are_patched() {
        let mut b = BytecodeBuilder::new();
        let j = b.emit_jump(Op::JumpIfFalse { target: 0 });
        b.emit(Op::Nop);
        b.patch_jump(j);
        assert!(matches!(b.code.first(), Some(Op::JumpIfFalse { target: 2 })));
    }

    #[test]
    fn negative_zero_uses_the_pool() {
        let mut b = BytecodeBuilder::new();
        b.emit_number(-0.0).unwrap_or_default();
        b.emit_number(7.0).unwrap_or_default();
        assert!(matches!(b.code.first(), Some(Op::Const { .. })));
        assert!(matches!(b.code.get(1), Some(Op::Int { value: 7 })));
    }
}
