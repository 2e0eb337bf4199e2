//! Bytecode instruction set and program format
//!
//! The VM is stack based: every instruction pops its operands from the
//! frame's operand stack and pushes its result. Stack effects are noted as
//! `[inputs] -> [outputs]` with the top of the stack on the right.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::ast::FunctionKind;
use crate::lexer::Span;
use crate::sourcemap::SourceMap;
use crate::string::JsString;

/// Constant pool index
pub type ConstantIndex = u32;

/// Jump target (instruction offset)
pub type JumpTarget = u32;

/// Where a resolved binding lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Frame-local slot; never visible to closures
    Local(u32),
    /// Slot `index` of the stash `depth` links up the current scope chain
    Stash { depth: u32, index: u32 },
}

/// How a private element is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivateKind {
    Field,
    Method,
    Getter,
    Setter,
}

/// Class element kind for `DefineClassMethod` and object literal accessors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
}

/// Completion codes carried to `EndFinally`. Codes at or above `JUMP` are
/// the pc of the `Break` that started the jump.
pub mod completion {
    pub const NORMAL: i64 = -1;
    pub const THROW: i64 = -2;
    pub const RETURN: i64 = -3;
}

/// Bytecode instruction
#[derive(Debug, Clone)]
pub enum Op {
    // ═══════════════════════════════════════════════════════════════════════════════
    // Constants & Stack
    // ═══════════════════════════════════════════════════════════════════════════════
    /// [] -> [undefined]
    Undefined,
    Null,
    True,
    False,
    /// Small integer without the constant pool
    Int { value: i32 },
    /// [] -> [constants[idx]] (numbers and strings)
    Const { idx: ConstantIndex },
    /// [a] -> [a, a]
    Dup,
    /// [a, b] -> [a, b, a, b]
    Dup2,
    /// [a] -> []
    Pop,
    /// [a, b] -> [b, a]
    Swap,
    /// [a, b, c] -> [c, a, b]
    Rot3,
    /// [a, b, c, d] -> [d, a, b, c]
    Rot4,
    /// Copy the value `depth` items below the top: `Pick { depth: 0 }` is `Dup`
    Pick { depth: u32 },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Bindings & Scopes
    // ═══════════════════════════════════════════════════════════════════════════════
    /// [] -> [value]; the binding is known to be initialized
    Load { slot: Slot },
    /// [] -> [value]; throws ReferenceError in the TDZ
    LoadChecked { slot: Slot, name: ConstantIndex },
    /// [value] -> []
    Store { slot: Slot },
    /// [value] -> []; throws ReferenceError in the TDZ
    StoreChecked { slot: Slot, name: ConstantIndex },
    /// [value] -> []; first initialization of a lexical binding
    Init { slot: Slot },
    /// Put a lexical binding back into its TDZ
    Clear { slot: Slot },
    /// Throw `TypeError: Assignment to constant variable.`
    ThrowConstAssign { name: ConstantIndex },
    /// Enter a scope whose bindings are captured by closures
    PushScope { size: u32 },
    PopScope,
    /// Replace the current stash with a copy (per-iteration `let` bindings)
    CopyScope,

    // ═══════════════════════════════════════════════════════════════════════════════
    // Globals
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Instantiate a script's top-level declarations (`Constant::GlobalDecls`)
    DeclareGlobals { idx: ConstantIndex },
    /// [] -> [value]; ReferenceError when unresolvable
    GetGlobal { name: ConstantIndex },
    /// [] -> [typeof value]; never throws for unresolvable names
    TypeofGlobal { name: ConstantIndex },
    /// [value] -> [value]
    SetGlobal { name: ConstantIndex, strict: bool },
    /// [value] -> []; initialize a top-level `let`/`const`/`class`
    InitGlobalLex { name: ConstantIndex },
    /// [] -> [bool]
    DeleteGlobal { name: ConstantIndex },

    // ═══════════════════════════════════════════════════════════════════════════════
    // With
    // ═══════════════════════════════════════════════════════════════════════════════
    /// [obj] -> [value] and jump, or [] and fall through when `obj` has no
    /// unscopable `name`
    WithGet { name: ConstantIndex, target: JumpTarget },
    /// [obj] -> [obj, fn] and jump, or [] and fall through
    WithGetMethod { name: ConstantIndex, target: JumpTarget },
    /// [value, obj] -> [value] after assigning and jump, or [value] and
    /// fall through
    WithSet { name: ConstantIndex, target: JumpTarget, strict: bool },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Frame
    // ═══════════════════════════════════════════════════════════════════════════════
    This,
    GlobalThis,
    NewTarget,
    /// The running function object
    Callee,
    /// [] -> [argument i or undefined]
    Arg { index: u32 },
    /// [] -> [array of arguments from `from`]
    RestArgs { from: u32 },
    /// [] -> [unmapped arguments object]
    CreateArguments,

    // ═══════════════════════════════════════════════════════════════════════════════
    // Operators
    // ═══════════════════════════════════════════════════════════════════════════════
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// [key, obj] -> [bool]
    In,
    InstanceOf,
    /// [sym, obj] -> [bool]
    PrivateIn,
    Neg,
    /// Unary `+`
    ToNumber,
    /// ToNumeric, used before `++`/`--`
    ToNumeric,
    BitNot,
    Not,
    Typeof,
    Inc,
    Dec,
    /// [value] -> [string] for template substitutions
    ToString,
    /// [value] -> [property key value]
    ToPropertyKey,
    /// Throw TypeError unless the top of the stack is an object coercible
    /// value
    RequireObjectCoercible,

    // ═══════════════════════════════════════════════════════════════════════════════
    // Control Flow
    // ═══════════════════════════════════════════════════════════════════════════════
    Jump { target: JumpTarget },
    /// [cond] -> []
    JumpIfFalse { target: JumpTarget },
    JumpIfTrue { target: JumpTarget },
    /// `&&`: keep the value and jump when falsy, otherwise pop it
    JumpIfFalseKeep { target: JumpTarget },
    /// `||`: keep the value and jump when truthy, otherwise pop it
    JumpIfTrueKeep { target: JumpTarget },
    /// `??`: keep the value and jump when not nullish, otherwise pop it
    JumpIfNotNullishKeep { target: JumpTarget },
    /// Optional chains: when the top is nullish pop `pop` values and jump
    JumpIfNullish { target: JumpTarget, pop: u32 },
    /// Defaults: keep the value and jump unless it is undefined
    JumpIfNotUndefined { target: JumpTarget },
    /// `break`/`continue` that may leave `finally` or iterator regions;
    /// trims the operand stack and scope chain to the target's depth
    Break { target: JumpTarget, stack: u32, scopes: u32 },
    /// [value] -> (returns)
    Return,
    /// [value] -> (returns): derived constructor return check
    DerivedReturn { this: Slot },
    /// [value] -> (throws)
    Throw,
    ThrowTypeError { message: ConstantIndex },
    ThrowReferenceError { message: ConstantIndex },
    /// [value, code] -> []: resume the completion that entered `finally`
    EndFinally,

    // ═══════════════════════════════════════════════════════════════════════════════
    // Objects & Properties
    // ═══════════════════════════════════════════════════════════════════════════════
    NewObject,
    NewArray { capacity: u32 },
    /// [arr, value] -> [arr]
    ArrayPush,
    /// [arr] -> [arr] with a hole appended
    ArrayHole,
    /// [arr, iterable] -> [arr]
    ArraySpread,
    /// [obj] -> [value]
    GetProp { name: ConstantIndex, cache: u32 },
    /// [obj, value] -> [value]
    SetProp { name: ConstantIndex, cache: u32, strict: bool },
    /// [obj, key] -> [value]
    GetElem,
    /// [obj, key, value] -> [value]
    SetElem { strict: bool },
    /// [obj] -> [obj, fn]
    GetMethod { name: ConstantIndex, cache: u32 },
    /// [obj, key] -> [obj, fn]
    GetElemMethod,
    /// [obj] -> [bool]
    DeleteProp { name: ConstantIndex, strict: bool },
    /// [obj, key] -> [bool]
    DeleteElem { strict: bool },
    /// [obj, value] -> [obj]: CreateDataProperty
    DefineField { name: ConstantIndex },
    /// [obj, key, value] -> [obj]
    DefineElemField,
    /// [obj, key, fn] -> [obj]: object literal method or accessor; sets the
    /// home object and function name
    DefineMethod { kind: MethodKind, enumerable: bool },
    /// [obj, proto] -> [obj]: `__proto__: value` in literals
    SetProto,
    /// [target, source] -> [target]: object spread
    CopyDataProperties,
    /// [source, key1 .. keyN] -> [rest]: object rest excluding the keys
    CopyRest { excluded: u32 },
    /// [key, fn] -> [key, fn]: name an anonymous function after a computed key
    SetFunctionName { prefix: Option<ConstantIndex> },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Calls
    // ═══════════════════════════════════════════════════════════════════════════════
    /// [this, fn, arg1 .. argN] -> [result]
    Call { argc: u32 },
    /// [this, fn, arg1 .. argN] -> [result]: call in return position. A
    /// script callee takes over the running frame when nothing in this
    /// frame still has to run after it.
    TailCall { argc: u32 },
    /// [this, fn, args] -> [result]
    CallSpread,
    /// [ctor, arg1 .. argN] -> [object]
    New { argc: u32 },
    /// [ctor, args] -> [object]
    NewSpread,
    /// [func, new_target, args] -> [this]: `super(...)` from constructor
    /// `func`; runs `func`'s field initializers on the new object
    SuperCall,
    /// [this] -> []: bind `this` after `super()`, throwing if already bound
    BindThis { slot: Slot },
    /// [this, func, key] -> [value]
    SuperGet,
    /// [this, func, key, value] -> [value]
    SuperSet { strict: bool },
    /// [] -> [closure]
    Closure { idx: ConstantIndex },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Classes
    // ═══════════════════════════════════════════════════════════════════════════════
    /// [heritage?] -> [ctor, proto]
    CreateClass { idx: ConstantIndex, derived: bool },
    /// [ctor, proto, key, fn] -> [ctor, proto]
    DefineClassMethod { kind: MethodKind, is_static: bool },
    /// [ctor, proto, init] -> [ctor, proto]: instance field initializer
    SetClassFields,
    /// [home, fn] -> [fn]: method defined outside a property slot
    SetHomeObject,
    /// [] -> [private name]
    NewPrivateName { name: ConstantIndex },
    /// [obj, name, value] -> [obj]
    AddPrivate { kind: PrivateKind },
    /// [obj, name] -> [value]
    GetPrivate,
    /// [obj, name, value] -> [value]
    SetPrivate,

    // ═══════════════════════════════════════════════════════════════════════════════
    // Iteration
    // ═══════════════════════════════════════════════════════════════════════════════
    /// [obj] -> [iter, next, done=false]
    GetIterator,
    GetAsyncIterator,
    /// [iter, next, done] -> [iter, next, done, value], or jump to `target`
    /// leaving the record when the iterator is exhausted
    IterStep { target: JumpTarget },
    /// [iter, next, done] -> [iter, next, done, result]: async `next()` call
    /// whose result still needs awaiting
    AsyncIterNext,
    /// [iter, next, done, result] -> [iter, next, done, value], or jump when
    /// the result is done
    AsyncIterResult { target: JumpTarget },
    /// [iter, next, done] -> [iter, next, done, value|undefined]
    IterStepOrUndefined,
    /// [iter, next, done] -> [iter, next, true, array]
    IterRest,
    /// [iter, next, done] -> []: call `return()` unless done
    IterClose,
    /// [iter, next, done] -> [iter, next, done, promise|undefined]: async
    /// `return()` call
    AsyncIterClose,
    /// [obj] -> [for-in iterator]
    ForInStart,
    /// [iter] -> [iter, key], or jump leaving [iter] when exhausted
    ForInNext { target: JumpTarget },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Generators & Async
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Suspend right after argument binding; the call returns the generator
    GeneratorStart,
    /// [value] -> [received]
    Yield,
    /// [iter, next, done, received] -> [iter, next, done, value] with a jump
    /// to `target` once the delegate completes, otherwise suspends yielding
    /// the inner result
    YieldStar { target: JumpTarget },
    /// [value] -> [resolved]
    Await,

    // ═══════════════════════════════════════════════════════════════════════════════
    // Misc
    // ═══════════════════════════════════════════════════════════════════════════════
    /// [] -> [regexp]
    RegExp { idx: ConstantIndex },
    /// [] -> [frozen template object]
    TemplateObject { idx: ConstantIndex },
    Debugger,
    Nop,
}

/// Constants that can be stored in the pool
#[derive(Debug, Clone)]
pub enum Constant {
    Number(f64),
    String(JsString),
    /// Nested function body
    Function(Arc<FunctionCode>),
    RegExp { pattern: JsString, flags: JsString },
    /// Tagged template strings; `None` marks an invalid escape
    Template {
        cooked: Vec<Option<JsString>>,
        raw: Vec<JsString>,
    },
    /// Top-level declarations of a script
    GlobalDecls(GlobalDecls),
}

/// Declarations a script adds to the global scope
#[derive(Debug, Clone, Default)]
pub struct GlobalDecls {
    pub vars: Vec<JsString>,
    pub functions: Vec<JsString>,
    /// (name, is_const)
    pub lexical: Vec<(JsString, bool)>,
}

/// Region kinds in the handler table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Jump to `target` with the exception on the stack
    Catch,
    /// Jump to `target` with `[value, completion code]` on the stack
    Finally,
    /// The iterator record sits at `stack - 3`; close it on the way out
    IterClose,
    /// Like `IterClose` for an async iterator; awaits `return()`
    AsyncIterClose,
}

/// Exception handler table entry
#[derive(Debug, Clone, Copy)]
pub struct Handler {
    pub start: u32,
    pub end: u32,
    pub target: u32,
    pub kind: HandlerKind,
    /// Operand stack height inside the protected region
    pub stack: u32,
    /// Stash depth inside the protected region
    pub scopes: u32,
}

impl Handler {
    #[inline]
    pub fn covers(&self, pc: u32) -> bool {
        self.start <= pc && pc < self.end
    }
}

/// Source position table entry
#[derive(Debug, Clone, Copy)]
pub struct LineEntry {
    pub pc: u32,
    pub line: u32,
    pub column: u32,
}

/// Function flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionFlags(u16);

impl FunctionFlags {
    pub const STRICT: u16 = 1;
    pub const ARROW: u16 = 1 << 1;
    pub const GENERATOR: u16 = 1 << 2;
    pub const ASYNC: u16 = 1 << 3;
    pub const CONSTRUCTOR: u16 = 1 << 4;
    pub const CLASS_CONSTRUCTOR: u16 = 1 << 5;
    pub const DERIVED: u16 = 1 << 6;
    pub const METHOD: u16 = 1 << 7;
    /// Top-level code of a script
    pub const SCRIPT: u16 = 1 << 8;

    pub fn new(bits: u16) -> Self {
        FunctionFlags(bits)
    }

    #[inline]
    pub fn has(self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    pub fn set(&mut self, bit: u16) {
        self.0 |= bit;
    }

    pub fn is_strict(self) -> bool {
        self.has(Self::STRICT)
    }

    pub fn is_arrow(self) -> bool {
        self.has(Self::ARROW)
    }

    pub fn is_generator(self) -> bool {
        self.has(Self::GENERATOR)
    }

    pub fn is_async(self) -> bool {
        self.has(Self::ASYNC)
    }

    /// Ordinary `function` declarations and expressions can be `new`ed
    pub fn is_constructor(self) -> bool {
        self.has(Self::CONSTRUCTOR)
    }

    pub fn is_class_constructor(self) -> bool {
        self.has(Self::CLASS_CONSTRUCTOR)
    }

    pub fn is_derived(self) -> bool {
        self.has(Self::DERIVED)
    }
}

/// Source identity shared by every function of one compilation
#[derive(Debug)]
pub struct SourceInfo {
    pub name: String,
    pub source_map: Option<SourceMap>,
}

/// A compiled function body
#[derive(Debug)]
pub struct FunctionCode {
    pub name: JsString,
    pub kind: FunctionKind,
    pub flags: FunctionFlags,
    /// Value of the `length` property
    pub length: u32,
    pub code: Vec<Op>,
    pub constants: Vec<Constant>,
    /// Innermost regions first
    pub handlers: Vec<Handler>,
    pub lines: Vec<LineEntry>,
    pub local_count: u32,
    /// Inline caches: last property table index seen by each property access
    pub caches: Box<[AtomicU32]>,
    pub source: Arc<SourceInfo>,
    pub span: Span,
}

impl FunctionCode {
    #[inline]
    pub fn op(&self, pc: usize) -> Option<&Op> {
        self.code.get(pc)
    }

    #[inline]
    pub fn constant(&self, idx: ConstantIndex) -> Option<&Constant> {
        self.constants.get(idx as usize)
    }

    /// String constant, or the empty string
    pub fn string(&self, idx: ConstantIndex) -> JsString {
        match self.constants.get(idx as usize) {
            Some(Constant::String(s)) => s.clone(),
            _ => JsString::empty(),
        }
    }

    /// Source position of the instruction at `pc`
    pub fn position(&self, pc: usize) -> Option<(u32, u32)> {
        let pc = pc as u32;
        let idx = self.lines.partition_point(|e| e.pc <= pc);
        let entry = idx.checked_sub(1).and_then(|i| self.lines.get(i))?;
        Some((entry.line, entry.column))
    }

    /// Cached property table index for site `cache`
    #[inline]
    pub fn cache_get(&self, cache: u32) -> Option<usize> {
        let v = self.caches.get(cache as usize)?.load(Ordering::Relaxed);
        (v != u32::MAX).then_some(v as usize)
    }

    #[inline]
    pub fn cache_set(&self, cache: u32, index: usize) {
        if let Some(slot) = self.caches.get(cache as usize) {
            slot.store(index as u32, Ordering::Relaxed);
        }
    }

    /// Functions nested directly in this one
    pub fn nested(&self) -> impl Iterator<Item = &Arc<FunctionCode>> {
        self.constants.iter().filter_map(|c| match c {
            Constant::Function(f) => Some(f),
            _ => None,
        })
    }
}

/// A compiled script. Immutable and shareable across runtimes.
#[derive(Debug)]
pub struct Program {
    pub(crate) code: Arc<FunctionCode>,
    pub(crate) strict: bool,
}

impl Program {
    pub fn source_name(&self) -> &str {
        &self.code.source.name
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Top-level code
    pub fn code(&self) -> &FunctionCode {
        &self.code
    }

    /// Number of functions in the program, including the top level
    pub fn function_count(&self) -> usize {
        fn count(f: &FunctionCode) -> usize {
            1 + f.nested().map(|n| count(n)).sum::<usize>()
        }
        count(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(start: u32, end: u32) -> Handler {
        Handler {
            start,
            end,
            target: end,
            kind: HandlerKind::Catch,
            stack: 0,
            scopes: 0,
        }
    }

    #[test]
    fn handler_range_is_half_open() {
        let h = handler(2, 5);
        assert!(!h.covers(1));
        assert!(h.covers(2));
        assert!(h.covers(4));
        assert!(!h.covers(5));
    }

    #[test]
    fn flags() {
        let mut f = FunctionFlags::new(FunctionFlags::STRICT);
        f.set(FunctionFlags::GENERATOR);
        assert!(f.is_strict());
        assert!(f.is_generator());
        assert!(!f.is_constructor());
    }
}
