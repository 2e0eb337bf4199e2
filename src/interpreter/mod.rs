//! Interpreter: the state of one runtime and the helpers shared by the VM
//! loop and the built-ins.
//!
//! Execution itself lives in `vm` (the dispatch loop), `call` (function
//! objects and calls), `generator` (suspendable frames) and `ops` (abstract
//! operations on values and objects).

pub mod builtins;
pub mod call;
pub mod frame;
pub mod generator;
pub mod ops;
pub mod realm;
pub mod stash;
mod vm;

use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::ast::FunctionKind;
use crate::bridge::FieldNameMapper;
use crate::compiler::{BytecodeBuilder, FunctionCode, FunctionFlags, FunctionMeta, SourceInfo};
use crate::error::{Exception, InterruptValue, Interrupted, JsError, StackFrame, format_stack};
use crate::gc::{GcStats, Heap};
use crate::lexer::Span;
use crate::object::{
    Attributes, JsFunction, JsObject, JsObjectRef, NativeFn, NativeFunction, ObjectKind, Property,
};
use crate::parser::ParserOptions;
use crate::platform::{
    ConsoleProvider, NoOpConsoleProvider, RandomProvider, RegExpProvider, StdRandomProvider,
    StdTimeProvider, TimeProvider, TracingConsoleProvider,
};
use crate::prelude::FxHashMap;
use crate::string::JsString;
use crate::value::{JsSymbol, JsValue, PropertyKey};

use builtins::promise::Job;
use frame::Frame;
use realm::{Intrinsic, Realm};

/// Default limit on nested calls
pub const DEFAULT_MAX_CALL_STACK: usize = 10_000;

/// Nested native activations (builtins, host functions, proxy traps and
/// re-entries of the dispatch loop) allowed on top of the script frames
pub(crate) const MAX_NATIVE_DEPTH: usize = 2_000;

// ═══════════════════════════════════════════════════════════════════════════════
// Interrupts
// ═══════════════════════════════════════════════════════════════════════════════

/// Interrupt flag shared with other threads through `InterruptHandle`
#[derive(Default)]
pub struct InterruptState {
    raised: AtomicBool,
    value: Mutex<Option<InterruptValue>>,
}

impl InterruptState {
    pub fn raise(&self, value: Option<InterruptValue>) {
        if let Ok(mut slot) = self.value.lock() {
            *slot = value;
        }
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
        if let Ok(mut slot) = self.value.lock() {
            *slot = None;
        }
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Relaxed)
    }

    /// Consume a pending interrupt
    fn take(&self) -> Option<Option<InterruptValue>> {
        if !self.raised.swap(false, Ordering::SeqCst) {
            return None;
        }
        let value = self.value.lock().ok().and_then(|mut slot| slot.take());
        Some(value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error kinds
// ═══════════════════════════════════════════════════════════════════════════════

/// Built-in error constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
    SyntaxError,
    UriError,
    EvalError,
    AggregateError,
    HostError,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::UriError => "URIError",
            ErrorKind::EvalError => "EvalError",
            ErrorKind::AggregateError => "AggregateError",
            ErrorKind::HostError => "HostError",
        }
    }

    pub(crate) fn prototype(self) -> Intrinsic {
        match self {
            ErrorKind::Error => Intrinsic::ErrorPrototype,
            ErrorKind::TypeError => Intrinsic::TypeErrorPrototype,
            ErrorKind::RangeError => Intrinsic::RangeErrorPrototype,
            ErrorKind::ReferenceError => Intrinsic::ReferenceErrorPrototype,
            ErrorKind::SyntaxError => Intrinsic::SyntaxErrorPrototype,
            ErrorKind::UriError => Intrinsic::UriErrorPrototype,
            ErrorKind::EvalError => Intrinsic::EvalErrorPrototype,
            ErrorKind::AggregateError => Intrinsic::AggregateErrorPrototype,
            ErrorKind::HostError => Intrinsic::HostErrorPrototype,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Interpreter
// ═══════════════════════════════════════════════════════════════════════════════

/// The interpreter state
pub struct Interpreter {
    pub heap: Heap,
    pub realm: Realm,
    /// Running frame; an idle placeholder between host calls
    pub(crate) frame: Frame,
    /// Callers of `frame`, outermost first
    pub(crate) frames: Vec<Frame>,
    pub(crate) jobs: VecDeque<Job>,
    pub(crate) interrupt: Arc<InterruptState>,
    pub max_call_stack: usize,
    /// Nested `run` loops on the Rust stack
    pub(crate) native_depth: usize,
    /// `new.target` seen by the native function being called
    pub(crate) new_target: JsValue,
    /// Function object of the native function being called
    pub(crate) native_callee: Option<JsObjectRef>,
    pub(crate) symbol_registry: FxHashMap<JsString, JsSymbol>,
    /// Tagged template objects, keyed by code identity and constant index
    pub(crate) template_cache: FxHashMap<(usize, u32), (Arc<FunctionCode>, JsObjectRef)>,
    pub field_name_mapper: Option<Rc<dyn FieldNameMapper>>,
    pub parser_options: ParserOptions,
    pub time: Box<dyn TimeProvider>,
    pub random: Box<dyn RandomProvider>,
    pub console: Box<dyn ConsoleProvider>,
    pub regexp: Option<Rc<dyn RegExpProvider>>,
    /// Console timers and counters
    pub(crate) console_timers: FxHashMap<String, u64>,
    pub(crate) console_counts: FxHashMap<String, u64>,
    /// Stack captured where the exception in flight was thrown
    pub(crate) last_throw_stack: Option<Vec<StackFrame>>,
    pub(crate) empty_code: Arc<FunctionCode>,
    /// Arrays being joined, for cycle detection in `join` and `toString`
    pub(crate) join_stack: Vec<JsObjectRef>,
}

impl Interpreter {
    pub fn new(gc_threshold: usize, console: bool) -> Self {
        let heap = Heap::new(gc_threshold);
        let object_prototype = heap.alloc(JsObject::ordinary(None));
        let function_prototype = heap.alloc(JsObject::new(
            ObjectKind::Function(Box::new(JsFunction::Native(NativeFunction {
                func: builtins::function::function_prototype_call,
                captures: Vec::new(),
                constructor: false,
            }))),
            Some(object_prototype.clone()),
        ));
        let global = heap.alloc(JsObject::new(ObjectKind::Global, Some(object_prototype.clone())));
        let realm = Realm::new(global, object_prototype, function_prototype, console);

        let empty_code = Arc::new(BytecodeBuilder::new().finish(FunctionMeta {
            name: JsString::empty(),
            kind: FunctionKind::Normal,
            flags: FunctionFlags::default(),
            length: 0,
            local_count: 0,
            source: Arc::new(SourceInfo {
                name: String::new(),
                source_map: None,
            }),
            span: Span::new(0, 0, 1, 1),
        }));

        let mut interp = Interpreter {
            heap,
            realm,
            frame: Frame::new(empty_code.clone(), None),
            frames: Vec::new(),
            jobs: VecDeque::new(),
            interrupt: Arc::new(InterruptState::default()),
            max_call_stack: DEFAULT_MAX_CALL_STACK,
            native_depth: 0,
            new_target: JsValue::Undefined,
            native_callee: None,
            symbol_registry: FxHashMap::default(),
            template_cache: FxHashMap::default(),
            field_name_mapper: None,
            parser_options: ParserOptions::default(),
            time: Box::new(StdTimeProvider::new()),
            random: Box::new(StdRandomProvider::new()),
            console: if console {
                Box::new(TracingConsoleProvider::new())
            } else {
                Box::new(NoOpConsoleProvider)
            },
            regexp: default_regexp_provider(),
            console_timers: FxHashMap::default(),
            console_counts: FxHashMap::default(),
            last_throw_stack: None,
            join_stack: Vec::new(),
            empty_code,
        };
        builtins::init_core(&mut interp);
        tracing::debug!(gc_threshold, console, "runtime created");
        interp
    }

    /// Built-in object, materializing its family on first use
    pub fn intrinsic(&mut self, which: Intrinsic) -> JsObjectRef {
        if let Some(obj) = self.realm.get(which) {
            return obj;
        }
        builtins::init_intrinsic(self, which);
        match self.realm.get(which) {
            Some(obj) => obj,
            None => self.realm.object_prototype.clone(),
        }
    }

    pub fn global(&self) -> JsObjectRef {
        self.realm.global.clone()
    }

    // ───────────────────────────────────────────────────────────────────────
    // Object creation
    // ───────────────────────────────────────────────────────────────────────

    #[inline]
    pub fn alloc(&self, obj: JsObject) -> JsObjectRef {
        self.heap.alloc(obj)
    }

    /// Create a new plain object with Object.prototype
    pub fn create_object(&mut self) -> JsObjectRef {
        self.alloc(JsObject::ordinary(Some(self.realm.object_prototype.clone())))
    }

    pub fn create_object_with_proto(&mut self, proto: Option<JsObjectRef>) -> JsObjectRef {
        self.alloc(JsObject::ordinary(proto))
    }

    /// Create a new array with Array.prototype
    pub fn create_array(&mut self, elements: Vec<JsValue>) -> JsObjectRef {
        let proto = self.intrinsic(Intrinsic::ArrayPrototype);
        self.alloc(JsObject::array(Some(proto), elements))
    }

    /// Function object for a built-in
    pub fn create_native_function(&mut self, name: &str, func: NativeFn, arity: u32) -> JsObjectRef {
        self.create_native_closure(name, func, arity, Vec::new())
    }

    /// Built-in carrying per-instance state in `captures`
    pub fn create_native_closure(
        &mut self,
        name: &str,
        func: NativeFn,
        arity: u32,
        captures: Vec<JsValue>,
    ) -> JsObjectRef {
        let native = NativeFunction {
            func,
            captures,
            constructor: false,
        };
        self.function_object(JsFunction::Native(native), JsString::from(name), arity)
    }

    /// Built-in constructor wired to its prototype object
    pub fn create_native_constructor(
        &mut self,
        name: &str,
        func: NativeFn,
        arity: u32,
        prototype: &JsObjectRef,
    ) -> JsObjectRef {
        let native = NativeFunction {
            func,
            captures: Vec::new(),
            constructor: true,
        };
        let ctor = self.function_object(JsFunction::Native(native), JsString::from(name), arity);
        ctor.borrow_mut().define_property(
            PropertyKey::from("prototype"),
            Property::data(JsValue::Object(prototype.clone()), Attributes::NONE),
        );
        prototype.borrow_mut().define_property(
            PropertyKey::from("constructor"),
            Property::data(JsValue::Object(ctor.clone()), Attributes::HIDDEN),
        );
        ctor
    }

    /// Function object with `length` and `name`
    pub(crate) fn function_object(&mut self, func: JsFunction, name: JsString, arity: u32) -> JsObjectRef {
        let mut obj = JsObject::new(
            ObjectKind::Function(Box::new(func)),
            Some(self.realm.function_prototype.clone()),
        );
        obj.define_property(
            PropertyKey::from("length"),
            Property::data(JsValue::from(arity), Attributes::CONFIGURABLE_ONLY),
        );
        obj.define_property(
            PropertyKey::from("name"),
            Property::data(JsValue::String(name), Attributes::CONFIGURABLE_ONLY),
        );
        self.alloc(obj)
    }

    /// Register a method on an object
    pub fn register_method(&mut self, obj: &JsObjectRef, name: &str, func: NativeFn, arity: u32) {
        let f = self.create_native_function(name, func, arity);
        obj.borrow_mut().define_property(
            PropertyKey::from(name),
            Property::data(JsValue::Object(f), Attributes::HIDDEN),
        );
    }

    /// Register a symbol-keyed method, named `[description]`
    pub fn register_symbol_method(
        &mut self,
        obj: &JsObjectRef,
        symbol: JsSymbol,
        func: NativeFn,
        arity: u32,
    ) {
        let name = format!("[{}]", symbol.description().map(|d| d.to_string()).unwrap_or_default());
        let f = self.create_native_function(&name, func, arity);
        obj.borrow_mut().define_property(
            PropertyKey::Symbol(symbol),
            Property::data(JsValue::Object(f), Attributes::HIDDEN),
        );
    }

    /// Register a read-only accessor
    pub fn register_getter(&mut self, obj: &JsObjectRef, key: impl Into<PropertyKey>, func: NativeFn) {
        let key = key.into();
        let name = format!("get {}", key.function_name());
        let getter = self.create_native_function(&name, func, 0);
        obj.borrow_mut().define_property(
            key,
            Property::accessor(Some(getter), None, Attributes::CONFIGURABLE_ONLY),
        );
    }

    /// Register a non-enumerable data property
    pub fn register_value(&mut self, obj: &JsObjectRef, key: impl Into<PropertyKey>, value: JsValue) {
        obj.borrow_mut()
            .define_property(key.into(), Property::data(value, Attributes::HIDDEN));
    }

    /// `{ value, done }`
    pub fn create_iter_result(&mut self, value: JsValue, done: bool) -> JsValue {
        let mut obj = JsObject::ordinary(Some(self.realm.object_prototype.clone()));
        obj.set_property(PropertyKey::from("value"), value);
        obj.set_property(PropertyKey::from("done"), JsValue::Bool(done));
        JsValue::Object(self.alloc(obj))
    }

    // ───────────────────────────────────────────────────────────────────────
    // Errors
    // ───────────────────────────────────────────────────────────────────────

    /// Error object of the given kind with a `stack` captured here
    pub fn create_error(&mut self, kind: ErrorKind, message: impl Into<JsString>) -> JsObjectRef {
        let proto = self.intrinsic(kind.prototype());
        let message: JsString = message.into();
        let mut obj = JsObject::new(ObjectKind::Error, Some(proto));
        if !message.is_empty() {
            obj.define_property(
                PropertyKey::from("message"),
                Property::data(JsValue::String(message.clone()), Attributes::HIDDEN),
            );
        }
        let stack = self.capture_stack();
        let header = if message.is_empty() {
            kind.name().to_string()
        } else {
            format!("{}: {}", kind.name(), message)
        };
        obj.define_property(
            PropertyKey::from("stack"),
            Property::data(
                JsValue::from(format!("{header}{}", format_stack(&stack))),
                Attributes::HIDDEN,
            ),
        );
        self.alloc(obj)
    }

    /// The script value an error throws
    pub fn error_value(&mut self, err: &JsError) -> JsValue {
        let (kind, message) = match err {
            JsError::Thrown(v) => return v.clone(),
            JsError::Exception(e) => return e.value.clone(),
            JsError::Parse(errors) => (
                ErrorKind::SyntaxError,
                errors.first().map(|e| e.message.clone()).unwrap_or_default(),
            ),
            JsError::SyntaxError { message } => (ErrorKind::SyntaxError, message.clone()),
            JsError::TypeError { message } => (ErrorKind::TypeError, message.clone()),
            JsError::ReferenceError { message } => (ErrorKind::ReferenceError, message.clone()),
            JsError::RangeError { message } => (ErrorKind::RangeError, message.clone()),
            JsError::UriError { message } => (ErrorKind::UriError, message.clone()),
            JsError::Interrupted(_) | JsError::StackOverflow { .. } => {
                (ErrorKind::RangeError, err.to_string())
            }
        };
        JsValue::Object(self.create_error(kind, message))
    }

    /// Turn a catchable error into the value a `catch` would see.
    /// Uncatchable errors pass through.
    pub fn catch_error(&mut self, err: JsError) -> Result<JsValue, JsError> {
        if err.is_uncatchable() {
            return Err(err);
        }
        self.last_throw_stack = None;
        Ok(self.error_value(&err))
    }

    /// Convert an error leaving the engine into its host form
    pub(crate) fn to_host_error(&mut self, err: JsError) -> JsError {
        match err {
            JsError::Parse(_)
            | JsError::Exception(_)
            | JsError::Interrupted(_)
            | JsError::StackOverflow { .. } => err,
            other => {
                let stack = self.last_throw_stack.take();
                let value = self.error_value(&other);
                let stack = stack.unwrap_or_else(|| self.capture_stack());
                let message = self.describe_thrown(&value);
                JsError::Exception(Box::new(Exception {
                    value,
                    message,
                    stack,
                }))
            }
        }
    }

    /// `"TypeError: boom"` for error objects, `ToString` for the rest.
    /// Never runs script code.
    pub(crate) fn describe_thrown(&self, value: &JsValue) -> String {
        if let JsValue::Object(obj) = value {
            let name = self.lookup_data(obj, "name");
            let message = self.lookup_data(obj, "message");
            if let (Some(JsValue::String(name)), message) = (&name, message) {
                return match message {
                    Some(JsValue::String(m)) if !m.is_empty() => format!("{name}: {m}"),
                    _ => name.to_string(),
                };
            }
            return format!("[object {}]", obj.borrow().class_name());
        }
        match value.primitive_to_string() {
            Some(s) => s.to_string(),
            None => value.display_hint(),
        }
    }

    /// Data property along the prototype chain, skipping accessors and exotics
    fn lookup_data(&self, obj: &JsObjectRef, name: &str) -> Option<JsValue> {
        let key = PropertyKey::from(name);
        let mut current = Some(obj.clone());
        let mut hops = 0;
        while let Some(handle) = current {
            let o = handle.try_borrow()?;
            if let Some(v) = o.properties.get(&key).and_then(|p| p.data_value().cloned()) {
                return Some(v);
            }
            current = o.prototype.clone();
            hops += 1;
            if hops > 64 {
                break;
            }
        }
        None
    }

    // ───────────────────────────────────────────────────────────────────────
    // Call stack
    // ───────────────────────────────────────────────────────────────────────

    fn is_idle(&self, frame: &Frame) -> bool {
        Arc::ptr_eq(&frame.code, &self.empty_code)
    }

    /// Active script frames, innermost first
    pub fn capture_stack(&self) -> Vec<StackFrame> {
        self.capture_call_stack(0)
    }

    /// At most `depth` frames (0 for all), innermost first
    pub fn capture_call_stack(&self, depth: usize) -> Vec<StackFrame> {
        let limit = if depth == 0 { usize::MAX } else { depth };
        std::iter::once(&self.frame)
            .chain(self.frames.iter().rev())
            .filter(|f| !self.is_idle(f))
            .take(limit)
            .map(|f| stack_frame(f))
            .collect()
    }

    /// Frames on the VM stack, including the idle base
    pub(crate) fn frame_count(&self) -> usize {
        self.frames.len() + 1
    }

    // ───────────────────────────────────────────────────────────────────────
    // Jobs, interrupts and collection
    // ───────────────────────────────────────────────────────────────────────

    pub(crate) fn enqueue_job(&mut self, job: Job) {
        self.jobs.push_back(job);
    }

    /// Drain the microtask queue, including jobs enqueued while draining
    pub fn run_jobs(&mut self) -> Result<(), JsError> {
        if self.jobs.is_empty() {
            return Ok(());
        }
        let mut count = 0usize;
        while let Some(job) = self.jobs.pop_front() {
            count += 1;
            if let Err(err) = builtins::promise::run_job(self, job) {
                if err.is_uncatchable() {
                    self.jobs.clear();
                    return Err(err);
                }
                let value = self.error_value(&err);
                tracing::warn!(error = %self.describe_thrown(&value), "uncaught exception in microtask");
                self.last_throw_stack = None;
            }
            self.maybe_collect();
        }
        tracing::debug!(jobs = count, "job queue drained");
        Ok(())
    }

    /// Deliver a pending interrupt as an uncatchable error
    #[inline]
    pub(crate) fn check_interrupt(&mut self) -> Result<(), JsError> {
        if !self.interrupt.is_raised() {
            return Ok(());
        }
        match self.interrupt.take() {
            Some(value) => {
                self.jobs.clear();
                Err(JsError::Interrupted(Box::new(Interrupted {
                    value,
                    stack: self.capture_stack(),
                })))
            }
            None => Ok(()),
        }
    }

    pub fn interrupt_state(&self) -> Arc<InterruptState> {
        self.interrupt.clone()
    }

    #[inline]
    pub(crate) fn maybe_collect(&mut self) {
        if self.heap.should_collect() {
            self.heap.collect();
        }
    }

    /// Force a cycle collection
    pub fn collect_garbage(&mut self) -> usize {
        self.heap.collect()
    }

    pub fn gc_stats(&self) -> GcStats {
        self.heap.stats()
    }

    /// Reset per-run state after an uncatchable error
    pub(crate) fn reset_after_abort(&mut self) {
        self.frames.clear();
        self.frame = Frame::new(self.empty_code.clone(), None);
        self.native_depth = 0;
        self.jobs.clear();
        self.new_target = JsValue::Undefined;
        self.native_callee = None;
        self.last_throw_stack = None;
    }

    // ───────────────────────────────────────────────────────────────────────
    // Symbol registry
    // ───────────────────────────────────────────────────────────────────────

    /// `Symbol.for(key)`
    pub fn registered_symbol(&mut self, key: JsString) -> JsSymbol {
        self.symbol_registry
            .entry(key.clone())
            .or_insert_with(|| JsSymbol::new(Some(key)))
            .clone()
    }

    /// `Symbol.keyFor(sym)`
    pub fn symbol_key(&self, sym: &JsSymbol) -> Option<JsString> {
        self.symbol_registry
            .iter()
            .find(|(_, s)| s.ptr_eq(sym))
            .map(|(k, _)| k.clone())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new(builtins::DEFAULT_GC_THRESHOLD, true)
    }
}

#[cfg(feature = "regex")]
fn default_regexp_provider() -> Option<Rc<dyn RegExpProvider>> {
    Some(Rc::new(crate::platform::FancyRegexProvider::new()))
}

#[cfg(not(feature = "regex"))]
fn default_regexp_provider() -> Option<Rc<dyn RegExpProvider>> {
    None
}

/// Stack frame of a suspended or running frame, mapped through the
/// source map when there is one
fn stack_frame(frame: &Frame) -> StackFrame {
    let code = &frame.code;
    let (line, column) = code
        .position(frame.current_pc())
        .unwrap_or((code.span.line, code.span.column));
    let function_name = match &frame.callee {
        Some(callee) => callee
            .try_borrow()
            .and_then(|c| c.properties.get(&PropertyKey::from("name")).and_then(|p| p.data_value().cloned()))
            .and_then(|v| v.as_string().cloned())
            .unwrap_or_else(|| code.name.clone()),
        None => code.name.clone(),
    };
    let function_name = function_name.to_string();
    if let Some(map) = &code.source.source_map {
        if let Some(pos) = map.lookup(line, column) {
            return StackFrame {
                source_name: pos.source.to_string(),
                function_name,
                line: pos.line,
                column: pos.column,
            };
        }
    }
    StackFrame {
        source_name: code.source.name.clone(),
        function_name,
        line,
        column,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_is_consumed_once() {
        let state = InterruptState::default();
        assert!(state.take().is_none());
        state.raise(Some(Arc::new(7u32)));
        let taken = state.take();
        assert!(taken.as_ref().is_some_and(|v| v.is_some()));
        assert!(state.take().is_none());
    }

    #[test]
    fn errors_carry_name_and_stack() {
        let mut interp = Interpreter::new(0, false);
        let err = interp.create_error(ErrorKind::TypeError, "boom");
        let value = JsValue::Object(err);
        assert_eq!(interp.describe_thrown(&value), "TypeError: boom");
    }

    #[test]
    fn registry_returns_same_symbol() {
        let mut interp = Interpreter::new(0, false);
        let a = interp.registered_symbol(JsString::from("app"));
        let b = interp.registered_symbol(JsString::from("app"));
        assert!(a.ptr_eq(&b));
        assert_eq!(interp.symbol_key(&a), Some(JsString::from("app")));
        assert_eq!(interp.symbol_key(&JsSymbol::new(None)), None);
    }
}
