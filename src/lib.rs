//! Embeddable ECMAScript engine
//!
//! Scripts are compiled once into an immutable [`Program`] that any number
//! of runtimes can share, then executed on a single-threaded [`Runtime`].
//! Host data crosses the boundary through `serde`.
//!
//! # Example
//!
//! ```
//! use esrun::{JsValue, Runtime};
//!
//! let mut runtime = Runtime::new();
//! let result = runtime.run_string("function f(x) { return x * x; } f(7)").unwrap();
//! assert_eq!(result, JsValue::from(49));
//! ```

pub mod ast;
pub mod bridge;
pub mod compiler;
pub mod error;
pub mod gc;
pub mod interpreter;
pub mod lexer;
pub mod number;
pub mod object;
pub mod parser;
pub mod platform;
pub(crate) mod prelude;
pub mod sourcemap;
pub(crate) mod stack;
pub mod string;
pub mod string_dict;
pub mod value;

use std::any::Any;
use std::fmt::Display;
use std::rc::Rc;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use bridge::dynamic::{DynamicArray, DynamicObject, HostArray, HostElement, SharedDynamicObject};
pub use bridge::native::{IntoHostFn, IntoJsValue};
pub use bridge::{CamelCaseFieldNames, FieldNameMapper};
pub use compiler::Program;
pub use error::{Exception, Interrupted, JsError, ParseError, ParseErrors, StackFrame};
pub use gc::GcStats;
pub use interpreter::{ErrorKind, Interpreter};
pub use object::JsObjectRef;
pub use parser::ParserOptions;
pub use string::JsString;
pub use value::{JsSymbol, JsValue, PropertyKey};

use interpreter::InterruptState;
use interpreter::builtins::DEFAULT_GC_THRESHOLD;
use interpreter::realm::Intrinsic;
use object::{HostFunction, JsFunction, JsObject, ObjectKind};
use platform::{
    ConsoleProvider, FnRandomProvider, FnTimeProvider, RandomProvider, RegExpProvider, TimeProvider,
};

// ═══════════════════════════════════════════════════════════════════════════════
// Options
// ═══════════════════════════════════════════════════════════════════════════════

/// Settings applied when a runtime is created
pub struct RuntimeOptions {
    pub max_call_stack_size: usize,
    /// Allocations between automatic cycle collections; 0 disables them
    pub gc_threshold: usize,
    /// Install the `console` global
    pub console: bool,
    pub parser: ParserOptions,
    pub field_name_mapper: Option<Rc<dyn FieldNameMapper>>,
    pub time_provider: Option<Box<dyn TimeProvider>>,
    pub random_provider: Option<Box<dyn RandomProvider>>,
    pub console_provider: Option<Box<dyn ConsoleProvider>>,
    pub regexp_provider: Option<Rc<dyn RegExpProvider>>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions {
            max_call_stack_size: interpreter::DEFAULT_MAX_CALL_STACK,
            gc_threshold: DEFAULT_GC_THRESHOLD,
            console: cfg!(feature = "console"),
            parser: ParserOptions::default(),
            field_name_mapper: None,
            time_provider: None,
            random_provider: None,
            console_provider: None,
            regexp_provider: None,
        }
    }
}

impl RuntimeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_call_stack_size(mut self, frames: usize) -> Self {
        self.max_call_stack_size = frames;
        self
    }

    pub fn gc_threshold(mut self, allocations: usize) -> Self {
        self.gc_threshold = allocations;
        self
    }

    pub fn console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    pub fn parser_options(mut self, options: ParserOptions) -> Self {
        self.parser = options;
        self
    }

    pub fn field_name_mapper(mut self, mapper: impl FieldNameMapper + 'static) -> Self {
        self.field_name_mapper = Some(Rc::new(mapper));
        self
    }

    pub fn time_provider(mut self, provider: impl TimeProvider + 'static) -> Self {
        self.time_provider = Some(Box::new(provider));
        self
    }

    pub fn random_provider(mut self, provider: impl RandomProvider + 'static) -> Self {
        self.random_provider = Some(Box::new(provider));
        self
    }

    pub fn console_provider(mut self, provider: impl ConsoleProvider + 'static) -> Self {
        self.console_provider = Some(Box::new(provider));
        self
    }

    pub fn regexp_provider(mut self, provider: impl RegExpProvider + 'static) -> Self {
        self.regexp_provider = Some(Rc::new(provider));
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Handles
// ═══════════════════════════════════════════════════════════════════════════════

/// A value known to be callable
#[derive(Clone)]
pub struct Callable {
    func: JsValue,
}

impl Callable {
    pub fn value(&self) -> &JsValue {
        &self.func
    }
}

/// A value known to be a constructor
#[derive(Clone)]
pub struct Constructor {
    ctor: JsValue,
}

impl Constructor {
    pub fn value(&self) -> &JsValue {
        &self.ctor
    }
}

/// Interrupts a runtime from any thread
#[derive(Clone)]
pub struct InterruptHandle {
    state: Arc<InterruptState>,
}

impl InterruptHandle {
    /// Abort the running script at its next safe point. The host call
    /// fails with `JsError::Interrupted` carrying `value`.
    pub fn interrupt(&self, value: impl Any + Send + Sync) {
        self.state.raise(Some(Arc::new(value)));
    }

    pub fn clear(&self) {
        self.state.clear();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Runtime
// ═══════════════════════════════════════════════════════════════════════════════

/// One script execution environment.
///
/// Microtasks queued by a host call run before that call returns.
pub struct Runtime {
    interpreter: Interpreter,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_options(RuntimeOptions::default())
    }

    pub fn with_options(options: RuntimeOptions) -> Self {
        let mut interpreter = Interpreter::new(options.gc_threshold, options.console);
        interpreter.max_call_stack = options.max_call_stack_size;
        interpreter.parser_options = options.parser;
        interpreter.field_name_mapper = options.field_name_mapper;
        if let Some(time) = options.time_provider {
            interpreter.time = time;
        }
        if let Some(random) = options.random_provider {
            interpreter.random = random;
        }
        if let Some(console) = options.console_provider {
            interpreter.console = console;
        }
        if let Some(regexp) = options.regexp_provider {
            interpreter.regexp = Some(regexp);
        }
        Runtime { interpreter }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    // ───────────────────────────────────────────────────────────────────────
    // Running code
    // ───────────────────────────────────────────────────────────────────────

    /// Compile with this runtime's parser options
    pub fn compile(&self, name: &str, source: &str, strict: bool) -> Result<Arc<Program>, JsError> {
        compiler::compile(source, name, strict, &self.interpreter.parser_options).map(Arc::new)
    }

    pub fn run(&mut self, program: &Program) -> Result<JsValue, JsError> {
        let result = self.interpreter.run_program(program.code.clone());
        self.finish(result)
    }

    /// Compile and run in one step
    pub fn run_string(&mut self, source: &str) -> Result<JsValue, JsError> {
        let program = self.compile("<eval>", source, false)?;
        self.run(&program)
    }

    pub fn call(&mut self, func: &Callable, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
        let result = self.interpreter.call_function(&func.func, this, args);
        self.finish(result)
    }

    pub fn construct(&mut self, ctor: &Constructor, args: &[JsValue]) -> Result<JsValue, JsError> {
        let result = self.interpreter.construct(&ctor.ctor, args, None);
        self.finish(result)
    }

    /// Drain the job queue and turn an escaping error into its host form
    fn finish(&mut self, result: Result<JsValue, JsError>) -> Result<JsValue, JsError> {
        let interp = &mut self.interpreter;
        match result {
            Ok(value) => match interp.run_jobs() {
                Ok(()) => {
                    interp.maybe_collect();
                    Ok(value)
                }
                Err(err) => {
                    interp.reset_after_abort();
                    Err(err)
                }
            },
            Err(err) if err.is_uncatchable() => {
                interp.reset_after_abort();
                Err(err)
            }
            Err(err) => {
                let err = interp.to_host_error(err);
                if let Err(abort) = interp.run_jobs() {
                    interp.reset_after_abort();
                    return Err(abort);
                }
                Err(err)
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Globals
    // ───────────────────────────────────────────────────────────────────────

    /// Global binding: `let`/`const`/`class` declarations first, then
    /// properties of the global object. `None` when nothing is bound or
    /// the binding is still uninitialized. A throwing getter on the global
    /// object comes back as the error.
    pub fn get(&mut self, name: &str) -> Result<Option<JsValue>, JsError> {
        let key = JsString::from(name);
        if let Some(binding) = self.interpreter.realm.lexical.get(&key) {
            return Ok(binding.value.clone());
        }
        let global = self.interpreter.global();
        let key = PropertyKey::from(key);
        let found = self.interpreter.has_property(&global, &key).and_then(|has| {
            if has { self.interpreter.get(&global, &key).map(Some) } else { Ok(None) }
        });
        found.map_err(|err| {
            if err.is_uncatchable() {
                self.interpreter.reset_after_abort();
                err
            } else {
                self.interpreter.to_host_error(err)
            }
        })
    }

    /// Assign a global binding, creating a global object property when no
    /// lexical binding has the name
    pub fn set(&mut self, name: &str, value: impl IntoJsValue) -> Result<(), JsError> {
        let value = value.into_js(&mut self.interpreter)?;
        let key = JsString::from(name);
        if let Some(binding) = self.interpreter.realm.lexical.get_mut(&key) {
            if binding.value.is_none() {
                return Err(JsError::reference_error(format!(
                    "Cannot access '{name}' before initialization"
                )));
            }
            if !binding.mutable {
                return Err(JsError::type_error("Assignment to constant variable."));
            }
            binding.value = Some(value);
            return Ok(());
        }
        let global = self.interpreter.global();
        self.interpreter.set_or_throw(&global, PropertyKey::from(key), value)
    }

    /// Expose a Rust closure as a global function
    pub fn set_function<Args>(&mut self, name: &str, func: impl IntoHostFn<Args>) -> Result<(), JsError> {
        let (func, arity) = func.into_host_fn();
        let value = self.host_function(name, func, arity);
        self.set(name, value)
    }

    /// Expose a raw native function that sees `this` and the argument list
    pub fn set_native(
        &mut self,
        name: &str,
        func: impl Fn(&mut Interpreter, JsValue, &[JsValue]) -> Result<JsValue, JsError> + 'static,
    ) -> Result<(), JsError> {
        let value = self.host_function(name, Rc::new(func), 0);
        self.set(name, value)
    }

    fn host_function(&mut self, name: &str, func: Rc<object::HostFn>, arity: u32) -> JsValue {
        let host = JsFunction::Host(HostFunction {
            func,
            constructor: false,
        });
        JsValue::Object(self.interpreter.function_object(host, JsString::from(name), arity))
    }

    // ───────────────────────────────────────────────────────────────────────
    // Values
    // ───────────────────────────────────────────────────────────────────────

    pub fn to_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<JsValue, JsError> {
        bridge::to_value(&mut self.interpreter, value)
    }

    pub fn export_to<T: DeserializeOwned>(&mut self, value: &JsValue) -> Result<T, JsError> {
        bridge::export_to(&mut self.interpreter, value)
    }

    pub fn new_object(&mut self) -> JsObjectRef {
        self.interpreter.create_object()
    }

    pub fn new_array(&mut self, items: Vec<JsValue>) -> JsObjectRef {
        self.interpreter.create_array(items)
    }

    pub fn new_type_error(&mut self, message: impl Display) -> JsValue {
        JsValue::Object(self.interpreter.create_error(ErrorKind::TypeError, message.to_string()))
    }

    /// `HostError` wrapping a host failure; its `value` holds the message
    pub fn new_host_error(&mut self, err: impl Display) -> JsValue {
        interpreter::builtins::error::create_host_error(&mut self.interpreter, &err.to_string())
    }

    /// Object whose string-keyed properties are served by `handler`
    pub fn new_dynamic_object(&mut self, handler: impl DynamicObject + 'static) -> JsValue {
        let proto = self.interpreter.realm.object_prototype.clone();
        let obj = JsObject::new(ObjectKind::Dynamic(Rc::new(handler)), Some(proto));
        JsValue::Object(self.interpreter.alloc(obj))
    }

    pub fn new_dynamic_array(&mut self, handler: impl DynamicArray + 'static) -> JsValue {
        let proto = self.interpreter.intrinsic(Intrinsic::ArrayPrototype);
        let obj = JsObject::new(ObjectKind::DynamicArray(Rc::new(handler)), Some(proto));
        JsValue::Object(self.interpreter.alloc(obj))
    }

    /// Dynamic object whose handler may also serve other runtimes
    pub fn new_shared_dynamic_object<H: SharedDynamicObject + 'static>(&mut self, handler: Arc<H>) -> JsValue {
        let proto = self.interpreter.realm.object_prototype.clone();
        let obj = JsObject::new(ObjectKind::SharedDynamic(handler), Some(proto));
        JsValue::Object(self.interpreter.alloc(obj))
    }

    pub fn assert_function(&self, value: &JsValue) -> Option<Callable> {
        match value {
            JsValue::Object(o) if o.borrow().is_callable() => Some(Callable { func: value.clone() }),
            _ => None,
        }
    }

    pub fn assert_constructor(&self, value: &JsValue) -> Option<Constructor> {
        match value {
            JsValue::Object(o) if o.borrow().is_constructor() => Some(Constructor { ctor: value.clone() }),
            _ => None,
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Control and configuration
    // ───────────────────────────────────────────────────────────────────────

    /// See [`InterruptHandle::interrupt`]
    pub fn interrupt(&self, value: impl Any + Send + Sync) {
        self.interrupt_handle().interrupt(value);
    }

    /// Drop an interrupt that no script consumed
    pub fn clear_interrupt(&self) {
        self.interpreter.interrupt_state().clear();
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            state: self.interpreter.interrupt_state(),
        }
    }

    pub fn set_max_call_stack_size(&mut self, frames: usize) {
        self.interpreter.max_call_stack = frames;
    }

    /// Source for `Math.random`
    pub fn set_rand_source(&mut self, source: impl FnMut() -> f64 + 'static) {
        self.interpreter.random = Box::new(FnRandomProvider::new(source));
    }

    /// Wall clock in milliseconds since the epoch, for `Date`
    pub fn set_time_source(&mut self, now: impl Fn() -> f64 + 'static) {
        self.interpreter.time = Box::new(FnTimeProvider::new(now));
    }

    pub fn set_field_name_mapper(&mut self, mapper: Option<Rc<dyn FieldNameMapper>>) {
        self.interpreter.field_name_mapper = mapper;
    }

    pub fn set_parser_options(&mut self, options: ParserOptions) {
        self.interpreter.parser_options = options;
    }

    /// Active frames, innermost first; `depth` 0 means all of them
    pub fn capture_call_stack(&self, depth: usize) -> Vec<StackFrame> {
        self.interpreter.capture_call_stack(depth)
    }

    /// Run a cycle collection now, returning the number of objects freed
    pub fn collect_garbage(&mut self) -> usize {
        self.interpreter.collect_garbage()
    }

    pub fn gc_stats(&self) -> GcStats {
        self.interpreter.gc_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn programs_are_shareable() {
        assert_send_sync::<Program>();
        assert_send_sync::<InterruptHandle>();
    }

    #[test]
    fn basic_arithmetic() {
        let mut runtime = Runtime::new();
        assert_eq!(runtime.run_string("1 + 2 * 3").ok(), Some(JsValue::from(7)));
    }

    #[test]
    fn one_program_many_runtimes() {
        let Ok(program) = Program::compile("shared.js", "var n = (typeof n === 'number' ? n : 0) + 1; n", false) else {
            panic!("compile failed");
        };
        let mut a = Runtime::new();
        let mut b = Runtime::new();
        assert_eq!(a.run(&program).ok(), Some(JsValue::from(1)));
        assert_eq!(a.run(&program).ok(), Some(JsValue::from(2)));
        assert_eq!(b.run(&program).ok(), Some(JsValue::from(1)));
    }

    #[test]
    fn get_prefers_lexical_bindings() {
        let mut runtime = Runtime::new();
        assert!(runtime.run_string("let answer = 42; var other = 'x';").is_ok());
        assert_eq!(runtime.get("answer").ok().flatten(), Some(JsValue::from(42)));
        assert_eq!(runtime.get("other").ok().flatten(), Some(JsValue::from("x")));
        assert_eq!(runtime.get("missing").ok().flatten(), None);
    }

    #[test]
    fn set_const_fails() {
        let mut runtime = Runtime::new();
        assert!(runtime.run_string("const k = 1;").is_ok());
        assert!(matches!(runtime.set("k", JsValue::from(2)), Err(JsError::TypeError { .. })));
    }

    #[test]
    fn host_function_round_trip() {
        let mut runtime = Runtime::new();
        assert!(runtime.set_function("add", |a: f64, b: f64| a + b).is_ok());
        assert_eq!(runtime.run_string("add(2, 3)").ok(), Some(JsValue::from(5)));
    }

    #[test]
    fn uncaught_error_carries_stack() {
        let mut runtime = Runtime::new();
        let err = runtime.run_string("function boom() { throw new TypeError('bad'); }\nboom();");
        let Err(JsError::Exception(exception)) = err else {
            panic!("expected an exception");
        };
        assert_eq!(exception.message, "TypeError: bad");
        assert!(exception.stack.iter().any(|f| f.function_name == "boom"));
    }

    #[test]
    fn interrupt_stops_loop() {
        let mut runtime = Runtime::new();
        runtime.interrupt("stop");
        let result = runtime.run_string("while (true) {}");
        let Err(JsError::Interrupted(info)) = result else {
            panic!("expected an interrupt");
        };
        assert_eq!(info.value_as::<&str>(), Some(&"stop"));
        assert_eq!(runtime.run_string("1").ok(), Some(JsValue::from(1)));
    }

    #[test]
    fn microtasks_run_before_return() {
        let mut runtime = Runtime::new();
        let result = runtime.run_string("var log = []; Promise.resolve().then(() => log.push('a')); log.push('b'); 0");
        assert!(result.is_ok());
        let log = runtime.get("log").ok().flatten().and_then(|v| runtime.export_to::<Vec<String>>(&v).ok());
        assert_eq!(log, Some(vec!["b".to_string(), "a".to_string()]));
    }
}
