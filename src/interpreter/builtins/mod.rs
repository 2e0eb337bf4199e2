//! Built-in objects
//!
//! `init_core` wires the two objects every runtime needs up front
//! (`Object` and `Function` with their prototypes) plus the global value
//! properties and functions. Every other family is created by
//! `init_intrinsic` the first time the engine or a script asks for one of
//! its members.

pub mod array;
pub mod boolean;
#[cfg(feature = "console")]
pub mod console;
pub mod date;
pub mod error;
pub mod function;
pub mod generator;
pub mod global;
pub mod iterator;
pub mod json;
pub mod map;
pub mod math;
pub mod number;
pub mod object;
pub mod promise;
pub mod proxy;
pub mod reflect;
pub mod regexp;
pub mod set;
pub mod string;
pub mod symbol;
pub mod typed_array;
pub mod weak;

use crate::error::JsError;
use crate::object::{Attributes, JsFunction, JsObjectRef, ObjectKind, Property};
use crate::string::JsString;
use crate::value::{JsSymbol, JsValue, PropertyKey};

use super::Interpreter;
use super::realm::Intrinsic;

/// Allocations between automatic cycle collections
pub const DEFAULT_GC_THRESHOLD: usize = 10_000;

/// Set up `Object`, `Function` and the global object
pub fn init_core(interp: &mut Interpreter) {
    object::init(interp);
    function::init(interp);
    global::init(interp);
}

/// Create the family that `which` belongs to
pub fn init_intrinsic(interp: &mut Interpreter, which: Intrinsic) {
    use Intrinsic as I;
    match which {
        I::ObjectPrototype | I::Object => object::init(interp),
        I::FunctionPrototype | I::Function | I::ThrowTypeError => function::init(interp),
        I::ArrayPrototype | I::Array | I::ArrayValues | I::ArrayIteratorPrototype | I::ArrayIteratorNext => {
            array::init(interp)
        }
        I::IteratorPrototype | I::AsyncIteratorPrototype => iterator::init(interp),
        I::StringPrototype | I::String | I::StringIteratorPrototype => string::init(interp),
        I::NumberPrototype | I::Number => number::init(interp),
        I::BooleanPrototype | I::Boolean => boolean::init(interp),
        I::SymbolPrototype | I::Symbol => symbol::init(interp),
        I::ErrorPrototype
        | I::Error
        | I::TypeErrorPrototype
        | I::TypeError
        | I::RangeErrorPrototype
        | I::RangeError
        | I::ReferenceErrorPrototype
        | I::ReferenceError
        | I::SyntaxErrorPrototype
        | I::SyntaxError
        | I::UriErrorPrototype
        | I::UriError
        | I::EvalErrorPrototype
        | I::EvalError
        | I::AggregateErrorPrototype
        | I::AggregateError
        | I::HostErrorPrototype
        | I::HostError => error::init(interp),
        I::RegExpPrototype | I::RegExp | I::RegExpStringIteratorPrototype => regexp::init(interp),
        I::DatePrototype | I::Date => date::init(interp),
        I::MapPrototype | I::Map | I::MapIteratorPrototype => map::init(interp),
        I::SetPrototype | I::Set | I::SetIteratorPrototype => set::init(interp),
        I::WeakMapPrototype | I::WeakMap | I::WeakSetPrototype | I::WeakSet => weak::init(interp),
        I::PromisePrototype | I::Promise => promise::init(interp),
        I::Proxy => proxy::init(interp),
        I::Reflect => reflect::init(interp),
        I::Json => json::init(interp),
        I::Math => math::init(interp),
        I::Console => init_console(interp),
        I::GeneratorFunctionPrototype
        | I::GeneratorFunction
        | I::GeneratorPrototype
        | I::AsyncFunctionPrototype
        | I::AsyncFunction
        | I::AsyncGeneratorFunctionPrototype
        | I::AsyncGeneratorFunction
        | I::AsyncGeneratorPrototype => generator::init(interp),
        I::ArrayBufferPrototype
        | I::ArrayBuffer
        | I::DataViewPrototype
        | I::DataView
        | I::TypedArrayPrototype
        | I::TypedArray
        | I::Int8ArrayPrototype
        | I::Int8Array
        | I::Uint8ArrayPrototype
        | I::Uint8Array
        | I::Uint8ClampedArrayPrototype
        | I::Uint8ClampedArray
        | I::Int16ArrayPrototype
        | I::Int16Array
        | I::Uint16ArrayPrototype
        | I::Uint16Array
        | I::Int32ArrayPrototype
        | I::Int32Array
        | I::Uint32ArrayPrototype
        | I::Uint32Array
        | I::Float32ArrayPrototype
        | I::Float32Array
        | I::Float64ArrayPrototype
        | I::Float64Array => typed_array::init(interp),
    }
}

#[cfg(feature = "console")]
fn init_console(interp: &mut Interpreter) {
    console::init(interp);
}

#[cfg(not(feature = "console"))]
fn init_console(interp: &mut Interpreter) {
    let obj = interp.create_object();
    interp.realm.set(Intrinsic::Console, obj);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers shared by the built-ins
// ═══════════════════════════════════════════════════════════════════════════════

/// Argument `index`, `undefined` when missing
#[inline]
pub(crate) fn arg(args: &[JsValue], index: usize) -> JsValue {
    args.get(index).cloned().unwrap_or_default()
}

/// Captured value `index` of the native closure being called
pub(crate) fn capture(interp: &Interpreter, index: usize) -> JsValue {
    let Some(callee) = &interp.native_callee else {
        return JsValue::Undefined;
    };
    match callee.borrow().function() {
        Some(JsFunction::Native(n)) => n.captures.get(index).cloned().unwrap_or_default(),
        _ => JsValue::Undefined,
    }
}

/// Overwrite a captured value of a native closure
pub(crate) fn set_capture(func: &JsValue, index: usize, value: JsValue) {
    let JsValue::Object(f) = func else {
        return;
    };
    if let ObjectKind::Function(jf) = &mut f.borrow_mut().kind {
        if let JsFunction::Native(n) = jf.as_mut() {
            if let Some(slot) = n.captures.get_mut(index) {
                *slot = value;
            }
        }
    }
}

/// The native function object currently running
pub(crate) fn callee(interp: &Interpreter) -> JsValue {
    JsValue::from(interp.native_callee.clone())
}

/// `Symbol.toStringTag` as a non-writable, configurable string
pub(crate) fn set_to_string_tag(obj: &JsObjectRef, tag: &str) {
    obj.borrow_mut().define_property(
        PropertyKey::Symbol(JsSymbol::to_string_tag()),
        Property::data(JsValue::from(tag), Attributes::CONFIGURABLE_ONLY),
    );
}

/// Install a value on the global object as a hidden property
pub(crate) fn define_global(interp: &mut Interpreter, name: &str, value: JsValue) {
    interp
        .realm
        .global
        .borrow_mut()
        .define_property(PropertyKey::from(name), Property::data(value, Attributes::HIDDEN));
}

/// A `species` getter returning `this`
pub(crate) fn register_species(interp: &mut Interpreter, ctor: &JsObjectRef) {
    interp.register_getter(ctor, PropertyKey::Symbol(JsSymbol::species()), species_getter);
}

fn species_getter(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(this)
}

/// Relative index argument clamped to `0..=len` (`slice`, `fill`, ...)
pub(crate) fn relative_arg(interp: &mut Interpreter, value: &JsValue, len: usize, default: usize) -> Result<usize, JsError> {
    if value.is_undefined() {
        return Ok(default);
    }
    let rel = interp.to_number(value)?;
    Ok(crate::number::relative_index(rel, len))
}

/// `String(this)` for the generic string methods
pub(crate) fn this_string(interp: &mut Interpreter, this: &JsValue, method: &str) -> Result<JsString, JsError> {
    if this.is_nullish() {
        return Err(JsError::type_error(format!(
            "String.prototype.{method} called on null or undefined"
        )));
    }
    interp.to_string(this)
}

/// The callable argument of `forEach`-style methods
pub(crate) fn callback(value: &JsValue, context: &str) -> Result<JsValue, JsError> {
    if value.is_callable() {
        Ok(value.clone())
    } else {
        Err(JsError::type_error(format!(
            "{} is not a function in {context}",
            super::ops::describe(value)
        )))
    }
}
