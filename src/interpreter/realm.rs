//! Realm: the global object, global lexical bindings and the intrinsic
//! objects.
//!
//! Intrinsics are one-shot cells. `Object.prototype` and
//! `Function.prototype` exist from the start; every other built-in is
//! materialized by its family initializer the first time something asks for
//! it. Global bindings such as `Map` or `Promise` start out as entries in
//! `lazy_globals` and become real properties on first touch.

use rustc_hash::FxHashMap;

use crate::object::JsObjectRef;
use crate::string::JsString;
use crate::value::JsValue;

/// Built-in objects addressable by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    ObjectPrototype,
    FunctionPrototype,
    Object,
    Function,
    ThrowTypeError,

    ArrayPrototype,
    Array,
    ArrayValues,
    ArrayIteratorPrototype,
    ArrayIteratorNext,

    StringPrototype,
    String,
    StringIteratorPrototype,
    NumberPrototype,
    Number,
    BooleanPrototype,
    Boolean,
    SymbolPrototype,
    Symbol,

    ErrorPrototype,
    Error,
    TypeErrorPrototype,
    TypeError,
    RangeErrorPrototype,
    RangeError,
    ReferenceErrorPrototype,
    ReferenceError,
    SyntaxErrorPrototype,
    SyntaxError,
    UriErrorPrototype,
    UriError,
    EvalErrorPrototype,
    EvalError,
    AggregateErrorPrototype,
    AggregateError,
    HostErrorPrototype,
    HostError,

    RegExpPrototype,
    RegExp,
    RegExpStringIteratorPrototype,
    DatePrototype,
    Date,

    MapPrototype,
    Map,
    MapIteratorPrototype,
    SetPrototype,
    Set,
    SetIteratorPrototype,
    WeakMapPrototype,
    WeakMap,
    WeakSetPrototype,
    WeakSet,

    PromisePrototype,
    Promise,
    Proxy,
    Reflect,
    Json,
    Math,
    Console,

    IteratorPrototype,
    AsyncIteratorPrototype,
    GeneratorFunctionPrototype,
    GeneratorFunction,
    GeneratorPrototype,
    AsyncFunctionPrototype,
    AsyncFunction,
    AsyncGeneratorFunctionPrototype,
    AsyncGeneratorFunction,
    AsyncGeneratorPrototype,

    ArrayBufferPrototype,
    ArrayBuffer,
    DataViewPrototype,
    DataView,
    TypedArrayPrototype,
    TypedArray,
    Int8ArrayPrototype,
    Int8Array,
    Uint8ArrayPrototype,
    Uint8Array,
    Uint8ClampedArrayPrototype,
    Uint8ClampedArray,
    Int16ArrayPrototype,
    Int16Array,
    Uint16ArrayPrototype,
    Uint16Array,
    Int32ArrayPrototype,
    Int32Array,
    Uint32ArrayPrototype,
    Uint32Array,
    Float32ArrayPrototype,
    Float32Array,
    Float64ArrayPrototype,
    Float64Array,
}

/// Number of `Intrinsic` variants
const INTRINSIC_COUNT: usize = Intrinsic::Float64Array as usize + 1;

/// Global constructors and namespaces created on first use
const LAZY_GLOBALS: &[(&str, Intrinsic)] = &[
    ("Array", Intrinsic::Array),
    ("String", Intrinsic::String),
    ("Number", Intrinsic::Number),
    ("Boolean", Intrinsic::Boolean),
    ("Symbol", Intrinsic::Symbol),
    ("Error", Intrinsic::Error),
    ("TypeError", Intrinsic::TypeError),
    ("RangeError", Intrinsic::RangeError),
    ("ReferenceError", Intrinsic::ReferenceError),
    ("SyntaxError", Intrinsic::SyntaxError),
    ("URIError", Intrinsic::UriError),
    ("EvalError", Intrinsic::EvalError),
    ("AggregateError", Intrinsic::AggregateError),
    ("HostError", Intrinsic::HostError),
    ("RegExp", Intrinsic::RegExp),
    ("Date", Intrinsic::Date),
    ("Map", Intrinsic::Map),
    ("Set", Intrinsic::Set),
    ("WeakMap", Intrinsic::WeakMap),
    ("WeakSet", Intrinsic::WeakSet),
    ("Promise", Intrinsic::Promise),
    ("Proxy", Intrinsic::Proxy),
    ("Reflect", Intrinsic::Reflect),
    ("JSON", Intrinsic::Json),
    ("Math", Intrinsic::Math),
    ("ArrayBuffer", Intrinsic::ArrayBuffer),
    ("DataView", Intrinsic::DataView),
    ("Int8Array", Intrinsic::Int8Array),
    ("Uint8Array", Intrinsic::Uint8Array),
    ("Uint8ClampedArray", Intrinsic::Uint8ClampedArray),
    ("Int16Array", Intrinsic::Int16Array),
    ("Uint16Array", Intrinsic::Uint16Array),
    ("Int32Array", Intrinsic::Int32Array),
    ("Uint32Array", Intrinsic::Uint32Array),
    ("Float32Array", Intrinsic::Float32Array),
    ("Float64Array", Intrinsic::Float64Array),
];

/// A top-level `let`, `const` or `class` binding
#[derive(Debug, Clone)]
pub struct LexicalBinding {
    /// `None` until the declaration runs
    pub value: Option<JsValue>,
    pub mutable: bool,
}

pub struct Realm {
    pub global: JsObjectRef,
    pub object_prototype: JsObjectRef,
    pub function_prototype: JsObjectRef,
    pub lexical: FxHashMap<JsString, LexicalBinding>,
    pub lazy_globals: FxHashMap<JsString, Intrinsic>,
    intrinsics: Vec<Option<JsObjectRef>>,
}

impl Realm {
    pub fn new(
        global: JsObjectRef,
        object_prototype: JsObjectRef,
        function_prototype: JsObjectRef,
        console: bool,
    ) -> Self {
        let mut intrinsics = vec![None; INTRINSIC_COUNT];
        if let Some(slot) = intrinsics.get_mut(Intrinsic::ObjectPrototype as usize) {
            *slot = Some(object_prototype.clone());
        }
        if let Some(slot) = intrinsics.get_mut(Intrinsic::FunctionPrototype as usize) {
            *slot = Some(function_prototype.clone());
        }
        let mut lazy_globals: FxHashMap<JsString, Intrinsic> = LAZY_GLOBALS
            .iter()
            .map(|(name, which)| (JsString::from(*name), *which))
            .collect();
        if console {
            lazy_globals.insert(JsString::from("console"), Intrinsic::Console);
        }
        Realm {
            global,
            object_prototype,
            function_prototype,
            lexical: FxHashMap::default(),
            lazy_globals,
            intrinsics,
        }
    }

    #[inline]
    pub fn get(&self, which: Intrinsic) -> Option<JsObjectRef> {
        self.intrinsics.get(which as usize).cloned().flatten()
    }

    pub fn set(&mut self, which: Intrinsic, obj: JsObjectRef) {
        if let Some(slot) = self.intrinsics.get_mut(which as usize) {
            *slot = Some(obj);
        }
    }

    pub fn has_lazy_globals(&self) -> bool {
        !self.lazy_globals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_global_names_are_unique() {
        let mut names: Vec<&str> = LAZY_GLOBALS.iter().map(|(n, _)| *n).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }

    #[test]
    fn intrinsic_count_covers_last_variant() {
        assert!(INTRINSIC_COUNT > Intrinsic::Float64ArrayPrototype as usize);
    }
}
