//! Object model: property storage, descriptors and the ordinary internal
//! methods that need no interpreter access.
//!
//! Proxies, lazy globals, typed arrays and host-backed objects route through
//! the interpreter (`interpreter::ops`); everything here is the ordinary
//! behaviour those fall back to.

use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::bridge::dynamic::{DynamicArray, DynamicObject, SharedDynamicObject};
use crate::compiler::FunctionCode;
use crate::error::JsError;
use crate::gc::{Gc, Traceable, Tracer};
use crate::interpreter::Interpreter;
use crate::interpreter::builtins::iterator::{
    ArrayIteratorState, ForInState, RegExpStringIteratorState, StringIteratorState,
};
use crate::interpreter::builtins::map::{MapIteratorState, OrderedMap};
use crate::interpreter::builtins::promise::PromiseState;
use crate::interpreter::builtins::proxy::ProxyData;
use crate::interpreter::builtins::regexp::RegExpData;
use crate::interpreter::builtins::typed_array::{ArrayBufferData, DataViewData, TypedArrayData};
use crate::interpreter::generator::{AsyncFunctionState, AsyncGeneratorState, GeneratorState};
use crate::interpreter::stash::Stash;
use crate::prelude::{IndexMap, index_map_new};
use crate::string::JsString;
use crate::value::{JsSymbol, JsValue, PropertyKey};

/// Handle to a heap object
pub type JsObjectRef = Gc<JsObject>;

/// Signature of built-in functions
pub type NativeFn = fn(&mut Interpreter, JsValue, &[JsValue]) -> Result<JsValue, JsError>;

/// Signature of host closures
pub type HostFn = dyn Fn(&mut Interpreter, JsValue, &[JsValue]) -> Result<JsValue, JsError>;

impl Tracer<'_> {
    pub fn value(&mut self, v: &JsValue) {
        if let JsValue::Object(o) = v {
            self.edge(o);
        }
    }

    pub fn values<'v>(&mut self, vs: impl IntoIterator<Item = &'v JsValue>) {
        for v in vs {
            self.value(v);
        }
    }

    pub fn object(&mut self, o: &Option<JsObjectRef>) {
        if let Some(o) = o {
            self.edge(o);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Properties
// ═══════════════════════════════════════════════════════════════════════════════

/// Property attribute bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes(u8);

impl Attributes {
    pub const WRITABLE: u8 = 1;
    pub const ENUMERABLE: u8 = 2;
    pub const CONFIGURABLE: u8 = 4;

    /// writable, enumerable, configurable: what assignment creates
    pub const DEFAULT: Attributes = Attributes(7);
    /// writable, configurable: built-in methods
    pub const HIDDEN: Attributes = Attributes(5);
    /// configurable only: `name`/`length` of functions
    pub const CONFIGURABLE_ONLY: Attributes = Attributes(4);
    pub const NONE: Attributes = Attributes(0);
    /// writable only: `prototype` of ordinary functions
    pub const WRITABLE_ONLY: Attributes = Attributes(1);

    pub fn new(writable: bool, enumerable: bool, configurable: bool) -> Self {
        let mut bits = 0;
        if writable {
            bits |= Self::WRITABLE;
        }
        if enumerable {
            bits |= Self::ENUMERABLE;
        }
        if configurable {
            bits |= Self::CONFIGURABLE;
        }
        Attributes(bits)
    }

    #[inline]
    pub fn writable(self) -> bool {
        self.0 & Self::WRITABLE != 0
    }

    #[inline]
    pub fn enumerable(self) -> bool {
        self.0 & Self::ENUMERABLE != 0
    }

    #[inline]
    pub fn configurable(self) -> bool {
        self.0 & Self::CONFIGURABLE != 0
    }

    fn with(self, bit: u8, on: bool) -> Self {
        if on {
            Attributes(self.0 | bit)
        } else {
            Attributes(self.0 & !bit)
        }
    }
}

#[derive(Debug, Clone)]
pub enum PropertyValue {
    Data(JsValue),
    Accessor {
        get: Option<JsObjectRef>,
        set: Option<JsObjectRef>,
    },
}

/// An own property
#[derive(Debug, Clone)]
pub struct Property {
    pub value: PropertyValue,
    pub attrs: Attributes,
}

impl Property {
    pub fn data(value: JsValue, attrs: Attributes) -> Self {
        Property {
            value: PropertyValue::Data(value),
            attrs,
        }
    }

    pub fn accessor(get: Option<JsObjectRef>, set: Option<JsObjectRef>, attrs: Attributes) -> Self {
        Property {
            value: PropertyValue::Accessor { get, set },
            attrs: attrs.with(Attributes::WRITABLE, false),
        }
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self.value, PropertyValue::Accessor { .. })
    }

    /// Data value, if this is a data property
    pub fn data_value(&self) -> Option<&JsValue> {
        match &self.value {
            PropertyValue::Data(v) => Some(v),
            PropertyValue::Accessor { .. } => None,
        }
    }

    pub fn to_descriptor(&self) -> PropertyDescriptor {
        match &self.value {
            PropertyValue::Data(v) => PropertyDescriptor {
                value: Some(v.clone()),
                writable: Some(self.attrs.writable()),
                get: None,
                set: None,
                enumerable: Some(self.attrs.enumerable()),
                configurable: Some(self.attrs.configurable()),
            },
            PropertyValue::Accessor { get, set } => PropertyDescriptor {
                value: None,
                writable: None,
                get: Some(get.clone().map(JsValue::Object).unwrap_or_default()),
                set: Some(set.clone().map(JsValue::Object).unwrap_or_default()),
                enumerable: Some(self.attrs.enumerable()),
                configurable: Some(self.attrs.configurable()),
            },
        }
    }

    fn trace(&self, t: &mut Tracer<'_>) {
        match &self.value {
            PropertyValue::Data(v) => t.value(v),
            PropertyValue::Accessor { get, set } => {
                t.object(get);
                t.object(set);
            }
        }
    }
}

/// A property descriptor with tri-state fields; `get`/`set` hold
/// `Some(Undefined)` when explicitly undefined
#[derive(Debug, Clone, Default)]
pub struct PropertyDescriptor {
    pub value: Option<JsValue>,
    pub writable: Option<bool>,
    pub get: Option<JsValue>,
    pub set: Option<JsValue>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    pub fn data(value: JsValue, writable: bool, enumerable: bool, configurable: bool) -> Self {
        PropertyDescriptor {
            value: Some(value),
            writable: Some(writable),
            enumerable: Some(enumerable),
            configurable: Some(configurable),
            ..Default::default()
        }
    }

    pub fn accessor(get: JsValue, set: JsValue, enumerable: bool, configurable: bool) -> Self {
        PropertyDescriptor {
            get: Some(get),
            set: Some(set),
            enumerable: Some(enumerable),
            configurable: Some(configurable),
            ..Default::default()
        }
    }

    pub fn is_accessor_descriptor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    pub fn is_data_descriptor(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    pub fn is_generic_descriptor(&self) -> bool {
        !self.is_accessor_descriptor() && !self.is_data_descriptor()
    }

    fn is_empty(&self) -> bool {
        self.is_generic_descriptor() && self.enumerable.is_none() && self.configurable.is_none()
    }

    /// True when this descriptor would create a plain writable, enumerable,
    /// configurable data property
    fn is_default_data(&self) -> bool {
        self.get.is_none()
            && self.set.is_none()
            && self.writable == Some(true)
            && self.enumerable == Some(true)
            && self.configurable == Some(true)
    }

    /// Build a fresh property from this descriptor, defaulting absent fields
    fn to_new_property(&self) -> Property {
        let attrs = Attributes::new(
            self.writable.unwrap_or(false),
            self.enumerable.unwrap_or(false),
            self.configurable.unwrap_or(false),
        );
        if self.is_accessor_descriptor() {
            Property::accessor(
                self.get.as_ref().and_then(|v| v.as_object().cloned()),
                self.set.as_ref().and_then(|v| v.as_object().cloned()),
                attrs,
            )
        } else {
            Property::data(self.value.clone().unwrap_or_default(), attrs)
        }
    }
}

fn same_accessor(current: &Option<JsObjectRef>, requested: &JsValue) -> bool {
    match (current, requested) {
        (None, JsValue::Undefined) => true,
        (Some(a), JsValue::Object(b)) => a.ptr_eq(b),
        _ => false,
    }
}

/// ValidateAndApplyPropertyDescriptor for an existing property. Returns
/// false when the change is not allowed.
fn apply_descriptor(current: &mut Property, desc: &PropertyDescriptor) -> bool {
    if desc.is_empty() {
        return true;
    }
    if !current.attrs.configurable() {
        if desc.configurable == Some(true) {
            return false;
        }
        if desc
            .enumerable
            .is_some_and(|e| e != current.attrs.enumerable())
        {
            return false;
        }
        if !desc.is_generic_descriptor() && desc.is_accessor_descriptor() != current.is_accessor() {
            return false;
        }
        match &current.value {
            PropertyValue::Accessor { get, set } => {
                if desc.get.as_ref().is_some_and(|g| !same_accessor(get, g)) {
                    return false;
                }
                if desc.set.as_ref().is_some_and(|s| !same_accessor(set, s)) {
                    return false;
                }
            }
            PropertyValue::Data(value) => {
                if !current.attrs.writable() {
                    if desc.writable == Some(true) {
                        return false;
                    }
                    if desc.value.as_ref().is_some_and(|v| !v.same_value(value)) {
                        return false;
                    }
                }
            }
        }
    }

    if desc.is_accessor_descriptor() && !current.is_accessor() {
        current.value = PropertyValue::Accessor {
            get: None,
            set: None,
        };
        current.attrs = current.attrs.with(Attributes::WRITABLE, false);
    } else if desc.is_data_descriptor() && current.is_accessor() {
        current.value = PropertyValue::Data(JsValue::Undefined);
        current.attrs = current.attrs.with(Attributes::WRITABLE, false);
    }

    match &mut current.value {
        PropertyValue::Data(value) => {
            if let Some(v) = &desc.value {
                *value = v.clone();
            }
            if let Some(w) = desc.writable {
                current.attrs = current.attrs.with(Attributes::WRITABLE, w);
            }
        }
        PropertyValue::Accessor { get, set } => {
            if let Some(g) = &desc.get {
                *get = g.as_object().cloned();
            }
            if let Some(s) = &desc.set {
                *set = s.as_object().cloned();
            }
        }
    }
    if let Some(e) = desc.enumerable {
        current.attrs = current.attrs.with(Attributes::ENUMERABLE, e);
    }
    if let Some(c) = desc.configurable {
        current.attrs = current.attrs.with(Attributes::CONFIGURABLE, c);
    }
    true
}

// ═══════════════════════════════════════════════════════════════════════════════
// Property map
// ═══════════════════════════════════════════════════════════════════════════════

const SMALL_MAP_LIMIT: usize = 8;

/// Insertion-ordered property table; linear scan while small
#[derive(Debug, Clone)]
pub enum PropertyMap {
    Small(Vec<(PropertyKey, Property)>),
    Large(IndexMap<PropertyKey, Property>),
}

impl Default for PropertyMap {
    fn default() -> Self {
        PropertyMap::Small(Vec::new())
    }
}

impl PropertyMap {
    pub fn len(&self) -> usize {
        match self {
            PropertyMap::Small(v) => v.len(),
            PropertyMap::Large(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position and property for `key`
    pub fn get_full(&self, key: &PropertyKey) -> Option<(usize, &Property)> {
        match self {
            PropertyMap::Small(v) => v
                .iter()
                .enumerate()
                .find(|(_, (k, _))| k == key)
                .map(|(i, (_, p))| (i, p)),
            PropertyMap::Large(m) => m.get_full(key).map(|(i, _, p)| (i, p)),
        }
    }

    pub fn get(&self, key: &PropertyKey) -> Option<&Property> {
        self.get_full(key).map(|(_, p)| p)
    }

    pub fn get_mut(&mut self, key: &PropertyKey) -> Option<&mut Property> {
        match self {
            PropertyMap::Small(v) => v.iter_mut().find(|(k, _)| k == key).map(|(_, p)| p),
            PropertyMap::Large(m) => m.get_mut(key),
        }
    }

    /// Entry at `index`, used by inline caches
    pub fn get_index(&self, index: usize) -> Option<(&PropertyKey, &Property)> {
        match self {
            PropertyMap::Small(v) => v.get(index).map(|(k, p)| (k, p)),
            PropertyMap::Large(m) => m.get_index(index),
        }
    }

    pub fn get_index_mut(&mut self, index: usize) -> Option<(&PropertyKey, &mut Property)> {
        match self {
            PropertyMap::Small(v) => v.get_mut(index).map(|(k, p)| (&*k, p)),
            PropertyMap::Large(m) => m.get_index_mut(index).map(|(k, p)| (&*k, p)),
        }
    }

    pub fn contains_key(&self, key: &PropertyKey) -> bool {
        self.get_full(key).is_some()
    }

    /// Insert or replace, keeping the original position on replace
    pub fn insert(&mut self, key: PropertyKey, prop: Property) {
        match self {
            PropertyMap::Small(v) => {
                if let Some(slot) = v.iter_mut().find(|(k, _)| *k == key) {
                    slot.1 = prop;
                    return;
                }
                if v.len() < SMALL_MAP_LIMIT {
                    v.push((key, prop));
                    return;
                }
                let mut map = index_map_new();
                map.reserve(v.len() + 1);
                for (k, p) in v.drain(..) {
                    map.insert(k, p);
                }
                map.insert(key, prop);
                *self = PropertyMap::Large(map);
            }
            PropertyMap::Large(m) => {
                m.insert(key, prop);
            }
        }
    }

    pub fn remove(&mut self, key: &PropertyKey) -> Option<Property> {
        match self {
            PropertyMap::Small(v) => {
                let pos = v.iter().position(|(k, _)| k == key)?;
                Some(v.remove(pos).1)
            }
            PropertyMap::Large(m) => m.shift_remove(key),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = (&PropertyKey, &Property)> + '_> {
        match self {
            PropertyMap::Small(v) => Box::new(v.iter().map(|(k, p)| (k, p))),
            PropertyMap::Large(m) => Box::new(m.iter()),
        }
    }

    pub fn values_mut(&mut self) -> Box<dyn Iterator<Item = &mut Property> + '_> {
        match self {
            PropertyMap::Small(v) => Box::new(v.iter_mut().map(|(_, p)| p)),
            PropertyMap::Large(m) => Box::new(m.values_mut()),
        }
    }

    pub fn clear(&mut self) {
        *self = PropertyMap::Small(Vec::new());
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Functions
// ═══════════════════════════════════════════════════════════════════════════════

/// How a class constructor obtains `this`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// Not a class constructor
    None,
    /// `class A {}`: `this` is allocated on entry
    Base,
    /// `class B extends A {}`: `this` comes from `super()`
    Derived,
}

/// A closure over compiled code
pub struct ScriptFunction {
    pub code: Arc<FunctionCode>,
    pub stash: Option<Gc<Stash>>,
    /// `[[HomeObject]]` for `super` lookups
    pub home_object: Option<JsObjectRef>,
    /// Instance field initializer run on construction
    pub fields: Option<JsObjectRef>,
    pub class_kind: ClassKind,
}

/// A built-in implemented as a plain Rust function. `captures` carries
/// per-instance state (promise resolvers, bound iterators) in a traced slot.
#[derive(Clone)]
pub struct NativeFunction {
    pub func: NativeFn,
    pub captures: Vec<JsValue>,
    pub constructor: bool,
}

/// A host closure
#[derive(Clone)]
pub struct HostFunction {
    pub func: Rc<HostFn>,
    pub constructor: bool,
}

pub struct BoundFunction {
    pub target: JsObjectRef,
    pub this: JsValue,
    pub args: Vec<JsValue>,
}

pub enum JsFunction {
    Script(ScriptFunction),
    Native(NativeFunction),
    Host(HostFunction),
    Bound(BoundFunction),
}

impl JsFunction {
    pub fn is_constructor(&self) -> bool {
        match self {
            JsFunction::Script(f) => f.class_kind != ClassKind::None || f.code.flags.is_constructor(),
            JsFunction::Native(n) => n.constructor,
            JsFunction::Host(h) => h.constructor,
            JsFunction::Bound(b) => b.target.borrow().is_constructor(),
        }
    }

    fn trace(&self, t: &mut Tracer<'_>) {
        match self {
            JsFunction::Script(f) => {
                if let Some(s) = &f.stash {
                    t.edge(s);
                }
                t.object(&f.home_object);
                t.object(&f.fields);
            }
            JsFunction::Native(n) => t.values(&n.captures),
            JsFunction::Host(_) => {}
            JsFunction::Bound(b) => {
                t.edge(&b.target);
                t.value(&b.this);
                t.values(&b.args);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Object kinds
// ═══════════════════════════════════════════════════════════════════════════════

/// Array bookkeeping; elements live in `JsObject::elements` and the
/// property map
#[derive(Debug, Clone, Copy)]
pub struct ArrayState {
    pub length: u32,
    pub length_writable: bool,
}

/// Weak collection identity. Entries are stored on the key objects, tagged
/// with a weak reference to this marker.
#[derive(Debug, Clone, Default)]
pub struct WeakTable(pub Rc<()>);

impl WeakTable {
    pub fn matches(&self, tag: &Weak<()>) -> bool {
        tag.upgrade().is_some_and(|rc| Rc::ptr_eq(&rc, &self.0))
    }
}

/// Private class element
#[derive(Debug, Clone)]
pub enum PrivateElement {
    Field(JsValue),
    Method(JsObjectRef),
    Accessor {
        get: Option<JsObjectRef>,
        set: Option<JsObjectRef>,
    },
}

/// Kind-specific internal slots
pub enum ObjectKind {
    Ordinary,
    Array(ArrayState),
    Function(Box<JsFunction>),
    Error,
    Arguments,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Symbol(JsSymbol),
    Date(f64),
    RegExp(Box<RegExpData>),
    Map(Box<OrderedMap>),
    Set(Box<OrderedMap>),
    WeakMap(WeakTable),
    WeakSet(WeakTable),
    Promise(Box<PromiseState>),
    Proxy(Box<ProxyData>),
    ArrayBuffer(Box<ArrayBufferData>),
    TypedArray(Box<TypedArrayData>),
    DataView(Box<DataViewData>),
    ArrayIterator(Box<ArrayIteratorState>),
    MapIterator(Box<MapIteratorState>),
    SetIterator(Box<MapIteratorState>),
    StringIterator(Box<StringIteratorState>),
    RegExpStringIterator(Box<RegExpStringIteratorState>),
    ForInIterator(Box<ForInState>),
    Generator(Box<GeneratorState>),
    AsyncGenerator(Box<AsyncGeneratorState>),
    AsyncFunction(Box<AsyncFunctionState>),
    Dynamic(Rc<dyn DynamicObject>),
    DynamicArray(Rc<dyn DynamicArray>),
    SharedDynamic(Arc<dyn SharedDynamicObject>),
    Global,
}

impl ObjectKind {
    fn trace(&self, t: &mut Tracer<'_>) {
        match self {
            ObjectKind::Function(f) => f.trace(t),
            ObjectKind::RegExp(r) => r.trace(t),
            ObjectKind::Map(m) | ObjectKind::Set(m) => m.trace(t),
            ObjectKind::Promise(p) => p.trace(t),
            ObjectKind::Proxy(p) => p.trace(t),
            ObjectKind::TypedArray(ta) => ta.trace(t),
            ObjectKind::DataView(dv) => dv.trace(t),
            ObjectKind::ArrayIterator(it) => it.trace(t),
            ObjectKind::MapIterator(it) | ObjectKind::SetIterator(it) => it.trace(t),
            ObjectKind::StringIterator(_) => {}
            ObjectKind::RegExpStringIterator(it) => it.trace(t),
            ObjectKind::ForInIterator(it) => it.trace(t),
            ObjectKind::Generator(g) => g.trace(t),
            ObjectKind::AsyncGenerator(g) => g.trace(t),
            ObjectKind::AsyncFunction(a) => a.trace(t),
            ObjectKind::Ordinary
            | ObjectKind::Array(_)
            | ObjectKind::Error
            | ObjectKind::Arguments
            | ObjectKind::Boolean(_)
            | ObjectKind::Number(_)
            | ObjectKind::String(_)
            | ObjectKind::Symbol(_)
            | ObjectKind::Date(_)
            | ObjectKind::WeakMap(_)
            | ObjectKind::WeakSet(_)
            | ObjectKind::ArrayBuffer(_)
            | ObjectKind::Dynamic(_)
            | ObjectKind::DynamicArray(_)
            | ObjectKind::SharedDynamic(_)
            | ObjectKind::Global => {}
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JsObject
// ═══════════════════════════════════════════════════════════════════════════════

/// A heap object
pub struct JsObject {
    pub kind: ObjectKind,
    pub prototype: Option<JsObjectRef>,
    pub extensible: bool,
    pub properties: PropertyMap,
    /// Dense array elements `0..elements.len()`, all writable, enumerable
    /// and configurable. Any other index lives in `properties`.
    pub elements: Vec<JsValue>,
    pub private_elements: Vec<(JsSymbol, PrivateElement)>,
    /// Values this object keys in weak collections
    pub weak_entries: Vec<(Weak<()>, JsValue)>,
}

impl Traceable for JsObject {
    fn trace(&self, t: &mut Tracer<'_>) {
        t.object(&self.prototype);
        for (_, p) in self.properties.iter() {
            p.trace(t);
        }
        t.values(&self.elements);
        for (_, el) in &self.private_elements {
            match el {
                PrivateElement::Field(v) => t.value(v),
                PrivateElement::Method(m) => t.edge(m),
                PrivateElement::Accessor { get, set } => {
                    t.object(get);
                    t.object(set);
                }
            }
        }
        for (_, v) in &self.weak_entries {
            t.value(v);
        }
        self.kind.trace(t);
    }

    fn clear(&mut self) {
        self.kind = ObjectKind::Ordinary;
        self.prototype = None;
        self.properties.clear();
        self.elements = Vec::new();
        self.private_elements = Vec::new();
        self.weak_entries = Vec::new();
    }
}

// Releasing a long acyclic chain drops one object per nesting level
impl Drop for JsObject {
    fn drop(&mut self) {
        crate::stack::guard(|| self.clear());
    }
}

impl JsObject {
    pub fn new(kind: ObjectKind, prototype: Option<JsObjectRef>) -> Self {
        JsObject {
            kind,
            prototype,
            extensible: true,
            properties: PropertyMap::default(),
            elements: Vec::new(),
            private_elements: Vec::new(),
            weak_entries: Vec::new(),
        }
    }

    pub fn ordinary(prototype: Option<JsObjectRef>) -> Self {
        JsObject::new(ObjectKind::Ordinary, prototype)
    }

    /// Array with dense elements
    pub fn array(prototype: Option<JsObjectRef>, elements: Vec<JsValue>) -> Self {
        let length = elements.len() as u32;
        let mut obj = JsObject::new(
            ObjectKind::Array(ArrayState {
                length,
                length_writable: true,
            }),
            prototype,
        );
        obj.elements = elements;
        obj
    }

    /// Class tag as used by `Object.prototype.toString` and diagnostics
    pub fn class_name(&self) -> &'static str {
        match &self.kind {
            ObjectKind::Ordinary | ObjectKind::Dynamic(_) | ObjectKind::SharedDynamic(_) => "Object",
            ObjectKind::Array(_) | ObjectKind::DynamicArray(_) => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Error => "Error",
            ObjectKind::Arguments => "Arguments",
            ObjectKind::Boolean(_) => "Boolean",
            ObjectKind::Number(_) => "Number",
            ObjectKind::String(_) => "String",
            ObjectKind::Symbol(_) => "Symbol",
            ObjectKind::Date(_) => "Date",
            ObjectKind::RegExp(_) => "RegExp",
            ObjectKind::Map(_) => "Map",
            ObjectKind::Set(_) => "Set",
            ObjectKind::WeakMap(_) => "WeakMap",
            ObjectKind::WeakSet(_) => "WeakSet",
            ObjectKind::Promise(_) => "Promise",
            ObjectKind::Proxy(p) => {
                if p.callable {
                    "Function"
                } else {
                    "Object"
                }
            }
            ObjectKind::ArrayBuffer(_) => "ArrayBuffer",
            ObjectKind::TypedArray(ta) => ta.kind.name(),
            ObjectKind::DataView(_) => "DataView",
            ObjectKind::ArrayIterator(_) => "Array Iterator",
            ObjectKind::MapIterator(_) => "Map Iterator",
            ObjectKind::SetIterator(_) => "Set Iterator",
            ObjectKind::StringIterator(_) => "String Iterator",
            ObjectKind::RegExpStringIterator(_) => "RegExp String Iterator",
            ObjectKind::ForInIterator(_) => "Object",
            ObjectKind::Generator(_) => "Generator",
            ObjectKind::AsyncGenerator(_) => "AsyncGenerator",
            ObjectKind::AsyncFunction(_) => "Object",
            ObjectKind::Global => "global",
        }
    }

    pub fn is_callable(&self) -> bool {
        match &self.kind {
            ObjectKind::Function(_) => true,
            ObjectKind::Proxy(p) => p.callable,
            _ => false,
        }
    }

    pub fn is_constructor(&self) -> bool {
        match &self.kind {
            ObjectKind::Function(f) => f.is_constructor(),
            ObjectKind::Proxy(p) => p.constructor,
            _ => false,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array(_) | ObjectKind::DynamicArray(_))
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.kind, ObjectKind::Proxy(_))
    }

    /// Objects whose internal methods are not the ordinary ones
    pub fn is_exotic(&self) -> bool {
        matches!(
            self.kind,
            ObjectKind::Proxy(_)
                | ObjectKind::TypedArray(_)
                | ObjectKind::Dynamic(_)
                | ObjectKind::DynamicArray(_)
                | ObjectKind::SharedDynamic(_)
                | ObjectKind::Global
                | ObjectKind::String(_)
        )
    }

    pub fn function(&self) -> Option<&JsFunction> {
        match &self.kind {
            ObjectKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn array_length(&self) -> Option<u32> {
        match &self.kind {
            ObjectKind::Array(a) => Some(a.length),
            _ => None,
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Own properties
    // ───────────────────────────────────────────────────────────────────────

    /// Own property lookup with ordinary, array and string-wrapper semantics
    pub fn get_own(&self, key: &PropertyKey) -> Option<Property> {
        if let PropertyKey::Index(i) = key {
            if let Some(v) = self.elements.get(*i as usize) {
                return Some(Property::data(v.clone(), Attributes::DEFAULT));
            }
            if let ObjectKind::String(s) = &self.kind {
                if let Some(u) = s.code_unit_at(*i as usize) {
                    return Some(Property::data(
                        JsValue::String(JsString::from_utf16(&[u])),
                        Attributes::new(false, true, false),
                    ));
                }
            }
        }
        if let ObjectKind::Array(a) = &self.kind {
            if key.eq_str("length") {
                return Some(Property::data(
                    JsValue::from(a.length),
                    Attributes::new(a.length_writable, false, false),
                ));
            }
        }
        self.properties.get(key).cloned()
    }

    /// Own data value without cloning the whole property
    pub fn get_own_value(&self, key: &PropertyKey) -> Option<JsValue> {
        if let PropertyKey::Index(i) = key {
            if let Some(v) = self.elements.get(*i as usize) {
                return Some(v.clone());
            }
        }
        match self.properties.get(key) {
            Some(p) => p.data_value().cloned(),
            None => self.get_own(key).and_then(|p| p.data_value().cloned()),
        }
    }

    pub fn has_own(&self, key: &PropertyKey) -> bool {
        if let PropertyKey::Index(i) = key {
            if (*i as usize) < self.elements.len() {
                return true;
            }
        }
        self.properties.contains_key(key) || self.get_own(key).is_some()
    }

    /// Move dense elements into the property map so they can carry
    /// non-default attributes
    pub fn spill_elements(&mut self) {
        let elements = std::mem::take(&mut self.elements);
        for (i, v) in elements.into_iter().enumerate() {
            self.properties
                .insert(PropertyKey::from(i), Property::data(v, Attributes::DEFAULT));
        }
    }

    /// Ordinary `[[DefineOwnProperty]]` including array exotic behaviour
    pub fn define_own_property(&mut self, key: PropertyKey, desc: &PropertyDescriptor) -> bool {
        if let ObjectKind::Array(state) = self.kind {
            if key.eq_str("length") {
                return self.define_array_length(state, desc);
            }
            if let PropertyKey::Index(i) = key {
                if i >= state.length && !state.length_writable {
                    return false;
                }
                if !self.define_element(i, desc) {
                    return false;
                }
                if i >= state.length {
                    if let ObjectKind::Array(a) = &mut self.kind {
                        a.length = i + 1;
                    }
                }
                return true;
            }
        }
        if let ObjectKind::String(s) = &self.kind {
            if let PropertyKey::Index(i) = key {
                if (i as usize) < s.len() {
                    let Some(mut current) = self.get_own(&key) else {
                        return false;
                    };
                    return apply_descriptor(&mut current, desc)
                        && current.data_value().is_some_and(|v| {
                            self.get_own_value(&key).is_some_and(|old| old.same_value(v))
                        });
                }
            }
        }
        self.define_in_map(key, desc)
    }

    fn define_in_map(&mut self, key: PropertyKey, desc: &PropertyDescriptor) -> bool {
        match self.properties.get_mut(&key) {
            Some(current) => apply_descriptor(current, desc),
            None => {
                if !self.extensible {
                    return false;
                }
                self.properties.insert(key, desc.to_new_property());
                true
            }
        }
    }

    fn define_element(&mut self, index: u32, desc: &PropertyDescriptor) -> bool {
        let i = index as usize;
        if i < self.elements.len() {
            let plain_update = desc.get.is_none()
                && desc.set.is_none()
                && desc.writable != Some(false)
                && desc.enumerable != Some(false)
                && desc.configurable != Some(false);
            if plain_update {
                if let (Some(v), Some(slot)) = (&desc.value, self.elements.get_mut(i)) {
                    *slot = v.clone();
                }
                return true;
            }
            self.spill_elements();
            return self.define_in_map(PropertyKey::Index(index), desc);
        }
        let key = PropertyKey::Index(index);
        if i == self.elements.len()
            && self.extensible
            && desc.is_default_data()
            && !self.properties.contains_key(&key)
        {
            self.elements.push(desc.value.clone().unwrap_or_default());
            return true;
        }
        self.define_in_map(key, desc)
    }

    fn define_array_length(&mut self, state: ArrayState, desc: &PropertyDescriptor) -> bool {
        if desc.is_accessor_descriptor()
            || desc.configurable == Some(true)
            || desc.enumerable == Some(true)
        {
            return false;
        }
        let Some(value) = &desc.value else {
            if desc.writable == Some(true) && !state.length_writable {
                return false;
            }
            if desc.writable == Some(false) {
                if let ObjectKind::Array(a) = &mut self.kind {
                    a.length_writable = false;
                }
            }
            return true;
        };
        let Some(new_len) = value.as_number().and_then(|n| {
            let len = n as u32;
            (len as f64 == n).then_some(len)
        }) else {
            return false;
        };
        if new_len != state.length && !state.length_writable {
            return false;
        }
        if desc.writable == Some(true) && !state.length_writable {
            return false;
        }
        let ok = self.set_array_length(new_len);
        if desc.writable == Some(false) {
            if let ObjectKind::Array(a) = &mut self.kind {
                a.length_writable = false;
            }
        }
        ok
    }

    /// Set array length, deleting elements from the top down. Stops at the
    /// first non-configurable element and reports failure.
    pub fn set_array_length(&mut self, new_len: u32) -> bool {
        let ObjectKind::Array(state) = self.kind else {
            return false;
        };
        if new_len >= state.length {
            if let ObjectKind::Array(a) = &mut self.kind {
                a.length = new_len;
            }
            return true;
        }
        if self.elements.len() > new_len as usize {
            self.elements.truncate(new_len as usize);
        }
        let mut doomed: Vec<u32> = self
            .properties
            .iter()
            .filter_map(|(k, _)| k.as_index())
            .filter(|&i| i >= new_len)
            .collect();
        doomed.sort_unstable_by(|a, b| b.cmp(a));
        let mut final_len = new_len;
        for i in doomed {
            let key = PropertyKey::Index(i);
            let configurable = self
                .properties
                .get(&key)
                .is_none_or(|p| p.attrs.configurable());
            if !configurable {
                final_len = i + 1;
                break;
            }
            self.properties.remove(&key);
        }
        if let ObjectKind::Array(a) = &mut self.kind {
            a.length = final_len;
        }
        final_len == new_len
    }

    /// Create or overwrite a plain data property, ignoring attributes of an
    /// existing property. Used while building fresh objects.
    pub fn set_property(&mut self, key: PropertyKey, value: JsValue) {
        if let PropertyKey::Index(i) = key {
            if let Some(slot) = self.elements.get_mut(i as usize) {
                *slot = value;
                return;
            }
            if let ObjectKind::Array(_) = self.kind {
                self.define_own_property(key, &PropertyDescriptor::data(value, true, true, true));
                return;
            }
        }
        self.properties
            .insert(key, Property::data(value, Attributes::DEFAULT));
    }

    /// Define a property with explicit attributes, replacing any existing one
    pub fn define_property(&mut self, key: PropertyKey, prop: Property) {
        if let PropertyKey::Index(i) = key {
            if self.is_array() && (i as usize) < self.elements.len() {
                self.spill_elements();
            }
            if let ObjectKind::Array(a) = &mut self.kind {
                if i >= a.length {
                    a.length = i + 1;
                }
            }
        }
        self.properties.insert(key, prop);
    }

    /// Assign to an existing own writable data property. Returns false when
    /// the property is missing, an accessor or read-only.
    pub fn write_existing(&mut self, key: &PropertyKey, value: &JsValue) -> Option<bool> {
        if let PropertyKey::Index(i) = key {
            if let Some(slot) = self.elements.get_mut(*i as usize) {
                *slot = value.clone();
                return Some(true);
            }
        }
        if let ObjectKind::Array(state) = self.kind {
            if key.eq_str("length") {
                if !state.length_writable {
                    return Some(false);
                }
                return None;
            }
        }
        let prop = self.properties.get_mut(key)?;
        match &mut prop.value {
            PropertyValue::Data(v) if prop.attrs.writable() => {
                *v = value.clone();
                Some(true)
            }
            PropertyValue::Data(_) => Some(false),
            PropertyValue::Accessor { .. } => None,
        }
    }

    /// Ordinary `[[Delete]]`
    pub fn delete_own(&mut self, key: &PropertyKey) -> bool {
        if let PropertyKey::Index(i) = key {
            let i = *i as usize;
            if i < self.elements.len() {
                if i + 1 == self.elements.len() {
                    self.elements.pop();
                } else {
                    self.spill_elements();
                    self.properties.remove(key);
                }
                return true;
            }
            if let ObjectKind::String(s) = &self.kind {
                if i < s.len() {
                    return false;
                }
            }
        }
        if let ObjectKind::Array(_) = self.kind {
            if key.eq_str("length") {
                return false;
            }
        }
        match self.properties.get(key) {
            None => true,
            Some(p) if p.attrs.configurable() => {
                self.properties.remove(key);
                true
            }
            Some(_) => false,
        }
    }

    /// Ordinary `[[OwnPropertyKeys]]`: indices ascending, then strings and
    /// symbols in insertion order
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let mut indices: Vec<u32> = (0..self.elements.len() as u32).collect();
        if let ObjectKind::String(s) = &self.kind {
            indices.extend(0..s.len() as u32);
        }
        let mut strings = Vec::new();
        let mut symbols = Vec::new();
        for (k, _) in self.properties.iter() {
            match k {
                PropertyKey::Index(i) => indices.push(*i),
                PropertyKey::String(_) => strings.push(k.clone()),
                PropertyKey::Symbol(_) => symbols.push(k.clone()),
            }
        }
        indices.sort_unstable();
        indices.dedup();
        let mut keys: Vec<PropertyKey> = indices.into_iter().map(PropertyKey::Index).collect();
        if let ObjectKind::Array(_) = self.kind {
            keys.push(PropertyKey::from("length"));
        }
        keys.extend(strings);
        keys.extend(symbols);
        keys
    }

    /// Make every own property non-configurable (and non-writable when
    /// `freeze`), then prevent extensions
    pub fn set_integrity(&mut self, freeze: bool) {
        self.extensible = false;
        if !self.elements.is_empty() {
            self.spill_elements();
        }
        for prop in self.properties.values_mut() {
            let mut attrs = prop.attrs.with(Attributes::CONFIGURABLE, false);
            if freeze && !prop.is_accessor() {
                attrs = attrs.with(Attributes::WRITABLE, false);
            }
            prop.attrs = attrs;
        }
        if freeze {
            if let ObjectKind::Array(a) = &mut self.kind {
                a.length_writable = false;
            }
        }
    }

    /// `Object.isFrozen` / `Object.isSealed` for ordinary objects
    pub fn test_integrity(&self, frozen: bool) -> bool {
        if self.extensible {
            return false;
        }
        if frozen && !self.elements.is_empty() {
            return false;
        }
        if !self.elements.is_empty() {
            return false;
        }
        if let ObjectKind::Array(a) = &self.kind {
            if frozen && a.length_writable {
                return false;
            }
        }
        self.properties.iter().all(|(_, p)| {
            !p.attrs.configurable() && (!frozen || p.is_accessor() || !p.attrs.writable())
        })
    }

    // ───────────────────────────────────────────────────────────────────────
    // Private elements
    // ───────────────────────────────────────────────────────────────────────

    pub fn private_element(&self, name: &JsSymbol) -> Option<&PrivateElement> {
        self.private_elements
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
    }

    pub fn private_element_mut(&mut self, name: &JsSymbol) -> Option<&mut PrivateElement> {
        self.private_elements
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Weak collections
    // ───────────────────────────────────────────────────────────────────────

    pub fn weak_entry(&self, table: &WeakTable) -> Option<&JsValue> {
        self.weak_entries
            .iter()
            .find(|(tag, _)| table.matches(tag))
            .map(|(_, v)| v)
    }

    pub fn set_weak_entry(&mut self, table: &WeakTable, value: JsValue) {
        self.weak_entries.retain(|(tag, _)| tag.strong_count() > 0);
        if let Some(slot) = self
            .weak_entries
            .iter_mut()
            .find(|(tag, _)| table.matches(tag))
        {
            slot.1 = value;
            return;
        }
        self.weak_entries.push((Rc::downgrade(&table.0), value));
    }

    pub fn remove_weak_entry(&mut self, table: &WeakTable) -> bool {
        let before = self.weak_entries.len();
        self.weak_entries.retain(|(tag, _)| !table.matches(tag) && tag.strong_count() > 0);
        self.weak_entries.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(values: &[i32]) -> JsObject {
        JsObject::array(None, values.iter().map(|&v| JsValue::from(v)).collect())
    }

    #[test]
    fn property_map_grows_past_small_limit() {
        let mut map = PropertyMap::default();
        for i in 0..20 {
            map.insert(
                PropertyKey::from(format!("k{i}")),
                Property::data(JsValue::from(i), Attributes::DEFAULT),
            );
        }
        assert!(matches!(map, PropertyMap::Large(_)));
        assert_eq!(map.len(), 20);
        let (idx, _) = map.get_full(&PropertyKey::from("k3")).unwrap_or((99, &Property::data(JsValue::Undefined, Attributes::NONE)));
        assert_eq!(idx, 3);
        map.remove(&PropertyKey::from("k0"));
        let first = map.get_index(0).map(|(k, _)| k.clone());
        assert_eq!(first, Some(PropertyKey::from("k1")));
    }

    #[test]
    fn non_configurable_rules() {
        let mut obj = JsObject::ordinary(None);
        let key = PropertyKey::from("x");
        assert!(obj.define_own_property(key.clone(), &PropertyDescriptor::data(JsValue::from(1), false, true, false)));
        // cannot become writable or change value
        assert!(!obj.define_own_property(key.clone(), &PropertyDescriptor { writable: Some(true), ..Default::default() }));
        assert!(!obj.define_own_property(key.clone(), &PropertyDescriptor { value: Some(JsValue::from(2)), ..Default::default() }));
        // same value is fine
        assert!(obj.define_own_property(key.clone(), &PropertyDescriptor { value: Some(JsValue::from(1)), ..Default::default() }));
        // cannot become an accessor
        assert!(!obj.define_own_property(key, &PropertyDescriptor::accessor(JsValue::Undefined, JsValue::Undefined, true, false)));
    }

    #[test]
    fn array_length_tracks_indices() {
        let mut arr = array(&[1, 2, 3]);
        assert!(arr.define_own_property(PropertyKey::Index(9), &PropertyDescriptor::data(JsValue::from(10), true, true, true)));
        assert_eq!(arr.array_length(), Some(10));
        assert!(arr.set_array_length(2));
        assert_eq!(arr.array_length(), Some(2));
        assert_eq!(arr.elements.len(), 2);
        assert!(!arr.has_own(&PropertyKey::Index(9)));
    }

    #[test]
    fn shrinking_stops_at_non_configurable() {
        let mut arr = array(&[1, 2, 3, 4]);
        assert!(arr.define_own_property(PropertyKey::Index(2), &PropertyDescriptor { configurable: Some(false), ..Default::default() }));
        assert!(!arr.set_array_length(0));
        assert_eq!(arr.array_length(), Some(3));
    }

    #[test]
    fn own_keys_order() {
        let mut obj = JsObject::ordinary(None);
        obj.set_property(PropertyKey::from("b"), JsValue::from(1));
        obj.set_property(PropertyKey::from("2"), JsValue::from(1));
        obj.set_property(PropertyKey::Symbol(JsSymbol::new(None)), JsValue::from(1));
        obj.set_property(PropertyKey::from("a"), JsValue::from(1));
        obj.set_property(PropertyKey::from("0"), JsValue::from(1));
        let keys: Vec<String> = obj.own_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["0", "2", "b", "a", "Symbol()"]);
    }

    #[test]
    fn frozen_array_rejects_writes() {
        let mut arr = array(&[1, 2]);
        arr.set_integrity(true);
        assert_eq!(arr.write_existing(&PropertyKey::Index(0), &JsValue::from(5)), Some(false));
        assert!(arr.test_integrity(true));
    }
}
