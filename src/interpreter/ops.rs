//! Abstract operations
//!
//! Type conversions, the object internal methods with their exotic
//! dispatch (proxies, typed arrays, host objects, the lazy global), equality,
//! relational comparison and the iterator protocol. Everything here may run
//! script code (getters, traps, `valueOf`) and so takes `&mut Interpreter`.

use std::rc::Rc;
use std::sync::Arc;

use crate::bridge::dynamic::{DynamicArray, DynamicObject, SharedDynamicObject};
use crate::bridge::{from_json, to_json};
use crate::error::JsError;
use crate::number;
use crate::object::{
    JsFunction, JsObject, JsObjectRef, ObjectKind, Property, PropertyDescriptor, PropertyValue,
};
use crate::string::JsString;
use crate::value::{JsSymbol, JsValue, MAX_SAFE_INT, PropertyKey};

use super::Interpreter;
use super::builtins::{proxy, typed_array};
use super::realm::Intrinsic;

/// Upper bound on spread and `apply` argument lists
pub(crate) const MAX_ARGUMENTS: u64 = 1 << 20;

/// Preferred type for `ToPrimitive`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Default,
    Number,
    String,
}

impl Hint {
    fn as_str(self) -> &'static str {
        match self {
            Hint::Default => "default",
            Hint::Number => "number",
            Hint::String => "string",
        }
    }
}

/// Which part of each own enumerable property to collect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumKind {
    Keys,
    Values,
    Entries,
}

/// Iterator record: the iterator, its cached `next` method and whether it
/// has reported completion
#[derive(Debug, Clone)]
pub struct IteratorRecord {
    pub iterator: JsValue,
    pub next: JsValue,
    pub done: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Exotic dispatch
// ═══════════════════════════════════════════════════════════════════════════════

/// Which internal-method family an object uses
enum Exotic {
    Ordinary,
    Proxy,
    TypedArray,
    Dynamic(Rc<dyn DynamicObject>),
    DynamicArray(Rc<dyn DynamicArray>),
    Shared(Arc<dyn SharedDynamicObject>),
    Global,
}

fn exotic(obj: &JsObjectRef) -> Exotic {
    match &obj.borrow().kind {
        ObjectKind::Proxy(_) => Exotic::Proxy,
        ObjectKind::TypedArray(_) => Exotic::TypedArray,
        ObjectKind::Dynamic(d) => Exotic::Dynamic(d.clone()),
        ObjectKind::DynamicArray(a) => Exotic::DynamicArray(a.clone()),
        ObjectKind::SharedDynamic(s) => Exotic::Shared(s.clone()),
        ObjectKind::Global => Exotic::Global,
        _ => Exotic::Ordinary,
    }
}

/// `CanonicalNumericIndexString` for typed-array keys
fn canonical_numeric(key: &PropertyKey) -> Option<f64> {
    match key {
        PropertyKey::Index(i) => Some(f64::from(*i)),
        PropertyKey::String(s) => {
            if *s == "-0" {
                return Some(-0.0);
            }
            let n = number::string_to_number(s);
            (number::number_to_js_string(n) == *s).then_some(n)
        }
        PropertyKey::Symbol(_) => None,
    }
}

/// String key for host objects (`None` for symbols)
fn host_key(key: &PropertyKey) -> Option<String> {
    match key {
        PropertyKey::Index(i) => Some(i.to_string()),
        PropertyKey::String(s) => Some(s.to_std_string()),
        PropertyKey::Symbol(_) => None,
    }
}

fn host_array_index(key: &PropertyKey) -> Option<usize> {
    key.as_index().map(|i| i as usize)
}

fn same_object(value: &JsValue, obj: &JsObjectRef) -> bool {
    matches!(value, JsValue::Object(o) if o.ptr_eq(obj))
}

/// Result of looking a key up on one object of a chain
enum Lookup {
    Value(JsValue),
    Getter(Option<JsObjectRef>),
    Missing(Option<JsObjectRef>),
}

fn ordinary_lookup(o: &JsObject, key: &PropertyKey) -> Lookup {
    if let PropertyKey::Index(i) = key {
        if let Some(v) = o.elements.get(*i as usize) {
            return Lookup::Value(v.clone());
        }
    }
    let prop = match o.properties.get(key) {
        Some(p) => Some(p.clone()),
        None if matches!(o.kind, ObjectKind::Array(_) | ObjectKind::String(_)) => o.get_own(key),
        None => None,
    };
    match prop {
        Some(Property {
            value: PropertyValue::Data(v),
            ..
        }) => Lookup::Value(v),
        Some(Property {
            value: PropertyValue::Accessor { get, .. },
            ..
        }) => Lookup::Getter(get),
        None => Lookup::Missing(o.prototype.clone()),
    }
}

/// What an assignment finds on one object of a chain
enum SetLookup {
    Writable,
    ReadOnly,
    Setter(Option<JsObjectRef>),
    Missing(Option<JsObjectRef>),
}

fn ordinary_set_lookup(o: &JsObject, key: &PropertyKey) -> SetLookup {
    match o.get_own(key) {
        Some(p) => match p.value {
            PropertyValue::Data(_) if p.attrs.writable() => SetLookup::Writable,
            PropertyValue::Data(_) => SetLookup::ReadOnly,
            PropertyValue::Accessor { set, .. } => SetLookup::Setter(set),
        },
        None => SetLookup::Missing(o.prototype.clone()),
    }
}

fn host_data(value: JsValue, writable: bool, enumerable: bool) -> PropertyDescriptor {
    PropertyDescriptor::data(value, writable, enumerable, true)
}

/// Short rendering of a value for error messages
pub(crate) fn describe(value: &JsValue) -> String {
    match value {
        JsValue::String(s) => format!("\"{s}\""),
        JsValue::Object(o) => match o.try_borrow() {
            Some(b) if b.is_callable() => {
                let name = b
                    .properties
                    .get(&PropertyKey::from("name"))
                    .and_then(|p| p.data_value().cloned())
                    .and_then(|v| v.as_string().cloned())
                    .unwrap_or_default();
                if name.is_empty() {
                    "function".to_string()
                } else {
                    format!("function {name}")
                }
            }
            Some(b) => format!("#<{}>", b.class_name()),
            None => "#<Object>".to_string(),
        },
        other => other.display_hint(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Conversions
// ═══════════════════════════════════════════════════════════════════════════════

impl Interpreter {
    /// ES `ToPrimitive`
    pub fn to_primitive(&mut self, value: &JsValue, hint: Hint) -> Result<JsValue, JsError> {
        let JsValue::Object(obj) = value else {
            return Ok(value.clone());
        };
        let exotic_to_prim = self.get_method(value, &PropertyKey::Symbol(JsSymbol::to_primitive()))?;
        if let Some(method) = exotic_to_prim {
            let result = self.call_function(&method, value.clone(), &[JsValue::from(hint.as_str())])?;
            if result.is_object() {
                return Err(JsError::type_error("Cannot convert object to primitive value"));
            }
            return Ok(result);
        }
        let order: [&str; 2] = if hint == Hint::String {
            ["toString", "valueOf"]
        } else {
            ["valueOf", "toString"]
        };
        for name in order {
            let method = self.get(obj, &PropertyKey::from(name))?;
            if method.is_callable() {
                let result = self.call_function(&method, value.clone(), &[])?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
        Err(JsError::type_error("Cannot convert object to primitive value"))
    }

    /// ES `ToNumber`
    pub fn to_number(&mut self, value: &JsValue) -> Result<f64, JsError> {
        match value {
            JsValue::Int(i) => Ok(*i as f64),
            JsValue::Float(f) => Ok(*f),
            JsValue::Symbol(_) => Err(JsError::type_error("Cannot convert a Symbol value to a number")),
            JsValue::Object(_) => {
                let prim = self.to_primitive(value, Hint::Number)?;
                self.to_number(&prim)
            }
            other => Ok(other.primitive_to_number().unwrap_or(f64::NAN)),
        }
    }

    /// ES `ToNumeric`; there are no BigInts, so this is `ToNumber` as a value
    pub fn to_numeric(&mut self, value: &JsValue) -> Result<JsValue, JsError> {
        match value {
            JsValue::Int(_) | JsValue::Float(_) => Ok(value.clone()),
            other => Ok(JsValue::number(self.to_number(other)?)),
        }
    }

    /// ES `ToString`
    pub fn to_string(&mut self, value: &JsValue) -> Result<JsString, JsError> {
        match value {
            JsValue::String(s) => Ok(s.clone()),
            JsValue::Symbol(_) => Err(JsError::type_error("Cannot convert a Symbol value to a string")),
            JsValue::Object(_) => {
                let prim = self.to_primitive(value, Hint::String)?;
                self.to_string(&prim)
            }
            other => Ok(other.primitive_to_string().unwrap_or_default()),
        }
    }

    /// ES `ToPropertyKey`
    pub fn to_property_key(&mut self, value: &JsValue) -> Result<PropertyKey, JsError> {
        match value {
            JsValue::Symbol(s) => Ok(PropertyKey::Symbol(s.clone())),
            JsValue::String(s) => Ok(PropertyKey::from(s)),
            JsValue::Int(i) if (0..i64::from(u32::MAX)).contains(i) => Ok(PropertyKey::Index(*i as u32)),
            JsValue::Object(_) => {
                let prim = self.to_primitive(value, Hint::String)?;
                self.to_property_key(&prim)
            }
            other => Ok(PropertyKey::from(other.primitive_to_string().unwrap_or_default())),
        }
    }

    /// ES `ToObject`
    pub fn to_object(&mut self, value: &JsValue) -> Result<JsObjectRef, JsError> {
        let (kind, proto) = match value {
            JsValue::Object(o) => return Ok(o.clone()),
            JsValue::Undefined | JsValue::Null => {
                return Err(JsError::type_error("Cannot convert undefined or null to object"));
            }
            JsValue::Bool(b) => (ObjectKind::Boolean(*b), Intrinsic::BooleanPrototype),
            JsValue::Int(_) | JsValue::Float(_) => (
                ObjectKind::Number(value.as_number().unwrap_or_default()),
                Intrinsic::NumberPrototype,
            ),
            JsValue::String(s) => (ObjectKind::String(s.clone()), Intrinsic::StringPrototype),
            JsValue::Symbol(s) => (ObjectKind::Symbol(s.clone()), Intrinsic::SymbolPrototype),
        };
        let proto = self.intrinsic(proto);
        let mut obj = JsObject::new(kind, Some(proto));
        if let JsValue::String(s) = value {
            obj.define_property(
                PropertyKey::from("length"),
                Property::data(JsValue::from(s.len()), crate::object::Attributes::NONE),
            );
        }
        Ok(self.alloc(obj))
    }

    /// ES `ToIntegerOrInfinity`
    pub fn to_integer_or_infinity(&mut self, value: &JsValue) -> Result<f64, JsError> {
        Ok(number::to_integer_or_infinity(self.to_number(value)?))
    }

    /// ES `ToLength`
    pub fn to_length(&mut self, value: &JsValue) -> Result<u64, JsError> {
        let len = self.to_integer_or_infinity(value)?;
        if len <= 0.0 {
            return Ok(0);
        }
        Ok(len.min((MAX_SAFE_INT - 1) as f64) as u64)
    }

    /// ES `ToIndex`
    pub fn to_index(&mut self, value: &JsValue, what: &str) -> Result<usize, JsError> {
        if value.is_undefined() {
            return Ok(0);
        }
        let index = self.to_integer_or_infinity(value)?;
        if !(0.0..=(MAX_SAFE_INT - 1) as f64).contains(&index) {
            return Err(JsError::range_error(format!("Invalid {what}")));
        }
        Ok(index as usize)
    }

    pub fn to_int32(&mut self, value: &JsValue) -> Result<i32, JsError> {
        match value {
            JsValue::Int(i) if (i64::from(i32::MIN)..=i64::from(i32::MAX)).contains(i) => Ok(*i as i32),
            other => Ok(number::to_int32(self.to_number(other)?)),
        }
    }

    pub fn to_uint32(&mut self, value: &JsValue) -> Result<u32, JsError> {
        Ok(number::to_uint32(self.to_number(value)?))
    }

    /// Prototype object used for property lookups on a primitive
    pub(crate) fn primitive_prototype(&mut self, value: &JsValue) -> Option<JsObjectRef> {
        let which = match value {
            JsValue::Bool(_) => Intrinsic::BooleanPrototype,
            JsValue::Int(_) | JsValue::Float(_) => Intrinsic::NumberPrototype,
            JsValue::String(_) => Intrinsic::StringPrototype,
            JsValue::Symbol(_) => Intrinsic::SymbolPrototype,
            JsValue::Undefined | JsValue::Null | JsValue::Object(_) => return None,
        };
        Some(self.intrinsic(which))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Property access
    // ═══════════════════════════════════════════════════════════════════════

    /// `[[Get]]` with the object itself as receiver
    pub fn get(&mut self, obj: &JsObjectRef, key: &PropertyKey) -> Result<JsValue, JsError> {
        self.get_with_receiver(obj, key, &JsValue::Object(obj.clone()))
    }

    /// `[[Get]]`
    pub fn get_with_receiver(
        &mut self,
        obj: &JsObjectRef,
        key: &PropertyKey,
        receiver: &JsValue,
    ) -> Result<JsValue, JsError> {
        let mut current = obj.clone();
        loop {
            let found = match exotic(&current) {
                Exotic::Ordinary => ordinary_lookup(&current.borrow(), key),
                Exotic::Proxy => return self.nested(|interp| proxy::get(interp, &current, key, receiver)),
                Exotic::TypedArray => match canonical_numeric(key) {
                    Some(index) => {
                        return Ok(typed_array::get_element(&current.borrow(), index).unwrap_or_default());
                    }
                    None => ordinary_lookup(&current.borrow(), key),
                },
                Exotic::Dynamic(d) => match host_key(key).and_then(|k| d.get(&k)) {
                    Some(v) => Lookup::Value(v),
                    None => ordinary_lookup(&current.borrow(), key),
                },
                Exotic::DynamicArray(a) => {
                    if let Some(i) = host_array_index(key) {
                        match a.get(i) {
                            Some(v) => Lookup::Value(v),
                            None if i < a.len() => Lookup::Value(JsValue::Undefined),
                            None => ordinary_lookup(&current.borrow(), key),
                        }
                    } else if key.eq_str("length") {
                        Lookup::Value(JsValue::from(a.len()))
                    } else {
                        ordinary_lookup(&current.borrow(), key)
                    }
                }
                Exotic::Shared(s) => match host_key(key).and_then(|k| s.get(&k)) {
                    Some(json) => Lookup::Value(from_json(self, &json)),
                    None => ordinary_lookup(&current.borrow(), key),
                },
                Exotic::Global => {
                    self.materialize_global(key);
                    ordinary_lookup(&current.borrow(), key)
                }
            };
            match found {
                Lookup::Value(v) => return Ok(v),
                Lookup::Getter(Some(getter)) => {
                    return self.call_function(&JsValue::Object(getter), receiver.clone(), &[]);
                }
                Lookup::Getter(None) | Lookup::Missing(None) => return Ok(JsValue::Undefined),
                Lookup::Missing(Some(proto)) => current = proto,
            }
        }
    }

    /// `GetV`: property read on any value, primitives through their
    /// prototype
    pub fn get_value(&mut self, base: &JsValue, key: &PropertyKey) -> Result<JsValue, JsError> {
        match base {
            JsValue::Object(obj) => self.get_with_receiver(obj, key, base),
            JsValue::Undefined | JsValue::Null => Err(JsError::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                base.display_hint(),
                key
            ))),
            JsValue::String(s) => {
                if let PropertyKey::Index(i) = key {
                    if let Some(u) = s.code_unit_at(*i as usize) {
                        return Ok(JsValue::String(JsString::from_utf16(&[u])));
                    }
                }
                if key.eq_str("length") {
                    return Ok(JsValue::from(s.len()));
                }
                let proto = self.intrinsic(Intrinsic::StringPrototype);
                self.get_with_receiver(&proto, key, base)
            }
            other => match self.primitive_prototype(other) {
                Some(proto) => self.get_with_receiver(&proto, key, base),
                None => Ok(JsValue::Undefined),
            },
        }
    }

    /// `GetMethod`: `None` for undefined or null, TypeError when not callable
    pub fn get_method(&mut self, base: &JsValue, key: &PropertyKey) -> Result<Option<JsValue>, JsError> {
        let func = self.get_value(base, key)?;
        if func.is_nullish() {
            return Ok(None);
        }
        if !func.is_callable() {
            return Err(JsError::type_error(format!("{} is not a function", describe(&func))));
        }
        Ok(Some(func))
    }

    /// `Invoke`: call the method `key` of `base`
    pub fn invoke(&mut self, base: &JsValue, key: &PropertyKey, args: &[JsValue]) -> Result<JsValue, JsError> {
        let func = self.get_value(base, key)?;
        if !func.is_callable() {
            return Err(JsError::type_error(format!(
                "{}.{} is not a function",
                describe(base),
                key
            )));
        }
        self.call_function(&func, base.clone(), args)
    }

    /// `[[Set]]`; returns false when the assignment was rejected
    pub fn set(
        &mut self,
        obj: &JsObjectRef,
        key: PropertyKey,
        value: JsValue,
        receiver: &JsValue,
    ) -> Result<bool, JsError> {
        if same_object(receiver, obj) {
            let mut o = obj.borrow_mut();
            if !o.is_exotic() || matches!(o.kind, ObjectKind::String(_)) {
                if let Some(done) = o.write_existing(&key, &value) {
                    return Ok(done);
                }
            }
        }
        let mut current = obj.clone();
        loop {
            let step = match exotic(&current) {
                Exotic::Ordinary => ordinary_set_lookup(&current.borrow(), &key),
                Exotic::Proxy => return self.nested(|interp| proxy::set(interp, &current, key, value, receiver)),
                Exotic::TypedArray => match canonical_numeric(&key) {
                    Some(index) => {
                        if same_object(receiver, &current) {
                            typed_array::set_element(self, &current, index, &value)?;
                            return Ok(true);
                        }
                        if !typed_array::has_element(&current.borrow(), index) {
                            return Ok(true);
                        }
                        SetLookup::Writable
                    }
                    None => ordinary_set_lookup(&current.borrow(), &key),
                },
                Exotic::Dynamic(d) => match host_key(&key) {
                    Some(name) if same_object(receiver, &current) => return Ok(d.set(&name, value)),
                    Some(name) if d.has(&name) => SetLookup::Writable,
                    _ => ordinary_set_lookup(&current.borrow(), &key),
                },
                Exotic::DynamicArray(a) => {
                    if let Some(i) = host_array_index(&key) {
                        if same_object(receiver, &current) {
                            return Ok(a.set(i, value));
                        }
                        SetLookup::Writable
                    } else if key.eq_str("length") {
                        if same_object(receiver, &current) {
                            let len = self.to_length(&value)?;
                            return Ok(a.set_len(len as usize));
                        }
                        SetLookup::Writable
                    } else {
                        ordinary_set_lookup(&current.borrow(), &key)
                    }
                }
                Exotic::Shared(s) => match host_key(&key) {
                    Some(name) if same_object(receiver, &current) => {
                        let json = to_json(self, &value)?;
                        return Ok(s.set(&name, json));
                    }
                    Some(name) if s.has(&name) => SetLookup::Writable,
                    _ => ordinary_set_lookup(&current.borrow(), &key),
                },
                Exotic::Global => {
                    self.materialize_global(&key);
                    ordinary_set_lookup(&current.borrow(), &key)
                }
            };
            match step {
                SetLookup::Writable | SetLookup::Missing(None) => break,
                SetLookup::ReadOnly | SetLookup::Setter(None) => return Ok(false),
                SetLookup::Setter(Some(setter)) => {
                    self.call_function(&JsValue::Object(setter), receiver.clone(), &[value])?;
                    return Ok(true);
                }
                SetLookup::Missing(Some(proto)) => current = proto,
            }
        }
        self.set_on_receiver(key, value, receiver)
    }

    /// Final step of `OrdinarySet`: create or update the data property on
    /// the receiver
    fn set_on_receiver(&mut self, key: PropertyKey, value: JsValue, receiver: &JsValue) -> Result<bool, JsError> {
        let JsValue::Object(recv) = receiver else {
            return Ok(false);
        };
        if matches!(exotic(recv), Exotic::Ordinary | Exotic::Global) {
            if let Some(done) = recv.borrow_mut().write_existing(&key, &value) {
                return Ok(done);
            }
            let is_array = matches!(recv.borrow().kind, ObjectKind::Array(_));
            if is_array && key.eq_str("length") {
                let desc = PropertyDescriptor {
                    value: Some(value),
                    ..Default::default()
                };
                return self.define_own_property(recv, key, desc);
            }
            let existing = recv.borrow().get_own(&key);
            return Ok(match existing {
                Some(p) if p.is_accessor() || !p.attrs.writable() => false,
                Some(_) => recv.borrow_mut().define_own_property(
                    key,
                    &PropertyDescriptor {
                        value: Some(value),
                        ..Default::default()
                    },
                ),
                None => recv
                    .borrow_mut()
                    .define_own_property(key, &PropertyDescriptor::data(value, true, true, true)),
            });
        }
        match self.get_own_property(recv, &key)? {
            Some(d) if d.is_accessor_descriptor() || d.writable == Some(false) => Ok(false),
            Some(_) => self.define_own_property(
                recv,
                key,
                PropertyDescriptor {
                    value: Some(value),
                    ..Default::default()
                },
            ),
            None => self.define_own_property(recv, key, PropertyDescriptor::data(value, true, true, true)),
        }
    }

    /// `PutValue` for a property reference: assignment on any base,
    /// throwing in strict code when rejected
    pub fn put_value(
        &mut self,
        base: &JsValue,
        key: PropertyKey,
        value: JsValue,
        strict: bool,
    ) -> Result<(), JsError> {
        let ok = match base {
            JsValue::Object(obj) => self.set(obj, key.clone(), value, base)?,
            JsValue::Undefined | JsValue::Null => {
                return Err(JsError::type_error(format!(
                    "Cannot set properties of {} (setting '{}')",
                    base.display_hint(),
                    key
                )));
            }
            other => match self.primitive_prototype(other) {
                Some(proto) => self.set(&proto, key.clone(), value, base)?,
                None => false,
            },
        };
        if !ok && strict {
            return Err(JsError::type_error(format!(
                "Cannot assign to read only property '{}' of {}",
                key,
                describe(base)
            )));
        }
        Ok(())
    }

    /// `Set(O, P, V, true)`
    pub fn set_or_throw(&mut self, obj: &JsObjectRef, key: PropertyKey, value: JsValue) -> Result<(), JsError> {
        self.put_value(&JsValue::Object(obj.clone()), key, value, true)
    }

    /// `[[HasProperty]]`
    pub fn has_property(&mut self, obj: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
        let mut current = obj.clone();
        loop {
            let next = match exotic(&current) {
                Exotic::Proxy => return self.nested(|interp| proxy::has(interp, &current, key)),
                Exotic::TypedArray => {
                    if let Some(index) = canonical_numeric(key) {
                        return Ok(typed_array::has_element(&current.borrow(), index));
                    }
                    None
                }
                Exotic::Dynamic(d) => host_key(key).is_some_and(|k| d.has(&k)).then_some(true),
                Exotic::DynamicArray(a) => {
                    let hit = host_array_index(key).is_some_and(|i| i < a.len()) || key.eq_str("length");
                    hit.then_some(true)
                }
                Exotic::Shared(s) => host_key(key).is_some_and(|k| s.has(&k)).then_some(true),
                Exotic::Global => {
                    self.materialize_global(key);
                    None
                }
                Exotic::Ordinary => None,
            };
            if next == Some(true) {
                return Ok(true);
            }
            let o = current.borrow();
            if o.has_own(key) {
                return Ok(true);
            }
            let proto = o.prototype.clone();
            drop(o);
            match proto {
                Some(p) => current = p,
                None => return Ok(false),
            }
        }
    }

    /// `HasOwnProperty`
    pub fn has_own_property(&mut self, obj: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
        if matches!(exotic(obj), Exotic::Ordinary) {
            return Ok(obj.borrow().has_own(key));
        }
        Ok(self.get_own_property(obj, key)?.is_some())
    }

    /// `[[Delete]]`
    pub fn delete_property(&mut self, obj: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
        match exotic(obj) {
            Exotic::Ordinary => Ok(obj.borrow_mut().delete_own(key)),
            Exotic::Proxy => self.nested(|interp| proxy::delete(interp, obj, key)),
            Exotic::TypedArray => match canonical_numeric(key) {
                Some(index) => Ok(!typed_array::has_element(&obj.borrow(), index)),
                None => Ok(obj.borrow_mut().delete_own(key)),
            },
            Exotic::Dynamic(d) => match host_key(key) {
                Some(name) if d.has(&name) => Ok(d.delete(&name)),
                _ => Ok(obj.borrow_mut().delete_own(key)),
            },
            Exotic::DynamicArray(a) => {
                if let Some(i) = host_array_index(key) {
                    if i < a.len() {
                        return Ok(a.set(i, JsValue::Undefined));
                    }
                    return Ok(true);
                }
                if key.eq_str("length") {
                    return Ok(false);
                }
                Ok(obj.borrow_mut().delete_own(key))
            }
            Exotic::Shared(s) => match host_key(key) {
                Some(name) if s.has(&name) => Ok(s.delete(&name)),
                _ => Ok(obj.borrow_mut().delete_own(key)),
            },
            Exotic::Global => {
                self.materialize_global(key);
                Ok(obj.borrow_mut().delete_own(key))
            }
        }
    }

    /// `DeletePropertyOrThrow` semantics for the `delete` operator
    pub fn delete_value(&mut self, base: &JsValue, key: &PropertyKey, strict: bool) -> Result<bool, JsError> {
        let obj = self.to_object(base)?;
        let ok = self.delete_property(&obj, key)?;
        if !ok && strict {
            return Err(JsError::type_error(format!(
                "Cannot delete property '{}' of {}",
                key,
                describe(base)
            )));
        }
        Ok(ok)
    }

    /// `[[GetOwnProperty]]`
    pub fn get_own_property(
        &mut self,
        obj: &JsObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, JsError> {
        let ordinary = |o: &JsObjectRef| o.borrow().get_own(key).map(|p| p.to_descriptor());
        match exotic(obj) {
            Exotic::Ordinary => Ok(ordinary(obj)),
            Exotic::Proxy => self.nested(|interp| proxy::get_own_property(interp, obj, key)),
            Exotic::TypedArray => match canonical_numeric(key) {
                Some(index) => Ok(typed_array::get_element(&obj.borrow(), index)
                    .map(|v| PropertyDescriptor::data(v, true, true, true))),
                None => Ok(ordinary(obj)),
            },
            Exotic::Dynamic(d) => match host_key(key).and_then(|k| d.get(&k)) {
                Some(v) => Ok(Some(host_data(v, true, true))),
                None => Ok(ordinary(obj)),
            },
            Exotic::DynamicArray(a) => {
                if let Some(i) = host_array_index(key) {
                    if i < a.len() {
                        let v = a.get(i).unwrap_or_default();
                        return Ok(Some(host_data(v, true, true)));
                    }
                    return Ok(None);
                }
                if key.eq_str("length") {
                    return Ok(Some(PropertyDescriptor::data(JsValue::from(a.len()), true, false, false)));
                }
                Ok(ordinary(obj))
            }
            Exotic::Shared(s) => match host_key(key).and_then(|k| s.get(&k)) {
                Some(json) => {
                    let v = from_json(self, &json);
                    Ok(Some(host_data(v, true, true)))
                }
                None => Ok(ordinary(obj)),
            },
            Exotic::Global => {
                self.materialize_global(key);
                Ok(ordinary(obj))
            }
        }
    }

    /// `[[DefineOwnProperty]]`; returns false when rejected
    pub fn define_own_property(
        &mut self,
        obj: &JsObjectRef,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> Result<bool, JsError> {
        match exotic(obj) {
            Exotic::Ordinary | Exotic::Global => {
                if matches!(exotic(obj), Exotic::Global) {
                    self.materialize_global(&key);
                }
                let is_array = matches!(obj.borrow().kind, ObjectKind::Array(_));
                if is_array && key.eq_str("length") {
                    if let Some(value) = &desc.value {
                        let len = self.array_length_value(value)?;
                        let desc = PropertyDescriptor {
                            value: Some(JsValue::from(len)),
                            ..desc
                        };
                        return Ok(obj.borrow_mut().define_own_property(key, &desc));
                    }
                }
                Ok(obj.borrow_mut().define_own_property(key, &desc))
            }
            Exotic::Proxy => self.nested(|interp| proxy::define_own_property(interp, obj, key, desc)),
            Exotic::TypedArray => match canonical_numeric(&key) {
                Some(index) => {
                    if !typed_array::has_element(&obj.borrow(), index)
                        || desc.configurable == Some(false)
                        || desc.enumerable == Some(false)
                        || desc.is_accessor_descriptor()
                        || desc.writable == Some(false)
                    {
                        return Ok(false);
                    }
                    if let Some(v) = &desc.value {
                        typed_array::set_element(self, obj, index, v)?;
                    }
                    Ok(true)
                }
                None => Ok(obj.borrow_mut().define_own_property(key, &desc)),
            },
            Exotic::Dynamic(d) => match host_key(&key) {
                Some(name) => {
                    if desc.is_accessor_descriptor() {
                        return Ok(false);
                    }
                    Ok(d.set(&name, desc.value.unwrap_or_default()))
                }
                None => Ok(obj.borrow_mut().define_own_property(key, &desc)),
            },
            Exotic::DynamicArray(a) => {
                if let Some(i) = host_array_index(&key) {
                    if desc.is_accessor_descriptor() {
                        return Ok(false);
                    }
                    return Ok(a.set(i, desc.value.unwrap_or_default()));
                }
                if key.eq_str("length") {
                    return match &desc.value {
                        Some(v) => {
                            let len = self.array_length_value(v)?;
                            Ok(a.set_len(len as usize))
                        }
                        None => Ok(true),
                    };
                }
                Ok(obj.borrow_mut().define_own_property(key, &desc))
            }
            Exotic::Shared(s) => match host_key(&key) {
                Some(name) => {
                    if desc.is_accessor_descriptor() {
                        return Ok(false);
                    }
                    let json = to_json(self, &desc.value.unwrap_or_default())?;
                    Ok(s.set(&name, json))
                }
                None => Ok(obj.borrow_mut().define_own_property(key, &desc)),
            },
        }
    }

    /// Validate a value assigned to an array `length`
    fn array_length_value(&mut self, value: &JsValue) -> Result<u32, JsError> {
        let len = self.to_uint32(value)?;
        let number = self.to_number(value)?;
        if f64::from(len) != number {
            return Err(JsError::range_error("Invalid array length"));
        }
        Ok(len)
    }

    /// `DefinePropertyOrThrow`
    pub fn define_property_or_throw(
        &mut self,
        obj: &JsObjectRef,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> Result<(), JsError> {
        let name = key.clone();
        if !self.define_own_property(obj, key, desc)? {
            return Err(JsError::type_error(format!("Cannot redefine property: {name}")));
        }
        Ok(())
    }

    /// `CreateDataProperty`
    pub fn create_data_property(
        &mut self,
        obj: &JsObjectRef,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<bool, JsError> {
        if matches!(exotic(obj), Exotic::Ordinary) {
            return Ok(obj
                .borrow_mut()
                .define_own_property(key, &PropertyDescriptor::data(value, true, true, true)));
        }
        self.define_own_property(obj, key, PropertyDescriptor::data(value, true, true, true))
    }

    /// `CreateDataPropertyOrThrow`
    pub fn create_data_property_or_throw(
        &mut self,
        obj: &JsObjectRef,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<(), JsError> {
        let name = key.clone();
        if !self.create_data_property(obj, key, value)? {
            return Err(JsError::type_error(format!("Cannot define property {name}, object is not extensible")));
        }
        Ok(())
    }

    /// `[[OwnPropertyKeys]]`
    pub fn own_property_keys(&mut self, obj: &JsObjectRef) -> Result<Vec<PropertyKey>, JsError> {
        match exotic(obj) {
            Exotic::Ordinary => Ok(obj.borrow().own_keys()),
            Exotic::Proxy => self.nested(|interp| proxy::own_keys(interp, obj)),
            Exotic::TypedArray => {
                let o = obj.borrow();
                let count = typed_array::element_count(&o);
                let mut keys: Vec<PropertyKey> = (0..count).map(PropertyKey::from).collect();
                keys.extend(o.own_keys());
                Ok(keys)
            }
            Exotic::Dynamic(d) => {
                let mut keys: Vec<PropertyKey> = d.keys().into_iter().map(PropertyKey::from).collect();
                keys.extend(obj.borrow().own_keys());
                Ok(keys)
            }
            Exotic::DynamicArray(a) => {
                let mut keys: Vec<PropertyKey> = (0..a.len()).map(PropertyKey::from).collect();
                keys.push(PropertyKey::from("length"));
                keys.extend(obj.borrow().own_keys());
                Ok(keys)
            }
            Exotic::Shared(s) => {
                let mut keys: Vec<PropertyKey> = s.keys().into_iter().map(PropertyKey::from).collect();
                keys.extend(obj.borrow().own_keys());
                Ok(keys)
            }
            Exotic::Global => {
                self.materialize_all_globals();
                Ok(obj.borrow().own_keys())
            }
        }
    }

    /// `[[GetPrototypeOf]]`
    pub fn get_prototype_of(&mut self, obj: &JsObjectRef) -> Result<Option<JsObjectRef>, JsError> {
        if obj.borrow().is_proxy() {
            return self.nested(|interp| proxy::get_prototype_of(interp, obj));
        }
        Ok(obj.borrow().prototype.clone())
    }

    /// `[[SetPrototypeOf]]`; rejects cycles and changes to non-extensible
    /// objects
    pub fn set_prototype_of(&mut self, obj: &JsObjectRef, proto: Option<JsObjectRef>) -> Result<bool, JsError> {
        if obj.borrow().is_proxy() {
            return self.nested(|interp| proxy::set_prototype_of(interp, obj, proto));
        }
        let current = obj.borrow().prototype.clone();
        let unchanged = match (&current, &proto) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return Ok(true);
        }
        if !obj.borrow().extensible || obj.ptr_eq(&self.realm.object_prototype) {
            return Ok(false);
        }
        let mut p = proto.clone();
        while let Some(candidate) = p {
            if candidate.ptr_eq(obj) {
                return Ok(false);
            }
            let c = candidate.borrow();
            if c.is_proxy() {
                break;
            }
            p = c.prototype.clone();
        }
        obj.borrow_mut().prototype = proto;
        Ok(true)
    }

    /// `[[IsExtensible]]`
    pub fn is_extensible(&mut self, obj: &JsObjectRef) -> Result<bool, JsError> {
        if obj.borrow().is_proxy() {
            return self.nested(|interp| proxy::is_extensible(interp, obj));
        }
        Ok(obj.borrow().extensible)
    }

    /// `[[PreventExtensions]]`
    pub fn prevent_extensions(&mut self, obj: &JsObjectRef) -> Result<bool, JsError> {
        if obj.borrow().is_proxy() {
            return self.nested(|interp| proxy::prevent_extensions(interp, obj));
        }
        if matches!(exotic(obj), Exotic::Global) {
            self.materialize_all_globals();
        }
        obj.borrow_mut().extensible = false;
        Ok(true)
    }

    /// `SetIntegrityLevel`
    pub fn set_integrity_level(&mut self, obj: &JsObjectRef, frozen: bool) -> Result<bool, JsError> {
        if matches!(exotic(obj), Exotic::Ordinary) {
            obj.borrow_mut().set_integrity(frozen);
            return Ok(true);
        }
        if !self.prevent_extensions(obj)? {
            return Ok(false);
        }
        for key in self.own_property_keys(obj)? {
            let desc = if frozen {
                match self.get_own_property(obj, &key)? {
                    Some(current) if current.is_accessor_descriptor() => PropertyDescriptor {
                        configurable: Some(false),
                        ..Default::default()
                    },
                    Some(_) => PropertyDescriptor {
                        configurable: Some(false),
                        writable: Some(false),
                        ..Default::default()
                    },
                    None => continue,
                }
            } else {
                PropertyDescriptor {
                    configurable: Some(false),
                    ..Default::default()
                }
            };
            self.define_property_or_throw(obj, key, desc)?;
        }
        Ok(true)
    }

    /// `TestIntegrityLevel`
    pub fn test_integrity_level(&mut self, obj: &JsObjectRef, frozen: bool) -> Result<bool, JsError> {
        if matches!(exotic(obj), Exotic::Ordinary) {
            return Ok(obj.borrow().test_integrity(frozen));
        }
        if self.is_extensible(obj)? {
            return Ok(false);
        }
        for key in self.own_property_keys(obj)? {
            if let Some(desc) = self.get_own_property(obj, &key)? {
                if desc.configurable == Some(true) {
                    return Ok(false);
                }
                if frozen && desc.is_data_descriptor() && desc.writable == Some(true) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Lazy globals
    // ───────────────────────────────────────────────────────────────────────

    /// Turn a pending global such as `Map` into a real property
    pub(crate) fn materialize_global(&mut self, key: &PropertyKey) {
        if !self.realm.has_lazy_globals() {
            return;
        }
        let PropertyKey::String(name) = key else {
            return;
        };
        let Some(which) = self.realm.lazy_globals.remove(name) else {
            return;
        };
        let value = self.intrinsic(which);
        self.realm.global.borrow_mut().define_property(
            key.clone(),
            Property::data(JsValue::Object(value), crate::object::Attributes::HIDDEN),
        );
    }

    pub(crate) fn materialize_all_globals(&mut self) {
        let mut pending: Vec<JsString> = self.realm.lazy_globals.keys().cloned().collect();
        pending.sort();
        for name in pending {
            self.materialize_global(&PropertyKey::String(name));
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Descriptors and enumeration
    // ═══════════════════════════════════════════════════════════════════════

    /// `ToPropertyDescriptor`
    pub fn to_property_descriptor(&mut self, value: &JsValue) -> Result<PropertyDescriptor, JsError> {
        let JsValue::Object(obj) = value else {
            return Err(JsError::type_error(format!(
                "Property description must be an object: {}",
                value.display_hint()
            )));
        };
        let mut desc = PropertyDescriptor::default();
        let field = |interp: &mut Interpreter, name: &str| -> Result<Option<JsValue>, JsError> {
            let key = PropertyKey::from(name);
            if interp.has_property(obj, &key)? {
                Ok(Some(interp.get(obj, &key)?))
            } else {
                Ok(None)
            }
        };
        if let Some(v) = field(self, "enumerable")? {
            desc.enumerable = Some(v.to_boolean());
        }
        if let Some(v) = field(self, "configurable")? {
            desc.configurable = Some(v.to_boolean());
        }
        if let Some(v) = field(self, "value")? {
            desc.value = Some(v);
        }
        if let Some(v) = field(self, "writable")? {
            desc.writable = Some(v.to_boolean());
        }
        if let Some(v) = field(self, "get")? {
            if !v.is_undefined() && !v.is_callable() {
                return Err(JsError::type_error(format!("Getter must be a function: {}", describe(&v))));
            }
            desc.get = Some(v);
        }
        if let Some(v) = field(self, "set")? {
            if !v.is_undefined() && !v.is_callable() {
                return Err(JsError::type_error(format!("Setter must be a function: {}", describe(&v))));
            }
            desc.set = Some(v);
        }
        if desc.is_accessor_descriptor() && desc.is_data_descriptor() {
            return Err(JsError::type_error(
                "Invalid property descriptor. Cannot both specify accessors and a value or writable attribute",
            ));
        }
        Ok(desc)
    }

    /// `FromPropertyDescriptor`
    pub fn from_property_descriptor(&mut self, desc: Option<PropertyDescriptor>) -> JsValue {
        let Some(desc) = desc else {
            return JsValue::Undefined;
        };
        let obj = self.create_object();
        {
            let mut o = obj.borrow_mut();
            if let Some(v) = desc.value {
                o.set_property(PropertyKey::from("value"), v);
            }
            if let Some(w) = desc.writable {
                o.set_property(PropertyKey::from("writable"), JsValue::Bool(w));
            }
            if let Some(g) = desc.get {
                o.set_property(PropertyKey::from("get"), g);
            }
            if let Some(s) = desc.set {
                o.set_property(PropertyKey::from("set"), s);
            }
            if let Some(e) = desc.enumerable {
                o.set_property(PropertyKey::from("enumerable"), JsValue::Bool(e));
            }
            if let Some(c) = desc.configurable {
                o.set_property(PropertyKey::from("configurable"), JsValue::Bool(c));
            }
        }
        JsValue::Object(obj)
    }

    /// `EnumerableOwnProperties` (string keys only)
    pub fn enumerable_own_properties(&mut self, obj: &JsObjectRef, kind: EnumKind) -> Result<Vec<JsValue>, JsError> {
        let keys = self.own_property_keys(obj)?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if key.is_symbol() {
                continue;
            }
            let Some(desc) = self.get_own_property(obj, &key)? else {
                continue;
            };
            if desc.enumerable != Some(true) {
                continue;
            }
            match kind {
                EnumKind::Keys => out.push(key.to_value()),
                EnumKind::Values => out.push(self.get(obj, &key)?),
                EnumKind::Entries => {
                    let value = self.get(obj, &key)?;
                    let entry = self.create_array(vec![key.to_value(), value]);
                    out.push(JsValue::Object(entry));
                }
            }
        }
        Ok(out)
    }

    /// `CopyDataProperties`: object spread and rest
    pub fn copy_data_properties(
        &mut self,
        target: &JsObjectRef,
        source: &JsValue,
        excluded: &[PropertyKey],
    ) -> Result<(), JsError> {
        if source.is_nullish() {
            return Ok(());
        }
        let from = self.to_object(source)?;
        for key in self.own_property_keys(&from)? {
            if excluded.contains(&key) {
                continue;
            }
            let Some(desc) = self.get_own_property(&from, &key)? else {
                continue;
            };
            if desc.enumerable == Some(true) {
                let value = self.get(&from, &key)?;
                self.create_data_property(target, key, value)?;
            }
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Objects and functions
    // ═══════════════════════════════════════════════════════════════════════

    /// Object argument or TypeError
    pub fn require_object(&self, value: &JsValue, context: &str) -> Result<JsObjectRef, JsError> {
        match value {
            JsValue::Object(o) => Ok(o.clone()),
            other => Err(JsError::type_error(format!(
                "{context} called on non-object {}",
                describe(other)
            ))),
        }
    }

    /// `IsArray`, looking through proxies
    pub fn is_array(&mut self, value: &JsValue) -> Result<bool, JsError> {
        let JsValue::Object(obj) = value else {
            return Ok(false);
        };
        let mut current = obj.clone();
        loop {
            let target = {
                let o = current.borrow();
                match &o.kind {
                    ObjectKind::Proxy(p) => match &p.target {
                        Some(t) => t.clone(),
                        None => {
                            return Err(JsError::type_error(
                                "Cannot perform 'IsArray' on a proxy that has been revoked",
                            ));
                        }
                    },
                    _ => return Ok(o.is_array()),
                }
            };
            current = target;
        }
    }

    /// `LengthOfArrayLike`
    pub fn length_of_array_like(&mut self, obj: &JsObjectRef) -> Result<u64, JsError> {
        if let Some(len) = obj.borrow().array_length() {
            return Ok(u64::from(len));
        }
        let len = self.get(obj, &PropertyKey::from("length"))?;
        self.to_length(&len)
    }

    /// `CreateListFromArrayLike`
    pub fn create_list_from_array_like(&mut self, value: &JsValue) -> Result<Vec<JsValue>, JsError> {
        let JsValue::Object(obj) = value else {
            return Err(JsError::type_error("CreateListFromArrayLike called on non-object"));
        };
        {
            let o = obj.borrow();
            if let Some(len) = o.array_length() {
                if o.elements.len() == len as usize {
                    return Ok(o.elements.clone());
                }
            }
        }
        let len = self.length_of_array_like(obj)?;
        if len > MAX_ARGUMENTS {
            return Err(JsError::range_error("Too many arguments in function call"));
        }
        let mut out = Vec::with_capacity(len as usize);
        for i in 0..len {
            out.push(self.get(obj, &PropertyKey::from(i as usize))?);
        }
        Ok(out)
    }

    /// `InstanceofOperator`
    pub fn instance_of(&mut self, value: &JsValue, target: &JsValue) -> Result<bool, JsError> {
        if !target.is_object() {
            return Err(JsError::type_error("Right-hand side of 'instanceof' is not an object"));
        }
        let checker = self.get_method(target, &PropertyKey::Symbol(JsSymbol::has_instance()))?;
        if let Some(checker) = checker {
            let result = self.call_function(&checker, target.clone(), &[value.clone()])?;
            return Ok(result.to_boolean());
        }
        if !target.is_callable() {
            return Err(JsError::type_error("Right-hand side of 'instanceof' is not callable"));
        }
        self.ordinary_has_instance(target, value)
    }

    /// `OrdinaryHasInstance`
    pub fn ordinary_has_instance(&mut self, ctor: &JsValue, value: &JsValue) -> Result<bool, JsError> {
        let JsValue::Object(c) = ctor else {
            return Ok(false);
        };
        if !c.borrow().is_callable() {
            return Ok(false);
        }
        let bound_target = match c.borrow().function() {
            Some(JsFunction::Bound(b)) => Some(JsValue::Object(b.target.clone())),
            _ => None,
        };
        if let Some(target) = bound_target {
            return self.instance_of(value, &target);
        }
        let JsValue::Object(obj) = value else {
            return Ok(false);
        };
        let proto = self.get(c, &PropertyKey::from("prototype"))?;
        let JsValue::Object(proto) = proto else {
            return Err(JsError::type_error(format!(
                "Function has non-object prototype '{}' in instanceof check",
                proto.display_hint()
            )));
        };
        let mut current = self.get_prototype_of(obj)?;
        while let Some(p) = current {
            if p.ptr_eq(&proto) {
                return Ok(true);
            }
            current = self.get_prototype_of(&p)?;
        }
        Ok(false)
    }

    /// `SpeciesConstructor`
    pub fn species_constructor(&mut self, obj: &JsObjectRef, default: Intrinsic) -> Result<JsValue, JsError> {
        let ctor = self.get(obj, &PropertyKey::from("constructor"))?;
        if ctor.is_undefined() {
            return Ok(JsValue::Object(self.intrinsic(default)));
        }
        let JsValue::Object(c) = &ctor else {
            return Err(JsError::type_error("object.constructor is not an object"));
        };
        let species = self.get(c, &PropertyKey::Symbol(JsSymbol::species()))?;
        if species.is_nullish() {
            return Ok(JsValue::Object(self.intrinsic(default)));
        }
        if species.is_constructor() {
            return Ok(species);
        }
        Err(JsError::type_error("object.constructor[Symbol.species] is not a constructor"))
    }

    /// `GetPrototypeFromConstructor`
    pub fn get_prototype_from_constructor(
        &mut self,
        new_target: &JsValue,
        default: Intrinsic,
    ) -> Result<JsObjectRef, JsError> {
        if let JsValue::Object(nt) = new_target {
            if let JsValue::Object(proto) = self.get(nt, &PropertyKey::from("prototype"))? {
                return Ok(proto);
            }
        }
        Ok(self.intrinsic(default))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Operators
    // ═══════════════════════════════════════════════════════════════════════

    /// `IsLooselyEqual` (`==`)
    pub fn loose_equals(&mut self, a: &JsValue, b: &JsValue) -> Result<bool, JsError> {
        use JsValue as V;
        match (a, b) {
            (V::Undefined | V::Null, V::Undefined | V::Null) => Ok(true),
            (V::Undefined | V::Null, _) | (_, V::Undefined | V::Null) => Ok(false),
            (V::Int(_) | V::Float(_), V::Int(_) | V::Float(_))
            | (V::String(_), V::String(_))
            | (V::Bool(_), V::Bool(_))
            | (V::Symbol(_), V::Symbol(_))
            | (V::Object(_), V::Object(_)) => Ok(a.strict_equals(b)),
            (V::Int(_) | V::Float(_), V::String(s)) => Ok(a.as_number() == Some(number::string_to_number(s))),
            (V::String(s), V::Int(_) | V::Float(_)) => Ok(Some(number::string_to_number(s)) == b.as_number()),
            (V::Bool(x), _) => self.loose_equals(&JsValue::from(u32::from(*x)), b),
            (_, V::Bool(y)) => self.loose_equals(a, &JsValue::from(u32::from(*y))),
            (V::Object(_), _) => {
                let prim = self.to_primitive(a, Hint::Default)?;
                self.loose_equals(&prim, b)
            }
            (_, V::Object(_)) => {
                let prim = self.to_primitive(b, Hint::Default)?;
                self.loose_equals(a, &prim)
            }
            _ => Ok(false),
        }
    }

    /// `IsLessThan`; `None` when either side is NaN
    pub fn less_than(&mut self, a: &JsValue, b: &JsValue, left_first: bool) -> Result<Option<bool>, JsError> {
        let (pa, pb) = if left_first {
            let pa = self.to_primitive(a, Hint::Number)?;
            let pb = self.to_primitive(b, Hint::Number)?;
            (pa, pb)
        } else {
            let pb = self.to_primitive(b, Hint::Number)?;
            let pa = self.to_primitive(a, Hint::Number)?;
            (pa, pb)
        };
        if let (JsValue::String(x), JsValue::String(y)) = (&pa, &pb) {
            return Ok(Some(x.cmp_units(y).is_lt()));
        }
        let x = self.to_number(&pa)?;
        let y = self.to_number(&pb)?;
        if x.is_nan() || y.is_nan() {
            return Ok(None);
        }
        Ok(Some(x < y))
    }

    /// The `+` operator
    pub fn add(&mut self, a: &JsValue, b: &JsValue) -> Result<JsValue, JsError> {
        match (a, b) {
            (JsValue::Int(x), JsValue::Int(y)) => return Ok(JsValue::int(x + y)),
            (JsValue::String(x), JsValue::String(y)) => return Ok(JsValue::String(x.concat(y))),
            _ => {}
        }
        let pa = self.to_primitive(a, Hint::Default)?;
        let pb = self.to_primitive(b, Hint::Default)?;
        if pa.is_string() || pb.is_string() {
            let x = self.to_string(&pa)?;
            let y = self.to_string(&pb)?;
            return Ok(JsValue::String(x.concat(&y)));
        }
        let x = self.to_number(&pa)?;
        let y = self.to_number(&pb)?;
        Ok(JsValue::number(x + y))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Iteration
    // ═══════════════════════════════════════════════════════════════════════

    /// `GetIterator(obj, sync)`
    pub fn get_iterator(&mut self, value: &JsValue) -> Result<IteratorRecord, JsError> {
        let method = self.get_method(value, &PropertyKey::Symbol(JsSymbol::iterator()))?;
        let Some(method) = method else {
            return Err(JsError::type_error(format!("{} is not iterable", describe(value))));
        };
        self.get_iterator_from_method(value, &method)
    }

    /// `GetIteratorFromMethod`
    pub fn get_iterator_from_method(&mut self, value: &JsValue, method: &JsValue) -> Result<IteratorRecord, JsError> {
        let iterator = self.call_function(method, value.clone(), &[])?;
        if !iterator.is_object() {
            return Err(JsError::type_error("Result of the Symbol.iterator method is not an object"));
        }
        let next = self.get_value(&iterator, &PropertyKey::from("next"))?;
        Ok(IteratorRecord {
            iterator,
            next,
            done: false,
        })
    }

    /// `IteratorStepValue`: the next value, or `None` when done
    pub fn iterator_step_value(&mut self, record: &mut IteratorRecord) -> Result<Option<JsValue>, JsError> {
        if record.done {
            return Ok(None);
        }
        record.done = true;
        let result = self.call_function(&record.next.clone(), record.iterator.clone(), &[])?;
        if !result.is_object() {
            return Err(JsError::type_error(format!(
                "Iterator result {} is not an object",
                describe(&result)
            )));
        }
        let done = self.get_value(&result, &PropertyKey::from("done"))?;
        if done.to_boolean() {
            return Ok(None);
        }
        let value = self.get_value(&result, &PropertyKey::from("value"))?;
        record.done = false;
        Ok(Some(value))
    }

    /// `IteratorClose` for a normal completion
    pub fn iterator_close(&mut self, iterator: &JsValue) -> Result<(), JsError> {
        let Some(ret) = self.get_method(iterator, &PropertyKey::from("return"))? else {
            return Ok(());
        };
        let result = self.call_function(&ret, iterator.clone(), &[])?;
        if !result.is_object() {
            return Err(JsError::type_error(format!(
                "Iterator result {} is not an object",
                describe(&result)
            )));
        }
        Ok(())
    }

    /// `IteratorClose` for a throw completion: the original error wins
    /// unless closing hit an uncatchable one
    pub fn iterator_close_with_error(&mut self, iterator: &JsValue, err: JsError) -> JsError {
        if err.is_uncatchable() {
            return err;
        }
        let saved = self.last_throw_stack.take();
        match self.iterator_close(iterator) {
            Err(close_err) if close_err.is_uncatchable() => close_err,
            _ => {
                self.last_throw_stack = saved;
                err
            }
        }
    }

    /// Collect every value of an iterable
    pub fn iterate_to_vec(&mut self, value: &JsValue) -> Result<Vec<JsValue>, JsError> {
        if let Some(values) = self.fast_array_values(value) {
            return Ok(values);
        }
        let mut record = self.get_iterator(value)?;
        let mut out = Vec::new();
        while let Some(v) = self.iterator_step_value(&mut record)? {
            out.push(v);
        }
        Ok(out)
    }

    /// Elements of a dense array whose iteration has not been patched
    fn fast_array_values(&mut self, value: &JsValue) -> Option<Vec<JsValue>> {
        let JsValue::Object(obj) = value else {
            return None;
        };
        let array_proto = self.realm.get(Intrinsic::ArrayPrototype)?;
        let values_fn = self.realm.get(Intrinsic::ArrayValues)?;
        let next_fn = self.realm.get(Intrinsic::ArrayIteratorNext)?;
        let iter_proto = self.realm.get(Intrinsic::ArrayIteratorPrototype)?;
        let iterator_key = PropertyKey::Symbol(JsSymbol::iterator());
        {
            let o = obj.borrow();
            let len = o.array_length()?;
            if o.elements.len() != len as usize
                || o.properties.contains_key(&iterator_key)
                || !o.prototype.as_ref().is_some_and(|p| p.ptr_eq(&array_proto))
            {
                return None;
            }
        }
        let proto_iter = array_proto.borrow().get_own_value(&iterator_key)?;
        let proto_next = iter_proto.borrow().get_own_value(&PropertyKey::from("next"))?;
        if !same_object(&proto_iter, &values_fn) || !same_object(&proto_next, &next_fn) {
            return None;
        }
        Some(obj.borrow().elements.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interp() -> Interpreter {
        Interpreter::new(0, false)
    }

    #[test]
    fn canonical_numeric_keys() {
        assert_eq!(canonical_numeric(&PropertyKey::Index(3)), Some(3.0));
        assert_eq!(canonical_numeric(&PropertyKey::from("1.5")), Some(1.5));
        assert!(canonical_numeric(&PropertyKey::from("-0")).is_some_and(|n| n.is_sign_negative()));
        assert_eq!(canonical_numeric(&PropertyKey::from("01")), None);
        assert_eq!(canonical_numeric(&PropertyKey::from("foo")), None);
    }

    #[test]
    fn loose_equality_coerces() {
        let mut i = interp();
        let cases = [
            (JsValue::Null, JsValue::Undefined, true),
            (JsValue::from(1), JsValue::from("1"), true),
            (JsValue::Bool(true), JsValue::from(1), true),
            (JsValue::from("0"), JsValue::Bool(false), true),
            (JsValue::Null, JsValue::from(0), false),
            (JsValue::nan(), JsValue::nan(), false),
        ];
        for (a, b, expected) in cases {
            assert_eq!(i.loose_equals(&a, &b).ok(), Some(expected), "{a:?} == {b:?}");
        }
    }

    #[test]
    fn property_key_conversion() {
        let mut i = interp();
        assert_eq!(i.to_property_key(&JsValue::from(7)).ok(), Some(PropertyKey::Index(7)));
        assert_eq!(i.to_property_key(&JsValue::from("7")).ok(), Some(PropertyKey::Index(7)));
        assert_eq!(i.to_property_key(&JsValue::from(-1)).ok(), Some(PropertyKey::from("-1")));
        assert_eq!(i.to_property_key(&JsValue::from(1.5)).ok(), Some(PropertyKey::from("1.5")));
    }

    #[test]
    fn prototype_cycles_are_rejected() {
        let mut i = interp();
        let a = i.create_object();
        let b = i.create_object_with_proto(Some(a.clone()));
        assert_eq!(i.set_prototype_of(&a, Some(b.clone())).ok(), Some(false));
        assert_eq!(i.set_prototype_of(&b, None).ok(), Some(true));
        assert_eq!(i.set_prototype_of(&a, Some(b)).ok(), Some(true));
    }

    #[test]
    fn read_only_property_rejects_assignment() {
        let mut i = interp();
        let obj = i.create_object();
        let key = PropertyKey::from("k");
        let defined = i.define_own_property(&obj, key.clone(), PropertyDescriptor::data(JsValue::from(1), false, true, true));
        assert_eq!(defined.ok(), Some(true));
        let receiver = JsValue::Object(obj.clone());
        assert_eq!(i.set(&obj, key.clone(), JsValue::from(2), &receiver).ok(), Some(false));
        assert_eq!(i.get(&obj, &key).ok(), Some(JsValue::from(1)));
        assert!(i.put_value(&receiver, key, JsValue::from(3), true).is_err());
    }

    #[test]
    fn global_materializes_on_first_read() {
        let mut i = interp();
        let global = i.global();
        assert!(!global.borrow().has_own(&PropertyKey::from("Math")));
        let math = i.get(&global, &PropertyKey::from("Math"));
        assert!(math.is_ok_and(|v| v.is_object()));
        assert!(global.borrow().has_own(&PropertyKey::from("Math")));
    }
}
