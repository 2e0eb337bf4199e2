//! Object constructor and Object.prototype

use crate::error::JsError;
use crate::object::{Attributes, JsObjectRef, ObjectKind, Property, PropertyDescriptor};
use crate::string::JsString;
use crate::value::{JsSymbol, JsValue, PropertyKey};

use super::{arg, callback};
use crate::interpreter::Interpreter;
use crate::interpreter::ops::EnumKind;
use crate::interpreter::realm::Intrinsic;

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::Object).is_some() {
        return;
    }
    let proto = interp.realm.object_prototype.clone();

    interp.register_method(&proto, "hasOwnProperty", object_has_own_property, 1);
    interp.register_method(&proto, "isPrototypeOf", object_is_prototype_of, 1);
    interp.register_method(&proto, "propertyIsEnumerable", object_property_is_enumerable, 1);
    interp.register_method(&proto, "toString", object_to_string, 0);
    interp.register_method(&proto, "toLocaleString", object_to_locale_string, 0);
    interp.register_method(&proto, "valueOf", object_value_of, 0);

    let get_proto = interp.create_native_function("get __proto__", object_get_proto, 0);
    let set_proto = interp.create_native_function("set __proto__", object_set_proto, 1);
    proto.borrow_mut().define_property(
        PropertyKey::from("__proto__"),
        Property::accessor(Some(get_proto), Some(set_proto), Attributes::CONFIGURABLE_ONLY),
    );

    let ctor = interp.create_native_constructor("Object", object_constructor, 1, &proto);
    interp.register_method(&ctor, "assign", object_assign, 2);
    interp.register_method(&ctor, "create", object_create, 2);
    interp.register_method(&ctor, "defineProperty", object_define_property, 3);
    interp.register_method(&ctor, "defineProperties", object_define_properties, 2);
    interp.register_method(&ctor, "entries", object_entries, 1);
    interp.register_method(&ctor, "freeze", object_freeze, 1);
    interp.register_method(&ctor, "fromEntries", object_from_entries, 1);
    interp.register_method(&ctor, "getOwnPropertyDescriptor", object_get_own_property_descriptor, 2);
    interp.register_method(&ctor, "getOwnPropertyDescriptors", object_get_own_property_descriptors, 1);
    interp.register_method(&ctor, "getOwnPropertyNames", object_get_own_property_names, 1);
    interp.register_method(&ctor, "getOwnPropertySymbols", object_get_own_property_symbols, 1);
    interp.register_method(&ctor, "getPrototypeOf", object_get_prototype_of, 1);
    interp.register_method(&ctor, "groupBy", object_group_by, 2);
    interp.register_method(&ctor, "hasOwn", object_has_own, 2);
    interp.register_method(&ctor, "is", object_is, 2);
    interp.register_method(&ctor, "isExtensible", object_is_extensible, 1);
    interp.register_method(&ctor, "isFrozen", object_is_frozen, 1);
    interp.register_method(&ctor, "isSealed", object_is_sealed, 1);
    interp.register_method(&ctor, "keys", object_keys, 1);
    interp.register_method(&ctor, "preventExtensions", object_prevent_extensions, 1);
    interp.register_method(&ctor, "seal", object_seal, 1);
    interp.register_method(&ctor, "setPrototypeOf", object_set_prototype_of, 2);
    interp.register_method(&ctor, "values", object_values, 1);

    interp.realm.set(Intrinsic::Object, ctor.clone());
    super::define_global(interp, "Object", JsValue::Object(ctor));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constructor
// ═══════════════════════════════════════════════════════════════════════════════

fn object_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let nt = interp.new_target.clone();
    let is_self = match (&nt, &interp.native_callee) {
        (JsValue::Object(n), Some(c)) => n.ptr_eq(c),
        _ => true,
    };
    if !nt.is_undefined() && !is_self {
        let proto = interp.get_prototype_from_constructor(&nt, Intrinsic::ObjectPrototype)?;
        return Ok(JsValue::Object(interp.create_object_with_proto(Some(proto))));
    }
    let value = arg(args, 0);
    if value.is_nullish() {
        return Ok(JsValue::Object(interp.create_object()));
    }
    Ok(JsValue::Object(interp.to_object(&value)?))
}

/// Object.assign(target, ...sources)
fn object_assign(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let target = interp.to_object(&arg(args, 0))?;
    for source in args.iter().skip(1) {
        if source.is_nullish() {
            continue;
        }
        let from = interp.to_object(source)?;
        for key in interp.own_property_keys(&from)? {
            let Some(desc) = interp.get_own_property(&from, &key)? else {
                continue;
            };
            if desc.enumerable == Some(true) {
                let value = interp.get(&from, &key)?;
                interp.set_or_throw(&target, key, value)?;
            }
        }
    }
    Ok(JsValue::Object(target))
}

/// Object.create(proto, properties)
fn object_create(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let proto = match arg(args, 0) {
        JsValue::Object(p) => Some(p),
        JsValue::Null => None,
        other => {
            return Err(JsError::type_error(format!(
                "Object prototype may only be an Object or null: {}",
                other.display_hint()
            )));
        }
    };
    let obj = interp.create_object_with_proto(proto);
    let props = arg(args, 1);
    if !props.is_undefined() {
        define_properties(interp, &obj, &props)?;
    }
    Ok(JsValue::Object(obj))
}

/// `ObjectDefineProperties`
fn define_properties(interp: &mut Interpreter, obj: &JsObjectRef, props: &JsValue) -> Result<(), JsError> {
    let props = interp.to_object(props)?;
    let mut descriptors = Vec::new();
    for key in interp.own_property_keys(&props)? {
        let Some(desc) = interp.get_own_property(&props, &key)? else {
            continue;
        };
        if desc.enumerable == Some(true) {
            let value = interp.get(&props, &key)?;
            descriptors.push((key, interp.to_property_descriptor(&value)?));
        }
    }
    for (key, desc) in descriptors {
        interp.define_property_or_throw(obj, key, desc)?;
    }
    Ok(())
}

fn require_object_arg(value: &JsValue, method: &str) -> Result<JsObjectRef, JsError> {
    match value {
        JsValue::Object(o) => Ok(o.clone()),
        _ => Err(JsError::type_error(format!("Object.{method} called on non-object"))),
    }
}

/// Object.defineProperty(obj, key, descriptor)
fn object_define_property(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = require_object_arg(&arg(args, 0), "defineProperty")?;
    let key = interp.to_property_key(&arg(args, 1))?;
    let desc = interp.to_property_descriptor(&arg(args, 2))?;
    interp.define_property_or_throw(&obj, key, desc)?;
    Ok(JsValue::Object(obj))
}

/// Object.defineProperties(obj, properties)
fn object_define_properties(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = require_object_arg(&arg(args, 0), "defineProperties")?;
    define_properties(interp, &obj, &arg(args, 1))?;
    Ok(JsValue::Object(obj))
}

fn enumerable(interp: &mut Interpreter, args: &[JsValue], kind: EnumKind) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&arg(args, 0))?;
    let values = interp.enumerable_own_properties(&obj, kind)?;
    Ok(JsValue::Object(interp.create_array(values)))
}

fn object_keys(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    enumerable(interp, args, EnumKind::Keys)
}

fn object_values(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    enumerable(interp, args, EnumKind::Values)
}

fn object_entries(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    enumerable(interp, args, EnumKind::Entries)
}

fn object_freeze(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let value = arg(args, 0);
    if let JsValue::Object(obj) = &value {
        if !interp.set_integrity_level(obj, true)? {
            return Err(JsError::type_error("Cannot freeze"));
        }
    }
    Ok(value)
}

fn object_seal(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let value = arg(args, 0);
    if let JsValue::Object(obj) = &value {
        if !interp.set_integrity_level(obj, false)? {
            return Err(JsError::type_error("Cannot seal"));
        }
    }
    Ok(value)
}

fn object_prevent_extensions(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let value = arg(args, 0);
    if let JsValue::Object(obj) = &value {
        if !interp.prevent_extensions(obj)? {
            return Err(JsError::type_error("Cannot prevent extensions"));
        }
    }
    Ok(value)
}

fn object_is_frozen(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    match arg(args, 0) {
        JsValue::Object(obj) => Ok(JsValue::Bool(interp.test_integrity_level(&obj, true)?)),
        _ => Ok(JsValue::Bool(true)),
    }
}

fn object_is_sealed(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    match arg(args, 0) {
        JsValue::Object(obj) => Ok(JsValue::Bool(interp.test_integrity_level(&obj, false)?)),
        _ => Ok(JsValue::Bool(true)),
    }
}

fn object_is_extensible(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    match arg(args, 0) {
        JsValue::Object(obj) => Ok(JsValue::Bool(interp.is_extensible(&obj)?)),
        _ => Ok(JsValue::Bool(false)),
    }
}

/// Object.fromEntries(iterable)
fn object_from_entries(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let iterable = arg(args, 0);
    if iterable.is_nullish() {
        return Err(JsError::type_error(format!("{} is not iterable", iterable.display_hint())));
    }
    let obj = interp.create_object();
    let mut record = interp.get_iterator(&iterable)?;
    loop {
        let entry = match interp.iterator_step_value(&mut record) {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => return Err(e),
        };
        let result = (|| {
            if !entry.is_object() {
                return Err(JsError::type_error(format!(
                    "Iterator value {} is not an entry object",
                    entry.display_hint()
                )));
            }
            let k = interp.get_value(&entry, &PropertyKey::Index(0))?;
            let v = interp.get_value(&entry, &PropertyKey::Index(1))?;
            let key = interp.to_property_key(&k)?;
            interp.create_data_property_or_throw(&obj, key, v)
        })();
        if let Err(err) = result {
            return Err(interp.iterator_close_with_error(&record.iterator, err));
        }
    }
    Ok(JsValue::Object(obj))
}

/// Object.getOwnPropertyDescriptor(obj, key)
fn object_get_own_property_descriptor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&arg(args, 0))?;
    let key = interp.to_property_key(&arg(args, 1))?;
    let desc = interp.get_own_property(&obj, &key)?;
    Ok(interp.from_property_descriptor(desc))
}

fn object_get_own_property_descriptors(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&arg(args, 0))?;
    let result = interp.create_object();
    for key in interp.own_property_keys(&obj)? {
        let desc = interp.get_own_property(&obj, &key)?;
        if desc.is_some() {
            let value = interp.from_property_descriptor(desc);
            interp.create_data_property(&result, key, value)?;
        }
    }
    Ok(JsValue::Object(result))
}

fn own_keys_filtered(interp: &mut Interpreter, args: &[JsValue], symbols: bool) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&arg(args, 0))?;
    let keys: Vec<JsValue> = interp
        .own_property_keys(&obj)?
        .into_iter()
        .filter(|k| k.is_symbol() == symbols)
        .map(|k| k.to_value())
        .collect();
    Ok(JsValue::Object(interp.create_array(keys)))
}

fn object_get_own_property_names(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    own_keys_filtered(interp, args, false)
}

fn object_get_own_property_symbols(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    own_keys_filtered(interp, args, true)
}

fn object_get_prototype_of(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&arg(args, 0))?;
    Ok(JsValue::from(interp.get_prototype_of(&obj)?))
}

/// Object.setPrototypeOf(obj, proto)
fn object_set_prototype_of(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let target = arg(args, 0);
    if target.is_nullish() {
        return Err(JsError::type_error("Object.setPrototypeOf called on null or undefined"));
    }
    let proto = match arg(args, 1) {
        JsValue::Object(p) => Some(p),
        JsValue::Null => None,
        other => {
            return Err(JsError::type_error(format!(
                "Object prototype may only be an Object or null: {}",
                other.display_hint()
            )));
        }
    };
    if let JsValue::Object(obj) = &target {
        if !interp.set_prototype_of(obj, proto)? {
            return Err(JsError::type_error("Cyclic __proto__ value or object is not extensible"));
        }
    }
    Ok(target)
}

fn object_is(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Bool(arg(args, 0).same_value(&arg(args, 1))))
}

fn object_has_own(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&arg(args, 0))?;
    let key = interp.to_property_key(&arg(args, 1))?;
    Ok(JsValue::Bool(interp.has_own_property(&obj, &key)?))
}

/// Object.groupBy(items, callback)
fn object_group_by(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let groups = group_by(interp, args, "Object.groupBy", |interp, key| {
        Ok(interp.to_property_key(&key)?.to_value())
    })?;
    let result = interp.create_object_with_proto(None);
    for (key, items) in groups {
        let key = interp.to_property_key(&key)?;
        let arr = interp.create_array(items);
        interp.create_data_property_or_throw(&result, key, JsValue::Object(arr))?;
    }
    Ok(JsValue::Object(result))
}

/// `GroupBy`: iterate `items`, bucketing values by the callback's key.
/// `normalize` turns the raw key into the value keys are compared by.
pub(crate) fn group_by(
    interp: &mut Interpreter,
    args: &[JsValue],
    context: &str,
    normalize: impl Fn(&mut Interpreter, JsValue) -> Result<JsValue, JsError>,
) -> Result<Vec<(JsValue, Vec<JsValue>)>, JsError> {
    let items = arg(args, 0);
    if items.is_nullish() {
        return Err(JsError::type_error(format!("{context} called on null or undefined")));
    }
    let f = callback(&arg(args, 1), context)?;
    let mut groups: Vec<(JsValue, Vec<JsValue>)> = Vec::new();
    let mut record = interp.get_iterator(&items)?;
    let mut index = 0usize;
    while let Some(value) = interp.iterator_step_value(&mut record)? {
        let key = interp
            .call_function(&f, JsValue::Undefined, &[value.clone(), JsValue::from(index)])
            .and_then(|k| normalize(interp, k));
        let key = match key {
            Ok(k) => k,
            Err(err) => return Err(interp.iterator_close_with_error(&record.iterator, err)),
        };
        match groups.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
            Some((_, bucket)) => bucket.push(value),
            None => groups.push((key, vec![value])),
        }
        index += 1;
    }
    Ok(groups)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Object.prototype
// ═══════════════════════════════════════════════════════════════════════════════

fn object_has_own_property(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let key = interp.to_property_key(&arg(args, 0))?;
    let obj = interp.to_object(&this)?;
    Ok(JsValue::Bool(interp.has_own_property(&obj, &key)?))
}

fn object_is_prototype_of(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let JsValue::Object(value) = arg(args, 0) else {
        return Ok(JsValue::Bool(false));
    };
    let obj = interp.to_object(&this)?;
    let mut current = interp.get_prototype_of(&value)?;
    while let Some(p) = current {
        if p.ptr_eq(&obj) {
            return Ok(JsValue::Bool(true));
        }
        current = interp.get_prototype_of(&p)?;
    }
    Ok(JsValue::Bool(false))
}

fn object_property_is_enumerable(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let key = interp.to_property_key(&arg(args, 0))?;
    let obj = interp.to_object(&this)?;
    let desc = interp.get_own_property(&obj, &key)?;
    Ok(JsValue::Bool(desc.is_some_and(|d| d.enumerable == Some(true))))
}

/// Object.prototype.toString: `[object Tag]`
pub(crate) fn object_to_string(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let builtin = match &this {
        JsValue::Undefined => return Ok(JsValue::from("[object Undefined]")),
        JsValue::Null => return Ok(JsValue::from("[object Null]")),
        _ => {
            if interp.is_array(&this)? {
                "Array"
            } else {
                let obj = interp.to_object(&this)?;
                let o = obj.borrow();
                match &o.kind {
                    ObjectKind::Arguments => "Arguments",
                    ObjectKind::Error => "Error",
                    ObjectKind::Boolean(_) => "Boolean",
                    ObjectKind::Number(_) => "Number",
                    ObjectKind::String(_) => "String",
                    ObjectKind::Date(_) => "Date",
                    ObjectKind::RegExp(_) => "RegExp",
                    _ if o.is_callable() => "Function",
                    _ => "Object",
                }
            }
        }
    };
    let tag = interp.get_value(&this, &PropertyKey::Symbol(JsSymbol::to_string_tag()))?;
    let tag = match tag {
        JsValue::String(s) => s,
        _ => JsString::from(builtin),
    };
    Ok(JsValue::from(format!("[object {tag}]")))
}

fn object_to_locale_string(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    interp.invoke(&this, &PropertyKey::from("toString"), &[])
}

fn object_value_of(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Object(interp.to_object(&this)?))
}

fn object_get_proto(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&this)?;
    Ok(JsValue::from(interp.get_prototype_of(&obj)?))
}

fn object_set_proto(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    if this.is_nullish() {
        return Err(JsError::type_error("Object.prototype.__proto__ called on null or undefined"));
    }
    let proto = match arg(args, 0) {
        JsValue::Object(p) => Some(p),
        JsValue::Null => None,
        _ => return Ok(JsValue::Undefined),
    };
    if let JsValue::Object(obj) = &this {
        if !interp.set_prototype_of(obj, proto)? {
            return Err(JsError::type_error("Cyclic __proto__ value"));
        }
    }
    Ok(JsValue::Undefined)
}

/// Data property for built-ins that define plain values
pub(crate) fn data_descriptor(value: JsValue) -> PropertyDescriptor {
    PropertyDescriptor::data(value, true, true, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_string_tags() {
        let mut interp = Interpreter::new(0, false);
        let arr = JsValue::Object(interp.create_array(vec![]));
        assert_eq!(object_to_string(&mut interp, arr, &[]).ok(), Some(JsValue::from("[object Array]")));
        assert_eq!(
            object_to_string(&mut interp, JsValue::Null, &[]).ok(),
            Some(JsValue::from("[object Null]"))
        );
        assert_eq!(
            object_to_string(&mut interp, JsValue::from(1), &[]).ok(),
            Some(JsValue::from("[object Number]"))
        );
    }
}
