//! Reflect namespace
//!
//! Each function is a thin wrapper over the matching internal method, so it
//! behaves the same on ordinary objects, proxies and host objects.

use crate::error::JsError;
use crate::object::JsObjectRef;
use crate::value::JsValue;

use super::arg;
use crate::interpreter::Interpreter;
use crate::interpreter::ops::describe;
use crate::interpreter::realm::Intrinsic;

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::Reflect).is_some() {
        return;
    }
    let reflect = interp.create_object();
    interp.register_method(&reflect, "apply", reflect_apply, 3);
    interp.register_method(&reflect, "construct", reflect_construct, 2);
    interp.register_method(&reflect, "defineProperty", reflect_define_property, 3);
    interp.register_method(&reflect, "deleteProperty", reflect_delete_property, 2);
    interp.register_method(&reflect, "get", reflect_get, 2);
    interp.register_method(&reflect, "getOwnPropertyDescriptor", reflect_get_own_property_descriptor, 2);
    interp.register_method(&reflect, "getPrototypeOf", reflect_get_prototype_of, 1);
    interp.register_method(&reflect, "has", reflect_has, 2);
    interp.register_method(&reflect, "isExtensible", reflect_is_extensible, 1);
    interp.register_method(&reflect, "ownKeys", reflect_own_keys, 1);
    interp.register_method(&reflect, "preventExtensions", reflect_prevent_extensions, 1);
    interp.register_method(&reflect, "set", reflect_set, 3);
    interp.register_method(&reflect, "setPrototypeOf", reflect_set_prototype_of, 2);
    super::set_to_string_tag(&reflect, "Reflect");
    interp.realm.set(Intrinsic::Reflect, reflect);
}

/// First argument as the target object
fn target(args: &[JsValue], method: &str) -> Result<JsObjectRef, JsError> {
    match args.first() {
        Some(JsValue::Object(o)) => Ok(o.clone()),
        other => Err(JsError::type_error(format!(
            "Reflect.{method} called on non-object {}",
            describe(other.unwrap_or(&JsValue::Undefined))
        ))),
    }
}

/// Reflect.apply(target, thisArgument, argumentsList)
fn reflect_apply(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let func = arg(args, 0);
    if !func.is_callable() {
        return Err(JsError::type_error(format!(
            "Function.prototype.apply was called on {}, which is not a function",
            describe(&func)
        )));
    }
    let list = arg(args, 2);
    if !list.is_object() {
        return Err(JsError::type_error("CreateListFromArrayLike called on non-object"));
    }
    let call_args = interp.create_list_from_array_like(&list)?;
    interp.call_function(&func, arg(args, 1), &call_args)
}

/// Reflect.construct(target, argumentsList, newTarget)
fn reflect_construct(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let ctor = arg(args, 0);
    if !ctor.is_constructor() {
        return Err(JsError::type_error(format!("{} is not a constructor", describe(&ctor))));
    }
    let new_target = match args.get(2) {
        Some(nt) if !nt.is_constructor() => {
            return Err(JsError::type_error(format!("{} is not a constructor", describe(nt))));
        }
        Some(nt) => nt.clone(),
        None => ctor.clone(),
    };
    let list = arg(args, 1);
    if !list.is_object() {
        return Err(JsError::type_error("CreateListFromArrayLike called on non-object"));
    }
    let call_args = interp.create_list_from_array_like(&list)?;
    interp.construct(&ctor, &call_args, Some(&new_target))
}

/// Reflect.defineProperty(target, key, attributes)
fn reflect_define_property(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = target(args, "defineProperty")?;
    let key = interp.to_property_key(&arg(args, 1))?;
    let desc = interp.to_property_descriptor(&arg(args, 2))?;
    Ok(JsValue::Bool(interp.define_own_property(&obj, key, desc)?))
}

/// Reflect.deleteProperty(target, key)
fn reflect_delete_property(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = target(args, "deleteProperty")?;
    let key = interp.to_property_key(&arg(args, 1))?;
    Ok(JsValue::Bool(interp.delete_property(&obj, &key)?))
}

/// Reflect.get(target, key, receiver)
fn reflect_get(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = target(args, "get")?;
    let key = interp.to_property_key(&arg(args, 1))?;
    let receiver = args.get(2).cloned().unwrap_or_else(|| JsValue::Object(obj.clone()));
    interp.get_with_receiver(&obj, &key, &receiver)
}

/// Reflect.getOwnPropertyDescriptor(target, key)
fn reflect_get_own_property_descriptor(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = target(args, "getOwnPropertyDescriptor")?;
    let key = interp.to_property_key(&arg(args, 1))?;
    let desc = interp.get_own_property(&obj, &key)?;
    Ok(interp.from_property_descriptor(desc))
}

fn reflect_get_prototype_of(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = target(args, "getPrototypeOf")?;
    Ok(JsValue::from(interp.get_prototype_of(&obj)?))
}

fn reflect_has(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = target(args, "has")?;
    let key = interp.to_property_key(&arg(args, 1))?;
    Ok(JsValue::Bool(interp.has_property(&obj, &key)?))
}

fn reflect_is_extensible(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = target(args, "isExtensible")?;
    Ok(JsValue::Bool(interp.is_extensible(&obj)?))
}

/// Reflect.ownKeys(target): string keys in property order, then symbols
fn reflect_own_keys(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = target(args, "ownKeys")?;
    let keys: Vec<JsValue> = interp.own_property_keys(&obj)?.iter().map(|k| k.to_value()).collect();
    Ok(JsValue::Object(interp.create_array(keys)))
}

fn reflect_prevent_extensions(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = target(args, "preventExtensions")?;
    Ok(JsValue::Bool(interp.prevent_extensions(&obj)?))
}

/// Reflect.set(target, key, value, receiver)
fn reflect_set(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = target(args, "set")?;
    let key = interp.to_property_key(&arg(args, 1))?;
    let receiver = args.get(3).cloned().unwrap_or_else(|| JsValue::Object(obj.clone()));
    Ok(JsValue::Bool(interp.set(&obj, key, arg(args, 2), &receiver)?))
}

/// Reflect.setPrototypeOf(target, proto)
fn reflect_set_prototype_of(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = target(args, "setPrototypeOf")?;
    let proto = match arg(args, 1) {
        JsValue::Object(p) => Some(p),
        JsValue::Null => None,
        other => {
            return Err(JsError::type_error(format!(
                "Object prototype may only be an Object or null: {}",
                describe(&other)
            )));
        }
    };
    Ok(JsValue::Bool(interp.set_prototype_of(&obj, proto)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::PropertyKey;

    #[test]
    fn set_reports_rejection() {
        let mut interp = Interpreter::new(0, false);
        let obj = interp.create_object();
        obj.borrow_mut().extensible = false;
        let result = reflect_set(
            &mut interp,
            JsValue::Undefined,
            &[JsValue::Object(obj), JsValue::from("x"), JsValue::from(1)],
        );
        assert_eq!(result.ok(), Some(JsValue::Bool(false)));
    }

    #[test]
    fn own_keys_lists_strings() {
        let mut interp = Interpreter::new(0, false);
        let obj = interp.create_object();
        obj.borrow_mut().set_property(PropertyKey::from("b"), JsValue::from(1));
        obj.borrow_mut().set_property(PropertyKey::from("a"), JsValue::from(2));
        let Ok(JsValue::Object(keys)) = reflect_own_keys(&mut interp, JsValue::Undefined, &[JsValue::Object(obj)]) else {
            panic!("ownKeys failed");
        };
        let first = interp.get(&keys, &PropertyKey::from(0u32));
        assert_eq!(first.ok(), Some(JsValue::from("b")));
    }

    #[test]
    fn primitive_target_throws() {
        let mut interp = Interpreter::new(0, false);
        let result = reflect_has(&mut interp, JsValue::Undefined, &[JsValue::from(1), JsValue::from("x")]);
        assert!(matches!(result, Err(JsError::TypeError { .. })));
    }
}
