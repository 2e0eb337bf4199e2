//! Proxy built-in and the proxy internal methods
//!
//! Every internal method looks up the matching trap on the handler and
//! forwards to the target when the trap is absent. Trap results are checked
//! against the target so a handler cannot report a non-configurable
//! property differently from what the target holds.

use crate::error::JsError;
use crate::gc::Tracer;
use crate::object::{JsFunction, JsObject, JsObjectRef, NativeFunction, ObjectKind, PropertyDescriptor};
use crate::string::JsString;
use crate::value::{JsValue, PropertyKey};

use super::{arg, capture};
use crate::interpreter::Interpreter;
use crate::interpreter::realm::Intrinsic;

/// Proxy internal slots. `target` and `handler` are `None` once revoked.
pub struct ProxyData {
    pub target: Option<JsObjectRef>,
    pub handler: Option<JsObjectRef>,
    pub callable: bool,
    pub constructor: bool,
}

impl ProxyData {
    pub fn trace(&self, t: &mut Tracer<'_>) {
        t.object(&self.target);
        t.object(&self.handler);
    }
}

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::Proxy).is_some() {
        return;
    }
    let native = NativeFunction {
        func: proxy_constructor,
        captures: Vec::new(),
        constructor: true,
    };
    let ctor = interp.function_object(JsFunction::Native(native), JsString::from("Proxy"), 2);
    interp.register_method(&ctor, "revocable", proxy_revocable, 2);
    interp.realm.set(Intrinsic::Proxy, ctor);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constructor
// ═══════════════════════════════════════════════════════════════════════════════

/// new Proxy(target, handler)
fn proxy_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    if interp.new_target.is_undefined() {
        return Err(JsError::type_error("Constructor Proxy requires 'new'"));
    }
    let proxy = create_proxy(interp, &arg(args, 0), &arg(args, 1))?;
    Ok(JsValue::Object(proxy))
}

/// `ProxyCreate`
pub fn create_proxy(interp: &mut Interpreter, target: &JsValue, handler: &JsValue) -> Result<JsObjectRef, JsError> {
    let (JsValue::Object(target), JsValue::Object(handler)) = (target, handler) else {
        return Err(JsError::type_error(
            "Cannot create proxy with a non-object as target or handler",
        ));
    };
    let (callable, constructor) = {
        let t = target.borrow();
        (t.is_callable(), t.is_constructor())
    };
    let data = ProxyData {
        target: Some(target.clone()),
        handler: Some(handler.clone()),
        callable,
        constructor,
    };
    Ok(interp.alloc(JsObject::new(ObjectKind::Proxy(Box::new(data)), None)))
}

/// Proxy.revocable(target, handler)
fn proxy_revocable(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let proxy = create_proxy(interp, &arg(args, 0), &arg(args, 1))?;
    let revoke = interp.create_native_closure("", revoke_proxy, 0, vec![JsValue::Object(proxy.clone())]);
    let result = interp.create_object();
    {
        let mut r = result.borrow_mut();
        r.set_property(PropertyKey::from("proxy"), JsValue::Object(proxy));
        r.set_property(PropertyKey::from("revoke"), JsValue::Object(revoke));
    }
    Ok(JsValue::Object(result))
}

/// The `revoke` function returned by `Proxy.revocable`; a no-op after the
/// first call
fn revoke_proxy(interp: &mut Interpreter, _this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let JsValue::Object(proxy) = capture(interp, 0) else {
        return Ok(JsValue::Undefined);
    };
    if let ObjectKind::Proxy(p) = &mut proxy.borrow_mut().kind {
        p.target = None;
        p.handler = None;
    }
    super::set_capture(&super::callee(interp), 0, JsValue::Undefined);
    Ok(JsValue::Undefined)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Trap lookup
// ═══════════════════════════════════════════════════════════════════════════════

/// Target, handler and trap for operation `name` on `proxy`
struct Trap {
    target: JsObjectRef,
    handler: JsValue,
    method: Option<JsValue>,
}

fn lookup_trap(interp: &mut Interpreter, proxy: &JsObjectRef, name: &str) -> Result<Trap, JsError> {
    let (target, handler) = match &proxy.borrow().kind {
        ObjectKind::Proxy(p) => (p.target.clone(), p.handler.clone()),
        _ => (None, None),
    };
    let (Some(target), Some(handler)) = (target, handler) else {
        return Err(JsError::type_error(format!(
            "Cannot perform '{name}' on a proxy that has been revoked"
        )));
    };
    let handler = JsValue::Object(handler);
    let method = interp.get_method(&handler, &PropertyKey::from(name))?;
    Ok(Trap { target, handler, method })
}

fn trap_error(name: &str, detail: impl std::fmt::Display) -> JsError {
    JsError::type_error(format!("'{name}' on proxy: {detail}"))
}

/// `IsCompatiblePropertyDescriptor`: whether `desc` could be applied to
/// `current` on an object with the given extensibility
fn is_compatible(extensible: bool, desc: &PropertyDescriptor, current: Option<&PropertyDescriptor>) -> bool {
    let Some(current) = current else {
        return extensible;
    };
    if current.configurable == Some(true) {
        return true;
    }
    if desc.configurable == Some(true) {
        return false;
    }
    if desc.enumerable.is_some() && desc.enumerable != current.enumerable {
        return false;
    }
    if desc.is_generic_descriptor() {
        return true;
    }
    if desc.is_accessor_descriptor() != current.is_accessor_descriptor() {
        return false;
    }
    if current.is_accessor_descriptor() {
        let same = |a: &Option<JsValue>, b: &Option<JsValue>| match (a, b) {
            (Some(x), Some(y)) => x.same_value(y),
            (None, _) => true,
            (Some(_), None) => false,
        };
        return same(&desc.get, &current.get) && same(&desc.set, &current.set);
    }
    if current.writable == Some(false) {
        if desc.writable == Some(true) {
            return false;
        }
        if let (Some(v), Some(c)) = (&desc.value, &current.value) {
            return v.same_value(c);
        }
    }
    true
}

/// Fill the absent fields of a descriptor with their defaults
fn complete_descriptor(mut desc: PropertyDescriptor) -> PropertyDescriptor {
    if desc.is_generic_descriptor() || desc.is_data_descriptor() {
        desc.value.get_or_insert(JsValue::Undefined);
        desc.writable.get_or_insert(false);
    } else {
        desc.get.get_or_insert(JsValue::Undefined);
        desc.set.get_or_insert(JsValue::Undefined);
    }
    desc.enumerable.get_or_insert(false);
    desc.configurable.get_or_insert(false);
    desc
}

// ═══════════════════════════════════════════════════════════════════════════════
// Internal methods
// ═══════════════════════════════════════════════════════════════════════════════

/// `[[Get]]`
pub fn get(
    interp: &mut Interpreter,
    proxy: &JsObjectRef,
    key: &PropertyKey,
    receiver: &JsValue,
) -> Result<JsValue, JsError> {
    let trap = lookup_trap(interp, proxy, "get")?;
    let Some(method) = trap.method else {
        return interp.get_with_receiver(&trap.target, key, receiver);
    };
    let args = [JsValue::Object(trap.target.clone()), key.to_value(), receiver.clone()];
    let value = interp.call_function(&method, trap.handler, &args)?;
    if let Some(desc) = interp.get_own_property(&trap.target, key)? {
        if desc.configurable == Some(false) {
            if desc.is_data_descriptor()
                && desc.writable == Some(false)
                && !desc.value.as_ref().is_some_and(|v| v.same_value(&value))
            {
                return Err(trap_error(
                    "get",
                    format!("property '{key}' is a read-only and non-configurable data property on the proxy target but the proxy did not return its actual value"),
                ));
            }
            if desc.is_accessor_descriptor()
                && desc.get.as_ref().is_none_or(JsValue::is_undefined)
                && !value.is_undefined()
            {
                return Err(trap_error(
                    "get",
                    format!("property '{key}' is a non-configurable accessor property on the proxy target and does not have a getter function, but the trap did not return 'undefined'"),
                ));
            }
        }
    }
    Ok(value)
}

/// `[[Set]]`
pub fn set(
    interp: &mut Interpreter,
    proxy: &JsObjectRef,
    key: PropertyKey,
    value: JsValue,
    receiver: &JsValue,
) -> Result<bool, JsError> {
    let trap = lookup_trap(interp, proxy, "set")?;
    let Some(method) = trap.method else {
        return interp.set(&trap.target, key, value, receiver);
    };
    let args = [
        JsValue::Object(trap.target.clone()),
        key.to_value(),
        value.clone(),
        receiver.clone(),
    ];
    if !interp.call_function(&method, trap.handler, &args)?.to_boolean() {
        return Ok(false);
    }
    if let Some(desc) = interp.get_own_property(&trap.target, &key)? {
        if desc.configurable == Some(false) {
            if desc.is_data_descriptor()
                && desc.writable == Some(false)
                && !desc.value.as_ref().is_some_and(|v| v.same_value(&value))
            {
                return Err(trap_error(
                    "set",
                    format!("trap returned truish for property '{key}' which exists in the proxy target as a non-configurable and non-writable data property with a different value"),
                ));
            }
            if desc.is_accessor_descriptor() && desc.set.as_ref().is_none_or(JsValue::is_undefined) {
                return Err(trap_error(
                    "set",
                    format!("trap returned truish for property '{key}' which exists in the proxy target as a non-configurable and writable accessor property without a setter"),
                ));
            }
        }
    }
    Ok(true)
}

/// `[[HasProperty]]`
pub fn has(interp: &mut Interpreter, proxy: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
    let trap = lookup_trap(interp, proxy, "has")?;
    let Some(method) = trap.method else {
        return interp.has_property(&trap.target, key);
    };
    let args = [JsValue::Object(trap.target.clone()), key.to_value()];
    let found = interp.call_function(&method, trap.handler, &args)?.to_boolean();
    if !found {
        if let Some(desc) = interp.get_own_property(&trap.target, key)? {
            if desc.configurable == Some(false) {
                return Err(trap_error(
                    "has",
                    format!("trap returned falsish for property '{key}' which exists in the proxy target as non-configurable"),
                ));
            }
            if !interp.is_extensible(&trap.target)? {
                return Err(trap_error(
                    "has",
                    format!("trap returned falsish for property '{key}' but the proxy target is not extensible"),
                ));
            }
        }
    }
    Ok(found)
}

/// `[[Delete]]`
pub fn delete(interp: &mut Interpreter, proxy: &JsObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
    let trap = lookup_trap(interp, proxy, "deleteProperty")?;
    let Some(method) = trap.method else {
        return interp.delete_property(&trap.target, key);
    };
    let args = [JsValue::Object(trap.target.clone()), key.to_value()];
    if !interp.call_function(&method, trap.handler, &args)?.to_boolean() {
        return Ok(false);
    }
    if let Some(desc) = interp.get_own_property(&trap.target, key)? {
        if desc.configurable == Some(false) {
            return Err(trap_error(
                "deleteProperty",
                format!("trap returned truish for property '{key}' which is non-configurable in the proxy target"),
            ));
        }
        if !interp.is_extensible(&trap.target)? {
            return Err(trap_error(
                "deleteProperty",
                format!("trap returned truish for property '{key}' but the proxy target is non-extensible"),
            ));
        }
    }
    Ok(true)
}

/// `[[GetOwnProperty]]`
pub fn get_own_property(
    interp: &mut Interpreter,
    proxy: &JsObjectRef,
    key: &PropertyKey,
) -> Result<Option<PropertyDescriptor>, JsError> {
    let trap = lookup_trap(interp, proxy, "getOwnPropertyDescriptor")?;
    let Some(method) = trap.method else {
        return interp.get_own_property(&trap.target, key);
    };
    let args = [JsValue::Object(trap.target.clone()), key.to_value()];
    let result = interp.call_function(&method, trap.handler, &args)?;
    if !result.is_undefined() && !result.is_object() {
        return Err(trap_error(
            "getOwnPropertyDescriptor",
            format!("trap returned neither object nor undefined for property '{key}'"),
        ));
    }
    let target_desc = interp.get_own_property(&trap.target, key)?;
    let extensible = interp.is_extensible(&trap.target)?;
    if result.is_undefined() {
        let Some(current) = target_desc else {
            return Ok(None);
        };
        if current.configurable == Some(false) {
            return Err(trap_error(
                "getOwnPropertyDescriptor",
                format!("trap returned undefined for property '{key}' which is non-configurable in the proxy target"),
            ));
        }
        if !extensible {
            return Err(trap_error(
                "getOwnPropertyDescriptor",
                format!("trap returned undefined for property '{key}' which exists in the non-extensible proxy target"),
            ));
        }
        return Ok(None);
    }
    let desc = complete_descriptor(interp.to_property_descriptor(&result)?);
    if !is_compatible(extensible, &desc, target_desc.as_ref()) {
        return Err(trap_error(
            "getOwnPropertyDescriptor",
            format!("trap returned descriptor for property '{key}' that is incompatible with the existing property in the proxy target"),
        ));
    }
    if desc.configurable == Some(false) {
        match &target_desc {
            Some(current) if current.configurable == Some(false) => {
                if desc.writable == Some(false) && current.writable == Some(true) {
                    return Err(trap_error(
                        "getOwnPropertyDescriptor",
                        format!("trap reported non-configurable and writable for property '{key}' which is non-configurable, non-writable in the proxy target"),
                    ));
                }
            }
            _ => {
                return Err(trap_error(
                    "getOwnPropertyDescriptor",
                    format!("trap reported non-configurability for property '{key}' which is either non-existent or configurable in the proxy target"),
                ));
            }
        }
    }
    Ok(Some(desc))
}

/// `[[DefineOwnProperty]]`
pub fn define_own_property(
    interp: &mut Interpreter,
    proxy: &JsObjectRef,
    key: PropertyKey,
    desc: PropertyDescriptor,
) -> Result<bool, JsError> {
    let trap = lookup_trap(interp, proxy, "defineProperty")?;
    let Some(method) = trap.method else {
        return interp.define_own_property(&trap.target, key, desc);
    };
    let desc_obj = interp.from_property_descriptor(Some(desc.clone()));
    let args = [JsValue::Object(trap.target.clone()), key.to_value(), desc_obj];
    if !interp.call_function(&method, trap.handler, &args)?.to_boolean() {
        return Ok(false);
    }
    let target_desc = interp.get_own_property(&trap.target, &key)?;
    let extensible = interp.is_extensible(&trap.target)?;
    let setting_non_configurable = desc.configurable == Some(false);
    match target_desc {
        None => {
            if !extensible {
                return Err(trap_error(
                    "defineProperty",
                    format!("trap returned truish for adding property '{key}' to the non-extensible proxy target"),
                ));
            }
            if setting_non_configurable {
                return Err(trap_error(
                    "defineProperty",
                    format!("trap returned truish for defining non-configurable property '{key}' which is either non-existent or configurable in the proxy target"),
                ));
            }
        }
        Some(current) => {
            if !is_compatible(extensible, &desc, Some(&current)) {
                return Err(trap_error(
                    "defineProperty",
                    format!("trap returned truish for adding property '{key}' that is incompatible with the existing property in the proxy target"),
                ));
            }
            if setting_non_configurable && current.configurable == Some(true) {
                return Err(trap_error(
                    "defineProperty",
                    format!("trap returned truish for defining non-configurable property '{key}' which is either non-existent or configurable in the proxy target"),
                ));
            }
            if current.is_data_descriptor()
                && current.configurable == Some(false)
                && current.writable == Some(true)
                && desc.writable == Some(false)
            {
                return Err(trap_error(
                    "defineProperty",
                    format!("trap returned truish for defining non-configurable property '{key}' which cannot be non-writable, unless there exists a corresponding non-configurable, non-writable own property of the target object"),
                ));
            }
        }
    }
    Ok(true)
}

/// `[[OwnPropertyKeys]]`
pub fn own_keys(interp: &mut Interpreter, proxy: &JsObjectRef) -> Result<Vec<PropertyKey>, JsError> {
    let trap = lookup_trap(interp, proxy, "ownKeys")?;
    let Some(method) = trap.method else {
        return interp.own_property_keys(&trap.target);
    };
    let result = interp.call_function(&method, trap.handler, &[JsValue::Object(trap.target.clone())])?;
    if !result.is_object() {
        return Err(trap_error("ownKeys", "trap result must be an object"));
    }
    let mut keys: Vec<PropertyKey> = Vec::new();
    let mut seen = rustc_hash::FxHashSet::default();
    for value in interp.create_list_from_array_like(&result)? {
        let key = match &value {
            JsValue::String(s) => PropertyKey::from(s),
            JsValue::Symbol(s) => PropertyKey::from(s.clone()),
            other => {
                return Err(trap_error(
                    "ownKeys",
                    format!("{} is not a valid property name", other.display_hint()),
                ));
            }
        };
        if !seen.insert(key.clone()) {
            return Err(trap_error("ownKeys", format!("trap returned duplicate entries ('{key}')")));
        }
        keys.push(key);
    }

    let extensible = interp.is_extensible(&trap.target)?;
    let target_keys = interp.own_property_keys(&trap.target)?;
    let mut configurable = Vec::new();
    let mut non_configurable = Vec::new();
    for key in target_keys {
        match interp.get_own_property(&trap.target, &key)? {
            Some(d) if d.configurable == Some(false) => non_configurable.push(key),
            _ => configurable.push(key),
        }
    }
    if extensible && non_configurable.is_empty() {
        return Ok(keys);
    }
    let mut unchecked = seen;
    for key in &non_configurable {
        if !unchecked.remove(key) {
            return Err(trap_error(
                "ownKeys",
                format!("trap result did not include '{key}'"),
            ));
        }
    }
    if extensible {
        return Ok(keys);
    }
    for key in &configurable {
        if !unchecked.remove(key) {
            return Err(trap_error(
                "ownKeys",
                format!("trap result did not include '{key}'"),
            ));
        }
    }
    if !unchecked.is_empty() {
        return Err(trap_error(
            "ownKeys",
            "trap returned extra keys but proxy target is non-extensible",
        ));
    }
    Ok(keys)
}

/// `[[GetPrototypeOf]]`
pub fn get_prototype_of(interp: &mut Interpreter, proxy: &JsObjectRef) -> Result<Option<JsObjectRef>, JsError> {
    let trap = lookup_trap(interp, proxy, "getPrototypeOf")?;
    let Some(method) = trap.method else {
        return interp.get_prototype_of(&trap.target);
    };
    let result = interp.call_function(&method, trap.handler, &[JsValue::Object(trap.target.clone())])?;
    let proto = match result {
        JsValue::Object(o) => Some(o),
        JsValue::Null => None,
        _ => return Err(trap_error("getPrototypeOf", "trap returned neither object nor null")),
    };
    if interp.is_extensible(&trap.target)? {
        return Ok(proto);
    }
    let actual = interp.get_prototype_of(&trap.target)?;
    if !same_proto(&proto, &actual) {
        return Err(trap_error(
            "getPrototypeOf",
            "proxy target is non-extensible but the trap did not return its actual prototype",
        ));
    }
    Ok(proto)
}

fn same_proto(a: &Option<JsObjectRef>, b: &Option<JsObjectRef>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x.ptr_eq(y),
        (None, None) => true,
        _ => false,
    }
}

/// `[[SetPrototypeOf]]`
pub fn set_prototype_of(
    interp: &mut Interpreter,
    proxy: &JsObjectRef,
    proto: Option<JsObjectRef>,
) -> Result<bool, JsError> {
    let trap = lookup_trap(interp, proxy, "setPrototypeOf")?;
    let Some(method) = trap.method else {
        return interp.set_prototype_of(&trap.target, proto);
    };
    let args = [JsValue::Object(trap.target.clone()), JsValue::from(proto.clone())];
    if !interp.call_function(&method, trap.handler, &args)?.to_boolean() {
        return Ok(false);
    }
    if interp.is_extensible(&trap.target)? {
        return Ok(true);
    }
    let actual = interp.get_prototype_of(&trap.target)?;
    if !same_proto(&proto, &actual) {
        return Err(trap_error(
            "setPrototypeOf",
            "trap returned truish for setting a new prototype on the non-extensible proxy target",
        ));
    }
    Ok(true)
}

/// `[[IsExtensible]]`
pub fn is_extensible(interp: &mut Interpreter, proxy: &JsObjectRef) -> Result<bool, JsError> {
    let trap = lookup_trap(interp, proxy, "isExtensible")?;
    let Some(method) = trap.method else {
        return interp.is_extensible(&trap.target);
    };
    let result = interp
        .call_function(&method, trap.handler, &[JsValue::Object(trap.target.clone())])?
        .to_boolean();
    if result != interp.is_extensible(&trap.target)? {
        return Err(trap_error(
            "isExtensible",
            format!("trap result does not reflect extensibility of proxy target (which is '{}')", !result),
        ));
    }
    Ok(result)
}

/// `[[PreventExtensions]]`
pub fn prevent_extensions(interp: &mut Interpreter, proxy: &JsObjectRef) -> Result<bool, JsError> {
    let trap = lookup_trap(interp, proxy, "preventExtensions")?;
    let Some(method) = trap.method else {
        return interp.prevent_extensions(&trap.target);
    };
    let result = interp
        .call_function(&method, trap.handler, &[JsValue::Object(trap.target.clone())])?
        .to_boolean();
    if result && interp.is_extensible(&trap.target)? {
        return Err(trap_error("preventExtensions", "trap returned truish but the proxy target is extensible"));
    }
    Ok(result)
}

/// `[[Call]]`
pub fn call(interp: &mut Interpreter, proxy: &JsObjectRef, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let trap = lookup_trap(interp, proxy, "apply")?;
    let target = JsValue::Object(trap.target);
    let Some(method) = trap.method else {
        return interp.call_function(&target, this, args);
    };
    let list = JsValue::Object(interp.create_array(args.to_vec()));
    interp.call_function(&method, trap.handler, &[target, this, list])
}

/// `[[Construct]]`
pub fn construct(
    interp: &mut Interpreter,
    proxy: &JsObjectRef,
    args: &[JsValue],
    new_target: &JsValue,
) -> Result<JsValue, JsError> {
    let trap = lookup_trap(interp, proxy, "construct")?;
    let target = JsValue::Object(trap.target);
    let Some(method) = trap.method else {
        return interp.construct(&target, args, Some(new_target));
    };
    let list = JsValue::Object(interp.create_array(args.to_vec()));
    let result = interp.call_function(&method, trap.handler, &[target, list, new_target.clone()])?;
    if !result.is_object() {
        return Err(trap_error("construct", "trap returned non-object"));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy_of(interp: &mut Interpreter, target: &JsObjectRef, handler: &JsObjectRef) -> JsObjectRef {
        let made = create_proxy(interp, &JsValue::Object(target.clone()), &JsValue::Object(handler.clone()));
        let Ok(p) = made else {
            panic!("proxy creation failed");
        };
        p
    }

    #[test]
    fn missing_traps_forward_to_target() {
        let mut interp = Interpreter::new(0, false);
        let target = interp.create_object();
        target.borrow_mut().set_property(PropertyKey::from("x"), JsValue::from(1));
        let handler = interp.create_object();
        let proxy = proxy_of(&mut interp, &target, &handler);
        let receiver = JsValue::Object(proxy.clone());
        let value = get(&mut interp, &proxy, &PropertyKey::from("x"), &receiver);
        assert_eq!(value.ok(), Some(JsValue::from(1)));
        assert_eq!(has(&mut interp, &proxy, &PropertyKey::from("y")).ok(), Some(false));
    }

    #[test]
    fn revoked_proxy_throws() {
        let mut interp = Interpreter::new(0, false);
        let target = interp.create_object();
        let handler = interp.create_object();
        let proxy = proxy_of(&mut interp, &target, &handler);
        if let ObjectKind::Proxy(p) = &mut proxy.borrow_mut().kind {
            p.target = None;
            p.handler = None;
        }
        let result = own_keys(&mut interp, &proxy);
        assert!(matches!(result, Err(JsError::TypeError { .. })));
    }

    #[test]
    fn non_object_target_is_rejected() {
        let mut interp = Interpreter::new(0, false);
        let handler = JsValue::Object(interp.create_object());
        assert!(create_proxy(&mut interp, &JsValue::from(1), &handler).is_err());
    }

    #[test]
    fn compatibility_of_frozen_property() {
        let current = PropertyDescriptor::data(JsValue::from(1), false, true, false);
        let same = PropertyDescriptor::data(JsValue::from(1), false, true, false);
        let changed = PropertyDescriptor::data(JsValue::from(2), false, true, false);
        assert!(is_compatible(true, &same, Some(&current)));
        assert!(!is_compatible(true, &changed, Some(&current)));
        assert!(!is_compatible(false, &same, None));
    }
}
