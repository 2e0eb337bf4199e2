//! Boolean built-in methods

use crate::error::JsError;
use crate::object::{JsObject, ObjectKind};
use crate::value::JsValue;

use super::arg;
use crate::interpreter::Interpreter;
use crate::interpreter::realm::Intrinsic;

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::BooleanPrototype).is_some() {
        return;
    }
    let object_proto = interp.intrinsic(Intrinsic::ObjectPrototype);
    let proto = interp.alloc(JsObject::new(ObjectKind::Boolean(false), Some(object_proto)));
    interp.register_method(&proto, "toString", boolean_to_string, 0);
    interp.register_method(&proto, "valueOf", boolean_value_of, 0);
    let ctor = interp.create_native_constructor("Boolean", boolean_constructor, 1, &proto);
    interp.realm.set(Intrinsic::BooleanPrototype, proto);
    interp.realm.set(Intrinsic::Boolean, ctor);
}

/// Boolean(value)
fn boolean_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let b = arg(args, 0).to_boolean();
    let nt = interp.new_target.clone();
    if nt.is_undefined() {
        return Ok(JsValue::Bool(b));
    }
    let proto = interp.get_prototype_from_constructor(&nt, Intrinsic::BooleanPrototype)?;
    Ok(JsValue::Object(interp.alloc(JsObject::new(ObjectKind::Boolean(b), Some(proto)))))
}

/// `thisBooleanValue`
fn this_boolean_value(this: &JsValue, method: &str) -> Result<bool, JsError> {
    match this {
        JsValue::Bool(b) => Ok(*b),
        JsValue::Object(o) => match o.borrow().kind {
            ObjectKind::Boolean(b) => Ok(b),
            _ => Err(JsError::type_error(format!(
                "Boolean.prototype.{method} requires that 'this' be a Boolean"
            ))),
        },
        _ => Err(JsError::type_error(format!(
            "Boolean.prototype.{method} requires that 'this' be a Boolean"
        ))),
    }
}

fn boolean_to_string(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let b = this_boolean_value(&this, "toString")?;
    Ok(JsValue::from(if b { "true" } else { "false" }))
}

fn boolean_value_of(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Bool(this_boolean_value(&this, "valueOf")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapper_unwraps() {
        let mut interp = Interpreter::new(0, false);
        let proto = interp.intrinsic(Intrinsic::BooleanPrototype);
        let wrapped = JsValue::Object(interp.alloc(JsObject::new(ObjectKind::Boolean(true), Some(proto))));
        assert_eq!(boolean_value_of(&mut interp, wrapped, &[]).ok(), Some(JsValue::Bool(true)));
        assert!(boolean_to_string(&mut interp, JsValue::from(1), &[]).is_err());
    }
}
