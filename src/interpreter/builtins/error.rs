//! Error constructor built-in methods

use crate::error::JsError;
use crate::object::{Attributes, JsObject, NativeFn, ObjectKind, Property};
use crate::string::JsString;
use crate::value::{JsValue, PropertyKey};

use super::arg;
use crate::error::format_stack;
use crate::interpreter::realm::Intrinsic;
use crate::interpreter::{ErrorKind, Interpreter};

const NATIVE_ERRORS: [(ErrorKind, Intrinsic, NativeFn); 8] = [
    (ErrorKind::TypeError, Intrinsic::TypeError, type_error_constructor),
    (ErrorKind::RangeError, Intrinsic::RangeError, range_error_constructor),
    (ErrorKind::ReferenceError, Intrinsic::ReferenceError, reference_error_constructor),
    (ErrorKind::SyntaxError, Intrinsic::SyntaxError, syntax_error_constructor),
    (ErrorKind::UriError, Intrinsic::UriError, uri_error_constructor),
    (ErrorKind::EvalError, Intrinsic::EvalError, eval_error_constructor),
    (ErrorKind::AggregateError, Intrinsic::AggregateError, aggregate_error_constructor),
    (ErrorKind::HostError, Intrinsic::HostError, host_error_constructor),
];

/// Initialize Error and all derived error constructors
pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::Error).is_some() {
        return;
    }
    let error_proto = interp.create_object();
    set_name_and_message(&error_proto, ErrorKind::Error);
    interp.register_method(&error_proto, "toString", error_to_string, 0);
    let error_ctor = interp.create_native_constructor("Error", error_constructor, 1, &error_proto);
    interp.realm.set(Intrinsic::ErrorPrototype, error_proto.clone());
    interp.realm.set(Intrinsic::Error, error_ctor.clone());

    for (kind, which, func) in NATIVE_ERRORS {
        let proto = interp.create_object_with_proto(Some(error_proto.clone()));
        set_name_and_message(&proto, kind);
        let arity = if kind == ErrorKind::AggregateError { 2 } else { 1 };
        let ctor = interp.create_native_constructor(kind.name(), func, arity, &proto);
        ctor.borrow_mut().prototype = Some(error_ctor.clone());
        interp.realm.set(kind.prototype(), proto);
        interp.realm.set(which, ctor);
    }
}

fn set_name_and_message(proto: &crate::object::JsObjectRef, kind: ErrorKind) {
    let mut p = proto.borrow_mut();
    p.define_property(
        PropertyKey::from("name"),
        Property::data(JsValue::from(kind.name()), Attributes::HIDDEN),
    );
    p.define_property(
        PropertyKey::from("message"),
        Property::data(JsValue::from(""), Attributes::HIDDEN),
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constructors
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared body of the error constructors; callable with or without `new`
fn construct_error(
    interp: &mut Interpreter,
    kind: ErrorKind,
    message: &JsValue,
    options: &JsValue,
) -> Result<JsValue, JsError> {
    let nt = interp.new_target.clone();
    let proto = if nt.is_undefined() {
        interp.intrinsic(kind.prototype())
    } else {
        interp.get_prototype_from_constructor(&nt, kind.prototype())?
    };
    let obj = interp.alloc(JsObject::new(ObjectKind::Error, Some(proto)));
    let message = if message.is_undefined() {
        None
    } else {
        Some(interp.to_string(message)?)
    };
    if let Some(m) = &message {
        obj.borrow_mut().define_property(
            PropertyKey::from("message"),
            Property::data(JsValue::String(m.clone()), Attributes::HIDDEN),
        );
    }
    if let JsValue::Object(opts) = options {
        let cause = PropertyKey::from("cause");
        if interp.has_property(opts, &cause)? {
            let value = interp.get(opts, &cause)?;
            obj.borrow_mut()
                .define_property(cause, Property::data(value, Attributes::HIDDEN));
        }
    }

    let header = match &message {
        Some(m) if !m.is_empty() => format!("{}: {m}", kind.name()),
        _ => kind.name().to_string(),
    };
    let stack = interp.capture_stack();
    obj.borrow_mut().define_property(
        PropertyKey::from("stack"),
        Property::data(
            JsValue::from(format!("{header}{}", format_stack(&stack))),
            Attributes::HIDDEN,
        ),
    );
    Ok(JsValue::Object(obj))
}

fn error_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    construct_error(interp, ErrorKind::Error, &arg(args, 0), &arg(args, 1))
}

fn type_error_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    construct_error(interp, ErrorKind::TypeError, &arg(args, 0), &arg(args, 1))
}

fn range_error_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    construct_error(interp, ErrorKind::RangeError, &arg(args, 0), &arg(args, 1))
}

fn reference_error_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    construct_error(interp, ErrorKind::ReferenceError, &arg(args, 0), &arg(args, 1))
}

fn syntax_error_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    construct_error(interp, ErrorKind::SyntaxError, &arg(args, 0), &arg(args, 1))
}

fn uri_error_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    construct_error(interp, ErrorKind::UriError, &arg(args, 0), &arg(args, 1))
}

fn eval_error_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    construct_error(interp, ErrorKind::EvalError, &arg(args, 0), &arg(args, 1))
}

fn host_error_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    construct_error(interp, ErrorKind::HostError, &arg(args, 0), &arg(args, 1))
}

/// AggregateError(errors, message, options)
fn aggregate_error_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let err = construct_error(interp, ErrorKind::AggregateError, &arg(args, 1), &arg(args, 2))?;
    let errors = interp.iterate_to_vec(&arg(args, 0))?;
    if let JsValue::Object(obj) = &err {
        let list = interp.create_array(errors);
        obj.borrow_mut().define_property(
            PropertyKey::from("errors"),
            Property::data(JsValue::Object(list), Attributes::HIDDEN),
        );
    }
    Ok(err)
}

/// `AggregateError` carrying `errors`, as `Promise.any` rejects with
pub(crate) fn create_aggregate_error(interp: &mut Interpreter, errors: Vec<JsValue>, message: &str) -> JsValue {
    let obj = interp.create_error(ErrorKind::AggregateError, message);
    let list = interp.create_array(errors);
    obj.borrow_mut().define_property(
        PropertyKey::from("errors"),
        Property::data(JsValue::Object(list), Attributes::HIDDEN),
    );
    JsValue::Object(obj)
}

/// `HostError` wrapping a failure reported by host code. The original
/// message is kept on `value`.
pub(crate) fn create_host_error(interp: &mut Interpreter, message: &str) -> JsValue {
    let obj = interp.create_error(ErrorKind::HostError, message);
    obj.borrow_mut().define_property(
        PropertyKey::from("value"),
        Property::data(JsValue::from(message), Attributes::HIDDEN),
    );
    JsValue::Object(obj)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error.prototype
// ═══════════════════════════════════════════════════════════════════════════════

/// Error.prototype.toString
pub fn error_to_string(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let JsValue::Object(obj) = &this else {
        return Err(JsError::type_error("Error.prototype.toString called on non-object"));
    };
    let name = match interp.get(obj, &PropertyKey::from("name"))? {
        JsValue::Undefined => JsString::from("Error"),
        v => interp.to_string(&v)?,
    };
    let message = match interp.get(obj, &PropertyKey::from("message"))? {
        JsValue::Undefined => JsString::empty(),
        v => interp.to_string(&v)?,
    };
    let result = if name.is_empty() {
        message
    } else if message.is_empty() {
        name
    } else {
        JsString::from(format!("{name}: {message}"))
    };
    Ok(JsValue::String(result))
}
