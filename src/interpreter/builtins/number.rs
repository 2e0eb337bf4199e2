//! Number built-in methods

use crate::error::JsError;
use crate::number as num;
use crate::object::{Attributes, JsObject, JsObjectRef, ObjectKind, Property};
use crate::value::{JsValue, MAX_SAFE_INT, PropertyKey};

use super::arg;
use super::global::{global_parse_float, global_parse_int};
use crate::interpreter::Interpreter;
use crate::interpreter::realm::Intrinsic;

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::NumberPrototype).is_some() {
        return;
    }
    let object_proto = interp.intrinsic(Intrinsic::ObjectPrototype);
    let proto = interp.alloc(JsObject::new(ObjectKind::Number(0.0), Some(object_proto)));
    interp.register_method(&proto, "toString", number_to_string, 1);
    interp.register_method(&proto, "toLocaleString", number_to_locale_string, 0);
    interp.register_method(&proto, "valueOf", number_value_of, 0);
    interp.register_method(&proto, "toFixed", number_to_fixed, 1);
    interp.register_method(&proto, "toExponential", number_to_exponential, 1);
    interp.register_method(&proto, "toPrecision", number_to_precision, 1);

    let ctor = interp.create_native_constructor("Number", number_constructor, 1, &proto);
    for (name, value) in [
        ("EPSILON", JsValue::Float(f64::EPSILON)),
        ("MAX_SAFE_INTEGER", JsValue::int(MAX_SAFE_INTEGER)),
        ("MIN_SAFE_INTEGER", JsValue::int(-MAX_SAFE_INTEGER)),
        ("MAX_VALUE", JsValue::Float(f64::MAX)),
        ("MIN_VALUE", JsValue::Float(5e-324)),
        ("NaN", JsValue::nan()),
        ("NEGATIVE_INFINITY", JsValue::Float(f64::NEG_INFINITY)),
        ("POSITIVE_INFINITY", JsValue::Float(f64::INFINITY)),
    ] {
        ctor.borrow_mut()
            .define_property(PropertyKey::from(name), Property::data(value, Attributes::NONE));
    }
    interp.register_method(&ctor, "isFinite", number_is_finite, 1);
    interp.register_method(&ctor, "isInteger", number_is_integer, 1);
    interp.register_method(&ctor, "isNaN", number_is_nan, 1);
    interp.register_method(&ctor, "isSafeInteger", number_is_safe_integer, 1);
    share_global_function(interp, &ctor, "parseFloat", global_parse_float, 1);
    share_global_function(interp, &ctor, "parseInt", global_parse_int, 2);

    interp.realm.set(Intrinsic::NumberPrototype, proto);
    interp.realm.set(Intrinsic::Number, ctor);
}

/// `Number.parseInt === parseInt`: reuse the global function object while
/// it is still installed
fn share_global_function(
    interp: &mut Interpreter,
    ctor: &JsObjectRef,
    name: &str,
    func: crate::object::NativeFn,
    arity: u32,
) {
    let existing = interp.global().borrow().get_own_value(&PropertyKey::from(name));
    match existing {
        Some(f @ JsValue::Object(_)) => interp.register_value(ctor, name, f),
        _ => interp.register_method(ctor, name, func, arity),
    }
}

/// 2^53 - 1
const MAX_SAFE_INTEGER: i64 = MAX_SAFE_INT - 1;

/// Number(value)
fn number_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let n = match args.first() {
        Some(v) => interp.to_number(v)?,
        None => 0.0,
    };
    let nt = interp.new_target.clone();
    if nt.is_undefined() {
        return Ok(JsValue::number(n));
    }
    let proto = interp.get_prototype_from_constructor(&nt, Intrinsic::NumberPrototype)?;
    Ok(JsValue::Object(interp.alloc(JsObject::new(ObjectKind::Number(n), Some(proto)))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Statics
// ═══════════════════════════════════════════════════════════════════════════════

fn number_is_finite(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Bool(arg(args, 0).as_number().is_some_and(f64::is_finite)))
}

fn number_is_integer(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Bool(arg(args, 0).as_number().is_some_and(is_integral)))
}

fn number_is_nan(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Bool(arg(args, 0).as_number().is_some_and(f64::is_nan)))
}

fn number_is_safe_integer(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let safe = arg(args, 0)
        .as_number()
        .is_some_and(|n| is_integral(n) && n.abs() <= MAX_SAFE_INTEGER as f64);
    Ok(JsValue::Bool(safe))
}

fn is_integral(n: f64) -> bool {
    n.is_finite() && n.trunc() == n
}

// ═══════════════════════════════════════════════════════════════════════════════
// Number.prototype
// ═══════════════════════════════════════════════════════════════════════════════

/// `thisNumberValue`
fn this_number_value(this: &JsValue, method: &str) -> Result<f64, JsError> {
    if let Some(n) = this.as_number() {
        return Ok(n);
    }
    if let JsValue::Object(o) = this {
        if let ObjectKind::Number(n) = o.borrow().kind {
            return Ok(n);
        }
    }
    Err(JsError::type_error(format!(
        "Number.prototype.{method} requires that 'this' be a Number"
    )))
}

fn number_value_of(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::number(this_number_value(&this, "valueOf")?))
}

/// Number.prototype.toString(radix)
fn number_to_string(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let x = this_number_value(&this, "toString")?;
    let radix = match arg(args, 0) {
        JsValue::Undefined => 10.0,
        v => interp.to_integer_or_infinity(&v)?,
    };
    if !(2.0..=36.0).contains(&radix) {
        return Err(JsError::range_error("toString() radix must be between 2 and 36"));
    }
    if radix == 10.0 {
        return Ok(JsValue::String(num::number_to_js_string(x)));
    }
    Ok(JsValue::from(num::number_to_radix_string(x, radix as u32)))
}

fn number_to_locale_string(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let x = this_number_value(&this, "toLocaleString")?;
    Ok(JsValue::String(num::number_to_js_string(x)))
}

/// Digits argument of `toFixed`/`toExponential`/`toPrecision`, checked
/// against `range`
fn digits_arg(interp: &mut Interpreter, value: &JsValue, range: std::ops::RangeInclusive<f64>, method: &str) -> Result<f64, JsError> {
    let d = interp.to_integer_or_infinity(value)?;
    if !range.contains(&d) {
        return Err(JsError::range_error(format!(
            "{method}() argument must be between {} and 100",
            range.start()
        )));
    }
    Ok(d)
}

/// Number.prototype.toFixed(fractionDigits)
fn number_to_fixed(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let x = this_number_value(&this, "toFixed")?;
    let f = digits_arg(interp, &arg(args, 0), 0.0..=100.0, "toFixed")?;
    if !x.is_finite() {
        return Ok(JsValue::String(num::number_to_js_string(x)));
    }
    Ok(JsValue::from(num::to_fixed(x, f as u32)))
}

/// Number.prototype.toExponential(fractionDigits)
fn number_to_exponential(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let x = this_number_value(&this, "toExponential")?;
    let fraction = arg(args, 0);
    let f = interp.to_integer_or_infinity(&fraction)?;
    if !x.is_finite() {
        return Ok(JsValue::String(num::number_to_js_string(x)));
    }
    if !(0.0..=100.0).contains(&f) {
        return Err(JsError::range_error("toExponential() argument must be between 0 and 100"));
    }
    let digits = if fraction.is_undefined() { None } else { Some(f as u32) };
    Ok(JsValue::from(num::to_exponential(x, digits)))
}

/// Number.prototype.toPrecision(precision)
fn number_to_precision(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let x = this_number_value(&this, "toPrecision")?;
    let precision = arg(args, 0);
    if precision.is_undefined() {
        return Ok(JsValue::String(num::number_to_js_string(x)));
    }
    let p = interp.to_integer_or_infinity(&precision)?;
    if !x.is_finite() {
        return Ok(JsValue::String(num::number_to_js_string(x)));
    }
    if !(1.0..=100.0).contains(&p) {
        return Err(JsError::range_error("toPrecision() argument must be between 1 and 100"));
    }
    Ok(JsValue::from(num::to_precision(x, p as u32)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radix_out_of_range_is_range_error() {
        let mut interp = Interpreter::new(0, false);
        let result = number_to_string(&mut interp, JsValue::from(10), &[JsValue::from(1)]);
        assert!(matches!(result, Err(JsError::RangeError { .. })));
    }

    #[test]
    fn to_string_in_radix() {
        let mut interp = Interpreter::new(0, false);
        let result = number_to_string(&mut interp, JsValue::from(255), &[JsValue::from(16)]);
        assert_eq!(result.ok(), Some(JsValue::from("ff")));
    }

    #[test]
    fn parse_int_is_shared_with_global() {
        let mut interp = Interpreter::new(0, false);
        let ctor = interp.intrinsic(Intrinsic::Number);
        let on_number = ctor.borrow().get_own_value(&PropertyKey::from("parseInt"));
        let on_global = interp.global().borrow().get_own_value(&PropertyKey::from("parseInt"));
        assert!(on_number.is_some());
        assert_eq!(on_number, on_global);
    }

    #[test]
    fn safe_integer_bounds() {
        let mut interp = Interpreter::new(0, false);
        let at_max = number_is_safe_integer(&mut interp, JsValue::Undefined, &[JsValue::Float(9007199254740991.0)]);
        let past_max = number_is_safe_integer(&mut interp, JsValue::Undefined, &[JsValue::Float(9007199254740992.0)]);
        assert_eq!(at_max.ok(), Some(JsValue::Bool(true)));
        assert_eq!(past_max.ok(), Some(JsValue::Bool(false)));
    }
}
