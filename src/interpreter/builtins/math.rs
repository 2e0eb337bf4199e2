//! Math built-in methods
//!
//! Transcendental functions go through `libm` so results do not depend on
//! the host's C library.

use crate::error::JsError;
use crate::object::{Attributes, JsObjectRef, Property};
use crate::value::{JsValue, PropertyKey};

use super::arg;
use crate::interpreter::Interpreter;
use crate::interpreter::realm::Intrinsic;

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::Math).is_some() {
        return;
    }
    let math = interp.create_object();

    for (name, value) in [
        ("E", std::f64::consts::E),
        ("LN10", std::f64::consts::LN_10),
        ("LN2", std::f64::consts::LN_2),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("PI", std::f64::consts::PI),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
        ("SQRT2", std::f64::consts::SQRT_2),
    ] {
        define_constant(&math, name, value);
    }
    super::set_to_string_tag(&math, "Math");

    // Rounding
    interp.register_method(&math, "abs", math_abs, 1);
    interp.register_method(&math, "ceil", math_ceil, 1);
    interp.register_method(&math, "floor", math_floor, 1);
    interp.register_method(&math, "round", math_round, 1);
    interp.register_method(&math, "trunc", math_trunc, 1);
    interp.register_method(&math, "sign", math_sign, 1);
    interp.register_method(&math, "fround", math_fround, 1);

    // Min/max
    interp.register_method(&math, "max", math_max, 2);
    interp.register_method(&math, "min", math_min, 2);

    // Powers and roots
    interp.register_method(&math, "pow", math_pow, 2);
    interp.register_method(&math, "sqrt", math_sqrt, 1);
    interp.register_method(&math, "cbrt", math_cbrt, 1);
    interp.register_method(&math, "hypot", math_hypot, 2);
    interp.register_method(&math, "exp", math_exp, 1);
    interp.register_method(&math, "expm1", math_expm1, 1);

    // Logarithms
    interp.register_method(&math, "log", math_log, 1);
    interp.register_method(&math, "log1p", math_log1p, 1);
    interp.register_method(&math, "log10", math_log10, 1);
    interp.register_method(&math, "log2", math_log2, 1);

    // Trigonometry
    interp.register_method(&math, "sin", math_sin, 1);
    interp.register_method(&math, "cos", math_cos, 1);
    interp.register_method(&math, "tan", math_tan, 1);
    interp.register_method(&math, "asin", math_asin, 1);
    interp.register_method(&math, "acos", math_acos, 1);
    interp.register_method(&math, "atan", math_atan, 1);
    interp.register_method(&math, "atan2", math_atan2, 2);
    interp.register_method(&math, "sinh", math_sinh, 1);
    interp.register_method(&math, "cosh", math_cosh, 1);
    interp.register_method(&math, "tanh", math_tanh, 1);
    interp.register_method(&math, "asinh", math_asinh, 1);
    interp.register_method(&math, "acosh", math_acosh, 1);
    interp.register_method(&math, "atanh", math_atanh, 1);

    // Integer helpers
    interp.register_method(&math, "clz32", math_clz32, 1);
    interp.register_method(&math, "imul", math_imul, 2);

    interp.register_method(&math, "random", math_random, 0);

    interp.realm.set(Intrinsic::Math, math);
}

fn define_constant(obj: &JsObjectRef, name: &str, value: f64) {
    obj.borrow_mut().define_property(
        PropertyKey::from(name),
        Property::data(JsValue::Float(value), Attributes::NONE),
    );
}

/// `ToNumber` of argument `index`
fn num(interp: &mut Interpreter, args: &[JsValue], index: usize) -> Result<f64, JsError> {
    interp.to_number(&arg(args, index))
}

/// Apply `f` to the first argument
fn unary(interp: &mut Interpreter, args: &[JsValue], f: fn(f64) -> f64) -> Result<JsValue, JsError> {
    let x = num(interp, args, 0)?;
    Ok(JsValue::number(f(x)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Rounding
// ═══════════════════════════════════════════════════════════════════════════════

fn math_abs(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, f64::abs)
}

fn math_ceil(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::ceil)
}

fn math_floor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::floor)
}

fn math_trunc(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::trunc)
}

/// Math.round(x): halves round towards +Infinity
fn math_round(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, js_round)
}

fn js_round(x: f64) -> f64 {
    if !x.is_finite() || x == 0.0 {
        return x;
    }
    if x > 0.0 && x < 0.5 {
        return 0.0;
    }
    if x < 0.0 && x >= -0.5 {
        return -0.0;
    }
    let floor = libm::floor(x);
    if x - floor >= 0.5 { floor + 1.0 } else { floor }
}

fn math_sign(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, |x| {
        if x.is_nan() || x == 0.0 {
            x
        } else if x > 0.0 {
            1.0
        } else {
            -1.0
        }
    })
}

fn math_fround(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, |x| f64::from(x as f32))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Min / max
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared body of `max` and `min`. Every argument is coerced before NaN
/// short-circuits the result; `+0` beats `-0` for max and loses for min.
fn extremum(interp: &mut Interpreter, args: &[JsValue], want_max: bool) -> Result<JsValue, JsError> {
    let mut values = Vec::with_capacity(args.len());
    for a in args {
        values.push(interp.to_number(a)?);
    }
    let mut result = if want_max { f64::NEG_INFINITY } else { f64::INFINITY };
    for x in values {
        if x.is_nan() {
            return Ok(JsValue::nan());
        }
        let better = if want_max {
            x > result || (x == 0.0 && result == 0.0 && !x.is_sign_negative())
        } else {
            x < result || (x == 0.0 && result == 0.0 && x.is_sign_negative())
        };
        if better {
            result = x;
        }
    }
    Ok(JsValue::number(result))
}

fn math_max(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    extremum(interp, args, true)
}

fn math_min(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    extremum(interp, args, false)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Powers, roots and logarithms
// ═══════════════════════════════════════════════════════════════════════════════

/// `Number::exponentiate`; shared with the `**` operator
pub(crate) fn exponentiate(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() {
        return f64::NAN;
    }
    if exponent == 0.0 {
        return 1.0;
    }
    if (base == 1.0 || base == -1.0) && exponent.is_infinite() {
        return f64::NAN;
    }
    libm::pow(base, exponent)
}

fn math_pow(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let base = num(interp, args, 0)?;
    let exponent = num(interp, args, 1)?;
    Ok(JsValue::number(exponentiate(base, exponent)))
}

fn math_sqrt(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::sqrt)
}

fn math_cbrt(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::cbrt)
}

/// Math.hypot(...values)
fn math_hypot(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let mut values = Vec::with_capacity(args.len());
    for a in args {
        values.push(interp.to_number(a)?);
    }
    if values.iter().any(|x| x.is_infinite()) {
        return Ok(JsValue::Float(f64::INFINITY));
    }
    if values.iter().any(|x| x.is_nan()) {
        return Ok(JsValue::nan());
    }
    let scale = values.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    if scale == 0.0 {
        return Ok(JsValue::from(0));
    }
    let sum: f64 = values.iter().map(|x| (x / scale) * (x / scale)).sum();
    Ok(JsValue::number(libm::sqrt(sum) * scale))
}

fn math_exp(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::exp)
}

fn math_expm1(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::expm1)
}

fn math_log(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::log)
}

fn math_log1p(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::log1p)
}

fn math_log10(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::log10)
}

fn math_log2(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::log2)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Trigonometry
// ═══════════════════════════════════════════════════════════════════════════════

fn math_sin(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::sin)
}

fn math_cos(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::cos)
}

fn math_tan(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::tan)
}

fn math_asin(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::asin)
}

fn math_acos(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::acos)
}

fn math_atan(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::atan)
}

fn math_atan2(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let y = num(interp, args, 0)?;
    let x = num(interp, args, 1)?;
    Ok(JsValue::number(libm::atan2(y, x)))
}

fn math_sinh(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::sinh)
}

fn math_cosh(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::cosh)
}

fn math_tanh(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::tanh)
}

fn math_asinh(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::asinh)
}

fn math_acosh(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::acosh)
}

fn math_atanh(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    unary(interp, args, libm::atanh)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Integer helpers and random
// ═══════════════════════════════════════════════════════════════════════════════

/// Math.clz32(x)
fn math_clz32(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let n = interp.to_uint32(&arg(args, 0))?;
    Ok(JsValue::from(n.leading_zeros()))
}

/// Math.imul(a, b)
fn math_imul(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let a = interp.to_int32(&arg(args, 0))?;
    let b = interp.to_int32(&arg(args, 1))?;
    Ok(JsValue::from(a.wrapping_mul(b)))
}

/// Math.random()
fn math_random(interp: &mut Interpreter, _this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Float(interp.random.random()))
}
