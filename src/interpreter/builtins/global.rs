//! Global built-in functions (parseInt, parseFloat, URI functions, etc.)

use crate::compiler::compile;
use crate::error::JsError;
use crate::number;
use crate::object::{Attributes, Property};
use crate::string::{JsString, JsStringBuilder, combine_surrogates, is_high_surrogate, is_low_surrogate};
use crate::value::{JsValue, PropertyKey};

use super::arg;
use super::promise::Job;
use crate::interpreter::Interpreter;

/// Register the global value properties and functions
pub fn init(interp: &mut Interpreter) {
    let global = interp.global();
    {
        let mut g = global.borrow_mut();
        g.define_property(
            PropertyKey::from("undefined"),
            Property::data(JsValue::Undefined, Attributes::NONE),
        );
        g.define_property(
            PropertyKey::from("NaN"),
            Property::data(JsValue::nan(), Attributes::NONE),
        );
        g.define_property(
            PropertyKey::from("Infinity"),
            Property::data(JsValue::number(f64::INFINITY), Attributes::NONE),
        );
        g.define_property(
            PropertyKey::from("globalThis"),
            Property::data(JsValue::Object(global.clone()), Attributes::HIDDEN),
        );
    }

    interp.register_method(&global, "parseInt", global_parse_int, 2);
    interp.register_method(&global, "parseFloat", global_parse_float, 1);
    interp.register_method(&global, "isNaN", global_is_nan, 1);
    interp.register_method(&global, "isFinite", global_is_finite, 1);
    interp.register_method(&global, "encodeURI", global_encode_uri, 1);
    interp.register_method(&global, "encodeURIComponent", global_encode_uri_component, 1);
    interp.register_method(&global, "decodeURI", global_decode_uri, 1);
    interp.register_method(&global, "decodeURIComponent", global_decode_uri_component, 1);
    interp.register_method(&global, "queueMicrotask", global_queue_microtask, 1);
    interp.register_method(&global, "eval", global_eval, 1);
}

pub fn global_parse_int(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = interp.to_string(&arg(args, 0))?;
    let radix = interp.to_int32(&arg(args, 1))?;
    Ok(JsValue::number(number::parse_int(&s, radix)))
}

pub fn global_parse_float(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = interp.to_string(&arg(args, 0))?;
    Ok(JsValue::number(number::parse_float(&s)))
}

pub fn global_is_nan(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let n = interp.to_number(&arg(args, 0))?;
    Ok(JsValue::Bool(n.is_nan()))
}

pub fn global_is_finite(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let n = interp.to_number(&arg(args, 0))?;
    Ok(JsValue::Bool(n.is_finite()))
}

/// queueMicrotask(callback)
fn global_queue_microtask(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let callback = super::callback(&arg(args, 0), "queueMicrotask")?;
    interp.enqueue_job(Job::Callback(callback));
    Ok(JsValue::Undefined)
}

/// eval(source): always evaluated in the global scope
fn global_eval(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let JsValue::String(source) = arg(args, 0) else {
        return Ok(arg(args, 0));
    };
    let program = compile(&source.to_string(), "eval", false, &interp.parser_options).map_err(|err| match err {
        JsError::Parse(errors) => {
            JsError::syntax_error(errors.first().map(|e| e.message.clone()).unwrap_or_default())
        }
        other => other,
    })?;
    interp.run_program(program.code)
}

// ═══════════════════════════════════════════════════════════════════════════════
// URI encoding
// ═══════════════════════════════════════════════════════════════════════════════

const URI_UNESCAPED: &str = "-_.!~*'()";
const URI_RESERVED: &str = ";/?:@&=+$,";

fn is_unreserved(unit: u16) -> bool {
    char::from_u32(u32::from(unit)).is_some_and(|c| c.is_ascii_alphanumeric() || URI_UNESCAPED.contains(c))
}

fn is_reserved(unit: u16) -> bool {
    char::from_u32(u32::from(unit)).is_some_and(|c| URI_RESERVED.contains(c) || c == '#')
}

/// `Encode`: percent-encode every unit not in the keep set as UTF-8
fn encode(s: &JsString, keep_reserved: bool) -> Result<JsString, JsError> {
    let units = s.to_utf16();
    let mut out = JsStringBuilder::with_capacity(units.len());
    let mut i = 0;
    while let Some(&unit) = units.get(i) {
        if is_unreserved(unit) || (keep_reserved && is_reserved(unit)) {
            out.push_unit(unit);
            i += 1;
            continue;
        }
        let code_point = if is_low_surrogate(unit) {
            return Err(JsError::uri_error("URI malformed"));
        } else if is_high_surrogate(unit) {
            match units.get(i + 1) {
                Some(&low) if is_low_surrogate(low) => {
                    i += 1;
                    combine_surrogates(unit, low)
                }
                _ => return Err(JsError::uri_error("URI malformed")),
            }
        } else {
            u32::from(unit)
        };
        let Some(c) = char::from_u32(code_point) else {
            return Err(JsError::uri_error("URI malformed"));
        };
        let mut buf = [0u8; 4];
        for byte in c.encode_utf8(&mut buf).bytes() {
            out.push_str(&format!("%{byte:02X}"));
        }
        i += 1;
    }
    Ok(out.finish())
}

fn hex_byte(units: &[u16], at: usize) -> Option<u8> {
    let hi = char::from_u32(u32::from(*units.get(at + 1)?))?.to_digit(16)?;
    let lo = char::from_u32(u32::from(*units.get(at + 2)?))?.to_digit(16)?;
    u8::try_from(hi * 16 + lo).ok()
}

/// `Decode`: percent sequences are UTF-8; escapes of reserved characters
/// survive when `preserve_reserved` is set
fn decode(s: &JsString, preserve_reserved: bool) -> Result<JsString, JsError> {
    let units = s.to_utf16();
    let mut out = JsStringBuilder::with_capacity(units.len());
    let mut i = 0;
    while let Some(&unit) = units.get(i) {
        if unit != u16::from(b'%') {
            out.push_unit(unit);
            i += 1;
            continue;
        }
        let start = i;
        let lead = hex_byte(&units, i).ok_or_else(|| JsError::uri_error("URI malformed"))?;
        i += 3;
        if lead < 0x80 {
            if preserve_reserved && is_reserved(u16::from(lead)) {
                for &u in units.get(start..i).unwrap_or_default() {
                    out.push_unit(u);
                }
            } else {
                out.push_unit(u16::from(lead));
            }
            continue;
        }
        let extra = match lead {
            0xC0..=0xDF => 1,
            0xE0..=0xEF => 2,
            0xF0..=0xF7 => 3,
            _ => return Err(JsError::uri_error("URI malformed")),
        };
        let mut bytes = vec![lead];
        for _ in 0..extra {
            if units.get(i) != Some(&u16::from(b'%')) {
                return Err(JsError::uri_error("URI malformed"));
            }
            let b = hex_byte(&units, i).ok_or_else(|| JsError::uri_error("URI malformed"))?;
            if b & 0xC0 != 0x80 {
                return Err(JsError::uri_error("URI malformed"));
            }
            bytes.push(b);
            i += 3;
        }
        let decoded = std::str::from_utf8(&bytes).map_err(|_| JsError::uri_error("URI malformed"))?;
        for c in decoded.chars() {
            out.push_char(c);
        }
    }
    Ok(out.finish())
}

pub fn global_encode_uri(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = interp.to_string(&arg(args, 0))?;
    Ok(JsValue::String(encode(&s, true)?))
}

pub fn global_encode_uri_component(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = interp.to_string(&arg(args, 0))?;
    Ok(JsValue::String(encode(&s, false)?))
}

pub fn global_decode_uri(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = interp.to_string(&arg(args, 0))?;
    Ok(JsValue::String(decode(&s, true)?))
}

pub fn global_decode_uri_component(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = interp.to_string(&arg(args, 0))?;
    Ok(JsValue::String(decode(&s, false)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_component_escapes_reserved() {
        let s = JsString::from("a b/c?d=é");
        assert_eq!(encode(&s, false).ok().map(|s| s.to_string()), Some("a%20b%2Fc%3Fd%3D%C3%A9".to_string()));
        assert_eq!(encode(&s, true).ok().map(|s| s.to_string()), Some("a%20b/c?d=%C3%A9".to_string()));
    }

    #[test]
    fn decode_uri_keeps_reserved_escapes() {
        let s = JsString::from("%2F%20%C3%A9");
        assert_eq!(decode(&s, true).ok().map(|s| s.to_string()), Some("%2F é".to_string()));
        assert_eq!(decode(&s, false).ok().map(|s| s.to_string()), Some("/ é".to_string()));
    }

    #[test]
    fn malformed_sequences_are_uri_errors() {
        assert!(matches!(decode(&JsString::from("%E0%A4%A"), false), Err(JsError::UriError { .. })));
        assert!(matches!(decode(&JsString::from("%ZZ"), false), Err(JsError::UriError { .. })));
        let lone = JsString::from_utf16(&[0xD800]);
        assert!(matches!(encode(&lone, false), Err(JsError::UriError { .. })));
    }
}
