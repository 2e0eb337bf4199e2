//! String built-in methods

use std::cmp::Ordering;

use crate::error::JsError;
use crate::number;
use crate::object::{Attributes, JsObject, ObjectKind, Property};
use crate::string::{JsString, JsStringBuilder};
use crate::value::{JsSymbol, JsValue, PropertyKey};

use super::regexp::{self, get_substitution};
use super::{arg, iterator, this_string};
use crate::interpreter::Interpreter;
use crate::interpreter::realm::Intrinsic;

/// Initialize `String`, `String.prototype` and the string iterator
pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::StringPrototype).is_some() {
        return;
    }
    let object_proto = interp.intrinsic(Intrinsic::ObjectPrototype);
    let mut proto_obj = JsObject::new(ObjectKind::String(JsString::empty()), Some(object_proto));
    proto_obj.define_property(
        PropertyKey::from("length"),
        Property::data(JsValue::from(0), Attributes::NONE),
    );
    let proto = interp.alloc(proto_obj);
    interp.realm.set(Intrinsic::StringPrototype, proto.clone());

    // Character access
    interp.register_method(&proto, "at", string_at, 1);
    interp.register_method(&proto, "charAt", string_char_at, 1);
    interp.register_method(&proto, "charCodeAt", string_char_code_at, 1);
    interp.register_method(&proto, "codePointAt", string_code_point_at, 1);

    // Search methods
    interp.register_method(&proto, "indexOf", string_index_of, 1);
    interp.register_method(&proto, "lastIndexOf", string_last_index_of, 1);
    interp.register_method(&proto, "includes", string_includes, 1);
    interp.register_method(&proto, "startsWith", string_starts_with, 1);
    interp.register_method(&proto, "endsWith", string_ends_with, 1);
    interp.register_method(&proto, "search", string_search, 1);
    interp.register_method(&proto, "match", string_match, 1);
    interp.register_method(&proto, "matchAll", string_match_all, 1);

    // Extraction methods
    interp.register_method(&proto, "slice", string_slice, 2);
    interp.register_method(&proto, "substring", string_substring, 2);
    interp.register_method(&proto, "substr", string_substr, 2);

    // Case conversion
    interp.register_method(&proto, "toLowerCase", string_to_lower_case, 0);
    interp.register_method(&proto, "toUpperCase", string_to_upper_case, 0);
    interp.register_method(&proto, "toLocaleLowerCase", string_to_lower_case, 0);
    interp.register_method(&proto, "toLocaleUpperCase", string_to_upper_case, 0);

    // Whitespace handling
    interp.register_method(&proto, "trim", string_trim, 0);
    interp.register_method(&proto, "trimStart", string_trim_start, 0);
    interp.register_method(&proto, "trimEnd", string_trim_end, 0);

    // Transformation methods
    interp.register_method(&proto, "split", string_split, 2);
    interp.register_method(&proto, "repeat", string_repeat, 1);
    interp.register_method(&proto, "replace", string_replace, 2);
    interp.register_method(&proto, "replaceAll", string_replace_all, 2);
    interp.register_method(&proto, "padStart", string_pad_start, 2);
    interp.register_method(&proto, "padEnd", string_pad_end, 2);
    interp.register_method(&proto, "concat", string_concat, 1);
    interp.register_method(&proto, "normalize", string_normalize, 0);
    interp.register_method(&proto, "isWellFormed", string_is_well_formed, 0);
    interp.register_method(&proto, "toWellFormed", string_to_well_formed, 0);

    // Comparison
    interp.register_method(&proto, "localeCompare", string_locale_compare, 1);

    // Primitive conversion
    interp.register_method(&proto, "valueOf", string_value_of, 0);
    interp.register_method(&proto, "toString", string_value_of, 0);
    interp.register_symbol_method(&proto, JsSymbol::iterator(), string_iterator, 0);

    let ctor = interp.create_native_constructor("String", string_constructor, 1, &proto);
    interp.register_method(&ctor, "fromCharCode", string_from_char_code, 1);
    interp.register_method(&ctor, "fromCodePoint", string_from_code_point, 1);
    interp.register_method(&ctor, "raw", string_raw, 1);
    interp.realm.set(Intrinsic::String, ctor);

    iterator::init_string_iterator(interp);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constructor
// ═══════════════════════════════════════════════════════════════════════════════

/// String(value)
fn string_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let nt = interp.new_target.clone();
    let s = match args.first() {
        None => JsString::empty(),
        Some(JsValue::Symbol(sym)) if nt.is_undefined() => sym.descriptive_string(),
        Some(v) => interp.to_string(v)?,
    };
    if nt.is_undefined() {
        return Ok(JsValue::String(s));
    }
    let proto = interp.get_prototype_from_constructor(&nt, Intrinsic::StringPrototype)?;
    let len = s.len();
    let mut obj = JsObject::new(ObjectKind::String(s), Some(proto));
    obj.define_property(
        PropertyKey::from("length"),
        Property::data(JsValue::from(len), Attributes::NONE),
    );
    Ok(JsValue::Object(interp.alloc(obj)))
}

/// String.fromCharCode(...codeUnits)
fn string_from_char_code(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let mut units = Vec::with_capacity(args.len());
    for a in args {
        let n = interp.to_number(a)?;
        units.push(number::to_uint16(n));
    }
    Ok(JsValue::String(JsString::from_utf16_vec(units)))
}

/// String.fromCodePoint(...codePoints)
fn string_from_code_point(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let mut out = JsStringBuilder::with_capacity(args.len());
    for a in args {
        let n = interp.to_number(a)?;
        if n.fract() != 0.0 || !(0.0..=1_114_111.0).contains(&n) {
            return Err(JsError::range_error(format!(
                "Invalid code point {}",
                number::number_to_string(n)
            )));
        }
        out.push_code_point(n as u32);
    }
    Ok(JsValue::String(out.finish()))
}

/// String.raw(template, ...substitutions)
fn string_raw(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let cooked = interp.to_object(&arg(args, 0))?;
    let raw = interp.get(&cooked, &PropertyKey::from("raw"))?;
    let raw = interp.to_object(&raw)?;
    let len = interp.length_of_array_like(&raw)?;
    let mut out = JsStringBuilder::new();
    for i in 0..len {
        let seg = interp.get(&raw, &PropertyKey::from(i as usize))?;
        let seg = interp.to_string(&seg)?;
        out.push_js(&seg);
        if i + 1 < len {
            if let Some(sub) = args.get(i as usize + 1) {
                let sub = interp.to_string(sub)?;
                out.push_js(&sub);
            }
        }
    }
    Ok(JsValue::String(out.finish()))
}

/// `thisStringValue`
fn this_string_value(this: &JsValue) -> Result<JsString, JsError> {
    match this {
        JsValue::String(s) => Ok(s.clone()),
        JsValue::Object(o) => match &o.borrow().kind {
            ObjectKind::String(s) => Ok(s.clone()),
            _ => Err(JsError::type_error("String.prototype.valueOf requires that 'this' be a String")),
        },
        _ => Err(JsError::type_error("String.prototype.valueOf requires that 'this' be a String")),
    }
}

/// String.prototype.valueOf() / toString()
fn string_value_of(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::String(this_string_value(&this)?))
}

/// String.prototype[Symbol.iterator]()
fn string_iterator(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "[Symbol.iterator]")?;
    Ok(iterator::create_string_iterator(interp, s))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Character access
// ═══════════════════════════════════════════════════════════════════════════════

/// Integer position argument; `None` when it falls outside `0..len`
fn position_arg(interp: &mut Interpreter, value: &JsValue, len: usize) -> Result<Option<usize>, JsError> {
    let pos = interp.to_integer_or_infinity(value)?;
    if pos < 0.0 || pos >= len as f64 {
        Ok(None)
    } else {
        Ok(Some(pos as usize))
    }
}

/// Integer argument clamped to `0..=len`
fn clamped_arg(interp: &mut Interpreter, value: &JsValue, len: usize, default: usize) -> Result<usize, JsError> {
    if value.is_undefined() {
        return Ok(default);
    }
    let n = interp.to_integer_or_infinity(value)?;
    Ok(n.clamp(0.0, len as f64) as usize)
}

/// String.prototype.at(index)
fn string_at(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "at")?;
    let rel = interp.to_integer_or_infinity(&arg(args, 0))?;
    let len = s.len() as f64;
    let k = if rel >= 0.0 { rel } else { len + rel };
    if k < 0.0 || k >= len {
        return Ok(JsValue::Undefined);
    }
    Ok(JsValue::String(s.substring(k as usize, k as usize + 1)))
}

/// String.prototype.charAt(pos)
fn string_char_at(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "charAt")?;
    Ok(JsValue::String(match position_arg(interp, &arg(args, 0), s.len())? {
        Some(i) => s.substring(i, i + 1),
        None => JsString::empty(),
    }))
}

/// String.prototype.charCodeAt(pos)
fn string_char_code_at(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "charCodeAt")?;
    let unit = position_arg(interp, &arg(args, 0), s.len())?.and_then(|i| s.code_unit_at(i));
    Ok(match unit {
        Some(u) => JsValue::from(u32::from(u)),
        None => JsValue::nan(),
    })
}

/// String.prototype.codePointAt(pos)
fn string_code_point_at(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "codePointAt")?;
    let cp = position_arg(interp, &arg(args, 0), s.len())?.and_then(|i| s.code_point_at(i));
    Ok(cp.map(JsValue::from).unwrap_or_default())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Search
// ═══════════════════════════════════════════════════════════════════════════════

/// Search-string argument of `includes`, `startsWith` and `endsWith`;
/// a RegExp is rejected
fn search_string_arg(interp: &mut Interpreter, value: &JsValue, method: &str) -> Result<JsString, JsError> {
    if regexp::is_regexp(interp, value)? {
        return Err(JsError::type_error(format!(
            "First argument to String.prototype.{method} must not be a regular expression"
        )));
    }
    interp.to_string(value)
}

/// String.prototype.indexOf(searchString, position)
fn string_index_of(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "indexOf")?;
    let search = interp.to_string(&arg(args, 0))?;
    let start = clamped_arg(interp, &arg(args, 1), s.len(), 0)?;
    Ok(match s.index_of(&search, start) {
        Some(i) => JsValue::from(i),
        None => JsValue::from(-1),
    })
}

/// String.prototype.lastIndexOf(searchString, position)
fn string_last_index_of(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "lastIndexOf")?;
    let search = interp.to_string(&arg(args, 0))?;
    let num_pos = interp.to_number(&arg(args, 1))?;
    let len = s.len();
    let start = if num_pos.is_nan() {
        len
    } else {
        number::to_integer_or_infinity(num_pos).clamp(0.0, len as f64) as usize
    };
    Ok(match s.last_index_of(&search, start) {
        Some(i) => JsValue::from(i),
        None => JsValue::from(-1),
    })
}

/// String.prototype.includes(searchString, position)
fn string_includes(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "includes")?;
    let search = search_string_arg(interp, &arg(args, 0), "includes")?;
    let start = clamped_arg(interp, &arg(args, 1), s.len(), 0)?;
    Ok(JsValue::Bool(s.index_of(&search, start).is_some()))
}

/// String.prototype.startsWith(searchString, position)
fn string_starts_with(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "startsWith")?;
    let search = search_string_arg(interp, &arg(args, 0), "startsWith")?;
    let start = clamped_arg(interp, &arg(args, 1), s.len(), 0)?;
    Ok(JsValue::Bool(s.matches_at(&search, start)))
}

/// String.prototype.endsWith(searchString, endPosition)
fn string_ends_with(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "endsWith")?;
    let search = search_string_arg(interp, &arg(args, 0), "endsWith")?;
    let end = clamped_arg(interp, &arg(args, 1), s.len(), s.len())?;
    let Some(start) = end.checked_sub(search.len()) else {
        return Ok(JsValue::Bool(false));
    };
    Ok(JsValue::Bool(s.matches_at(&search, start)))
}

/// Dispatch to `regexp[symbol](string, ...rest)` when the argument
/// provides that method
fn delegate_to_symbol(
    interp: &mut Interpreter,
    target: &JsValue,
    symbol: JsSymbol,
    this: &JsValue,
    rest: &[JsValue],
) -> Result<Option<JsValue>, JsError> {
    if target.is_nullish() {
        return Ok(None);
    }
    let Some(method) = interp.get_method(target, &PropertyKey::Symbol(symbol))? else {
        return Ok(None);
    };
    let mut call_args = vec![this.clone()];
    call_args.extend_from_slice(rest);
    interp.call_function(&method, target.clone(), &call_args).map(Some)
}

fn require_coercible(this: &JsValue, method: &str) -> Result<(), JsError> {
    if this.is_nullish() {
        return Err(JsError::type_error(format!(
            "String.prototype.{method} called on null or undefined"
        )));
    }
    Ok(())
}

/// Pattern argument turned into a RegExp for `match`, `matchAll`, `search`
fn regexp_from_arg(interp: &mut Interpreter, pattern: &JsValue, flags: &str) -> Result<JsValue, JsError> {
    let source = if pattern.is_undefined() {
        JsString::empty()
    } else {
        interp.to_string(pattern)?
    };
    Ok(JsValue::Object(regexp::create_regexp(interp, &source, &JsString::from(flags))?))
}

/// String.prototype.match(regexp)
fn string_match(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    require_coercible(&this, "match")?;
    let pattern = arg(args, 0);
    if let Some(result) = delegate_to_symbol(interp, &pattern, JsSymbol::match_(), &this, &[])? {
        return Ok(result);
    }
    let s = interp.to_string(&this)?;
    let rx = regexp_from_arg(interp, &pattern, "")?;
    interp.invoke(&rx, &PropertyKey::Symbol(JsSymbol::match_()), &[JsValue::String(s)])
}

/// String.prototype.matchAll(regexp)
fn string_match_all(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    require_coercible(&this, "matchAll")?;
    let pattern = arg(args, 0);
    if !pattern.is_nullish() {
        if regexp::is_regexp(interp, &pattern)? {
            let flags = interp.get_value(&pattern, &PropertyKey::from("flags"))?;
            if flags.is_nullish() {
                return Err(JsError::type_error("String.prototype.matchAll called with invalid flags"));
            }
            let flags = interp.to_string(&flags)?;
            if !flags.contains_unit(u16::from(b'g')) {
                return Err(JsError::type_error(
                    "String.prototype.matchAll called with a non-global RegExp argument",
                ));
            }
        }
        if let Some(result) = delegate_to_symbol(interp, &pattern, JsSymbol::match_all(), &this, &[])? {
            return Ok(result);
        }
    }
    let s = interp.to_string(&this)?;
    let rx = regexp_from_arg(interp, &pattern, "g")?;
    interp.invoke(&rx, &PropertyKey::Symbol(JsSymbol::match_all()), &[JsValue::String(s)])
}

/// String.prototype.search(regexp)
fn string_search(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    require_coercible(&this, "search")?;
    let pattern = arg(args, 0);
    if let Some(result) = delegate_to_symbol(interp, &pattern, JsSymbol::search(), &this, &[])? {
        return Ok(result);
    }
    let s = interp.to_string(&this)?;
    let rx = regexp_from_arg(interp, &pattern, "")?;
    interp.invoke(&rx, &PropertyKey::Symbol(JsSymbol::search()), &[JsValue::String(s)])
}

// ═══════════════════════════════════════════════════════════════════════════════
// Extraction
// ═══════════════════════════════════════════════════════════════════════════════

/// String.prototype.slice(start, end)
fn string_slice(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "slice")?;
    let len = s.len();
    let from = super::relative_arg(interp, &arg(args, 0), len, 0)?;
    let to = super::relative_arg(interp, &arg(args, 1), len, len)?;
    Ok(JsValue::String(if from < to { s.substring(from, to) } else { JsString::empty() }))
}

/// String.prototype.substring(start, end)
fn string_substring(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "substring")?;
    let len = s.len();
    let a = clamped_arg(interp, &arg(args, 0), len, 0)?;
    let b = clamped_arg(interp, &arg(args, 1), len, len)?;
    Ok(JsValue::String(s.substring(a.min(b), a.max(b))))
}

/// String.prototype.substr(start, length)
fn string_substr(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "substr")?;
    let len = s.len();
    let start = super::relative_arg(interp, &arg(args, 0), len, 0)?;
    let count = match arg(args, 1) {
        JsValue::Undefined => len,
        v => interp.to_integer_or_infinity(&v)?.clamp(0.0, len as f64) as usize,
    };
    let end = (start + count).min(len);
    Ok(JsValue::String(if start < end { s.substring(start, end) } else { JsString::empty() }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Case and whitespace
// ═══════════════════════════════════════════════════════════════════════════════

/// String.prototype.toLowerCase()
fn string_to_lower_case(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "toLowerCase")?;
    Ok(JsValue::String(s.to_lowercase()))
}

/// String.prototype.toUpperCase()
fn string_to_upper_case(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "toUpperCase")?;
    Ok(JsValue::String(s.to_uppercase()))
}

fn string_trim(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "trim")?;
    Ok(JsValue::String(s.trim()))
}

fn string_trim_start(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "trimStart")?;
    Ok(JsValue::String(s.trim_start()))
}

fn string_trim_end(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "trimEnd")?;
    Ok(JsValue::String(s.trim_end()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Transformation
// ═══════════════════════════════════════════════════════════════════════════════

/// String.prototype.split(separator, limit)
fn string_split(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    require_coercible(&this, "split")?;
    let separator = arg(args, 0);
    let limit_arg = arg(args, 1);
    if let Some(result) = delegate_to_symbol(interp, &separator, JsSymbol::split(), &this, &[limit_arg.clone()])? {
        return Ok(result);
    }
    let s = interp.to_string(&this)?;
    let limit = match limit_arg {
        JsValue::Undefined => u32::MAX,
        v => interp.to_uint32(&v)?,
    } as usize;
    let sep = interp.to_string(&separator)?;
    if limit == 0 {
        return Ok(JsValue::Object(interp.create_array(Vec::new())));
    }
    if separator.is_undefined() {
        return Ok(JsValue::Object(interp.create_array(vec![JsValue::String(s)])));
    }
    let mut parts = Vec::new();
    if sep.is_empty() {
        for i in 0..s.len().min(limit) {
            parts.push(JsValue::String(s.substring(i, i + 1)));
        }
        return Ok(JsValue::Object(interp.create_array(parts)));
    }
    let mut start = 0;
    while let Some(found) = s.index_of(&sep, start) {
        parts.push(JsValue::String(s.substring(start, found)));
        if parts.len() >= limit {
            return Ok(JsValue::Object(interp.create_array(parts)));
        }
        start = found + sep.len();
    }
    parts.push(JsValue::String(s.substring(start, s.len())));
    Ok(JsValue::Object(interp.create_array(parts)))
}

/// String.prototype.repeat(count)
fn string_repeat(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "repeat")?;
    let n = interp.to_integer_or_infinity(&arg(args, 0))?;
    if n < 0.0 || n.is_infinite() {
        return Err(JsError::range_error(format!(
            "Invalid count value: {}",
            number::number_to_string(n)
        )));
    }
    if s.is_empty() || n == 0.0 {
        return Ok(JsValue::String(JsString::empty()));
    }
    if (s.len() as f64) * n > MAX_STRING_LENGTH as f64 {
        return Err(JsError::range_error("Invalid string length"));
    }
    Ok(JsValue::String(s.repeat(n as usize)))
}

/// Longest string `repeat` and `padStart` will build
const MAX_STRING_LENGTH: usize = (1 << 30) - 25;

/// Replacement for one match: a callback result or an expanded template
fn replacement_for(
    interp: &mut Interpreter,
    replace_value: &JsValue,
    template: &JsString,
    matched: &JsString,
    s: &JsString,
    position: usize,
) -> Result<JsString, JsError> {
    if replace_value.is_callable() {
        let r = interp.call_function(
            replace_value,
            JsValue::Undefined,
            &[JsValue::String(matched.clone()), JsValue::from(position), JsValue::String(s.clone())],
        )?;
        interp.to_string(&r)
    } else {
        get_substitution(interp, matched, s, position, &[], &JsValue::Undefined, template)
    }
}

/// String.prototype.replace(searchValue, replaceValue)
fn string_replace(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    require_coercible(&this, "replace")?;
    let search_value = arg(args, 0);
    let replace_value = arg(args, 1);
    if let Some(result) =
        delegate_to_symbol(interp, &search_value, JsSymbol::replace(), &this, &[replace_value.clone()])?
    {
        return Ok(result);
    }
    let s = interp.to_string(&this)?;
    let search = interp.to_string(&search_value)?;
    let template = if replace_value.is_callable() {
        JsString::empty()
    } else {
        interp.to_string(&replace_value)?
    };
    let Some(position) = s.index_of(&search, 0) else {
        return Ok(JsValue::String(s));
    };
    let replacement = replacement_for(interp, &replace_value, &template, &search, &s, position)?;
    let mut out = JsStringBuilder::with_capacity(s.len() + replacement.len());
    out.push_js(&s.substring(0, position));
    out.push_js(&replacement);
    out.push_js(&s.substring(position + search.len(), s.len()));
    Ok(JsValue::String(out.finish()))
}

/// String.prototype.replaceAll(searchValue, replaceValue)
fn string_replace_all(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    require_coercible(&this, "replaceAll")?;
    let search_value = arg(args, 0);
    let replace_value = arg(args, 1);
    if !search_value.is_nullish() {
        if regexp::is_regexp(interp, &search_value)? {
            let flags = interp.get_value(&search_value, &PropertyKey::from("flags"))?;
            if flags.is_nullish() {
                return Err(JsError::type_error("String.prototype.replaceAll called with invalid flags"));
            }
            let flags = interp.to_string(&flags)?;
            if !flags.contains_unit(u16::from(b'g')) {
                return Err(JsError::type_error(
                    "replaceAll must be called with a global RegExp",
                ));
            }
        }
        if let Some(result) =
            delegate_to_symbol(interp, &search_value, JsSymbol::replace(), &this, &[replace_value.clone()])?
        {
            return Ok(result);
        }
    }
    let s = interp.to_string(&this)?;
    let search = interp.to_string(&search_value)?;
    let template = if replace_value.is_callable() {
        JsString::empty()
    } else {
        interp.to_string(&replace_value)?
    };
    let advance = search.len().max(1);
    let mut positions = Vec::new();
    let mut from = s.index_of(&search, 0);
    while let Some(p) = from {
        positions.push(p);
        from = if p + advance > s.len() { None } else { s.index_of(&search, p + advance) };
    }
    let mut end_of_last = 0;
    let mut out = JsStringBuilder::with_capacity(s.len());
    for p in positions {
        out.push_js(&s.substring(end_of_last, p));
        let replacement = replacement_for(interp, &replace_value, &template, &search, &s, p)?;
        out.push_js(&replacement);
        end_of_last = p + search.len();
    }
    if end_of_last < s.len() {
        out.push_js(&s.substring(end_of_last, s.len()));
    }
    Ok(JsValue::String(out.finish()))
}

/// Shared body of `padStart` and `padEnd`
fn pad(interp: &mut Interpreter, this: &JsValue, args: &[JsValue], at_start: bool) -> Result<JsValue, JsError> {
    let s = this_string(interp, this, if at_start { "padStart" } else { "padEnd" })?;
    let max_length = interp.to_length(&arg(args, 0))? as usize;
    if max_length <= s.len() {
        return Ok(JsValue::String(s));
    }
    let filler = match arg(args, 1) {
        JsValue::Undefined => JsString::from(" "),
        v => interp.to_string(&v)?,
    };
    if filler.is_empty() {
        return Ok(JsValue::String(s));
    }
    if max_length > MAX_STRING_LENGTH {
        return Err(JsError::range_error("Invalid string length"));
    }
    let fill_len = max_length - s.len();
    let reps = fill_len.div_ceil(filler.len());
    let fill = filler.repeat(reps).substring(0, fill_len);
    Ok(JsValue::String(if at_start { fill.concat(&s) } else { s.concat(&fill) }))
}

/// String.prototype.padStart(maxLength, fillString)
fn string_pad_start(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    pad(interp, &this, args, true)
}

/// String.prototype.padEnd(maxLength, fillString)
fn string_pad_end(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    pad(interp, &this, args, false)
}

/// String.prototype.concat(...strings)
fn string_concat(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "concat")?;
    let mut out = JsStringBuilder::with_capacity(s.len());
    out.push_js(&s);
    for a in args {
        let part = interp.to_string(a)?;
        out.push_js(&part);
    }
    Ok(JsValue::String(out.finish()))
}

/// String.prototype.normalize(form)
///
/// Validates the form and returns the string as is; no Unicode
/// normalization tables are bundled.
fn string_normalize(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "normalize")?;
    let form = match arg(args, 0) {
        JsValue::Undefined => JsString::from("NFC"),
        v => interp.to_string(&v)?,
    };
    if !["NFC", "NFD", "NFKC", "NFKD"].iter().any(|f| form.as_ascii_str() == Some(*f)) {
        return Err(JsError::range_error(format!(
            "The normalization form should be one of NFC, NFD, NFKC, NFKD, got {form}"
        )));
    }
    Ok(JsValue::String(s))
}

fn string_is_well_formed(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "isWellFormed")?;
    Ok(JsValue::Bool(s.is_well_formed()))
}

fn string_to_well_formed(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "toWellFormed")?;
    Ok(JsValue::String(s.to_well_formed()))
}

/// String.prototype.localeCompare(that)
///
/// Compares code units; there is no locale data.
fn string_locale_compare(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "localeCompare")?;
    let that = interp.to_string(&arg(args, 0))?;
    Ok(JsValue::from(match s.cmp_units(&that) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(method: crate::object::NativeFn, this: &str, args: &[JsValue]) -> Option<JsValue> {
        let mut interp = Interpreter::new(0, false);
        method(&mut interp, JsValue::from(this), args).ok()
    }

    #[test]
    fn split_by_string_respects_limit() {
        let mut interp = Interpreter::new(0, false);
        let result = string_split(&mut interp, JsValue::from("a,b,c"), &[JsValue::from(","), JsValue::from(2)]);
        let Ok(JsValue::Object(arr)) = result else {
            panic!("split did not return an array");
        };
        assert_eq!(arr.borrow().array_length(), Some(2));
    }

    #[test]
    fn pad_start_truncates_filler() {
        assert_eq!(
            call(string_pad_start, "5", &[JsValue::from(4), JsValue::from("ab")]),
            Some(JsValue::from("aba5"))
        );
    }

    #[test]
    fn replace_expands_dollar_patterns() {
        assert_eq!(
            call(string_replace, "abc", &[JsValue::from("b"), JsValue::from("[$&$`$']")]),
            Some(JsValue::from("a[bac]c"))
        );
    }

    #[test]
    fn replace_all_with_empty_search_interleaves() {
        assert_eq!(
            call(string_replace_all, "ab", &[JsValue::from(""), JsValue::from("-")]),
            Some(JsValue::from("-a-b-"))
        );
    }

    #[test]
    fn at_counts_from_the_end() {
        assert_eq!(call(string_at, "abc", &[JsValue::from(-1)]), Some(JsValue::from("c")));
        assert_eq!(call(string_at, "abc", &[JsValue::from(3)]), Some(JsValue::Undefined));
    }

    #[test]
    fn from_code_point_rejects_out_of_range() {
        let mut interp = Interpreter::new(0, false);
        let result = string_from_code_point(&mut interp, JsValue::Undefined, &[JsValue::from(0x110000)]);
        assert!(matches!(result, Err(JsError::RangeError { .. })));
    }

    #[test]
    fn normalize_rejects_unknown_form() {
        let mut interp = Interpreter::new(0, false);
        let result = string_normalize(&mut interp, JsValue::from("x"), &[JsValue::from("NFX")]);
        assert!(matches!(result, Err(JsError::RangeError { .. })));
    }
}
