//! JSON built-in methods
//!
//! `JSON.parse` scans the text as UTF-16 code units and builds script
//! values directly. `JSON.stringify` walks script values directly so that
//! `toJSON`, replacers, wrapper objects, proxies and property order follow
//! the language rules.

use rustc_hash::FxHashSet;

use crate::error::JsError;
use crate::number;
use crate::object::{JsObjectRef, ObjectKind};
use crate::string::{JsString, JsStringBuilder};
use crate::value::{JsValue, PropertyKey};

use super::arg;
use crate::interpreter::Interpreter;
use crate::interpreter::ops::EnumKind;
use crate::interpreter::realm::Intrinsic;

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::Json).is_some() {
        return;
    }
    let json = interp.create_object();
    interp.register_method(&json, "parse", json_parse, 2);
    interp.register_method(&json, "stringify", json_stringify, 3);
    super::set_to_string_tag(&json, "JSON");
    interp.realm.set(Intrinsic::Json, json);
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSON.parse
// ═══════════════════════════════════════════════════════════════════════════════

/// JSON.parse(text, reviver)
fn json_parse(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let text = interp.to_string(&arg(args, 0))?;
    let value = parse(interp, &text)?;
    let reviver = arg(args, 1);
    if !reviver.is_callable() {
        return Ok(value);
    }
    let root = interp.create_object();
    root.borrow_mut().set_property(PropertyKey::from(""), value);
    internalize(interp, &root, PropertyKey::from(""), &reviver)
}

/// Parse JSON text into script values
pub fn parse(interp: &mut Interpreter, text: &JsString) -> Result<JsValue, JsError> {
    let units = text.to_utf16();
    let mut scanner = Scanner { units: &units, pos: 0 };
    scanner.skip_whitespace();
    let value = scanner.value(interp)?;
    scanner.skip_whitespace();
    if scanner.pos < units.len() {
        return Err(scanner.unexpected());
    }
    Ok(value)
}

// ───────────────────────────────────────────────────────────────────────────────
// Scanner
// ───────────────────────────────────────────────────────────────────────────────

/// Reads JSON over UTF-16 code units, so lone surrogates in escapes survive
/// and numbers keep full `double` range
struct Scanner<'a> {
    units: &'a [u16],
    pos: usize,
}

impl Scanner<'_> {
    fn peek(&self) -> Option<u16> {
        self.units.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(0x20 | 0x09 | 0x0A | 0x0D)) {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> JsError {
        match self.peek() {
            None => JsError::syntax_error("Unexpected end of JSON input"),
            Some(unit) => {
                let token = char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER);
                JsError::syntax_error(format!("Unexpected token '{token}' in JSON at position {}", self.pos))
            }
        }
    }

    fn expect(&mut self, unit: u8) -> Result<(), JsError> {
        if self.peek() == Some(u16::from(unit)) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn keyword(&mut self, word: &str, value: JsValue) -> Result<JsValue, JsError> {
        for b in word.bytes() {
            self.expect(b)?;
        }
        Ok(value)
    }

    fn value(&mut self, interp: &mut Interpreter) -> Result<JsValue, JsError> {
        match self.peek() {
            Some(0x7B) => interp.nested(|interp| self.object(interp)),
            Some(0x5B) => interp.nested(|interp| self.array(interp)),
            Some(0x22) => Ok(JsValue::String(self.string()?)),
            Some(0x74) => self.keyword("true", JsValue::Bool(true)),
            Some(0x66) => self.keyword("false", JsValue::Bool(false)),
            Some(0x6E) => self.keyword("null", JsValue::Null),
            Some(0x2D | 0x30..=0x39) => self.number(),
            _ => Err(self.unexpected()),
        }
    }

    fn object(&mut self, interp: &mut Interpreter) -> Result<JsValue, JsError> {
        self.expect(b'{')?;
        let obj = interp.create_object();
        self.skip_whitespace();
        if self.peek() == Some(u16::from(b'}')) {
            self.pos += 1;
            return Ok(JsValue::Object(obj));
        }
        loop {
            self.skip_whitespace();
            if self.peek() != Some(u16::from(b'"')) {
                return Err(self.unexpected());
            }
            let key = self.string()?;
            self.skip_whitespace();
            self.expect(b':')?;
            self.skip_whitespace();
            let value = self.value(interp)?;
            // a repeated key keeps its first position and takes the last value
            obj.borrow_mut().set_property(PropertyKey::from(key), value);
            self.skip_whitespace();
            match self.peek() {
                Some(0x2C) => self.pos += 1,
                Some(0x7D) => {
                    self.pos += 1;
                    return Ok(JsValue::Object(obj));
                }
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn array(&mut self, interp: &mut Interpreter) -> Result<JsValue, JsError> {
        self.expect(b'[')?;
        let mut elements = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(u16::from(b']')) {
            self.pos += 1;
            return Ok(JsValue::Object(interp.create_array(elements)));
        }
        loop {
            self.skip_whitespace();
            elements.push(self.value(interp)?);
            self.skip_whitespace();
            match self.peek() {
                Some(0x2C) => self.pos += 1,
                Some(0x5D) => {
                    self.pos += 1;
                    return Ok(JsValue::Object(interp.create_array(elements)));
                }
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn string(&mut self) -> Result<JsString, JsError> {
        self.expect(b'"')?;
        let mut out = JsStringBuilder::new();
        loop {
            let Some(unit) = self.peek() else {
                return Err(JsError::syntax_error("Unterminated string in JSON"));
            };
            self.pos += 1;
            match unit {
                0x22 => return Ok(out.finish()),
                0x5C => {
                    let Some(escape) = self.peek() else {
                        return Err(self.unexpected());
                    };
                    self.pos += 1;
                    let decoded = match escape {
                        0x22 | 0x5C | 0x2F => escape,
                        0x62 => 0x08,
                        0x66 => 0x0C,
                        0x6E => 0x0A,
                        0x72 => 0x0D,
                        0x74 => 0x09,
                        0x75 => self.hex4()?,
                        _ => {
                            self.pos -= 1;
                            return Err(JsError::syntax_error(format!(
                                "Bad escaped character in JSON at position {}",
                                self.pos
                            )));
                        }
                    };
                    out.push_unit(decoded);
                }
                0x00..=0x1F => {
                    self.pos -= 1;
                    return Err(JsError::syntax_error(format!(
                        "Bad control character in string literal in JSON at position {}",
                        self.pos
                    )));
                }
                _ => out.push_unit(unit),
            }
        }
    }

    fn hex4(&mut self) -> Result<u16, JsError> {
        let mut code = 0u16;
        for _ in 0..4 {
            let digit = self
                .peek()
                .and_then(|u| char::from_u32(u32::from(u)))
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| JsError::syntax_error(format!("Bad Unicode escape in JSON at position {}", self.pos)))?;
            code = (code << 4) | digit as u16;
            self.pos += 1;
        }
        Ok(code)
    }

    fn digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(0x30..=0x39)) {
            self.pos += 1;
        }
        self.pos - start
    }

    /// `-? (0 | [1-9][0-9]*) (. [0-9]+)? ([eE] [+-]? [0-9]+)?`
    fn number(&mut self) -> Result<JsValue, JsError> {
        let start = self.pos;
        if self.peek() == Some(u16::from(b'-')) {
            self.pos += 1;
        }
        match self.peek() {
            Some(0x30) => self.pos += 1,
            Some(0x31..=0x39) => {
                self.digits();
            }
            _ => return Err(self.unexpected()),
        }
        if self.peek() == Some(u16::from(b'.')) {
            self.pos += 1;
            if self.digits() == 0 {
                return Err(self.unexpected());
            }
        }
        if matches!(self.peek(), Some(0x65 | 0x45)) {
            self.pos += 1;
            if matches!(self.peek(), Some(0x2B | 0x2D)) {
                self.pos += 1;
            }
            if self.digits() == 0 {
                return Err(self.unexpected());
            }
        }
        let text = String::from_utf16_lossy(self.units.get(start..self.pos).unwrap_or_default());
        Ok(JsValue::number(number::str_to_number(&text)))
    }
}

/// `InternalizeJSONProperty`: apply the reviver bottom-up
fn internalize(
    interp: &mut Interpreter,
    holder: &JsObjectRef,
    name: PropertyKey,
    reviver: &JsValue,
) -> Result<JsValue, JsError> {
    let value = interp.get(holder, &name)?;
    if let JsValue::Object(obj) = &value {
        let keys: Vec<PropertyKey> = if interp.is_array(&value)? {
            let len = interp.length_of_array_like(obj)?;
            (0..len).map(|i| PropertyKey::from(i as usize)).collect()
        } else {
            let mut keys = Vec::new();
            for k in interp.enumerable_own_properties(obj, EnumKind::Keys)? {
                keys.push(interp.to_property_key(&k)?);
            }
            keys
        };
        for key in keys {
            let revived = interp.nested(|interp| internalize(interp, obj, key.clone(), reviver))?;
            if revived.is_undefined() {
                interp.delete_property(obj, &key)?;
            } else {
                interp.create_data_property(obj, key, revived)?;
            }
        }
    }
    interp.call_function(reviver, JsValue::Object(holder.clone()), &[name.to_value(), value])
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSON.stringify
// ═══════════════════════════════════════════════════════════════════════════════

/// JSON.stringify(value, replacer, space)
fn json_stringify(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let result = stringify(interp, &arg(args, 0), &arg(args, 1), &arg(args, 2))?;
    Ok(result.map(JsValue::String).unwrap_or_default())
}

/// `None` when the value has no JSON representation (`undefined`,
/// functions, symbols)
pub fn stringify(
    interp: &mut Interpreter,
    value: &JsValue,
    replacer: &JsValue,
    space: &JsValue,
) -> Result<Option<JsString>, JsError> {
    let mut ser = Serializer {
        replacer: None,
        allow: None,
        gap: JsString::default(),
        indent: Vec::new(),
        stack: Vec::new(),
    };
    if replacer.is_callable() {
        ser.replacer = Some(replacer.clone());
    } else if interp.is_array(replacer)? {
        ser.allow = Some(allow_list(interp, replacer)?);
    }
    ser.gap = gap(interp, space)?;

    let wrapper = interp.create_object();
    wrapper.borrow_mut().set_property(PropertyKey::from(""), value.clone());
    ser.property(interp, &wrapper, PropertyKey::from(""))
}

/// Property names kept by an array replacer, deduplicated in order
fn allow_list(interp: &mut Interpreter, replacer: &JsValue) -> Result<Vec<PropertyKey>, JsError> {
    let JsValue::Object(list) = replacer else {
        return Ok(Vec::new());
    };
    let len = interp.length_of_array_like(list)?;
    let mut seen = FxHashSet::default();
    let mut keys = Vec::new();
    for i in 0..len {
        let item = interp.get(list, &PropertyKey::from(i as usize))?;
        let name = match &item {
            JsValue::String(s) => Some(s.clone()),
            JsValue::Int(_) | JsValue::Float(_) => Some(interp.to_string(&item)?),
            JsValue::Object(o) if matches!(o.borrow().kind, ObjectKind::String(_) | ObjectKind::Number(_)) => {
                Some(interp.to_string(&item)?)
            }
            _ => None,
        };
        if let Some(name) = name {
            let key = PropertyKey::from(name);
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
    }
    Ok(keys)
}

/// Indentation unit from the `space` argument, at most ten code units
fn gap(interp: &mut Interpreter, space: &JsValue) -> Result<JsString, JsError> {
    let space = match space {
        JsValue::Object(o) => {
            let wrapped = match o.borrow().kind {
                ObjectKind::Number(_) => Some(Wrapped::Number),
                ObjectKind::String(_) => Some(Wrapped::String),
                _ => None,
            };
            match wrapped {
                Some(Wrapped::Number) => JsValue::number(interp.to_number(space)?),
                Some(Wrapped::String) => JsValue::String(interp.to_string(space)?),
                _ => space.clone(),
            }
        }
        other => other.clone(),
    };
    Ok(match &space {
        JsValue::Int(_) | JsValue::Float(_) => {
            let n = number::to_integer_or_infinity(space.as_number().unwrap_or(0.0)).clamp(0.0, 10.0);
            JsString::from(" ".repeat(n as usize))
        }
        JsValue::String(s) => s.substring(0, s.len().min(10)),
        _ => JsString::default(),
    })
}

/// Primitive wrapper objects serialize as their primitive
enum Wrapped {
    Number,
    String,
    Boolean(bool),
}

struct Serializer {
    replacer: Option<JsValue>,
    allow: Option<Vec<PropertyKey>>,
    gap: JsString,
    indent: Vec<JsString>,
    stack: Vec<JsObjectRef>,
}

impl Serializer {
    /// `SerializeJSONProperty`
    fn property(
        &mut self,
        interp: &mut Interpreter,
        holder: &JsObjectRef,
        key: PropertyKey,
    ) -> Result<Option<JsString>, JsError> {
        let mut value = interp.get(holder, &key)?;
        if value.is_object() {
            let to_json = interp.get_value(&value, &PropertyKey::from("toJSON"))?;
            if to_json.is_callable() {
                value = interp.call_function(&to_json, value, &[key.to_value()])?;
            }
        }
        if let Some(replacer) = &self.replacer {
            let replacer = replacer.clone();
            value = interp.call_function(&replacer, JsValue::Object(holder.clone()), &[key.to_value(), value])?;
        }
        if let JsValue::Object(o) = &value {
            let wrapped = match &o.borrow().kind {
                ObjectKind::Number(_) => Some(Wrapped::Number),
                ObjectKind::String(_) => Some(Wrapped::String),
                ObjectKind::Boolean(b) => Some(Wrapped::Boolean(*b)),
                _ => None,
            };
            match wrapped {
                Some(Wrapped::Number) => value = JsValue::number(interp.to_number(&value)?),
                Some(Wrapped::String) => value = JsValue::String(interp.to_string(&value)?),
                Some(Wrapped::Boolean(b)) => value = JsValue::Bool(b),
                None => {}
            }
        }
        Ok(match &value {
            JsValue::Null => Some(JsString::from("null")),
            JsValue::Bool(true) => Some(JsString::from("true")),
            JsValue::Bool(false) => Some(JsString::from("false")),
            JsValue::String(s) => Some(quote(s)),
            JsValue::Int(i) => Some(JsString::from(i.to_string())),
            JsValue::Float(f) if f.is_finite() => Some(number::number_to_js_string(*f)),
            JsValue::Float(_) => Some(JsString::from("null")),
            JsValue::Object(o) if !o.borrow().is_callable() => {
                let is_array = interp.is_array(&value)?;
                Some(interp.nested(|interp| {
                    if is_array { self.array(interp, o) } else { self.object(interp, o) }
                })?)
            }
            _ => None,
        })
    }

    fn enter(&mut self, obj: &JsObjectRef) -> Result<(), JsError> {
        if self.stack.iter().any(|o| o.ptr_eq(obj)) {
            return Err(JsError::type_error("Converting circular structure to JSON"));
        }
        self.stack.push(obj.clone());
        self.indent.push(self.gap.clone());
        Ok(())
    }

    fn leave(&mut self) {
        self.stack.pop();
        self.indent.pop();
    }

    fn push_indent(&self, out: &mut JsStringBuilder, depth: usize) {
        out.push_unit(u16::from(b'\n'));
        for unit in self.indent.iter().take(depth) {
            out.push_js(unit);
        }
    }

    /// Wrap serialized members in brackets, one per line when indenting
    fn wrap(&self, open: char, close: char, members: &[JsString]) -> JsString {
        let mut out = JsStringBuilder::new();
        out.push_char(open);
        if members.is_empty() {
            out.push_char(close);
            return out.finish();
        }
        let depth = self.indent.len();
        for (i, member) in members.iter().enumerate() {
            if i > 0 {
                out.push_char(',');
            }
            if !self.gap.is_empty() {
                self.push_indent(&mut out, depth);
            }
            out.push_js(member);
        }
        if !self.gap.is_empty() {
            self.push_indent(&mut out, depth.saturating_sub(1));
        }
        out.push_char(close);
        out.finish()
    }

    /// `SerializeJSONObject`
    fn object(&mut self, interp: &mut Interpreter, obj: &JsObjectRef) -> Result<JsString, JsError> {
        self.enter(obj)?;
        let keys = match &self.allow {
            Some(keys) => keys.clone(),
            None => {
                let mut keys = Vec::new();
                for k in interp.enumerable_own_properties(obj, EnumKind::Keys)? {
                    keys.push(interp.to_property_key(&k)?);
                }
                keys
            }
        };
        let mut members = Vec::new();
        for key in keys {
            let Some(value) = self.property(interp, obj, key.clone())? else {
                continue;
            };
            let mut member = JsStringBuilder::new();
            member.push_js(&quote(&key.to_js_string().unwrap_or_default()));
            member.push_char(':');
            if !self.gap.is_empty() {
                member.push_char(' ');
            }
            member.push_js(&value);
            members.push(member.finish());
        }
        let out = self.wrap('{', '}', &members);
        self.leave();
        Ok(out)
    }

    /// `SerializeJSONArray`
    fn array(&mut self, interp: &mut Interpreter, obj: &JsObjectRef) -> Result<JsString, JsError> {
        self.enter(obj)?;
        let len = interp.length_of_array_like(obj)?;
        let mut members = Vec::with_capacity(len.min(1024) as usize);
        for i in 0..len {
            let value = self.property(interp, obj, PropertyKey::from(i as usize))?;
            members.push(value.unwrap_or_else(|| JsString::from("null")));
        }
        let out = self.wrap('[', ']', &members);
        self.leave();
        Ok(out)
    }
}

/// `QuoteJSONString`; lone surrogates are escaped
pub fn quote(s: &JsString) -> JsString {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let units = s.to_utf16();
    let mut out = JsStringBuilder::with_capacity(units.len() + 2);
    out.push_char('"');
    let mut i = 0;
    while let Some(&u) = units.get(i) {
        i += 1;
        match u {
            0x08 => out.push_str("\\b"),
            0x09 => out.push_str("\\t"),
            0x0A => out.push_str("\\n"),
            0x0C => out.push_str("\\f"),
            0x0D => out.push_str("\\r"),
            0x22 => out.push_str("\\\""),
            0x5C => out.push_str("\\\\"),
            0xD800..=0xDBFF if units.get(i).is_some_and(|n| (0xDC00..=0xDFFF).contains(n)) => {
                out.push_unit(u);
                if let Some(&low) = units.get(i) {
                    out.push_unit(low);
                }
                i += 1;
            }
            u if u < 0x20 || (0xD800..=0xDFFF).contains(&u) => {
                out.push_str("\\u");
                for shift in [12, 8, 4, 0] {
                    let digit = HEX.get(usize::from((u >> shift) & 0xF)).copied().unwrap_or(b'0');
                    out.push_unit(u16::from(digit));
                }
            }
            u => out.push_unit(u),
        }
    }
    out.push_char('"');
    out.finish()
}
