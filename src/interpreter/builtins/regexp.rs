//! RegExp built-in methods
//!
//! Matching is delegated to the runtime's [`RegExpProvider`], which works
//! on UTF-8 text. [`SearchText`] converts between the UTF-16 indices
//! scripts see (`lastIndex`, `index`) and the provider's byte offsets.

use std::rc::Rc;

use crate::error::JsError;
use crate::gc::Tracer;
use crate::object::{Attributes, JsObject, JsObjectRef, ObjectKind, Property};
use crate::platform::{CompiledRegex, RegexMatch};
use crate::string::{JsString, JsStringBuilder};
use crate::value::{JsSymbol, JsValue, PropertyKey};

use super::arg;
use super::iterator::RegExpStringIteratorState;
use crate::interpreter::Interpreter;
use crate::interpreter::realm::Intrinsic;

const VALID_FLAGS: &str = "dgimsuyv";

pub struct RegExpData {
    pub source: JsString,
    pub flags: JsString,
    pub matcher: Rc<dyn CompiledRegex>,
}

impl RegExpData {
    pub fn trace(&self, _t: &mut Tracer<'_>) {}

    fn has_flag(&self, flag: u16) -> bool {
        self.flags.contains_unit(flag)
    }
}

fn regexp_data<R>(obj: &JsObjectRef, f: impl FnOnce(&RegExpData) -> R) -> Option<R> {
    match &obj.borrow().kind {
        ObjectKind::RegExp(data) => Some(f(data)),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// UTF-16 / UTF-8 index mapping
// ═══════════════════════════════════════════════════════════════════════════════

/// A string prepared for the provider: its UTF-8 text plus the byte offset
/// of every UTF-16 unit. Lone surrogates are searched as U+FFFD.
struct SearchText {
    text: String,
    /// `None` when the string is ASCII and offsets coincide
    unit_bytes: Option<Vec<usize>>,
}

impl SearchText {
    fn new(s: &JsString) -> Self {
        if let Some(ascii) = s.as_ascii_str() {
            return SearchText {
                text: ascii.to_string(),
                unit_bytes: None,
            };
        }
        let mut text = String::with_capacity(s.len());
        let mut unit_bytes = Vec::with_capacity(s.len() + 1);
        for cp in s.code_points() {
            let c = char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER);
            unit_bytes.push(text.len());
            if cp > 0xFFFF {
                // the low surrogate maps into the middle of the same char
                unit_bytes.push(text.len());
            }
            text.push(c);
        }
        unit_bytes.push(text.len());
        SearchText {
            text,
            unit_bytes: Some(unit_bytes),
        }
    }

    fn byte_offset(&self, unit: usize) -> usize {
        match &self.unit_bytes {
            None => unit.min(self.text.len()),
            Some(map) => map.get(unit).copied().unwrap_or(self.text.len()),
        }
    }

    fn unit_index(&self, byte: usize) -> usize {
        match &self.unit_bytes {
            None => byte,
            Some(map) => map.partition_point(|&b| b < byte),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Creation
// ═══════════════════════════════════════════════════════════════════════════════

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::RegExp).is_some() {
        return;
    }
    let proto = interp.create_object();
    interp.register_method(&proto, "exec", regexp_exec, 1);
    interp.register_method(&proto, "test", regexp_test, 1);
    interp.register_method(&proto, "toString", regexp_to_string, 0);
    interp.register_getter(&proto, "source", regexp_source);
    interp.register_getter(&proto, "flags", regexp_flags);
    for (name, getter) in FLAG_GETTERS {
        interp.register_getter(&proto, name, getter);
    }
    interp.register_symbol_method(&proto, JsSymbol::match_(), regexp_symbol_match, 1);
    interp.register_symbol_method(&proto, JsSymbol::match_all(), regexp_symbol_match_all, 1);
    interp.register_symbol_method(&proto, JsSymbol::replace(), regexp_symbol_replace, 2);
    interp.register_symbol_method(&proto, JsSymbol::search(), regexp_symbol_search, 1);
    interp.register_symbol_method(&proto, JsSymbol::split(), regexp_symbol_split, 2);

    let ctor = interp.create_native_constructor("RegExp", regexp_constructor, 2, &proto);
    super::register_species(interp, &ctor);
    interp.realm.set(Intrinsic::RegExpPrototype, proto);
    interp.realm.set(Intrinsic::RegExp, ctor);

    let parent = interp.intrinsic(Intrinsic::IteratorPrototype);
    let iter_proto = interp.create_object_with_proto(Some(parent));
    interp.register_method(&iter_proto, "next", regexp_string_iterator_next, 0);
    super::set_to_string_tag(&iter_proto, "RegExp String Iterator");
    interp.realm.set(Intrinsic::RegExpStringIteratorPrototype, iter_proto);
}

/// `RegExpCreate(pattern, flags)` with `%RegExp.prototype%`
pub(crate) fn create_regexp(interp: &mut Interpreter, pattern: &JsString, flags: &JsString) -> Result<JsObjectRef, JsError> {
    let proto = interp.intrinsic(Intrinsic::RegExpPrototype);
    regexp_initialize(interp, proto, pattern, flags)
}

/// `RegExpAlloc` + `RegExpInitialize`
fn regexp_initialize(
    interp: &mut Interpreter,
    proto: JsObjectRef,
    pattern: &JsString,
    flags: &JsString,
) -> Result<JsObjectRef, JsError> {
    let flag_str = flags.to_std_string();
    let mut seen = String::new();
    for c in flag_str.chars() {
        if !VALID_FLAGS.contains(c) || seen.contains(c) {
            return Err(JsError::syntax_error(format!(
                "Invalid regular expression flags '{flag_str}'"
            )));
        }
        seen.push(c);
    }
    if seen.contains('u') && seen.contains('v') {
        return Err(JsError::syntax_error(format!(
            "Invalid regular expression flags '{flag_str}'"
        )));
    }
    let Some(provider) = interp.regexp.clone() else {
        return Err(JsError::syntax_error("Regular expressions are not supported by this runtime"));
    };
    let pattern_str = pattern.to_std_string();
    let matcher = provider
        .compile(&pattern_str, &flag_str)
        .map_err(JsError::syntax_error)?;
    let data = RegExpData {
        source: pattern.clone(),
        flags: flags.clone(),
        matcher,
    };
    let obj = interp.alloc(JsObject::new(ObjectKind::RegExp(Box::new(data)), Some(proto)));
    obj.borrow_mut().define_property(
        PropertyKey::from("lastIndex"),
        Property::data(JsValue::from(0), Attributes::WRITABLE_ONLY),
    );
    Ok(obj)
}

fn is_regexp_object(value: &JsValue) -> bool {
    value
        .as_object()
        .is_some_and(|o| matches!(o.borrow().kind, ObjectKind::RegExp(_)))
}

/// `IsRegExp`: honours `Symbol.match`
pub(crate) fn is_regexp(interp: &mut Interpreter, value: &JsValue) -> Result<bool, JsError> {
    let JsValue::Object(obj) = value else {
        return Ok(false);
    };
    let matcher = interp.get(obj, &PropertyKey::Symbol(JsSymbol::match_()))?;
    if !matcher.is_undefined() {
        return Ok(matcher.to_boolean());
    }
    Ok(is_regexp_object(value))
}

/// RegExp(pattern, flags)
fn regexp_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let pattern = arg(args, 0);
    let flags = arg(args, 1);
    let pattern_is_regexp = is_regexp(interp, &pattern)?;
    let mut nt = interp.new_target.clone();
    if nt.is_undefined() {
        let ctor = interp.intrinsic(Intrinsic::RegExp);
        if pattern_is_regexp && flags.is_undefined() {
            if let JsValue::Object(p) = &pattern {
                let pc = interp.get(p, &PropertyKey::from("constructor"))?;
                if pc.as_object().is_some_and(|c| c.ptr_eq(&ctor)) {
                    return Ok(pattern);
                }
            }
        }
        nt = JsValue::Object(ctor);
    }

    let own = pattern
        .as_object()
        .and_then(|o| regexp_data(o, |d| (d.source.clone(), d.flags.clone())));
    let pattern_obj = pattern.as_object().cloned().filter(|_| pattern_is_regexp);
    let (p, f) = if let Some((source, own_flags)) = own {
        let f = if flags.is_undefined() { JsValue::String(own_flags) } else { flags };
        (JsValue::String(source), f)
    } else if let Some(obj) = pattern_obj {
        let source = interp.get(&obj, &PropertyKey::from("source"))?;
        let f = if flags.is_undefined() {
            interp.get(&obj, &PropertyKey::from("flags"))?
        } else {
            flags
        };
        (source, f)
    } else {
        (pattern, flags)
    };
    let p = if p.is_undefined() { JsString::empty() } else { interp.to_string(&p)? };
    let f = if f.is_undefined() { JsString::empty() } else { interp.to_string(&f)? };
    let proto = interp.get_prototype_from_constructor(&nt, Intrinsic::RegExpPrototype)?;
    Ok(JsValue::Object(regexp_initialize(interp, proto, &p, &f)?))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Accessors
// ═══════════════════════════════════════════════════════════════════════════════

const FLAG_GETTERS: [(&str, crate::object::NativeFn); 8] = [
    ("hasIndices", regexp_has_indices),
    ("global", regexp_global),
    ("ignoreCase", regexp_ignore_case),
    ("multiline", regexp_multiline),
    ("dotAll", regexp_dot_all),
    ("unicode", regexp_unicode),
    ("unicodeSets", regexp_unicode_sets),
    ("sticky", regexp_sticky),
];

/// Shared body of the flag getters; `RegExp.prototype` itself reads as undefined
fn flag_getter(interp: &mut Interpreter, this: &JsValue, flag: char, name: &str) -> Result<JsValue, JsError> {
    if let JsValue::Object(obj) = this {
        if let Some(set) = regexp_data(obj, |d| d.has_flag(flag as u16)) {
            return Ok(JsValue::Bool(set));
        }
        let proto = interp.intrinsic(Intrinsic::RegExpPrototype);
        if obj.ptr_eq(&proto) {
            return Ok(JsValue::Undefined);
        }
    }
    Err(JsError::type_error(format!(
        "RegExp.prototype.{name} getter called on non-RegExp object"
    )))
}

fn regexp_has_indices(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    flag_getter(interp, &this, 'd', "hasIndices")
}

fn regexp_global(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    flag_getter(interp, &this, 'g', "global")
}

fn regexp_ignore_case(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    flag_getter(interp, &this, 'i', "ignoreCase")
}

fn regexp_multiline(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    flag_getter(interp, &this, 'm', "multiline")
}

fn regexp_dot_all(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    flag_getter(interp, &this, 's', "dotAll")
}

fn regexp_unicode(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    flag_getter(interp, &this, 'u', "unicode")
}

fn regexp_unicode_sets(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    flag_getter(interp, &this, 'v', "unicodeSets")
}

fn regexp_sticky(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    flag_getter(interp, &this, 'y', "sticky")
}

/// get RegExp.prototype.flags
fn regexp_flags(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let JsValue::Object(obj) = &this else {
        return Err(JsError::type_error("RegExp.prototype.flags getter called on non-object"));
    };
    let mut out = String::new();
    for (flag, name) in [
        ('d', "hasIndices"),
        ('g', "global"),
        ('i', "ignoreCase"),
        ('m', "multiline"),
        ('s', "dotAll"),
        ('u', "unicode"),
        ('v', "unicodeSets"),
        ('y', "sticky"),
    ] {
        if interp.get(obj, &PropertyKey::from(name))?.to_boolean() {
            out.push(flag);
        }
    }
    Ok(JsValue::from(out))
}

/// `EscapeRegExpPattern`
fn escape_source(source: &JsString) -> JsString {
    if source.is_empty() {
        return JsString::from("(?:)");
    }
    let mut out = JsStringBuilder::with_capacity(source.len());
    let mut in_class = false;
    let mut escaped = false;
    for unit in source.units() {
        match unit {
            0x2F if !escaped && !in_class => out.push_str("\\/"),
            0x0A => out.push_str(if escaped { "n" } else { "\\n" }),
            0x0D => out.push_str(if escaped { "r" } else { "\\r" }),
            0x2028 => out.push_str(if escaped { "u2028" } else { "\\u2028" }),
            0x2029 => out.push_str(if escaped { "u2029" } else { "\\u2029" }),
            _ => out.push_unit(unit),
        }
        if !escaped {
            match unit {
                0x5B => in_class = true,
                0x5D => in_class = false,
                _ => {}
            }
        }
        escaped = !escaped && unit == 0x5C;
    }
    out.finish()
}

/// get RegExp.prototype.source
fn regexp_source(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    if let JsValue::Object(obj) = &this {
        if let Some(source) = regexp_data(obj, |d| d.source.clone()) {
            return Ok(JsValue::String(escape_source(&source)));
        }
        let proto = interp.intrinsic(Intrinsic::RegExpPrototype);
        if obj.ptr_eq(&proto) {
            return Ok(JsValue::from("(?:)"));
        }
    }
    Err(JsError::type_error("RegExp.prototype.source getter called on non-RegExp object"))
}

/// RegExp.prototype.toString()
fn regexp_to_string(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let JsValue::Object(obj) = &this else {
        return Err(JsError::type_error("RegExp.prototype.toString called on non-object"));
    };
    let source = interp.get(obj, &PropertyKey::from("source"))?;
    let source = interp.to_string(&source)?;
    let flags = interp.get(obj, &PropertyKey::from("flags"))?;
    let flags = interp.to_string(&flags)?;
    Ok(JsValue::from(format!("/{source}/{flags}")))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Matching
// ═══════════════════════════════════════════════════════════════════════════════

fn last_index_key() -> PropertyKey {
    PropertyKey::from("lastIndex")
}

fn set_last_index(interp: &mut Interpreter, r: &JsObjectRef, index: usize) -> Result<(), JsError> {
    interp.set_or_throw(r, last_index_key(), JsValue::from(index))
}

/// `RegExpBuiltinExec`
fn builtin_exec(interp: &mut Interpreter, r: &JsObjectRef, s: &JsString) -> Result<JsValue, JsError> {
    let last_index = interp.get(r, &last_index_key())?;
    let last_index = interp.to_length(&last_index)? as usize;
    let Some((matcher, flags)) = regexp_data(r, |d| (d.matcher.clone(), d.flags.clone())) else {
        return Err(JsError::type_error("RegExp.prototype.exec called on incompatible receiver"));
    };
    let global = flags.contains_unit(u16::from(b'g'));
    let sticky = flags.contains_unit(u16::from(b'y'));
    let has_indices = flags.contains_unit(u16::from(b'd'));
    let start = if global || sticky { last_index } else { 0 };
    if start > s.len() {
        if global || sticky {
            set_last_index(interp, r, 0)?;
        }
        return Ok(JsValue::Null);
    }

    let text = SearchText::new(s);
    let byte_start = text.byte_offset(start);
    let found = matcher
        .find(&text.text, byte_start)
        .map_err(|err| JsError::range_error(format!("RegExp execution failed: {err}")))?;
    let found = match found {
        Some(m) if sticky && m.start != byte_start => None,
        other => other,
    };
    let Some(m) = found else {
        if global || sticky {
            set_last_index(interp, r, 0)?;
        }
        return Ok(JsValue::Null);
    };
    let end = text.unit_index(m.end);
    if global || sticky {
        set_last_index(interp, r, end)?;
    }
    let names = matcher.group_names();
    Ok(JsValue::Object(build_match_result(interp, s, &text, &m, &names, has_indices)?))
}

/// The array `exec` returns: captures plus `index`, `input`, `groups`
/// and, with the `d` flag, `indices`
fn build_match_result(
    interp: &mut Interpreter,
    s: &JsString,
    text: &SearchText,
    m: &RegexMatch,
    names: &[Option<String>],
    has_indices: bool,
) -> Result<JsObjectRef, JsError> {
    let spans: Vec<Option<(usize, usize)>> = m
        .captures
        .iter()
        .map(|c| c.map(|(a, b)| (text.unit_index(a), text.unit_index(b))))
        .collect();
    let values: Vec<JsValue> = spans
        .iter()
        .map(|span| match span {
            Some((a, b)) => JsValue::String(s.substring(*a, *b)),
            None => JsValue::Undefined,
        })
        .collect();
    let index = text.unit_index(m.start);
    let result = interp.create_array(values.clone());

    let has_groups = names.iter().any(Option::is_some);
    let groups = if has_groups {
        let g = interp.create_object_with_proto(None);
        for (name, value) in names.iter().zip(&values) {
            if let Some(name) = name {
                g.borrow_mut().set_property(PropertyKey::from(name.as_str()), value.clone());
            }
        }
        JsValue::Object(g)
    } else {
        JsValue::Undefined
    };
    {
        let mut o = result.borrow_mut();
        o.set_property(PropertyKey::from("index"), JsValue::from(index));
        o.set_property(PropertyKey::from("input"), JsValue::String(s.clone()));
        o.set_property(PropertyKey::from("groups"), groups);
    }

    if has_indices {
        let mut pairs = Vec::with_capacity(spans.len());
        for span in &spans {
            pairs.push(match span {
                Some((a, b)) => JsValue::Object(interp.create_array(vec![JsValue::from(*a), JsValue::from(*b)])),
                None => JsValue::Undefined,
            });
        }
        let indices = interp.create_array(pairs.clone());
        let index_groups = if has_groups {
            let g = interp.create_object_with_proto(None);
            for (name, pair) in names.iter().zip(&pairs) {
                if let Some(name) = name {
                    g.borrow_mut().set_property(PropertyKey::from(name.as_str()), pair.clone());
                }
            }
            JsValue::Object(g)
        } else {
            JsValue::Undefined
        };
        indices
            .borrow_mut()
            .set_property(PropertyKey::from("groups"), index_groups);
        result
            .borrow_mut()
            .set_property(PropertyKey::from("indices"), JsValue::Object(indices));
    }
    Ok(result)
}

/// `RegExpExec`: a user-supplied `exec` wins over the built-in
pub(crate) fn regexp_exec_abstract(interp: &mut Interpreter, r: &JsObjectRef, s: &JsString) -> Result<JsValue, JsError> {
    let exec = interp.get(r, &PropertyKey::from("exec"))?;
    if exec.is_callable() {
        let result = interp.call_function(&exec, JsValue::Object(r.clone()), &[JsValue::String(s.clone())])?;
        if !result.is_object() && !result.is_null() {
            return Err(JsError::type_error("RegExp exec method returned something other than an Object or null"));
        }
        return Ok(result);
    }
    builtin_exec(interp, r, s)
}

/// `AdvanceStringIndex`
pub(crate) fn advance_string_index(s: &JsString, index: usize, unicode: bool) -> usize {
    if !unicode || index + 1 >= s.len() {
        return index + 1;
    }
    match s.code_point_at(index) {
        Some(cp) if cp > 0xFFFF => index + 2,
        _ => index + 1,
    }
}

fn this_regexp_object(this: &JsValue, method: &str) -> Result<JsObjectRef, JsError> {
    match this {
        JsValue::Object(o) => Ok(o.clone()),
        _ => Err(JsError::type_error(format!(
            "RegExp.prototype.{method} called on incompatible receiver {}",
            this.display_hint()
        ))),
    }
}

/// RegExp.prototype.exec(string)
fn regexp_exec(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let r = this_regexp_object(&this, "exec")?;
    if !is_regexp_object(&this) {
        return Err(JsError::type_error("RegExp.prototype.exec called on incompatible receiver"));
    }
    let s = interp.to_string(&arg(args, 0))?;
    builtin_exec(interp, &r, &s)
}

/// RegExp.prototype.test(string)
fn regexp_test(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let r = this_regexp_object(&this, "test")?;
    let s = interp.to_string(&arg(args, 0))?;
    Ok(JsValue::Bool(!regexp_exec_abstract(interp, &r, &s)?.is_null()))
}

fn flags_of(interp: &mut Interpreter, r: &JsObjectRef) -> Result<JsString, JsError> {
    let flags = interp.get(r, &PropertyKey::from("flags"))?;
    interp.to_string(&flags)
}

fn is_unicode_flags(flags: &JsString) -> bool {
    flags.contains_unit(u16::from(b'u')) || flags.contains_unit(u16::from(b'v'))
}

/// `match[0]` of an exec result as a string
fn matched_string(interp: &mut Interpreter, result: &JsValue) -> Result<JsString, JsError> {
    let m = interp.get_value(result, &PropertyKey::Index(0))?;
    interp.to_string(&m)
}

/// After an empty match, step `lastIndex` past it
fn bump_empty_match(interp: &mut Interpreter, r: &JsObjectRef, s: &JsString, unicode: bool) -> Result<(), JsError> {
    let this_index = interp.get(r, &last_index_key())?;
    let this_index = interp.to_length(&this_index)? as usize;
    set_last_index(interp, r, advance_string_index(s, this_index, unicode))
}

/// RegExp.prototype[Symbol.match](string)
fn regexp_symbol_match(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let r = this_regexp_object(&this, "[Symbol.match]")?;
    let s = interp.to_string(&arg(args, 0))?;
    let flags = flags_of(interp, &r)?;
    if !flags.contains_unit(u16::from(b'g')) {
        return regexp_exec_abstract(interp, &r, &s);
    }
    let unicode = is_unicode_flags(&flags);
    set_last_index(interp, &r, 0)?;
    let mut matches = Vec::new();
    loop {
        let result = regexp_exec_abstract(interp, &r, &s)?;
        if result.is_null() {
            break;
        }
        let matched = matched_string(interp, &result)?;
        if matched.is_empty() {
            bump_empty_match(interp, &r, &s, unicode)?;
        }
        matches.push(JsValue::String(matched));
    }
    if matches.is_empty() {
        return Ok(JsValue::Null);
    }
    Ok(JsValue::Object(interp.create_array(matches)))
}

/// RegExp.prototype[Symbol.matchAll](string)
fn regexp_symbol_match_all(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let r = this_regexp_object(&this, "[Symbol.matchAll]")?;
    let s = interp.to_string(&arg(args, 0))?;
    let ctor = interp.species_constructor(&r, Intrinsic::RegExp)?;
    let flags = flags_of(interp, &r)?;
    let matcher = interp.construct(&ctor, &[JsValue::Object(r.clone()), JsValue::String(flags.clone())], None)?;
    let matcher = interp.require_object(&matcher, "RegExp.prototype[Symbol.matchAll]")?;
    let last_index = interp.get(&r, &last_index_key())?;
    let last_index = interp.to_length(&last_index)? as usize;
    set_last_index(interp, &matcher, last_index)?;
    let state = RegExpStringIteratorState {
        regexp: matcher,
        string: s,
        global: flags.contains_unit(u16::from(b'g')),
        unicode: is_unicode_flags(&flags),
        done: false,
    };
    let proto = interp.intrinsic(Intrinsic::RegExpStringIteratorPrototype);
    let iter = JsObject::new(ObjectKind::RegExpStringIterator(Box::new(state)), Some(proto));
    Ok(JsValue::Object(interp.alloc(iter)))
}

/// %RegExpStringIteratorPrototype%.next()
fn regexp_string_iterator_next(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let JsValue::Object(iter) = &this else {
        return Err(JsError::type_error("RegExp String Iterator next called on incompatible receiver"));
    };
    let state = match &iter.borrow().kind {
        ObjectKind::RegExpStringIterator(st) => {
            (st.regexp.clone(), st.string.clone(), st.global, st.unicode, st.done)
        }
        _ => return Err(JsError::type_error("RegExp String Iterator next called on incompatible receiver")),
    };
    let (r, s, global, unicode, done) = state;
    if done {
        return Ok(interp.create_iter_result(JsValue::Undefined, true));
    }
    let mark_done = |iter: &JsObjectRef| {
        if let ObjectKind::RegExpStringIterator(st) = &mut iter.borrow_mut().kind {
            st.done = true;
        }
    };
    let result = regexp_exec_abstract(interp, &r, &s)?;
    if result.is_null() {
        mark_done(iter);
        return Ok(interp.create_iter_result(JsValue::Undefined, true));
    }
    if !global {
        mark_done(iter);
        return Ok(interp.create_iter_result(result, false));
    }
    if matched_string(interp, &result)?.is_empty() {
        bump_empty_match(interp, &r, &s, unicode)?;
    }
    Ok(interp.create_iter_result(result, false))
}

/// RegExp.prototype[Symbol.search](string)
fn regexp_symbol_search(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let r = this_regexp_object(&this, "[Symbol.search]")?;
    let s = interp.to_string(&arg(args, 0))?;
    let previous = interp.get(&r, &last_index_key())?;
    if !previous.same_value(&JsValue::from(0)) {
        interp.set_or_throw(&r, last_index_key(), JsValue::from(0))?;
    }
    let result = regexp_exec_abstract(interp, &r, &s)?;
    let current = interp.get(&r, &last_index_key())?;
    if !current.same_value(&previous) {
        interp.set_or_throw(&r, last_index_key(), previous)?;
    }
    if result.is_null() {
        return Ok(JsValue::from(-1));
    }
    interp.get_value(&result, &PropertyKey::from("index"))
}

/// RegExp.prototype[Symbol.split](string, limit)
fn regexp_symbol_split(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let rx = this_regexp_object(&this, "[Symbol.split]")?;
    let s = interp.to_string(&arg(args, 0))?;
    let ctor = interp.species_constructor(&rx, Intrinsic::RegExp)?;
    let flags = flags_of(interp, &rx)?;
    let unicode = is_unicode_flags(&flags);
    let new_flags = if flags.contains_unit(u16::from(b'y')) {
        flags
    } else {
        flags.concat(&JsString::from("y"))
    };
    let splitter = interp.construct(&ctor, &[JsValue::Object(rx), JsValue::String(new_flags)], None)?;
    let splitter = interp.require_object(&splitter, "RegExp.prototype[Symbol.split]")?;
    let limit = match arg(args, 1) {
        JsValue::Undefined => u32::MAX,
        v => interp.to_uint32(&v)?,
    } as usize;
    let mut parts: Vec<JsValue> = Vec::new();
    if limit == 0 {
        return Ok(JsValue::Object(interp.create_array(parts)));
    }
    let size = s.len();
    if size == 0 {
        let z = regexp_exec_abstract(interp, &splitter, &s)?;
        if z.is_null() {
            parts.push(JsValue::String(s));
        }
        return Ok(JsValue::Object(interp.create_array(parts)));
    }
    let mut p = 0usize;
    let mut q = p;
    while q < size {
        set_last_index(interp, &splitter, q)?;
        let z = regexp_exec_abstract(interp, &splitter, &s)?;
        if z.is_null() {
            q = advance_string_index(&s, q, unicode);
            continue;
        }
        let e = interp.get(&splitter, &last_index_key())?;
        let e = (interp.to_length(&e)? as usize).min(size);
        if e == p {
            q = advance_string_index(&s, q, unicode);
            continue;
        }
        parts.push(JsValue::String(s.substring(p, q)));
        if parts.len() == limit {
            return Ok(JsValue::Object(interp.create_array(parts)));
        }
        p = e;
        let z_obj = interp.to_object(&z)?;
        let captures = interp.length_of_array_like(&z_obj)?.saturating_sub(1);
        for i in 1..=captures {
            let cap = interp.get(&z_obj, &PropertyKey::Index(i as u32))?;
            parts.push(cap);
            if parts.len() == limit {
                return Ok(JsValue::Object(interp.create_array(parts)));
            }
        }
        q = p;
    }
    parts.push(JsValue::String(s.substring(p, size)));
    Ok(JsValue::Object(interp.create_array(parts)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Replacement
// ═══════════════════════════════════════════════════════════════════════════════

/// `GetSubstitution`: expand `$$`, `$&`, `` $` ``, `$'`, `$n`, `$nn` and
/// `$<name>` in a replacement template
pub(crate) fn get_substitution(
    interp: &mut Interpreter,
    matched: &JsString,
    s: &JsString,
    position: usize,
    captures: &[JsValue],
    named_captures: &JsValue,
    template: &JsString,
) -> Result<JsString, JsError> {
    let units = template.to_utf16();
    let mut out = JsStringBuilder::with_capacity(units.len());
    let tail_pos = (position + matched.len()).min(s.len());
    let m = captures.len();
    let mut i = 0;
    while let Some(&unit) = units.get(i) {
        if unit != u16::from(b'$') {
            out.push_unit(unit);
            i += 1;
            continue;
        }
        let next = units.get(i + 1).copied();
        match next.and_then(|u| char::from_u32(u32::from(u))) {
            Some('$') => {
                out.push_unit(unit);
                i += 2;
            }
            Some('&') => {
                out.push_js(matched);
                i += 2;
            }
            Some('`') => {
                out.push_js(&s.substring(0, position));
                i += 2;
            }
            Some('\'') => {
                out.push_js(&s.substring(tail_pos, s.len()));
                i += 2;
            }
            Some(d) if d.is_ascii_digit() => {
                let one = d.to_digit(10).unwrap_or(0) as usize;
                let two = units
                    .get(i + 2)
                    .and_then(|&u| char::from_u32(u32::from(u)))
                    .and_then(|c| c.to_digit(10))
                    .map(|d2| one * 10 + d2 as usize);
                let (index, consumed) = match two {
                    Some(n) if (1..=m).contains(&n) => (n, 3),
                    _ => (one, 2),
                };
                if (1..=m).contains(&index) {
                    if let Some(cap) = captures.get(index - 1) {
                        if !cap.is_undefined() {
                            let cap = interp.to_string(cap)?;
                            out.push_js(&cap);
                        }
                    }
                    i += consumed;
                } else {
                    out.push_unit(unit);
                    i += 1;
                }
            }
            Some('<') if !named_captures.is_undefined() => {
                let close = units
                    .get(i + 2..)
                    .and_then(|rest| rest.iter().position(|&u| u == u16::from(b'>')));
                match close {
                    Some(offset) => {
                        let name = JsString::from_utf16(units.get(i + 2..i + 2 + offset).unwrap_or_default());
                        let value = interp.get_value(named_captures, &PropertyKey::from(name))?;
                        if !value.is_undefined() {
                            let value = interp.to_string(&value)?;
                            out.push_js(&value);
                        }
                        i += offset + 3;
                    }
                    None => {
                        out.push_unit(unit);
                        i += 1;
                    }
                }
            }
            _ => {
                out.push_unit(unit);
                i += 1;
            }
        }
    }
    Ok(out.finish())
}

/// RegExp.prototype[Symbol.replace](string, replaceValue)
fn regexp_symbol_replace(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let rx = this_regexp_object(&this, "[Symbol.replace]")?;
    let s = interp.to_string(&arg(args, 0))?;
    let replace_value = arg(args, 1);
    let functional = replace_value.is_callable();
    let template = if functional {
        JsString::empty()
    } else {
        interp.to_string(&replace_value)?
    };
    let flags = flags_of(interp, &rx)?;
    let global = flags.contains_unit(u16::from(b'g'));
    let unicode = is_unicode_flags(&flags);
    if global {
        set_last_index(interp, &rx, 0)?;
    }

    let mut results = Vec::new();
    loop {
        let result = regexp_exec_abstract(interp, &rx, &s)?;
        if result.is_null() {
            break;
        }
        if !global {
            results.push(result);
            break;
        }
        if matched_string(interp, &result)?.is_empty() {
            bump_empty_match(interp, &rx, &s, unicode)?;
        }
        results.push(result);
    }

    let mut out = JsStringBuilder::new();
    let mut next_source_position = 0usize;
    for result in results {
        let result = interp.to_object(&result)?;
        let captures_len = interp.length_of_array_like(&result)?.saturating_sub(1) as usize;
        let matched = interp.get(&result, &PropertyKey::Index(0))?;
        let matched = interp.to_string(&matched)?;
        let position = interp.get(&result, &PropertyKey::from("index"))?;
        let position = interp.to_integer_or_infinity(&position)?.clamp(0.0, s.len() as f64) as usize;
        let mut captures = Vec::with_capacity(captures_len);
        for n in 1..=captures_len {
            let cap = interp.get(&result, &PropertyKey::Index(n as u32))?;
            captures.push(if cap.is_undefined() {
                cap
            } else {
                JsValue::String(interp.to_string(&cap)?)
            });
        }
        let named = interp.get(&result, &PropertyKey::from("groups"))?;
        let replacement = if functional {
            let mut call_args = vec![JsValue::String(matched.clone())];
            call_args.extend(captures.iter().cloned());
            call_args.push(JsValue::from(position));
            call_args.push(JsValue::String(s.clone()));
            if !named.is_undefined() {
                call_args.push(named);
            }
            let r = interp.call_function(&replace_value, JsValue::Undefined, &call_args)?;
            interp.to_string(&r)?
        } else {
            let named = if named.is_undefined() {
                named
            } else {
                JsValue::Object(interp.to_object(&named)?)
            };
            get_substitution(interp, &matched, &s, position, &captures, &named, &template)?
        };
        if position >= next_source_position {
            out.push_js(&s.substring(next_source_position, position));
            out.push_js(&replacement);
            next_source_position = position + matched.len();
        }
    }
    if next_source_position < s.len() {
        out.push_js(&s.substring(next_source_position, s.len()));
    }
    Ok(JsValue::String(out.finish()))
}

#[cfg(all(test, feature = "regex"))]
mod tests {
    use super::*;

    #[test]
    fn search_text_maps_surrogates() {
        let s = JsString::from_utf16(&[0x61, 0xD83D, 0xDE00, 0x62]);
        let text = SearchText::new(&s);
        assert_eq!(text.text, "a😀b");
        assert_eq!(text.byte_offset(1), 1);
        assert_eq!(text.byte_offset(3), 5);
        assert_eq!(text.unit_index(5), 3);
        assert_eq!(text.unit_index(6), 4);
    }

    #[test]
    fn global_exec_advances_last_index() {
        let mut interp = Interpreter::new(0, false);
        let Ok(re) = create_regexp(&mut interp, &JsString::from("o"), &JsString::from("g")) else {
            panic!("regexp did not compile");
        };
        let s = JsString::from("foo");
        assert!(builtin_exec(&mut interp, &re, &s).is_ok_and(|v| v.is_object()));
        assert_eq!(interp.get(&re, &last_index_key()).ok(), Some(JsValue::from(2)));
        assert!(builtin_exec(&mut interp, &re, &s).is_ok_and(|v| v.is_object()));
        assert!(builtin_exec(&mut interp, &re, &s).is_ok_and(|v| v.is_null()));
        assert_eq!(interp.get(&re, &last_index_key()).ok(), Some(JsValue::from(0)));
    }

    #[test]
    fn bad_flags_are_syntax_errors() {
        let mut interp = Interpreter::new(0, false);
        let result = create_regexp(&mut interp, &JsString::from("a"), &JsString::from("gg"));
        assert!(matches!(result, Err(JsError::SyntaxError { .. })));
    }

    #[test]
    fn substitution_patterns() {
        let mut interp = Interpreter::new(0, false);
        let s = JsString::from("abcd");
        let out = get_substitution(
            &mut interp,
            &JsString::from("bc"),
            &s,
            1,
            &[JsValue::from("b")],
            &JsValue::Undefined,
            &JsString::from("[$&|$1|$`|$'|$$|$2]"),
        );
        assert_eq!(out.ok().map(|s| s.to_string()), Some("[bc|b|a|d|$|$2]".to_string()));
    }
}
