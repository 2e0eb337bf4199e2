//! Value representation
//!
//! `JsValue` is the tagged union every operation dispatches on. Numbers are
//! split into an integer and a float form; the integer form only ever holds
//! values in the safe-integer range so both forms share one numeric meaning.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::{Arc, OnceLock};

use crate::number;
use crate::object::JsObjectRef;
use crate::string::JsString;

/// Largest integer stored in `JsValue::Int` (2^53)
pub const MAX_SAFE_INT: i64 = 9_007_199_254_740_992;

/// Trait for types that have cheap (O(1), reference-counted) clones.
///
/// `cheap_clone()` reads the same as `clone()` but documents at the call site
/// that only a reference count moves.
pub trait CheapClone: Clone {
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}
impl<T: ?Sized> CheapClone for Arc<T> {}
impl CheapClone for JsString {}

// ═══════════════════════════════════════════════════════════════════════════════
// Symbols
// ═══════════════════════════════════════════════════════════════════════════════

struct SymbolData {
    description: Option<JsString>,
    private: bool,
}

/// A symbol; identity is the allocation
#[derive(Clone)]
pub struct JsSymbol(Arc<SymbolData>);

impl CheapClone for JsSymbol {}

impl JsSymbol {
    pub fn new(description: Option<JsString>) -> Self {
        JsSymbol(Arc::new(SymbolData {
            description,
            private: false,
        }))
    }

    /// A private name (`#x`). Private names key private elements and never
    /// appear in property tables.
    pub fn new_private(name: JsString) -> Self {
        JsSymbol(Arc::new(SymbolData {
            description: Some(name),
            private: true,
        }))
    }

    pub fn description(&self) -> Option<&JsString> {
        self.0.description.as_ref()
    }

    pub fn is_private(&self) -> bool {
        self.0.private
    }

    /// `Symbol(desc)` as produced by `Symbol.prototype.toString`
    pub fn descriptive_string(&self) -> JsString {
        let desc = self.0.description.clone().unwrap_or_default();
        JsString::from("Symbol(").concat(&desc).concat(&JsString::from(")"))
    }

    pub fn ptr_eq(&self, other: &JsSymbol) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl PartialEq for JsSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for JsSymbol {}

impl Hash for JsSymbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for JsSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptive_string())
    }
}

/// The well-known symbols, shared by every runtime in the process
struct WellKnownSymbols {
    iterator: JsSymbol,
    async_iterator: JsSymbol,
    has_instance: JsSymbol,
    is_concat_spreadable: JsSymbol,
    match_: JsSymbol,
    match_all: JsSymbol,
    replace: JsSymbol,
    search: JsSymbol,
    species: JsSymbol,
    split: JsSymbol,
    to_primitive: JsSymbol,
    to_string_tag: JsSymbol,
    unscopables: JsSymbol,
}

fn well_known() -> &'static WellKnownSymbols {
    static SYMBOLS: OnceLock<WellKnownSymbols> = OnceLock::new();
    SYMBOLS.get_or_init(|| {
        let sym = |name: &str| JsSymbol::new(Some(JsString::from(format!("Symbol.{name}"))));
        WellKnownSymbols {
            iterator: sym("iterator"),
            async_iterator: sym("asyncIterator"),
            has_instance: sym("hasInstance"),
            is_concat_spreadable: sym("isConcatSpreadable"),
            match_: sym("match"),
            match_all: sym("matchAll"),
            replace: sym("replace"),
            search: sym("search"),
            species: sym("species"),
            split: sym("split"),
            to_primitive: sym("toPrimitive"),
            to_string_tag: sym("toStringTag"),
            unscopables: sym("unscopables"),
        }
    })
}

impl JsSymbol {
    pub fn iterator() -> JsSymbol {
        well_known().iterator.clone()
    }
    pub fn async_iterator() -> JsSymbol {
        well_known().async_iterator.clone()
    }
    pub fn has_instance() -> JsSymbol {
        well_known().has_instance.clone()
    }
    pub fn is_concat_spreadable() -> JsSymbol {
        well_known().is_concat_spreadable.clone()
    }
    pub fn match_() -> JsSymbol {
        well_known().match_.clone()
    }
    pub fn match_all() -> JsSymbol {
        well_known().match_all.clone()
    }
    pub fn replace() -> JsSymbol {
        well_known().replace.clone()
    }
    pub fn search() -> JsSymbol {
        well_known().search.clone()
    }
    pub fn species() -> JsSymbol {
        well_known().species.clone()
    }
    pub fn split() -> JsSymbol {
        well_known().split.clone()
    }
    pub fn to_primitive() -> JsSymbol {
        well_known().to_primitive.clone()
    }
    pub fn to_string_tag() -> JsSymbol {
        well_known().to_string_tag.clone()
    }
    pub fn unscopables() -> JsSymbol {
        well_known().unscopables.clone()
    }

    /// Name/symbol pairs exposed as static properties of `Symbol`
    pub fn well_known_list() -> [(&'static str, JsSymbol); 13] {
        let w = well_known();
        [
            ("iterator", w.iterator.clone()),
            ("asyncIterator", w.async_iterator.clone()),
            ("hasInstance", w.has_instance.clone()),
            ("isConcatSpreadable", w.is_concat_spreadable.clone()),
            ("match", w.match_.clone()),
            ("matchAll", w.match_all.clone()),
            ("replace", w.replace.clone()),
            ("search", w.search.clone()),
            ("species", w.species.clone()),
            ("split", w.split.clone()),
            ("toPrimitive", w.to_primitive.clone()),
            ("toStringTag", w.to_string_tag.clone()),
            ("unscopables", w.unscopables.clone()),
        ]
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JsValue
// ═══════════════════════════════════════════════════════════════════════════════

/// A script value
#[derive(Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    /// Integral number with magnitude at most 2^53 (never -0)
    Int(i64),
    /// Any other number; NaN is canonical
    Float(f64),
    String(JsString),
    Symbol(JsSymbol),
    Object(JsObjectRef),
}

impl JsValue {
    /// Canonical numeric value: integral doubles in the safe range become `Int`
    pub fn number(v: f64) -> JsValue {
        if v.fract() == 0.0 && v.abs() <= MAX_SAFE_INT as f64 && !(v == 0.0 && v.is_sign_negative()) {
            JsValue::Int(v as i64)
        } else if v.is_nan() {
            JsValue::Float(f64::NAN)
        } else {
            JsValue::Float(v)
        }
    }

    /// Integer value, promoted to `Float` outside the safe range
    pub fn int(v: i64) -> JsValue {
        if (-MAX_SAFE_INT..=MAX_SAFE_INT).contains(&v) {
            JsValue::Int(v)
        } else {
            JsValue::Float(v as f64)
        }
    }

    pub fn nan() -> JsValue {
        JsValue::Float(f64::NAN)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, JsValue::Null)
    }

    /// `null` or `undefined`
    pub fn is_nullish(&self) -> bool {
        matches!(self, JsValue::Null | JsValue::Undefined)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, JsValue::Int(_) | JsValue::Float(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, JsValue::String(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, JsValue::Object(_))
    }

    pub fn as_object(&self) -> Option<&JsObjectRef> {
        match self {
            JsValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&JsString> {
        match self {
            JsValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            JsValue::Int(i) => Some(*i as f64),
            JsValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JsValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Check if this value is callable
    pub fn is_callable(&self) -> bool {
        match self {
            JsValue::Object(obj) => obj.borrow().is_callable(),
            _ => false,
        }
    }

    pub fn is_constructor(&self) -> bool {
        match self {
            JsValue::Object(obj) => obj.borrow().is_constructor(),
            _ => false,
        }
    }

    /// The `typeof` result
    pub fn type_of(&self) -> &'static str {
        match self {
            JsValue::Undefined => "undefined",
            JsValue::Null => "object",
            JsValue::Bool(_) => "boolean",
            JsValue::Int(_) | JsValue::Float(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Symbol(_) => "symbol",
            JsValue::Object(obj) => {
                if obj.borrow().is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// ES `ToBoolean`
    pub fn to_boolean(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Bool(b) => *b,
            JsValue::Int(i) => *i != 0,
            JsValue::Float(f) => *f != 0.0 && !f.is_nan(),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Symbol(_) | JsValue::Object(_) => true,
        }
    }

    /// `ToNumber` for primitives; objects need the interpreter
    pub fn primitive_to_number(&self) -> Option<f64> {
        match self {
            JsValue::Undefined => Some(f64::NAN),
            JsValue::Null => Some(0.0),
            JsValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            JsValue::Int(i) => Some(*i as f64),
            JsValue::Float(f) => Some(*f),
            JsValue::String(s) => Some(number::string_to_number(s)),
            JsValue::Symbol(_) | JsValue::Object(_) => None,
        }
    }

    /// `ToString` for primitives other than symbols
    pub fn primitive_to_string(&self) -> Option<JsString> {
        match self {
            JsValue::Undefined => Some(JsString::from("undefined")),
            JsValue::Null => Some(JsString::from("null")),
            JsValue::Bool(true) => Some(JsString::from("true")),
            JsValue::Bool(false) => Some(JsString::from("false")),
            JsValue::Int(i) => Some(JsString::from(i.to_string())),
            JsValue::Float(f) => Some(number::number_to_js_string(*f)),
            JsValue::String(s) => Some(s.clone()),
            JsValue::Symbol(_) | JsValue::Object(_) => None,
        }
    }

    /// Short human-readable rendering for diagnostics
    pub fn display_hint(&self) -> String {
        match self {
            JsValue::String(s) => s.to_std_string(),
            JsValue::Symbol(s) => s.descriptive_string().to_std_string(),
            JsValue::Object(o) => format!("[object {}]", o.borrow().class_name()),
            other => other
                .primitive_to_string()
                .map(|s| s.to_std_string())
                .unwrap_or_default(),
        }
    }

    /// SameValue: NaN equals NaN, +0 differs from -0
    pub fn same_value(&self, other: &JsValue) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b && a.is_sign_negative() == b.is_sign_negative()
                }
            }
            _ => self.same_non_number(other),
        }
    }

    /// SameValueZero: NaN equals NaN, +0 equals -0
    pub fn same_value_zero(&self, other: &JsValue) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => (a.is_nan() && b.is_nan()) || a == b,
            _ => self.same_non_number(other),
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Int(a), JsValue::Int(b)) => a == b,
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => self.same_non_number(other),
            },
        }
    }

    fn same_non_number(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) | (JsValue::Null, JsValue::Null) => true,
            (JsValue::Bool(a), JsValue::Bool(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Symbol(a), JsValue::Symbol(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Bool(b) => write!(f, "{b}"),
            JsValue::Int(i) => write!(f, "{i}"),
            JsValue::Float(n) => write!(f, "{}", number::number_to_string(*n)),
            JsValue::String(s) => write!(f, "{s:?}"),
            JsValue::Symbol(s) => write!(f, "{s:?}"),
            JsValue::Object(o) => match o.try_borrow() {
                Some(obj) => write!(f, "[object {}]", obj.class_name()),
                None => write!(f, "[object]"),
            },
        }
    }
}

/// Equality is SameValue so tests can compare against `JsValue::number(...)`
impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Bool(b)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::number(n)
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        JsValue::Int(n as i64)
    }
}

impl From<u32> for JsValue {
    fn from(n: u32) -> Self {
        JsValue::Int(n as i64)
    }
}

impl From<i64> for JsValue {
    fn from(n: i64) -> Self {
        JsValue::int(n)
    }
}

impl From<usize> for JsValue {
    fn from(n: usize) -> Self {
        JsValue::int(n as i64)
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<JsString> for JsValue {
    fn from(s: JsString) -> Self {
        JsValue::String(s)
    }
}

impl From<JsSymbol> for JsValue {
    fn from(s: JsSymbol) -> Self {
        JsValue::Symbol(s)
    }
}

impl From<JsObjectRef> for JsValue {
    fn from(o: JsObjectRef) -> Self {
        JsValue::Object(o)
    }
}

impl From<Option<JsObjectRef>> for JsValue {
    fn from(o: Option<JsObjectRef>) -> Self {
        match o {
            Some(o) => JsValue::Object(o),
            None => JsValue::Null,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Property keys
// ═══════════════════════════════════════════════════════════════════════════════

/// A property key. Canonical array-index strings are always stored as `Index`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Index(u32),
    String(JsString),
    Symbol(JsSymbol),
}

impl PropertyKey {
    pub fn is_symbol(&self) -> bool {
        matches!(self, PropertyKey::Symbol(_))
    }

    pub fn is_index(&self) -> bool {
        matches!(self, PropertyKey::Index(_))
    }

    pub fn as_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Index(i) => Some(*i),
            _ => None,
        }
    }

    /// Compare against a plain string key
    pub fn eq_str(&self, s: &str) -> bool {
        match self {
            PropertyKey::String(js) => *js == *s,
            _ => false,
        }
    }

    /// The key as a string value (symbols excluded)
    pub fn to_js_string(&self) -> Option<JsString> {
        match self {
            PropertyKey::Index(i) => Some(JsString::from(i.to_string())),
            PropertyKey::String(s) => Some(s.clone()),
            PropertyKey::Symbol(_) => None,
        }
    }

    /// The key as a script value
    pub fn to_value(&self) -> JsValue {
        match self {
            PropertyKey::Index(i) => JsValue::String(JsString::from(i.to_string())),
            PropertyKey::String(s) => JsValue::String(s.clone()),
            PropertyKey::Symbol(s) => JsValue::Symbol(s.clone()),
        }
    }

    /// Function name derived from this key (`[desc]` for symbols)
    pub fn function_name(&self) -> JsString {
        match self {
            PropertyKey::Symbol(s) => match s.description() {
                Some(d) => JsString::from("[").concat(d).concat(&JsString::from("]")),
                None => JsString::empty(),
            },
            other => other.to_js_string().unwrap_or_default(),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::from(JsString::from(s))
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        PropertyKey::from(JsString::from(s))
    }
}

impl From<JsString> for PropertyKey {
    fn from(s: JsString) -> Self {
        match s.to_array_index() {
            Some(i) => PropertyKey::Index(i),
            None => PropertyKey::String(s),
        }
    }
}

impl From<&JsString> for PropertyKey {
    fn from(s: &JsString) -> Self {
        PropertyKey::from(s.clone())
    }
}

impl From<u32> for PropertyKey {
    fn from(i: u32) -> Self {
        if i == u32::MAX {
            PropertyKey::String(JsString::from(i.to_string()))
        } else {
            PropertyKey::Index(i)
        }
    }
}

impl From<usize> for PropertyKey {
    fn from(i: usize) -> Self {
        match u32::try_from(i) {
            Ok(i) => PropertyKey::from(i),
            Err(_) => PropertyKey::String(JsString::from(i.to_string())),
        }
    }
}

impl From<JsSymbol> for PropertyKey {
    fn from(s: JsSymbol) -> Self {
        PropertyKey::Symbol(s)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Index(i) => write!(f, "{i}"),
            PropertyKey::String(s) => write!(f, "{s}"),
            PropertyKey::Symbol(s) => write!(f, "{}", s.descriptive_string()),
        }
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
