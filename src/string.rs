//! Engine string type
//!
//! Strings are immutable sequences of UTF-16 code units. Strings whose units
//! are all ASCII are stored one byte per unit; everything else is stored as
//! `u16`. The representation is canonical: a string with any unit above 0x7F
//! is always `Utf16`, so equal strings always share a representation.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An immutable, cheaply clonable engine string.
#[derive(Clone)]
pub struct JsString(Repr);

#[derive(Clone)]
enum Repr {
    Ascii(Arc<[u8]>),
    Utf16(Arc<[u16]>),
}

impl JsString {
    /// The empty string
    pub fn empty() -> Self {
        JsString(Repr::Ascii(Arc::from(&[][..])))
    }

    /// Build a string from UTF-16 code units
    pub fn from_utf16(units: &[u16]) -> Self {
        if units.iter().all(|&u| u < 0x80) {
            let bytes: Vec<u8> = units.iter().map(|&u| u as u8).collect();
            JsString(Repr::Ascii(Arc::from(bytes)))
        } else {
            JsString(Repr::Utf16(Arc::from(units)))
        }
    }

    /// Build a string from an owned vector of UTF-16 code units
    pub fn from_utf16_vec(units: Vec<u16>) -> Self {
        if units.iter().all(|&u| u < 0x80) {
            let bytes: Vec<u8> = units.iter().map(|&u| u as u8).collect();
            JsString(Repr::Ascii(Arc::from(bytes)))
        } else {
            JsString(Repr::Utf16(Arc::from(units)))
        }
    }

    /// Build a string holding a single code point
    pub fn from_code_point(cp: u32) -> Self {
        let mut b = JsStringBuilder::new();
        b.push_code_point(cp);
        b.finish()
    }

    /// Length in UTF-16 code units
    pub fn len(&self) -> usize {
        match &self.0 {
            Repr::Ascii(b) => b.len(),
            Repr::Utf16(u) => u.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_ascii(&self) -> bool {
        matches!(self.0, Repr::Ascii(_))
    }

    /// The string as `&str`, available only for ASCII strings
    pub fn as_ascii_str(&self) -> Option<&str> {
        match &self.0 {
            Repr::Ascii(b) => std::str::from_utf8(b).ok(),
            Repr::Utf16(_) => None,
        }
    }

    /// Code unit at `index`
    pub fn code_unit_at(&self, index: usize) -> Option<u16> {
        match &self.0 {
            Repr::Ascii(b) => b.get(index).map(|&c| c as u16),
            Repr::Utf16(u) => u.get(index).copied(),
        }
    }

    /// Code point starting at `index`; a lone surrogate is returned as is
    pub fn code_point_at(&self, index: usize) -> Option<u32> {
        let first = self.code_unit_at(index)?;
        if is_high_surrogate(first) {
            if let Some(second) = self.code_unit_at(index + 1) {
                if is_low_surrogate(second) {
                    return Some(combine_surrogates(first, second));
                }
            }
        }
        Some(first as u32)
    }

    /// Iterate over code units
    pub fn units(&self) -> CodeUnits<'_> {
        match &self.0 {
            Repr::Ascii(b) => CodeUnits::Ascii(b.iter()),
            Repr::Utf16(u) => CodeUnits::Utf16(u.iter()),
        }
    }

    /// Iterate over code points, decoding surrogate pairs
    pub fn code_points(&self) -> CodePoints<'_> {
        CodePoints {
            string: self,
            index: 0,
        }
    }

    /// Copy out the code units
    pub fn to_utf16(&self) -> Vec<u16> {
        self.units().collect()
    }

    /// Substring over the code-unit range `[start, end)`, clamped to the string
    pub fn substring(&self, start: usize, end: usize) -> JsString {
        let len = self.len();
        let end = end.min(len);
        let start = start.min(end);
        if start == 0 && end == len {
            return self.clone();
        }
        match &self.0 {
            Repr::Ascii(b) => {
                let slice = b.get(start..end).unwrap_or(&[]);
                JsString(Repr::Ascii(Arc::from(slice)))
            }
            Repr::Utf16(u) => JsString::from_utf16(u.get(start..end).unwrap_or(&[])),
        }
    }

    /// Concatenate two strings
    pub fn concat(&self, other: &JsString) -> JsString {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        match (&self.0, &other.0) {
            (Repr::Ascii(a), Repr::Ascii(b)) => {
                let mut bytes = Vec::with_capacity(a.len() + b.len());
                bytes.extend_from_slice(a);
                bytes.extend_from_slice(b);
                JsString(Repr::Ascii(Arc::from(bytes)))
            }
            _ => {
                let mut units = Vec::with_capacity(self.len() + other.len());
                units.extend(self.units());
                units.extend(other.units());
                JsString(Repr::Utf16(Arc::from(units)))
            }
        }
    }

    /// Does `needle` occur at code-unit offset `pos`?
    pub fn matches_at(&self, needle: &JsString, pos: usize) -> bool {
        if pos + needle.len() > self.len() {
            return false;
        }
        needle
            .units()
            .enumerate()
            .all(|(i, u)| self.code_unit_at(pos + i) == Some(u))
    }

    /// First occurrence of `needle` at or after `from`
    pub fn index_of(&self, needle: &JsString, from: usize) -> Option<usize> {
        let len = self.len();
        let nlen = needle.len();
        if nlen == 0 {
            return (from <= len).then_some(from.min(len));
        }
        if nlen > len {
            return None;
        }
        (from..=len - nlen).find(|&i| self.matches_at(needle, i))
    }

    /// Last occurrence of `needle` starting at or before `from`
    pub fn last_index_of(&self, needle: &JsString, from: usize) -> Option<usize> {
        let len = self.len();
        let nlen = needle.len();
        if nlen > len {
            return None;
        }
        let start = from.min(len - nlen);
        (0..=start).rev().find(|&i| self.matches_at(needle, i))
    }

    pub fn starts_with(&self, prefix: &JsString) -> bool {
        self.matches_at(prefix, 0)
    }

    pub fn contains_unit(&self, unit: u16) -> bool {
        self.units().any(|u| u == unit)
    }

    /// Repeat the string `count` times
    pub fn repeat(&self, count: usize) -> JsString {
        match &self.0 {
            Repr::Ascii(b) => JsString(Repr::Ascii(Arc::from(b.repeat(count)))),
            Repr::Utf16(u) => JsString(Repr::Utf16(Arc::from(u.repeat(count)))),
        }
    }

    /// Strip ECMAScript whitespace and line terminators
    pub fn trim(&self) -> JsString {
        self.trim_start().trim_end()
    }

    pub fn trim_start(&self) -> JsString {
        let start = self
            .units()
            .position(|u| !is_js_whitespace(u))
            .unwrap_or(self.len());
        self.substring(start, self.len())
    }

    pub fn trim_end(&self) -> JsString {
        let units = self.to_utf16();
        let end = units
            .iter()
            .rposition(|&u| !is_js_whitespace(u))
            .map_or(0, |p| p + 1);
        self.substring(0, end)
    }

    /// True when every surrogate is part of a pair
    pub fn is_well_formed(&self) -> bool {
        self.code_points().all(|cp| !(0xD800..=0xDFFF).contains(&cp))
    }

    /// Replace lone surrogates with U+FFFD
    pub fn to_well_formed(&self) -> JsString {
        if self.is_well_formed() {
            return self.clone();
        }
        let mut b = JsStringBuilder::with_capacity(self.len());
        for cp in self.code_points() {
            if (0xD800..=0xDFFF).contains(&cp) {
                b.push_code_point(0xFFFD);
            } else {
                b.push_code_point(cp);
            }
        }
        b.finish()
    }

    pub fn to_lowercase(&self) -> JsString {
        match &self.0 {
            Repr::Ascii(b) => JsString(Repr::Ascii(Arc::from(b.to_ascii_lowercase()))),
            Repr::Utf16(_) => self.map_chars(|s| s.to_lowercase()),
        }
    }

    pub fn to_uppercase(&self) -> JsString {
        match &self.0 {
            Repr::Ascii(b) => JsString(Repr::Ascii(Arc::from(b.to_ascii_uppercase()))),
            Repr::Utf16(_) => self.map_chars(|s| s.to_uppercase()),
        }
    }

    /// Apply a `str` transform to each well-formed run, keeping lone surrogates
    fn map_chars(&self, f: impl Fn(&str) -> String) -> JsString {
        let mut b = JsStringBuilder::with_capacity(self.len());
        let mut run = String::new();
        for cp in self.code_points() {
            match char::from_u32(cp) {
                Some(c) => run.push(c),
                None => {
                    b.push_str(&f(&run));
                    run.clear();
                    b.push_unit(cp as u16);
                }
            }
        }
        b.push_str(&f(&run));
        b.finish()
    }

    /// Parse as a canonical array index (`0` .. `2^32 - 2`)
    pub fn to_array_index(&self) -> Option<u32> {
        let len = self.len();
        if len == 0 || len > 10 {
            return None;
        }
        let mut value: u64 = 0;
        for (i, u) in self.units().enumerate() {
            if !(0x30..=0x39).contains(&u) {
                return None;
            }
            if i == 0 && u == 0x30 && len > 1 {
                return None;
            }
            value = value * 10 + (u - 0x30) as u64;
        }
        if value < u32::MAX as u64 {
            Some(value as u32)
        } else {
            None
        }
    }

    /// Pointer identity
    pub fn ptr_eq(&self, other: &JsString) -> bool {
        match (&self.0, &other.0) {
            (Repr::Ascii(a), Repr::Ascii(b)) => Arc::ptr_eq(a, b),
            (Repr::Utf16(a), Repr::Utf16(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Lossy conversion to a Rust string (lone surrogates become U+FFFD)
    pub fn to_std_string(&self) -> String {
        match &self.0 {
            Repr::Ascii(b) => b.iter().map(|&c| c as char).collect(),
            Repr::Utf16(u) => char::decode_utf16(u.iter().copied())
                .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect(),
        }
    }

    /// Lexicographic comparison by code unit
    pub fn cmp_units(&self, other: &JsString) -> Ordering {
        match (&self.0, &other.0) {
            (Repr::Ascii(a), Repr::Ascii(b)) => a.cmp(b),
            _ => self.units().cmp(other.units()),
        }
    }
}

impl Default for JsString {
    fn default() -> Self {
        JsString::empty()
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        if s.is_ascii() {
            JsString(Repr::Ascii(Arc::from(s.as_bytes())))
        } else {
            let units: Vec<u16> = s.encode_utf16().collect();
            JsString(Repr::Utf16(Arc::from(units)))
        }
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString::from(s.as_str())
    }
}

impl From<&String> for JsString {
    fn from(s: &String) -> Self {
        JsString::from(s.as_str())
    }
}

impl From<char> for JsString {
    fn from(c: char) -> Self {
        JsString::from_code_point(c as u32)
    }
}

impl PartialEq for JsString {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Repr::Ascii(a), Repr::Ascii(b)) => a == b,
            (Repr::Utf16(a), Repr::Utf16(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for JsString {}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        match &self.0 {
            Repr::Ascii(b) => &**b == other.as_bytes(),
            Repr::Utf16(u) => u.iter().copied().eq(other.encode_utf16()),
        }
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl Hash for JsString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Repr::Ascii(b) => b.hash(state),
            Repr::Utf16(u) => u.hash(state),
        }
    }
}

impl PartialOrd for JsString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for JsString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_units(other)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_ascii_str() {
            Some(s) => f.write_str(s),
            None => f.write_str(&self.to_std_string()),
        }
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_std_string())
    }
}

/// Iterator over the code units of a [`JsString`]
pub enum CodeUnits<'a> {
    Ascii(std::slice::Iter<'a, u8>),
    Utf16(std::slice::Iter<'a, u16>),
}

impl Iterator for CodeUnits<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        match self {
            CodeUnits::Ascii(it) => it.next().map(|&b| b as u16),
            CodeUnits::Utf16(it) => it.next().copied(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            CodeUnits::Ascii(it) => it.size_hint(),
            CodeUnits::Utf16(it) => it.size_hint(),
        }
    }
}

impl DoubleEndedIterator for CodeUnits<'_> {
    fn next_back(&mut self) -> Option<u16> {
        match self {
            CodeUnits::Ascii(it) => it.next_back().map(|&b| b as u16),
            CodeUnits::Utf16(it) => it.next_back().copied(),
        }
    }
}

/// Iterator over the code points of a [`JsString`]
pub struct CodePoints<'a> {
    string: &'a JsString,
    index: usize,
}

impl CodePoints<'_> {
    /// Code-unit offset of the next code point
    pub fn position(&self) -> usize {
        self.index
    }
}

impl Iterator for CodePoints<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let cp = self.string.code_point_at(self.index)?;
        self.index += if cp > 0xFFFF { 2 } else { 1 };
        Some(cp)
    }
}

/// Incremental string construction
#[derive(Debug, Default, Clone)]
pub struct JsStringBuilder {
    units: Vec<u16>,
}

impl JsStringBuilder {
    pub fn new() -> Self {
        Self { units: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            units: Vec::with_capacity(cap),
        }
    }

    pub fn push_unit(&mut self, unit: u16) {
        self.units.push(unit);
    }

    pub fn push_char(&mut self, c: char) {
        let mut buf = [0u16; 2];
        self.units.extend_from_slice(c.encode_utf16(&mut buf));
    }

    pub fn push_code_point(&mut self, cp: u32) {
        if cp > 0xFFFF {
            let c = cp - 0x10000;
            self.units.push(0xD800 + (c >> 10) as u16);
            self.units.push(0xDC00 + (c & 0x3FF) as u16);
        } else {
            self.units.push(cp as u16);
        }
    }

    pub fn push_str(&mut self, s: &str) {
        self.units.extend(s.encode_utf16());
    }

    pub fn push_js(&mut self, s: &JsString) {
        self.units.extend(s.units());
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn finish(self) -> JsString {
        JsString::from_utf16_vec(self.units)
    }
}

pub fn is_high_surrogate(u: u16) -> bool {
    (0xD800..=0xDBFF).contains(&u)
}

pub fn is_low_surrogate(u: u16) -> bool {
    (0xDC00..=0xDFFF).contains(&u)
}

pub fn combine_surrogates(high: u16, low: u16) -> u32 {
    0x10000 + (((high as u32) - 0xD800) << 10) + ((low as u32) - 0xDC00)
}

/// ECMAScript WhiteSpace or LineTerminator
pub fn is_js_whitespace(u: u16) -> bool {
    matches!(
        u,
        0x09 | 0x0A
            | 0x0B
            | 0x0C
            | 0x0D
            | 0x20
            | 0xA0
            | 0x1680
            | 0x2000..=0x200A
            | 0x2028
            | 0x2029
            | 0x202F
            | 0x205F
            | 0x3000
            | 0xFEFF
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_and_utf16_are_canonical() {
        let a = JsString::from("abc");
        let b = JsString::from_utf16(&[0x61, 0x62, 0x63]);
        assert!(a.is_ascii());
        assert!(b.is_ascii());
        assert_eq!(a, b);
        assert!(!JsString::from("héllo").is_ascii());
    }

    #[test]
    fn indexing_is_by_code_unit() {
        let s = JsString::from("a😀b");
        assert_eq!(s.len(), 4);
        assert_eq!(s.code_unit_at(1), Some(0xD83D));
        assert_eq!(s.code_point_at(1), Some(0x1F600));
        assert_eq!(s.code_points().count(), 3);
        assert_eq!(s.substring(3, 4), JsString::from("b"));
    }

    #[test]
    fn lone_surrogates_survive() {
        let s = JsString::from_utf16(&[0xD800, 0x41]);
        assert!(!s.is_well_formed());
        assert_eq!(s.to_well_formed().to_std_string(), "\u{FFFD}A");
        assert_eq!(s.to_uppercase().code_unit_at(0), Some(0xD800));
    }

    #[test]
    fn search_and_trim() {
        let s = JsString::from("  hello world \n");
        let t = s.trim();
        assert_eq!(t, JsString::from("hello world"));
        assert_eq!(t.index_of(&JsString::from("o"), 0), Some(4));
        assert_eq!(t.last_index_of(&JsString::from("o"), t.len()), Some(7));
        assert_eq!(t.index_of(&JsString::from("zz"), 0), None);
    }

    #[test]
    fn array_index_parsing() {
        assert_eq!(JsString::from("0").to_array_index(), Some(0));
        assert_eq!(JsString::from("42").to_array_index(), Some(42));
        assert_eq!(JsString::from("042").to_array_index(), None);
        assert_eq!(JsString::from("4294967295").to_array_index(), None);
        assert_eq!(JsString::from("4294967294").to_array_index(), Some(4294967294));
        assert_eq!(JsString::from("-1").to_array_index(), None);
    }

    #[test]
    fn ordering_by_code_unit() {
        assert!(JsString::from("a") < JsString::from("b"));
        assert!(JsString::from("Z") < JsString::from("a"));
        assert!(JsString::from("\u{FF61}") > JsString::from("😀"));
    }
}
