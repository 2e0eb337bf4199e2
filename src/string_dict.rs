//! String dictionary for deduplicating JsString instances.
//!
//! The compiler interns identifiers and property names through one of these,
//! and every runtime keeps one for the keys its builtins look up, so equal
//! names usually share storage and compare by pointer.

use rustc_hash::FxHashMap;

use crate::string::JsString;
use crate::value::CheapClone;

/// A dictionary for deduplicating JsString instances.
pub struct StringDict {
    strings: FxHashMap<JsString, ()>,
    lookup: FxHashMap<Box<str>, JsString>,
}

impl StringDict {
    pub fn new() -> Self {
        Self {
            strings: FxHashMap::default(),
            lookup: FxHashMap::default(),
        }
    }

    /// Create a dictionary pre-populated with common strings.
    pub fn with_common_strings() -> Self {
        let mut dict = Self::new();
        for s in COMMON_STRINGS {
            dict.get_or_insert(s);
        }
        dict
    }

    /// Get an existing string or insert a new one.
    pub fn get_or_insert(&mut self, s: &str) -> JsString {
        if let Some(existing) = self.lookup.get(s) {
            return existing.cheap_clone();
        }
        let js_str = self.intern(JsString::from(s));
        self.lookup.insert(s.into(), js_str.cheap_clone());
        js_str
    }

    /// Intern a string built elsewhere, returning the shared instance
    pub fn intern(&mut self, js_str: JsString) -> JsString {
        if let Some((existing, _)) = self.strings.get_key_value(&js_str) {
            return existing.cheap_clone();
        }
        self.strings.insert(js_str.cheap_clone(), ());
        js_str
    }

    pub fn get(&self, s: &str) -> Option<JsString> {
        self.lookup.get(s).map(|s| s.cheap_clone())
    }

    /// Number of unique strings in the dictionary.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringDict {
    fn default() -> Self {
        Self::new()
    }
}

/// Names the builtins and typical scripts look up constantly
const COMMON_STRINGS: &[&str] = &[
    "length",
    "prototype",
    "constructor",
    "__proto__",
    "name",
    "message",
    "stack",
    "cause",
    "value",
    "writable",
    "enumerable",
    "configurable",
    "get",
    "set",
    "toString",
    "valueOf",
    "toJSON",
    "next",
    "done",
    "return",
    "throw",
    "then",
    "callee",
    "lastIndex",
    "index",
    "input",
    "groups",
    "raw",
    "join",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicates() {
        let mut dict = StringDict::new();
        let s1 = dict.get_or_insert("hello");
        let s2 = dict.get_or_insert("hello");
        assert_eq!(s1, s2);
        assert!(s1.ptr_eq(&s2));
    }

    #[test]
    fn intern_matches_lookup() {
        let mut dict = StringDict::new();
        let a = dict.get_or_insert("key");
        let b = dict.intern(JsString::from("key"));
        assert!(a.ptr_eq(&b));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn common_strings_preloaded() {
        let dict = StringDict::with_common_strings();
        assert!(dict.get("length").is_some());
        assert!(dict.get("prototype").is_some());
        assert!(!dict.is_empty());
    }
}
