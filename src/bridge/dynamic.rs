//! Host-implemented objects.
//!
//! A dynamic object forwards every property operation on string keys to a
//! host handler. Symbol keys and anything the handler does not know about
//! fall back to ordinary own properties of the wrapper. Handlers may reject
//! writes by returning `false`; strict-mode code then sees a `TypeError`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::JsValue;

/// Handler for a synthetic object bound to one runtime
pub trait DynamicObject {
    fn get(&self, key: &str) -> Option<JsValue>;
    /// `false` rejects the write
    fn set(&self, key: &str, value: JsValue) -> bool;
    fn has(&self, key: &str) -> bool;
    fn delete(&self, key: &str) -> bool;
    /// Own keys in enumeration order
    fn keys(&self) -> Vec<String>;
}

/// Handler for a synthetic array. Scripts see `length` and the indices
/// below it; `Array.isArray` is true for these.
pub trait DynamicArray {
    fn len(&self) -> usize;
    /// `None` for holes
    fn get(&self, index: usize) -> Option<JsValue>;
    fn set(&self, index: usize, value: JsValue) -> bool;
    fn set_len(&self, len: usize) -> bool;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handler that may be used from several runtimes at once.
///
/// Values cross as JSON, so no runtime-specific object ever reaches the
/// handler. Implementations synchronize themselves.
pub trait SharedDynamicObject: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;
    fn set(&self, key: &str, value: serde_json::Value) -> bool;
    fn has(&self, key: &str) -> bool;
    fn delete(&self, key: &str) -> bool;
    fn keys(&self) -> Vec<String>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Host arrays
// ═══════════════════════════════════════════════════════════════════════════════

/// Element type a `HostArray` can hold
pub trait HostElement: Clone + Default {
    fn to_js(&self) -> JsValue;
    /// `None` rejects the value
    fn from_js(value: &JsValue) -> Option<Self>;
}

impl HostElement for f64 {
    fn to_js(&self) -> JsValue {
        JsValue::number(*self)
    }

    fn from_js(value: &JsValue) -> Option<Self> {
        value.as_number()
    }
}

impl HostElement for i64 {
    fn to_js(&self) -> JsValue {
        JsValue::int(*self)
    }

    fn from_js(value: &JsValue) -> Option<Self> {
        match value {
            JsValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl HostElement for i32 {
    fn to_js(&self) -> JsValue {
        JsValue::from(*self)
    }

    fn from_js(value: &JsValue) -> Option<Self> {
        match value {
            JsValue::Int(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl HostElement for bool {
    fn to_js(&self) -> JsValue {
        JsValue::Bool(*self)
    }

    fn from_js(value: &JsValue) -> Option<Self> {
        match value {
            JsValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl HostElement for String {
    fn to_js(&self) -> JsValue {
        JsValue::from(self.as_str())
    }

    fn from_js(value: &JsValue) -> Option<Self> {
        value.as_string().map(|s| s.to_std_string())
    }
}

/// A `Vec` shared between the host and scripts.
///
/// Writes from scripts land in the host vector and host changes are seen on
/// the next script read. Writing past the end grows the vector, filling the
/// gap with `T::default()`. Values of the wrong type are rejected.
#[derive(Clone, Default)]
pub struct HostArray<T> {
    items: Rc<RefCell<Vec<T>>>,
}

impl<T: HostElement> HostArray<T> {
    pub fn new(items: Vec<T>) -> Self {
        HostArray {
            items: Rc::new(RefCell::new(items)),
        }
    }

    /// Snapshot of the current contents
    pub fn to_vec(&self) -> Vec<T> {
        self.items.borrow().clone()
    }

    pub fn push(&self, item: T) {
        self.items.borrow_mut().push(item);
    }

    /// The shared storage
    pub fn items(&self) -> Rc<RefCell<Vec<T>>> {
        self.items.clone()
    }
}

impl<T: HostElement> DynamicArray for HostArray<T> {
    fn len(&self) -> usize {
        self.items.borrow().len()
    }

    fn get(&self, index: usize) -> Option<JsValue> {
        self.items.borrow().get(index).map(HostElement::to_js)
    }

    fn set(&self, index: usize, value: JsValue) -> bool {
        let Some(item) = T::from_js(&value) else {
            return false;
        };
        let mut items = self.items.borrow_mut();
        if index >= items.len() {
            items.resize(index + 1, T::default());
        }
        match items.get_mut(index) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }

    fn set_len(&self, len: usize) -> bool {
        self.items.borrow_mut().resize(len, T::default());
        true
    }
}
