//! Iterator prototypes and the built-in iterator objects
//!
//! Array, string and regexp-match iterators keep their position in a
//! boxed state on the iterator object. `for-in` enumeration uses the same
//! mechanism with an iterator that is never exposed to scripts.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::error::JsError;
use crate::gc::Tracer;
use crate::object::{JsObject, JsObjectRef, ObjectKind};
use crate::string::JsString;
use crate::value::{JsSymbol, JsValue, PropertyKey};

use super::promise::{self, ReactionHandler};
use super::{arg, capture, typed_array};
use crate::interpreter::Interpreter;
use crate::interpreter::ops::{EnumKind, IteratorRecord};
use crate::interpreter::realm::Intrinsic;

// ═══════════════════════════════════════════════════════════════════════════════
// State
// ═══════════════════════════════════════════════════════════════════════════════

/// `%ArrayIterator%` state; `object` is dropped once exhausted
pub struct ArrayIteratorState {
    pub object: Option<JsObjectRef>,
    pub index: u64,
    pub kind: EnumKind,
}

impl ArrayIteratorState {
    pub fn trace(&self, t: &mut Tracer<'_>) {
        t.object(&self.object);
    }
}

/// `%StringIterator%` state, walking code points
pub struct StringIteratorState {
    pub string: Option<JsString>,
    pub position: usize,
}

/// `%RegExpStringIterator%` state used by `matchAll`
pub struct RegExpStringIteratorState {
    pub regexp: JsObjectRef,
    pub string: JsString,
    pub global: bool,
    pub unicode: bool,
    pub done: bool,
}

impl RegExpStringIteratorState {
    pub fn trace(&self, t: &mut Tracer<'_>) {
        t.edge(&self.regexp);
    }
}

/// `for-in` enumeration over an object and its prototype chain
pub struct ForInState {
    /// Object whose keys are being visited; `None` once the chain ends
    pub object: Option<JsObjectRef>,
    pub keys: VecDeque<JsString>,
    pub visited: FxHashSet<JsString>,
    pub started: bool,
}

impl ForInState {
    pub fn trace(&self, t: &mut Tracer<'_>) {
        t.object(&self.object);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// %IteratorPrototype% and %AsyncIteratorPrototype%
// ═══════════════════════════════════════════════════════════════════════════════

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::IteratorPrototype).is_some() {
        return;
    }
    let proto = interp.create_object();
    interp.register_symbol_method(&proto, JsSymbol::iterator(), return_this, 0);
    interp.realm.set(Intrinsic::IteratorPrototype, proto);

    let async_proto = interp.create_object();
    interp.register_symbol_method(&async_proto, JsSymbol::async_iterator(), return_this, 0);
    interp.realm.set(Intrinsic::AsyncIteratorPrototype, async_proto);
}

fn return_this(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(this)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Array iterators
// ═══════════════════════════════════════════════════════════════════════════════

/// Build `%ArrayIteratorPrototype%`; `array::init` calls this
pub(crate) fn init_array_iterator(interp: &mut Interpreter) {
    let parent = interp.intrinsic(Intrinsic::IteratorPrototype);
    let proto = interp.create_object_with_proto(Some(parent));
    let next = interp.create_native_function("next", array_iterator_next, 0);
    interp.register_value(&proto, "next", JsValue::Object(next.clone()));
    super::set_to_string_tag(&proto, "Array Iterator");
    interp.realm.set(Intrinsic::ArrayIteratorPrototype, proto);
    interp.realm.set(Intrinsic::ArrayIteratorNext, next);
}

/// `CreateArrayIterator`
pub(crate) fn create_array_iterator(interp: &mut Interpreter, object: JsObjectRef, kind: EnumKind) -> JsValue {
    let proto = interp.intrinsic(Intrinsic::ArrayIteratorPrototype);
    let state = ArrayIteratorState {
        object: Some(object),
        index: 0,
        kind,
    };
    JsValue::Object(interp.alloc(JsObject::new(ObjectKind::ArrayIterator(Box::new(state)), Some(proto))))
}

/// %ArrayIteratorPrototype%.next
fn array_iterator_next(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let JsValue::Object(iter) = &this else {
        return Err(JsError::type_error("next method called on incompatible receiver"));
    };
    let (object, index, kind) = match &iter.borrow().kind {
        ObjectKind::ArrayIterator(state) => (state.object.clone(), state.index, state.kind),
        _ => return Err(JsError::type_error("next method called on incompatible receiver")),
    };
    let Some(object) = object else {
        return Ok(interp.create_iter_result(JsValue::Undefined, true));
    };

    let typed_len = match &object.borrow().kind {
        ObjectKind::TypedArray(_) => Some(typed_array::element_count(&object.borrow())),
        _ => None,
    };
    let len = match typed_len {
        Some(len) => len as u64,
        None => interp.length_of_array_like(&object)?,
    };

    if index >= len {
        if let ObjectKind::ArrayIterator(state) = &mut iter.borrow_mut().kind {
            state.object = None;
        }
        return Ok(interp.create_iter_result(JsValue::Undefined, true));
    }
    if let ObjectKind::ArrayIterator(state) = &mut iter.borrow_mut().kind {
        state.index = index + 1;
    }

    let key = PropertyKey::from(index as usize);
    let result = match kind {
        EnumKind::Keys => JsValue::number(index as f64),
        EnumKind::Values => interp.get(&object, &key)?,
        EnumKind::Entries => {
            let value = interp.get(&object, &key)?;
            let pair = interp.create_array(vec![JsValue::number(index as f64), value]);
            JsValue::Object(pair)
        }
    };
    Ok(interp.create_iter_result(result, false))
}

// ═══════════════════════════════════════════════════════════════════════════════
// String iterators
// ═══════════════════════════════════════════════════════════════════════════════

/// Build `%StringIteratorPrototype%`; `string::init` calls this
pub(crate) fn init_string_iterator(interp: &mut Interpreter) {
    let parent = interp.intrinsic(Intrinsic::IteratorPrototype);
    let proto = interp.create_object_with_proto(Some(parent));
    interp.register_method(&proto, "next", string_iterator_next, 0);
    super::set_to_string_tag(&proto, "String Iterator");
    interp.realm.set(Intrinsic::StringIteratorPrototype, proto);
}

pub(crate) fn create_string_iterator(interp: &mut Interpreter, string: JsString) -> JsValue {
    let proto = interp.intrinsic(Intrinsic::StringIteratorPrototype);
    let state = StringIteratorState {
        string: Some(string),
        position: 0,
    };
    JsValue::Object(interp.alloc(JsObject::new(ObjectKind::StringIterator(Box::new(state)), Some(proto))))
}

/// %StringIteratorPrototype%.next
fn string_iterator_next(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let JsValue::Object(iter) = &this else {
        return Err(JsError::type_error("next method called on incompatible receiver"));
    };
    let step = {
        let mut o = iter.borrow_mut();
        let ObjectKind::StringIterator(state) = &mut o.kind else {
            return Err(JsError::type_error("next method called on incompatible receiver"));
        };
        match &state.string {
            Some(s) if state.position < s.len() => {
                let start = state.position;
                let width = match s.code_point_at(start) {
                    Some(cp) if cp > 0xFFFF => 2,
                    _ => 1,
                };
                state.position = start + width;
                Some(s.substring(start, start + width))
            }
            _ => {
                state.string = None;
                None
            }
        }
    };
    Ok(match step {
        Some(s) => interp.create_iter_result(JsValue::String(s), false),
        None => interp.create_iter_result(JsValue::Undefined, true),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// for-in
// ═══════════════════════════════════════════════════════════════════════════════

/// Iterator object driving a `for (k in v)` loop
pub(crate) fn create_for_in_iterator(interp: &mut Interpreter, value: &JsValue) -> Result<JsObjectRef, JsError> {
    let object = if value.is_nullish() {
        None
    } else {
        Some(interp.to_object(value)?)
    };
    let state = ForInState {
        object,
        keys: VecDeque::new(),
        visited: FxHashSet::default(),
        started: false,
    };
    Ok(interp.alloc(JsObject::new(ObjectKind::ForInIterator(Box::new(state)), None)))
}

fn with_for_in<R>(iter: &JsObjectRef, f: impl FnOnce(&mut ForInState) -> R) -> Option<R> {
    match &mut iter.borrow_mut().kind {
        ObjectKind::ForInIterator(state) => Some(f(state)),
        _ => None,
    }
}

/// Next enumerable string key, walking up the prototype chain. Keys
/// deleted before they are reached are skipped; shadowed keys are visited
/// once.
pub(crate) fn for_in_next(interp: &mut Interpreter, iter: &JsObjectRef) -> Result<Option<JsValue>, JsError> {
    loop {
        let Some(Some(object)) = with_for_in(iter, |s| s.object.clone()) else {
            return Ok(None);
        };
        let key = with_for_in(iter, |s| s.keys.pop_front()).flatten();
        let Some(key) = key else {
            let started = with_for_in(iter, |s| std::mem::replace(&mut s.started, true)).unwrap_or(true);
            if !started {
                let keys = own_string_keys(interp, &object)?;
                with_for_in(iter, |s| s.keys = keys);
                continue;
            }
            let parent = interp.get_prototype_of(&object)?;
            let keys = match &parent {
                Some(p) => own_string_keys(interp, p)?,
                None => VecDeque::new(),
            };
            with_for_in(iter, |s| {
                s.object = parent;
                s.keys = keys;
            });
            continue;
        };
        let fresh = with_for_in(iter, |s| s.visited.insert(key.clone())).unwrap_or(false);
        if !fresh {
            continue;
        }
        let pk = PropertyKey::from(key.clone());
        match interp.get_own_property(&object, &pk)? {
            Some(desc) if desc.enumerable == Some(true) => return Ok(Some(JsValue::String(key))),
            _ => continue,
        }
    }
}

fn own_string_keys(interp: &mut Interpreter, obj: &JsObjectRef) -> Result<VecDeque<JsString>, JsError> {
    Ok(interp
        .own_property_keys(obj)?
        .into_iter()
        .filter_map(|k| k.to_js_string())
        .collect())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Async-from-sync iterators
// ═══════════════════════════════════════════════════════════════════════════════

/// `CreateAsyncFromSyncIterator`: adapt a sync iterator for `for await`
/// and `yield*` in async generators
pub(crate) fn create_async_from_sync_iterator(interp: &mut Interpreter, record: IteratorRecord) -> JsValue {
    let proto = interp.intrinsic(Intrinsic::AsyncIteratorPrototype);
    let obj = interp.create_object_with_proto(Some(proto));
    let captures = vec![record.iterator, record.next];
    for (name, func) in [
        ("next", async_from_sync_next as crate::object::NativeFn),
        ("return", async_from_sync_return),
        ("throw", async_from_sync_throw),
    ] {
        let f = interp.create_native_closure(name, func, 1, captures.clone());
        interp.register_value(&obj, name, JsValue::Object(f));
    }
    JsValue::Object(obj)
}

fn async_from_sync_next(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let iter = capture(interp, 0);
    let next = capture(interp, 1);
    let promise = promise::new_promise(interp);
    let call_args: Vec<JsValue> = args.first().cloned().into_iter().collect();
    let result = interp.call_function(&next, iter, &call_args);
    async_from_sync_continue(interp, result, promise)
}

fn async_from_sync_return(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let iter = capture(interp, 0);
    let promise = promise::new_promise(interp);
    let method = match interp.get_method(&iter, &PropertyKey::from("return")) {
        Ok(m) => m,
        Err(err) => return reject_with(interp, err, promise),
    };
    let Some(method) = method else {
        let result = interp.create_iter_result(arg(args, 0), true);
        promise::resolve_promise(interp, &promise, result)?;
        return Ok(JsValue::Object(promise));
    };
    let call_args: Vec<JsValue> = args.first().cloned().into_iter().collect();
    let result = interp.call_function(&method, iter, &call_args);
    async_from_sync_continue(interp, result, promise)
}

fn async_from_sync_throw(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let iter = capture(interp, 0);
    let promise = promise::new_promise(interp);
    let method = match interp.get_method(&iter, &PropertyKey::from("throw")) {
        Ok(m) => m,
        Err(err) => return reject_with(interp, err, promise),
    };
    let Some(method) = method else {
        let err = JsError::type_error("The iterator does not provide a 'throw' method");
        let err = interp.iterator_close_with_error(&iter, err);
        return reject_with(interp, err, promise);
    };
    let result = interp.call_function(&method, iter, &[arg(args, 0)]);
    async_from_sync_continue(interp, result, promise)
}

fn reject_with(interp: &mut Interpreter, err: JsError, promise: JsObjectRef) -> Result<JsValue, JsError> {
    let reason = interp.catch_error(err)?;
    promise::reject_promise(interp, &promise, reason);
    Ok(JsValue::Object(promise))
}

/// `AsyncFromSyncIteratorContinuation`
fn async_from_sync_continue(
    interp: &mut Interpreter,
    result: Result<JsValue, JsError>,
    promise: JsObjectRef,
) -> Result<JsValue, JsError> {
    let result = match result {
        Ok(r) => r,
        Err(err) => return reject_with(interp, err, promise),
    };
    if !result.is_object() {
        let err = JsError::type_error(format!("Iterator result {} is not an object", result.display_hint()));
        return reject_with(interp, err, promise);
    }
    let done = match interp.get_value(&result, &PropertyKey::from("done")) {
        Ok(d) => d.to_boolean(),
        Err(err) => return reject_with(interp, err, promise),
    };
    let value = match interp.get_value(&result, &PropertyKey::from("value")) {
        Ok(v) => v,
        Err(err) => return reject_with(interp, err, promise),
    };
    let wrapper = match promise::promise_resolve(interp, value) {
        Ok(p) => p,
        Err(err) => return reject_with(interp, err, promise),
    };
    let unwrap = interp.create_native_closure("", unwrap_iter_result, 1, vec![JsValue::Bool(done)]);
    promise::perform_then(
        interp,
        &wrapper,
        ReactionHandler::Function(JsValue::Object(unwrap)),
        ReactionHandler::Function(JsValue::Undefined),
        Some(promise.clone().into()),
    );
    Ok(JsValue::Object(promise))
}

fn unwrap_iter_result(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let done = capture(interp, 0).to_boolean();
    Ok(interp.create_iter_result(arg(args, 0), done))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_iterator_walks_values() {
        let mut interp = Interpreter::new(0, false);
        let arr = interp.create_array(vec![JsValue::from(1), JsValue::from(2)]);
        let iter = create_array_iterator(&mut interp, arr, EnumKind::Values);
        let mut seen = Vec::new();
        loop {
            let Ok(result) = array_iterator_next(&mut interp, iter.clone(), &[]) else {
                panic!("next failed");
            };
            let done = interp.get_value(&result, &PropertyKey::from("done")).unwrap_or_default();
            if done.to_boolean() {
                break;
            }
            seen.push(interp.get_value(&result, &PropertyKey::from("value")).unwrap_or_default());
        }
        assert_eq!(seen, vec![JsValue::from(1), JsValue::from(2)]);
    }

    #[test]
    fn string_iterator_keeps_surrogate_pairs() {
        let mut interp = Interpreter::new(0, false);
        let iter = create_string_iterator(&mut interp, JsString::from("a😀"));
        let first = string_iterator_next(&mut interp, iter.clone(), &[]).unwrap_or_default();
        let second = string_iterator_next(&mut interp, iter, &[]).unwrap_or_default();
        let v1 = interp.get_value(&first, &PropertyKey::from("value")).unwrap_or_default();
        let v2 = interp.get_value(&second, &PropertyKey::from("value")).unwrap_or_default();
        assert_eq!(v1, JsValue::from("a"));
        assert_eq!(v2, JsValue::from("😀"));
    }

    #[test]
    fn for_in_skips_shadowed_and_symbols() {
        let mut interp = Interpreter::new(0, false);
        let proto = interp.create_object();
        proto.borrow_mut().set_property(PropertyKey::from("a"), JsValue::from(1));
        proto.borrow_mut().set_property(PropertyKey::from("b"), JsValue::from(2));
        let obj = interp.create_object_with_proto(Some(proto));
        obj.borrow_mut().set_property(PropertyKey::from("a"), JsValue::from(3));
        obj.borrow_mut()
            .set_property(PropertyKey::Symbol(JsSymbol::new(None)), JsValue::from(4));
        let Ok(iter) = create_for_in_iterator(&mut interp, &JsValue::Object(obj)) else {
            panic!("for-in setup failed");
        };
        let mut keys = Vec::new();
        while let Ok(Some(k)) = for_in_next(&mut interp, &iter) {
            keys.push(k);
        }
        assert_eq!(keys, vec![JsValue::from("a"), JsValue::from("b")]);
    }
}
