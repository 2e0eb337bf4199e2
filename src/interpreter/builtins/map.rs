//! Map built-in methods and the ordered hash table shared with Set
//!
//! Entries are kept in insertion order. Deleting leaves a tombstone so live
//! iterators keep their position; `clear` drops the storage and bumps a
//! generation counter that tells iterators to restart from the front.

use rustc_hash::FxHashMap;

use crate::error::JsError;
use crate::gc::Tracer;
use crate::object::{JsObject, JsObjectRef, ObjectKind};
use crate::string::JsString;
use crate::value::{JsSymbol, JsValue, PropertyKey};

use super::{arg, callback};
use crate::interpreter::Interpreter;
use crate::interpreter::ops::EnumKind;
use crate::interpreter::realm::Intrinsic;

// ═══════════════════════════════════════════════════════════════════════════════
// OrderedMap
// ═══════════════════════════════════════════════════════════════════════════════

/// Hashable form of a key under SameValueZero
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MapKey {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    String(JsString),
    Symbol(JsSymbol),
    Object(usize),
}

impl MapKey {
    fn new(value: &JsValue) -> MapKey {
        match value {
            JsValue::Undefined => MapKey::Undefined,
            JsValue::Null => MapKey::Null,
            JsValue::Bool(b) => MapKey::Bool(*b),
            JsValue::Int(i) => MapKey::Number(number_bits(*i as f64)),
            JsValue::Float(f) => MapKey::Number(number_bits(*f)),
            JsValue::String(s) => MapKey::String(s.clone()),
            JsValue::Symbol(s) => MapKey::Symbol(s.clone()),
            JsValue::Object(o) => MapKey::Object(o.id()),
        }
    }
}

/// NaNs collapse to one key and `-0` to `+0`
fn number_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0
    } else {
        n.to_bits()
    }
}

/// `-0` stored as a key becomes `+0`
pub(crate) fn normalize_key(value: JsValue) -> JsValue {
    match value {
        JsValue::Float(f) if f == 0.0 => JsValue::from(0),
        other => other,
    }
}

/// Insertion-ordered table behind `[[MapData]]` and `[[SetData]]`
#[derive(Default)]
pub struct OrderedMap {
    entries: Vec<Option<(JsValue, JsValue)>>,
    index: FxHashMap<MapKey, usize>,
    generation: u32,
}

impl OrderedMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn get(&self, key: &JsValue) -> Option<&JsValue> {
        let slot = *self.index.get(&MapKey::new(key))?;
        self.entries.get(slot)?.as_ref().map(|(_, v)| v)
    }

    pub fn has(&self, key: &JsValue) -> bool {
        self.index.contains_key(&MapKey::new(key))
    }

    pub fn insert(&mut self, key: JsValue, value: JsValue) {
        let key = normalize_key(key);
        let map_key = MapKey::new(&key);
        if let Some(&slot) = self.index.get(&map_key) {
            if let Some(Some(entry)) = self.entries.get_mut(slot) {
                entry.1 = value;
                return;
            }
        }
        self.index.insert(map_key, self.entries.len());
        self.entries.push(Some((key, value)));
    }

    pub fn remove(&mut self, key: &JsValue) -> bool {
        let Some(slot) = self.index.remove(&MapKey::new(key)) else {
            return false;
        };
        if let Some(entry) = self.entries.get_mut(slot) {
            *entry = None;
        }
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// First live entry at or after slot `from`, with its slot
    pub fn entry_from(&self, from: usize) -> Option<(usize, JsValue, JsValue)> {
        self.entries
            .iter()
            .enumerate()
            .skip(from)
            .find_map(|(i, e)| e.as_ref().map(|(k, v)| (i, k.clone(), v.clone())))
    }

    /// Live entries in order
    pub fn iter(&self) -> impl Iterator<Item = (&JsValue, &JsValue)> {
        self.entries.iter().flatten().map(|(k, v)| (k, v))
    }

    pub fn trace(&self, t: &mut Tracer<'_>) {
        for (k, v) in self.iter() {
            t.value(k);
            t.value(v);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Collection iterators
// ═══════════════════════════════════════════════════════════════════════════════

/// Position of a Map or Set iterator
pub struct MapIteratorState {
    /// `None` once exhausted
    pub collection: Option<JsObjectRef>,
    pub position: usize,
    pub generation: u32,
    pub kind: EnumKind,
}

impl MapIteratorState {
    pub fn trace(&self, t: &mut Tracer<'_>) {
        if let Some(c) = &self.collection {
            t.edge(c);
        }
    }
}

fn with_table<R>(obj: &JsObjectRef, f: impl FnOnce(&OrderedMap) -> R) -> Option<R> {
    match &obj.borrow().kind {
        ObjectKind::Map(m) | ObjectKind::Set(m) => Some(f(m)),
        _ => None,
    }
}

fn with_table_mut<R>(obj: &JsObjectRef, f: impl FnOnce(&mut OrderedMap) -> R) -> Option<R> {
    match &mut obj.borrow_mut().kind {
        ObjectKind::Map(m) | ObjectKind::Set(m) => Some(f(m)),
        _ => None,
    }
}

/// `CreateMapIterator` / `CreateSetIterator`
pub(crate) fn create_collection_iterator(interp: &mut Interpreter, collection: &JsObjectRef, kind: EnumKind) -> JsValue {
    let is_set = matches!(collection.borrow().kind, ObjectKind::Set(_));
    let generation = with_table(collection, OrderedMap::generation).unwrap_or_default();
    let state = Box::new(MapIteratorState {
        collection: Some(collection.clone()),
        position: 0,
        generation,
        kind,
    });
    let (object_kind, proto) = if is_set {
        (ObjectKind::SetIterator(state), interp.intrinsic(Intrinsic::SetIteratorPrototype))
    } else {
        (ObjectKind::MapIterator(state), interp.intrinsic(Intrinsic::MapIteratorPrototype))
    };
    JsValue::Object(interp.alloc(JsObject::new(object_kind, Some(proto))))
}

/// Advance a Map or Set iterator; `None` when done
fn collection_iterator_step(iter: &JsObjectRef) -> Result<Option<(EnumKind, JsValue, JsValue)>, JsError> {
    let mut o = iter.borrow_mut();
    let state = match &mut o.kind {
        ObjectKind::MapIterator(st) | ObjectKind::SetIterator(st) => st,
        _ => return Err(JsError::type_error("next method called on incompatible receiver")),
    };
    let Some(collection) = state.collection.clone() else {
        return Ok(None);
    };
    let found = with_table(&collection, |m| {
        if m.generation() != state.generation {
            state.generation = m.generation();
            state.position = 0;
        }
        m.entry_from(state.position)
    })
    .flatten();
    match found {
        Some((slot, k, v)) => {
            state.position = slot + 1;
            Ok(Some((state.kind, k, v)))
        }
        None => {
            state.collection = None;
            Ok(None)
        }
    }
}

/// %MapIteratorPrototype%.next / %SetIteratorPrototype%.next
pub(crate) fn collection_iterator_next(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let JsValue::Object(iter) = &this else {
        return Err(JsError::type_error("next method called on incompatible receiver"));
    };
    let Some((kind, key, value)) = collection_iterator_step(iter)? else {
        return Ok(interp.create_iter_result(JsValue::Undefined, true));
    };
    let result = match kind {
        EnumKind::Keys => key,
        EnumKind::Values => value,
        EnumKind::Entries => JsValue::Object(interp.create_array(vec![key, value])),
    };
    Ok(interp.create_iter_result(result, false))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Map
// ═══════════════════════════════════════════════════════════════════════════════

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::MapPrototype).is_some() {
        return;
    }
    let proto = interp.create_object();
    interp.register_method(&proto, "get", map_get, 1);
    interp.register_method(&proto, "set", map_set, 2);
    interp.register_method(&proto, "has", map_has, 1);
    interp.register_method(&proto, "delete", map_delete, 1);
    interp.register_method(&proto, "clear", map_clear, 0);
    interp.register_method(&proto, "forEach", map_for_each, 1);
    interp.register_method(&proto, "keys", map_keys, 0);
    interp.register_method(&proto, "values", map_values, 0);
    interp.register_getter(&proto, "size", map_size);
    let entries = interp.create_native_function("entries", map_entries, 0);
    interp.register_value(&proto, "entries", JsValue::Object(entries.clone()));
    interp.register_value(&proto, PropertyKey::Symbol(JsSymbol::iterator()), JsValue::Object(entries));
    super::set_to_string_tag(&proto, "Map");

    let ctor = interp.create_native_constructor("Map", map_constructor, 0, &proto);
    interp.register_method(&ctor, "groupBy", map_group_by, 2);
    super::register_species(interp, &ctor);
    interp.realm.set(Intrinsic::MapPrototype, proto);
    interp.realm.set(Intrinsic::Map, ctor);

    let parent = interp.intrinsic(Intrinsic::IteratorPrototype);
    let iter_proto = interp.create_object_with_proto(Some(parent));
    interp.register_method(&iter_proto, "next", collection_iterator_next, 0);
    super::set_to_string_tag(&iter_proto, "Map Iterator");
    interp.realm.set(Intrinsic::MapIteratorPrototype, iter_proto);
}

/// Allocate an empty Map with `%Map.prototype%`
pub(crate) fn create_map(interp: &mut Interpreter) -> JsObjectRef {
    let proto = interp.intrinsic(Intrinsic::MapPrototype);
    interp.alloc(JsObject::new(ObjectKind::Map(Box::new(OrderedMap::new())), Some(proto)))
}

/// Map(iterable)
fn map_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let nt = interp.new_target.clone();
    if nt.is_undefined() {
        return Err(JsError::type_error("Constructor Map requires 'new'"));
    }
    let proto = interp.get_prototype_from_constructor(&nt, Intrinsic::MapPrototype)?;
    let map = interp.alloc(JsObject::new(ObjectKind::Map(Box::new(OrderedMap::new())), Some(proto)));
    let iterable = arg(args, 0);
    if !iterable.is_nullish() {
        let adder = interp.get(&map, &PropertyKey::from("set"))?;
        add_entries_from_iterable(interp, &map, &iterable, &adder)?;
    }
    Ok(JsValue::Object(map))
}

/// `AddEntriesFromIterable`: call `adder(k, v)` for each `[k, v]` item
pub(crate) fn add_entries_from_iterable(
    interp: &mut Interpreter,
    target: &JsObjectRef,
    iterable: &JsValue,
    adder: &JsValue,
) -> Result<(), JsError> {
    if !adder.is_callable() {
        return Err(JsError::type_error("'set' of the new collection is not a function"));
    }
    let mut record = interp.get_iterator(iterable)?;
    while let Some(item) = interp.iterator_step_value(&mut record)? {
        if let Err(err) = add_entry(interp, target, adder, &item) {
            return Err(interp.iterator_close_with_error(&record.iterator, err));
        }
    }
    Ok(())
}

fn add_entry(interp: &mut Interpreter, target: &JsObjectRef, adder: &JsValue, item: &JsValue) -> Result<JsValue, JsError> {
    let JsValue::Object(entry) = item else {
        return Err(JsError::type_error(format!(
            "Iterator value {} is not an entry object",
            crate::interpreter::ops::describe(item)
        )));
    };
    let k = interp.get(entry, &PropertyKey::Index(0))?;
    let v = interp.get(entry, &PropertyKey::Index(1))?;
    interp.call_function(adder, JsValue::Object(target.clone()), &[k, v])
}

fn this_map(this: &JsValue, method: &str) -> Result<JsObjectRef, JsError> {
    if let JsValue::Object(o) = this {
        if matches!(o.borrow().kind, ObjectKind::Map(_)) {
            return Ok(o.clone());
        }
    }
    Err(JsError::type_error(format!(
        "Method Map.prototype.{method} called on incompatible receiver {}",
        this.display_hint()
    )))
}

/// Map.prototype.get(key)
fn map_get(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let map = this_map(&this, "get")?;
    let key = arg(args, 0);
    Ok(with_table(&map, |m| m.get(&key).cloned()).flatten().unwrap_or_default())
}

/// Map.prototype.set(key, value)
fn map_set(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let map = this_map(&this, "set")?;
    with_table_mut(&map, |m| m.insert(arg(args, 0), arg(args, 1)));
    Ok(this)
}

/// Map.prototype.has(key)
fn map_has(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let map = this_map(&this, "has")?;
    let key = arg(args, 0);
    Ok(JsValue::Bool(with_table(&map, |m| m.has(&key)).unwrap_or(false)))
}

/// Map.prototype.delete(key)
fn map_delete(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let map = this_map(&this, "delete")?;
    let key = arg(args, 0);
    Ok(JsValue::Bool(with_table_mut(&map, |m| m.remove(&key)).unwrap_or(false)))
}

/// Map.prototype.clear()
fn map_clear(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let map = this_map(&this, "clear")?;
    with_table_mut(&map, OrderedMap::clear);
    Ok(JsValue::Undefined)
}

/// get Map.prototype.size
fn map_size(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let map = this_map(&this, "size")?;
    Ok(JsValue::from(with_table(&map, OrderedMap::len).unwrap_or_default()))
}

/// Shared body of `Map.prototype.forEach` and `Set.prototype.forEach`.
/// Entries added during the walk are visited; deleted ones are skipped.
pub(crate) fn for_each_entry(
    interp: &mut Interpreter,
    collection: &JsObjectRef,
    f: &JsValue,
    this_arg: &JsValue,
    set_semantics: bool,
) -> Result<(), JsError> {
    let mut position = 0;
    let mut generation = with_table(collection, OrderedMap::generation).unwrap_or_default();
    loop {
        let next = with_table(collection, |m| {
            if m.generation() != generation {
                generation = m.generation();
                position = 0;
            }
            m.entry_from(position)
        })
        .flatten();
        let Some((slot, k, v)) = next else {
            return Ok(());
        };
        position = slot + 1;
        let (first, second) = if set_semantics { (k.clone(), k) } else { (v, k) };
        interp.call_function(f, this_arg.clone(), &[first, second, JsValue::Object(collection.clone())])?;
    }
}

/// Map.prototype.forEach(callbackfn, thisArg)
fn map_for_each(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let map = this_map(&this, "forEach")?;
    let f = callback(&arg(args, 0), "Map.prototype.forEach")?;
    for_each_entry(interp, &map, &f, &arg(args, 1), false)?;
    Ok(JsValue::Undefined)
}

fn map_keys(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let map = this_map(&this, "keys")?;
    Ok(create_collection_iterator(interp, &map, EnumKind::Keys))
}

fn map_values(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let map = this_map(&this, "values")?;
    Ok(create_collection_iterator(interp, &map, EnumKind::Values))
}

fn map_entries(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let map = this_map(&this, "entries")?;
    Ok(create_collection_iterator(interp, &map, EnumKind::Entries))
}

/// Map.groupBy(items, callbackfn)
fn map_group_by(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let groups = super::object::group_by(interp, args, "Map.groupBy", |_, k| Ok(normalize_key(k)))?;
    let map = create_map(interp);
    for (key, values) in groups {
        let list = interp.create_array(values);
        with_table_mut(&map, |m| m.insert(key, JsValue::Object(list)));
    }
    Ok(JsValue::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_use_same_value_zero() {
        let mut m = OrderedMap::new();
        m.insert(JsValue::Float(-0.0), JsValue::from("zero"));
        m.insert(JsValue::nan(), JsValue::from("nan"));
        assert_eq!(m.get(&JsValue::from(0)), Some(&JsValue::from("zero")));
        assert_eq!(m.get(&JsValue::Float(f64::NAN)), Some(&JsValue::from("nan")));
        assert!(m.has(&JsValue::Float(0.0)));
        assert!(!m.has(&JsValue::from("0")));
    }

    #[test]
    fn delete_keeps_later_slots_in_place() {
        let mut m = OrderedMap::new();
        for i in 0..3 {
            m.insert(JsValue::from(i), JsValue::Undefined);
        }
        assert!(m.remove(&JsValue::from(1)));
        assert_eq!(m.len(), 2);
        assert_eq!(m.entry_from(1).map(|(slot, k, _)| (slot, k)), Some((2, JsValue::from(2))));
    }

    #[test]
    fn reinsert_after_delete_moves_to_end() {
        let mut m = OrderedMap::new();
        m.insert(JsValue::from("a"), JsValue::from(1));
        m.insert(JsValue::from("b"), JsValue::from(2));
        m.remove(&JsValue::from("a"));
        m.insert(JsValue::from("a"), JsValue::from(3));
        let keys: Vec<_> = m.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![JsValue::from("b"), JsValue::from("a")]);
    }

    #[test]
    fn clear_bumps_generation() {
        let mut m = OrderedMap::new();
        m.insert(JsValue::from(1), JsValue::Undefined);
        let before = m.generation();
        m.clear();
        assert!(m.is_empty());
        assert_ne!(before, m.generation());
    }

    #[test]
    fn map_object_set_returns_receiver() {
        let mut interp = Interpreter::new(0, false);
        let map = JsValue::Object(create_map(&mut interp));
        let result = map_set(&mut interp, map.clone(), &[JsValue::from("k"), JsValue::from(1)]);
        assert_eq!(result.ok(), Some(map.clone()));
        let got = map_get(&mut interp, map, &[JsValue::from("k")]);
        assert_eq!(got.ok(), Some(JsValue::from(1)));
    }
}
