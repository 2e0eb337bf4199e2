//! Set built-in methods
//!
//! Sets share [`OrderedMap`] with Map; every entry stores the value in
//! both slots.

use crate::error::JsError;
use crate::object::{JsObject, JsObjectRef, ObjectKind};
use crate::value::{JsSymbol, JsValue, PropertyKey};

use super::map::{OrderedMap, collection_iterator_next, create_collection_iterator, for_each_entry, normalize_key};
use super::{arg, callback};
use crate::interpreter::Interpreter;
use crate::interpreter::ops::EnumKind;
use crate::interpreter::realm::Intrinsic;

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::SetPrototype).is_some() {
        return;
    }
    let proto = interp.create_object();
    interp.register_method(&proto, "add", set_add, 1);
    interp.register_method(&proto, "has", set_has, 1);
    interp.register_method(&proto, "delete", set_delete, 1);
    interp.register_method(&proto, "clear", set_clear, 0);
    interp.register_method(&proto, "forEach", set_for_each, 1);
    interp.register_method(&proto, "entries", set_entries, 0);
    interp.register_getter(&proto, "size", set_size);
    let values = interp.create_native_function("values", set_values, 0);
    interp.register_value(&proto, "values", JsValue::Object(values.clone()));
    interp.register_value(&proto, "keys", JsValue::Object(values.clone()));
    interp.register_value(&proto, PropertyKey::Symbol(JsSymbol::iterator()), JsValue::Object(values));

    // Set algebra
    interp.register_method(&proto, "union", set_union, 1);
    interp.register_method(&proto, "intersection", set_intersection, 1);
    interp.register_method(&proto, "difference", set_difference, 1);
    interp.register_method(&proto, "symmetricDifference", set_symmetric_difference, 1);
    interp.register_method(&proto, "isSubsetOf", set_is_subset_of, 1);
    interp.register_method(&proto, "isSupersetOf", set_is_superset_of, 1);
    interp.register_method(&proto, "isDisjointFrom", set_is_disjoint_from, 1);
    super::set_to_string_tag(&proto, "Set");

    let ctor = interp.create_native_constructor("Set", set_constructor, 0, &proto);
    super::register_species(interp, &ctor);
    interp.realm.set(Intrinsic::SetPrototype, proto);
    interp.realm.set(Intrinsic::Set, ctor);

    let parent = interp.intrinsic(Intrinsic::IteratorPrototype);
    let iter_proto = interp.create_object_with_proto(Some(parent));
    interp.register_method(&iter_proto, "next", collection_iterator_next, 0);
    super::set_to_string_tag(&iter_proto, "Set Iterator");
    interp.realm.set(Intrinsic::SetIteratorPrototype, iter_proto);
}

fn new_set(interp: &mut Interpreter, table: OrderedMap) -> JsObjectRef {
    let proto = interp.intrinsic(Intrinsic::SetPrototype);
    interp.alloc(JsObject::new(ObjectKind::Set(Box::new(table)), Some(proto)))
}

/// Set(iterable)
fn set_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let nt = interp.new_target.clone();
    if nt.is_undefined() {
        return Err(JsError::type_error("Constructor Set requires 'new'"));
    }
    let proto = interp.get_prototype_from_constructor(&nt, Intrinsic::SetPrototype)?;
    let set = interp.alloc(JsObject::new(ObjectKind::Set(Box::new(OrderedMap::new())), Some(proto)));
    let iterable = arg(args, 0);
    if iterable.is_nullish() {
        return Ok(JsValue::Object(set));
    }
    let adder = interp.get(&set, &PropertyKey::from("add"))?;
    if !adder.is_callable() {
        return Err(JsError::type_error("'add' of the new Set is not a function"));
    }
    let mut record = interp.get_iterator(&iterable)?;
    while let Some(value) = interp.iterator_step_value(&mut record)? {
        if let Err(err) = interp.call_function(&adder, JsValue::Object(set.clone()), &[value]) {
            return Err(interp.iterator_close_with_error(&record.iterator, err));
        }
    }
    Ok(JsValue::Object(set))
}

fn this_set(this: &JsValue, method: &str) -> Result<JsObjectRef, JsError> {
    if let JsValue::Object(o) = this {
        if matches!(o.borrow().kind, ObjectKind::Set(_)) {
            return Ok(o.clone());
        }
    }
    Err(JsError::type_error(format!(
        "Method Set.prototype.{method} called on incompatible receiver {}",
        this.display_hint()
    )))
}

fn table<R>(set: &JsObjectRef, f: impl FnOnce(&OrderedMap) -> R) -> Option<R> {
    match &set.borrow().kind {
        ObjectKind::Set(m) => Some(f(m)),
        _ => None,
    }
}

fn table_mut<R>(set: &JsObjectRef, f: impl FnOnce(&mut OrderedMap) -> R) -> Option<R> {
    match &mut set.borrow_mut().kind {
        ObjectKind::Set(m) => Some(f(m)),
        _ => None,
    }
}

/// Insert `value` unless present
fn add_value(m: &mut OrderedMap, value: JsValue) {
    if !m.has(&value) {
        let value = normalize_key(value);
        m.insert(value.clone(), value);
    }
}

fn contains(set: &JsObjectRef, value: &JsValue) -> bool {
    table(set, |m| m.has(value)).unwrap_or(false)
}

/// Set.prototype.add(value)
fn set_add(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let set = this_set(&this, "add")?;
    let value = arg(args, 0);
    table_mut(&set, |m| add_value(m, value));
    Ok(this)
}

fn set_has(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let set = this_set(&this, "has")?;
    Ok(JsValue::Bool(contains(&set, &arg(args, 0))))
}

fn set_delete(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let set = this_set(&this, "delete")?;
    let value = arg(args, 0);
    Ok(JsValue::Bool(table_mut(&set, |m| m.remove(&value)).unwrap_or(false)))
}

fn set_clear(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let set = this_set(&this, "clear")?;
    table_mut(&set, OrderedMap::clear);
    Ok(JsValue::Undefined)
}

/// get Set.prototype.size
fn set_size(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let set = this_set(&this, "size")?;
    Ok(JsValue::from(table(&set, OrderedMap::len).unwrap_or_default()))
}

/// Set.prototype.forEach(callbackfn, thisArg)
fn set_for_each(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let set = this_set(&this, "forEach")?;
    let f = callback(&arg(args, 0), "Set.prototype.forEach")?;
    for_each_entry(interp, &set, &f, &arg(args, 1), true)?;
    Ok(JsValue::Undefined)
}

fn set_values(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let set = this_set(&this, "values")?;
    Ok(create_collection_iterator(interp, &set, EnumKind::Keys))
}

/// Set.prototype.entries(): `[value, value]` pairs
fn set_entries(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let set = this_set(&this, "entries")?;
    Ok(create_collection_iterator(interp, &set, EnumKind::Entries))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Set algebra
// ═══════════════════════════════════════════════════════════════════════════════

/// `GetSetRecord`: the `size`, `has` and `keys` of a set-like argument
struct SetRecord {
    object: JsObjectRef,
    size: f64,
    has: JsValue,
    keys: JsValue,
}

fn get_set_record(interp: &mut Interpreter, value: &JsValue) -> Result<SetRecord, JsError> {
    let JsValue::Object(object) = value else {
        return Err(JsError::type_error(format!(
            "{} is not a set-like object",
            crate::interpreter::ops::describe(value)
        )));
    };
    let raw_size = interp.get(object, &PropertyKey::from("size"))?;
    let num_size = interp.to_number(&raw_size)?;
    if num_size.is_nan() {
        return Err(JsError::type_error("The 'size' property must be a number"));
    }
    let size = crate::number::to_integer_or_infinity(num_size);
    if size < 0.0 {
        return Err(JsError::range_error("The 'size' property must not be negative"));
    }
    let has = interp.get(object, &PropertyKey::from("has"))?;
    if !has.is_callable() {
        return Err(JsError::type_error("The 'has' property must be a function"));
    }
    let keys = interp.get(object, &PropertyKey::from("keys"))?;
    if !keys.is_callable() {
        return Err(JsError::type_error("The 'keys' property must be a function"));
    }
    Ok(SetRecord {
        object: object.clone(),
        size,
        has,
        keys,
    })
}

impl SetRecord {
    fn has(&self, interp: &mut Interpreter, value: &JsValue) -> Result<bool, JsError> {
        let r = interp.call_function(&self.has, JsValue::Object(self.object.clone()), &[value.clone()])?;
        Ok(r.to_boolean())
    }

    /// Call `keys()` and collect what `next()` yields, stopping early when
    /// `visit` returns `false` (the iterator is then closed)
    fn each_key(
        &self,
        interp: &mut Interpreter,
        mut visit: impl FnMut(&mut Interpreter, JsValue) -> Result<bool, JsError>,
    ) -> Result<(), JsError> {
        let iterator = interp.call_function(&self.keys, JsValue::Object(self.object.clone()), &[])?;
        let iterator_obj = interp.require_object(&iterator, "keys() result")?;
        let next = interp.get(&iterator_obj, &PropertyKey::from("next"))?;
        loop {
            let result = interp.call_function(&next, iterator.clone(), &[])?;
            let result = interp.require_object(&result, "iterator result")?;
            if interp.get(&result, &PropertyKey::from("done"))?.to_boolean() {
                return Ok(());
            }
            let value = interp.get(&result, &PropertyKey::from("value"))?;
            if !visit(interp, value)? {
                interp.iterator_close(&iterator)?;
                return Ok(());
            }
        }
    }
}

/// Snapshot of this set's values in insertion order
fn elements(set: &JsObjectRef) -> Vec<JsValue> {
    table(set, |m| m.iter().map(|(k, _)| k.clone()).collect()).unwrap_or_default()
}

fn copy_table(set: &JsObjectRef) -> OrderedMap {
    let mut copy = OrderedMap::new();
    for v in elements(set) {
        add_value(&mut copy, v);
    }
    copy
}

fn size_of(set: &JsObjectRef) -> f64 {
    table(set, OrderedMap::len).unwrap_or_default() as f64
}

/// Set.prototype.union(other)
fn set_union(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let set = this_set(&this, "union")?;
    let other = get_set_record(interp, &arg(args, 0))?;
    let mut result = copy_table(&set);
    other.each_key(interp, |_, v| {
        add_value(&mut result, v);
        Ok(true)
    })?;
    Ok(JsValue::Object(new_set(interp, result)))
}

/// Set.prototype.intersection(other)
fn set_intersection(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let set = this_set(&this, "intersection")?;
    let other = get_set_record(interp, &arg(args, 0))?;
    let mut result = OrderedMap::new();
    if size_of(&set) <= other.size {
        for v in elements(&set) {
            if other.has(interp, &v)? {
                add_value(&mut result, v);
            }
        }
    } else {
        other.each_key(interp, |_, v| {
            if contains(&set, &v) {
                add_value(&mut result, v);
            }
            Ok(true)
        })?;
    }
    Ok(JsValue::Object(new_set(interp, result)))
}

/// Set.prototype.difference(other)
fn set_difference(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let set = this_set(&this, "difference")?;
    let other = get_set_record(interp, &arg(args, 0))?;
    let mut result = copy_table(&set);
    if size_of(&set) <= other.size {
        for v in elements(&set) {
            if other.has(interp, &v)? {
                result.remove(&v);
            }
        }
    } else {
        other.each_key(interp, |_, v| {
            result.remove(&v);
            Ok(true)
        })?;
    }
    Ok(JsValue::Object(new_set(interp, result)))
}

/// Set.prototype.symmetricDifference(other)
fn set_symmetric_difference(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let set = this_set(&this, "symmetricDifference")?;
    let other = get_set_record(interp, &arg(args, 0))?;
    let mut result = copy_table(&set);
    other.each_key(interp, |_, v| {
        if contains(&set, &v) {
            result.remove(&v);
        } else {
            add_value(&mut result, v);
        }
        Ok(true)
    })?;
    Ok(JsValue::Object(new_set(interp, result)))
}

/// Set.prototype.isSubsetOf(other)
fn set_is_subset_of(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let set = this_set(&this, "isSubsetOf")?;
    let other = get_set_record(interp, &arg(args, 0))?;
    if size_of(&set) > other.size {
        return Ok(JsValue::Bool(false));
    }
    for v in elements(&set) {
        if !other.has(interp, &v)? {
            return Ok(JsValue::Bool(false));
        }
    }
    Ok(JsValue::Bool(true))
}

/// Set.prototype.isSupersetOf(other)
fn set_is_superset_of(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let set = this_set(&this, "isSupersetOf")?;
    let other = get_set_record(interp, &arg(args, 0))?;
    if size_of(&set) < other.size {
        return Ok(JsValue::Bool(false));
    }
    let mut all = true;
    other.each_key(interp, |_, v| {
        all = contains(&set, &v);
        Ok(all)
    })?;
    Ok(JsValue::Bool(all))
}

/// Set.prototype.isDisjointFrom(other)
fn set_is_disjoint_from(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let set = this_set(&this, "isDisjointFrom")?;
    let other = get_set_record(interp, &arg(args, 0))?;
    if size_of(&set) <= other.size {
        for v in elements(&set) {
            if other.has(interp, &v)? {
                return Ok(JsValue::Bool(false));
            }
        }
        return Ok(JsValue::Bool(true));
    }
    let mut disjoint = true;
    other.each_key(interp, |_, v| {
        disjoint = !contains(&set, &v);
        Ok(disjoint)
    })?;
    Ok(JsValue::Bool(disjoint))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(interp: &mut Interpreter, values: &[i32]) -> JsValue {
        let mut t = OrderedMap::new();
        for v in values {
            add_value(&mut t, JsValue::from(*v));
        }
        JsValue::Object(new_set(interp, t))
    }

    fn values_of(v: &JsValue) -> Vec<JsValue> {
        match v {
            JsValue::Object(o) => elements(o),
            _ => Vec::new(),
        }
    }

    #[test]
    fn add_ignores_duplicates() {
        let mut interp = Interpreter::new(0, false);
        let s = set_of(&mut interp, &[1]);
        let _ = set_add(&mut interp, s.clone(), &[JsValue::Float(1.0)]);
        assert_eq!(values_of(&s).len(), 1);
    }

    #[test]
    fn union_keeps_order() {
        let mut interp = Interpreter::new(0, false);
        let a = set_of(&mut interp, &[1, 2]);
        let b = set_of(&mut interp, &[2, 3]);
        let u = set_union(&mut interp, a, &[b]);
        let Ok(u) = u else {
            panic!("union failed");
        };
        assert_eq!(values_of(&u), vec![JsValue::from(1), JsValue::from(2), JsValue::from(3)]);
    }

    #[test]
    fn intersection_and_difference() {
        let mut interp = Interpreter::new(0, false);
        let a = set_of(&mut interp, &[1, 2, 3]);
        let b = set_of(&mut interp, &[2, 3, 4]);
        let i = set_intersection(&mut interp, a.clone(), &[b.clone()]).unwrap_or_default();
        let d = set_difference(&mut interp, a, &[b]).unwrap_or_default();
        assert_eq!(values_of(&i), vec![JsValue::from(2), JsValue::from(3)]);
        assert_eq!(values_of(&d), vec![JsValue::from(1)]);
    }

    #[test]
    fn subset_checks() {
        let mut interp = Interpreter::new(0, false);
        let small = set_of(&mut interp, &[1]);
        let big = set_of(&mut interp, &[1, 2]);
        let sub = set_is_subset_of(&mut interp, small.clone(), &[big.clone()]);
        let sup = set_is_superset_of(&mut interp, small, &[big]);
        assert_eq!(sub.ok(), Some(JsValue::Bool(true)));
        assert_eq!(sup.ok(), Some(JsValue::Bool(false)));
    }

    #[test]
    fn set_like_without_has_is_rejected() {
        let mut interp = Interpreter::new(0, false);
        let a = set_of(&mut interp, &[1]);
        let plain = JsValue::Object(interp.create_object());
        assert!(set_union(&mut interp, a, &[plain]).is_err());
    }
}
