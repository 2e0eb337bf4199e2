//! WeakMap and WeakSet built-in methods
//!
//! A weak collection owns only a [`WeakTable`] marker. Each entry lives on
//! its key object, tagged with a weak reference to the marker, so an entry
//! is reachable exactly as long as its key is and dies with the collection.

use crate::error::JsError;
use crate::object::{JsObject, JsObjectRef, ObjectKind, WeakTable};
use crate::value::{JsValue, PropertyKey};

use super::arg;
use super::map::add_entries_from_iterable;
use crate::interpreter::Interpreter;
use crate::interpreter::realm::Intrinsic;

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::WeakMapPrototype).is_some() {
        return;
    }
    let map_proto = interp.create_object();
    interp.register_method(&map_proto, "get", weak_map_get, 1);
    interp.register_method(&map_proto, "set", weak_map_set, 2);
    interp.register_method(&map_proto, "has", weak_map_has, 1);
    interp.register_method(&map_proto, "delete", weak_map_delete, 1);
    super::set_to_string_tag(&map_proto, "WeakMap");
    let map_ctor = interp.create_native_constructor("WeakMap", weak_map_constructor, 0, &map_proto);
    interp.realm.set(Intrinsic::WeakMapPrototype, map_proto);
    interp.realm.set(Intrinsic::WeakMap, map_ctor);

    let set_proto = interp.create_object();
    interp.register_method(&set_proto, "add", weak_set_add, 1);
    interp.register_method(&set_proto, "has", weak_set_has, 1);
    interp.register_method(&set_proto, "delete", weak_set_delete, 1);
    super::set_to_string_tag(&set_proto, "WeakSet");
    let set_ctor = interp.create_native_constructor("WeakSet", weak_set_constructor, 0, &set_proto);
    interp.realm.set(Intrinsic::WeakSetPrototype, set_proto);
    interp.realm.set(Intrinsic::WeakSet, set_ctor);
}

/// Marker of a WeakMap (`set == false`) or WeakSet receiver
fn this_table(this: &JsValue, set: bool, method: &str) -> Result<WeakTable, JsError> {
    if let JsValue::Object(o) = this {
        match &o.borrow().kind {
            ObjectKind::WeakMap(t) if !set => return Ok(t.clone()),
            ObjectKind::WeakSet(t) if set => return Ok(t.clone()),
            _ => {}
        }
    }
    let class = if set { "WeakSet" } else { "WeakMap" };
    Err(JsError::type_error(format!(
        "Method {class}.prototype.{method} called on incompatible receiver {}",
        this.display_hint()
    )))
}

/// Keys must be objects
fn weak_key(value: &JsValue, class: &str) -> Result<JsObjectRef, JsError> {
    match value {
        JsValue::Object(o) => Ok(o.clone()),
        _ => Err(JsError::type_error(format!(
            "Invalid value used as {class} key: {}",
            crate::interpreter::ops::describe(value)
        ))),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WeakMap
// ═══════════════════════════════════════════════════════════════════════════════

/// WeakMap(iterable)
fn weak_map_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let nt = interp.new_target.clone();
    if nt.is_undefined() {
        return Err(JsError::type_error("Constructor WeakMap requires 'new'"));
    }
    let proto = interp.get_prototype_from_constructor(&nt, Intrinsic::WeakMapPrototype)?;
    let map = interp.alloc(JsObject::new(ObjectKind::WeakMap(WeakTable::default()), Some(proto)));
    let iterable = arg(args, 0);
    if !iterable.is_nullish() {
        let adder = interp.get(&map, &PropertyKey::from("set"))?;
        add_entries_from_iterable(interp, &map, &iterable, &adder)?;
    }
    Ok(JsValue::Object(map))
}

fn weak_map_get(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let table = this_table(&this, false, "get")?;
    let JsValue::Object(key) = arg(args, 0) else {
        return Ok(JsValue::Undefined);
    };
    let value = key.borrow().weak_entry(&table).cloned();
    Ok(value.unwrap_or_default())
}

fn weak_map_set(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let table = this_table(&this, false, "set")?;
    let key = weak_key(&arg(args, 0), "weak map")?;
    key.borrow_mut().set_weak_entry(&table, arg(args, 1));
    Ok(this)
}

fn weak_map_has(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let table = this_table(&this, false, "has")?;
    let JsValue::Object(key) = arg(args, 0) else {
        return Ok(JsValue::Bool(false));
    };
    let found = key.borrow().weak_entry(&table).is_some();
    Ok(JsValue::Bool(found))
}

fn weak_map_delete(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let table = this_table(&this, false, "delete")?;
    let JsValue::Object(key) = arg(args, 0) else {
        return Ok(JsValue::Bool(false));
    };
    let removed = key.borrow_mut().remove_weak_entry(&table);
    Ok(JsValue::Bool(removed))
}

// ═══════════════════════════════════════════════════════════════════════════════
// WeakSet
// ═══════════════════════════════════════════════════════════════════════════════

/// WeakSet(iterable)
fn weak_set_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let nt = interp.new_target.clone();
    if nt.is_undefined() {
        return Err(JsError::type_error("Constructor WeakSet requires 'new'"));
    }
    let proto = interp.get_prototype_from_constructor(&nt, Intrinsic::WeakSetPrototype)?;
    let set = interp.alloc(JsObject::new(ObjectKind::WeakSet(WeakTable::default()), Some(proto)));
    let iterable = arg(args, 0);
    if iterable.is_nullish() {
        return Ok(JsValue::Object(set));
    }
    let adder = interp.get(&set, &PropertyKey::from("add"))?;
    if !adder.is_callable() {
        return Err(JsError::type_error("'add' of the new WeakSet is not a function"));
    }
    let mut record = interp.get_iterator(&iterable)?;
    while let Some(value) = interp.iterator_step_value(&mut record)? {
        if let Err(err) = interp.call_function(&adder, JsValue::Object(set.clone()), &[value]) {
            return Err(interp.iterator_close_with_error(&record.iterator, err));
        }
    }
    Ok(JsValue::Object(set))
}

fn weak_set_add(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let table = this_table(&this, true, "add")?;
    let key = weak_key(&arg(args, 0), "weak set")?;
    key.borrow_mut().set_weak_entry(&table, JsValue::Bool(true));
    Ok(this)
}

fn weak_set_has(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let table = this_table(&this, true, "has")?;
    let JsValue::Object(key) = arg(args, 0) else {
        return Ok(JsValue::Bool(false));
    };
    let found = key.borrow().weak_entry(&table).is_some();
    Ok(JsValue::Bool(found))
}

fn weak_set_delete(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let table = this_table(&this, true, "delete")?;
    let JsValue::Object(key) = arg(args, 0) else {
        return Ok(JsValue::Bool(false));
    };
    let removed = key.borrow_mut().remove_weak_entry(&table);
    Ok(JsValue::Bool(removed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weak_map(interp: &mut Interpreter) -> JsValue {
        let proto = interp.intrinsic(Intrinsic::WeakMapPrototype);
        JsValue::Object(interp.alloc(JsObject::new(ObjectKind::WeakMap(WeakTable::default()), Some(proto))))
    }

    #[test]
    fn entries_are_per_collection() {
        let mut interp = Interpreter::new(0, false);
        let a = weak_map(&mut interp);
        let b = weak_map(&mut interp);
        let key = JsValue::Object(interp.create_object());
        let _ = weak_map_set(&mut interp, a.clone(), &[key.clone(), JsValue::from(1)]);
        assert_eq!(weak_map_get(&mut interp, a.clone(), &[key.clone()]).ok(), Some(JsValue::from(1)));
        assert_eq!(weak_map_has(&mut interp, b, &[key.clone()]).ok(), Some(JsValue::Bool(false)));
        assert_eq!(weak_map_delete(&mut interp, a.clone(), &[key.clone()]).ok(), Some(JsValue::Bool(true)));
        assert_eq!(weak_map_has(&mut interp, a, &[key]).ok(), Some(JsValue::Bool(false)));
    }

    #[test]
    fn primitive_keys_are_rejected() {
        let mut interp = Interpreter::new(0, false);
        let m = weak_map(&mut interp);
        let result = weak_map_set(&mut interp, m, &[JsValue::from("k"), JsValue::from(1)]);
        assert!(matches!(result, Err(JsError::TypeError { .. })));
    }

    #[test]
    fn dropped_table_entries_are_pruned() {
        let mut interp = Interpreter::new(0, false);
        let key = interp.create_object();
        let stale = WeakTable::default();
        key.borrow_mut().set_weak_entry(&stale, JsValue::from(1));
        drop(stale);
        let live = WeakTable::default();
        key.borrow_mut().set_weak_entry(&live, JsValue::from(2));
        assert_eq!(key.borrow().weak_entries.len(), 1);
        assert_eq!(key.borrow().weak_entry(&live), Some(&JsValue::from(2)));
    }
}
