//! Array built-in methods
//!
//! The prototype methods are generic: they read `length` and elements
//! through the object protocol, so they work on array-likes, proxies and
//! host arrays as well as plain arrays.

use std::cmp::Ordering;

use crate::error::JsError;
use crate::object::{JsObject, JsObjectRef};
use crate::string::{JsString, JsStringBuilder};
use crate::value::{JsSymbol, JsValue, PropertyKey};

use super::{arg, callback, iterator};
use crate::interpreter::Interpreter;
use crate::interpreter::ops::EnumKind;
use crate::interpreter::realm::Intrinsic;

/// 2^53 - 1, the largest length an array-like may report
const MAX_SAFE_LENGTH: u64 = 9_007_199_254_740_991;

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::ArrayPrototype).is_some() {
        return;
    }
    // Array.prototype is itself an array
    let object_proto = interp.realm.object_prototype.clone();
    let proto = interp.alloc(JsObject::array(Some(object_proto), Vec::new()));
    interp.realm.set(Intrinsic::ArrayPrototype, proto.clone());

    // Mutating methods
    interp.register_method(&proto, "push", array_push, 1);
    interp.register_method(&proto, "pop", array_pop, 0);
    interp.register_method(&proto, "shift", array_shift, 0);
    interp.register_method(&proto, "unshift", array_unshift, 1);
    interp.register_method(&proto, "splice", array_splice, 2);
    interp.register_method(&proto, "reverse", array_reverse, 0);
    interp.register_method(&proto, "sort", array_sort, 1);
    interp.register_method(&proto, "fill", array_fill, 1);
    interp.register_method(&proto, "copyWithin", array_copy_within, 2);

    // Accessor methods
    interp.register_method(&proto, "at", array_at, 1);
    interp.register_method(&proto, "concat", array_concat, 1);
    interp.register_method(&proto, "slice", array_slice, 2);
    interp.register_method(&proto, "join", array_join, 1);
    interp.register_method(&proto, "toString", array_to_string, 0);
    interp.register_method(&proto, "toLocaleString", array_to_locale_string, 0);
    interp.register_method(&proto, "indexOf", array_index_of, 1);
    interp.register_method(&proto, "lastIndexOf", array_last_index_of, 1);
    interp.register_method(&proto, "includes", array_includes, 1);

    // Iteration methods
    interp.register_method(&proto, "forEach", array_for_each, 1);
    interp.register_method(&proto, "map", array_map, 1);
    interp.register_method(&proto, "filter", array_filter, 1);
    interp.register_method(&proto, "reduce", array_reduce, 1);
    interp.register_method(&proto, "reduceRight", array_reduce_right, 1);
    interp.register_method(&proto, "find", array_find, 1);
    interp.register_method(&proto, "findIndex", array_find_index, 1);
    interp.register_method(&proto, "findLast", array_find_last, 1);
    interp.register_method(&proto, "findLastIndex", array_find_last_index, 1);
    interp.register_method(&proto, "every", array_every, 1);
    interp.register_method(&proto, "some", array_some, 1);
    interp.register_method(&proto, "flat", array_flat, 0);
    interp.register_method(&proto, "flatMap", array_flat_map, 1);

    // Copying variants
    interp.register_method(&proto, "toReversed", array_to_reversed, 0);
    interp.register_method(&proto, "toSorted", array_to_sorted, 1);
    interp.register_method(&proto, "toSpliced", array_to_spliced, 2);
    interp.register_method(&proto, "with", array_with, 2);

    // Iterators; `values` doubles as @@iterator
    interp.register_method(&proto, "keys", array_keys, 0);
    interp.register_method(&proto, "entries", array_entries, 0);
    let values = interp.create_native_function("values", array_values, 0);
    interp.register_value(&proto, "values", JsValue::Object(values.clone()));
    interp.register_value(
        &proto,
        PropertyKey::Symbol(JsSymbol::iterator()),
        JsValue::Object(values.clone()),
    );
    interp.realm.set(Intrinsic::ArrayValues, values);
    iterator::init_array_iterator(interp);

    let unscopables = interp.create_object_with_proto(None);
    for name in [
        "at",
        "copyWithin",
        "entries",
        "fill",
        "find",
        "findIndex",
        "findLast",
        "findLastIndex",
        "flat",
        "flatMap",
        "includes",
        "keys",
        "toReversed",
        "toSorted",
        "toSpliced",
        "values",
    ] {
        unscopables
            .borrow_mut()
            .set_property(PropertyKey::from(name), JsValue::Bool(true));
    }
    interp.register_value(
        &proto,
        PropertyKey::Symbol(JsSymbol::unscopables()),
        JsValue::Object(unscopables),
    );

    let ctor = interp.create_native_constructor("Array", array_constructor, 1, &proto);
    interp.register_method(&ctor, "isArray", array_is_array, 1);
    interp.register_method(&ctor, "of", array_of, 0);
    interp.register_method(&ctor, "from", array_from, 1);
    super::register_species(interp, &ctor);
    interp.realm.set(Intrinsic::Array, ctor);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Property key for an array index, spilling to a string past `u32` range
fn index_key(i: u64) -> PropertyKey {
    match u32::try_from(i) {
        Ok(n) if n != u32::MAX => PropertyKey::Index(n),
        _ => PropertyKey::from(JsString::from(i.to_string())),
    }
}

fn get_index(interp: &mut Interpreter, o: &JsObjectRef, i: u64) -> Result<JsValue, JsError> {
    interp.get(o, &index_key(i))
}

fn has_index(interp: &mut Interpreter, o: &JsObjectRef, i: u64) -> Result<bool, JsError> {
    interp.has_property(o, &index_key(i))
}

fn set_index(interp: &mut Interpreter, o: &JsObjectRef, i: u64, v: JsValue) -> Result<(), JsError> {
    interp.set_or_throw(o, index_key(i), v)
}

fn delete_index(interp: &mut Interpreter, o: &JsObjectRef, i: u64) -> Result<(), JsError> {
    if interp.delete_property(o, &index_key(i))? {
        Ok(())
    } else {
        Err(JsError::type_error(format!("Cannot delete property '{i}' of [object Array]")))
    }
}

fn set_length(interp: &mut Interpreter, o: &JsObjectRef, len: u64) -> Result<(), JsError> {
    interp.set_or_throw(o, PropertyKey::from("length"), JsValue::number(len as f64))
}

fn number_value(n: u64) -> JsValue {
    JsValue::number(n as f64)
}

/// `ToObject(this)` and its length
fn this_and_length(interp: &mut Interpreter, this: &JsValue) -> Result<(JsObjectRef, u64), JsError> {
    let o = interp.to_object(this)?;
    let len = interp.length_of_array_like(&o)?;
    Ok((o, len))
}

/// Relative position argument clamped to `0..=len`
fn relative(interp: &mut Interpreter, value: &JsValue, len: u64, default: u64) -> Result<u64, JsError> {
    if value.is_undefined() {
        return Ok(default);
    }
    let rel = interp.to_integer_or_infinity(value)?;
    let len_f = len as f64;
    let pos = if rel < 0.0 { (len_f + rel).max(0.0) } else { rel.min(len_f) };
    Ok(pos as u64)
}

/// `ArrayCreate(len)`
fn array_create(interp: &mut Interpreter, len: u64) -> Result<JsObjectRef, JsError> {
    let Ok(len) = u32::try_from(len) else {
        return Err(JsError::range_error("Invalid array length"));
    };
    let arr = interp.create_array(Vec::new());
    arr.borrow_mut().set_array_length(len);
    Ok(arr)
}

/// `ArraySpeciesCreate(original, len)`
fn array_species_create(interp: &mut Interpreter, original: &JsObjectRef, len: u64) -> Result<JsObjectRef, JsError> {
    if !interp.is_array(&JsValue::Object(original.clone()))? {
        return array_create(interp, len);
    }
    let mut ctor = interp.get(original, &PropertyKey::from("constructor"))?;
    if let JsValue::Object(c) = &ctor {
        ctor = interp.get(c, &PropertyKey::Symbol(JsSymbol::species()))?;
        if ctor.is_null() {
            ctor = JsValue::Undefined;
        }
    }
    if ctor.is_undefined() {
        return array_create(interp, len);
    }
    if !ctor.is_constructor() {
        return Err(JsError::type_error("object.constructor[Symbol.species] is not a constructor"));
    }
    let result = interp.construct(&ctor, &[number_value(len)], None)?;
    interp.require_object(&result, "Array species constructor")
}

fn check_length(len: u64) -> Result<(), JsError> {
    if len > MAX_SAFE_LENGTH {
        Err(JsError::type_error("Array length exceeds the maximum safe integer"))
    } else {
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constructor
// ═══════════════════════════════════════════════════════════════════════════════

/// Array(...items) / new Array(length)
fn array_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let nt = interp.new_target.clone();
    let nt = if nt.is_undefined() {
        JsValue::Object(interp.intrinsic(Intrinsic::Array))
    } else {
        nt
    };
    let proto = interp.get_prototype_from_constructor(&nt, Intrinsic::ArrayPrototype)?;
    let arr = match args {
        [JsValue::Int(n)] => {
            let len = u32::try_from(*n).map_err(|_| JsError::range_error("Invalid array length"))?;
            let arr = interp.alloc(JsObject::array(Some(proto), Vec::new()));
            arr.borrow_mut().set_array_length(len);
            arr
        }
        [JsValue::Float(n)] => {
            let len = *n as u32;
            if f64::from(len) != *n {
                return Err(JsError::range_error("Invalid array length"));
            }
            let arr = interp.alloc(JsObject::array(Some(proto), Vec::new()));
            arr.borrow_mut().set_array_length(len);
            arr
        }
        _ => interp.alloc(JsObject::array(Some(proto), args.to_vec())),
    };
    Ok(JsValue::Object(arr))
}

/// Array.isArray(value)
fn array_is_array(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Bool(interp.is_array(&arg(args, 0))?))
}

/// Array.of(...items)
fn array_of(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    if !this.is_constructor() {
        return Ok(JsValue::Object(interp.create_array(args.to_vec())));
    }
    let a = interp.construct(&this, &[JsValue::from(args.len())], None)?;
    let a = interp.require_object(&a, "Array.of")?;
    for (k, v) in args.iter().enumerate() {
        interp.create_data_property_or_throw(&a, index_key(k as u64), v.clone())?;
    }
    set_length(interp, &a, args.len() as u64)?;
    Ok(JsValue::Object(a))
}

/// Array.from(items, mapFn, thisArg)
fn array_from(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let items = arg(args, 0);
    let map_fn = arg(args, 1);
    let this_arg = arg(args, 2);
    if !map_fn.is_undefined() {
        callback(&map_fn, "Array.from")?;
    }

    let using_iterator = interp.get_method(&items, &PropertyKey::Symbol(JsSymbol::iterator()))?;
    if let Some(method) = using_iterator {
        let a = if this.is_constructor() {
            let a = interp.construct(&this, &[], None)?;
            interp.require_object(&a, "Array.from")?
        } else {
            interp.create_array(Vec::new())
        };
        let mut record = interp.get_iterator_from_method(&items, &method)?;
        let mut k = 0u64;
        while let Some(next) = interp.iterator_step_value(&mut record)? {
            let step = (|| {
                let value = if map_fn.is_undefined() {
                    next
                } else {
                    interp.call_function(&map_fn, this_arg.clone(), &[next, number_value(k)])?
                };
                interp.create_data_property_or_throw(&a, index_key(k), value)
            })();
            if let Err(err) = step {
                return Err(interp.iterator_close_with_error(&record.iterator, err));
            }
            k += 1;
        }
        set_length(interp, &a, k)?;
        return Ok(JsValue::Object(a));
    }

    let array_like = interp.to_object(&items)?;
    let len = interp.length_of_array_like(&array_like)?;
    let a = if this.is_constructor() {
        let a = interp.construct(&this, &[number_value(len)], None)?;
        interp.require_object(&a, "Array.from")?
    } else {
        array_create(interp, len)?
    };
    for k in 0..len {
        let value = get_index(interp, &array_like, k)?;
        let value = if map_fn.is_undefined() {
            value
        } else {
            interp.call_function(&map_fn, this_arg.clone(), &[value, number_value(k)])?
        };
        interp.create_data_property_or_throw(&a, index_key(k), value)?;
    }
    set_length(interp, &a, len)?;
    Ok(JsValue::Object(a))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Mutating methods
// ═══════════════════════════════════════════════════════════════════════════════

/// Array.prototype.push(...items)
pub fn array_push(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    check_length(len + args.len() as u64)?;
    for (i, v) in args.iter().enumerate() {
        set_index(interp, &o, len + i as u64, v.clone())?;
    }
    let new_len = len + args.len() as u64;
    set_length(interp, &o, new_len)?;
    Ok(number_value(new_len))
}

/// Array.prototype.pop()
pub fn array_pop(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    if len == 0 {
        set_length(interp, &o, 0)?;
        return Ok(JsValue::Undefined);
    }
    let last = len - 1;
    let element = get_index(interp, &o, last)?;
    delete_index(interp, &o, last)?;
    set_length(interp, &o, last)?;
    Ok(element)
}

/// Array.prototype.shift()
pub fn array_shift(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    if len == 0 {
        set_length(interp, &o, 0)?;
        return Ok(JsValue::Undefined);
    }
    let first = get_index(interp, &o, 0)?;
    move_elements(interp, &o, 1, 0, len - 1)?;
    delete_index(interp, &o, len - 1)?;
    set_length(interp, &o, len - 1)?;
    Ok(first)
}

/// Array.prototype.unshift(...items)
pub fn array_unshift(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    let count = args.len() as u64;
    if count > 0 {
        check_length(len + count)?;
        move_elements(interp, &o, 0, count, len)?;
        for (j, v) in args.iter().enumerate() {
            set_index(interp, &o, j as u64, v.clone())?;
        }
    }
    set_length(interp, &o, len + count)?;
    Ok(number_value(len + count))
}

/// Move `count` elements from `from` to `to`, preserving holes. Iterates
/// in the direction that never overwrites unread elements.
fn move_elements(interp: &mut Interpreter, o: &JsObjectRef, from: u64, to: u64, count: u64) -> Result<(), JsError> {
    let step = |k: u64| -> u64 { if from > to { k } else { count - 1 - k } };
    for k in 0..count {
        let i = step(k);
        let (src, dst) = (from + i, to + i);
        if has_index(interp, o, src)? {
            let v = get_index(interp, o, src)?;
            set_index(interp, o, dst, v)?;
        } else {
            delete_index(interp, o, dst)?;
        }
    }
    Ok(())
}

/// Array.prototype.splice(start, deleteCount, ...items)
pub fn array_splice(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    let start = relative(interp, &arg(args, 0), len, 0)?;
    let items = args.get(2..).unwrap_or_default();
    let delete_count = match args.len() {
        0 => 0,
        1 => len - start,
        _ => {
            let dc = interp.to_integer_or_infinity(&arg(args, 1))?;
            (dc.max(0.0) as u64).min(len - start)
        }
    };
    let item_count = items.len() as u64;
    check_length(len - delete_count + item_count)?;

    let removed = array_species_create(interp, &o, delete_count)?;
    for k in 0..delete_count {
        if has_index(interp, &o, start + k)? {
            let v = get_index(interp, &o, start + k)?;
            interp.create_data_property_or_throw(&removed, index_key(k), v)?;
        }
    }
    set_length(interp, &removed, delete_count)?;

    let tail = len - start - delete_count;
    if item_count < delete_count {
        move_elements(interp, &o, start + delete_count, start + item_count, tail)?;
        let new_len = len - delete_count + item_count;
        let mut k = len;
        while k > new_len {
            delete_index(interp, &o, k - 1)?;
            k -= 1;
        }
    } else if item_count > delete_count {
        move_elements(interp, &o, start + delete_count, start + item_count, tail)?;
    }
    for (j, v) in items.iter().enumerate() {
        set_index(interp, &o, start + j as u64, v.clone())?;
    }
    set_length(interp, &o, len - delete_count + item_count)?;
    Ok(JsValue::Object(removed))
}

/// Array.prototype.reverse()
pub fn array_reverse(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    let middle = len / 2;
    for lower in 0..middle {
        let upper = len - lower - 1;
        let lower_exists = has_index(interp, &o, lower)?;
        let lower_value = if lower_exists { get_index(interp, &o, lower)? } else { JsValue::Undefined };
        let upper_exists = has_index(interp, &o, upper)?;
        let upper_value = if upper_exists { get_index(interp, &o, upper)? } else { JsValue::Undefined };
        match (lower_exists, upper_exists) {
            (true, true) => {
                set_index(interp, &o, lower, upper_value)?;
                set_index(interp, &o, upper, lower_value)?;
            }
            (false, true) => {
                set_index(interp, &o, lower, upper_value)?;
                delete_index(interp, &o, upper)?;
            }
            (true, false) => {
                delete_index(interp, &o, lower)?;
                set_index(interp, &o, upper, lower_value)?;
            }
            (false, false) => {}
        }
    }
    Ok(JsValue::Object(o))
}

/// `SortCompare`: undefined sorts last, then the comparator or string order
fn sort_compare(interp: &mut Interpreter, cmp: &JsValue, a: &JsValue, b: &JsValue) -> Result<Ordering, JsError> {
    match (a.is_undefined(), b.is_undefined()) {
        (true, true) => return Ok(Ordering::Equal),
        (true, false) => return Ok(Ordering::Greater),
        (false, true) => return Ok(Ordering::Less),
        (false, false) => {}
    }
    if !cmp.is_undefined() {
        let r = interp.call_function(cmp, JsValue::Undefined, &[a.clone(), b.clone()])?;
        let n = interp.to_number(&r)?;
        return Ok(if n < 0.0 {
            Ordering::Less
        } else if n > 0.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        });
    }
    let a = interp.to_string(a)?;
    let b = interp.to_string(b)?;
    Ok(a.cmp(&b))
}

/// Stable merge sort with a fallible comparator
pub(crate) fn sort_values(
    interp: &mut Interpreter,
    mut values: Vec<JsValue>,
    compare: &mut dyn FnMut(&mut Interpreter, &JsValue, &JsValue) -> Result<Ordering, JsError>,
) -> Result<Vec<JsValue>, JsError> {
    if values.len() <= 1 {
        return Ok(values);
    }
    let right = values.split_off(values.len() / 2);
    let left = sort_values(interp, values, compare)?;
    let right = sort_values(interp, right, compare)?;
    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        let take_right = compare(interp, l, r)? == Ordering::Greater;
        let next = if take_right { right.next() } else { left.next() };
        out.extend(next);
    }
    out.extend(left);
    out.extend(right);
    Ok(out)
}

fn comparator(args: &[JsValue], method: &str) -> Result<JsValue, JsError> {
    let cmp = arg(args, 0);
    if cmp.is_undefined() || cmp.is_callable() {
        Ok(cmp)
    } else {
        Err(JsError::type_error(format!(
            "The comparison function must be either a function or undefined in Array.prototype.{method}"
        )))
    }
}

/// Array.prototype.sort(comparefn)
pub fn array_sort(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let cmp = comparator(args, "sort")?;
    let (o, len) = this_and_length(interp, &this)?;
    let mut present = Vec::new();
    for k in 0..len {
        if has_index(interp, &o, k)? {
            present.push(get_index(interp, &o, k)?);
        }
    }
    let count = present.len() as u64;
    let sorted = sort_values(interp, present, &mut |interp: &mut Interpreter, a: &JsValue, b: &JsValue| {
        sort_compare(interp, &cmp, a, b)
    })?;
    for (k, v) in sorted.into_iter().enumerate() {
        set_index(interp, &o, k as u64, v)?;
    }
    for k in count..len {
        delete_index(interp, &o, k)?;
    }
    Ok(JsValue::Object(o))
}

/// Array.prototype.fill(value, start, end)
pub fn array_fill(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    let start = relative(interp, &arg(args, 1), len, 0)?;
    let end = relative(interp, &arg(args, 2), len, len)?;
    for k in start..end {
        set_index(interp, &o, k, arg(args, 0))?;
    }
    Ok(JsValue::Object(o))
}

/// Array.prototype.copyWithin(target, start, end)
pub fn array_copy_within(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    let to = relative(interp, &arg(args, 0), len, 0)?;
    let from = relative(interp, &arg(args, 1), len, 0)?;
    let end = relative(interp, &arg(args, 2), len, len)?;
    let count = end.saturating_sub(from).min(len - to);
    move_elements(interp, &o, from, to, count)?;
    Ok(JsValue::Object(o))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Accessor methods
// ═══════════════════════════════════════════════════════════════════════════════

/// Array.prototype.at(index)
pub fn array_at(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    let rel = interp.to_integer_or_infinity(&arg(args, 0))?;
    let k = if rel >= 0.0 { rel } else { len as f64 + rel };
    if k < 0.0 || k >= len as f64 {
        return Ok(JsValue::Undefined);
    }
    get_index(interp, &o, k as u64)
}

fn is_concat_spreadable(interp: &mut Interpreter, value: &JsValue) -> Result<bool, JsError> {
    let JsValue::Object(obj) = value else {
        return Ok(false);
    };
    let spreadable = interp.get(obj, &PropertyKey::Symbol(JsSymbol::is_concat_spreadable()))?;
    if !spreadable.is_undefined() {
        return Ok(spreadable.to_boolean());
    }
    interp.is_array(value)
}

/// Array.prototype.concat(...items)
pub fn array_concat(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = interp.to_object(&this)?;
    let a = array_species_create(interp, &o, 0)?;
    let mut n = 0u64;
    let items = std::iter::once(JsValue::Object(o)).chain(args.iter().cloned());
    for item in items {
        if is_concat_spreadable(interp, &item)? {
            let Some(e) = item.as_object() else {
                continue;
            };
            let len = interp.length_of_array_like(e)?;
            check_length(n + len)?;
            for k in 0..len {
                if has_index(interp, e, k)? {
                    let v = get_index(interp, e, k)?;
                    interp.create_data_property_or_throw(&a, index_key(n), v)?;
                }
                n += 1;
            }
        } else {
            check_length(n + 1)?;
            interp.create_data_property_or_throw(&a, index_key(n), item)?;
            n += 1;
        }
    }
    set_length(interp, &a, n)?;
    Ok(JsValue::Object(a))
}

/// Array.prototype.slice(start, end)
pub fn array_slice(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    let start = relative(interp, &arg(args, 0), len, 0)?;
    let end = relative(interp, &arg(args, 1), len, len)?;
    let count = end.saturating_sub(start);
    let a = array_species_create(interp, &o, count)?;
    let mut n = 0u64;
    for k in start..end {
        if has_index(interp, &o, k)? {
            let v = get_index(interp, &o, k)?;
            interp.create_data_property_or_throw(&a, index_key(n), v)?;
        }
        n += 1;
    }
    set_length(interp, &a, n)?;
    Ok(JsValue::Object(a))
}

/// Join elements with `sep`, rendering each through `render`. Arrays
/// already being joined higher up the stack render as empty strings.
fn join_with(
    interp: &mut Interpreter,
    o: &JsObjectRef,
    sep: &JsString,
    render: fn(&mut Interpreter, JsValue) -> Result<JsString, JsError>,
) -> Result<JsValue, JsError> {
    if interp.join_stack.iter().any(|seen| seen.ptr_eq(o)) {
        return Ok(JsValue::String(JsString::empty()));
    }
    interp.join_stack.push(o.clone());
    let result = (|| {
        let len = interp.length_of_array_like(o)?;
        let mut out = JsStringBuilder::new();
        for k in 0..len {
            if k > 0 {
                out.push_js(sep);
            }
            let element = get_index(interp, o, k)?;
            if !element.is_nullish() {
                let s = render(interp, element)?;
                out.push_js(&s);
            }
        }
        Ok(JsValue::String(out.finish()))
    })();
    interp.join_stack.pop();
    result
}

fn render_plain(interp: &mut Interpreter, v: JsValue) -> Result<JsString, JsError> {
    interp.to_string(&v)
}

fn render_locale(interp: &mut Interpreter, v: JsValue) -> Result<JsString, JsError> {
    let s = interp.invoke(&v, &PropertyKey::from("toLocaleString"), &[])?;
    interp.to_string(&s)
}

/// Array.prototype.join(separator)
pub fn array_join(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = interp.to_object(&this)?;
    let sep = match arg(args, 0) {
        JsValue::Undefined => JsString::from(","),
        v => interp.to_string(&v)?,
    };
    join_with(interp, &o, &sep, render_plain)
}

/// Array.prototype.toString()
pub fn array_to_string(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = interp.to_object(&this)?;
    let join = interp.get(&o, &PropertyKey::from("join"))?;
    if join.is_callable() {
        return interp.call_function(&join, JsValue::Object(o), &[]);
    }
    super::object::object_to_string(interp, JsValue::Object(o), &[])
}

/// Array.prototype.toLocaleString()
pub(crate) fn array_to_locale_string(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = interp.to_object(&this)?;
    join_with(interp, &o, &JsString::from(","), render_locale)
}

/// Array.prototype.indexOf(searchElement, fromIndex)
pub fn array_index_of(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    if len == 0 {
        return Ok(JsValue::from(-1));
    }
    let start = relative(interp, &arg(args, 1), len, 0)?;
    let target = arg(args, 0);
    for k in start..len {
        if has_index(interp, &o, k)? && get_index(interp, &o, k)?.strict_equals(&target) {
            return Ok(number_value(k));
        }
    }
    Ok(JsValue::from(-1))
}

/// Array.prototype.lastIndexOf(searchElement, fromIndex)
pub fn array_last_index_of(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    if len == 0 {
        return Ok(JsValue::from(-1));
    }
    let from = if args.len() > 1 {
        let n = interp.to_integer_or_infinity(&arg(args, 1))?;
        if n >= 0.0 { n.min(len as f64 - 1.0) } else { len as f64 + n }
    } else {
        len as f64 - 1.0
    };
    if from < 0.0 {
        return Ok(JsValue::from(-1));
    }
    let target = arg(args, 0);
    let mut k = from as u64 + 1;
    while k > 0 {
        k -= 1;
        if has_index(interp, &o, k)? && get_index(interp, &o, k)?.strict_equals(&target) {
            return Ok(number_value(k));
        }
    }
    Ok(JsValue::from(-1))
}

/// Array.prototype.includes(searchElement, fromIndex)
pub fn array_includes(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    if len == 0 {
        return Ok(JsValue::Bool(false));
    }
    let start = relative(interp, &arg(args, 1), len, 0)?;
    let target = arg(args, 0);
    for k in start..len {
        if get_index(interp, &o, k)?.same_value_zero(&target) {
            return Ok(JsValue::Bool(true));
        }
    }
    Ok(JsValue::Bool(false))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Iteration methods
// ═══════════════════════════════════════════════════════════════════════════════

/// Call `f(element, index, o)` for every present element in order
fn each_present(
    interp: &mut Interpreter,
    o: &JsObjectRef,
    len: u64,
    args: &[JsValue],
    method: &str,
    mut visit: impl FnMut(&mut Interpreter, u64, JsValue, JsValue) -> Result<bool, JsError>,
) -> Result<(), JsError> {
    let f = callback(&arg(args, 0), method)?;
    let this_arg = arg(args, 1);
    for k in 0..len {
        if !has_index(interp, o, k)? {
            continue;
        }
        let element = get_index(interp, o, k)?;
        let result = interp.call_function(
            &f,
            this_arg.clone(),
            &[element.clone(), number_value(k), JsValue::Object(o.clone())],
        )?;
        if !visit(interp, k, element, result)? {
            break;
        }
    }
    Ok(())
}

/// Array.prototype.forEach(callbackfn, thisArg)
pub fn array_for_each(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    each_present(interp, &o, len, args, "Array.prototype.forEach", |_, _, _, _| Ok(true))?;
    Ok(JsValue::Undefined)
}

/// Array.prototype.map(callbackfn, thisArg)
pub fn array_map(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    callback(&arg(args, 0), "Array.prototype.map")?;
    let a = array_species_create(interp, &o, len)?;
    each_present(interp, &o, len, args, "Array.prototype.map", |interp, k, _, mapped| {
        interp.create_data_property_or_throw(&a, index_key(k), mapped)?;
        Ok(true)
    })?;
    Ok(JsValue::Object(a))
}

/// Array.prototype.filter(callbackfn, thisArg)
pub fn array_filter(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    callback(&arg(args, 0), "Array.prototype.filter")?;
    let a = array_species_create(interp, &o, 0)?;
    let mut to = 0u64;
    each_present(interp, &o, len, args, "Array.prototype.filter", |interp, _, element, selected| {
        if selected.to_boolean() {
            interp.create_data_property_or_throw(&a, index_key(to), element)?;
            to += 1;
        }
        Ok(true)
    })?;
    Ok(JsValue::Object(a))
}

/// Array.prototype.every(callbackfn, thisArg)
pub fn array_every(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    let mut all = true;
    each_present(interp, &o, len, args, "Array.prototype.every", |_, _, _, r| {
        all = r.to_boolean();
        Ok(all)
    })?;
    Ok(JsValue::Bool(all))
}

/// Array.prototype.some(callbackfn, thisArg)
pub fn array_some(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    let mut any = false;
    each_present(interp, &o, len, args, "Array.prototype.some", |_, _, _, r| {
        any = r.to_boolean();
        Ok(!any)
    })?;
    Ok(JsValue::Bool(any))
}

fn reduce(interp: &mut Interpreter, this: JsValue, args: &[JsValue], from_right: bool) -> Result<JsValue, JsError> {
    let method = if from_right { "reduceRight" } else { "reduce" };
    let (o, len) = this_and_length(interp, &this)?;
    let f = callback(&arg(args, 0), &format!("Array.prototype.{method}"))?;
    let index = |i: u64| if from_right { len - 1 - i } else { i };
    let mut i = 0u64;
    let mut acc = if args.len() >= 2 {
        arg(args, 1)
    } else {
        loop {
            if i >= len {
                return Err(JsError::type_error("Reduce of empty array with no initial value"));
            }
            let k = index(i);
            i += 1;
            if has_index(interp, &o, k)? {
                break get_index(interp, &o, k)?;
            }
        }
    };
    while i < len {
        let k = index(i);
        i += 1;
        if has_index(interp, &o, k)? {
            let element = get_index(interp, &o, k)?;
            acc = interp.call_function(
                &f,
                JsValue::Undefined,
                &[acc, element, number_value(k), JsValue::Object(o.clone())],
            )?;
        }
    }
    Ok(acc)
}

/// Array.prototype.reduce(callbackfn, initialValue)
pub fn array_reduce(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    reduce(interp, this, args, false)
}

/// Array.prototype.reduceRight(callbackfn, initialValue)
pub fn array_reduce_right(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    reduce(interp, this, args, true)
}

/// `FindViaPredicate`: visits holes as `undefined`
fn find_via_predicate(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
    method: &str,
    from_end: bool,
) -> Result<Option<(u64, JsValue)>, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    let predicate = callback(&arg(args, 0), method)?;
    let this_arg = arg(args, 1);
    for i in 0..len {
        let k = if from_end { len - 1 - i } else { i };
        let value = get_index(interp, &o, k)?;
        let r = interp.call_function(
            &predicate,
            this_arg.clone(),
            &[value.clone(), number_value(k), JsValue::Object(o.clone())],
        )?;
        if r.to_boolean() {
            return Ok(Some((k, value)));
        }
    }
    Ok(None)
}

/// Array.prototype.find(predicate, thisArg)
pub fn array_find(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let found = find_via_predicate(interp, this, args, "Array.prototype.find", false)?;
    Ok(found.map(|(_, v)| v).unwrap_or_default())
}

/// Array.prototype.findIndex(predicate, thisArg)
pub fn array_find_index(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let found = find_via_predicate(interp, this, args, "Array.prototype.findIndex", false)?;
    Ok(found.map_or(JsValue::from(-1), |(k, _)| number_value(k)))
}

/// Array.prototype.findLast(predicate, thisArg)
pub fn array_find_last(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let found = find_via_predicate(interp, this, args, "Array.prototype.findLast", true)?;
    Ok(found.map(|(_, v)| v).unwrap_or_default())
}

/// Array.prototype.findLastIndex(predicate, thisArg)
pub fn array_find_last_index(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let found = find_via_predicate(interp, this, args, "Array.prototype.findLastIndex", true)?;
    Ok(found.map_or(JsValue::from(-1), |(k, _)| number_value(k)))
}

/// `FlattenIntoArray`; returns the next target index
fn flatten_into(
    interp: &mut Interpreter,
    target: &JsObjectRef,
    source: &JsObjectRef,
    source_len: u64,
    start: u64,
    depth: f64,
    mapper: Option<(&JsValue, &JsValue)>,
) -> Result<u64, JsError> {
    let mut target_index = start;
    for k in 0..source_len {
        if !has_index(interp, source, k)? {
            continue;
        }
        let mut element = get_index(interp, source, k)?;
        if let Some((f, this_arg)) = mapper {
            element = interp.call_function(
                f,
                this_arg.clone(),
                &[element, number_value(k), JsValue::Object(source.clone())],
            )?;
        }
        let flatten = depth > 0.0 && interp.is_array(&element)?;
        match (&element, flatten) {
            (JsValue::Object(inner), true) => {
                let len = interp.length_of_array_like(inner)?;
                target_index = interp.nested(|interp| {
                    flatten_into(interp, target, inner, len, target_index, depth - 1.0, None)
                })?;
            }
            _ => {
                check_length(target_index + 1)?;
                interp.create_data_property_or_throw(target, index_key(target_index), element)?;
                target_index += 1;
            }
        }
    }
    Ok(target_index)
}

/// Array.prototype.flat(depth)
pub fn array_flat(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    let depth = match arg(args, 0) {
        JsValue::Undefined => 1.0,
        v => interp.to_integer_or_infinity(&v)?.max(0.0),
    };
    let a = array_species_create(interp, &o, 0)?;
    flatten_into(interp, &a, &o, len, 0, depth, None)?;
    Ok(JsValue::Object(a))
}

/// Array.prototype.flatMap(mapper, thisArg)
pub fn array_flat_map(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    let f = callback(&arg(args, 0), "Array.prototype.flatMap")?;
    let this_arg = arg(args, 1);
    let a = array_species_create(interp, &o, 0)?;
    flatten_into(interp, &a, &o, len, 0, 1.0, Some((&f, &this_arg)))?;
    Ok(JsValue::Object(a))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Copying variants
// ═══════════════════════════════════════════════════════════════════════════════

fn read_all(interp: &mut Interpreter, o: &JsObjectRef, len: u64) -> Result<Vec<JsValue>, JsError> {
    let mut out = Vec::with_capacity(len.min(1 << 16) as usize);
    for k in 0..len {
        out.push(get_index(interp, o, k)?);
    }
    Ok(out)
}

fn copy_result(interp: &mut Interpreter, len: u64, values: Vec<JsValue>) -> Result<JsValue, JsError> {
    if u32::try_from(len).is_err() {
        return Err(JsError::range_error("Invalid array length"));
    }
    Ok(JsValue::Object(interp.create_array(values)))
}

/// Array.prototype.toReversed()
pub fn array_to_reversed(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    let mut values = read_all(interp, &o, len)?;
    values.reverse();
    copy_result(interp, len, values)
}

/// Array.prototype.toSorted(comparefn)
pub fn array_to_sorted(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let cmp = comparator(args, "toSorted")?;
    let (o, len) = this_and_length(interp, &this)?;
    let values = read_all(interp, &o, len)?;
    let sorted = sort_values(interp, values, &mut |interp: &mut Interpreter, a: &JsValue, b: &JsValue| {
        sort_compare(interp, &cmp, a, b)
    })?;
    copy_result(interp, len, sorted)
}

/// Array.prototype.toSpliced(start, skipCount, ...items)
pub fn array_to_spliced(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    let start = relative(interp, &arg(args, 0), len, 0)?;
    let items = args.get(2..).unwrap_or_default();
    let skip = match args.len() {
        0 => 0,
        1 => len - start,
        _ => {
            let sc = interp.to_integer_or_infinity(&arg(args, 1))?;
            (sc.max(0.0) as u64).min(len - start)
        }
    };
    let new_len = len + items.len() as u64 - skip;
    check_length(new_len)?;
    let mut values = Vec::new();
    for k in 0..start {
        values.push(get_index(interp, &o, k)?);
    }
    values.extend(items.iter().cloned());
    for k in start + skip..len {
        values.push(get_index(interp, &o, k)?);
    }
    copy_result(interp, new_len, values)
}

/// Array.prototype.with(index, value)
pub fn array_with(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (o, len) = this_and_length(interp, &this)?;
    let rel = interp.to_integer_or_infinity(&arg(args, 0))?;
    let actual = if rel >= 0.0 { rel } else { len as f64 + rel };
    if actual < 0.0 || actual >= len as f64 {
        return Err(JsError::range_error("Invalid index"));
    }
    let mut values = read_all(interp, &o, len)?;
    if let Some(slot) = values.get_mut(actual as usize) {
        *slot = arg(args, 1);
    }
    copy_result(interp, len, values)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Iterators
// ═══════════════════════════════════════════════════════════════════════════════

/// Array.prototype.keys()
pub fn array_keys(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = interp.to_object(&this)?;
    Ok(iterator::create_array_iterator(interp, o, EnumKind::Keys))
}

/// Array.prototype.values() and [Symbol.iterator]()
pub fn array_values(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = interp.to_object(&this)?;
    Ok(iterator::create_array_iterator(interp, o, EnumKind::Values))
}

/// Array.prototype.entries()
pub fn array_entries(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let o = interp.to_object(&this)?;
    Ok(iterator::create_array_iterator(interp, o, EnumKind::Entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(interp: &mut Interpreter, values: &[i32]) -> JsObjectRef {
        interp.create_array(values.iter().map(|&n| JsValue::from(n)).collect())
    }

    fn contents(arr: &JsObjectRef) -> Vec<JsValue> {
        arr.borrow().elements.clone()
    }

    #[test]
    fn splice_removes_and_inserts() {
        let mut interp = Interpreter::new(0, false);
        let arr = numbers(&mut interp, &[1, 2, 3, 4, 5]);
        let removed = array_splice(
            &mut interp,
            JsValue::Object(arr.clone()),
            &[JsValue::from(1), JsValue::from(2), JsValue::from(9)],
        );
        let Ok(JsValue::Object(removed)) = removed else {
            panic!("splice failed");
        };
        assert_eq!(contents(&removed), vec![JsValue::from(2), JsValue::from(3)]);
        assert_eq!(
            contents(&arr),
            vec![JsValue::from(1), JsValue::from(9), JsValue::from(4), JsValue::from(5)]
        );
        assert_eq!(arr.borrow().array_length(), Some(4));
    }

    #[test]
    fn default_sort_is_lexicographic_with_undefined_last() {
        let mut interp = Interpreter::new(0, false);
        let arr = interp.create_array(vec![
            JsValue::Undefined,
            JsValue::from(10),
            JsValue::from(9),
            JsValue::from(1),
        ]);
        assert!(array_sort(&mut interp, JsValue::Object(arr.clone()), &[]).is_ok());
        assert_eq!(
            contents(&arr),
            vec![JsValue::from(1), JsValue::from(10), JsValue::from(9), JsValue::Undefined]
        );
    }

    #[test]
    fn join_of_cyclic_array_is_empty_inside() {
        let mut interp = Interpreter::new(0, false);
        let arr = numbers(&mut interp, &[1, 2]);
        arr.borrow_mut()
            .set_property(PropertyKey::Index(2), JsValue::Object(arr.clone()));
        let joined = array_join(&mut interp, JsValue::Object(arr), &[]);
        assert_eq!(joined.ok(), Some(JsValue::from("1,2,")));
    }

    #[test]
    fn index_key_spills_past_u32() {
        assert_eq!(index_key(7), PropertyKey::Index(7));
        assert!(matches!(index_key(u64::from(u32::MAX)), PropertyKey::String(_)));
    }
}
