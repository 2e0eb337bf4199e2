//! Host bridge: moving values between Rust and scripts.
//!
//! Host data crosses the boundary through `serde`: anything `Serialize` can
//! become a script value (`to_value`) and any script value can be exported
//! into a `Deserialize` type (`export_to`). Both go through
//! `serde_json::Value` as the interchange form. Live host state that must
//! stay shared with scripts uses the handler traits in `dynamic` instead.

pub mod dynamic;
pub mod native;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::interpreter::builtins::date;
use crate::interpreter::ops::EnumKind;
use crate::object::{JsObjectRef, ObjectKind};
use crate::string::JsString;
use crate::value::{JsValue, MAX_SAFE_INT, PropertyKey};

/// Nesting limit for conversions in either direction
const MAX_DEPTH: usize = 512;

// ═══════════════════════════════════════════════════════════════════════════════
// Field names
// ═══════════════════════════════════════════════════════════════════════════════

/// Renames struct fields as they cross the bridge.
///
/// The mapping applies to every object key of a converted value, nested
/// ones included.
pub trait FieldNameMapper {
    /// Script-side name of a host field. `None` hides the field.
    fn field_name(&self, field: &str) -> Option<String>;

    /// Host field a script property is exported into
    fn host_name(&self, property: &str) -> String;
}

/// `snake_case` fields appear as `camelCase` properties
#[derive(Debug, Clone, Copy, Default)]
pub struct CamelCaseFieldNames;

impl FieldNameMapper for CamelCaseFieldNames {
    fn field_name(&self, field: &str) -> Option<String> {
        let mut out = String::with_capacity(field.len());
        let mut upper = false;
        for (i, c) in field.chars().enumerate() {
            if c == '_' && i > 0 {
                upper = true;
            } else if upper {
                out.extend(c.to_uppercase());
                upper = false;
            } else {
                out.push(c);
            }
        }
        Some(out)
    }

    fn host_name(&self, property: &str) -> String {
        let mut out = String::with_capacity(property.len() + 4);
        for c in property.chars() {
            if c.is_ascii_uppercase() {
                out.push('_');
                out.push(c.to_ascii_lowercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

/// Rename object keys for the script side, dropping hidden fields
fn map_to_script(json: serde_json::Value, mapper: &dyn FieldNameMapper) -> serde_json::Value {
    match json {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .filter_map(|(k, v)| {
                    let name = mapper.field_name(&k).filter(|n| !n.is_empty())?;
                    Some((name, map_to_script(v, mapper)))
                })
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(|v| map_to_script(v, mapper)).collect())
        }
        other => other,
    }
}

fn map_to_host(json: serde_json::Value, mapper: &dyn FieldNameMapper) -> serde_json::Value {
    match json {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| (mapper.host_name(&k), map_to_host(v, mapper)))
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(|v| map_to_host(v, mapper)).collect())
        }
        other => other,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// serde_json::Value <-> JsValue
// ═══════════════════════════════════════════════════════════════════════════════

/// Build fresh script values from JSON. Object keys become own data
/// properties in source order, `__proto__` included.
pub fn from_json(interp: &mut Interpreter, json: &serde_json::Value) -> JsValue {
    match json {
        serde_json::Value::Null => JsValue::Null,
        serde_json::Value::Bool(b) => JsValue::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => JsValue::int(i),
            None => JsValue::number(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => JsValue::String(JsString::from(s.as_str())),
        serde_json::Value::Array(items) => {
            let elements = items.iter().map(|item| crate::stack::guard(|| from_json(interp, item))).collect();
            JsValue::Object(interp.create_array(elements))
        }
        serde_json::Value::Object(map) => {
            let obj = interp.create_object();
            for (key, value) in map {
                let value = crate::stack::guard(|| from_json(interp, value));
                obj.borrow_mut().set_property(PropertyKey::from(key.as_str()), value);
            }
            JsValue::Object(obj)
        }
    }
}

/// Snapshot a script value as JSON.
///
/// Follows `JSON.stringify` for what has no JSON form: functions,
/// symbols and `undefined` are dropped from objects and become `null` in
/// arrays. Dates export as ISO strings, Maps as objects (or entry lists
/// when a key is not a string or number), Sets and typed arrays as arrays.
/// Cycles are a `TypeError`.
pub fn to_json(interp: &mut Interpreter, value: &JsValue) -> Result<serde_json::Value, JsError> {
    let mut path = Vec::new();
    Ok(export_value(interp, value, &mut path)?.unwrap_or(serde_json::Value::Null))
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INT as f64 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

/// `None` for values with no JSON form
fn export_value(
    interp: &mut Interpreter,
    value: &JsValue,
    path: &mut Vec<JsObjectRef>,
) -> Result<Option<serde_json::Value>, JsError> {
    let json = match value {
        JsValue::Undefined | JsValue::Symbol(_) => return Ok(None),
        JsValue::Null => serde_json::Value::Null,
        JsValue::Bool(b) => serde_json::Value::Bool(*b),
        JsValue::Int(i) => serde_json::Value::from(*i),
        JsValue::Float(f) => number_to_json(*f),
        JsValue::String(s) => serde_json::Value::String(s.to_std_string()),
        JsValue::Object(obj) => {
            if obj.borrow().is_callable() {
                return Ok(None);
            }
            if path.iter().any(|p| p.ptr_eq(obj)) {
                return Err(JsError::type_error("Converting circular structure"));
            }
            if path.len() >= MAX_DEPTH {
                return Err(JsError::range_error("Value is nested too deeply to export"));
            }
            path.push(obj.clone());
            let result = export_object(interp, obj, path);
            path.pop();
            result?
        }
    };
    Ok(Some(json))
}

fn export_object(
    interp: &mut Interpreter,
    obj: &JsObjectRef,
    path: &mut Vec<JsObjectRef>,
) -> Result<serde_json::Value, JsError> {
    enum Shape {
        Primitive(JsValue),
        Date(f64),
        Numbers(Vec<f64>),
        Entries(Vec<(JsValue, JsValue)>),
        Items(Vec<JsValue>),
        Other,
    }
    let shape = match &obj.borrow().kind {
        ObjectKind::Boolean(b) => Shape::Primitive(JsValue::Bool(*b)),
        ObjectKind::Number(n) => Shape::Primitive(JsValue::number(*n)),
        ObjectKind::String(s) => Shape::Primitive(JsValue::String(s.clone())),
        ObjectKind::Date(t) => Shape::Date(*t),
        ObjectKind::TypedArray(ta) => Shape::Numbers(ta.values()),
        ObjectKind::Map(m) => Shape::Entries(m.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        ObjectKind::Set(m) => Shape::Items(m.iter().map(|(k, _)| k.clone()).collect()),
        _ => Shape::Other,
    };
    match shape {
        Shape::Primitive(v) => Ok(export_value(interp, &v, path)?.unwrap_or(serde_json::Value::Null)),
        Shape::Date(t) if t.is_finite() => Ok(serde_json::Value::String(date::format_iso(t))),
        Shape::Date(_) => Ok(serde_json::Value::Null),
        Shape::Numbers(ns) => Ok(serde_json::Value::Array(ns.into_iter().map(number_to_json).collect())),
        Shape::Items(items) => export_items(interp, &items, path),
        Shape::Entries(entries) => {
            let keyed = entries
                .iter()
                .all(|(k, _)| matches!(k, JsValue::String(_) | JsValue::Int(_) | JsValue::Float(_)));
            if keyed {
                let mut map = serde_json::Map::new();
                for (k, v) in &entries {
                    let key = interp.to_string(k)?.to_std_string();
                    if let Some(json) = export_value(interp, v, path)? {
                        map.insert(key, json);
                    }
                }
                return Ok(serde_json::Value::Object(map));
            }
            let mut pairs = Vec::with_capacity(entries.len());
            for (k, v) in &entries {
                let k = export_value(interp, k, path)?.unwrap_or(serde_json::Value::Null);
                let v = export_value(interp, v, path)?.unwrap_or(serde_json::Value::Null);
                pairs.push(serde_json::Value::Array(vec![k, v]));
            }
            Ok(serde_json::Value::Array(pairs))
        }
        Shape::Other => {
            let value = JsValue::Object(obj.clone());
            if interp.is_array(&value)? {
                let len = interp.length_of_array_like(obj)?;
                let mut items = Vec::new();
                for i in 0..len {
                    items.push(interp.get(obj, &PropertyKey::from(i as usize))?);
                }
                return export_items(interp, &items, path);
            }
            let mut map = serde_json::Map::new();
            for entry in interp.enumerable_own_properties(obj, EnumKind::Keys)? {
                let JsValue::String(key) = entry else {
                    continue;
                };
                let v = interp.get(obj, &PropertyKey::from(key.clone()))?;
                if let Some(json) = export_value(interp, &v, path)? {
                    map.insert(key.to_std_string(), json);
                }
            }
            Ok(serde_json::Value::Object(map))
        }
    }
}

fn export_items(
    interp: &mut Interpreter,
    items: &[JsValue],
    path: &mut Vec<JsObjectRef>,
) -> Result<serde_json::Value, JsError> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(export_value(interp, item, path)?.unwrap_or(serde_json::Value::Null));
    }
    Ok(serde_json::Value::Array(out))
}

// ═══════════════════════════════════════════════════════════════════════════════
// serde
// ═══════════════════════════════════════════════════════════════════════════════

/// Convert a host value, applying the runtime's field-name mapper
pub fn to_value<T: Serialize + ?Sized>(interp: &mut Interpreter, value: &T) -> Result<JsValue, JsError> {
    let json = serde_json::to_value(value).map_err(|e| JsError::type_error(format!("Cannot convert host value: {e}")))?;
    let json = match interp.field_name_mapper.clone() {
        Some(mapper) => map_to_script(json, mapper.as_ref()),
        None => json,
    };
    tracing::trace!("host value converted");
    Ok(from_json(interp, &json))
}

/// Export a script value into a host type
pub fn export_to<T: DeserializeOwned>(interp: &mut Interpreter, value: &JsValue) -> Result<T, JsError> {
    let json = to_json(interp, value)?;
    let json = match interp.field_name_mapper.clone() {
        Some(mapper) => map_to_host(json, mapper.as_ref()),
        None => json,
    };
    serde_json::from_value(json).map_err(|e| JsError::type_error(format!("Cannot export value: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::rc::Rc;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Settings {
        max_items: u32,
        label: String,
        tags: Vec<String>,
    }

    fn interp() -> Interpreter {
        Interpreter::new(0, false)
    }

    #[test]
    fn camel_case_names() {
        let m = CamelCaseFieldNames;
        assert_eq!(m.field_name("max_items").as_deref(), Some("maxItems"));
        assert_eq!(m.field_name("_private").as_deref(), Some("_private"));
        assert_eq!(m.host_name("maxItems"), "max_items");
    }

    #[test]
    fn json_numbers_become_ints_when_integral() {
        let mut interp = interp();
        assert_eq!(from_json(&mut interp, &serde_json::json!(42)), JsValue::Int(42));
        assert_eq!(from_json(&mut interp, &serde_json::json!(1.5)), JsValue::Float(1.5));
    }

    #[test]
    fn struct_round_trip_through_mapper() {
        let mut interp = interp();
        interp.field_name_mapper = Some(Rc::new(CamelCaseFieldNames));
        let settings = Settings {
            max_items: 3,
            label: "x".into(),
            tags: vec!["a".into()],
        };
        let Ok(JsValue::Object(obj)) = to_value(&mut interp, &settings) else {
            panic!("expected object");
        };
        assert_eq!(interp.get(&obj, &PropertyKey::from("maxItems")).ok(), Some(JsValue::Int(3)));
        let back: Result<Settings, _> = export_to(&mut interp, &JsValue::Object(obj));
        assert_eq!(back.ok(), Some(settings));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut interp = interp();
        let obj = interp.create_object();
        obj.borrow_mut().set_property(PropertyKey::from("me"), JsValue::Object(obj.clone()));
        assert!(matches!(
            to_json(&mut interp, &JsValue::Object(obj)),
            Err(JsError::TypeError { .. })
        ));
    }

    #[test]
    fn undefined_drops_from_objects_and_nulls_in_arrays() {
        let mut interp = interp();
        let obj = interp.create_object();
        obj.borrow_mut().set_property(PropertyKey::from("gone"), JsValue::Undefined);
        obj.borrow_mut().set_property(PropertyKey::from("kept"), JsValue::Int(1));
        let arr = interp.create_array(vec![JsValue::Undefined, JsValue::Object(obj)]);
        let json = to_json(&mut interp, &JsValue::Object(arr)).ok();
        assert_eq!(json, Some(serde_json::json!([null, {"kept": 1}])));
    }
}
