//! Symbol built-in methods

use crate::error::JsError;
use crate::object::{Attributes, ObjectKind, Property};
use crate::value::{JsSymbol, JsValue, PropertyKey};

use super::arg;
use crate::interpreter::Interpreter;
use crate::interpreter::realm::Intrinsic;

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::SymbolPrototype).is_some() {
        return;
    }
    let proto = interp.create_object();
    interp.register_method(&proto, "toString", symbol_to_string, 0);
    interp.register_method(&proto, "valueOf", symbol_value_of, 0);
    interp.register_getter(&proto, "description", symbol_description);
    let to_primitive = interp.create_native_function("[Symbol.toPrimitive]", symbol_value_of, 1);
    proto.borrow_mut().define_property(
        PropertyKey::Symbol(JsSymbol::to_primitive()),
        Property::data(JsValue::Object(to_primitive), Attributes::CONFIGURABLE_ONLY),
    );
    super::set_to_string_tag(&proto, "Symbol");

    let ctor = interp.create_native_constructor("Symbol", symbol_constructor, 0, &proto);
    interp.register_method(&ctor, "for", symbol_for, 1);
    interp.register_method(&ctor, "keyFor", symbol_key_for, 1);
    for (name, sym) in [
        ("asyncIterator", JsSymbol::async_iterator()),
        ("hasInstance", JsSymbol::has_instance()),
        ("isConcatSpreadable", JsSymbol::is_concat_spreadable()),
        ("iterator", JsSymbol::iterator()),
        ("match", JsSymbol::match_()),
        ("matchAll", JsSymbol::match_all()),
        ("replace", JsSymbol::replace()),
        ("search", JsSymbol::search()),
        ("species", JsSymbol::species()),
        ("split", JsSymbol::split()),
        ("toPrimitive", JsSymbol::to_primitive()),
        ("toStringTag", JsSymbol::to_string_tag()),
        ("unscopables", JsSymbol::unscopables()),
    ] {
        ctor.borrow_mut().define_property(
            PropertyKey::from(name),
            Property::data(JsValue::Symbol(sym), Attributes::NONE),
        );
    }

    interp.realm.set(Intrinsic::SymbolPrototype, proto);
    interp.realm.set(Intrinsic::Symbol, ctor);
}

/// Symbol(description); not a constructor
fn symbol_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    if !interp.new_target.is_undefined() {
        return Err(JsError::type_error("Symbol is not a constructor"));
    }
    let description = match arg(args, 0) {
        JsValue::Undefined => None,
        v => Some(interp.to_string(&v)?),
    };
    Ok(JsValue::Symbol(JsSymbol::new(description)))
}

/// Symbol.for(key)
fn symbol_for(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let key = interp.to_string(&arg(args, 0))?;
    Ok(JsValue::Symbol(interp.registered_symbol(key)))
}

/// Symbol.keyFor(sym)
fn symbol_key_for(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let JsValue::Symbol(sym) = arg(args, 0) else {
        return Err(JsError::type_error(format!(
            "{} is not a symbol",
            crate::interpreter::ops::describe(&arg(args, 0))
        )));
    };
    Ok(interp.symbol_key(&sym).map(JsValue::String).unwrap_or_default())
}

/// `thisSymbolValue`
fn this_symbol_value(this: &JsValue, method: &str) -> Result<JsSymbol, JsError> {
    match this {
        JsValue::Symbol(s) => Ok(s.clone()),
        JsValue::Object(o) => match &o.borrow().kind {
            ObjectKind::Symbol(s) => Ok(s.clone()),
            _ => Err(JsError::type_error(format!(
                "Symbol.prototype.{method} requires that 'this' be a Symbol"
            ))),
        },
        _ => Err(JsError::type_error(format!(
            "Symbol.prototype.{method} requires that 'this' be a Symbol"
        ))),
    }
}

fn symbol_to_string(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::String(this_symbol_value(&this, "toString")?.descriptive_string()))
}

fn symbol_value_of(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Symbol(this_symbol_value(&this, "valueOf")?))
}

/// get Symbol.prototype.description
fn symbol_description(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let sym = this_symbol_value(&this, "description")?;
    Ok(sym.description().cloned().map(JsValue::String).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::JsObject;

    /// A wrapper object, as `Object(sym)` produces
    fn wrap(interp: &mut Interpreter, sym: JsSymbol) -> JsValue {
        let proto = interp.intrinsic(Intrinsic::SymbolPrototype);
        JsValue::Object(interp.alloc(JsObject::new(ObjectKind::Symbol(sym), Some(proto))))
    }

    #[test]
    fn registry_round_trips() {
        let mut interp = Interpreter::new(0, false);
        let a = symbol_for(&mut interp, JsValue::Undefined, &[JsValue::from("app")]);
        let b = symbol_for(&mut interp, JsValue::Undefined, &[JsValue::from("app")]);
        assert!(a.is_ok() && a.as_ref().ok() == b.as_ref().ok());
        let Ok(sym) = a else {
            panic!("Symbol.for failed");
        };
        let key = symbol_key_for(&mut interp, JsValue::Undefined, &[sym]);
        assert_eq!(key.ok(), Some(JsValue::from("app")));
    }

    #[test]
    fn unregistered_symbol_has_no_key() {
        let mut interp = Interpreter::new(0, false);
        let sym = JsValue::Symbol(JsSymbol::new(None));
        let key = symbol_key_for(&mut interp, JsValue::Undefined, &[sym]);
        assert_eq!(key.ok(), Some(JsValue::Undefined));
    }

    #[test]
    fn wrapper_description() {
        let mut interp = Interpreter::new(0, false);
        let wrapped = wrap(&mut interp, JsSymbol::new(Some("tag".into())));
        let desc = symbol_description(&mut interp, wrapped, &[]);
        assert_eq!(desc.ok(), Some(JsValue::from("tag")));
    }
}
