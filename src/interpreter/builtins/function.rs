//! Function.prototype built-in methods (call, apply, bind) and Function constructor

use crate::compiler::compile;
use crate::error::JsError;
use crate::object::{Attributes, BoundFunction, JsFunction, Property};
use crate::string::{JsString, JsStringBuilder};
use crate::value::{JsSymbol, JsValue, PropertyKey};

use super::arg;
use crate::interpreter::Interpreter;
use crate::interpreter::realm::Intrinsic;

/// Flavour of function the dynamic constructors build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DynamicKind {
    Normal,
    Generator,
    Async,
    AsyncGenerator,
}

impl DynamicKind {
    fn keyword(self) -> &'static str {
        match self {
            DynamicKind::Normal => "function",
            DynamicKind::Generator => "function*",
            DynamicKind::Async => "async function",
            DynamicKind::AsyncGenerator => "async function*",
        }
    }

    fn prototype(self) -> Intrinsic {
        match self {
            DynamicKind::Normal => Intrinsic::FunctionPrototype,
            DynamicKind::Generator => Intrinsic::GeneratorFunctionPrototype,
            DynamicKind::Async => Intrinsic::AsyncFunctionPrototype,
            DynamicKind::AsyncGenerator => Intrinsic::AsyncGeneratorFunctionPrototype,
        }
    }
}

/// Behaviour of `Function.prototype` itself: accepts anything, returns undefined
pub fn function_prototype_call(_interp: &mut Interpreter, _this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Undefined)
}

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::Function).is_some() {
        return;
    }
    let proto = interp.realm.function_prototype.clone();
    {
        let mut p = proto.borrow_mut();
        p.define_property(
            PropertyKey::from("length"),
            Property::data(JsValue::from(0), Attributes::CONFIGURABLE_ONLY),
        );
        p.define_property(
            PropertyKey::from("name"),
            Property::data(JsValue::from(""), Attributes::CONFIGURABLE_ONLY),
        );
    }

    interp.register_method(&proto, "call", function_call, 1);
    interp.register_method(&proto, "apply", function_apply, 2);
    interp.register_method(&proto, "bind", function_bind, 1);
    interp.register_method(&proto, "toString", function_to_string, 0);

    let has_instance = interp.create_native_function("[Symbol.hasInstance]", function_has_instance, 1);
    proto.borrow_mut().define_property(
        PropertyKey::Symbol(JsSymbol::has_instance()),
        Property::data(JsValue::Object(has_instance), Attributes::NONE),
    );

    // `caller` and `arguments` are poisoned on Function.prototype
    let thrower = interp.create_native_function("", throw_type_error, 0);
    {
        let mut t = thrower.borrow_mut();
        t.set_integrity(true);
    }
    for name in ["caller", "arguments"] {
        proto.borrow_mut().define_property(
            PropertyKey::from(name),
            Property::accessor(Some(thrower.clone()), Some(thrower.clone()), Attributes::CONFIGURABLE_ONLY),
        );
    }
    interp.realm.set(Intrinsic::ThrowTypeError, thrower);

    let ctor = interp.create_native_constructor("Function", function_constructor, 1, &proto);
    interp.realm.set(Intrinsic::Function, ctor.clone());
    super::define_global(interp, "Function", JsValue::Object(ctor));
}

fn throw_type_error(_interp: &mut Interpreter, _this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Err(JsError::type_error(
        "'caller', 'callee', and 'arguments' properties may not be accessed on strict mode functions or the arguments objects for calls to them",
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Dynamic functions
// ═══════════════════════════════════════════════════════════════════════════════

/// The Function constructor: new Function([p1[, p2[, ...pN]],] body)
fn function_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    create_dynamic_function(interp, args, DynamicKind::Normal)
}

/// `CreateDynamicFunction`: the last argument is the body, the rest are
/// parameter lists. The function closes over the global scope only.
pub(crate) fn create_dynamic_function(
    interp: &mut Interpreter,
    args: &[JsValue],
    kind: DynamicKind,
) -> Result<JsValue, JsError> {
    let (params, body) = match args.split_last() {
        Some((body, params)) => (params, interp.to_string(body)?),
        None => (args, JsString::empty()),
    };
    let mut param_source = JsStringBuilder::new();
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            param_source.push_str(",");
        }
        let p = interp.to_string(p)?;
        param_source.push_js(&p);
    }
    let param_source = param_source.finish();

    let source = format!("({} anonymous({param_source}\n) {{\n{body}\n}})", kind.keyword());
    let program = compile(&source, "anonymous", false, &interp.parser_options)
        .map_err(|err| match err {
            JsError::Parse(errors) => JsError::syntax_error(
                errors.first().map(|e| e.message.clone()).unwrap_or_default(),
            ),
            other => other,
        })?;
    let func = interp.run_program(program.code)?;

    let nt = interp.new_target.clone();
    let subclassed = match (&nt, &interp.native_callee) {
        (JsValue::Object(n), Some(c)) => !n.ptr_eq(c),
        _ => false,
    };
    if subclassed {
        if let JsValue::Object(f) = &func {
            let proto = interp.get_prototype_from_constructor(&nt, kind.prototype())?;
            f.borrow_mut().prototype = Some(proto);
        }
    }
    Ok(func)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Function.prototype
// ═══════════════════════════════════════════════════════════════════════════════

/// Function.prototype.call(thisArg, ...args)
pub fn function_call(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let this_arg = arg(args, 0);
    let rest = args.get(1..).unwrap_or_default();
    interp.call_function(&this, this_arg, rest)
}

/// Function.prototype.apply(thisArg, argArray)
pub fn function_apply(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    if !this.is_callable() {
        return Err(JsError::type_error("Function.prototype.apply was called on a non-function"));
    }
    let this_arg = arg(args, 0);
    let array = arg(args, 1);
    let call_args = if array.is_nullish() {
        Vec::new()
    } else {
        interp.create_list_from_array_like(&array)?
    };
    interp.call_function(&this, this_arg, &call_args)
}

/// Function.prototype.bind(thisArg, ...args)
pub fn function_bind(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let JsValue::Object(target) = &this else {
        return Err(JsError::type_error("Bind must be called on a function"));
    };
    if !target.borrow().is_callable() {
        return Err(JsError::type_error("Bind must be called on a function"));
    }
    let bound_args: Vec<JsValue> = args.get(1..).unwrap_or_default().to_vec();

    let length = if interp.has_own_property(target, &PropertyKey::from("length"))? {
        match interp.get(target, &PropertyKey::from("length"))? {
            v if v.is_number() => {
                let n = crate::number::to_integer_or_infinity(v.as_number().unwrap_or(0.0));
                (n - bound_args.len() as f64).max(0.0)
            }
            _ => 0.0,
        }
    } else {
        0.0
    };
    let name = match interp.get(target, &PropertyKey::from("name"))? {
        JsValue::String(s) => s,
        _ => JsString::empty(),
    };
    let proto = interp.get_prototype_of(target)?;

    let bound = interp.function_object(
        JsFunction::Bound(BoundFunction {
            target: target.clone(),
            this: arg(args, 0),
            args: bound_args,
        }),
        JsString::from("bound ").concat(&name),
        0,
    );
    {
        let mut b = bound.borrow_mut();
        b.prototype = proto;
        b.define_property(
            PropertyKey::from("length"),
            Property::data(JsValue::number(length), Attributes::CONFIGURABLE_ONLY),
        );
    }
    Ok(JsValue::Object(bound))
}

/// Function.prototype.toString
fn function_to_string(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let JsValue::Object(func) = &this else {
        return Err(JsError::type_error("Function.prototype.toString requires that 'this' be a Function"));
    };
    if !func.borrow().is_callable() {
        return Err(JsError::type_error("Function.prototype.toString requires that 'this' be a Function"));
    }
    let name = interp.function_name(func);
    Ok(JsValue::from(format!("function {name}() {{ [native code] }}")))
}

/// Function.prototype[Symbol.hasInstance]
fn function_has_instance(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Bool(interp.ordinary_has_instance(&this, &arg(args, 0))?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_function_closes_over_globals() {
        let mut interp = Interpreter::new(0, false);
        let f = create_dynamic_function(
            &mut interp,
            &[JsValue::from("a, b"), JsValue::from("return a + b")],
            DynamicKind::Normal,
        );
        let Ok(f) = f else {
            panic!("function constructor failed");
        };
        let result = interp.call_function(&f, JsValue::Undefined, &[JsValue::from(2), JsValue::from(3)]);
        assert_eq!(result.ok(), Some(JsValue::from(5)));
    }

    #[test]
    fn bad_body_is_a_syntax_error() {
        let mut interp = Interpreter::new(0, false);
        let result = create_dynamic_function(&mut interp, &[JsValue::from("return )")], DynamicKind::Normal);
        assert!(matches!(result, Err(JsError::SyntaxError { .. })));
    }
}
