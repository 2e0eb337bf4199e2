//! Generator, async function and async generator intrinsics
//!
//! The resumption machinery lives in `interpreter::generator`; this module
//! only wires the prototype objects and the dynamic-function constructors.

use crate::error::JsError;
use crate::object::{Attributes, JsObjectRef, Property};
use crate::value::{JsValue, PropertyKey};

use super::arg;
use super::function::{DynamicKind, create_dynamic_function};
use crate::interpreter::Interpreter;
use crate::interpreter::frame::Resume;
use crate::interpreter::realm::Intrinsic;

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::GeneratorPrototype).is_some() {
        return;
    }
    let function_ctor = interp.intrinsic(Intrinsic::Function);

    // %GeneratorFunction.prototype% and %GeneratorPrototype%
    let iterator_proto = interp.intrinsic(Intrinsic::IteratorPrototype);
    let gen_proto = interp.create_object_with_proto(Some(iterator_proto));
    interp.register_method(&gen_proto, "next", generator_next, 1);
    interp.register_method(&gen_proto, "return", generator_return, 1);
    interp.register_method(&gen_proto, "throw", generator_throw, 1);
    super::set_to_string_tag(&gen_proto, "Generator");
    let gen_fn_proto = interp.create_object_with_proto(Some(interp.realm.function_prototype.clone()));
    link_prototypes(&gen_fn_proto, &gen_proto);
    super::set_to_string_tag(&gen_fn_proto, "GeneratorFunction");
    let gen_fn = interp.create_native_constructor("GeneratorFunction", generator_function_constructor, 1, &gen_fn_proto);
    finish_constructor(&gen_fn, &gen_fn_proto, &function_ctor);
    interp.realm.set(Intrinsic::GeneratorPrototype, gen_proto);
    interp.realm.set(Intrinsic::GeneratorFunctionPrototype, gen_fn_proto);
    interp.realm.set(Intrinsic::GeneratorFunction, gen_fn);

    // %AsyncFunction.prototype%
    let async_fn_proto = interp.create_object_with_proto(Some(interp.realm.function_prototype.clone()));
    super::set_to_string_tag(&async_fn_proto, "AsyncFunction");
    let async_fn = interp.create_native_constructor("AsyncFunction", async_function_constructor, 1, &async_fn_proto);
    finish_constructor(&async_fn, &async_fn_proto, &function_ctor);
    interp.realm.set(Intrinsic::AsyncFunctionPrototype, async_fn_proto);
    interp.realm.set(Intrinsic::AsyncFunction, async_fn);

    // %AsyncGeneratorFunction.prototype% and %AsyncGeneratorPrototype%
    let async_iterator_proto = interp.intrinsic(Intrinsic::AsyncIteratorPrototype);
    let async_gen_proto = interp.create_object_with_proto(Some(async_iterator_proto));
    interp.register_method(&async_gen_proto, "next", async_generator_next, 1);
    interp.register_method(&async_gen_proto, "return", async_generator_return, 1);
    interp.register_method(&async_gen_proto, "throw", async_generator_throw, 1);
    super::set_to_string_tag(&async_gen_proto, "AsyncGenerator");
    let async_gen_fn_proto = interp.create_object_with_proto(Some(interp.realm.function_prototype.clone()));
    link_prototypes(&async_gen_fn_proto, &async_gen_proto);
    super::set_to_string_tag(&async_gen_fn_proto, "AsyncGeneratorFunction");
    let async_gen_fn = interp.create_native_constructor(
        "AsyncGeneratorFunction",
        async_generator_function_constructor,
        1,
        &async_gen_fn_proto,
    );
    finish_constructor(&async_gen_fn, &async_gen_fn_proto, &function_ctor);
    interp.realm.set(Intrinsic::AsyncGeneratorPrototype, async_gen_proto);
    interp.realm.set(Intrinsic::AsyncGeneratorFunctionPrototype, async_gen_fn_proto);
    interp.realm.set(Intrinsic::AsyncGeneratorFunction, async_gen_fn);
}

/// `F.prototype.prototype` and its back-link are configurable only
fn link_prototypes(fn_proto: &JsObjectRef, instance_proto: &JsObjectRef) {
    fn_proto.borrow_mut().define_property(
        PropertyKey::from("prototype"),
        Property::data(JsValue::Object(instance_proto.clone()), Attributes::CONFIGURABLE_ONLY),
    );
    instance_proto.borrow_mut().define_property(
        PropertyKey::from("constructor"),
        Property::data(JsValue::Object(fn_proto.clone()), Attributes::CONFIGURABLE_ONLY),
    );
}

/// These constructors inherit from `Function`, and their prototypes'
/// `constructor` is not writable
fn finish_constructor(ctor: &JsObjectRef, proto: &JsObjectRef, function_ctor: &JsObjectRef) {
    ctor.borrow_mut().prototype = Some(function_ctor.clone());
    proto.borrow_mut().define_property(
        PropertyKey::from("constructor"),
        Property::data(JsValue::Object(ctor.clone()), Attributes::CONFIGURABLE_ONLY),
    );
}

fn generator_function_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    create_dynamic_function(interp, args, DynamicKind::Generator)
}

fn async_function_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    create_dynamic_function(interp, args, DynamicKind::Async)
}

fn async_generator_function_constructor(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    create_dynamic_function(interp, args, DynamicKind::AsyncGenerator)
}

// ═══════════════════════════════════════════════════════════════════════════════
// %GeneratorPrototype%
// ═══════════════════════════════════════════════════════════════════════════════

/// Generator.prototype.next(value)
fn generator_next(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    interp.generator_resume(&this, Resume::Next(arg(args, 0)), "Generator.prototype.next")
}

/// Generator.prototype.return(value)
fn generator_return(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    interp.generator_resume(&this, Resume::Return(arg(args, 0)), "Generator.prototype.return")
}

/// Generator.prototype.throw(exception)
fn generator_throw(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    interp.generator_resume(&this, Resume::Throw(arg(args, 0)), "Generator.prototype.throw")
}

// ═══════════════════════════════════════════════════════════════════════════════
// %AsyncGeneratorPrototype%
// ═══════════════════════════════════════════════════════════════════════════════

fn async_generator_next(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    interp.async_generator_enqueue(&this, Resume::Next(arg(args, 0)), "AsyncGenerator.prototype.next")
}

fn async_generator_return(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    interp.async_generator_enqueue(&this, Resume::Return(arg(args, 0)), "AsyncGenerator.prototype.return")
}

fn async_generator_throw(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    interp.async_generator_enqueue(&this, Resume::Throw(arg(args, 0)), "AsyncGenerator.prototype.throw")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_prototype_chain() {
        let mut interp = Interpreter::new(0, false);
        let gen_fn_proto = interp.intrinsic(Intrinsic::GeneratorFunctionPrototype);
        let gen_proto = interp.intrinsic(Intrinsic::GeneratorPrototype);
        let linked = interp.get(&gen_fn_proto, &PropertyKey::from("prototype"));
        assert_eq!(linked.ok(), Some(JsValue::Object(gen_proto.clone())));
        let iterator_proto = interp.intrinsic(Intrinsic::IteratorPrototype);
        assert!(gen_proto.borrow().prototype.as_ref().is_some_and(|p| p.ptr_eq(&iterator_proto)));
    }

    #[test]
    fn next_on_plain_object_throws() {
        let mut interp = Interpreter::new(0, false);
        let obj = JsValue::Object(interp.create_object());
        let result = generator_next(&mut interp, obj, &[]);
        assert!(matches!(result, Err(JsError::TypeError { .. })));
    }

    #[test]
    fn dynamic_generator_function_yields() {
        let mut interp = Interpreter::new(0, false);
        let Ok(func) = generator_function_constructor(
            &mut interp,
            JsValue::Undefined,
            &[JsValue::from("a"), JsValue::from("yield a; yield a + 1;")],
        ) else {
            panic!("GeneratorFunction failed");
        };
        let Ok(generator) = interp.call_function(&func, JsValue::Undefined, &[JsValue::from(10)]) else {
            panic!("call failed");
        };
        let Ok(JsValue::Object(first)) = generator_next(&mut interp, generator.clone(), &[]) else {
            panic!("next failed");
        };
        assert_eq!(interp.get(&first, &PropertyKey::from("value")).ok(), Some(JsValue::from(10)));
        let Ok(JsValue::Object(second)) = generator_next(&mut interp, generator, &[]) else {
            panic!("next failed");
        };
        assert_eq!(interp.get(&second, &PropertyKey::from("value")).ok(), Some(JsValue::from(11)));
    }
}
