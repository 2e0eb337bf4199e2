//! Function objects and calls
//!
//! `prepare_call` and `prepare_construct` turn a call into either a frame
//! ready for the run loop or, for built-ins and suspendable bodies, the
//! finished result. The VM pushes prepared frames inline; native code goes
//! through `call_function`/`construct`, which run them on a nested loop.

use std::rc::Rc;
use std::sync::Arc;

use crate::compiler::FunctionCode;
use crate::error::{JsError, StackFrame};
use crate::gc::Gc;
use crate::object::{
    Attributes, ClassKind, HostFn, JsFunction, JsObject, JsObjectRef, NativeFn, ObjectKind,
    Property, ScriptFunction,
};
use crate::string::JsString;
use crate::value::{JsValue, PropertyKey};

use super::builtins::proxy;
use super::frame::Frame;
use super::ops::describe;
use super::realm::Intrinsic;
use super::stash::Stash;
use super::vm::Exit;
use super::{Interpreter, MAX_NATIVE_DEPTH};

/// A call after argument binding
pub(crate) enum Prepared {
    /// Script code still to run
    Frame(Frame),
    /// Built-ins, generators and async functions finish on the spot
    Done(JsValue),
}

/// What sits behind a callable object, extracted so no borrow is held
/// across the call
enum Target {
    Script {
        code: Arc<FunctionCode>,
        stash: Option<Gc<Stash>>,
        class_kind: ClassKind,
    },
    Native {
        func: NativeFn,
        constructor: bool,
    },
    Host {
        func: Rc<HostFn>,
        constructor: bool,
    },
    Bound {
        target: JsObjectRef,
        this: JsValue,
        args: Vec<JsValue>,
    },
    Proxy,
    NotCallable,
}

fn target_of(func: &JsObjectRef) -> Target {
    let f = func.borrow();
    match &f.kind {
        ObjectKind::Function(jf) => match jf.as_ref() {
            JsFunction::Script(s) => Target::Script {
                code: s.code.clone(),
                stash: s.stash.clone(),
                class_kind: s.class_kind,
            },
            JsFunction::Native(n) => Target::Native {
                func: n.func,
                constructor: n.constructor,
            },
            JsFunction::Host(h) => Target::Host {
                func: h.func.clone(),
                constructor: h.constructor,
            },
            JsFunction::Bound(b) => Target::Bound {
                target: b.target.clone(),
                this: b.this.clone(),
                args: b.args.clone(),
            },
        },
        ObjectKind::Proxy(p) if p.callable => Target::Proxy,
        _ => Target::NotCallable,
    }
}

pub(crate) fn not_a_function(value: &JsValue) -> JsError {
    JsError::type_error(format!("{} is not a function", describe(value)))
}

fn not_a_constructor(value: &JsValue) -> JsError {
    JsError::type_error(format!("{} is not a constructor", describe(value)))
}

impl Interpreter {
    // ───────────────────────────────────────────────────────────────────────
    // Entry points for native code
    // ───────────────────────────────────────────────────────────────────────

    /// `Call(F, V, args)`
    pub fn call_function(&mut self, callee: &JsValue, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
        match self.prepare_call(callee, this, args)? {
            Prepared::Done(v) => Ok(v),
            Prepared::Frame(frame) => self.run_to_return(frame),
        }
    }

    /// `Construct(F, args, newTarget)`; `new_target` defaults to `ctor`
    pub fn construct(
        &mut self,
        ctor: &JsValue,
        args: &[JsValue],
        new_target: Option<&JsValue>,
    ) -> Result<JsValue, JsError> {
        match self.prepare_construct(ctor, args, new_target)? {
            Prepared::Done(v) => Ok(v),
            Prepared::Frame(frame) => self.run_to_return(frame),
        }
    }

    /// Run a plain frame to completion on a nested loop
    pub(crate) fn run_to_return(&mut self, frame: Frame) -> Result<JsValue, JsError> {
        match self.run_frame(frame)? {
            Exit::Return(v) => Ok(v),
            Exit::Suspend(..) => Err(JsError::type_error("Unexpected suspension of a plain function")),
        }
    }

    /// Make `frame` the running frame and run it until it returns or
    /// suspends. The caller's frame is restored either way.
    pub(crate) fn run_frame(&mut self, frame: Frame) -> Result<Exit, JsError> {
        if self.native_depth >= MAX_NATIVE_DEPTH {
            return Err(self.stack_overflow());
        }
        self.push_frame(frame)?;
        let base = self.frames.len();
        self.native_depth += 1;
        let result = crate::stack::guard(|| self.run(base));
        self.native_depth -= 1;
        result
    }

    /// Run `f` one native level deeper. Native recursion that never
    /// re-enters the dispatch loop (proxy chains, bound chains, builtins
    /// calling builtins) is bounded here.
    pub(crate) fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, JsError>) -> Result<T, JsError> {
        if self.native_depth >= MAX_NATIVE_DEPTH {
            return Err(self.stack_overflow());
        }
        self.native_depth += 1;
        let result = crate::stack::guard(|| f(self));
        self.native_depth -= 1;
        result
    }

    /// Save the running frame and switch to `frame`
    pub(crate) fn push_frame(&mut self, frame: Frame) -> Result<(), JsError> {
        if self.frames.len() >= self.max_call_stack {
            return Err(self.stack_overflow());
        }
        let caller = std::mem::replace(&mut self.frame, frame);
        self.frames.push(caller);
        Ok(())
    }

    pub(crate) fn stack_overflow(&self) -> JsError {
        let stack: Vec<StackFrame> = self.capture_call_stack(10);
        JsError::StackOverflow { stack }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Call preparation
    // ───────────────────────────────────────────────────────────────────────

    pub(crate) fn prepare_call(&mut self, callee: &JsValue, this: JsValue, args: &[JsValue]) -> Result<Prepared, JsError> {
        let JsValue::Object(func) = callee else {
            return Err(not_a_function(callee));
        };
        match target_of(func) {
            Target::Script {
                code,
                stash,
                class_kind,
            } => {
                if class_kind != ClassKind::None {
                    return Err(JsError::type_error(format!(
                        "Class constructor {} cannot be invoked without 'new'",
                        code.name
                    )));
                }
                let this = if code.flags.is_strict() {
                    this
                } else {
                    match this {
                        JsValue::Undefined | JsValue::Null => JsValue::Object(self.global()),
                        JsValue::Object(o) => JsValue::Object(o),
                        other => JsValue::Object(self.to_object(&other)?),
                    }
                };
                let flags = code.flags;
                let frame = self.script_frame(func, code, stash, this, args, JsValue::Undefined, false);
                if flags.is_generator() {
                    return Ok(Prepared::Done(self.start_generator(func, frame)?));
                }
                if flags.is_async() {
                    return Ok(Prepared::Done(self.start_async_function(frame)?));
                }
                Ok(Prepared::Frame(frame))
            }
            Target::Native { func: f, .. } => {
                let saved_callee = self.native_callee.replace(func.clone());
                let saved_target = std::mem::replace(&mut self.new_target, JsValue::Undefined);
                let result = self.nested(|interp| f(interp, this, args));
                self.native_callee = saved_callee;
                self.new_target = saved_target;
                Ok(Prepared::Done(result?))
            }
            Target::Host { func: f, .. } => {
                tracing::trace!(args = args.len(), "host function call");
                Ok(Prepared::Done(self.nested(|interp| f(interp, this, args))?))
            }
            Target::Bound {
                target,
                this: bound_this,
                args: bound_args,
            } => {
                let mut all = bound_args;
                all.extend_from_slice(args);
                self.nested(|interp| interp.prepare_call(&JsValue::Object(target), bound_this, &all))
            }
            Target::Proxy => Ok(Prepared::Done(self.nested(|interp| proxy::call(interp, func, this, args))?)),
            Target::NotCallable => Err(not_a_function(callee)),
        }
    }

    pub(crate) fn prepare_construct(
        &mut self,
        ctor: &JsValue,
        args: &[JsValue],
        new_target: Option<&JsValue>,
    ) -> Result<Prepared, JsError> {
        let JsValue::Object(func) = ctor else {
            return Err(not_a_constructor(ctor));
        };
        let new_target = new_target.cloned().unwrap_or_else(|| ctor.clone());
        match target_of(func) {
            Target::Script {
                code,
                stash,
                class_kind,
            } => {
                if class_kind == ClassKind::None && !code.flags.is_constructor() {
                    return Err(not_a_constructor(ctor));
                }
                let this = if class_kind == ClassKind::Derived {
                    JsValue::Undefined
                } else {
                    let proto = self.get_prototype_from_constructor(&new_target, Intrinsic::ObjectPrototype)?;
                    JsValue::Object(self.create_object_with_proto(Some(proto)))
                };
                if class_kind == ClassKind::Base {
                    self.initialize_fields(func, &this)?;
                }
                let frame = self.script_frame(func, code, stash, this, args, new_target, true);
                Ok(Prepared::Frame(frame))
            }
            Target::Native {
                func: f,
                constructor,
            } => {
                if !constructor {
                    return Err(not_a_constructor(ctor));
                }
                let saved_callee = self.native_callee.replace(func.clone());
                let saved_target = std::mem::replace(&mut self.new_target, new_target);
                let result = self.nested(|interp| f(interp, JsValue::Undefined, args));
                self.native_callee = saved_callee;
                self.new_target = saved_target;
                Ok(Prepared::Done(result?))
            }
            Target::Host {
                func: f,
                constructor,
            } => {
                if !constructor {
                    return Err(not_a_constructor(ctor));
                }
                let proto = self.get_prototype_from_constructor(&new_target, Intrinsic::ObjectPrototype)?;
                let this = JsValue::Object(self.create_object_with_proto(Some(proto)));
                let result = self.nested(|interp| f(interp, this.clone(), args))?;
                Ok(Prepared::Done(if result.is_object() { result } else { this }))
            }
            Target::Bound {
                target,
                args: bound_args,
                ..
            } => {
                if !target.borrow().is_constructor() {
                    return Err(not_a_constructor(ctor));
                }
                let target = JsValue::Object(target);
                let new_target = match &new_target {
                    JsValue::Object(nt) if nt.ptr_eq(func) => target.clone(),
                    other => other.clone(),
                };
                let mut all = bound_args;
                all.extend_from_slice(args);
                self.nested(|interp| interp.prepare_construct(&target, &all, Some(&new_target)))
            }
            Target::Proxy => {
                if !func.borrow().is_constructor() {
                    return Err(not_a_constructor(ctor));
                }
                Ok(Prepared::Done(self.nested(|interp| proxy::construct(interp, func, args, &new_target))?))
            }
            Target::NotCallable => Err(not_a_constructor(ctor)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn script_frame(
        &mut self,
        func: &JsObjectRef,
        code: Arc<FunctionCode>,
        stash: Option<Gc<Stash>>,
        this: JsValue,
        args: &[JsValue],
        new_target: JsValue,
        construct: bool,
    ) -> Frame {
        let mut frame = Frame::new(code, stash);
        frame.this = this;
        frame.callee = Some(func.clone());
        frame.new_target = new_target;
        frame.args = args.to_vec();
        frame.construct = construct;
        frame
    }

    /// Run the instance field initializer of class constructor `ctor` on
    /// a freshly created `this`
    pub(crate) fn initialize_fields(&mut self, ctor: &JsObjectRef, this: &JsValue) -> Result<(), JsError> {
        let init = match ctor.borrow().function() {
            Some(JsFunction::Script(s)) => s.fields.clone(),
            _ => None,
        };
        if let Some(init) = init {
            self.call_function(&JsValue::Object(init), this.clone(), &[])?;
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Closures
    // ───────────────────────────────────────────────────────────────────────

    /// Function object for a nested function body over the given scope
    pub(crate) fn create_closure(&mut self, code: Arc<FunctionCode>, stash: Option<Gc<Stash>>) -> JsObjectRef {
        let flags = code.flags;
        let name = code.name.clone();
        let length = code.length;
        let script = ScriptFunction {
            code,
            stash,
            home_object: None,
            fields: None,
            class_kind: ClassKind::None,
        };
        let func = self.function_object(JsFunction::Script(script), name, length);

        let proto_kind = match (flags.is_generator(), flags.is_async()) {
            (true, true) => Some(Intrinsic::AsyncGeneratorFunctionPrototype),
            (true, false) => Some(Intrinsic::GeneratorFunctionPrototype),
            (false, true) => Some(Intrinsic::AsyncFunctionPrototype),
            (false, false) => None,
        };
        if let Some(which) = proto_kind {
            let fn_proto = self.intrinsic(which);
            func.borrow_mut().prototype = Some(fn_proto);
        }

        if flags.is_generator() {
            let which = if flags.is_async() {
                Intrinsic::AsyncGeneratorPrototype
            } else {
                Intrinsic::GeneratorPrototype
            };
            let parent = self.intrinsic(which);
            let proto = self.create_object_with_proto(Some(parent));
            func.borrow_mut().define_property(
                PropertyKey::from("prototype"),
                Property::data(JsValue::Object(proto), Attributes::WRITABLE_ONLY),
            );
        } else if flags.is_constructor() && !flags.is_class_constructor() {
            let proto = self.create_object();
            proto.borrow_mut().define_property(
                PropertyKey::from("constructor"),
                Property::data(JsValue::Object(func.clone()), Attributes::HIDDEN),
            );
            func.borrow_mut().define_property(
                PropertyKey::from("prototype"),
                Property::data(JsValue::Object(proto), Attributes::WRITABLE_ONLY),
            );
        }
        func
    }

    /// Class constructor and prototype for `class` definitions
    pub(crate) fn create_class(
        &mut self,
        code: Arc<FunctionCode>,
        stash: Option<Gc<Stash>>,
        heritage: Option<JsValue>,
    ) -> Result<(JsObjectRef, JsObjectRef), JsError> {
        let (proto_parent, ctor_parent) = match &heritage {
            None => (Some(self.realm.object_prototype.clone()), self.realm.function_prototype.clone()),
            Some(JsValue::Null) => (None, self.realm.function_prototype.clone()),
            Some(parent) => {
                let JsValue::Object(p) = parent else {
                    return Err(JsError::type_error(format!(
                        "Class extends value {} is not a constructor or null",
                        describe(parent)
                    )));
                };
                if !p.borrow().is_constructor() {
                    return Err(JsError::type_error(format!(
                        "Class extends value {} is not a constructor or null",
                        describe(parent)
                    )));
                }
                let proto = self.get(p, &PropertyKey::from("prototype"))?;
                let proto_parent = match proto {
                    JsValue::Object(o) => Some(o),
                    JsValue::Null => None,
                    other => {
                        return Err(JsError::type_error(format!(
                            "Class extends value does not have valid prototype property {}",
                            describe(&other)
                        )));
                    }
                };
                (proto_parent, p.clone())
            }
        };

        let proto = self.alloc(JsObject::ordinary(proto_parent));
        let class_kind = if heritage.is_some() {
            ClassKind::Derived
        } else {
            ClassKind::Base
        };
        let name = code.name.clone();
        let length = code.length;
        let script = ScriptFunction {
            code,
            stash,
            home_object: Some(proto.clone()),
            fields: None,
            class_kind,
        };
        let ctor = self.function_object(JsFunction::Script(script), name, length);
        {
            let mut c = ctor.borrow_mut();
            c.prototype = Some(ctor_parent);
            c.define_property(
                PropertyKey::from("prototype"),
                Property::data(JsValue::Object(proto.clone()), Attributes::NONE),
            );
        }
        proto.borrow_mut().define_property(
            PropertyKey::from("constructor"),
            Property::data(JsValue::Object(ctor.clone()), Attributes::HIDDEN),
        );
        Ok((ctor, proto))
    }

    /// `SetFunctionName`
    pub(crate) fn set_function_name(&mut self, func: &JsValue, key: &PropertyKey, prefix: Option<&str>) {
        let JsValue::Object(f) = func else {
            return;
        };
        let base = key.function_name();
        let name = match prefix {
            Some(p) if base.is_empty() => JsString::from(p),
            Some(p) => JsString::from(format!("{p} {base}")),
            None => base,
        };
        f.borrow_mut().define_property(
            PropertyKey::from("name"),
            Property::data(JsValue::String(name), Attributes::CONFIGURABLE_ONLY),
        );
    }

    /// `MakeMethod`: point a script function's `super` at `home`
    pub(crate) fn set_home_object(&mut self, func: &JsValue, home: &JsObjectRef) {
        let JsValue::Object(f) = func else {
            return;
        };
        if let ObjectKind::Function(jf) = &mut f.borrow_mut().kind {
            if let JsFunction::Script(s) = jf.as_mut() {
                s.home_object = Some(home.clone());
            }
        }
    }

    /// `[[HomeObject]]` of a script function
    pub(crate) fn home_object(&self, func: &JsValue) -> Option<JsObjectRef> {
        let JsValue::Object(f) = func else {
            return None;
        };
        match f.borrow().function() {
            Some(JsFunction::Script(s)) => s.home_object.clone(),
            _ => None,
        }
    }

    /// Name a function would show in a stack trace or error message
    pub(crate) fn function_name(&self, func: &JsObjectRef) -> JsString {
        func.borrow()
            .get_own_value(&PropertyKey::from("name"))
            .and_then(|v| v.as_string().cloned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native_add(_: &mut Interpreter, _: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
        let a = args.first().and_then(JsValue::as_number).unwrap_or(0.0);
        let b = args.get(1).and_then(JsValue::as_number).unwrap_or(0.0);
        Ok(JsValue::number(a + b))
    }

    #[test]
    fn native_functions_are_callable() {
        let mut interp = Interpreter::new(0, false);
        let f = interp.create_native_function("add", native_add, 2);
        let result = interp.call_function(
            &JsValue::Object(f),
            JsValue::Undefined,
            &[JsValue::from(2), JsValue::from(3)],
        );
        assert!(matches!(result, Ok(v) if v == JsValue::from(5)));
    }

    #[test]
    fn calling_a_non_function_is_a_type_error() {
        let mut interp = Interpreter::new(0, false);
        let result = interp.call_function(&JsValue::from(1), JsValue::Undefined, &[]);
        assert!(matches!(result, Err(JsError::TypeError { message }) if message == "1 is not a function"));
    }

    #[test]
    fn natives_are_not_constructors_by_default() {
        let mut interp = Interpreter::new(0, false);
        let f = interp.create_native_function("add", native_add, 2);
        let result = interp.construct(&JsValue::Object(f), &[], None);
        assert!(matches!(result, Err(JsError::TypeError { .. })));
    }
}
