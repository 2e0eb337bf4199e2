//! Rust closures as script functions.
//!
//! Each parameter is exported from the matching script argument with
//! `export_to` (a missing argument exports as `null`, so `Option<T>`
//! parameters accept it). The return value converts back with `to_value`;
//! tuples become arrays. Returning `Err(e)` throws a `HostError` whose
//! `message` and `value` carry `e.to_string()`, except that a `JsError` is
//! rethrown unchanged.

use std::any::Any;
use std::fmt::Display;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::JsError;
use crate::interpreter::builtins::error::create_host_error;
use crate::interpreter::Interpreter;
use crate::object::HostFn;
use crate::value::JsValue;

use super::{export_to, to_value};

/// Host values that convert into script values: what host functions
/// return and what `Runtime::set` accepts
pub trait IntoJsValue {
    fn into_js(self, interp: &mut Interpreter) -> Result<JsValue, JsError>;
}

impl IntoJsValue for JsValue {
    fn into_js(self, _interp: &mut Interpreter) -> Result<JsValue, JsError> {
        Ok(self)
    }
}

impl IntoJsValue for () {
    fn into_js(self, _interp: &mut Interpreter) -> Result<JsValue, JsError> {
        Ok(JsValue::Undefined)
    }
}

macro_rules! serialized_return {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoJsValue for $ty {
                fn into_js(self, interp: &mut Interpreter) -> Result<JsValue, JsError> {
                    to_value(interp, &self)
                }
            }
        )*
    };
}

serialized_return!(bool, i32, i64, u32, u64, usize, f64, String, &'static str, serde_json::Value);

impl<T: Serialize> IntoJsValue for Vec<T> {
    fn into_js(self, interp: &mut Interpreter) -> Result<JsValue, JsError> {
        to_value(interp, &self)
    }
}

impl<T: Serialize> IntoJsValue for Option<T> {
    fn into_js(self, interp: &mut Interpreter) -> Result<JsValue, JsError> {
        match self {
            Some(v) => to_value(interp, &v),
            None => Ok(JsValue::Null),
        }
    }
}

impl<A: Serialize, B: Serialize> IntoJsValue for (A, B) {
    fn into_js(self, interp: &mut Interpreter) -> Result<JsValue, JsError> {
        to_value(interp, &self)
    }
}

impl<A: Serialize, B: Serialize, C: Serialize> IntoJsValue for (A, B, C) {
    fn into_js(self, interp: &mut Interpreter) -> Result<JsValue, JsError> {
        to_value(interp, &self)
    }
}

impl<T: Serialize, E: Display + 'static> IntoJsValue for Result<T, E> {
    fn into_js(self, interp: &mut Interpreter) -> Result<JsValue, JsError> {
        match self {
            Ok(v) => to_value(interp, &v),
            Err(e) => {
                let message = e.to_string();
                let boxed: Box<dyn Any> = Box::new(e);
                match boxed.downcast::<JsError>() {
                    Ok(err) => Err(*err),
                    Err(_) => Err(JsError::Thrown(create_host_error(interp, &message))),
                }
            }
        }
    }
}

/// Export argument `index`
fn argument<T: DeserializeOwned>(interp: &mut Interpreter, args: &[JsValue], index: usize) -> Result<T, JsError> {
    let value = args.get(index).cloned().unwrap_or_default();
    export_to(interp, &value).map_err(|err| match err {
        JsError::TypeError { message } => JsError::type_error(format!("argument {index}: {message}")),
        other => other,
    })
}

/// Closures that can be exposed as script functions
pub trait IntoHostFn<Args> {
    /// The function and its `length`
    fn into_host_fn(self) -> (Rc<HostFn>, u32);
}

macro_rules! impl_into_host_fn {
    ($($arg:ident: $ty:ident @ $idx:tt),*) => {
        impl<Func, Ret, $($ty,)*> IntoHostFn<($($ty,)*)> for Func
        where
            Func: Fn($($ty),*) -> Ret + 'static,
            Ret: IntoJsValue,
            $($ty: DeserializeOwned,)*
        {
            fn into_host_fn(self) -> (Rc<HostFn>, u32) {
                let arity = <[&str]>::len(&[$(stringify!($ty)),*]) as u32;
                let func: Rc<HostFn> = Rc::new(move |interp: &mut Interpreter, _this: JsValue, args: &[JsValue]| {
                    $(let $arg: $ty = argument(interp, args, $idx)?;)*
                    tracing::trace!(arity, "host call");
                    let _ = args;
                    (self)($($arg),*).into_js(interp)
                });
                (func, arity)
            }
        }
    };
}

impl_into_host_fn!();
impl_into_host_fn!(a: A @ 0);
impl_into_host_fn!(a: A @ 0, b: B @ 1);
impl_into_host_fn!(a: A @ 0, b: B @ 1, c: C @ 2);
impl_into_host_fn!(a: A @ 0, b: B @ 1, c: C @ 2, d: D @ 3);
impl_into_host_fn!(a: A @ 0, b: B @ 1, c: C @ 2, d: D @ 3, e: E @ 4);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::PropertyKey;

    fn call<Args>(interp: &mut Interpreter, f: impl IntoHostFn<Args>, args: &[JsValue]) -> Result<JsValue, JsError> {
        let (func, _) = f.into_host_fn();
        func(interp, JsValue::Undefined, args)
    }

    #[test]
    fn arguments_are_exported() {
        let mut interp = Interpreter::new(0, false);
        let result = call(&mut interp, |a: f64, b: f64| a * b, &[JsValue::from(6), JsValue::from(7)]);
        assert_eq!(result.ok(), Some(JsValue::Int(42)));
    }

    #[test]
    fn missing_argument_is_none() {
        let mut interp = Interpreter::new(0, false);
        let result = call(&mut interp, |name: Option<String>| name.is_none(), &[]);
        assert_eq!(result.ok(), Some(JsValue::Bool(true)));
    }

    #[test]
    fn arity_counts_parameters() {
        let (_, arity) = IntoHostFn::<(i32, String)>::into_host_fn(|_: i32, _: String| ());
        assert_eq!(arity, 2);
    }

    #[test]
    fn errors_become_host_errors() {
        let mut interp = Interpreter::new(0, false);
        let result = call(&mut interp, || -> Result<i32, String> { Err("disk full".into()) }, &[]);
        let Err(JsError::Thrown(JsValue::Object(err))) = result else {
            panic!("expected a thrown HostError");
        };
        let value = interp.get(&err, &PropertyKey::from("value"));
        assert_eq!(value.ok(), Some(JsValue::from("disk full")));
    }

    #[test]
    fn js_errors_pass_through() {
        let mut interp = Interpreter::new(0, false);
        let result = call(&mut interp, || -> Result<i32, JsError> { Err(JsError::range_error("nope")) }, &[]);
        assert!(matches!(result, Err(JsError::RangeError { .. })));
    }
}
