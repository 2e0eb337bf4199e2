//! Promise built-in and the microtask jobs it schedules
//!
//! A promise keeps its reactions until it settles; settling turns each
//! reaction into a `Job::Reaction` on the interpreter's queue. Async
//! functions and async generators subscribe with `ReactionHandler::Resume`
//! so an awaited settlement resumes the parked frame directly instead of
//! going through a script-visible callback.

use crate::error::JsError;
use crate::gc::Tracer;
use crate::object::{JsFunction, JsObject, JsObjectRef, ObjectKind};
use crate::value::{JsValue, PropertyKey};

use super::{arg, callee, capture, set_capture};
use crate::interpreter::Interpreter;
use crate::interpreter::frame::Resume;
use crate::interpreter::realm::Intrinsic;

// ═══════════════════════════════════════════════════════════════════════════════
// State
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseStatus {
    Pending,
    Fulfilled,
    Rejected,
}

pub struct PromiseState {
    pub status: PromiseStatus,
    pub result: JsValue,
    pub fulfill_reactions: Vec<Reaction>,
    pub reject_reactions: Vec<Reaction>,
    /// A handler has been attached at some point
    pub handled: bool,
}

impl PromiseState {
    fn new() -> Self {
        PromiseState {
            status: PromiseStatus::Pending,
            result: JsValue::Undefined,
            fulfill_reactions: Vec::new(),
            reject_reactions: Vec::new(),
            handled: false,
        }
    }

    pub fn trace(&self, t: &mut Tracer<'_>) {
        t.value(&self.result);
        for r in self.fulfill_reactions.iter().chain(&self.reject_reactions) {
            r.trace(t);
        }
    }
}

/// The promise a reaction settles and how to settle it
#[derive(Clone)]
pub enum Capability {
    /// A `%Promise%` instance settled directly
    Builtin(JsObjectRef),
    /// Result of `new C(executor)` for a promise subclass
    Custom {
        promise: JsValue,
        resolve: JsValue,
        reject: JsValue,
    },
}

impl Capability {
    pub fn promise(&self) -> JsValue {
        match self {
            Capability::Builtin(p) => JsValue::Object(p.clone()),
            Capability::Custom { promise, .. } => promise.clone(),
        }
    }

    fn trace(&self, t: &mut Tracer<'_>) {
        match self {
            Capability::Builtin(p) => t.edge(p),
            Capability::Custom {
                promise,
                resolve,
                reject,
            } => {
                t.value(promise);
                t.value(resolve);
                t.value(reject);
            }
        }
    }
}

impl From<JsObjectRef> for Capability {
    fn from(promise: JsObjectRef) -> Self {
        Capability::Builtin(promise)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionKind {
    Fulfill,
    Reject,
}

/// What runs when a promise settles
#[derive(Clone)]
pub enum ReactionHandler {
    /// Script callback; `undefined` passes the value through
    Function(JsValue),
    /// Resume an awaiting async function or async generator
    Resume(JsObjectRef),
    /// Finish `return()` on a completed async generator
    AsyncGenReturn(JsObjectRef),
}

#[derive(Clone)]
pub struct Reaction {
    pub capability: Option<Capability>,
    pub kind: ReactionKind,
    pub handler: ReactionHandler,
}

impl Reaction {
    fn trace(&self, t: &mut Tracer<'_>) {
        if let Some(c) = &self.capability {
            c.trace(t);
        }
        match &self.handler {
            ReactionHandler::Function(f) => t.value(f),
            ReactionHandler::Resume(o) | ReactionHandler::AsyncGenReturn(o) => t.edge(o),
        }
    }
}

/// A queued microtask
pub enum Job {
    Reaction { reaction: Reaction, argument: JsValue },
    ResolveThenable {
        promise: JsObjectRef,
        thenable: JsValue,
        then: JsValue,
    },
    /// `queueMicrotask` callback
    Callback(JsValue),
}

fn with_state<R>(promise: &JsObjectRef, f: impl FnOnce(&mut PromiseState) -> R) -> Option<R> {
    match &mut promise.borrow_mut().kind {
        ObjectKind::Promise(state) => Some(f(state)),
        _ => None,
    }
}

/// Status and result of a promise object
pub fn promise_state(obj: &JsObjectRef) -> Option<(PromiseStatus, JsValue)> {
    match &obj.borrow().kind {
        ObjectKind::Promise(state) => Some((state.status, state.result.clone())),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Abstract operations
// ═══════════════════════════════════════════════════════════════════════════════

/// A pending `%Promise%`
pub fn new_promise(interp: &mut Interpreter) -> JsObjectRef {
    let proto = interp.intrinsic(Intrinsic::PromisePrototype);
    new_promise_with_proto(interp, proto)
}

fn new_promise_with_proto(interp: &mut Interpreter, proto: JsObjectRef) -> JsObjectRef {
    interp.alloc(JsObject::new(ObjectKind::Promise(Box::new(PromiseState::new())), Some(proto)))
}

/// `CreateResolvingFunctions`. Both functions capture
/// `[promise, other function]`; the promise slot is cleared on both once
/// either has been called.
pub fn create_resolving_functions(interp: &mut Interpreter, promise: &JsObjectRef) -> (JsValue, JsValue) {
    let p = JsValue::Object(promise.clone());
    let resolve = interp.create_native_closure("", resolve_function, 1, vec![p.clone(), JsValue::Undefined]);
    let resolve = JsValue::Object(resolve);
    let reject = interp.create_native_closure("", reject_function, 1, vec![p, resolve.clone()]);
    let reject = JsValue::Object(reject);
    set_capture(&resolve, 1, reject.clone());
    (resolve, reject)
}

/// Claim the resolving pair; `None` when it was already used
fn claim_resolving_pair(interp: &mut Interpreter) -> Option<JsObjectRef> {
    let JsValue::Object(promise) = capture(interp, 0) else {
        return None;
    };
    let me = callee(interp);
    let other = capture(interp, 1);
    set_capture(&me, 0, JsValue::Undefined);
    set_capture(&other, 0, JsValue::Undefined);
    Some(promise)
}

fn resolve_function(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    if let Some(promise) = claim_resolving_pair(interp) {
        resolve_promise(interp, &promise, arg(args, 0))?;
    }
    Ok(JsValue::Undefined)
}

fn reject_function(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    if let Some(promise) = claim_resolving_pair(interp) {
        reject_promise(interp, &promise, arg(args, 0));
    }
    Ok(JsValue::Undefined)
}

/// Promise resolve function body: adopt thenables, fulfill with anything else
pub fn resolve_promise(interp: &mut Interpreter, promise: &JsObjectRef, resolution: JsValue) -> Result<(), JsError> {
    let JsValue::Object(obj) = &resolution else {
        fulfill_promise(interp, promise, resolution);
        return Ok(());
    };
    if obj.ptr_eq(promise) {
        let err = JsError::type_error("Chaining cycle detected for promise");
        let reason = interp.error_value(&err);
        reject_promise(interp, promise, reason);
        return Ok(());
    }
    let then = match interp.get(obj, &PropertyKey::from("then")) {
        Ok(t) => t,
        Err(err) => {
            let reason = interp.catch_error(err)?;
            reject_promise(interp, promise, reason);
            return Ok(());
        }
    };
    if !then.is_callable() {
        fulfill_promise(interp, promise, resolution);
        return Ok(());
    }
    interp.enqueue_job(Job::ResolveThenable {
        promise: promise.clone(),
        thenable: resolution,
        then,
    });
    Ok(())
}

fn settle(promise: &JsObjectRef, status: PromiseStatus, value: JsValue) -> Vec<Reaction> {
    with_state(promise, |state| {
        if state.status != PromiseStatus::Pending {
            return Vec::new();
        }
        state.status = status;
        state.result = value;
        let fulfill = std::mem::take(&mut state.fulfill_reactions);
        let reject = std::mem::take(&mut state.reject_reactions);
        if status == PromiseStatus::Fulfilled {
            fulfill
        } else {
            if !state.handled {
                tracing::trace!("promise rejected without a handler");
            }
            reject
        }
    })
    .unwrap_or_default()
}

fn trigger(interp: &mut Interpreter, reactions: Vec<Reaction>, argument: &JsValue) {
    for reaction in reactions {
        interp.enqueue_job(Job::Reaction {
            reaction,
            argument: argument.clone(),
        });
    }
}

/// `FulfillPromise`; ignored once settled
pub fn fulfill_promise(interp: &mut Interpreter, promise: &JsObjectRef, value: JsValue) {
    let reactions = settle(promise, PromiseStatus::Fulfilled, value.clone());
    trigger(interp, reactions, &value);
}

/// `RejectPromise`; ignored once settled
pub fn reject_promise(interp: &mut Interpreter, promise: &JsObjectRef, reason: JsValue) {
    let reactions = settle(promise, PromiseStatus::Rejected, reason.clone());
    trigger(interp, reactions, &reason);
}

/// `PerformPromiseThen`
pub fn perform_then(
    interp: &mut Interpreter,
    promise: &JsObjectRef,
    on_fulfilled: ReactionHandler,
    on_rejected: ReactionHandler,
    capability: Option<Capability>,
) {
    let on_fulfilled = match on_fulfilled {
        ReactionHandler::Function(f) if !f.is_callable() => ReactionHandler::Function(JsValue::Undefined),
        other => other,
    };
    let on_rejected = match on_rejected {
        ReactionHandler::Function(f) if !f.is_callable() => ReactionHandler::Function(JsValue::Undefined),
        other => other,
    };
    let fulfill = Reaction {
        capability: capability.clone(),
        kind: ReactionKind::Fulfill,
        handler: on_fulfilled,
    };
    let reject = Reaction {
        capability,
        kind: ReactionKind::Reject,
        handler: on_rejected,
    };
    let settled = with_state(promise, |state| {
        state.handled = true;
        match state.status {
            PromiseStatus::Pending => {
                state.fulfill_reactions.push(fulfill.clone());
                state.reject_reactions.push(reject.clone());
                None
            }
            status => Some((status, state.result.clone())),
        }
    })
    .flatten();
    match settled {
        Some((PromiseStatus::Fulfilled, value)) => trigger(interp, vec![fulfill], &value),
        Some((_, reason)) => trigger(interp, vec![reject], &reason),
        None => {}
    }
}

/// `PromiseResolve(%Promise%, value)`
pub fn promise_resolve(interp: &mut Interpreter, value: JsValue) -> Result<JsObjectRef, JsError> {
    let ctor = interp.intrinsic(Intrinsic::Promise);
    if let JsValue::Object(obj) = &value {
        if matches!(obj.borrow().kind, ObjectKind::Promise(_)) {
            let c = interp.get(obj, &PropertyKey::from("constructor"))?;
            if c.as_object().is_some_and(|c| c.ptr_eq(&ctor)) {
                return Ok(obj.clone());
            }
        }
    }
    let promise = new_promise(interp);
    resolve_promise(interp, &promise, value)?;
    Ok(promise)
}

/// `PromiseResolve(C, value)` for an arbitrary constructor
fn promise_resolve_with(interp: &mut Interpreter, ctor: &JsValue, value: JsValue) -> Result<JsValue, JsError> {
    if let JsValue::Object(obj) = &value {
        if matches!(obj.borrow().kind, ObjectKind::Promise(_)) {
            let c = interp.get(obj, &PropertyKey::from("constructor"))?;
            if c.same_value(ctor) {
                return Ok(value);
            }
        }
    }
    let capability = new_capability(interp, ctor)?;
    capability_resolve(interp, &capability, value)?;
    Ok(capability.promise())
}

/// `NewPromiseCapability(C)`
pub fn new_capability(interp: &mut Interpreter, ctor: &JsValue) -> Result<Capability, JsError> {
    let promise_ctor = interp.intrinsic(Intrinsic::Promise);
    if ctor.as_object().is_some_and(|c| c.ptr_eq(&promise_ctor)) {
        return Ok(Capability::Builtin(new_promise(interp)));
    }
    if !ctor.is_constructor() {
        return Err(JsError::type_error(format!("{} is not a constructor", ctor.display_hint())));
    }
    let executor = interp.create_native_closure(
        "",
        capability_executor,
        2,
        vec![JsValue::Undefined, JsValue::Undefined],
    );
    let executor = JsValue::Object(executor);
    let promise = interp.construct(ctor, std::slice::from_ref(&executor), None)?;
    let (resolve, reject) = read_captures(&executor);
    if !resolve.is_callable() || !reject.is_callable() {
        return Err(JsError::type_error("Promise resolve or reject function is not callable"));
    }
    Ok(Capability::Custom {
        promise,
        resolve,
        reject,
    })
}

fn read_captures(func: &JsValue) -> (JsValue, JsValue) {
    let Some(obj) = func.as_object() else {
        return (JsValue::Undefined, JsValue::Undefined);
    };
    match obj.borrow().function() {
        Some(JsFunction::Native(n)) => (
            n.captures.first().cloned().unwrap_or_default(),
            n.captures.get(1).cloned().unwrap_or_default(),
        ),
        _ => (JsValue::Undefined, JsValue::Undefined),
    }
}

fn capability_executor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    if !capture(interp, 0).is_undefined() || !capture(interp, 1).is_undefined() {
        return Err(JsError::type_error("Promise executor has already been invoked"));
    }
    let me = callee(interp);
    set_capture(&me, 0, arg(args, 0));
    set_capture(&me, 1, arg(args, 1));
    Ok(JsValue::Undefined)
}

fn capability_resolve(interp: &mut Interpreter, capability: &Capability, value: JsValue) -> Result<(), JsError> {
    match capability {
        Capability::Builtin(p) => resolve_promise(interp, p, value),
        Capability::Custom { resolve, .. } => interp.call_function(resolve, JsValue::Undefined, &[value]).map(|_| ()),
    }
}

fn capability_reject(interp: &mut Interpreter, capability: &Capability, reason: JsValue) -> Result<(), JsError> {
    match capability {
        Capability::Builtin(p) => {
            reject_promise(interp, p, reason);
            Ok(())
        }
        Capability::Custom { reject, .. } => interp.call_function(reject, JsValue::Undefined, &[reason]).map(|_| ()),
    }
}

/// The capability's resolve and reject as callable values
fn capability_functions(interp: &mut Interpreter, capability: &Capability) -> (JsValue, JsValue) {
    match capability {
        Capability::Builtin(p) => create_resolving_functions(interp, p),
        Capability::Custom { resolve, reject, .. } => (resolve.clone(), reject.clone()),
    }
}

/// `IfAbruptRejectPromise`
fn reject_abrupt(interp: &mut Interpreter, capability: &Capability, err: JsError) -> Result<JsValue, JsError> {
    let reason = interp.catch_error(err)?;
    capability_reject(interp, capability, reason)?;
    Ok(capability.promise())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Jobs
// ═══════════════════════════════════════════════════════════════════════════════

/// Run one microtask
pub fn run_job(interp: &mut Interpreter, job: Job) -> Result<(), JsError> {
    match job {
        Job::Callback(f) => {
            tracing::trace!("microtask callback");
            interp.call_function(&f, JsValue::Undefined, &[]).map(|_| ())
        }
        Job::ResolveThenable {
            promise,
            thenable,
            then,
        } => {
            tracing::trace!("resolve thenable job");
            let (resolve, reject) = create_resolving_functions(interp, &promise);
            if let Err(err) = interp.call_function(&then, thenable, &[resolve, reject.clone()]) {
                let reason = interp.catch_error(err)?;
                interp.call_function(&reject, JsValue::Undefined, &[reason])?;
            }
            Ok(())
        }
        Job::Reaction { reaction, argument } => {
            tracing::trace!(kind = ?reaction.kind, "promise reaction job");
            run_reaction(interp, reaction, argument)
        }
    }
}

fn run_reaction(interp: &mut Interpreter, reaction: Reaction, argument: JsValue) -> Result<(), JsError> {
    let fulfilled = reaction.kind == ReactionKind::Fulfill;
    let result = match reaction.handler {
        ReactionHandler::Resume(owner) => {
            let resume = if fulfilled {
                Resume::Next(argument)
            } else {
                Resume::Throw(argument)
            };
            return interp.resume_suspended(&owner, resume);
        }
        ReactionHandler::AsyncGenReturn(generator) => {
            let settled = if fulfilled { Ok(argument) } else { Err(argument) };
            return interp.async_generator_return_settled(&generator, settled);
        }
        ReactionHandler::Function(JsValue::Undefined) => {
            if fulfilled {
                Ok(argument)
            } else {
                Err(JsError::thrown(argument))
            }
        }
        ReactionHandler::Function(f) => interp.call_function(&f, JsValue::Undefined, &[argument]),
    };
    let Some(capability) = reaction.capability else {
        return result.map(|_| ());
    };
    match result {
        Ok(v) => capability_resolve(interp, &capability, v),
        Err(err) => {
            let reason = interp.catch_error(err)?;
            capability_reject(interp, &capability, reason)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constructor and prototype
// ═══════════════════════════════════════════════════════════════════════════════

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::Promise).is_some() {
        return;
    }
    let proto = interp.create_object();
    interp.register_method(&proto, "then", promise_then, 2);
    interp.register_method(&proto, "catch", promise_catch, 1);
    interp.register_method(&proto, "finally", promise_finally, 1);
    super::set_to_string_tag(&proto, "Promise");

    let ctor = interp.create_native_constructor("Promise", promise_constructor, 1, &proto);
    interp.register_method(&ctor, "resolve", promise_static_resolve, 1);
    interp.register_method(&ctor, "reject", promise_static_reject, 1);
    interp.register_method(&ctor, "all", promise_all, 1);
    interp.register_method(&ctor, "allSettled", promise_all_settled, 1);
    interp.register_method(&ctor, "any", promise_any, 1);
    interp.register_method(&ctor, "race", promise_race, 1);
    interp.register_method(&ctor, "withResolvers", promise_with_resolvers, 0);
    super::register_species(interp, &ctor);

    interp.realm.set(Intrinsic::PromisePrototype, proto);
    interp.realm.set(Intrinsic::Promise, ctor);
}

/// new Promise(executor)
fn promise_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let nt = interp.new_target.clone();
    if nt.is_undefined() {
        return Err(JsError::type_error("Promise constructor cannot be invoked without 'new'"));
    }
    let executor = arg(args, 0);
    if !executor.is_callable() {
        return Err(JsError::type_error(format!(
            "Promise resolver {} is not a function",
            executor.display_hint()
        )));
    }
    let proto = interp.get_prototype_from_constructor(&nt, Intrinsic::PromisePrototype)?;
    let promise = new_promise_with_proto(interp, proto);
    let (resolve, reject) = create_resolving_functions(interp, &promise);
    if let Err(err) = interp.call_function(&executor, JsValue::Undefined, &[resolve, reject.clone()]) {
        let reason = interp.catch_error(err)?;
        interp.call_function(&reject, JsValue::Undefined, &[reason])?;
    }
    Ok(JsValue::Object(promise))
}

fn this_promise(this: &JsValue, method: &str) -> Result<JsObjectRef, JsError> {
    match this {
        JsValue::Object(o) if matches!(o.borrow().kind, ObjectKind::Promise(_)) => Ok(o.clone()),
        _ => Err(JsError::type_error(format!(
            "Method Promise.prototype.{method} called on incompatible receiver {}",
            this.display_hint()
        ))),
    }
}

/// Promise.prototype.then(onFulfilled, onRejected)
fn promise_then(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let promise = this_promise(&this, "then")?;
    let ctor = interp.species_constructor(&promise, Intrinsic::Promise)?;
    let capability = new_capability(interp, &ctor)?;
    let result = capability.promise();
    perform_then(
        interp,
        &promise,
        ReactionHandler::Function(arg(args, 0)),
        ReactionHandler::Function(arg(args, 1)),
        Some(capability),
    );
    Ok(result)
}

/// Promise.prototype.catch(onRejected)
fn promise_catch(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    interp.invoke(&this, &PropertyKey::from("then"), &[JsValue::Undefined, arg(args, 0)])
}

/// Promise.prototype.finally(onFinally)
fn promise_finally(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let JsValue::Object(obj) = &this else {
        return Err(JsError::type_error("Promise.prototype.finally called on a non-object"));
    };
    let ctor = interp.species_constructor(obj, Intrinsic::Promise)?;
    let on_finally = arg(args, 0);
    if !on_finally.is_callable() {
        return interp.invoke(&this, &PropertyKey::from("then"), &[on_finally.clone(), on_finally]);
    }
    let captures = vec![on_finally, ctor];
    let then_finally = interp.create_native_closure("", then_finally, 1, captures.clone());
    let catch_finally = interp.create_native_closure("", catch_finally, 1, captures);
    interp.invoke(
        &this,
        &PropertyKey::from("then"),
        &[JsValue::Object(then_finally), JsValue::Object(catch_finally)],
    )
}

fn then_finally(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let on_finally = capture(interp, 0);
    let ctor = capture(interp, 1);
    let result = interp.call_function(&on_finally, JsValue::Undefined, &[])?;
    let promise = promise_resolve_with(interp, &ctor, result)?;
    let value_thunk = interp.create_native_closure("", return_capture, 0, vec![arg(args, 0)]);
    interp.invoke(&promise, &PropertyKey::from("then"), &[JsValue::Object(value_thunk)])
}

fn catch_finally(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let on_finally = capture(interp, 0);
    let ctor = capture(interp, 1);
    let result = interp.call_function(&on_finally, JsValue::Undefined, &[])?;
    let promise = promise_resolve_with(interp, &ctor, result)?;
    let thrower = interp.create_native_closure("", throw_capture, 0, vec![arg(args, 0)]);
    interp.invoke(&promise, &PropertyKey::from("then"), &[JsValue::Object(thrower)])
}

fn return_capture(interp: &mut Interpreter, _this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(capture(interp, 0))
}

fn throw_capture(interp: &mut Interpreter, _this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Err(JsError::thrown(capture(interp, 0)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Statics
// ═══════════════════════════════════════════════════════════════════════════════

/// Promise.resolve(value)
fn promise_static_resolve(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    if !this.is_object() {
        return Err(JsError::type_error("Promise.resolve called on non-object"));
    }
    promise_resolve_with(interp, &this, arg(args, 0))
}

/// Promise.reject(reason)
fn promise_static_reject(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let capability = new_capability(interp, &this)?;
    capability_reject(interp, &capability, arg(args, 0))?;
    Ok(capability.promise())
}

/// Promise.withResolvers()
fn promise_with_resolvers(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let capability = new_capability(interp, &this)?;
    let (resolve, reject) = capability_functions(interp, &capability);
    let obj = interp.create_object();
    interp.create_data_property_or_throw(&obj, PropertyKey::from("promise"), capability.promise())?;
    interp.create_data_property_or_throw(&obj, PropertyKey::from("resolve"), resolve)?;
    interp.create_data_property_or_throw(&obj, PropertyKey::from("reject"), reject)?;
    Ok(JsValue::Object(obj))
}

/// Shared slots of a combinator: the result list and the count of
/// elements still pending, kept in a hidden array `[values, remaining]`
fn combinator_state(interp: &mut Interpreter) -> JsObjectRef {
    let values = interp.create_array(Vec::new());
    interp.create_array(vec![JsValue::Object(values), JsValue::from(1)])
}

fn state_values(state: &JsValue) -> Option<JsObjectRef> {
    state
        .as_object()
        .and_then(|s| s.borrow().elements.first().cloned())
        .and_then(|v| v.as_object().cloned())
}

/// Adjust the pending count and return the new value
fn state_remaining(state: &JsValue, delta: i64) -> i64 {
    let Some(s) = state.as_object() else {
        return 0;
    };
    let mut o = s.borrow_mut();
    let Some(slot) = o.elements.get_mut(1) else {
        return 0;
    };
    let next = match slot {
        JsValue::Int(n) => *n + delta,
        _ => delta,
    };
    *slot = JsValue::from(next);
    next
}

fn store_value(interp: &mut Interpreter, state: &JsValue, index: &JsValue, value: JsValue) -> Result<(), JsError> {
    if let Some(values) = state_values(state) {
        let key = interp.to_property_key(index)?;
        interp.create_data_property_or_throw(&values, key, value)?;
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Combinator {
    All,
    AllSettled,
    Any,
}

/// Drive `Promise.all`, `allSettled` and `any` over `iterable`
fn combine(interp: &mut Interpreter, this: JsValue, iterable: &JsValue, which: Combinator) -> Result<JsValue, JsError> {
    let capability = new_capability(interp, &this)?;
    let resolve_fn = match interp.get_value(&this, &PropertyKey::from("resolve")) {
        Ok(f) if f.is_callable() => f,
        Ok(_) => {
            let err = JsError::type_error("Promise resolve is not a function");
            return reject_abrupt(interp, &capability, err);
        }
        Err(err) => return reject_abrupt(interp, &capability, err),
    };
    let mut record = match interp.get_iterator(iterable) {
        Ok(r) => r,
        Err(err) => return reject_abrupt(interp, &capability, err),
    };
    let (cap_resolve, cap_reject) = capability_functions(interp, &capability);
    let state = JsValue::Object(combinator_state(interp));
    let mut index = 0usize;
    loop {
        let value = match interp.iterator_step_value(&mut record) {
            Ok(Some(v)) => v,
            Ok(None) => break,
            Err(err) => return reject_abrupt(interp, &capability, err),
        };
        let step = (|| {
            store_value(interp, &state, &JsValue::from(index), JsValue::Undefined)?;
            let next = interp.call_function(&resolve_fn, this.clone(), &[value])?;
            let idx = JsValue::from(index);
            let (on_fulfilled, on_rejected) = match which {
                Combinator::All => {
                    let f = interp.create_native_closure(
                        "",
                        all_resolve_element,
                        1,
                        vec![state.clone(), idx, cap_resolve.clone()],
                    );
                    (JsValue::Object(f), cap_reject.clone())
                }
                Combinator::AllSettled => {
                    let called = JsValue::Object(interp.create_array(vec![JsValue::Bool(false)]));
                    let f = interp.create_native_closure(
                        "",
                        all_settled_fulfilled,
                        1,
                        vec![state.clone(), idx.clone(), cap_resolve.clone(), called.clone()],
                    );
                    let r = interp.create_native_closure(
                        "",
                        all_settled_rejected,
                        1,
                        vec![state.clone(), idx, cap_resolve.clone(), called],
                    );
                    (JsValue::Object(f), JsValue::Object(r))
                }
                Combinator::Any => {
                    let r = interp.create_native_closure(
                        "",
                        any_reject_element,
                        1,
                        vec![state.clone(), idx, cap_reject.clone()],
                    );
                    (cap_resolve.clone(), JsValue::Object(r))
                }
            };
            state_remaining(&state, 1);
            interp.invoke(&next, &PropertyKey::from("then"), &[on_fulfilled, on_rejected])?;
            Ok(())
        })();
        if let Err(err) = step {
            let err = interp.iterator_close_with_error(&record.iterator, err);
            return reject_abrupt(interp, &capability, err);
        }
        index += 1;
    }
    if state_remaining(&state, -1) == 0 {
        let values = state_values(&state).map(JsValue::Object).unwrap_or_default();
        let finished = if which == Combinator::Any {
            let errors = match state_values(&state) {
                Some(v) => interp.create_list_from_array_like(&JsValue::Object(v))?,
                None => Vec::new(),
            };
            let err = super::error::create_aggregate_error(interp, errors, "All promises were rejected");
            interp.call_function(&cap_reject, JsValue::Undefined, &[err])
        } else {
            interp.call_function(&cap_resolve, JsValue::Undefined, &[values])
        };
        if let Err(err) = finished {
            return reject_abrupt(interp, &capability, err);
        }
    }
    Ok(capability.promise())
}

/// Mark a once-only element function as used; `false` if it already ran
fn claim_element(interp: &mut Interpreter) -> bool {
    if capture(interp, 1).is_undefined() {
        return false;
    }
    let me = callee(interp);
    set_capture(&me, 1, JsValue::Undefined);
    true
}

fn finish_element(interp: &mut Interpreter, state: &JsValue, settle: &JsValue, reject: bool) -> Result<JsValue, JsError> {
    if state_remaining(state, -1) != 0 {
        return Ok(JsValue::Undefined);
    }
    let values = state_values(state);
    let arg = if reject {
        let errors = match values {
            Some(v) => interp.create_list_from_array_like(&JsValue::Object(v))?,
            None => Vec::new(),
        };
        super::error::create_aggregate_error(interp, errors, "All promises were rejected")
    } else {
        values.map(JsValue::Object).unwrap_or_default()
    };
    interp.call_function(settle, JsValue::Undefined, &[arg])
}

fn all_resolve_element(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let state = capture(interp, 0);
    let index = capture(interp, 1);
    let resolve = capture(interp, 2);
    if !claim_element(interp) {
        return Ok(JsValue::Undefined);
    }
    store_value(interp, &state, &index, arg(args, 0))?;
    finish_element(interp, &state, &resolve, false)
}

fn any_reject_element(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let state = capture(interp, 0);
    let index = capture(interp, 1);
    let reject = capture(interp, 2);
    if !claim_element(interp) {
        return Ok(JsValue::Undefined);
    }
    store_value(interp, &state, &index, arg(args, 0))?;
    finish_element(interp, &state, &reject, true)
}

fn settled_element(interp: &mut Interpreter, args: &[JsValue], fulfilled: bool) -> Result<JsValue, JsError> {
    let state = capture(interp, 0);
    let index = capture(interp, 1);
    let resolve = capture(interp, 2);
    let called = capture(interp, 3);
    if let Some(flag) = called.as_object() {
        let mut f = flag.borrow_mut();
        match f.elements.first_mut() {
            Some(slot) if *slot == JsValue::Bool(false) => *slot = JsValue::Bool(true),
            _ => return Ok(JsValue::Undefined),
        }
    }
    let entry = interp.create_object();
    let (status, key) = if fulfilled {
        ("fulfilled", "value")
    } else {
        ("rejected", "reason")
    };
    interp.create_data_property_or_throw(&entry, PropertyKey::from("status"), JsValue::from(status))?;
    interp.create_data_property_or_throw(&entry, PropertyKey::from(key), arg(args, 0))?;
    store_value(interp, &state, &index, JsValue::Object(entry))?;
    finish_element(interp, &state, &resolve, false)
}

fn all_settled_fulfilled(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    settled_element(interp, args, true)
}

fn all_settled_rejected(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    settled_element(interp, args, false)
}

/// Promise.all(iterable)
fn promise_all(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    combine(interp, this, &arg(args, 0), Combinator::All)
}

/// Promise.allSettled(iterable)
fn promise_all_settled(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    combine(interp, this, &arg(args, 0), Combinator::AllSettled)
}

/// Promise.any(iterable)
fn promise_any(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    combine(interp, this, &arg(args, 0), Combinator::Any)
}

/// Promise.race(iterable)
fn promise_race(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let capability = new_capability(interp, &this)?;
    let resolve_fn = match interp.get_value(&this, &PropertyKey::from("resolve")) {
        Ok(f) if f.is_callable() => f,
        Ok(_) => {
            let err = JsError::type_error("Promise resolve is not a function");
            return reject_abrupt(interp, &capability, err);
        }
        Err(err) => return reject_abrupt(interp, &capability, err),
    };
    let mut record = match interp.get_iterator(&arg(args, 0)) {
        Ok(r) => r,
        Err(err) => return reject_abrupt(interp, &capability, err),
    };
    let (resolve, reject) = capability_functions(interp, &capability);
    loop {
        let value = match interp.iterator_step_value(&mut record) {
            Ok(Some(v)) => v,
            Ok(None) => break,
            Err(err) => return reject_abrupt(interp, &capability, err),
        };
        let step = interp
            .call_function(&resolve_fn, this.clone(), &[value])
            .and_then(|next| interp.invoke(&next, &PropertyKey::from("then"), &[resolve.clone(), reject.clone()]));
        if let Err(err) = step {
            let err = interp.iterator_close_with_error(&record.iterator, err);
            return reject_abrupt(interp, &capability, err);
        }
    }
    Ok(capability.promise())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolving_twice_keeps_first_value() {
        let mut interp = Interpreter::new(0, false);
        let p = new_promise(&mut interp);
        let (resolve, _reject) = create_resolving_functions(&mut interp, &p);
        let _ = interp.call_function(&resolve, JsValue::Undefined, &[JsValue::from(1)]);
        let _ = interp.call_function(&resolve, JsValue::Undefined, &[JsValue::from(2)]);
        let state = promise_state(&p);
        assert!(matches!(state, Some((PromiseStatus::Fulfilled, JsValue::Int(1)))));
    }

    #[test]
    fn reactions_run_as_jobs() {
        let mut interp = Interpreter::new(0, false);
        let p = new_promise(&mut interp);
        let target = new_promise(&mut interp);
        perform_then(
            &mut interp,
            &p,
            ReactionHandler::Function(JsValue::Undefined),
            ReactionHandler::Function(JsValue::Undefined),
            Some(Capability::Builtin(target.clone())),
        );
        fulfill_promise(&mut interp, &p, JsValue::from("done"));
        assert!(matches!(promise_state(&target), Some((PromiseStatus::Pending, _))));
        assert!(interp.run_jobs().is_ok());
        assert!(matches!(promise_state(&target), Some((PromiseStatus::Fulfilled, JsValue::String(_)))));
    }

    #[test]
    fn self_resolution_rejects() {
        let mut interp = Interpreter::new(0, false);
        let p = new_promise(&mut interp);
        assert!(resolve_promise(&mut interp, &p, JsValue::Object(p.clone())).is_ok());
        assert!(matches!(promise_state(&p), Some((PromiseStatus::Rejected, JsValue::Object(_)))));
    }
}
