//! The legacy `Iterator`/`StopIteration` protocol and the shared cursor
//! machinery behind every iterator object in this layer.
//!
//! Script-facing `next()` signals exhaustion by throwing the per-scope
//! StopIteration singleton; engine-facing callers use [`next_step`], which
//! reports exhaustion as a result value instead of an error.

use crate::error::JsError;
use crate::host::{HostCursor, ListCursor};
use crate::runtime::builtins::host_list;
use crate::runtime::{
    HostData, JsFunction, ObjRef, Runtime, call_function, get_property, has_property, is_callable,
    to_boolean, to_object_or_null, to_string_value,
};
use crate::types::{JsValue, WellKnownSymbol};
use std::cell::RefCell;
use std::rc::Rc;

/// Result of pulling one element through the engine-facing interface.
pub enum IterStep {
    Produced(JsValue),
    Exhausted,
}

pub const STOP_ITERATION_TAG: &str = "StopIteration";
pub const ITERATOR_PROPERTY_NAME: &str = "__iterator__";

/// Marker carried by the StopIteration singleton (and by nothing else).
#[derive(Debug, Clone)]
pub struct StopIterationData {
    pub value: JsValue,
}

/// Position of an in-progress iterator.
pub enum IterCursor {
    /// Snapshot property enumeration over `target`.
    Enumeration {
        target: ObjRef,
        keys: Vec<String>,
        index: usize,
        keys_only: bool,
    },
    /// Adapter over a host-side cursor.
    Host(Rc<RefCell<dyn HostCursor>>),
    /// Live walk over a collection's entries table.
    Collection {
        target: ObjRef,
        index: usize,
        pairs: bool,
    },
    /// Live walk over an array's element storage.
    Elements { target: ObjRef, index: usize },
}

pub struct IterState {
    pub cursor: IterCursor,
    /// Sticky: once set, every later pull reports exhaustion again.
    pub exhausted: bool,
}

#[derive(Clone, Copy)]
enum IteratorOp {
    Constructor,
    Next,
    SelfIterator,
}

fn native_op(rt: &mut Runtime, scope_id: u64, name: &str, arity: usize, op: IteratorOp) -> JsValue {
    rt.create_function(JsFunction::native(
        name.to_string(),
        arity,
        move |rt, this, args| exec_op(rt, scope_id, op, this, args),
    ))
}

/// Installs the `Iterator` constructor and the `StopIteration` singleton
/// into `scope`.
pub fn init(rt: &mut Runtime, scope: &ObjRef) -> Result<Option<JsValue>, JsError> {
    let scope_id = scope.borrow().id.unwrap_or(0);

    let proto = rt.create_object();
    proto.borrow_mut().class_name = "Iterator".to_string();
    let next_fn = native_op(rt, scope_id, "next", 0, IteratorOp::Next);
    let self_fn = native_op(rt, scope_id, ITERATOR_PROPERTY_NAME, 1, IteratorOp::SelfIterator);
    {
        let mut b = proto.borrow_mut();
        b.insert_builtin("next".to_string(), next_fn);
        b.insert_builtin(ITERATOR_PROPERTY_NAME.to_string(), self_fn);
    }

    let ctor = native_op(rt, scope_id, "Iterator", 2, IteratorOp::Constructor);
    let proto_val = rt.object_value(&proto);
    if let Some(ctor_obj) = to_object_or_null(rt, &ctor) {
        ctor_obj
            .borrow_mut()
            .insert_builtin("prototype".to_string(), proto_val);
    }
    proto
        .borrow_mut()
        .insert_builtin("constructor".to_string(), ctor.clone());
    rt.iterator_prototype = Some(proto);
    scope
        .borrow_mut()
        .insert_builtin("Iterator".to_string(), ctor.clone());

    // The StopIteration singleton: bound on the scope as an ordinary
    // deletable property, and stashed in the per-scope registry so the
    // protocol survives script-level overwrite or delete of the binding.
    let stop = rt.create_object();
    {
        let mut b = stop.borrow_mut();
        b.class_name = "StopIteration".to_string();
        b.parent_scope = Some(scope.clone());
        b.stop_iteration = Some(StopIterationData {
            value: JsValue::Undefined,
        });
    }
    let stop_val = rt.object_value(&stop);
    scope
        .borrow_mut()
        .insert_builtin(STOP_ITERATION_TAG.to_string(), stop_val.clone());
    rt.associate_value(scope, STOP_ITERATION_TAG, stop_val);

    Ok(Some(ctor))
}

/// Engine entry point matching a function-style `Iterator(obj, keysOnly)`
/// call: host cursors and `__iterator__` hooks are consulted before falling
/// back to property enumeration.
pub fn construct_iterator(
    rt: &mut Runtime,
    scope: &ObjRef,
    target: &JsValue,
    keys_only: bool,
) -> Result<JsValue, JsError> {
    construct_iterator_impl(rt, scope, target, keys_only, true)
}

fn construct_iterator_impl(
    rt: &mut Runtime,
    scope: &ObjRef,
    target: &JsValue,
    keys_only: bool,
    allow_custom: bool,
) -> Result<JsValue, JsError> {
    if target.is_nullish() {
        return Err(JsError::type_error(format!(
            "{} has no properties",
            to_string_value(rt, target)?
        )));
    }
    let Some(target_obj) = to_object_or_null(rt, target) else {
        return Err(JsError::type_error(format!(
            "{} is not iterable",
            to_string_value(rt, target)?
        )));
    };

    if allow_custom {
        // A wrapped host cursor or host list iterates through the host
        // adapter, not through property enumeration.
        let host_cursor: Option<Rc<RefCell<dyn HostCursor>>> = {
            let b = target_obj.borrow();
            match &b.host_data {
                Some(HostData::Cursor(c)) => Some(c.clone()),
                Some(HostData::List(d)) => Some(Rc::new(RefCell::new(ListCursor::new(
                    d.list.clone(),
                )))),
                _ => None,
            }
        };
        if let Some(cursor) = host_cursor {
            return Ok(new_iterator_object(rt, scope, IterCursor::Host(cursor)));
        }

        // User-defined protocol hook
        let hook = get_property(rt, &target_obj, ITERATOR_PROPERTY_NAME)?;
        if is_callable(rt, &hook) {
            let result = call_function(rt, &hook, target, &[JsValue::Boolean(keys_only)])?;
            if !result.is_object() {
                return Err(JsError::type_error(format!(
                    "Invalid iterator value {}",
                    to_string_value(rt, &result)?
                )));
            }
            return Ok(result);
        }
    }

    let keys: Vec<String> = target_obj
        .borrow()
        .enumerable_keys_with_proto()
        .into_iter()
        .filter(|k| k != ITERATOR_PROPERTY_NAME)
        .collect();
    Ok(new_iterator_object(
        rt,
        scope,
        IterCursor::Enumeration {
            target: target_obj,
            keys,
            index: 0,
            keys_only,
        },
    ))
}

fn new_iterator_object(rt: &mut Runtime, scope: &ObjRef, cursor: IterCursor) -> JsValue {
    let obj = rt.create_object_with_proto(rt.iterator_prototype.clone());
    {
        let mut b = obj.borrow_mut();
        b.class_name = "Iterator".to_string();
        b.parent_scope = Some(Runtime::top_level_scope(scope));
        b.iterator_state = Some(IterState {
            cursor,
            exhausted: false,
        });
    }
    rt.object_value(&obj)
}

/// Pulls one element from `iter`. Exhaustion is a result, not an error, and
/// is idempotent: once exhausted, every later call reports exhaustion.
pub fn next_step(rt: &mut Runtime, iter: &ObjRef) -> Result<IterStep, JsError> {
    {
        let b = iter.borrow();
        let Some(state) = &b.iterator_state else {
            return Err(JsError::type_error(
                "Method next called on incompatible receiver",
            ));
        };
        if state.exhausted {
            return Ok(IterStep::Exhausted);
        }
    }

    loop {
        // Advance the cursor under the borrow, then release it before any
        // runtime call the step needs.
        enum Pending {
            Done,
            Key(String),
            HostValue(crate::host::HostValue),
            Entry(JsValue, bool),
        }
        let pending = {
            let mut b = iter.borrow_mut();
            let Some(state) = &mut b.iterator_state else {
                return Err(JsError::type_error(
                    "Method next called on incompatible receiver",
                ));
            };
            match &mut state.cursor {
                IterCursor::Enumeration { keys, index, .. } => {
                    if *index >= keys.len() {
                        state.exhausted = true;
                        Pending::Done
                    } else {
                        let key = keys[*index].clone();
                        *index += 1;
                        Pending::Key(key)
                    }
                }
                IterCursor::Host(cursor) => match cursor.borrow_mut().next_value() {
                    Some(hv) => Pending::HostValue(hv),
                    None => {
                        state.exhausted = true;
                        Pending::Done
                    }
                },
                IterCursor::Collection { target, index, pairs } => {
                    let value = target
                        .borrow()
                        .set_data
                        .as_ref()
                        .and_then(|d| d.entry_at(*index));
                    match value {
                        Some(v) => {
                            *index += 1;
                            Pending::Entry(v, *pairs)
                        }
                        None => {
                            state.exhausted = true;
                            Pending::Done
                        }
                    }
                }
                IterCursor::Elements { target, index } => {
                    let value = target
                        .borrow()
                        .array_elements
                        .as_ref()
                        .and_then(|elems| elems.get(*index).cloned());
                    match value {
                        Some(v) => {
                            *index += 1;
                            Pending::Entry(v, false)
                        }
                        None => {
                            state.exhausted = true;
                            Pending::Done
                        }
                    }
                }
            }
        };

        match pending {
            Pending::Done => return Ok(IterStep::Exhausted),
            Pending::Key(key) => {
                let (target, keys_only) = {
                    let b = iter.borrow();
                    match &b.iterator_state {
                        Some(IterState {
                            cursor: IterCursor::Enumeration { target, keys_only, .. },
                            ..
                        }) => (target.clone(), *keys_only),
                        _ => return Err(JsError::internal("iterator cursor changed mid-step")),
                    }
                };
                // Keys removed since the snapshot are skipped.
                if !has_property(rt, &target, &key) {
                    continue;
                }
                if keys_only {
                    return Ok(IterStep::Produced(JsValue::from_str(&key)));
                }
                let value = get_property(rt, &target, &key)?;
                let pair = rt.create_array(vec![JsValue::from_str(&key), value]);
                return Ok(IterStep::Produced(pair));
            }
            Pending::HostValue(hv) => {
                return Ok(IterStep::Produced(host_list::default_unwrapper(rt, &hv)));
            }
            Pending::Entry(v, pairs) => {
                if pairs {
                    let pair = rt.create_array(vec![v.clone(), v]);
                    return Ok(IterStep::Produced(pair));
                }
                return Ok(IterStep::Produced(v));
            }
        }
    }
}

/// The error a script-facing `next()` raises on exhaustion: the per-scope
/// StopIteration singleton as a thrown value.
pub fn throw_stop_iteration(rt: &Runtime, scope_source: &ObjRef) -> JsError {
    match rt.top_scope_value(scope_source, STOP_ITERATION_TAG) {
        Some(v) => JsError::thrown(v),
        None => JsError::internal("StopIteration is not initialized in this scope"),
    }
}

/// A fresh exhaustion signal carrying a payload value, for producers that
/// finish with a final result.
pub fn new_stop_iteration(rt: &mut Runtime, scope: &ObjRef, value: JsValue) -> JsValue {
    let obj = rt.create_object();
    {
        let mut b = obj.borrow_mut();
        b.class_name = "StopIteration".to_string();
        b.parent_scope = Some(Runtime::top_level_scope(scope));
        b.stop_iteration = Some(StopIterationData { value });
    }
    rt.object_value(&obj)
}

/// The payload carried by an exhaustion signal, when `value` is one.
pub fn stop_iteration_value(rt: &Runtime, value: &JsValue) -> Option<JsValue> {
    to_object_or_null(rt, value)
        .and_then(|obj| obj.borrow().stop_iteration.as_ref().map(|d| d.value.clone()))
}

/// Recognizes the StopIteration singleton by its marker, not by identity
/// with the (deletable) scope binding.
pub fn is_stop_iteration(rt: &Runtime, value: &JsValue) -> bool {
    to_object_or_null(rt, value).is_some_and(|obj| obj.borrow().stop_iteration.is_some())
}

fn exec_op(
    rt: &mut Runtime,
    scope_id: u64,
    op: IteratorOp,
    this: &JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    match op {
        IteratorOp::Constructor => {
            let scope = rt
                .get_object(scope_id)
                .ok_or_else(|| JsError::internal("iterator scope is gone"))?;
            let target = args.first().cloned().unwrap_or(JsValue::Undefined);
            let keys_only = args.get(1).map(to_boolean).unwrap_or(false);
            let as_function = rt.new_target.is_none();
            construct_iterator_impl(rt, &scope, &target, keys_only, as_function)
        }
        IteratorOp::Next => {
            let iter = require_iterator(rt, this)?;
            match next_step(rt, &iter)? {
                IterStep::Produced(v) => Ok(v),
                IterStep::Exhausted => Err(throw_stop_iteration(rt, &iter)),
            }
        }
        IteratorOp::SelfIterator => {
            require_iterator(rt, this)?;
            Ok(this.clone())
        }
    }
}

fn require_iterator(rt: &Runtime, this: &JsValue) -> Result<ObjRef, JsError> {
    to_object_or_null(rt, this)
        .filter(|obj| obj.borrow().iterator_state.is_some())
        .ok_or_else(|| {
            JsError::type_error("Method Iterator.prototype.next called on incompatible receiver")
        })
}

/// Builds an ES6 `{value, done}` result object.
pub fn create_iter_result(rt: &mut Runtime, value: JsValue, done: bool) -> JsValue {
    let obj = rt.create_object();
    {
        let mut b = obj.borrow_mut();
        b.insert_value("value".to_string(), value);
        b.insert_value("done".to_string(), JsValue::Boolean(done));
    }
    rt.object_value(&obj)
}

#[derive(Clone, Copy)]
enum CollectionIterOp {
    Next,
    SelfIterator,
}

/// Builds the prototype shared by a collection's ES6-style iterators
/// (`next()` returning `{value, done}` result objects).
pub fn init_collection_iterator_proto(rt: &mut Runtime, tag: &str) -> ObjRef {
    let proto = rt.create_object();
    proto.borrow_mut().class_name = tag.to_string();

    let next_fn = collection_op(rt, "next", CollectionIterOp::Next);
    let self_fn = collection_op(
        rt,
        WellKnownSymbol::Iterator.to_property_key(),
        CollectionIterOp::SelfIterator,
    );
    {
        let mut b = proto.borrow_mut();
        b.insert_builtin("next".to_string(), next_fn);
        b.insert_builtin(
            WellKnownSymbol::Iterator.to_property_key().to_string(),
            self_fn,
        );
        b.insert_property(
            WellKnownSymbol::ToStringTag.to_property_key().to_string(),
            crate::runtime::PropertyDescriptor::data(JsValue::from_str(tag), false, false, true),
        );
    }
    proto
}

fn collection_op(rt: &mut Runtime, name: &str, op: CollectionIterOp) -> JsValue {
    rt.create_function(JsFunction::native(
        name.to_string(),
        0,
        move |rt, this, _args| match op {
            CollectionIterOp::Next => {
                let iter = require_iterator(rt, this)?;
                match next_step(rt, &iter)? {
                    IterStep::Produced(v) => Ok(create_iter_result(rt, v, false)),
                    IterStep::Exhausted => Ok(create_iter_result(rt, JsValue::Undefined, true)),
                }
            }
            CollectionIterOp::SelfIterator => {
                require_iterator(rt, this)?;
                Ok(this.clone())
            }
        },
    ))
}

/// A live ES6-style iterator over an array's element storage.
pub fn new_array_iterator(rt: &mut Runtime, target: &ObjRef) -> JsValue {
    let proto = match &rt.array_iterator_prototype {
        Some(p) => p.clone(),
        None => {
            let p = init_collection_iterator_proto(rt, "Array Iterator");
            rt.array_iterator_prototype = Some(p.clone());
            p
        }
    };
    let obj = rt.create_object_with_proto(Some(proto));
    obj.borrow_mut().iterator_state = Some(IterState {
        cursor: IterCursor::Elements {
            target: target.clone(),
            index: 0,
        },
        exhausted: false,
    });
    rt.object_value(&obj)
}

/// A live iterator over a collection's entries table, using `proto` built by
/// [`init_collection_iterator_proto`].
pub fn new_collection_iterator(
    rt: &mut Runtime,
    proto: &ObjRef,
    target: &ObjRef,
    pairs: bool,
) -> JsValue {
    let obj = rt.create_object_with_proto(Some(proto.clone()));
    {
        let mut b = obj.borrow_mut();
        b.class_name = proto.borrow().class_name.clone();
        b.parent_scope = target.borrow().parent_scope.clone();
        b.iterator_state = Some(IterState {
            cursor: IterCursor::Collection {
                target: target.clone(),
                index: 0,
                pairs,
            },
            exhausted: false,
        });
    }
    rt.object_value(&obj)
}

/// Scoped driver for an ES6-shaped iterator object: `next()` pulls, and
/// `close()` invokes `return` at most once. A thrown StopIteration from a
/// legacy iterator is treated as completion.
pub struct IteratorHandle {
    iterator: ObjRef,
    next_fn: JsValue,
    closed: bool,
}

impl IteratorHandle {
    pub fn open(rt: &mut Runtime, iterator: &JsValue) -> Result<Self, JsError> {
        let obj = to_object_or_null(rt, iterator).ok_or_else(|| {
            JsError::type_error("Result of the Symbol.iterator method is not an object")
        })?;
        let next_fn = get_property(rt, &obj, "next")?;
        if !is_callable(rt, &next_fn) {
            return Err(JsError::type_error("next is not a function"));
        }
        Ok(Self {
            iterator: obj,
            next_fn,
            closed: false,
        })
    }

    /// The next value, or None when the iterator reports completion.
    pub fn next(&self, rt: &mut Runtime) -> Result<Option<JsValue>, JsError> {
        let this = rt.object_value(&self.iterator);
        let result = match call_function(rt, &self.next_fn, &this, &[]) {
            Ok(r) => r,
            Err(JsError::Thrown { value }) if is_stop_iteration(rt, &value) => return Ok(None),
            Err(e) => return Err(e),
        };
        let result_obj = to_object_or_null(rt, &result)
            .ok_or_else(|| JsError::type_error("Iterator result is not an object"))?;
        let done = get_property(rt, &result_obj, "done")?;
        if to_boolean(&done) {
            return Ok(None);
        }
        let value = get_property(rt, &result_obj, "value")?;
        Ok(Some(value))
    }

    /// Calls `return` on the iterator, at most once. Failures during close
    /// are logged, not propagated: the close runs on error paths where the
    /// primary error must win.
    pub fn close(&mut self, rt: &mut Runtime) {
        if self.closed {
            return;
        }
        self.closed = true;
        let ret = match get_property(rt, &self.iterator, "return") {
            Ok(v) => v,
            Err(e) => {
                log::debug!("iterator close skipped: {e}");
                return;
            }
        };
        if is_callable(rt, &ret) {
            let this = rt.object_value(&self.iterator);
            if let Err(e) = call_function(rt, &ret, &this, &[]) {
                log::debug!("iterator return() failed during close: {e}");
            }
        }
    }
}
