//! Insertion-ordered Set keyed by SameValueZero.
//!
//! Entries live in an order-preserving table; `-0` keys are canonicalized
//! to `+0` on the way in, and re-adding an existing key neither moves it
//! nor overwrites its position. Iterators over the table are live.

use crate::error::JsError;
use crate::runtime::builtins::iterators::{self, IteratorHandle};
use crate::runtime::{
    JsFunction, ObjRef, PropertyDescriptor, Runtime, call_function, call_iterator_property,
    get_property, is_callable, same_value_zero, to_object_or_null, to_string_value,
};
use crate::types::{JsValue, WellKnownSymbol, number_ops};
use indexmap::IndexMap;
use std::hash::{Hash, Hasher};

/// Entry key under SameValueZero, with `-0` canonicalized to `+0`.
#[derive(Debug, Clone)]
pub struct SetKey(JsValue);

impl SetKey {
    pub fn new(value: JsValue) -> Self {
        match value {
            JsValue::Number(n) if number_ops::is_negative_zero(n) => SetKey(JsValue::Number(0.0)),
            v => SetKey(v),
        }
    }

    pub fn value(&self) -> &JsValue {
        &self.0
    }
}

impl PartialEq for SetKey {
    fn eq(&self, other: &Self) -> bool {
        same_value_zero(&self.0, &other.0)
    }
}

impl Eq for SetKey {}

impl Hash for SetKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.0).hash(state);
        match &self.0 {
            JsValue::Undefined | JsValue::Null => {}
            JsValue::Boolean(b) => b.hash(state),
            JsValue::Number(n) => {
                // equal keys must hash equally: collapse the zero signs and
                // every NaN payload
                let bits = if n.is_nan() {
                    f64::NAN.to_bits()
                } else if *n == 0.0 {
                    0.0f64.to_bits()
                } else {
                    n.to_bits()
                };
                bits.hash(state);
            }
            JsValue::String(s) => s.code_units.hash(state),
            JsValue::Symbol(s) => s.id.hash(state),
            JsValue::BigInt(b) => b.value.hash(state),
            JsValue::Object(o) => o.id.hash(state),
        }
    }
}

/// Entry table of one Set instance. Its presence on an object is the
/// brand the method guards test.
#[derive(Default)]
pub struct SetData {
    entries: IndexMap<SetKey, JsValue>,
}

impl SetData {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_at(&self, index: usize) -> Option<JsValue> {
        self.entries.get_index(index).map(|(_, v)| v.clone())
    }

    pub fn insert(&mut self, value: JsValue) {
        let key = SetKey::new(value);
        let stored = key.value().clone();
        // re-adding keeps the original position
        self.entries.entry(key).or_insert(stored);
    }

    pub fn remove(&mut self, value: &JsValue) -> bool {
        self.entries.shift_remove(&SetKey::new(value.clone())).is_some()
    }

    pub fn contains(&self, value: &JsValue) -> bool {
        self.entries.contains_key(&SetKey::new(value.clone()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Clone, Copy)]
enum SetOp {
    Constructor,
    Add,
    Delete,
    Has,
    Clear,
    Values,
    Entries,
    ForEach,
    GetSize,
}

fn native_op(rt: &mut Runtime, scope_id: u64, name: &str, arity: usize, op: SetOp) -> JsValue {
    rt.create_function(JsFunction::native(
        name.to_string(),
        arity,
        move |rt, this, args| exec_op(rt, scope_id, op, this, args),
    ))
}

/// Installs the `Set` constructor and prototype into `scope`.
pub fn init(rt: &mut Runtime, scope: &ObjRef) -> Result<Option<JsValue>, JsError> {
    let scope_id = scope.borrow().id.unwrap_or(0);

    let proto = rt.create_object();
    proto.borrow_mut().class_name = "Set".to_string();
    rt.set_prototype = Some(proto.clone());
    let iter_proto = iterators::init_collection_iterator_proto(rt, "Set Iterator");
    rt.set_iterator_prototype = Some(iter_proto);

    let add = native_op(rt, scope_id, "add", 1, SetOp::Add);
    let delete = native_op(rt, scope_id, "delete", 1, SetOp::Delete);
    let has = native_op(rt, scope_id, "has", 1, SetOp::Has);
    let clear = native_op(rt, scope_id, "clear", 0, SetOp::Clear);
    let for_each = native_op(rt, scope_id, "forEach", 1, SetOp::ForEach);
    let values = native_op(rt, scope_id, "values", 0, SetOp::Values);
    let entries = native_op(rt, scope_id, "entries", 0, SetOp::Entries);
    let get_size = native_op(rt, scope_id, "get size", 0, SetOp::GetSize);
    {
        let mut b = proto.borrow_mut();
        b.insert_builtin("add".to_string(), add);
        b.insert_builtin("delete".to_string(), delete);
        b.insert_builtin("has".to_string(), has);
        b.insert_builtin("clear".to_string(), clear);
        b.insert_builtin("forEach".to_string(), for_each);
        // keys, values and @@iterator are the same function object
        b.insert_builtin("values".to_string(), values.clone());
        b.insert_builtin("keys".to_string(), values.clone());
        b.insert_builtin(
            WellKnownSymbol::Iterator.to_property_key().to_string(),
            values,
        );
        b.insert_builtin("entries".to_string(), entries);
        b.insert_property(
            "size".to_string(),
            PropertyDescriptor::getter(get_size, false, true),
        );
        b.insert_property(
            WellKnownSymbol::ToStringTag.to_property_key().to_string(),
            PropertyDescriptor::data(JsValue::from_str("Set"), false, false, true),
        );
    }

    let ctor = native_op(rt, scope_id, "Set", 0, SetOp::Constructor);
    let proto_val = rt.object_value(&proto);
    if let Some(ctor_obj) = to_object_or_null(rt, &ctor) {
        ctor_obj
            .borrow_mut()
            .insert_builtin("prototype".to_string(), proto_val);
    }
    proto
        .borrow_mut()
        .insert_builtin("constructor".to_string(), ctor.clone());
    scope
        .borrow_mut()
        .insert_builtin("Set".to_string(), ctor.clone());
    Ok(Some(ctor))
}

fn require_set(rt: &Runtime, this: &JsValue, method: &str) -> Result<ObjRef, JsError> {
    to_object_or_null(rt, this)
        .filter(|obj| obj.borrow().set_data.is_some())
        .ok_or_else(|| {
            JsError::type_error(format!(
                "Method Set.prototype.{method} called on incompatible receiver"
            ))
        })
}

fn exec_op(
    rt: &mut Runtime,
    scope_id: u64,
    op: SetOp,
    this: &JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    match op {
        SetOp::Constructor => {
            if rt.new_target.is_none() {
                return Err(JsError::type_error(
                    "Constructor Set requires 'new'",
                ));
            }
            let scope = rt
                .get_object(scope_id)
                .ok_or_else(|| JsError::internal("Set scope is gone"))?;
            let proto = rt
                .set_prototype
                .clone()
                .ok_or_else(|| JsError::internal("Set prototype is not initialized"))?;
            let obj = rt.create_object_with_proto(Some(proto));
            {
                let mut b = obj.borrow_mut();
                b.class_name = "Set".to_string();
                b.parent_scope = Some(scope);
                b.set_data = Some(SetData::default());
            }
            let instance = rt.object_value(&obj);
            load_from_iterable(rt, &instance, args.first())?;
            Ok(instance)
        }
        SetOp::Add => {
            let obj = require_set(rt, this, "add")?;
            let arg = args.first().cloned().unwrap_or(JsValue::Undefined);
            if let Some(data) = obj.borrow_mut().set_data.as_mut() {
                data.insert(arg);
            }
            Ok(this.clone())
        }
        SetOp::Delete => {
            let obj = require_set(rt, this, "delete")?;
            let arg = args.first().cloned().unwrap_or(JsValue::Undefined);
            let removed = obj
                .borrow_mut()
                .set_data
                .as_mut()
                .is_some_and(|data| data.remove(&arg));
            Ok(JsValue::Boolean(removed))
        }
        SetOp::Has => {
            let obj = require_set(rt, this, "has")?;
            let arg = args.first().cloned().unwrap_or(JsValue::Undefined);
            let present = obj
                .borrow()
                .set_data
                .as_ref()
                .is_some_and(|data| data.contains(&arg));
            Ok(JsValue::Boolean(present))
        }
        SetOp::Clear => {
            let obj = require_set(rt, this, "clear")?;
            if let Some(data) = obj.borrow_mut().set_data.as_mut() {
                data.clear();
            }
            Ok(JsValue::Undefined)
        }
        SetOp::GetSize => {
            let obj = require_set(rt, this, "size")?;
            let len = obj.borrow().set_data.as_ref().map_or(0, SetData::len);
            Ok(JsValue::Number(len as f64))
        }
        SetOp::Values | SetOp::Entries => {
            let method = if matches!(op, SetOp::Values) { "values" } else { "entries" };
            let obj = require_set(rt, this, method)?;
            let proto = rt
                .set_iterator_prototype
                .clone()
                .ok_or_else(|| JsError::internal("Set iterator prototype is not initialized"))?;
            Ok(iterators::new_collection_iterator(
                rt,
                &proto,
                &obj,
                matches!(op, SetOp::Entries),
            ))
        }
        SetOp::ForEach => {
            let obj = require_set(rt, this, "forEach")?;
            let cb = args.first().cloned().unwrap_or(JsValue::Undefined);
            if !is_callable(rt, &cb) {
                return Err(JsError::type_error(format!(
                    "{} is not a function",
                    to_string_value(rt, &cb)?
                )));
            }
            let this_arg = args.get(1).cloned().unwrap_or(JsValue::Undefined);
            // live traversal: entries appended mid-walk are visited
            let mut i = 0;
            loop {
                let entry = obj.borrow().set_data.as_ref().and_then(|d| d.entry_at(i));
                let Some(value) = entry else { break };
                i += 1;
                let receiver = match to_object_or_null(rt, &this_arg) {
                    Some(o) => rt.object_value(&o),
                    None if rt.features.strict_mode => JsValue::Undefined,
                    None => {
                        // non-strict primitive receivers fall back to the
                        // installation scope
                        match rt.get_object(scope_id) {
                            Some(scope) => rt.object_value(&scope),
                            None => JsValue::Undefined,
                        }
                    }
                };
                call_function(rt, &cb, &receiver, &[value.clone(), value, this.clone()])?;
            }
            Ok(JsValue::Undefined)
        }
    }
}

/// Seeds a fresh Set instance from an iterable source. `add` is resolved
/// through the instance's prototype so a replaced `Set.prototype.add` is
/// honored; the source iterator is closed on every exit path.
fn load_from_iterable(
    rt: &mut Runtime,
    instance: &JsValue,
    arg: Option<&JsValue>,
) -> Result<(), JsError> {
    let Some(source) = arg else { return Ok(()) };
    if source.is_nullish() {
        return Ok(());
    }

    let proto = to_object_or_null(rt, instance).and_then(|obj| obj.borrow().prototype.clone());
    let add_fn = match proto {
        Some(p) => get_property(rt, &p, "add")?,
        None => JsValue::Undefined,
    };
    if !is_callable(rt, &add_fn) {
        return Err(JsError::type_error("add is not a function"));
    }

    let iter = call_iterator_property(rt, source)?;
    if matches!(iter, JsValue::Undefined) {
        // non-iterable sources seed nothing
        return Ok(());
    }
    let mut handle = IteratorHandle::open(rt, &iter)?;
    loop {
        match handle.next(rt) {
            Ok(Some(value)) => {
                if let Err(e) = call_function(rt, &add_fn, instance, &[value]) {
                    handle.close(rt);
                    return Err(e);
                }
            }
            Ok(None) => break,
            Err(e) => {
                handle.close(rt);
                return Err(e);
            }
        }
    }
    handle.close(rt);
    Ok(())
}
