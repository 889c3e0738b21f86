//! Script-facing adapter over a shared, mutable host sequence.
//!
//! The adapter reflects the live host list: `length` and integer indices
//! read through to the underlying storage, writes coerce to the declared
//! element type, and the array-flavored methods mutate the host list in
//! place where the ECMAScript counterparts would.

use crate::error::JsError;
use crate::host::{ElemType, HostListRef, HostValue, ListCursor};
use crate::runtime::builtins::iterators::{self, IterCursor, IterState};
use crate::runtime::{
    HostData, HostListData, JsFunction, ObjRef, Runtime, ValueUnwrapper, call_function,
    is_callable, ordinary_has_instance, to_boolean, to_string_value, to_object_or_null,
};
use crate::types::{JsValue, WellKnownSymbol, number_ops};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Copy)]
enum ListOp {
    Push,
    Pop,
    Shift,
    Unshift,
    Concat,
    Join,
    Reverse,
    Every,
    Some,
    Filter,
    Map,
    Reduce,
    ReduceRight,
    Find,
    FindIndex,
    FindLast,
    FindLastIndex,
    Slice,
    Splice,
    FlatMap,
    CopyWithin,
    Includes,
    Fill,
}

const METHODS: &[(&str, usize, ListOp)] = &[
    ("push", 1, ListOp::Push),
    ("pop", 0, ListOp::Pop),
    ("shift", 0, ListOp::Shift),
    ("unshift", 1, ListOp::Unshift),
    ("concat", 1, ListOp::Concat),
    ("join", 1, ListOp::Join),
    ("reverse", 0, ListOp::Reverse),
    ("every", 1, ListOp::Every),
    ("some", 1, ListOp::Some),
    ("filter", 1, ListOp::Filter),
    ("map", 1, ListOp::Map),
    ("reduce", 1, ListOp::Reduce),
    ("reduceRight", 1, ListOp::ReduceRight),
    ("find", 1, ListOp::Find),
    ("findIndex", 1, ListOp::FindIndex),
    ("findLast", 1, ListOp::FindLast),
    ("findLastIndex", 1, ListOp::FindLastIndex),
    ("slice", 2, ListOp::Slice),
    ("splice", 2, ListOp::Splice),
    ("flatMap", 1, ListOp::FlatMap),
    ("copyWithin", 2, ListOp::CopyWithin),
    ("includes", 1, ListOp::Includes),
    ("fill", 1, ListOp::Fill),
];

/// Wraps `list` for script access with a declared element type and an
/// unwrap strategy for values read back out.
pub fn wrap_list(
    rt: &mut Runtime,
    scope: &ObjRef,
    list: HostListRef,
    elem_type: Option<ElemType>,
    unwrapper: ValueUnwrapper,
) -> JsValue {
    let obj = rt.create_object();
    {
        let mut b = obj.borrow_mut();
        b.class_name = "HostList".to_string();
        b.parent_scope = Some(Runtime::top_level_scope(scope));
        b.host_data = Some(HostData::List(HostListData {
            list,
            elem_type,
            unwrapper,
        }));
    }
    for &(name, arity, op) in METHODS {
        let f = rt.create_function(JsFunction::native(
            name.to_string(),
            arity,
            move |rt, this, args| exec_list_op(rt, op, name, this, args),
        ));
        obj.borrow_mut().insert_builtin(name.to_string(), f);
    }
    let iter_fn = rt.create_function(JsFunction::native(
        "[Symbol.iterator]".to_string(),
        0,
        |rt, this, _args| {
            let (_, data) = require_list(rt, this)?;
            let cursor: Rc<RefCell<dyn crate::host::HostCursor>> =
                Rc::new(RefCell::new(ListCursor::new(data.list.clone())));
            Ok(new_host_iterator(rt, cursor))
        },
    ));
    obj.borrow_mut().insert_builtin(
        WellKnownSymbol::Iterator.to_property_key().to_string(),
        iter_fn,
    );
    rt.object_value(&obj)
}

/// An untyped adapter with the default unwrap strategy.
pub fn wrap_plain(rt: &mut Runtime, scope: &ObjRef, list: HostListRef) -> JsValue {
    wrap_list(rt, scope, list, None, default_unwrapper)
}

fn new_host_iterator(rt: &mut Runtime, cursor: Rc<RefCell<dyn crate::host::HostCursor>>) -> JsValue {
    let proto = match &rt.host_iterator_prototype {
        Some(p) => p.clone(),
        None => {
            let p = iterators::init_collection_iterator_proto(rt, "List Iterator");
            rt.host_iterator_prototype = Some(p.clone());
            p
        }
    };
    let obj = rt.create_object_with_proto(Some(proto));
    obj.borrow_mut().iterator_state = Some(IterState {
        cursor: IterCursor::Host(cursor),
        exhausted: false,
    });
    rt.object_value(&obj)
}

fn require_list(rt: &Runtime, this: &JsValue) -> Result<(ObjRef, HostListData), JsError> {
    let obj = to_object_or_null(rt, this).ok_or_else(incompatible)?;
    let data = match &obj.borrow().host_data {
        Some(HostData::List(d)) => d.clone(),
        _ => return Err(incompatible()),
    };
    Ok((obj, data))
}

fn incompatible() -> JsError {
    JsError::type_error("List method called on incompatible receiver")
}

/// Canonical array-index strings only. "07" and "+1" are ordinary property
/// names, not aliases of elements 7 and 1.
fn parse_index(key: &str) -> Option<usize> {
    if key == "0" {
        return Some(0);
    }
    if key.is_empty() || key.starts_with('0') || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// Reflected reads answered ahead of the ordinary property lookup:
/// `length`, `Symbol.isConcatSpreadable` and in-range integer indices.
pub(crate) fn special_get(
    rt: &mut Runtime,
    obj: &ObjRef,
    key: &str,
) -> Result<Option<JsValue>, JsError> {
    let data = match &obj.borrow().host_data {
        Some(HostData::List(d)) => d.clone(),
        _ => return Ok(None),
    };
    if key == "length" {
        return Ok(Some(JsValue::Number(data.list.borrow().len() as f64)));
    }
    if key == WellKnownSymbol::IsConcatSpreadable.to_property_key() {
        return Ok(Some(JsValue::Boolean(true)));
    }
    if let Some(i) = parse_index(key) {
        let item = data.list.borrow().get(i).cloned();
        if let Some(hv) = item {
            return Ok(Some((data.unwrapper)(rt, &hv)));
        }
    }
    Ok(None)
}

pub(crate) fn special_has(_rt: &Runtime, obj: &ObjRef, key: &str) -> bool {
    let data = match &obj.borrow().host_data {
        Some(HostData::List(d)) => d.clone(),
        _ => return false,
    };
    if key == "length" || key == WellKnownSymbol::IsConcatSpreadable.to_property_key() {
        return true;
    }
    parse_index(key).is_some_and(|i| i < data.list.borrow().len())
}

/// Integer-indexed read; out-of-range reads are Undefined.
pub fn get_index(rt: &mut Runtime, obj: &ObjRef, index: usize) -> Result<JsValue, JsError> {
    let this = rt.object_value(obj);
    let (_, data) = require_list(rt, &this)?;
    let item = data.list.borrow().get(index).cloned();
    Ok(match item {
        Some(hv) => (data.unwrapper)(rt, &hv),
        None => JsValue::Undefined,
    })
}

/// Integer-indexed write. A write at exactly `length` appends; in-range
/// writes overwrite; anything past the end falls back to an ordinary named
/// property so the engine's generic path can store it.
pub fn put_index(
    rt: &mut Runtime,
    obj: &ObjRef,
    index: usize,
    value: &JsValue,
) -> Result<(), JsError> {
    let this = rt.object_value(obj);
    let (obj, data) = require_list(rt, &this)?;
    let len = data.list.borrow().len();
    if index <= len {
        let coerced = js_to_host(rt, value, data.elem_type)?;
        let mut list = data.list.borrow_mut();
        if index == len {
            list.push(coerced);
        } else {
            list.set(index, coerced);
        }
        return Ok(());
    }
    obj.borrow_mut()
        .insert_value(index.to_string(), value.clone());
    Ok(())
}

pub fn has_index(rt: &Runtime, obj: &ObjRef, index: usize) -> Result<bool, JsError> {
    let this = rt.object_value(obj);
    let (_, data) = require_list(rt, &this)?;
    Ok(index < data.list.borrow().len())
}

/// Integer-indexed delete; held host resources are released on removal.
pub fn delete_index(rt: &mut Runtime, obj: &ObjRef, index: usize) -> Result<bool, JsError> {
    let this = rt.object_value(obj);
    let (_, data) = require_list(rt, &this)?;
    let in_range = index < data.list.borrow().len();
    if in_range {
        data.list.borrow_mut().remove_released(index);
    }
    Ok(true)
}

/// `instanceof` probe: typed adapters test the declared element type,
/// untyped adapters defer to the ordinary prototype walk.
pub fn has_instance(rt: &mut Runtime, obj: &ObjRef, value: &JsValue) -> Result<bool, JsError> {
    let this = rt.object_value(obj);
    let (obj, data) = require_list(rt, &this)?;
    match data.elem_type {
        Some(t) => match js_to_host(rt, value, None) {
            Ok(hv) => Ok(t.is_instance(&hv)),
            Err(_) => Ok(false),
        },
        None => ordinary_has_instance(rt, &obj, value),
    }
}

/// Coerces a script value to host storage. With a declared element type the
/// conversion is strict; untyped storage takes the natural mapping.
pub fn js_to_host(
    rt: &mut Runtime,
    value: &JsValue,
    elem_type: Option<ElemType>,
) -> Result<HostValue, JsError> {
    match elem_type {
        Some(ElemType::Bool) => Ok(HostValue::Bool(to_boolean(value))),
        Some(ElemType::Int) => match value {
            JsValue::Number(n) if n.is_finite() => Ok(HostValue::Int(number_ops::to_int32(*n))),
            JsValue::Number(_) => Err(JsError::range_error(format!(
                "Cannot convert {} to an int element",
                to_string_value(rt, value)?
            ))),
            _ => Err(JsError::type_error(format!(
                "Cannot convert {} to an int element",
                to_string_value(rt, value)?
            ))),
        },
        Some(ElemType::Double) => match value {
            JsValue::Number(n) => Ok(HostValue::Double(*n)),
            _ => Err(JsError::type_error(format!(
                "Cannot convert {} to a double element",
                to_string_value(rt, value)?
            ))),
        },
        Some(ElemType::Str) => Ok(HostValue::Str(to_string_value(rt, value)?)),
        None => match value {
            JsValue::Undefined | JsValue::Null => Ok(HostValue::Null),
            JsValue::Boolean(b) => Ok(HostValue::Bool(*b)),
            JsValue::Number(n) => Ok(HostValue::Double(*n)),
            JsValue::String(s) => Ok(HostValue::Str(s.to_rust_string())),
            JsValue::BigInt(b) => Ok(HostValue::Str(b.value.to_string())),
            JsValue::Symbol(_) => Err(JsError::type_error(
                "Cannot convert a Symbol value to a host value",
            )),
            JsValue::Object(_) => {
                let unwrapped = to_object_or_null(rt, value).and_then(|obj| {
                    match &obj.borrow().host_data {
                        Some(HostData::Value(hv)) => Some(hv.clone()),
                        _ => None,
                    }
                });
                unwrapped.ok_or_else(|| {
                    JsError::type_error("Cannot convert an object to a host value")
                })
            }
        },
    }
}

/// Default unwrap strategy: scalar host values map to primitives, held
/// resources come back as opaque wrapper objects.
pub fn default_unwrapper(rt: &mut Runtime, value: &HostValue) -> JsValue {
    match value {
        HostValue::Null => JsValue::Null,
        HostValue::Bool(b) => JsValue::Boolean(*b),
        HostValue::Int(i) => JsValue::Number(*i as f64),
        HostValue::Double(d) => JsValue::Number(*d),
        HostValue::Str(s) => JsValue::from_str(s),
        HostValue::Resource(r) => {
            let obj = rt.create_object();
            {
                let mut b = obj.borrow_mut();
                b.class_name = r.resource_name().to_string();
                b.host_data = Some(HostData::Value(value.clone()));
            }
            rt.object_value(&obj)
        }
    }
}

fn require_callback(rt: &Runtime, args: &[JsValue]) -> Result<JsValue, JsError> {
    let cb = args.first().cloned().unwrap_or(JsValue::Undefined);
    if !is_callable(rt, &cb) {
        return Err(JsError::type_error("callback is not a function"));
    }
    Ok(cb)
}

fn exec_list_op(
    rt: &mut Runtime,
    op: ListOp,
    name: &str,
    this: &JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let (_, data) = require_list(rt, this)?;
    match op {
        ListOp::Push => {
            for arg in args {
                let coerced = js_to_host(rt, arg, data.elem_type)?;
                data.list.borrow_mut().push(coerced);
            }
            Ok(JsValue::Number(data.list.borrow().len() as f64))
        }
        ListOp::Pop => {
            let len = data.list.borrow().len();
            if len == 0 {
                return Ok(JsValue::Undefined);
            }
            let hv = data.list.borrow_mut().remove(len - 1);
            Ok((data.unwrapper)(rt, &hv))
        }
        ListOp::Shift => {
            if data.list.borrow().is_empty() {
                return Ok(JsValue::Undefined);
            }
            let hv = data.list.borrow_mut().remove(0);
            Ok((data.unwrapper)(rt, &hv))
        }
        ListOp::Unshift => {
            for (i, arg) in args.iter().enumerate() {
                let coerced = js_to_host(rt, arg, data.elem_type)?;
                data.list.borrow_mut().insert(i, coerced);
            }
            Ok(JsValue::Number(data.list.borrow().len() as f64))
        }
        ListOp::Concat => {
            let mut items = data.list.borrow().snapshot();
            // Non-sequence arguments are ignored; concat() alone is a copy.
            for arg in args {
                enum Spread {
                    Adapter(Vec<HostValue>),
                    Array(Vec<JsValue>),
                    Skip,
                }
                let spread = match to_object_or_null(rt, arg) {
                    Some(o) => {
                        let b = o.borrow();
                        if let Some(HostData::List(d)) = &b.host_data {
                            Spread::Adapter(d.list.borrow().snapshot())
                        } else if let Some(elems) = &b.array_elements {
                            Spread::Array(elems.clone())
                        } else {
                            Spread::Skip
                        }
                    }
                    None => Spread::Skip,
                };
                match spread {
                    Spread::Adapter(mut extra) => items.append(&mut extra),
                    Spread::Array(elems) => {
                        for e in &elems {
                            items.push(js_to_host(rt, e, None)?);
                        }
                    }
                    Spread::Skip => {}
                }
            }
            let scope = rt.global();
            Ok(wrap_plain(
                rt,
                &scope,
                crate::host::HostList::from_values(items).into_ref(),
            ))
        }
        ListOp::Join => {
            let separator = match args.first() {
                None | Some(JsValue::Undefined) => ",".to_string(),
                Some(v) => to_string_value(rt, v)?,
            };
            let items = data.list.borrow().snapshot();
            let mut parts = Vec::with_capacity(items.len());
            for hv in &items {
                let v = (data.unwrapper)(rt, hv);
                if v.is_nullish() {
                    parts.push(String::new());
                } else {
                    parts.push(to_string_value(rt, &v)?);
                }
            }
            Ok(JsValue::from_str(&parts.join(&separator)))
        }
        ListOp::Reverse => {
            if data.list.borrow().len() > 1 {
                data.list.borrow_mut().reverse();
            }
            Ok(this.clone())
        }
        ListOp::Every | ListOp::Some => {
            let cb = require_callback(rt, args)?;
            let want_all = matches!(op, ListOp::Every);
            let mut i = 0;
            loop {
                let item = data.list.borrow().get(i).cloned();
                let Some(hv) = item else { break };
                let elem = (data.unwrapper)(rt, &hv);
                let verdict = to_boolean(&call_function(rt, &cb, &JsValue::Undefined, &[elem])?);
                if verdict != want_all {
                    return Ok(JsValue::Boolean(!want_all));
                }
                i += 1;
            }
            Ok(JsValue::Boolean(want_all))
        }
        ListOp::Find | ListOp::FindIndex => {
            let cb = require_callback(rt, args)?;
            let mut i = 0;
            loop {
                let item = data.list.borrow().get(i).cloned();
                let Some(hv) = item else { break };
                let elem = (data.unwrapper)(rt, &hv);
                if to_boolean(&call_function(rt, &cb, &JsValue::Undefined, &[elem.clone()])?) {
                    return Ok(match op {
                        ListOp::Find => elem,
                        _ => JsValue::Number(i as f64),
                    });
                }
                i += 1;
            }
            Ok(match op {
                ListOp::Find => JsValue::Undefined,
                _ => JsValue::Number(-1.0),
            })
        }
        ListOp::FindLast | ListOp::FindLastIndex => {
            let cb = require_callback(rt, args)?;
            let mut i = data.list.borrow().len();
            while i > 0 {
                i -= 1;
                let item = data.list.borrow().get(i).cloned();
                let Some(hv) = item else { continue };
                let elem = (data.unwrapper)(rt, &hv);
                if to_boolean(&call_function(rt, &cb, &JsValue::Undefined, &[elem.clone()])?) {
                    return Ok(match op {
                        ListOp::FindLast => elem,
                        _ => JsValue::Number(i as f64),
                    });
                }
            }
            Ok(match op {
                ListOp::FindLast => JsValue::Undefined,
                _ => JsValue::Number(-1.0),
            })
        }
        ListOp::Filter => {
            let cb = require_callback(rt, args)?;
            if data.list.borrow().is_empty() {
                return Ok(this.clone());
            }
            let items = data.list.borrow().snapshot();
            let mut kept = Vec::new();
            for hv in items {
                let elem = (data.unwrapper)(rt, &hv);
                if to_boolean(&call_function(rt, &cb, &JsValue::Undefined, &[elem])?) {
                    kept.push(hv);
                }
            }
            let scope = rt.global();
            Ok(wrap_plain(
                rt,
                &scope,
                crate::host::HostList::from_values(kept).into_ref(),
            ))
        }
        ListOp::Map => {
            let cb = require_callback(rt, args)?;
            if data.list.borrow().is_empty() {
                return Ok(this.clone());
            }
            let items = data.list.borrow().snapshot();
            let mut mapped = Vec::with_capacity(items.len());
            for hv in &items {
                let elem = (data.unwrapper)(rt, hv);
                let result = call_function(rt, &cb, &JsValue::Undefined, &[elem])?;
                mapped.push(js_to_host(rt, &result, None)?);
            }
            let scope = rt.global();
            Ok(wrap_plain(
                rt,
                &scope,
                crate::host::HostList::from_values(mapped).into_ref(),
            ))
        }
        ListOp::Reduce | ListOp::ReduceRight => {
            let cb = require_callback(rt, args)?;
            let items = data.list.borrow().snapshot();
            let forward = matches!(op, ListOp::Reduce);
            let mut iter: Box<dyn Iterator<Item = &HostValue>> = if forward {
                Box::new(items.iter())
            } else {
                Box::new(items.iter().rev())
            };
            let Some(first) = iter.next() else {
                return Ok(JsValue::Undefined);
            };
            let mut acc = (data.unwrapper)(rt, first);
            for hv in iter {
                let elem = (data.unwrapper)(rt, hv);
                acc = call_function(rt, &cb, &JsValue::Undefined, &[acc, elem])?;
            }
            Ok(acc)
        }
        ListOp::Slice
        | ListOp::Splice
        | ListOp::FlatMap
        | ListOp::CopyWithin
        | ListOp::Includes
        | ListOp::Fill => Err(JsError::internal(format!(
            "List.prototype.{name} is not implemented"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostList, HostResource};
    use crate::runtime::{get_property, strict_equality};
    use std::cell::Cell;

    fn int_list(rt: &mut Runtime, values: &[i32]) -> (JsValue, HostListRef) {
        let list = HostList::from_values(values.iter().map(|&i| HostValue::Int(i)).collect())
            .into_ref();
        let scope = rt.global();
        let wrapped = wrap_list(rt, &scope, list.clone(), Some(ElemType::Int), default_unwrapper);
        (wrapped, list)
    }

    fn call_method(rt: &mut Runtime, target: &JsValue, name: &str, args: &[JsValue]) -> Result<JsValue, JsError> {
        let obj = to_object_or_null(rt, target).unwrap();
        let f = get_property(rt, &obj, name)?;
        call_function(rt, &f, target, args)
    }

    #[test]
    fn length_and_indices_reflect_the_live_host_list() {
        let mut rt = Runtime::new().unwrap();
        let (wrapped, list) = int_list(&mut rt, &[5, 6]);
        let obj = to_object_or_null(&rt, &wrapped).unwrap();
        let len = get_property(&mut rt, &obj, "length").unwrap();
        assert!(matches!(len, JsValue::Number(n) if n == 2.0));

        // host-side mutation shows through immediately
        list.borrow_mut().push(HostValue::Int(7));
        let len = get_property(&mut rt, &obj, "length").unwrap();
        assert!(matches!(len, JsValue::Number(n) if n == 3.0));
        let v = get_index(&mut rt, &obj, 2).unwrap();
        assert!(matches!(v, JsValue::Number(n) if n == 7.0));
    }

    #[test]
    fn push_coerces_to_declared_element_type() {
        let mut rt = Runtime::new().unwrap();
        let (wrapped, list) = int_list(&mut rt, &[]);
        call_method(&mut rt, &wrapped, "push", &[JsValue::Number(3.7)]).unwrap();
        assert!(matches!(list.borrow().get(0), Some(HostValue::Int(3))));
    }

    #[test]
    fn put_at_length_appends_and_infinity_is_a_range_error() {
        let mut rt = Runtime::new().unwrap();
        let (wrapped, list) = int_list(&mut rt, &[1]);
        let obj = to_object_or_null(&rt, &wrapped).unwrap();
        put_index(&mut rt, &obj, 1, &JsValue::Number(2.0)).unwrap();
        assert_eq!(list.borrow().len(), 2);
        let err = put_index(&mut rt, &obj, 0, &JsValue::Number(f64::INFINITY)).unwrap_err();
        assert!(matches!(err, JsError::Range { .. }));
    }

    #[test]
    fn push_then_pop_leaves_contents_and_size_unchanged() {
        let mut rt = Runtime::new().unwrap();
        let (wrapped, list) = int_list(&mut rt, &[1, 2]);
        call_method(&mut rt, &wrapped, "push", &[JsValue::Number(9.0)]).unwrap();
        let v = call_method(&mut rt, &wrapped, "pop", &[]).unwrap();
        assert!(matches!(v, JsValue::Number(n) if n == 9.0));
        assert_eq!(list.borrow().len(), 2);
        assert!(matches!(list.borrow().get(1), Some(HostValue::Int(2))));
    }

    #[test]
    fn pop_on_empty_is_undefined() {
        let mut rt = Runtime::new().unwrap();
        let (wrapped, _) = int_list(&mut rt, &[]);
        let v = call_method(&mut rt, &wrapped, "pop", &[]).unwrap();
        assert!(matches!(v, JsValue::Undefined));
    }

    #[test]
    fn join_empty_single_and_custom_separator() {
        let mut rt = Runtime::new().unwrap();
        let (empty, _) = int_list(&mut rt, &[]);
        let v = call_method(&mut rt, &empty, "join", &[]).unwrap();
        assert!(matches!(v, JsValue::String(s) if s.to_rust_string().is_empty()));

        let (single, _) = int_list(&mut rt, &[4]);
        let v = call_method(&mut rt, &single, "join", &[]).unwrap();
        assert!(matches!(v, JsValue::String(s) if s.to_rust_string() == "4"));

        let (multi, _) = int_list(&mut rt, &[1, 2, 3]);
        let v = call_method(&mut rt, &multi, "join", &[JsValue::from_str("-")]).unwrap();
        assert!(matches!(v, JsValue::String(s) if s.to_rust_string() == "1-2-3"));
    }

    #[test]
    fn every_and_some_short_circuit_on_empty() {
        let mut rt = Runtime::new().unwrap();
        let calls = Rc::new(Cell::new(0));
        let count = calls.clone();
        let cb = rt.create_function(JsFunction::native("probe".to_string(), 1, move |_, _, _| {
            count.set(count.get() + 1);
            Ok(JsValue::Boolean(true))
        }));
        let (wrapped, _) = int_list(&mut rt, &[]);
        let v = call_method(&mut rt, &wrapped, "every", &[cb.clone()]).unwrap();
        assert!(matches!(v, JsValue::Boolean(true)));
        let v = call_method(&mut rt, &wrapped, "some", &[cb]).unwrap();
        assert!(matches!(v, JsValue::Boolean(false)));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn map_and_filter_on_empty_return_the_receiver() {
        let mut rt = Runtime::new().unwrap();
        let cb = rt.create_function(JsFunction::native("id".to_string(), 1, |_, _, args| {
            Ok(args.first().cloned().unwrap_or(JsValue::Undefined))
        }));
        let (wrapped, _) = int_list(&mut rt, &[]);
        let mapped = call_method(&mut rt, &wrapped, "map", &[cb.clone()]).unwrap();
        assert!(strict_equality(&mapped, &wrapped));
        let filtered = call_method(&mut rt, &wrapped, "filter", &[cb]).unwrap();
        assert!(strict_equality(&filtered, &wrapped));
    }

    #[test]
    fn reverse_mutates_in_place_and_returns_the_receiver() {
        let mut rt = Runtime::new().unwrap();
        let (wrapped, list) = int_list(&mut rt, &[1, 2, 3]);
        let v = call_method(&mut rt, &wrapped, "reverse", &[]).unwrap();
        assert!(strict_equality(&v, &wrapped));
        assert!(matches!(list.borrow().get(0), Some(HostValue::Int(3))));
    }

    #[test]
    fn reduce_folds_left_and_empty_is_undefined() {
        let mut rt = Runtime::new().unwrap();
        let cb = rt.create_function(JsFunction::native("sub".to_string(), 2, |_, _, args| {
            let (JsValue::Number(a), JsValue::Number(b)) = (&args[0], &args[1]) else {
                return Ok(JsValue::Undefined);
            };
            Ok(JsValue::Number(a - b))
        }));
        let (wrapped, _) = int_list(&mut rt, &[10, 3, 2]);
        let v = call_method(&mut rt, &wrapped, "reduce", &[cb.clone()]).unwrap();
        assert!(matches!(v, JsValue::Number(n) if n == 5.0));

        let (empty, _) = int_list(&mut rt, &[]);
        let v = call_method(&mut rt, &empty, "reduce", &[cb]).unwrap();
        assert!(matches!(v, JsValue::Undefined));
    }

    #[test]
    fn reduce_right_folds_from_the_last_element() {
        let mut rt = Runtime::new().unwrap();
        let cb = rt.create_function(JsFunction::native("sub".to_string(), 2, |_, _, args| {
            let (JsValue::Number(a), JsValue::Number(b)) = (&args[0], &args[1]) else {
                return Ok(JsValue::Undefined);
            };
            Ok(JsValue::Number(a - b))
        }));
        let (wrapped, _) = int_list(&mut rt, &[10, 3, 2]);
        let v = call_method(&mut rt, &wrapped, "reduceRight", &[cb]).unwrap();
        assert!(matches!(v, JsValue::Number(n) if n == -11.0));
    }

    #[test]
    fn shift_removes_the_first_element_and_empty_is_undefined() {
        let mut rt = Runtime::new().unwrap();
        let (wrapped, list) = int_list(&mut rt, &[4, 5]);
        let v = call_method(&mut rt, &wrapped, "shift", &[]).unwrap();
        assert!(matches!(v, JsValue::Number(n) if n == 4.0));
        assert!(matches!(list.borrow().get(0), Some(HostValue::Int(5))));

        let (empty, _) = int_list(&mut rt, &[]);
        let v = call_method(&mut rt, &empty, "shift", &[]).unwrap();
        assert!(matches!(v, JsValue::Undefined));
    }

    #[test]
    fn unshift_prepends_arguments_in_argument_order() {
        let mut rt = Runtime::new().unwrap();
        let (wrapped, list) = int_list(&mut rt, &[3]);
        let v = call_method(
            &mut rt,
            &wrapped,
            "unshift",
            &[JsValue::Number(1.0), JsValue::Number(2.0)],
        )
        .unwrap();
        assert!(matches!(v, JsValue::Number(n) if n == 3.0));
        let items = list.borrow().snapshot();
        assert!(matches!(items[..], [
            HostValue::Int(1),
            HostValue::Int(2),
            HostValue::Int(3)
        ]));
    }

    #[test]
    fn concat_spreads_sequence_likes_and_ignores_other_arguments() {
        let mut rt = Runtime::new().unwrap();
        let (a, _) = int_list(&mut rt, &[1, 2]);
        let (b, _) = int_list(&mut rt, &[3]);
        let arr = rt.create_array(vec![JsValue::Number(4.0)]);

        let v = call_method(&mut rt, &a, "concat", &[b, JsValue::Number(9.0), arr]).unwrap();
        let out = to_object_or_null(&rt, &v).unwrap();
        let len = get_property(&mut rt, &out, "length").unwrap();
        assert!(matches!(len, JsValue::Number(n) if n == 4.0));
        let third = get_index(&mut rt, &out, 2).unwrap();
        assert!(matches!(third, JsValue::Number(n) if n == 3.0));
        let fourth = get_index(&mut rt, &out, 3).unwrap();
        assert!(matches!(fourth, JsValue::Number(n) if n == 4.0));

        // a lone non-sequence argument leaves a plain copy
        let copy = call_method(&mut rt, &a, "concat", &[JsValue::Number(9.0)]).unwrap();
        assert!(!strict_equality(&copy, &a));
        let out = to_object_or_null(&rt, &copy).unwrap();
        let len = get_property(&mut rt, &out, "length").unwrap();
        assert!(matches!(len, JsValue::Number(n) if n == 2.0));
    }

    #[test]
    fn find_family_scans_from_the_matching_end() {
        let mut rt = Runtime::new().unwrap();
        let cb = rt.create_function(JsFunction::native("isTwo".to_string(), 1, |_, _, args| {
            Ok(JsValue::Boolean(matches!(
                args.first(),
                Some(JsValue::Number(n)) if *n == 2.0
            )))
        }));
        let (wrapped, _) = int_list(&mut rt, &[1, 2, 3, 2]);
        let v = call_method(&mut rt, &wrapped, "find", &[cb.clone()]).unwrap();
        assert!(matches!(v, JsValue::Number(n) if n == 2.0));
        let v = call_method(&mut rt, &wrapped, "findIndex", &[cb.clone()]).unwrap();
        assert!(matches!(v, JsValue::Number(n) if n == 1.0));
        let v = call_method(&mut rt, &wrapped, "findLast", &[cb.clone()]).unwrap();
        assert!(matches!(v, JsValue::Number(n) if n == 2.0));
        let v = call_method(&mut rt, &wrapped, "findLastIndex", &[cb.clone()]).unwrap();
        assert!(matches!(v, JsValue::Number(n) if n == 3.0));

        let (misses, _) = int_list(&mut rt, &[7]);
        let v = call_method(&mut rt, &misses, "find", &[cb.clone()]).unwrap();
        assert!(matches!(v, JsValue::Undefined));
        let v = call_method(&mut rt, &misses, "findLastIndex", &[cb]).unwrap();
        assert!(matches!(v, JsValue::Number(n) if n == -1.0));
    }

    #[test]
    fn non_canonical_index_strings_are_ordinary_property_names() {
        let mut rt = Runtime::new().unwrap();
        let (wrapped, _) = int_list(&mut rt, &[5, 6]);
        let obj = to_object_or_null(&rt, &wrapped).unwrap();
        let v = special_get(&mut rt, &obj, "1").unwrap();
        assert!(matches!(v, Some(JsValue::Number(n)) if n == 6.0));
        assert!(special_get(&mut rt, &obj, "01").unwrap().is_none());
        assert!(special_get(&mut rt, &obj, "+1").unwrap().is_none());
        assert!(special_has(&rt, &obj, "1"));
        assert!(!special_has(&rt, &obj, "01"));
        assert!(!special_has(&rt, &obj, "+1"));
    }

    #[test]
    fn unimplemented_methods_raise_internal_errors() {
        let mut rt = Runtime::new().unwrap();
        let (wrapped, _) = int_list(&mut rt, &[1]);
        let err = call_method(&mut rt, &wrapped, "slice", &[]).unwrap_err();
        assert!(matches!(err, JsError::Internal { .. }));
        assert!(!err.is_catchable());
    }

    struct Probe {
        released: Rc<Cell<bool>>,
    }

    impl HostResource for Probe {
        fn release(&self) {
            self.released.set(true);
        }
    }

    #[test]
    fn delete_releases_held_resources() {
        let mut rt = Runtime::new().unwrap();
        let released = Rc::new(Cell::new(false));
        let list = HostList::from_values(vec![HostValue::Resource(Rc::new(Probe {
            released: released.clone(),
        }))])
        .into_ref();
        let scope = rt.global();
        let wrapped = wrap_plain(&mut rt, &scope, list.clone());
        let obj = to_object_or_null(&rt, &wrapped).unwrap();
        assert!(delete_index(&mut rt, &obj, 0).unwrap());
        assert!(released.get());
        assert!(list.borrow().is_empty());
    }

    #[test]
    fn adapter_iterates_in_storage_order() {
        let mut rt = Runtime::new().unwrap();
        let (wrapped, _) = int_list(&mut rt, &[1, 2, 3]);
        let iter = crate::runtime::call_iterator_property(&mut rt, &wrapped).unwrap();
        let handle = iterators::IteratorHandle::open(&mut rt, &iter).unwrap();
        let mut seen = Vec::new();
        while let Some(v) = handle.next(&mut rt).unwrap() {
            let JsValue::Number(n) = v else { panic!("expected a number") };
            seen.push(n as i32);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn typed_instance_probe_checks_the_element_type() {
        let mut rt = Runtime::new().unwrap();
        let (wrapped, _) = int_list(&mut rt, &[]);
        let obj = to_object_or_null(&rt, &wrapped).unwrap();
        // untyped numeric values arrive as doubles, not ints
        assert!(!has_instance(&mut rt, &obj, &JsValue::Number(3.0)).unwrap());
        assert!(!has_instance(&mut rt, &obj, &JsValue::from_str("x")).unwrap());
    }
}
