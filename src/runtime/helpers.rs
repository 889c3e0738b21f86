use crate::error::JsError;
use crate::runtime::builtins::host_list;
use crate::runtime::{JsFunction, ObjRef, Runtime};
use crate::types::{JsValue, WellKnownSymbol, number_ops};

pub fn to_boolean(value: &JsValue) -> bool {
    match value {
        JsValue::Undefined | JsValue::Null => false,
        JsValue::Boolean(b) => *b,
        JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
        JsValue::String(s) => !s.is_empty(),
        JsValue::Symbol(_) => true,
        JsValue::BigInt(b) => b.value != num_bigint::BigInt::from(0u8),
        JsValue::Object(_) => true,
    }
}

pub fn to_string_value(rt: &Runtime, value: &JsValue) -> Result<String, JsError> {
    match value {
        JsValue::Undefined => Ok("undefined".to_string()),
        JsValue::Null => Ok("null".to_string()),
        JsValue::Boolean(b) => Ok(b.to_string()),
        JsValue::Number(n) => Ok(number_ops::to_string(*n)),
        JsValue::String(s) => Ok(s.to_rust_string()),
        JsValue::Symbol(_) => Err(JsError::type_error(
            "Cannot convert a Symbol value to a string",
        )),
        JsValue::BigInt(b) => Ok(b.value.to_string()),
        JsValue::Object(o) => {
            let class = rt
                .get_object(o.id)
                .map(|obj| obj.borrow().class_name.clone())
                .unwrap_or_else(|| "Object".to_string());
            Ok(format!("[object {class}]"))
        }
    }
}

/// Converts to an object reference, or None for anything that is not an
/// object. Primitives are not wrapped by this layer.
pub fn to_object_or_null(rt: &Runtime, value: &JsValue) -> Option<ObjRef> {
    match value {
        JsValue::Object(o) => rt.get_object(o.id),
        _ => None,
    }
}

pub fn is_callable(rt: &Runtime, value: &JsValue) -> bool {
    to_object_or_null(rt, value).is_some_and(|obj| obj.borrow().callable.is_some())
}

pub fn call_function(
    rt: &mut Runtime,
    func: &JsValue,
    this: &JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let Some(obj) = to_object_or_null(rt, func) else {
        return Err(JsError::type_error(format!(
            "{} is not a function",
            to_string_value(rt, func)?
        )));
    };
    let callable = obj.borrow().callable.clone();
    match callable {
        Some(JsFunction::Native(_, _, f)) => f(rt, this, args),
        None => Err(JsError::type_error(format!(
            "{} is not a function",
            to_string_value(rt, func)?
        ))),
    }
}

// §7.2.11 SameValueZero, extended over all value kinds
pub fn same_value_zero(a: &JsValue, b: &JsValue) -> bool {
    match (a, b) {
        (JsValue::Number(x), JsValue::Number(y)) => number_ops::same_value_zero(*x, *y),
        _ => strict_equality(a, b),
    }
}

pub fn strict_equality(a: &JsValue, b: &JsValue) -> bool {
    match (a, b) {
        (JsValue::Undefined, JsValue::Undefined) => true,
        (JsValue::Null, JsValue::Null) => true,
        (JsValue::Boolean(x), JsValue::Boolean(y)) => x == y,
        (JsValue::Number(x), JsValue::Number(y)) => number_ops::equal(*x, *y),
        (JsValue::String(x), JsValue::String(y)) => x == y,
        (JsValue::Symbol(x), JsValue::Symbol(y)) => x.id == y.id,
        (JsValue::BigInt(x), JsValue::BigInt(y)) => x.value == y.value,
        (JsValue::Object(x), JsValue::Object(y)) => x.id == y.id,
        _ => false,
    }
}

/// Reads `key` from `obj`, walking the prototype chain and invoking getters
/// with the original receiver.
pub fn get_property(rt: &mut Runtime, obj: &ObjRef, key: &str) -> Result<JsValue, JsError> {
    // Host list adapters answer their reflected keys before the ordinary
    // property lookup.
    if let Some(v) = host_list::special_get(rt, obj, key)? {
        return Ok(v);
    }

    {
        let b = obj.borrow();
        if let Some(elems) = &b.array_elements {
            if key == "length" {
                return Ok(JsValue::Number(elems.len() as f64));
            }
            if let Ok(i) = key.parse::<usize>()
                && i < elems.len()
            {
                return Ok(elems[i].clone());
            }
        }
    }

    let receiver = rt.object_value(obj);
    let mut current = Some(obj.clone());
    while let Some(c) = current {
        let (desc, next) = {
            let b = c.borrow();
            (b.get_own_property(key).cloned(), b.prototype.clone())
        };
        if let Some(desc) = desc {
            if desc.is_accessor_descriptor() {
                return match desc.get {
                    Some(ref getter) if !matches!(getter, JsValue::Undefined) => {
                        call_function(rt, getter, &receiver, &[])
                    }
                    _ => Ok(JsValue::Undefined),
                };
            }
            return Ok(desc.value.unwrap_or(JsValue::Undefined));
        }
        current = next;
    }
    Ok(JsValue::Undefined)
}

/// Writes `key` on `obj`. Setters on the prototype chain are honored;
/// non-writable data properties make the write a silent no-op.
pub fn set_property(
    rt: &mut Runtime,
    obj: &ObjRef,
    key: &str,
    value: JsValue,
) -> Result<(), JsError> {
    let receiver = rt.object_value(obj);
    let mut current = Some(obj.clone());
    let mut own = true;
    while let Some(c) = current {
        let (desc, next) = {
            let b = c.borrow();
            (b.get_own_property(key).cloned(), b.prototype.clone())
        };
        if let Some(desc) = desc {
            if desc.is_accessor_descriptor() {
                return match desc.set {
                    Some(ref setter) if !matches!(setter, JsValue::Undefined) => {
                        call_function(rt, setter, &receiver, &[value]).map(|_| ())
                    }
                    _ => Ok(()),
                };
            }
            if own {
                if desc.writable == Some(false) {
                    return Ok(());
                }
                let mut updated = desc;
                updated.value = Some(value);
                obj.borrow_mut().insert_property(key.to_string(), updated);
                return Ok(());
            }
            // data property on the prototype chain shadows into an own one
            break;
        }
        current = next;
        own = false;
    }
    obj.borrow_mut().insert_value(key.to_string(), value);
    Ok(())
}

pub fn has_property(rt: &Runtime, obj: &ObjRef, key: &str) -> bool {
    if host_list::special_has(rt, obj, key) {
        return true;
    }
    let mut current = Some(obj.clone());
    while let Some(c) = current {
        if c.borrow().has_own_property(key) {
            return true;
        }
        current = c.borrow().prototype.clone();
    }
    false
}

pub fn delete_property(obj: &ObjRef, key: &str) -> bool {
    let configurable = obj
        .borrow()
        .get_own_property(key)
        .map(|d| d.configurable != Some(false));
    match configurable {
        Some(true) => obj.borrow_mut().remove_property(key),
        Some(false) => false,
        None => true,
    }
}

// §7.3.21 OrdinaryHasInstance — walks the prototype chain of `value`
// against the "prototype" property of `ctor`.
pub fn ordinary_has_instance(
    rt: &mut Runtime,
    ctor: &ObjRef,
    value: &JsValue,
) -> Result<bool, JsError> {
    let proto_val = get_property(rt, ctor, "prototype")?;
    let Some(proto) = to_object_or_null(rt, &proto_val) else {
        return Ok(false);
    };
    let Some(target) = to_object_or_null(rt, value) else {
        return Ok(false);
    };
    let mut current = target.borrow().prototype.clone();
    while let Some(c) = current {
        if std::rc::Rc::ptr_eq(&c, &proto) {
            return Ok(true);
        }
        current = c.borrow().prototype.clone();
    }
    Ok(false)
}

/// §7.4.2 GetIterator head: looks up @@iterator on `value` and calls it.
/// Returns Undefined when the protocol is absent so callers can treat the
/// source as non-iterable without raising.
pub fn call_iterator_property(rt: &mut Runtime, value: &JsValue) -> Result<JsValue, JsError> {
    let Some(obj) = to_object_or_null(rt, value) else {
        return Err(JsError::type_error(format!(
            "{} is not iterable",
            to_string_value(rt, value)?
        )));
    };
    let method = get_property(rt, &obj, WellKnownSymbol::Iterator.to_property_key())?;
    if matches!(method, JsValue::Undefined | JsValue::Null) {
        return Ok(JsValue::Undefined);
    }
    if !is_callable(rt, &method) {
        return Err(JsError::type_error(format!(
            "{} is not a function",
            to_string_value(rt, &method)?
        )));
    }
    call_function(rt, &method, value, &[])
}
