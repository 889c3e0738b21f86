//! Assignable `__proto__` / `__parent__` pseudo-properties.
//!
//! A SpecialRef is resolved once against a target object and then carries
//! get/set/has/delete through to the prototype or parent-scope link. When
//! the runtime feature is off, the names degrade to ordinary properties.

use crate::error::JsError;
use crate::runtime::{
    ObjRef, Runtime, delete_property, get_property, has_property, set_property, to_object_or_null,
};
use crate::types::JsValue;
use std::rc::Rc;

pub const PROTO_PROPERTY: &str = "__proto__";
pub const PARENT_PROPERTY: &str = "__parent__";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecialRefKind {
    /// Ordinary property access under the special name.
    Plain,
    Prototype,
    ParentScope,
}

pub struct SpecialRef {
    target: ObjRef,
    kind: SpecialRefKind,
    name: String,
}

impl SpecialRef {
    /// Resolves a special reference against `object`. Nullish and other
    /// non-object targets cannot hold the reference.
    pub fn create(rt: &Runtime, object: &JsValue, name: &str) -> Result<SpecialRef, JsError> {
        let Some(target) = to_object_or_null(rt, object) else {
            return Err(JsError::type_error(format!(
                "Cannot read property \"{name}\" of {object}"
            )));
        };
        let kind = match name {
            PROTO_PROPERTY => SpecialRefKind::Prototype,
            PARENT_PROPERTY => SpecialRefKind::ParentScope,
            _ => {
                return Err(JsError::internal(format!(
                    "unknown special property '{name}'"
                )));
            }
        };
        let kind = if rt.features.parent_proto_properties {
            kind
        } else {
            SpecialRefKind::Plain
        };
        Ok(SpecialRef {
            target,
            kind,
            name: name.to_string(),
        })
    }

    pub fn kind(&self) -> SpecialRefKind {
        self.kind
    }

    pub fn get(&self, rt: &mut Runtime) -> Result<JsValue, JsError> {
        match self.kind {
            SpecialRefKind::Plain => get_property(rt, &self.target, &self.name),
            SpecialRefKind::Prototype => {
                let proto = self.target.borrow().prototype.clone();
                Ok(link_value(rt, proto.as_ref()))
            }
            SpecialRefKind::ParentScope => {
                let parent = self.target.borrow().parent_scope.clone();
                Ok(link_value(rt, parent.as_ref()))
            }
        }
    }

    /// Assigns through the reference. Prototype writes reject cycles and
    /// non-extensible targets, silently ignore values of any other type
    /// than object or null, and otherwise rewire the link.
    pub fn set(&self, rt: &mut Runtime, value: &JsValue) -> Result<JsValue, JsError> {
        if self.kind == SpecialRefKind::Plain {
            set_property(rt, &self.target, &self.name, value.clone())?;
            return Ok(value.clone());
        }

        let obj = to_object_or_null(rt, value);
        // Walk the candidate's own chain; hitting the target means the
        // assignment would close a cycle.
        let mut search = obj.clone();
        while let Some(s) = search {
            if Rc::ptr_eq(&s, &self.target) {
                return Err(JsError::type_error(format!(
                    "Cyclic {} value not allowed.",
                    self.name
                )));
            }
            search = match self.kind {
                SpecialRefKind::Prototype => s.borrow().prototype.clone(),
                _ => s.borrow().parent_scope.clone(),
            };
        }

        match self.kind {
            SpecialRefKind::Prototype => {
                if !self.target.borrow().extensible {
                    return Err(JsError::type_error(format!(
                        "Cannot set {} of a non-extensible object",
                        self.name
                    )));
                }
                // only object-typed values (including null) rewire the link
                if !matches!(value, JsValue::Object(_) | JsValue::Null) {
                    return Ok(JsValue::Undefined);
                }
                self.target.borrow_mut().prototype = obj.clone();
            }
            _ => {
                self.target.borrow_mut().parent_scope = obj.clone();
            }
        }
        Ok(link_value(rt, obj.as_ref()))
    }

    pub fn has(&self, rt: &Runtime) -> bool {
        match self.kind {
            SpecialRefKind::Plain => has_property(rt, &self.target, &self.name),
            _ => true,
        }
    }

    /// The special links cannot be deleted.
    pub fn delete(&self) -> bool {
        match self.kind {
            SpecialRefKind::Plain => delete_property(&self.target, &self.name),
            _ => false,
        }
    }
}

fn link_value(rt: &Runtime, link: Option<&ObjRef>) -> JsValue {
    match link {
        Some(obj) => rt.object_value(obj),
        None => JsValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeFeatures;

    fn proto_ref(rt: &Runtime, value: &JsValue) -> SpecialRef {
        SpecialRef::create(rt, value, PROTO_PROPERTY).unwrap()
    }

    #[test]
    fn proto_get_reads_the_prototype_link() {
        let mut rt = Runtime::new().unwrap();
        let obj = rt.create_object();
        let val = rt.object_value(&obj);
        let r = proto_ref(&rt, &val);
        let proto = r.get(&mut rt).unwrap();
        let expected = {
            let p = rt.object_prototype();
            rt.object_value(&p)
        };
        assert!(crate::runtime::strict_equality(&proto, &expected));
    }

    #[test]
    fn proto_set_rewires_and_null_detaches() {
        let mut rt = Runtime::new().unwrap();
        let obj = rt.create_object();
        let new_proto = rt.create_object();
        let val = rt.object_value(&obj);
        let proto_val = rt.object_value(&new_proto);
        let r = proto_ref(&rt, &val);
        r.set(&mut rt, &proto_val).unwrap();
        assert!(Rc::ptr_eq(
            obj.borrow().prototype.as_ref().unwrap(),
            &new_proto
        ));
        r.set(&mut rt, &JsValue::Null).unwrap();
        assert!(obj.borrow().prototype.is_none());
    }

    #[test]
    fn cyclic_proto_assignment_is_rejected_and_leaves_the_link_alone() {
        let mut rt = Runtime::new().unwrap();
        let a = rt.create_object();
        let b = rt.create_object_with_proto(Some(a.clone()));
        let a_val = rt.object_value(&a);
        let b_val = rt.object_value(&b);

        // a.__proto__ = b would close the cycle a -> b -> a
        let r = proto_ref(&rt, &a_val);
        let err = r.set(&mut rt, &b_val).unwrap_err();
        assert!(matches!(err, JsError::Type { .. }));
        // the original link is untouched
        assert!(Rc::ptr_eq(
            a.borrow().prototype.as_ref().unwrap(),
            &rt.object_prototype()
        ));
    }

    #[test]
    fn self_assignment_is_a_cycle() {
        let mut rt = Runtime::new().unwrap();
        let a = rt.create_object();
        let a_val = rt.object_value(&a);
        let r = proto_ref(&rt, &a_val);
        assert!(r.set(&mut rt, &a_val).is_err());
    }

    #[test]
    fn non_extensible_targets_reject_proto_writes() {
        let mut rt = Runtime::new().unwrap();
        let obj = rt.create_object();
        obj.borrow_mut().extensible = false;
        let val = rt.object_value(&obj);
        let r = proto_ref(&rt, &val);
        let err = r.set(&mut rt, &JsValue::Null).unwrap_err();
        assert!(matches!(err, JsError::Type { .. }));
    }

    #[test]
    fn primitive_proto_values_are_silently_ignored() {
        let mut rt = Runtime::new().unwrap();
        let obj = rt.create_object();
        let val = rt.object_value(&obj);
        let r = proto_ref(&rt, &val);
        let out = r.set(&mut rt, &JsValue::Number(5.0)).unwrap();
        assert!(matches!(out, JsValue::Undefined));
        assert!(obj.borrow().prototype.is_some());
    }

    #[test]
    fn parent_set_and_clear() {
        let mut rt = Runtime::new().unwrap();
        let obj = rt.create_object();
        let val = rt.object_value(&obj);
        let global_val = {
            let g = rt.global();
            rt.object_value(&g)
        };
        let r = SpecialRef::create(&rt, &val, PARENT_PROPERTY).unwrap();
        r.set(&mut rt, &global_val).unwrap();
        assert!(obj.borrow().parent_scope.is_some());
        r.set(&mut rt, &JsValue::Null).unwrap();
        assert!(obj.borrow().parent_scope.is_none());
    }

    #[test]
    fn specials_answer_has_but_refuse_delete() {
        let mut rt = Runtime::new().unwrap();
        let obj = rt.create_object();
        let val = rt.object_value(&obj);
        let r = proto_ref(&rt, &val);
        assert!(r.has(&rt));
        assert!(!r.delete());
    }

    #[test]
    fn nullish_targets_cannot_hold_the_reference() {
        let rt = Runtime::new().unwrap();
        let err = SpecialRef::create(&rt, &JsValue::Undefined, PROTO_PROPERTY)
            .err()
            .unwrap();
        assert!(matches!(err, JsError::Type { .. }));
    }

    #[test]
    fn feature_off_degrades_to_plain_properties() {
        let mut rt = Runtime::with_features(RuntimeFeatures {
            parent_proto_properties: false,
            strict_mode: false,
        })
        .unwrap();
        let obj = rt.create_object();
        let val = rt.object_value(&obj);
        let r = proto_ref(&rt, &val);
        assert_eq!(r.kind(), SpecialRefKind::Plain);
        r.set(&mut rt, &JsValue::Number(9.0)).unwrap();
        let stored = r.get(&mut rt).unwrap();
        assert!(matches!(stored, JsValue::Number(n) if n == 9.0));
        // an ordinary property, so the real prototype link is untouched
        assert!(obj.borrow().prototype.is_some());
        assert!(r.delete());
    }
}
