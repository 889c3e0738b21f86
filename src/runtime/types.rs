use crate::error::JsError;
use crate::host::{ElemType, HostCursor, HostListRef, HostValue};
use crate::runtime::Runtime;
use crate::runtime::builtins::iterators::{IterState, StopIterationData};
use crate::runtime::builtins::set::SetData;
use crate::types::JsValue;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

pub type ObjRef = Rc<RefCell<JsObjectData>>;

pub type NativeCall = dyn Fn(&mut Runtime, &JsValue, &[JsValue]) -> Result<JsValue, JsError>;

/// Strategy converting a stored host value back to a script value on read.
pub type ValueUnwrapper = fn(&mut Runtime, &HostValue) -> JsValue;

#[derive(Clone)]
pub enum JsFunction {
    Native(String, usize, Rc<NativeCall>),
}

impl JsFunction {
    pub fn native(
        name: String,
        arity: usize,
        f: impl Fn(&mut Runtime, &JsValue, &[JsValue]) -> Result<JsValue, JsError> + 'static,
    ) -> Self {
        JsFunction::Native(name, arity, Rc::new(f))
    }
}

impl std::fmt::Debug for JsFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsFunction::Native(name, arity, _) => {
                write!(f, "JsFunction::Native({name:?}, {arity})")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub value: Option<JsValue>,
    pub writable: Option<bool>,
    pub get: Option<JsValue>,
    pub set: Option<JsValue>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    pub fn data(value: JsValue, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            value: Some(value),
            writable: Some(writable),
            get: None,
            set: None,
            enumerable: Some(enumerable),
            configurable: Some(configurable),
        }
    }

    pub fn data_default(value: JsValue) -> Self {
        Self::data(value, true, true, true)
    }

    pub fn getter(get: JsValue, enumerable: bool, configurable: bool) -> Self {
        Self {
            value: None,
            writable: None,
            get: Some(get),
            set: None,
            enumerable: Some(enumerable),
            configurable: Some(configurable),
        }
    }

    pub fn is_accessor_descriptor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }
}

/// Script-facing binding of a host sequence: the shared list, the declared
/// element type used to coerce incoming values, and the unwrap strategy for
/// values going back out.
#[derive(Clone)]
pub struct HostListData {
    pub list: HostListRef,
    pub elem_type: Option<ElemType>,
    pub unwrapper: ValueUnwrapper,
}

/// Host-side data carried by a wrapped object.
pub enum HostData {
    /// A host sequence exposed through the list adapter.
    List(HostListData),
    /// An in-progress host iterator.
    Cursor(Rc<RefCell<dyn HostCursor>>),
    /// An opaque wrapped host datum.
    Value(HostValue),
}

pub struct JsObjectData {
    pub id: Option<u64>,
    pub properties: FxHashMap<String, PropertyDescriptor>,
    pub property_order: Vec<String>,
    pub prototype: Option<ObjRef>,
    pub parent_scope: Option<ObjRef>,
    pub callable: Option<JsFunction>,
    pub array_elements: Option<Vec<JsValue>>,
    pub class_name: String,
    pub extensible: bool,
    pub set_data: Option<SetData>,
    pub iterator_state: Option<IterState>,
    pub host_data: Option<HostData>,
    pub stop_iteration: Option<StopIterationData>,
}

impl JsObjectData {
    pub(crate) fn new() -> Self {
        Self {
            id: None,
            properties: FxHashMap::default(),
            property_order: Vec::new(),
            prototype: None,
            parent_scope: None,
            callable: None,
            array_elements: None,
            class_name: "Object".to_string(),
            extensible: true,
            set_data: None,
            iterator_state: None,
            host_data: None,
            stop_iteration: None,
        }
    }

    pub fn get_own_property(&self, key: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(key)
    }

    pub fn has_own_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn get_property_value(&self, key: &str) -> Option<JsValue> {
        self.properties.get(key).and_then(|d| d.value.clone())
    }

    pub fn insert_value(&mut self, key: String, value: JsValue) {
        if !self.properties.contains_key(&key) {
            self.property_order.push(key.clone());
        }
        self.properties
            .insert(key, PropertyDescriptor::data_default(value));
    }

    /// Writable, non-enumerable, configurable — the DONTENUM convention
    /// used for built-in members.
    pub fn insert_builtin(&mut self, key: String, value: JsValue) {
        if !self.properties.contains_key(&key) {
            self.property_order.push(key.clone());
        }
        self.properties
            .insert(key, PropertyDescriptor::data(value, true, false, true));
    }

    pub fn insert_property(&mut self, key: String, desc: PropertyDescriptor) {
        if !self.properties.contains_key(&key) {
            self.property_order.push(key.clone());
        }
        self.properties.insert(key, desc);
    }

    pub fn remove_property(&mut self, key: &str) -> bool {
        if self.properties.remove(key).is_some() {
            self.property_order.retain(|k| k != key);
            true
        } else {
            false
        }
    }

    pub fn enumerable_keys_with_proto(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut keys = Vec::new();
        // Own enumerable properties (in insertion order)
        for k in &self.property_order {
            if let Some(desc) = self.properties.get(k)
                && desc.enumerable != Some(false)
                && seen.insert(k.clone())
            {
                keys.push(k.clone());
            }
        }
        // Prototype chain
        if let Some(ref proto) = self.prototype {
            for k in proto.borrow().enumerable_keys_with_proto() {
                if seen.insert(k.clone()) {
                    keys.push(k);
                }
            }
        }
        keys
    }
}
