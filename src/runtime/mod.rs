pub mod builtins;
mod helpers;
pub mod lazy_ctor;
pub mod special_ref;
mod types;

pub use helpers::*;
pub use types::*;

use crate::error::JsError;
use crate::types::{JsObject, JsValue};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Installer for a registered built-in class. Receives the scope to install
/// into and returns the constructor value, or `None` when the installer
/// defines its bindings on the scope itself.
pub type ClassInit = fn(&mut Runtime, &ObjRef) -> Result<Option<JsValue>, JsError>;

#[derive(Debug, Clone, Copy)]
pub struct RuntimeFeatures {
    /// Expose `__proto__` and `__parent__` as assignable pseudo-properties.
    pub parent_proto_properties: bool,
    pub strict_mode: bool,
}

impl Default for RuntimeFeatures {
    fn default() -> Self {
        Self {
            parent_proto_properties: true,
            strict_mode: false,
        }
    }
}

pub struct Runtime {
    objects: FxHashMap<u64, ObjRef>,
    next_object_id: u64,
    object_prototype: ObjRef,
    global_scope: ObjRef,
    pub(crate) iterator_prototype: Option<ObjRef>,
    pub(crate) set_prototype: Option<ObjRef>,
    pub(crate) set_iterator_prototype: Option<ObjRef>,
    pub(crate) host_iterator_prototype: Option<ObjRef>,
    pub(crate) array_iterator_prototype: Option<ObjRef>,
    /// Values stashed against a top-level scope, keyed by (scope id, tag).
    associated_values: FxHashMap<(u64, &'static str), JsValue>,
    class_registry: FxHashMap<String, ClassInit>,
    pub(crate) new_target: Option<JsValue>,
    pub features: RuntimeFeatures,
}

impl Runtime {
    pub fn new() -> Result<Self, JsError> {
        Self::with_features(RuntimeFeatures::default())
    }

    pub fn with_features(features: RuntimeFeatures) -> Result<Self, JsError> {
        let object_prototype = Rc::new(RefCell::new(JsObjectData::new()));
        let global_scope = Rc::new(RefCell::new(JsObjectData::new()));
        global_scope.borrow_mut().class_name = "global".to_string();
        global_scope.borrow_mut().prototype = Some(object_prototype.clone());

        let mut rt = Self {
            objects: FxHashMap::default(),
            next_object_id: 1,
            object_prototype: object_prototype.clone(),
            global_scope: global_scope.clone(),
            iterator_prototype: None,
            set_prototype: None,
            set_iterator_prototype: None,
            host_iterator_prototype: None,
            array_iterator_prototype: None,
            associated_values: FxHashMap::default(),
            class_registry: FxHashMap::default(),
            new_target: None,
            features,
        };
        rt.register_object(&object_prototype);
        rt.register_object(&global_scope);

        rt.register_class("Set", builtins::set::init);
        rt.register_class("Iterator", builtins::iterators::init);

        // Iterator machinery is initialized eagerly so the StopIteration
        // singleton exists before any iterator is pulled.
        builtins::iterators::init(&mut rt, &global_scope)?;
        // Set stays a lazy slot until the first read of the binding.
        lazy_ctor::LazyCtorSlot::install(&mut rt, &global_scope, "Set", "Set", false);

        Ok(rt)
    }

    pub(crate) fn register_object(&mut self, obj: &ObjRef) -> u64 {
        let id = self.next_object_id;
        self.next_object_id += 1;
        obj.borrow_mut().id = Some(id);
        self.objects.insert(id, obj.clone());
        id
    }

    pub fn get_object(&self, id: u64) -> Option<ObjRef> {
        self.objects.get(&id).cloned()
    }

    pub fn global(&self) -> ObjRef {
        self.global_scope.clone()
    }

    pub fn object_prototype(&self) -> ObjRef {
        self.object_prototype.clone()
    }

    /// Creates a plain object inheriting from Object.prototype.
    pub fn create_object(&mut self) -> ObjRef {
        let obj = Rc::new(RefCell::new(JsObjectData::new()));
        obj.borrow_mut().prototype = Some(self.object_prototype.clone());
        self.register_object(&obj);
        obj
    }

    /// Creates an object with an explicit prototype link (possibly none).
    pub fn create_object_with_proto(&mut self, proto: Option<ObjRef>) -> ObjRef {
        let obj = Rc::new(RefCell::new(JsObjectData::new()));
        obj.borrow_mut().prototype = proto;
        self.register_object(&obj);
        obj
    }

    pub fn object_value(&self, obj: &ObjRef) -> JsValue {
        // Registered objects always carry an id.
        let id = obj.borrow().id.unwrap_or(0);
        JsValue::Object(JsObject { id })
    }

    pub fn create_function(&mut self, func: JsFunction) -> JsValue {
        let JsFunction::Native(ref name, arity, _) = func;
        let name = name.clone();
        let obj = self.create_object();
        {
            let mut b = obj.borrow_mut();
            b.class_name = "Function".to_string();
            b.insert_builtin("name".to_string(), JsValue::from_str(&name));
            b.insert_builtin("length".to_string(), JsValue::Number(arity as f64));
            b.callable = Some(func);
        }
        self.object_value(&obj)
    }

    pub fn create_array(&mut self, values: Vec<JsValue>) -> JsValue {
        let obj = self.create_object();
        {
            let mut b = obj.borrow_mut();
            b.class_name = "Array".to_string();
            b.array_elements = Some(values);
        }
        let iter_fn = self.create_function(JsFunction::native(
            "values".to_string(),
            0,
            |rt, this, _args| {
                let target = to_object_or_null(rt, this)
                    .filter(|o| o.borrow().array_elements.is_some())
                    .ok_or_else(|| {
                        JsError::type_error("values called on incompatible receiver")
                    })?;
                Ok(builtins::iterators::new_array_iterator(rt, &target))
            },
        ));
        obj.borrow_mut().insert_builtin(
            crate::types::WellKnownSymbol::Iterator.to_property_key().to_string(),
            iter_fn,
        );
        self.object_value(&obj)
    }

    pub fn register_class(&mut self, name: &str, init: ClassInit) {
        self.class_registry.insert(name.to_string(), init);
    }

    pub(crate) fn resolve_class(&self, name: &str) -> Option<ClassInit> {
        self.class_registry.get(name).copied()
    }

    /// Walks the parent-scope chain of `scope` to its top-level scope.
    pub fn top_level_scope(scope: &ObjRef) -> ObjRef {
        let mut current = scope.clone();
        loop {
            let parent = current.borrow().parent_scope.clone();
            match parent {
                Some(p) => current = p,
                None => return current,
            }
        }
    }

    /// Stashes `value` against the top-level scope of `scope` under `tag`.
    /// The first association wins; later calls return the stored value.
    pub fn associate_value(&mut self, scope: &ObjRef, tag: &'static str, value: JsValue) -> JsValue {
        let top = Self::top_level_scope(scope);
        let id = top.borrow().id.unwrap_or(0);
        self.associated_values
            .entry((id, tag))
            .or_insert(value)
            .clone()
    }

    pub fn top_scope_value(&self, scope: &ObjRef, tag: &'static str) -> Option<JsValue> {
        let top = Self::top_level_scope(scope);
        let id = top.borrow().id.unwrap_or(0);
        self.associated_values.get(&(id, tag)).cloned()
    }

    /// Invokes `ctor` as a constructor: new.target is set for the duration
    /// of the call.
    pub fn construct(&mut self, ctor: &JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
        let saved = self.new_target.take();
        self.new_target = Some(ctor.clone());
        let result = call_function(self, ctor, &JsValue::Undefined, args);
        self.new_target = saved;
        result
    }
}
