//! Lazily materialized constructor slots.
//!
//! A slot is installed on a scope as a placeholder accessor. The first read
//! runs the registered class installer exactly once, replaces the
//! placeholder with a plain data property, and every later read sees the
//! materialized value. Concurrent first reads block until the winning
//! builder finishes; a re-entrant read from the building thread itself is
//! reported as an error instead of deadlocking.

use crate::error::JsError;
use crate::runtime::{JsFunction, ObjRef, PropertyDescriptor, Runtime};
use crate::types::JsValue;
use parking_lot::{Condvar, Mutex};
use std::rc::Rc;
use std::thread::{self, ThreadId};

enum InitState<T> {
    NotStarted,
    InProgress(ThreadId),
    Materialized(Option<T>),
}

#[derive(Debug, PartialEq, Eq)]
pub enum InitOnceError<E> {
    /// The building thread re-entered the cell while its own build was
    /// still running.
    Recursive,
    Build(E),
}

/// Single-flight once-cell with a tri-state lifecycle. Unlike `OnceCell`,
/// a failed build still materializes (as "no value"), and same-thread
/// re-entry is detected rather than deadlocking.
pub struct InitOnce<T> {
    state: Mutex<InitState<T>>,
    done: Condvar,
}

impl<T: Clone> InitOnce<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InitState::NotStarted),
            done: Condvar::new(),
        }
    }

    /// Returns the materialized value, running `build` if this is the first
    /// materializing call. Exactly one builder ever runs; losers of the race
    /// wait and then observe the winner's value.
    pub fn materialize<E>(
        &self,
        build: impl FnOnce() -> Result<Option<T>, E>,
    ) -> Result<Option<T>, InitOnceError<E>> {
        {
            let mut state = self.state.lock();
            loop {
                match &*state {
                    InitState::Materialized(value) => return Ok(value.clone()),
                    InitState::InProgress(owner) if *owner == thread::current().id() => {
                        return Err(InitOnceError::Recursive);
                    }
                    InitState::InProgress(_) => self.done.wait(&mut state),
                    InitState::NotStarted => break,
                }
            }
            *state = InitState::InProgress(thread::current().id());
        }

        // The build runs outside the lock so a re-entrant read observes
        // InProgress instead of blocking on the state mutex.
        let built = build();

        let mut state = self.state.lock();
        let result = match built {
            Ok(value) => {
                *state = InitState::Materialized(value.clone());
                Ok(value)
            }
            Err(e) => {
                // A failed build still transitions to Materialized, as
                // "no value"; later reads do not retry.
                *state = InitState::Materialized(None);
                Err(InitOnceError::Build(e))
            }
        };
        self.done.notify_all();
        result
    }

    /// The materialized value, or None when materialization has not
    /// finished yet.
    pub fn try_value(&self) -> Option<Option<T>> {
        match &*self.state.lock() {
            InitState::Materialized(value) => Some(value.clone()),
            _ => None,
        }
    }
}

impl<T: Clone> Default for InitOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A named lazily-initialized constructor binding on a scope.
pub struct LazyCtorSlot {
    scope: ObjRef,
    property_name: String,
    class_name: String,
    sealed: bool,
    cell: InitOnce<JsValue>,
}

impl LazyCtorSlot {
    /// Installs the placeholder accessor for `property_name` on `scope`.
    /// The binding stays non-enumerable before and after materialization.
    pub fn install(
        rt: &mut Runtime,
        scope: &ObjRef,
        property_name: &str,
        class_name: &str,
        sealed: bool,
    ) -> Rc<LazyCtorSlot> {
        let slot = Rc::new(LazyCtorSlot {
            scope: scope.clone(),
            property_name: property_name.to_string(),
            class_name: class_name.to_string(),
            sealed,
            cell: InitOnce::new(),
        });

        let getter_slot = slot.clone();
        let getter_scope = scope.clone();
        let prop = property_name.to_string();
        let getter = rt.create_function(JsFunction::native(
            format!("get {property_name}"),
            0,
            move |rt, _this, _args| {
                let value = getter_slot.materialize(rt)?;
                // Swap the placeholder for a plain data property so later
                // reads no longer go through this getter.
                match value {
                    Some(v) => {
                        getter_scope
                            .borrow_mut()
                            .insert_builtin(prop.clone(), v.clone());
                        Ok(v)
                    }
                    None => {
                        getter_scope.borrow_mut().remove_property(&prop);
                        Ok(JsValue::Undefined)
                    }
                }
            },
        ));
        scope.borrow_mut().insert_property(
            property_name.to_string(),
            PropertyDescriptor::getter(getter, false, true),
        );
        slot
    }

    /// Forces the slot; the class installer runs at most once.
    pub fn materialize(&self, rt: &mut Runtime) -> Result<Option<JsValue>, JsError> {
        match self.cell.materialize(|| self.build_value(rt)) {
            Ok(value) => Ok(value),
            Err(InitOnceError::Recursive) => Err(JsError::internal(format!(
                "recursive initialization of lazy binding '{}'",
                self.property_name
            ))),
            Err(InitOnceError::Build(e)) => Err(e),
        }
    }

    /// The materialized value without forcing; erroring when the slot has
    /// not been materialized yet.
    pub fn read(&self) -> Result<Option<JsValue>, JsError> {
        self.cell.try_value().ok_or_else(|| {
            JsError::internal(format!(
                "lazy binding '{}' read before materialization",
                self.property_name
            ))
        })
    }

    fn build_value(&self, rt: &mut Runtime) -> Result<Option<JsValue>, JsError> {
        let Some(init) = rt.resolve_class(&self.class_name) else {
            log::debug!(
                "no class registered under '{}' for lazy binding '{}'",
                self.class_name,
                self.property_name
            );
            return Ok(None);
        };
        let value = match init(rt, &self.scope) {
            Ok(Some(v)) => Some(v),
            Ok(None) => {
                // The installer bound the value on the scope itself; read
                // the raw own slot so the placeholder getter cannot
                // re-trigger.
                self.scope.borrow().get_property_value(&self.property_name)
            }
            Err(e) if e.is_catchable() => {
                // Script-visible construction failures degrade to an
                // absent binding.
                log::warn!(
                    "initialization of '{}' failed: {}",
                    self.property_name,
                    e
                );
                None
            }
            Err(e) => return Err(e),
        };
        if self.sealed
            && let Some(JsValue::Object(o)) = &value
            && let Some(obj) = rt.get_object(o.id)
        {
            obj.borrow_mut().extensible = false;
        }
        Ok(value)
    }
}
