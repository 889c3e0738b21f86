//! The host side of the bridge: dynamically typed host data, the mutable
//! host sequence wrapped by the script-visible list adapter, and the cursor
//! capability used to adapt host iteration into the script iterator protocol.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A host-owned value participating in the resource-cleanup contract:
/// `release` is invoked when script code removes the value from a host
/// collection.
pub trait HostResource {
    fn release(&self);

    fn resource_name(&self) -> &str {
        "resource"
    }
}

/// A dynamically typed host datum, exposed to script only through adapters.
#[derive(Clone)]
pub enum HostValue {
    Null,
    Bool(bool),
    Int(i32),
    Double(f64),
    Str(String),
    Resource(Rc<dyn HostResource>),
}

impl HostValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Double(_) => "double",
            HostValue::Str(_) => "string",
            HostValue::Resource(_) => "resource",
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => write!(f, "HostValue::Null"),
            HostValue::Bool(b) => write!(f, "HostValue::Bool({b})"),
            HostValue::Int(i) => write!(f, "HostValue::Int({i})"),
            HostValue::Double(d) => write!(f, "HostValue::Double({d})"),
            HostValue::Str(s) => write!(f, "HostValue::Str({s:?})"),
            HostValue::Resource(r) => write!(f, "HostValue::Resource({})", r.resource_name()),
        }
    }
}

/// Declared element type of a typed host sequence; incoming script values
/// are coerced to it before storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElemType {
    Bool,
    Int,
    Double,
    Str,
}

impl ElemType {
    pub fn is_instance(self, value: &HostValue) -> bool {
        matches!(
            (self, value),
            (ElemType::Bool, HostValue::Bool(_))
                | (ElemType::Int, HostValue::Int(_))
                | (ElemType::Double, HostValue::Double(_))
                | (ElemType::Str, HostValue::Str(_))
        )
    }
}

/// A mutable, indexable, dynamically resizable host sequence.
#[derive(Debug, Default)]
pub struct HostList {
    items: Vec<HostValue>,
}

pub type HostListRef = Rc<RefCell<HostList>>;

impl HostList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(items: Vec<HostValue>) -> Self {
        Self { items }
    }

    pub fn into_ref(self) -> HostListRef {
        Rc::new(RefCell::new(self))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HostValue> {
        self.items.get(index)
    }

    pub fn set(&mut self, index: usize, value: HostValue) {
        self.items[index] = value;
    }

    pub fn push(&mut self, value: HostValue) {
        self.items.push(value);
    }

    pub fn insert(&mut self, index: usize, value: HostValue) {
        self.items.insert(index, value);
    }

    /// Removes the element at `index`, honoring the resource-cleanup
    /// contract for removed values.
    pub fn remove_released(&mut self, index: usize) -> HostValue {
        let removed = self.items.remove(index);
        if let HostValue::Resource(r) = &removed {
            r.release();
        }
        removed
    }

    pub fn remove(&mut self, index: usize) -> HostValue {
        self.items.remove(index)
    }

    pub fn reverse(&mut self) {
        self.items.reverse();
    }

    pub fn snapshot(&self) -> Vec<HostValue> {
        self.items.clone()
    }

    pub fn extend_from(&mut self, other: &HostList) {
        self.items.extend(other.items.iter().cloned());
    }
}

/// Host iterator capability. Any host iterator over host values qualifies.
pub trait HostCursor {
    fn next_value(&mut self) -> Option<HostValue>;
}

impl<I: Iterator<Item = HostValue>> HostCursor for I {
    fn next_value(&mut self) -> Option<HostValue> {
        self.next()
    }
}

/// Index-based cursor over a shared host list.
pub struct ListCursor {
    list: HostListRef,
    index: usize,
}

impl ListCursor {
    pub fn new(list: HostListRef) -> Self {
        Self { list, index: 0 }
    }
}

impl Iterator for ListCursor {
    type Item = HostValue;

    fn next(&mut self) -> Option<HostValue> {
        let item = self.list.borrow().get(self.index).cloned();
        if item.is_some() {
            self.index += 1;
        }
        item
    }
}
