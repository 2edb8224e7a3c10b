//! Runtime record instances: the "originals" that projections wrap.
//!
//! A [`RecordInstance`] is a value shaped after one [`RecordDescriptor`]:
//! a flat mapping of property name to [`Slot`], inherited properties
//! included. Instances are shared through [`RecordRef`]
//! (`Rc<RefCell<..>>`), so one original can sit behind several
//! projections and cyclic object graphs are constructible; traversal
//! algorithms use pointer identity to stay cycle-safe.
//!
//! [`RecordDescriptor`]: compound_schema_core::RecordDescriptor

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use compound_schema_core::{DescriptorId, Value};

/// Shared handle to a record instance.
pub type RecordRef = Rc<RefCell<RecordInstance>>;

/// Storage of one property on an instance.
#[derive(Debug, Clone, Default)]
pub enum Slot {
    /// No value.
    #[default]
    Empty,
    /// One scalar or enumeration value.
    Value(Value),
    /// One nested record.
    Record(RecordRef),
    /// A list of scalar values.
    Values(Vec<Value>),
    /// A list of nested records.
    Records(Vec<RecordRef>),
}

/// One original record: its descriptor plus per-property storage.
#[derive(Debug, Clone)]
pub struct RecordInstance {
    /// The descriptor this instance is shaped after.
    pub descriptor: DescriptorId,
    /// Flat property storage, inherited properties included.
    pub fields: IndexMap<String, Slot>,
}

impl RecordInstance {
    /// Creates an empty instance of the given descriptor.
    pub fn new(descriptor: DescriptorId) -> Self {
        RecordInstance {
            descriptor,
            fields: IndexMap::new(),
        }
    }

    /// Sets a scalar property.
    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), Slot::Value(value));
        self
    }

    /// Sets a nested record property.
    pub fn with_record(mut self, name: impl Into<String>, record: RecordRef) -> Self {
        self.fields.insert(name.into(), Slot::Record(record));
        self
    }

    /// Sets a scalar list property.
    pub fn with_values(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.fields
            .insert(name.into(), Slot::Values(values.into_iter().collect()));
        self
    }

    /// Sets a record list property.
    pub fn with_records(
        mut self,
        name: impl Into<String>,
        records: impl IntoIterator<Item = RecordRef>,
    ) -> Self {
        self.fields
            .insert(name.into(), Slot::Records(records.into_iter().collect()));
        self
    }

    /// Wraps the instance into a shared handle.
    pub fn into_ref(self) -> RecordRef {
        Rc::new(RefCell::new(self))
    }

    /// The current storage of a property; `Empty` when never set.
    pub fn slot(&self, name: &str) -> Slot {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    /// Replaces the storage of a property.
    pub fn set_slot(&mut self, name: impl Into<String>, slot: Slot) {
        self.fields.insert(name.into(), slot);
    }
}

/// Pointer identity of an instance, for visited sets.
pub(crate) fn record_identity(record: &RecordRef) -> usize {
    Rc::as_ptr(record) as usize
}
