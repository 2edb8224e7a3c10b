//! Record descriptors: the per-variant input shape of the merge.
//!
//! A [`RecordDescriptor`] describes one named record type of one input
//! family: an ordered mapping of property name to declared cardinality and
//! type, an optional super-type link, sub-type links, and a leaf flag.
//! Descriptors live in a [`DescriptorArena`] and reference each other
//! through stable [`DescriptorId`] handles, so self-referential and
//! mutually-referential hierarchies are representable without ownership
//! cycles.
//!
//! # Examples
//!
//! ```
//! use compound_schema_core::*;
//!
//! let mut arena = DescriptorArena::new();
//! let person = arena.insert(
//!     RecordDescriptor::branch("Person")
//!         .with_property("name", Cardinality::Single, PropertyType::Scalar(ScalarKind::Str)),
//! );
//! // A record may reference itself through a branch property.
//! arena[person] = arena[person].clone().with_property(
//!     "partner",
//!     Cardinality::Optional,
//!     PropertyType::Branch(person),
//! );
//!
//! assert_eq!(arena[person].properties.len(), 2);
//! assert!(!arena[person].is_leaf);
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::cardinality::Cardinality;
use crate::types::{EnumType, ScalarKind};

/// Reserved empty property name for the value slot of a leaf descriptor
/// and for the synthesized expansion of a branch compound.
pub const EXPANSION_SLOT: &str = "";

/// Stable handle of a [`RecordDescriptor`] within its arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DescriptorId(pub u32);

impl std::fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Declared type of one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    /// A terminal scalar value.
    Scalar(ScalarKind),
    /// A terminal enumerated value.
    Enum(EnumType),
    /// A nested record, by arena handle.
    Branch(DescriptorId),
}

/// One declared property: cardinality plus type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Declared multiplicity; `Missing` never appears in a declaration.
    pub cardinality: Cardinality,
    /// Declared type.
    pub ty: PropertyType,
}

impl PropertyDescriptor {
    /// Creates a property descriptor.
    pub fn new(cardinality: Cardinality, ty: PropertyType) -> Self {
        PropertyDescriptor { cardinality, ty }
    }
}

/// One input record type: ordered properties, hierarchy links, leaf flag.
///
/// A leaf descriptor models a record that *is* a terminal value; it has
/// exactly one property under [`EXPANSION_SLOT`] holding that value's
/// type. A branch descriptor has named properties and never uses the
/// reserved slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDescriptor {
    /// Type name within its family.
    pub name: String,
    /// Ordered property mapping; iteration order is declaration order.
    #[serde(default)]
    pub properties: IndexMap<String, PropertyDescriptor>,
    /// Super-type link, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_id: Option<DescriptorId>,
    /// Sub-type links, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subs: Vec<DescriptorId>,
    /// Whether this descriptor models a terminal value.
    #[serde(default)]
    pub is_leaf: bool,
}

impl RecordDescriptor {
    /// Creates an empty branch descriptor.
    pub fn branch(name: impl Into<String>) -> Self {
        RecordDescriptor {
            name: name.into(),
            properties: IndexMap::new(),
            super_id: None,
            subs: Vec::new(),
            is_leaf: false,
        }
    }

    /// Creates a leaf descriptor whose value has the given type.
    ///
    /// # Examples
    ///
    /// ```
    /// use compound_schema_core::*;
    ///
    /// let code = RecordDescriptor::leaf("Code", PropertyType::Scalar(ScalarKind::I32));
    /// assert!(code.is_leaf);
    /// assert!(code.leaf_type().is_some());
    /// ```
    pub fn leaf(name: impl Into<String>, ty: PropertyType) -> Self {
        let mut properties = IndexMap::new();
        properties.insert(
            EXPANSION_SLOT.to_string(),
            PropertyDescriptor::new(Cardinality::Single, ty),
        );
        RecordDescriptor {
            name: name.into(),
            properties,
            super_id: None,
            subs: Vec::new(),
            is_leaf: true,
        }
    }

    /// Adds a property, preserving declaration order.
    pub fn with_property(
        mut self,
        name: impl Into<String>,
        cardinality: Cardinality,
        ty: PropertyType,
    ) -> Self {
        self.properties
            .insert(name.into(), PropertyDescriptor::new(cardinality, ty));
        self
    }

    /// Looks up a declared property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }

    /// The value type of a leaf descriptor; `None` on branches.
    pub fn leaf_type(&self) -> Option<&PropertyDescriptor> {
        if self.is_leaf {
            self.properties.get(EXPANSION_SLOT)
        } else {
            None
        }
    }
}

/// Owning store of record descriptors, addressed by [`DescriptorId`].
///
/// Indexing with a handle from another arena panics; descriptor sets are
/// validated before merging, so dangling handles are caught up front.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescriptorArena {
    records: Vec<RecordDescriptor>,
}

impl DescriptorArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a descriptor and returns its handle.
    pub fn insert(&mut self, record: RecordDescriptor) -> DescriptorId {
        let id = DescriptorId(self.records.len() as u32);
        self.records.push(record);
        id
    }

    /// Looks up a descriptor, `None` when the handle is dangling.
    pub fn get(&self, id: DescriptorId) -> Option<&RecordDescriptor> {
        self.records.get(id.0 as usize)
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the arena holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates descriptors with their handles, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (DescriptorId, &RecordDescriptor)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| (DescriptorId(i as u32), r))
    }

    /// Links `child` under `parent`, updating both ends.
    pub fn link_super(&mut self, child: DescriptorId, parent: DescriptorId) {
        self.records[child.0 as usize].super_id = Some(parent);
        let subs = &mut self.records[parent.0 as usize].subs;
        if !subs.contains(&child) {
            subs.push(child);
        }
    }

    /// The super chain of `id`, nearest first, cycle-guarded.
    pub fn super_chain(&self, id: DescriptorId) -> Vec<DescriptorId> {
        let mut chain = Vec::new();
        let mut current = self.get(id).and_then(|r| r.super_id);
        while let Some(next) = current {
            if next == id || chain.contains(&next) {
                break;
            }
            chain.push(next);
            current = self.get(next).and_then(|r| r.super_id);
        }
        chain
    }
}

impl std::ops::Index<DescriptorId> for DescriptorArena {
    type Output = RecordDescriptor;

    fn index(&self, id: DescriptorId) -> &RecordDescriptor {
        &self.records[id.0 as usize]
    }
}

impl std::ops::IndexMut<DescriptorId> for DescriptorArena {
    fn index_mut(&mut self, id: DescriptorId) -> &mut RecordDescriptor {
        &mut self.records[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_descriptor_has_exactly_the_value_slot() {
        let leaf = RecordDescriptor::leaf("Code", PropertyType::Scalar(ScalarKind::I32));
        assert!(leaf.is_leaf);
        assert_eq!(leaf.properties.len(), 1);
        assert!(leaf.properties.contains_key(EXPANSION_SLOT));
        assert_eq!(
            leaf.leaf_type().map(|p| &p.ty),
            Some(&PropertyType::Scalar(ScalarKind::I32))
        );
    }

    #[test]
    fn test_arena_handles_are_insertion_ordered() {
        let mut arena = DescriptorArena::new();
        let a = arena.insert(RecordDescriptor::branch("A"));
        let b = arena.insert(RecordDescriptor::branch("B"));
        assert_eq!(a, DescriptorId(0));
        assert_eq!(b, DescriptorId(1));
        assert_eq!(arena[b].name, "B");
    }

    #[test]
    fn test_link_super_updates_both_ends() {
        let mut arena = DescriptorArena::new();
        let base = arena.insert(RecordDescriptor::branch("Base"));
        let derived = arena.insert(RecordDescriptor::branch("Derived"));
        arena.link_super(derived, base);

        assert_eq!(arena[derived].super_id, Some(base));
        assert_eq!(arena[base].subs, vec![derived]);
        assert_eq!(arena.super_chain(derived), vec![base]);
    }

    #[test]
    fn test_super_chain_stops_on_cycles() {
        let mut arena = DescriptorArena::new();
        let a = arena.insert(RecordDescriptor::branch("A"));
        let b = arena.insert(RecordDescriptor::branch("B"));
        arena[a].super_id = Some(b);
        arena[b].super_id = Some(a);

        assert_eq!(arena.super_chain(a), vec![b]);
    }

    #[test]
    fn test_property_order_is_declaration_order() {
        let rec = RecordDescriptor::branch("R")
            .with_property("zz", Cardinality::Single, PropertyType::Scalar(ScalarKind::Str))
            .with_property("aa", Cardinality::List, PropertyType::Scalar(ScalarKind::I32));
        let names: Vec<&str> = rec.properties.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["zz", "aa"]);
    }
}
