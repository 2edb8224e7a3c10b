//! Core data model for record-schema merging.
//!
//! This crate defines the types shared by the merge engine and the
//! adapter runtime:
//!
//! - [`RecordDescriptor`] — one input type's property shape, leaf or
//!   branch, stored in a [`DescriptorArena`] and addressed by
//!   [`DescriptorId`] handles so cyclic hierarchies are representable.
//! - [`Cardinality`] — the MISSING/SINGLE/OPTIONAL/LIST join-semilattice
//!   describing how many values a property may hold.
//! - [`ScalarKind`] / [`Value`] / [`BigDecimal`] — terminal value kinds
//!   and their runtime representation.
//! - [`EnumType`] / [`UnifiedEnum`] — enumerated leaf types and their
//!   merged union under canonical constant naming.
//! - [`Compound`] — the merged schema for one aligned group of
//!   descriptors, produced by the engine crate.
//! - [`DescriptorSet`] — a serializable bundle of families sharing one
//!   arena, the input boundary of the merge.
//!
//! Validation ([`validate_set`], [`validate_arena`]) catches structural
//! errors such as dangling handles, one-sided hierarchy links, and
//! malformed leaves before any merge work begins.
//!
//! # Example
//!
//! ```
//! use compound_schema_core::*;
//!
//! let mut set = DescriptorSet::new("1.0.0", "2026-08-01T00:00:00Z");
//! let person = set.arena.insert(
//!     RecordDescriptor::branch("Person")
//!         .with_property("name", Cardinality::Single, PropertyType::Scalar(ScalarKind::Str))
//!         .with_property("age", Cardinality::Optional, PropertyType::Scalar(ScalarKind::I32)),
//! );
//! set.families.push(Family::new("schema-a", [person]));
//!
//! assert!(validate_set(&set).is_empty());
//! assert_eq!(set.arena[person].properties.len(), 2);
//! ```

mod cardinality;
mod compound;
mod descriptor;
mod package;
mod types;
mod validate;

pub use cardinality::Cardinality;
pub use compound::{
    Compound, CompoundArena, CompoundId, DeclaredLeaf, MergedKind, MergedProperty, PropertyOrigin,
    Sort,
};
pub use descriptor::{
    DescriptorArena, DescriptorId, PropertyDescriptor, PropertyType, RecordDescriptor,
    EXPANSION_SLOT,
};
pub use package::{DescriptorSet, Family, SCHEMA_CONTRACT_VERSION};
pub use types::{
    normalize_constant_name, BigDecimal, EnumError, EnumType, ParseBigDecimalError, ScalarKind,
    UnifiedConstant, UnifiedEnum, Value,
};
pub use validate::{validate_arena, validate_set, ValidationError};
