//! Structural merge engine for record-schema unification.
//!
//! This crate turns families of [`RecordDescriptor`]s — independently
//! defined, structurally similar record hierarchies — into a single
//! merged compound graph:
//!
//! - [`group`] aligns descriptors across families (by position or by
//!   name/shape) into the tuples that merge together.
//! - [`resolve`] is the type resolver: a directed widening graph over
//!   scalar kinds with the string sink as universal fallback, plus the
//!   composed value conversions in both directions.
//! - [`enums`] unifies enumerated types into ordered unions under
//!   canonical constant naming.
//! - [`merge`] is the engine itself: recursive descent with memoization
//!   keyed by group identity, cardinality joins, expansion synthesis for
//!   mixed leaf/branch shapes, and mirrored super/sub chains.
//! - [`context`] carries the per-run configuration (overrides,
//!   exclusions, predefinitions, policies) as an explicit object.
//! - [`report`] summarizes a run with counts and a reproducible content
//!   hash.
//!
//! # Example
//!
//! ```
//! use compound_schema_core::*;
//! use compound_schema_engine::{merge_families, MergeOptions};
//!
//! let mut arena = DescriptorArena::new();
//! let v1 = arena.insert(
//!     RecordDescriptor::branch("PersonV1")
//!         .with_property("name", Cardinality::Single, PropertyType::Scalar(ScalarKind::Str))
//!         .with_property("age", Cardinality::Single, PropertyType::Scalar(ScalarKind::I32)),
//! );
//! let v2 = arena.insert(
//!     RecordDescriptor::branch("PersonV2")
//!         .with_property("name", Cardinality::Single, PropertyType::Scalar(ScalarKind::Str))
//!         .with_property("age", Cardinality::Single, PropertyType::Scalar(ScalarKind::F64)),
//! );
//!
//! let families = [Family::new("v1", [v1]), Family::new("v2", [v2])];
//! let outcome = merge_families(&arena, &families, &MergeOptions::default()).unwrap();
//!
//! let person = &outcome.compounds[outcome.roots[0]];
//! assert_eq!(person.properties["name"].kind, MergedKind::Scalar(ScalarKind::Str));
//! // i32 and f64 widen to the common decimal kind.
//! assert_eq!(person.properties["age"].kind, MergedKind::Scalar(ScalarKind::Decimal));
//! ```
//!
//! [`RecordDescriptor`]: compound_schema_core::RecordDescriptor

pub mod context;
pub mod enums;
pub mod group;
pub mod merge;
pub mod report;
pub mod resolve;

pub use context::{
    ConfigError, MergeConfig, MergeOptions, MissingSetterPolicy, NamingPolicy, PropertyRule,
};
pub use group::GroupingPolicy;
pub use merge::{merge_families, MergeError, MergeOutcome};
pub use report::{build_report, MergeReport};
pub use resolve::ResolveError;
