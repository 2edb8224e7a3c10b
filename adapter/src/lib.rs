//! Runtime adapters realizing merged compound schemas.
//!
//! The merge engine produces compound descriptions; this crate provides
//! the objects that make them usable at runtime:
//!
//! - [`RecordInstance`] / [`RecordRef`] — the "original" records that
//!   projections wrap, shaped after one input descriptor.
//! - [`Projection`] — a zero-copy view exposing one original through the
//!   merged schema, converting values between the original and merged
//!   kinds on every access.
//! - [`Template`] — a blank, independently-owned instance of the merged
//!   schema, usable without any original.
//! - [`Expansion`] — a scalar adapted to the shape of a branch compound
//!   through its expansion slot.
//! - [`Adapter`] — the closed union over all three, carrying the
//!   cycle-safe equality, hashing, rendering, and deep-copy algorithms.
//!
//! # Example
//!
//! ```
//! use compound_schema_core::*;
//! use compound_schema_engine::{merge_families, MergeOptions};
//! use compound_schema_adapter::{Item, Projection, RecordInstance, SchemaContext, Slot};
//!
//! // Two variants of the same record, one lacking `age`.
//! let mut arena = DescriptorArena::new();
//! let v1 = arena.insert(
//!     RecordDescriptor::branch("PersonV1")
//!         .with_property("name", Cardinality::Single, PropertyType::Scalar(ScalarKind::Str))
//!         .with_property("age", Cardinality::Single, PropertyType::Scalar(ScalarKind::I32)),
//! );
//! let v2 = arena.insert(
//!     RecordDescriptor::branch("PersonV2")
//!         .with_property("name", Cardinality::Single, PropertyType::Scalar(ScalarKind::Str)),
//! );
//! let families = [Family::new("v1", [v1]), Family::new("v2", [v2])];
//! let outcome = merge_families(&arena, &families, &MergeOptions::default()).unwrap();
//! let cx = SchemaContext::new(&arena, &outcome);
//!
//! let original = RecordInstance::new(v1)
//!     .with_value("name", Value::Str("Ada".into()))
//!     .with_value("age", Value::I32(36))
//!     .into_ref();
//! let projection = Projection::wrap(cx, outcome.roots[0], Some(original.clone()))
//!     .unwrap()
//!     .unwrap();
//!
//! // The projection reports what this original realizes, not the
//! // loosened merged cardinality.
//! assert_eq!(projection.presence("age").unwrap(), Cardinality::Single);
//!
//! // Writes go through to the live original.
//! projection.set("name", Item::Value(Value::Str("Grace".into()))).unwrap();
//! assert!(matches!(
//!     original.borrow().slot("name"),
//!     Slot::Value(Value::Str(ref s)) if s == "Grace"
//! ));
//! ```

mod context;
mod error;
mod expansion;
mod instance;
mod projection;
mod structure;
mod template;

pub use context::SchemaContext;
pub use error::{AdapterError, Result};
pub use expansion::Expansion;
pub use instance::{RecordInstance, RecordRef, Slot};
pub use projection::Projection;
pub use structure::{Adapter, Field, Item};
pub use template::Template;
