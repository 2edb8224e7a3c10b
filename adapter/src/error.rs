//! Error types for adapter operations.
//!
//! Provides a unified error type covering all runtime failure modes:
//! unknown properties, projection type mismatches, unsupported setters on
//! missing properties, single-backed list overflow, value conversions,
//! and enumeration mapping. Every variant carries the offending value or
//! type so callers can decide how to recover.

use thiserror::Error;

use compound_schema_core::EnumError;
use compound_schema_engine::ResolveError;

/// Errors that can occur while reading or writing through an adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The named property exists on no level of the compound.
    #[error("compound {compound:?} has no property {property:?}")]
    UnknownProperty { compound: String, property: String },

    /// An unwrap or nested write against the wrong record type.
    #[error("expected a record of type {expected:?}, got {actual:?}")]
    ProjectionMismatch { expected: String, actual: String },

    /// A setter on a property the wrapped singular does not declare,
    /// under the error policy.
    #[error("property {property:?} is missing for the wrapped record and cannot be set")]
    UnsupportedSetter { property: String },

    /// A merged list backed by single-valued storage cannot hold a
    /// second element.
    #[error("single-backed list {property:?} cannot hold more than one element")]
    SingleBackedList { property: String },

    /// A list index outside the current length.
    #[error("index {index} out of bounds for {property:?} (len {len})")]
    IndexOutOfBounds {
        property: String,
        index: usize,
        len: usize,
    },

    /// A value of the wrong shape for the property (e.g. a record where
    /// a scalar is expected).
    #[error("property {property:?} expects a {expected} here")]
    ValueShape {
        property: String,
        expected: &'static str,
    },

    /// A unified constant with no counterpart in the target enumeration.
    #[error("unified constant {constant:?} has no counterpart in enumeration {enumeration:?}")]
    EnumUnmapped {
        constant: String,
        enumeration: String,
    },

    /// An expansion operation on a compound that has none.
    #[error("compound {compound:?} has no expansion")]
    NoExpansion { compound: String },

    /// Value conversion between the original and merged kind failed.
    #[error(transparent)]
    Conversion(#[from] ResolveError),

    /// Enumeration mapping failed.
    #[error(transparent)]
    Enum(#[from] EnumError),
}

/// Convenience alias for results with [`AdapterError`].
pub type Result<T> = std::result::Result<T, AdapterError>;
