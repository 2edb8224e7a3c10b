use serde::{Deserialize, Serialize};

use crate::descriptor::{DescriptorArena, DescriptorId};

/// Version of the descriptor-set contract (semver).
///
/// Embedded in every [`DescriptorSet`] to track compatibility across
/// bundle formats.
pub const SCHEMA_CONTRACT_VERSION: &str = "1.0.0";

/// One ordered input family: the descriptors of a single source schema.
///
/// Families are the unit of alignment — position or shape grouping pairs
/// members of different families into the tuples that get merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    /// Family name (e.g. the source schema it was derived from).
    pub name: String,
    /// Member descriptors, in the caller-supplied order.
    pub members: Vec<DescriptorId>,
}

impl Family {
    /// Creates a family from a name and ordered members.
    pub fn new(name: impl Into<String>, members: impl IntoIterator<Item = DescriptorId>) -> Self {
        Family {
            name: name.into(),
            members: members.into_iter().collect(),
        }
    }
}

/// Serializable bundle of descriptor families sharing one arena.
///
/// This is the input boundary of the merge: an external discovery
/// collaborator produces descriptor sets, and the engine consumes them as
/// opaque data.
///
/// # Examples
///
/// ```
/// use compound_schema_core::*;
///
/// let mut arena = DescriptorArena::new();
/// let a = arena.insert(RecordDescriptor::branch("Person"));
///
/// let mut set = DescriptorSet::new("1.0.0", "2026-08-01T00:00:00Z");
/// set.arena = arena;
/// set.families.push(Family::new("schema-a", [a]));
///
/// assert_eq!(set.family("schema-a").unwrap().members.len(), 1);
/// let json = serde_json::to_string(&set).unwrap();
/// let back: DescriptorSet = serde_json::from_str(&json).unwrap();
/// assert_eq!(back, set);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorSet {
    /// Bundle contract version (populated from [`SCHEMA_CONTRACT_VERSION`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Set format version (semver string).
    pub version: String,
    /// Optional set name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional set description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// ISO-8601 timestamp for set creation.
    pub generated_at: String,
    /// Shared descriptor arena; family members index into it.
    #[serde(default)]
    pub arena: DescriptorArena,
    /// Input families, in merge order.
    #[serde(default)]
    pub families: Vec<Family>,
}

impl DescriptorSet {
    /// Creates a set with required fields.
    pub fn new(version: impl Into<String>, generated_at: impl Into<String>) -> Self {
        DescriptorSet {
            schema_version: Some(SCHEMA_CONTRACT_VERSION.to_string()),
            version: version.into(),
            name: None,
            description: None,
            generated_at: generated_at.into(),
            arena: DescriptorArena::new(),
            families: Vec::new(),
        }
    }

    /// Looks up a family by name.
    pub fn family(&self, name: &str) -> Option<&Family> {
        self.families.iter().find(|f| f.name == name)
    }

    /// Number of descriptors across the whole set.
    pub fn record_count(&self) -> usize {
        self.arena.len()
    }
}
