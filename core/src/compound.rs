//! Compound descriptions: the merged schema produced by the engine.
//!
//! A [`Compound`] is the merge of one aligned group of record descriptors:
//! per property a merged cardinality and type, the per-singular realized
//! state, the leaf/branch classification, and the synthesized expansion
//! where the group mixes leaf and branch shapes. Compounds live in a
//! [`CompoundArena`] and reference each other by [`CompoundId`], so a
//! self-referential merge resolves to the same node rather than an
//! infinite tree.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::cardinality::Cardinality;
use crate::descriptor::{DescriptorId, EXPANSION_SLOT};
use crate::types::{ScalarKind, UnifiedEnum};

/// Stable handle of a [`Compound`] within its arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CompoundId(pub u32);

impl std::fmt::Display for CompoundId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "compound#{}", self.0)
    }
}

/// Leaf/branch classification of a compound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sort {
    /// Every contributing singular is a leaf.
    Leaf,
    /// At least one contributing singular is a branch.
    Branch,
}

/// The leaf type one singular declared for a property, kept so adapter
/// conversions can map between the original and the merged kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredLeaf {
    /// Declared as a scalar of this kind.
    Scalar(ScalarKind),
    /// Declared as a constant of the named source enumeration.
    Enum(String),
}

/// Per-singular realized state of one merged property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyOrigin {
    /// The contributing singular.
    pub singular: DescriptorId,
    /// Declared cardinality there, `Missing` when absent.
    pub cardinality: Cardinality,
    /// Declared leaf type there, `None` for branch declarations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared: Option<DeclaredLeaf>,
}

/// Merged type of one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergedKind {
    /// Common scalar kind from the widening graph.
    Scalar(ScalarKind),
    /// Union of enumerated source types.
    Enum(UnifiedEnum),
    /// Nested compound, by arena handle.
    Branch(CompoundId),
}

/// One property of a compound: merged cardinality, merged type, origins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedProperty {
    /// Joined cardinality over every contributing singular.
    pub cardinality: Cardinality,
    /// Merged type.
    pub kind: MergedKind,
    /// Realized state per contributing singular, in group order. Every
    /// singular of the owning compound has an entry, `Missing` included.
    pub origins: Vec<PropertyOrigin>,
}

impl MergedProperty {
    /// The realized state for one singular, if it is a contributor.
    pub fn origin(&self, singular: DescriptorId) -> Option<&PropertyOrigin> {
        self.origins.iter().find(|o| o.singular == singular)
    }
}

/// The merged schema for one aligned group of singulars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compound {
    /// Name assigned by the naming policy.
    pub name: String,
    /// Leaf/branch classification.
    pub sort: Sort,
    /// Contributing singulars, in family order.
    pub singulars: Vec<DescriptorId>,
    /// Merged properties; iteration order is first-encounter union order.
    pub properties: IndexMap<String, MergedProperty>,
    /// Expansion schema, present when leaf singulars contributed to a
    /// branch compound. Always a `Sort::Leaf` compound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expansion: Option<CompoundId>,
    /// Super-compound, mirroring super links on contributing singulars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_id: Option<CompoundId>,
    /// Sub-compounds, mirroring sub links on contributing singulars.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subs: Vec<CompoundId>,
}

impl Compound {
    /// Whether every contributing singular is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self.sort, Sort::Leaf)
    }

    /// The value property of a leaf compound; `None` on branches.
    pub fn leaf_value(&self) -> Option<&MergedProperty> {
        if self.is_leaf() {
            self.properties.get(EXPANSION_SLOT)
        } else {
            None
        }
    }

    /// Looks up a merged property declared directly on this compound.
    pub fn property(&self, name: &str) -> Option<&MergedProperty> {
        self.properties.get(name)
    }
}

/// Owning store of compounds, addressed by [`CompoundId`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompoundArena {
    compounds: Vec<Compound>,
}

impl CompoundArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a compound and returns its handle.
    pub fn insert(&mut self, compound: Compound) -> CompoundId {
        let id = CompoundId(self.compounds.len() as u32);
        self.compounds.push(compound);
        id
    }

    /// Replaces the compound at `id`. The engine reserves a slot before
    /// recursing so cyclic groups resolve to an already-known handle, then
    /// fills the slot in; compounds are immutable once the build returns.
    pub fn replace(&mut self, id: CompoundId, compound: Compound) {
        self.compounds[id.0 as usize] = compound;
    }

    /// Looks up a compound, `None` when the handle is dangling.
    pub fn get(&self, id: CompoundId) -> Option<&Compound> {
        self.compounds.get(id.0 as usize)
    }

    /// Number of compounds.
    pub fn len(&self) -> usize {
        self.compounds.len()
    }

    /// Whether the arena holds no compounds.
    pub fn is_empty(&self) -> bool {
        self.compounds.is_empty()
    }

    /// Iterates compounds with their handles, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (CompoundId, &Compound)> {
        self.compounds
            .iter()
            .enumerate()
            .map(|(i, c)| (CompoundId(i as u32), c))
    }

    /// The super chain of `id`, nearest first, cycle-guarded.
    pub fn super_chain(&self, id: CompoundId) -> Vec<CompoundId> {
        let mut chain = Vec::new();
        let mut current = self.get(id).and_then(|c| c.super_id);
        while let Some(next) = current {
            if next == id || chain.contains(&next) {
                break;
            }
            chain.push(next);
            current = self.get(next).and_then(|c| c.super_id);
        }
        chain
    }
}

impl std::ops::Index<CompoundId> for CompoundArena {
    type Output = Compound;

    fn index(&self, id: CompoundId) -> &Compound {
        &self.compounds[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_branch(name: &str) -> Compound {
        Compound {
            name: name.to_string(),
            sort: Sort::Branch,
            singulars: Vec::new(),
            properties: IndexMap::new(),
            expansion: None,
            super_id: None,
            subs: Vec::new(),
        }
    }

    #[test]
    fn test_reserve_then_replace_keeps_the_handle() {
        let mut arena = CompoundArena::new();
        let id = arena.insert(empty_branch(""));
        let mut finished = empty_branch("Person");
        finished.singulars.push(DescriptorId(0));
        arena.replace(id, finished);

        assert_eq!(arena[id].name, "Person");
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_leaf_value_only_on_leaf_compounds() {
        let mut leaf = empty_branch("Code");
        leaf.sort = Sort::Leaf;
        leaf.properties.insert(
            EXPANSION_SLOT.to_string(),
            MergedProperty {
                cardinality: Cardinality::Single,
                kind: MergedKind::Scalar(ScalarKind::I32),
                origins: Vec::new(),
            },
        );
        assert!(leaf.leaf_value().is_some());
        assert!(empty_branch("B").leaf_value().is_none());
    }

    #[test]
    fn test_super_chain_walks_to_the_root() {
        let mut arena = CompoundArena::new();
        let root = arena.insert(empty_branch("Root"));
        let mut mid = empty_branch("Mid");
        mid.super_id = Some(root);
        let mid = arena.insert(mid);
        let mut bottom = empty_branch("Bottom");
        bottom.super_id = Some(mid);
        let bottom = arena.insert(bottom);

        assert_eq!(arena.super_chain(bottom), vec![mid, root]);
    }
}
