//! Shared schema context for adapter objects.
//!
//! Adapters are thin views: all schema knowledge lives in the descriptor
//! arena and the merge outcome, borrowed once into a [`SchemaContext`]
//! and copied freely into every projection, template, and expansion built
//! from it. Property lookups walk the super-compound chain, so inherited
//! properties resolve through ordinary delegation.

use compound_schema_core::{CompoundArena, CompoundId, DescriptorArena, MergedProperty};
use compound_schema_engine::{MergeOutcome, MissingSetterPolicy};

/// Borrowed schema state shared by all adapters of one merge outcome.
#[derive(Debug, Clone, Copy)]
pub struct SchemaContext<'a> {
    /// The input descriptors.
    pub descriptors: &'a DescriptorArena,
    /// The merge result the adapters realize.
    pub outcome: &'a MergeOutcome,
    /// Setter behavior on properties the wrapped singular lacks.
    pub missing_setter: MissingSetterPolicy,
}

impl<'a> SchemaContext<'a> {
    /// Creates a context with the default (ignore) missing-setter policy.
    pub fn new(descriptors: &'a DescriptorArena, outcome: &'a MergeOutcome) -> Self {
        SchemaContext {
            descriptors,
            outcome,
            missing_setter: MissingSetterPolicy::Ignore,
        }
    }

    /// Selects the missing-setter policy for adapters built from here.
    pub fn with_missing_setter(mut self, policy: MissingSetterPolicy) -> Self {
        self.missing_setter = policy;
        self
    }

    /// The compound arena of the outcome.
    pub fn compounds(&self) -> &'a CompoundArena {
        &self.outcome.compounds
    }

    /// Looks up a merged property on the compound or its super chain.
    pub(crate) fn find_property(
        &self,
        compound: CompoundId,
        name: &str,
    ) -> Option<&'a MergedProperty> {
        let arena = self.compounds();
        if let Some(property) = arena[compound].property(name) {
            return Some(property);
        }
        for ancestor in arena.super_chain(compound) {
            if let Some(property) = arena[ancestor].property(name) {
                return Some(property);
            }
        }
        None
    }

    /// All property names visible on a compound: inherited levels first
    /// (root-most super at the front), own properties last, deduplicated.
    pub(crate) fn property_names(&self, compound: CompoundId) -> Vec<String> {
        let arena = self.compounds();
        let mut chain = arena.super_chain(compound);
        chain.reverse();
        chain.push(compound);

        let mut names: Vec<String> = Vec::new();
        for level in chain {
            for name in arena[level].properties.keys() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// The display name of a compound, for error messages.
    pub(crate) fn compound_name(&self, compound: CompoundId) -> String {
        self.compounds()[compound].name.clone()
    }
}
