//! The structural merge engine.
//!
//! [`merge_families`] consumes aligned groups of record descriptors and
//! produces the compound graph: one [`Compound`] per group, with merged
//! cardinalities, merged leaf types, recursively merged branch properties,
//! synthesized expansions where leaf and branch shapes mix, and a
//! super/sub chain mirroring the descriptor hierarchy.
//!
//! The build is a single recursive pass memoized by group identity (the
//! sorted set of contributing singulars, plus the leaf-type signature for
//! nested mixed groups). The memo slot is reserved *before* recursing, so
//! a compound whose property references its own group resolves to the
//! same handle instead of recursing forever.
//!
//! # Examples
//!
//! ```
//! use compound_schema_core::*;
//! use compound_schema_engine::{merge_families, MergeOptions};
//!
//! let mut arena = DescriptorArena::new();
//! let a = arena.insert(
//!     RecordDescriptor::branch("Person")
//!         .with_property("foo", Cardinality::Single, PropertyType::Scalar(ScalarKind::Str)),
//! );
//! let b = arena.insert(RecordDescriptor::branch("PersonView"));
//!
//! let families = [Family::new("a", [a]), Family::new("b", [b])];
//! let outcome = merge_families(&arena, &families, &MergeOptions::default()).unwrap();
//!
//! let root = &outcome.compounds[outcome.roots[0]];
//! // One variant lacks `foo`, so the merged property is optional.
//! assert_eq!(root.properties["foo"].cardinality, Cardinality::Optional);
//! ```

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use compound_schema_core::{
    validate_arena, Cardinality, Compound, CompoundArena, CompoundId, DeclaredLeaf,
    DescriptorArena, DescriptorId, EnumError, EnumType, Family, MergedKind, MergedProperty,
    PropertyOrigin, PropertyType, ScalarKind, Sort, ValidationError, EXPANSION_SLOT,
};

use crate::context::{MergeOptions, NamingPolicy};
use crate::enums::unify_enums;
use crate::group::group_families;
use crate::resolve::{self, ResolveError};

/// Merge failures.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A group with no contributors; grouping never produces one, so this
    /// marks an engine defect rather than bad input.
    #[error("internal error: empty merge group")]
    EmptyGroup,
    /// The descriptor arena failed structural validation.
    #[error("descriptor input failed validation: {0}")]
    Invalid(#[from] ValidationError),
    /// Type resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Enumeration unification failed.
    #[error(transparent)]
    Enum(#[from] EnumError),
}

/// The compound graph plus the root compounds, one per top-level group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// All compounds produced by the run, including nested and super/sub
    /// levels; handles inside compounds index into this arena.
    pub compounds: CompoundArena,
    /// Top-level compounds in group order.
    pub roots: Vec<CompoundId>,
}

/// Merges the input families into a compound graph.
///
/// Validates the arena first, aligns the families under the configured
/// grouping policy, and merges each aligned group recursively. The pass
/// is pure and deterministic; it is never retried.
pub fn merge_families(
    arena: &DescriptorArena,
    families: &[Family],
    options: &MergeOptions,
) -> Result<MergeOutcome, MergeError> {
    if let Some(error) = validate_arena(arena).into_iter().next() {
        return Err(MergeError::Invalid(error));
    }

    let member_lists: Vec<Vec<DescriptorId>> =
        families.iter().map(|family| family.members.clone()).collect();
    let groups = group_families(arena, &member_lists, options.grouping);

    let mut merger = Merger::new(arena, options);
    let roots = groups
        .iter()
        .map(|group| merger.merge_group(&group.members, &[]))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MergeOutcome {
        compounds: merger.out,
        roots,
    })
}

/// A leaf type contributed to a nested group by a property declaration
/// rather than by a leaf descriptor.
#[derive(Debug, Clone)]
struct LeafContribution {
    origin: DescriptorId,
    cardinality: Cardinality,
    declared: LeafTy,
}

#[derive(Debug, Clone)]
enum LeafTy {
    Scalar(ScalarKind),
    Enum(EnumType),
}

impl LeafContribution {
    fn signature(&self) -> String {
        match &self.declared {
            LeafTy::Scalar(kind) => format!("scalar:{kind}"),
            LeafTy::Enum(enum_type) => format!("enum:{}", enum_type.name),
        }
    }
}

/// Memo key: the sorted singular set plus the leaf-type signature that
/// distinguishes a mixed nested group from the pure group over the same
/// branch descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    members: Vec<DescriptorId>,
    leaf_sig: Vec<String>,
}

fn group_key(members: &[DescriptorId], extras: &[LeafContribution]) -> GroupKey {
    let mut sorted = members.to_vec();
    sorted.sort();
    sorted.dedup();
    let mut leaf_sig: Vec<String> = extras.iter().map(LeafContribution::signature).collect();
    leaf_sig.sort();
    GroupKey {
        members: sorted,
        leaf_sig,
    }
}

struct Merger<'a> {
    arena: &'a DescriptorArena,
    options: &'a MergeOptions,
    out: CompoundArena,
    memo: HashMap<GroupKey, CompoundId>,
}

impl<'a> Merger<'a> {
    fn new(arena: &'a DescriptorArena, options: &'a MergeOptions) -> Self {
        // Predefined compounds are carried over verbatim and seed the
        // memo, so their groups are reused rather than recomputed.
        let out = options.predefinitions.clone();
        let mut memo = HashMap::new();
        for (id, compound) in out.iter() {
            if !compound.singulars.is_empty() {
                memo.insert(group_key(&compound.singulars, &[]), id);
            }
        }
        Merger {
            arena,
            options,
            out,
            memo,
        }
    }

    fn merge_group(
        &mut self,
        members: &[DescriptorId],
        extras: &[LeafContribution],
    ) -> Result<CompoundId, MergeError> {
        if members.is_empty() && extras.is_empty() {
            return Err(MergeError::EmptyGroup);
        }
        let key = group_key(members, extras);
        if let Some(&id) = self.memo.get(&key) {
            return Ok(id);
        }

        // Reserve the handle before recursing: a self-referential group
        // must resolve to this same compound, not loop.
        let id = self.out.insert(placeholder());
        self.memo.insert(key, id);

        let compound = self.build(members, extras)?;
        self.out.replace(id, compound);
        Ok(id)
    }

    fn build(
        &mut self,
        members: &[DescriptorId],
        extras: &[LeafContribution],
    ) -> Result<Compound, MergeError> {
        let leaves: Vec<DescriptorId> = members
            .iter()
            .copied()
            .filter(|&m| self.arena[m].is_leaf)
            .collect();
        let branches: Vec<DescriptorId> = members
            .iter()
            .copied()
            .filter(|&m| !self.arena[m].is_leaf)
            .collect();
        let sort = if branches.is_empty() {
            Sort::Leaf
        } else {
            Sort::Branch
        };
        let name = self.compound_name(members, extras);
        debug!(name = %name, members = members.len(), ?sort, "merging group");

        let mut properties = IndexMap::new();
        let mut expansion = None;

        match sort {
            Sort::Leaf => {
                let slot = self.merge_leaf_slot(&leaves, extras)?;
                properties.insert(EXPANSION_SLOT.to_string(), slot);
            }
            Sort::Branch => {
                for property_name in self.property_union(&branches) {
                    let merged = self.merge_property(&branches, &property_name)?;
                    properties.insert(property_name, merged);
                }
                // Leaf singulars alongside branch singulars become the
                // expansion: a scalar standing in for the whole branch.
                if !leaves.is_empty() || !extras.is_empty() {
                    expansion = Some(self.merge_group(&leaves, extras)?);
                }
            }
        }

        let supers: Vec<DescriptorId> = members
            .iter()
            .filter_map(|&m| self.arena[m].super_id)
            .collect();
        let super_id = if supers.is_empty() {
            None
        } else {
            Some(self.merge_group(&supers, &[])?)
        };

        let sub_families: Vec<Vec<DescriptorId>> = members
            .iter()
            .map(|&m| self.arena[m].subs.clone())
            .collect();
        let mut subs = Vec::new();
        if sub_families.iter().any(|family| !family.is_empty()) {
            for group in group_families(self.arena, &sub_families, self.options.grouping) {
                subs.push(self.merge_group(&group.members, &[])?);
            }
        }

        Ok(Compound {
            name,
            sort,
            singulars: members.to_vec(),
            properties,
            expansion,
            super_id,
            subs,
        })
    }

    /// Property names across branch members, first-encounter order, with
    /// exclusion rules applied before grouping-by-name.
    fn property_union(&self, branches: &[DescriptorId]) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for &member in branches {
            let record = &self.arena[member];
            for property_name in record.properties.keys() {
                if self.options.excludes(&record.name, property_name) {
                    continue;
                }
                if !names.iter().any(|n| n == property_name) {
                    names.push(property_name.clone());
                }
            }
        }
        names
    }

    fn merge_property(
        &mut self,
        branches: &[DescriptorId],
        name: &str,
    ) -> Result<MergedProperty, MergeError> {
        let mut origins = Vec::new();
        let mut cardinalities = Vec::new();
        let mut scalars: Vec<ScalarKind> = Vec::new();
        let mut enums: Vec<EnumType> = Vec::new();
        let mut extras: Vec<LeafContribution> = Vec::new();
        let mut branch_targets: Vec<DescriptorId> = Vec::new();

        for &member in branches {
            let record = &self.arena[member];
            let Some(declared_property) = record.property(name) else {
                cardinalities.push(Cardinality::Missing);
                origins.push(PropertyOrigin {
                    singular: member,
                    cardinality: Cardinality::Missing,
                    declared: None,
                });
                continue;
            };

            let mut effective = declared_property.cardinality;
            if effective == Cardinality::Single && self.options.forces_optional(&record.name, name)
            {
                effective = Cardinality::Optional;
            }
            cardinalities.push(effective);

            let declared = match &declared_property.ty {
                PropertyType::Scalar(kind) => {
                    scalars.push(*kind);
                    extras.push(LeafContribution {
                        origin: member,
                        cardinality: Cardinality::Single,
                        declared: LeafTy::Scalar(*kind),
                    });
                    Some(DeclaredLeaf::Scalar(*kind))
                }
                PropertyType::Enum(enum_type) => {
                    enums.push(enum_type.clone());
                    extras.push(LeafContribution {
                        origin: member,
                        cardinality: Cardinality::Single,
                        declared: LeafTy::Enum(enum_type.clone()),
                    });
                    Some(DeclaredLeaf::Enum(enum_type.name.clone()))
                }
                PropertyType::Branch(target) => {
                    branch_targets.push(*target);
                    None
                }
            };
            // Origins record the declared state; overrides only loosen
            // the merged cardinality, never what the singular realizes.
            origins.push(PropertyOrigin {
                singular: member,
                cardinality: declared_property.cardinality,
                declared,
            });
        }

        let kind = if branch_targets.is_empty() {
            self.resolve_leaf_kind(&scalars, &enums)?
        } else {
            // A property that is a branch in one variant and a leaf in
            // another merges the branch side and attaches the leaf side
            // as the nested compound's expansion. The mismatch is the
            // expansion case, not a failure.
            let nested_extras = if scalars.is_empty() && enums.is_empty() {
                Vec::new()
            } else {
                extras
            };
            MergedKind::Branch(self.merge_group(&branch_targets, &nested_extras)?)
        };

        Ok(MergedProperty {
            cardinality: Cardinality::join_all(cardinalities),
            kind,
            origins,
        })
    }

    fn merge_leaf_slot(
        &mut self,
        leaves: &[DescriptorId],
        extras: &[LeafContribution],
    ) -> Result<MergedProperty, MergeError> {
        let mut origins = Vec::new();
        let mut cardinalities = Vec::new();
        let mut scalars: Vec<ScalarKind> = Vec::new();
        let mut enums: Vec<EnumType> = Vec::new();

        for &member in leaves {
            let record = &self.arena[member];
            // Validation guarantees every leaf has exactly the value slot.
            let Some(slot) = record.leaf_type() else {
                continue;
            };
            let declared = match &slot.ty {
                PropertyType::Scalar(kind) => {
                    scalars.push(*kind);
                    DeclaredLeaf::Scalar(*kind)
                }
                PropertyType::Enum(enum_type) => {
                    enums.push(enum_type.clone());
                    DeclaredLeaf::Enum(enum_type.name.clone())
                }
                PropertyType::Branch(_) => continue,
            };
            cardinalities.push(slot.cardinality);
            origins.push(PropertyOrigin {
                singular: member,
                cardinality: slot.cardinality,
                declared: Some(declared),
            });
        }

        for extra in extras {
            let declared = match &extra.declared {
                LeafTy::Scalar(kind) => {
                    scalars.push(*kind);
                    DeclaredLeaf::Scalar(*kind)
                }
                LeafTy::Enum(enum_type) => {
                    enums.push(enum_type.clone());
                    DeclaredLeaf::Enum(enum_type.name.clone())
                }
            };
            cardinalities.push(extra.cardinality);
            origins.push(PropertyOrigin {
                singular: extra.origin,
                cardinality: extra.cardinality,
                declared: Some(declared),
            });
        }

        Ok(MergedProperty {
            cardinality: Cardinality::join_all(cardinalities),
            kind: self.resolve_leaf_kind(&scalars, &enums)?,
            origins,
        })
    }

    fn resolve_leaf_kind(
        &self,
        scalars: &[ScalarKind],
        enums: &[EnumType],
    ) -> Result<MergedKind, MergeError> {
        if scalars.is_empty() && !enums.is_empty() {
            return Ok(MergedKind::Enum(unify_enums(enums.iter())?));
        }
        if !enums.is_empty() {
            // Heterogeneous enum/scalar contributions fall back to the
            // universal string; constants render as their literal names.
            debug!("mixed enum and scalar contributions widen to str");
            return Ok(MergedKind::Scalar(ScalarKind::Str));
        }
        Ok(MergedKind::Scalar(resolve::merge_all(scalars)?))
    }

    fn compound_name(&self, members: &[DescriptorId], extras: &[LeafContribution]) -> String {
        let names: Vec<&str> = members
            .iter()
            .map(|&m| self.arena[m].name.as_str())
            .collect();
        if names.is_empty() {
            // Expansion synthesized purely from property declarations.
            return extras
                .first()
                .map(|extra| format!("{}Value", self.arena[extra.origin].name))
                .unwrap_or_default();
        }
        match self.options.naming {
            NamingPolicy::FirstSingular => names[0].to_string(),
            NamingPolicy::CommonSuffix => {
                common_suffix(&names).unwrap_or_else(|| names[0].to_string())
            }
        }
    }
}

fn placeholder() -> Compound {
    Compound {
        name: String::new(),
        sort: Sort::Branch,
        singulars: Vec::new(),
        properties: IndexMap::new(),
        expansion: None,
        super_id: None,
        subs: Vec::new(),
    }
}

/// Longest common suffix of all names, trimmed to start at an uppercase
/// boundary so `AcmePerson`/`LegacyPerson` yields `Person`.
fn common_suffix(names: &[&str]) -> Option<String> {
    let first = names.first()?;
    let mut len = first.len();
    for name in &names[1..] {
        let mut common = 0;
        let a = first.as_bytes();
        let b = name.as_bytes();
        let max = len.min(name.len());
        while common < max && a[first.len() - 1 - common] == b[name.len() - 1 - common] {
            common += 1;
        }
        len = common;
    }
    while len > 0 && !first.is_char_boundary(first.len() - len) {
        len -= 1;
    }
    if len == 0 {
        return None;
    }
    let suffix = &first[first.len() - len..];
    let trimmed = match suffix.char_indices().find(|(_, c)| c.is_uppercase()) {
        Some((index, _)) => &suffix[index..],
        None => suffix,
    };
    if trimmed.len() >= 2 {
        Some(trimmed.to_string())
    } else {
        None
    }
}
