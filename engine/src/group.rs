//! Grouping: aligning descriptors across input families.
//!
//! A group is one tuple of descriptors, at most one per family, that merge
//! into a single compound. Two policies are built in: *index alignment*
//! pairs position `i` of every family (for pre-ordered inputs), and
//! *shape alignment* infers the pairing from record names and overlapping
//! property sets. A family with fewer members than its siblings simply
//! contributes nothing at the tail positions; that is an absent slot, not
//! an error.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use compound_schema_core::{DescriptorArena, DescriptorId};

/// Built-in alignment policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingPolicy {
    /// Position `i` of family A merges with position `i` of family B.
    #[default]
    IndexAligned,
    /// Alignment inferred from record names and property overlap.
    ShapeAligned,
}

/// One aligned tuple of descriptors; never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Members in family order.
    pub members: Vec<DescriptorId>,
}

/// Minimum property overlap (relative to the smaller set) for two branch
/// records to shape-align without a name match.
const SHAPE_OVERLAP_THRESHOLD: f64 = 0.5;

/// Partitions families into aligned groups under the given policy.
pub fn group_families(
    arena: &DescriptorArena,
    families: &[Vec<DescriptorId>],
    policy: GroupingPolicy,
) -> Vec<Group> {
    match policy {
        GroupingPolicy::IndexAligned => index_aligned(families),
        GroupingPolicy::ShapeAligned => shape_aligned(arena, families),
    }
}

fn index_aligned(families: &[Vec<DescriptorId>]) -> Vec<Group> {
    let longest = families.iter().map(Vec::len).max().unwrap_or(0);
    (0..longest)
        .filter_map(|position| {
            let members: Vec<DescriptorId> = families
                .iter()
                .filter_map(|family| family.get(position).copied())
                .collect();
            if members.is_empty() {
                None
            } else {
                Some(Group { members })
            }
        })
        .collect()
}

fn shape_aligned(arena: &DescriptorArena, families: &[Vec<DescriptorId>]) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();

    for family in families {
        // One member per family and group; claimed groups are skipped.
        let mut claimed: HashSet<usize> = HashSet::new();
        for &member in family {
            let mut best: Option<(usize, f64)> = None;
            for (index, group) in groups.iter().enumerate() {
                if claimed.contains(&index) {
                    continue;
                }
                let score = alignment_score(arena, group.members[0], member);
                if score > best.map_or(0.0, |(_, s)| s) {
                    best = Some((index, score));
                }
            }
            match best {
                Some((index, _)) => {
                    groups[index].members.push(member);
                    claimed.insert(index);
                }
                None => {
                    groups.push(Group {
                        members: vec![member],
                    });
                    claimed.insert(groups.len() - 1);
                }
            }
        }
    }

    groups
}

/// Scores how well two descriptors align; zero means no alignment.
fn alignment_score(arena: &DescriptorArena, a: DescriptorId, b: DescriptorId) -> f64 {
    let left = &arena[a];
    let right = &arena[b];

    if left.name.eq_ignore_ascii_case(&right.name) {
        return 1.0;
    }
    // Leaves carry no property shape to compare; they align by name only.
    if left.is_leaf || right.is_leaf {
        return 0.0;
    }

    let smaller = left.properties.len().min(right.properties.len());
    if smaller == 0 {
        return 0.0;
    }
    let shared = left
        .properties
        .keys()
        .filter(|name| right.properties.contains_key(*name))
        .count();
    let overlap = shared as f64 / smaller as f64;
    if overlap > SHAPE_OVERLAP_THRESHOLD {
        overlap
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compound_schema_core::{Cardinality, PropertyType, RecordDescriptor, ScalarKind};

    fn branch(arena: &mut DescriptorArena, name: &str, props: &[&str]) -> DescriptorId {
        let mut record = RecordDescriptor::branch(name);
        for prop in props {
            record = record.with_property(
                *prop,
                Cardinality::Single,
                PropertyType::Scalar(ScalarKind::Str),
            );
        }
        arena.insert(record)
    }

    #[test]
    fn test_index_alignment_pairs_positions() {
        let mut arena = DescriptorArena::new();
        let a0 = branch(&mut arena, "A0", &[]);
        let a1 = branch(&mut arena, "A1", &[]);
        let b0 = branch(&mut arena, "B0", &[]);

        let groups = group_families(
            &arena,
            &[vec![a0, a1], vec![b0]],
            GroupingPolicy::IndexAligned,
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members, vec![a0, b0]);
        // The shorter family contributes nothing at position 1.
        assert_eq!(groups[1].members, vec![a1]);
    }

    #[test]
    fn test_shape_alignment_matches_by_name() {
        let mut arena = DescriptorArena::new();
        let person_a = branch(&mut arena, "Person", &["name"]);
        let address_a = branch(&mut arena, "Address", &["street"]);
        let address_b = branch(&mut arena, "address", &["zip"]);
        let person_b = branch(&mut arena, "PERSON", &["age"]);

        let groups = group_families(
            &arena,
            &[vec![person_a, address_a], vec![address_b, person_b]],
            GroupingPolicy::ShapeAligned,
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members, vec![person_a, person_b]);
        assert_eq!(groups[1].members, vec![address_a, address_b]);
    }

    #[test]
    fn test_shape_alignment_matches_by_property_overlap() {
        let mut arena = DescriptorArena::new();
        let left = branch(&mut arena, "PersonV1", &["name", "age", "email"]);
        let right = branch(&mut arena, "PersonRecord", &["name", "age"]);

        let groups = group_families(
            &arena,
            &[vec![left], vec![right]],
            GroupingPolicy::ShapeAligned,
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members, vec![left, right]);
    }

    #[test]
    fn test_shape_alignment_keeps_unrelated_records_apart() {
        let mut arena = DescriptorArena::new();
        let left = branch(&mut arena, "Person", &["name", "age"]);
        let right = branch(&mut arena, "Invoice", &["total", "currency"]);

        let groups = group_families(
            &arena,
            &[vec![left], vec![right]],
            GroupingPolicy::ShapeAligned,
        );
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_one_group_absorbs_at_most_one_member_per_family() {
        let mut arena = DescriptorArena::new();
        let target = branch(&mut arena, "Person", &["name", "age"]);
        let first = branch(&mut arena, "PersonA", &["name", "age"]);
        let second = branch(&mut arena, "PersonB", &["name", "age"]);

        let groups = group_families(
            &arena,
            &[vec![target], vec![first, second]],
            GroupingPolicy::ShapeAligned,
        );
        // Only one of the two candidates may join the existing group.
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members.len(), 2);
        assert_eq!(groups[1].members, vec![second]);
    }
}
