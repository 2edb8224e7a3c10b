//! Structural validation of descriptor arenas and sets.
//!
//! Catches malformed inputs — dangling handles, inconsistent hierarchy
//! links, malformed leaves, degenerate enumerations — before the merge
//! engine runs, so the engine itself can index the arena freely.
//!
//! # Examples
//!
//! ```
//! use compound_schema_core::*;
//!
//! let mut set = DescriptorSet::new("1.0.0", "2026-08-01T00:00:00Z");
//! let person = set.arena.insert(
//!     RecordDescriptor::branch("Person")
//!         .with_property("name", Cardinality::Single, PropertyType::Scalar(ScalarKind::Str)),
//! );
//! set.families.push(Family::new("a", [person]));
//! assert!(validate_set(&set).is_empty());
//!
//! // A family member that points outside the arena is rejected.
//! set.families.push(Family::new("b", [DescriptorId(99)]));
//! assert!(!validate_set(&set).is_empty());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::descriptor::{DescriptorArena, DescriptorId, PropertyType, EXPANSION_SLOT};
use crate::package::DescriptorSet;

/// Descriptor validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Set version string is empty.
    #[error("descriptor set version cannot be empty")]
    EmptySetVersion,
    /// A record has an empty or whitespace-only name.
    #[error("record {0} has an empty name")]
    EmptyRecordName(DescriptorId),
    /// A family has an empty name.
    #[error("family at index {0} has an empty name")]
    EmptyFamilyName(usize),
    /// Two families share a name.
    #[error("duplicate family name: {0}")]
    DuplicateFamily(String),
    /// A handle points outside the arena.
    #[error("record {record:?} references dangling descriptor {id}")]
    DanglingDescriptor { record: String, id: DescriptorId },
    /// A family member points outside the arena.
    #[error("family {family:?} references dangling descriptor {id}")]
    DanglingFamilyMember { family: String, id: DescriptorId },
    /// A family lists the same member twice.
    #[error("family {family:?} lists descriptor {id} twice")]
    DuplicateFamilyMember { family: String, id: DescriptorId },
    /// `child.super_id` and `parent.subs` disagree.
    #[error("hierarchy link between {child:?} and {parent:?} is one-sided")]
    OneSidedLink { child: String, parent: String },
    /// A super chain loops back on itself.
    #[error("super chain starting at {0:?} forms a cycle")]
    SuperCycle(String),
    /// A leaf descriptor without exactly the reserved value slot.
    #[error("leaf record {0:?} must declare exactly the reserved value slot")]
    MalformedLeaf(String),
    /// A leaf whose value slot is itself a branch.
    #[error("leaf record {0:?} declares a branch as its value")]
    BranchValuedLeaf(String),
    /// A branch record using the reserved empty property name.
    #[error("branch record {0:?} uses the reserved empty property name")]
    ReservedSlotOnBranch(String),
    /// An enumerated type with no constants.
    #[error("enumeration {0:?} has no constants")]
    EmptyEnum(String),
    /// An enumerated type listing a constant twice.
    #[error("enumeration {enumeration:?} lists constant {constant:?} twice")]
    DuplicateEnumConstant {
        enumeration: String,
        constant: String,
    },
}

/// Validates a full descriptor set: version, families, then the arena.
pub fn validate_set(set: &DescriptorSet) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if set.version.trim().is_empty() {
        errors.push(ValidationError::EmptySetVersion);
        return errors;
    }

    let mut seen_families: HashSet<&str> = HashSet::new();
    for (index, family) in set.families.iter().enumerate() {
        if family.name.trim().is_empty() {
            errors.push(ValidationError::EmptyFamilyName(index));
            return errors;
        }
        if !seen_families.insert(family.name.as_str()) {
            errors.push(ValidationError::DuplicateFamily(family.name.clone()));
            return errors;
        }

        let mut seen_members: HashSet<DescriptorId> = HashSet::new();
        for &member in &family.members {
            if set.arena.get(member).is_none() {
                errors.push(ValidationError::DanglingFamilyMember {
                    family: family.name.clone(),
                    id: member,
                });
                return errors;
            }
            if !seen_members.insert(member) {
                errors.push(ValidationError::DuplicateFamilyMember {
                    family: family.name.clone(),
                    id: member,
                });
                return errors;
            }
        }
    }

    errors.extend(validate_arena(&set.arena));
    errors
}

/// Validates every descriptor in an arena.
pub fn validate_arena(arena: &DescriptorArena) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (id, record) in arena.iter() {
        if record.name.trim().is_empty() {
            errors.push(ValidationError::EmptyRecordName(id));
            return errors;
        }

        // Leaf shape: exactly the reserved slot, holding a terminal type.
        if record.is_leaf {
            if record.properties.len() != 1 || !record.properties.contains_key(EXPANSION_SLOT) {
                errors.push(ValidationError::MalformedLeaf(record.name.clone()));
                return errors;
            }
            if let Some(slot) = record.properties.get(EXPANSION_SLOT) {
                if matches!(slot.ty, PropertyType::Branch(_)) {
                    errors.push(ValidationError::BranchValuedLeaf(record.name.clone()));
                    return errors;
                }
            }
        } else if record.properties.contains_key(EXPANSION_SLOT) {
            errors.push(ValidationError::ReservedSlotOnBranch(record.name.clone()));
            return errors;
        }

        for property in record.properties.values() {
            match &property.ty {
                PropertyType::Branch(target) => {
                    if arena.get(*target).is_none() {
                        errors.push(ValidationError::DanglingDescriptor {
                            record: record.name.clone(),
                            id: *target,
                        });
                        return errors;
                    }
                }
                PropertyType::Enum(enum_type) => {
                    if enum_type.constants.is_empty() {
                        errors.push(ValidationError::EmptyEnum(enum_type.name.clone()));
                        return errors;
                    }
                    let mut seen: HashSet<&str> = HashSet::new();
                    for constant in &enum_type.constants {
                        if !seen.insert(constant) {
                            errors.push(ValidationError::DuplicateEnumConstant {
                                enumeration: enum_type.name.clone(),
                                constant: constant.clone(),
                            });
                            return errors;
                        }
                    }
                }
                PropertyType::Scalar(_) => {}
            }
        }

        errors.extend(validate_links(arena, id));
        if !errors.is_empty() {
            return errors;
        }
    }

    errors
}

fn validate_links(arena: &DescriptorArena, id: DescriptorId) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let record = &arena[id];

    if let Some(parent) = record.super_id {
        let Some(parent_record) = arena.get(parent) else {
            errors.push(ValidationError::DanglingDescriptor {
                record: record.name.clone(),
                id: parent,
            });
            return errors;
        };
        if !parent_record.subs.contains(&id) {
            errors.push(ValidationError::OneSidedLink {
                child: record.name.clone(),
                parent: parent_record.name.clone(),
            });
            return errors;
        }
    }

    for &sub in &record.subs {
        let Some(sub_record) = arena.get(sub) else {
            errors.push(ValidationError::DanglingDescriptor {
                record: record.name.clone(),
                id: sub,
            });
            return errors;
        };
        if sub_record.super_id != Some(id) {
            errors.push(ValidationError::OneSidedLink {
                child: sub_record.name.clone(),
                parent: record.name.clone(),
            });
            return errors;
        }
    }

    // Walk the super chain with a visited set to reject loops.
    let mut visited = HashSet::from([id]);
    let mut current = record.super_id;
    while let Some(next) = current {
        if !visited.insert(next) {
            errors.push(ValidationError::SuperCycle(record.name.clone()));
            return errors;
        }
        current = arena.get(next).and_then(|r| r.super_id);
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cardinality::Cardinality;
    use crate::descriptor::RecordDescriptor;
    use crate::package::Family;
    use crate::types::{EnumType, ScalarKind};

    fn valid_set() -> DescriptorSet {
        let mut set = DescriptorSet::new("1.0.0", "2026-08-01T00:00:00Z");
        let person = set.arena.insert(
            RecordDescriptor::branch("Person").with_property(
                "name",
                Cardinality::Single,
                PropertyType::Scalar(ScalarKind::Str),
            ),
        );
        set.families.push(Family::new("a", [person]));
        set
    }

    #[test]
    fn test_validate_accepts_valid_set() {
        assert!(validate_set(&valid_set()).is_empty());
    }

    #[test]
    fn test_validate_rejects_empty_version() {
        let mut set = valid_set();
        set.version = "  ".to_string();
        assert_eq!(validate_set(&set), vec![ValidationError::EmptySetVersion]);
    }

    #[test]
    fn test_validate_rejects_duplicate_family_member() {
        let mut set = valid_set();
        let id = set.families[0].members[0];
        set.families[0].members.push(id);
        assert!(matches!(
            validate_set(&set).first(),
            Some(ValidationError::DuplicateFamilyMember { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_malformed_leaf() {
        let mut set = valid_set();
        let mut bad = RecordDescriptor::leaf("Code", PropertyType::Scalar(ScalarKind::I32));
        bad.properties.insert(
            "extra".to_string(),
            crate::descriptor::PropertyDescriptor::new(
                Cardinality::Single,
                PropertyType::Scalar(ScalarKind::Str),
            ),
        );
        set.arena.insert(bad);
        assert!(matches!(
            validate_set(&set).first(),
            Some(ValidationError::MalformedLeaf(_))
        ));
    }

    #[test]
    fn test_validate_rejects_one_sided_hierarchy_link() {
        let mut set = valid_set();
        let base = set.arena.insert(RecordDescriptor::branch("Base"));
        let derived = set.arena.insert(RecordDescriptor::branch("Derived"));
        // Link only one side on purpose.
        set.arena[derived].super_id = Some(base);
        assert!(matches!(
            validate_set(&set).first(),
            Some(ValidationError::OneSidedLink { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_super_cycle() {
        let mut set = valid_set();
        let a = set.arena.insert(RecordDescriptor::branch("A"));
        let b = set.arena.insert(RecordDescriptor::branch("B"));
        set.arena[a].super_id = Some(b);
        set.arena[a].subs.push(b);
        set.arena[b].super_id = Some(a);
        set.arena[b].subs.push(a);
        assert!(matches!(
            validate_set(&set).first(),
            Some(ValidationError::SuperCycle(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_enum_constants() {
        let mut set = valid_set();
        set.arena.insert(RecordDescriptor::leaf(
            "Color",
            PropertyType::Enum(EnumType::new("Color", ["RED", "RED"])),
        ));
        assert!(matches!(
            validate_set(&set).first(),
            Some(ValidationError::DuplicateEnumConstant { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_dangling_branch_target() {
        let mut set = valid_set();
        set.arena.insert(RecordDescriptor::branch("Holder").with_property(
            "child",
            Cardinality::Single,
            PropertyType::Branch(DescriptorId(1000)),
        ));
        assert!(matches!(
            validate_set(&set).first(),
            Some(ValidationError::DanglingDescriptor { .. })
        ));
    }
}
