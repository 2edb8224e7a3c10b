//! Cardinality lattice for property multiplicity.
//!
//! Every property of a record descriptor declares how many values it may
//! hold. When several descriptors are merged, the per-variant declarations
//! are combined through [`Cardinality::join`], a commutative, associative
//! operation with [`Cardinality::List`] as the absorbing top element.
//!
//! # Examples
//!
//! ```
//! use compound_schema_core::Cardinality;
//!
//! // A property that one variant declares and another lacks is optional.
//! assert_eq!(
//!     Cardinality::Single.join(Cardinality::Missing),
//!     Cardinality::Optional,
//! );
//!
//! // A list declaration absorbs everything else.
//! assert_eq!(
//!     Cardinality::Optional.join(Cardinality::List),
//!     Cardinality::List,
//! );
//! ```

use serde::{Deserialize, Serialize};

/// How many values a property may hold, for one variant or for a merge.
///
/// The four values form a join-semilattice: `List` absorbs everything,
/// `Optional` absorbs every present value below it, and `Missing` joined
/// with any present value yields `Optional` (a property some variants lack
/// can only be read optionally). A property missing from *every* variant
/// joins to `Missing` and is dropped from the merged schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// The property is not declared by this variant.
    Missing,
    /// Exactly one value.
    Single,
    /// Zero or one value.
    Optional,
    /// Zero or more values.
    List,
}

impl Cardinality {
    /// Joins two cardinalities into the loosest one required to hold both.
    ///
    /// # Examples
    ///
    /// ```
    /// use compound_schema_core::Cardinality::*;
    ///
    /// assert_eq!(Single.join(Single), Single);
    /// assert_eq!(Single.join(Optional), Optional);
    /// assert_eq!(Missing.join(Missing), Missing);
    /// assert_eq!(List.join(Missing), List);
    /// ```
    pub fn join(self, other: Self) -> Self {
        use Cardinality::*;
        match (self, other) {
            (List, _) | (_, List) => List,
            (Missing, Missing) => Missing,
            (Missing, _) | (_, Missing) => Optional,
            (Optional, _) | (_, Optional) => Optional,
            (Single, Single) => Single,
        }
    }

    /// Joins every cardinality in `iter`; `Missing` if the iterator is empty.
    pub fn join_all(iter: impl IntoIterator<Item = Cardinality>) -> Self {
        iter.into_iter()
            .reduce(Self::join)
            .unwrap_or(Cardinality::Missing)
    }

    /// Whether this variant declares the property at all.
    pub fn is_present(self) -> bool {
        !matches!(self, Cardinality::Missing)
    }

    /// Whether the merged accessor surface is list-valued.
    pub fn is_list(self) -> bool {
        matches!(self, Cardinality::List)
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Single => write!(f, "single"),
            Self::Optional => write!(f, "optional"),
            Self::List => write!(f, "list"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Cardinality; 4] = [
        Cardinality::Missing,
        Cardinality::Single,
        Cardinality::Optional,
        Cardinality::List,
    ];

    #[test]
    fn test_join_is_commutative() {
        for a in ALL {
            for b in ALL {
                assert_eq!(a.join(b), b.join(a), "join({a}, {b})");
            }
        }
    }

    #[test]
    fn test_join_is_associative_over_all_triples() {
        for a in ALL {
            for b in ALL {
                for c in ALL {
                    assert_eq!(
                        a.join(b).join(c),
                        a.join(b.join(c)),
                        "join({a}, {b}, {c})"
                    );
                }
            }
        }
    }

    #[test]
    fn test_join_is_idempotent_on_present_values() {
        for a in ALL {
            assert_eq!(a.join(a), a);
        }
    }

    #[test]
    fn test_list_absorbs_everything() {
        for a in ALL {
            assert_eq!(a.join(Cardinality::List), Cardinality::List);
        }
    }

    #[test]
    fn test_missing_promotes_present_values_to_optional() {
        assert_eq!(
            Cardinality::Single.join(Cardinality::Missing),
            Cardinality::Optional
        );
        assert_eq!(
            Cardinality::Optional.join(Cardinality::Missing),
            Cardinality::Optional
        );
    }

    #[test]
    fn test_three_way_merges_never_demote_below_optional() {
        // Any triple containing Missing alongside a present value must come
        // out Optional or List, regardless of evaluation order.
        for a in ALL {
            for b in ALL {
                let joined = Cardinality::join_all([a, b, Cardinality::Missing]);
                if a.is_present() || b.is_present() {
                    assert!(
                        matches!(joined, Cardinality::Optional | Cardinality::List),
                        "join_all({a}, {b}, missing) = {joined}"
                    );
                } else {
                    assert_eq!(joined, Cardinality::Missing);
                }
            }
        }
    }

    #[test]
    fn test_join_all_of_empty_iterator_is_missing() {
        assert_eq!(Cardinality::join_all([]), Cardinality::Missing);
    }
}
