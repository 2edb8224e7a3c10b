//! Enumeration unification.
//!
//! Builds a [`UnifiedEnum`] as the ordered union of several enumerated
//! types: constants are normalized to a canonical display form and
//! deduplicated across sources, while each unified constant keeps the
//! original literal per source enumeration so values map both ways.
//!
//! # Examples
//!
//! ```
//! use compound_schema_core::EnumType;
//! use compound_schema_engine::enums::unify_enums;
//!
//! let a = EnumType::new("ColorA", ["darkRed", "blue"]);
//! let b = EnumType::new("ColorB", ["DARK_RED", "GREEN"]);
//!
//! let unified = unify_enums([&a, &b]).unwrap();
//! let displays: Vec<&str> = unified.constants.iter().map(|c| c.display.as_str()).collect();
//! assert_eq!(displays, vec!["DARK_RED", "BLUE", "GREEN"]);
//!
//! // Both originals map onto the same unified constant.
//! assert_eq!(unified.wrap("ColorA", "darkRed").unwrap().display, "DARK_RED");
//! assert_eq!(unified.wrap("ColorB", "DARK_RED").unwrap().display, "DARK_RED");
//! ```

use indexmap::IndexMap;

use compound_schema_core::{
    normalize_constant_name, EnumError, EnumType, UnifiedConstant, UnifiedEnum,
};

/// Unifies enumerated types into the ordered union of their constants.
///
/// Constants are taken in contribution order: every constant of the first
/// enumeration, then any new constants of the second, and so on. Two
/// constants of the *same* source that normalize to the same display form
/// are rejected as [`EnumError::AmbiguousConstant`], since the wrap
/// mapping could no longer be total and distinct.
pub fn unify_enums<'a>(
    inputs: impl IntoIterator<Item = &'a EnumType>,
) -> Result<UnifiedEnum, EnumError> {
    let mut name = String::new();
    let mut sources: Vec<String> = Vec::new();
    let mut constants: Vec<UnifiedConstant> = Vec::new();

    for input in inputs {
        if name.is_empty() {
            name = input.name.clone();
        }
        if !sources.contains(&input.name) {
            sources.push(input.name.clone());
        }

        for literal in &input.constants {
            let display = normalize_constant_name(literal);
            match constants.iter_mut().find(|c| c.display == display) {
                Some(existing) => match existing.literals.get(&input.name) {
                    Some(previous) if previous != literal => {
                        return Err(EnumError::AmbiguousConstant {
                            enumeration: input.name.clone(),
                            first: previous.clone(),
                            second: literal.clone(),
                            display,
                        });
                    }
                    Some(_) => {}
                    None => {
                        existing.literals.insert(input.name.clone(), literal.clone());
                    }
                },
                None => {
                    constants.push(UnifiedConstant {
                        display,
                        literals: IndexMap::from([(input.name.clone(), literal.clone())]),
                    });
                }
            }
        }
    }

    Ok(UnifiedEnum {
        name,
        sources,
        constants,
    })
}
