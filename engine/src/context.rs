//! Merge configuration: raw rules compiled into a validated context.
//!
//! [`MergeConfig`] is the serializable surface (pattern strings, policy
//! enums); [`MergeConfig::compile`] turns it into [`MergeOptions`] with
//! compiled, anchored regexes, failing fast on invalid or duplicate rules
//! before any merge work begins. The options object is the explicit
//! context threaded through a merge run — there is no ambient global
//! state, and two runs never share one.
//!
//! # Examples
//!
//! ```
//! use compound_schema_engine::context::{MergeConfig, PropertyRule};
//!
//! let mut config = MergeConfig::default();
//! config.force_optional.push(PropertyRule {
//!     record: "Person.*".to_string(),
//!     property: "nickname".to_string(),
//! });
//!
//! let options = config.compile().unwrap();
//! assert!(options.forces_optional("PersonV2", "nickname"));
//! assert!(!options.forces_optional("Invoice", "nickname"));
//! ```

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use compound_schema_core::CompoundArena;

use crate::group::GroupingPolicy;

/// What a setter does when the wrapped singular lacks the property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSetterPolicy {
    /// Silently do nothing.
    #[default]
    Ignore,
    /// Raise an unsupported-setter error.
    Error,
}

/// How a compound is named from its contributing singulars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// The first contributing singular's name.
    #[default]
    FirstSingular,
    /// The longest common suffix of all contributing names, falling back
    /// to the first name when the suffix is degenerate.
    CommonSuffix,
}

/// One record/property pattern pair; both patterns are anchored regexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRule {
    /// Pattern over record type names.
    pub record: String,
    /// Pattern over property names.
    pub property: String,
}

/// Raw, serializable merge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Alignment policy for families and sub-type groups.
    #[serde(default)]
    pub grouping: GroupingPolicy,
    /// Structural overrides: matched SINGLE properties merge as OPTIONAL.
    #[serde(default)]
    pub force_optional: Vec<PropertyRule>,
    /// Exclusions: matched properties are dropped before grouping.
    #[serde(default)]
    pub exclude: Vec<PropertyRule>,
    /// Setter behavior on properties the wrapped singular lacks.
    #[serde(default)]
    pub missing_setter: MissingSetterPolicy,
    /// Compound naming policy.
    #[serde(default)]
    pub naming: NamingPolicy,
}

/// Configuration errors; all fail fast before the merge starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A pattern that does not compile.
    #[error("invalid pattern {pattern:?} in {rule} rule: {source}")]
    InvalidPattern {
        rule: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    /// The same rule listed twice.
    #[error("duplicate {rule} rule: {record:?} / {property:?}")]
    DuplicateRule {
        rule: &'static str,
        record: String,
        property: String,
    },
}

#[derive(Debug, Clone)]
struct CompiledRule {
    record: Regex,
    property: Regex,
}

impl CompiledRule {
    fn matches(&self, record: &str, property: &str) -> bool {
        self.record.is_match(record) && self.property.is_match(property)
    }
}

fn compile_rules(
    rules: &[PropertyRule],
    label: &'static str,
) -> Result<Vec<CompiledRule>, ConfigError> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut compiled = Vec::with_capacity(rules.len());

    for rule in rules {
        if !seen.insert((rule.record.as_str(), rule.property.as_str())) {
            return Err(ConfigError::DuplicateRule {
                rule: label,
                record: rule.record.clone(),
                property: rule.property.clone(),
            });
        }
        let anchor = |pattern: &str| {
            Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
                ConfigError::InvalidPattern {
                    rule: label,
                    pattern: pattern.to_string(),
                    source,
                }
            })
        };
        compiled.push(CompiledRule {
            record: anchor(&rule.record)?,
            property: anchor(&rule.property)?,
        });
    }

    Ok(compiled)
}

/// Compiled merge context: one per merge run, passed by reference.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Alignment policy.
    pub grouping: GroupingPolicy,
    force_optional: Vec<CompiledRule>,
    exclude: Vec<CompiledRule>,
    /// Setter behavior on missing properties, consumed by adapters.
    pub missing_setter: MissingSetterPolicy,
    /// Compound naming policy.
    pub naming: NamingPolicy,
    /// Pre-built compounds reused instead of recomputed; their singular
    /// sets seed the merge memo table.
    pub predefinitions: CompoundArena,
}

impl MergeOptions {
    /// Whether the structural override forces this property optional.
    pub fn forces_optional(&self, record: &str, property: &str) -> bool {
        self.force_optional
            .iter()
            .any(|rule| rule.matches(record, property))
    }

    /// Whether this property is excluded before grouping.
    pub fn excludes(&self, record: &str, property: &str) -> bool {
        self.exclude.iter().any(|rule| rule.matches(record, property))
    }

    /// Seeds the options with pre-built compounds.
    pub fn with_predefinitions(mut self, predefinitions: CompoundArena) -> Self {
        self.predefinitions = predefinitions;
        self
    }
}

impl MergeConfig {
    /// Compiles the raw configuration, failing fast on bad rules.
    pub fn compile(&self) -> Result<MergeOptions, ConfigError> {
        Ok(MergeOptions {
            grouping: self.grouping,
            force_optional: compile_rules(&self.force_optional, "force-optional")?,
            exclude: compile_rules(&self.exclude, "exclude")?,
            missing_setter: self.missing_setter,
            naming: self.naming,
            predefinitions: CompoundArena::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(record: &str, property: &str) -> PropertyRule {
        PropertyRule {
            record: record.to_string(),
            property: property.to_string(),
        }
    }

    #[test]
    fn test_compiled_rules_are_anchored() {
        let mut config = MergeConfig::default();
        config.exclude.push(rule("Person", "age"));
        let options = config.compile().unwrap();

        assert!(options.excludes("Person", "age"));
        assert!(!options.excludes("PersonV2", "age"));
        assert!(!options.excludes("Person", "age_years"));
    }

    #[test]
    fn test_invalid_pattern_fails_fast() {
        let mut config = MergeConfig::default();
        config.force_optional.push(rule("Person(", ".*"));
        assert!(matches!(
            config.compile(),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_duplicate_rule_fails_fast() {
        let mut config = MergeConfig::default();
        config.exclude.push(rule("A", "b"));
        config.exclude.push(rule("A", "b"));
        assert!(matches!(
            config.compile(),
            Err(ConfigError::DuplicateRule { .. })
        ));
    }

    #[test]
    fn test_default_config_round_trips_through_serde() {
        let config = MergeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: MergeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.grouping, config.grouping);
        assert_eq!(back.missing_setter, config.missing_setter);
    }
}
