//! Structured merge reporting.
//!
//! A [`MergeReport`] summarizes one merge run: root compounds, graph
//! counts, and a SHA-256 hash over the canonical JSON of the compound
//! arena. Property order in compounds is first-encounter order and the
//! build is deterministic, so the hash is reproducible across runs over
//! the same input — a cheap way for build pipelines to detect schema
//! drift.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use compound_schema_core::Sort;

use crate::merge::MergeOutcome;

/// Per-run merge report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Report format version (semver string).
    pub version: String,
    /// ISO-8601 timestamp supplied by the caller.
    pub generated_at: String,
    /// Root compound names, in group order.
    pub roots: Vec<String>,
    /// Total compounds in the graph, nested levels included.
    pub compound_count: usize,
    /// Compounds classified as leaves.
    pub leaf_count: usize,
    /// Compounds classified as branches.
    pub branch_count: usize,
    /// Merged properties across all compounds.
    pub property_count: usize,
    /// Synthesized expansions.
    pub expansion_count: usize,
    /// SHA-256 over the canonical JSON of the compound arena.
    pub content_hash: String,
}

/// Builds a report for one merge outcome.
pub fn build_report(
    outcome: &MergeOutcome,
    version: &str,
    generated_at: &str,
) -> Result<MergeReport, serde_json::Error> {
    let bytes = serde_json::to_vec(&outcome.compounds)?;
    let hash = Sha256::digest(&bytes);

    let mut leaf_count = 0;
    let mut branch_count = 0;
    let mut property_count = 0;
    let mut expansion_count = 0;
    for (_, compound) in outcome.compounds.iter() {
        match compound.sort {
            Sort::Leaf => leaf_count += 1,
            Sort::Branch => branch_count += 1,
        }
        property_count += compound.properties.len();
        if compound.expansion.is_some() {
            expansion_count += 1;
        }
    }

    Ok(MergeReport {
        version: version.to_string(),
        generated_at: generated_at.to_string(),
        roots: outcome
            .roots
            .iter()
            .map(|&id| outcome.compounds[id].name.clone())
            .collect(),
        compound_count: outcome.compounds.len(),
        leaf_count,
        branch_count,
        property_count,
        expansion_count,
        content_hash: format!("{hash:x}"),
    })
}
