//! Structured summary of a backfill run.
//!
//! The summary is the user-visible result of a run: it is printed by the
//! CLI, serialized next to the sink as `summary.json`, and drives the
//! gating exit code.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One source/season collection that failed after retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source_key: String,
    pub season: u16,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillSummary {
    pub sources_requested: usize,
    pub season_start: u16,
    pub season_end: u16,
    /// Source batches that contributed at least one record.
    pub batches_built: usize,
    pub records_ingested: usize,
    pub records_skipped: usize,
    pub entities_resolved: usize,
    pub dimension_rows: usize,
    pub fact_rows: usize,
    pub correction_rows: usize,
    pub validation_errors: usize,
    pub validation_warnings: usize,
    pub health_score: f64,
    pub healthy: bool,
    /// Partial failures; the run still completes and reports them.
    pub failures: Vec<SourceFailure>,
}

impl BackfillSummary {
    /// True when gating (if enabled) should allow persistence/exit 0.
    pub fn passes_gate(&self, gate: bool) -> bool {
        !gate || self.healthy
    }
}

impl fmt::Display for BackfillSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Backfill Summary ===")?;
        writeln!(
            f,
            "Seasons:        {} to {}",
            self.season_start, self.season_end
        )?;
        writeln!(
            f,
            "Sources:        {} requested, {} batches built",
            self.sources_requested, self.batches_built
        )?;
        writeln!(
            f,
            "Records:        {} ingested, {} skipped",
            self.records_ingested, self.records_skipped
        )?;
        writeln!(f, "Entities:       {} resolved", self.entities_resolved)?;
        writeln!(
            f,
            "Rows:           {} dimensions, {} facts, {} corrections",
            self.dimension_rows, self.fact_rows, self.correction_rows
        )?;
        writeln!(
            f,
            "Validation:     {} errors, {} warnings",
            self.validation_errors, self.validation_warnings
        )?;
        writeln!(
            f,
            "Health:         {:.2} ({})",
            self.health_score,
            if self.healthy { "healthy" } else { "unhealthy" }
        )?;
        for failure in &self.failures {
            writeln!(
                f,
                "PARTIAL: {} season {}: {}",
                failure.source_key, failure.season, failure.error
            )?;
        }
        Ok(())
    }
}
