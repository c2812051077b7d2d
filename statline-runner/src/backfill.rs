//! Backfill orchestration: collect every requested source over a season
//! range with a bounded worker pool, assemble one canonical batch, and
//! validate it.
//!
//! A failing source marks its contribution as partial and the run keeps
//! going; the run itself only fails on setup problems (unknown source,
//! pool construction).

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{info, warn};

use statline_core::adapter::SourceAdapter;
use statline_core::domain::RawRecord;
use statline_core::schema::{CanonicalTables, SchemaBuilder};
use statline_core::validate::Report;
use statline_core::PipelineContext;

use crate::adapters::create_adapter;
use crate::summary::{BackfillSummary, SourceFailure};

#[derive(Debug, Clone)]
pub struct BackfillOptions {
    pub season_start: u16,
    pub season_end: u16,
    pub max_concurrency: usize,
    /// When set, an unhealthy batch makes the run report gate failure.
    pub gate: bool,
}

/// Everything a backfill run produces: the batch, its validation report,
/// and the user-facing summary.
#[derive(Debug)]
pub struct BackfillRun {
    pub tables: CanonicalTables,
    pub report: Report,
    pub summary: BackfillSummary,
}

pub fn run_backfill(
    ctx: &PipelineContext,
    source_keys: &[String],
    opts: &BackfillOptions,
) -> Result<BackfillRun> {
    let adapters: Vec<Box<dyn SourceAdapter>> = source_keys
        .iter()
        .map(|key| create_adapter(key))
        .collect::<Result<_, _>>()
        .context("unknown source key")?;

    let seasons: Vec<u16> = (opts.season_start..=opts.season_end).collect();
    let tasks: Vec<(&dyn SourceAdapter, u16)> = adapters
        .iter()
        .flat_map(|adapter| seasons.iter().map(move |&season| (adapter.as_ref(), season)))
        .collect();

    info!(
        sources = adapters.len(),
        seasons = seasons.len(),
        workers = opts.max_concurrency,
        "starting backfill"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.max_concurrency.max(1))
        .build()
        .context("failed to build worker pool")?;

    // Collection preserves task order, so batch contents are deterministic
    // regardless of worker scheduling.
    let collected: Vec<(&str, u16, Result<Vec<RawRecord>, statline_core::fetch::FetchError>)> =
        pool.install(|| {
            tasks
                .par_iter()
                .map(|&(adapter, season)| {
                    let result = adapter.collect(&ctx.scheduler, season);
                    (adapter.source_key(), season, result)
                })
                .collect()
        });

    let mut batches: BTreeMap<String, Vec<RawRecord>> = BTreeMap::new();
    let mut failures: Vec<SourceFailure> = Vec::new();
    for (source_key, season, result) in collected {
        match result {
            Ok(records) => {
                if !records.is_empty() {
                    batches
                        .entry(source_key.to_string())
                        .or_default()
                        .extend(records);
                }
            }
            Err(error) => {
                warn!(source = source_key, season, %error, "source contribution is partial");
                failures.push(SourceFailure {
                    source_key: source_key.to_string(),
                    season,
                    error: error.to_string(),
                });
            }
        }
    }

    let builder = SchemaBuilder::new(&ctx.resolver);
    let output = builder.build(&batches);

    let mut report = ctx.validator().validate(&output.tables);
    report.absorb_ambiguities(&ctx.resolver.drain_events());
    report.absorb_build_warnings(&output.warnings);

    let summary = BackfillSummary {
        sources_requested: source_keys.len(),
        season_start: opts.season_start,
        season_end: opts.season_end,
        batches_built: batches.len(),
        records_ingested: output.records_seen,
        records_skipped: output.records_skipped,
        entities_resolved: ctx.resolver.entity_count(),
        dimension_rows: output.tables.dimension_count(),
        fact_rows: output.tables.fact_count(),
        correction_rows: output.tables.corrections.len(),
        validation_errors: report.error_count(),
        validation_warnings: report.warning_count(),
        health_score: report.health_score(),
        healthy: report.is_healthy(),
        failures,
    };

    info!(
        facts = summary.fact_rows,
        errors = summary.validation_errors,
        warnings = summary.validation_warnings,
        health = summary.health_score,
        "backfill complete"
    );

    Ok(BackfillRun {
        tables: output.tables,
        report,
        summary,
    })
}
