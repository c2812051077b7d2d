//! Statline CLI — backfill, cache management, and export commands.
//!
//! Commands:
//! - `backfill` — collect the requested sources over a season range,
//!   validate the batch, and persist it to the warehouse
//! - `cache status` / `cache clear` — inspect or empty the document cache
//! - `export` — emit parquet/CSV from the persisted warehouse
//! - `sources` — list registered source adapters

use anyhow::{bail, Context, Result};
use chrono::Datelike;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use statline_core::config::PipelineConfig;
use statline_core::fetch::ConditionalCache;
use statline_core::PipelineContext;
use statline_runner::{
    create_adapter, known_sources, run_backfill, BackfillOptions, ParquetSink,
};

#[derive(Parser)]
#[command(name = "statline", about = "Statline — sports statistics ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect sources over a season range, validate, and persist.
    Backfill {
        /// Source keys to ingest (see `sources` for the registry).
        #[arg(required = true)]
        sources: Vec<String>,

        /// First season to collect. Defaults to the current year.
        #[arg(long)]
        season_start: Option<u16>,

        /// Last season to collect (inclusive). Defaults to season-start.
        #[arg(long)]
        season_end: Option<u16>,

        /// Maximum concurrent source/season collections.
        #[arg(long, default_value_t = 4)]
        max_concurrency: usize,

        /// Fail (exit non-zero, skip persistence) if the batch health
        /// score falls below the healthy threshold.
        #[arg(long, default_value_t = false)]
        gate: bool,

        /// Path to a TOML pipeline config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Document cache directory. Defaults to ./cache.
        #[arg(long, default_value = "cache")]
        cache_dir: PathBuf,

        /// Warehouse output directory. Defaults to ./warehouse.
        #[arg(long, default_value = "warehouse")]
        out_dir: PathBuf,
    },
    /// Document cache management.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Export the persisted warehouse as parquet and CSV.
    Export {
        /// Warehouse directory. Defaults to ./warehouse.
        #[arg(long, default_value = "warehouse")]
        out_dir: PathBuf,
    },
    /// List registered source adapters.
    Sources,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report entry counts and cache size.
    Status {
        /// Document cache directory. Defaults to ./cache.
        #[arg(long, default_value = "cache")]
        cache_dir: PathBuf,
    },
    /// Remove cached documents.
    Clear {
        /// Document cache directory. Defaults to ./cache.
        #[arg(long, default_value = "cache")]
        cache_dir: PathBuf,

        /// Only drop entries whose TTL has expired.
        #[arg(long, default_value_t = false)]
        expired_only: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Backfill {
            sources,
            season_start,
            season_end,
            max_concurrency,
            gate,
            config,
            cache_dir,
            out_dir,
        } => cmd_backfill(
            sources,
            season_start,
            season_end,
            max_concurrency,
            gate,
            config,
            cache_dir,
            out_dir,
        ),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => cmd_cache_status(&cache_dir),
            CacheAction::Clear {
                cache_dir,
                expired_only,
            } => cmd_cache_clear(&cache_dir, expired_only),
        },
        Commands::Export { out_dir } => cmd_export(&out_dir),
        Commands::Sources => cmd_sources(),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_backfill(
    sources: Vec<String>,
    season_start: Option<u16>,
    season_end: Option<u16>,
    max_concurrency: usize,
    gate: bool,
    config_path: Option<PathBuf>,
    cache_dir: PathBuf,
    out_dir: PathBuf,
) -> Result<()> {
    let config = match config_path {
        Some(path) => PipelineConfig::from_file(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let current_year = chrono::Local::now().year() as u16;
    let season_start = season_start.unwrap_or(current_year);
    let season_end = season_end.unwrap_or(season_start);
    if season_end < season_start {
        bail!("--season-end {season_end} is before --season-start {season_start}");
    }

    std::fs::create_dir_all(&cache_dir)?;
    let ctx = PipelineContext::new(config, &cache_dir.join("cache.redb"))?;

    let opts = BackfillOptions {
        season_start,
        season_end,
        max_concurrency,
        gate,
    };
    let run = run_backfill(&ctx, &sources, &opts)?;

    print!("{}", run.summary);

    let passed = run.summary.passes_gate(gate);
    if passed {
        let sink = ParquetSink::new(&out_dir);
        let stats = sink.upsert(&run.tables)?;
        if stats.changed {
            println!(
                "Warehouse updated: {} dimension rows, {} fact rows",
                stats.dimension_rows, stats.fact_rows
            );
        } else {
            println!("Warehouse unchanged (batch already persisted)");
        }
        std::fs::write(
            out_dir.join("summary.json"),
            serde_json::to_string_pretty(&run.summary)?,
        )?;
    } else {
        println!("Gate failed: batch not persisted");
    }

    ctx.close()?;

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_cache_status(cache_dir: &Path) -> Result<()> {
    let path = cache_dir.join("cache.redb");
    if !path.exists() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }
    let cache = ConditionalCache::open(&path)?;
    let status = cache.status()?;
    println!("Cache: {}", cache_dir.display());
    println!("Entries:   {}", status.entries);
    println!("Expired:   {}", status.expired);
    println!("Size:      {}", format_size(status.total_bytes));
    Ok(())
}

fn cmd_cache_clear(cache_dir: &Path, expired_only: bool) -> Result<()> {
    let path = cache_dir.join("cache.redb");
    if !path.exists() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }
    let cache = ConditionalCache::open(&path)?;
    let removed = if expired_only {
        cache.purge_expired()?
    } else {
        cache.clear()?
    };
    println!("Removed {removed} cache entr{}", if removed == 1 { "y" } else { "ies" });
    Ok(())
}

fn cmd_export(out_dir: &Path) -> Result<()> {
    let sink = ParquetSink::new(out_dir);
    let written = sink.export()?;
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn cmd_sources() -> Result<()> {
    println!("{:<12} {}", "Key", "Name");
    println!("{}", "-".repeat(40));
    for key in known_sources() {
        let adapter = create_adapter(key)?;
        println!("{:<12} {}", key, adapter.display_name());
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
