//! Persistence sink: upsert-by-uid store plus columnar export.
//!
//! The store of record is `tables.json` (merged canonical tables) with a
//! `manifest.json` sidecar (schema version, content hash, row counts).
//! Upserts are idempotent — same uid + same content is a no-op — and
//! writes are atomic (write to .tmp, rename into place). `export` emits
//! one parquet file per table for downstream analytics tooling, plus a
//! flat games.csv.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use statline_core::domain::{
    BoxScoreRow, CompetitionRow, GameRow, PlayerRow, RosterRow, TeamRow, Uid,
};
use statline_core::schema::CanonicalTables;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("csv error: {0}")]
    Csv(String),

    #[error("no persisted tables in {0} — run `backfill` first")]
    NoData(String),

    #[error("unsupported schema version {found} (max supported: {supported})")]
    SchemaVersion { found: u32, supported: u32 },
}

/// Manifest sidecar written next to the tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkManifest {
    pub schema_version: u32,
    pub content_hash: String,
    pub dimension_rows: usize,
    pub fact_rows: usize,
    pub correction_rows: usize,
    pub written_at: chrono::NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertStats {
    /// False when the incoming batch changed nothing (pure no-op).
    pub changed: bool,
    pub dimension_rows: usize,
    pub fact_rows: usize,
}

pub struct ParquetSink {
    dir: PathBuf,
}

impl ParquetSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn tables_path(&self) -> PathBuf {
        self.dir.join("tables.json")
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join("manifest.json")
    }

    /// Load the persisted table set, if any.
    pub fn load(&self) -> Result<Option<CanonicalTables>, SinkError> {
        if let Some(manifest) = self.manifest()? {
            if manifest.schema_version > SCHEMA_VERSION {
                return Err(SinkError::SchemaVersion {
                    found: manifest.schema_version,
                    supported: SCHEMA_VERSION,
                });
            }
        }
        let path = self.tables_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn manifest(&self) -> Result<Option<SinkManifest>, SinkError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Merge a batch into the store by uid. Re-upserting identical content
    /// changes nothing and skips the write entirely.
    pub fn upsert(&self, incoming: &CanonicalTables) -> Result<UpsertStats, SinkError> {
        fs::create_dir_all(&self.dir)?;
        let existing = self.load()?;

        let mut merged = incoming.clone();
        merged.sort();
        if let Some(prior) = &existing {
            let batch = merged;
            merged = prior.clone();
            merged.merge(batch);
        }

        let changed = existing.as_ref() != Some(&merged);
        if changed {
            write_atomic(
                &self.tables_path(),
                serde_json::to_string(&merged)?.as_bytes(),
            )?;
            let manifest = SinkManifest {
                schema_version: SCHEMA_VERSION,
                content_hash: merged.content_hash(),
                dimension_rows: merged.dimension_count(),
                fact_rows: merged.fact_count(),
                correction_rows: merged.corrections.len(),
                written_at: chrono::Local::now().naive_local(),
            };
            write_atomic(
                &self.manifest_path(),
                serde_json::to_string_pretty(&manifest)?.as_bytes(),
            )?;
            info!(
                facts = manifest.fact_rows,
                hash = %manifest.content_hash,
                "sink updated"
            );
        }

        Ok(UpsertStats {
            changed,
            dimension_rows: merged.dimension_count(),
            fact_rows: merged.fact_count(),
        })
    }

    /// Export the persisted tables as parquet (one file per table) plus a
    /// flat games.csv. Returns the written paths.
    pub fn export(&self) -> Result<Vec<PathBuf>, SinkError> {
        let tables = self
            .load()?
            .ok_or_else(|| SinkError::NoData(self.dir.display().to_string()))?;

        let mut written = Vec::new();
        let frames: Vec<(&str, DataFrame)> = vec![
            ("games", games_frame(&tables.games)?),
            ("box_scores", box_scores_frame(&tables.box_scores)?),
            ("players", players_frame(&tables.players)?),
            ("teams", teams_frame(&tables.teams)?),
            ("rosters", rosters_frame(&tables.rosters)?),
            ("competitions", competitions_frame(&tables.competitions)?),
        ];
        for (name, df) in frames {
            let path = self.dir.join(format!("{name}.parquet"));
            write_parquet(&df, &path)?;
            written.push(path);
        }

        let csv_path = self.dir.join("games.csv");
        write_atomic(&csv_path, games_csv(&tables.games)?.as_bytes())?;
        written.push(csv_path);

        Ok(written)
    }
}

/// Write to `.tmp`, then rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SinkError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        SinkError::Io(e)
    })?;
    Ok(())
}

// ── DataFrame conversion ────────────────────────────────────────────

fn uid_strings<'a>(uids: impl Iterator<Item = &'a Uid>) -> Vec<String> {
    uids.map(|u| u.as_str().to_string()).collect()
}

fn date_column(name: &str, dates: Vec<i32>) -> Result<Column, SinkError> {
    Column::new(name.into(), dates)
        .cast(&DataType::Date)
        .map_err(|e| SinkError::Parquet(format!("{name} cast: {e}")))
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32
}

fn frame(columns: Vec<Column>) -> Result<DataFrame, SinkError> {
    DataFrame::new(columns).map_err(|e| SinkError::Parquet(format!("dataframe creation: {e}")))
}

fn games_frame(rows: &[GameRow]) -> Result<DataFrame, SinkError> {
    let dates: Vec<i32> = rows.iter().map(|r| days_since_epoch(r.date)).collect();
    frame(vec![
        Column::new("uid".into(), uid_strings(rows.iter().map(|r| &r.uid))),
        date_column("date", dates)?,
        Column::new(
            "competition_uid".into(),
            uid_strings(rows.iter().map(|r| &r.competition_uid)),
        ),
        Column::new(
            "home_team_uid".into(),
            uid_strings(rows.iter().map(|r| &r.home_team_uid)),
        ),
        Column::new(
            "away_team_uid".into(),
            uid_strings(rows.iter().map(|r| &r.away_team_uid)),
        ),
        Column::new(
            "home_score".into(),
            rows.iter().map(|r| r.home_score).collect::<Vec<_>>(),
        ),
        Column::new(
            "away_score".into(),
            rows.iter().map(|r| r.away_score).collect::<Vec<_>>(),
        ),
        Column::new(
            "round".into(),
            rows.iter()
                .map(|r| r.round.map(i64::from))
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "source_uid".into(),
            uid_strings(rows.iter().map(|r| &r.lineage.source_uid)),
        ),
        Column::new(
            "source_url".into(),
            rows.iter()
                .map(|r| r.lineage.source_url.clone())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "fetched_at".into(),
            rows.iter()
                .map(|r| r.lineage.fetched_at.to_string())
                .collect::<Vec<_>>(),
        ),
    ])
}

fn box_scores_frame(rows: &[BoxScoreRow]) -> Result<DataFrame, SinkError> {
    frame(vec![
        Column::new("uid".into(), uid_strings(rows.iter().map(|r| &r.uid))),
        Column::new(
            "game_uid".into(),
            uid_strings(rows.iter().map(|r| &r.game_uid)),
        ),
        Column::new(
            "team_uid".into(),
            uid_strings(rows.iter().map(|r| &r.team_uid)),
        ),
        Column::new(
            "player_uid".into(),
            uid_strings(rows.iter().map(|r| &r.player_uid)),
        ),
        Column::new(
            "points".into(),
            rows.iter().map(|r| r.points).collect::<Vec<_>>(),
        ),
        Column::new(
            "rebounds".into(),
            rows.iter().map(|r| r.rebounds).collect::<Vec<_>>(),
        ),
        Column::new(
            "assists".into(),
            rows.iter().map(|r| r.assists).collect::<Vec<_>>(),
        ),
        Column::new(
            "source_uid".into(),
            uid_strings(rows.iter().map(|r| &r.lineage.source_uid)),
        ),
        Column::new(
            "source_url".into(),
            rows.iter()
                .map(|r| r.lineage.source_url.clone())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "fetched_at".into(),
            rows.iter()
                .map(|r| r.lineage.fetched_at.to_string())
                .collect::<Vec<_>>(),
        ),
    ])
}

fn players_frame(rows: &[PlayerRow]) -> Result<DataFrame, SinkError> {
    frame(vec![
        Column::new("uid".into(), uid_strings(rows.iter().map(|r| &r.uid))),
        Column::new(
            "name".into(),
            rows.iter().map(|r| r.name.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "school".into(),
            rows.iter().map(|r| r.school.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "grad_year".into(),
            rows.iter()
                .map(|r| r.grad_year.map(i64::from))
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "gender".into(),
            rows.iter().map(|r| r.gender.to_string()).collect::<Vec<_>>(),
        ),
        Column::new(
            "aliases".into(),
            rows.iter()
                .map(|r| r.aliases.iter().cloned().collect::<Vec<_>>().join("; "))
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "first_seen_at".into(),
            rows.iter()
                .map(|r| r.first_seen_at.to_string())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "last_seen_at".into(),
            rows.iter()
                .map(|r| r.last_seen_at.to_string())
                .collect::<Vec<_>>(),
        ),
    ])
}

fn teams_frame(rows: &[TeamRow]) -> Result<DataFrame, SinkError> {
    frame(vec![
        Column::new("uid".into(), uid_strings(rows.iter().map(|r| &r.uid))),
        Column::new(
            "name".into(),
            rows.iter().map(|r| r.name.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "organizer".into(),
            rows.iter().map(|r| r.organizer.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "school".into(),
            rows.iter().map(|r| r.school.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "gender".into(),
            rows.iter().map(|r| r.gender.to_string()).collect::<Vec<_>>(),
        ),
        Column::new(
            "level".into(),
            rows.iter().map(|r| r.level.to_string()).collect::<Vec<_>>(),
        ),
        Column::new(
            "aliases".into(),
            rows.iter()
                .map(|r| r.aliases.iter().cloned().collect::<Vec<_>>().join("; "))
                .collect::<Vec<_>>(),
        ),
    ])
}

fn rosters_frame(rows: &[RosterRow]) -> Result<DataFrame, SinkError> {
    frame(vec![
        Column::new("uid".into(), uid_strings(rows.iter().map(|r| &r.uid))),
        Column::new(
            "team_uid".into(),
            uid_strings(rows.iter().map(|r| &r.team_uid)),
        ),
        Column::new(
            "player_uid".into(),
            uid_strings(rows.iter().map(|r| &r.player_uid)),
        ),
        Column::new(
            "season".into(),
            rows.iter().map(|r| i64::from(r.season)).collect::<Vec<_>>(),
        ),
        Column::new(
            "jersey".into(),
            rows.iter().map(|r| r.jersey.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "source_url".into(),
            rows.iter()
                .map(|r| r.lineage.source_url.clone())
                .collect::<Vec<_>>(),
        ),
    ])
}

fn competitions_frame(rows: &[CompetitionRow]) -> Result<DataFrame, SinkError> {
    frame(vec![
        Column::new("uid".into(), uid_strings(rows.iter().map(|r| &r.uid))),
        Column::new(
            "name".into(),
            rows.iter().map(|r| r.name.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "organizer".into(),
            rows.iter().map(|r| r.organizer.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "season".into(),
            rows.iter().map(|r| i64::from(r.season)).collect::<Vec<_>>(),
        ),
        Column::new(
            "gender".into(),
            rows.iter().map(|r| r.gender.to_string()).collect::<Vec<_>>(),
        ),
        Column::new(
            "level".into(),
            rows.iter().map(|r| r.level.to_string()).collect::<Vec<_>>(),
        ),
    ])
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), SinkError> {
    let tmp = path.with_extension("parquet.tmp");
    let file =
        fs::File::create(&tmp).map_err(|e| SinkError::Parquet(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| SinkError::Parquet(format!("write parquet: {e}")))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        SinkError::Parquet(format!("atomic rename: {e}"))
    })?;
    Ok(())
}

fn games_csv(rows: &[GameRow]) -> Result<String, SinkError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "uid",
        "date",
        "home_team_uid",
        "away_team_uid",
        "home_score",
        "away_score",
        "round",
        "source_url",
    ])
    .map_err(|e| SinkError::Csv(e.to_string()))?;

    for row in rows {
        wtr.write_record([
            &row.uid.0,
            &row.date.to_string(),
            &row.home_team_uid.0,
            &row.away_team_uid.0,
            &row.home_score.map_or(String::new(), |s| s.to_string()),
            &row.away_score.map_or(String::new(), |s| s.to_string()),
            &row.round.map_or(String::new(), |r| r.to_string()),
            &row.lineage.source_url,
        ])
        .map_err(|e| SinkError::Csv(e.to_string()))?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| SinkError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| SinkError::Csv(e.to_string()))
}
