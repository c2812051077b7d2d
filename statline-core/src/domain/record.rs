//! Raw records — the adapter output boundary.
//!
//! Every source adapter, no matter what it scrapes, emits `RawRecord` values.
//! A record is one observation of one entity from one source, immutable once
//! emitted. `source_url` and `fetched_at` are mandatory lineage fields.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What kind of entity a raw record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Player,
    Team,
    Game,
    BoxScore,
    Roster,
    Event,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Player,
        EntityKind::Team,
        EntityKind::Game,
        EntityKind::BoxScore,
        EntityKind::Roster,
        EntityKind::Event,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Player => "player",
            EntityKind::Team => "team",
            EntityKind::Game => "game",
            EntityKind::BoxScore => "boxscore",
            EntityKind::Roster => "roster",
            EntityKind::Event => "event",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entity observation from one source.
///
/// The payload is a loosely-typed field map; the schema builder is
/// responsible for parsing and normalizing it. `BTreeMap` keeps field order
/// deterministic for hashing and serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub kind: EntityKind,
    pub source_key: String,
    pub source_url: String,
    pub fetched_at: NaiveDateTime,
    pub payload: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new(
        kind: EntityKind,
        source_key: impl Into<String>,
        source_url: impl Into<String>,
        fetched_at: NaiveDateTime,
    ) -> Self {
        Self {
            kind,
            source_key: source_key.into(),
            source_url: source_url.into(),
            fetched_at,
            payload: BTreeMap::new(),
        }
    }

    /// Builder-style payload field insertion.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }
}
