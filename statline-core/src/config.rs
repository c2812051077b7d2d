//! Pipeline configuration, loadable from TOML.
//!
//! Every section has serde defaults so a config file only needs to name
//! what it overrides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::domain::EntityKind;
use crate::fetch::rate_limit::BucketSpec;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub rate_limits: RateLimitConfig,
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
    pub identity: IdentityConfig,
    pub validation: ValidationConfig,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Token bucket settings: per-source overrides, a shared bucket for
/// unclassified sources, and a global cross-source cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub global: BucketSpec,
    pub unclassified: BucketSpec,
    pub per_source: BTreeMap<String, BucketSpec>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global: BucketSpec::new(8.0, 4.0),
            unclassified: BucketSpec::new(1.0, 0.5),
            per_source: BTreeMap::new(),
        }
    }
}

/// Cache TTLs per entity kind, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    pub player_secs: u64,
    pub team_secs: u64,
    pub game_secs: u64,
    pub boxscore_secs: u64,
    pub roster_secs: u64,
    pub event_secs: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            player_secs: 86_400,
            team_secs: 86_400,
            game_secs: 21_600,
            boxscore_secs: 21_600,
            roster_secs: 86_400,
            event_secs: 43_200,
        }
    }
}

impl TtlConfig {
    pub fn for_kind(&self, kind: EntityKind) -> Duration {
        let secs = match kind {
            EntityKind::Player => self.player_secs,
            EntityKind::Team => self.team_secs,
            EntityKind::Game => self.game_secs,
            EntityKind::BoxScore => self.boxscore_secs,
            EntityKind::Roster => self.roster_secs,
            EntityKind::Event => self.event_secs,
        };
        Duration::from_secs(secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub contention_retries: u32,
    pub contention_base_delay_ms: u64,
    pub ttl: TtlConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            contention_retries: 3,
            contention_base_delay_ms: 25,
            ttl: TtlConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
    /// Ceiling on simultaneous in-flight requests per target domain,
    /// independent of the rate limiter.
    pub max_per_domain: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            timeout_secs: 30,
            max_per_domain: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Minimum similarity for a fuzzy identity merge. Conservative by
    /// default: precision over recall.
    pub similarity_threshold: f64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Upper bound on a plausible single-game team or player score.
    pub max_plausible_score: i64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_plausible_score: 250,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roundtrips_through_toml() {
        let config = PipelineConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let back = PipelineConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn partial_override_keeps_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
[identity]
similarity_threshold = 0.92

[rate_limits.per_source.scorefeed]
capacity = 20.0
refill_rate = 2.0
"#,
        )
        .unwrap();

        assert_eq!(config.identity.similarity_threshold, 0.92);
        assert_eq!(config.fetch.max_retries, 3);
        assert_eq!(
            config.rate_limits.per_source.get("scorefeed"),
            Some(&BucketSpec::new(20.0, 2.0))
        );
    }

    #[test]
    fn ttl_lookup_by_kind() {
        let ttl = TtlConfig::default();
        assert_eq!(
            ttl.for_kind(EntityKind::Game),
            Duration::from_secs(21_600)
        );
        assert_eq!(
            ttl.for_kind(EntityKind::Player),
            Duration::from_secs(86_400)
        );
    }

    #[test]
    fn empty_config_is_all_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }
}
