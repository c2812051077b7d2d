//! Batch validation: invariant checks over assembled tables and a numeric
//! health score.
//!
//! The validator only reports — it never mutates its input. Errors are
//! structural integrity problems (duplicate uids, self-play, implausible
//! numbers, missing lineage) that can gate persistence when the caller
//! opts in; warnings are quality signals that do not block by default.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::config::ValidationConfig;
use crate::domain::Uid;
use crate::identity::AmbiguousMatch;
use crate::schema::{CanonicalTables, HasUid};

/// A batch is healthy when its score is at or above this threshold.
pub const HEALTHY_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub uid: Option<Uid>,
}

/// Validation outcome for one batch of canonical tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Report {
    pub findings: Vec<Finding>,
}

impl Report {
    pub fn error_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .count()
    }

    /// `clamp(1.0 - 0.1 * errors - 0.05 * warnings, 0.0, 1.0)`, computed
    /// in twentieths so boundary cases (like exactly 0.7) compare cleanly.
    pub fn health_score(&self) -> f64 {
        let twentieths = 20i64 - 2 * self.error_count() as i64 - self.warning_count() as i64;
        (twentieths as f64 / 20.0).clamp(0.0, 1.0)
    }

    pub fn is_healthy(&self) -> bool {
        self.health_score() >= HEALTHY_THRESHOLD
    }

    pub fn push_error(&mut self, code: &str, message: String, uid: Option<Uid>) {
        self.findings.push(Finding {
            severity: Severity::Error,
            code: code.to_string(),
            message,
            uid,
        });
    }

    pub fn push_warning(&mut self, code: &str, message: String, uid: Option<Uid>) {
        self.findings.push(Finding {
            severity: Severity::Warning,
            code: code.to_string(),
            message,
            uid,
        });
    }

    /// Fold resolver ambiguity events into the report as warnings.
    pub fn absorb_ambiguities(&mut self, events: &[AmbiguousMatch]) {
        for event in events {
            let listed: Vec<String> = event
                .candidates
                .iter()
                .map(|(uid, score)| format!("{} ({score:.3})", uid.short()))
                .collect();
            self.push_warning(
                "ambiguous_identity",
                format!(
                    "'{}' in scope '{}' matched {} candidates, kept {}: {}",
                    event.name,
                    event.scope,
                    event.candidates.len(),
                    event.chosen.short(),
                    listed.join(", ")
                ),
                Some(event.chosen.clone()),
            );
        }
    }

    /// Fold build-pass parse warnings into the report.
    pub fn absorb_build_warnings(&mut self, warnings: &[String]) {
        for warning in warnings {
            self.push_warning("malformed_record", warning.clone(), None);
        }
    }
}

pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Run every invariant check over the tables and produce a report.
    pub fn validate(&self, tables: &CanonicalTables) -> Report {
        let mut report = Report::default();
        self.check_duplicate_uids(tables, &mut report);
        self.check_self_play(tables, &mut report);
        self.check_numeric_bounds(tables, &mut report);
        self.check_claimed_winners(tables, &mut report);
        self.check_round_structure(tables, &mut report);
        self.check_lineage(tables, &mut report);
        report
    }

    /// (1) No two fact rows share a uid.
    fn check_duplicate_uids(&self, tables: &CanonicalTables, report: &mut Report) {
        fn dupes<T: HasUid>(rows: &[T], table: &str, report: &mut Report) {
            let mut counts: HashMap<&Uid, usize> = HashMap::new();
            for row in rows {
                *counts.entry(row.uid()).or_default() += 1;
            }
            let mut offenders: Vec<(&Uid, usize)> =
                counts.into_iter().filter(|(_, n)| *n > 1).collect();
            offenders.sort();
            for (uid, n) in offenders {
                report.push_error(
                    "duplicate_uid",
                    format!("{table}: uid {} appears {n} times", uid.short()),
                    Some(uid.clone()),
                );
            }
        }
        dupes(&tables.games, "games", report);
        dupes(&tables.box_scores, "box_scores", report);
        dupes(&tables.rosters, "rosters", report);
        dupes(&tables.events, "events", report);
    }

    /// (2) The two team references in a game are never equal.
    fn check_self_play(&self, tables: &CanonicalTables, report: &mut Report) {
        for game in &tables.games {
            if game.home_team_uid == game.away_team_uid {
                report.push_error(
                    "self_play",
                    format!(
                        "game {} on {} lists the same team on both sides",
                        game.uid.short(),
                        game.date
                    ),
                    Some(game.uid.clone()),
                );
            }
        }
    }

    /// (3) Scores and counts are non-negative and plausibly bounded.
    fn check_numeric_bounds(&self, tables: &CanonicalTables, report: &mut Report) {
        let max = self.config.max_plausible_score;
        let mut check = |value: Option<i64>, what: &str, uid: &Uid, report: &mut Report| {
            let Some(v) = value else { return };
            if v < 0 || v > max {
                report.push_error(
                    "score_bounds",
                    format!("{what} {v} out of bounds [0, {max}] on {}", uid.short()),
                    Some(uid.clone()),
                );
            }
        };
        for game in &tables.games {
            check(game.home_score, "home_score", &game.uid, report);
            check(game.away_score, "away_score", &game.uid, report);
        }
        for row in &tables.box_scores {
            check(row.points, "points", &row.uid, report);
            check(row.rebounds, "rebounds", &row.uid, report);
            check(row.assists, "assists", &row.uid, report);
        }
    }

    /// (4) A claimed winner must have the strictly greater score.
    fn check_claimed_winners(&self, tables: &CanonicalTables, report: &mut Report) {
        for game in &tables.games {
            let Some(claimed) = &game.claimed_winner_uid else {
                continue;
            };
            if game.score_winner() != Some(claimed) {
                report.push_error(
                    "winner_loser",
                    format!(
                        "game {}: claimed winner {} does not have the strictly greater score ({:?}-{:?})",
                        game.uid.short(),
                        claimed.short(),
                        game.home_score,
                        game.away_score
                    ),
                    Some(game.uid.clone()),
                );
            }
        }
    }

    /// (5) Elimination structure sanity: per competition, game counts per
    /// round never increase from one round to the next.
    fn check_round_structure(&self, tables: &CanonicalTables, report: &mut Report) {
        let mut per_competition: BTreeMap<&Uid, BTreeMap<u32, usize>> = BTreeMap::new();
        for game in &tables.games {
            if let Some(round) = game.round {
                *per_competition
                    .entry(&game.competition_uid)
                    .or_default()
                    .entry(round)
                    .or_default() += 1;
            }
        }
        for (competition, rounds) in per_competition {
            let mut prev: Option<(u32, usize)> = None;
            for (round, count) in rounds {
                if let Some((prev_round, prev_count)) = prev {
                    if count > prev_count {
                        report.push_warning(
                            "round_structure",
                            format!(
                                "competition {}: round {round} has {count} games, more than round {prev_round}'s {prev_count}",
                                competition.short()
                            ),
                            Some(competition.clone()),
                        );
                    }
                }
                prev = Some((round, count));
            }
        }
    }

    /// (6) Required lineage fields are present on every fact row.
    fn check_lineage(&self, tables: &CanonicalTables, report: &mut Report) {
        fn check_rows<T: HasUid>(
            rows: &[T],
            lineage_of: impl Fn(&T) -> &crate::domain::Lineage,
            table: &str,
            report: &mut Report,
        ) {
            for row in rows {
                if !lineage_of(row).is_complete() {
                    report.push_error(
                        "lineage",
                        format!("{table}: row {} is missing lineage fields", row.uid().short()),
                        Some(row.uid().clone()),
                    );
                }
            }
        }
        check_rows(&tables.games, |g| &g.lineage, "games", report);
        check_rows(&tables.box_scores, |b| &b.lineage, "box_scores", report);
        check_rows(&tables.rosters, |r| &r.lineage, "rosters", report);
        check_rows(&tables.events, |e| &e.lineage, "events", report);
    }
}
