//! Canonical fact rows.
//!
//! Facts carry foreign keys to dimension uids plus mandatory lineage
//! (source uid, source URL, fetch timestamp). Rows are immutable once
//! written; a conflicting later observation becomes an append-only
//! `CorrectionRow` rather than an in-place edit.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::ids::Uid;

/// Lineage metadata present on every fact row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lineage {
    pub source_uid: Uid,
    pub source_url: String,
    pub fetched_at: NaiveDateTime,
}

impl Lineage {
    /// True when every mandatory field is populated.
    pub fn is_complete(&self) -> bool {
        !self.source_uid.as_str().is_empty() && !self.source_url.is_empty()
    }
}

/// One game between two teams under a competition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRow {
    pub uid: Uid,
    pub competition_uid: Uid,
    pub date: NaiveDate,
    pub home_team_uid: Uid,
    pub away_team_uid: Uid,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    /// Elimination round, 1 = first round. Absent for pool/league play.
    pub round: Option<u32>,
    /// Winner as claimed by the source, when it claims one. Validation
    /// cross-checks this against the scores.
    pub claimed_winner_uid: Option<Uid>,
    pub lineage: Lineage,
}

impl GameRow {
    /// Winner by score, if both scores are present and unequal.
    pub fn score_winner(&self) -> Option<&Uid> {
        match (self.home_score, self.away_score) {
            (Some(h), Some(a)) if h > a => Some(&self.home_team_uid),
            (Some(h), Some(a)) if a > h => Some(&self.away_team_uid),
            _ => None,
        }
    }
}

/// One player's stat line in one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxScoreRow {
    pub uid: Uid,
    pub game_uid: Uid,
    pub team_uid: Uid,
    pub player_uid: Uid,
    pub points: Option<i64>,
    pub rebounds: Option<i64>,
    pub assists: Option<i64>,
    pub lineage: Lineage,
}

/// One player's membership on one team in one season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterRow {
    pub uid: Uid,
    pub team_uid: Uid,
    pub player_uid: Uid,
    pub season: u16,
    pub jersey: Option<String>,
    pub lineage: Lineage,
}

/// A discrete occurrence attached to a competition (bracket release,
/// forfeit, schedule change).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub uid: Uid,
    pub competition_uid: Uid,
    pub date: NaiveDate,
    pub kind: String,
    pub detail: String,
    pub lineage: Lineage,
}

/// Append-only correction: a later observation conflicted with an existing
/// fact row. The original row is kept; this records what the conflicting
/// source claimed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRow {
    pub uid: Uid,
    pub corrects_uid: Uid,
    pub field: String,
    pub kept_value: String,
    pub conflicting_value: String,
    pub lineage: Lineage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn lineage() -> Lineage {
        Lineage {
            source_uid: Uid::of("source", &[("key", "scorefeed")]),
            source_url: "https://scorefeed.example/g/1".into(),
            fetched_at: NaiveDate::from_ymd_opt(2024, 7, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        }
    }

    fn game(home: i64, away: i64) -> GameRow {
        GameRow {
            uid: Uid::of("game", &[("n", "1")]),
            competition_uid: Uid::of("competition", &[("n", "c")]),
            date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            home_team_uid: Uid::of("team", &[("n", "h")]),
            away_team_uid: Uid::of("team", &[("n", "a")]),
            home_score: Some(home),
            away_score: Some(away),
            round: None,
            claimed_winner_uid: None,
            lineage: lineage(),
        }
    }

    #[test]
    fn winner_follows_score() {
        let g = game(62, 58);
        assert_eq!(g.score_winner(), Some(&g.home_team_uid));
        let g = game(58, 62);
        assert_eq!(g.score_winner(), Some(&g.away_team_uid));
        let g = game(60, 60);
        assert_eq!(g.score_winner(), None);
    }

    #[test]
    fn lineage_completeness() {
        let mut l = lineage();
        assert!(l.is_complete());
        l.source_url.clear();
        assert!(!l.is_complete());
    }
}
