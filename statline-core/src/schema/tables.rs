//! Canonical table set: the unit of one build pass.
//!
//! Tables are append/merge-only and always sorted by uid, so building twice
//! from identical inputs yields byte-identical contents. Concurrent builds
//! for different seasons or sources merge their outputs after the fact;
//! merge-by-uid is commutative.

use serde::{Deserialize, Serialize};

use crate::domain::{
    BoxScoreRow, CompetitionRow, CorrectionRow, EventRow, GameRow, MergeSighting, PlayerRow,
    RosterRow, SourceRow, TeamRow, Uid,
};

/// Anything keyed by a uid.
pub trait HasUid {
    fn uid(&self) -> &Uid;
}

macro_rules! impl_has_uid {
    ($($ty:ty),* $(,)?) => {
        $(impl HasUid for $ty {
            fn uid(&self) -> &Uid {
                &self.uid
            }
        })*
    };
}

impl_has_uid!(
    SourceRow,
    CompetitionRow,
    TeamRow,
    PlayerRow,
    GameRow,
    BoxScoreRow,
    RosterRow,
    EventRow,
    CorrectionRow,
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CanonicalTables {
    pub sources: Vec<SourceRow>,
    pub competitions: Vec<CompetitionRow>,
    pub teams: Vec<TeamRow>,
    pub players: Vec<PlayerRow>,
    pub games: Vec<GameRow>,
    pub box_scores: Vec<BoxScoreRow>,
    pub rosters: Vec<RosterRow>,
    pub events: Vec<EventRow>,
    pub corrections: Vec<CorrectionRow>,
}

impl CanonicalTables {
    pub fn is_empty(&self) -> bool {
        self.dimension_count() == 0 && self.fact_count() == 0
    }

    pub fn dimension_count(&self) -> usize {
        self.sources.len() + self.competitions.len() + self.teams.len() + self.players.len()
    }

    pub fn fact_count(&self) -> usize {
        self.games.len() + self.box_scores.len() + self.rosters.len() + self.events.len()
    }

    /// Restore the sorted-by-uid invariant after bulk edits.
    pub fn sort(&mut self) {
        fn sort_by_uid<T: HasUid>(rows: &mut [T]) {
            rows.sort_by(|a, b| a.uid().cmp(b.uid()));
        }
        sort_by_uid(&mut self.sources);
        sort_by_uid(&mut self.competitions);
        sort_by_uid(&mut self.teams);
        sort_by_uid(&mut self.players);
        sort_by_uid(&mut self.games);
        sort_by_uid(&mut self.box_scores);
        sort_by_uid(&mut self.rosters);
        sort_by_uid(&mut self.events);
        sort_by_uid(&mut self.corrections);
    }

    /// Merge another table set into this one by uid.
    ///
    /// Dimensions merge field-wise (attribute union, seen-at range widens);
    /// facts with an already-present uid resolve to a deterministic winner,
    /// so `a.merge(b)` and `b.merge(a)` produce identical tables.
    pub fn merge(&mut self, other: CanonicalTables) {
        merge_dims(&mut self.sources, other.sources);
        merge_dims(&mut self.competitions, other.competitions);
        merge_dims(&mut self.teams, other.teams);
        merge_dims(&mut self.players, other.players);
        merge_facts(&mut self.games, other.games);
        merge_facts(&mut self.box_scores, other.box_scores);
        merge_facts(&mut self.rosters, other.rosters);
        merge_facts(&mut self.events, other.events);
        merge_facts(&mut self.corrections, other.corrections);
        self.sort();
    }

    /// Content hash of the whole table set; stable across rebuilds from
    /// identical inputs.
    pub fn content_hash(&self) -> String {
        let json = serde_json::to_string(self).expect("canonical tables must serialize");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

fn merge_dims<T: HasUid + MergeSighting>(dst: &mut Vec<T>, src: Vec<T>) {
    for row in src {
        match dst.iter_mut().find(|r| r.uid() == row.uid()) {
            Some(existing) => existing.merge_sighting(&row),
            None => dst.push(row),
        }
    }
}

// Facts with the same uid should carry identical content; when they do
// not, the lexicographically-smaller serialization wins on both sides of
// the merge, which keeps the operation commutative.
fn merge_facts<T: HasUid + Serialize + Clone>(dst: &mut Vec<T>, src: Vec<T>) {
    for row in src {
        match dst.iter_mut().find(|r| r.uid() == row.uid()) {
            Some(existing) => {
                let existing_json =
                    serde_json::to_string(existing).expect("fact rows must serialize");
                let incoming_json = serde_json::to_string(&row).expect("fact rows must serialize");
                if incoming_json < existing_json {
                    *existing = row;
                }
            }
            None => dst.push(row),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Gender, Level, Lineage};
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn at(day: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn team(name: &str, organizer: &str, day: u32) -> TeamRow {
        TeamRow {
            uid: Uid::of("team", &[("name", name), ("organizer", organizer)]),
            name: name.to_string(),
            organizer: Some(organizer.to_string()),
            school: None,
            gender: Gender::Unknown,
            level: Level::Unknown,
            aliases: BTreeSet::new(),
            first_seen_at: at(day),
            last_seen_at: at(day),
        }
    }

    fn game(n: u32, home_score: i64) -> GameRow {
        GameRow {
            uid: Uid::of("game", &[("n", &n.to_string())]),
            competition_uid: Uid::of("competition", &[("n", "c")]),
            date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            home_team_uid: Uid::of("team", &[("n", "h")]),
            away_team_uid: Uid::of("team", &[("n", "a")]),
            home_score: Some(home_score),
            away_score: Some(50),
            round: None,
            claimed_winner_uid: None,
            lineage: Lineage {
                source_uid: Uid::of("source", &[("key", "s")]),
                source_url: "https://s/g".into(),
                fetched_at: at(1),
            },
        }
    }

    fn tables(teams: Vec<TeamRow>, games: Vec<GameRow>) -> CanonicalTables {
        let mut t = CanonicalTables {
            teams,
            games,
            ..Default::default()
        };
        t.sort();
        t
    }

    #[test]
    fn merge_is_commutative() {
        let a = tables(
            vec![team("takeover", "hoopfest", 1)],
            vec![game(1, 60), game(2, 70)],
        );
        let b = tables(
            vec![team("takeover", "hoopfest", 9), team("elite", "hoopfest", 2)],
            vec![game(2, 71), game(3, 80)],
        );

        let mut ab = a.clone();
        ab.merge(b.clone());
        let mut ba = b;
        ba.merge(a);

        assert_eq!(ab, ba);
        assert_eq!(ab.teams.len(), 2);
        assert_eq!(ab.games.len(), 3);
    }

    #[test]
    fn merge_widens_dimension_seen_range() {
        let mut a = tables(vec![team("takeover", "hoopfest", 5)], vec![]);
        let b = tables(vec![team("takeover", "hoopfest", 2)], vec![]);
        a.merge(b);

        assert_eq!(a.teams.len(), 1);
        assert_eq!(a.teams[0].first_seen_at, at(2));
        assert_eq!(a.teams[0].last_seen_at, at(5));
    }

    #[test]
    fn merge_same_content_is_noop() {
        let a = tables(vec![team("takeover", "hoopfest", 1)], vec![game(1, 60)]);
        let mut merged = a.clone();
        merged.merge(a.clone());
        assert_eq!(merged, a);
    }

    #[test]
    fn content_hash_is_stable() {
        let a = tables(vec![team("takeover", "hoopfest", 1)], vec![game(1, 60)]);
        let b = tables(vec![team("takeover", "hoopfest", 1)], vec![game(1, 60)]);
        assert_eq!(a.content_hash(), b.content_hash());

        let c = tables(vec![team("takeover", "hoopfest", 1)], vec![game(1, 61)]);
        assert_ne!(a.content_hash(), c.content_hash());
    }
}
