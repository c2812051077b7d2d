//! Canonical dimension rows.
//!
//! Dimension rows are created the first time an identity resolves, updated
//! (attributes merged, `last_seen_at` bumped) on later sightings, and never
//! hard-deleted. `first_seen_at`/`last_seen_at` come from record fetch
//! timestamps, not the wall clock, so rebuilds from identical inputs are
//! byte-identical.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::ids::Uid;
use super::vocab::{Gender, Level, SourceClass};

/// A data source (one logical feed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRow {
    pub uid: Uid,
    pub key: String,
    pub name: String,
    pub class: SourceClass,
    pub first_seen_at: NaiveDateTime,
    pub last_seen_at: NaiveDateTime,
}

/// A competition: an organizer's event in a season (league, tournament,
/// showcase). The organizer is part of the identity — two events named
/// "Summer Classic" run by different organizers are different competitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitionRow {
    pub uid: Uid,
    pub name: String,
    pub organizer: String,
    pub season: u16,
    pub gender: Gender,
    pub level: Level,
    pub first_seen_at: NaiveDateTime,
    pub last_seen_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRow {
    pub uid: Uid,
    pub name: String,
    /// Organizer scope. Two teams named "Team Takeover" under different
    /// organizers are distinct entities.
    pub organizer: Option<String>,
    pub school: Option<String>,
    pub gender: Gender,
    pub level: Level,
    /// Surface forms merged into this row by identity resolution.
    pub aliases: BTreeSet<String>,
    pub first_seen_at: NaiveDateTime,
    pub last_seen_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRow {
    pub uid: Uid,
    pub name: String,
    pub school: Option<String>,
    pub grad_year: Option<u16>,
    pub gender: Gender,
    pub aliases: BTreeSet<String>,
    pub first_seen_at: NaiveDateTime,
    pub last_seen_at: NaiveDateTime,
}

/// Merge a later sighting into an existing dimension row.
///
/// Field-wise union: absent attributes fill in, present ones are kept,
/// seen-at range widens. Commutative with respect to sighting order.
pub trait MergeSighting {
    fn merge_sighting(&mut self, other: &Self);
}

fn widen(first: &mut NaiveDateTime, last: &mut NaiveDateTime, other_first: NaiveDateTime, other_last: NaiveDateTime) {
    if other_first < *first {
        *first = other_first;
    }
    if other_last > *last {
        *last = other_last;
    }
}

impl MergeSighting for SourceRow {
    fn merge_sighting(&mut self, other: &Self) {
        if self.class == SourceClass::Unknown {
            self.class = other.class;
        }
        widen(&mut self.first_seen_at, &mut self.last_seen_at, other.first_seen_at, other.last_seen_at);
    }
}

impl MergeSighting for CompetitionRow {
    fn merge_sighting(&mut self, other: &Self) {
        if self.gender == Gender::Unknown {
            self.gender = other.gender;
        }
        if self.level == Level::Unknown {
            self.level = other.level;
        }
        widen(&mut self.first_seen_at, &mut self.last_seen_at, other.first_seen_at, other.last_seen_at);
    }
}

impl MergeSighting for TeamRow {
    fn merge_sighting(&mut self, other: &Self) {
        if self.organizer.is_none() {
            self.organizer = other.organizer.clone();
        }
        if self.school.is_none() {
            self.school = other.school.clone();
        }
        if self.gender == Gender::Unknown {
            self.gender = other.gender;
        }
        if self.level == Level::Unknown {
            self.level = other.level;
        }
        self.aliases.extend(other.aliases.iter().cloned());
        widen(&mut self.first_seen_at, &mut self.last_seen_at, other.first_seen_at, other.last_seen_at);
    }
}

impl MergeSighting for PlayerRow {
    fn merge_sighting(&mut self, other: &Self) {
        if self.school.is_none() {
            self.school = other.school.clone();
        }
        if self.grad_year.is_none() {
            self.grad_year = other.grad_year;
        }
        if self.gender == Gender::Unknown {
            self.gender = other.gender;
        }
        self.aliases.extend(other.aliases.iter().cloned());
        widen(&mut self.first_seen_at, &mut self.last_seen_at, other.first_seen_at, other.last_seen_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn player_merge_widens_and_fills() {
        let uid = Uid::of("player", &[("name", "jon smith")]);
        let mut a = PlayerRow {
            uid: uid.clone(),
            name: "Jon Smith".into(),
            school: None,
            grad_year: Some(2025),
            gender: Gender::Unknown,
            aliases: BTreeSet::new(),
            first_seen_at: at(10),
            last_seen_at: at(10),
        };
        let b = PlayerRow {
            uid,
            name: "Jon Smith".into(),
            school: Some("Lincoln High".into()),
            grad_year: Some(2025),
            gender: Gender::Male,
            aliases: ["Jonathan Smith".to_string()].into_iter().collect(),
            first_seen_at: at(2),
            last_seen_at: at(20),
        };
        a.merge_sighting(&b);

        assert_eq!(a.school.as_deref(), Some("Lincoln High"));
        assert_eq!(a.gender, Gender::Male);
        assert!(a.aliases.contains("Jonathan Smith"));
        assert_eq!(a.first_seen_at, at(2));
        assert_eq!(a.last_seen_at, at(20));
    }
}
