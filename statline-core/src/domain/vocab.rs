//! Fixed vocabulary mappings for categorical fields.
//!
//! Sources disagree wildly on how they spell gender, competition level, and
//! source classification. Everything funnels through these parsers before it
//! reaches a canonical row; unknown values map to `Unknown`, never to an
//! error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Gender / division of a competition or roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Coed,
    #[default]
    Unknown,
}

impl Gender {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "m" | "b" | "male" | "boys" | "boy" | "men" | "mens" => Gender::Male,
            "f" | "w" | "g" | "female" | "girls" | "girl" | "women" | "womens" => Gender::Female,
            "coed" | "co-ed" | "mixed" => Gender::Coed,
            _ => Gender::Unknown,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Coed => "coed",
            Gender::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Competition level or age group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Varsity,
    JuniorVarsity,
    Freshman,
    /// Club/AAU age group, e.g. 17 for "17U".
    AgeGroup(u8),
    #[default]
    Unknown,
}

impl Level {
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim().to_ascii_lowercase();
        match s.as_str() {
            "v" | "var" | "varsity" => return Level::Varsity,
            "jv" | "junior varsity" | "junior-varsity" => return Level::JuniorVarsity,
            "fr" | "frosh" | "freshman" | "freshmen" => return Level::Freshman,
            _ => {}
        }
        // Age groups: "17u", "u17", "17-u"
        let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
        if s.contains('u') && !digits.is_empty() {
            if let Ok(age) = digits.parse::<u8>() {
                if (8..=19).contains(&age) {
                    return Level::AgeGroup(age);
                }
            }
        }
        Level::Unknown
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Varsity => f.write_str("varsity"),
            Level::JuniorVarsity => f.write_str("jv"),
            Level::Freshman => f.write_str("freshman"),
            Level::AgeGroup(age) => write!(f, "{age}u"),
            Level::Unknown => f.write_str("unknown"),
        }
    }
}

/// Classification of a source feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceClass {
    Scoreboard,
    Stats,
    Roster,
    Recruiting,
    #[default]
    Unknown,
}

impl SourceClass {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "scoreboard" | "scores" | "results" => SourceClass::Scoreboard,
            "stats" | "statistics" | "boxscores" | "box" => SourceClass::Stats,
            "roster" | "rosters" | "teams" => SourceClass::Roster,
            "recruiting" | "rankings" | "prospects" => SourceClass::Recruiting,
            _ => SourceClass::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_vocabulary() {
        assert_eq!(Gender::parse("Boys"), Gender::Male);
        assert_eq!(Gender::parse("W"), Gender::Female);
        assert_eq!(Gender::parse("co-ed"), Gender::Coed);
        assert_eq!(Gender::parse("???"), Gender::Unknown);
    }

    #[test]
    fn level_vocabulary() {
        assert_eq!(Level::parse("Varsity"), Level::Varsity);
        assert_eq!(Level::parse("JV"), Level::JuniorVarsity);
        assert_eq!(Level::parse("17U"), Level::AgeGroup(17));
        assert_eq!(Level::parse("u15"), Level::AgeGroup(15));
        assert_eq!(Level::parse("open"), Level::Unknown);
        // Out-of-range age groups are not invented
        assert_eq!(Level::parse("99u"), Level::Unknown);
    }

    #[test]
    fn source_class_vocabulary() {
        assert_eq!(SourceClass::parse("scores"), SourceClass::Scoreboard);
        assert_eq!(SourceClass::parse("Boxscores"), SourceClass::Stats);
        assert_eq!(SourceClass::parse("blog"), SourceClass::Unknown);
    }
}
