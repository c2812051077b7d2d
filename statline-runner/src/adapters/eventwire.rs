//! Eventwire adapter — JSON roster/recruiting feed.
//!
//! One document per season listing club teams and their rosters. Emits
//! team, player, and roster records.

use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use statline_core::adapter::SourceAdapter;
use statline_core::domain::{EntityKind, RawRecord};
use statline_core::fetch::{FetchError, FetchOutcome, FetchRequest, FetchScheduler};

const SOURCE_KEY: &str = "eventwire";
const BASE_URL: &str = "https://eventwire.example/api";

#[derive(Debug, Deserialize)]
struct RosterResponse {
    teams: Vec<WireTeam>,
}

#[derive(Debug, Deserialize)]
struct WireTeam {
    name: String,
    organizer: Option<String>,
    gender: Option<String>,
    division: Option<String>,
    #[serde(default)]
    players: Vec<WirePlayer>,
}

#[derive(Debug, Deserialize)]
struct WirePlayer {
    name: String,
    school: Option<String>,
    grad_year: Option<String>,
    jersey: Option<String>,
}

#[derive(Debug)]
pub struct EventwireAdapter;

impl EventwireAdapter {
    fn rosters_url(season: u16) -> String {
        format!("{BASE_URL}/rosters?season={season}")
    }

    fn parse_rosters(url: &str, season: u16, body: &str) -> Result<Vec<RawRecord>, FetchError> {
        let response: RosterResponse = serde_json::from_str(body)
            .map_err(|e| FetchError::Malformed(format!("rosters for season {season}: {e}")))?;

        let fetched_at = Utc::now().naive_utc();
        let mut records = Vec::new();

        for team in response.teams {
            let mut team_record =
                RawRecord::new(EntityKind::Team, SOURCE_KEY, url, fetched_at)
                    .with("name", &team.name)
                    .with("season", season.to_string())
                    .with("source_class", "rosters");
            if let Some(organizer) = &team.organizer {
                team_record = team_record.with("organizer", organizer);
            }
            if let Some(gender) = &team.gender {
                team_record = team_record.with("gender", gender);
            }
            if let Some(division) = &team.division {
                team_record = team_record.with("level", division);
            }
            records.push(team_record);

            for player in &team.players {
                let mut roster_record =
                    RawRecord::new(EntityKind::Roster, SOURCE_KEY, url, fetched_at)
                        .with("team", &team.name)
                        .with("player", &player.name)
                        .with("season", season.to_string())
                        .with("source_class", "rosters");
                if let Some(organizer) = &team.organizer {
                    roster_record = roster_record.with("organizer", organizer);
                }
                if let Some(school) = &player.school {
                    roster_record = roster_record.with("school", school);
                }
                if let Some(year) = &player.grad_year {
                    roster_record = roster_record.with("grad_year", year);
                }
                if let Some(jersey) = &player.jersey {
                    roster_record = roster_record.with("jersey", jersey);
                }
                records.push(roster_record);
            }
        }

        Ok(records)
    }
}

impl SourceAdapter for EventwireAdapter {
    fn source_key(&self) -> &str {
        SOURCE_KEY
    }

    fn display_name(&self) -> &str {
        "Eventwire roster feed"
    }

    fn collect(&self, fetch: &FetchScheduler, season: u16) -> Result<Vec<RawRecord>, FetchError> {
        let url = Self::rosters_url(season);
        let request = FetchRequest {
            source_key: SOURCE_KEY.to_string(),
            url: url.clone(),
            kind: EntityKind::Roster,
        };
        match fetch.fetch(&request)? {
            FetchOutcome::Document { body, .. } => Self::parse_rosters(&url, season, &body),
            FetchOutcome::Absent => {
                debug!(season, "eventwire has no rosters for this season");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "teams": [
            {
                "name": "Team Takeover",
                "organizer": "Hoopfest",
                "gender": "boys",
                "division": "17U",
                "players": [
                    {"name": "Jon Smith", "school": "Lincoln High", "grad_year": "2025", "jersey": "3"},
                    {"name": "Marcus Delgado", "school": "Central High", "grad_year": "2026", "jersey": "11"}
                ]
            }
        ]
    }"#;

    #[test]
    fn parses_teams_and_rosters() {
        let records =
            EventwireAdapter::parse_rosters("https://eventwire.example/api/x", 2024, FIXTURE)
                .unwrap();

        let teams: Vec<_> = records
            .iter()
            .filter(|r| r.kind == EntityKind::Team)
            .collect();
        let rosters: Vec<_> = records
            .iter()
            .filter(|r| r.kind == EntityKind::Roster)
            .collect();
        assert_eq!(teams.len(), 1);
        assert_eq!(rosters.len(), 2);

        assert_eq!(teams[0].field("organizer"), Some("Hoopfest"));
        assert_eq!(rosters[0].field("player"), Some("Jon Smith"));
        assert_eq!(rosters[0].field("jersey"), Some("3"));
        assert_eq!(rosters[1].field("grad_year"), Some("2026"));
    }

    #[test]
    fn empty_feed_yields_no_records() {
        let records =
            EventwireAdapter::parse_rosters("https://x", 2024, r#"{"teams": []}"#).unwrap();
        assert!(records.is_empty());
    }
}
