//! Scorefeed adapter — JSON scoreboard API.
//!
//! Fetches one scoreboard document per season and emits game records,
//! plus box score records when the feed includes player lines. The feed
//! is third-party and unversioned; format drift surfaces as
//! `FetchError::Malformed`, never a panic.

use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use statline_core::adapter::SourceAdapter;
use statline_core::domain::{EntityKind, RawRecord};
use statline_core::fetch::{FetchError, FetchOutcome, FetchRequest, FetchScheduler};

const SOURCE_KEY: &str = "scorefeed";
const BASE_URL: &str = "https://api.scorefeed.example/v2";

#[derive(Debug, Deserialize)]
struct ScoreboardResponse {
    games: Vec<ScoreboardGame>,
}

#[derive(Debug, Deserialize)]
struct ScoreboardGame {
    home: String,
    away: String,
    home_score: Option<i64>,
    away_score: Option<i64>,
    date: String,
    event: Option<String>,
    organizer: Option<String>,
    division: Option<String>,
    gender: Option<String>,
    round: Option<u32>,
    winner: Option<String>,
    #[serde(default)]
    player_lines: Vec<PlayerLine>,
}

#[derive(Debug, Deserialize)]
struct PlayerLine {
    name: String,
    team: String,
    school: Option<String>,
    grad_year: Option<String>,
    points: Option<i64>,
    rebounds: Option<i64>,
    assists: Option<i64>,
}

#[derive(Debug)]
pub struct ScorefeedAdapter;

impl ScorefeedAdapter {
    fn scoreboard_url(season: u16) -> String {
        format!("{BASE_URL}/scoreboard?season={season}")
    }

    /// Parse a scoreboard document into raw records.
    fn parse_scoreboard(
        url: &str,
        season: u16,
        body: &str,
    ) -> Result<Vec<RawRecord>, FetchError> {
        let response: ScoreboardResponse = serde_json::from_str(body)
            .map_err(|e| FetchError::Malformed(format!("scoreboard for season {season}: {e}")))?;

        let fetched_at = Utc::now().naive_utc();
        let mut records = Vec::new();

        for game in response.games {
            let mut record =
                RawRecord::new(EntityKind::Game, SOURCE_KEY, url, fetched_at)
                    .with("home_team", &game.home)
                    .with("away_team", &game.away)
                    .with("date", &game.date)
                    .with("season", season.to_string())
                    .with("source_class", "scoreboard");
            if let Some(score) = game.home_score {
                record = record.with("home_score", score.to_string());
            }
            if let Some(score) = game.away_score {
                record = record.with("away_score", score.to_string());
            }
            if let Some(event) = &game.event {
                record = record.with("competition", event);
            }
            if let Some(organizer) = &game.organizer {
                record = record.with("organizer", organizer);
            }
            if let Some(division) = &game.division {
                record = record.with("level", division);
            }
            if let Some(gender) = &game.gender {
                record = record.with("gender", gender);
            }
            if let Some(round) = game.round {
                record = record.with("round", round.to_string());
            }
            if let Some(winner) = &game.winner {
                record = record.with("winner", winner);
            }

            for line in &game.player_lines {
                let opponent = if line.team == game.home {
                    &game.away
                } else {
                    &game.home
                };
                let mut box_record =
                    RawRecord::new(EntityKind::BoxScore, SOURCE_KEY, url, fetched_at)
                        .with("player", &line.name)
                        .with("team", &line.team)
                        .with("opponent", opponent)
                        .with("date", &game.date)
                        .with("season", season.to_string())
                        .with("source_class", "scoreboard");
                if let Some(event) = &game.event {
                    box_record = box_record.with("competition", event);
                }
                if let Some(organizer) = &game.organizer {
                    box_record = box_record.with("organizer", organizer);
                }
                if let Some(school) = &line.school {
                    box_record = box_record.with("school", school);
                }
                if let Some(year) = &line.grad_year {
                    box_record = box_record.with("grad_year", year);
                }
                if let Some(points) = line.points {
                    box_record = box_record.with("points", points.to_string());
                }
                if let Some(rebounds) = line.rebounds {
                    box_record = box_record.with("rebounds", rebounds.to_string());
                }
                if let Some(assists) = line.assists {
                    box_record = box_record.with("assists", assists.to_string());
                }
                records.push(box_record);
            }

            records.push(record);
        }

        Ok(records)
    }
}

impl SourceAdapter for ScorefeedAdapter {
    fn source_key(&self) -> &str {
        SOURCE_KEY
    }

    fn display_name(&self) -> &str {
        "Scorefeed scoreboard API"
    }

    fn collect(&self, fetch: &FetchScheduler, season: u16) -> Result<Vec<RawRecord>, FetchError> {
        let url = Self::scoreboard_url(season);
        let request = FetchRequest {
            source_key: SOURCE_KEY.to_string(),
            url: url.clone(),
            kind: EntityKind::Game,
        };
        match fetch.fetch(&request)? {
            FetchOutcome::Document { body, .. } => Self::parse_scoreboard(&url, season, &body),
            FetchOutcome::Absent => {
                debug!(season, "scorefeed has no scoreboard for this season");
                Ok(Vec::new())
            }
        }
    }
}
