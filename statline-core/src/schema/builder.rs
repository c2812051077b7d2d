//! Schema assembly: per-source raw record batches → canonical tables.
//!
//! The builder normalizes categorical fields through the fixed vocabulary,
//! resolves dimension identities, and constructs fact rows with lineage.
//! Fact uids are content signatures (competition scope + date + unordered
//! team pair, and so on), so re-ingesting the same underlying event can
//! never produce two fact rows. A conflicting re-observation becomes an
//! append-only correction.
//!
//! Expected payload fields by record kind:
//! - `game`: `home_team`, `away_team`, `date`; optional `home_score`,
//!   `away_score`, `competition`, `organizer`, `season`, `gender`,
//!   `level`, `round`
//! - `boxscore`: `player`, `team`, `opponent`, `date`; optional `school`,
//!   `grad_year`, `points`, `rebounds`, `assists`, plus game context
//! - `roster`: `team`, `player`, `season`; optional `jersey`, `school`,
//!   `grad_year`, `organizer`
//! - `player`: `name`; optional `school`, `grad_year`, `gender`
//! - `team`: `name`; optional `organizer`, `school`, `gender`, `level`
//! - `event`: `date`, `event_type`; optional `detail`, plus competition
//!   context
//!
//! Malformed records are skipped with a warning; they never abort a build.

use chrono::NaiveDate;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::domain::{
    BoxScoreRow, CompetitionRow, CorrectionRow, EntityKind, EventRow, GameRow, Gender, Level,
    Lineage, MergeSighting, PlayerRow, RawRecord, RosterRow, SourceClass, SourceRow, TeamRow, Uid,
};
use crate::identity::normalize::normalize_grad_year;
use crate::identity::{DimKind, IdentityResolver};

use super::tables::CanonicalTables;

/// Result of one build pass.
#[derive(Debug)]
pub struct BuildOutput {
    pub tables: CanonicalTables,
    /// Parse-level problems, in deterministic batch order.
    pub warnings: Vec<String>,
    pub records_seen: usize,
    pub records_skipped: usize,
}

pub struct SchemaBuilder<'a> {
    resolver: &'a IdentityResolver,
}

#[derive(Default)]
struct Work {
    sources: BTreeMap<Uid, SourceRow>,
    competitions: BTreeMap<Uid, CompetitionRow>,
    teams: BTreeMap<Uid, TeamRow>,
    players: BTreeMap<Uid, PlayerRow>,
    games: BTreeMap<Uid, GameRow>,
    box_scores: BTreeMap<Uid, BoxScoreRow>,
    rosters: BTreeMap<Uid, RosterRow>,
    events: BTreeMap<Uid, EventRow>,
    corrections: BTreeMap<Uid, CorrectionRow>,
    warnings: Vec<String>,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(resolver: &'a IdentityResolver) -> Self {
        Self { resolver }
    }

    /// Assemble canonical tables from per-source record batches.
    ///
    /// Batches are visited in source-key order and records in emission
    /// order, so identical inputs always produce byte-identical tables.
    pub fn build(&self, batches: &BTreeMap<String, Vec<RawRecord>>) -> BuildOutput {
        let mut work = Work::default();
        let mut seen = 0usize;
        let mut skipped = 0usize;

        for (source_key, records) in batches {
            for record in records {
                seen += 1;
                if record.source_url.is_empty() {
                    work.warnings.push(format!(
                        "{source_key}: {} record missing source_url, skipped",
                        record.kind
                    ));
                    skipped += 1;
                    continue;
                }

                let source_uid = self.upsert_source(&mut work, record);
                let outcome = match record.kind {
                    EntityKind::Game => self.add_game(&mut work, record, &source_uid),
                    EntityKind::BoxScore => self.add_box_score(&mut work, record, &source_uid),
                    EntityKind::Roster => self.add_roster(&mut work, record, &source_uid),
                    EntityKind::Event => self.add_event(&mut work, record, &source_uid),
                    EntityKind::Player => self
                        .upsert_player(&mut work, record, "name")
                        .map(|_| ()),
                    EntityKind::Team => self.upsert_team(&mut work, record, "name").map(|_| ()),
                };
                if let Err(reason) = outcome {
                    work.warnings.push(format!(
                        "{source_key}: skipped {} record from {}: {reason}",
                        record.kind, record.source_url
                    ));
                    skipped += 1;
                }
            }
        }

        debug!(
            records = seen,
            skipped,
            games = work.games.len(),
            "build pass complete"
        );

        let mut tables = CanonicalTables {
            sources: work.sources.into_values().collect(),
            competitions: work.competitions.into_values().collect(),
            teams: work.teams.into_values().collect(),
            players: work.players.into_values().collect(),
            games: work.games.into_values().collect(),
            box_scores: work.box_scores.into_values().collect(),
            rosters: work.rosters.into_values().collect(),
            events: work.events.into_values().collect(),
            corrections: work.corrections.into_values().collect(),
        };
        tables.sort();

        BuildOutput {
            tables,
            warnings: work.warnings,
            records_seen: seen,
            records_skipped: skipped,
        }
    }

    // ── dimensions ──────────────────────────────────────────────────

    fn upsert_source(&self, work: &mut Work, record: &RawRecord) -> Uid {
        let mut attrs = BTreeMap::new();
        attrs.insert("key".to_string(), record.source_key.clone());
        attrs.insert(
            "name".to_string(),
            record
                .field("source_name")
                .unwrap_or(&record.source_key)
                .to_string(),
        );
        let resolution = self.resolver.resolve(DimKind::Source, &attrs);

        let row = SourceRow {
            uid: resolution.uid.clone(),
            key: record.source_key.clone(),
            name: resolution.canonical_name.clone(),
            class: SourceClass::parse(record.field("source_class").unwrap_or("")),
            first_seen_at: record.fetched_at,
            last_seen_at: record.fetched_at,
        };
        upsert_dim(&mut work.sources, row);
        resolution.uid
    }

    fn upsert_competition(&self, work: &mut Work, record: &RawRecord) -> Uid {
        let name = record
            .field("competition")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or("independent");
        let organizer = record.field("organizer").unwrap_or("");
        let season = record.field("season").unwrap_or("");

        let mut attrs = BTreeMap::new();
        attrs.insert("name".to_string(), name.to_string());
        attrs.insert("organizer".to_string(), organizer.to_string());
        attrs.insert("season".to_string(), season.to_string());
        let resolution = self.resolver.resolve(DimKind::Competition, &attrs);

        let row = CompetitionRow {
            uid: resolution.uid.clone(),
            name: resolution.canonical_name.clone(),
            organizer: organizer.trim().to_string(),
            season: season_number(season).unwrap_or(0),
            gender: Gender::parse(record.field("gender").unwrap_or("")),
            level: Level::parse(record.field("level").unwrap_or("")),
            first_seen_at: record.fetched_at,
            last_seen_at: record.fetched_at,
        };
        upsert_dim(&mut work.competitions, row);
        resolution.uid
    }

    fn upsert_team(
        &self,
        work: &mut Work,
        record: &RawRecord,
        name_field: &str,
    ) -> Result<Uid, String> {
        let raw_name = record
            .field(name_field)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| format!("missing required field '{name_field}'"))?;
        let organizer = record.field("organizer").unwrap_or("");

        let mut attrs = BTreeMap::new();
        attrs.insert("name".to_string(), raw_name.to_string());
        attrs.insert("organizer".to_string(), organizer.to_string());
        if let Some(school) = record.field("school") {
            attrs.insert("school".to_string(), school.to_string());
        }
        let resolution = self.resolver.resolve(DimKind::Team, &attrs);

        let mut aliases = BTreeSet::new();
        if raw_name != resolution.canonical_name {
            aliases.insert(raw_name.to_string());
        }
        let row = TeamRow {
            uid: resolution.uid.clone(),
            name: resolution.canonical_name.clone(),
            organizer: non_empty(organizer),
            school: record.field("school").and_then(non_empty),
            gender: Gender::parse(record.field("gender").unwrap_or("")),
            level: Level::parse(record.field("level").unwrap_or("")),
            aliases,
            first_seen_at: record.fetched_at,
            last_seen_at: record.fetched_at,
        };
        upsert_dim(&mut work.teams, row);
        Ok(resolution.uid)
    }

    fn upsert_player(
        &self,
        work: &mut Work,
        record: &RawRecord,
        name_field: &str,
    ) -> Result<Uid, String> {
        let raw_name = record
            .field(name_field)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| format!("missing required field '{name_field}'"))?;

        let mut attrs = BTreeMap::new();
        attrs.insert("name".to_string(), raw_name.to_string());
        if let Some(school) = record.field("school") {
            attrs.insert("school".to_string(), school.to_string());
        }
        if let Some(year) = record.field("grad_year") {
            attrs.insert("grad_year".to_string(), year.to_string());
        }
        let resolution = self.resolver.resolve(DimKind::Player, &attrs);

        let mut aliases = BTreeSet::new();
        if raw_name != resolution.canonical_name {
            aliases.insert(raw_name.to_string());
        }
        let row = PlayerRow {
            uid: resolution.uid.clone(),
            name: resolution.canonical_name.clone(),
            school: record.field("school").and_then(non_empty),
            grad_year: record.field("grad_year").and_then(normalize_grad_year),
            gender: Gender::parse(record.field("gender").unwrap_or("")),
            aliases,
            first_seen_at: record.fetched_at,
            last_seen_at: record.fetched_at,
        };
        upsert_dim(&mut work.players, row);
        Ok(resolution.uid)
    }

    // ── facts ───────────────────────────────────────────────────────

    fn add_game(
        &self,
        work: &mut Work,
        record: &RawRecord,
        source_uid: &Uid,
    ) -> Result<(), String> {
        let date = parse_date(record)?;
        let competition_uid = self.upsert_competition(work, record);
        let home_uid = self.upsert_team(work, record, "home_team")?;
        let away_uid = self.upsert_team(work, record, "away_team")?;

        let home_score = parse_count(work, record, "home_score");
        let away_score = parse_count(work, record, "away_score");
        let round = record.field("round").and_then(|r| r.parse::<u32>().ok());
        let claimed_winner_uid = record.field("winner").and_then(|winner| {
            let claimed = crate::identity::normalize::normalize_text(winner);
            let matches = |field: &str| {
                record
                    .field(field)
                    .is_some_and(|name| crate::identity::normalize::normalize_text(name) == claimed)
            };
            if matches("home_team") {
                Some(home_uid.clone())
            } else if matches("away_team") {
                Some(away_uid.clone())
            } else {
                None
            }
        });

        // The uid is a content signature over the competition scope, date,
        // and unordered team pair: the same matchup under two different
        // organizers stays two distinct facts, while the same game seen
        // from two sources collapses into one.
        let (lo, hi) = ordered_pair(&home_uid, &away_uid);
        let uid = Uid::of(
            "game",
            &[
                ("competition", competition_uid.as_str()),
                ("date", &date.to_string()),
                ("team_lo", lo.as_str()),
                ("team_hi", hi.as_str()),
            ],
        );

        let row = GameRow {
            uid: uid.clone(),
            competition_uid,
            date,
            home_team_uid: home_uid,
            away_team_uid: away_uid,
            home_score,
            away_score,
            round,
            claimed_winner_uid,
            lineage: lineage(record, source_uid),
        };

        match work.games.entry(uid) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(existing) => {
                record_game_conflicts(&mut work.corrections, existing.get(), &row);
            }
        }
        Ok(())
    }

    fn add_box_score(
        &self,
        work: &mut Work,
        record: &RawRecord,
        source_uid: &Uid,
    ) -> Result<(), String> {
        let date = parse_date(record)?;
        let competition_uid = self.upsert_competition(work, record);
        let team_uid = self.upsert_team(work, record, "team")?;
        let opponent_uid = self.upsert_team(work, record, "opponent")?;
        let player_uid = self.upsert_player(work, record, "player")?;

        let (lo, hi) = ordered_pair(&team_uid, &opponent_uid);
        let game_uid = Uid::of(
            "game",
            &[
                ("competition", competition_uid.as_str()),
                ("date", &date.to_string()),
                ("team_lo", lo.as_str()),
                ("team_hi", hi.as_str()),
            ],
        );
        let uid = Uid::of(
            "boxscore",
            &[("game", game_uid.as_str()), ("player", player_uid.as_str())],
        );

        let row = BoxScoreRow {
            uid: uid.clone(),
            game_uid,
            team_uid,
            player_uid,
            points: parse_count(work, record, "points"),
            rebounds: parse_count(work, record, "rebounds"),
            assists: parse_count(work, record, "assists"),
            lineage: lineage(record, source_uid),
        };
        work.box_scores.entry(uid).or_insert(row);
        Ok(())
    }

    fn add_roster(
        &self,
        work: &mut Work,
        record: &RawRecord,
        source_uid: &Uid,
    ) -> Result<(), String> {
        let team_uid = self.upsert_team(work, record, "team")?;
        let player_uid = self.upsert_player(work, record, "player")?;
        let season = record
            .field("season")
            .and_then(season_number)
            .ok_or("missing or unparseable 'season'")?;

        let uid = Uid::of(
            "roster",
            &[
                ("team", team_uid.as_str()),
                ("player", player_uid.as_str()),
                ("season", &season.to_string()),
            ],
        );
        let row = RosterRow {
            uid: uid.clone(),
            team_uid,
            player_uid,
            season,
            jersey: record.field("jersey").and_then(non_empty),
            lineage: lineage(record, source_uid),
        };
        work.rosters.entry(uid).or_insert(row);
        Ok(())
    }

    fn add_event(
        &self,
        work: &mut Work,
        record: &RawRecord,
        source_uid: &Uid,
    ) -> Result<(), String> {
        let date = parse_date(record)?;
        let competition_uid = self.upsert_competition(work, record);
        let kind = record
            .field("event_type")
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or("missing required field 'event_type'")?;
        let detail = record.field("detail").unwrap_or("").trim().to_string();

        let uid = Uid::of(
            "event",
            &[
                ("competition", competition_uid.as_str()),
                ("date", &date.to_string()),
                ("kind", kind),
                ("detail", &detail),
            ],
        );
        let row = EventRow {
            uid: uid.clone(),
            competition_uid,
            date,
            kind: kind.to_string(),
            detail,
            lineage: lineage(record, source_uid),
        };
        work.events.entry(uid).or_insert(row);
        Ok(())
    }
}

// ── helpers ─────────────────────────────────────────────────────────

fn upsert_dim<T: MergeSighting + super::tables::HasUid>(map: &mut BTreeMap<Uid, T>, row: T) {
    match map.entry(row.uid().clone()) {
        Entry::Occupied(mut existing) => existing.get_mut().merge_sighting(&row),
        Entry::Vacant(slot) => {
            slot.insert(row);
        }
    }
}

fn lineage(record: &RawRecord, source_uid: &Uid) -> Lineage {
    Lineage {
        source_uid: source_uid.clone(),
        source_url: record.source_url.clone(),
        fetched_at: record.fetched_at,
    }
}

fn parse_date(record: &RawRecord) -> Result<NaiveDate, String> {
    let raw = record.field("date").ok_or("missing required field 'date'")?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("unparseable date '{raw}': {e}"))
}

/// Parse a numeric stat field. An unparseable value becomes `None` plus a
/// warning; it never drops the whole record.
fn parse_count(work: &mut Work, record: &RawRecord, field: &str) -> Option<i64> {
    let raw = record.field(field)?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) => {
            work.warnings.push(format!(
                "{}: unparseable {field} '{raw}' in {} record from {}",
                record.source_key, record.kind, record.source_url
            ));
            None
        }
    }
}

fn season_number(raw: &str) -> Option<u16> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn ordered_pair<'u>(a: &'u Uid, b: &'u Uid) -> (&'u Uid, &'u Uid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Score of the lexicographically-lower and -higher team uid, so that
/// home/away orientation differences between sources do not read as
/// conflicts.
fn aligned_scores(row: &GameRow) -> (Option<i64>, Option<i64>) {
    if row.home_team_uid <= row.away_team_uid {
        (row.home_score, row.away_score)
    } else {
        (row.away_score, row.home_score)
    }
}

fn record_game_conflicts(
    corrections: &mut BTreeMap<Uid, CorrectionRow>,
    existing: &GameRow,
    incoming: &GameRow,
) {
    let kept = aligned_scores(existing);
    let observed = aligned_scores(incoming);
    if kept == observed {
        return;
    }

    let fields = [("score_lo", kept.0, observed.0), ("score_hi", kept.1, observed.1)];
    for (field, kept_value, observed_value) in fields {
        if kept_value == observed_value {
            continue;
        }
        let kept_str = display_opt(kept_value);
        let observed_str = display_opt(observed_value);
        let uid = Uid::of(
            "correction",
            &[
                ("corrects", existing.uid.as_str()),
                ("field", field),
                ("value", &observed_str),
                ("source", incoming.lineage.source_uid.as_str()),
            ],
        );
        corrections.entry(uid.clone()).or_insert(CorrectionRow {
            uid,
            corrects_uid: existing.uid.clone(),
            field: field.to_string(),
            kept_value: kept_str,
            conflicting_value: observed_str,
            lineage: incoming.lineage.clone(),
        });
    }
}

fn display_opt(value: Option<i64>) -> String {
    value.map_or_else(|| "none".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentityConfig;
    use chrono::NaiveDateTime;

    fn fetched() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 14)
            .unwrap()
            .and_hms_opt(6, 30, 0)
            .unwrap()
    }

    fn game_record(source: &str, home: &str, away: &str, organizer: &str) -> RawRecord {
        RawRecord::new(
            EntityKind::Game,
            source,
            format!("https://{source}.example/games"),
            fetched(),
        )
        .with("home_team", home)
        .with("away_team", away)
        .with("home_score", "62")
        .with("away_score", "58")
        .with("date", "2024-07-13")
        .with("organizer", organizer)
        .with("competition", "Summer Classic")
        .with("season", "2024")
        .with("gender", "boys")
        .with("level", "17U")
    }

    fn build_from(records: Vec<(&str, RawRecord)>) -> BuildOutput {
        let resolver = IdentityResolver::new(&IdentityConfig::default());
        let builder = SchemaBuilder::new(&resolver);
        let mut batches: BTreeMap<String, Vec<RawRecord>> = BTreeMap::new();
        for (source, record) in records {
            batches.entry(source.to_string()).or_default().push(record);
        }
        builder.build(&batches)
    }

    #[test]
    fn build_is_idempotent() {
        let resolver = IdentityResolver::new(&IdentityConfig::default());
        let builder = SchemaBuilder::new(&resolver);
        let mut batches: BTreeMap<String, Vec<RawRecord>> = BTreeMap::new();
        batches.insert(
            "scorefeed".into(),
            vec![game_record("scorefeed", "Team Takeover", "Expressions Elite", "Hoopfest")],
        );

        let first = builder.build(&batches);
        let second = builder.build(&batches);

        assert_eq!(first.tables, second.tables);
        assert_eq!(first.tables.content_hash(), second.tables.content_hash());
    }

    #[test]
    fn same_game_from_two_sources_is_one_fact_row() {
        let output = build_from(vec![
            ("alpha", game_record("alpha", "Team Takeover", "Expressions Elite", "Hoopfest")),
            // Same game, opposite home/away orientation.
            (
                "beta",
                RawRecord::new(EntityKind::Game, "beta", "https://beta.example/g", fetched())
                    .with("home_team", "Expressions Elite")
                    .with("away_team", "Team Takeover")
                    .with("home_score", "58")
                    .with("away_score", "62")
                    .with("date", "2024-07-13")
                    .with("organizer", "Hoopfest")
                    .with("competition", "Summer Classic")
                    .with("season", "2024"),
            ),
        ]);

        assert_eq!(output.tables.games.len(), 1);
        assert!(
            output.tables.corrections.is_empty(),
            "flipped orientation with matching scores is not a conflict"
        );
    }

    #[test]
    fn conflicting_rescore_appends_correction() {
        let mut conflicting = game_record("beta", "Team Takeover", "Expressions Elite", "Hoopfest");
        conflicting
            .payload
            .insert("home_score".into(), "64".into());

        let output = build_from(vec![
            ("alpha", game_record("alpha", "Team Takeover", "Expressions Elite", "Hoopfest")),
            ("beta", conflicting),
        ]);

        assert_eq!(output.tables.games.len(), 1, "fact row is kept, not duplicated");
        assert_eq!(output.tables.corrections.len(), 1);
        let correction = &output.tables.corrections[0];
        assert_eq!(correction.corrects_uid, output.tables.games[0].uid);
        assert_eq!(correction.conflicting_value, "64");
    }

    #[test]
    fn same_matchup_under_two_organizers_stays_distinct() {
        let output = build_from(vec![
            ("alpha", game_record("alpha", "Team Takeover", "Expressions Elite", "Hoopfest")),
            ("beta", game_record("beta", "Team Takeover", "Expressions Elite", "Summer Jam")),
        ]);

        assert_eq!(
            output.tables.games.len(),
            2,
            "different organizers in the same week are different games"
        );
        // Four team rows: each organizer scope has its own pair.
        assert_eq!(output.tables.teams.len(), 4);
    }

    #[test]
    fn malformed_record_is_skipped_with_warning() {
        let record = RawRecord::new(
            EntityKind::Game,
            "alpha",
            "https://alpha.example/g",
            fetched(),
        )
        .with("home_team", "Team Takeover")
        .with("date", "2024-07-13");

        let output = build_from(vec![("alpha", record)]);
        assert_eq!(output.records_skipped, 1);
        assert!(output.tables.games.is_empty());
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].contains("away_team"));
    }

    #[test]
    fn missing_source_url_violates_adapter_contract() {
        let mut record = game_record("alpha", "A", "B", "Hoopfest");
        record.source_url.clear();

        let output = build_from(vec![("alpha", record)]);
        assert_eq!(output.records_skipped, 1);
        assert!(output.warnings[0].contains("source_url"));
    }

    #[test]
    fn unparseable_score_keeps_record_with_warning() {
        let mut record = game_record("alpha", "A", "B", "Hoopfest");
        record.payload.insert("home_score".into(), "W".into());

        let output = build_from(vec![("alpha", record)]);
        assert_eq!(output.tables.games.len(), 1);
        assert_eq!(output.tables.games[0].home_score, None);
        assert!(output.warnings.iter().any(|w| w.contains("home_score")));
    }

    #[test]
    fn box_score_links_to_the_matching_game_fact() {
        let box_record = RawRecord::new(
            EntityKind::BoxScore,
            "stats",
            "https://stats.example/box/1",
            fetched(),
        )
        .with("player", "Jon Smith")
        .with("school", "Lincoln High")
        .with("grad_year", "2025")
        .with("team", "Team Takeover")
        .with("opponent", "Expressions Elite")
        .with("date", "2024-07-13")
        .with("organizer", "Hoopfest")
        .with("competition", "Summer Classic")
        .with("season", "2024")
        .with("points", "21")
        .with("rebounds", "7")
        .with("assists", "4");

        let output = build_from(vec![
            ("scorefeed", game_record("scorefeed", "Team Takeover", "Expressions Elite", "Hoopfest")),
            ("stats", box_record),
        ]);

        assert_eq!(output.tables.games.len(), 1);
        assert_eq!(output.tables.box_scores.len(), 1);
        assert_eq!(
            output.tables.box_scores[0].game_uid,
            output.tables.games[0].uid
        );
        assert_eq!(output.tables.box_scores[0].points, Some(21));
        assert_eq!(output.tables.players.len(), 1);
    }

    #[test]
    fn every_fact_row_carries_lineage() {
        let output = build_from(vec![
            ("alpha", game_record("alpha", "A", "B", "Hoopfest")),
            (
                "alpha",
                RawRecord::new(EntityKind::Roster, "alpha", "https://alpha.example/r", fetched())
                    .with("team", "Team Takeover")
                    .with("player", "Jon Smith")
                    .with("season", "2024"),
            ),
        ]);

        for game in &output.tables.games {
            assert!(game.lineage.is_complete());
        }
        for roster in &output.tables.rosters {
            assert!(roster.lineage.is_complete());
        }
    }
}
