//! Cross-source identity resolution.
//!
//! `resolve` assigns stable uids to recurring real-world entities. The fast
//! path is an exact lookup on a composite key of normalized attributes —
//! this is what the schema builder relies on for idempotence. Player names
//! additionally get a fuzzy fallback scoped to the same school and
//! graduation year, so "Jon Smith" and "Jonathan Smith" at Lincoln High
//! merge while the "Jon Smythe" at Central High does not.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::config::IdentityConfig;
use crate::domain::Uid;

use super::normalize::{
    normalize_grad_year, normalize_person_name, normalize_school, normalize_text,
};
use super::similarity::{JaroWinklerScorer, NameScorer};

/// Dimension kinds the resolver assigns identities for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimKind {
    Source,
    Competition,
    Team,
    Player,
}

impl DimKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DimKind::Source => "source",
            DimKind::Competition => "competition",
            DimKind::Team => "team",
            DimKind::Player => "player",
        }
    }
}

/// Result of one resolve call.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub uid: Uid,
    /// Display name of the entity as first seen; callers record differing
    /// surface forms as aliases.
    pub canonical_name: String,
}

/// Recorded whenever a fuzzy match was ambiguous. Folded into the
/// validation report as a warning — never silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguousMatch {
    pub kind: DimKind,
    pub name: String,
    pub scope: String,
    pub chosen: Uid,
    /// Candidate uids with their similarity scores, best first.
    pub candidates: Vec<(Uid, f64)>,
}

struct Candidate {
    uid: Uid,
    display_name: String,
    /// Normalized primary name plus any fuzzy-merged variants.
    names: BTreeSet<String>,
    /// Monotonic sequence number of the latest sighting; used for
    /// deterministic most-recently-seen tie-breaking.
    last_seen: u64,
}

#[derive(Default)]
struct ResolverState {
    exact: HashMap<String, usize>,
    scoped: HashMap<String, Vec<usize>>,
    candidates: Vec<Candidate>,
    events: Vec<AmbiguousMatch>,
    seq: u64,
}

/// Shared across all concurrently-built source batches; all mutation goes
/// through the interior lock.
pub struct IdentityResolver {
    scorer: Box<dyn NameScorer>,
    threshold: f64,
    state: RwLock<ResolverState>,
}

impl IdentityResolver {
    pub fn new(config: &IdentityConfig) -> Self {
        Self::with_scorer(config, Box::new(JaroWinklerScorer))
    }

    pub fn with_scorer(config: &IdentityConfig, scorer: Box<dyn NameScorer>) -> Self {
        Self {
            scorer,
            threshold: config.similarity_threshold,
            state: RwLock::new(ResolverState::default()),
        }
    }

    /// Resolve an entity observation to a stable uid.
    pub fn resolve(&self, kind: DimKind, attrs: &BTreeMap<String, String>) -> Resolution {
        let normalized = normalize_attrs(kind, attrs);
        let exact_key = exact_key(kind, &normalized);
        let display_name = attrs
            .get("name")
            .or_else(|| attrs.get("key"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let mut state = self.state.write();
        state.seq += 1;
        let seq = state.seq;

        // Fast path: prior entity with the identical composite key.
        if let Some(&idx) = state.exact.get(&exact_key) {
            let candidate = &mut state.candidates[idx];
            candidate.last_seen = seq;
            return Resolution {
                uid: candidate.uid.clone(),
                canonical_name: candidate.display_name.clone(),
            };
        }

        // Fuzzy fallback: only player names are prone enough to spelling
        // variance, and only within the same disambiguating scope.
        if kind == DimKind::Player {
            if let Some(scope) = fuzzy_scope(&normalized) {
                if let Some(resolution) =
                    self.fuzzy_merge(&mut state, &normalized, &exact_key, &scope, seq)
                {
                    return resolution;
                }
            }
        }

        // Mint a new identity. The uid is a pure function of the
        // normalized attributes.
        let pairs: Vec<(&str, &str)> = normalized
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let uid = Uid::of(kind.as_str(), &pairs);
        let name = normalized.get("name").cloned().unwrap_or_default();

        let idx = state.candidates.len();
        state.candidates.push(Candidate {
            uid: uid.clone(),
            display_name: display_name.clone(),
            names: [name].into_iter().collect(),
            last_seen: seq,
        });
        state.exact.insert(exact_key, idx);
        if kind == DimKind::Player {
            if let Some(scope) = fuzzy_scope(&normalized) {
                state.scoped.entry(scope).or_default().push(idx);
            }
        }

        Resolution {
            uid,
            canonical_name: display_name,
        }
    }

    fn fuzzy_merge(
        &self,
        state: &mut ResolverState,
        normalized: &BTreeMap<String, String>,
        exact_key: &str,
        scope: &str,
        seq: u64,
    ) -> Option<Resolution> {
        let name = normalized.get("name")?;
        if name.is_empty() {
            return None;
        }

        let mut scored: Vec<(usize, f64)> = Vec::new();
        for &idx in state.scoped.get(scope)? {
            let candidate = &state.candidates[idx];
            let best = candidate
                .names
                .iter()
                .map(|n| self.scorer.score(name, n))
                .fold(0.0_f64, f64::max);
            if best >= self.threshold {
                scored.push((idx, best));
            }
        }
        if scored.is_empty() {
            return None;
        }

        // Best score wins; exact ties break toward the most recently seen
        // candidate. Ambiguity (more than one over threshold) is recorded,
        // not dropped.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    state.candidates[b.0]
                        .last_seen
                        .cmp(&state.candidates[a.0].last_seen)
                })
        });
        let (best_idx, best_score) = scored[0];

        if scored.len() > 1 {
            let event = AmbiguousMatch {
                kind: DimKind::Player,
                name: name.clone(),
                scope: scope.to_string(),
                chosen: state.candidates[best_idx].uid.clone(),
                candidates: scored
                    .iter()
                    .map(|&(idx, score)| (state.candidates[idx].uid.clone(), score))
                    .collect(),
            };
            state.events.push(event);
        } else {
            debug!(
                name = %name,
                scope = %scope,
                score = best_score,
                "fuzzy-merged into existing identity"
            );
        }

        let candidate = &mut state.candidates[best_idx];
        candidate.last_seen = seq;
        candidate.names.insert(name.clone());
        let resolution = Resolution {
            uid: candidate.uid.clone(),
            canonical_name: candidate.display_name.clone(),
        };
        // Future sightings of this surface form take the exact path.
        state.exact.insert(exact_key.to_string(), best_idx);
        Some(resolution)
    }

    /// Drain recorded ambiguity events. Ownership passes to the caller,
    /// which folds them into the batch's validation report.
    pub fn drain_events(&self) -> Vec<AmbiguousMatch> {
        std::mem::take(&mut self.state.write().events)
    }

    /// Number of distinct identities resolved so far.
    pub fn entity_count(&self) -> usize {
        self.state.read().candidates.len()
    }
}

/// Normalize the identity attributes relevant to a kind; irrelevant or
/// empty fields are dropped so they cannot perturb the uid.
fn normalize_attrs(kind: DimKind, attrs: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let mut put = |key: &str, value: String| {
        if !value.is_empty() {
            out.insert(key.to_string(), value);
        }
    };

    match kind {
        DimKind::Player => {
            put("name", normalize_person_name(attrs.get("name").map_or("", String::as_str)));
            put("school", normalize_school(attrs.get("school").map_or("", String::as_str)));
            if let Some(year) = attrs.get("grad_year").and_then(|y| normalize_grad_year(y)) {
                put("grad_year", year.to_string());
            }
        }
        DimKind::Team => {
            put("name", normalize_text(attrs.get("name").map_or("", String::as_str)));
            put("organizer", normalize_text(attrs.get("organizer").map_or("", String::as_str)));
            put("school", normalize_school(attrs.get("school").map_or("", String::as_str)));
        }
        DimKind::Competition => {
            put("name", normalize_text(attrs.get("name").map_or("", String::as_str)));
            put("organizer", normalize_text(attrs.get("organizer").map_or("", String::as_str)));
            let season: String = attrs
                .get("season")
                .map_or("", String::as_str)
                .chars()
                .filter(char::is_ascii_digit)
                .collect();
            put("season", season);
        }
        DimKind::Source => {
            put("key", normalize_text(attrs.get("key").map_or("", String::as_str)));
            put("name", normalize_text(attrs.get("name").map_or("", String::as_str)));
        }
    }
    out
}

fn exact_key(kind: DimKind, normalized: &BTreeMap<String, String>) -> String {
    let mut key = String::from(kind.as_str());
    for (k, v) in normalized {
        key.push('|');
        key.push_str(k);
        key.push('=');
        key.push_str(v);
    }
    key
}

/// Disambiguating context for player fuzzy matching: same school, same
/// grad year. Without a school there is no safe scope and no fuzzy match.
fn fuzzy_scope(normalized: &BTreeMap<String, String>) -> Option<String> {
    let school = normalized.get("school")?;
    let grad_year = normalized.get("grad_year").map_or("", String::as_str);
    Some(format!("{school}|{grad_year}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(&IdentityConfig::default())
    }

    #[test]
    fn resolve_is_idempotent() {
        let resolver = resolver();
        let a = resolver.resolve(
            DimKind::Player,
            &attrs(&[("name", "Jon Smith"), ("school", "Lincoln High"), ("grad_year", "2025")]),
        );
        let b = resolver.resolve(
            DimKind::Player,
            &attrs(&[("name", "Jon Smith"), ("school", "Lincoln High"), ("grad_year", "2025")]),
        );
        assert_eq!(a.uid, b.uid);
        assert_eq!(resolver.entity_count(), 1);
    }

    #[test]
    fn school_spelling_variants_hit_exact_path() {
        let resolver = resolver();
        let a = resolver.resolve(
            DimKind::Player,
            &attrs(&[("name", "Jon Smith"), ("school", "Lincoln HS"), ("grad_year", "2025")]),
        );
        let b = resolver.resolve(
            DimKind::Player,
            &attrs(&[("name", "Jon Smith"), ("school", "Lincoln High School"), ("grad_year", "'25")]),
        );
        assert_eq!(a.uid, b.uid);
    }

    #[test]
    fn nickname_variant_merges_within_scope() {
        let resolver = resolver();
        let a = resolver.resolve(
            DimKind::Player,
            &attrs(&[("name", "Jon Smith"), ("school", "Lincoln High"), ("grad_year", "2025")]),
        );
        let b = resolver.resolve(
            DimKind::Player,
            &attrs(&[("name", "Jonathan Smith"), ("school", "Lincoln HS"), ("grad_year", "2025")]),
        );
        assert_eq!(a.uid, b.uid, "spelling variant in same scope must merge");

        // The merged surface form now resolves on the exact path.
        let c = resolver.resolve(
            DimKind::Player,
            &attrs(&[("name", "Jonathan Smith"), ("school", "Lincoln High"), ("grad_year", "2025")]),
        );
        assert_eq!(c.uid, a.uid);
        assert_eq!(resolver.entity_count(), 1);
    }

    #[test]
    fn different_school_never_merges() {
        let resolver = resolver();
        let a = resolver.resolve(
            DimKind::Player,
            &attrs(&[("name", "Jon Smith"), ("school", "Lincoln High"), ("grad_year", "2025")]),
        );
        let b = resolver.resolve(
            DimKind::Player,
            &attrs(&[("name", "Jon Smythe"), ("school", "Central High"), ("grad_year", "2025")]),
        );
        assert_ne!(a.uid, b.uid);
    }

    #[test]
    fn missing_school_disables_fuzzy() {
        let resolver = resolver();
        let a = resolver.resolve(
            DimKind::Player,
            &attrs(&[("name", "Jon Smith"), ("school", "Lincoln High"), ("grad_year", "2025")]),
        );
        let b = resolver.resolve(DimKind::Player, &attrs(&[("name", "Jonathan Smith")]));
        assert_ne!(a.uid, b.uid, "no scope, no fuzzy merge");
    }

    #[test]
    fn teams_with_different_organizers_stay_distinct() {
        let resolver = resolver();
        let a = resolver.resolve(
            DimKind::Team,
            &attrs(&[("name", "Team Takeover"), ("organizer", "Hoopfest Circuit")]),
        );
        let b = resolver.resolve(
            DimKind::Team,
            &attrs(&[("name", "Team Takeover"), ("organizer", "Summer Jam Series")]),
        );
        assert_ne!(a.uid, b.uid);
        assert_eq!(resolver.entity_count(), 2);
    }

    /// Stub scorer with scripted pair scores, for exercising ambiguity.
    struct StubScorer;

    impl NameScorer for StubScorer {
        fn score(&self, a: &str, b: &str) -> f64 {
            if a == b {
                return 1.0;
            }
            // The query "query name" is close to both stored candidates;
            // the stored candidates are unrelated to each other.
            if a == "query name" || b == "query name" {
                0.9
            } else {
                0.1
            }
        }
    }

    fn scoped_attrs(name: &str) -> BTreeMap<String, String> {
        attrs(&[("name", name), ("school", "Lincoln High"), ("grad_year", "2025")])
    }

    #[test]
    fn ambiguous_match_picks_most_recent_and_records_event() {
        let resolver =
            IdentityResolver::with_scorer(&IdentityConfig::default(), Box::new(StubScorer));

        let first = resolver.resolve(DimKind::Player, &scoped_attrs("alpha name"));
        let second = resolver.resolve(DimKind::Player, &scoped_attrs("beta name"));
        assert_ne!(first.uid, second.uid);

        let chosen = resolver.resolve(DimKind::Player, &scoped_attrs("query name"));
        assert_eq!(
            chosen.uid, second.uid,
            "equal scores tie-break to the most recently seen candidate"
        );

        let events = resolver.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].candidates.len(), 2);
        assert_eq!(events[0].chosen, second.uid);
        assert!(resolver.drain_events().is_empty(), "drain empties the log");
    }
}
