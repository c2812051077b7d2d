//! Pluggable similarity scoring for fuzzy identity matching.
//!
//! The matching policy (algorithm + threshold) is configuration, not code
//! baked into the resolver, so it can be swapped and tested independently.

use strsim::jaro_winkler;

/// Scores how likely two normalized names refer to the same entity.
/// 1.0 is identical; scores at or above the resolver's threshold merge.
pub trait NameScorer: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Jaro-Winkler over name tokens.
///
/// Surnames vary less than given names across sources ("Jon" vs
/// "Jonathan"), so the last token is weighted heavier than the first.
/// Single-token names fall back to whole-string comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinklerScorer;

impl JaroWinklerScorer {
    const FIRST_WEIGHT: f64 = 0.4;
    const LAST_WEIGHT: f64 = 0.6;
}

impl NameScorer for JaroWinklerScorer {
    fn score(&self, a: &str, b: &str) -> f64 {
        let a_tokens: Vec<&str> = a.split(' ').filter(|t| !t.is_empty()).collect();
        let b_tokens: Vec<&str> = b.split(' ').filter(|t| !t.is_empty()).collect();

        if a_tokens.len() < 2 || b_tokens.len() < 2 {
            return jaro_winkler(a, b);
        }

        let first = jaro_winkler(a_tokens[0], b_tokens[0]);
        let last = jaro_winkler(
            a_tokens[a_tokens.len() - 1],
            b_tokens[b_tokens.len() - 1],
        );
        Self::FIRST_WEIGHT * first + Self::LAST_WEIGHT * last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_names_score_one() {
        let scorer = JaroWinklerScorer;
        assert!((scorer.score("jon smith", "jon smith") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn nickname_variant_scores_above_default_threshold() {
        let scorer = JaroWinklerScorer;
        let score = scorer.score("jon smith", "jonathan smith");
        assert!(score >= 0.85, "got {score}");
    }

    #[test]
    fn unrelated_names_score_low() {
        let scorer = JaroWinklerScorer;
        let score = scorer.score("jon smith", "marcus delgado");
        assert!(score < 0.7, "got {score}");
    }

    #[test]
    fn single_token_falls_back_to_whole_string() {
        let scorer = JaroWinklerScorer;
        let score = scorer.score("takeover", "takeover");
        assert!((score - 1.0).abs() < 1e-9);
    }
}
