use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Deterministic entity identifier.
///
/// A `Uid` is a BLAKE3 hash of a kind tag plus the entity's normalized
/// identity attributes — never of insertion order or wall-clock time — so
/// re-ingesting the same inputs always reproduces the same identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uid(pub String);

impl Uid {
    /// Compute a uid from a kind tag and normalized identity attributes.
    ///
    /// Attributes are canonicalized through a `BTreeMap` (sorted keys) and
    /// serialized to JSON before hashing, so attribute insertion order never
    /// affects the result.
    pub fn of(kind: &str, attrs: &[(&str, &str)]) -> Self {
        let canonical: BTreeMap<&str, &str> = attrs.iter().copied().collect();
        let json = serde_json::json!({ "kind": kind, "attrs": canonical });
        let hash = blake3::hash(json.to_string().as_bytes());
        Self(hash.to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines and human-facing output.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_is_deterministic() {
        let a = Uid::of("player", &[("name", "jon smith"), ("school", "lincoln high")]);
        let b = Uid::of("player", &[("name", "jon smith"), ("school", "lincoln high")]);
        assert_eq!(a, b);
    }

    #[test]
    fn uid_ignores_attribute_order() {
        let a = Uid::of("player", &[("name", "jon smith"), ("school", "lincoln high")]);
        let b = Uid::of("player", &[("school", "lincoln high"), ("name", "jon smith")]);
        assert_eq!(a, b);
    }

    #[test]
    fn uid_differs_by_kind() {
        let a = Uid::of("player", &[("name", "takeover")]);
        let b = Uid::of("team", &[("name", "takeover")]);
        assert_ne!(a, b);
    }

    #[test]
    fn uid_differs_by_attrs() {
        let a = Uid::of("team", &[("name", "team takeover"), ("organizer", "hoopfest")]);
        let b = Uid::of("team", &[("name", "team takeover"), ("organizer", "summer jam")]);
        assert_ne!(a, b);
    }
}
