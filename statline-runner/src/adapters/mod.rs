//! Adapter registry — explicit compile-time mapping from a stable source
//! key to an adapter constructor. No reflection, no string-to-type magic
//! beyond this one match.

pub mod eventwire;
pub mod scorefeed;

use statline_core::adapter::SourceAdapter;
use thiserror::Error;

pub use eventwire::EventwireAdapter;
pub use scorefeed::ScorefeedAdapter;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown source '{src}'. Valid sources: {sources}", src = .0, sources = known_sources().join(", "))]
    UnknownSource(String),
}

/// All registered source keys.
pub fn known_sources() -> Vec<&'static str> {
    vec!["scorefeed", "eventwire"]
}

/// Construct an adapter by its stable key.
pub fn create_adapter(key: &str) -> Result<Box<dyn SourceAdapter>, RegistryError> {
    match key {
        "scorefeed" => Ok(Box::new(ScorefeedAdapter)),
        "eventwire" => Ok(Box::new(EventwireAdapter)),
        other => Err(RegistryError::UnknownSource(other.to_string())),
    }
}
