//! Identity resolution: normalization, similarity scoring, and the
//! resolver that assigns stable uids across sources and time.

pub mod normalize;
pub mod resolver;
pub mod similarity;

pub use resolver::{AmbiguousMatch, DimKind, IdentityResolver, Resolution};
pub use similarity::{JaroWinklerScorer, NameScorer};
