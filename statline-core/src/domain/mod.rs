//! Domain types: raw records, uids, canonical dimension and fact rows,
//! categorical vocabularies.

pub mod entity;
pub mod fact;
pub mod ids;
pub mod record;
pub mod vocab;

pub use entity::{CompetitionRow, MergeSighting, PlayerRow, SourceRow, TeamRow};
pub use fact::{BoxScoreRow, CorrectionRow, EventRow, GameRow, Lineage, RosterRow};
pub use ids::Uid;
pub use record::{EntityKind, RawRecord};
pub use vocab::{Gender, Level, SourceClass};
