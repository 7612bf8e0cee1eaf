pub mod report;
pub mod scheme;

pub use report::{classify, filter_indices, score, Badge, Outcome, ReviewFilter, ScoreReport};
pub use scheme::{MarkingScheme, ScorePolicy};
