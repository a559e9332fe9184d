//! Performance analysis: percentile grading, data-only aggregation,
//! optional AI pattern commentary, and feed-forward guidance.

use thiserror::Error;

pub mod aggregate;
pub mod grading;
pub mod patterns;
pub mod runner;

pub use aggregate::{aggregate, Aggregates};
pub use grading::{grade_rate, percentile_rank, Grade};
pub use patterns::{propose_patterns, validate_patterns, Pattern, PatternSet};
pub use runner::{build_guidance, run_analysis, AnalystReport, HISTORY_LIMIT};

#[derive(Debug, Error)]
pub enum AnalystError {
    #[error(transparent)]
    Db(#[from] pressroom_db::DbError),
}
