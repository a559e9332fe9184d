//! The content pipeline: phase state machine, deterministic scorer,
//! and the step / full-run / enhancement runners that drive drafts
//! from keyword to reservoir.

use thiserror::Error;

pub mod budget;
pub mod diagnose;
pub mod enhance;
pub mod full_runner;
pub mod phase;
pub mod phases;
pub mod publish;
pub mod scorer;
pub mod step_runner;

#[cfg(test)]
pub(crate) mod test_support;

pub use budget::RunBudget;
pub use diagnose::{diagnose, Diagnosis};
pub use enhance::{
    diagnose_weaknesses, enhance_draft, run_enhancement, split_revision, EnhancementReport,
    REVISED_DESCRIPTION_SENTINEL,
};
pub use full_runner::{run_full, FullRunDeps, FullRunOutcome, FullRunReport, RunStep};
pub use phase::{
    ArticleOutline, OutlineSection, Phase, PhaseFailure, PhaseOutcome, PhaseOutput, ResearchData,
    SectionDraft, SeoMetadata,
};
pub use phases::{run_phase, PhaseContext};
pub use publish::{PublishError, PublishedArticle, Publisher, StagingPublisher};
pub use scorer::{
    readability_estimate, score_article, ScoreBreakdown, AFFILIATE_MARKER, INTERNAL_LINK_MARKER,
};
pub use step_runner::{run_step, StepOutcome, MAX_PHASE_ATTEMPTS, STEP_RUNNER_LEASE};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Db(#[from] pressroom_db::DbError),
    #[error("unknown site '{0}'")]
    UnknownSite(String),
    #[error(transparent)]
    Phase(#[from] phase::PhaseFailure),
    #[error("{0}")]
    NotEnhanceable(String),
}
