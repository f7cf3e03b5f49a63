use thiserror::Error;

use crate::grid::GridError;

/// Unified result type for the gridsync crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the lifecycle engine.
///
/// `NotReady` is deliberately separate from the failure variants: it marks a
/// dependency that has not appeared yet (grid root absent, library still
/// loading) and callers treat it as "retry on a later cycle", never as an
/// error worth logging.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("dependency not ready")]
    NotReady,
    #[error("grid library error: {0}")]
    Grid(#[from] GridError),
}

impl EngineError {
    /// True for conditions that resolve themselves on a later cycle.
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            EngineError::NotReady | EngineError::Grid(GridError::NotLoaded)
        )
    }
}
