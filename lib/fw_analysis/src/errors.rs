//! Analysis errors definition.

use fw_model::errors::ModelError;
use regex::Error as RegexError;
use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("program model error: {0}")]
    Model(#[from] ModelError),

    #[error("regex error: {0}")]
    Regex(#[from] RegexError),

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("the method has no implementation")]
    NoCode,

    /// The analysis was aborted through its cancellation token. No partial
    /// result is produced in this case.
    #[error("analysis cancelled")]
    Cancelled,

    #[error("invalid option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },
}

impl AnalysisError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
