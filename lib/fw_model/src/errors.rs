//! Program model errors definitions.

use std::io;
use thiserror::Error;

/// An alias for result that can be a [`ModelError`].
pub type ModelResult<T> = Result<T, ModelError>;

/// The program model error type.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Error that can be returned when doing [std::io](I/O) operations.
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    /// Error that can be returned when the program document is not valid JSON
    /// or does not match the expected schema.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A method body does not describe a well-formed control flow graph.
    #[error("invalid body for method {method}: {reason}")]
    InvalidBody { method: String, reason: String },

    #[error("duplicate class definition: {0}")]
    DuplicateClass(String),

    #[error("duplicate method definition: {0}")]
    DuplicateMethod(String),
}
