//! Errors that stop evaluation of a script
//!
//! Semantic diagnostics are not errors: they are returned with the
//! operations in [`crate::EvaluationOutcome`].

use std::path::PathBuf;

use dcl_core::{ContextError, ParseFailures};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The script has no syntax tree
    #[error(transparent)]
    Parse(#[from] ParseFailures),

    /// The script context or its schemas are unusable
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("Failed to read script '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EvaluationError {
    /// Whether the caller, not the script author, is at fault
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            EvaluationError::Context(ContextError::ContractViolation { .. })
        )
    }
}
