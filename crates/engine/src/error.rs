//! Error types for action registration and execution.

use std::{io, path::PathBuf};

use actionflow_types::ParamError;
use thiserror::Error;

/// Result alias used throughout the engine.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Faults raised while registering or running actions.
///
/// None of them are retried; every one aborts the run that raised it.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("action '{action}' has no body")]
    MissingBody { action: String },

    #[error("action '{action}' declares {kind} '{name}' more than once")]
    DuplicateDeclaration { action: String, kind: &'static str, name: String },

    #[error("action '{action}' declares an output without a name")]
    EmptyOutputName { action: String },

    #[error("cascade dependencies form a cycle: {}", path.join(" -> "))]
    CascadeCycle { path: Vec<String> },

    #[error("value for '{name}' has type {actual}, which is not an instance of {expected}")]
    TypeMismatch { name: String, expected: String, actual: String },

    #[error("Missing required parameter '{name}' for action '{action}'")]
    MissingParameter { action: String, name: String },

    #[error("action '{action}' returned {actual} outputs but declares {expected}")]
    ShapeMismatch { action: String, expected: usize, actual: usize },

    #[error("action '{action}' returned output '{actual}' at position {position}, expected '{expected}'")]
    OutputNameMismatch {
        action: String,
        position: usize,
        expected: String,
        actual: String,
    },

    #[error("unknown action '{name}'")]
    UnknownAction { name: String },

    #[error("action '{action}' has no input named '{name}'")]
    UnknownParameter { action: String, name: String },

    #[error("action '{action}' takes {expected} inputs but {actual} positional values were supplied")]
    TooManyArguments { action: String, expected: usize, actual: usize },

    #[error("selection policy chose nothing among {candidates} candidates")]
    NoSelection { candidates: usize },

    #[error("selection policy chose index {index} among {candidates} candidates")]
    InvalidSelection { index: usize, candidates: usize },

    #[error("run exceeded {limit} iterations without reaching a terminal action")]
    IterationLimit { limit: u64 },

    #[error("action '{action}' failed: {source}")]
    ActionFailed {
        action: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("could not start a runtime for a suspendable action: {0}")]
    Runtime(#[source] io::Error),

    #[error("failed to read engine config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse engine config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Param(#[from] ParamError),
}

impl EngineError {
    /// Whether the fault was raised while registering rather than running.
    pub fn is_declaration_fault(&self) -> bool {
        matches!(
            self,
            Self::MissingBody { .. } | Self::DuplicateDeclaration { .. } | Self::EmptyOutputName { .. } | Self::CascadeCycle { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_the_path() {
        let error = EngineError::CascadeCycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(error.to_string(), "cascade dependencies form a cycle: a -> b -> a");
        assert!(error.is_declaration_fault());
    }

    #[test]
    fn action_failures_keep_their_source() {
        let error = EngineError::ActionFailed {
            action: "fetch".into(),
            source: anyhow::anyhow!("connection refused"),
        };
        assert_eq!(error.to_string(), "action 'fetch' failed: connection refused");
        assert!(std::error::Error::source(&error).is_some());
        assert!(!error.is_declaration_fault());
    }
}
