//! Error types for external tool execution.

use thiserror::Error;

/// Result type for tool execution.
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors that can occur while running an external tool.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{program} not found in PATH")]
    NotFound { program: String },

    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed with exit code {code}: {stderr}")]
    ToolFailed {
        program: String,
        code: i32,
        stderr: String,
        args: Vec<String>,
    },

    #[error("{program} output line exceeded {limit} bytes")]
    LineTooLong { program: String, limit: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecError {
    /// Create a tool failure error.
    pub fn tool_failed(
        program: impl Into<String>,
        code: i32,
        stderr: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self::ToolFailed {
            program: program.into(),
            code,
            stderr: stderr.into(),
            args,
        }
    }
}
