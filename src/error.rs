use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// An expected input artifact is not on disk.
    #[error("input not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    /// The user (or an answer script) supplied something unusable.
    #[error("invalid input: {0}")]
    InvalidUserInput(String),

    /// An external HEASoft / HENDRICS process failed or produced nothing.
    #[error("{tool} failed: {detail}")]
    ExternalToolFailure { tool: String, detail: String },

    /// Numeric data that cannot be processed (empty or zero-mean profile, bad rows).
    #[error("data error: {0}")]
    Data(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("timing parameters not found for {0}")]
    TimingParametersNotFound(String),

    #[error("plot error: {0}")]
    Plot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn input_not_found(path: impl Into<PathBuf>) -> Self {
        PipelineError::InputNotFound { path: path.into() }
    }

    pub fn tool(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        PipelineError::ExternalToolFailure {
            tool: tool.into(),
            detail: detail.into(),
        }
    }
}
