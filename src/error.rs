// src/error.rs
// Domain error taxonomy for the analysis pipeline. Only InvalidInput ever
// reaches the client as an error; everything else is recovered internally.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Empty or over-length text; rejected before the pipeline runs.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Startup-time knowledge base problem. Logged and replaced with safe
    /// defaults; kept in the taxonomy for callers that load KBs directly.
    #[error("knowledge base load failure: {0}")]
    ConfigLoad(String),
}
