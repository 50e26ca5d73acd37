//! Error types for the orchestrator.
//!
//! Only problems that stop the pipeline from being built (or images from
//! being ingested) are errors. Failed stage invocations are recorded in the
//! failure log instead.

use thiserror::Error;

use crate::command::FailureDetail;
use crate::repository::RepositoryError;

/// Top-level pipeline error.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Run parameters could not be derived from the repository.
    #[error("Failed to read run parameters: {0}")]
    Repository(#[from] RepositoryError),

    /// Raw image ingestion did not succeed.
    #[error("Image ingestion failed: {detail}")]
    IngestFailed { detail: FailureDetail },
}

impl PipelineError {
    /// Create an ingestion failed error.
    pub fn ingest_failed(detail: FailureDetail) -> Self {
        Self::IngestFailed { detail }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
