//! Error types for repository access.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving or reading a repository.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// No registry file in the repository or any of its parents.
    #[error("Could not find registry file '{registry_name}' from repository {repo}")]
    RegistryNotFound {
        repo: PathBuf,
        registry_name: String,
    },

    /// A data product needed by a stage has not been written yet.
    #[error("Required artifact not found: {path}")]
    ArtifactNotFound { path: PathBuf },

    /// A data product exists but cannot be understood.
    #[error("Failed to parse artifact {path}: {message}")]
    ArtifactInvalid { path: PathBuf, message: String },

    /// Registry query failed.
    #[error("Registry query failed: {0}")]
    Registry(#[from] rusqlite::Error),

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl RepositoryError {
    /// Create a registry not found error.
    pub fn registry_not_found(repo: impl Into<PathBuf>, registry_name: impl Into<String>) -> Self {
        Self::RegistryNotFound {
            repo: repo.into(),
            registry_name: registry_name.into(),
        }
    }

    /// Create an artifact not found error.
    pub fn artifact_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ArtifactNotFound { path: path.into() }
    }

    /// Create an artifact parse error.
    pub fn artifact_invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ArtifactInvalid {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;
