//! Error types for argument resolution and run execution.
//!
//! Resolution failures are wrapped in [`ArgumentError`] so the binary can
//! report every one of them the same way: naming the argument that caused it.
//! Execution and persistence failures travel as [`Error`] up to `main`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::ModelError;
use crate::transform::TransformError;

/// Every failure the pipeline can surface.
#[derive(Debug, Error)]
pub enum Error {
    /// A `--book` path could not be classified or listed.
    #[error("{}: {source}", path.display())]
    PathResolution {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A transform name is unknown, malformed, or its definition is unusable.
    #[error("{name:?}: {reason}")]
    NameResolution { name: String, reason: String },

    /// A list file of transform names could not be read.
    #[error("cannot read list {}: {source}", path.display())]
    ListFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A run parameter failed a validation rule.
    #[error("{0}")]
    Validation(String),

    /// A transform failed while applied to data.
    #[error("transform {transform:?} failed: {source}")]
    Execution {
        transform: String,
        #[source]
        source: TransformError,
    },

    /// The graph model could not be loaded, parsed, or saved.
    #[error("{}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: ModelError,
    },
}

impl Error {
    pub fn name_resolution(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::NameResolution {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Stable short label, used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::PathResolution { .. } => "path_resolution",
            Error::NameResolution { .. } => "name_resolution",
            Error::ListFile { .. } => "list_file",
            Error::Validation(_) => "validation",
            Error::Execution { .. } => "execution",
            Error::Persistence { .. } => "persistence",
        }
    }
}

/// A resolution failure attributed to one command line argument.
#[derive(Debug, Error)]
#[error("{argument} argument: {source}")]
pub struct ArgumentError {
    pub argument: String,
    #[source]
    pub source: Error,
}

impl ArgumentError {
    pub fn new(argument: impl Into<String>, source: Error) -> Self {
        Self {
            argument: argument.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
