use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the engine outside of individual test outcomes.
///
/// Test and hook failures never surface here; they are recorded on the
/// run report instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid glob pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("no active test file")]
    NoActiveFile,

    #[error("failed to import {path}: {message}")]
    Import { path: PathBuf, message: String },

    #[error("coverage unavailable: {0}")]
    Coverage(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn pattern(pattern: impl Into<String>, source: glob::PatternError) -> Self {
        Error::Pattern {
            pattern: pattern.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
