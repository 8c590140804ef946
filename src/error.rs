use std::path::PathBuf;

use thiserror::Error;

/// Failures while driving the source page.
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("source page {url} could not be loaded: {reason}")]
    PageUnreachable { url: String, reason: String },

    #[error("date selector #{0} not present on page")]
    ControlMissing(String),

    #[error("could not select sale date {label}: {reason}")]
    SelectionFailed { label: String, reason: String },

    #[error("browser error: {0}")]
    Browser(String),
}

/// Why a single address did not resolve. Never aborts a run.
#[derive(Debug, Error)]
pub enum GeocodeFailure {
    #[error("geocoding request failed: {0}")]
    Network(String),

    #[error("geocoder answered with status {0}")]
    Status(String),

    #[error("geocoder returned no results")]
    NoResults,

    #[error("unexpected geocoder response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for GeocodeFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GeocodeFailure::Malformed(err.to_string())
        } else {
            GeocodeFailure::Network(err.to_string())
        }
    }
}

/// The dataset could not be written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize dataset: {0}")]
    Serialize(#[from] serde_json::Error),
}
