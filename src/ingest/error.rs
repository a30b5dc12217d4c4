use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a single file or sidecar was left out of a directory's classification.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("failed to stat file: {0}")]
    Stat(#[source] io::Error),

    #[error("failed to read sidecar: {0}")]
    Read(#[source] io::Error),

    #[error("malformed sidecar: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sidecar is not a JSON object")]
    NotAnObject,
}

#[derive(Debug)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: SkipReason,
}
