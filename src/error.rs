use std::io;
use thiserror::Error;

/// Errors surfaced by model loading, training, and cache persistence.
///
/// Correction calls themselves never fail: every degenerate input degrades
/// to "return the token unchanged".
#[derive(Debug, Error)]
pub enum SpellError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("language model (de)serialization failed: {0}")]
    Model(#[from] bincode::Error),

    #[error("report serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cache file rejected: {0}")]
    CacheFormat(&'static str),

    #[error("cache not built: both deletion filters must be populated before saving")]
    CacheEmpty,

    #[error("alphabet file {0:?} contains no usable characters")]
    EmptyAlphabet(std::path::PathBuf),

    #[error("training corpus {0:?} produced an empty vocabulary")]
    EmptyCorpus(std::path::PathBuf),
}

pub type Result<T> = std::result::Result<T, SpellError>;
