//! Error types for jobby.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A store operation failed. Callers decide whether to retry.
    #[error("store error: {0}")]
    Store(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The connection handle was closed by `disconnect`.
    #[error("store connection closed")]
    Closed,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("worker already started")]
    AlreadyStarted,

    #[error("worker disconnected")]
    Disconnected,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Store-level failures that are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Redis(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
