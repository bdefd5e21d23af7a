use std::path::PathBuf;

/// Everything that can go wrong between picking a file and hearing it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("audio output unavailable: {0}")]
    Output(String),

    #[error("seek failed: {0}")]
    Seek(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("logging setup failed: {0}")]
    Logging(String),

    /// The audio thread is gone, usually because the app is shutting down.
    #[error("audio backend disconnected")]
    Backend,

    #[error("no source loaded")]
    NoSource,
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
