use crate::meters::RowError;

/// Core error type shared by the workspace.
///
/// Adapter crates map their specific errors into this type so the bot core can
/// render failures consistently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt row: {0}")]
    CorruptRow(#[from] RowError),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
