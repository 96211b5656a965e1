use thiserror::Error;

#[derive(Error, Debug)]
pub enum CourierError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    /// A checkpoint exists but does not validate. `revision` is the stored
    /// revision, so a caller that recovers with the default state can still
    /// write back with compare-and-swap.
    #[error("Checkpoint is corrupt (revision {revision}): {reason}")]
    StateCorrupt { revision: i64, reason: String },

    #[error("Failed to persist checkpoint: {0}")]
    StatePersist(String),

    #[error("Failed to send notification: {0}")]
    Send(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("A check is already running")]
    RunInProgress,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CourierError>;
