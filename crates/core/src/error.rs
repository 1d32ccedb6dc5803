use thiserror::Error;

pub type ReachResult<T> = Result<T, ReachError>;

#[derive(Error, Debug)]
pub enum ReachError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed campaign payload: {0}")]
    Payload(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid event name: {0}")]
    EventName(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
