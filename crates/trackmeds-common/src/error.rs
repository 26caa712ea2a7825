use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("invalid medication: {0}")]
    InvalidMedication(String),

    #[error("notification service unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("malformed notification event: {0}")]
    MalformedEvent(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
