use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum ThumbnailError {
    InvalidPayload(String),
    Config(String),
    Auth(String),
    Classification(String),
    ObjectNotFound { bucket: String, name: String },
    StorageRead(String),
    Decode(String),
    Encode(String),
    StorageWrite(String),
    Publish(String),
}

impl fmt::Display for ThumbnailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThumbnailError::InvalidPayload(msg) => write!(f, "Invalid trigger payload: {msg}"),
            ThumbnailError::Config(msg) => write!(f, "Configuration error: {msg}"),
            ThumbnailError::Auth(msg) => write!(f, "Authentication error: {msg}"),
            ThumbnailError::Classification(msg) => write!(f, "Classification failed: {msg}"),
            ThumbnailError::ObjectNotFound { bucket, name } => {
                write!(f, "Object not found: gs://{bucket}/{name}")
            }
            ThumbnailError::StorageRead(msg) => write!(f, "Storage read failed: {msg}"),
            ThumbnailError::Decode(msg) => write!(f, "Image decode failed: {msg}"),
            ThumbnailError::Encode(msg) => write!(f, "Image encode failed: {msg}"),
            ThumbnailError::StorageWrite(msg) => write!(f, "Storage write failed: {msg}"),
            ThumbnailError::Publish(msg) => write!(f, "Publish failed: {msg}"),
        }
    }
}

impl Error for ThumbnailError {}

pub type Result<T, E = ThumbnailError> = std::result::Result<T, E>;
