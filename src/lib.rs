pub mod config;
pub mod error;
pub mod gcp_auth;
pub mod image_event;
pub mod notifier;
pub mod object_store;
pub mod safe_search;
pub mod thumbnail_pipeline;
pub mod thumbnail_resizer;
pub mod trigger_handler;

#[cfg(test)]
mod tests;

pub use config::ThumbnailConfig;
pub use error::ThumbnailError;
pub use gcp_auth::AccessTokenSource;
pub use image_event::{ImageEvent, ImageLocation};
pub use notifier::{MemoryPublisher, MessagePublisher, OutgoingMessage, PubSubPublisher};
pub use object_store::{GcsObjectStore, MemoryObjectStore, ObjectStore};
pub use safe_search::{FixedClassifier, ImageClassifier, SafeSearchVerdict, Severity, VisionClassifier};
pub use thumbnail_pipeline::{ThumbnailOutcome, ThumbnailPipeline};
pub use thumbnail_resizer::{make_thumbnail, target_dimensions, Thumbnail};
