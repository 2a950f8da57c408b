//! Trigger payload parsing and the per-invocation image event

use crate::error::{Result, ThumbnailError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Object fields consulted from a storage notification; everything else is ignored
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageObjectData {
    pub bucket: String,
    pub name: String,
}

/// Accepts both the bare storage object and a CloudEvent carrying it under `data`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TriggerPayload {
    Envelope { data: StorageObjectData },
    Object(StorageObjectData),
}

/// A newly created object that should become a thumbnail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEvent {
    pub bucket_name: String,
    pub object_name: String,
}

impl ImageEvent {
    pub fn new(bucket_name: impl Into<String>, object_name: impl Into<String>) -> Result<Self> {
        let bucket_name = bucket_name.into();
        let object_name = object_name.into();

        if bucket_name.trim().is_empty() {
            return Err(ThumbnailError::InvalidPayload(
                "missing bucket".to_string(),
            ));
        }
        if object_name.trim().is_empty() {
            return Err(ThumbnailError::InvalidPayload("missing name".to_string()));
        }

        Ok(Self {
            bucket_name,
            object_name,
        })
    }

    /// Parse a trigger payload body
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let payload: TriggerPayload = serde_json::from_slice(body)
            .map_err(|e| ThumbnailError::InvalidPayload(e.to_string()))?;

        let data = match payload {
            TriggerPayload::Envelope { data } => data,
            TriggerPayload::Object(data) => data,
        };

        Self::new(data.bucket, data.name)
    }

    /// Load a trigger payload saved to disk
    pub fn from_payload_file(path: &Path) -> Result<Self> {
        let body = std::fs::read(path).map_err(|e| {
            ThumbnailError::InvalidPayload(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&body)
    }

    /// Name of the thumbnail in the destination bucket
    pub fn destination_object_name(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.object_name)
    }

    pub fn location(&self) -> ImageLocation {
        ImageLocation {
            bucket: self.bucket_name.clone(),
            name: self.object_name.clone(),
        }
    }
}

/// Location of an object as understood by the classification service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLocation {
    pub bucket: String,
    pub name: String,
}

impl ImageLocation {
    pub fn uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.name)
    }
}

impl fmt::Display for ImageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}
