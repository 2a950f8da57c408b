//! Announcements of newly stored thumbnails on a Pub/Sub topic

use crate::error::{Result, ThumbnailError};
use crate::gcp_auth::AccessTokenSource;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub const IMAGE_UPDATED_BODY: &[u8] = b"new image to approve!";
pub const IMAGE_ATTRIBUTE: &str = "image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub data: Vec<u8>,
    pub attributes: BTreeMap<String, String>,
}

impl OutgoingMessage {
    /// Fixed announcement carrying the name of the uploaded (source) object
    pub fn image_updated(object_name: &str) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(IMAGE_ATTRIBUTE.to_string(), object_name.to_string());
        Self {
            data: IMAGE_UPDATED_BODY.to_vec(),
            attributes,
        }
    }
}

#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish and wait for the acknowledgment; returns the message id
    async fn publish(&self, message: &OutgoingMessage) -> Result<String>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Pub/Sub REST publisher bound to a single topic
pub struct PubSubPublisher {
    client: Client,
    base_url: String,
    topic_path: String,
    auth: AccessTokenSource,
}

impl PubSubPublisher {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        project_id: &str,
        topic_id: &str,
        auth: AccessTokenSource,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            topic_path: topic_path(project_id, topic_id),
            auth,
        }
    }

    pub fn topic_path(&self) -> &str {
        &self.topic_path
    }
}

pub fn topic_path(project_id: &str, topic_id: &str) -> String {
    format!("projects/{project_id}/topics/{topic_id}")
}

#[async_trait]
impl MessagePublisher for PubSubPublisher {
    async fn publish(&self, message: &OutgoingMessage) -> Result<String> {
        let url = format!(
            "{}/v1/{}:publish",
            self.base_url.trim_end_matches('/'),
            self.topic_path
        );
        let body = json!({
            "messages": [{
                "data": general_purpose::STANDARD.encode(&message.data),
                "attributes": message.attributes,
            }]
        });

        debug!("Publishing to {}", self.topic_path);
        let request = self
            .auth
            .authorize(self.client.post(&url).json(&body))
            .await?;
        let response = request
            .send()
            .await
            .map_err(|e| ThumbnailError::Publish(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ThumbnailError::Publish(format!("HTTP error: {status}: {text}")));
        }

        let published: PublishResponse = response
            .json()
            .await
            .map_err(|e| ThumbnailError::Publish(format!("malformed response: {e}")))?;

        let message_id = published
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| ThumbnailError::Publish("no message id returned".to_string()))?;

        info!("Published message {} to {}", message_id, self.topic_path);
        Ok(message_id)
    }
}

/// Publisher that records messages in memory
#[derive(Default)]
pub struct MemoryPublisher {
    messages: RwLock<Vec<OutgoingMessage>>,
    fail: bool,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn messages(&self) -> Vec<OutgoingMessage> {
        self.messages.read().await.clone()
    }
}

#[async_trait]
impl MessagePublisher for MemoryPublisher {
    async fn publish(&self, message: &OutgoingMessage) -> Result<String> {
        if self.fail {
            return Err(ThumbnailError::Publish("topic unavailable".to_string()));
        }

        let mut messages = self.messages.write().await;
        messages.push(message.clone());
        Ok(messages.len().to_string())
    }
}
