//! The per-upload pipeline: classify, fetch, resize, store, announce

use crate::config::ThumbnailConfig;
use crate::error::{Result, ThumbnailError};
use crate::gcp_auth::AccessTokenSource;
use crate::image_event::ImageEvent;
use crate::notifier::{MessagePublisher, OutgoingMessage, PubSubPublisher};
use crate::object_store::{GcsObjectStore, ObjectStore};
use crate::safe_search::{ImageClassifier, SafeSearchVerdict, VisionClassifier};
use crate::thumbnail_resizer::make_thumbnail;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How an invocation ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ThumbnailOutcome {
    /// Classified as inappropriate; nothing was written
    Rejected { verdict: SafeSearchVerdict },
    Completed {
        destination_bucket: String,
        destination_object_name: String,
        resized: bool,
        width: u32,
        height: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
}

/// Long-lived handles shared by every invocation
#[derive(Clone)]
pub struct ThumbnailPipeline {
    classifier: Arc<dyn ImageClassifier>,
    store: Arc<dyn ObjectStore>,
    publisher: Option<Arc<dyn MessagePublisher>>,
    destination_bucket: String,
    prefix: String,
    max_width: u32,
}

impl fmt::Debug for ThumbnailPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailPipeline")
            .field("destination_bucket", &self.destination_bucket)
            .field("prefix", &self.prefix)
            .field("max_width", &self.max_width)
            .field("notify", &self.publisher.is_some())
            .finish()
    }
}

impl ThumbnailPipeline {
    pub fn new(
        config: &ThumbnailConfig,
        classifier: Arc<dyn ImageClassifier>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            classifier,
            store,
            publisher: None,
            destination_bucket: config.destination_bucket.clone(),
            prefix: config.prefix.clone(),
            max_width: config.max_width,
        }
    }

    /// Announce every stored thumbnail through `publisher`
    pub fn with_publisher(mut self, publisher: Arc<dyn MessagePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Wire up the Google Cloud clients described by `config`
    pub fn from_config(config: &ThumbnailConfig, auth: AccessTokenSource) -> Result<Self> {
        let client = config.http_client()?;

        let classifier = Arc::new(VisionClassifier::new(
            client.clone(),
            config.vision_base_url.clone(),
            auth.clone(),
        ));
        let store = Arc::new(GcsObjectStore::new(
            client.clone(),
            &config.storage_base_url,
            auth.clone(),
        )?);

        let pipeline = Self::new(config, classifier, store);
        if !config.notify_enabled {
            return Ok(pipeline);
        }

        let publisher = Arc::new(PubSubPublisher::new(
            client,
            config.pubsub_base_url.clone(),
            &config.project_id,
            &config.topic_id,
            auth,
        ));
        Ok(pipeline.with_publisher(publisher))
    }

    pub fn notifies(&self) -> bool {
        self.publisher.is_some()
    }

    /// Run one invocation. Every failure is returned to the caller untouched.
    pub async fn handle(&self, event: &ImageEvent) -> Result<ThumbnailOutcome> {
        let name = &event.object_name;

        info!("Analyzing {} with safe search", name);
        let verdict = self.classifier.classify(&event.location()).await?;
        if !verdict.is_safe() {
            info!(
                "The image {} was detected as inappropriate (adult={}, violence={})",
                name, verdict.adult, verdict.violence
            );
            return Ok(ThumbnailOutcome::Rejected { verdict });
        }
        info!("The image {} was detected as appropriate, proceeding to resize", name);

        let source = self
            .store
            .get_object(&event.bucket_name, &event.object_name)
            .await?;
        debug!("Fetched {} bytes for {}", source.len(), name);

        let max_width = self.max_width;
        let thumbnail = tokio::task::spawn_blocking(move || make_thumbnail(source, max_width))
            .await
            .map_err(|e| ThumbnailError::Decode(format!("resize task failed: {e}")))??;
        if !thumbnail.resized {
            debug!("Keeping {} at {}x{}", name, thumbnail.width, thumbnail.height);
        }

        let destination_object_name = event.destination_object_name(&self.prefix);
        self.store
            .put_object(
                &self.destination_bucket,
                &destination_object_name,
                thumbnail.data.clone(),
                thumbnail.content_type(),
            )
            .await?;
        info!(
            "Stored gs://{}/{}",
            self.destination_bucket, destination_object_name
        );

        let message_id = match &self.publisher {
            Some(publisher) => {
                let message = OutgoingMessage::image_updated(name);
                let id = publisher.publish(&message).await.inspect_err(|e| {
                    warn!("Thumbnail stored but announcement failed for {}: {}", name, e);
                })?;
                Some(id)
            }
            None => None,
        };

        Ok(ThumbnailOutcome::Completed {
            destination_bucket: self.destination_bucket.clone(),
            destination_object_name,
            resized: thumbnail.resized,
            width: thumbnail.width,
            height: thumbnail.height,
            message_id,
        })
    }
}
