//! Safe-search classification of uploaded images

use crate::error::{Result, ThumbnailError};
use crate::gcp_auth::AccessTokenSource;
use crate::image_event::ImageLocation;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Ordinal likelihood bucket reported per content category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize, Serialize)]
#[serde(try_from = "RawSeverity", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Unknown = 0,
    VeryUnlikely = 1,
    Unlikely = 2,
    Possible = 3,
    Likely = 4,
    VeryLikely = 5,
}

impl Severity {
    pub const MAX: Severity = Severity::VeryLikely;

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn from_value(value: i64) -> Option<Self> {
        Some(match value {
            0 => Severity::Unknown,
            1 => Severity::VeryUnlikely,
            2 => Severity::Unlikely,
            3 => Severity::Possible,
            4 => Severity::Likely,
            5 => Severity::VeryLikely,
            _ => return None,
        })
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "UNKNOWN" => Severity::Unknown,
            "VERY_UNLIKELY" => Severity::VeryUnlikely,
            "UNLIKELY" => Severity::Unlikely,
            "POSSIBLE" => Severity::Possible,
            "LIKELY" => Severity::Likely,
            "VERY_LIKELY" => Severity::VeryLikely,
            _ => return None,
        })
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.value())
    }
}

/// The API may send enum names or their numeric values
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSeverity {
    Number(i64),
    Name(String),
}

impl TryFrom<RawSeverity> for Severity {
    type Error = String;

    fn try_from(raw: RawSeverity) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawSeverity::Number(n) => {
                Severity::from_value(n).ok_or_else(|| format!("severity out of range: {n}"))
            }
            RawSeverity::Name(name) => {
                Severity::from_name(&name).ok_or_else(|| format!("unknown severity: {name}"))
            }
        }
    }
}

/// Adult and violence severities for one image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct SafeSearchVerdict {
    #[serde(default)]
    pub adult: Severity,
    #[serde(default)]
    pub violence: Severity,
}

impl SafeSearchVerdict {
    pub fn new(adult: Severity, violence: Severity) -> Self {
        Self { adult, violence }
    }

    /// Unsafe only when a category sits in the top bucket. `Likely` still passes.
    pub fn is_safe(&self) -> bool {
        !(self.adult == Severity::MAX || self.violence == Severity::MAX)
    }
}

/// Remote image classification service
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify(&self, location: &ImageLocation) -> Result<SafeSearchVerdict>;
}

/// Classifier answering every request with the same verdict, or failing
pub struct FixedClassifier {
    verdict: Option<SafeSearchVerdict>,
    calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(verdict: SafeSearchVerdict) -> Self {
        Self {
            verdict: Some(verdict),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            verdict: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ImageClassifier for FixedClassifier {
    async fn classify(&self, location: &ImageLocation) -> Result<SafeSearchVerdict> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.verdict.ok_or_else(|| {
            ThumbnailError::Classification(format!("service unavailable for {location}"))
        })
    }
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    safe_search_annotation: Option<SafeSearchVerdict>,
    error: Option<ApiStatus>,
}

#[derive(Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Extract the verdict from an `images:annotate` response body
pub fn parse_annotate_response(body: &[u8]) -> Result<SafeSearchVerdict> {
    let response: AnnotateResponse = serde_json::from_slice(body)
        .map_err(|e| ThumbnailError::Classification(format!("malformed response: {e}")))?;

    let first = response
        .responses
        .into_iter()
        .next()
        .ok_or_else(|| ThumbnailError::Classification("empty response".to_string()))?;

    if let Some(status) = first.error {
        return Err(ThumbnailError::Classification(format!(
            "service error {}: {}",
            status.code, status.message
        )));
    }

    first
        .safe_search_annotation
        .ok_or_else(|| ThumbnailError::Classification("no safe search annotation".to_string()))
}

/// Cloud Vision safe-search detection over REST
pub struct VisionClassifier {
    client: Client,
    base_url: String,
    auth: AccessTokenSource,
}

impl VisionClassifier {
    pub fn new(client: Client, base_url: impl Into<String>, auth: AccessTokenSource) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            auth,
        }
    }
}

#[async_trait]
impl ImageClassifier for VisionClassifier {
    async fn classify(&self, location: &ImageLocation) -> Result<SafeSearchVerdict> {
        let url = format!("{}/v1/images:annotate", self.base_url.trim_end_matches('/'));
        let body = json!({
            "requests": [{
                "image": {"source": {"imageUri": location.uri()}},
                "features": [{"type": "SAFE_SEARCH_DETECTION"}]
            }]
        });

        debug!("Requesting safe search annotation for {}", location);
        let request = self
            .auth
            .authorize(self.client.post(&url).json(&body))
            .await?;

        let response = request
            .send()
            .await
            .map_err(|e| ThumbnailError::Classification(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ThumbnailError::Classification(e.to_string()))?;

        if !status.is_success() {
            return Err(ThumbnailError::Classification(format!(
                "HTTP error: {status}: {}",
                String::from_utf8_lossy(&bytes)
            )));
        }

        let verdict = parse_annotate_response(&bytes)?;
        info!(
            "Safe search for {}: adult={} violence={}",
            location, verdict.adult, verdict.violence
        );
        Ok(verdict)
    }
}
