//! Environment-driven configuration for the thumbnail function

use crate::error::{Result, ThumbnailError};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DESTINATION_BUCKET: &str = "kr-test-live";
pub const DEFAULT_PROJECT_ID: &str = "kr-test-work";
pub const DEFAULT_TOPIC_ID: &str = "image_updated";
pub const DEFAULT_MAX_WIDTH: u32 = 280;
pub const DEFAULT_PREFIX: &str = "thumbnail";

pub const STORAGE_BASE_URL: &str = "https://storage.googleapis.com";
pub const VISION_BASE_URL: &str = "https://vision.googleapis.com";
pub const PUBSUB_BASE_URL: &str = "https://pubsub.googleapis.com";

/// Configuration for one deployment of the function
#[derive(Clone, Debug)]
pub struct ThumbnailConfig {
    /// Public bucket that receives accepted thumbnails
    pub destination_bucket: String,
    /// Project that owns the announcement topic
    pub project_id: String,
    /// Topic announcing new thumbnails
    pub topic_id: String,
    /// Images wider than this are scaled down to it
    pub max_width: u32,
    /// Prepended (with a dash) to the source object name
    pub prefix: String,
    /// Publish an announcement after each stored thumbnail
    pub notify_enabled: bool,
    pub bind_addr: String,
    /// Request timeout for the shared HTTP client; none unless set by the operator
    pub http_timeout: Option<Duration>,
    pub storage_base_url: String,
    pub vision_base_url: String,
    pub pubsub_base_url: String,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            destination_bucket: DEFAULT_DESTINATION_BUCKET.to_string(),
            project_id: DEFAULT_PROJECT_ID.to_string(),
            topic_id: DEFAULT_TOPIC_ID.to_string(),
            max_width: DEFAULT_MAX_WIDTH,
            prefix: DEFAULT_PREFIX.to_string(),
            notify_enabled: false,
            bind_addr: "0.0.0.0:8080".to_string(),
            http_timeout: None,
            storage_base_url: STORAGE_BASE_URL.to_string(),
            vision_base_url: VISION_BASE_URL.to_string(),
            pubsub_base_url: PUBSUB_BASE_URL.to_string(),
        }
    }
}

impl ThumbnailConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let string_or = |key: &str, default: String| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let max_width: u32 = parse_var(&lookup, "THUMBNAIL_MAX_WIDTH")?.unwrap_or(defaults.max_width);
        if max_width == 0 {
            return Err(ThumbnailError::Config(
                "THUMBNAIL_MAX_WIDTH must be positive".to_string(),
            ));
        }

        let notify_enabled = match lookup("NOTIFY_ENABLED") {
            Some(value) => parse_flag(&value).ok_or_else(|| {
                ThumbnailError::Config(format!("NOTIFY_ENABLED: not a boolean: {value}"))
            })?,
            None => defaults.notify_enabled,
        };

        // Cloud Run hands the listening port over in PORT
        let bind_addr = match (lookup("BIND_ADDR"), lookup("PORT")) {
            (Some(addr), _) if !addr.trim().is_empty() => addr.trim().to_string(),
            (_, Some(port)) if !port.trim().is_empty() => format!("0.0.0.0:{}", port.trim()),
            _ => defaults.bind_addr,
        };

        let http_timeout =
            parse_var::<u64, _>(&lookup, "HTTP_TIMEOUT_SECS")?.map(Duration::from_secs);

        Ok(Self {
            destination_bucket: string_or("BUCKET", defaults.destination_bucket),
            project_id: string_or("PROJECT_ID", defaults.project_id),
            topic_id: string_or("TOPIC_ID", defaults.topic_id),
            max_width,
            prefix: string_or("THUMBNAIL_PREFIX", defaults.prefix),
            notify_enabled,
            bind_addr,
            http_timeout,
            storage_base_url: string_or("STORAGE_BASE_URL", defaults.storage_base_url),
            vision_base_url: string_or("VISION_BASE_URL", defaults.vision_base_url),
            pubsub_base_url: string_or("PUBSUB_BASE_URL", defaults.pubsub_base_url),
        })
    }

    /// Shared HTTP client for every remote collaborator
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().user_agent("ThumbnailGate/1.0");
        if let Some(timeout) = self.http_timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|e| ThumbnailError::Config(format!("Failed to build HTTP client: {e}")))
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ThumbnailError::Config(format!("{key}: {e}"))),
        None => Ok(None),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = ThumbnailConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.destination_bucket, "kr-test-live");
        assert_eq!(config.project_id, "kr-test-work");
        assert_eq!(config.topic_id, "image_updated");
        assert_eq!(config.max_width, 280);
        assert_eq!(config.prefix, "thumbnail");
        assert!(!config.notify_enabled);
        assert!(config.http_timeout.is_none());
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = ThumbnailConfig::from_lookup(lookup_from(&[
            ("BUCKET", "public-thumbs"),
            ("THUMBNAIL_MAX_WIDTH", "512"),
            ("NOTIFY_ENABLED", "yes"),
            ("PORT", "9090"),
            ("HTTP_TIMEOUT_SECS", "15"),
        ]))
        .unwrap();

        assert_eq!(config.destination_bucket, "public-thumbs");
        assert_eq!(config.max_width, 512);
        assert!(config.notify_enabled);
        assert_eq!(config.bind_addr, "0.0.0.0:9090");
        assert_eq!(config.http_timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_bind_address_is_trimmed() {
        let config =
            ThumbnailConfig::from_lookup(lookup_from(&[("BIND_ADDR", " 127.0.0.1:3000\n")])).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:3000");

        let config = ThumbnailConfig::from_lookup(lookup_from(&[("PORT", " 8081 ")])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8081");

        let config =
            ThumbnailConfig::from_lookup(lookup_from(&[("BIND_ADDR", "  "), ("PORT", "7000")]))
                .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:7000");
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let err = ThumbnailConfig::from_lookup(lookup_from(&[("THUMBNAIL_MAX_WIDTH", "wide")]))
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::Config(_)));

        let err =
            ThumbnailConfig::from_lookup(lookup_from(&[("THUMBNAIL_MAX_WIDTH", "0")])).unwrap_err();
        assert!(matches!(err, ThumbnailError::Config(_)));

        let err =
            ThumbnailConfig::from_lookup(lookup_from(&[("NOTIFY_ENABLED", "maybe")])).unwrap_err();
        assert!(matches!(err, ThumbnailError::Config(_)));
    }
}
