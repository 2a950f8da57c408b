//! OAuth access tokens for the Google REST endpoints

use crate::error::{Result, ThumbnailError};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

/// Where bearer tokens come from
#[derive(Clone, Debug)]
pub enum AccessTokenSource {
    /// A token supplied by the operator, e.g. `gcloud auth print-access-token`
    Static(String),
    /// The runtime's metadata server, asked on every call
    MetadataServer { client: Client, url: String },
    /// No Authorization header at all (emulators)
    Anonymous,
}

impl AccessTokenSource {
    /// Prefer `GOOGLE_OAUTH_ACCESS_TOKEN`, otherwise the metadata server
    pub fn from_env(client: Client) -> Self {
        match std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
            Ok(token) if !token.trim().is_empty() => {
                debug!("Using access token from environment");
                AccessTokenSource::Static(token.trim().to_string())
            }
            _ => AccessTokenSource::metadata_server(client),
        }
    }

    pub fn metadata_server(client: Client) -> Self {
        AccessTokenSource::MetadataServer {
            client,
            url: METADATA_TOKEN_URL.to_string(),
        }
    }

    pub async fn token(&self) -> Result<Option<String>> {
        match self {
            AccessTokenSource::Static(token) => Ok(Some(token.clone())),
            AccessTokenSource::Anonymous => Ok(None),
            AccessTokenSource::MetadataServer { client, url } => {
                let response = client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| ThumbnailError::Auth(e.to_string()))?;

                if !response.status().is_success() {
                    return Err(ThumbnailError::Auth(format!(
                        "metadata server returned {}",
                        response.status()
                    )));
                }

                let token: MetadataToken = response
                    .json()
                    .await
                    .map_err(|e| ThumbnailError::Auth(e.to_string()))?;
                Ok(Some(token.access_token))
            }
        }
    }

    /// Attach the bearer token, if any, to a request
    pub async fn authorize(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        Ok(match self.token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }
}
