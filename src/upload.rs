//! # Upload
//!
//! Publishes archives to a storage bucket: the archive uploader plus the Google Cloud
//! Storage client behind the [`ObjectStore`] seam.
//!
//! - [`upload_archive`] reads a local archive fully into memory and writes it as one
//!   object. There is no multipart or resumable upload; archives are small.
//! - [`GcsObjectStore`] implements [`ObjectStore`] against the Cloud Storage JSON API
//!   (`uploadType=media`). Overwrites are unconditional; no generation preconditions.
//!
//! ## Credentials
//!
//! [`TokenSource::from_env`] uses `GCS_ACCESS_TOKEN` when set (local runs, emulators)
//! and otherwise asks the instance metadata server for the default service account's
//! token on every upload, which is what Cloud Run and GCE provide.

use std::env;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::contract::{ObjectStore, StoreError, StoredObject};

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("cannot read archive {path}: {source}")]
    ReadArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing gs://{bucket}/{key} failed: {source}")]
    Store {
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },
}

/// Outcome of [`upload_archive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedArchive {
    pub object: StoredObject,
    /// Hex SHA-256 of the uploaded bytes.
    pub sha256: String,
}

/// Reads `archive_path` and writes its bytes to `bucket`/`key`, replacing any existing object.
pub async fn upload_archive(
    store: &dyn ObjectStore,
    archive_path: &Path,
    bucket: &str,
    key: &str,
) -> Result<UploadedArchive, UploadError> {
    let content = tokio::fs::read(archive_path).await.map_err(|source| {
        tracing::error!(error = ?source, path = %archive_path.display(), "Failed to read archive for upload");
        UploadError::ReadArchive {
            path: archive_path.to_path_buf(),
            source,
        }
    })?;

    let sha256 = {
        let mut hasher = Sha256::new();
        hasher.update(&content);
        format!("{:x}", hasher.finalize())
    };

    tracing::info!(
        bucket = bucket,
        key = key,
        bytes = content.len(),
        sha256 = %sha256,
        "Uploading archive"
    );

    match store.put_object(bucket, key, content).await {
        Ok(object) => {
            tracing::info!(
                bucket = %object.bucket,
                key = %object.key,
                size = object.size,
                generation = ?object.generation,
                "Archive uploaded"
            );
            Ok(UploadedArchive { object, sha256 })
        }
        Err(source) => {
            tracing::error!(error = %source, bucket = bucket, key = key, "Archive upload failed");
            Err(UploadError::Store {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source,
            })
        }
    }
}

/// Where bearer tokens for the storage API come from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// A fixed token, e.g. from `gcloud auth print-access-token`.
    Static(String),
    /// The instance metadata server at the given token URL.
    Metadata(String),
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

impl TokenSource {
    pub fn from_env() -> Self {
        match env::var("GCS_ACCESS_TOKEN") {
            Ok(token) if !token.trim().is_empty() => {
                tracing::info!("Using GCS_ACCESS_TOKEN for storage uploads");
                TokenSource::Static(token.trim().to_string())
            }
            _ => {
                tracing::info!("GCS_ACCESS_TOKEN not set, using the metadata server for storage credentials");
                TokenSource::Metadata(METADATA_TOKEN_URL.to_string())
            }
        }
    }

    async fn token(&self, client: &reqwest::Client) -> Result<String, StoreError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Metadata(url) => {
                let response = client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await?
                    .error_for_status()?;
                let token: MetadataToken = response.json().await?;
                Ok(token.access_token)
            }
        }
    }
}

#[derive(Deserialize)]
struct GcsObjectResource {
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    generation: Option<String>,
}

/// Cloud Storage JSON API client for single-request media uploads.
#[derive(Debug, Clone)]
pub struct GcsObjectStore {
    client: reqwest::Client,
    endpoint: String,
    tokens: TokenSource,
}

impl GcsObjectStore {
    pub fn new(endpoint: impl Into<String>, tokens: TokenSource) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn upload_url(&self, bucket: &str) -> String {
        format!("{}/upload/storage/v1/b/{}/o", self.endpoint, bucket)
    }
}

/// Pulls the human-readable message out of a JSON API error body, falling back to the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(|message| message.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content: Vec<u8>,
    ) -> Result<StoredObject, StoreError> {
        let token = self.tokens.token(&self.client).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to obtain storage access token");
            e
        })?;
        let len = content.len() as u64;

        let response = self
            .client
            .post(self.upload_url(bucket))
            .query(&[("uploadType", "media"), ("name", key)])
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(content)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
            let message = api_error_message(&body);
            tracing::error!(status = %status, bucket = bucket, key = key, message = %message, "Storage API rejected upload");
            return Err(format!("storage API returned {status}: {message}").into());
        }

        let resource: GcsObjectResource = response.json().await?;
        let size = resource
            .size
            .and_then(|size| size.parse::<u64>().ok())
            .unwrap_or(len);

        Ok(StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size,
            generation: resource.generation,
        })
    }
}
