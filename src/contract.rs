//! # contract: seams between the build pipeline and the outside world
//!
//! The pipeline talks to three external systems: a version-control host, a schema
//! compiler and an object store. Each one sits behind a trait here so the request
//! handler and pipeline can be driven by real clients in production and by `mockall`
//! mocks in tests.
//!
//! - [`Fetcher`]: puts a single-branch checkout of the upstream repository on disk.
//! - [`Generator`]: runs the schema compiler inside such a checkout.
//! - [`ObjectStore`]: writes a whole object into a bucket, overwriting any previous value.
//!
//! Mocks are generated with `automock` and exported under the default
//! `test-export-mocks` feature so integration tests can use them.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use mockall::automock;

use crate::fetch::FetchError;
use crate::generate::GenerationError;

/// Error type at the object-store seam (boxed, like any transport error).
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// What the store reports back after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    /// Store-specific revision marker of the written object, when the store reports one.
    pub generation: Option<String>,
}

/// Checks out one branch of the upstream repository.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Shallow, single-branch clone of `branch` into `dest`, which must not exist yet.
    async fn fetch(&self, branch: &str, dest: &Path) -> Result<(), FetchError>;
}

/// Runs the schema compiler against a checkout.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generates sources inside `repo` and returns the directory holding them.
    async fn generate(&self, repo: &Path) -> Result<PathBuf, GenerationError>;
}

/// Whole-object writes into a bucket.
///
/// Writes are last-write-wins: putting an existing key replaces its content.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content: Vec<u8>,
    ) -> Result<StoredObject, StoreError>;
}
