//! Build pipeline: fetch → generate → archive → upload (versioned key, then latest alias).
//!
//! # Responsibilities
//! - Runs the steps strictly in order and stops at the first failure
//! - Gives every build its own workspace directory (clone + archive) derived from a fresh
//!   build id, and removes it on every exit path
//! - Bounds how many builds run at once; extra requests wait for a permit
//!
//! # Publishing semantics
//! The two uploads are not atomic. The versioned object is written first; if writing the
//! latest alias then fails, the versioned object stays and the build reports an error.
//! Repeating the request rewrites both keys with the same content.

use std::io;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::archive::{spawn_compress, ArchiveError, ArchiveSummary};
use crate::config::BuildSettings;
use crate::contract::{Fetcher, Generator, ObjectStore};
use crate::fetch::{FetchError, GitFetcher};
use crate::generate::{GenerationError, ProtocGenerator};
use crate::request::BuildRequest;
use crate::upload::{upload_archive, GcsObjectStore, TokenSource, UploadError, UploadedArchive};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot prepare build workspace: {0}")]
    Workspace(#[source] io::Error),
    #[error("build limiter is closed")]
    LimiterClosed,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Generate(#[from] GenerationError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl BuildError {
    /// Short name of the failing step, for logs.
    pub fn step(&self) -> &'static str {
        match self {
            BuildError::Workspace(_) | BuildError::LimiterClosed => "prepare",
            BuildError::Fetch(_) => "fetch",
            BuildError::Generate(_) => "generate",
            BuildError::Archive(_) => "archive",
            BuildError::Upload(_) => "upload",
        }
    }
}

/// What a successful build published.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub build_id: Uuid,
    pub branch: String,
    pub version: String,
    /// Archive contents; the file itself is gone with the workspace.
    pub archive: ArchiveSummary,
    pub versioned: UploadedArchive,
    pub latest: UploadedArchive,
}

pub struct BuildPipeline {
    settings: Arc<BuildSettings>,
    fetcher: Arc<dyn Fetcher>,
    generator: Arc<dyn Generator>,
    store: Arc<dyn ObjectStore>,
    permits: Semaphore,
}

impl BuildPipeline {
    pub fn new(
        settings: BuildSettings,
        fetcher: Arc<dyn Fetcher>,
        generator: Arc<dyn Generator>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let permits = Semaphore::new(settings.max_concurrent_builds.max(1));
        Self {
            settings: Arc::new(settings),
            fetcher,
            generator,
            store,
            permits,
        }
    }

    /// Pipeline wired to git, protoc and Cloud Storage.
    pub fn from_settings(settings: BuildSettings) -> Self {
        let fetcher = Arc::new(GitFetcher::from_settings(&settings));
        let generator = Arc::new(ProtocGenerator::from_settings(&settings));
        let store = Arc::new(GcsObjectStore::new(
            settings.storage_endpoint.clone(),
            TokenSource::from_env(),
        ));
        Self::new(settings, fetcher, generator, store)
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Runs one build in a fresh workspace and removes the workspace afterwards, whatever the outcome.
    pub async fn run(&self, request: &BuildRequest) -> Result<BuildReport, BuildError> {
        let build_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "build",
            build_id = %build_id,
            branch = %request.branch,
            version = %request.version
        );

        async move {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| BuildError::LimiterClosed)?;
            info!("[BUILD] Starting build");

            let workspace = self.create_workspace(&build_id)?;
            let result = self.run_in(workspace.path(), build_id, request).await;

            let workspace_path = workspace.path().to_path_buf();
            match workspace.close() {
                Ok(()) => debug!(path = %workspace_path.display(), "[BUILD] Removed workspace"),
                Err(e) => warn!(error = ?e, path = %workspace_path.display(), "[BUILD] Failed to remove workspace"),
            }

            match &result {
                Ok(report) => info!(
                    entries = report.archive.entries.len(),
                    versioned_key = %report.versioned.object.key,
                    latest_key = %report.latest.object.key,
                    "[BUILD] Build published"
                ),
                Err(e) => error!(step = e.step(), error = %e, "[BUILD][ERROR] Build failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    fn create_workspace(&self, build_id: &Uuid) -> Result<tempfile::TempDir, BuildError> {
        let work_root = &self.settings.work_root;
        std::fs::create_dir_all(work_root).map_err(|e| {
            error!(error = ?e, path = %work_root.display(), "[BUILD][ERROR] Cannot create work root");
            BuildError::Workspace(e)
        })?;
        let workspace = tempfile::Builder::new()
            .prefix(&format!("{}-{}-", self.settings.language, build_id))
            .tempdir_in(work_root)
            .map_err(|e| {
                error!(error = ?e, path = %work_root.display(), "[BUILD][ERROR] Cannot create workspace");
                BuildError::Workspace(e)
            })?;
        debug!(path = %workspace.path().display(), "[BUILD] Created workspace");
        Ok(workspace)
    }

    async fn run_in(
        &self,
        workspace: &Path,
        build_id: Uuid,
        request: &BuildRequest,
    ) -> Result<BuildReport, BuildError> {
        let settings = &self.settings;
        let clone_dir = workspace.join("repo");
        let archive_path = workspace.join(settings.archive_name(&request.version));

        // --- Step 1: Fetch ---
        info!(path = %clone_dir.display(), "[BUILD] Cloning branch");
        self.fetcher.fetch(&request.branch, &clone_dir).await?;

        // --- Step 2: Generate ---
        info!("[BUILD] Running schema compiler");
        let generated_dir = self.generator.generate(&clone_dir).await?;

        // --- Step 3: Archive ---
        info!(source_dir = %generated_dir.display(), "[BUILD] Archiving generated sources");
        let archive = spawn_compress(
            generated_dir,
            archive_path,
            settings.source_suffixes.clone(),
        )
        .await?;

        // --- Step 4: Upload, versioned key before the latest alias ---
        let versioned_key = settings.versioned_key(&request.version);
        let versioned =
            upload_archive(self.store.as_ref(), &archive.path, &settings.bucket, &versioned_key)
                .await?;

        let latest_key = settings.latest_key();
        let latest =
            upload_archive(self.store.as_ref(), &archive.path, &settings.bucket, &latest_key)
                .await?;

        Ok(BuildReport {
            build_id,
            branch: request.branch.clone(),
            version: request.version.clone(),
            archive,
            versioned,
            latest,
        })
    }
}
