// sceneformat-builder/src/config.rs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_PORT: u16 = 8080;

/// Everything the server needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Normalized route prefix: empty, or starting with `/` and without a trailing `/`.
    pub http_prefix: String,
    pub port: u16,
    pub build: BuildSettings,
}

impl ServerConfig {
    /// The single route that triggers a build, e.g. `/api/cpp`.
    pub fn build_path(&self) -> String {
        format!("{}/{}", self.http_prefix, self.build.language)
    }

    pub fn trace_loaded(&self) {
        info!(
            http_prefix = %self.http_prefix,
            port = self.port,
            build_path = %self.build_path(),
            "Loaded ServerConfig"
        );
        self.build.trace_loaded();
    }
}

/// Settings for the fetch → generate → archive → upload pipeline.
///
/// Every field has a default so a YAML file only needs to name what it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSettings {
    /// Upstream repository holding the schema.
    pub repo_url: String,
    /// Destination bucket for published archives.
    pub bucket: String,
    /// Key prefix inside the bucket, without trailing slash.
    pub release_prefix: String,
    /// Target language: names the route, the protoc `--<lang>_out` flag and the archive.
    pub language: String,
    /// Schema include directory, relative to the clone.
    pub schema_dir: PathBuf,
    /// Schema file inside `schema_dir`.
    pub schema_file: PathBuf,
    /// Generated-output directory relative to the clone; tracked upstream so it already exists.
    pub output_dir: PathBuf,
    /// File name suffixes that end up in the archive.
    pub source_suffixes: Vec<String>,
    pub git_program: PathBuf,
    pub protoc_program: PathBuf,
    /// Parent directory for per-build workspaces.
    pub work_root: PathBuf,
    pub max_concurrent_builds: usize,
    pub step_timeout_secs: u64,
    /// Base URL of the storage JSON API.
    pub storage_endpoint: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            repo_url: "https://github.com/computer-graphics-course/scene-format.git".to_string(),
            bucket: "turbocow".to_string(),
            release_prefix: "sceneformat/releases".to_string(),
            language: "cpp".to_string(),
            schema_dir: PathBuf::from("proto"),
            schema_file: PathBuf::from("scene.proto"),
            output_dir: PathBuf::from("cpp/sceneformat"),
            source_suffixes: vec![".cpp".to_string(), ".cc".to_string(), ".h".to_string()],
            git_program: PathBuf::from("git"),
            protoc_program: PathBuf::from("protoc"),
            work_root: std::env::temp_dir(),
            max_concurrent_builds: 4,
            step_timeout_secs: 600,
            storage_endpoint: "https://storage.googleapis.com".to_string(),
        }
    }
}

impl BuildSettings {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    /// Object key for a specific version, e.g. `sceneformat/releases/cpp3.zip`.
    pub fn versioned_key(&self, version: &str) -> String {
        self.object_key(&self.archive_name(version))
    }

    /// Object key that always holds the most recent archive, e.g. `sceneformat/releases/cpp_latest.zip`.
    pub fn latest_key(&self) -> String {
        self.object_key(&format!("{}_latest.zip", self.language))
    }

    /// An empty prefix puts objects at the bucket root.
    fn object_key(&self, name: &str) -> String {
        if self.release_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.release_prefix, name)
        }
    }

    pub fn archive_name(&self, version: &str) -> String {
        format!("{}{}.zip", self.language, version)
    }

    pub fn trace_loaded(&self) {
        info!(
            repo_url = %self.repo_url,
            bucket = %self.bucket,
            release_prefix = %self.release_prefix,
            language = %self.language,
            work_root = %self.work_root.display(),
            max_concurrent_builds = self.max_concurrent_builds,
            step_timeout_secs = self.step_timeout_secs,
            "Loaded BuildSettings"
        );
        debug!(settings = ?self, "BuildSettings loaded (full debug)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_release_layout() {
        let settings = BuildSettings::default();
        assert_eq!(settings.versioned_key("3"), "sceneformat/releases/cpp3.zip");
        assert_eq!(settings.latest_key(), "sceneformat/releases/cpp_latest.zip");
    }

    #[test]
    fn empty_release_prefix_keys_have_no_leading_slash() {
        let settings = BuildSettings {
            release_prefix: String::new(),
            ..BuildSettings::default()
        };
        assert_eq!(settings.versioned_key("3"), "cpp3.zip");
        assert_eq!(settings.latest_key(), "cpp_latest.zip");
    }

    #[test]
    fn build_path_joins_prefix_and_language() {
        let config = ServerConfig {
            http_prefix: "/builder".to_string(),
            port: DEFAULT_PORT,
            build: BuildSettings::default(),
        };
        assert_eq!(config.build_path(), "/builder/cpp");

        let config = ServerConfig {
            http_prefix: String::new(),
            ..config
        };
        assert_eq!(config.build_path(), "/cpp");
    }
}
