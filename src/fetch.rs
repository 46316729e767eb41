use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::command::{run_captured, CommandError};
use crate::config::BuildSettings;
use crate::contract::Fetcher;

#[derive(Debug, Error)]
#[error("cloning branch `{branch}` failed")]
pub struct FetchError {
    pub branch: String,
    #[source]
    pub source: CommandError,
}

/// Clones the upstream repository with the git command-line client.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    program: PathBuf,
    repo_url: String,
    timeout: Duration,
}

impl GitFetcher {
    pub fn new(program: impl Into<PathBuf>, repo_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            repo_url: repo_url.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &BuildSettings) -> Self {
        Self::new(
            settings.git_program.clone(),
            settings.repo_url.clone(),
            settings.step_timeout(),
        )
    }

    fn clone_command(&self, branch: &str, dest: &Path) -> Command {
        // `git clone --single-branch --branch <branch> --depth 1 <repo_url> <dest>`
        let mut command = Command::new(&self.program);
        command
            .arg("clone")
            .arg("--single-branch")
            .arg("--branch")
            .arg(branch)
            .arg("--depth")
            .arg("1")
            .arg(&self.repo_url)
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0");
        command
    }
}

#[async_trait]
impl Fetcher for GitFetcher {
    async fn fetch(&self, branch: &str, dest: &Path) -> Result<(), FetchError> {
        let command = self.clone_command(branch, dest);
        match run_captured(command, self.timeout).await {
            Ok(_) => {
                tracing::info!(
                    repo_url = %self.repo_url,
                    branch = branch,
                    path = %dest.display(),
                    "Successfully cloned git repository"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    output = e.output().unwrap_or_default(),
                    repo_url = %self.repo_url,
                    branch = branch,
                    path = %dest.display(),
                    "Git clone failed"
                );
                Err(FetchError {
                    branch: branch.to_string(),
                    source: e,
                })
            }
        }
    }
}
