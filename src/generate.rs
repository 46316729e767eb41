use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info};

use crate::command::{run_captured, CommandError};
use crate::config::BuildSettings;
use crate::contract::Generator;

#[derive(Debug, Error)]
#[error("schema generation failed")]
pub struct GenerationError {
    #[source]
    pub source: CommandError,
}

/// Runs `protoc` over the checkout's schema and writes target-language sources into the
/// checkout's output directory.
#[derive(Debug, Clone)]
pub struct ProtocGenerator {
    program: PathBuf,
    language: String,
    schema_dir: PathBuf,
    schema_file: PathBuf,
    output_dir: PathBuf,
    timeout: Duration,
}

impl ProtocGenerator {
    pub fn from_settings(settings: &BuildSettings) -> Self {
        Self {
            program: settings.protoc_program.clone(),
            language: settings.language.clone(),
            schema_dir: settings.schema_dir.clone(),
            schema_file: settings.schema_file.clone(),
            output_dir: settings.output_dir.clone(),
            timeout: settings.step_timeout(),
        }
    }

    fn protoc_command(&self, repo: &Path) -> (Command, PathBuf) {
        let include_dir = repo.join(&self.schema_dir);
        let schema = include_dir.join(&self.schema_file);
        let output_dir = repo.join(&self.output_dir);

        let mut include_flag = OsString::from("-I=");
        include_flag.push(&include_dir);
        let mut out_flag = OsString::from(format!("--{}_out=", self.language));
        out_flag.push(&output_dir);

        let mut command = Command::new(&self.program);
        command.arg(include_flag).arg(schema).arg(out_flag);
        (command, output_dir)
    }
}

#[async_trait]
impl Generator for ProtocGenerator {
    async fn generate(&self, repo: &Path) -> Result<PathBuf, GenerationError> {
        let (command, output_dir) = self.protoc_command(repo);
        match run_captured(command, self.timeout).await {
            Ok(_) => {
                info!(
                    language = %self.language,
                    output_dir = %output_dir.display(),
                    "Generated sources from schema"
                );
                Ok(output_dir)
            }
            Err(e) => {
                error!(
                    error = %e,
                    protoc_output = e.output().unwrap_or_default(),
                    repo = %repo.display(),
                    "protoc failed"
                );
                Err(GenerationError { source: e })
            }
        }
    }
}
