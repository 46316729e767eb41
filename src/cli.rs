//! Command-line entry for the build server.
//!
//! Every option has an environment fallback so the binary can run unchanged on a
//! container platform that only sets `PORT` and `HTTP_PREFIX`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use crate::config::DEFAULT_PORT;
use crate::load_config::load_config;
use crate::pipeline::BuildPipeline;
use crate::server::serve;

/// HTTP build trigger: clone, generate, archive and publish scene-format sources.
#[derive(Debug, Parser)]
#[clap(
    name = "sceneformat-builder",
    version,
    about = "HTTP build trigger that publishes generated scene-format sources to a bucket"
)]
pub struct Cli {
    /// TCP port to listen on
    #[clap(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path prefix prepended to every route
    #[clap(long, env = "HTTP_PREFIX", default_value = "")]
    pub http_prefix: String,

    /// Optional YAML file with build settings
    #[clap(long, env = "BUILDER_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Loads configuration, wires the real pipeline and serves until shutdown.
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref(), &cli.http_prefix, cli.port)?;
    tracing::info!(command = "serve", "Configuration loaded, starting server");

    let pipeline = Arc::new(BuildPipeline::from_settings(config.build.clone()));
    serve(config, pipeline).await
}
