use anyhow::Result;
use clap::Parser;
use sceneformat_builder::cli::{run, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    tracing::info!("Command line parsed, starting build server");
    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = ?e, "Build server exited with error");
    }
    result
}
