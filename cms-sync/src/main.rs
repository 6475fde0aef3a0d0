use anyhow::Result;
use clap::Parser;
use cms_sync::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment before anything reads credentials.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();
    tracing::info!("cms-sync startup: tracing initialised, environment loaded");

    let cli = Cli::parse();
    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("cms-sync completed successfully"),
        Err(e) => tracing::error!(error = %e, "cms-sync exited with error"),
    }
    result
}
