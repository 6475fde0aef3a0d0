pub mod commands;
pub mod load_config;
pub mod serve;
pub mod storage;
pub mod store;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use load_config::load_config;

#[derive(Parser)]
#[clap(
    name = "cms-sync",
    version,
    about = "Import WordPress exports into the hosted CMS backend and serve the sitemap/payment endpoints"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a WordPress WXR (.xml) or CSV export file
    Import {
        /// Path to the export file
        file: PathBuf,
        /// Path to the YAML config file
        #[clap(long, default_value = "cms-sync.yaml")]
        config: PathBuf,
        /// Keep original featured-image URLs instead of re-hosting them
        #[clap(long)]
        skip_images: bool,
    },
    /// Re-host externally-hosted featured images for already-imported posts
    FixImages {
        #[clap(long, default_value = "cms-sync.yaml")]
        config: PathBuf,
    },
    /// Print the sitemap urlset for all published posts
    Sitemap {
        #[clap(long, default_value = "cms-sync.yaml")]
        config: PathBuf,
    },
    /// Run the HTTP surface (sitemap.xml, payment intents)
    Serve {
        #[clap(long, default_value = "cms-sync.yaml")]
        config: PathBuf,
    },
}

/// Async CLI entrypoint, extracted for integration tests and `main()`.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Import {
            file,
            config,
            skip_images,
        } => {
            let config = load_config(config)?;
            commands::import(&config, &file, skip_images).await
        }
        Commands::FixImages { config } => {
            let config = load_config(config)?;
            commands::fix_images(&config).await
        }
        Commands::Sitemap { config } => {
            let config = load_config(config)?;
            commands::sitemap(&config).await
        }
        Commands::Serve { config } => {
            let config = load_config(config)?;
            serve::run_server(&config).await
        }
    }
}
