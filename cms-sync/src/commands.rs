//! CLI command implementations: import, fix-images, sitemap.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use cms_sync_core::contract::{ContentStore, NewPost, Relocator};
use cms_sync_core::parse::{parse_export, ExportFormat};
use cms_sync_core::progress::ImportProgress;
use cms_sync_core::reconcile::run_import;
use cms_sync_core::relocate::{rewrite_legacy_host, BucketRelocator, HttpImageFetcher};
use cms_sync_core::sitemap::{render_empty_urlset, render_urlset};

use crate::load_config::{backend_credentials, BackendCredentials, CliConfig};
use crate::storage::BucketStore;
use crate::store::RestContentStore;

/// Delay between posts in the fix-images pass, so the origin server being
/// scraped for images is not hammered.
const FIX_IMAGES_THROTTLE: Duration = Duration::from_millis(500);

fn required_credentials() -> Result<BackendCredentials> {
    backend_credentials().ok_or_else(|| {
        anyhow!("backend credentials missing: set CMS_API_URL and CMS_SERVICE_KEY")
    })
}

/// Import one export file: parse, reconcile, report.
pub async fn import(config: &CliConfig, file: &Path, skip_images: bool) -> Result<()> {
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let format = ExportFormat::from_filename(filename)
        .ok_or_else(|| anyhow!("unrecognised export format for {filename:?}: expected .xml or .csv"))?;

    let text = fs::read_to_string(file)
        .with_context(|| format!("failed to read export file {:?}", file))?;

    let parsed = parse_export(format, &text).map_err(|e| anyhow!("{e}"))?;
    for warning in &parsed.warnings {
        warn!(warning, "export parse warning");
        eprintln!("warning: {warning}");
    }
    if parsed.document.posts.is_empty() {
        bail!("no importable posts found in {filename:?}");
    }
    println!(
        "Parsed {} posts, {} categories, {} tags",
        parsed.document.posts.len(),
        parsed.document.categories.len(),
        parsed.document.tags.len()
    );

    let credentials = required_credentials()?;
    let store = RestContentStore::new(&credentials);

    let relocator = if config.import.relocate_images && !skip_images {
        Some(BucketRelocator::new(
            HttpImageFetcher::new(),
            BucketStore::new(&credentials, &config.import.bucket),
            config.import.collection.clone(),
        ))
    } else {
        None
    };

    let progress = Arc::new(ImportProgress::new(parsed.document.posts.len()));
    let bar = ProgressBar::new(parsed.document.posts.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    let ticker = tokio::spawn({
        let progress = Arc::clone(&progress);
        let bar = bar.clone();
        async move {
            loop {
                bar.set_position(progress.snapshot().processed as u64);
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }
    });

    let report = run_import(
        &parsed.document,
        &store,
        relocator.as_ref().map(|r| r as &dyn Relocator),
        &progress,
    )
    .await;

    ticker.abort();
    bar.finish_and_clear();

    println!("{}", progress.summary());
    if report.failed > 0 {
        for label in &report.failed_posts {
            println!("  failed: {label}");
        }
    }
    Ok(())
}

/// Maintenance pass: re-host externally-hosted featured images for posts
/// already in the store.
pub async fn fix_images(config: &CliConfig) -> Result<()> {
    let credentials = required_credentials()?;
    let store = RestContentStore::new(&credentials);
    let relocator = BucketRelocator::new(
        HttpImageFetcher::new(),
        BucketStore::new(&credentials, &config.import.bucket),
        config.import.collection.clone(),
    );

    let production_host = reqwest::Url::parse(&config.site.base_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .with_context(|| format!("site.base_url is not a valid URL: {}", config.site.base_url))?;

    let posts = store.list_posts().await.map_err(|e| anyhow!("{e}"))?;
    info!(posts = posts.len(), "scanning posts for external images");

    let mut updated = 0usize;
    let mut skipped = 0usize;
    for (index, post) in posts.iter().enumerate() {
        let url = match &post.featured_image_url {
            Some(url) if !url.starts_with(&credentials.api_url) => url,
            _ => continue,
        };

        // The production domain may have been repointed since the image was
        // captured; try the legacy media host instead when configured.
        let fetch_url = config
            .site
            .legacy_media_host
            .as_deref()
            .and_then(|legacy| rewrite_legacy_host(url, &production_host, legacy))
            .unwrap_or_else(|| url.clone());

        match relocator.relocate(&fetch_url, &post.slug, index).await {
            Some(new_url) => {
                let payload = NewPost {
                    featured_image_url: Some(new_url.clone()),
                    ..NewPost::from(post)
                };
                match store.update_post(&post.id, &payload).await {
                    Ok(_) => {
                        info!(slug = %post.slug, new_url, "re-hosted featured image");
                        updated += 1;
                    }
                    Err(e) => {
                        warn!(slug = %post.slug, error = %e, "image re-hosted but post update failed");
                        skipped += 1;
                    }
                }
            }
            None => {
                warn!(slug = %post.slug, url = %fetch_url, "could not re-host image, keeping original");
                skipped += 1;
            }
        }

        tokio::time::sleep(FIX_IMAGES_THROTTLE).await;
    }

    println!("fix-images: {updated} updated, {skipped} skipped");
    Ok(())
}

/// Print the sitemap urlset to stdout.
pub async fn sitemap(config: &CliConfig) -> Result<()> {
    let xml = match backend_credentials() {
        None => render_empty_urlset("backend credentials not configured"),
        Some(credentials) => {
            let store = RestContentStore::new(&credentials);
            match store.list_published_posts().await {
                Ok(posts) => render_urlset(&config.site.base_url, &posts),
                Err(e) => {
                    warn!(error = %e, "published posts query failed");
                    render_empty_urlset("posts query failed")
                }
            }
        }
    };
    println!("{xml}");
    Ok(())
}
