//! Featured-image relocation.
//!
//! Fetches a post's external featured image and re-hosts it in the target
//! bucket, returning the new public URL. Every failure path degrades to
//! `None` so the caller keeps the original URL; an image must never fail a
//! post import.

use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use reqwest::Url;
use tracing::{debug, warn};

use crate::contract::{FetchedImage, ImageFetcher, ObjectStore, Relocator, StoreError};

/// Reqwest-backed fetcher: one GET with redirect-following.
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<FetchedImage>, StoreError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            debug!(url, status = %response.status(), "image fetch returned non-success status");
            return Ok(None);
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let bytes = response.bytes().await?.to_vec();
        Ok(Some(FetchedImage {
            bytes,
            content_type,
        }))
    }
}

/// Relocator that fetches via an [`ImageFetcher`] and writes into an
/// [`ObjectStore`] under a per-run-unique destination path.
pub struct BucketRelocator<F, O> {
    fetcher: F,
    store: O,
    /// Destination path prefix inside the bucket, e.g. `blog-images`.
    collection: String,
}

impl<F: ImageFetcher, O: ObjectStore> BucketRelocator<F, O> {
    pub fn new(fetcher: F, store: O, collection: impl Into<String>) -> Self {
        Self {
            fetcher,
            store,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl<F: ImageFetcher, O: ObjectStore> Relocator for BucketRelocator<F, O> {
    async fn relocate(&self, url: &str, slug: &str, index: usize) -> Option<String> {
        if !is_absolute_http(url) {
            return None;
        }

        let image = match self.fetcher.fetch(url).await {
            Ok(Some(image)) => image,
            Ok(None) => return None,
            Err(e) => {
                warn!(url, error = %e, "image fetch failed");
                return None;
            }
        };

        let ext = extension_for(image.content_type.as_deref(), url);
        let content_type = image
            .content_type
            .clone()
            .unwrap_or_else(|| format!("image/{}", if ext == "jpg" { "jpeg" } else { ext }));
        // Timestamp keeps repeated runs from colliding on the same key.
        let path = format!(
            "{}/{}-{}-{}.{}",
            self.collection,
            slug,
            index,
            Utc::now().timestamp_millis(),
            ext
        );

        match self.store.upload(&path, image.bytes, &content_type, true).await {
            Ok(public_url) => {
                debug!(url, public_url, "relocated featured image");
                Some(public_url)
            }
            Err(e) => {
                warn!(url, path, error = %e, "image upload failed");
                None
            }
        }
    }
}

/// Only absolute HTTP(S) URLs are eligible; anything else short-circuits
/// without a network call.
fn is_absolute_http(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Destination file extension: content type first, then the URL's path
/// extension, defaulting to jpg.
fn extension_for(content_type: Option<&str>, url: &str) -> &'static str {
    if let Some(content_type) = content_type {
        let mime = content_type.split(';').next().unwrap_or("").trim();
        match mime {
            "image/png" => return "png",
            "image/webp" => return "webp",
            "image/gif" => return "gif",
            "image/jpeg" | "image/jpg" => return "jpg",
            _ => {}
        }
    }
    static PATH_EXT: OnceLock<Regex> = OnceLock::new();
    let re = PATH_EXT.get_or_init(|| {
        Regex::new(r"(?i)\.(png|jpe?g|webp|gif)(?:[?#].*)?$").unwrap()
    });
    match re
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "png",
        Some("webp") => "webp",
        Some("gif") => "gif",
        _ => "jpg",
    }
}

/// Maintenance-path heuristic: if the URL's host is the production marketing
/// domain (and not already the legacy media subdomain), substitute the legacy
/// subdomain before fetching. One-shot best effort, not a redirect resolver.
pub fn rewrite_legacy_host(url: &str, production_host: &str, legacy_host: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    if !host.eq_ignore_ascii_case(production_host) || host.eq_ignore_ascii_case(legacy_host) {
        return None;
    }
    parsed.set_host(Some(legacy_host)).ok()?;
    Some(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{MockImageFetcher, MockObjectStore};

    #[test]
    fn extension_mapping() {
        assert_eq!(extension_for(Some("image/png"), "u"), "png");
        assert_eq!(extension_for(Some("image/webp"), "u"), "webp");
        assert_eq!(extension_for(Some("image/gif"), "u"), "gif");
        assert_eq!(extension_for(Some("image/jpeg"), "u"), "jpg");
        assert_eq!(extension_for(Some("image/jpeg; charset=utf-8"), "u"), "jpg");
        // Content type unavailable: fall back to the URL path.
        assert_eq!(extension_for(None, "https://x.com/a/pic.PNG"), "png");
        assert_eq!(extension_for(None, "https://x.com/a/pic.jpeg?v=2"), "jpg");
        assert_eq!(extension_for(None, "https://x.com/a/pic"), "jpg");
        assert_eq!(extension_for(Some("text/html"), "https://x.com/a"), "jpg");
    }

    #[test]
    fn legacy_host_rewrite() {
        assert_eq!(
            rewrite_legacy_host(
                "https://example.com/img/a.jpg",
                "example.com",
                "media.example.com"
            )
            .as_deref(),
            Some("https://media.example.com/img/a.jpg")
        );
        // Already on the legacy host, or a third-party host: untouched.
        assert!(rewrite_legacy_host(
            "https://media.example.com/a.jpg",
            "example.com",
            "media.example.com"
        )
        .is_none());
        assert!(rewrite_legacy_host(
            "https://cdn.other.net/a.jpg",
            "example.com",
            "media.example.com"
        )
        .is_none());
    }

    #[tokio::test]
    async fn non_absolute_url_short_circuits() {
        // No expectations set: any fetch or upload call would panic.
        let relocator =
            BucketRelocator::new(MockImageFetcher::new(), MockObjectStore::new(), "blog-images");
        assert!(relocator.relocate("/relative/img.png", "post", 0).await.is_none());
        assert!(relocator.relocate("ftp://example.com/a.png", "post", 0).await.is_none());
        assert!(relocator.relocate("", "post", 0).await.is_none());
    }

    #[tokio::test]
    async fn non_success_status_yields_none() {
        let mut fetcher = MockImageFetcher::new();
        fetcher.expect_fetch().returning(|_| Ok(None));
        let relocator = BucketRelocator::new(fetcher, MockObjectStore::new(), "blog-images");
        assert!(relocator
            .relocate("https://old.example.com/gone.jpg", "post", 0)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn fetch_error_yields_none() {
        let mut fetcher = MockImageFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|_| Err("connection reset".into()));
        let relocator = BucketRelocator::new(fetcher, MockObjectStore::new(), "blog-images");
        assert!(relocator
            .relocate("https://old.example.com/a.jpg", "post", 0)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn successful_relocation_returns_public_url() {
        let mut fetcher = MockImageFetcher::new();
        fetcher.expect_fetch().returning(|_| {
            Ok(Some(FetchedImage {
                bytes: vec![1, 2, 3],
                content_type: Some("image/png".to_string()),
            }))
        });
        let mut store = MockObjectStore::new();
        store
            .expect_upload()
            .withf(|path, _, content_type, upsert| {
                path.starts_with("blog-images/hello-world-3-")
                    && path.ends_with(".png")
                    && content_type == "image/png"
                    && *upsert
            })
            .returning(|path, _, _, _| Ok(format!("https://cdn.example.com/{path}")));

        let relocator = BucketRelocator::new(fetcher, store, "blog-images");
        let url = relocator
            .relocate("https://old.example.com/a.png", "hello-world", 3)
            .await
            .expect("relocation should succeed");
        assert!(url.starts_with("https://cdn.example.com/blog-images/hello-world-3-"));
    }

    #[tokio::test]
    async fn upload_error_yields_none() {
        let mut fetcher = MockImageFetcher::new();
        fetcher.expect_fetch().returning(|_| {
            Ok(Some(FetchedImage {
                bytes: vec![1],
                content_type: None,
            }))
        });
        let mut store = MockObjectStore::new();
        store
            .expect_upload()
            .returning(|_, _, _, _| Err("bucket unavailable".into()));
        let relocator = BucketRelocator::new(fetcher, store, "blog-images");
        assert!(relocator
            .relocate("https://old.example.com/a.jpg", "post", 0)
            .await
            .is_none());
    }
}
