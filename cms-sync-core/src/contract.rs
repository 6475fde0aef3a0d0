//! # contract: store interfaces for the import pipeline
//!
//! This module defines the traits the pipeline writes through: the content
//! store (posts, categories, tags, SEO pages), the object store (image
//! bucket) and the asset relocator, plus the plain row/payload types they
//! exchange.
//!
//! ## Interface & Extensibility
//! - Implement [`ContentStore`] to target a new backend (REST client, local
//!   fixture store, test mock).
//! - All methods are async, returning results with boxed error types.
//! - The traits are annotated for `mockall` so tests can run the whole
//!   reconciliation pipeline against deterministic mocks.
//!
//! ## Error handling
//! Implementors convert every upstream failure into a boxed error; the
//! reconciliation engine decides what is fatal for the run and what only
//! fails a single post.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::{automock, predicate::*};

use crate::record::PostStatus;

/// Uniform error type for store operations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// A category or tag row in the store. Slug is globally unique.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TermRow {
    pub id: String,
    pub name: String,
    pub slug: String,
}

/// A stored post row.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PostRow {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub featured_image_url: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub category_id: Option<String>,
    pub seo_page_id: Option<String>,
    pub external_id: Option<String>,
    pub external_permalink: Option<String>,
}

/// Payload for inserting or updating a post. The store generates the id on
/// insert; updates address an existing id and keep it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub featured_image_url: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub category_id: Option<String>,
    pub seo_page_id: Option<String>,
    pub external_id: Option<String>,
    pub external_permalink: Option<String>,
}

impl From<&PostRow> for NewPost {
    /// Re-write payload carrying a row's current values; callers adjust the
    /// fields they mean to change.
    fn from(row: &PostRow) -> Self {
        NewPost {
            title: row.title.clone(),
            slug: row.slug.clone(),
            excerpt: row.excerpt.clone(),
            content: row.content.clone(),
            featured_image_url: row.featured_image_url.clone(),
            author_name: row.author_name.clone(),
            author_email: row.author_email.clone(),
            status: row.status,
            published_at: row.published_at,
            category_id: row.category_id.clone(),
            seo_page_id: row.seo_page_id.clone(),
            external_id: row.external_id.clone(),
            external_permalink: row.external_permalink.clone(),
        }
    }
}

/// A stored SEO page row, keyed by normalized page path.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SeoPageRow {
    pub id: String,
    pub page_path: String,
}

/// Payload for inserting or updating an SEO page.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NewSeoPage {
    pub page_path: String,
    pub page_type: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub focus_keyword: Option<String>,
    pub canonical_url: Option<String>,
    pub robots: String,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<String>,
    pub twitter_title: Option<String>,
    pub twitter_description: Option<String>,
    pub twitter_image: Option<String>,
}

/// Minimal published-post projection for sitemap rendering.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PublishedPost {
    pub slug: String,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Trait for the hosted content store: posts, categories, tags, post-tag
/// links and SEO pages. Implemented by the REST client and by test mocks.
#[cfg_attr(any(test, feature = "test-store-mocks"), automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<TermRow>, StoreError>;

    async fn create_category(&self, name: &str, slug: &str) -> Result<TermRow, StoreError>;

    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<TermRow>, StoreError>;

    async fn create_tag(&self, name: &str, slug: &str) -> Result<TermRow, StoreError>;

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<PostRow>, StoreError>;

    async fn insert_post(&self, post: &NewPost) -> Result<PostRow, StoreError>;

    async fn update_post(&self, id: &str, post: &NewPost) -> Result<PostRow, StoreError>;

    /// Delete every tag link for the post; part of the wholesale replace.
    async fn delete_post_tags(&self, post_id: &str) -> Result<(), StoreError>;

    async fn insert_post_tag(&self, post_id: &str, tag_id: &str) -> Result<(), StoreError>;

    async fn find_seo_page_by_path(&self, path: &str) -> Result<Option<SeoPageRow>, StoreError>;

    async fn insert_seo_page(&self, page: &NewSeoPage) -> Result<SeoPageRow, StoreError>;

    async fn update_seo_page(&self, id: &str, page: &NewSeoPage)
        -> Result<SeoPageRow, StoreError>;

    /// Published posts, newest first, for sitemap generation.
    async fn list_published_posts(&self) -> Result<Vec<PublishedPost>, StoreError>;

    /// Every stored post row; used by the image maintenance pass.
    async fn list_posts(&self) -> Result<Vec<PostRow>, StoreError>;
}

/// Trait for the flat object store (image bucket). Upload returns the public
/// URL of the stored object.
#[cfg_attr(any(test, feature = "test-store-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<String, StoreError>;
}

/// Bytes fetched from an origin server, with the reported content type.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Trait for fetching image bytes from an external URL. `Ok(None)` means a
/// non-success HTTP status; transport errors are `Err`.
#[cfg_attr(any(test, feature = "test-store-mocks"), automock)]
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Option<FetchedImage>, StoreError>;
}

/// Trait for relocating one featured image into the target bucket.
///
/// Infallible by contract: every failure (bad URL, fetch failure, upload
/// failure) becomes `None`, and the caller keeps the original URL. A post
/// import must never fail because of its image.
#[cfg_attr(any(test, feature = "test-store-mocks"), automock)]
#[async_trait]
pub trait Relocator: Send + Sync {
    async fn relocate(&self, url: &str, slug: &str, index: usize) -> Option<String>;
}
