//! REST client for the hosted content backend.
//!
//! The backend exposes its tables through a PostgREST-style API: filters as
//! query parameters (`slug=eq.hello`), writes as POST/PATCH/DELETE with a
//! `Prefer: return=representation` header when the caller needs the row
//! back. This module bridges that API to the [`ContentStore`] trait the
//! pipeline is written against.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use cms_sync_core::contract::{
    ContentStore, NewPost, NewSeoPage, PostRow, PublishedPost, SeoPageRow, StoreError, TermRow,
};

use crate::load_config::BackendCredentials;

pub struct RestContentStore {
    client: reqwest::Client,
    base: String,
    service_key: String,
}

impl RestContentStore {
    pub fn new(credentials: &BackendCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: format!("{}/rest/v1", credentials.api_url),
            service_key: credentials.service_key.clone(),
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base, table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    /// Send and deserialize a row set, converting non-success statuses into
    /// a readable error.
    async fn rows<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Vec<T>, StoreError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "backend request failed");
            return Err(format!("backend returned {status}: {body}").into());
        }
        Ok(response.json().await?)
    }

    /// As [`Self::rows`] but for writes where the body is irrelevant.
    async fn execute(&self, builder: RequestBuilder) -> Result<(), StoreError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "backend request failed");
            return Err(format!("backend returned {status}: {body}").into());
        }
        Ok(())
    }

    async fn find_term(&self, table: &str, slug: &str) -> Result<Option<TermRow>, StoreError> {
        debug!(table, slug, "looking up term by slug");
        let rows: Vec<TermRow> = self
            .rows(
                self.request(Method::GET, table)
                    .query(&[("slug", format!("eq.{slug}")), ("limit", "1".into())]),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn create_term(&self, table: &str, name: &str, slug: &str) -> Result<TermRow, StoreError> {
        info!(table, name, slug, "creating term");
        let rows: Vec<TermRow> = self
            .rows(
                self.request(Method::POST, table)
                    .header("Prefer", "return=representation")
                    .json(&serde_json::json!({ "name": name, "slug": slug })),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| format!("backend returned no row for created {table} entry").into())
    }
}

fn only_row<T>(rows: Vec<T>, what: &str) -> Result<T, StoreError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| format!("backend returned no row for {what}").into())
}

#[async_trait]
impl ContentStore for RestContentStore {
    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<TermRow>, StoreError> {
        self.find_term("categories", slug).await
    }

    async fn create_category(&self, name: &str, slug: &str) -> Result<TermRow, StoreError> {
        self.create_term("categories", name, slug).await
    }

    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<TermRow>, StoreError> {
        self.find_term("tags", slug).await
    }

    async fn create_tag(&self, name: &str, slug: &str) -> Result<TermRow, StoreError> {
        self.create_term("tags", name, slug).await
    }

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<PostRow>, StoreError> {
        debug!(slug, "looking up post by slug");
        let rows: Vec<PostRow> = self
            .rows(
                self.request(Method::GET, "posts")
                    .query(&[("slug", format!("eq.{slug}")), ("limit", "1".into())]),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_post(&self, post: &NewPost) -> Result<PostRow, StoreError> {
        info!(slug = %post.slug, "inserting post");
        let rows: Vec<PostRow> = self
            .rows(
                self.request(Method::POST, "posts")
                    .header("Prefer", "return=representation")
                    .json(post),
            )
            .await?;
        only_row(rows, "inserted post")
    }

    async fn update_post(&self, id: &str, post: &NewPost) -> Result<PostRow, StoreError> {
        info!(id, slug = %post.slug, "updating post");
        let rows: Vec<PostRow> = self
            .rows(
                self.request(Method::PATCH, "posts")
                    .query(&[("id", format!("eq.{id}"))])
                    .header("Prefer", "return=representation")
                    .json(post),
            )
            .await?;
        only_row(rows, "updated post")
    }

    async fn delete_post_tags(&self, post_id: &str) -> Result<(), StoreError> {
        debug!(post_id, "deleting post tag links");
        self.execute(
            self.request(Method::DELETE, "post_tags")
                .query(&[("post_id", format!("eq.{post_id}"))]),
        )
        .await
    }

    async fn insert_post_tag(&self, post_id: &str, tag_id: &str) -> Result<(), StoreError> {
        debug!(post_id, tag_id, "inserting post tag link");
        self.execute(
            self.request(Method::POST, "post_tags")
                .json(&serde_json::json!({ "post_id": post_id, "tag_id": tag_id })),
        )
        .await
    }

    async fn find_seo_page_by_path(&self, path: &str) -> Result<Option<SeoPageRow>, StoreError> {
        debug!(path, "looking up SEO page by path");
        let rows: Vec<SeoPageRow> = self
            .rows(
                self.request(Method::GET, "seo_pages")
                    .query(&[("page_path", format!("eq.{path}")), ("limit", "1".into())]),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_seo_page(&self, page: &NewSeoPage) -> Result<SeoPageRow, StoreError> {
        info!(path = %page.page_path, "inserting SEO page");
        let rows: Vec<SeoPageRow> = self
            .rows(
                self.request(Method::POST, "seo_pages")
                    .header("Prefer", "return=representation")
                    .json(page),
            )
            .await?;
        only_row(rows, "inserted SEO page")
    }

    async fn update_seo_page(
        &self,
        id: &str,
        page: &NewSeoPage,
    ) -> Result<SeoPageRow, StoreError> {
        info!(id, path = %page.page_path, "updating SEO page");
        let rows: Vec<SeoPageRow> = self
            .rows(
                self.request(Method::PATCH, "seo_pages")
                    .query(&[("id", format!("eq.{id}"))])
                    .header("Prefer", "return=representation")
                    .json(page),
            )
            .await?;
        only_row(rows, "updated SEO page")
    }

    async fn list_published_posts(&self) -> Result<Vec<PublishedPost>, StoreError> {
        debug!("listing published posts");
        self.rows(self.request(Method::GET, "posts").query(&[
            ("status", "eq.published"),
            ("select", "slug,published_at,updated_at"),
            ("order", "published_at.desc.nullslast"),
        ]))
        .await
    }

    async fn list_posts(&self) -> Result<Vec<PostRow>, StoreError> {
        debug!("listing all posts");
        self.rows(
            self.request(Method::GET, "posts")
                .query(&[("select", "*"), ("order", "published_at.desc.nullslast")]),
        )
        .await
    }
}
