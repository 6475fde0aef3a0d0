//! Reconciliation engine: turns a parsed export into store writes.
//!
//! One run is strictly sequential. Categories and tags are resolved up
//! front (find-or-create, building slug-to-id maps) so the per-post phase
//! never races the term cache; each post is then an explicit sequence of
//! idempotent steps: SEO upsert, category resolution, optional image
//! relocation, post upsert by slug, wholesale tag-link replacement. A
//! failure inside one post marks that post failed and moves on; re-running
//! the whole import is the recovery mechanism.

use std::collections::HashMap;

use tracing::{error, info, warn};

use crate::contract::{ContentStore, NewPost, NewSeoPage, Relocator, StoreError};
use crate::progress::ImportProgress;
use crate::record::{ImportDocument, PostRecord, TermRecord};

/// Outcome of one import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Slugs (or titles, when the slug was unusable) of failed posts.
    pub failed_posts: Vec<String>,
}

/// Import every post in the document. Never aborts mid-run: all failures
/// are accounted per term or per post.
pub async fn run_import<S: ContentStore>(
    document: &ImportDocument,
    store: &S,
    relocator: Option<&dyn Relocator>,
    progress: &ImportProgress,
) -> ImportReport {
    info!(
        posts = document.posts.len(),
        categories = document.categories.len(),
        tags = document.tags.len(),
        "starting import run"
    );

    // Phase 1: resolve every declared term before touching any post, so the
    // slug-to-id maps are complete and no post can trigger a duplicate
    // create for a slug another post already resolved.
    let category_ids = resolve_terms(store, &document.categories, TermKind::Category).await;
    let tag_ids = resolve_terms(store, &document.tags, TermKind::Tag).await;

    // Phase 2: posts, strictly in source order.
    for (index, post) in document.posts.iter().enumerate() {
        let label = if post.slug.is_empty() {
            post.title.clone()
        } else {
            post.slug.clone()
        };
        match import_post(store, relocator, &category_ids, &tag_ids, post, index).await {
            Ok(()) => {
                progress.record_success();
            }
            Err(e) => {
                error!(slug = %post.slug, title = %post.title, error = %e, "post import failed");
                progress.record_failure(&label);
            }
        }
    }

    let snapshot = progress.snapshot();
    info!(
        succeeded = snapshot.succeeded,
        failed = snapshot.failed,
        "import run finished"
    );
    ImportReport {
        total: snapshot.total,
        succeeded: snapshot.succeeded,
        failed: snapshot.failed,
        failed_posts: snapshot.failed_labels,
    }
}

#[derive(Clone, Copy)]
enum TermKind {
    Category,
    Tag,
}

/// Find-or-create each declared term, producing the slug-to-id map used for
/// the rest of the run. A failing term is logged and skipped; posts that
/// reference it simply resolve no id for it.
async fn resolve_terms<S: ContentStore>(
    store: &S,
    terms: &[TermRecord],
    kind: TermKind,
) -> HashMap<String, String> {
    let mut ids = HashMap::new();
    for term in terms {
        if ids.contains_key(&term.slug) {
            continue;
        }
        let result = match kind {
            TermKind::Category => {
                find_or_create(
                    store.find_category_by_slug(&term.slug).await,
                    || store.create_category(&term.name, &term.slug),
                )
                .await
            }
            TermKind::Tag => {
                find_or_create(store.find_tag_by_slug(&term.slug).await, || {
                    store.create_tag(&term.name, &term.slug)
                })
                .await
            }
        };
        match result {
            Ok(id) => {
                ids.insert(term.slug.clone(), id);
            }
            Err(e) => {
                warn!(slug = %term.slug, name = %term.name, error = %e, "term resolution failed, skipping");
            }
        }
    }
    ids
}

async fn find_or_create<F, Fut>(
    found: Result<Option<crate::contract::TermRow>, StoreError>,
    create: F,
) -> Result<String, StoreError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<crate::contract::TermRow, StoreError>>,
{
    match found? {
        Some(row) => Ok(row.id),
        None => Ok(create().await?.id),
    }
}

/// One post's write sequence. Any `Err` fails this post only.
async fn import_post<S: ContentStore>(
    store: &S,
    relocator: Option<&dyn Relocator>,
    category_ids: &HashMap<String, String>,
    tag_ids: &HashMap<String, String>,
    post: &PostRecord,
    index: usize,
) -> Result<(), StoreError> {
    // (a, b) SEO metadata for the post's eventual public URL.
    let seo_page_id = if post.seo.is_empty() {
        None
    } else {
        Some(upsert_seo_page(store, post).await?)
    };

    // (c) First declared category with a mapped id wins; later ones are
    // ignored. A post has at most one category. Lookup is by the slug the
    // parser resolved, which is the same key phase 1 built the map with.
    let category_id = post
        .categories
        .iter()
        .find_map(|term| category_ids.get(&term.slug))
        .cloned();

    // Relocation failure keeps the original URL; never fails the post.
    let mut featured_image_url = post.featured_image_url.clone();
    if let (Some(relocator), Some(url)) = (relocator, post.featured_image_url.as_deref()) {
        if let Some(rehosted) = relocator.relocate(url, &post.slug, index).await {
            featured_image_url = Some(rehosted);
        }
    }

    // (d) Upsert the post by slug: update all mutable fields in place, or
    // insert and capture the generated id.
    let payload = NewPost {
        title: post.title.clone(),
        slug: post.slug.clone(),
        excerpt: post.excerpt.clone(),
        content: post.content.clone(),
        featured_image_url,
        author_name: post.author_name.clone(),
        author_email: post.author_email.clone(),
        status: post.mapped_status(),
        published_at: post.published_at,
        category_id,
        seo_page_id,
        external_id: post.external_id.clone(),
        external_permalink: post.external_permalink.clone(),
    };
    let post_id = match store.find_post_by_slug(&post.slug).await? {
        Some(existing) => store.update_post(&existing.id, &payload).await?.id,
        None => store.insert_post(&payload).await?.id,
    };

    // (e) Replace tag links wholesale.
    store.delete_post_tags(&post_id).await?;
    for term in &post.tags {
        if let Some(tag_id) = tag_ids.get(&term.slug) {
            store.insert_post_tag(&post_id, tag_id).await?;
        }
    }

    Ok(())
}

/// Insert or update the SEO row keyed by `/` + slug, returning its id.
async fn upsert_seo_page<S: ContentStore>(
    store: &S,
    post: &PostRecord,
) -> Result<String, StoreError> {
    let page_path = format!("/{}", post.slug);
    let payload = NewSeoPage {
        page_path: page_path.clone(),
        page_type: "blog_post".to_string(),
        title: post.seo.title.clone(),
        description: post.seo.description.clone(),
        focus_keyword: post.seo.focus_keyword.clone(),
        canonical_url: post.seo.canonical_url.clone(),
        robots: post.seo.robots_directive(),
        og_title: post.seo.og_title.clone(),
        og_description: post.seo.og_description.clone(),
        og_image: post.seo.og_image.clone(),
        twitter_title: post.seo.twitter_title.clone(),
        twitter_description: post.seo.twitter_description.clone(),
        twitter_image: post.seo.twitter_image.clone(),
    };
    match store.find_seo_page_by_path(&page_path).await? {
        Some(existing) => Ok(store.update_seo_page(&existing.id, &payload).await?.id),
        None => Ok(store.insert_seo_page(&payload).await?.id),
    }
}
