//! Reconciliation pipeline tests against mocked stores.
//!
//! These exercise the write-plan semantics end to end: upsert-by-slug,
//! term-cache behavior, first-category-wins, wholesale tag replacement, and
//! per-post failure isolation.

use cms_sync_core::contract::{
    MockContentStore, MockRelocator, NewPost, PostRow, SeoPageRow, TermRow,
};
use cms_sync_core::progress::ImportProgress;
use cms_sync_core::reconcile::run_import;
use cms_sync_core::record::{ImportDocument, PostRecord, PostStatus, SeoFields, TermRecord};

fn post_row(id: &str, payload: &NewPost) -> PostRow {
    PostRow {
        id: id.to_string(),
        title: payload.title.clone(),
        slug: payload.slug.clone(),
        excerpt: payload.excerpt.clone(),
        content: payload.content.clone(),
        featured_image_url: payload.featured_image_url.clone(),
        author_name: payload.author_name.clone(),
        author_email: payload.author_email.clone(),
        status: payload.status,
        published_at: payload.published_at,
        updated_at: None,
        category_id: payload.category_id.clone(),
        seo_page_id: payload.seo_page_id.clone(),
        external_id: payload.external_id.clone(),
        external_permalink: payload.external_permalink.clone(),
    }
}

fn term(name: &str, slug: &str) -> TermRecord {
    TermRecord {
        name: name.to_string(),
        slug: slug.to_string(),
    }
}

fn basic_post(slug: &str, title: &str) -> PostRecord {
    PostRecord {
        title: title.to_string(),
        slug: slug.to_string(),
        content: format!("<p>{title}</p>"),
        status: Some("publish".to_string()),
        ..PostRecord::default()
    }
}

fn doc_with_posts(posts: Vec<PostRecord>) -> ImportDocument {
    ImportDocument {
        site_title: "Example".to_string(),
        site_url: "https://example.com".to_string(),
        posts,
        ..ImportDocument::default()
    }
}

#[tokio::test]
async fn first_import_inserts_new_post() {
    let doc = doc_with_posts(vec![basic_post("hello-world", "Hello World")]);

    let mut store = MockContentStore::new();
    store
        .expect_find_post_by_slug()
        .withf(|slug| slug == "hello-world")
        .times(1)
        .returning(|_| Ok(None));
    store
        .expect_insert_post()
        .withf(|p| p.slug == "hello-world" && p.status == PostStatus::Published)
        .times(1)
        .returning(|p| Ok(post_row("p1", p)));
    store
        .expect_delete_post_tags()
        .withf(|id| id == "p1")
        .times(1)
        .returning(|_| Ok(()));

    let progress = ImportProgress::new(doc.posts.len());
    let report = run_import(&doc, &store, None, &progress).await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn reimport_updates_in_place_with_latest_values() {
    // Second run of the same slug: the existing row is updated, not
    // duplicated, and carries the second run's field values.
    let doc = doc_with_posts(vec![basic_post("hello-world", "Hello World v2")]);

    let mut store = MockContentStore::new();
    store.expect_find_post_by_slug().returning(|slug| {
        let payload = NewPost {
            title: "Hello World v1".to_string(),
            slug: slug.to_string(),
            excerpt: None,
            content: String::new(),
            featured_image_url: None,
            author_name: None,
            author_email: None,
            status: PostStatus::Published,
            published_at: None,
            category_id: None,
            seo_page_id: None,
            external_id: None,
            external_permalink: None,
        };
        Ok(Some(post_row("p1", &payload)))
    });
    store.expect_insert_post().never();
    store
        .expect_update_post()
        .withf(|id, p| id == "p1" && p.title == "Hello World v2")
        .times(1)
        .returning(|id, p| {
            let mut row = post_row(id, p);
            row.id = id.to_string();
            Ok(row)
        });
    store
        .expect_delete_post_tags()
        .times(1)
        .returning(|_| Ok(()));

    let progress = ImportProgress::new(doc.posts.len());
    let report = run_import(&doc, &store, None, &progress).await;
    assert_eq!(report.succeeded, 1);
}

#[tokio::test]
async fn term_cache_resolves_each_slug_once() {
    // Two posts share the category; the store is consulted once.
    let mut doc = doc_with_posts(vec![
        basic_post("one", "One"),
        basic_post("two", "Two"),
    ]);
    doc.categories = vec![term("Travel", "travel")];
    doc.posts[0].categories = vec![term("Travel", "travel")];
    doc.posts[1].categories = vec![term("travel", "travel")];

    let mut store = MockContentStore::new();
    store
        .expect_find_category_by_slug()
        .withf(|slug| slug == "travel")
        .times(1)
        .returning(|_| Ok(None));
    store
        .expect_create_category()
        .withf(|name, slug| name == "Travel" && slug == "travel")
        .times(1)
        .returning(|name, slug| {
            Ok(TermRow {
                id: "c1".to_string(),
                name: name.to_string(),
                slug: slug.to_string(),
            })
        });
    store.expect_find_post_by_slug().returning(|_| Ok(None));
    // Both posts, with differing name casing, resolve the same category id.
    store
        .expect_insert_post()
        .withf(|p| p.category_id.as_deref() == Some("c1"))
        .times(2)
        .returning(|p| Ok(post_row("p", p)));
    store.expect_delete_post_tags().returning(|_| Ok(()));

    let progress = ImportProgress::new(doc.posts.len());
    let report = run_import(&doc, &store, None, &progress).await;
    assert_eq!(report.succeeded, 2);
}

#[tokio::test]
async fn category_resolves_by_source_slug_not_slugified_name() {
    // A renamed term keeps its original slug in the source export, so the
    // lookup key must be that slug, not a re-derivation from the display
    // name ("Café" slugifies to "caf", never "cafe").
    let mut doc = doc_with_posts(vec![basic_post("espresso", "Espresso")]);
    doc.categories = vec![term("Café", "cafe")];
    doc.posts[0].categories = vec![term("Café", "cafe")];
    doc.tags = vec![term("HowTo", "how-to-guides")];
    doc.posts[0].tags = vec![term("HowTo", "how-to-guides")];

    let mut store = MockContentStore::new();
    store
        .expect_find_category_by_slug()
        .withf(|slug| slug == "cafe")
        .times(1)
        .returning(|slug| {
            Ok(Some(TermRow {
                id: "c1".to_string(),
                name: "Café".to_string(),
                slug: slug.to_string(),
            }))
        });
    store
        .expect_find_tag_by_slug()
        .withf(|slug| slug == "how-to-guides")
        .times(1)
        .returning(|slug| {
            Ok(Some(TermRow {
                id: "t1".to_string(),
                name: "HowTo".to_string(),
                slug: slug.to_string(),
            }))
        });
    store.expect_find_post_by_slug().returning(|_| Ok(None));
    store
        .expect_insert_post()
        .withf(|p| p.category_id.as_deref() == Some("c1"))
        .times(1)
        .returning(|p| Ok(post_row("p1", p)));
    store
        .expect_delete_post_tags()
        .times(1)
        .returning(|_| Ok(()));
    store
        .expect_insert_post_tag()
        .withf(|post_id, tag_id| post_id == "p1" && tag_id == "t1")
        .times(1)
        .returning(|_, _| Ok(()));

    let progress = ImportProgress::new(doc.posts.len());
    let report = run_import(&doc, &store, None, &progress).await;
    assert_eq!(report.succeeded, 1);
}

#[tokio::test]
async fn first_resolvable_category_wins() {
    let mut doc = doc_with_posts(vec![basic_post("one", "One")]);
    doc.categories = vec![term("Broken", "broken"), term("Travel", "travel")];
    doc.posts[0].categories = vec![term("Broken", "broken"), term("Travel", "travel")];

    let mut store = MockContentStore::new();
    store.expect_find_category_by_slug().returning(|_| Ok(None));
    // "broken" cannot be created; the post falls through to "travel".
    store.expect_create_category().returning(|name, slug| {
        if slug == "broken" {
            Err("category create rejected".into())
        } else {
            Ok(TermRow {
                id: "c-travel".to_string(),
                name: name.to_string(),
                slug: slug.to_string(),
            })
        }
    });
    store.expect_find_post_by_slug().returning(|_| Ok(None));
    store
        .expect_insert_post()
        .withf(|p| p.category_id.as_deref() == Some("c-travel"))
        .times(1)
        .returning(|p| Ok(post_row("p1", p)));
    store.expect_delete_post_tags().returning(|_| Ok(()));

    let progress = ImportProgress::new(doc.posts.len());
    let report = run_import(&doc, &store, None, &progress).await;
    assert_eq!(report.succeeded, 1);
}

#[tokio::test]
async fn failing_post_does_not_abort_the_run() {
    let doc = doc_with_posts(vec![
        basic_post("bad", "Bad"),
        basic_post("good", "Good"),
    ]);

    let mut store = MockContentStore::new();
    store.expect_find_post_by_slug().returning(|_| Ok(None));
    store.expect_insert_post().returning(|p| {
        if p.slug == "bad" {
            Err("store rejected the row".into())
        } else {
            Ok(post_row("p-good", p))
        }
    });
    store.expect_delete_post_tags().returning(|_| Ok(()));

    let progress = ImportProgress::new(doc.posts.len());
    let report = run_import(&doc, &store, None, &progress).await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failed_posts, vec!["bad".to_string()]);
}

#[tokio::test]
async fn image_relocation_failure_keeps_original_url_and_post_succeeds() {
    let mut doc = doc_with_posts(vec![basic_post("pic-post", "Pic Post")]);
    doc.posts[0].featured_image_url = Some("https://old.example.com/404.jpg".to_string());

    let mut relocator = MockRelocator::new();
    relocator.expect_relocate().times(1).returning(|_, _, _| None);

    let mut store = MockContentStore::new();
    store.expect_find_post_by_slug().returning(|_| Ok(None));
    store
        .expect_insert_post()
        .withf(|p| p.featured_image_url.as_deref() == Some("https://old.example.com/404.jpg"))
        .times(1)
        .returning(|p| Ok(post_row("p1", p)));
    store.expect_delete_post_tags().returning(|_| Ok(()));

    let progress = ImportProgress::new(doc.posts.len());
    let report = run_import(&doc, &store, Some(&relocator), &progress).await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn relocated_image_url_replaces_original() {
    let mut doc = doc_with_posts(vec![basic_post("pic-post", "Pic Post")]);
    doc.posts[0].featured_image_url = Some("https://old.example.com/a.png".to_string());

    let mut relocator = MockRelocator::new();
    relocator
        .expect_relocate()
        .withf(|url, slug, index| {
            url == "https://old.example.com/a.png" && slug == "pic-post" && *index == 0
        })
        .returning(|_, _, _| Some("https://cdn.example.com/blog-images/pic-post-0-1.png".to_string()));

    let mut store = MockContentStore::new();
    store.expect_find_post_by_slug().returning(|_| Ok(None));
    store
        .expect_insert_post()
        .withf(|p| {
            p.featured_image_url.as_deref()
                == Some("https://cdn.example.com/blog-images/pic-post-0-1.png")
        })
        .times(1)
        .returning(|p| Ok(post_row("p1", p)));
    store.expect_delete_post_tags().returning(|_| Ok(()));

    let progress = ImportProgress::new(doc.posts.len());
    run_import(&doc, &store, Some(&relocator), &progress).await;
}

#[tokio::test]
async fn tag_links_are_replaced_wholesale() {
    let mut doc = doc_with_posts(vec![basic_post("tagged", "Tagged")]);
    doc.tags = vec![term("tips", "tips"), term("tricks", "tricks")];
    doc.posts[0].tags = vec![term("tips", "tips"), term("tricks", "tricks")];

    let mut store = MockContentStore::new();
    store.expect_find_tag_by_slug().returning(|slug| {
        Ok(Some(TermRow {
            id: format!("t-{slug}"),
            name: slug.to_string(),
            slug: slug.to_string(),
        }))
    });
    store.expect_find_post_by_slug().returning(|_| Ok(None));
    store
        .expect_insert_post()
        .returning(|p| Ok(post_row("p1", p)));
    store
        .expect_delete_post_tags()
        .withf(|id| id == "p1")
        .times(1)
        .returning(|_| Ok(()));
    store
        .expect_insert_post_tag()
        .withf(|post_id, tag_id| post_id == "p1" && (tag_id == "t-tips" || tag_id == "t-tricks"))
        .times(2)
        .returning(|_, _| Ok(()));

    let progress = ImportProgress::new(doc.posts.len());
    let report = run_import(&doc, &store, None, &progress).await;
    assert_eq!(report.succeeded, 1);
}

#[tokio::test]
async fn seo_row_is_upserted_when_fields_present() {
    let mut doc = doc_with_posts(vec![basic_post("seo-post", "Seo Post")]);
    doc.posts[0].seo = SeoFields {
        description: Some("A description".to_string()),
        noindex: true,
        ..SeoFields::default()
    };

    let mut store = MockContentStore::new();
    store
        .expect_find_seo_page_by_path()
        .withf(|path| path == "/seo-post")
        .times(1)
        .returning(|_| Ok(None));
    store
        .expect_insert_seo_page()
        .withf(|page| {
            page.page_path == "/seo-post"
                && page.robots == "noindex, follow"
                && page.description.as_deref() == Some("A description")
        })
        .times(1)
        .returning(|page| {
            Ok(SeoPageRow {
                id: "s1".to_string(),
                page_path: page.page_path.clone(),
            })
        });
    store.expect_find_post_by_slug().returning(|_| Ok(None));
    store
        .expect_insert_post()
        .withf(|p| p.seo_page_id.as_deref() == Some("s1"))
        .times(1)
        .returning(|p| Ok(post_row("p1", p)));
    store.expect_delete_post_tags().returning(|_| Ok(()));

    let progress = ImportProgress::new(doc.posts.len());
    let report = run_import(&doc, &store, None, &progress).await;
    assert_eq!(report.succeeded, 1);
}

#[tokio::test]
async fn existing_seo_row_is_updated_not_duplicated() {
    let mut doc = doc_with_posts(vec![basic_post("seo-post", "Seo Post")]);
    doc.posts[0].seo.title = Some("New SEO Title".to_string());

    let mut store = MockContentStore::new();
    store.expect_find_seo_page_by_path().returning(|path| {
        Ok(Some(SeoPageRow {
            id: "s1".to_string(),
            page_path: path.to_string(),
        }))
    });
    store.expect_insert_seo_page().never();
    store
        .expect_update_seo_page()
        .withf(|id, page| id == "s1" && page.title.as_deref() == Some("New SEO Title"))
        .times(1)
        .returning(|id, page| {
            Ok(SeoPageRow {
                id: id.to_string(),
                page_path: page.page_path.clone(),
            })
        });
    store.expect_find_post_by_slug().returning(|_| Ok(None));
    store
        .expect_insert_post()
        .returning(|p| Ok(post_row("p1", p)));
    store.expect_delete_post_tags().returning(|_| Ok(()));

    let progress = ImportProgress::new(doc.posts.len());
    run_import(&doc, &store, None, &progress).await;
}

#[tokio::test]
async fn posts_without_seo_fields_write_no_seo_row() {
    let doc = doc_with_posts(vec![basic_post("plain", "Plain")]);

    let mut store = MockContentStore::new();
    store.expect_find_seo_page_by_path().never();
    store.expect_insert_seo_page().never();
    store.expect_find_post_by_slug().returning(|_| Ok(None));
    store
        .expect_insert_post()
        .withf(|p| p.seo_page_id.is_none())
        .returning(|p| Ok(post_row("p1", p)));
    store.expect_delete_post_tags().returning(|_| Ok(()));

    let progress = ImportProgress::new(doc.posts.len());
    let report = run_import(&doc, &store, None, &progress).await;
    assert_eq!(report.succeeded, 1);
}
