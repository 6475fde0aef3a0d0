//! WordPress WXR (eXtended RSS) export parser.
//!
//! Streams quick-xml events over the loaded export text. Channel-level
//! metadata and author/category/tag declarations are collected first, then
//! every top-level `<item>` whose `wp:post_type` is `post` becomes one
//! [`PostRecord`]. A parse failure or a missing `<channel>` element is
//! fatal: the file does not resemble a WordPress export.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::debug;

use super::{ParseError, ParsedExport};
use crate::record::{
    parse_source_datetime, AuthorRecord, ImportDocument, PostRecord, SeoFields, TermRecord,
};
use crate::slug::{resolve_slug, slugify};

/// Yoast postmeta keys carried into [`SeoFields`].
const META_SEO_TITLE: &str = "_yoast_wpseo_title";
const META_SEO_DESC: &str = "_yoast_wpseo_metadesc";
const META_SEO_FOCUSKW: &str = "_yoast_wpseo_focuskw";
const META_SEO_CANONICAL: &str = "_yoast_wpseo_canonical";
const META_SEO_NOINDEX: &str = "_yoast_wpseo_meta-robots-noindex";
const META_SEO_NOFOLLOW: &str = "_yoast_wpseo_meta-robots-nofollow";
const META_SEO_OG_TITLE: &str = "_yoast_wpseo_opengraph-title";
const META_SEO_OG_DESC: &str = "_yoast_wpseo_opengraph-description";
const META_SEO_OG_IMAGE: &str = "_yoast_wpseo_opengraph-image";
const META_SEO_TW_TITLE: &str = "_yoast_wpseo_twitter-title";
const META_SEO_TW_DESC: &str = "_yoast_wpseo_twitter-description";
const META_SEO_TW_IMAGE: &str = "_yoast_wpseo_twitter-image";
/// Non-Yoast convenience key some export plugins emit for the hero image.
const META_FEATURED_IMAGE: &str = "featured_image";

/// Item fields accumulated from XML events before finalization.
#[derive(Debug, Default)]
struct PartialItem {
    title: Option<String>,
    link: Option<String>,
    creator: Option<String>,
    content: Option<String>,
    excerpt: Option<String>,
    post_id: Option<String>,
    post_date: Option<String>,
    post_date_gmt: Option<String>,
    status: Option<String>,
    post_name: Option<String>,
    post_type: Option<String>,
    /// Inline `<category domain=... nicename=...>` associations, in order.
    terms: Vec<InlineTerm>,
    /// Arbitrary `wp:postmeta` key/value pairs.
    metas: Vec<(String, String)>,
}

#[derive(Debug)]
struct InlineTerm {
    domain: String,
    nicename: Option<String>,
    name: String,
}

#[derive(Debug, Default)]
struct PartialAuthor {
    login: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
}

/// `wp:category` / `wp:tag` declaration being built.
#[derive(Debug, Default)]
struct PartialTerm {
    slug: Option<String>,
    name: Option<String>,
}

/// Parse a WXR export into the normalized document shape.
pub fn parse(text: &str) -> Result<ParsedExport, ParseError> {
    let mut reader = Reader::from_str(text);

    let mut document = ImportDocument::default();
    let mut saw_channel = false;

    let mut text_buf = String::new();
    let mut current_element: Option<String> = None;
    let mut current_item: Option<PartialItem> = None;
    let mut current_author: Option<PartialAuthor> = None;
    let mut current_category: Option<PartialTerm> = None;
    let mut current_tag: Option<PartialTerm> = None;
    // (key, value) of the wp:postmeta currently open.
    let mut current_meta: Option<(Option<String>, Option<String>)> = None;
    // Attributes of the inline <category> currently open.
    let mut current_inline_term: Option<(String, Option<String>)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                handle_start(
                    &name,
                    e,
                    &mut saw_channel,
                    &mut current_item,
                    &mut current_author,
                    &mut current_category,
                    &mut current_tag,
                    &mut current_meta,
                    &mut current_inline_term,
                );
                current_element = Some(name);
                text_buf.clear();
            }
            // Self-closing elements are their empty-content equivalents.
            Event::Empty(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                handle_start(
                    &name,
                    e,
                    &mut saw_channel,
                    &mut current_item,
                    &mut current_author,
                    &mut current_category,
                    &mut current_tag,
                    &mut current_meta,
                    &mut current_inline_term,
                );
                handle_end(
                    &name,
                    String::new(),
                    &mut document,
                    &mut current_item,
                    &mut current_author,
                    &mut current_category,
                    &mut current_tag,
                    &mut current_meta,
                    &mut current_inline_term,
                );
                current_element = None;
                text_buf.clear();
            }
            Event::Text(ref e) => {
                if current_element.is_some() {
                    if let Ok(text) = e.unescape() {
                        text_buf.push_str(&text);
                    }
                }
            }
            Event::CData(ref e) => {
                if current_element.is_some() {
                    text_buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::End(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let value = text_buf.trim().to_string();
                handle_end(
                    &name,
                    value,
                    &mut document,
                    &mut current_item,
                    &mut current_author,
                    &mut current_category,
                    &mut current_tag,
                    &mut current_meta,
                    &mut current_inline_term,
                );
                current_element = None;
                text_buf.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_channel {
        return Err(ParseError::NotAnExport(
            "no <channel> element found".to_string(),
        ));
    }

    debug!(
        posts = document.posts.len(),
        categories = document.categories.len(),
        tags = document.tags.len(),
        "parsed WXR export"
    );

    Ok(ParsedExport {
        document,
        warnings: Vec::new(),
    })
}

#[allow(clippy::too_many_arguments)]
fn handle_start(
    name: &str,
    e: &BytesStart<'_>,
    saw_channel: &mut bool,
    current_item: &mut Option<PartialItem>,
    current_author: &mut Option<PartialAuthor>,
    current_category: &mut Option<PartialTerm>,
    current_tag: &mut Option<PartialTerm>,
    current_meta: &mut Option<(Option<String>, Option<String>)>,
    current_inline_term: &mut Option<(String, Option<String>)>,
) {
    match name {
        "channel" => *saw_channel = true,
        "item" => *current_item = Some(PartialItem::default()),
        "wp:author" => *current_author = Some(PartialAuthor::default()),
        "wp:category" if current_item.is_none() => {
            *current_category = Some(PartialTerm::default())
        }
        "wp:tag" if current_item.is_none() => *current_tag = Some(PartialTerm::default()),
        "wp:postmeta" => *current_meta = Some((None, None)),
        "category" if current_item.is_some() => {
            let mut domain = String::new();
            let mut nicename = None;
            for attr in e.attributes().flatten() {
                match attr.key.as_ref() {
                    b"domain" => {
                        domain = attr
                            .unescape_value()
                            .map(|v| v.into_owned())
                            .unwrap_or_default()
                    }
                    b"nicename" => nicename = attr.unescape_value().ok().map(|v| v.into_owned()),
                    _ => {}
                }
            }
            *current_inline_term = Some((domain, nicename));
        }
        _ => {}
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_end(
    name: &str,
    value: String,
    document: &mut ImportDocument,
    current_item: &mut Option<PartialItem>,
    current_author: &mut Option<PartialAuthor>,
    current_category: &mut Option<PartialTerm>,
    current_tag: &mut Option<PartialTerm>,
    current_meta: &mut Option<(Option<String>, Option<String>)>,
    current_inline_term: &mut Option<(String, Option<String>)>,
) {
    // Postmeta children take precedence over everything else inside an item.
    if let Some(meta) = current_meta.as_mut() {
        match name {
            "wp:meta_key" => {
                meta.0 = Some(value);
                return;
            }
            "wp:meta_value" => {
                meta.1 = Some(value);
                return;
            }
            "wp:postmeta" => {
                if let Some((Some(key), Some(val))) = current_meta.take() {
                    if let Some(item) = current_item.as_mut() {
                        item.metas.push((key, val));
                    }
                }
                return;
            }
            _ => {}
        }
    }

    if let Some(author) = current_author.as_mut() {
        match name {
            "wp:author_login" => author.login = Some(value),
            "wp:author_email" => author.email = Some(value),
            "wp:author_display_name" => author.display_name = Some(value),
            "wp:author" => {
                if let Some(author) = current_author.take() {
                    if let Some(login) = author.login.filter(|l| !l.is_empty()) {
                        document.authors.push(AuthorRecord {
                            display_name: author
                                .display_name
                                .filter(|d| !d.is_empty())
                                .unwrap_or_else(|| login.clone()),
                            email: author.email.filter(|e| !e.is_empty()),
                            login,
                        });
                    }
                }
            }
            _ => {}
        }
        return;
    }

    if let Some(term) = current_category.as_mut() {
        match name {
            "wp:category_nicename" => term.slug = Some(value),
            "wp:cat_name" => term.name = Some(value),
            "wp:category" => {
                if let Some(term) = current_category.take() {
                    push_declared_term(&mut document.categories, term);
                }
            }
            _ => {}
        }
        return;
    }

    if let Some(term) = current_tag.as_mut() {
        match name {
            "wp:tag_slug" => term.slug = Some(value),
            "wp:tag_name" => term.name = Some(value),
            "wp:tag" => {
                if let Some(term) = current_tag.take() {
                    push_declared_term(&mut document.tags, term);
                }
            }
            _ => {}
        }
        return;
    }

    if let Some(item) = current_item.as_mut() {
        match name {
            "title" => item.title = Some(value),
            "link" => item.link = Some(value),
            "dc:creator" => item.creator = Some(value),
            "content:encoded" => item.content = Some(value),
            "excerpt:encoded" => item.excerpt = Some(value),
            "wp:post_id" => item.post_id = Some(value),
            "wp:post_date" => item.post_date = Some(value),
            "wp:post_date_gmt" => item.post_date_gmt = Some(value),
            "wp:status" => item.status = Some(value),
            "wp:post_name" => item.post_name = Some(value),
            "wp:post_type" => item.post_type = Some(value),
            "category" => {
                if let Some((domain, nicename)) = current_inline_term.take() {
                    item.terms.push(InlineTerm {
                        domain,
                        nicename,
                        name: value,
                    });
                }
            }
            "item" => {
                if let Some(item) = current_item.take() {
                    finalize_item(document, item);
                }
            }
            _ => {}
        }
        return;
    }

    // Channel-level metadata.
    match name {
        "title" => {
            if document.site_title.is_empty() {
                document.site_title = value;
            }
        }
        "link" => {
            if document.site_url.is_empty() {
                document.site_url = value;
            }
        }
        _ => {}
    }
}

fn push_declared_term(terms: &mut Vec<TermRecord>, partial: PartialTerm) {
    let name = match partial.name.filter(|n| !n.is_empty()) {
        Some(n) => n,
        None => return,
    };
    let slug = partial
        .slug
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| slugify(&name));
    if !terms.iter().any(|t| t.slug == slug) {
        terms.push(TermRecord { name, slug });
    }
}

/// Convert a completed `<item>` into a post record, keeping only real posts.
fn finalize_item(document: &mut ImportDocument, item: PartialItem) {
    if item.post_type.as_deref() != Some("post") {
        return;
    }
    let title = item.title.unwrap_or_default();
    let slug = resolve_slug(item.post_name.as_deref(), None, &title);
    if slug.is_empty() {
        debug!(title = %title, "skipping item with no derivable slug");
        return;
    }

    // Inline terms, distinct by slug, declaration order preserved. The
    // nicename-derived slug travels with the post so reconciliation keys
    // term lookups exactly as phase 1 keyed the id maps.
    let mut categories: Vec<TermRecord> = Vec::new();
    let mut tags: Vec<TermRecord> = Vec::new();
    let mut seen_slugs: Vec<String> = Vec::new();
    for term in &item.terms {
        // Self-closing inline terms carry no display name; the nicename
        // stands in for it.
        let name = if term.name.is_empty() {
            match term.nicename.clone().filter(|s| !s.is_empty()) {
                Some(nicename) => nicename,
                None => continue,
            }
        } else {
            term.name.clone()
        };
        let term_slug = term
            .nicename
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| slugify(&name));
        if seen_slugs.contains(&term_slug) {
            continue;
        }
        seen_slugs.push(term_slug.clone());
        let record = TermRecord {
            name,
            slug: term_slug,
        };
        match term.domain.as_str() {
            "category" => {
                categories.push(record.clone());
                merge_term(&mut document.categories, record);
            }
            "post_tag" => {
                tags.push(record.clone());
                merge_term(&mut document.tags, record);
            }
            _ => {}
        }
    }

    let author = resolve_author(document, item.creator.as_deref());

    let seo = seo_from_meta(&item.metas);
    let featured_image_url = item
        .metas
        .iter()
        .find(|(k, _)| k == META_FEATURED_IMAGE)
        .map(|(_, v)| v.clone())
        .filter(|v| !v.is_empty())
        .or_else(|| seo.og_image.clone());

    let published_at = item
        .post_date_gmt
        .as_deref()
        .and_then(parse_source_datetime)
        .or_else(|| item.post_date.as_deref().and_then(parse_source_datetime));

    document.posts.push(PostRecord {
        external_id: item.post_id.filter(|id| !id.is_empty()),
        title,
        slug,
        excerpt: item.excerpt.filter(|e| !e.is_empty()),
        content: item.content.unwrap_or_default(),
        status: item.status.filter(|s| !s.is_empty()),
        published_at,
        categories,
        tags,
        featured_image_url,
        author_name: author.as_ref().map(|a| a.display_name.clone()),
        author_email: author.as_ref().and_then(|a| a.email.clone()),
        external_permalink: item.link.filter(|l| !l.is_empty()),
        seo,
    });
}

/// Inline terms may reference slugs never declared at channel level; merge
/// them in so the reconciliation step sees every term exactly once.
fn merge_term(terms: &mut Vec<TermRecord>, record: TermRecord) {
    if !terms.iter().any(|t| t.slug == record.slug) {
        terms.push(record);
    }
}

/// Resolve `dc:creator` against declared authors: match by login, fall back
/// to the first declared author, then to a stub built from the login alone.
fn resolve_author(document: &ImportDocument, creator: Option<&str>) -> Option<AuthorRecord> {
    let creator = creator.filter(|c| !c.is_empty());
    if let Some(login) = creator {
        if let Some(author) = document.authors.iter().find(|a| a.login == login) {
            return Some(author.clone());
        }
    }
    if let Some(first) = document.authors.first() {
        return Some(first.clone());
    }
    creator.map(|login| AuthorRecord {
        login: login.to_string(),
        display_name: login.to_string(),
        email: None,
    })
}

fn seo_from_meta(metas: &[(String, String)]) -> SeoFields {
    let get = |key: &str| {
        metas
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .filter(|v| !v.is_empty())
    };
    SeoFields {
        title: get(META_SEO_TITLE),
        description: get(META_SEO_DESC),
        focus_keyword: get(META_SEO_FOCUSKW),
        canonical_url: get(META_SEO_CANONICAL),
        noindex: get(META_SEO_NOINDEX).as_deref() == Some("1"),
        nofollow: get(META_SEO_NOFOLLOW).as_deref() == Some("1"),
        og_title: get(META_SEO_OG_TITLE),
        og_description: get(META_SEO_OG_DESC),
        og_image: get(META_SEO_OG_IMAGE),
        twitter_title: get(META_SEO_TW_TITLE),
        twitter_description: get(META_SEO_TW_DESC),
        twitter_image: get(META_SEO_TW_IMAGE),
    }
}
