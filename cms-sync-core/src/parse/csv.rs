//! Flat CSV export parser.
//!
//! Consumes a table with WordPress-like columns (Title, Content, Permalink,
//! Categories, SEO-prefixed columns, ...). Unlike the XML path nothing here
//! is fatal: structurally bad rows are skipped and reported as warnings,
//! rows without a usable Title are skipped silently.

use std::collections::HashMap;

use csv::ReaderBuilder;
use tracing::debug;

use super::ParsedExport;
use crate::record::{
    parse_source_datetime, AuthorRecord, ImportDocument, PostRecord, SeoFields, TermRecord,
};
use crate::slug::{resolve_slug, slugify};

/// Warnings kept verbatim; anything past this is summarized as a count.
const MAX_WARNINGS: usize = 5;

/// Parse CSV export text. Never fails: an empty or headerless file simply
/// yields zero posts.
pub fn parse(text: &str) -> ParsedExport {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: HashMap<String, usize> = match reader.headers() {
        Ok(headers) => headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_ascii_lowercase(), i))
            .collect(),
        Err(e) => {
            return ParsedExport {
                document: ImportDocument::default(),
                warnings: vec![format!("could not read CSV header row: {e}")],
            }
        }
    };

    let mut document = ImportDocument::default();
    let mut warnings = Vec::new();
    let mut suppressed_warnings = 0usize;

    for (row_index, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                if warnings.len() < MAX_WARNINGS {
                    warnings.push(format!("row {}: {e}", row_index + 2));
                } else {
                    suppressed_warnings += 1;
                }
                continue;
            }
        };

        let col = |name: &str| -> Option<&str> {
            headers
                .get(name)
                .and_then(|&i| record.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        // Keep only rows that look like posts.
        let title = match col("title") {
            Some(t) => t.to_string(),
            None => continue,
        };
        if let Some(post_type) = col("post type") {
            if !post_type.eq_ignore_ascii_case("post") && !post_type.eq_ignore_ascii_case("posts")
            {
                continue;
            }
        }

        let permalink = col("permalink").map(str::to_string);
        let slug = resolve_slug(col("slug"), permalink.as_deref(), &title);
        if slug.is_empty() {
            continue;
        }

        let categories = terms_from_names(split_term_names(col("categories")));
        let tags = terms_from_names(split_term_names(col("tags")));
        for term in &categories {
            merge_term(&mut document.categories, term);
        }
        for term in &tags {
            merge_term(&mut document.tags, term);
        }

        let author_name = col("author name").map(str::to_string);
        let author_email = col("author email").map(str::to_string);
        if let Some(name) = &author_name {
            if !document.authors.iter().any(|a| &a.display_name == name) {
                document.authors.push(AuthorRecord {
                    login: slugify(name),
                    display_name: name.clone(),
                    email: author_email.clone(),
                });
            }
        }

        let seo = SeoFields {
            title: col("seo title").map(str::to_string),
            description: col("seo description").map(str::to_string),
            focus_keyword: col("seo focus keyword").map(str::to_string),
            canonical_url: col("seo canonical").map(str::to_string),
            noindex: flag_is_set(col("seo noindex")),
            nofollow: flag_is_set(col("seo nofollow")),
            og_title: col("seo og title").map(str::to_string),
            og_description: col("seo og description").map(str::to_string),
            og_image: col("seo og image").map(str::to_string),
            twitter_title: col("seo twitter title").map(str::to_string),
            twitter_description: col("seo twitter description").map(str::to_string),
            twitter_image: col("seo twitter image").map(str::to_string),
        };

        document.posts.push(PostRecord {
            external_id: col("id").map(str::to_string),
            title,
            slug,
            excerpt: col("excerpt").map(str::to_string),
            content: col("content").unwrap_or_default().to_string(),
            status: col("status").map(str::to_string),
            published_at: col("date").and_then(parse_source_datetime),
            categories,
            tags,
            featured_image_url: col("image url").map(str::to_string),
            author_name,
            author_email,
            external_permalink: permalink,
            seo,
        });
    }

    if suppressed_warnings > 0 {
        warnings.push(format!(
            "{suppressed_warnings} further malformed rows suppressed"
        ));
    }

    debug!(
        posts = document.posts.len(),
        warnings = warnings.len(),
        "parsed CSV export"
    );

    ParsedExport { document, warnings }
}

/// Comma-separated term names, deduplicated by lowercased name, order kept.
fn split_term_names(raw: Option<&str>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    if let Some(raw) = raw {
        for name in raw.split(',') {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// Name-only CSV terms get their slug from `slugify`; names whose slug
/// collapses to nothing are dropped.
fn terms_from_names(names: Vec<String>) -> Vec<TermRecord> {
    names
        .into_iter()
        .filter_map(|name| {
            let slug = slugify(&name);
            if slug.is_empty() {
                None
            } else {
                Some(TermRecord { name, slug })
            }
        })
        .collect()
}

fn merge_term(terms: &mut Vec<TermRecord>, term: &TermRecord) {
    if !terms.iter().any(|t| t.slug == term.slug) {
        terms.push(term.clone());
    }
}

fn flag_is_set(value: Option<&str>) -> bool {
    matches!(
        value.map(str::to_ascii_lowercase).as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}
