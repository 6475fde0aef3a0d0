//! Normalized export model.
//!
//! Both parsers (WXR XML and CSV) produce the same [`ImportDocument`] shape.
//! All defaulting rules (slug fallback chain, status mapping, date parsing)
//! are applied once at parse time, so downstream code never re-derives them.

use chrono::{DateTime, NaiveDateTime, Utc};

/// One parsed export: site metadata plus every declared author, term and post.
#[derive(Debug, Clone, Default)]
pub struct ImportDocument {
    pub site_title: String,
    pub site_url: String,
    pub authors: Vec<AuthorRecord>,
    pub categories: Vec<TermRecord>,
    pub tags: Vec<TermRecord>,
    pub posts: Vec<PostRecord>,
}

/// A declared author (from `wp:author` or the CSV author columns).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorRecord {
    pub login: String,
    pub display_name: String,
    pub email: Option<String>,
}

/// Category or tag: name + slug pair. Slug is the unique key in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermRecord {
    pub name: String,
    pub slug: String,
}

/// Publication status in the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
    Archived,
}

impl PostStatus {
    /// Source status mapping: `publish`/`published` (case-insensitive) are
    /// published, everything else is draft. The importer never produces
    /// `Archived`; that variant only exists in store rows.
    pub fn from_source(status: &str) -> Self {
        if status.eq_ignore_ascii_case("publish") || status.eq_ignore_ascii_case("published") {
            PostStatus::Published
        } else {
            PostStatus::Draft
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Archived => "archived",
        }
    }
}

/// One normalized blog post, ready for reconciliation.
#[derive(Debug, Clone, Default)]
pub struct PostRecord {
    /// Source-system id (WordPress post id), kept for provenance.
    pub external_id: Option<String>,
    pub title: String,
    /// Natural key. Never empty after parsing.
    pub slug: String,
    pub excerpt: Option<String>,
    /// Body HTML, as authored.
    pub content: String,
    /// Raw source status string; mapped via [`PostRecord::mapped_status`].
    pub status: Option<String>,
    /// Best available publish timestamp; `None` when the source omitted it
    /// or it failed to parse. Never defaulted to "now".
    pub published_at: Option<DateTime<Utc>>,
    /// Categories in declared order, each carrying the slug the source
    /// resolved for it; the first resolvable one wins.
    pub categories: Vec<TermRecord>,
    pub tags: Vec<TermRecord>,
    pub featured_image_url: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    /// Original permalink, provenance only.
    pub external_permalink: Option<String>,
    pub seo: SeoFields,
}

impl PostRecord {
    pub fn mapped_status(&self) -> PostStatus {
        match &self.status {
            Some(s) => PostStatus::from_source(s),
            // WXR exports with no wp:status element are treated as published,
            // matching the behavior of the WordPress exporter itself.
            None => PostStatus::Published,
        }
    }
}

/// SEO fields extracted from Yoast postmeta (XML) or SEO-prefixed columns (CSV).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeoFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub focus_keyword: Option<String>,
    pub canonical_url: Option<String>,
    pub noindex: bool,
    pub nofollow: bool,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<String>,
    pub twitter_title: Option<String>,
    pub twitter_description: Option<String>,
    pub twitter_image: Option<String>,
}

impl SeoFields {
    /// True when no field carries a value; no SEO row is written in that case.
    pub fn is_empty(&self) -> bool {
        !self.noindex
            && !self.nofollow
            && [
                &self.title,
                &self.description,
                &self.focus_keyword,
                &self.canonical_url,
                &self.og_title,
                &self.og_description,
                &self.og_image,
                &self.twitter_title,
                &self.twitter_description,
                &self.twitter_image,
            ]
            .iter()
            .all(|f| f.is_none())
    }

    /// Robots directive rendered for the SEO row, e.g. `"noindex, follow"`.
    pub fn robots_directive(&self) -> String {
        format!(
            "{}, {}",
            if self.noindex { "noindex" } else { "index" },
            if self.nofollow { "nofollow" } else { "follow" },
        )
    }
}

/// Parse a source timestamp into UTC. WordPress exports use
/// `YYYY-MM-DD HH:MM:SS`; CSV exports sometimes carry RFC 3339. Returns
/// `None` on failure so callers leave the date unset instead of substituting
/// the current time.
pub fn parse_source_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("0000-00-00") {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(PostStatus::from_source("publish"), PostStatus::Published);
        assert_eq!(PostStatus::from_source("Published"), PostStatus::Published);
        assert_eq!(PostStatus::from_source("draft"), PostStatus::Draft);
        assert_eq!(PostStatus::from_source("pending"), PostStatus::Draft);
        assert_eq!(PostStatus::from_source("private"), PostStatus::Draft);
    }

    #[test]
    fn missing_status_defaults_to_published() {
        let post = PostRecord::default();
        assert_eq!(post.mapped_status(), PostStatus::Published);
    }

    #[test]
    fn robots_directive_rendering() {
        let mut seo = SeoFields::default();
        assert_eq!(seo.robots_directive(), "index, follow");
        seo.noindex = true;
        assert_eq!(seo.robots_directive(), "noindex, follow");
        seo.nofollow = true;
        assert_eq!(seo.robots_directive(), "noindex, nofollow");
    }

    #[test]
    fn empty_seo_detection() {
        let mut seo = SeoFields::default();
        assert!(seo.is_empty());
        seo.description = Some("desc".into());
        assert!(!seo.is_empty());
        let noindex_only = SeoFields {
            noindex: true,
            ..SeoFields::default()
        };
        assert!(!noindex_only.is_empty());
    }

    #[test]
    fn datetime_parsing() {
        assert!(parse_source_datetime("2023-04-01 09:30:00").is_some());
        assert!(parse_source_datetime("2023-04-01T09:30:00Z").is_some());
        assert!(parse_source_datetime("2023-04-01").is_some());
        assert!(parse_source_datetime("").is_none());
        assert!(parse_source_datetime("0000-00-00 00:00:00").is_none());
        assert!(parse_source_datetime("April 1st").is_none());
    }
}
