//! Slug derivation.
//!
//! Slugs are the natural key for posts, categories and tags, so the rules
//! here must stay stable across runs: the same source always yields the
//! same slug, or re-imports would duplicate rows instead of updating them.

/// Derive a URL-safe slug from a title or term name: ASCII lowercase,
/// whitespace runs become a single hyphen, everything outside `[a-z0-9-]`
/// is dropped, leading/trailing/doubled hyphens are collapsed.
///
/// `"Café Now!"` → `"caf-now"`.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_hyphen = true; // suppress a leading hyphen
    for ch in input.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            out.push(ch);
            last_hyphen = false;
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            if !last_hyphen {
                out.push('-');
                last_hyphen = true;
            }
        }
        // Anything else (punctuation, non-ASCII) is stripped.
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Last non-empty path segment of a permalink, e.g.
/// `https://example.com/blog/hello-world/` → `hello-world`.
pub fn slug_from_permalink(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    // Skip the scheme so `https://host` does not look like path segments.
    let path = without_query
        .splitn(2, "://")
        .nth(1)
        .unwrap_or(without_query);
    path.split('/')
        .skip(1) // host
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

/// Slug fallback chain shared by both parsers: explicit slug, then the
/// permalink's last segment, then the slugified title.
pub fn resolve_slug(explicit: Option<&str>, permalink: Option<&str>, title: &str) -> String {
    if let Some(slug) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
        return slug.to_string();
    }
    if let Some(slug) = permalink.and_then(slug_from_permalink) {
        if !slug.is_empty() {
            return slug;
        }
    }
    slugify(title)
}
