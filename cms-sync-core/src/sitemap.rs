//! Sitemap rendering.
//!
//! Renders the `<urlset>` document for published posts. The HTTP surface
//! must always answer 200 with well-formed XML, so the degenerate cases
//! (no posts, missing credentials, failed query) render an empty urlset
//! with an explanatory comment instead of erroring.

use quick_xml::escape::escape;

use crate::contract::PublishedPost;

const URLSET_OPEN: &str =
    r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#;
const CHANGEFREQ: &str = "weekly";
const PRIORITY: &str = "0.8";

/// Render one `<url>` per published post: loc is the site origin plus the
/// slug, lastmod is the updated-or-published date truncated to the day.
pub fn render_urlset(site_url: &str, posts: &[PublishedPost]) -> String {
    let origin = site_url.trim_end_matches('/');
    let mut out = String::with_capacity(256 + posts.len() * 160);
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(URLSET_OPEN);
    out.push('\n');
    for post in posts {
        let loc = format!("{origin}/{}", post.slug);
        out.push_str("  <url>\n");
        out.push_str(&format!("    <loc>{}</loc>\n", escape(&loc)));
        if let Some(lastmod) = post.updated_at.or(post.published_at) {
            out.push_str(&format!(
                "    <lastmod>{}</lastmod>\n",
                lastmod.format("%Y-%m-%d")
            ));
        }
        out.push_str(&format!("    <changefreq>{CHANGEFREQ}</changefreq>\n"));
        out.push_str(&format!("    <priority>{PRIORITY}</priority>\n"));
        out.push_str("  </url>\n");
    }
    out.push_str("</urlset>\n");
    out
}

/// Empty urlset with an explanatory comment; used when credentials are
/// absent or the posts query failed.
pub fn render_empty_urlset(reason: &str) -> String {
    // "--" is not allowed inside an XML comment.
    let reason = reason.replace("--", "-");
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{URLSET_OPEN}\n  <!-- {reason} -->\n</urlset>\n"
    )
}
