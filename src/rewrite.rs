//! Rewriting of asset links in rendered HTML.
//!
//! After a page template runs, the `src` and `href` attributes of `<img>`,
//! `<link>` and `<script>` elements are pointed at hashed asset names:
//!
//! ```text
//! <link href="/assets/x.css" rel="stylesheet">
//!   → <link href="/assets/x.<token>.css" rel="stylesheet">
//! ```
//!
//! Only site-absolute paths (starting with a single `/`) are looked up in the
//! [`HashAssets`] map. URLs with a scheme or a network host are left alone.
//! Relative paths are left alone too and reported back to the caller, since
//! resolving them would require knowing where the page itself is written.
//! A query string or fragment on a site path is kept on the rewritten URL.
//! Percent-encoded paths (`/img/my%20pic.png`) are decoded for the lookup
//! and the rewritten URL is encoded again.

use crate::copy::HashAssets;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

/// Characters encoded in a URL path.
const PATH_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

static ASSET_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:img|link|script)\b[^>]*>").expect("asset tag pattern is valid")
});

static URL_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\s(?:src|href)\s*=\s*)(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("url attribute pattern is valid")
});

static SCHEME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").expect("scheme pattern is valid")
});

/// Where a link attribute points.
#[derive(Debug, PartialEq, Eq)]
pub enum LinkTarget<'a> {
    /// Empty or fragment-only (`#top`).
    Inert,
    /// Has a scheme (`https:`, `data:`) or a network host (`//cdn`).
    External,
    /// Site-absolute path plus any `?query` / `#fragment` suffix.
    Site { path: &'a str, suffix: &'a str },
    /// Relative to the current document.
    Relative,
}

pub fn classify_link(href: &str) -> LinkTarget<'_> {
    if href.is_empty() || href.starts_with('#') {
        LinkTarget::Inert
    } else if href.starts_with("//") || SCHEME.is_match(href) {
        LinkTarget::External
    } else if href.starts_with('/') {
        let split = href.find(['?', '#']).unwrap_or(href.len());
        LinkTarget::Site {
            path: &href[..split],
            suffix: &href[split..],
        }
    } else {
        LinkTarget::Relative
    }
}

/// Result of rewriting one document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Rewritten {
    pub html: String,
    /// Number of attributes pointed at a hashed asset.
    pub rewritten: usize,
    /// Relative links that were left untouched.
    pub relative: Vec<String>,
}

/// Point asset links in `html` at their hashed names.
pub fn rewrite_links(html: &str, assets: &HashAssets) -> Rewritten {
    let mut rewritten = 0;
    let mut relative = Vec::new();
    let html = ASSET_TAG
        .replace_all(html, |tag: &Captures| {
            URL_ATTR
                .replace_all(&tag[0], |attr: &Captures| {
                    let (quote, value) = attr_value(attr);
                    match classify_link(value) {
                        LinkTarget::Site { path, suffix } => match hashed_url(assets, path) {
                            Some(hashed) => {
                                rewritten += 1;
                                format!("{}{quote}{hashed}{suffix}{quote}", &attr[1])
                            }
                            None => attr[0].to_string(),
                        },
                        LinkTarget::Relative => {
                            relative.push(value.to_string());
                            attr[0].to_string()
                        }
                        LinkTarget::Inert | LinkTarget::External => attr[0].to_string(),
                    }
                })
                .into_owned()
        })
        .into_owned();
    Rewritten {
        html,
        rewritten,
        relative,
    }
}

/// Hashed URL for a site path as written in a document.
fn hashed_url<'a>(assets: &'a HashAssets, path: &str) -> Option<Cow<'a, str>> {
    if let Some(hashed) = assets.get(path) {
        return Some(Cow::Borrowed(hashed));
    }
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    if decoded == path {
        return None;
    }
    assets
        .get(&decoded)
        .map(|hashed| Cow::Owned(utf8_percent_encode(hashed, PATH_ENCODE).to_string()))
}

fn attr_value<'t>(attr: &Captures<'t>) -> (&'static str, &'t str) {
    if let Some(m) = attr.get(2) {
        ("\"", m.as_str())
    } else if let Some(m) = attr.get(3) {
        ("'", m.as_str())
    } else {
        ("", attr.get(4).map_or("", |m| m.as_str()))
    }
}
