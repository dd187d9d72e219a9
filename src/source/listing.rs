//! Parsers for what a remote image server hands back: the `__index.json`
//! document and plain HTML directory listings.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{trace, warn};
use url::Url;

use super::paths::{
    build_url_from_relative, file_name, is_image_file, normalize_relative, relative_from_url,
    SUPPORTED_EXTENSIONS,
};
use crate::models::ImageEntry;

pub const INDEX_FILE: &str = "__index.json";

static ANCHORS: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("a[href]").ok());

/// Query for the JSON index endpoint.
#[derive(Debug, Clone)]
pub struct IndexQuery {
    /// Sub-path below the server root, if any.
    pub path: Option<String>,
    pub recursive: bool,
}

impl Default for IndexQuery {
    fn default() -> Self {
        Self {
            path: None,
            recursive: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IndexDocument {
    #[serde(default)]
    items: Vec<IndexItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexItem {
    relative_path: String,
    #[serde(default)]
    name: String,
}

/// `{base}/__index.json?ext=...&path=...&recursive=0`
pub fn index_url(base: &str, query: &IndexQuery) -> Result<String, url::ParseError> {
    let mut url = Url::parse(&format!("{}/{}", base.trim_end_matches('/'), INDEX_FILE))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("ext", &SUPPORTED_EXTENSIONS.join(","));
        if let Some(path) = query.path.as_deref().map(normalize_relative) {
            if !path.is_empty() {
                pairs.append_pair("path", &path);
            }
        }
        if !query.recursive {
            pairs.append_pair("recursive", "0");
        }
    }
    Ok(url.into())
}

/// Entries of a JSON index. A malformed document yields no entries.
pub fn parse_index(body: &str, base: &str) -> Vec<ImageEntry> {
    let document: IndexDocument = match serde_json::from_str(body) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "Malformed image index");
            return Vec::new();
        }
    };

    document
        .items
        .into_iter()
        .filter_map(|item| {
            let relative = normalize_relative(&item.relative_path);
            if relative.is_empty() || !is_image_file(&relative) {
                return None;
            }
            let name = if item.name.trim().is_empty() {
                file_name(&relative).to_string()
            } else {
                item.name
            };
            let url = build_url_from_relative(base, &relative);
            Some(ImageEntry::new(relative, name, url))
        })
        .collect()
}

/// Image links of an HTML directory listing served at `base`.
///
/// Parent, query-only and fragment-only links are skipped, as is anything
/// resolving outside of `base`.
pub fn parse_listing(html: &str, base: &str) -> Vec<ImageEntry> {
    let Some(selector) = ANCHORS.as_ref() else {
        return Vec::new();
    };
    let dir = format!("{}/", base.trim_end_matches('/'));
    let base_url = match Url::parse(&dir) {
        Ok(url) => url,
        Err(e) => {
            warn!(base, error = %e, "Invalid listing base URL");
            return Vec::new();
        }
    };

    let document = Html::parse_document(html);
    let mut entries = Vec::new();
    for anchor in document.select(selector) {
        let href = anchor.value().attr("href").unwrap_or("").trim();
        if href.is_empty() || href.starts_with('?') || href.starts_with('#') {
            continue;
        }
        if href == ".." || href.starts_with("../") {
            continue;
        }
        let Ok(mut target) = base_url.join(href) else {
            trace!(href, "Unresolvable listing link");
            continue;
        };
        target.set_query(None);
        target.set_fragment(None);
        if target.path().ends_with('/') {
            continue;
        }
        let Some(relative) = relative_from_url(base_url.as_str(), target.as_str()) else {
            continue;
        };
        if relative.is_empty() || !is_image_file(&relative) {
            continue;
        }
        let url = build_url_from_relative(base, &relative);
        let name = file_name(&relative).to_string();
        entries.push(ImageEntry::new(relative, name, url));
    }
    entries
}
