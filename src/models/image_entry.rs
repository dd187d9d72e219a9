use std::cmp::Ordering;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Weak reference to a file inside the vault.
///
/// Holds only the vault path; validity is re-checked through
/// [`VaultFs::file_at`](crate::host::VaultFs::file_at) whenever it matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHandle {
    pub path: String,
}

impl FileHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// One selectable image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    /// Path relative to the configured folder (or server root). Selection is stored by this.
    pub relative_path: String,
    /// Name shown under the tile.
    pub display_name: String,
    /// Absolute URL or host resource locator.
    pub resolved_url: String,
    /// Present only for entries found by a local scan.
    pub backing: Option<FileHandle>,
}

impl ImageEntry {
    pub fn new(
        relative_path: impl Into<String>,
        display_name: impl Into<String>,
        resolved_url: impl Into<String>,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            display_name: display_name.into(),
            resolved_url: resolved_url.into(),
            backing: None,
        }
    }

    pub fn with_backing(mut self, handle: FileHandle) -> Self {
        self.backing = Some(handle);
        self
    }

    pub fn is_local(&self) -> bool {
        self.backing.is_some()
    }
}

/// Ordering on display names that ignores case and accents first, so `é`
/// sorts with `e` rather than after `z`. Ties fall back to the case-folded
/// and then the raw string, keeping the order total and stable.
///
/// This is a Unicode approximation of a locale collation: it does not apply
/// language-specific rules such as Swedish `å` after `z`.
pub fn display_order(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| {
            a.chars()
                .flat_map(char::to_lowercase)
                .cmp(b.chars().flat_map(char::to_lowercase))
        })
        .then_with(|| a.cmp(b))
}

fn base_letters(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

/// Outcome of one resolution pass.
///
/// Either a populated list, an error message, or neither ("no images found").
/// Callers tell the last case apart by [`ResolutionResult::is_empty`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionResult {
    pub items: Vec<ImageEntry>,
    pub error: Option<String>,
    /// The server's index or listing was consulted.
    pub from_server: bool,
}

impl ResolutionResult {
    /// Builds a successful result: drops entries without a URL, removes
    /// duplicate relative paths and sorts by display name.
    pub fn found(items: Vec<ImageEntry>) -> Self {
        let mut seen = std::collections::HashSet::with_capacity(items.len());
        let mut items: Vec<ImageEntry> = items
            .into_iter()
            .filter(|e| !e.resolved_url.is_empty())
            .filter(|e| seen.insert(e.relative_path.clone()))
            .collect();
        items.sort_by(|a, b| {
            display_order(&a.display_name, &b.display_name)
                .then_with(|| a.relative_path.cmp(&b.relative_path))
        });
        Self {
            items,
            error: None,
            from_server: false,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            error: Some(message.into()),
            from_server: false,
        }
    }

    pub fn from_server(mut self, from_server: bool) -> Self {
        self.from_server = from_server;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Only results built from the vault are cached. Anything the server
    /// answered, including an empty listing or an HTTP error, is not.
    pub fn is_cacheable(&self) -> bool {
        !self.from_server && self.items.iter().all(ImageEntry::is_local)
    }

    pub fn find(&self, relative_path: &str) -> Option<&ImageEntry> {
        self.items.iter().find(|e| e.relative_path == relative_path)
    }
}
