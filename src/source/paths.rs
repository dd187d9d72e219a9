//! Relative path and URL helpers shared by every image source.
//!
//! Paths inside the vault and on the server always use `/` separators and
//! never start or end with one.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Extensions the picker accepts, lowercase.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "gif", "bmp", "svg", "avif", "tif", "tiff",
];

/// Characters left alone inside a path segment (the `encodeURIComponent` set).
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Lowercase extension of `name` when it is a supported image type.
pub fn image_extension(name: &str) -> Option<String> {
    let file = file_name(name);
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    let ext = ext.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

pub fn is_image_file(name: &str) -> bool {
    image_extension(name).is_some()
}

/// Collapses separators, `.` and `..` segments into a clean relative path.
/// A `..` above the root is dropped.
pub fn normalize_relative(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Like [`normalize_relative`], but `None` when a `..` climbs above the root.
pub fn checked_relative(path: &str) -> Option<String> {
    let unified = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    Some(parts.join("/"))
}

pub fn join_relative(folder: &str, child: &str) -> String {
    normalize_relative(&format!("{}/{}", folder, child))
}

/// `path` relative to `folder`, or `None` when it lies outside of it.
pub fn strip_folder_prefix<'a>(path: &'a str, folder: &str) -> Option<&'a str> {
    if folder.is_empty() {
        return Some(path);
    }
    path.strip_prefix(folder)?.strip_prefix('/')
}

/// Last segment of a `/` or `\` separated path.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed)
}

/// True for `/x`, `\\server\x` and `C:\x` style paths.
pub fn is_absolute_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    if path.starts_with('/') || path.starts_with("\\\\") {
        return true;
    }
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

/// Percent-decodes one segment, leaving it untouched when the result is not UTF-8.
pub fn decode_segment(segment: &str) -> String {
    match percent_decode_str(segment).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    }
}

/// Encodes one segment. Already-encoded input is decoded first so it is not
/// encoded twice.
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(&decode_segment(segment), SEGMENT).to_string()
}

/// Joins `relative` onto `base` with exactly one slash, encoding every
/// segment of `relative` on its own.
pub fn build_url_from_relative(base: &str, relative: &str) -> String {
    let base = base.trim_end_matches('/');
    let relative = relative.trim_start_matches('/');
    let encoded = relative
        .split('/')
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/");
    match (base.is_empty(), encoded.is_empty()) {
        (true, _) => encoded,
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, encoded),
    }
}

/// Inverse of [`build_url_from_relative`]: the decoded relative path of
/// `url` below `base`, ignoring any query or fragment.
pub fn relative_from_url(base: &str, url: &str) -> Option<String> {
    let base = base.trim_end_matches('/');
    let rest = url.strip_prefix(base)?;
    let rest = rest.strip_prefix('/').or_else(|| rest.is_empty().then_some(rest))?;
    let rest = rest.split(['?', '#']).next().unwrap_or("");
    let decoded = rest
        .split('/')
        .filter(|s| !s.is_empty())
        .map(decode_segment)
        .collect::<Vec<_>>()
        .join("/");
    Some(decoded)
}
