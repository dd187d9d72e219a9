use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::source::paths::normalize_relative;

/// A server entry published by the linked-server bridge. Read-only snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedServerEntry {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub https: bool,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub enable_whitelist: bool,
    #[serde(default)]
    pub whitelist_files: Vec<String>,
}

impl LinkedServerEntry {
    pub fn base_url(&self) -> String {
        let scheme = if self.https { "https" } else { "http" };
        let host = self.host.trim().trim_end_matches('/');
        let host = if host.is_empty() { "127.0.0.1" } else { host };
        format!("{}://{}:{}", scheme, host, self.port)
    }

    pub fn whitelist(&self) -> Whitelist {
        Whitelist::new(self.enable_whitelist, self.whitelist_files.clone())
    }
}

/// Allow-list of relative paths. When enabled it is the sole source of truth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    pub enabled: bool,
    pub files: Vec<String>,
}

impl Whitelist {
    pub fn new(enabled: bool, files: Vec<String>) -> Self {
        Self { enabled, files }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Stable fingerprint of the whitelist: empty when disabled, otherwise a
    /// hash over the sorted, normalized file list.
    pub fn fingerprint(&self) -> String {
        if !self.enabled {
            return String::new();
        }
        let mut files: Vec<String> = self.files.iter().map(|f| normalize_relative(f)).collect();
        files.sort();
        files.dedup();
        format!("wl:{:016x}", xxh3_64(files.join("\n").as_bytes()))
    }

    pub fn path_set(&self) -> HashSet<String> {
        self.files.iter().map(|f| normalize_relative(f)).collect()
    }
}

/// What the resolver needs from the linked entry for the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedContext {
    pub base_url: String,
    pub auth_token: String,
    pub whitelist: Whitelist,
}

impl From<&LinkedServerEntry> for LinkedContext {
    fn from(entry: &LinkedServerEntry) -> Self {
        Self {
            base_url: entry.base_url(),
            auth_token: entry.auth_token.clone(),
            whitelist: entry.whitelist(),
        }
    }
}
