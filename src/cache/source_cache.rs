//! Memoizes the last resolution, keyed by every input that can change it.
//!
//! - `CacheKey` - mode, base URL, auth token, folder and whitelist fingerprint
//! - `SourceCache` - get-or-resolve with staleness checks and warmup
//!
//! The stored entry is replaced wholesale, never patched.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, trace};
use xxhash_rust::xxh3::xxh3_64;

use crate::models::{BackdropSettings, EffectiveSource, LinkedContext, ResolutionResult};
use crate::source::SourceResolver;

/// How long a warmup may wait for the host to go idle.
pub const WARMUP_TIMEOUT: Duration = Duration::from_millis(1200);

/// Deterministic digest of the resolution inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(source: &EffectiveSource) -> Self {
        let remote = source.is_remote();

        let mut mode = source.mode.as_str().to_string();
        if source.linked {
            mode.push_str("+linked");
        }
        if source.use_remote_index {
            mode.push_str("+index");
            if !source.recursive {
                mode.push_str("+flat");
            }
        }

        // Base URL and token only matter when tiles come from the server.
        let base = if remote {
            source.base_url.trim_end_matches('/')
        } else {
            ""
        };
        let token = if remote && !source.auth_token.is_empty() {
            format!("{:016x}", xxh3_64(source.auth_token.as_bytes()))
        } else {
            String::new()
        };
        let folder = source.folder.replace('\\', "/");
        let folder = folder.trim_end_matches('/');

        Self(format!(
            "{}|{:?}|{}|{:?}|{}",
            mode,
            base,
            token,
            folder,
            source.whitelist.fingerprint()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub result: ResolutionResult,
}

/// Resolver plus a single memoized result.
pub struct SourceCache {
    resolver: SourceResolver,
    entry: RefCell<Option<Rc<CacheEntry>>>,
}

impl SourceCache {
    pub fn new(resolver: SourceResolver) -> Self {
        Self {
            resolver,
            entry: RefCell::new(None),
        }
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    /// Currently stored entry, if any.
    pub fn current(&self) -> Option<Rc<CacheEntry>> {
        self.entry.borrow().clone()
    }

    pub fn invalidate(&self) {
        self.entry.replace(None);
    }

    /// Cached result for the current configuration, resolving on a miss,
    /// a stale hit, or when `force_refresh` is set.
    pub async fn get_or_resolve(
        &self,
        settings: &BackdropSettings,
        linked: Option<&LinkedContext>,
        force_refresh: bool,
    ) -> ResolutionResult {
        let source = settings.effective_source(linked);
        let key = CacheKey::derive(&source);

        if !force_refresh {
            if let Some(entry) = self.lookup(&key) {
                debug!(count = entry.result.len(), "Image cache hit");
                return entry.result.clone();
            }
        }

        debug!(force_refresh, "Image cache miss, resolving");
        let result = self.resolver.resolve_source(&source).await;
        self.store(key, &result);
        result
    }

    /// Resolves ahead of time so the first open is instant. Remote sources
    /// are skipped: they are never cached.
    pub async fn prime(&self, settings: &BackdropSettings, linked: Option<&LinkedContext>) -> bool {
        if settings.effective_source(linked).is_remote() {
            debug!("Skipping warmup for remote source");
            return false;
        }
        self.get_or_resolve(settings, linked, false).await;
        true
    }

    fn lookup(&self, key: &CacheKey) -> Option<Rc<CacheEntry>> {
        let entry = self.current()?;
        if &entry.key != key {
            trace!("Image cache key changed");
            return None;
        }
        if self.is_stale(&entry.result) {
            debug!("Cached images reference missing files, discarding");
            self.invalidate();
            return None;
        }
        Some(entry)
    }

    fn is_stale(&self, result: &ResolutionResult) -> bool {
        let vault = self.resolver.vault();
        result
            .items
            .iter()
            .filter_map(|e| e.backing.as_ref())
            .any(|handle| vault.file_at(&handle.path).is_none())
    }

    fn store(&self, key: CacheKey, result: &ResolutionResult) {
        if !result.is_cacheable() {
            trace!("Not caching server results");
            self.invalidate();
            return;
        }
        self.entry.replace(Some(Rc::new(CacheEntry {
            key,
            result: result.clone(),
        })));
    }
}
