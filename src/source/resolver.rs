//! Decides which source supplies the images and turns it into a sorted list.
//!
//! Sources are tried in a fixed order:
//! 1. linked entry with its whitelist enabled: the whitelist, checked against the vault
//! 2. linked entry otherwise: local scan, falling back to the server's JSON index
//! 3. remote index requested: JSON index, falling back to an HTML listing
//! 4. everything else: local scan only
//!
//! Every failure is turned into a [`ResolutionResult`] carrying a message.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::error::{ResolveError, ResolveResult};
use super::listing::{index_url, parse_index, parse_listing, IndexQuery};
use super::paths::{
    build_url_from_relative, checked_relative, file_name, is_absolute_path, is_image_file,
    join_relative, normalize_relative, strip_folder_prefix,
};
use crate::host::{auth_headers, HttpClient, VaultFs};
use crate::models::{
    BackdropSettings, EffectiveSource, FileHandle, ImageEntry, LinkedContext, ResolutionResult,
    Whitelist,
};

pub struct SourceResolver {
    vault: Arc<dyn VaultFs>,
    http: Arc<dyn HttpClient>,
}

impl SourceResolver {
    pub fn new(vault: Arc<dyn VaultFs>, http: Arc<dyn HttpClient>) -> Self {
        Self { vault, http }
    }

    pub fn vault(&self) -> &dyn VaultFs {
        self.vault.as_ref()
    }

    pub async fn resolve(
        &self,
        settings: &BackdropSettings,
        linked: Option<&LinkedContext>,
    ) -> ResolutionResult {
        let source = settings.effective_source(linked);
        self.resolve_source(&source).await
    }

    pub async fn resolve_source(&self, source: &EffectiveSource) -> ResolutionResult {
        let whitelisted = source.linked && source.whitelist.enabled;
        // Set once the server was asked; such results are never cached.
        let mut fetched = false;
        let outcome = if whitelisted {
            debug!(files = source.whitelist.files.len(), "Resolving from linked whitelist");
            self.from_whitelist(source)
        } else if source.linked {
            match self.scan_local(source) {
                Err(e) if e.is_local_folder_error() => {
                    warn!(error = %e, "Local scan failed, using the linked server index");
                    fetched = true;
                    self.fetch_index(source).await
                }
                other => other,
            }
        } else if source.use_remote_index {
            fetched = true;
            match self.fetch_index(source).await {
                Ok(items) if !items.is_empty() => Ok(items),
                Ok(_) => {
                    debug!("JSON index is empty, trying the HTML listing");
                    self.fetch_listing(source).await
                }
                Err(e) => {
                    warn!(error = %e, "JSON index failed, trying the HTML listing");
                    self.fetch_listing(source).await
                }
            }
        } else {
            self.scan_local(source)
        };

        match outcome {
            Ok(items) => {
                let items = if whitelisted {
                    items
                } else {
                    apply_whitelist(items, &source.whitelist)
                };
                let result = ResolutionResult::found(items).from_server(fetched);
                debug!(count = result.len(), mode = source.mode.as_str(), "Resolved images");
                result
            }
            Err(e) => {
                warn!(error = %e, "Image resolution failed");
                ResolutionResult::failed(e.to_string()).from_server(fetched)
            }
        }
    }

    /// Vault-relative path of the configured folder. Absolute paths are
    /// accepted only below the vault's filesystem root.
    pub fn resolve_folder(&self, folder: &str) -> ResolveResult<String> {
        let folder = folder.trim();
        if folder.is_empty() {
            return Err(ResolveError::EmptyFolderPath);
        }

        let relative = if is_absolute_path(folder) {
            let base = self.vault.base_path().ok_or(ResolveError::RequiresDesktop)?;
            let base = base.replace('\\', "/");
            let absolute = folder.replace('\\', "/");
            let rest = strip_folder_prefix(&absolute, base.trim_end_matches('/'))
                .ok_or(ResolveError::OutsideVault)?;
            let relative = checked_relative(rest).ok_or(ResolveError::OutsideVault)?;
            if relative.is_empty() {
                return Err(ResolveError::OutsideVault);
            }
            relative
        } else {
            let relative = checked_relative(folder)
                .ok_or_else(|| ResolveError::FolderNotFound(folder.to_string()))?;
            if relative.is_empty() {
                return Err(ResolveError::EmptyFolderPath);
            }
            relative
        };

        if !self.vault.is_folder(&relative) {
            return Err(ResolveError::FolderNotFound(folder.to_string()));
        }
        Ok(relative)
    }

    fn entry_url(&self, source: &EffectiveSource, relative: &str, handle: &FileHandle) -> String {
        match source.remote_base() {
            Some(base) => build_url_from_relative(base, relative),
            None => self.vault.resource_url(handle),
        }
    }

    /// Recursive scan of the configured folder.
    fn scan_local(&self, source: &EffectiveSource) -> ResolveResult<Vec<ImageEntry>> {
        let folder = self.resolve_folder(&source.folder)?;
        let mut entries = Vec::new();
        let mut pending = vec![folder.clone()];

        while let Some(dir) = pending.pop() {
            let children = match self.vault.list_children(&dir) {
                Ok(children) => children,
                Err(e) if dir == folder => {
                    warn!(folder = %dir, error = %e, "Failed to list image folder");
                    return Err(ResolveError::FolderNotFound(source.folder.clone()));
                }
                Err(e) => {
                    warn!(folder = %dir, error = %e, "Skipping unreadable folder");
                    continue;
                }
            };

            for child in children {
                if child.is_folder {
                    pending.push(child.path);
                    continue;
                }
                if !is_image_file(&child.path) {
                    continue;
                }
                let Some(relative) = strip_folder_prefix(&child.path, &folder) else {
                    continue;
                };
                let handle = FileHandle::new(child.path.as_str());
                let url = self.entry_url(source, relative, &handle);
                entries.push(
                    ImageEntry::new(relative, file_name(relative), url).with_backing(handle),
                );
            }
        }

        trace!(folder = %folder, count = entries.len(), "Scanned image folder");
        Ok(entries)
    }

    /// Whitelisted images that exist in the vault. Without a usable local
    /// folder every whitelisted image is served from the linked server.
    fn from_whitelist(&self, source: &EffectiveSource) -> ResolveResult<Vec<ImageEntry>> {
        let folder = match self.resolve_folder(&source.folder) {
            Ok(folder) => Some(folder),
            Err(e) if !source.base_url.is_empty() => {
                debug!(error = %e, "No local folder, whitelist served remotely");
                None
            }
            Err(e) => return Err(e),
        };

        let mut entries = Vec::new();
        for file in source.whitelist.files.iter().filter(|f| is_image_file(f)) {
            let normalized = normalize_relative(file);
            let relative = match folder.as_deref() {
                Some(folder) => strip_folder_prefix(&normalized, folder).unwrap_or(&normalized),
                None => normalized.as_str(),
            };
            if relative.is_empty() {
                continue;
            }

            let Some(folder) = folder.as_deref() else {
                let url = build_url_from_relative(&source.base_url, relative);
                entries.push(ImageEntry::new(relative, file_name(relative), url));
                continue;
            };

            match self.vault.file_at(&join_relative(folder, relative)) {
                Some(handle) => {
                    let url = self.entry_url(source, relative, &handle);
                    entries.push(
                        ImageEntry::new(relative, file_name(relative), url).with_backing(handle),
                    );
                }
                None => trace!(file = %relative, "Whitelisted file missing from vault"),
            }
        }
        Ok(entries)
    }

    async fn fetch_index(&self, source: &EffectiveSource) -> ResolveResult<Vec<ImageEntry>> {
        if source.base_url.is_empty() {
            return Err(ResolveError::MissingBaseUrl);
        }
        let query = IndexQuery {
            path: None,
            recursive: source.recursive,
        };
        let url = index_url(&source.base_url, &query).map_err(|e| {
            warn!(base = %source.base_url, error = %e, "Invalid index URL");
            ResolveError::IndexFetch
        })?;

        let response = self
            .http
            .get(&url, &auth_headers(&source.auth_token))
            .await
            .map_err(|e| {
                warn!(error = %e, "Index request failed");
                ResolveError::IndexFetch
            })?;
        if !response.is_success() {
            return Err(ResolveError::Http(response.status));
        }
        Ok(parse_index(&response.body, &source.base_url))
    }

    async fn fetch_listing(&self, source: &EffectiveSource) -> ResolveResult<Vec<ImageEntry>> {
        if source.base_url.is_empty() {
            return Err(ResolveError::MissingBaseUrl);
        }
        let url = format!("{}/", source.base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url, &auth_headers(&source.auth_token))
            .await
            .map_err(|e| {
                warn!(error = %e, "Listing request failed");
                ResolveError::ListingFetch
            })?;
        if !response.is_success() {
            return Err(ResolveError::Http(response.status));
        }
        Ok(parse_listing(&response.body, &source.base_url))
    }
}

/// Keeps only whitelisted relative paths when the whitelist is enabled.
pub fn apply_whitelist(mut items: Vec<ImageEntry>, whitelist: &Whitelist) -> Vec<ImageEntry> {
    if !whitelist.enabled {
        return items;
    }
    let allowed = whitelist.path_set();
    items.retain(|e| allowed.contains(&e.relative_path));
    items
}
