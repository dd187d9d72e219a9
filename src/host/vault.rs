//! Access to the host's vault filesystem.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::trace;
use url::Url;
use walkdir::WalkDir;

use crate::models::FileHandle;
use crate::source::paths::normalize_relative;

/// One direct child of a vault folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultChild {
    /// Vault-relative path.
    pub path: String,
    pub is_folder: bool,
}

/// The slice of the host filesystem the resolver depends on. All paths are
/// vault-relative with `/` separators; `""` is the vault root.
pub trait VaultFs: Send + Sync {
    /// Direct children of `folder`. Recursion is up to the caller.
    fn list_children(&self, folder: &str) -> Result<Vec<VaultChild>>;

    fn is_folder(&self, path: &str) -> bool;

    /// Handle to the file at `path`, if one exists there.
    fn file_at(&self, path: &str) -> Option<FileHandle>;

    /// URL the host can display the file from.
    fn resource_url(&self, handle: &FileHandle) -> String;

    /// Filesystem location of the vault root. Only desktop hosts have one.
    fn base_path(&self) -> Option<String>;
}

/// A vault backed by a directory on the local disk.
#[derive(Debug, Clone)]
pub struct LocalVault {
    root: PathBuf,
}

impl LocalVault {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to open vault: {:?}", root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> PathBuf {
        let relative = normalize_relative(path);
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }
}

impl VaultFs for LocalVault {
    fn list_children(&self, folder: &str) -> Result<Vec<VaultChild>> {
        let dir = self.full_path(folder);
        let mut children = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.with_context(|| format!("Failed to list {:?}", dir))?;
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let path = normalize_relative(&relative.to_string_lossy());
            children.push(VaultChild {
                path,
                is_folder: entry.file_type().is_dir(),
            });
        }
        trace!(folder, count = children.len(), "Listed vault folder");
        Ok(children)
    }

    fn is_folder(&self, path: &str) -> bool {
        self.full_path(path).is_dir()
    }

    fn file_at(&self, path: &str) -> Option<FileHandle> {
        let relative = normalize_relative(path);
        if relative.is_empty() {
            return None;
        }
        self.full_path(&relative)
            .is_file()
            .then(|| FileHandle::new(relative))
    }

    fn resource_url(&self, handle: &FileHandle) -> String {
        Url::from_file_path(self.full_path(&handle.path))
            .map(String::from)
            .unwrap_or_default()
    }

    fn base_path(&self) -> Option<String> {
        Some(self.root.to_string_lossy().into_owned())
    }
}
