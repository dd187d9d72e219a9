//! In-memory collaborators shared by the unit tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::host::{HttpClient, HttpResponse, VaultChild, VaultFs};
use crate::models::FileHandle;
use crate::source::paths::normalize_relative;

/// Vault made of a set of file paths; folders are implied by their files.
#[derive(Default)]
pub struct MemoryVault {
    files: Mutex<BTreeSet<String>>,
    base_path: Option<String>,
    pub listings: AtomicUsize,
}

impl MemoryVault {
    pub fn new(files: &[&str]) -> Self {
        Self {
            files: Mutex::new(files.iter().map(|f| normalize_relative(f)).collect()),
            base_path: None,
            listings: AtomicUsize::new(0),
        }
    }

    pub fn with_base_path(mut self, base: &str) -> Self {
        self.base_path = Some(base.to_string());
        self
    }

    pub fn add(&self, path: &str) {
        self.files.lock().insert(normalize_relative(path));
    }

    pub fn remove(&self, path: &str) {
        self.files.lock().remove(&normalize_relative(path));
    }

    pub fn listing_count(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

impl VaultFs for MemoryVault {
    fn list_children(&self, folder: &str) -> Result<Vec<VaultChild>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if !self.is_folder(folder) {
            return Err(anyhow!("no such folder: {}", folder));
        }
        let prefix = if folder.is_empty() {
            String::new()
        } else {
            format!("{}/", folder)
        };
        let mut children: Vec<VaultChild> = Vec::new();
        for file in self.files.lock().iter() {
            let Some(rest) = file.strip_prefix(&prefix) else {
                continue;
            };
            let child = match rest.split_once('/') {
                Some((dir, _)) => VaultChild {
                    path: format!("{}{}", prefix, dir),
                    is_folder: true,
                },
                None => VaultChild {
                    path: file.clone(),
                    is_folder: false,
                },
            };
            if !children.contains(&child) {
                children.push(child);
            }
        }
        Ok(children)
    }

    fn is_folder(&self, path: &str) -> bool {
        let path = normalize_relative(path);
        if path.is_empty() {
            return true;
        }
        let prefix = format!("{}/", path);
        self.files.lock().iter().any(|f| f.starts_with(&prefix))
    }

    fn file_at(&self, path: &str) -> Option<FileHandle> {
        let path = normalize_relative(path);
        self.files.lock().contains(&path).then(|| FileHandle::new(path))
    }

    fn resource_url(&self, handle: &FileHandle) -> String {
        format!("app://vault/{}", handle.path)
    }

    fn base_path(&self) -> Option<String> {
        self.base_path.clone()
    }
}

/// Canned responses keyed by URL prefix; unknown URLs fail at the transport level.
#[derive(Default)]
pub struct FakeHttp {
    routes: Mutex<HashMap<String, HttpResponse>>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, prefix: &str, status: u16, body: &str) -> Self {
        self.routes.lock().insert(
            prefix.to_string(),
            HttpResponse {
                status,
                body: body.to_string(),
            },
        );
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().iter().map(|(u, _)| u.clone()).collect()
    }

    pub fn headers_of(&self, index: usize) -> Vec<(String, String)> {
        self.requests.lock()[index].1.clone()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse> {
        self.requests.lock().push((url.to_string(), headers.to_vec()));
        let routes = self.routes.lock();
        let best = routes
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());
        match best {
            Some((_, response)) => Ok(response.clone()),
            None => Err(anyhow!("connection refused: {}", url)),
        }
    }
}
