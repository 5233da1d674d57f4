//! Resource stores: where home candidates come from.
//!
//! [`VaultStore`] walks a directory on disk; [`MemoryStore`] holds a fixed
//! list of paths. Both report paths relative to the store root with `/`
//! separators.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::paths::{normalize_separators, with_default_extension};

pub trait ResourceStore {
    /// Every resource in the store, any kind.
    fn resources(&self) -> Vec<String>;

    /// The stored spelling of `path` if it names an existing resource.
    fn lookup(&self, path: &str) -> Option<String> {
        let wanted = normalize_separators(path);
        self.resources().into_iter().find(|r| *r == wanted)
    }

    /// Whether `path` names a folder in the store.
    fn is_folder(&self, path: &str) -> bool;
}

/// Looks up `path`, then once more with the default extension appended.
pub fn lookup_with_fallback(store: &dyn ResourceStore, path: &str) -> Option<String> {
    store
        .lookup(path)
        .or_else(|| store.lookup(&with_default_extension(path)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-Memory Store
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    resources: BTreeSet<String>,
}

impl MemoryStore {
    pub fn new<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            resources: resources
                .into_iter()
                .map(|r| normalize_separators(r.as_ref()))
                .collect(),
        }
    }

    pub fn insert(&mut self, path: &str) {
        self.resources.insert(normalize_separators(path));
    }
}

impl ResourceStore for MemoryStore {
    fn resources(&self) -> Vec<String> {
        self.resources.iter().cloned().collect()
    }

    fn lookup(&self, path: &str) -> Option<String> {
        self.resources.get(&normalize_separators(path)).cloned()
    }

    fn is_folder(&self, path: &str) -> bool {
        let folder = normalize_separators(path);
        if folder.is_empty() {
            return true;
        }
        let prefix = format!("{}/", folder);
        self.resources.iter().any(|r| r.starts_with(&prefix))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// On-Disk Vault
// ═══════════════════════════════════════════════════════════════════════════════

/// A directory of resources. Hidden entries (dot-prefixed) are skipped, the
/// way hosts hide their own config folders.
#[derive(Debug, Clone)]
pub struct VaultStore {
    root: PathBuf,
}

impl VaultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute filesystem path of a store-relative resource path.
    pub fn absolute(&self, path: &str) -> PathBuf {
        self.root.join(normalize_separators(path))
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let joined = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Some(joined)
    }
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

impl ResourceStore for VaultStore {
    fn resources(&self) -> Vec<String> {
        let mut found: Vec<String> = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::debug!(error = %err, "Skipping unreadable vault entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| self.relative(e.path()))
            .collect();
        found.sort();
        found
    }

    fn lookup(&self, path: &str) -> Option<String> {
        let normalized = normalize_separators(path);
        if normalized.is_empty() || normalized.split('/').any(|s| s == "..") {
            return None;
        }
        self.absolute(&normalized).is_file().then_some(normalized)
    }

    fn is_folder(&self, path: &str) -> bool {
        let normalized = normalize_separators(path);
        if normalized.split('/').any(|s| s == "..") {
            return false;
        }
        self.absolute(&normalized).is_dir()
    }
}
