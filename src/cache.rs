//! Root node cache.
//!
//! Built trees are cached by their archive's stable identifier so that
//! navigating back into an archive does not enumerate it again. Entries the
//! user opened (for example a PDF inside a ZIP, or a nested archive) are
//! extracted into a temp folder once and reused while the file still exists.
//!
//! The cache is flushed as a whole, together with its extracted temp files,
//! once it would hold more distinct archives than its threshold.
//!
//! ```rust,no_run
//! use arcflow::{EngineConfig, RootNodeCache};
//! use arcflow::tree::TreeBuilder;
//!
//! let cache = RootNodeCache::new(&EngineConfig::default());
//! let root = cache.get_or_build("docs.tar.gz", None, || TreeBuilder::new("docs.tar.gz").build())?;
//! assert!(cache.get(&root.id()).is_some());
//! # Ok::<(), arcflow::Error>(())
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::algorithm::algorithm_for;
use crate::cancel::CancellationToken;
use crate::config::EngineConfig;
use crate::options::AlgorithmOptions;
use crate::pipeline::Pipeline;
use crate::progress::NoProgress;
use crate::tree::{ArchiveEntry, ArchiveTreeRoot, TreeBuilder, archive_id};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct CacheState {
    roots: HashMap<String, Arc<ArchiveTreeRoot>>,
    /// (archive id, entry key) to extracted file.
    extracted: HashMap<(String, String), PathBuf>,
}

impl CacheState {
    fn flush(&mut self) {
        log::debug!(
            "Flushing root node cache ({} archives, {} extracted files)",
            self.roots.len(),
            self.extracted.len()
        );
        self.roots.clear();
        for (_, path) in self.extracted.drain() {
            crate::fs::remove_partial(&path);
        }
    }
}

/// Process-wide cache of built archive trees.
///
/// Reads take a shared lock; every insert or flush takes the single write
/// lock, and insertion re-checks under that lock.
#[derive(Debug)]
pub struct RootNodeCache {
    state: RwLock<CacheState>,
    threshold: usize,
    config: EngineConfig,
}

impl RootNodeCache {
    /// Creates a cache using the configured threshold.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            threshold: config.cache_threshold.max(1),
            config: config.clone(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the cached tree for `key`.
    pub fn get(&self, key: &str) -> Option<Arc<ArchiveTreeRoot>> {
        self.read().roots.get(key).cloned()
    }

    /// Inserts a tree, flushing everything first if a new key would exceed
    /// the threshold. An existing entry for `key` is kept and returned.
    pub fn put(&self, key: impl Into<String>, root: ArchiveTreeRoot) -> Arc<ArchiveTreeRoot> {
        let key = key.into();
        let mut state = self.write();
        if let Some(existing) = state.roots.get(&key) {
            return Arc::clone(existing);
        }
        if state.roots.len() >= self.threshold {
            state.flush();
        }
        let root = Arc::new(root);
        state.roots.insert(key, Arc::clone(&root));
        root
    }

    /// Removes every tree and deletes every extracted temp file.
    pub fn clear(&self) {
        self.write().flush();
    }

    /// Number of cached archives.
    pub fn len(&self) -> usize {
        self.read().roots.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cached tree for `archive`, or builds and caches it.
    ///
    /// `build` runs without holding the lock.
    pub fn get_or_build(
        &self,
        archive: impl AsRef<Path>,
        key: Option<&str>,
        build: impl FnOnce() -> Result<ArchiveTreeRoot>,
    ) -> Result<Arc<ArchiveTreeRoot>> {
        let key = key.map_or_else(|| archive_id(archive.as_ref()), str::to_string);
        if let Some(root) = self.get(&key) {
            log::debug!("Root node cache hit for '{}'", key);
            return Ok(root);
        }
        let root = build()?;
        Ok(self.put(key, root))
    }

    /// Returns the cached extraction of an entry if the file still exists.
    pub fn extracted_path(&self, root: &ArchiveTreeRoot, entry_key: &str) -> Option<PathBuf> {
        self.read()
            .extracted
            .get(&(root.id(), entry_key.to_string()))
            .filter(|path| path.is_file())
            .cloned()
    }

    /// Materializes `entry` from `root`'s archive into `temp_dir`.
    ///
    /// The file is written under its base name (renamed on collision). A
    /// previous extraction is reused while it exists on disk; if it was
    /// deleted the entry is extracted again.
    pub fn open_entry(
        &self,
        root: &ArchiveTreeRoot,
        entry: &ArchiveEntry,
        temp_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        if let Some(path) = self.extracted_path(root, &entry.key) {
            log::debug!("Reusing extracted '{}'", path.display());
            return Ok(path);
        }

        let algorithm = algorithm_for(root.archive_type())?;
        let options = AlgorithmOptions {
            password: root.password().map(str::to_string),
            flatten: true,
            ..AlgorithmOptions::default()
        };
        let mut pipeline = Pipeline::new(&self.config, cancel.clone(), Box::new(NoProgress));
        let mut names = algorithm.decompress_subset(
            root.archive(),
            temp_dir,
            std::slice::from_ref(entry),
            true,
            &mut pipeline,
            &options,
        )?;
        let path = names.remove(&entry.key).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "entry '{}' not found in '{}'",
                entry.key,
                root.archive().display()
            ))
        })?;

        let mut state = self.write();
        let slot = (root.id(), entry.key.clone());
        // Another caller may have extracted the same entry meanwhile. A slot
        // naming our own path is the stale record of a deleted extraction.
        if let Some(existing) = state
            .extracted
            .get(&slot)
            .filter(|p| **p != path && p.is_file())
        {
            let existing = existing.clone();
            crate::fs::remove_partial(&path);
            return Ok(existing);
        }
        state.extracted.insert(slot, path.clone());
        Ok(path)
    }

    /// Opens a nested archive entry as its own tree.
    ///
    /// The entry is extracted (or reused) via [`RootNodeCache::open_entry`]
    /// and its tree cached under `<parent id>/<entry key>`.
    pub fn open_nested(
        &self,
        root: &ArchiveTreeRoot,
        entry: &ArchiveEntry,
        temp_dir: &Path,
        password: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<Arc<ArchiveTreeRoot>> {
        if !entry.is_archive {
            return Err(Error::unsupported_format(
                entry.archive_type(),
                format!("'{}' is not an archive", entry.key),
            ));
        }
        let key = format!("{}/{}", root.id(), entry.key);
        if let Some(cached) = self.get(&key) {
            if cached.archive().is_file() {
                return Ok(cached);
            }
            self.write().roots.remove(&key);
        }

        let path = self.open_entry(root, entry, temp_dir, cancel)?;
        let nested = TreeBuilder::new(path)
            .archive_type(entry.archive_type())
            .maybe_password(password)
            .config(self.config.clone())
            .cancellation(cancel.clone())
            .build()?;
        Ok(self.put(key, nested))
    }
}
