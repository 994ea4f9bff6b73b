//! Rebuilds an archive's folder hierarchy from its flat entry list.

use std::path::PathBuf;

use super::{ArchiveEntry, ArchiveTreeItem, ArchiveTreeNode, ArchiveTreeRoot};
use crate::algorithm::{RawEntry, algorithm_for};
use crate::archive_path;
use crate::archive_type::ArchiveType;
use crate::cancel::CancellationToken;
use crate::config::EngineConfig;
use crate::options::{AlgorithmOptions, EntryNameEncoding};
use crate::pipeline::Pipeline;
use crate::progress::NoProgress;
use crate::{Error, Result};

/// Lifecycle of a [`TreeBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Not started.
    Unopened,
    /// The archive's algorithm was resolved.
    Opened,
    /// Entries are being enumerated.
    Enumerating,
    /// The tree was built.
    Done,
    /// Opening or enumerating failed, or the build was cancelled.
    Faulted,
}

/// Builds an [`ArchiveTreeRoot`] from an archive on disk.
///
/// # Example
///
/// ```rust,no_run
/// use arcflow::tree::{ArchiveTreeItem, TreeBuilder};
///
/// let mut builder = TreeBuilder::new("secret.zip").password("hunter2");
/// let root = builder.build()?;
/// if let Some(ArchiveTreeItem::Node(img)) = root.find("img") {
///     println!("img holds {} entries", img.child_count());
/// }
/// # Ok::<(), arcflow::Error>(())
/// ```
#[derive(Debug)]
pub struct TreeBuilder {
    archive: PathBuf,
    archive_type: ArchiveType,
    options: AlgorithmOptions,
    config: EngineConfig,
    cancel: CancellationToken,
    state: BuildState,
}

impl TreeBuilder {
    /// Creates a builder for `archive`, detecting its type from the name.
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        let archive = archive.into();
        let archive_type = ArchiveType::from_path(&archive);
        Self {
            archive,
            archive_type,
            options: AlgorithmOptions::default(),
            config: EngineConfig::default(),
            cancel: CancellationToken::new(),
            state: BuildState::Unopened,
        }
    }

    /// Overrides the detected archive type.
    pub fn archive_type(mut self, archive_type: ArchiveType) -> Self {
        self.archive_type = archive_type;
        self
    }

    /// Sets the password used to open the archive.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.options.password = Some(password.into());
        self
    }

    /// Sets an optional password.
    pub fn maybe_password(mut self, password: Option<String>) -> Self {
        self.options.password = password;
        self
    }

    /// Sets the entry-name encoding.
    pub fn encoding(mut self, encoding: EntryNameEncoding) -> Self {
        self.options.encoding = encoding;
        self
    }

    /// Sets the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the cancellation token observed during enumeration.
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Current state.
    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Builds the tree.
    ///
    /// Entries are inserted in container order. A cancelled build returns
    /// [`Error::Cancelled`] and no tree.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedFormat`] for unrecognized archive types
    /// - [`Error::EncryptedArchive`] if the archive needs a (different) password
    /// - [`Error::Cancelled`] if the token was cancelled mid-enumeration
    pub fn build(&mut self) -> Result<ArchiveTreeRoot> {
        let result = self.run();
        self.state = match result {
            Ok(_) => BuildState::Done,
            Err(_) => BuildState::Faulted,
        };
        result
    }

    fn run(&mut self) -> Result<ArchiveTreeRoot> {
        let algorithm = algorithm_for(self.archive_type)?;
        if !self.archive.is_file() {
            return Err(Error::InvalidArgument(format!(
                "'{}' is not a readable archive",
                self.archive.display()
            )));
        }
        self.state = BuildState::Opened;
        log::debug!(
            "Building tree for '{}' ({})",
            self.archive.display(),
            self.archive_type
        );

        let mut pipeline = Pipeline::new(&self.config, self.cancel.clone(), Box::new(NoProgress));
        let mut root = ArchiveTreeNode::new("");
        let mut inserted = 0usize;
        self.state = BuildState::Enumerating;
        algorithm.read_entries(
            &self.archive,
            &self.options,
            &mut pipeline,
            &mut |entry: RawEntry| {
                if insert(&mut root, &entry) {
                    inserted += 1;
                }
                Ok(())
            },
        )?;
        // The last entry may have been delivered after the final check.
        self.cancel.check()?;

        log::debug!(
            "Tree for '{}' holds {} entries",
            self.archive.display(),
            inserted
        );
        Ok(ArchiveTreeRoot::new(
            root,
            self.archive.clone(),
            self.archive_type,
            self.options.password.clone(),
        ))
    }
}

/// Inserts one entry, creating intermediate folders on the way.
///
/// Returns `false` when the entry was dropped because its key collides with
/// an existing item of the other kind (or duplicates an existing file).
pub(crate) fn insert(root: &mut ArchiveTreeNode, entry: &RawEntry) -> bool {
    let key = archive_path::normalize_key(&entry.path);
    if key.is_empty() {
        return false;
    }
    let is_folder = entry.is_dir || archive_path::is_folder_path(&entry.path);
    let segments: Vec<&str> = archive_path::segments(&key).collect();
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut node = root;
    let mut prefix = String::new();
    for segment in parents {
        prefix = archive_path::join(&prefix, segment);
        node = match descend(node, segment, &prefix) {
            Some(next) => next,
            None => {
                log::warn!(
                    "Entry '{}' needs folder '{}' but a file has that name; skipping",
                    key,
                    prefix
                );
                return false;
            }
        };
    }

    let existing_is_folder = node
        .child(last)
        .map(|item| matches!(item, ArchiveTreeItem::Node(_)));
    match (existing_is_folder, is_folder) {
        (Some(true), true) => true,
        (Some(true), false) => {
            log::warn!("File entry '{}' collides with a folder; skipping", key);
            false
        }
        (Some(false), true) => {
            log::warn!("Folder entry '{}' collides with a file; skipping", key);
            false
        }
        (Some(false), false) => {
            log::warn!("Duplicate entry '{}'; keeping the first", key);
            false
        }
        (None, true) => {
            node.push(ArchiveTreeItem::Node(ArchiveTreeNode::new(key.clone())));
            true
        }
        (None, false) => {
            node.push(ArchiveTreeItem::File(ArchiveEntry::file(&key, entry.size)));
            true
        }
    }
}

/// Finds or creates the sub-folder `segment`. Returns `None` if a file
/// already holds that name.
fn descend<'a>(node: &'a mut ArchiveTreeNode, segment: &str, key: &str) -> Option<&'a mut ArchiveTreeNode> {
    if node.child(segment).is_none() {
        node.push(ArchiveTreeItem::Node(ArchiveTreeNode::new(key)));
    }
    match node.child_mut(segment)? {
        ArchiveTreeItem::Node(next) => Some(next),
        ArchiveTreeItem::File(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(path: &str, size: u64) -> RawEntry {
        RawEntry {
            path: path.to_string(),
            is_dir: path.ends_with('/'),
            size,
        }
    }

    fn build(entries: &[RawEntry]) -> ArchiveTreeNode {
        let mut root = ArchiveTreeNode::new("");
        for entry in entries {
            insert(&mut root, entry);
        }
        root
    }

    #[test]
    fn test_intermediate_folders_created_once() {
        let root = build(&[raw("a/b/c.txt", 1), raw("a/b/d.txt", 2), raw("a/e.txt", 3)]);
        assert_eq!(root.child_count(), 1);
        let Some(ArchiveTreeItem::Node(a)) = root.find("a") else {
            panic!("missing folder a");
        };
        assert_eq!(a.id(), "a");
        assert_eq!(a.child_count(), 2);
        let Some(ArchiveTreeItem::Node(b)) = root.find("a/b") else {
            panic!("missing folder a/b");
        };
        assert_eq!(b.files().count(), 2);
    }

    #[test]
    fn test_explicit_folder_entry_is_idempotent() {
        let root = build(&[raw("docs/", 0), raw("docs/readme.md", 4), raw("docs/", 0)]);
        assert_eq!(root.child_count(), 1);
        assert_eq!(root.keys(), vec!["docs", "docs/readme.md"]);
    }

    #[test]
    fn test_container_order_kept() {
        let root = build(&[raw("z.txt", 1), raw("a.txt", 1), raw("m/", 0)]);
        let names: Vec<_> = root.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["z.txt", "a.txt", "m"]);
    }

    #[test]
    fn test_leaf_folder_collision_is_not_fatal() {
        let root = build(&[raw("x", 5), raw("x/inner.txt", 1), raw("y.txt", 2)]);
        assert!(matches!(root.find("x"), Some(ArchiveTreeItem::File(e)) if e.size == 5));
        assert!(root.find("x/inner.txt").is_none());
        assert!(root.find("y.txt").is_some());
    }

    #[test]
    fn test_nested_archive_flagged() {
        let root = build(&[raw("inner/pack.tar.gz", 10), raw("inner/notes.txt", 1)]);
        let Some(ArchiveTreeItem::File(pack)) = root.find("inner/pack.tar.gz") else {
            panic!("missing nested archive");
        };
        assert!(pack.is_archive);
        assert!(pack.is_browsable);
        let Some(ArchiveTreeItem::File(notes)) = root.find("inner/notes.txt") else {
            panic!("missing file");
        };
        assert!(!notes.is_archive);
    }

    #[test]
    fn test_windows_separators_normalized() {
        let root = build(&[raw("dir\\file.txt", 1), raw("/dir/other.txt", 1)]);
        assert_eq!(root.child_count(), 1);
        assert_eq!(root.walk().len(), 2);
    }

    #[test]
    fn test_unknown_type_faults() {
        let mut builder = TreeBuilder::new("notes.txt");
        assert!(builder.build().unwrap_err().is_unsupported());
        assert_eq!(builder.state(), BuildState::Faulted);
    }
}
