//! In-memory archive trees for browsing.
//!
//! An archive's flat entry list is rebuilt into a folder hierarchy:
//! [`ArchiveTreeNode`] for folders, [`ArchiveEntry`] leaves for files. Files
//! whose own extension is a registered archive type are flagged
//! [`ArchiveEntry::is_archive`] and count as browsable, but are only opened
//! when a later build targets them.
//!
//! # Example
//!
//! ```rust,no_run
//! use arcflow::tree::TreeBuilder;
//!
//! let root = TreeBuilder::new("docs.tar.gz").build()?;
//! for entry in root.node().walk() {
//!     println!("{} ({} bytes)", entry.key, entry.size);
//! }
//! # Ok::<(), arcflow::Error>(())
//! ```

mod builder;

pub use builder::{BuildState, TreeBuilder};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::archive_path;
use crate::archive_type::ArchiveType;

/// One logical file or folder inside an archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveEntry {
    /// Normalized lookup key (see [`archive_path::normalize_key`]).
    pub key: String,
    /// Display name: the last key segment.
    pub name: String,
    /// Folder or nested archive.
    pub is_browsable: bool,
    /// The entry's extension is a registered archive type.
    pub is_archive: bool,
    /// Uncompressed size in bytes (zero for folders).
    pub size: u64,
}

impl ArchiveEntry {
    /// Creates a file entry, flagging it as an archive when its extension
    /// is registered.
    pub fn file(raw_key: &str, size: u64) -> Self {
        let key = archive_path::normalize_key(raw_key);
        let name = archive_path::file_name(&key).to_string();
        let is_archive = ArchiveType::from_path(&name).is_known();
        Self {
            key,
            name,
            is_browsable: is_archive,
            is_archive,
            size,
        }
    }

    /// Creates a folder entry.
    pub fn folder(raw_key: &str) -> Self {
        let key = archive_path::normalize_key(raw_key);
        let name = archive_path::file_name(&key).to_string();
        Self {
            key,
            name,
            is_browsable: true,
            is_archive: false,
            size: 0,
        }
    }

    /// Returns true for folder entries.
    pub fn is_folder(&self) -> bool {
        self.is_browsable && !self.is_archive
    }

    /// Archive type of a nested archive entry.
    pub fn archive_type(&self) -> ArchiveType {
        if self.is_archive {
            ArchiveType::from_path(&self.name)
        } else {
            ArchiveType::Unknown
        }
    }
}

/// A child of an [`ArchiveTreeNode`].
#[derive(Debug, Clone)]
pub enum ArchiveTreeItem {
    /// Sub-folder.
    Node(ArchiveTreeNode),
    /// File leaf.
    File(ArchiveEntry),
}

impl ArchiveTreeItem {
    /// Display name of the child.
    pub fn name(&self) -> &str {
        match self {
            Self::Node(node) => node.name(),
            Self::File(entry) => &entry.name,
        }
    }

    /// Normalized key of the child.
    pub fn key(&self) -> &str {
        match self {
            Self::Node(node) => node.id(),
            Self::File(entry) => &entry.key,
        }
    }
}

/// A folder in an archive tree.
///
/// Nodes compare equal when their ids (normalized keys) are equal; the root
/// node's id is the empty string.
#[derive(Debug, Clone, Default)]
pub struct ArchiveTreeNode {
    id: String,
    children: Vec<ArchiveTreeItem>,
    index: HashMap<String, usize>,
}

impl PartialEq for ArchiveTreeNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ArchiveTreeNode {}

impl std::hash::Hash for ArchiveTreeNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl ArchiveTreeNode {
    /// Creates an empty node with the given key.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// The node's normalized key.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The node's display name (empty for the root).
    pub fn name(&self) -> &str {
        archive_path::file_name(&self.id)
    }

    /// The node as a folder entry.
    pub fn entry(&self) -> ArchiveEntry {
        ArchiveEntry::folder(&self.id)
    }

    /// Children in container order.
    pub fn children(&self) -> &[ArchiveTreeItem] {
        &self.children
    }

    /// Number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Returns true if the node has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Direct child by display name.
    pub fn child(&self, name: &str) -> Option<&ArchiveTreeItem> {
        self.index.get(name).map(|&i| &self.children[i])
    }

    /// Direct sub-folders.
    pub fn folders(&self) -> impl Iterator<Item = &ArchiveTreeNode> {
        self.children.iter().filter_map(|c| match c {
            ArchiveTreeItem::Node(node) => Some(node),
            ArchiveTreeItem::File(_) => None,
        })
    }

    /// Direct file leaves.
    pub fn files(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.children.iter().filter_map(|c| match c {
            ArchiveTreeItem::File(entry) => Some(entry),
            ArchiveTreeItem::Node(_) => None,
        })
    }

    /// Finds a descendant by key, relative to this node.
    pub fn find(&self, key: &str) -> Option<&ArchiveTreeItem> {
        let key = archive_path::normalize_key(key);
        let mut segments = archive_path::segments(&key).peekable();
        let mut node = self;
        while let Some(segment) = segments.next() {
            let item = node.child(segment)?;
            if segments.peek().is_none() {
                return Some(item);
            }
            match item {
                ArchiveTreeItem::Node(next) => node = next,
                ArchiveTreeItem::File(_) => return None,
            }
        }
        None
    }

    /// All file leaves below this node, depth first in container order.
    pub fn walk(&self) -> Vec<&ArchiveEntry> {
        let mut out = Vec::new();
        self.collect_files(&mut out);
        out
    }

    fn collect_files<'a>(&'a self, out: &mut Vec<&'a ArchiveEntry>) {
        for child in &self.children {
            match child {
                ArchiveTreeItem::Node(node) => node.collect_files(out),
                ArchiveTreeItem::File(entry) => out.push(entry),
            }
        }
    }

    /// Every key below this node (folders and files), depth first.
    pub fn keys(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_keys(&mut out);
        out
    }

    fn collect_keys<'a>(&'a self, out: &mut Vec<&'a str>) {
        for child in &self.children {
            out.push(child.key());
            if let ArchiveTreeItem::Node(node) = child {
                node.collect_keys(out);
            }
        }
    }

    pub(crate) fn child_mut(&mut self, name: &str) -> Option<&mut ArchiveTreeItem> {
        match self.index.get(name) {
            Some(&i) => self.children.get_mut(i),
            None => None,
        }
    }

    pub(crate) fn push(&mut self, item: ArchiveTreeItem) -> &mut ArchiveTreeItem {
        let position = self.children.len();
        self.index.insert(item.name().to_string(), position);
        self.children.push(item);
        &mut self.children[position]
    }
}

/// The root of a built tree, bound to its archive and password.
#[derive(Debug, Clone)]
pub struct ArchiveTreeRoot {
    node: ArchiveTreeNode,
    archive: PathBuf,
    archive_type: ArchiveType,
    password: Option<String>,
}

impl ArchiveTreeRoot {
    pub(crate) fn new(
        node: ArchiveTreeNode,
        archive: PathBuf,
        archive_type: ArchiveType,
        password: Option<String>,
    ) -> Self {
        Self {
            node,
            archive,
            archive_type,
            password,
        }
    }

    /// The top-level folder.
    pub fn node(&self) -> &ArchiveTreeNode {
        &self.node
    }

    /// The archive this tree was built from.
    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// The archive's type.
    pub fn archive_type(&self) -> ArchiveType {
        self.archive_type
    }

    /// The password the tree was opened with, if any.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Stable identifier used as the cache key.
    pub fn id(&self) -> String {
        archive_id(&self.archive)
    }

    /// Finds an entry by key.
    pub fn find(&self, key: &str) -> Option<&ArchiveTreeItem> {
        self.node.find(key)
    }

    /// Looks up a file leaf by key.
    pub fn file(&self, key: &str) -> Option<&ArchiveEntry> {
        match self.node.find(key)? {
            ArchiveTreeItem::File(entry) => Some(entry),
            ArchiveTreeItem::Node(_) => None,
        }
    }

    /// Sum of all file sizes.
    pub fn total_size(&self) -> u64 {
        self.node.walk().iter().map(|e| e.size).sum()
    }
}

/// Stable path-like identifier for an archive.
///
/// Canonicalized when the file exists so different spellings of the same
/// path share a cache slot.
pub fn archive_id(archive: &Path) -> String {
    archive
        .canonicalize()
        .unwrap_or_else(|_| archive.to_path_buf())
        .to_string_lossy()
        .into_owned()
}
