//! # arcflow
//!
//! A file-manager oriented archive engine: compress files into ZIP, TAR,
//! GZip, BZip2, TAR+GZip, TAR+BZip2 and TAR+LZMA archives, extract them
//! (completely or a chosen subset of entries), extract 7z archives, and
//! browse any of them as a folder tree.
//!
//! Every long-running call streams through a fixed-size buffer, reports
//! batched byte progress, and observes a cooperative [`CancellationToken`].
//!
//! ## Quick Start
//!
//! ### Compressing Files
//!
//! ```rust,no_run
//! use arcflow::{ArchiveType, Operation, OperationInfo, OperationStatus};
//! use std::path::PathBuf;
//!
//! let info = OperationInfo::compress(
//!     vec![PathBuf::from("report.pdf"), PathBuf::from("notes.txt")],
//!     "/tmp/out",
//!     "bundle",
//!     ArchiveType::TarGz,
//! );
//! let result = Operation::new(info).run();
//! assert_eq!(result.status, OperationStatus::Success);
//! println!("created {:?}", result.archive_names);
//! ```
//!
//! ### Browsing and Extracting
//!
//! ```rust,no_run
//! use arcflow::tree::{ArchiveTreeItem, TreeBuilder};
//! use arcflow::{Operation, OperationInfo};
//!
//! let root = TreeBuilder::new("docs.zip").build()?;
//! for entry in root.node().walk() {
//!     println!("{} ({} bytes)", entry.key, entry.size);
//! }
//!
//! if let Some(ArchiveTreeItem::File(readme)) = root.find("readme.txt") {
//!     let info = OperationInfo::decompress("docs.zip", "/tmp/out")
//!         .with_entries(vec![readme.clone()]);
//!     Operation::new(info).run();
//! }
//! # Ok::<(), arcflow::Error>(())
//! ```
//!
//! ### Progress and Cancellation
//!
//! ```rust,no_run
//! use arcflow::{Operation, OperationInfo, progress_fn};
//!
//! let handle = Operation::new(OperationInfo::decompress("big.tar.bz2", "/tmp/out"))
//!     .progress(progress_fn(|event| eprintln!("+{} bytes", event.bytes_processed)))
//!     .start();
//! handle.cancel();
//! let result = handle.join();
//! println!("{}: {}", result.status, result.message);
//! ```
//!
//! ## Error Handling
//!
//! All fallible calls return [`Result<T>`]:
//!
//! ```rust,no_run
//! use arcflow::Error;
//! use arcflow::tree::TreeBuilder;
//!
//! match TreeBuilder::new("secret.zip").build() {
//!     Ok(root) => println!("{} entries", root.node().walk().len()),
//!     Err(Error::EncryptedArchive { .. }) => eprintln!("password required"),
//!     Err(e) if e.is_unsupported() => eprintln!("not an archive: {e}"),
//!     Err(e) => eprintln!("error: {e}"),
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli` | No | The `arcflow` command-line tool |
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod algorithm;
pub mod archive_path;
pub mod archive_type;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod fs;
pub mod operation;
pub mod options;
pub mod pipeline;
pub mod progress;
pub mod tree;

pub use archive_type::ArchiveType;
pub use cache::RootNodeCache;
pub use cancel::CancellationToken;
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use options::{AlgorithmOptions, EntryNameEncoding};

// Re-export the operation API
pub use operation::{
    NoPassword, Operation, OperationHandle, OperationInfo, OperationResult, OperationStatus,
    PasswordProvider,
};

// Re-export progress API
pub use progress::{
    AtomicProgress, NoProgress, ProgressEvent, ProgressReporter, ProgressState,
    StatisticsProgress, progress_fn,
};

// Re-export tree API
pub use tree::{ArchiveEntry, ArchiveTreeItem, ArchiveTreeNode, ArchiveTreeRoot, TreeBuilder};
