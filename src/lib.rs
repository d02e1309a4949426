//! # friendlizer
//!
//! A Rust library for adding a module to the friend list of NetBeans plugin
//! JARs.
//!
//! ## Overview
//!
//! NetBeans modules restrict their friend-only packages to the modules named
//! in the `OpenIDE-Module-Friends` manifest attribute. This library:
//!
//! - Reads and rewrites the main section of `META-INF/MANIFEST.MF`
//! - Adds a target identifier to the friend list, leaving lists that already
//!   name it untouched
//! - Repacks the JAR with every other entry copied unchanged
//! - Replaces the original with a single atomic rename
//! - Patches whole directories or configured module groups in one batch
//!
//! ## Example - Single archive
//!
//! ```rust,no_run
//! use std::path::Path;
//! use friendlizer::FriendPatcher;
//!
//! let patcher = FriendPatcher::new("com.viettel.vep.tools");
//! let outcome = patcher.patch(Path::new("ide/modules/org-netbeans-modules-web-common.jar"));
//! println!("{}", outcome);
//! ```
//!
//! ## Example - Batch
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use friendlizer::{BatchRunner, FriendPatcher, MemorySink, Worklist};
//!
//! let runner = BatchRunner::new(FriendPatcher::new("com.viettel.vep.tools"));
//! let mut sink = MemorySink::default();
//! let report = runner.run(
//!     &Worklist::Directory {
//!         root: PathBuf::from("/opt/netbeans/ide/modules"),
//!         recursive: false,
//!         filter: None,
//!     },
//!     &mut sink,
//! );
//! for line in &sink.lines {
//!     println!("{}", line);
//! }
//! assert!(report.success());
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod friends;
pub mod manifest;
pub mod patcher;
pub mod replace;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use batch::{
    run_batch, BatchReport, BatchRunner, LogSink, MemorySink, TracingSink, WorkItem, Worklist,
};
pub use config::{FriendlizerConfig, ModuleConfig};
pub use error::{Error, Result};
pub use friends::{merge_friend, FriendMerge, DEFAULT_TARGET, FRIENDS_ATTRIBUTE};
pub use manifest::{AttributeValue, Manifest, MANIFEST_PATH};
pub use patcher::{
    FailureReason, FriendListState, FriendPatcher, PatchOutcome, PatchStatus, UnchangedReason,
};
pub use replace::{RenameReplacer, Replacer};
pub use utils::create_glob_matcher;
