//! Batch patching
//!
//! A [`BatchRunner`] resolves a [`Worklist`] into archive paths and patches
//! them one at a time. A failing archive never stops the batch; the report
//! is successful only when every patched archive is.

use std::path::{Path, PathBuf};

use globset::GlobMatcher;
use tracing::{info, warn};

use crate::config::{FriendlizerConfig, ModuleConfig};
use crate::error::Result;
use crate::patcher::{FriendPatcher, PatchOutcome, PatchStatus};
use crate::utils::{collect_files, has_extension, list_directory, matches_filter};

/// Default extension of archives to patch
pub const DEFAULT_EXTENSION: &str = "jar";

/// Receives progress lines from a batch run
pub trait LogSink {
    /// A single log line
    fn log(&mut self, line: &str);

    /// `done` of `total` paths have been examined
    fn progress(&mut self, _done: usize, _total: usize) {}

    /// The batch is over
    fn finished(&mut self, _success: bool) {}
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub lines: Vec<String>,
    pub success: Option<bool>,
}

impl LogSink for MemorySink {
    fn log(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn finished(&mut self, success: bool) {
        self.success = Some(success);
    }
}

/// Forwards lines to `tracing`
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&mut self, line: &str) {
        info!("{}", line);
    }

    fn finished(&mut self, success: bool) {
        if success {
            info!("Batch finished successfully");
        } else {
            warn!("Batch finished with failures");
        }
    }
}

/// Where the archives to patch come from
#[derive(Debug, Clone)]
pub enum Worklist {
    /// Explicit archive paths
    Paths(Vec<PathBuf>),
    /// Entries of a directory
    Directory {
        root: PathBuf,
        recursive: bool,
        /// Matched against paths relative to `root`
        filter: Option<GlobMatcher>,
    },
    /// Dependencies of configured modules, relative to `root`
    Modules {
        root: PathBuf,
        modules: Vec<ModuleConfig>,
    },
}

/// A resolved step of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// A line announcing the following archives
    Heading(String),
    /// An archive candidate
    Archive(PathBuf),
}

/// Result of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One outcome per archive handed to the patcher
    pub outcomes: Vec<PatchOutcome>,
    /// Paths that were not archives
    pub skipped: Vec<PathBuf>,
    /// Errors that prevented building the worklist
    pub errors: Vec<String>,
}

impl BatchReport {
    /// Whether every archive ended up in the desired state
    pub fn success(&self) -> bool {
        self.errors.is_empty() && self.outcomes.iter().all(PatchOutcome::success)
    }

    pub fn patched(&self) -> usize {
        self.outcomes.iter().filter(|o| o.rewritten()).count()
    }

    pub fn unchanged(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, PatchStatus::Unchanged(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success()).count()
    }
}

fn module_heading(module: &ModuleConfig) -> String {
    if module.description.is_empty() {
        format!("Patching for: {}", module.key)
    } else {
        format!("Patching for: {} ({})", module.key, module.description)
    }
}

/// Patches every archive of a worklist
pub struct BatchRunner {
    patcher: FriendPatcher,
    extension: String,
}

impl BatchRunner {
    pub fn new(patcher: FriendPatcher) -> Self {
        Self {
            patcher,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Only patch files with this extension (case-insensitive)
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn patcher(&self) -> &FriendPatcher {
        &self.patcher
    }

    /// Turn a worklist into the ordered steps of a run
    pub fn resolve(&self, worklist: &Worklist) -> Result<Vec<WorkItem>> {
        let items: Vec<WorkItem> = match worklist {
            Worklist::Paths(paths) => paths.iter().cloned().map(WorkItem::Archive).collect(),
            Worklist::Directory {
                root,
                recursive,
                filter,
            } => {
                let paths = if *recursive {
                    collect_files(root)?
                } else {
                    list_directory(root)?
                };
                paths
                    .into_iter()
                    .filter(|path| {
                        let relative = path.strip_prefix(root).unwrap_or(path.as_path());
                        matches_filter(relative, filter.as_ref())
                    })
                    .map(WorkItem::Archive)
                    .collect()
            }
            Worklist::Modules { root, modules } => {
                let mut items = Vec::new();
                for module in modules {
                    items.push(WorkItem::Heading(module_heading(module)));
                    items.extend(
                        module
                            .dependencies
                            .iter()
                            .map(|dependency| WorkItem::Archive(root.join(dependency))),
                    );
                }
                items
            }
        };
        Ok(items)
    }

    /// Patch every archive of a worklist, reporting through `sink`
    pub fn run(&self, worklist: &Worklist, sink: &mut dyn LogSink) -> BatchReport {
        let mut report = BatchReport::default();

        sink.log(&format!(
            "Adding {} to {} of each archive",
            self.patcher.target(),
            self.patcher.attribute()
        ));

        let items = match self.resolve(worklist) {
            Ok(items) => items,
            Err(e) => {
                let line = format!("Cannot build the worklist: {}", e);
                sink.log(&line);
                report.errors.push(line);
                sink.finished(false);
                return report;
            }
        };

        let total = items
            .iter()
            .filter(|item| matches!(item, WorkItem::Archive(_)))
            .count();
        let mut done = 0;

        for item in items {
            let path = match item {
                WorkItem::Heading(line) => {
                    sink.log(&line);
                    continue;
                }
                WorkItem::Archive(path) => path,
            };

            self.examine(path, sink, &mut report);
            done += 1;
            sink.progress(done, total);
        }

        sink.log(&format!(
            "Done: {} patched, {} unchanged, {} failed, {} skipped",
            report.patched(),
            report.unchanged(),
            report.failed(),
            report.skipped.len()
        ));

        let success = report.success();
        sink.log(if success {
            "All archives are patched"
        } else {
            "Patching failed for some archives"
        });
        sink.finished(success);

        report
    }

    fn examine(&self, path: PathBuf, sink: &mut dyn LogSink, report: &mut BatchReport) {
        sink.log(&format!("Examining {}", path.display()));

        if !has_extension(&path, &self.extension) {
            sink.log(&format!(
                "Skipped {}: not a .{} file",
                path.display(),
                self.extension
            ));
            report.skipped.push(path);
        } else if !path.is_file() {
            sink.log(&format!("Skipped {}: not a file", path.display()));
            report.skipped.push(path);
        } else {
            let outcome = self.patcher.patch(&path);
            sink.log(&outcome.message);
            report.outcomes.push(outcome);
        }
    }
}

/// Patch the configured modules under `root`
pub fn run_batch(
    config: &FriendlizerConfig,
    root: &Path,
    sink: &mut dyn LogSink,
) -> Vec<PatchOutcome> {
    let patcher = FriendPatcher::new(config.target.clone()).with_attribute(config.attribute.clone());
    let worklist = Worklist::Modules {
        root: root.to_path_buf(),
        modules: config.modules.clone(),
    };
    BatchRunner::new(patcher).run(&worklist, sink).outcomes
}
