//! Friend list patching for JAR archives
//!
//! The patcher reads the manifest of a JAR, adds the target module to its
//! `OpenIDE-Module-Friends` attribute and repacks the archive:
//!
//! 1. The updated manifest is written first, under the original entry name
//! 2. Every other entry is raw-copied in archive order, so compressed data,
//!    CRCs and names stay exactly as they were
//! 3. The new archive is written next to the original (`<file>.tmp`), synced,
//!    and moved over the original by a [`Replacer`]
//!
//! Archives that need no change are never opened for writing.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::friends::{contains_friend, merge_friend, FriendMerge, FRIENDS_ATTRIBUTE};
use crate::manifest::{is_manifest_path, AttributeValue, Manifest};
use crate::replace::{swap_into_place, RenameReplacer, Replacer};

/// Suffix appended to the archive path for the rewritten copy
pub const DEFAULT_TEMP_SUFFIX: &str = ".tmp";

/// Largest manifest read into memory; the size an archive declares is not trusted
pub const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;

/// Step at which patching an archive failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The archive could not be opened as a ZIP file
    Open,
    /// The manifest could not be read or parsed
    Read,
    /// Writing the temporary archive failed
    Write,
    /// Moving the temporary archive over the original failed
    Swap,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureReason::Open => "open error",
            FailureReason::Read => "read error",
            FailureReason::Write => "write error",
            FailureReason::Swap => "swap error",
        };
        f.write_str(name)
    }
}

/// Why an archive was left as it is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnchangedReason {
    /// The archive has no `META-INF/MANIFEST.MF`
    NoManifest,
    /// The manifest has no friend list attribute
    NoFriendList,
    /// The friend list is not valid UTF-8
    NotText,
    /// The target is already a friend
    AlreadyFriend,
}

/// Result of patching one archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStatus {
    /// The archive was rewritten and replaced
    Patched,
    /// Nothing needed to change
    Unchanged(UnchangedReason),
    /// Patching failed, the original archive is untouched
    Failed(FailureReason),
}

/// Outcome of patching one archive
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub path: PathBuf,
    pub status: PatchStatus,
    /// Human readable summary
    pub message: String,
}

impl PatchOutcome {
    /// Whether the archive is in the desired state
    pub fn success(&self) -> bool {
        !matches!(self.status, PatchStatus::Failed(_))
    }

    /// Whether the archive was rewritten
    pub fn rewritten(&self) -> bool {
        self.status == PatchStatus::Patched
    }

    /// Failure step, if patching failed
    pub fn reason(&self) -> Option<FailureReason> {
        match self.status {
            PatchStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// State of an archive's friend list, as reported by [`FriendPatcher::inspect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendListState {
    NoManifest,
    Missing,
    NotText,
    Present { value: String, is_friend: bool },
}

struct StepError {
    reason: FailureReason,
    error: Error,
}

type StepResult<T> = std::result::Result<T, StepError>;

trait AtStep<T> {
    fn at(self, reason: FailureReason) -> StepResult<T>;
}

impl<T, E: Into<Error>> AtStep<T> for std::result::Result<T, E> {
    fn at(self, reason: FailureReason) -> StepResult<T> {
        self.map_err(|e| StepError {
            reason,
            error: e.into(),
        })
    }
}

/// The manifest entry of an archive
struct ManifestEntry {
    name: String,
    compression: CompressionMethod,
    data: Vec<u8>,
}

fn read_manifest<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Option<ManifestEntry>> {
    let mut found = None;
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        if is_manifest_path(entry.name()) {
            found = Some((i, entry.name().to_string(), entry.compression()));
            break;
        }
    }

    let Some((index, name, compression)) = found else {
        return Ok(None);
    };

    let mut entry = archive.by_index(index)?;
    let mut data = Vec::new();
    entry
        .by_ref()
        .take(MAX_MANIFEST_BYTES + 1)
        .read_to_end(&mut data)?;
    if data.len() as u64 > MAX_MANIFEST_BYTES {
        return Err(Error::InvalidManifest(format!(
            "{} is larger than {} bytes",
            name, MAX_MANIFEST_BYTES
        )));
    }

    Ok(Some(ManifestEntry {
        name,
        compression,
        data,
    }))
}

fn write_patched<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    manifest_entry: &ManifestEntry,
    manifest: &Manifest,
    temp_path: &Path,
) -> Result<()> {
    let file = File::create(temp_path)?;
    let mut writer = ZipWriter::new(BufWriter::new(file));

    let compression = match manifest_entry.compression {
        CompressionMethod::Stored => CompressionMethod::Stored,
        _ => CompressionMethod::Deflated,
    };
    let options = SimpleFileOptions::default().compression_method(compression);
    writer.start_file(manifest_entry.name.clone(), options)?;
    writer.write_all(&manifest.to_bytes())?;

    let mut copied = 0usize;
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        if is_manifest_path(entry.name()) {
            continue;
        }
        writer.raw_copy_file(entry)?;
        copied += 1;
    }

    let mut buffered = writer.finish()?;
    buffered.flush()?;
    let file = buffered.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;

    debug!("Wrote {} with {} copied entries", temp_path.display(), copied);
    Ok(())
}

/// Adds a target module to the friend list of JAR manifests
pub struct FriendPatcher {
    target: String,
    attribute: String,
    temp_suffix: String,
    replacer: Box<dyn Replacer>,
}

impl FriendPatcher {
    /// Create a patcher adding `target` to `OpenIDE-Module-Friends`
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            attribute: FRIENDS_ATTRIBUTE.to_string(),
            temp_suffix: DEFAULT_TEMP_SUFFIX.to_string(),
            replacer: Box::new(RenameReplacer),
        }
    }

    /// Use a different manifest attribute
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }

    /// Use a different suffix for the temporary archive
    pub fn with_temp_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.temp_suffix = suffix.into();
        self
    }

    /// Use a different strategy to move the temporary archive in place
    pub fn with_replacer(mut self, replacer: Box<dyn Replacer>) -> Self {
        self.replacer = replacer;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Path of the temporary archive for `path`
    pub fn temp_path(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(&self.temp_suffix);
        PathBuf::from(name)
    }

    /// Patch a single archive
    ///
    /// Errors never escape: every failure is reported in the outcome.
    pub fn patch(&self, path: &Path) -> PatchOutcome {
        let (status, message) = match self.try_patch(path) {
            Ok(PatchStatus::Patched) => (
                PatchStatus::Patched,
                format!("Replaced {} successfully", path.display()),
            ),
            Ok(status) => (status, self.describe_unchanged(path, status)),
            Err(failure) => {
                let message = self.describe_failure(path, &failure);
                warn!("{}", message);
                (PatchStatus::Failed(failure.reason), message)
            }
        };

        PatchOutcome {
            path: path.to_path_buf(),
            status,
            message,
        }
    }

    fn describe_unchanged(&self, path: &Path, status: PatchStatus) -> String {
        let detail = match status {
            PatchStatus::Unchanged(UnchangedReason::NoManifest) => "no manifest".to_string(),
            PatchStatus::Unchanged(UnchangedReason::NoFriendList) => {
                format!("no {} attribute", self.attribute)
            }
            PatchStatus::Unchanged(UnchangedReason::NotText) => {
                format!("{} is not a text value", self.attribute)
            }
            PatchStatus::Unchanged(UnchangedReason::AlreadyFriend) => {
                format!("{} is already a friend", self.target)
            }
            _ => "no change needed".to_string(),
        };
        format!("Nothing to patch in {}: {}", path.display(), detail)
    }

    fn describe_failure(&self, path: &Path, failure: &StepError) -> String {
        let mut message = format!(
            "Failed to patch {} ({}): {}",
            path.display(),
            failure.reason,
            failure.error
        );
        let temp_path = self.temp_path(path);
        if temp_path.exists() {
            message.push_str(&format!(
                "; temporary file {} left for inspection",
                temp_path.display()
            ));
        }
        message
    }

    fn try_patch(&self, path: &Path) -> StepResult<PatchStatus> {
        debug!("Opening {}", path.display());
        let file = File::open(path).at(FailureReason::Open)?;
        let mut archive = ZipArchive::new(BufReader::new(file)).at(FailureReason::Open)?;

        let Some(manifest_entry) = read_manifest(&mut archive).at(FailureReason::Read)? else {
            return Ok(PatchStatus::Unchanged(UnchangedReason::NoManifest));
        };
        let mut manifest = Manifest::parse(&manifest_entry.data).at(FailureReason::Read)?;

        let new_value = match manifest.get(&self.attribute) {
            None => return Ok(PatchStatus::Unchanged(UnchangedReason::NoFriendList)),
            Some(AttributeValue::Binary(_)) => {
                return Ok(PatchStatus::Unchanged(UnchangedReason::NotText))
            }
            Some(AttributeValue::Text(value)) => match merge_friend(Some(value), &self.target) {
                FriendMerge::Unchanged => {
                    return Ok(PatchStatus::Unchanged(UnchangedReason::AlreadyFriend))
                }
                FriendMerge::Updated(new_value) => new_value,
            },
        };
        debug!("New {} for {}: {}", self.attribute, path.display(), new_value);
        manifest.set(&self.attribute, &new_value);

        let temp_path = self.temp_path(path);
        write_patched(&mut archive, &manifest_entry, &manifest, &temp_path)
            .at(FailureReason::Write)?;

        // The source handle must be closed before the original can be replaced
        drop(archive);

        swap_into_place(path, &temp_path, self.replacer.as_ref()).at(FailureReason::Swap)?;
        info!("Patched {}", path.display());

        Ok(PatchStatus::Patched)
    }

    /// Read an archive's friend list without modifying anything
    pub fn inspect(&self, path: &Path) -> Result<FriendListState> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;

        let Some(manifest_entry) = read_manifest(&mut archive)? else {
            return Ok(FriendListState::NoManifest);
        };
        let manifest = Manifest::parse(&manifest_entry.data)?;

        Ok(match manifest.get(&self.attribute) {
            None => FriendListState::Missing,
            Some(AttributeValue::Binary(_)) => FriendListState::NotText,
            Some(AttributeValue::Text(value)) => FriendListState::Present {
                value: value.to_string(),
                is_friend: contains_friend(value, &self.target),
            },
        })
    }
}
