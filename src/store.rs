//! Durable file persistence for configuration documents
//!
//! [`SiteStore`] owns one XML configuration file and the discipline around
//! it: loading with corruption detection and backup recovery, saving with
//! a rolling backup and an fsync'd atomic replace, staleness detection
//! against external writers, and a raw-byte surface for handing document
//! snapshots to cooperating processes.
//!
//! ## Durability protocol
//!
//! Every save runs a small explicit state machine
//! (`BackingUp → Writing → Committing | RollingBack`):
//!
//! 1. **BackingUp**: an existing file is renamed to `<name>~`. Failure
//!    aborts the save with the original untouched.
//! 2. **Writing**: the new content is written to the target through a
//!    buffered writer, flushed and fsync'd.
//! 3. **Committing**: on success the backup is deleted.
//! 4. **RollingBack**: on failure the partial target is deleted and the
//!    backup is renamed back, so the filesystem ends up exactly as it was.
//!
//! A crash at any point leaves either a complete primary file, or a
//! complete backup that the next [`SiteStore::load`] restores. The backup
//! file is never a primary data source outside of that recovery path.
//!
//! ## Staleness
//!
//! The store remembers the file's modification time after each successful
//! load or save. [`SiteStore::modified`] compares it against the current
//! on-disk value so callers can detect concurrent external edits before
//! trusting the in-memory tree.

use crate::document::{Document, Element};
use crate::error::{Result, StoreError};
use crate::utils;
use crate::version::VersionNumber;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, trace, warn};

/// Root element name used when none is specified
pub const DEFAULT_ROOT_NAME: &str = "SiteStore";

/// Suffix appended to the file name to form the backup path
const BACKUP_SUFFIX: &str = "~";

/// An XML-backed configuration file with durable save semantics
///
/// # Examples
///
/// ```rust,no_run
/// use sitestore::SiteStore;
/// use std::path::PathBuf;
///
/// # fn main() -> sitestore::Result<()> {
/// let mut store = SiteStore::new(PathBuf::from("sites.xml"));
/// store.load(false)?;
///
/// // Mutate the tree through the root element...
/// store.root_mut().unwrap().set_attribute("note", "updated");
///
/// if store.modified() {
///     // Another process changed the file since we loaded it
/// }
/// store.save()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SiteStore {
    file_name: PathBuf,
    root_name: String,
    document: Option<Document>,
    modification_time: Option<SystemTime>,
    error: String,
}

impl SiteStore {
    /// Create a store for the given file with the default root element
    pub fn new(file_name: impl Into<PathBuf>) -> Self {
        Self::with_root_name(file_name, DEFAULT_ROOT_NAME)
    }

    /// Create a store expecting a custom root element name
    pub fn with_root_name(file_name: impl Into<PathBuf>, root_name: impl Into<String>) -> Self {
        SiteStore {
            file_name: file_name.into(),
            root_name: root_name.into(),
            document: None,
            modification_time: None,
            error: String::new(),
        }
    }

    /// Path of the configuration file
    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    /// Point the store at a different file, resetting staleness tracking
    pub fn set_file_name(&mut self, file_name: impl Into<PathBuf>) {
        let file_name = file_name.into();
        debug_assert!(!file_name.as_os_str().is_empty());
        self.file_name = file_name;
        self.modification_time = None;
    }

    /// The last error message, empty after a successful operation
    pub fn last_error(&self) -> &str {
        &self.error
    }

    /// Whether a document is currently loaded
    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    /// Release the in-memory tree
    pub fn close(&mut self) {
        self.document = None;
    }

    /// The root element of the loaded document
    pub fn root(&self) -> Option<&Element> {
        self.document.as_ref().and_then(|d| d.root(&self.root_name))
    }

    /// Mutable access to the root element of the loaded document
    pub fn root_mut(&mut self) -> Option<&mut Element> {
        let name = self.root_name.clone();
        self.document.as_mut().and_then(move |d| d.root_mut(&name))
    }

    /// Replace any loaded document with an empty one: declaration plus a
    /// bare root element
    pub fn create_empty(&mut self) {
        self.close();
        let mut document = Document::new();
        document.ensure_root(&self.root_name);
        self.document = Some(document);
    }

    /// Load the configuration file, repairing from backup if necessary
    ///
    /// Resolves one level of symlink indirection first, so a linked
    /// configuration file is read and later written through its target.
    /// On a parse failure or an empty file the sibling backup (`<name>~`)
    /// is tried; a usable backup is copied back over the primary and then
    /// deleted. With no usable backup, an empty document is created when
    /// `overwrite_invalid` is set or when both files are empty or missing;
    /// otherwise the load fails and [`SiteStore::last_error`] carries a
    /// message including the parser's byte offset.
    ///
    /// Any successful outcome refreshes the staleness timestamp from the
    /// file's on-disk modification time; total failure clears it.
    pub fn load(&mut self, overwrite_invalid: bool) -> Result<()> {
        self.close();
        self.error.clear();

        if self.file_name.as_os_str().is_empty() {
            return Err(self.record(StoreError::MissingFileName));
        }

        let redirected = utils::redirected_path(&self.file_name);

        let primary_failure = match self.open_document(&redirected) {
            Ok(Some(document)) => {
                self.document = Some(document);
                self.modification_time = utils::modification_time(&redirected);
                debug!("Loaded configuration from {:?}", redirected);
                return Ok(());
            }
            Ok(None) => "make sure the file can be accessed and is a well-formed XML document"
                .to_string(),
            Err(e) => e.to_string(),
        };

        let backup = backup_path(&redirected);
        match self.open_document(&backup) {
            Ok(Some(document)) => {
                if fs::copy(&backup, &redirected).is_err() {
                    self.modification_time = None;
                    let err = StoreError::BackupRestoreFailed { path: backup };
                    self.error = format!("{primary_failure}\n{err}");
                    return Err(err);
                }
                let _ = fs::remove_file(&backup);
                warn!("Restored {:?} from its backup", redirected);

                self.document = Some(document);
                self.modification_time = utils::modification_time(&redirected);
                Ok(())
            }
            _ => {
                let both_empty = utils::file_size(&redirected).unwrap_or(0) == 0
                    && utils::file_size(&backup).unwrap_or(0) == 0;
                if overwrite_invalid || both_empty {
                    self.error.clear();
                    self.create_empty();
                    self.modification_time = utils::modification_time(&redirected);
                    return Ok(());
                }

                self.modification_time = None;
                let err = StoreError::LoadFailed {
                    path: self.file_name.clone(),
                    reason: primary_failure,
                };
                self.error = err.to_string();
                Err(err)
            }
        }
    }

    /// Whether the file on disk changed since the last load or save
    ///
    /// Returns `true` when no timestamp was ever recorded, when the file
    /// vanished, or when its modification time no longer matches the
    /// recorded one.
    pub fn modified(&self) -> bool {
        if self.file_name.as_os_str().is_empty() {
            return false;
        }

        let Some(recorded) = self.modification_time else {
            return true;
        };
        match utils::modification_time(&self.file_name) {
            Some(current) => current != recorded,
            None => true,
        }
    }

    /// Save the loaded document to disk
    ///
    /// Refreshes the root element's `version` and `platform` attributes,
    /// then runs the durable write protocol described at module level. The
    /// staleness timestamp is refreshed from disk regardless of outcome,
    /// and on failure a non-empty error message is recorded and logged.
    pub fn save(&mut self) -> Result<()> {
        self.error.clear();

        if self.file_name.as_os_str().is_empty() {
            return Err(self.record(StoreError::MissingFileName));
        }
        if self.document.is_none() {
            return Err(self.record(StoreError::NotLoaded));
        }

        self.update_metadata();

        let redirected = utils::redirected_path(&self.file_name);
        let content = self
            .document
            .as_ref()
            .expect("checked above")
            .to_bytes();

        let result = SaveTransaction::new(&redirected).commit(&content);
        self.modification_time = utils::modification_time(&redirected);

        match result {
            Ok(()) => {
                debug!("Saved configuration to {:?}", redirected);
                Ok(())
            }
            Err(e) => {
                warn!("Could not write {:?}: {}", redirected, e);
                Err(self.record(e))
            }
        }
    }

    /// Whether the loaded document was written by a newer application
    /// version than this build
    pub fn is_from_future_version(&self) -> bool {
        let Some(root) = self.root() else {
            return false;
        };
        match root.attribute("version").and_then(VersionNumber::parse) {
            Some(version) => version > VersionNumber::own(),
            None => false,
        }
    }

    /// Exact number of bytes a [`SiteStore::raw_data_into`] call needs
    ///
    /// Returns 0 when no document is loaded.
    pub fn raw_data_len(&self) -> usize {
        self.document.as_ref().map(|d| d.to_bytes().len()).unwrap_or(0)
    }

    /// Serialize the document into a caller-supplied buffer
    ///
    /// The buffer is zeroed first, then filled with as much of the
    /// serialized document as fits; the write never runs past the buffer.
    pub fn raw_data_into(&self, buffer: &mut [u8]) {
        buffer.fill(0);
        let Some(document) = &self.document else {
            return;
        };
        let bytes = document.to_bytes();
        let n = bytes.len().min(buffer.len());
        buffer[..n].copy_from_slice(&bytes[..n]);
    }

    /// Parse a raw byte buffer and adopt it as the current document
    ///
    /// The buffer must parse and contain the expected root element;
    /// otherwise the store ends up with no document loaded. Unlike
    /// [`SiteStore::load`] this never synthesizes a missing root: a
    /// snapshot from another process is either complete or rejected.
    pub fn parse_data(&mut self, data: &[u8]) -> Result<()> {
        self.close();
        self.error.clear();

        let document = match Document::parse(data) {
            Ok(document) => document,
            Err(e) => return Err(self.record(e)),
        };
        if document.root(&self.root_name).is_none() {
            return Err(self.record(StoreError::ForeignRoot {
                expected: self.root_name.clone(),
            }));
        }

        self.document = Some(document);
        Ok(())
    }

    /// Refresh the embedded version and platform metadata
    ///
    /// Applied only when the root element carries the default document
    /// type name; foreign or custom-rooted documents are left alone.
    fn update_metadata(&mut self) {
        let Some(root) = self.root_mut() else {
            return;
        };
        if root.name() != DEFAULT_ROOT_NAME {
            return;
        }
        root.set_attribute("version", env!("CARGO_PKG_VERSION"));
        root.set_attribute("platform", platform_name());
    }

    /// Open and validate a document file; `Ok(None)` means missing/empty
    fn open_document(&self, path: &Path) -> Result<Option<Document>> {
        if utils::file_size(path).unwrap_or(0) == 0 {
            return Ok(None);
        }

        let data = fs::read(path)?;
        let mut document = Document::parse(&data)?;

        if document.root(&self.root_name).is_none() {
            if document.is_empty() {
                // Only a declaration or comments; treat as a fresh file
                document.ensure_root(&self.root_name);
            } else {
                return Err(StoreError::ForeignRoot {
                    expected: self.root_name.clone(),
                });
            }
        }

        Ok(Some(document))
    }

    fn record(&mut self, err: StoreError) -> StoreError {
        self.error = err.to_string();
        err
    }
}

/// Sibling backup path: the file name with `~` appended
fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Platform tag embedded in saved documents
fn platform_name() -> &'static str {
    if cfg!(windows) {
        "windows"
    } else if cfg!(target_os = "macos") {
        "mac"
    } else {
        "*nix"
    }
}

/// States of the durable write protocol
///
/// Kept explicit so that every transition's failure mode has exactly one
/// compensating action, enumerable in [`SaveTransaction::commit_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveState {
    Idle,
    BackingUp,
    Writing,
    Committing,
    RollingBack,
    Done,
}

/// One attempt to durably replace the target file's contents
struct SaveTransaction {
    target: PathBuf,
    backup: PathBuf,
    state: SaveState,
    backed_up: bool,
}

impl SaveTransaction {
    fn new(target: &Path) -> Self {
        SaveTransaction {
            target: target.to_path_buf(),
            backup: backup_path(target),
            state: SaveState::Idle,
            backed_up: false,
        }
    }

    /// Run the full protocol with the default fsync'ing writer
    fn commit(self, content: &[u8]) -> Result<()> {
        self.commit_with(content, write_and_sync)
    }

    /// Run the full protocol with an injectable write step
    ///
    /// The filesystem ends up holding either the new content at the
    /// target, or the previous bytes exactly as they were; never a
    /// partial file, and never a leftover backup.
    fn commit_with(
        mut self,
        content: &[u8],
        write: impl FnOnce(&Path, &[u8]) -> std::io::Result<()>,
    ) -> Result<()> {
        debug_assert_eq!(self.state, SaveState::Idle);

        self.state = SaveState::BackingUp;
        if utils::file_size(&self.target).is_some() {
            utils::clear_overwrite_attributes(&self.target);
            if let Err(e) = fs::rename(&self.target, &self.backup) {
                trace!("Backup of {:?} failed: {}", self.target, e);
                return Err(StoreError::BackupFailed {
                    path: self.target,
                });
            }
            self.backed_up = true;
        }

        self.state = SaveState::Writing;
        match write(&self.target, content) {
            Ok(()) => {
                self.state = SaveState::Committing;
                if self.backed_up {
                    let _ = fs::remove_file(&self.backup);
                }
                self.state = SaveState::Done;
                Ok(())
            }
            Err(e) => {
                self.state = SaveState::RollingBack;
                let _ = fs::remove_file(&self.target);
                if self.backed_up {
                    if let Err(restore) = fs::rename(&self.backup, &self.target) {
                        warn!(
                            "Rollback failed, previous contents remain at {:?}: {}",
                            self.backup, restore
                        );
                        self.state = SaveState::Done;
                        return Err(StoreError::BackupRestoreFailed { path: self.backup });
                    }
                }
                self.state = SaveState::Done;
                Err(StoreError::WriteFailed {
                    path: self.target,
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Write content through a buffered writer, flushing and fsyncing before
/// reporting success
fn write_and_sync(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let file = fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    writer.write_all(content)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}
