//! Persisted storage for configuration files.
//!
//! # Responsibilities
//! - Read one configuration file with its current version
//! - Replace one configuration file atomically, guarded by a version check
//!
//! # Design Decisions
//! - Versions start at 0 for a file never written through the store
//! - The version is the first line of the file itself (`# proxy-mgmt version N`),
//!   so text and version change together in one rename
//! - `FileStore` writes a temp file, fsyncs, then renames over the target,
//!   so readers see either the old or the new rule set
//! - Check-and-write runs under one mutex per store

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{MgmtError, MgmtResult};
use crate::rules::FileKind;

const VERSION_HEADER: &str = "# proxy-mgmt version ";

/// A configuration file's contents and the version they were read at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub text: String,
    pub version: u64,
}

/// Backend holding the persisted configuration files.
pub trait ConfigStore: Send + Sync {
    /// Read the file for `kind`. A missing file is `NotFound`.
    fn read(&self, kind: FileKind) -> MgmtResult<StoredFile>;

    /// Replace the file for `kind` and return the new version.
    ///
    /// With `expected` set, the write is rejected with
    /// `ConcurrentModification` unless the stored version still matches.
    fn write(&self, kind: FileKind, text: &str, expected: Option<u64>) -> MgmtResult<u64>;

    /// Write the file for `kind` only if it does not exist yet.
    ///
    /// An existing file is `ConcurrentModification` and is left untouched.
    fn create(&self, kind: FileKind, text: &str) -> MgmtResult<u64>;

    /// Current version of the file for `kind`; 0 if it does not exist.
    fn version(&self, kind: FileKind) -> MgmtResult<u64>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn check_version(kind: FileKind, expected: Option<u64>, actual: u64) -> MgmtResult<()> {
    match expected {
        Some(expected) if expected != actual => Err(MgmtError::ConcurrentModification {
            kind,
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

fn already_exists(kind: FileKind, actual: u64) -> MgmtError {
    MgmtError::ConcurrentModification {
        kind,
        expected: 0,
        actual,
    }
}

/// Split the version line off persisted text. Files without one are at 0.
fn split_header(path: &Path, raw: String) -> MgmtResult<StoredFile> {
    let Some(rest) = raw.strip_prefix(VERSION_HEADER) else {
        return Ok(StoredFile { text: raw, version: 0 });
    };
    let (number, text) = rest.split_once('\n').unwrap_or((rest, ""));
    let version = number.trim().parse().map_err(|_| MgmtError::ReadFailure {
        path: path.to_path_buf(),
        source: io::Error::new(
            io::ErrorKind::InvalidData,
            format!("bad version line `{}{}`", VERSION_HEADER, number),
        ),
    })?;
    Ok(StoredFile {
        text: text.to_string(),
        version,
    })
}

/// One text file per kind inside a directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> MgmtResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| MgmtError::WriteFailure {
            path: dir.clone(),
            reason: e.to_string(),
        })?;
        tracing::debug!(dir = %dir.display(), "Opened configuration store");
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file for `kind`.
    pub fn path_of(&self, kind: FileKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Read without taking the lock. `None` if the file does not exist.
    fn load(&self, kind: FileKind) -> MgmtResult<Option<StoredFile>> {
        let path = self.path_of(kind);
        match fs::read_to_string(&path) {
            Ok(raw) => split_header(&path, raw).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(MgmtError::ReadFailure { path, source }),
        }
    }

    /// Write `text` at `version` next to the target, fsync it, then rename it into place.
    fn replace_file(&self, kind: FileKind, text: &str, version: u64) -> MgmtResult<()> {
        let target = self.path_of(kind);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", kind.file_name(), uuid::Uuid::new_v4()));

        let result = (|| -> io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            writeln!(file, "{}{}", VERSION_HEADER, version)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &target)
        })();

        result.map_err(|e| {
            let _ = fs::remove_file(&tmp);
            MgmtError::WriteFailure {
                path: target,
                reason: e.to_string(),
            }
        })?;

        tracing::debug!(file = %kind, version, bytes = text.len(), "Replaced configuration file");
        Ok(())
    }
}

impl ConfigStore for FileStore {
    fn read(&self, kind: FileKind) -> MgmtResult<StoredFile> {
        let _guard = lock(&self.lock);
        self.load(kind)?
            .ok_or_else(|| MgmtError::NotFound(self.path_of(kind).display().to_string()))
    }

    fn write(&self, kind: FileKind, text: &str, expected: Option<u64>) -> MgmtResult<u64> {
        let _guard = lock(&self.lock);
        let actual = self.load(kind)?.map(|f| f.version).unwrap_or(0);
        check_version(kind, expected, actual)?;

        let next = actual + 1;
        self.replace_file(kind, text, next)?;
        Ok(next)
    }

    fn create(&self, kind: FileKind, text: &str) -> MgmtResult<u64> {
        let _guard = lock(&self.lock);
        if let Some(existing) = self.load(kind)? {
            return Err(already_exists(kind, existing.version));
        }

        self.replace_file(kind, text, 1)?;
        Ok(1)
    }

    fn version(&self, kind: FileKind) -> MgmtResult<u64> {
        let _guard = lock(&self.lock);
        Ok(self.load(kind)?.map(|f| f.version).unwrap_or(0))
    }
}

/// In-memory store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<FileKind, StoredFile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without bumping its version.
    pub fn with_file(self, kind: FileKind, text: impl Into<String>) -> Self {
        lock(&self.files).insert(
            kind,
            StoredFile {
                text: text.into(),
                version: 0,
            },
        );
        self
    }
}

impl ConfigStore for MemoryStore {
    fn read(&self, kind: FileKind) -> MgmtResult<StoredFile> {
        lock(&self.files)
            .get(&kind)
            .cloned()
            .ok_or_else(|| MgmtError::NotFound(kind.file_name().to_string()))
    }

    fn write(&self, kind: FileKind, text: &str, expected: Option<u64>) -> MgmtResult<u64> {
        let mut files = lock(&self.files);
        let entry = files.entry(kind).or_default();
        check_version(kind, expected, entry.version)?;
        entry.text = text.to_string();
        entry.version += 1;
        Ok(entry.version)
    }

    fn create(&self, kind: FileKind, text: &str) -> MgmtResult<u64> {
        let mut files = lock(&self.files);
        if let Some(existing) = files.get(&kind) {
            return Err(already_exists(kind, existing.version));
        }
        files.insert(
            kind,
            StoredFile {
                text: text.to_string(),
                version: 1,
            },
        );
        Ok(1)
    }

    fn version(&self, kind: FileKind) -> MgmtResult<u64> {
        Ok(lock(&self.files).get(&kind).map(|f| f.version).unwrap_or(0))
    }
}
