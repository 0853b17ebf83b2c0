//! Explicit management session.
//!
//! A [`Session`] owns the configuration store and the record table. Every
//! operation goes through it; there is no process-wide connection state.

use std::sync::Arc;

use crate::config::StorageConfig;
use crate::container::MgmtList;
use crate::context::{CfgContext, ConfigStore, FileStore, StoredFile};
use crate::error::MgmtResult;
use crate::records::{ActionNeeded, Record, RecordLookup, RecordStore, RecordValue, SetReport};
use crate::rules::FileKind;

#[derive(Clone)]
pub struct Session {
    store: Arc<dyn ConfigStore>,
    records: RecordStore,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("records", &self.records).finish_non_exhaustive()
    }
}

impl Session {
    /// Open file-backed storage as configured.
    pub fn open(config: &StorageConfig) -> MgmtResult<Self> {
        let store = FileStore::open(&config.config_dir)?;
        let records = match &config.records_file {
            Some(path) => RecordStore::open(path)?,
            None => RecordStore::new(),
        };
        tracing::info!(
            config_dir = %config.config_dir.display(),
            records_file = ?config.records_file,
            "Management session opened"
        );
        Ok(Self::with_backends(Arc::new(store), records))
    }

    pub fn with_backends(store: Arc<dyn ConfigStore>, records: RecordStore) -> Self {
        Self { store, records }
    }

    /// Create an empty context bound to `kind`; call `fetch` to populate it.
    pub fn context(&self, kind: FileKind) -> CfgContext {
        CfgContext::new(kind, Arc::clone(&self.store))
    }

    /// Raw text and version of one configuration file.
    pub fn read_file(&self, kind: FileKind) -> MgmtResult<StoredFile> {
        self.store.read(kind)
    }

    /// Replace one configuration file verbatim, optionally version-checked.
    pub fn write_file(&self, kind: FileKind, text: &str, expected_version: Option<u64>) -> MgmtResult<u64> {
        let version = self.store.write(kind, text, expected_version)?;
        tracing::info!(file = %kind, version, "Configuration file replaced");
        Ok(version)
    }

    /// Current store version of one configuration file; 0 if never written.
    pub fn file_version(&self, kind: FileKind) -> MgmtResult<u64> {
        self.store.version(kind)
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn get_record(&self, name: &str) -> MgmtResult<RecordValue> {
        self.records.get(name)
    }

    pub fn set_record(&self, name: &str, value: RecordValue) -> MgmtResult<ActionNeeded> {
        self.records.set(name, value)
    }

    pub fn get_many<I, S>(&self, names: I) -> MgmtList<RecordLookup>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.records.get_many(names)
    }

    pub fn set_many<I>(&self, entries: I) -> MgmtResult<SetReport>
    where
        I: IntoIterator<Item = Record>,
    {
        self.records.set_many(entries)
    }

    pub fn get_matching(&self, prefix: &str) -> MgmtList<Record> {
        self.records.get_matching(prefix)
    }

    pub fn reset_stats(&self) -> usize {
        self.records.reset_stats()
    }

    /// End the session. Pending context edits are not affected.
    pub fn close(self) {
        tracing::info!("Management session closed");
    }
}
