//! Live record values with optional persistence of changed settings.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::container::MgmtList;
use crate::error::{MgmtError, MgmtResult};
use crate::observability::metrics;
use crate::records::registry::{self, RecordDef, RECORDS};
use crate::records::{ActionNeeded, Record, RecordLookup, RecordValue, SetOutcome, SetReport};

/// On-disk form of the overrides file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Overrides {
    #[serde(default)]
    records: BTreeMap<String, RecordValue>,
}

/// Thread-safe table of every registered record.
#[derive(Clone)]
pub struct RecordStore {
    values: Arc<DashMap<&'static str, RecordValue>>,
    overrides_path: Option<PathBuf>,
    /// Held across apply, persist and rollback so snapshots land in order.
    writes: Arc<Mutex<()>>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("records", &self.values.len())
            .field("overrides_path", &self.overrides_path)
            .finish()
    }
}

impl RecordStore {
    /// A store holding every record at its default, without persistence.
    pub fn new() -> Self {
        let values = DashMap::with_capacity(RECORDS.len());
        for def in RECORDS {
            values.insert(def.name, def.default_value());
        }
        Self {
            values: Arc::new(values),
            overrides_path: None,
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Open a store that persists changed settings to `path`.
    ///
    /// Existing overrides are applied; unknown or invalid entries are skipped.
    pub fn open(path: impl Into<PathBuf>) -> MgmtResult<Self> {
        let path = path.into();
        let mut store = Self::new();

        let content = match fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(source) => return Err(MgmtError::ReadFailure { path, source }),
        };

        if let Some(content) = content {
            let overrides: Overrides = toml::from_str(&content).map_err(|e| MgmtError::ReadFailure {
                path: path.clone(),
                source: io::Error::new(io::ErrorKind::InvalidData, e),
            })?;

            let mut applied = 0usize;
            for (name, value) in overrides.records {
                let result = registry::lookup(&name)
                    .filter(|def| def.is_config())
                    .ok_or_else(|| MgmtError::NotFound(name.clone()))
                    .and_then(|def| Ok((def, def.validate(value)?)));
                match result {
                    Ok((def, value)) => {
                        store.values.insert(def.name, value);
                        applied += 1;
                    }
                    Err(e) => tracing::warn!(record = %name, error = %e, "Skipping record override"),
                }
            }
            tracing::info!(path = %path.display(), applied, "Loaded record overrides");
        }

        store.overrides_path = Some(path);
        Ok(store)
    }

    pub fn overrides_path(&self) -> Option<&Path> {
        self.overrides_path.as_deref()
    }

    fn def(name: &str) -> MgmtResult<&'static RecordDef> {
        registry::lookup(name).ok_or_else(|| MgmtError::NotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> MgmtResult<RecordValue> {
        let def = Self::def(name)?;
        Ok(self
            .values
            .get(def.name)
            .map(|v| v.value().clone())
            .unwrap_or_else(|| def.default_value()))
    }

    /// Look up every name, in request order; unknown names are reported inline.
    pub fn get_many<I, S>(&self, names: I) -> MgmtList<RecordLookup>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                match self.get(name) {
                    Ok(value) => RecordLookup::Found(Record::new(name, value)),
                    Err(_) => RecordLookup::NotFound {
                        name: name.to_string(),
                    },
                }
            })
            .collect()
    }

    /// Every record whose name starts with `prefix`, sorted by name.
    pub fn get_matching(&self, prefix: &str) -> MgmtList<Record> {
        let mut matched: Vec<Record> = self
            .values
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| Record::new(*entry.key(), entry.value().clone()))
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        matched.into()
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validate and store one value, returning what it replaced.
    fn apply(&self, name: &str, value: RecordValue) -> MgmtResult<(&'static RecordDef, RecordValue)> {
        let def = Self::def(name)?;
        let value = def.validate(value)?;
        let previous = self
            .values
            .insert(def.name, value)
            .unwrap_or_else(|| def.default_value());
        Ok((def, previous))
    }

    fn restore(&self, undo: Vec<(&'static str, RecordValue)>) {
        for (name, value) in undo.into_iter().rev() {
            self.values.insert(name, value);
        }
    }

    /// Set one record and return the action needed for it to take effect.
    ///
    /// If the overrides file cannot be written the value is rolled back.
    pub fn set(&self, name: &str, value: RecordValue) -> MgmtResult<ActionNeeded> {
        let _writes = self.lock_writes();
        let (def, previous) = self.apply(name, value)?;
        if def.is_config() {
            if let Err(e) = self.persist() {
                self.restore(vec![(def.name, previous)]);
                tracing::error!(record = name, error = %e, "Record set rolled back");
                return Err(e);
            }
        }

        let action = def.update.action_needed();
        metrics::record_record_set(action.as_str());
        tracing::info!(record = name, action = %action, "Record set");
        Ok(action)
    }

    /// Apply every entry; rejected entries report `Undefined` without
    /// stopping the rest.
    ///
    /// Fails only if the overrides file cannot be written, in which case
    /// every applied entry is rolled back.
    pub fn set_many<I>(&self, entries: I) -> MgmtResult<SetReport>
    where
        I: IntoIterator<Item = Record>,
    {
        let _writes = self.lock_writes();
        let mut report = SetReport::default();
        let mut undo = Vec::new();
        let mut config_changed = false;

        for Record { name, value } in entries {
            let outcome = match self.apply(&name, value) {
                Ok((def, previous)) => {
                    config_changed |= def.is_config();
                    undo.push((def.name, previous));
                    SetOutcome {
                        name,
                        action: def.update.action_needed(),
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::warn!(record = %name, error = %e, "Record set rejected");
                    SetOutcome {
                        name,
                        action: ActionNeeded::Undefined,
                        error: Some(e.to_string()),
                    }
                }
            };
            report.push(outcome);
        }

        if config_changed {
            if let Err(e) = self.persist() {
                self.restore(undo);
                tracing::error!(error = %e, "Batch set rolled back");
                return Err(e);
            }
        }

        for outcome in &report.entries {
            metrics::record_record_set(outcome.action.as_str());
        }
        tracing::info!(entries = report.entries.len(), action = %report.action, "Batch set applied");
        Ok(report)
    }

    pub fn get_int(&self, name: &str) -> MgmtResult<i64> {
        match self.get(name)? {
            RecordValue::Int(v) => Ok(v),
            other => Err(type_mismatch(name, "int", &other)),
        }
    }

    pub fn get_counter(&self, name: &str) -> MgmtResult<i64> {
        match self.get(name)? {
            RecordValue::Counter(v) => Ok(v),
            other => Err(type_mismatch(name, "counter", &other)),
        }
    }

    pub fn get_float(&self, name: &str) -> MgmtResult<f64> {
        match self.get(name)? {
            RecordValue::Float(v) => Ok(v),
            other => Err(type_mismatch(name, "float", &other)),
        }
    }

    pub fn get_string(&self, name: &str) -> MgmtResult<String> {
        match self.get(name)? {
            RecordValue::String(v) => Ok(v),
            other => Err(type_mismatch(name, "string", &other)),
        }
    }

    /// Reset every `proxy.process.*` and `proxy.node.*` record to its default.
    pub fn reset_stats(&self) -> usize {
        let mut reset = 0;
        for def in RECORDS.iter().filter(|def| def.is_stat()) {
            self.values.insert(def.name, def.default_value());
            reset += 1;
        }
        tracing::info!(records = reset, "Statistics reset");
        reset
    }

    /// Write settings that differ from their defaults to the overrides file.
    fn persist(&self) -> MgmtResult<()> {
        let Some(path) = &self.overrides_path else {
            return Ok(());
        };

        let records: BTreeMap<String, RecordValue> = RECORDS
            .iter()
            .filter(|def| def.is_config())
            .filter_map(|def| {
                let value = self.values.get(def.name)?.value().clone();
                (value != def.default_value()).then(|| (def.name.to_string(), value))
            })
            .collect();

        let write_failure = |reason: String| MgmtError::WriteFailure {
            path: path.clone(),
            reason,
        };
        let content = toml::to_string(&Overrides { records }).map_err(|e| write_failure(e.to_string()))?;

        let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&tmp, content)
            .and_then(|()| fs::rename(&tmp, path))
            .map_err(|e| {
                let _ = fs::remove_file(&tmp);
                write_failure(e.to_string())
            })?;
        tracing::debug!(path = %path.display(), "Persisted record overrides");
        Ok(())
    }
}

fn type_mismatch(name: &str, wanted: &str, found: &RecordValue) -> MgmtError {
    MgmtError::InvalidValue(format!(
        "{} is a {} record, not {}",
        name,
        found.record_type(),
        wanted
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, value: RecordValue) -> Record {
        Record::new(name, value)
    }

    #[test]
    fn test_get_many_keeps_order_and_reports_misses() {
        let store = RecordStore::new();
        store
            .set("proxy.config.proxy_name", RecordValue::String("foo".into()))
            .unwrap();

        let results = store.get_many(["proxy.config.proxy_name", "proxy.config.xxx", "proxy.config.bin_path"]);
        let names: Vec<_> = results.iter().map(RecordLookup::name).collect();
        assert_eq!(names, vec!["proxy.config.proxy_name", "proxy.config.xxx", "proxy.config.bin_path"]);
        assert_eq!(
            results.get(0).and_then(RecordLookup::value),
            Some(&RecordValue::String("foo".into()))
        );
        assert!(matches!(results.get(1), Some(RecordLookup::NotFound { .. })));
    }

    #[test]
    fn test_set_many_reports_max_action() {
        let store = RecordStore::new();
        let report = store
            .set_many(vec![
                entry("proxy.process.http.current_client_connections", RecordValue::Int(5)),
                entry("proxy.config.proxy_name", RecordValue::String("bar".into())),
                entry("proxy.config.cop.core_signal", RecordValue::Int(3)),
            ])
            .unwrap();
        assert_eq!(report.action, ActionNeeded::RestartRequired);
        let actions: Vec<_> = report.entries.iter().map(|o| o.action).collect();
        assert_eq!(
            actions,
            vec![ActionNeeded::None, ActionNeeded::RereadConfig, ActionNeeded::RestartRequired]
        );

        let report = store
            .set_many(vec![entry("proxy.node.cache_hit_ratio", RecordValue::Float(0.5))])
            .unwrap();
        assert_eq!(report.action, ActionNeeded::None);
    }

    #[test]
    fn test_invalid_entry_does_not_abort_batch() {
        let store = RecordStore::new();
        let report = store
            .set_many(vec![
                entry("proxy.config.cop.core_signal", RecordValue::Int(-4)),
                entry("proxy.config.xxx", RecordValue::Int(1)),
                entry("proxy.config.proxy_name", RecordValue::String("after".into())),
            ])
            .unwrap();
        assert_eq!(report.action, ActionNeeded::Undefined);
        assert_eq!(report.failures().count(), 2);
        assert_eq!(store.get_string("proxy.config.proxy_name").unwrap(), "after");
        assert_eq!(store.get_int("proxy.config.cop.core_signal").unwrap(), 0);
    }

    #[test]
    fn test_proxy_name_needs_no_restart() {
        let store = RecordStore::new();
        let action = store
            .set("proxy.config.proxy_name", RecordValue::String("bar".into()))
            .unwrap();
        assert!(action < ActionNeeded::RestartRequired);
    }

    #[test]
    fn test_typed_getters() {
        let store = RecordStore::new();
        assert_eq!(store.get_counter("proxy.process.socks.connections_successful").unwrap(), 0);
        assert_eq!(store.get_float("proxy.node.cache_hit_ratio").unwrap(), 0.0);
        assert!(matches!(
            store.get_int("proxy.config.proxy_name"),
            Err(MgmtError::InvalidValue(_))
        ));
        assert!(matches!(store.get_int("proxy.config.xxx"), Err(MgmtError::NotFound(_))));
    }

    #[test]
    fn test_get_matching_and_reset_stats() {
        let store = RecordStore::new();
        store
            .set("proxy.process.socks.connections_successful", RecordValue::Counter(10))
            .unwrap();
        store.set("proxy.node.proxy_running", RecordValue::Int(1)).unwrap();

        let socks = store.get_matching("proxy.process.socks.");
        assert_eq!(socks.len(), 2);
        assert_eq!(
            socks.get(0).map(|r| r.name.as_str()),
            Some("proxy.process.socks.connections_successful")
        );

        assert!(store.reset_stats() > 0);
        assert_eq!(store.get_counter("proxy.process.socks.connections_successful").unwrap(), 0);
        assert_eq!(store.get_int("proxy.node.proxy_running").unwrap(), 0);
    }

    #[test]
    fn test_overrides_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.toml");

        let store = RecordStore::open(&path).unwrap();
        store
            .set("proxy.config.proxy_name", RecordValue::String("edge-7".into()))
            .unwrap();
        store
            .set("proxy.process.http.current_client_connections", RecordValue::Int(9))
            .unwrap();

        let reopened = RecordStore::open(&path).unwrap();
        assert_eq!(reopened.get_string("proxy.config.proxy_name").unwrap(), "edge-7");
        assert_eq!(
            reopened.get_int("proxy.process.http.current_client_connections").unwrap(),
            0
        );
    }

    #[test]
    fn test_bad_override_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.toml");
        fs::write(
            &path,
            r#"
[records."proxy.config.cop.core_signal"]
type = "int"
value = 99

[records."proxy.config.bin_path"]
type = "string"
value = "/opt/proxy/bin"
"#,
        )
        .unwrap();

        let store = RecordStore::open(&path).unwrap();
        assert_eq!(store.get_int("proxy.config.cop.core_signal").unwrap(), 0);
        assert_eq!(store.get_string("proxy.config.bin_path").unwrap(), "/opt/proxy/bin");
    }

    #[test]
    fn test_failed_persist_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("missing").join("records.toml")).unwrap();

        let err = store
            .set("proxy.config.proxy_name", RecordValue::String("edge".into()))
            .unwrap_err();
        assert!(matches!(err, MgmtError::WriteFailure { .. }));
        assert_eq!(store.get_string("proxy.config.proxy_name").unwrap(), "proxy");

        let err = store
            .set_many([
                entry("proxy.process.socks.connections_successful", RecordValue::Counter(4)),
                entry("proxy.config.cop.core_signal", RecordValue::Int(3)),
                entry("proxy.config.cop.core_signal", RecordValue::Int(5)),
            ])
            .unwrap_err();
        assert!(matches!(err, MgmtError::WriteFailure { .. }));
        assert_eq!(store.get_int("proxy.config.cop.core_signal").unwrap(), 0);
        assert_eq!(
            store.get_counter("proxy.process.socks.connections_successful").unwrap(),
            0
        );
    }

    #[test]
    fn test_concurrent_sets_all_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.toml");
        let store = RecordStore::open(&path).unwrap();

        let updates = [
            ("proxy.config.proxy_name", RecordValue::String("edge".into())),
            ("proxy.config.env_prep", RecordValue::String("prep.sh".into())),
            ("proxy.config.cli_binary", RecordValue::String("ctl".into())),
            ("proxy.config.http.cache.http", RecordValue::Int(0)),
            ("proxy.config.log.logging_enabled", RecordValue::Int(1)),
            ("proxy.config.cop.core_signal", RecordValue::Int(6)),
        ];
        std::thread::scope(|scope| {
            for (name, value) in &updates {
                let store = store.clone();
                scope.spawn(move || store.set(name, value.clone()).unwrap());
            }
        });

        let reopened = RecordStore::open(&path).unwrap();
        for (name, value) in updates {
            assert_eq!(reopened.get(name).unwrap(), value, "{}", name);
        }
    }
}
