//! Batch record access.
//!
//! # Responsibilities
//! - Typed key/value records under `proxy.config.`, `proxy.process.`, `proxy.node.`
//! - Batched get (per-key misses inline) and set (max action needed)
//! - Persist changed `proxy.config.*` settings to an overrides file
//!
//! # Data Flow
//! ```text
//! set_many(entries) ──▶ registry lookup ──▶ type + value check ──▶ DashMap
//!        │                                                          │
//!        └── SetReport { action = max(entry actions) } ◀────────────┘
//! ```
//!
//! # Design Decisions
//! - Every record name has one fixed type from a static registry
//! - An invalid entry reports `Undefined` and does not abort the batch
//! - `Undefined` ranks above every other action so failures are never masked

pub mod registry;
pub mod store;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::container::MgmtList;
use crate::error::{MgmtError, MgmtResult};

pub use registry::{RecordCheck, RecordDef, UpdateType, RECORDS};
pub use store::RecordStore;

/// Value type of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Int,
    Counter,
    Float,
    String,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Int => "int",
            RecordType::Counter => "counter",
            RecordType::Float => "float",
            RecordType::String => "string",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = MgmtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(RecordType::Int),
            "counter" => Ok(RecordType::Counter),
            "float" => Ok(RecordType::Float),
            "string" | "str" => Ok(RecordType::String),
            _ => Err(MgmtError::InvalidValue(format!("unknown record type `{}`", s))),
        }
    }
}

/// A typed record value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RecordValue {
    Int(i64),
    Counter(i64),
    Float(f64),
    String(String),
}

impl RecordValue {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordValue::Int(_) => RecordType::Int,
            RecordValue::Counter(_) => RecordType::Counter,
            RecordValue::Float(_) => RecordType::Float,
            RecordValue::String(_) => RecordType::String,
        }
    }

    /// Parse `text` as a value of type `rtype`.
    pub fn parse_as(rtype: RecordType, text: &str) -> MgmtResult<Self> {
        let bad = || MgmtError::InvalidValue(format!("`{}` is not a valid {} value", text, rtype));
        match rtype {
            RecordType::Int => text.trim().parse().map(RecordValue::Int).map_err(|_| bad()),
            RecordType::Counter => text.trim().parse().map(RecordValue::Counter).map_err(|_| bad()),
            RecordType::Float => text.trim().parse().map(RecordValue::Float).map_err(|_| bad()),
            RecordType::String => Ok(RecordValue::String(text.to_string())),
        }
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::Int(v) | RecordValue::Counter(v) => write!(f, "{}", v),
            RecordValue::Float(v) => write!(f, "{}", v),
            RecordValue::String(v) => f.write_str(v),
        }
    }
}

/// What an operator must do for a record change to take effect.
///
/// Ordered by severity; a batch reports its maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionNeeded {
    #[default]
    None,
    RereadConfig,
    RestartRequired,
    RestartAcrossCluster,
    /// The entry was rejected.
    Undefined,
}

impl ActionNeeded {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionNeeded::None => "none",
            ActionNeeded::RereadConfig => "reread_config",
            ActionNeeded::RestartRequired => "restart_required",
            ActionNeeded::RestartAcrossCluster => "restart_across_cluster",
            ActionNeeded::Undefined => "undefined",
        }
    }
}

impl fmt::Display for ActionNeeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named record value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub value: RecordValue,
}

impl Record {
    pub fn new(name: impl Into<String>, value: RecordValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One element of a batched get.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordLookup {
    Found(Record),
    NotFound { name: String },
}

impl RecordLookup {
    pub fn name(&self) -> &str {
        match self {
            RecordLookup::Found(record) => &record.name,
            RecordLookup::NotFound { name } => name,
        }
    }

    pub fn value(&self) -> Option<&RecordValue> {
        match self {
            RecordLookup::Found(record) => Some(&record.value),
            RecordLookup::NotFound { .. } => None,
        }
    }
}

/// Outcome of one entry of a batched set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOutcome {
    pub name: String,
    pub action: ActionNeeded,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a batched set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReport {
    /// Highest action needed across all entries.
    pub action: ActionNeeded,
    pub entries: MgmtList<SetOutcome>,
}

impl SetReport {
    pub fn push(&mut self, outcome: SetOutcome) {
        self.action = self.action.max(outcome.action);
        self.entries.enqueue(outcome);
    }

    /// Entries that were rejected.
    pub fn failures(&self) -> impl Iterator<Item = &SetOutcome> {
        self.entries.iter().filter(|o| o.error.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_ordering() {
        assert!(ActionNeeded::None < ActionNeeded::RereadConfig);
        assert!(ActionNeeded::RereadConfig < ActionNeeded::RestartRequired);
        assert!(ActionNeeded::RestartRequired < ActionNeeded::RestartAcrossCluster);
        assert!(ActionNeeded::RestartAcrossCluster < ActionNeeded::Undefined);
    }

    #[test]
    fn test_report_takes_max() {
        let mut report = SetReport::default();
        for action in [ActionNeeded::None, ActionNeeded::RestartRequired, ActionNeeded::RereadConfig] {
            report.push(SetOutcome {
                name: "x".into(),
                action,
                error: None,
            });
        }
        assert_eq!(report.action, ActionNeeded::RestartRequired);
        assert_eq!(report.entries.len(), 3);
        assert_eq!(report.failures().count(), 0);
    }

    #[test]
    fn test_value_serde_shape() {
        let json = serde_json::to_value(RecordValue::String("foo".into())).unwrap();
        assert_eq!(json, serde_json::json!({"type": "string", "value": "foo"}));

        let lookup: RecordLookup =
            serde_json::from_value(serde_json::json!({"status": "not_found", "name": "proxy.config.xxx"}))
                .unwrap();
        assert_eq!(lookup.name(), "proxy.config.xxx");
        assert!(lookup.value().is_none());
    }

    #[test]
    fn test_parse_as() {
        assert_eq!(RecordValue::parse_as(RecordType::Int, " 42").unwrap(), RecordValue::Int(42));
        assert_eq!(
            RecordValue::parse_as(RecordType::Float, "0.5").unwrap(),
            RecordValue::Float(0.5)
        );
        assert!(RecordValue::parse_as(RecordType::Counter, "ten").is_err());
        assert_eq!("integer".parse::<RecordType>().unwrap(), RecordType::Int);
    }
}
