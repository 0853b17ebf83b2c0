//! Static definitions of every known record.

use crate::error::{MgmtError, MgmtResult};
use crate::records::RecordType::{self, Counter, Float, Int, String as Str};
use crate::records::{ActionNeeded, RecordValue};

use self::DefaultValue::{Int as DInt, Str as DStr};
use self::UpdateType::{ClusterRestart, Reread, Restart};

/// How a running proxy picks up a changed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateType {
    /// Applied immediately.
    Dynamic,
    /// Applied on the next configuration reread.
    Reread,
    /// Needs a process restart.
    Restart,
    /// Needs every node of the cluster restarted.
    ClusterRestart,
}

impl UpdateType {
    pub fn action_needed(&self) -> ActionNeeded {
        match self {
            UpdateType::Dynamic => ActionNeeded::None,
            UpdateType::Reread => ActionNeeded::RereadConfig,
            UpdateType::Restart => ActionNeeded::RestartRequired,
            UpdateType::ClusterRestart => ActionNeeded::RestartAcrossCluster,
        }
    }
}

/// Domain check applied to a new value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordCheck {
    Any,
    IntRange(i64, i64),
    NonEmpty,
}

/// Default value of a record, in a `const`-friendly form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Int(i64),
    Float(f64),
    Str(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct RecordDef {
    pub name: &'static str,
    pub rtype: RecordType,
    pub default: DefaultValue,
    pub update: UpdateType,
    pub check: RecordCheck,
}

impl RecordDef {
    pub fn default_value(&self) -> RecordValue {
        match (self.rtype, self.default) {
            (RecordType::Counter, DefaultValue::Int(v)) => RecordValue::Counter(v),
            (_, DefaultValue::Int(v)) => RecordValue::Int(v),
            (_, DefaultValue::Float(v)) => RecordValue::Float(v),
            (_, DefaultValue::Str(v)) => RecordValue::String(v.to_string()),
        }
    }

    /// Settings, as opposed to live statistics.
    pub fn is_config(&self) -> bool {
        self.name.starts_with("proxy.config.")
    }

    pub fn is_stat(&self) -> bool {
        self.name.starts_with("proxy.process.") || self.name.starts_with("proxy.node.")
    }

    /// Coerce `value` to this record's type and check its domain.
    ///
    /// Integers are accepted for counters and counters for integers.
    pub fn validate(&self, value: RecordValue) -> MgmtResult<RecordValue> {
        let invalid = |reason: String| Err(MgmtError::InvalidValue(format!("{}: {}", self.name, reason)));

        let value = match (self.rtype, value) {
            (RecordType::Int, RecordValue::Int(v) | RecordValue::Counter(v)) => RecordValue::Int(v),
            (RecordType::Counter, RecordValue::Int(v) | RecordValue::Counter(v)) => RecordValue::Counter(v),
            (RecordType::Float, RecordValue::Float(v)) if v.is_finite() => RecordValue::Float(v),
            (RecordType::Float, RecordValue::Float(v)) => return invalid(format!("{} is not finite", v)),
            (RecordType::String, RecordValue::String(v)) => RecordValue::String(v),
            (expected, other) => {
                return invalid(format!(
                    "expected {} value, found {}",
                    expected,
                    other.record_type()
                ))
            }
        };

        let out_of_domain = match (self.check, &value) {
            (RecordCheck::IntRange(lo, hi), RecordValue::Int(v) | RecordValue::Counter(v))
                if *v < lo || *v > hi =>
            {
                Some(format!("{} is outside {}..={}", v, lo, hi))
            }
            (RecordCheck::NonEmpty, RecordValue::String(s)) if s.trim().is_empty() => {
                Some("must not be empty".to_string())
            }
            _ => None,
        };

        match out_of_domain {
            Some(reason) => invalid(reason),
            None => Ok(value),
        }
    }
}

const fn config(
    name: &'static str,
    rtype: RecordType,
    default: DefaultValue,
    update: UpdateType,
    check: RecordCheck,
) -> RecordDef {
    RecordDef {
        name,
        rtype,
        default,
        update,
        check,
    }
}

const fn stat(name: &'static str, rtype: RecordType) -> RecordDef {
    let default = match rtype {
        RecordType::Float => DefaultValue::Float(0.0),
        RecordType::String => DefaultValue::Str(""),
        _ => DefaultValue::Int(0),
    };
    RecordDef {
        name,
        rtype,
        default,
        update: UpdateType::Dynamic,
        check: RecordCheck::Any,
    }
}

pub static RECORDS: &[RecordDef] = &[
    // Settings
    config("proxy.config.proxy_name", Str, DStr("proxy"), Reread, RecordCheck::NonEmpty),
    config("proxy.config.bin_path", Str, DStr("bin"), Restart, RecordCheck::NonEmpty),
    config("proxy.config.manager_binary", Str, DStr("traffic_manager"), Restart, RecordCheck::NonEmpty),
    config("proxy.config.cli_binary", Str, DStr("traffic_line"), Reread, RecordCheck::NonEmpty),
    config("proxy.config.env_prep", Str, DStr(""), Restart, RecordCheck::Any),
    config("proxy.config.cop.core_signal", Int, DInt(0), Restart, RecordCheck::IntRange(0, 31)),
    config("proxy.config.http.server_ports", Str, DStr("8080"), Restart, RecordCheck::NonEmpty),
    config("proxy.config.http.cache.http", Int, DInt(1), Reread, RecordCheck::IntRange(0, 1)),
    config("proxy.config.http.cache.vary_default_other", Str, DStr(""), Reread, RecordCheck::Any),
    config("proxy.config.cache.ram_cache.size", Int, DInt(-1), Restart, RecordCheck::IntRange(-1, i64::MAX)),
    config("proxy.config.log.logging_enabled", Int, DInt(3), Reread, RecordCheck::IntRange(0, 3)),
    config("proxy.config.cluster.ethernet_interface", Str, DStr("eth0"), ClusterRestart, RecordCheck::NonEmpty),
    config("proxy.config.cluster.cluster_port", Int, DInt(8086), ClusterRestart, RecordCheck::IntRange(1, 65535)),
    // Per-process statistics
    stat("proxy.process.socks.connections_successful", Counter),
    stat("proxy.process.socks.connections_unsuccessful", Counter),
    stat("proxy.process.http.current_client_connections", Int),
    stat("proxy.process.http.current_client_transactions", Int),
    stat("proxy.process.http.current_server_connections", Int),
    stat("proxy.process.http.current_server_transactions", Int),
    stat("proxy.process.http.user_agent_response_document_total_size", Counter),
    stat("proxy.process.http.user_agent_response_header_total_size", Counter),
    stat("proxy.process.http.origin_server_response_document_total_size", Counter),
    stat("proxy.process.http.origin_server_response_header_total_size", Counter),
    // Node statistics
    stat("proxy.node.proxy_running", Int),
    stat("proxy.node.current_client_connections", Int),
    stat("proxy.node.current_cache_connections", Int),
    stat("proxy.node.bandwidth_hit_ratio", Float),
    stat("proxy.node.bandwidth_hit_ratio_avg_10s", Float),
    stat("proxy.node.cache_hit_ratio", Float),
    stat("proxy.node.cache_hit_mem_ratio", Float),
    stat("proxy.node.cache.percent_free", Float),
    stat("proxy.node.hostdb.hit_ratio", Float),
    stat("proxy.node.client_throughput_out", Float),
    stat("proxy.node.http.cache_hit_fresh_avg_10s", Float),
    stat("proxy.node.http.cache_hit_mem_fresh_avg_10s", Float),
    stat("proxy.node.http.cache_hit_revalidated_avg_10s", Float),
    stat("proxy.node.http.cache_hit_ims_avg_10s", Float),
];

pub fn lookup(name: &str) -> Option<&'static RecordDef> {
    RECORDS.iter().find(|def| def.name == name)
}
