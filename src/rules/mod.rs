//! Rule variant model.
//!
//! # Data Flow
//! ```text
//! persisted line ──▶ Rule::parse(line, kind) ──▶ Rule::<Kind>(..)
//!                                                     │
//! persisted line ◀── Rule::serialize() ◀──────────────┘
//! ```
//!
//! # Design Decisions
//! - One closed enum variant per configuration file kind; dispatch is an
//!   exhaustive `match`, so a new kind cannot be silently unhandled
//! - Each kind owns its line codec (`Display` + `FromStr`)
//! - `parse(serialize(v), kind) == v` for every valid rule

pub mod cache;
pub mod codec;
pub mod hosting;
pub mod ip_allow;
pub mod parent;
pub mod plugin;
pub mod predicate;
pub mod remap;
pub mod socks;
pub mod split_dns;
pub mod storage;
pub mod volume;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

pub use cache::{CacheAction, CacheRule, HmsTime};
pub use hosting::HostingRule;
pub use ip_allow::{IpAllowAction, IpAllowRule};
pub use parent::{ParentProxyRule, RoundRobin};
pub use plugin::PluginRule;
pub use predicate::{Method, PdSsFormat, Predicate, SecondarySpec, TimeRange, UrlScheme};
pub use remap::{RemapEndpoint, RemapRule, RemapType};
pub use socks::SocksRule;
pub use split_dns::SplitDnsRule;
pub use storage::StorageRule;
pub use volume::{VolumeRule, VolumeScheme, VolumeSize};

/// The configuration files managed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Cache,
    Hosting,
    IpAllow,
    ParentProxy,
    Volume,
    Plugin,
    Remap,
    Socks,
    SplitDns,
    Storage,
}

impl FileKind {
    pub const ALL: [FileKind; 10] = [
        FileKind::Cache,
        FileKind::Hosting,
        FileKind::IpAllow,
        FileKind::ParentProxy,
        FileKind::Volume,
        FileKind::Plugin,
        FileKind::Remap,
        FileKind::Socks,
        FileKind::SplitDns,
        FileKind::Storage,
    ];

    /// Name of the file in the configuration directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            FileKind::Cache => "cache.config",
            FileKind::Hosting => "hosting.config",
            FileKind::IpAllow => "ip_allow.config",
            FileKind::ParentProxy => "parent.config",
            FileKind::Volume => "volume.config",
            FileKind::Plugin => "plugin.config",
            FileKind::Remap => "remap.config",
            FileKind::Socks => "socks.config",
            FileKind::SplitDns => "splitdns.config",
            FileKind::Storage => "storage.config",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

impl FromStr for FileKind {
    type Err = ParseError;

    /// Accepts the file name (`parent.config`) or its stem (`parent`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stem = s.strip_suffix(".config").unwrap_or(s);
        FileKind::ALL
            .into_iter()
            .find(|k| k.file_name().strip_suffix(".config") == Some(stem))
            .ok_or_else(|| ParseError::new(format!("unknown configuration file `{}`", s)))
    }
}

/// One rule of one configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Cache(CacheRule),
    Hosting(HostingRule),
    IpAllow(IpAllowRule),
    ParentProxy(ParentProxyRule),
    Volume(VolumeRule),
    Plugin(PluginRule),
    Remap(RemapRule),
    Socks(SocksRule),
    SplitDns(SplitDnsRule),
    Storage(StorageRule),
}

impl Rule {
    /// The file kind this rule belongs to.
    pub fn kind(&self) -> FileKind {
        match self {
            Rule::Cache(_) => FileKind::Cache,
            Rule::Hosting(_) => FileKind::Hosting,
            Rule::IpAllow(_) => FileKind::IpAllow,
            Rule::ParentProxy(_) => FileKind::ParentProxy,
            Rule::Volume(_) => FileKind::Volume,
            Rule::Plugin(_) => FileKind::Plugin,
            Rule::Remap(_) => FileKind::Remap,
            Rule::Socks(_) => FileKind::Socks,
            Rule::SplitDns(_) => FileKind::SplitDns,
            Rule::Storage(_) => FileKind::Storage,
        }
    }

    /// Render the rule as one configuration line.
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// Parse one configuration line of the given kind.
    pub fn parse(line: &str, kind: FileKind) -> Result<Rule, ParseError> {
        let line = line.trim();
        Ok(match kind {
            FileKind::Cache => Rule::Cache(line.parse()?),
            FileKind::Hosting => Rule::Hosting(line.parse()?),
            FileKind::IpAllow => Rule::IpAllow(line.parse()?),
            FileKind::ParentProxy => Rule::ParentProxy(line.parse()?),
            FileKind::Volume => Rule::Volume(line.parse()?),
            FileKind::Plugin => Rule::Plugin(line.parse()?),
            FileKind::Remap => Rule::Remap(line.parse()?),
            FileKind::Socks => Rule::Socks(line.parse()?),
            FileKind::SplitDns => Rule::SplitDns(line.parse()?),
            FileKind::Storage => Rule::Storage(line.parse()?),
        })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Cache(r) => r.fmt(f),
            Rule::Hosting(r) => r.fmt(f),
            Rule::IpAllow(r) => r.fmt(f),
            Rule::ParentProxy(r) => r.fmt(f),
            Rule::Volume(r) => r.fmt(f),
            Rule::Plugin(r) => r.fmt(f),
            Rule::Remap(r) => r.fmt(f),
            Rule::Socks(r) => r.fmt(f),
            Rule::SplitDns(r) => r.fmt(f),
            Rule::Storage(r) => r.fmt(f),
        }
    }
}

macro_rules! impl_into_rule {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Rule {
                fn from(rule: $ty) -> Self {
                    Rule::$variant(rule)
                }
            }
        )*
    };
}

impl_into_rule!(
    CacheRule => Cache,
    HostingRule => Hosting,
    IpAllowRule => IpAllow,
    ParentProxyRule => ParentProxy,
    VolumeRule => Volume,
    PluginRule => Plugin,
    RemapRule => Remap,
    SocksRule => Socks,
    SplitDnsRule => SplitDns,
    StorageRule => Storage,
);
