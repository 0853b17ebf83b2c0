//! `ip_allow.config` rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::container::IpAddrEle;
use crate::error::ParseError;
use crate::rules::codec::{Fields, LineWriter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpAllowAction {
    #[default]
    Allow,
    Deny,
}

impl IpAllowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpAllowAction::Allow => "ip_allow",
            IpAllowAction::Deny => "ip_deny",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAllowRule {
    pub src_ip: IpAddrEle,
    pub action: IpAllowAction,
}

impl fmt::Display for IpAllowRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = LineWriter::new()
            .kv("src_ip", &self.src_ip)
            .kv("action", self.action.as_str())
            .finish();
        f.write_str(&line)
    }
}

impl FromStr for IpAllowRule {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::parse_line(line)?;
        let src_ip = fields
            .take_parsed("src_ip")?
            .ok_or_else(|| ParseError::new("missing `src_ip`"))?;
        let action = match fields.take("action").as_deref() {
            None | Some("ip_allow") => IpAllowAction::Allow,
            Some("ip_deny") => IpAllowAction::Deny,
            Some(other) => {
                return Err(ParseError::new(format!("unknown ip_allow action `{}`", other)))
            }
        };
        fields.finish()?;
        Ok(Self { src_ip, action })
    }
}
