//! `parent.config` rules: parent proxy chains.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::container::{Domain, DomainList};
use crate::error::ParseError;
use crate::rules::codec::{join, parse_bool, split_list, Fields, LineWriter};
use crate::rules::predicate::PdSsFormat;

/// Selection discipline among several downstream targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundRobin {
    True,
    Strict,
    False,
}

impl RoundRobin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundRobin::True => "true",
            RoundRobin::Strict => "strict",
            RoundRobin::False => "false",
        }
    }
}

impl fmt::Display for RoundRobin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundRobin {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "true" => Ok(RoundRobin::True),
            "strict" => Ok(RoundRobin::Strict),
            "false" => Ok(RoundRobin::False),
            _ => Err(ParseError::new(format!("unknown round_robin policy `{}`", s))),
        }
    }
}

/// Parse a `host:port;host:port` list.
pub(crate) fn parse_domain_list(value: &str) -> Result<DomainList, ParseError> {
    Ok(split_list::<Domain>(value, &[';', ','])?.into())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentProxyRule {
    pub pdss: PdSsFormat,
    pub round_robin: Option<RoundRobin>,
    pub proxies: DomainList,
    /// Go to the origin directly when every parent is down.
    pub direct: bool,
}

impl fmt::Display for ParentProxyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut w = LineWriter::new();
        self.pdss.write_to(&mut w);
        w.kv_opt("round_robin", self.round_robin);
        if !self.proxies.is_empty() {
            w.kv_quoted("parent", join(&self.proxies, ";"));
        }
        if self.direct {
            w.kv("go_direct", "true");
        }
        f.write_str(&w.finish())
    }
}

impl FromStr for ParentProxyRule {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::parse_line(line)?;
        let pdss = PdSsFormat::take_from(&mut fields)?;
        let round_robin = fields.take_parsed("round_robin")?;
        let proxies = match fields.take("parent") {
            Some(value) => parse_domain_list(&value)?,
            None => DomainList::new(),
        };
        let direct = match fields.take("go_direct") {
            Some(value) => parse_bool("go_direct", &value)?,
            None => false,
        };
        fields.finish()?;

        if proxies.is_empty() && !direct {
            return Err(ParseError::new("parent rule needs a parent list or go_direct=true"));
        }
        Ok(Self {
            pdss,
            round_robin,
            proxies,
            direct,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_parent_chain() {
        let rule: ParentProxyRule =
            r#"dest_domain=. parent="p1.x.com:8080; p2.x.com:8080" round_robin=strict go_direct=false"#
                .parse()
                .unwrap();
        assert_eq!(rule.round_robin, Some(RoundRobin::Strict));
        assert_eq!(rule.proxies.len(), 2);
        assert_eq!(rule.proxies.get(1), Some(&Domain::new("p2.x.com", Some(8080))));
        assert!(!rule.direct);
        assert_eq!(
            rule.to_string(),
            r#"dest_domain=. round_robin=strict parent="p1.x.com:8080;p2.x.com:8080""#
        );
    }

    #[test]
    fn test_direct_only() {
        let rule: ParentProxyRule = "dest_host=intranet go_direct=true".parse().unwrap();
        assert!(rule.direct);
        assert!(rule.proxies.is_empty());
        assert!("dest_host=intranet".parse::<ParentProxyRule>().is_err());
    }
}
