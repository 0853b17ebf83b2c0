//! `hosting.config` rules: pin a destination to cache volumes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::container::IntList;
use crate::error::ParseError;
use crate::rules::codec::{join, Fields, LineWriter};
use crate::rules::predicate::PdSsFormat;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostingRule {
    pub pdss: PdSsFormat,
    /// Volume numbers in preference order. Never empty.
    pub volumes: IntList,
}

fn parse_volumes(value: &str) -> Result<IntList, ParseError> {
    let volumes = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| ParseError::new(format!("invalid volume number `{}`", s)))
        })
        .collect::<Result<IntList, _>>()?;
    if volumes.is_empty() {
        return Err(ParseError::new("hosting rule needs at least one volume"));
    }
    Ok(volumes)
}

impl fmt::Display for HostingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut w = LineWriter::new();
        self.pdss.write_to(&mut w);
        w.kv("volume", join(&self.volumes, ","));
        f.write_str(&w.finish())
    }
}

impl FromStr for HostingRule {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::parse_line(line)?;
        let pdss = PdSsFormat::take_from(&mut fields)?;
        let volumes = parse_volumes(&fields.require("volume")?)?;
        fields.finish()?;
        Ok(Self { pdss, volumes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_volumes() {
        let rule: HostingRule = "dest_domain=example.com volume=1,3, 4".parse().unwrap();
        assert_eq!(rule.volumes.iter().copied().collect::<Vec<_>>(), vec![1, 3, 4]);
        assert_eq!(rule.to_string(), "dest_domain=example.com volume=1,3,4");
    }

    #[test]
    fn test_rejects_empty_or_bad_volumes() {
        assert!("dest_host=a volume=".parse::<HostingRule>().is_err());
        assert!("dest_host=a volume=0".parse::<HostingRule>().is_err());
        assert!("dest_host=a".parse::<HostingRule>().is_err());
    }
}
