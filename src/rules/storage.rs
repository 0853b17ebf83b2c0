//! `storage.config` rules: raw cache storage locations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::rules::codec::{tokenize, LineWriter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRule {
    pub pathname: String,
    /// Size in bytes; absent for raw devices that are used whole.
    pub size: Option<u64>,
}

/// Parse `512`, `64K`, `128M`, `2G` or `1T` into bytes.
fn parse_size(s: &str) -> Result<u64, ParseError> {
    let bad = || ParseError::new(format!("invalid storage size `{}`", s));
    let (digits, multiplier) = match s.chars().last().map(|c| c.to_ascii_uppercase()) {
        Some('K') => (&s[..s.len() - 1], 1u64 << 10),
        Some('M') => (&s[..s.len() - 1], 1 << 20),
        Some('G') => (&s[..s.len() - 1], 1 << 30),
        Some('T') => (&s[..s.len() - 1], 1 << 40),
        _ => (s, 1),
    };
    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(bad)
}

impl fmt::Display for StorageRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut w = LineWriter::new();
        w.token(&self.pathname);
        if let Some(size) = self.size {
            w.token(size);
        }
        f.write_str(&w.finish())
    }
}

impl FromStr for StorageRule {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(line)?;
        match tokens.as_slice() {
            [pathname] if !pathname.is_empty() => Ok(Self {
                pathname: pathname.clone(),
                size: None,
            }),
            [pathname, size] if !pathname.is_empty() => Ok(Self {
                pathname: pathname.clone(),
                size: Some(parse_size(size)?),
            }),
            _ => Err(ParseError::new("storage rule needs `<pathname> [size]`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_storage() {
        let rule: StorageRule = "/var/cache/proxy 128M".parse().unwrap();
        assert_eq!(rule.size, Some(128 * 1024 * 1024));
        assert_eq!(rule.to_string(), "/var/cache/proxy 134217728");

        let rule: StorageRule = "/dev/sdb".parse().unwrap();
        assert_eq!(rule.size, None);
    }

    #[test]
    fn test_rejects_bad_size() {
        assert!("/var/cache 12Q".parse::<StorageRule>().is_err());
        assert!("/var/cache 1 2".parse::<StorageRule>().is_err());
        assert!("/var/cache 99999999999T".parse::<StorageRule>().is_err());
    }
}
