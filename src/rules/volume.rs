//! `volume.config` rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::rules::codec::{Fields, LineWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeScheme {
    Http,
    Mixt,
}

impl VolumeScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeScheme::Http => "http",
            VolumeScheme::Mixt => "mixt",
        }
    }
}

impl FromStr for VolumeScheme {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(VolumeScheme::Http),
            "mixt" => Ok(VolumeScheme::Mixt),
            _ => Err(ParseError::new(format!("unknown volume scheme `{}`", s))),
        }
    }
}

/// Volume size: absolute megabytes or a percentage of total storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", content = "value", rename_all = "lowercase")]
pub enum VolumeSize {
    Absolute(u64),
    Percent(u8),
}

impl fmt::Display for VolumeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeSize::Absolute(mb) => write!(f, "{}", mb),
            VolumeSize::Percent(pct) => write!(f, "{}%", pct),
        }
    }
}

impl FromStr for VolumeSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseError::new(format!("invalid volume size `{}`", s));
        match s.strip_suffix('%') {
            Some(pct) => {
                let pct: u8 = pct.trim().parse().map_err(|_| bad())?;
                if pct > 100 {
                    return Err(bad());
                }
                Ok(VolumeSize::Percent(pct))
            }
            None => Ok(VolumeSize::Absolute(s.trim().parse().map_err(|_| bad())?)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRule {
    /// 1..=255
    pub volume_num: u8,
    pub scheme: VolumeScheme,
    pub size: VolumeSize,
}

impl fmt::Display for VolumeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = LineWriter::new()
            .kv("volume", self.volume_num)
            .kv("scheme", self.scheme.as_str())
            .kv("size", self.size)
            .finish();
        f.write_str(&line)
    }
}

impl FromStr for VolumeRule {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::parse_line(line)?;
        let raw_num = fields.require("volume")?;
        let volume_num = raw_num
            .parse::<u8>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ParseError::new(format!("volume number `{}` not in 1..=255", raw_num)))?;
        let scheme = fields
            .take_parsed("scheme")?
            .ok_or_else(|| ParseError::new("missing `scheme`"))?;
        let size = fields
            .take_parsed("size")?
            .ok_or_else(|| ParseError::new("missing `size`"))?;
        fields.finish()?;
        Ok(Self {
            volume_num,
            scheme,
            size,
        })
    }
}
