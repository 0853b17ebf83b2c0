//! `cache.config` rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::rules::codec::{Fields, LineWriter};
use crate::rules::predicate::PdSsFormat;

/// A duration written as `1d2h30m15s`; zero components are omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HmsTime {
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl HmsTime {
    pub fn new(days: u32, hours: u32, minutes: u32, seconds: u32) -> Self {
        Self {
            days,
            hours,
            minutes,
            seconds,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        u64::from(self.days) * 86_400
            + u64::from(self.hours) * 3_600
            + u64::from(self.minutes) * 60
            + u64::from(self.seconds)
    }
}

impl fmt::Display for HmsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total_seconds() == 0 {
            return f.write_str("0s");
        }
        for (value, unit) in [
            (self.days, 'd'),
            (self.hours, 'h'),
            (self.minutes, 'm'),
            (self.seconds, 's'),
        ] {
            if value > 0 {
                write!(f, "{}{}", value, unit)?;
            }
        }
        Ok(())
    }
}

impl FromStr for HmsTime {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseError::new(format!("invalid time period `{}`", s));
        let mut time = HmsTime::default();
        let mut digits = String::new();
        let mut seen = [false; 4];

        for c in s.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let slot = match c.to_ascii_lowercase() {
                'd' => 0,
                'h' => 1,
                'm' => 2,
                's' => 3,
                _ => return Err(bad()),
            };
            if digits.is_empty() || seen[slot] {
                return Err(bad());
            }
            let value: u32 = digits.parse().map_err(|_| bad())?;
            digits.clear();
            seen[slot] = true;
            match slot {
                0 => time.days = value,
                1 => time.hours = value,
                2 => time.minutes = value,
                _ => time.seconds = value,
            }
        }

        if !digits.is_empty() || !seen.iter().any(|s| *s) {
            return Err(bad());
        }
        Ok(time)
    }
}

/// What the cache does with matching objects. Time-bearing actions carry their period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "period", rename_all = "kebab-case")]
pub enum CacheAction {
    NeverCache,
    IgnoreNoCache,
    IgnoreClientNoCache,
    IgnoreServerNoCache,
    PinInCache(HmsTime),
    Revalidate(HmsTime),
    TtlInCache(HmsTime),
}

const TIMED_KEYS: [&str; 3] = ["pin-in-cache", "revalidate", "ttl-in-cache"];

impl CacheAction {
    pub fn time_period(&self) -> Option<HmsTime> {
        match self {
            CacheAction::PinInCache(t) | CacheAction::Revalidate(t) | CacheAction::TtlInCache(t) => {
                Some(*t)
            }
            _ => None,
        }
    }

    fn take_from(fields: &mut Fields) -> Result<Self, ParseError> {
        let present = std::iter::once("action")
            .chain(TIMED_KEYS)
            .filter(|k| fields.contains(k))
            .count();
        if present != 1 {
            return Err(ParseError::new(
                "cache rule needs exactly one of action, pin-in-cache, revalidate, ttl-in-cache",
            ));
        }

        if let Some(action) = fields.take("action") {
            return match action.to_ascii_lowercase().as_str() {
                "never-cache" => Ok(CacheAction::NeverCache),
                "ignore-no-cache" => Ok(CacheAction::IgnoreNoCache),
                "ignore-client-no-cache" => Ok(CacheAction::IgnoreClientNoCache),
                "ignore-server-no-cache" => Ok(CacheAction::IgnoreServerNoCache),
                other => Err(ParseError::new(format!("unknown cache action `{}`", other))),
            };
        }
        if let Some(t) = fields.take_parsed("pin-in-cache")? {
            return Ok(CacheAction::PinInCache(t));
        }
        if let Some(t) = fields.take_parsed("revalidate")? {
            return Ok(CacheAction::Revalidate(t));
        }
        let t = fields
            .take_parsed("ttl-in-cache")?
            .ok_or_else(|| ParseError::new("missing cache action"))?;
        Ok(CacheAction::TtlInCache(t))
    }

    fn write_to(&self, w: &mut LineWriter) {
        match self {
            CacheAction::NeverCache => w.kv("action", "never-cache"),
            CacheAction::IgnoreNoCache => w.kv("action", "ignore-no-cache"),
            CacheAction::IgnoreClientNoCache => w.kv("action", "ignore-client-no-cache"),
            CacheAction::IgnoreServerNoCache => w.kv("action", "ignore-server-no-cache"),
            CacheAction::PinInCache(t) => w.kv("pin-in-cache", t),
            CacheAction::Revalidate(t) => w.kv("revalidate", t),
            CacheAction::TtlInCache(t) => w.kv("ttl-in-cache", t),
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRule {
    pub pdss: PdSsFormat,
    pub action: CacheAction,
}

impl fmt::Display for CacheRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut w = LineWriter::new();
        self.pdss.write_to(&mut w);
        self.action.write_to(&mut w);
        f.write_str(&w.finish())
    }
}

impl FromStr for CacheRule {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::parse_line(line)?;
        let pdss = PdSsFormat::take_from(&mut fields)?;
        let action = CacheAction::take_from(&mut fields)?;
        fields.finish()?;
        Ok(Self { pdss, action })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::predicate::Predicate;

    #[test]
    fn test_hms_time() {
        let t: HmsTime = "1d2h30m".parse().unwrap();
        assert_eq!(t, HmsTime::new(1, 2, 30, 0));
        assert_eq!(t.to_string(), "1d2h30m");
        assert_eq!(HmsTime::default().to_string(), "0s");
        assert_eq!("90m".parse::<HmsTime>().unwrap().total_seconds(), 5_400);

        for bad in ["", "5", "h", "1x", "1h2h"] {
            assert!(bad.parse::<HmsTime>().is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_parse_actions() {
        let rule: CacheRule = "dest_domain=example.com action=never-cache".parse().unwrap();
        assert_eq!(rule.pdss.predicate, Predicate::Domain("example.com".into()));
        assert_eq!(rule.action, CacheAction::NeverCache);
        assert_eq!(rule.action.time_period(), None);

        let rule: CacheRule = "url_regex=.*\\.gif revalidate=2h".parse().unwrap();
        assert_eq!(rule.action, CacheAction::Revalidate(HmsTime::new(0, 2, 0, 0)));
    }

    #[test]
    fn test_time_required_only_for_timed_actions() {
        assert!("dest_domain=a.com pin-in-cache=".parse::<CacheRule>().is_err());
        assert!("dest_domain=a.com".parse::<CacheRule>().is_err());
        assert!("dest_domain=a.com action=never-cache revalidate=1h"
            .parse::<CacheRule>()
            .is_err());
        assert!("dest_domain=a.com action=pin-in-cache".parse::<CacheRule>().is_err());
    }
}
