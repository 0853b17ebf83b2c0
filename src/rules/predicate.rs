//! Destination predicate and secondary specifiers.
//!
//! Every predicate-bearing rule starts with exactly one of `dest_domain`,
//! `dest_host`, `dest_ip`, `url_regex` or `url`, followed by optional
//! secondary specifiers in a fixed order. An absent specifier means
//! "no constraint".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::container::{IpAddrEle, PortEle};
use crate::error::ParseError;
use crate::rules::codec::{Fields, LineWriter};

/// Primary match condition of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    Domain(String),
    Host(String),
    Ip(IpAddrEle),
    UrlRegex(String),
    Url(String),
}

const PREDICATE_KEYS: [&str; 5] = ["dest_domain", "dest_host", "dest_ip", "url_regex", "url"];

impl Predicate {
    pub fn key(&self) -> &'static str {
        match self {
            Predicate::Domain(_) => "dest_domain",
            Predicate::Host(_) => "dest_host",
            Predicate::Ip(_) => "dest_ip",
            Predicate::UrlRegex(_) => "url_regex",
            Predicate::Url(_) => "url",
        }
    }

    pub fn value(&self) -> String {
        match self {
            Predicate::Domain(v) | Predicate::Host(v) | Predicate::UrlRegex(v) | Predicate::Url(v) => {
                v.clone()
            }
            Predicate::Ip(ip) => ip.to_string(),
        }
    }

    fn from_kv(key: &str, value: String) -> Result<Self, ParseError> {
        if value.is_empty() {
            return Err(ParseError::new(format!("empty value for `{}`", key)));
        }
        match key {
            "dest_domain" => Ok(Predicate::Domain(value)),
            "dest_host" => Ok(Predicate::Host(value)),
            "dest_ip" => Ok(Predicate::Ip(value.parse()?)),
            "url_regex" => Ok(Predicate::UrlRegex(value)),
            "url" => Ok(Predicate::Url(value)),
            _ => Err(ParseError::new(format!("unknown predicate `{}`", key))),
        }
    }
}

/// Time-of-day window, `HH:MM-HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_hour: u8,
    pub start_min: u8,
    pub end_hour: u8,
    pub end_min: u8,
}

impl TimeRange {
    pub fn new(start: (u8, u8), end: (u8, u8)) -> Self {
        Self {
            start_hour: start.0,
            start_min: start.1,
            end_hour: end.0,
            end_min: end.1,
        }
    }
}

fn parse_clock(s: &str) -> Result<(u8, u8), ParseError> {
    let bad = || ParseError::new(format!("invalid time of day `{}`", s));
    let (h, m) = s.split_once(':').ok_or_else(bad)?;
    let h: u8 = h.trim().parse().map_err(|_| bad())?;
    let m: u8 = m.trim().parse().map_err(|_| bad())?;
    if h > 23 || m > 59 {
        return Err(bad());
    }
    Ok((h, m))
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start_hour, self.start_min, self.end_hour, self.end_min
        )
    }
}

impl FromStr for TimeRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once('-')
            .ok_or_else(|| ParseError::new(format!("invalid time range `{}`", s)))?;
        Ok(TimeRange::new(parse_clock(a)?, parse_clock(b)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Trace,
    Push,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Put => "put",
            Method::Trace => "trace",
            Method::Push => "push",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            "put" => Ok(Method::Put),
            "trace" => Ok(Method::Trace),
            "push" => Ok(Method::Push),
            _ => Err(ParseError::new(format!("unsupported method `{}`", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlScheme {
    Http,
    Https,
}

impl UrlScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlScheme::Http => "http",
            UrlScheme::Https => "https",
        }
    }
}

impl fmt::Display for UrlScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrlScheme {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(UrlScheme::Http),
            "https" => Ok(UrlScheme::Https),
            _ => Err(ParseError::new(format!("unsupported scheme `{}`", s))),
        }
    }
}

/// Optional constraints narrowing a predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondarySpec {
    pub time: Option<TimeRange>,
    pub src_ip: Option<IpAddrEle>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub port: Option<PortEle>,
    pub method: Option<Method>,
    pub scheme: Option<UrlScheme>,
}

impl SecondarySpec {
    pub fn is_empty(&self) -> bool {
        *self == SecondarySpec::default()
    }

    pub(crate) fn take_from(fields: &mut Fields) -> Result<Self, ParseError> {
        Ok(Self {
            time: fields.take_parsed("time")?,
            src_ip: fields.take_parsed("src_ip")?,
            prefix: fields.take("prefix"),
            suffix: fields.take("suffix"),
            port: fields.take_parsed("port")?,
            method: fields.take_parsed("method")?,
            scheme: fields.take_parsed("scheme")?,
        })
    }

    pub(crate) fn write_to(&self, w: &mut LineWriter) {
        w.kv_opt("time", self.time)
            .kv_opt("src_ip", self.src_ip.as_ref())
            .kv_opt("prefix", self.prefix.as_ref())
            .kv_opt("suffix", self.suffix.as_ref())
            .kv_opt("port", self.port)
            .kv_opt("method", self.method)
            .kv_opt("scheme", self.scheme);
    }
}

/// Predicate plus secondary specifiers; the shared head of most rule kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdSsFormat {
    pub predicate: Predicate,
    #[serde(default)]
    pub sec_spec: SecondarySpec,
}

impl PdSsFormat {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            sec_spec: SecondarySpec::default(),
        }
    }

    pub fn with_spec(mut self, sec_spec: SecondarySpec) -> Self {
        self.sec_spec = sec_spec;
        self
    }

    /// Pull the predicate and every secondary specifier out of `fields`.
    pub(crate) fn take_from(fields: &mut Fields) -> Result<Self, ParseError> {
        let present: Vec<&str> = PREDICATE_KEYS
            .iter()
            .copied()
            .filter(|k| fields.contains(k))
            .collect();
        let key = match present.as_slice() {
            [key] => *key,
            [] => return Err(ParseError::new("missing destination predicate")),
            _ => {
                return Err(ParseError::new(format!(
                    "more than one destination predicate: {}",
                    present.join(", ")
                )))
            }
        };
        let value = fields.require(key)?;
        let predicate = Predicate::from_kv(key, value)?;
        let sec_spec = SecondarySpec::take_from(fields)?;
        Ok(Self { predicate, sec_spec })
    }

    pub(crate) fn write_to(&self, w: &mut LineWriter) {
        w.kv(self.predicate.key(), self.predicate.value());
        self.sec_spec.write_to(w);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_predicate() {
        let mut fields = Fields::parse_line("dest_domain=a.com url=http://b.com").unwrap();
        assert!(PdSsFormat::take_from(&mut fields).is_err());

        let mut fields = Fields::parse_line("prefix=/x").unwrap();
        let err = PdSsFormat::take_from(&mut fields).unwrap_err();
        assert_eq!(err.reason, "missing destination predicate");
    }

    #[test]
    fn test_secondary_spec_order() {
        let mut fields = Fields::parse_line(
            "scheme=https method=GET dest_host=h.com port=80-90 time=8:00-17:30 src_ip=10.0.0.1",
        )
        .unwrap();
        let pdss = PdSsFormat::take_from(&mut fields).unwrap();
        fields.finish().unwrap();

        assert_eq!(pdss.sec_spec.method, Some(Method::Get));
        assert_eq!(pdss.sec_spec.time, Some(TimeRange::new((8, 0), (17, 30))));

        let mut w = LineWriter::new();
        pdss.write_to(&mut w);
        assert_eq!(
            w.finish(),
            "dest_host=h.com time=08:00-17:30 src_ip=10.0.0.1 port=80-90 method=get scheme=https"
        );
    }

    #[test]
    fn test_unset_spec_is_empty() {
        let mut fields = Fields::parse_line("dest_ip=10.1.1.1-10.1.1.9").unwrap();
        let pdss = PdSsFormat::take_from(&mut fields).unwrap();
        assert!(pdss.sec_spec.is_empty());
        assert!(matches!(pdss.predicate, Predicate::Ip(IpAddrEle::Range { .. })));
    }

    #[test]
    fn test_invalid_specifiers() {
        for line in ["url=a time=25:00-26:00", "url=a method=DELETE", "url=a scheme=ftp", "url="] {
            let mut fields = Fields::parse_line(line).unwrap();
            assert!(PdSsFormat::take_from(&mut fields).is_err(), "{}", line);
        }
    }
}
