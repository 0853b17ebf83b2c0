//! Element types carried by the marshalling containers.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A host name with an optional port (`host` or `host:port`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub port: Option<u16>,
}

impl Domain {
    pub fn new(name: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            name: name.into(),
            port,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.name, port),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for Domain {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::new("empty domain"));
        }
        match s.rsplit_once(':') {
            // Bare IPv6 literals have several colons and no port.
            Some((name, port)) if !name.is_empty() && !name.contains(':') => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| ParseError::new(format!("invalid port in `{}`", s)))?;
                Ok(Domain::new(name, Some(port)))
            }
            Some((name, _)) if name.is_empty() => {
                Err(ParseError::new(format!("missing host in `{}`", s)))
            }
            _ => Ok(Domain::new(s, None)),
        }
    }
}

/// A single address (optionally CIDR) or an address range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpAddrEle {
    Single {
        ip: IpAddr,
        cidr: Option<u8>,
    },
    Range {
        start: IpAddr,
        start_cidr: Option<u8>,
        end: IpAddr,
        end_cidr: Option<u8>,
    },
}

impl IpAddrEle {
    pub fn single(ip: IpAddr) -> Self {
        IpAddrEle::Single { ip, cidr: None }
    }

    pub fn range(start: IpAddr, end: IpAddr) -> Self {
        IpAddrEle::Range {
            start,
            start_cidr: None,
            end,
            end_cidr: None,
        }
    }
}

fn write_addr(f: &mut fmt::Formatter<'_>, ip: &IpAddr, cidr: Option<u8>) -> fmt::Result {
    match cidr {
        Some(bits) => write!(f, "{}/{}", ip, bits),
        None => write!(f, "{}", ip),
    }
}

fn parse_addr(s: &str) -> Result<(IpAddr, Option<u8>), ParseError> {
    let (ip, cidr) = match s.split_once('/') {
        Some((ip, bits)) => {
            let bits = bits
                .parse::<u8>()
                .map_err(|_| ParseError::new(format!("invalid CIDR in `{}`", s)))?;
            (ip, Some(bits))
        }
        None => (s, None),
    };
    let ip: IpAddr = ip
        .trim()
        .parse()
        .map_err(|_| ParseError::new(format!("invalid IP address `{}`", s)))?;
    let max_bits = if ip.is_ipv4() { 32 } else { 128 };
    if cidr.is_some_and(|bits| bits > max_bits) {
        return Err(ParseError::new(format!("CIDR out of range in `{}`", s)));
    }
    Ok((ip, cidr))
}

impl fmt::Display for IpAddrEle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpAddrEle::Single { ip, cidr } => write_addr(f, ip, *cidr),
            IpAddrEle::Range {
                start,
                start_cidr,
                end,
                end_cidr,
            } => {
                write_addr(f, start, *start_cidr)?;
                f.write_str("-")?;
                write_addr(f, end, *end_cidr)
            }
        }
    }
}

impl FromStr for IpAddrEle {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('-') {
            Some((a, b)) => {
                let (start, start_cidr) = parse_addr(a)?;
                let (end, end_cidr) = parse_addr(b)?;
                if start.is_ipv4() != end.is_ipv4() {
                    return Err(ParseError::new(format!("mixed address families in `{}`", s)));
                }
                Ok(IpAddrEle::Range {
                    start,
                    start_cidr,
                    end,
                    end_cidr,
                })
            }
            None => {
                let (ip, cidr) = parse_addr(s)?;
                Ok(IpAddrEle::Single { ip, cidr })
            }
        }
    }
}

/// A port or an inclusive port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortEle {
    pub start: u16,
    pub end: Option<u16>,
}

impl PortEle {
    pub fn single(port: u16) -> Self {
        Self {
            start: port,
            end: None,
        }
    }

    pub fn range(start: u16, end: u16) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn contains(&self, port: u16) -> bool {
        match self.end {
            Some(end) => (self.start..=end).contains(&port),
            None => self.start == port,
        }
    }
}

impl fmt::Display for PortEle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{}", self.start, end),
            None => write!(f, "{}", self.start),
        }
    }
}

impl FromStr for PortEle {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseError::new(format!("invalid port `{}`", s));
        match s.split_once('-') {
            Some((a, b)) => {
                let start = a.trim().parse::<u16>().map_err(|_| bad())?;
                let end = b.trim().parse::<u16>().map_err(|_| bad())?;
                if end < start {
                    return Err(ParseError::new(format!("port range `{}` is reversed", s)));
                }
                Ok(PortEle::range(start, end))
            }
            None => Ok(PortEle::single(s.trim().parse().map_err(|_| bad())?)),
        }
    }
}
