//! `socks.config` rules.
//!
//! Two line forms:
//! - `no_socks=<ip>,<ip>` bypasses SOCKS for the listed origins
//! - `dest_ip=<ip> parent="h:p;h:p" round_robin=<rr>` routes through SOCKS servers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::container::{IpAddrEle, IpAddrList, DomainList};
use crate::error::ParseError;
use crate::rules::codec::{join, split_list, Fields, LineWriter};
use crate::rules::parent::{parse_domain_list, RoundRobin};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum SocksRule {
    Bypass {
        ip_addrs: IpAddrList,
    },
    Multiple {
        dest_ip: IpAddrEle,
        servers: DomainList,
        round_robin: Option<RoundRobin>,
    },
}

impl fmt::Display for SocksRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut w = LineWriter::new();
        match self {
            SocksRule::Bypass { ip_addrs } => {
                w.kv("no_socks", join(ip_addrs, ","));
            }
            SocksRule::Multiple {
                dest_ip,
                servers,
                round_robin,
            } => {
                w.kv("dest_ip", dest_ip)
                    .kv_quoted("parent", join(servers, ";"))
                    .kv_opt("round_robin", *round_robin);
            }
        }
        f.write_str(&w.finish())
    }
}

impl FromStr for SocksRule {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::parse_line(line)?;
        let rule = if let Some(value) = fields.take("no_socks") {
            let ip_addrs: IpAddrList = split_list::<IpAddrEle>(&value, &[','])?.into();
            if ip_addrs.is_empty() {
                return Err(ParseError::new("no_socks needs at least one address"));
            }
            SocksRule::Bypass { ip_addrs }
        } else {
            let dest_ip = fields
                .take_parsed("dest_ip")?
                .ok_or_else(|| ParseError::new("socks rule needs `no_socks` or `dest_ip`"))?;
            let servers = parse_domain_list(&fields.require("parent")?)?;
            if servers.is_empty() {
                return Err(ParseError::new("socks rule needs at least one server"));
            }
            SocksRule::Multiple {
                dest_ip,
                servers,
                round_robin: fields.take_parsed("round_robin")?,
            }
        };
        fields.finish()?;
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Domain;

    #[test]
    fn test_bypass_form() {
        let rule: SocksRule = "no_socks=1.2.3.4,10.0.0.1-10.0.0.9".parse().unwrap();
        match &rule {
            SocksRule::Bypass { ip_addrs } => assert_eq!(ip_addrs.len(), 2),
            other => panic!("unexpected form {:?}", other),
        }
        assert_eq!(rule.to_string(), "no_socks=1.2.3.4,10.0.0.1-10.0.0.9");
    }

    #[test]
    fn test_multiple_form() {
        let rule: SocksRule = r#"dest_ip=1.1.1.1 parent="www.mucky.com:8888;freakazoid.com:2222" round_robin=strict"#
            .parse()
            .unwrap();
        let SocksRule::Multiple { servers, round_robin, .. } = &rule else {
            panic!("expected multiple form");
        };
        assert_eq!(servers.get(0), Some(&Domain::new("www.mucky.com", Some(8888))));
        assert_eq!(*round_robin, Some(RoundRobin::Strict));
    }

    #[test]
    fn test_rejects_mixed_or_empty() {
        assert!("no_socks=1.2.3.4 dest_ip=1.1.1.1".parse::<SocksRule>().is_err());
        assert!("dest_ip=1.1.1.1".parse::<SocksRule>().is_err());
        assert!("no_socks=".parse::<SocksRule>().is_err());
    }
}
