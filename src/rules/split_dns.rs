//! `splitdns.config` rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::container::{Domain, DomainList, IpAddrEle, IpAddrList};
use crate::error::ParseError;
use crate::rules::codec::{join, split_list, Fields, LineWriter};
use crate::rules::predicate::PdSsFormat;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitDnsRule {
    pub pdss: PdSsFormat,
    /// Never empty.
    pub dns_servers: IpAddrList,
    pub default_domain: Option<String>,
    #[serde(default)]
    pub search_list: DomainList,
}

impl fmt::Display for SplitDnsRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut w = LineWriter::new();
        self.pdss.write_to(&mut w);
        w.kv_quoted("named", join(&self.dns_servers, " "))
            .kv_opt("def_domain", self.default_domain.as_ref());
        if !self.search_list.is_empty() {
            w.kv_quoted("search_list", join(&self.search_list, " "));
        }
        f.write_str(&w.finish())
    }
}

impl FromStr for SplitDnsRule {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = Fields::parse_line(line)?;
        let pdss = PdSsFormat::take_from(&mut fields)?;
        let dns_servers: IpAddrList =
            split_list::<IpAddrEle>(&fields.require("named")?, &[' ', ';', ','])?.into();
        if dns_servers.is_empty() {
            return Err(ParseError::new("split DNS rule needs at least one name server"));
        }
        let default_domain = fields.take("def_domain");
        let search_list = match fields.take("search_list") {
            Some(value) => split_list::<Domain>(&value, &[' ', ';', ','])?.into(),
            None => DomainList::new(),
        };
        fields.finish()?;
        Ok(Self {
            pdss,
            dns_servers,
            default_domain,
            search_list,
        })
    }
}
