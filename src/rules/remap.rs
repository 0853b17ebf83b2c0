//! `remap.config` rules: URL rewriting between a client-facing and an origin URL.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::rules::codec::{tokenize, LineWriter};
use crate::rules::predicate::UrlScheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemapType {
    Map,
    ReverseMap,
    Redirect,
    RedirectTemporary,
    MapWithRecvPort,
    RegexMap,
}

impl RemapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemapType::Map => "map",
            RemapType::ReverseMap => "reverse_map",
            RemapType::Redirect => "redirect",
            RemapType::RedirectTemporary => "redirect_temporary",
            RemapType::MapWithRecvPort => "map_with_recv_port",
            RemapType::RegexMap => "regex_map",
        }
    }
}

impl FromStr for RemapType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "map" => Ok(RemapType::Map),
            "reverse_map" => Ok(RemapType::ReverseMap),
            "redirect" => Ok(RemapType::Redirect),
            "redirect_temporary" => Ok(RemapType::RedirectTemporary),
            "map_with_recv_port" => Ok(RemapType::MapWithRecvPort),
            "regex_map" => Ok(RemapType::RegexMap),
            _ => Err(ParseError::new(format!("unknown remap type `{}`", s))),
        }
    }
}

/// One side of a remap: `scheme://host[:port][/path_prefix]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapEndpoint {
    pub scheme: UrlScheme,
    /// Host name or IP address; IPv6 literals are kept without brackets.
    pub host: String,
    pub port: Option<u16>,
    /// Path without the leading slash.
    pub path_prefix: Option<String>,
}

impl RemapEndpoint {
    pub fn new(scheme: UrlScheme, host: impl Into<String>) -> Self {
        Self {
            scheme,
            host: host.into(),
            port: None,
            path_prefix: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Leading slashes are dropped; an empty prefix means none.
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_start_matches('/');
        self.path_prefix = (!prefix.is_empty()).then(|| prefix.to_string());
        self
    }
}

impl fmt::Display for RemapEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]", self.scheme, self.host)?;
        } else {
            write!(f, "{}://{}", self.scheme, self.host)?;
        }
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        if let Some(path) = &self.path_prefix {
            write!(f, "/{}", path)?;
        }
        Ok(())
    }
}

impl FromStr for RemapEndpoint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| ParseError::new(format!("missing scheme in `{}`", s)))?;
        let scheme: UrlScheme = scheme.parse()?;

        let (authority, path_prefix) = match rest.split_once('/') {
            Some((authority, path)) if !path.is_empty() => (authority, Some(path.to_string())),
            Some((authority, _)) => (authority, None),
            None => (rest, None),
        };
        let (host, port) = match authority.strip_prefix('[') {
            Some(bracketed) => {
                let (host, after) = bracketed
                    .split_once(']')
                    .ok_or_else(|| ParseError::new(format!("unclosed `[` in `{}`", s)))?;
                match after {
                    "" => (host, None),
                    _ => {
                        let port = after
                            .strip_prefix(':')
                            .ok_or_else(|| ParseError::new(format!("invalid port in `{}`", s)))?;
                        (host, Some(port))
                    }
                }
            }
            None => match authority.rsplit_once(':') {
                Some((host, _)) if host.contains(':') => {
                    return Err(ParseError::new(format!("IPv6 host must be bracketed in `{}`", s)))
                }
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            },
        };
        let port = port
            .map(|p| p.parse::<u16>())
            .transpose()
            .map_err(|_| ParseError::new(format!("invalid port in `{}`", s)))?;
        if host.is_empty() {
            return Err(ParseError::new(format!("missing host in `{}`", s)));
        }

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            path_prefix,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapRule {
    pub remap_type: RemapType,
    pub from: RemapEndpoint,
    pub to: RemapEndpoint,
}

impl fmt::Display for RemapRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = LineWriter::new()
            .token(self.remap_type.as_str())
            .token(&self.from)
            .token(&self.to)
            .finish();
        f.write_str(&line)
    }
}

impl FromStr for RemapRule {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(line)?;
        match tokens.as_slice() {
            [remap_type, from, to] => Ok(Self {
                remap_type: remap_type.parse()?,
                from: from.parse()?,
                to: to.parse()?,
            }),
            _ => Err(ParseError::new(format!(
                "remap rule needs `<type> <from> <to>`, found {} tokens",
                tokens.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remap() {
        let rule: RemapRule = "map http://www.example.com:8080/images https://origin.example.com/img"
            .parse()
            .unwrap();
        assert_eq!(rule.remap_type, RemapType::Map);
        assert_eq!(rule.from.port, Some(8080));
        assert_eq!(rule.from.path_prefix.as_deref(), Some("images"));
        assert_eq!(rule.to.scheme, UrlScheme::Https);
        assert_eq!(rule.to.port, None);
    }

    #[test]
    fn test_trailing_slash_means_no_prefix() {
        let ep: RemapEndpoint = "http://a.com/".parse().unwrap();
        assert_eq!(ep.path_prefix, None);
        assert_eq!(ep.to_string(), "http://a.com");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!("map http://a.com".parse::<RemapRule>().is_err());
        assert!("forward http://a.com http://b.com".parse::<RemapRule>().is_err());
        assert!("map a.com http://b.com".parse::<RemapRule>().is_err());
        assert!("map http://:80 http://b.com".parse::<RemapRule>().is_err());
    }

    #[test]
    fn test_ipv6_hosts() {
        let ep: RemapEndpoint = "http://[::1]:8080/x".parse().unwrap();
        assert_eq!(ep.host, "::1");
        assert_eq!(ep.port, Some(8080));
        assert_eq!(ep.path_prefix.as_deref(), Some("x"));
        assert_eq!(ep.to_string(), "http://[::1]:8080/x");

        let ep: RemapEndpoint = "https://[fe80::2]/".parse().unwrap();
        assert_eq!((ep.host.as_str(), ep.port), ("fe80::2", None));

        assert!("http://::1/x".parse::<RemapEndpoint>().is_err());
        assert!("http://[::1/x".parse::<RemapEndpoint>().is_err());
        assert!("http://[::1]80/x".parse::<RemapEndpoint>().is_err());
    }

    #[test]
    fn test_builder_normalizes_prefix() {
        let ep = RemapEndpoint::new(UrlScheme::Http, "h").with_path_prefix("");
        assert_eq!(ep.path_prefix, None);
        let ep = RemapEndpoint::new(UrlScheme::Http, "h").with_port(81).with_path_prefix("/img");
        assert_eq!(ep.to_string(), "http://h:81/img");
        assert_eq!(ep.to_string().parse::<RemapEndpoint>().unwrap(), ep);
    }
}
