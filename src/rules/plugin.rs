//! `plugin.config` rules: a shared object and its arguments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::container::StringList;
use crate::error::ParseError;
use crate::rules::codec::{tokenize, LineWriter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRule {
    pub name: String,
    #[serde(default)]
    pub args: StringList,
}

impl PluginRule {
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for PluginRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut w = LineWriter::new();
        w.token(&self.name);
        for arg in &self.args {
            w.token(arg);
        }
        f.write_str(&w.finish())
    }
}

impl FromStr for PluginRule {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = tokenize(line)?.into_iter();
        let name = tokens
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ParseError::new("missing plugin name"))?;
        Ok(Self {
            name,
            args: tokens.collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plugin() {
        let rule: PluginRule = "stats_over_http.so /_stats".parse().unwrap();
        assert_eq!(rule.name, "stats_over_http.so");
        assert_eq!(rule.args.get(0).map(String::as_str), Some("/_stats"));

        let rule = PluginRule::new("header_rewrite.so", ["a b", "c"]);
        assert_eq!(rule.to_string(), r#"header_rewrite.so "a b" c"#);
        assert_eq!(rule.to_string().parse::<PluginRule>().unwrap(), rule);
    }

    #[test]
    fn test_empty_line() {
        assert!("   ".parse::<PluginRule>().is_err());
    }
}
