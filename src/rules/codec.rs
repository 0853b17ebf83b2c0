//! Line tokenizer and writer shared by every rule kind.
//!
//! # Design Decisions
//! - Tokens are whitespace separated; double quotes group a value
//! - Inside quotes `\"` and `\\` stand for a quote and a backslash; any other
//!   backslash is literal
//! - `key=value` tokens become [`Fields`]; duplicates and leftovers are errors
//! - The writer quotes a value only when it would not survive tokenizing

use std::fmt::Display;
use std::str::FromStr;

use crate::error::ParseError;

/// Split a rule line into tokens, honoring double quotes.
pub fn tokenize(line: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quotes && matches!(chars.peek(), Some('"' | '\\')) => {
                current.extend(chars.next());
            }
            '"' => {
                in_quotes = !in_quotes;
                in_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_quotes {
        return Err(ParseError::new("unterminated quote"));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Ordered `key=value` pairs of one rule line.
#[derive(Debug, Default)]
pub struct Fields {
    pairs: Vec<(String, String)>,
}

impl Fields {
    pub fn from_tokens<I>(tokens: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut pairs: Vec<(String, String)> = Vec::new();
        for token in tokens {
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| ParseError::new(format!("expected key=value, found `{}`", token)))?;
            let key = key.to_ascii_lowercase();
            if pairs.iter().any(|(k, _)| *k == key) {
                return Err(ParseError::new(format!("duplicate key `{}`", key)));
            }
            pairs.push((key, value.to_string()));
        }
        Ok(Self { pairs })
    }

    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        Self::from_tokens(tokenize(line)?)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Remove and return the raw value of `key`.
    pub fn take(&mut self, key: &str) -> Option<String> {
        let pos = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(pos).1)
    }

    pub fn require(&mut self, key: &str) -> Result<String, ParseError> {
        self.take(key)
            .ok_or_else(|| ParseError::new(format!("missing `{}`", key)))
    }

    /// Remove `key` and parse its value.
    pub fn take_parsed<T>(&mut self, key: &str) -> Result<Option<T>, ParseError>
    where
        T: FromStr<Err = ParseError>,
    {
        self.take(key)
            .map(|v| v.parse::<T>().map_err(|e| ParseError::new(format!("{}: {}", key, e.reason))))
            .transpose()
    }

    /// Fail if any key was not consumed by the kind parser.
    pub fn finish(self) -> Result<(), ParseError> {
        match self.pairs.first() {
            Some((key, _)) => Err(ParseError::new(format!("unknown key `{}`", key))),
            None => Ok(()),
        }
    }
}

/// Split a separated list value, dropping empty items.
pub fn split_list<T>(value: &str, separators: &[char]) -> Result<Vec<T>, ParseError>
where
    T: FromStr<Err = ParseError>,
{
    value
        .split(|c| separators.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

pub fn parse_bool(key: &str, value: &str) -> Result<bool, ParseError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ParseError::new(format!("{}: expected true or false, found `{}`", key, value))),
    }
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value.starts_with('#')
        || value.chars().any(|c| c.is_whitespace() || matches!(c, ';' | '"' | '\\'))
}

fn push_quoted(line: &mut String, value: &str) {
    line.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            line.push('\\');
        }
        line.push(c);
    }
    line.push('"');
}

/// Builds a rule line token by token.
#[derive(Debug, Default)]
pub struct LineWriter {
    line: String,
}

impl LineWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn separate(&mut self) {
        if !self.line.is_empty() {
            self.line.push(' ');
        }
    }

    pub fn token(&mut self, token: impl Display) -> &mut Self {
        self.separate();
        let token = token.to_string();
        if needs_quotes(&token) {
            push_quoted(&mut self.line, &token);
        } else {
            self.line.push_str(&token);
        }
        self
    }

    pub fn kv(&mut self, key: &str, value: impl Display) -> &mut Self {
        self.separate();
        let value = value.to_string();
        self.line.push_str(key);
        self.line.push('=');
        if needs_quotes(&value) {
            push_quoted(&mut self.line, &value);
        } else {
            self.line.push_str(&value);
        }
        self
    }

    pub fn kv_opt<V: Display>(&mut self, key: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.kv(key, value);
        }
        self
    }

    /// Always-quoted `key="..."` form, used for list values.
    pub fn kv_quoted(&mut self, key: &str, value: impl Display) -> &mut Self {
        self.separate();
        self.line.push_str(key);
        self.line.push('=');
        push_quoted(&mut self.line, &value.to_string());
        self
    }

    pub fn finish(&mut self) -> String {
        std::mem::take(&mut self.line)
    }
}

/// Join displayable items with a separator.
pub fn join<T: Display>(items: impl IntoIterator<Item = T>, sep: &str) -> String {
    items
        .into_iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_quotes() {
        let tokens = tokenize(r#"dest_domain=foo.com parent="a:1; b:2"  go_direct=true"#).unwrap();
        assert_eq!(tokens, vec!["dest_domain=foo.com", "parent=a:1; b:2", "go_direct=true"]);

        let tokens = tokenize(r#"plugin.so "" x"#).unwrap();
        assert_eq!(tokens, vec!["plugin.so", "", "x"]);

        assert!(tokenize(r#"a="open"#).is_err());
    }

    #[test]
    fn test_fields_duplicates_and_leftovers() {
        assert!(Fields::parse_line("a=1 a=2").is_err());
        assert!(Fields::parse_line("bare").is_err());

        let mut fields = Fields::parse_line("a=1 b=2").unwrap();
        assert_eq!(fields.take("a").as_deref(), Some("1"));
        let err = fields.finish().unwrap_err();
        assert!(err.reason.contains("`b`"));
    }

    #[test]
    fn test_writer_quotes_when_needed() {
        let line = LineWriter::new()
            .token("name")
            .kv("k", "plain")
            .kv("s", "two words")
            .kv_opt::<u8>("none", None)
            .finish();
        assert_eq!(line, r#"name k=plain s="two words""#);
    }

    #[test]
    fn test_escapes_inside_quotes() {
        let tokens = tokenize(r#"a "say \"hi\"" "back\\slash" url_regex=a\.b "lit\.eral""#).unwrap();
        assert_eq!(tokens, vec!["a", r#"say "hi""#, r"back\slash", r"url_regex=a\.b", r"lit\.eral"]);
    }

    #[test]
    fn test_awkward_tokens_read_back() {
        let values = ["a\"b", "say \"hi\"", "#x.so", "k=v", "a;b", "", " ", "end\\", r#"\\\""#];
        for value in values {
            let line = LineWriter::new().token(value).kv("key", value).finish();
            let tokens = tokenize(&line).unwrap();
            assert_eq!(tokens[0], value, "{}", line);
            assert_eq!(tokens[1], format!("key={}", value), "{}", line);
            assert!(!line.starts_with('#'), "{}", line);
        }
    }
}
