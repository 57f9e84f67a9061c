//! Document paths.
//!
//! ```text
//! $.customer.addresses[0].city
//! customer['first name']
//! $.items[*].id
//! $.meta.*
//! ```
//!
//! A leading `$` is optional. A path with no segments addresses the root.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Object member.
    Key(String),
    /// Array element.
    Index(usize),
    /// Every member of an object or element of an array.
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocPath {
    raw: String,
    segments: Vec<Segment>,
}

impl DocPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let segments = Parser::new(raw).segments()?;
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for DocPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DocPath::parse(s)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

struct Parser<'a> {
    raw: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    fn new(raw: &'a str) -> Self {
        Self {
            raw,
            chars: raw.char_indices().peekable(),
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::InvalidPath {
            path: self.raw.to_string(),
            message: message.into(),
        }
    }

    fn segments(mut self) -> Result<Vec<Segment>> {
        let mut segments = Vec::new();
        match self.chars.peek().map(|(_, c)| *c) {
            Some('$') => {
                self.chars.next();
            }
            Some(c) if is_name_char(c) => segments.push(Segment::Key(self.name()?)),
            _ => {}
        }
        while let Some((at, c)) = self.chars.next() {
            let segment = match c {
                '.' => match self.chars.peek().map(|(_, c)| *c) {
                    Some('*') => {
                        self.chars.next();
                        Segment::Wildcard
                    }
                    _ => Segment::Key(self.name()?),
                },
                '[' => self.bracket()?,
                other => return Err(self.error(format!("unexpected {other:?} at {at}"))),
            };
            segments.push(segment);
        }
        Ok(segments)
    }

    fn name(&mut self) -> Result<String> {
        let mut name = String::new();
        while let Some((_, c)) = self.chars.peek() {
            if !is_name_char(*c) {
                break;
            }
            name.push(*c);
            self.chars.next();
        }
        if name.is_empty() {
            return Err(self.error("empty member name"));
        }
        Ok(name)
    }

    fn bracket(&mut self) -> Result<Segment> {
        let segment = match self.chars.next() {
            Some((_, '*')) => Segment::Wildcard,
            Some((_, quote @ ('\'' | '"'))) => {
                let mut key = String::new();
                loop {
                    match self.chars.next() {
                        Some((_, c)) if c == quote => break,
                        Some((_, c)) => key.push(c),
                        None => return Err(self.error("unterminated quoted member")),
                    }
                }
                Segment::Key(key)
            }
            Some((_, c)) if c.is_ascii_digit() => {
                let mut digits = c.to_string();
                while let Some((_, d)) = self.chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    digits.push(*d);
                    self.chars.next();
                }
                let index = digits
                    .parse()
                    .map_err(|_| self.error(format!("index {digits} out of range")))?;
                Segment::Index(index)
            }
            Some((at, c)) => return Err(self.error(format!("unexpected {c:?} at {at}"))),
            None => return Err(self.error("unterminated '['")),
        };
        match self.chars.next() {
            Some((_, ']')) => Ok(segment),
            _ => Err(self.error("expected ']'")),
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: &str) -> Segment {
        Segment::Key(k.to_string())
    }

    #[test]
    fn dotted_and_bracketed_forms() {
        let path = DocPath::parse("$.customer.addresses[0].city").unwrap();
        assert_eq!(
            path.segments(),
            [key("customer"), key("addresses"), Segment::Index(0), key("city")]
        );

        let path = DocPath::parse("customer['first name']").unwrap();
        assert_eq!(path.segments(), [key("customer"), key("first name")]);

        let path = DocPath::parse(r#"$["id"]"#).unwrap();
        assert_eq!(path.segments(), [key("id")]);
    }

    #[test]
    fn wildcards() {
        let path = DocPath::parse("$.items[*].id").unwrap();
        assert_eq!(path.segments(), [key("items"), Segment::Wildcard, key("id")]);
        let path = DocPath::parse("$.meta.*").unwrap();
        assert_eq!(path.segments(), [key("meta"), Segment::Wildcard]);
    }

    #[test]
    fn root() {
        assert!(DocPath::parse("$").unwrap().is_root());
        assert!(DocPath::parse("").unwrap().is_root());
    }

    #[test]
    fn malformed_paths() {
        for raw in ["$.", "$..a", "$[", "$[0", "$['a]", "$[x]", "$ a"] {
            let err = DocPath::parse(raw).unwrap_err();
            assert_eq!(err.error_type(), "invalid_path", "{raw}");
        }
    }
}
