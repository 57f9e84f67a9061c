//! Document equivalence.
//!
//! Two JSON documents are equivalent when their normalized renderings are
//! identical. Normalization sorts object keys, pretty-prints one member per
//! line, and drops a short run of fractional zeros at the end of a line so
//! `5.0` and `5` compare equal.
//!
//! Overrides inject known dynamic values into the expected document only.
//! Redactions replace volatile values with [`REDACTED`] on both sides.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value as Json};

use crate::error::{Error, Result};
use crate::failure::Failure;
use crate::path::{DocPath, Segment};

/// Sentinel written over redacted values.
pub const REDACTED: &str = "REPLACED";

/// A parsed JSON document that remembers where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    name: String,
    root: Json,
}

impl Document {
    pub fn parse(name: &str, text: &str) -> Result<Self> {
        let root = serde_json::from_str(text).map_err(|source| Error::Document {
            name: name.to_string(),
            source,
        })?;
        Ok(Self {
            name: name.to_string(),
            root,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Json {
        &self.root
    }

    /// Every value the path addresses.
    pub fn select(&self, path: &DocPath) -> Vec<&Json> {
        let mut found = vec![&self.root];
        for segment in path.segments() {
            found = found
                .into_iter()
                .flat_map(|node| children(node, segment))
                .collect();
        }
        found
    }

    /// The first value the path addresses.
    pub fn get(&self, path: &DocPath) -> Option<&Json> {
        self.select(path).into_iter().next()
    }

    /// Set the addressed value, adding it if only the last member is
    /// missing. Returns how many values were written.
    pub fn set(&mut self, path: &DocPath, value: &Json) -> Result<usize> {
        let written = write(&mut self.root, path.segments(), value, Mode::Upsert, path)?;
        log::debug!("Set {path} in {} ({written} values)", self.name);
        Ok(written)
    }

    /// Overwrite the addressed values that exist. Missing ones are skipped.
    pub fn replace(&mut self, path: &DocPath, value: &Json) -> Result<usize> {
        write(&mut self.root, path.segments(), value, Mode::Existing, path)
    }

    /// Key-sorted, pretty-printed rendering.
    pub fn canonical(&self) -> Result<String> {
        serde_json::to_string_pretty(&sorted(&self.root)).map_err(|source| Error::Document {
            name: self.name.clone(),
            source,
        })
    }
}

fn children<'a>(node: &'a Json, segment: &Segment) -> Vec<&'a Json> {
    match (segment, node) {
        (Segment::Key(k), Json::Object(map)) => map.get(k).into_iter().collect(),
        (Segment::Index(i), Json::Array(items)) => items.get(*i).into_iter().collect(),
        (Segment::Wildcard, Json::Object(map)) => map.values().collect(),
        (Segment::Wildcard, Json::Array(items)) => items.iter().collect(),
        _ => Vec::new(),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Upsert,
    Existing,
}

fn write(
    node: &mut Json,
    segments: &[Segment],
    value: &Json,
    mode: Mode,
    path: &DocPath,
) -> Result<usize> {
    let Some((head, rest)) = segments.split_first() else {
        *node = value.clone();
        return Ok(1);
    };
    let not_found = || Error::PathNotFound {
        path: path.to_string(),
    };
    match (head, node) {
        (Segment::Key(k), Json::Object(map)) => match map.get_mut(k) {
            Some(child) => write(child, rest, value, mode, path),
            None if rest.is_empty() && mode == Mode::Upsert => {
                map.insert(k.clone(), value.clone());
                Ok(1)
            }
            None if mode == Mode::Existing => Ok(0),
            None => Err(not_found()),
        },
        (Segment::Index(i), Json::Array(items)) => match items.get_mut(*i) {
            Some(child) => write(child, rest, value, mode, path),
            None if mode == Mode::Existing => Ok(0),
            None => Err(not_found()),
        },
        (Segment::Wildcard, Json::Object(map)) => map
            .values_mut()
            .map(|child| write(child, rest, value, mode, path))
            .sum(),
        (Segment::Wildcard, Json::Array(items)) => items
            .iter_mut()
            .map(|child| write(child, rest, value, mode, path))
            .sum(),
        _ if mode == Mode::Existing => Ok(0),
        _ => Err(not_found()),
    }
}

fn sorted(value: &Json) -> Json {
    match value {
        Json::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Json::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted(v)))
                    .collect::<Map<_, _>>(),
            )
        }
        Json::Array(items) => Json::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Drop one to three fractional zeros that end a line or the text.
pub fn strip_integral_zeros(text: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"\.0{1,3}(,?\r?\n|$)").expect("static pattern compiles"));
    pattern.replace_all(text, "$1").into_owned()
}

/// Values to write into the expected document, by path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    entries: Vec<(DocPath, Json)>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, value: impl Into<Json>) -> Result<Self> {
        self.entries.push((DocPath::parse(path)?, value.into()));
        Ok(self)
    }

    /// Build from textual pairs. A literal that parses as JSON is used as
    /// such; anything else becomes a JSON string.
    pub fn from_strings<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut overrides = Self::new();
        for (path, literal) in pairs {
            let literal = literal.as_ref();
            let value = serde_json::from_str(literal)
                .unwrap_or_else(|_| Json::String(literal.to_string()));
            overrides = overrides.with(path.as_ref(), value)?;
        }
        Ok(overrides)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn apply(&self, doc: &mut Document) -> Result<()> {
        for (path, value) in &self.entries {
            doc.set(path, value)?;
        }
        Ok(())
    }
}

/// Paths whose values are replaced by [`REDACTED`] on both sides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Redactions {
    paths: Vec<DocPath>,
}

impl Redactions {
    pub fn new<I, S>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths = paths
            .into_iter()
            .map(|p| DocPath::parse(p.as_ref()))
            .collect::<Result<_>>()?;
        Ok(Self { paths })
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn apply(&self, doc: &mut Document) -> Result<()> {
        let sentinel = Json::String(REDACTED.to_string());
        for path in &self.paths {
            doc.replace(path, &sentinel)?;
        }
        Ok(())
    }
}

/// An expected document, as text, with the name it was loaded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    text: String,
}

impl Template {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Canonical form of a document, redacted if asked, with integral
/// fractions stripped.
pub fn normalize(doc: &Document, redactions: Option<&Redactions>) -> Result<String> {
    let mut canonical = doc.canonical()?;
    if let Some(redactions) = redactions.filter(|r| !r.is_empty()) {
        let mut reparsed = Document::parse(doc.name(), &canonical)?;
        redactions.apply(&mut reparsed)?;
        canonical = reparsed.canonical()?;
    }
    Ok(strip_integral_zeros(&canonical))
}

/// Assert that `actual` is equivalent to `template`.
pub fn assert_equivalent(
    template: &Template,
    actual: &str,
    overrides: Option<&Overrides>,
    redactions: Option<&Redactions>,
) -> Result<()> {
    let mut expected = Document::parse(template.name(), template.text())?;
    if let Some(overrides) = overrides {
        overrides.apply(&mut expected)?;
    }
    let expected = normalize(&expected, redactions)?;
    let actual = normalize(&Document::parse("actual", actual)?, redactions)?;

    if expected != actual {
        return Err(Failure::DocumentMismatch {
            template: template.name().to_string(),
            expected,
            actual,
        }
        .into());
    }
    log::debug!("Document matches template {}", template.name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn path(p: &str) -> DocPath {
        DocPath::parse(p).unwrap()
    }

    #[test]
    fn override_injects_dynamic_values() {
        let template = Template::new("customer.json", r#"{"id": "${id}"}"#);
        let overrides = Overrides::new().with("$.id", 42).unwrap();
        assert_equivalent(&template, r#"{"id": 42}"#, Some(&overrides), None).unwrap();
    }

    #[test]
    fn literal_placeholder_does_not_match() {
        let template = Template::new("customer.json", r#"{"id": "${id}"}"#);
        let err = assert_equivalent(&template, r#"{"id": 42}"#, None, None).unwrap_err();
        assert!(err.is_failure());
        match err.failure() {
            Some(Failure::DocumentMismatch {
                template,
                expected,
                actual,
            }) => {
                assert_eq!(template, "customer.json");
                assert_eq!(expected, "{\n  \"id\": \"${id}\"\n}");
                assert_eq!(actual, "{\n  \"id\": 42\n}");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.to_string().contains("(customer.json:1)"));
    }

    #[test]
    fn redaction_neutralizes_volatile_fields_on_both_sides() {
        let template = Template::new(
            "order.json",
            r#"{"id": 1, "meta": {"created": "2020-01-01T00:00:00Z"}}"#,
        );
        let actual = r#"{"meta": {"created": "2024-06-30T12:34:56Z"}, "id": 1}"#;
        assert!(assert_equivalent(&template, actual, None, None).is_err());

        let redactions = Redactions::new(["$.meta.created"]).unwrap();
        assert_equivalent(&template, actual, None, Some(&redactions)).unwrap();
    }

    #[test]
    fn key_order_and_integral_floats_are_normalized() {
        let template = Template::new("t.json", r#"{"b": 5.0, "a": [1.000, 2.5]}"#);
        assert_equivalent(&template, r#"{"a": [1, 2.5], "b": 5}"#, None, None).unwrap();
    }

    #[test]
    fn strip_only_at_line_ends() {
        assert_eq!(strip_integral_zeros("  \"a\": 5.0,\n"), "  \"a\": 5,\n");
        assert_eq!(strip_integral_zeros("  \"a\": 5.000\r\n"), "  \"a\": 5\r\n");
        assert_eq!(strip_integral_zeros("  \"a\": 5.05\n"), "  \"a\": 5.05\n");
        assert_eq!(strip_integral_zeros("  \"a\": \"1.0 x\"\n"), "  \"a\": \"1.0 x\"\n");
        assert_eq!(strip_integral_zeros("5.0"), "5");
        assert_eq!(strip_integral_zeros("\"5.0\""), "\"5.0\"");
    }

    #[test]
    fn scalar_documents_normalize_like_nested_numbers() {
        let template = Template::new("t.json", "5.0");
        assert_equivalent(&template, "5", None, None).unwrap();
        assert!(assert_equivalent(&template, "5.5", None, None).is_err());
    }

    #[test]
    fn set_creates_leaf_but_not_parents() {
        let mut doc = Document::parse("d", r#"{"a": {"b": 1}}"#).unwrap();
        assert_eq!(doc.set(&path("$.a.c"), &json!(2)).unwrap(), 1);
        assert_eq!(doc.get(&path("$.a.c")), Some(&json!(2)));

        let err = doc.set(&path("$.x.y"), &json!(3)).unwrap_err();
        assert_eq!(err.error_type(), "path_not_found");
    }

    #[test]
    fn wildcards_touch_every_element() {
        let mut doc =
            Document::parse("d", r#"{"items": [{"id": 1}, {"id": 2}, {"name": "x"}]}"#).unwrap();
        assert_eq!(doc.select(&path("$.items[*].id")).len(), 2);
        assert_eq!(doc.replace(&path("$.items[*].id"), &json!("R")).unwrap(), 2);
        assert_eq!(doc.get(&path("$.items[2]")), Some(&json!({"name": "x"})));
    }

    #[test]
    fn redacting_an_absent_path_is_a_no_op() {
        let template = Template::new("t.json", r#"{"id": 1}"#);
        let redactions = Redactions::new(["$.meta.created"]).unwrap();
        assert_equivalent(&template, r#"{"id": 1}"#, None, Some(&redactions)).unwrap();
    }

    #[test]
    fn override_literals_parse_as_json_when_possible() {
        let overrides = Overrides::from_strings([("$.id", "42"), ("$.name", "Bob")]).unwrap();
        let mut doc = Document::parse("d", "{}").unwrap();
        overrides.apply(&mut doc).unwrap();
        assert_eq!(doc.root(), &json!({"id": 42, "name": "Bob"}));
    }

    #[test]
    fn malformed_documents_name_their_source() {
        let template = Template::new("broken.json", "{");
        let err = assert_equivalent(&template, "{}", None, None).unwrap_err();
        assert_eq!(err.error_type(), "document_error");
        assert!(err.to_string().contains("broken.json"));
    }
}
