//! Canonical content model.
//!
//! Every dialect parses into a [`CanonicalDocument`] and every serializer
//! renders from one. The model is plain data: it never branches on the
//! dialect that produced it.

use crate::dialects::DialectId;
use crate::error::ParseError;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Schema version written into every JSON encoding
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// A metadata value: a scalar or a flat list of scalars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<MetaValue>),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, MetaValue::List(_))
    }

    /// Flatten to a list of strings: a text value is split on commas,
    /// a list contributes its text items.
    pub fn to_string_list(&self) -> Vec<String> {
        match self {
            MetaValue::Text(s) => s
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            MetaValue::List(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Bool(b)
    }
}

impl From<i64> for MetaValue {
    fn from(n: i64) -> Self {
        MetaValue::Integer(n)
    }
}

impl From<Vec<&str>> for MetaValue {
    fn from(items: Vec<&str>) -> Self {
        MetaValue::List(items.into_iter().map(MetaValue::from).collect())
    }
}

/// Insertion-ordered string map. Encodes as a JSON object whose key
/// order is the insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, MetaValue)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replace the value in place if the key exists, append otherwise
    pub fn insert(&mut self, key: impl Into<String>, value: MetaValue) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<MetaValue> {
        let pos = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, MetaValue)> for Fields {
    fn from_iter<I: IntoIterator<Item = (String, MetaValue)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

impl IntoIterator for Fields {
    type Item = (String, MetaValue);
    type IntoIter = std::vec::IntoIter<(String, MetaValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = Fields;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of metadata fields")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Fields, A::Error> {
                let mut fields = Fields::new();
                while let Some((k, v)) = access.next_entry::<String, MetaValue>()? {
                    fields.insert(k, v);
                }
                Ok(fields)
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

/// One worked example
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Example {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Fenced lines, each ending in a newline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Example {
    /// An example with neither prose nor code tells the reader nothing
    pub fn is_low_information(&self) -> bool {
        let blank = |s: &Option<String>| s.as_deref().map_or(true, |t| t.trim().is_empty());
        blank(&self.description) && blank(&self.code)
    }
}

/// A callable tool or MCP server declared by a package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Fields>,
}

impl ToolSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A typed block of document content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Section {
    Instructions {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        body: String,
    },
    RuleList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        rules: Vec<String>,
    },
    Guidelines {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        items: Vec<String>,
    },
    Examples {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        examples: Vec<Example>,
    },
    Metadata {
        fields: Fields,
    },
    ToolDefinitions {
        tools: Vec<ToolSpec>,
    },
    Persona {
        body: String,
    },
}

/// Discriminant of [`Section`], used in reports and by the scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKind {
    Instructions,
    RuleList,
    Guidelines,
    Examples,
    Metadata,
    ToolDefinitions,
    Persona,
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SectionKind::Instructions => "Instructions",
            SectionKind::RuleList => "RuleList",
            SectionKind::Guidelines => "Guidelines",
            SectionKind::Examples => "Examples",
            SectionKind::Metadata => "Metadata",
            SectionKind::ToolDefinitions => "ToolDefinitions",
            SectionKind::Persona => "Persona",
        };
        write!(f, "{}", s)
    }
}

impl Section {
    pub fn kind(&self) -> SectionKind {
        match self {
            Section::Instructions { .. } => SectionKind::Instructions,
            Section::RuleList { .. } => SectionKind::RuleList,
            Section::Guidelines { .. } => SectionKind::Guidelines,
            Section::Examples { .. } => SectionKind::Examples,
            Section::Metadata { .. } => SectionKind::Metadata,
            Section::ToolDefinitions { .. } => SectionKind::ToolDefinitions,
            Section::Persona { .. } => SectionKind::Persona,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Section::Instructions { title, .. }
            | Section::RuleList { title, .. }
            | Section::Guidelines { title, .. }
            | Section::Examples { title, .. } => title.as_deref(),
            _ => None,
        }
    }

    pub fn instructions(title: Option<&str>, body: impl Into<String>) -> Self {
        Section::Instructions {
            title: title.map(str::to_string),
            body: body.into(),
        }
    }

    pub fn rules<S: Into<String>>(title: Option<&str>, rules: impl IntoIterator<Item = S>) -> Self {
        Section::RuleList {
            title: title.map(str::to_string),
            rules: rules.into_iter().map(Into::into).collect(),
        }
    }

    /// Length in characters of the prose and code carried by this section
    pub fn text_len(&self) -> usize {
        let opt = |s: &Option<String>| s.as_deref().map_or(0, |t| t.chars().count());
        match self {
            Section::Instructions { body, .. } | Section::Persona { body } => body.chars().count(),
            Section::RuleList { rules: items, .. } | Section::Guidelines { items, .. } => {
                items.iter().map(|i| i.chars().count()).sum()
            }
            Section::Examples { examples, .. } => examples
                .iter()
                .map(|e| opt(&e.title) + opt(&e.description) + opt(&e.code))
                .sum(),
            Section::ToolDefinitions { tools } => tools
                .iter()
                .map(|t| t.name.chars().count() + opt(&t.description))
                .sum(),
            Section::Metadata { .. } => 0,
        }
    }
}

/// Whitespace profile and front-matter text of the source.
///
/// Purely presentational: two documents with equal sections are the same
/// document regardless of layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Layout {
    /// Lines end in `\r\n`
    pub crlf: bool,
    /// Blank line between the closing `---` and the body
    pub front_matter_gap: bool,
    /// Blank line between a heading and its content
    pub heading_gap: bool,
    /// Blank line between sections
    pub section_gap: bool,
    /// Body ends with a newline
    pub trailing_newline: bool,
    /// Newlines after the final one. For a body of blank lines only, all of them.
    pub trailing_blank_lines: usize,
    /// The leading persona was written under a `Persona` heading
    pub persona_heading: bool,
    /// Front matter as the author wrote it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub front_matter: Option<RawFrontMatter>,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            crlf: false,
            front_matter_gap: true,
            heading_gap: true,
            section_gap: true,
            trailing_newline: true,
            trailing_blank_lines: 0,
            persona_heading: false,
            front_matter: None,
        }
    }
}

/// Source text of a front-matter block, split per top-level key.
///
/// A field whose value is unchanged renders from this text, so quoting,
/// list style and comments survive a same-dialect round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFrontMatter {
    /// Lines before the first key
    pub head: String,
    pub keys: Vec<RawKey>,
    /// Closing delimiter line, `---` without a newline at end of input
    pub close: String,
}

/// One native key and the lines it spans, trailing comments included
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawKey {
    pub key: String,
    pub text: String,
}

impl RawFrontMatter {
    pub fn text_for(&self, key: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|k| k.key == key)
            .map(|k| k.text.as_str())
    }
}

/// Structural defect found while constructing a document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("section {index} ({kind}): {reason}")]
pub struct ValidationError {
    pub index: usize,
    pub kind: SectionKind,
    pub reason: String,
}

/// Normalized, dialect-independent package content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalDocument {
    schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_dialect: Option<DialectId>,
    sections: Vec<Section>,
    #[serde(default)]
    layout: Layout,
}

impl CanonicalDocument {
    pub fn new(sections: Vec<Section>) -> Result<Self, ValidationError> {
        validate(&sections)?;
        Ok(Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            source_dialect: None,
            sections,
            layout: Layout::default(),
        })
    }

    pub fn empty() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            source_dialect: None,
            sections: Vec::new(),
            layout: Layout::default(),
        }
    }

    pub fn with_source_dialect(mut self, dialect: DialectId) -> Self {
        self.source_dialect = Some(dialect);
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn source_dialect(&self) -> Option<DialectId> {
        self.source_dialect
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// First value stored under `key` in any `Metadata` section
    pub fn metadata(&self, key: &str) -> Option<&MetaValue> {
        self.sections.iter().find_map(|s| match s {
            Section::Metadata { fields } => fields.get(key),
            _ => None,
        })
    }

    pub fn has_kind(&self, kind: SectionKind) -> bool {
        self.sections.iter().any(|s| s.kind() == kind)
    }

    /// Encode for storage. Key order is stable.
    pub fn to_json(&self) -> String {
        // Every field is a string, number, bool or nested map; encoding cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Decode a stored document, rejecting schema versions this build
    /// does not understand.
    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ParseError::InvalidDocument(e.to_string()))?;

        let version = value
            .get("schemaVersion")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| ParseError::InvalidDocument("missing schemaVersion".to_string()))?;
        let version = u32::try_from(version).unwrap_or(u32::MAX);
        if version != CURRENT_SCHEMA_VERSION {
            return Err(ParseError::UnsupportedSchemaVersion(version));
        }

        let doc: CanonicalDocument = serde_json::from_value(value)
            .map_err(|e| ParseError::InvalidDocument(e.to_string()))?;
        validate(&doc.sections).map_err(|e| ParseError::InvalidDocument(e.to_string()))?;
        Ok(doc)
    }

    /// SHA-256 of the JSON encoding, hex encoded
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_json().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

fn validate(sections: &[Section]) -> Result<(), ValidationError> {
    for (index, section) in sections.iter().enumerate() {
        let fail = |reason: &str| ValidationError {
            index,
            kind: section.kind(),
            reason: reason.to_string(),
        };
        match section {
            Section::Metadata { fields } => {
                for (key, value) in fields.iter() {
                    if key.trim().is_empty() {
                        return Err(fail("empty metadata key"));
                    }
                    check_value(value).map_err(|r| fail(&format!("`{}`: {}", key, r)))?;
                }
            }
            Section::ToolDefinitions { tools } => {
                for tool in tools {
                    if tool.name.trim().is_empty() {
                        return Err(fail("tool without a name"));
                    }
                    if let Some(params) = &tool.parameters {
                        for (key, value) in params.iter() {
                            check_value(value)
                                .map_err(|r| fail(&format!("{}.{}: {}", tool.name, key, r)))?;
                        }
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_value(value: &MetaValue) -> Result<(), &'static str> {
    match value {
        MetaValue::List(items) if items.iter().any(|i| !i.is_scalar()) => {
            Err("lists may only hold scalars")
        }
        MetaValue::Float(f) if !f.is_finite() => Err("non-finite number"),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CanonicalDocument {
        let mut fields = Fields::new();
        fields.insert("priority", MetaValue::from("high"));
        fields.insert("globs", MetaValue::from(vec!["src/**/*.ts"]));
        CanonicalDocument::new(vec![
            Section::Metadata { fields },
            Section::rules(Some("Rules"), ["Use strict types", "No any"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_json_round_trip_keeps_field_order() {
        let doc = sample();
        let json = doc.to_json();
        assert!(json.starts_with(r#"{"schemaVersion":1"#));
        assert!(json.find("priority").unwrap() < json.find("globs").unwrap());

        let back = CanonicalDocument::from_json(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_section_tagging() {
        let json = serde_json::to_value(Section::rules(None, ["a"])).unwrap();
        assert_eq!(json["kind"], "ruleList");
        assert!(json.get("title").is_none());
    }

    #[test]
    fn test_rejects_unknown_schema_version() {
        let json = r#"{"schemaVersion":7,"sections":[]}"#;
        assert_eq!(
            CanonicalDocument::from_json(json),
            Err(ParseError::UnsupportedSchemaVersion(7))
        );

        let missing = r#"{"sections":[]}"#;
        assert!(matches!(
            CanonicalDocument::from_json(missing),
            Err(ParseError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_validation_rejects_nested_lists() {
        let mut fields = Fields::new();
        fields.insert(
            "bad",
            MetaValue::List(vec![MetaValue::List(vec![MetaValue::from("x")])]),
        );
        let err = CanonicalDocument::new(vec![Section::Metadata { fields }]).unwrap_err();
        assert_eq!(err.index, 0);
        assert_eq!(err.kind, SectionKind::Metadata);
    }

    #[test]
    fn test_validation_rejects_unnamed_tool() {
        let result = CanonicalDocument::new(vec![Section::ToolDefinitions {
            tools: vec![ToolSpec::named(" ")],
        }]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_sections_and_rules_are_legal() {
        assert!(CanonicalDocument::new(vec![]).unwrap().is_empty());
        assert!(CanonicalDocument::new(vec![Section::rules::<&str>(None, [])]).is_ok());
        let low = Example::default();
        assert!(low.is_low_information());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(sample().fingerprint(), sample().fingerprint());
        assert_eq!(sample().fingerprint().len(), 64);
        assert_ne!(sample().fingerprint(), CanonicalDocument::empty().fingerprint());
    }

    #[test]
    fn test_fields_insert_replaces_in_place() {
        let mut fields = Fields::new();
        fields.insert("a", MetaValue::Integer(1));
        fields.insert("b", MetaValue::Integer(2));
        fields.insert("a", MetaValue::Integer(3));
        let keys: Vec<_> = fields.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(fields.get("a"), Some(&MetaValue::Integer(3)));
    }

    #[test]
    fn test_string_list_flattening() {
        assert_eq!(
            MetaValue::from("Read, Grep ,Glob").to_string_list(),
            vec!["Read", "Grep", "Glob"]
        );
        assert_eq!(MetaValue::from(vec!["a", "b"]).to_string_list(), vec!["a", "b"]);
    }
}
