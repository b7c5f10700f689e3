//! Tool dialects and the shared parse/serialize engine.
//!
//! Each dialect module declares a [`DialectSpec`] table (front-matter rule,
//! key mapping, body conventions) and exposes `parse` / `serialize`
//! wrappers. All dialects run through [`parse_with`] and [`serialize_with`],
//! so adding a dialect means one enum variant and one table.

pub mod agents_md;
pub(crate) mod body;
pub mod claude_agent;
pub mod claude_command;
pub mod claude_skill;
pub mod copilot;
pub mod cursor;
pub(crate) mod frontmatter;
pub mod kiro;

use crate::error::{ParseError, SerializeError};
use crate::hints::{self, ConversionHints, DialectHintBag, ManifestHints};
use crate::model::{CanonicalDocument, Fields, Layout, MetaValue, Section, SectionKind, ToolSpec};
use crate::report::DegradationReport;
use body::BodyConventions;
use frontmatter::Entry;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Canonical metadata keys shared by every dialect
pub mod keys {
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const GLOBS: &str = "globs";
    pub const ALWAYS_APPLY: &str = "always_apply";
    pub const MODEL: &str = "model";
    pub const ARGUMENT_HINT: &str = "argument_hint";
    pub const LICENSE: &str = "license";
    pub const TOOLS: &str = "tools";

    pub const ALL: &[&str] = &[
        NAME,
        DESCRIPTION,
        GLOBS,
        ALWAYS_APPLY,
        MODEL,
        ARGUMENT_HINT,
        LICENSE,
        TOOLS,
    ];
}

/// Known tool dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DialectId {
    Cursor,
    ClaudeSkill,
    ClaudeAgent,
    ClaudeCommand,
    Copilot,
    Kiro,
    AgentsMd,
}

impl DialectId {
    /// Every dialect, in detection priority order
    pub const ALL: [DialectId; 7] = [
        DialectId::Cursor,
        DialectId::ClaudeSkill,
        DialectId::ClaudeAgent,
        DialectId::ClaudeCommand,
        DialectId::Copilot,
        DialectId::Kiro,
        DialectId::AgentsMd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cursor => "cursor",
            Self::ClaudeSkill => "claude-skill",
            Self::ClaudeAgent => "claude-agent",
            Self::ClaudeCommand => "claude-command",
            Self::Copilot => "copilot",
            Self::Kiro => "kiro",
            Self::AgentsMd => "agents-md",
        }
    }

    /// Resolve a dialect name, accepting `_` for `-` and a few common aliases
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "cursor" | "cursor-rules" | "mdc" => Some(Self::Cursor),
            "claude-skill" | "skill" => Some(Self::ClaudeSkill),
            "claude-agent" | "agent" | "subagent" => Some(Self::ClaudeAgent),
            "claude-command" | "command" | "slash-command" => Some(Self::ClaudeCommand),
            "copilot" | "copilot-instructions" => Some(Self::Copilot),
            "kiro" | "kiro-steering" => Some(Self::Kiro),
            "agents-md" | "agents.md" | "agentsmd" => Some(Self::AgentsMd),
            _ => None,
        }
    }

    pub(crate) fn spec(&self) -> &'static DialectSpec {
        match self {
            Self::Cursor => &cursor::SPEC,
            Self::ClaudeSkill => &claude_skill::SPEC,
            Self::ClaudeAgent => &claude_agent::SPEC,
            Self::ClaudeCommand => &claude_command::SPEC,
            Self::Copilot => &copilot::SPEC,
            Self::Kiro => &kiro::SPEC,
            Self::AgentsMd => &agents_md::SPEC,
        }
    }

    /// Prefix for keys this dialect owns in canonical metadata
    pub fn key_prefix(&self) -> String {
        format!("{}:", self.as_str())
    }
}

impl fmt::Display for DialectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a dialect requires, allows or forbids front matter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrontMatterRule {
    Required,
    Optional,
    Forbidden,
}

/// One native front-matter key and the canonical key it maps to
#[derive(Debug, Clone, Copy)]
pub(crate) struct KeyMap {
    pub native: &'static str,
    pub canonical: &'static str,
    /// List values are rendered as one string joined with this separator
    pub join: Option<&'static str>,
}

impl KeyMap {
    pub(crate) const fn new(native: &'static str, canonical: &'static str) -> Self {
        Self {
            native,
            canonical,
            join: None,
        }
    }

    pub(crate) const fn joined(self, separator: &'static str) -> Self {
        Self {
            join: Some(separator),
            ..self
        }
    }
}

/// Static description of a dialect
pub(crate) struct DialectSpec {
    pub id: DialectId,
    pub front_matter: FrontMatterRule,
    /// Unknown front-matter keys are legal and pass through verbatim
    pub open_schema: bool,
    pub keys: &'static [KeyMap],
    /// Native keys that must be present for the input to be this dialect
    pub required: &'static [&'static str],
    /// Native key defaults applied when a serialized document lacks them
    pub defaults: &'static [(&'static str, &'static str)],
    pub body: BodyConventions,
    /// Field validation run on the decoded native front matter
    pub check: fn(&[(String, MetaValue)]) -> Result<(), ParseError>,
    /// Specificity bonus from body conventions
    pub bonus: fn(&str, &[Section]) -> u32,
}

impl DialectSpec {
    pub(crate) fn canonical_for(&self, native: &str) -> Option<&'static str> {
        self.keys
            .iter()
            .find(|k| k.native == native)
            .map(|k| k.canonical)
    }

    fn mapping_for(&self, canonical: &str) -> Option<&KeyMap> {
        self.keys.iter().find(|k| k.canonical == canonical)
    }

    pub(crate) fn tools_key(&self) -> Option<&'static str> {
        self.mapping_for(keys::TOOLS).map(|k| k.native)
    }

    pub(crate) fn knows_native(&self, native: &str) -> bool {
        self.canonical_for(native).is_some()
    }

    /// Whether an undeclared native key may be written to front matter
    pub(crate) fn accepts_custom(&self, native: &str) -> bool {
        self.open_schema
            && self.front_matter != FrontMatterRule::Forbidden
            && !native.trim().is_empty()
    }

    /// Native key a canonical key serializes under, or the reason it can't
    fn native_for(&self, canonical: &str) -> Result<String, &'static str> {
        if self.front_matter == FrontMatterRule::Forbidden {
            return Err("target has no front matter");
        }
        if let Some(map) = self.mapping_for(canonical) {
            return Ok(map.native.to_string());
        }
        if let Some(own) = canonical.strip_prefix(&self.id.key_prefix()) {
            return Ok(own.to_string());
        }
        if canonical.contains(':') {
            return Err("field belongs to another dialect");
        }
        if keys::ALL.contains(&canonical) {
            return Err("target has no equivalent field");
        }
        if self.open_schema {
            Ok(canonical.to_string())
        } else {
            Err("target does not accept custom fields")
        }
    }

    /// Canonical key an unrecognized native key is stored under
    fn stored_key(&self, native: &str) -> String {
        if !self.open_schema || keys::ALL.contains(&native) || native.contains(':') {
            format!("{}{}", self.id.key_prefix(), native)
        } else {
            native.to_string()
        }
    }
}

pub(crate) fn no_check(_: &[(String, MetaValue)]) -> Result<(), ParseError> {
    Ok(())
}

pub(crate) fn no_bonus(_: &str, _: &[Section]) -> u32 {
    0
}

/// A successful parse with its detection specificity
#[derive(Debug)]
pub(crate) struct Parsed {
    pub document: CanonicalDocument,
    pub specificity: u32,
}

/// Parse raw bytes as the given dialect.
///
/// A manifest that declares a different known dialect is a mismatch.
pub fn parse(
    dialect: DialectId,
    raw: &[u8],
    manifest: Option<&ManifestHints>,
) -> Result<CanonicalDocument, ParseError> {
    if let Some(declared) = manifest.and_then(ManifestHints::declared_dialect) {
        if declared != dialect {
            return Err(ParseError::mismatch(
                dialect,
                format!("manifest declares {}", declared),
            ));
        }
    }
    parse_with(dialect.spec(), raw).map(|p| p.document)
}

/// Serialize a document into the given dialect, resolving hints for it.
pub fn serialize(
    dialect: DialectId,
    doc: &CanonicalDocument,
    hints: Option<&ConversionHints>,
    report: &mut DegradationReport,
) -> Result<Vec<u8>, SerializeError> {
    let bag = hints::resolve(hints, dialect);
    serialize_with(dialect.spec(), doc, &bag, report)
}

/// Every newline is `\r\n`
fn uses_crlf(text: &str) -> bool {
    let crlf = text.matches("\r\n").count();
    crlf > 0 && crlf == text.matches('\n').count()
}

pub(crate) fn parse_with(spec: &DialectSpec, raw: &[u8]) -> Result<Parsed, ParseError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| ParseError::mismatch(spec.id, format!("input is not UTF-8: {}", e)))?;

    let crlf = uses_crlf(text);
    let text: Cow<str> = if crlf {
        Cow::Owned(text.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(text)
    };

    let (yaml, rest) = match spec.front_matter {
        FrontMatterRule::Forbidden if text.starts_with("---\n") => {
            return Err(ParseError::mismatch(spec.id, "dialect does not use front matter"));
        }
        FrontMatterRule::Forbidden => (None, text.as_ref()),
        _ => frontmatter::split(&text)?,
    };
    if spec.front_matter == FrontMatterRule::Required && yaml.is_none() {
        return Err(ParseError::mismatch(spec.id, "missing front matter"));
    }

    let entries = match yaml {
        Some(yaml) => frontmatter::decode(yaml)?,
        None => Vec::new(),
    };
    let raw_front_matter = yaml.and_then(|yaml| {
        let close = if rest.is_empty() && !text.ends_with('\n') {
            "---"
        } else {
            "---\n"
        };
        frontmatter::capture(yaml, close, &entries)
    });
    for required in spec.required {
        if !entries.iter().any(|(k, _)| k == required) {
            return Err(ParseError::mismatch(
                spec.id,
                format!("front matter lacks `{}`", required),
            ));
        }
    }
    (spec.check)(&entries)?;

    let mut specificity = 0;
    let mut sections = Vec::new();
    let mut pending = Fields::new();
    for (native, value) in entries {
        match spec.canonical_for(&native) {
            Some(keys::TOOLS) if is_tool_list(&value) => {
                specificity += 2;
                if !pending.is_empty() {
                    sections.push(Section::Metadata {
                        fields: std::mem::take(&mut pending),
                    });
                }
                let tools = value
                    .to_string_list()
                    .into_iter()
                    .map(ToolSpec::named)
                    .collect();
                sections.push(Section::ToolDefinitions { tools });
            }
            Some(canonical) => {
                specificity += 2;
                pending.insert(canonical, value);
            }
            None => pending.insert(spec.stored_key(&native), value),
        }
    }
    if !pending.is_empty() {
        sections.push(Section::Metadata { fields: pending });
    }

    // A body of blank lines only is kept whole rather than read as a gap
    let blank = rest.bytes().all(|b| b == b'\n');
    let (front_matter_gap, body_text) = match (yaml, rest.strip_prefix('\n')) {
        (Some(_), Some(stripped)) if !blank => (true, stripped),
        (Some(_), _) => (false, rest),
        (None, _) => (true, rest),
    };

    let body = body::parse(body_text, &spec.body);
    specificity += (spec.bonus)(body_text, &body.sections);
    sections.extend(body.sections);

    let layout = Layout {
        crlf,
        front_matter_gap,
        heading_gap: body.heading_gap,
        section_gap: body.section_gap,
        trailing_newline: body.trailing_newline,
        trailing_blank_lines: body.trailing_blank_lines,
        persona_heading: body.persona_heading,
        front_matter: raw_front_matter,
    };

    let document = CanonicalDocument::new(sections)
        .map_err(|e| ParseError::malformed(e.to_string()))?
        .with_source_dialect(spec.id)
        .with_layout(layout);

    tracing::debug!(
        dialect = %spec.id,
        sections = document.sections().len(),
        specificity,
        "parsed document"
    );
    Ok(Parsed {
        document,
        specificity,
    })
}

/// A comma-separated string or a list of strings
fn is_tool_list(value: &MetaValue) -> bool {
    match value {
        MetaValue::Text(_) => true,
        MetaValue::List(items) => items.iter().all(|i| i.as_str().is_some()),
        _ => false,
    }
}

fn upsert(entries: &mut Vec<(String, Entry)>, key: String, entry: Entry) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = entry,
        None => entries.push((key, entry)),
    }
}

fn check_encodable(spec: &DialectSpec, key: &str, value: &MetaValue) -> Result<(), SerializeError> {
    let bad = match value {
        MetaValue::Float(f) if !f.is_finite() => Some("non-finite number"),
        MetaValue::List(items) if items.iter().any(|i| !i.is_scalar()) => Some("nested list"),
        MetaValue::List(items)
            if items
                .iter()
                .any(|i| matches!(i, MetaValue::Float(f) if !f.is_finite())) =>
        {
            Some("non-finite number")
        }
        _ => None,
    };
    match bad {
        Some(reason) => Err(SerializeError::Encoding {
            dialect: spec.id,
            key: key.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn native_value(map: Option<&KeyMap>, value: &MetaValue) -> MetaValue {
    match (map.and_then(|m| m.join), value) {
        (Some(separator), MetaValue::List(items)) => MetaValue::Text(
            items
                .iter()
                .filter_map(MetaValue::as_str)
                .collect::<Vec<_>>()
                .join(separator),
        ),
        _ => value.clone(),
    }
}

pub(crate) fn serialize_with(
    spec: &DialectSpec,
    doc: &CanonicalDocument,
    bag: &DialectHintBag,
    report: &mut DegradationReport,
) -> Result<Vec<u8>, SerializeError> {
    let mut entries: Vec<(String, Entry)> = Vec::new();
    let mut body_sections: Vec<(usize, &Section)> = Vec::new();

    for (index, section) in doc.sections().iter().enumerate() {
        match section {
            Section::Metadata { fields } => {
                for (key, value) in fields.iter() {
                    match spec.native_for(key) {
                        Ok(native) => {
                            check_encodable(spec, key, value)?;
                            let value = native_value(spec.mapping_for(key), value);
                            upsert(&mut entries, native, Entry::Value(value));
                        }
                        Err(reason) => {
                            report.drop_field(index, SectionKind::Metadata, key, reason)
                        }
                    }
                }
            }
            Section::ToolDefinitions { tools } => {
                let described = tools.iter().any(|t| t.description.is_some());
                match spec.tools_key() {
                    Some(_) if described && spec.body.tools_section => {
                        body_sections.push((index, section))
                    }
                    Some(native) if spec.front_matter != FrontMatterRule::Forbidden => {
                        let names: Vec<String> = tools.iter().map(|t| t.name.clone()).collect();
                        let lost: Vec<&str> = tools
                            .iter()
                            .filter(|t| t.parameters.is_some() || t.description.is_some())
                            .map(|t| t.name.as_str())
                            .collect();
                        if !lost.is_empty() {
                            report.drop_field(
                                index,
                                SectionKind::ToolDefinitions,
                                &lost.join(", "),
                                "only tool names fit in front matter",
                            );
                        }
                        match entries.iter_mut().find(|(k, _)| k == native) {
                            Some((_, Entry::Tools(existing))) => existing.extend(names),
                            _ => upsert(&mut entries, native.to_string(), Entry::Tools(names)),
                        }
                    }
                    // The body renderer reports the loss
                    _ => body_sections.push((index, section)),
                }
            }
            _ => body_sections.push((index, section)),
        }
    }

    for (key, value) in bag.overrides.iter() {
        check_encodable(spec, key, value)?;
        let value = native_value(spec.canonical_for(key).and_then(|c| spec.mapping_for(c)), value);
        upsert(&mut entries, key.to_string(), Entry::Value(value));
    }
    for (key, value) in bag.defaults.iter() {
        if !entries.iter().any(|(k, _)| k == key) {
            entries.push((key.to_string(), Entry::Value(value.clone())));
        }
    }

    let layout = doc.layout();
    let body = body::render(&body_sections, &spec.body, layout, report);

    // Author text only applies to the dialect it was written in
    let raw = layout
        .front_matter
        .as_ref()
        .filter(|_| doc.source_dialect() == Some(spec.id));
    let with_front_matter = match spec.front_matter {
        FrontMatterRule::Required => true,
        FrontMatterRule::Optional => !entries.is_empty() || raw.is_some(),
        FrontMatterRule::Forbidden => false,
    };

    let mut out = String::new();
    if with_front_matter {
        out.push_str(&frontmatter::render(&entries, raw));
        if !body.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        if layout.front_matter_gap && !body.is_empty() {
            out.push('\n');
        }
    }
    out.push_str(&body);

    if layout.crlf {
        out = out.replace('\n', "\r\n");
    }
    Ok(out.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_names() {
        for id in DialectId::ALL {
            assert_eq!(DialectId::from_name(id.as_str()), Some(id));
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id));
        }
        assert_eq!(DialectId::from_name("Claude_Skill"), Some(DialectId::ClaudeSkill));
        assert_eq!(DialectId::from_name("AGENTS.md"), Some(DialectId::AgentsMd));
        assert_eq!(DialectId::from_name("windsurf"), None);
    }

    #[test]
    fn test_crlf_requires_consistency() {
        assert!(uses_crlf("a\r\nb\r\n"));
        assert!(!uses_crlf("a\r\nb\n"));
        assert!(!uses_crlf("a\nb\n"));
        assert!(!uses_crlf("single line"));
    }

    #[test]
    fn test_manifest_mismatch() {
        let manifest = ManifestHints {
            source_dialect: Some("kiro".to_string()),
            ..ManifestHints::default()
        };
        let err = parse(
            DialectId::Cursor,
            b"---\ndescription: x\n---\n",
            Some(&manifest),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ParseError::DialectMismatch {
                dialect: DialectId::Cursor,
                ..
            }
        ));
    }

    #[test]
    fn test_non_utf8_is_mismatch() {
        let err = parse(DialectId::AgentsMd, &[0xff, 0xfe, b'#'], None).unwrap_err();
        assert!(matches!(err, ParseError::DialectMismatch { .. }));
    }

    #[test]
    fn test_key_storage_rules() {
        // Open dialects keep plain keys plain
        assert_eq!(cursor::SPEC.stored_key("priority"), "priority");
        assert_eq!(cursor::SPEC.stored_key("model"), "cursor:model");
        assert_eq!(cursor::SPEC.stored_key("x:y"), "cursor:x:y");
        // Closed dialects own every unknown key
        assert_eq!(claude_skill::SPEC.stored_key("version"), "claude-skill:version");
    }

    #[test]
    fn test_native_key_resolution() {
        assert_eq!(copilot::SPEC.native_for("globs"), Ok("applyTo".to_string()));
        assert_eq!(
            claude_skill::SPEC.native_for("claude-skill:version"),
            Ok("version".to_string())
        );
        assert_eq!(kiro::SPEC.native_for("priority"), Ok("priority".to_string()));
        assert!(kiro::SPEC.native_for("cursor:model").is_err());
        assert!(copilot::SPEC.native_for("always_apply").is_err());
        assert!(claude_skill::SPEC.native_for("priority").is_err());
        assert!(agents_md::SPEC.native_for("description").is_err());
    }

    #[test]
    fn test_crlf_document_round_trips() {
        let raw = "---\r\ndescription: Windows rule\r\n---\r\n\r\n# Rules\r\n\r\n- One\r\n";
        let doc = parse(DialectId::Cursor, raw.as_bytes(), None).unwrap();
        assert!(doc.layout().crlf);
        let mut report = DegradationReport::default();
        let out = serialize(DialectId::Cursor, &doc, None, &mut report).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), raw);
        assert!(report.is_empty());
    }

    #[test]
    fn test_hint_encoding_is_checked() {
        let doc = CanonicalDocument::empty();
        let mut overrides = Fields::new();
        overrides.insert(
            "description",
            MetaValue::List(vec![MetaValue::List(vec![])]),
        );
        let bag = DialectHintBag {
            dialect: DialectId::Cursor,
            overrides,
            defaults: Fields::new(),
        };
        let mut report = DegradationReport::default();
        let err = serialize_with(&cursor::SPEC, &doc, &bag, &mut report).unwrap_err();
        assert!(matches!(err, SerializeError::Encoding { .. }));
    }

    #[test]
    fn test_author_quoting_survives_only_in_its_own_dialect() {
        let raw = "---\ndescription: 'Strict TS'\nglobs:\n  - \"*.ts\"\n---\n\n# Rules\n\n- No any\n";
        let doc = parse(DialectId::Cursor, raw.as_bytes(), None).unwrap();
        let mut report = DegradationReport::default();
        let out = serialize(DialectId::Cursor, &doc, None, &mut report).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), raw);

        let out = serialize(DialectId::Kiro, &doc, None, &mut report).unwrap();
        assert!(String::from_utf8(out)
            .unwrap()
            .starts_with("---\nfileMatchPattern: [\"*.ts\"]\ninclusion: always\n---\n"));
    }

    #[test]
    fn test_blank_body_after_front_matter() {
        for raw in ["---\ndescription: x\n---\n\n", "---\ndescription: x\n---\n\n\n"] {
            let doc = parse(DialectId::Cursor, raw.as_bytes(), None).unwrap();
            assert_eq!(doc.sections().len(), 1);
            let mut report = DegradationReport::default();
            let out = serialize(DialectId::Cursor, &doc, None, &mut report).unwrap();
            assert_eq!(String::from_utf8(out).unwrap(), raw);
        }
    }
}
