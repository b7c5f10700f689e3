//! Claude subagent definitions (`.claude/agents/*.md`).
//!
//! The only dialect with a persona concept: a `## Persona` section, or
//! leading prose that opens with "You are".

use super::body::BodyConventions;
use super::{keys, parse_with, DialectId, DialectSpec, FrontMatterRule, KeyMap};
use crate::error::{ParseError, SerializeError};
use crate::hints::ConversionHints;
use crate::model::{CanonicalDocument, MetaValue, Section};
use crate::report::DegradationReport;

pub(crate) static SPEC: DialectSpec = DialectSpec {
    id: DialectId::ClaudeAgent,
    front_matter: FrontMatterRule::Required,
    open_schema: false,
    keys: &[
        KeyMap::new("name", keys::NAME),
        KeyMap::new("description", keys::DESCRIPTION),
        KeyMap::new("model", keys::MODEL),
        KeyMap::new("tools", keys::TOOLS),
        KeyMap::new("color", "claude-agent:color"),
    ],
    required: &["name", "description"],
    defaults: &[("name", "unnamed-agent"), ("description", "")],
    body: BodyConventions {
        level: 2,
        tools_section: true,
        persona: true,
    },
    check: check_fields,
    bonus: persona_bonus,
};

pub fn parse(raw: &[u8]) -> Result<CanonicalDocument, ParseError> {
    parse_with(&SPEC, raw).map(|p| p.document)
}

pub fn serialize(
    doc: &CanonicalDocument,
    hints: Option<&ConversionHints>,
    report: &mut DegradationReport,
) -> Result<Vec<u8>, SerializeError> {
    super::serialize(DialectId::ClaudeAgent, doc, hints, report)
}

fn check_fields(entries: &[(String, MetaValue)]) -> Result<(), ParseError> {
    match entries.iter().find(|(k, _)| k == "name") {
        Some((_, MetaValue::Text(name))) if !name.trim().is_empty() => Ok(()),
        Some(_) => Err(ParseError::InvalidField {
            key: "name".to_string(),
            reason: "must be a non-empty string".to_string(),
        }),
        None => Ok(()),
    }
}

fn persona_bonus(_: &str, sections: &[Section]) -> u32 {
    u32::from(matches!(sections.first(), Some(Section::Persona { .. })))
}
