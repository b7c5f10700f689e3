//! Claude skill packs (`SKILL.md`).

use super::body::BodyConventions;
use super::{keys, no_bonus, parse_with, DialectId, DialectSpec, FrontMatterRule, KeyMap};
use crate::error::{ParseError, SerializeError};
use crate::hints::ConversionHints;
use crate::model::{CanonicalDocument, MetaValue};
use crate::report::DegradationReport;

const MAX_NAME_LEN: usize = 64;
const MAX_DESCRIPTION_LEN: usize = 1024;

pub(crate) static SPEC: DialectSpec = DialectSpec {
    id: DialectId::ClaudeSkill,
    front_matter: FrontMatterRule::Required,
    open_schema: false,
    keys: &[
        KeyMap::new("name", keys::NAME),
        KeyMap::new("description", keys::DESCRIPTION),
        KeyMap::new("license", keys::LICENSE),
        KeyMap::new("allowed-tools", keys::TOOLS),
    ],
    required: &["name", "description"],
    defaults: &[("name", "unnamed-skill"), ("description", "")],
    body: BodyConventions {
        level: 2,
        tools_section: true,
        persona: false,
    },
    check: check_fields,
    bonus: no_bonus,
};

pub fn parse(raw: &[u8]) -> Result<CanonicalDocument, ParseError> {
    parse_with(&SPEC, raw).map(|p| p.document)
}

pub fn serialize(
    doc: &CanonicalDocument,
    hints: Option<&ConversionHints>,
    report: &mut DegradationReport,
) -> Result<Vec<u8>, SerializeError> {
    super::serialize(DialectId::ClaudeSkill, doc, hints, report)
}

fn check_fields(entries: &[(String, MetaValue)]) -> Result<(), ParseError> {
    for (key, value) in entries {
        match key.as_str() {
            "name" => validate_name(value)?,
            "description" => validate_description(value)?,
            _ => {}
        }
    }
    Ok(())
}

fn invalid(key: &str, reason: impl Into<String>) -> ParseError {
    ParseError::InvalidField {
        key: key.to_string(),
        reason: reason.into(),
    }
}

pub(crate) fn validate_name(value: &MetaValue) -> Result<(), ParseError> {
    let name = value
        .as_str()
        .ok_or_else(|| invalid("name", "must be a string"))?;
    if name.is_empty() {
        return Err(invalid("name", "must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name", format!("exceeds {} chars", MAX_NAME_LEN)));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            "name",
            "must be lowercase letters, numbers, hyphens only",
        ));
    }
    Ok(())
}

pub(crate) fn validate_description(value: &MetaValue) -> Result<(), ParseError> {
    let desc = value
        .as_str()
        .ok_or_else(|| invalid("description", "must be a string"))?;
    if desc.len() > MAX_DESCRIPTION_LEN {
        return Err(invalid(
            "description",
            format!("exceeds {} chars", MAX_DESCRIPTION_LEN),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Section, SectionKind, ToolSpec};

    const SKILL: &str = r#"---
name: safe-file-reader
description: Read files without making changes
allowed-tools: Read, Grep, Glob
---

Only inspect files; do not modify.

## Rules

- Never write to disk
- Quote paths exactly
"#;

    #[test]
    fn test_parse_skill() {
        let doc = parse(SKILL.as_bytes()).unwrap();
        assert_eq!(
            doc.metadata("name"),
            Some(&MetaValue::from("safe-file-reader"))
        );
        let tools = doc
            .sections()
            .iter()
            .find_map(|s| match s {
                Section::ToolDefinitions { tools } => Some(tools.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            tools,
            vec![
                ToolSpec::named("Read"),
                ToolSpec::named("Grep"),
                ToolSpec::named("Glob")
            ]
        );
        let kinds: Vec<_> = doc.sections().iter().map(Section::kind).collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::Metadata,
                SectionKind::ToolDefinitions,
                SectionKind::Instructions,
                SectionKind::RuleList
            ]
        );
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let doc = parse(SKILL.as_bytes()).unwrap();
        let mut report = DegradationReport::default();
        let out = serialize(&doc, None, &mut report).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), SKILL);
        assert!(report.is_empty());
    }

    #[test]
    fn test_yaml_list_tools_keep_their_form() {
        let content = r#"---
name: test-skill
description: A test skill
allowed-tools:
  - Read
  - Write
---

Instructions here.
"#;
        let doc = parse(content.as_bytes()).unwrap();
        let mut report = DegradationReport::default();
        let out = serialize(&doc, None, &mut report).unwrap();
        assert_eq!(out, content.as_bytes());

        // Another dialect gets the canonical tool line
        let out = crate::dialects::serialize(DialectId::ClaudeAgent, &doc, None, &mut report).unwrap();
        assert!(String::from_utf8_lossy(&out).contains("tools: Read, Write\n"));
    }

    #[test]
    fn test_invalid_name() {
        let content = "---\nname: Invalid_Name\ndescription: Bad name\n---\n";
        let err = parse(content.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidField { ref key, .. } if key == "name"));
    }

    #[test]
    fn test_requires_name_and_description() {
        let err = parse(b"---\nname: only-name\n---\n").unwrap_err();
        assert!(matches!(err, ParseError::DialectMismatch { .. }));
    }

    #[test]
    fn test_unknown_keys_are_owned_and_restored() {
        let content = "---\nname: x\ndescription: y\nversion: 2\n---\n";
        let doc = parse(content.as_bytes()).unwrap();
        assert_eq!(
            doc.metadata("claude-skill:version"),
            Some(&MetaValue::Integer(2))
        );
        let mut report = DegradationReport::default();
        let out = serialize(&doc, None, &mut report).unwrap();
        assert_eq!(out, content.as_bytes());
        assert!(report.is_empty());
    }

    #[test]
    fn test_defaults_fill_required_keys() {
        let doc = CanonicalDocument::new(vec![Section::instructions(None, "Do the thing.")])
            .unwrap();
        let mut report = DegradationReport::default();
        let out = serialize(&doc, None, &mut report).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "---\nname: unnamed-skill\ndescription: \"\"\n---\n\nDo the thing.\n"
        );
    }
}
