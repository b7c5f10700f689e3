//! Cursor rule files (`.cursor/rules/*.mdc`).
//!
//! Front matter is required but open: unknown keys pass through. Sections
//! start at `#`.

use super::body::BodyConventions;
use super::{keys, no_bonus, no_check, parse_with, DialectId, DialectSpec, FrontMatterRule, KeyMap};
use crate::error::{ParseError, SerializeError};
use crate::hints::ConversionHints;
use crate::model::CanonicalDocument;
use crate::report::DegradationReport;

pub(crate) static SPEC: DialectSpec = DialectSpec {
    id: DialectId::Cursor,
    front_matter: FrontMatterRule::Required,
    open_schema: true,
    keys: &[
        KeyMap::new("description", keys::DESCRIPTION),
        KeyMap::new("globs", keys::GLOBS),
        KeyMap::new("alwaysApply", keys::ALWAYS_APPLY),
    ],
    required: &[],
    defaults: &[],
    body: BodyConventions {
        level: 1,
        tools_section: false,
        persona: false,
    },
    check: no_check,
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
    super::serialize(DialectId::Cursor, doc, hints, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MetaValue, Section, SectionKind};

    const RULE: &str = r#"---
description: TypeScript conventions
globs: ["src/**/*.ts"]
alwaysApply: false
priority: high
---

# Rules

- Use strict types
- No any
"#;

    #[test]
    fn test_parse_maps_native_keys() {
        let doc = parse(RULE.as_bytes()).unwrap();
        assert_eq!(doc.source_dialect(), Some(DialectId::Cursor));
        assert_eq!(
            doc.metadata("description"),
            Some(&MetaValue::from("TypeScript conventions"))
        );
        assert_eq!(doc.metadata("always_apply"), Some(&MetaValue::Bool(false)));
        assert_eq!(doc.metadata("priority"), Some(&MetaValue::from("high")));
        assert_eq!(
            doc.sections()[1],
            Section::rules(Some("Rules"), ["Use strict types", "No any"])
        );
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let doc = parse(RULE.as_bytes()).unwrap();
        let mut report = DegradationReport::default();
        let out = serialize(&doc, None, &mut report).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), RULE);
        assert!(report.is_empty());
    }

    #[test]
    fn test_requires_front_matter() {
        let err = parse(b"# Rules\n\n- one\n").unwrap_err();
        assert!(matches!(err, ParseError::DialectMismatch { .. }));
    }

    #[test]
    fn test_unterminated_front_matter() {
        let err = parse(b"---\ndescription: x\n# Rules\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedFrontMatter(_)));
    }

    #[test]
    fn test_colliding_key_is_prefixed() {
        let doc = parse(b"---\nmodel: fast\n---\n").unwrap();
        assert_eq!(doc.metadata("cursor:model"), Some(&MetaValue::from("fast")));
        assert!(doc.metadata("model").is_none());

        let mut report = DegradationReport::default();
        let out = serialize(&doc, None, &mut report).unwrap();
        assert_eq!(out, b"---\nmodel: fast\n---\n");
    }

    #[test]
    fn test_persona_from_other_dialect_degrades() {
        let doc = CanonicalDocument::new(vec![
            Section::Persona {
                body: "You are strict.".to_string(),
            },
            Section::rules(None, ["One"]),
        ])
        .unwrap();
        let mut report = DegradationReport::default();
        let out = serialize(&doc, None, &mut report).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "---\n---\n\n# Rules\n\n- One\n"
        );
        assert!(report.mentions(SectionKind::Persona));
    }
}
