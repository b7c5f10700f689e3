//! GitHub Copilot path-scoped instructions (`*.instructions.md`).

use super::body::BodyConventions;
use super::{keys, no_bonus, no_check, parse_with, DialectId, DialectSpec, FrontMatterRule, KeyMap};
use crate::error::{ParseError, SerializeError};
use crate::hints::ConversionHints;
use crate::model::CanonicalDocument;
use crate::report::DegradationReport;

pub(crate) static SPEC: DialectSpec = DialectSpec {
    id: DialectId::Copilot,
    front_matter: FrontMatterRule::Required,
    open_schema: false,
    keys: &[
        // `applyTo` takes one comma-separated pattern string
        KeyMap::new("applyTo", keys::GLOBS).joined(","),
        KeyMap::new("description", keys::DESCRIPTION),
        KeyMap::new("excludeAgent", "copilot:excludeAgent"),
    ],
    required: &["applyTo"],
    defaults: &[("applyTo", "**")],
    body: BodyConventions {
        level: 2,
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
    super::serialize(DialectId::Copilot, doc, hints, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Fields, MetaValue, Section, SectionKind};

    const INSTRUCTIONS: &str = r#"---
applyTo: "**/*.ts,**/*.tsx"
excludeAgent: code-review
---

## Conventions

- Prefer named exports
- Keep components pure
"#;

    #[test]
    fn test_round_trip_is_byte_identical() {
        let doc = parse(INSTRUCTIONS.as_bytes()).unwrap();
        assert_eq!(
            doc.metadata("globs"),
            Some(&MetaValue::from("**/*.ts,**/*.tsx"))
        );
        assert_eq!(doc.sections()[1].kind(), SectionKind::RuleList);

        let mut report = DegradationReport::default();
        let out = serialize(&doc, None, &mut report).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), INSTRUCTIONS);
        assert!(report.is_empty());
    }

    #[test]
    fn test_requires_apply_to() {
        let err = parse(b"---\ndescription: x\n---\n").unwrap_err();
        assert!(matches!(err, ParseError::DialectMismatch { .. }));
    }

    #[test]
    fn test_glob_lists_are_joined() {
        let mut fields = Fields::new();
        fields.insert("globs", MetaValue::from(vec!["src/**/*.ts", "lib/**/*.ts"]));
        fields.insert("always_apply", MetaValue::Bool(false));
        let doc = CanonicalDocument::new(vec![Section::Metadata { fields }]).unwrap();

        let mut report = DegradationReport::default();
        let out = serialize(&doc, None, &mut report).unwrap();
        assert_eq!(out, b"---\napplyTo: src/**/*.ts,lib/**/*.ts\n---\n");
        assert!(report.mentions_subject("always_apply"));
    }
}
