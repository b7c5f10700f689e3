//! Kiro steering files (`.kiro/steering/*.md`).

use super::body::BodyConventions;
use super::{keys, no_bonus, no_check, parse_with, DialectId, DialectSpec, FrontMatterRule, KeyMap};
use crate::error::{ParseError, SerializeError};
use crate::hints::ConversionHints;
use crate::model::CanonicalDocument;
use crate::report::DegradationReport;

pub(crate) static SPEC: DialectSpec = DialectSpec {
    id: DialectId::Kiro,
    front_matter: FrontMatterRule::Required,
    open_schema: true,
    keys: &[
        KeyMap::new("inclusion", "kiro:inclusion"),
        KeyMap::new("fileMatchPattern", keys::GLOBS),
    ],
    required: &["inclusion"],
    defaults: &[("inclusion", "always")],
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
    super::serialize(DialectId::Kiro, doc, hints, report)
}
