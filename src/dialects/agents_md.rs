//! `AGENTS.md`: plain markdown with no front matter.
//!
//! Metadata and tools have nowhere to go, so converting into this dialect
//! always reports them.

use super::body::{self, BodyConventions};
use super::{no_check, parse_with, DialectId, DialectSpec, FrontMatterRule};
use crate::error::{ParseError, SerializeError};
use crate::hints::ConversionHints;
use crate::model::{CanonicalDocument, Section};
use crate::report::DegradationReport;

pub(crate) static SPEC: DialectSpec = DialectSpec {
    id: DialectId::AgentsMd,
    front_matter: FrontMatterRule::Forbidden,
    open_schema: false,
    keys: &[],
    required: &[],
    defaults: &[],
    body: BodyConventions {
        level: 2,
        tools_section: false,
        persona: false,
    },
    check: no_check,
    bonus: heading_bonus,
};

pub fn parse(raw: &[u8]) -> Result<CanonicalDocument, ParseError> {
    parse_with(&SPEC, raw).map(|p| p.document)
}

pub fn serialize(
    doc: &CanonicalDocument,
    hints: Option<&ConversionHints>,
    report: &mut DegradationReport,
) -> Result<Vec<u8>, SerializeError> {
    super::serialize(DialectId::AgentsMd, doc, hints, report)
}

/// Structured markdown is the only signal this dialect has
fn heading_bonus(text: &str, _: &[Section]) -> u32 {
    u32::from(body::has_heading(text))
}
