//! Claude slash commands (`.claude/commands/*.md`).
//!
//! Front matter is optional, so any UTF-8 text parses; argument
//! placeholders in the body are what set a command apart.

use super::body::BodyConventions;
use super::{keys, no_check, parse_with, DialectId, DialectSpec, FrontMatterRule, KeyMap};
use crate::error::{ParseError, SerializeError};
use crate::hints::ConversionHints;
use crate::model::{CanonicalDocument, Section};
use crate::report::DegradationReport;
use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(ARGUMENTS\b|[1-9]\b)").expect("placeholder pattern is valid"));

pub(crate) static SPEC: DialectSpec = DialectSpec {
    id: DialectId::ClaudeCommand,
    front_matter: FrontMatterRule::Optional,
    open_schema: false,
    keys: &[
        KeyMap::new("description", keys::DESCRIPTION),
        KeyMap::new("argument-hint", keys::ARGUMENT_HINT),
        KeyMap::new("model", keys::MODEL),
        KeyMap::new("allowed-tools", keys::TOOLS),
    ],
    required: &[],
    defaults: &[],
    body: BodyConventions {
        level: 2,
        tools_section: true,
        persona: false,
    },
    check: no_check,
    bonus: placeholder_bonus,
};

pub fn parse(raw: &[u8]) -> Result<CanonicalDocument, ParseError> {
    parse_with(&SPEC, raw).map(|p| p.document)
}

pub fn serialize(
    doc: &CanonicalDocument,
    hints: Option<&ConversionHints>,
    report: &mut DegradationReport,
) -> Result<Vec<u8>, SerializeError> {
    super::serialize(DialectId::ClaudeCommand, doc, hints, report)
}

fn placeholder_bonus(body: &str, _: &[Section]) -> u32 {
    if PLACEHOLDER.is_match(body) {
        2
    } else {
        0
    }
}
