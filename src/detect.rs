//! Format detection.
//!
//! Every dialect parser runs against the input in priority order. Parsers
//! that reject the input are skipped; the rest report how specific the
//! match was (recognized native keys, body conventions). The most specific
//! parser wins and ties go to the earlier dialect. Only a dialect mismatch
//! counts as rejection; broken front matter is kept as the likely cause
//! when nothing matches.

use crate::dialects::{parse_with, DialectId};
use crate::error::{ConversionError, DetectionError, ParseError};

/// Specificity of one dialect for some input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub dialect: DialectId,
    pub specificity: u32,
}

/// Identify the dialect of raw input.
///
/// A hint naming a known dialect is trusted without looking at the input.
pub fn detect(raw: &[u8], manifest_hint: Option<&str>) -> Result<DialectId, DetectionError> {
    if let Some(dialect) = declared(manifest_hint) {
        return Ok(dialect);
    }
    best(&survey(raw).candidates).ok_or(DetectionError::UnknownDialect)
}

/// Like [`detect`], but when no dialect accepts the input and a parser
/// rejected it as broken rather than foreign, that parse error is returned.
pub fn detect_source(raw: &[u8], manifest_hint: Option<&str>) -> Result<DialectId, ConversionError> {
    if let Some(dialect) = declared(manifest_hint) {
        return Ok(dialect);
    }
    let survey = survey(raw);
    match (best(&survey.candidates), survey.defect) {
        (Some(dialect), _) => Ok(dialect),
        (None, Some(defect)) => Err(ConversionError::Parse(defect)),
        (None, None) => Err(DetectionError::UnknownDialect.into()),
    }
}

/// Every dialect that accepts the input, in priority order
pub fn candidates(raw: &[u8]) -> Vec<Candidate> {
    survey(raw).candidates
}

struct Survey {
    candidates: Vec<Candidate>,
    /// First error other than a dialect mismatch
    defect: Option<ParseError>,
}

fn survey(raw: &[u8]) -> Survey {
    let mut survey = Survey {
        candidates: Vec::new(),
        defect: None,
    };
    for dialect in DialectId::ALL {
        match parse_with(dialect.spec(), raw) {
            Ok(parsed) => survey.candidates.push(Candidate {
                dialect,
                specificity: parsed.specificity,
            }),
            Err(e @ ParseError::DialectMismatch { .. }) => {
                tracing::debug!(%dialect, error = %e, "candidate rejected");
            }
            Err(e) => {
                tracing::debug!(%dialect, error = %e, "candidate failed to parse");
                survey.defect.get_or_insert(e);
            }
        }
    }
    survey
}

fn declared(manifest_hint: Option<&str>) -> Option<DialectId> {
    let hint = manifest_hint?;
    match DialectId::from_name(hint) {
        Some(dialect) => {
            tracing::debug!(%dialect, "dialect declared by manifest");
            Some(dialect)
        }
        None => {
            tracing::debug!(hint, "ignoring unknown dialect hint");
            None
        }
    }
}

/// Highest specificity wins, ties go to the earlier dialect, zero never wins
fn best(candidates: &[Candidate]) -> Option<DialectId> {
    let mut best: Option<Candidate> = None;
    for &candidate in candidates {
        if candidate.specificity == 0 {
            continue;
        }
        if best.map_or(true, |b| candidate.specificity > b.specificity) {
            best = Some(candidate);
        }
    }
    let winner = best?;
    tracing::debug!(dialect = %winner.dialect, specificity = winner.specificity, "detected dialect");
    Some(winner.dialect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_rule() {
        let raw = b"---\ndescription: TS rules\nglobs: \"*.ts\"\nalwaysApply: false\n---\n\n# Rules\n\n- No any\n";
        assert_eq!(detect(raw, None), Ok(DialectId::Cursor));
    }

    #[test]
    fn test_skill_beats_agent_and_command() {
        let raw = b"---\nname: reader\ndescription: Reads\nallowed-tools: Read\n---\n\nRead only.\n";
        assert_eq!(detect(raw, None), Ok(DialectId::ClaudeSkill));
    }

    #[test]
    fn test_agent_with_tools_and_model() {
        let raw = b"---\nname: reviewer\ndescription: Reviews\ntools: Read\nmodel: sonnet\n---\n\nYou are a reviewer.\n";
        assert_eq!(detect(raw, None), Ok(DialectId::ClaudeAgent));
    }

    #[test]
    fn test_command_placeholder() {
        assert_eq!(
            detect(b"Explain the function $1 in detail.\n", None),
            Ok(DialectId::ClaudeCommand)
        );
    }

    #[test]
    fn test_copilot_and_kiro() {
        assert_eq!(
            detect(b"---\napplyTo: \"**/*.py\"\n---\n\nUse type hints.\n", None),
            Ok(DialectId::Copilot)
        );
        assert_eq!(
            detect(b"---\ninclusion: always\n---\n\n## Stack\n\nRust.\n", None),
            Ok(DialectId::Kiro)
        );
    }

    #[test]
    fn test_agents_md_needs_structure() {
        assert_eq!(
            detect(b"# Agents\n\nRun tests first.\n", None),
            Ok(DialectId::AgentsMd)
        );
    }

    #[test]
    fn test_plain_text_is_unknown() {
        assert_eq!(
            detect(b"just some notes without any markers\n", None),
            Err(DetectionError::UnknownDialect)
        );
        assert_eq!(detect(&[0xff, 0x00, 0x13], None), Err(DetectionError::UnknownDialect));
    }

    #[test]
    fn test_hint_is_trusted() {
        assert_eq!(
            detect(b"just notes\n", Some("agents_md")),
            Ok(DialectId::AgentsMd)
        );
        assert_eq!(
            detect(b"just notes\n", Some("not-a-dialect")),
            Err(DetectionError::UnknownDialect)
        );
    }

    #[test]
    fn test_detection_is_deterministic() {
        let raw = b"---\nname: a\ndescription: b\n---\n\nbody\n";
        let first = detect(raw, None);
        for _ in 0..5 {
            assert_eq!(detect(raw, None), first);
        }
        // Equal specificity: skill precedes agent
        assert_eq!(first, Ok(DialectId::ClaudeSkill));
    }

    #[test]
    fn test_broken_front_matter_is_reported_as_such() {
        let unclosed_list = b"---\nglobs: [\"*.ts\"\n---\n\n# Rules\n";
        assert_eq!(detect(unclosed_list, None), Err(DetectionError::UnknownDialect));
        assert!(matches!(
            detect_source(unclosed_list, None),
            Err(ConversionError::Parse(ParseError::MalformedFrontMatter(_)))
        ));

        let unterminated = b"---\ndescription: x\n\n# Rules\n";
        assert!(matches!(
            detect_source(unterminated, None),
            Err(ConversionError::Parse(ParseError::MalformedFrontMatter(_)))
        ));
        assert!(candidates(unterminated).is_empty());
    }

    #[test]
    fn test_foreign_input_stays_unknown() {
        assert_eq!(
            detect_source(b"just some notes without any markers\n", None),
            Err(ConversionError::Detection(DetectionError::UnknownDialect))
        );
    }
}
