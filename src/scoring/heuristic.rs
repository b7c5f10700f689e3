//! Structural heuristic. Never fails, never blocks.

use super::{QualityScore, ScoreSource};
use crate::model::{CanonicalDocument, Section, SectionKind};
use std::collections::BTreeSet;

const VARIETY_WEIGHT: f64 = 0.25;
const LENGTH_WEIGHT: f64 = 0.25;
const CORE_WEIGHT: f64 = 0.25;
const EXAMPLES_WEIGHT: f64 = 0.15;
const DESCRIPTION_WEIGHT: f64 = 0.10;

/// Distinct section kinds beyond this add nothing
const VARIETY_CAP: usize = 5;
/// Characters of content at which length credit starts to flatten
const LENGTH_KNEE: f64 = 1500.0;
const SHORT_CONTENT: usize = 200;

/// Length credit in `[0, 1]`: linear to 0.8 at the knee, then an
/// exponential approach to 1.
fn length_credit(chars: usize) -> f64 {
    let chars = chars as f64;
    if chars <= LENGTH_KNEE {
        0.8 * chars / LENGTH_KNEE
    } else {
        0.8 + 0.2 * (1.0 - (-(chars - LENGTH_KNEE) / LENGTH_KNEE).exp())
    }
}

pub fn heuristic_score(doc: &CanonicalDocument) -> QualityScore {
    let sections = doc.sections();
    let kinds: BTreeSet<SectionKind> = sections.iter().map(Section::kind).collect();
    let chars: usize = sections.iter().map(Section::text_len).sum();

    let has_core = kinds.contains(&SectionKind::Instructions) || kinds.contains(&SectionKind::RuleList);
    let examples: Vec<_> = sections
        .iter()
        .filter_map(|s| match s {
            Section::Examples { examples, .. } => Some(examples),
            _ => None,
        })
        .flatten()
        .collect();
    let has_description = doc
        .metadata("description")
        .and_then(|v| v.as_str())
        .is_some_and(|d| !d.trim().is_empty());

    let variety = kinds.len().min(VARIETY_CAP) as f64 / VARIETY_CAP as f64;
    let mut value = VARIETY_WEIGHT * variety + LENGTH_WEIGHT * length_credit(chars);
    if has_core {
        value += CORE_WEIGHT;
    }
    if !examples.is_empty() {
        value += EXAMPLES_WEIGHT;
    }
    if has_description {
        value += DESCRIPTION_WEIGHT;
    }

    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();

    if has_core {
        strengths.push("states explicit instructions or rules".to_string());
    } else {
        weaknesses.push("no instructions or rules section".to_string());
    }
    if examples.is_empty() {
        weaknesses.push("no worked examples".to_string());
    } else {
        strengths.push(format!("includes {} example(s)", examples.len()));
        let low = examples.iter().filter(|e| e.is_low_information()).count();
        if low > 0 {
            weaknesses.push(format!("{} example(s) have neither description nor code", low));
        }
    }
    if has_description {
        strengths.push("has a description".to_string());
    } else {
        weaknesses.push("missing description".to_string());
    }
    if kinds.len() >= 3 {
        strengths.push(format!("covers {} kinds of content", kinds.len()));
    }
    if chars < SHORT_CONTENT {
        weaknesses.push(format!("very little content ({} characters)", chars));
    }

    QualityScore {
        value: value.clamp(0.0, 1.0),
        rationale: format!(
            "Structural heuristic over {} section(s), {} distinct kind(s), {} characters of content",
            sections.len(),
            kinds.len(),
            chars
        ),
        strengths,
        weaknesses,
        source: ScoreSource::Heuristic,
    }
}
