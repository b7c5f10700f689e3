//! Content quality scoring.
//!
//! [`Scorer::score`] always returns a value in `[0, 1]`. When LLM scoring
//! is enabled and an [`Evaluator`] is attached, the document is graded
//! against a rubric; any failure on that path (disabled, transport,
//! timeout, unparseable reply) falls back to the structural heuristic.

mod heuristic;
mod http;
mod rubric;

pub use heuristic::heuristic_score;
pub use http::HttpEvaluator;
pub use rubric::{build_prompt, render_for_review, Rubric};

use crate::config::{Config, ScoringConfig};
use crate::dialects::DialectId;
use crate::error::ScoreError;
use crate::model::CanonicalDocument;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What kind of package the document is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subtype {
    Rule,
    Skill,
    Agent,
    SlashCommand,
    Prompt,
}

impl Subtype {
    /// The subtype a dialect's files usually are
    pub fn natural_for(dialect: DialectId) -> Self {
        match dialect {
            DialectId::ClaudeSkill => Subtype::Skill,
            DialectId::ClaudeAgent => Subtype::Agent,
            DialectId::ClaudeCommand => Subtype::SlashCommand,
            _ => Subtype::Rule,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreContext {
    pub dialect: DialectId,
    pub subtype: Subtype,
}

impl ScoreContext {
    pub fn new(dialect: DialectId, subtype: Subtype) -> Self {
        Self { dialect, subtype }
    }

    pub fn for_dialect(dialect: DialectId) -> Self {
        Self::new(dialect, Subtype::natural_for(dialect))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreSource {
    Llm,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityScore {
    /// In `[0, 1]`
    pub value: f64,
    pub rationale: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub source: ScoreSource,
}

/// Sends a prompt to a language model and returns its raw reply
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, prompt: &str) -> Result<String, ScoreError>;
}

#[derive(Clone, Default)]
pub struct Scorer {
    config: ScoringConfig,
    evaluator: Option<Arc<dyn Evaluator>>,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            evaluator: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Scorer wired to the configured HTTP backend when LLM scoring is on
    pub fn from_config(config: &Config) -> Self {
        let scorer = Self::new(config.scoring.clone());
        if !config.scoring.llm_enabled() {
            return scorer;
        }
        match HttpEvaluator::from_config(config) {
            Some(evaluator) => scorer.with_evaluator(Arc::new(evaluator)),
            None => {
                tracing::warn!(
                    target = ?config.scoring.target,
                    "scoring target has no configured backend; using heuristic only"
                );
                scorer
            }
        }
    }

    fn llm_active(&self) -> bool {
        self.config.llm_enabled() && self.evaluator.is_some()
    }

    /// Score a document. Never fails.
    pub fn score(&self, doc: &CanonicalDocument, ctx: ScoreContext) -> QualityScore {
        let heuristic = heuristic_score(doc);
        match self.llm_score(doc, &ctx) {
            Ok(score) => score,
            Err(e) => fallback(e, heuristic),
        }
    }

    /// Score on tokio's blocking pool, bounded by the configured timeout.
    ///
    /// Dropping the returned future stops waiting for the LLM; the heuristic
    /// needs no waiting.
    pub async fn score_async(&self, doc: &CanonicalDocument, ctx: ScoreContext) -> QualityScore {
        let heuristic = heuristic_score(doc);
        if !self.llm_active() {
            return fallback(ScoreError::Disabled, heuristic);
        }

        let scorer = self.clone();
        let owned = doc.clone();
        let task = tokio::task::spawn_blocking(move || scorer.llm_score(&owned, &ctx));
        let timeout = self.config.timeout();

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(score))) => score,
            Ok(Ok(Err(e))) => fallback(e, heuristic),
            Ok(Err(join)) => fallback(ScoreError::Transport(join.to_string()), heuristic),
            Err(_) => fallback(ScoreError::Timeout(timeout.as_millis() as u64), heuristic),
        }
    }

    fn llm_score(&self, doc: &CanonicalDocument, ctx: &ScoreContext) -> Result<QualityScore, ScoreError> {
        if !self.config.llm_enabled() {
            return Err(ScoreError::Disabled);
        }
        let evaluator = self.evaluator.as_ref().ok_or(ScoreError::Disabled)?;
        let prompt = build_prompt(doc, ctx);
        let reply = evaluator.evaluate(&prompt)?;
        parse_response(&reply)
    }
}

fn fallback(error: ScoreError, heuristic: QualityScore) -> QualityScore {
    match error {
        ScoreError::Disabled => tracing::debug!("LLM scoring disabled; using heuristic"),
        e => tracing::warn!(error = %e, "LLM scoring failed; using heuristic"),
    }
    heuristic
}

static SCORE_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(-?\d+(?:\.\d+)?)\s*(%|/\s*(\d+))?").expect("score pattern is valid")
});

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Rationale,
    Strengths,
    Weaknesses,
}

/// `SCORE:` line value, normalized to `[0, 1]`
fn parse_score(text: &str) -> Option<f64> {
    let caps = SCORE_VALUE.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let value = match (caps.get(2).map(|m| m.as_str()), caps.get(3)) {
        (Some("%"), _) => value / 100.0,
        (_, Some(scale)) => {
            let scale: f64 = scale.as_str().parse().ok()?;
            if scale <= 0.0 {
                return None;
            }
            value / scale
        }
        _ => value,
    };
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

/// Split a `HEADER: rest` line, tolerating markdown emphasis around the header
fn header<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let line = line.trim().trim_start_matches(['*', '#', ' ']);
    let (head, rest) = line.split_once(':')?;
    if head.trim_end_matches('*').trim().eq_ignore_ascii_case(name) {
        Some(rest.trim_start_matches('*').trim())
    } else {
        None
    }
}

/// Parse a `SCORE` / `RATIONALE` / `STRENGTHS` / `WEAKNESSES` reply.
///
/// A reply without a numeric score is unparseable.
pub fn parse_response(reply: &str) -> Result<QualityScore, ScoreError> {
    let mut value = None;
    let mut rationale: Vec<String> = Vec::new();
    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    let mut current: Option<Field> = None;

    for line in reply.lines() {
        if let Some(rest) = header(line, "SCORE") {
            value = value.or_else(|| parse_score(rest));
            current = None;
            continue;
        }
        let switched = [
            ("RATIONALE", Field::Rationale),
            ("STRENGTHS", Field::Strengths),
            ("WEAKNESSES", Field::Weaknesses),
        ]
        .into_iter()
        .find_map(|(name, field)| header(line, name).map(|rest| (field, rest)));

        let (field, text) = match switched {
            Some((field, rest)) => {
                current = Some(field);
                (field, rest)
            }
            None => match current {
                Some(field) => (field, line.trim()),
                None => continue,
            },
        };
        if text.is_empty() {
            continue;
        }
        match field {
            Field::Rationale => rationale.push(text.to_string()),
            Field::Strengths | Field::Weaknesses => {
                let item = text.trim_start_matches(['-', '*', '•']).trim();
                let target = if field == Field::Strengths {
                    &mut strengths
                } else {
                    &mut weaknesses
                };
                if !item.is_empty() && !item.eq_ignore_ascii_case("none") {
                    target.push(item.to_string());
                }
            }
        }
    }

    let value = value.ok_or_else(|| {
        ScoreError::Unparseable(reply.chars().take(120).collect::<String>())
    })?;
    Ok(QualityScore {
        value,
        rationale: rationale.join(" "),
        strengths,
        weaknesses,
        source: ScoreSource::Llm,
    })
}
