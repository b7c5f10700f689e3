use promptpack::config::ScoringConfig;
use promptpack::{
    dialects, CanonicalDocument, DialectId, Evaluator, Example, ScoreContext, ScoreError,
    ScoreSource, Scorer, Section, Subtype,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn rich_document() -> CanonicalDocument {
    CanonicalDocument::new(vec![
        Section::instructions(None, "Review pull requests for the payments service."),
        Section::rules(
            Some("Rules"),
            [
                "Reject unchecked casts",
                "Require tests for new branches",
                "Flag blocking calls in handlers",
                "Keep public APIs documented",
                "Prefer early returns",
            ],
        ),
        Section::Examples {
            title: None,
            examples: vec![
                Example {
                    title: Some("Unchecked cast".to_string()),
                    code: Some("let n = x as u8;".to_string()),
                    language: Some("rust".to_string()),
                    ..Example::default()
                },
                Example {
                    title: Some("Missing test".to_string()),
                    description: Some("A new match arm without coverage.".to_string()),
                    ..Example::default()
                },
            ],
        },
    ])
    .unwrap()
}

fn ctx() -> ScoreContext {
    ScoreContext::new(DialectId::Cursor, Subtype::Rule)
}

/// Counts calls and answers with a fixed reply
struct Recording {
    reply: Result<&'static str, ()>,
    calls: AtomicUsize,
}

impl Recording {
    fn new(reply: Result<&'static str, ()>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
        })
    }
}

impl Evaluator for Recording {
    fn evaluate(&self, prompt: &str) -> Result<String, ScoreError> {
        assert!(prompt.contains("=== DOCUMENT ==="));
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .map(str::to_string)
            .map_err(|_| ScoreError::Transport("offline".to_string()))
    }
}

fn llm_config() -> ScoringConfig {
    ScoringConfig {
        llm_enabled: Some(true),
        timeout_ms: Some(2000),
        ..ScoringConfig::default()
    }
}

#[test]
fn richer_document_outscores_a_stub() {
    let stub = CanonicalDocument::new(vec![Section::instructions(None, "Be nice to the user.")]).unwrap();
    let scorer = Scorer::default();
    let rich = scorer.score(&rich_document(), ctx());
    let poor = scorer.score(&stub, ctx());
    assert_eq!(rich.source, ScoreSource::Heuristic);
    assert!(rich.value > poor.value);
}

#[test]
fn disabled_llm_is_never_called() {
    let evaluator = Recording::new(Ok("SCORE: 0.9"));
    let scorer = Scorer::new(ScoringConfig::default()).with_evaluator(evaluator.clone());
    scorer.score(&rich_document(), ctx());
    assert_eq!(evaluator.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn llm_reply_is_used_and_clamped() {
    let evaluator = Recording::new(Ok("SCORE: 1.4\nRATIONALE: Excellent.\nSTRENGTHS:\n- specific\nWEAKNESSES:\n- none"));
    let scorer = Scorer::new(llm_config()).with_evaluator(evaluator.clone());
    let score = scorer.score(&rich_document(), ctx());
    assert_eq!(score.source, ScoreSource::Llm);
    assert_eq!(score.value, 1.0);
    assert_eq!(score.rationale, "Excellent.");
    assert_eq!(score.strengths, vec!["specific"]);
    assert!(score.weaknesses.is_empty());
    assert_eq!(evaluator.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn every_failure_lands_in_range() {
    let docs = [CanonicalDocument::empty(), rich_document()];
    let replies = [Err(()), Ok("no score here"), Ok("SCORE: -3"), Ok("SCORE: 250/100")];
    for reply in replies {
        let scorer = Scorer::new(llm_config()).with_evaluator(Recording::new(reply));
        for doc in &docs {
            let score = scorer.score(doc, ctx());
            assert!((0.0..=1.0).contains(&score.value), "{:?}", reply);
        }
    }
}

#[test]
fn parsed_packages_score_by_dialect() {
    let skill = "---\nname: safe-file-reader\ndescription: Read files without making changes\n---\n\nOnly inspect files.\n";
    let doc = dialects::parse(DialectId::ClaudeSkill, skill.as_bytes(), None).unwrap();
    let score = Scorer::default().score(&doc, ScoreContext::for_dialect(DialectId::ClaudeSkill));
    assert!(score.strengths.iter().any(|s| s == "has a description"));
    assert!(score.weaknesses.iter().any(|w| w == "no worked examples"));
}

#[tokio::test]
async fn score_async_uses_the_llm() {
    let scorer = Scorer::new(llm_config()).with_evaluator(Recording::new(Ok("SCORE: 7/10")));
    let score = scorer.score_async(&rich_document(), ctx()).await;
    assert_eq!(score.source, ScoreSource::Llm);
    assert!((score.value - 0.7).abs() < 1e-9);
}

#[tokio::test]
async fn score_async_falls_back_on_transport_error() {
    let scorer = Scorer::new(llm_config()).with_evaluator(Recording::new(Err(())));
    let score = scorer.score_async(&rich_document(), ctx()).await;
    assert_eq!(score.source, ScoreSource::Heuristic);
}

#[test]
fn scorer_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Scorer>();
    assert_send_sync::<CanonicalDocument>();
    assert_send_sync::<promptpack::Converter>();
}
