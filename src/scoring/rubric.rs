//! Rubrics and prompt construction for the LLM evaluator.

use super::{ScoreContext, Subtype};
use crate::dialects::DialectId;
use crate::model::{CanonicalDocument, MetaValue, Section};

/// Criteria set the LLM grades against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rubric {
    Skill,
    Rule,
    CommandOrAgent,
}

impl Rubric {
    pub fn select(ctx: &ScoreContext) -> Self {
        match ctx.subtype {
            Subtype::Skill => Rubric::Skill,
            Subtype::Rule => Rubric::Rule,
            Subtype::Agent | Subtype::SlashCommand => Rubric::CommandOrAgent,
            Subtype::Prompt => match ctx.dialect {
                DialectId::ClaudeSkill => Rubric::Skill,
                DialectId::ClaudeAgent | DialectId::ClaudeCommand => Rubric::CommandOrAgent,
                _ => Rubric::Rule,
            },
        }
    }

    fn subject(&self) -> &'static str {
        match self {
            Rubric::Skill => "an agent skill",
            Rubric::Rule => "a coding-assistant rule file",
            Rubric::CommandOrAgent => "a slash command or subagent definition",
        }
    }

    pub fn criteria(&self) -> &'static [&'static str] {
        match self {
            Rubric::Skill => &[
                "The description says when the skill should be used, not just what it is",
                "Instructions are concrete steps an agent can follow without guessing",
                "Tool usage is scoped to what the task needs",
                "Examples show realistic inputs and expected behavior",
                "Scope is narrow enough to trigger reliably",
            ],
            Rubric::Rule => &[
                "Rules are specific and checkable, not vague aspirations",
                "Scope (file patterns or when it applies) is clear",
                "Rules do not contradict each other",
                "Rationale or examples are given where a rule is non-obvious",
                "Length is proportionate: no filler, nothing essential missing",
            ],
            Rubric::CommandOrAgent => &[
                "The purpose and expected output are stated up front",
                "Arguments or inputs are explained and used consistently",
                "Steps are ordered and actionable",
                "Tool permissions match the task",
                "Persona, if any, sharpens behavior rather than decorating it",
            ],
        }
    }
}

const RESPONSE_FORMAT: &str = "\
Respond in exactly this format:
SCORE: <number between 0.0 and 1.0>
RATIONALE: <one or two sentences>
STRENGTHS:
- <strength>
WEAKNESSES:
- <weakness>";

/// Full evaluation prompt for a document
pub fn build_prompt(doc: &CanonicalDocument, ctx: &ScoreContext) -> String {
    let rubric = Rubric::select(ctx);
    let mut prompt = format!(
        "You are reviewing {} written for the {} format. Grade its quality against these criteria:\n",
        rubric.subject(),
        ctx.dialect
    );
    for (i, criterion) in rubric.criteria().iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, criterion));
    }
    prompt.push('\n');
    prompt.push_str(RESPONSE_FORMAT);
    prompt.push_str("\n\n=== DOCUMENT ===\n");
    prompt.push_str(&render_for_review(doc));
    prompt.push_str("=== END DOCUMENT ===\n");
    prompt
}

/// Dialect-neutral plain-text rendering of a document
pub fn render_for_review(doc: &CanonicalDocument) -> String {
    let mut out = String::new();
    for section in doc.sections() {
        match section {
            Section::Metadata { fields } => {
                out.push_str("[Metadata]\n");
                for (key, value) in fields.iter() {
                    out.push_str(&format!("{}: {}\n", key, display_value(value)));
                }
            }
            Section::Instructions { title, body } => {
                out.push_str(&label("Instructions", title.as_deref()));
                out.push_str(body);
                out.push('\n');
            }
            Section::RuleList { title, rules } => {
                out.push_str(&label("Rules", title.as_deref()));
                for rule in rules {
                    out.push_str(&format!("- {}\n", rule));
                }
            }
            Section::Guidelines { title, items } => {
                out.push_str(&label("Guidelines", title.as_deref()));
                for item in items {
                    out.push_str(&format!("- {}\n", item));
                }
            }
            Section::Examples { title, examples } => {
                out.push_str(&label("Examples", title.as_deref()));
                for example in examples {
                    out.push_str(&format!(
                        "Example: {}\n",
                        example.title.as_deref().unwrap_or("(untitled)")
                    ));
                    if let Some(desc) = &example.description {
                        out.push_str(desc);
                        out.push('\n');
                    }
                    if let Some(code) = &example.code {
                        out.push_str(&format!(
                            "```{}\n{}\n```\n",
                            example.language.as_deref().unwrap_or(""),
                            code.trim_end_matches('\n')
                        ));
                    }
                }
            }
            Section::ToolDefinitions { tools } => {
                out.push_str("[Tools]\n");
                for tool in tools {
                    match &tool.description {
                        Some(desc) => out.push_str(&format!("- {}: {}\n", tool.name, desc)),
                        None => out.push_str(&format!("- {}\n", tool.name)),
                    }
                }
            }
            Section::Persona { body } => {
                out.push_str("[Persona]\n");
                out.push_str(body);
                out.push('\n');
            }
        }
        out.push('\n');
    }
    out
}

fn label(kind: &str, title: Option<&str>) -> String {
    match title {
        Some(title) => format!("[{}: {}]\n", kind, title),
        None => format!("[{}]\n", kind),
    }
}

fn display_value(value: &MetaValue) -> String {
    match value {
        MetaValue::Null => String::new(),
        MetaValue::Bool(b) => b.to_string(),
        MetaValue::Integer(n) => n.to_string(),
        MetaValue::Float(f) => f.to_string(),
        MetaValue::Text(s) => s.clone(),
        MetaValue::List(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
    }
}
