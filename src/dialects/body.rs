//! Markdown body segmentation and rendering.
//!
//! The body is split at ATX headings of the dialect's section level. Each
//! headed block becomes a section whose variant is chosen by the heading
//! keyword; content that does not fit the variant's strict shape stays
//! verbatim in `Instructions`, so every body renders back byte for byte.

use crate::model::{Example, Layout, Section, SectionKind, ToolSpec};
use crate::report::DegradationReport;

const RULE_KEYWORDS: &[&str] = &["rules", "requirements", "constraints", "conventions"];
const GUIDELINE_KEYWORDS: &[&str] = &["guidelines", "best practices", "tips", "recommendations"];
const EXAMPLE_KEYWORDS: &[&str] = &["examples", "example", "usage"];
const TOOL_KEYWORDS: &[&str] = &["tools"];

const PERSONA_HEADING: &str = "Persona";
const PERSONA_LEAD: &str = "You are ";

/// Dialect-specific body conventions
#[derive(Debug, Clone, Copy)]
pub(crate) struct BodyConventions {
    /// Heading level that starts a section (`1` for `#`, `2` for `##`)
    pub level: usize,
    /// A `Tools` heading with described entries is a `ToolDefinitions` section
    pub tools_section: bool,
    /// The dialect has a persona concept
    pub persona: bool,
}

/// Output of [`parse`]
#[derive(Debug)]
pub(crate) struct ParsedBody {
    pub sections: Vec<Section>,
    pub heading_gap: bool,
    pub section_gap: bool,
    pub trailing_newline: bool,
    pub trailing_blank_lines: usize,
    pub persona_heading: bool,
}

struct Part<'a> {
    title: Option<&'a str>,
    content: Vec<&'a str>,
}

impl Part<'_> {
    fn line_count(&self) -> usize {
        self.content.len() + usize::from(self.title.is_some())
    }
}

pub(crate) fn parse(text: &str, conv: &BodyConventions) -> ParsedBody {
    let core = text.trim_end_matches('\n');
    let newlines = text.len() - core.len();
    let text = core;

    let mut parsed = ParsedBody {
        sections: Vec::new(),
        heading_gap: true,
        section_gap: true,
        trailing_newline: newlines > 0 && !text.is_empty(),
        trailing_blank_lines: if text.is_empty() {
            newlines
        } else {
            newlines.saturating_sub(1)
        },
        persona_heading: false,
    };
    if text.is_empty() {
        return parsed;
    }

    let mut parts = split_parts(text, conv.level);

    let last = parts.len() - 1;
    parsed.section_gap = parts.len() > 1
        && parts[..last]
            .iter()
            .all(|p| p.line_count() >= 2 && p.content.last() == Some(&""));
    if parsed.section_gap {
        for part in &mut parts[..last] {
            part.content.pop();
        }
    }

    let mut headed = parts
        .iter()
        .filter(|p| p.title.is_some() && !p.content.is_empty())
        .peekable();
    if headed.peek().is_some() {
        parsed.heading_gap = headed.all(|p| p.content.len() >= 2 && p.content[0].is_empty());
    }
    if parsed.heading_gap {
        for part in parts.iter_mut().filter(|p| p.title.is_some()) {
            if part.content.len() >= 2 && part.content[0].is_empty() {
                part.content.remove(0);
            }
        }
    }

    let titled_persona = conv.persona && parts[0].title == Some(PERSONA_HEADING);
    parsed.sections = parts
        .into_iter()
        .map(|part| classify(part, conv))
        .collect();
    parsed.persona_heading = titled_persona
        && matches!(&parsed.sections[0], Section::Persona { body } if body.starts_with(PERSONA_LEAD));
    parsed
}

fn split_parts(text: &str, level: usize) -> Vec<Part<'_>> {
    let mut parts = Vec::new();
    let mut current = Part {
        title: None,
        content: Vec::new(),
    };
    let mut started = false;
    let mut in_fence = false;

    for line in text.split('\n') {
        if is_fence(line) {
            in_fence = !in_fence;
        } else if !in_fence {
            if let Some(title) = heading_title(line, level) {
                if started {
                    parts.push(current);
                }
                current = Part {
                    title: Some(title),
                    content: Vec::new(),
                };
                started = true;
                continue;
            }
        }
        current.content.push(line);
        started = true;
    }
    parts.push(current);
    parts
}

fn classify(part: Part<'_>, conv: &BodyConventions) -> Section {
    let body = part.content.join("\n");

    let Some(title) = part.title else {
        if conv.persona && body.starts_with(PERSONA_LEAD) {
            return Section::Persona { body };
        }
        return match bullets(&part.content) {
            Some(items) if !items.is_empty() => Section::Guidelines { title: None, items },
            _ => Section::Instructions { title: None, body },
        };
    };

    let owned_title = Some(title.to_string());
    if conv.persona && title == PERSONA_HEADING {
        return Section::Persona { body };
    }

    let keyword = keyword_kind(title, conv);
    if keyword == Some(SectionKind::ToolDefinitions) {
        if let Some(tools) = tool_entries(&part.content) {
            return Section::ToolDefinitions { tools };
        }
    }
    if keyword == Some(SectionKind::Examples) {
        if let Some(examples) = parse_examples(&part.content, conv.level + 1) {
            return Section::Examples {
                title: owned_title,
                examples,
            };
        }
    }

    match (keyword, bullets(&part.content)) {
        (Some(SectionKind::RuleList), Some(rules)) => Section::RuleList {
            title: owned_title,
            rules,
        },
        (Some(SectionKind::Guidelines), Some(items)) => Section::Guidelines {
            title: owned_title,
            items,
        },
        (Some(SectionKind::ToolDefinitions) | None, Some(items)) if !items.is_empty() => {
            Section::Guidelines {
                title: owned_title,
                items,
            }
        }
        _ => Section::Instructions {
            title: owned_title,
            body,
        },
    }
}

fn keyword_kind(title: &str, conv: &BodyConventions) -> Option<SectionKind> {
    let normalized = title.trim().trim_end_matches(':').to_lowercase();
    let hit = |keywords: &[&str]| {
        keywords.iter().any(|kw| {
            normalized == *kw
                || normalized.starts_with(&format!("{} ", kw))
                || normalized.ends_with(&format!(" {}", kw))
        })
    };

    if conv.tools_section && hit(TOOL_KEYWORDS) {
        Some(SectionKind::ToolDefinitions)
    } else if hit(EXAMPLE_KEYWORDS) {
        Some(SectionKind::Examples)
    } else if hit(RULE_KEYWORDS) {
        Some(SectionKind::RuleList)
    } else if hit(GUIDELINE_KEYWORDS) {
        Some(SectionKind::Guidelines)
    } else {
        None
    }
}

/// `- item` lines, all of them, or nothing
fn bullets(lines: &[&str]) -> Option<Vec<String>> {
    lines
        .iter()
        .map(|l| l.strip_prefix("- ").map(str::to_string))
        .collect()
}

/// `- Name: description` entries; at least one must carry a description,
/// otherwise the list reads as plain guidance.
fn tool_entries(lines: &[&str]) -> Option<Vec<ToolSpec>> {
    let items = bullets(lines)?;
    if items.is_empty() {
        return None;
    }
    let tools: Vec<ToolSpec> = items
        .iter()
        .map(|item| match item.split_once(": ") {
            Some((name, desc)) => ToolSpec {
                name: name.to_string(),
                description: Some(desc.to_string()),
                parameters: None,
            },
            None => ToolSpec::named(item.as_str()),
        })
        .collect();
    let named = tools.iter().all(|t| !t.name.trim().is_empty());
    let described = tools.iter().any(|t| t.description.is_some());
    (named && described).then_some(tools)
}

fn parse_examples(lines: &[&str], sub_level: usize) -> Option<Vec<Example>> {
    let mut examples = Vec::new();
    let n = lines.len();
    let mut i = 0;

    while i < n {
        let mut example = Example::default();

        if let Some(title) = heading_title(lines[i], sub_level) {
            example.title = Some(title.to_string());
            i += 1;
        }

        let desc_start = i;
        while i < n && !lines[i].is_empty() && !lines[i].starts_with("```") {
            i += 1;
        }
        if i > desc_start {
            example.description = Some(lines[desc_start..i].join("\n"));
        }

        if i < n && lines[i].starts_with("```") {
            let language = &lines[i][3..];
            if language.contains(|c: char| c.is_whitespace() || c == '`') {
                return None;
            }
            i += 1;
            let code_start = i;
            while i < n && lines[i] != "```" {
                i += 1;
            }
            if i == n {
                return None;
            }
            // Each fenced line keeps its newline: an empty fence and a
            // fence around one blank line differ
            example.code = Some(
                lines[code_start..i]
                    .iter()
                    .map(|l| format!("{}\n", l))
                    .collect(),
            );
            example.language = (!language.is_empty()).then(|| language.to_string());
            i += 1;
        }

        // Prose alone under an examples heading is not an example
        if example.title.is_none() && example.code.is_none() {
            return None;
        }
        examples.push(example);

        if i < n {
            // Examples are separated by exactly one blank line
            if !lines[i].is_empty() || i + 1 == n {
                return None;
            }
            i += 1;
        }
    }

    Some(examples)
}

fn is_fence(line: &str) -> bool {
    line.starts_with("```") || line.starts_with("~~~")
}

fn heading_title(line: &str, level: usize) -> Option<&str> {
    let rest = line.strip_prefix(&"#".repeat(level))?;
    rest.strip_prefix(' ')
}

/// Whether the text contains any ATX heading outside code fences
pub(crate) fn has_heading(text: &str) -> bool {
    let mut in_fence = false;
    for line in text.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        let hashes = line.chars().take_while(|c| *c == '#').count();
        if (1..=6).contains(&hashes) && line[hashes..].starts_with(' ') {
            return true;
        }
    }
    false
}

/// Render body sections in order.
///
/// `sections` pairs each section with its index in the document so that
/// degradation entries point at the right place.
pub(crate) fn render(
    sections: &[(usize, &Section)],
    conv: &BodyConventions,
    layout: &Layout,
    report: &mut DegradationReport,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    for &(index, section) in sections {
        let first = parts.is_empty();
        let headed = |title: &str, content: &str| headed(conv.level, layout, title, content);

        let part = match section {
            Section::Instructions { title: None, body } if first => body.clone(),
            Section::Instructions { title, body } => {
                headed(title.as_deref().unwrap_or("Instructions"), body)
            }
            Section::RuleList { title, rules } => {
                headed(title.as_deref().unwrap_or("Rules"), &bullet_lines(rules))
            }
            Section::Guidelines { title: None, items } if first && !items.is_empty() => {
                bullet_lines(items)
            }
            Section::Guidelines { title, items } => {
                headed(title.as_deref().unwrap_or("Guidelines"), &bullet_lines(items))
            }
            Section::Examples { title, examples } => headed(
                title.as_deref().unwrap_or("Examples"),
                &example_lines(examples, conv.level + 1),
            ),
            Section::Persona { .. } if !conv.persona => {
                report.drop_section(index, SectionKind::Persona, "target has no persona concept");
                continue;
            }
            Section::Persona { body }
                if first && body.starts_with(PERSONA_LEAD) && !layout.persona_heading =>
            {
                body.clone()
            }
            Section::Persona { body } => headed(PERSONA_HEADING, body),
            Section::ToolDefinitions { tools } if conv.tools_section => {
                let lost: Vec<&str> = tools
                    .iter()
                    .filter(|t| t.parameters.is_some())
                    .map(|t| t.name.as_str())
                    .collect();
                if !lost.is_empty() {
                    report.drop_field(
                        index,
                        SectionKind::ToolDefinitions,
                        &lost.join(", "),
                        "tool parameters have no representation in this dialect",
                    );
                }
                headed("Tools", &tool_lines(tools))
            }
            Section::ToolDefinitions { .. } => {
                report.drop_section(
                    index,
                    SectionKind::ToolDefinitions,
                    "target has no tool concept",
                );
                continue;
            }
            // Routed to front matter by the caller
            Section::Metadata { .. } => continue,
        };
        parts.push(part);
    }

    let tail = "\n".repeat(layout.trailing_blank_lines);
    if parts.is_empty() {
        return tail;
    }

    let separator = if layout.section_gap { "\n\n" } else { "\n" };
    let mut out = parts.join(separator);
    if layout.trailing_newline {
        out.push('\n');
    }
    out.push_str(&tail);
    out
}

fn headed(level: usize, layout: &Layout, title: &str, content: &str) -> String {
    let heading = format!("{} {}", "#".repeat(level), title);
    if content.is_empty() {
        return heading;
    }
    let gap = if layout.heading_gap { "\n\n" } else { "\n" };
    format!("{}{}{}", heading, gap, content)
}

fn bullet_lines(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("- {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

fn tool_lines(tools: &[ToolSpec]) -> String {
    tools
        .iter()
        .map(|t| match &t.description {
            Some(d) => format!("- {}: {}", t.name, d),
            None => format!("- {}", t.name),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn example_lines(examples: &[Example], sub_level: usize) -> String {
    examples
        .iter()
        .map(|e| {
            let mut lines = Vec::new();
            if let Some(title) = &e.title {
                lines.push(format!("{} {}", "#".repeat(sub_level), title));
            }
            if let Some(desc) = &e.description {
                lines.push(desc.clone());
            }
            if let Some(code) = &e.code {
                let mut fence = format!("```{}\n{}", e.language.as_deref().unwrap_or(""), code);
                if !code.is_empty() && !code.ends_with('\n') {
                    fence.push('\n');
                }
                fence.push_str("```");
                lines.push(fence);
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: BodyConventions = BodyConventions {
        level: 1,
        tools_section: false,
        persona: false,
    };

    const AGENT: BodyConventions = BodyConventions {
        level: 2,
        tools_section: true,
        persona: true,
    };

    fn layout_of(p: &ParsedBody) -> Layout {
        Layout {
            heading_gap: p.heading_gap,
            section_gap: p.section_gap,
            trailing_newline: p.trailing_newline,
            trailing_blank_lines: p.trailing_blank_lines,
            persona_heading: p.persona_heading,
            ..Layout::default()
        }
    }

    fn round_trip(text: &str, conv: &BodyConventions) -> (ParsedBody, String) {
        let parsed = parse(text, conv);
        let indexed: Vec<(usize, &Section)> = parsed.sections.iter().enumerate().collect();
        let mut report = DegradationReport::default();
        let out = render(&indexed, conv, &layout_of(&parsed), &mut report);
        assert!(report.is_empty());
        (parsed, out)
    }

    #[test]
    fn test_compact_rule_list() {
        let text = "# Rules\n- Use strict types\n- No any";
        let (parsed, out) = round_trip(text, &RULES);
        assert_eq!(
            parsed.sections,
            vec![Section::rules(Some("Rules"), ["Use strict types", "No any"])]
        );
        assert!(!parsed.heading_gap);
        assert!(!parsed.trailing_newline);
        assert_eq!(out, text);
    }

    #[test]
    fn test_spaced_document_round_trips() {
        let text = "Intro prose.\n\n# Rules\n\n- One\n- Two\n\n# Guidelines\n\n- Prefer small functions\n\n# Notes\n\nFree text\nacross lines.\n";
        let (parsed, out) = round_trip(text, &RULES);
        let kinds: Vec<_> = parsed.sections.iter().map(Section::kind).collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::Instructions,
                SectionKind::RuleList,
                SectionKind::Guidelines,
                SectionKind::Instructions
            ]
        );
        assert_eq!(parsed.sections[3].title(), Some("Notes"));
        assert_eq!(out, text);
    }

    #[test]
    fn test_irregular_rules_stay_verbatim() {
        let text = "# Rules\n\n* star bullets\n- dash bullet\n";
        let (parsed, out) = round_trip(text, &RULES);
        assert_eq!(
            parsed.sections,
            vec![Section::instructions(
                Some("Rules"),
                "* star bullets\n- dash bullet"
            )]
        );
        assert_eq!(out, text);
    }

    #[test]
    fn test_inconsistent_spacing_is_preserved() {
        let text = "# A\n\ntext\n# B\nmore\n\n\n# C\n";
        let (_, out) = round_trip(text, &RULES);
        assert_eq!(out, text);
    }

    #[test]
    fn test_headings_inside_code_fences_do_not_split() {
        let text = "## Setup\n\n```sh\n## not a heading\n```\n";
        let (parsed, out) = round_trip(text, &AGENT);
        assert_eq!(parsed.sections.len(), 1);
        assert_eq!(out, text);
    }

    #[test]
    fn test_examples_section() {
        let text = "## Examples\n\n### Strict mode\nEnable it everywhere.\n```json\n{\"strict\": true}\n```\n\n### Bare\n```\nlet x = 1;\n```\n";
        let (parsed, out) = round_trip(text, &AGENT);
        let Section::Examples { examples, .. } = &parsed.sections[0] else {
            panic!("expected examples, got {:?}", parsed.sections[0]);
        };
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].title.as_deref(), Some("Strict mode"));
        assert_eq!(examples[0].description.as_deref(), Some("Enable it everywhere."));
        assert_eq!(examples[0].language.as_deref(), Some("json"));
        assert_eq!(examples[1].language, None);
        assert_eq!(examples[1].code.as_deref(), Some("let x = 1;\n"));
        assert_eq!(out, text);
    }

    #[test]
    fn test_unterminated_example_fence_falls_back() {
        let text = "## Examples\n\n```rust\nfn main() {}\n";
        let (parsed, out) = round_trip(text, &AGENT);
        assert_eq!(parsed.sections[0].kind(), SectionKind::Instructions);
        assert_eq!(out, text);
    }

    #[test]
    fn test_persona_lead_and_heading() {
        let text = "You are a careful reviewer.\n\n## Persona\n\nCalm and precise.\n";
        let (parsed, out) = round_trip(text, &AGENT);
        assert_eq!(
            parsed.sections,
            vec![
                Section::Persona {
                    body: "You are a careful reviewer.".to_string()
                },
                Section::Persona {
                    body: "Calm and precise.".to_string()
                },
            ]
        );
        assert_eq!(out, text);
    }

    #[test]
    fn test_tools_section_needs_descriptions() {
        let (parsed, out) = round_trip("## Tools\n\n- Read: open files\n- Grep\n", &AGENT);
        let Section::ToolDefinitions { tools } = &parsed.sections[0] else {
            panic!("expected tools");
        };
        assert_eq!(tools[0].description.as_deref(), Some("open files"));
        assert_eq!(tools[1].description, None);
        assert_eq!(out, "## Tools\n\n- Read: open files\n- Grep\n");

        let (parsed, _) = round_trip("## Tools\n\n- Read\n- Grep\n", &AGENT);
        assert_eq!(parsed.sections[0].kind(), SectionKind::Guidelines);
    }

    #[test]
    fn test_freestanding_list_defaults_to_guidelines() {
        let (parsed, out) = round_trip("- one\n- two\n", &RULES);
        assert_eq!(
            parsed.sections,
            vec![Section::Guidelines {
                title: None,
                items: vec!["one".to_string(), "two".to_string()]
            }]
        );
        assert_eq!(out, "- one\n- two\n");
    }

    #[test]
    fn test_persona_dropped_without_concept() {
        let persona = Section::Persona {
            body: "You are terse.".to_string(),
        };
        let mut report = DegradationReport::default();
        let out = render(&[(0, &persona)], &RULES, &Layout::default(), &mut report);
        assert!(out.is_empty());
        assert!(report.mentions(SectionKind::Persona));
    }

    #[test]
    fn test_has_heading() {
        assert!(has_heading("# Title\n"));
        assert!(has_heading("text\n### Deep\n"));
        assert!(!has_heading("just words\n#hashtag\n"));
        assert!(!has_heading("```\n# inside\n```\n"));
    }

    #[test]
    fn test_blank_line_fence_differs_from_empty_fence() {
        let text = "## Examples\n\n```\n\n```\n\n```\n```\n";
        let (parsed, out) = round_trip(text, &AGENT);
        let Section::Examples { examples, .. } = &parsed.sections[0] else {
            panic!("expected examples, got {:?}", parsed.sections[0]);
        };
        assert_eq!(examples[0].code.as_deref(), Some("\n"));
        assert_eq!(examples[1].code.as_deref(), Some(""));
        assert_eq!(out, text);
    }

    #[test]
    fn test_persona_under_heading_keeps_heading() {
        let text = "## Persona\n\nYou are a careful reviewer.\n\n## Rules\n\n- Cite lines\n";
        let (parsed, out) = round_trip(text, &AGENT);
        assert!(parsed.persona_heading);
        assert_eq!(
            parsed.sections[0],
            Section::Persona {
                body: "You are a careful reviewer.".to_string()
            }
        );
        assert_eq!(out, text);

        let (parsed, out) = round_trip("You are terse.\n", &AGENT);
        assert!(!parsed.persona_heading);
        assert_eq!(out, "You are terse.\n");
    }

    #[test]
    fn test_trailing_blank_lines_survive() {
        for text in ["\n", "\n\n\n", "# Rules\n\n- One\n\n\n", "# A\n\ntext\n\n# C\n\n"] {
            let (parsed, out) = round_trip(text, &RULES);
            assert_eq!(out, text, "{:?} parsed as {:?}", text, parsed.sections);
        }
        let (parsed, _) = round_trip("\n\n", &RULES);
        assert!(parsed.sections.is_empty());
        assert_eq!(parsed.trailing_blank_lines, 2);
    }
}
