//! YAML front-matter splitting, decoding and rendering.
//!
//! Decoding accepts any flat YAML mapping. A field the document still
//! holds unchanged renders from its captured source text. Any other field
//! renders as one `key: value` line: strings plain when YAML reads them
//! back unchanged, double-quoted otherwise, and lists in flow style.

use crate::error::ParseError;
use crate::model::{MetaValue, RawFrontMatter, RawKey};

const DELIMITER: &str = "---";

/// Split `---` delimited front matter from the body.
///
/// Returns `(None, text)` when the text does not open with a delimiter
/// line. The body starts right after the closing delimiter's newline.
pub(crate) fn split(text: &str) -> Result<(Option<&str>, &str), ParseError> {
    let Some(rest) = text.strip_prefix("---\n") else {
        return Ok((None, text));
    };

    let start = DELIMITER.len() + 1;
    let mut offset = start;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches('\n') == DELIMITER {
            let yaml = &text[start..offset];
            let body = &text[offset + line.len()..];
            return Ok((Some(yaml), body));
        }
        offset += line.len();
    }

    Err(ParseError::malformed("missing closing --- for front matter"))
}

/// Decode a front-matter block into ordered key/value pairs.
pub(crate) fn decode(yaml: &str) -> Result<Vec<(String, MetaValue)>, ParseError> {
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| ParseError::malformed(e.to_string()))?;

    let mapping = match value {
        serde_yaml::Value::Mapping(m) => m,
        serde_yaml::Value::Null => return Ok(Vec::new()),
        _ => return Err(ParseError::malformed("front matter must be a key/value mapping")),
    };

    let mut fields = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let key = match key {
            serde_yaml::Value::String(s) if !s.trim().is_empty() => s,
            other => {
                return Err(ParseError::malformed(format!(
                    "front-matter keys must be non-empty strings, found {:?}",
                    other
                )))
            }
        };
        let value = to_meta(&key, value, true)?;
        fields.push((key, value));
    }
    Ok(fields)
}

fn to_meta(key: &str, value: serde_yaml::Value, top_level: bool) -> Result<MetaValue, ParseError> {
    use serde_yaml::Value;

    match value {
        Value::Null => Ok(MetaValue::Null),
        Value::Bool(b) => Ok(MetaValue::Bool(b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(MetaValue::Integer(i)),
            None => n
                .as_f64()
                .filter(|f| f.is_finite())
                .map(MetaValue::Float)
                .ok_or_else(|| ParseError::malformed(format!("`{}` is not a finite number", key))),
        },
        Value::String(s) => Ok(MetaValue::Text(s)),
        Value::Sequence(items) if top_level => items
            .into_iter()
            .map(|item| to_meta(key, item, false))
            .collect::<Result<Vec<_>, _>>()
            .map(MetaValue::List),
        Value::Sequence(_) => Err(ParseError::malformed(format!(
            "`{}` nests a list inside a list",
            key
        ))),
        Value::Mapping(_) => Err(ParseError::malformed(format!(
            "`{}` holds a nested mapping",
            key
        ))),
        Value::Tagged(_) => Err(ParseError::malformed(format!(
            "`{}` uses an explicit YAML tag",
            key
        ))),
    }
}

/// A front-matter entry ready to render
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Entry {
    Value(MetaValue),
    /// Tool names, rendered as a comma-separated string
    Tools(Vec<String>),
}

/// Split front matter into per-key source text.
///
/// Returns `None` when the text does not segment cleanly into one chunk per
/// decoded key, in which case every field renders canonically.
pub(crate) fn capture(
    yaml: &str,
    close: &str,
    decoded: &[(String, MetaValue)],
) -> Option<RawFrontMatter> {
    let mut head = String::new();
    let mut chunks: Vec<String> = Vec::new();
    for line in yaml.split_inclusive('\n') {
        if starts_key(line) {
            chunks.push(line.to_string());
        } else if let Some(last) = chunks.last_mut() {
            last.push_str(line);
        } else {
            head.push_str(line);
        }
    }
    if chunks.len() != decoded.len() {
        return None;
    }

    let keys = chunks
        .into_iter()
        .zip(decoded)
        .map(|(text, (key, value))| match decode(&text) {
            Ok(one) if one.len() == 1 && one[0].0 == *key && one[0].1 == *value => Some(RawKey {
                key: key.clone(),
                text,
            }),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    Some(RawFrontMatter {
        head,
        keys,
        close: close.to_string(),
    })
}

/// A top-level `key:` line, as opposed to continuation, comment or blank
fn starts_key(line: &str) -> bool {
    !line.starts_with([' ', '\t', '#', '-', '\n']) && line.contains(':')
}

pub(crate) fn render(entries: &[(String, Entry)], raw: Option<&RawFrontMatter>) -> String {
    let mut out = String::from("---\n");
    if let Some(raw) = raw {
        out.push_str(&raw.head);
    }
    for (key, entry) in entries {
        match raw.and_then(|r| written(r, key, entry)) {
            Some(text) => out.push_str(text),
            None => {
                out.push_str(&render_line(key, entry));
                out.push('\n');
            }
        }
    }
    out.push_str(raw.map_or("---\n", |r| r.close.as_str()));
    out
}

/// Source text for `key` when it still decodes to `entry`
fn written<'a>(raw: &'a RawFrontMatter, key: &str, entry: &Entry) -> Option<&'a str> {
    let text = raw.text_for(key)?;
    let (_, value) = decode(text).ok()?.into_iter().next()?;
    let unchanged = match entry {
        Entry::Value(v) => *v == value,
        Entry::Tools(names) => {
            matches!(value, MetaValue::Text(_) | MetaValue::List(_))
                && value.to_string_list() == *names
        }
    };
    unchanged.then_some(text)
}

fn render_line(key: &str, entry: &Entry) -> String {
    let key = scalar_text(key);
    match entry {
        Entry::Value(MetaValue::Null) => format!("{}:", key),
        Entry::Value(value) => format!("{}: {}", key, render_value(value)),
        Entry::Tools(names) => format!("{}: {}", key, scalar_text(&names.join(", "))),
    }
}

fn render_value(value: &MetaValue) -> String {
    match value {
        MetaValue::Null => String::new(),
        MetaValue::Bool(b) => b.to_string(),
        MetaValue::Integer(n) => n.to_string(),
        MetaValue::Float(f) => render_float(*f),
        MetaValue::Text(s) => scalar_text(s),
        MetaValue::List(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|item| match item {
                    MetaValue::Text(s) => quote(s),
                    MetaValue::Null => "null".to_string(),
                    other => render_value(other),
                })
                .collect();
            format!("[{}]", rendered.join(", "))
        }
    }
}

fn render_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

fn scalar_text(s: &str) -> String {
    if needs_quotes(s) {
        quote(s)
    } else {
        s.to_string()
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

const INDICATORS: &[char] = &[
    '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
];

const RESERVED: &[&str] = &[
    "true", "false", "null", "~", "yes", "no", "on", "off", "y", "n",
];

/// Whether a plain scalar would read back as something other than `s`
fn needs_quotes(s: &str) -> bool {
    let Some(first) = s.chars().next() else {
        return true;
    };
    s != s.trim()
        || INDICATORS.contains(&first)
        || s.contains(": ")
        || s.contains(" #")
        || s.ends_with(':')
        || s.chars().any(char::is_control)
        || RESERVED.contains(&s.to_ascii_lowercase().as_str())
        || looks_numeric(s)
}

fn looks_numeric(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.parse::<f64>().is_ok()
        || lower.starts_with("0x")
        || lower.starts_with("0o")
        || matches!(lower.as_str(), ".inf" | "-.inf" | "+.inf" | ".nan")
}
