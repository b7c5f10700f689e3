//! Degradation reporting.
//!
//! A degradation is information the target dialect could not carry. It is
//! never an error: the conversion still succeeds, and the report travels
//! with the output so the caller decides what to do.

use crate::model::SectionKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One piece of content that did not survive serialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Degradation {
    /// Variant of the affected section
    pub section: SectionKind,
    /// Position of the section in the document, when it maps to one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Field, hint or tool name inside the section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub reason: String,
    /// Supporting detail such as a diff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.section)?;
        if let Some(index) = self.index {
            write!(f, "[{}]", index)?;
        }
        if let Some(subject) = &self.subject {
            write!(f, " `{}`", subject)?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// Ordered list of degradations produced by one conversion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradationReport {
    entries: Vec<Degradation>,
}

impl DegradationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: Degradation) {
        tracing::debug!(degradation = %entry, "content degraded");
        self.entries.push(entry);
    }

    /// A whole section had no representation
    pub fn drop_section(&mut self, index: usize, section: SectionKind, reason: &str) {
        self.push(Degradation {
            section,
            index: Some(index),
            subject: None,
            reason: reason.to_string(),
            detail: None,
        });
    }

    /// Part of a section (a field, a hint, some tools) had no representation
    pub fn drop_field(&mut self, index: usize, section: SectionKind, subject: &str, reason: &str) {
        self.push(Degradation {
            section,
            index: Some(index),
            subject: Some(subject.to_string()),
            reason: reason.to_string(),
            detail: None,
        });
    }

    pub fn entries(&self) -> &[Degradation] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Degradation> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry names the given section variant
    pub fn mentions(&self, section: SectionKind) -> bool {
        self.entries.iter().any(|e| e.section == section)
    }

    /// Whether any entry names the given field or tool
    pub fn mentions_subject(&self, subject: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.subject.as_deref() == Some(subject))
    }
}

impl fmt::Display for DegradationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "- {}", entry)?;
        }
        Ok(())
    }
}

impl IntoIterator for DegradationReport {
    type Item = Degradation;
    type IntoIter = std::vec::IntoIter<Degradation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
