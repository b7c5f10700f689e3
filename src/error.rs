//! Error types for parsing, detection, serialization and conversion.
//!
//! Degradation is not an error and lives in [`crate::report::DegradationReport`].

use crate::dialects::DialectId;
use thiserror::Error;

/// Failure turning raw dialect text (or canonical JSON) into a document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Front matter is unterminated, not YAML, or structurally invalid
    #[error("malformed front matter: {0}")]
    MalformedFrontMatter(String),

    /// Input does not have the dialect's expected shape
    #[error("input is not a {dialect} document: {reason}")]
    DialectMismatch { dialect: DialectId, reason: String },

    /// Canonical JSON carries a schema version this build cannot read
    #[error("unsupported schema version {0}")]
    UnsupportedSchemaVersion(u32),

    /// A recognized field holds a value the dialect forbids
    #[error("invalid `{key}`: {reason}")]
    InvalidField { key: String, reason: String },

    /// Canonical JSON could not be decoded or failed validation
    #[error("invalid canonical document: {0}")]
    InvalidDocument(String),
}

impl ParseError {
    pub(crate) fn mismatch(dialect: DialectId, reason: impl Into<String>) -> Self {
        ParseError::DialectMismatch {
            dialect,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ParseError::MalformedFrontMatter(reason.into())
    }
}

/// Failure choosing a parser for raw input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    #[error("input matches no known dialect")]
    UnknownDialect,
}

/// Failure rendering a document into a dialect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializeError {
    /// The requested target name does not resolve to a known dialect
    #[error("unsupported target dialect `{0}`")]
    UnsupportedTargetDialect(String),

    /// A value could not be rendered in the target's front-matter syntax
    #[error("cannot encode `{key}` for {dialect}: {reason}")]
    Encoding {
        dialect: DialectId,
        key: String,
        reason: String,
    },
}

/// Fatal outcome of a conversion.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

/// Failure on the LLM scoring path. Never leaves the scorer.
#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("LLM scoring is disabled")]
    Disabled,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("LLM call timed out after {0} ms")]
    Timeout(u64),

    #[error("unparseable LLM response: {0}")]
    Unparseable(String),
}
