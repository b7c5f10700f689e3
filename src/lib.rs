//! Canonical content model for AI-assistant configuration packages.
//!
//! Packages written for one tool (Cursor rules, Claude skills, agents and
//! commands, Copilot instructions, Kiro steering, `AGENTS.md`) parse into a
//! [`CanonicalDocument`] and serialize into any other dialect, with every
//! loss recorded in a [`DegradationReport`]. A [`Scorer`] grades document
//! quality with an optional LLM and a structural fallback.

pub mod config;
pub mod convert;
pub mod detect;
pub mod dialects;
pub mod error;
pub mod hints;
pub mod model;
pub mod report;
pub mod scoring;

pub use config::Config;
pub use convert::{validate_round_trip, ConversionOutcome, Converter, RoundTripCheck};
pub use detect::{detect, detect_source};
pub use dialects::DialectId;
pub use error::{ConversionError, DetectionError, ParseError, ScoreError, SerializeError};
pub use hints::{ConversionHints, ManifestHints};
pub use model::{CanonicalDocument, Example, Fields, MetaValue, Section, SectionKind, ToolSpec};
pub use report::{Degradation, DegradationReport};
pub use scoring::{Evaluator, QualityScore, ScoreContext, ScoreSource, Scorer, Subtype};
