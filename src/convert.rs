//! Conversion orchestration: detect, parse, resolve hints, serialize.

use crate::config::ConversionConfig;
use crate::detect::detect_source;
use crate::dialects::{self, DialectId};
use crate::error::{ConversionError, SerializeError};
use crate::hints::{self, ManifestHints};
use crate::model::{CanonicalDocument, Section, SectionKind};
use crate::report::{Degradation, DegradationReport};

/// Result of one conversion
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome {
    Success(Vec<u8>),
    /// Output was produced but something had no representation in the target
    SuccessWithDegradation(Vec<u8>, DegradationReport),
    Failure(ConversionError),
}

impl ConversionOutcome {
    fn from_parts(bytes: Vec<u8>, report: DegradationReport) -> Self {
        if report.is_empty() {
            ConversionOutcome::Success(bytes)
        } else {
            ConversionOutcome::SuccessWithDegradation(bytes, report)
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, ConversionOutcome::Failure(_))
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            ConversionOutcome::Success(bytes)
            | ConversionOutcome::SuccessWithDegradation(bytes, _) => Some(bytes),
            ConversionOutcome::Failure(_) => None,
        }
    }

    pub fn report(&self) -> Option<&DegradationReport> {
        match self {
            ConversionOutcome::SuccessWithDegradation(_, report) => Some(report),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<(Vec<u8>, DegradationReport), ConversionError> {
        match self {
            ConversionOutcome::Success(bytes) => Ok((bytes, DegradationReport::default())),
            ConversionOutcome::SuccessWithDegradation(bytes, report) => Ok((bytes, report)),
            ConversionOutcome::Failure(e) => Err(e),
        }
    }
}

/// Runs conversions. Holds no per-conversion state.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    config: ConversionConfig,
}

impl Converter {
    pub fn new(config: ConversionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Convert raw package content into `target`.
    pub fn convert(
        &self,
        source: &[u8],
        manifest: Option<&ManifestHints>,
        target: DialectId,
    ) -> ConversionOutcome {
        let result = self
            .source_document(source, manifest)
            .and_then(|doc| self.render(source, &doc, manifest, target));
        match result {
            Ok((bytes, report)) => ConversionOutcome::from_parts(bytes, report),
            Err(e) => ConversionOutcome::Failure(e),
        }
    }

    /// Like [`Converter::convert`], with the target given by name
    pub fn convert_to(
        &self,
        source: &[u8],
        manifest: Option<&ManifestHints>,
        target: &str,
    ) -> ConversionOutcome {
        match DialectId::from_name(target) {
            Some(dialect) => self.convert(source, manifest, dialect),
            None => ConversionOutcome::Failure(
                SerializeError::UnsupportedTargetDialect(target.to_string()).into(),
            ),
        }
    }

    /// Parse once and render into several targets
    pub fn convert_many(
        &self,
        source: &[u8],
        manifest: Option<&ManifestHints>,
        targets: &[DialectId],
    ) -> Vec<(DialectId, ConversionOutcome)> {
        let doc = match self.source_document(source, manifest) {
            Ok(doc) => doc,
            Err(e) => {
                return targets
                    .iter()
                    .map(|&t| (t, ConversionOutcome::Failure(e.clone())))
                    .collect()
            }
        };
        targets
            .iter()
            .map(|&target| {
                let outcome = match self.render(source, &doc, manifest, target) {
                    Ok((bytes, report)) => ConversionOutcome::from_parts(bytes, report),
                    Err(e) => ConversionOutcome::Failure(e),
                };
                (target, outcome)
            })
            .collect()
    }

    /// Detect (or take the declared dialect) and parse
    pub fn source_document(
        &self,
        source: &[u8],
        manifest: Option<&ManifestHints>,
    ) -> Result<CanonicalDocument, ConversionError> {
        let declared = manifest.and_then(|m| m.source_dialect.as_deref());
        let dialect = detect_source(source, declared)?;
        Ok(dialects::parse(dialect, source, manifest)?)
    }

    fn render(
        &self,
        source: &[u8],
        doc: &CanonicalDocument,
        manifest: Option<&ManifestHints>,
        target: DialectId,
    ) -> Result<(Vec<u8>, DegradationReport), ConversionError> {
        let hints = manifest.map(|m| &m.conversion_hints);
        let mut report = DegradationReport::new();
        let bytes = dialects::serialize(target, doc, hints, &mut report)?;

        if self.config.validate_round_trip() && doc.source_dialect() == Some(target) {
            // Author overrides change the output on purpose; check the plain render
            let overridden = !hints::resolve(hints, target).overrides.is_empty();
            let plain = if overridden {
                dialects::serialize(target, doc, None, &mut DegradationReport::new())?
            } else {
                bytes.clone()
            };
            if let Some(entry) = round_trip_loss(target, doc, source, &plain) {
                report.push(entry);
            }
        }

        tracing::debug!(
            source = ?doc.source_dialect(),
            %target,
            degradations = report.len(),
            "converted document"
        );
        Ok((bytes, report))
    }
}

/// Outcome of [`validate_round_trip`]
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTripCheck {
    pub byte_identical: bool,
    pub semantic_identical: bool,
    /// Unified diff from input to output, when they differ
    pub diff: Option<String>,
    /// Anything the serializer could not carry
    pub report: DegradationReport,
}

/// Parse `raw` as `dialect`, render it back, and compare.
pub fn validate_round_trip(dialect: DialectId, raw: &[u8]) -> Result<RoundTripCheck, ConversionError> {
    let doc = dialects::parse(dialect, raw, None)?;
    let mut report = DegradationReport::new();
    let out = dialects::serialize(dialect, &doc, None, &mut report)?;

    let byte_identical = out == raw;
    let semantic_identical = dialects::parse(dialect, &out, None)
        .map(|back| back.sections() == doc.sections())
        .unwrap_or(false);
    let diff = (!byte_identical).then(|| unified_diff(raw, &out));

    Ok(RoundTripCheck {
        byte_identical,
        semantic_identical,
        diff,
        report,
    })
}

fn unified_diff(before: &[u8], after: &[u8]) -> String {
    let before = String::from_utf8_lossy(before);
    let after = String::from_utf8_lossy(after);
    diffy::create_patch(&before, &after).to_string()
}

/// What a same-dialect render lost relative to its source, if anything.
///
/// A changed section is reported at its index. Output that differs only
/// in its text is reported against the document as a whole.
fn round_trip_loss(
    dialect: DialectId,
    doc: &CanonicalDocument,
    source: &[u8],
    output: &[u8],
) -> Option<Degradation> {
    if source == output {
        return None;
    }
    let whole = doc.sections().first().map_or(SectionKind::Metadata, Section::kind);
    let (section, index, reason) = match dialects::parse(dialect, output, None) {
        Ok(back) => match first_difference(doc.sections(), back.sections()) {
            Some(index) => {
                let kind = doc
                    .sections()
                    .get(index)
                    .or_else(|| back.sections().get(index))
                    .map_or(SectionKind::Metadata, Section::kind);
                (kind, Some(index), "round trip changed the section".to_string())
            }
            None => (whole, None, "output differs from the source text".to_string()),
        },
        Err(e) => (whole, None, format!("output does not parse back: {}", e)),
    };
    Some(Degradation {
        section,
        index,
        subject: None,
        reason,
        detail: Some(unified_diff(source, output)),
    })
}

fn first_difference(a: &[Section], b: &[Section]) -> Option<usize> {
    if a == b {
        return None;
    }
    Some(
        a.iter()
            .zip(b)
            .position(|(x, y)| x != y)
            .unwrap_or_else(|| a.len().min(b.len())),
    )
}
