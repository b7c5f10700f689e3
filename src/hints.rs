//! Conversion hints.
//!
//! Authors attach per-target guidance to a package manifest, keyed by
//! dialect name. Hints only ever affect serialization: they fill or
//! override front-matter keys of the target dialect and are never stored
//! in a [`CanonicalDocument`](crate::model::CanonicalDocument).

use crate::dialects::{keys, DialectId};
use crate::model::{Fields, MetaValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Author-supplied hint bags, keyed by dialect name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionHints(HashMap<String, Fields>);

impl ConversionHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dialect: impl Into<String>, bag: Fields) {
        self.0.insert(dialect.into(), bag);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bag for a dialect. An exact name wins over an alias.
    pub fn for_dialect(&self, dialect: DialectId) -> Option<&Fields> {
        if let Some(bag) = self.0.get(dialect.as_str()) {
            return Some(bag);
        }
        let mut names: Vec<&String> = self.0.keys().collect();
        names.sort();
        names
            .into_iter()
            .find(|name| DialectId::from_name(name) == Some(dialect))
            .and_then(|name| self.0.get(name))
    }
}

/// Conversion-relevant slice of a package manifest, parsed by the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_dialect: Option<String>,
    #[serde(default)]
    pub conversion_hints: ConversionHints,
}

impl ManifestHints {
    /// The declared source dialect, when it names a known one
    pub fn declared_dialect(&self) -> Option<DialectId> {
        self.source_dialect.as_deref().and_then(DialectId::from_name)
    }
}

/// Hints resolved for one target dialect
#[derive(Debug, Clone, PartialEq)]
pub struct DialectHintBag {
    pub dialect: DialectId,
    /// Author values; replace document values at the same native key
    pub overrides: Fields,
    /// Dialect defaults; only fill keys the output would otherwise lack
    pub defaults: Fields,
}

/// Merge the author's bag for `target` over the dialect's declared defaults.
///
/// Open-schema targets take any key; closed ones ignore keys they do not
/// declare. Values that are not flat scalars and glob hints that do not
/// compile are ignored.
pub fn resolve(hints: Option<&ConversionHints>, target: DialectId) -> DialectHintBag {
    let spec = target.spec();
    let mut overrides = Fields::new();

    if let Some(bag) = hints.and_then(|h| h.for_dialect(target)) {
        for (key, value) in bag.iter() {
            if !spec.knows_native(key) && !spec.accepts_custom(key) {
                tracing::debug!(dialect = %target, key, "ignoring unknown hint key");
                continue;
            }
            if !is_flat(value) {
                tracing::warn!(dialect = %target, key, "ignoring hint with nested value");
                continue;
            }
            if spec.canonical_for(key) == Some(keys::GLOBS) {
                if let Some(bad) = invalid_glob(value) {
                    tracing::warn!(dialect = %target, key, pattern = %bad, "ignoring invalid glob hint");
                    continue;
                }
            }
            overrides.insert(key, value.clone());
        }
    }

    let defaults = spec
        .defaults
        .iter()
        .filter(|(key, _)| !overrides.contains_key(key))
        .map(|(key, value)| (key.to_string(), MetaValue::from(*value)))
        .collect();

    DialectHintBag {
        dialect: target,
        overrides,
        defaults,
    }
}

fn is_flat(value: &MetaValue) -> bool {
    match value {
        MetaValue::Float(f) => f.is_finite(),
        MetaValue::List(items) => items.iter().all(|i| i.is_scalar() && is_flat(i)),
        _ => true,
    }
}

/// First pattern that fails to compile, or the whole value if it holds no patterns
fn invalid_glob(value: &MetaValue) -> Option<String> {
    let patterns = value.to_string_list();
    if patterns.is_empty() {
        return Some(format!("{:?}", value));
    }
    patterns
        .into_iter()
        .find(|p| glob::Pattern::new(p).is_err())
}
