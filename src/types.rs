//! Shared types used across all pipeline stages.
//!
//! The catalog types ([`LanguageSpec`], [`ConceptSpec`]) are read-only inputs
//! loaded fresh on every run. [`LanguageContentDocument`] is the JSON document
//! written by the generate stage and read by the render stage, so its shape
//! must stay stable across both.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder substituted with the language display name in prompt templates.
pub const LANG_PLACEHOLDER: &str = "{lang}";

/// A target language. Identity is the display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguageSpec {
    /// Human-readable label, possibly with a version suffix (`Rust 1.55`).
    pub display_name: String,
}

impl LanguageSpec {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
        }
    }
}

impl fmt::Display for LanguageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// One concept to explain for every language.
///
/// Identity is the `(category, name)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptSpec {
    pub category: String,
    pub name: String,
    /// Prompt with [`LANG_PLACEHOLDER`] where the language name goes.
    pub prompt_template: String,
}

impl ConceptSpec {
    pub fn key(&self) -> ConceptKey {
        ConceptKey::new(&self.category, &self.name)
    }

    /// Substitute the language display name into the template.
    pub fn render_prompt(&self, language: &LanguageSpec) -> String {
        self.prompt_template
            .replace(LANG_PLACEHOLDER, &language.display_name)
    }
}

/// Composite `category/name` identifier used for cache membership and as the
/// content document key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptKey(String);

impl ConceptKey {
    pub fn new(category: &str, name: &str) -> Self {
        Self(format!("{category}/{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConceptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generated explanation of one concept for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub category: String,
    pub name: String,
    /// Markdown returned by the generation service.
    pub generated_text: String,
}

/// All generated content for one language, keyed by concept.
///
/// Grows monotonically across runs; entries are never removed automatically.
pub type LanguageContentDocument = BTreeMap<ConceptKey, ContentEntry>;
