//! Loading the two data documents: target languages and concept prompts.
//!
//! Both are YAML and both are fatal on any problem. The builder never runs
//! with a partially understood catalog.
//!
//! ## Languages
//!
//! ```yaml
//! Programming Languages:
//!   - Python 3.10
//!   - Go
//!   - Rust 1.55
//! ```
//!
//! A bare top-level list is accepted too. Order is kept and only drives
//! iteration.
//!
//! ## Concepts
//!
//! ```yaml
//! title: Programming Concepts        # non-mapping entries are ignored
//! String:
//!   Concatenation: Explain string concatenation in {lang}.
//!   Interpolation: Show string interpolation in {lang}.
//! ```
//!
//! Categories and concepts keep the order they have in the file. Every
//! concept needs a distinct `category/name` key, so `A/B: {C: ..}` and
//! `A: {B/C: ..}` cannot both appear.

use crate::config::PathsConfig;
use crate::types::{ConceptSpec, LANG_PLACEHOLDER, LanguageSpec};
use serde::Deserialize;
use serde_yaml_ng::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("YAML parse error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml_ng::Error,
    },
    #[error("Invalid catalog {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

impl CatalogError {
    fn invalid(path: &Path, message: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Everything one run needs to know about what to generate.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub languages: Vec<LanguageSpec>,
    pub concepts: Vec<ConceptSpec>,
}

impl Catalog {
    /// Load both documents from the configured (already resolved) paths.
    pub fn load(paths: &PathsConfig) -> Result<Self, CatalogError> {
        Ok(Self {
            languages: load_languages(&paths.languages)?,
            concepts: load_concepts(&paths.concepts)?,
        })
    }

    /// Find the concept for a `(category, name)` pair.
    pub fn concept(&self, category: &str, name: &str) -> Option<&ConceptSpec> {
        self.concepts
            .iter()
            .find(|c| c.category == category && c.name == name)
    }

    /// Category names in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.concepts
            .iter()
            .map(|c| c.category.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LanguagesDocument {
    Named {
        #[serde(rename = "Programming Languages")]
        languages: Vec<String>,
    },
    Bare(Vec<String>),
}

fn read(path: &Path) -> Result<String, CatalogError> {
    fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the ordered language list.
pub fn load_languages(path: &Path) -> Result<Vec<LanguageSpec>, CatalogError> {
    let content = read(path)?;
    let document: LanguagesDocument =
        serde_yaml_ng::from_str(&content).map_err(|source| CatalogError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
    let names = match document {
        LanguagesDocument::Named { languages } => languages,
        LanguagesDocument::Bare(languages) => languages,
    };

    if names.is_empty() {
        return Err(CatalogError::invalid(path, "no languages listed"));
    }
    let mut seen = HashSet::new();
    for name in &names {
        if name.trim().is_empty() {
            return Err(CatalogError::invalid(path, "empty language name"));
        }
        if !seen.insert(name.as_str()) {
            return Err(CatalogError::invalid(
                path,
                format!("language '{name}' listed twice"),
            ));
        }
    }

    Ok(names.into_iter().map(LanguageSpec::new).collect())
}

/// Load concept prompts in document order.
pub fn load_concepts(path: &Path) -> Result<Vec<ConceptSpec>, CatalogError> {
    let content = read(path)?;
    let document: Value = serde_yaml_ng::from_str(&content).map_err(|source| CatalogError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    parse_concepts(&document).map_err(|message| CatalogError::invalid(path, message))
}

fn parse_concepts(document: &Value) -> Result<Vec<ConceptSpec>, String> {
    let Value::Mapping(categories) = document else {
        return Err("top level must be a mapping of categories".into());
    };

    let mut concepts: Vec<ConceptSpec> = Vec::new();
    let mut keys = HashSet::new();
    for (category_key, entries) in categories {
        // Scalars such as `title:` and empty categories carry no concepts.
        let Value::Mapping(entries) = entries else {
            continue;
        };
        let category = scalar_string(category_key)
            .ok_or_else(|| format!("category key {category_key:?} is not a string"))?;

        for (name_key, template) in entries {
            let name = scalar_string(name_key)
                .ok_or_else(|| format!("concept key {name_key:?} in '{category}' is not a string"))?;
            let Value::String(template) = template else {
                return Err(format!(
                    "prompt for '{category}/{name}' must be a string"
                ));
            };
            if !template.contains(LANG_PLACEHOLDER) {
                return Err(format!(
                    "prompt for '{category}/{name}' has no {LANG_PLACEHOLDER} placeholder"
                ));
            }
            let concept = ConceptSpec {
                category: category.clone(),
                name,
                prompt_template: template.clone(),
            };
            // `A/B` + `C` and `A` + `B/C` share the key `A/B/C`.
            if !keys.insert(concept.key()) {
                return Err(format!(
                    "concept key '{}' is used by more than one concept",
                    concept.key()
                ));
            }
            concepts.push(concept);
        }
    }
    Ok(concepts)
}

/// YAML keys like `2021` or `true` are read as their literal text.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
