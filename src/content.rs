//! Per-language content documents.
//!
//! The generate stage writes one [`LanguageContentDocument`] per language and
//! the render stage reads them back. Documents live under a directory named
//! after the model that produced them:
//!
//! ```text
//! docs/content-autogen/
//! └── gpt_3_5_turbo/
//!     ├── Go.json
//!     ├── Python_3_10.json
//!     └── Rust_1_55.json
//! ```
//!
//! Unlike the cache, a document that exists but cannot be parsed is an
//! error: overwriting it would throw away everything generated so far.

use crate::cache::write_file;
use crate::naming::safe_name;
use crate::types::{LanguageContentDocument, LanguageSpec};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("cannot read content {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("corrupt content document {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("cannot write content {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("cannot encode content for {language}: {source}")]
    Encode {
        language: String,
        source: serde_json::Error,
    },
}

/// Durable storage for per-language content documents.
pub trait ContentStore: Send + Sync {
    /// The stored document, or an empty one if none exists yet.
    fn load(&self, language: &str) -> Result<LanguageContentDocument, ContentError>;

    /// Replace the stored document.
    fn save(&self, language: &str, document: &LanguageContentDocument)
    -> Result<(), ContentError>;
}

/// Stores each language's document as `<dir>/<safe_name>.json`.
#[derive(Debug, Clone)]
pub struct FileContentStore {
    dir: PathBuf,
}

impl FileContentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store for the documents produced by `model` under `content_root`.
    pub fn for_model(content_root: &Path, model: &str) -> Self {
        Self::new(content_root.join(safe_name(model)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn document_path(&self, language: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_name(language)))
    }

    /// Whether a document has been written for `language`.
    pub fn has_document(&self, language: &str) -> bool {
        self.document_path(language).is_file()
    }

    /// Safe names of every language with a document, sorted.
    pub fn list(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        names.sort();
        names
    }

    /// Stored documents whose language is no longer in `languages`.
    ///
    /// They are never deleted; `check` reports them.
    pub fn orphaned(&self, languages: &[LanguageSpec]) -> Vec<String> {
        let known: HashSet<String> = languages
            .iter()
            .map(|l| safe_name(&l.display_name))
            .collect();
        self.list()
            .into_iter()
            .filter(|name| !known.contains(name))
            .collect()
    }
}

impl ContentStore for FileContentStore {
    fn load(&self, language: &str) -> Result<LanguageContentDocument, ContentError> {
        let path = self.document_path(language);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(LanguageContentDocument::new());
            }
            Err(source) => return Err(ContentError::Read { path, source }),
        };
        serde_json::from_str(&content).map_err(|source| ContentError::Corrupt { path, source })
    }

    fn save(
        &self,
        language: &str,
        document: &LanguageContentDocument,
    ) -> Result<(), ContentError> {
        let path = self.document_path(language);
        let json =
            serde_json::to_string_pretty(document).map_err(|source| ContentError::Encode {
                language: language.to_string(),
                source,
            })?;
        write_file(&self.dir, &path, json).map_err(|source| ContentError::Write { path, source })
    }
}
