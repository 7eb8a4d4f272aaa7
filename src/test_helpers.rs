//! Shared test utilities: fixture setup, in-memory stores and a scripted
//! generator.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let generator = ScriptedGenerator::new()
//!     .script("Explain concatenation in Go.", vec![Err(GenerationError::RateLimited)]);
//! let cache = MemoryCacheStore::default();
//! let content = MemoryContentStore::default();
//! // ... run the orchestrator ...
//! assert_eq!(generator.calls(), 3);
//! ```

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

use crate::cache::{CacheError, CacheRecord, CacheStore};
use crate::client::{CompletionRequest, GenerationError, TextGenerator};
use crate::content::{ContentError, ContentStore};
use crate::types::{ConceptSpec, LanguageContentDocument, LanguageSpec};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

pub fn languages(names: &[&str]) -> Vec<LanguageSpec> {
    names.iter().map(|n| LanguageSpec::new(*n)).collect()
}

pub fn concept(category: &str, name: &str, template: &str) -> ConceptSpec {
    ConceptSpec {
        category: category.into(),
        name: name.into(),
        prompt_template: template.into(),
    }
}

// =========================================================================
// Cache stores
// =========================================================================

#[derive(Default)]
pub struct MemoryCacheStore {
    records: Mutex<HashMap<String, CacheRecord>>,
    saves: AtomicUsize,
}

impl MemoryCacheStore {
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self, language: &str) -> CacheRecord {
        self.records
            .lock()
            .unwrap()
            .get(language)
            .cloned()
            .unwrap_or_else(|| CacheRecord::empty(language))
    }

    fn save(&self, language: &str, record: &CacheRecord) -> Result<(), CacheError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .insert(language.to_string(), record.clone());
        Ok(())
    }
}

/// Loads a fixed record and refuses every save.
#[derive(Default)]
pub struct FailingCacheStore {
    record: Option<CacheRecord>,
}

impl FailingCacheStore {
    pub fn with_record(record: CacheRecord) -> Self {
        Self {
            record: Some(record),
        }
    }
}

impl CacheStore for FailingCacheStore {
    fn load(&self, language: &str) -> CacheRecord {
        self.record
            .clone()
            .unwrap_or_else(|| CacheRecord::empty(language))
    }

    fn save(&self, language: &str, _record: &CacheRecord) -> Result<(), CacheError> {
        Err(CacheError::Io {
            path: PathBuf::from(format!("memory/{language}.json")),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only cache"),
        })
    }
}

// =========================================================================
// Content stores
// =========================================================================

#[derive(Default)]
pub struct MemoryContentStore {
    documents: Mutex<HashMap<String, LanguageContentDocument>>,
}

impl MemoryContentStore {
    pub fn with_document(language: &str, document: LanguageContentDocument) -> Self {
        let store = Self::default();
        store
            .documents
            .lock()
            .unwrap()
            .insert(language.to_string(), document);
        store
    }

    pub fn document(&self, language: &str) -> LanguageContentDocument {
        self.documents
            .lock()
            .unwrap()
            .get(language)
            .cloned()
            .unwrap_or_default()
    }
}

impl ContentStore for MemoryContentStore {
    fn load(&self, language: &str) -> Result<LanguageContentDocument, ContentError> {
        Ok(self.document(language))
    }

    fn save(
        &self,
        language: &str,
        document: &LanguageContentDocument,
    ) -> Result<(), ContentError> {
        self.documents
            .lock()
            .unwrap()
            .insert(language.to_string(), document.clone());
        Ok(())
    }
}

/// Loads empty documents and refuses every save.
#[derive(Default)]
pub struct FailingContentStore;

impl ContentStore for FailingContentStore {
    fn load(&self, _language: &str) -> Result<LanguageContentDocument, ContentError> {
        Ok(LanguageContentDocument::new())
    }

    fn save(
        &self,
        language: &str,
        _document: &LanguageContentDocument,
    ) -> Result<(), ContentError> {
        Err(ContentError::Write {
            path: PathBuf::from(format!("memory/{language}.json")),
            source: io::Error::new(io::ErrorKind::StorageFull, "disk full"),
        })
    }
}

// =========================================================================
// Generator
// =========================================================================

/// Answers every prompt with `"Answer: <prompt>"` unless a script says
/// otherwise. Scripted results for a prompt are consumed in order; once a
/// script runs out the default answer (or the fallback error) applies.
#[derive(Default)]
pub struct ScriptedGenerator {
    scripts: Mutex<HashMap<String, VecDeque<Result<String, GenerationError>>>>,
    fallback: Option<GenerationError>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every unscripted call fails with `error`.
    pub fn failing(error: GenerationError) -> Self {
        Self {
            fallback: Some(error),
            ..Self::default()
        }
    }

    pub fn script(self, prompt: &str, results: Vec<Result<String, GenerationError>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(prompt.to_string(), results.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, sorted (workers call in any order).
    pub fn prompts(&self) -> Vec<String> {
        let mut prompts = self.prompts.lock().unwrap().clone();
        prompts.sort();
        prompts
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.prompt)
            .and_then(|queue| queue.pop_front());
        match (scripted, &self.fallback) {
            (Some(result), _) => result,
            (None, Some(error)) => Err(error.clone()),
            (None, None) => Ok(format!("Answer: {}", request.prompt)),
        }
    }
}
