//! Per-language record of completed generations.
//!
//! Every generation call costs money and time, so the generate stage must be
//! idempotent and resumable: a second run with the same catalog makes no
//! calls at all, and a run interrupted halfway picks up where it stopped.
//! This module records which concepts are done for each language.
//!
//! # Design
//!
//! ## Records
//!
//! A [`CacheRecord`] maps concept keys to a [`CacheEntry`] holding the
//! SHA-256 of the prompt template that produced the content and the time it
//! was generated. Membership answers "was this concept ever generated";
//! [`CacheHandle::is_fresh`] additionally requires the template to be
//! unchanged, so editing a prompt in the concepts file regenerates exactly
//! that concept for every language.
//!
//! ## Stores
//!
//! Persistence is behind the [`CacheStore`] trait and injected into the
//! orchestrator. [`FileCacheStore`] writes one JSON file per language at
//! `<cache_dir>/<safe_name>.json`. Loading never fails: a missing, corrupt or
//! version-mismatched file means nothing has been generated yet.
//!
//! ## Handles
//!
//! A [`CacheHandle`] is the in-memory view of one language's record. Updates
//! are read-modify-persist under a mutex, so concurrent workers of the same
//! language never lose each other's entries. A failed write is rolled back
//! and reported; the handle never claims an entry that is not on disk.
//!
//! There is no eviction and no TTL. Entries for languages or concepts removed
//! from the catalog stay in place.

use crate::naming::safe_name;
use crate::types::ConceptKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Version of the record format. Bump this to invalidate every existing
/// cache when the format or the prompt hash computation changes.
const RECORD_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cannot write cache {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("cannot encode cache for {language}: {source}")]
    Json {
        language: String,
        source: serde_json::Error,
    },
}

/// One completed concept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    /// SHA-256 of the prompt template used.
    pub prompt_hash: String,
    pub generated_at: DateTime<Utc>,
}

/// Persisted set of completed concepts for one language.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheRecord {
    pub version: u32,
    pub language: String,
    pub entries: BTreeMap<ConceptKey, CacheEntry>,
}

impl CacheRecord {
    /// Create an empty record (first run for this language).
    pub fn empty(language: &str) -> Self {
        Self {
            version: RECORD_VERSION,
            language: language.to_string(),
            entries: BTreeMap::new(),
        }
    }
}

/// Durable storage for per-language cache records.
pub trait CacheStore: Send + Sync {
    /// Current record for `language`, or an empty one if none exists.
    fn load(&self, language: &str) -> CacheRecord;

    /// Replace the stored record for `language`.
    fn save(&self, language: &str, record: &CacheRecord) -> Result<(), CacheError>;
}

/// Stores each language's record as `<dir>/<safe_name>.json`.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Resolve the record path for a language.
    pub fn record_path(&self, language: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_name(language)))
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self, language: &str) -> CacheRecord {
        let path = self.record_path(language);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return CacheRecord::empty(language),
        };
        let record: CacheRecord = match serde_json::from_str(&content) {
            Ok(r) => r,
            Err(err) => {
                log::warn!("ignoring unreadable cache {}: {err}", path.display());
                return CacheRecord::empty(language);
            }
        };
        if record.version != RECORD_VERSION {
            return CacheRecord::empty(language);
        }
        record
    }

    fn save(&self, language: &str, record: &CacheRecord) -> Result<(), CacheError> {
        let path = self.record_path(language);
        let json = serde_json::to_string_pretty(record).map_err(|source| CacheError::Json {
            language: language.to_string(),
            source,
        })?;
        write_file(&self.dir, &path, json).map_err(|source| CacheError::Io { path, source })
    }
}

/// Write through a sibling temp file so a crash never leaves a truncated file.
pub(crate) fn write_file(dir: &Path, path: &Path, contents: String) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

/// SHA-256 of a prompt template, as a hex string.
pub fn prompt_hash(template: &str) -> String {
    format!("{:x}", Sha256::digest(template.as_bytes()))
}

/// In-memory view of one language's cache, bound to its store.
pub struct CacheHandle<'a> {
    store: &'a dyn CacheStore,
    language: String,
    record: Mutex<CacheRecord>,
}

impl<'a> CacheHandle<'a> {
    /// Load the record for `language`. Never fails.
    pub fn load(store: &'a dyn CacheStore, language: &str) -> Self {
        Self {
            store,
            language: language.to_string(),
            record: Mutex::new(store.load(language)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheRecord> {
        // Poisoning is ignored: the record is only mutated under this guard.
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Whether the concept was ever generated.
    pub fn exists(&self, key: &ConceptKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Whether the concept was generated from the template with this hash.
    pub fn is_fresh(&self, key: &ConceptKey, prompt_hash: &str) -> bool {
        self.lock()
            .entries
            .get(key)
            .is_some_and(|e| e.prompt_hash == prompt_hash)
    }

    /// Mark a concept as done and persist the whole record.
    ///
    /// Repeated calls with the same key keep a single entry. If the write
    /// fails, the in-memory record is restored and the error returned.
    pub fn update(&self, key: &ConceptKey, prompt_hash: &str) -> Result<(), CacheError> {
        let mut record = self.lock();
        let previous = record.entries.insert(
            key.clone(),
            CacheEntry {
                prompt_hash: prompt_hash.to_string(),
                generated_at: Utc::now(),
            },
        );
        if let Err(err) = self.store.save(&self.language, &record) {
            match previous {
                Some(entry) => record.entries.insert(key.clone(), entry),
                None => record.entries.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the cached keys.
    pub fn keys(&self) -> Vec<ConceptKey> {
        self.lock().entries.keys().cloned().collect()
    }
}
