//! The generate stage: decide what is missing, generate it, record it.
//!
//! For each language, in catalog order:
//!
//! 1. Load the language's cache record and content document.
//! 2. Plan the work: every concept that is not cached, whose prompt template
//!    changed since it was cached, or whose content is missing from the
//!    document. The plan is fixed before any worker starts, so each item is
//!    dispatched once per run.
//! 3. Run the items on a rayon pool of exactly `workers` threads. Each item
//!    renders its prompt and calls the generator through the retry policy.
//! 4. Record successes under the language lock: insert into the document,
//!    save the document, then mark the cache. A concept is never marked in
//!    the cache unless its text is on disk.
//! 5. Save the document once more when the language finishes.
//!
//! Failures stay local. A failed item is reported and left unmarked, so the
//! next run retries it. A persistence failure stops the rest of that
//! language only. Repeated authentication failures stop the whole run,
//! since no request will succeed with a bad key.

use crate::cache::{CacheError, CacheHandle, CacheStore, prompt_hash};
use crate::catalog::Catalog;
use crate::client::{CompletionRequest, GenerationError, TextGenerator};
use crate::config::{BuilderConfig, GenerationConfig};
use crate::content::{ContentError, ContentStore};
use crate::retry::RetryPolicy;
use crate::types::{ConceptKey, ConceptSpec, ContentEntry, LanguageContentDocument, LanguageSpec};
use rayon::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// A cache or content write that failed. Stops the rest of the language.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Content(#[from] ContentError),
}

// ============================================================================
// Planning
// ============================================================================

/// Why a concept needs generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingReason {
    /// Never generated for this language.
    New,
    /// Generated from a prompt template that has since changed.
    Stale,
    /// Marked in the cache but absent from the content document.
    MissingContent,
}

impl fmt::Display for PendingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Stale => write!(f, "prompt changed"),
            Self::MissingContent => write!(f, "content missing"),
        }
    }
}

/// One pending (language, concept) generation.
#[derive(Debug, Clone)]
pub struct WorkItem<'c> {
    pub concept: &'c ConceptSpec,
    pub key: ConceptKey,
    pub prompt_hash: String,
    pub reason: PendingReason,
}

/// Concepts still to generate for one language, in catalog order.
pub fn plan_work<'c>(
    concepts: &'c [ConceptSpec],
    cache: &CacheHandle<'_>,
    document: &LanguageContentDocument,
) -> Vec<WorkItem<'c>> {
    concepts
        .iter()
        .filter_map(|concept| {
            let key = concept.key();
            let hash = prompt_hash(&concept.prompt_template);
            let reason = if !cache.exists(&key) {
                PendingReason::New
            } else if !cache.is_fresh(&key, &hash) {
                PendingReason::Stale
            } else if !document.contains_key(&key) {
                PendingReason::MissingContent
            } else {
                return None;
            };
            Some(WorkItem {
                concept,
                key,
                prompt_hash: hash,
                reason,
            })
        })
        .collect()
}

/// Pending work for one language, without calling anything.
#[derive(Debug)]
pub struct LanguagePlan {
    pub language: String,
    pub cached: usize,
    pub pending: Vec<(ConceptKey, PendingReason)>,
    pub error: Option<ContentError>,
}

/// Plan every language of the catalog. Used by `check`.
pub fn plan(
    catalog: &Catalog,
    cache_store: &dyn CacheStore,
    content_store: &dyn ContentStore,
) -> Vec<LanguagePlan> {
    catalog
        .languages
        .iter()
        .map(|language| {
            let name = language.display_name.as_str();
            let document = match content_store.load(name) {
                Ok(doc) => doc,
                Err(err) => {
                    return LanguagePlan {
                        language: name.to_string(),
                        cached: 0,
                        pending: Vec::new(),
                        error: Some(err),
                    };
                }
            };
            let cache = CacheHandle::load(cache_store, name);
            let work = plan_work(&catalog.concepts, &cache, &document);
            LanguagePlan {
                language: name.to_string(),
                cached: catalog.concepts.len() - work.len(),
                pending: work.into_iter().map(|w| (w.key, w.reason)).collect(),
                error: None,
            }
        })
        .collect()
}

// ============================================================================
// Outcomes
// ============================================================================

/// Why an item was not generated this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Transient failures until the attempt ceiling.
    Exhausted { attempts: u32, error: GenerationError },
    /// A fatal failure; not retried.
    Rejected(GenerationError),
    /// Generated, but the content or cache write failed.
    NotPersisted,
    /// An earlier persistence failure stopped this language.
    LanguageAborted,
    /// Too many authentication failures in this run.
    RunAborted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { attempts, error } => {
                write!(f, "{error} (gave up after {attempts} attempts)")
            }
            Self::Rejected(error) => write!(f, "{error}"),
            Self::NotPersisted => write!(f, "generated but not saved"),
            Self::LanguageAborted => write!(f, "language aborted"),
            Self::RunAborted => write!(f, "run aborted after repeated authentication failures"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Generated(ConceptKey),
    Skipped { key: ConceptKey, reason: SkipReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub key: ConceptKey,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub struct LanguageReport {
    pub language: String,
    /// Concepts already done before this run.
    pub cached: usize,
    pub generated: Vec<ConceptKey>,
    pub skipped: Vec<SkippedItem>,
    pub persistence_error: Option<PersistenceError>,
}

impl LanguageReport {
    fn failed(language: &str, error: PersistenceError) -> Self {
        Self {
            language: language.to_string(),
            cached: 0,
            generated: Vec::new(),
            skipped: Vec::new(),
            persistence_error: Some(error),
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub languages: Vec<LanguageReport>,
}

impl RunSummary {
    pub fn generated(&self) -> usize {
        self.languages.iter().map(|l| l.generated.len()).sum()
    }

    pub fn cached(&self) -> usize {
        self.languages.iter().map(|l| l.cached).sum()
    }

    pub fn skipped(&self) -> usize {
        self.languages.iter().map(|l| l.skipped.len()).sum()
    }

    pub fn has_persistence_failures(&self) -> bool {
        self.languages.iter().any(|l| l.persistence_error.is_some())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} generated, {} cached, {} skipped across {} language(s)",
            self.generated(),
            self.cached(),
            self.skipped(),
            self.languages.len()
        )
    }
}

/// Progress events for the CLI printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateEvent {
    LanguageStarted {
        language: String,
        pending: usize,
        cached: usize,
    },
    ItemGenerated {
        language: String,
        key: ConceptKey,
    },
    ItemSkipped {
        language: String,
        key: ConceptKey,
        reason: SkipReason,
    },
    LanguageFinished {
        language: String,
        generated: usize,
        skipped: usize,
        error: Option<String>,
    },
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Per-language state shared by the workers.
struct LanguageRun<'r> {
    language: &'r LanguageSpec,
    cache: CacheHandle<'r>,
    document: Mutex<LanguageContentDocument>,
    aborted: AtomicBool,
    failure: Mutex<Option<PersistenceError>>,
}

impl LanguageRun<'_> {
    fn document(&self) -> MutexGuard<'_, LanguageContentDocument> {
        self.document.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn abort(&self, error: PersistenceError) {
        self.aborted.store(true, Ordering::SeqCst);
        let mut failure = self.failure.lock().unwrap_or_else(|e| e.into_inner());
        failure.get_or_insert(error);
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

pub struct Orchestrator<'a> {
    generator: &'a dyn TextGenerator,
    cache_store: &'a dyn CacheStore,
    content_store: &'a dyn ContentStore,
    generation: GenerationConfig,
    retry: RetryPolicy,
    workers: usize,
    auth_abort_after: usize,
    events: Option<Sender<GenerateEvent>>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        generator: &'a dyn TextGenerator,
        cache_store: &'a dyn CacheStore,
        content_store: &'a dyn ContentStore,
        config: &BuilderConfig,
    ) -> Self {
        Self {
            generator,
            cache_store,
            content_store,
            generation: config.generation.clone(),
            retry: RetryPolicy::from_config(&config.retry),
            workers: config.processing.workers.max(1),
            auth_abort_after: config.processing.auth_abort_after.max(1),
            events: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_events(mut self, events: Sender<GenerateEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: GenerateEvent) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }

    /// Generate everything the catalog needs that is not already done.
    ///
    /// Item and language failures are reported in the summary; only a
    /// failure to start the worker pool is an error.
    pub fn run(&self, catalog: &Catalog) -> Result<RunSummary, OrchestratorError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;
        let auth_failures = AtomicUsize::new(0);

        let mut summary = RunSummary::default();
        for language in &catalog.languages {
            let report = pool.install(|| self.run_language(language, catalog, &auth_failures));
            summary.languages.push(report);
        }
        Ok(summary)
    }

    fn run_language(
        &self,
        language: &LanguageSpec,
        catalog: &Catalog,
        auth_failures: &AtomicUsize,
    ) -> LanguageReport {
        let name = language.display_name.as_str();
        let document = match self.content_store.load(name) {
            Ok(doc) => doc,
            Err(err) => {
                log::error!("skipping {name}: {err}");
                self.emit(GenerateEvent::LanguageFinished {
                    language: name.to_string(),
                    generated: 0,
                    skipped: 0,
                    error: Some(err.to_string()),
                });
                return LanguageReport::failed(name, err.into());
            }
        };
        let cache = CacheHandle::load(self.cache_store, name);
        let work = plan_work(&catalog.concepts, &cache, &document);
        let cached = catalog.concepts.len() - work.len();

        self.emit(GenerateEvent::LanguageStarted {
            language: name.to_string(),
            pending: work.len(),
            cached,
        });

        let run = LanguageRun {
            language,
            cache,
            document: Mutex::new(document),
            aborted: AtomicBool::new(false),
            failure: Mutex::new(None),
        };

        let outcomes: Vec<ItemOutcome> = work
            .par_iter()
            .map(|item| {
                let outcome = self.run_item(&run, item, auth_failures);
                match &outcome {
                    ItemOutcome::Generated(key) => self.emit(GenerateEvent::ItemGenerated {
                        language: name.to_string(),
                        key: key.clone(),
                    }),
                    ItemOutcome::Skipped { key, reason } => {
                        self.emit(GenerateEvent::ItemSkipped {
                            language: name.to_string(),
                            key: key.clone(),
                            reason: reason.clone(),
                        })
                    }
                }
                outcome
            })
            .collect();

        if !work.is_empty() && !run.is_aborted() {
            let saved = self.content_store.save(name, &run.document());
            if let Err(err) = saved {
                run.abort(err.into());
            }
        }

        let mut generated = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                ItemOutcome::Generated(key) => generated.push(key),
                ItemOutcome::Skipped { key, reason } => skipped.push(SkippedItem { key, reason }),
            }
        }
        let persistence_error = run
            .failure
            .into_inner()
            .unwrap_or_else(|e| e.into_inner());

        self.emit(GenerateEvent::LanguageFinished {
            language: name.to_string(),
            generated: generated.len(),
            skipped: skipped.len(),
            error: persistence_error.as_ref().map(|e| e.to_string()),
        });

        LanguageReport {
            language: name.to_string(),
            cached,
            generated,
            skipped,
            persistence_error,
        }
    }

    fn run_item(
        &self,
        run: &LanguageRun<'_>,
        item: &WorkItem<'_>,
        auth_failures: &AtomicUsize,
    ) -> ItemOutcome {
        let skip = |reason| ItemOutcome::Skipped {
            key: item.key.clone(),
            reason,
        };
        if run.is_aborted() {
            return skip(SkipReason::LanguageAborted);
        }
        if auth_failures.load(Ordering::SeqCst) >= self.auth_abort_after {
            return skip(SkipReason::RunAborted);
        }

        let request = CompletionRequest::new(
            &self.generation,
            item.concept.render_prompt(run.language),
        );
        let text = match self.retry.run(|| self.generator.generate(&request)) {
            Ok(text) => text,
            Err(failure) => {
                if failure.error.is_authentication() {
                    auth_failures.fetch_add(1, Ordering::SeqCst);
                }
                log::warn!(
                    "{}: {} skipped: {failure}",
                    run.language,
                    item.key
                );
                let reason = if failure.error.is_transient() {
                    SkipReason::Exhausted {
                        attempts: failure.attempts,
                        error: failure.error,
                    }
                } else {
                    SkipReason::Rejected(failure.error)
                };
                return skip(reason);
            }
        };

        self.record(run, item, text).unwrap_or_else(skip)
    }

    /// Save the text, then mark the cache. Returns the skip reason on failure.
    fn record(
        &self,
        run: &LanguageRun<'_>,
        item: &WorkItem<'_>,
        text: String,
    ) -> Result<ItemOutcome, SkipReason> {
        let name = run.language.display_name.as_str();
        let mut document = run.document();
        if run.is_aborted() {
            return Err(SkipReason::LanguageAborted);
        }

        let previous = document.insert(
            item.key.clone(),
            ContentEntry {
                category: item.concept.category.clone(),
                name: item.concept.name.clone(),
                generated_text: text,
            },
        );
        if let Err(err) = self.content_store.save(name, &document) {
            match previous {
                Some(entry) => document.insert(item.key.clone(), entry),
                None => document.remove(&item.key),
            };
            log::error!("{name}: cannot save content, stopping language: {err}");
            run.abort(err.into());
            return Err(SkipReason::NotPersisted);
        }
        if let Err(err) = run.cache.update(&item.key, &item.prompt_hash) {
            log::error!("{name}: cannot update cache, stopping language: {err}");
            run.abort(err.into());
            return Err(SkipReason::NotPersisted);
        }
        Ok(ItemOutcome::Generated(item.key.clone()))
    }
}
