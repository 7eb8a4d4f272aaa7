//! Full pipeline against real files: generate, regenerate, render, sitemap.
//!
//! The generation service is replaced by a counting fake; everything else
//! is the production code path on a temp directory.

use plc_builder::cache::{CacheStore, FileCacheStore};
use plc_builder::catalog::Catalog;
use plc_builder::client::{CompletionRequest, GenerationError, TextGenerator};
use plc_builder::config::{BuilderConfig, PathsConfig};
use plc_builder::content::{ContentStore, FileContentStore};
use plc_builder::orchestrator::Orchestrator;
use plc_builder::retry::RetryPolicy;
use plc_builder::types::ConceptKey;
use plc_builder::{render, sitemap};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

struct CountingGenerator {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl CountingGenerator {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextGenerator for CountingGenerator {
    fn generate(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok(format!("## Answer\n\n{}", request.prompt))
    }
}

fn write_project(root: &Path, template: &str) -> BuilderConfig {
    fs::create_dir_all(root.join("data")).unwrap();
    fs::write(
        root.join("data/prog_langs.yaml"),
        "Programming Languages:\n  - Go\n  - Rust 1.55\n",
    )
    .unwrap();
    fs::write(
        root.join("data/prog_lang_concepts.yaml"),
        format!("String:\n  Concatenation: {template}\n"),
    )
    .unwrap();

    let mut config = BuilderConfig::default();
    config.paths = PathsConfig::default().resolve(root);
    config.processing.workers = 2;
    config.site.base_url = "https://example.org".to_string();
    config
}

fn run(config: &BuilderConfig, generator: &CountingGenerator) -> plc_builder::orchestrator::RunSummary {
    let catalog = Catalog::load(&config.paths).unwrap();
    let cache = FileCacheStore::new(&config.paths.cache_dir);
    let content = FileContentStore::for_model(&config.paths.content_dir, &config.generation.model);
    Orchestrator::new(generator, &cache, &content, config)
        .with_retry(RetryPolicy::immediate(1))
        .run(&catalog)
        .unwrap()
}

fn entry_count(path: &Path, field: Option<&str>) -> usize {
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    let object = match field {
        Some(field) => &json[field],
        None => &json,
    };
    object.as_object().unwrap().len()
}

// =========================================================================
// Generate
// =========================================================================

#[test]
fn first_run_generates_everything_second_run_nothing() {
    let tmp = TempDir::new().unwrap();
    let config = write_project(tmp.path(), "Explain concatenation in {lang}.");

    let generator = CountingGenerator::new();
    let summary = run(&config, &generator);
    assert_eq!(generator.calls(), 2);
    assert_eq!(summary.generated(), 2);
    assert_eq!(summary.skipped(), 0);

    let cache_dir = tmp.path().join(".cache");
    assert_eq!(entry_count(&cache_dir.join("Go.json"), Some("entries")), 1);
    assert_eq!(entry_count(&cache_dir.join("Rust_1_55.json"), Some("entries")), 1);

    let content_dir = tmp.path().join("docs/content-autogen/gpt_3_5_turbo");
    assert_eq!(entry_count(&content_dir.join("Go.json"), None), 1);
    assert_eq!(entry_count(&content_dir.join("Rust_1_55.json"), None), 1);

    let mut prompts = generator.prompts.lock().unwrap().clone();
    prompts.sort();
    assert_eq!(
        prompts,
        vec![
            "Explain concatenation in Go.",
            "Explain concatenation in Rust 1.55."
        ]
    );

    let again = CountingGenerator::new();
    let summary = run(&config, &again);
    assert_eq!(again.calls(), 0);
    assert_eq!(summary.cached(), 2);
    assert_eq!(summary.generated(), 0);
}

#[test]
fn edited_template_regenerates() {
    let tmp = TempDir::new().unwrap();
    let config = write_project(tmp.path(), "Explain concatenation in {lang}.");
    run(&config, &CountingGenerator::new());

    write_project(tmp.path(), "Show string concatenation in {lang}.");
    let generator = CountingGenerator::new();
    let summary = run(&config, &generator);
    assert_eq!(generator.calls(), 2);
    assert_eq!(summary.generated(), 2);

    let content = FileContentStore::for_model(&config.paths.content_dir, &config.generation.model);
    let doc = content.load("Go").unwrap();
    let entry = &doc[&ConceptKey::new("String", "Concatenation")];
    assert!(entry.generated_text.contains("Show string concatenation in Go."));
}

#[test]
fn deleted_document_is_regenerated() {
    let tmp = TempDir::new().unwrap();
    let config = write_project(tmp.path(), "Explain concatenation in {lang}.");
    run(&config, &CountingGenerator::new());

    let content = FileContentStore::for_model(&config.paths.content_dir, &config.generation.model);
    fs::remove_file(content.document_path("Go")).unwrap();

    let generator = CountingGenerator::new();
    run(&config, &generator);
    assert_eq!(generator.calls(), 1);
    assert!(content.has_document("Go"));

    let cache = FileCacheStore::new(&config.paths.cache_dir);
    assert_eq!(cache.load("Go").entries.len(), 1);
}

// =========================================================================
// Render and sitemap
// =========================================================================

#[test]
fn render_and_sitemap_cover_generated_pages() {
    let tmp = TempDir::new().unwrap();
    let config = write_project(tmp.path(), "Explain concatenation in {lang}.");
    run(&config, &CountingGenerator::new());

    let catalog = Catalog::load(&config.paths).unwrap();
    let content = FileContentStore::for_model(&config.paths.content_dir, &config.generation.model);
    let site_dir = &config.paths.site_dir;
    let summary = render::render(&catalog, &content, &config.site, site_dir).unwrap();
    assert_eq!(summary.languages, 2);
    assert_eq!(summary.concept_pages, 2);
    assert_eq!(summary.landing_pages, 2);

    let page = fs::read_to_string(site_dir.join("concepts/go/string-concatenation.html")).unwrap();
    assert!(page.contains("<h2>Answer</h2>"));
    assert!(page.contains("Explain concatenation in Go."));
    assert!(site_dir.join("concepts/rust-155/string-concatenation.html").is_file());
    assert!(site_dir.join("index.html").is_file());

    let entries = sitemap::write(site_dir, &config.site.base_url).unwrap();
    let locs: Vec<&str> = entries.iter().map(|e| e.loc.as_str()).collect();
    assert_eq!(
        locs,
        vec![
            "https://example.org/",
            "https://example.org/concepts/go.html",
            "https://example.org/concepts/go/string-concatenation.html",
            "https://example.org/concepts/rust-155.html",
            "https://example.org/concepts/rust-155/string-concatenation.html",
        ]
    );
    assert!(sitemap::verify(site_dir, &config.site.base_url).unwrap().is_empty());
}
