//! CLI output formatting for all pipeline stages.
//!
//! # Information-First Display
//!
//! Output leads with what the user cares about (languages, concepts, counts)
//! and shows file paths as secondary context. Languages are headers; items
//! are indented under them.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Languages
//! 001 Go
//! 002 Rust 1.55
//!
//! Concepts
//! String (2)
//!     001 Concatenation
//!     002 Length
//!
//! Pending
//! Go: 1 cached, 1 pending
//!     String/Length (prompt changed)
//! Rust 1.55: 2 cached, up to date
//! ```
//!
//! ## Generate
//!
//! ```text
//! Go (1 pending, 1 cached)
//!     String/Length: generated
//! Rust 1.55 (2 pending, 0 cached)
//!     String/Concatenation: generated
//!     String/Length: skipped (rate limited by the generation service (gave up after 6 attempts))
//!
//! Go: 1 generated, 1 cached
//! Rust 1.55: 1 generated, 0 cached, 1 skipped
//! 2 generated, 1 cached, 1 skipped across 2 language(s)
//! ```
//!
//! ## Render and sitemap
//!
//! ```text
//! Rendered 2 languages: 3 concept pages, 2 landing pages → docs
//!     No content yet: COBOL
//! Sitemap: 6 URLs → docs/sitemap.xml
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::catalog::Catalog;
use crate::orchestrator::{GenerateEvent, LanguagePlan, RunSummary};
use crate::render::RenderSummary;
use crate::sitemap::{MissingPage, SitemapEntry};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the loaded catalog: languages in order, then concepts by category.
pub fn format_catalog(catalog: &Catalog) -> Vec<String> {
    let mut lines = vec!["Languages".to_string()];
    for (i, language) in catalog.languages.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), language));
    }

    lines.push(String::new());
    lines.push("Concepts".to_string());
    for category in catalog.categories() {
        let concepts: Vec<_> = catalog
            .concepts
            .iter()
            .filter(|c| c.category == category)
            .collect();
        lines.push(format!("{} ({})", category, concepts.len()));
        for (i, concept) in concepts.iter().enumerate() {
            lines.push(format!("{}{} {}", indent(1), format_index(i + 1), concept.name));
        }
    }
    lines
}

/// Format pending work per language.
pub fn format_plan(plans: &[LanguagePlan]) -> Vec<String> {
    let mut lines = vec!["Pending".to_string()];
    for plan in plans {
        if let Some(err) = &plan.error {
            lines.push(format!("{}: unreadable content", plan.language));
            lines.push(format!("{}{}", indent(1), err));
            continue;
        }
        if plan.pending.is_empty() {
            lines.push(format!("{}: {} cached, up to date", plan.language, plan.cached));
            continue;
        }
        lines.push(format!(
            "{}: {} cached, {} pending",
            plan.language,
            plan.cached,
            plan.pending.len()
        ));
        for (key, reason) in &plan.pending {
            lines.push(format!("{}{} ({})", indent(1), key, reason));
        }
    }
    lines
}

/// Format content documents that no catalog language owns.
pub fn format_orphaned_documents(orphans: &[String]) -> Vec<String> {
    if orphans.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![format!("Orphaned documents ({})", orphans.len())];
    for name in orphans {
        lines.push(format!("{}{}.json", indent(1), name));
    }
    lines
}

pub fn print_check_output(catalog: &Catalog, plans: &[LanguagePlan], orphans: &[String]) {
    let mut lines = format_catalog(catalog);
    lines.push(String::new());
    lines.extend(format_plan(plans));
    let orphaned = format_orphaned_documents(orphans);
    if !orphaned.is_empty() {
        lines.push(String::new());
        lines.extend(orphaned);
    }
    print_lines(lines);
}

// ============================================================================
// Generate
// ============================================================================

/// Format a single generate progress event as display lines.
pub fn format_generate_event(event: &GenerateEvent) -> Vec<String> {
    match event {
        GenerateEvent::LanguageStarted {
            language,
            pending,
            cached,
        } => vec![format!("{} ({} pending, {} cached)", language, pending, cached)],
        GenerateEvent::ItemGenerated { key, .. } => {
            vec![format!("{}{}: generated", indent(1), key)]
        }
        GenerateEvent::ItemSkipped { key, reason, .. } => {
            vec![format!("{}{}: skipped ({})", indent(1), key, reason)]
        }
        GenerateEvent::LanguageFinished {
            language, error, ..
        } => match error {
            Some(err) => vec![format!("{}{} stopped: {}", indent(1), language, err)],
            None => Vec::new(),
        },
    }
}

/// Format the end-of-run summary: one line per language and a total.
pub fn format_run_summary(summary: &RunSummary) -> Vec<String> {
    let mut lines = Vec::new();
    for report in &summary.languages {
        let mut line = format!(
            "{}: {} generated, {} cached",
            report.language,
            report.generated.len(),
            report.cached
        );
        if !report.skipped.is_empty() {
            line.push_str(&format!(", {} skipped", report.skipped.len()));
        }
        lines.push(line);
        if let Some(err) = &report.persistence_error {
            lines.push(format!("{}persistence failed: {}", indent(1), err));
        }
    }
    lines.push(summary.to_string());
    lines
}

pub fn print_run_summary(summary: &RunSummary) {
    print_lines(format_run_summary(summary));
}

// ============================================================================
// Render and sitemap
// ============================================================================

pub fn format_render_summary(summary: &RenderSummary, output_dir: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "Rendered {} languages: {} concept pages, {} landing pages \u{2192} {}",
        summary.languages,
        summary.concept_pages,
        summary.landing_pages,
        output_dir.display()
    )];
    if !summary.skipped_languages.is_empty() {
        lines.push(format!(
            "{}No content yet: {}",
            indent(1),
            summary.skipped_languages.join(", ")
        ));
    }
    lines
}

pub fn print_render_summary(summary: &RenderSummary, output_dir: &Path) {
    print_lines(format_render_summary(summary, output_dir));
}

pub fn format_sitemap_output(entries: &[SitemapEntry], sitemap_path: &Path) -> Vec<String> {
    vec![format!(
        "Sitemap: {} URLs \u{2192} {}",
        entries.len(),
        sitemap_path.display()
    )]
}

pub fn print_sitemap_output(entries: &[SitemapEntry], sitemap_path: &Path) {
    print_lines(format_sitemap_output(entries, sitemap_path));
}

/// Format sitemap URLs that have no file behind them.
pub fn format_missing_pages(missing: &[MissingPage]) -> Vec<String> {
    if missing.is_empty() {
        return vec!["Sitemap: all URLs have pages".to_string()];
    }
    let mut lines = vec![format!("Sitemap: {} URLs without pages", missing.len())];
    for page in missing {
        lines.push(format!("{}{}", indent(1), page.url));
        lines.push(format!("{}Expected: {}", indent(2), page.expected.display()));
    }
    lines
}

pub fn print_missing_pages(missing: &[MissingPage]) {
    print_lines(format_missing_pages(missing));
}

// ============================================================================
// Tests
// ============================================================================
