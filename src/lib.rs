//! # PLC Builder
//!
//! Builds a static site that compares programming languages concept by
//! concept. Every page body is markdown written by a text-generation service
//! from a prompt template; the builder's job is to ask for each piece exactly
//! once, remember what it asked, and turn the answers into HTML.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! ```text
//! 1. Generate  catalog + cache  →  content-autogen/<model>/<lang>.json
//! 2. Render    content documents →  docs/concepts/**.html, docs/index.html
//! 3. Sitemap   docs/             →  docs/sitemap.xml
//! ```
//!
//! Each stage reads only what the previous stage wrote to disk, so any stage
//! can be re-run on its own. Generate is the expensive one: it costs money
//! and time per call, which is why it is built around the cache.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`catalog`] | Loads the language list and the concept prompt templates |
//! | [`cache`] | Per-language record of what was generated and from which prompt |
//! | [`content`] | Per-language document of generated markdown, keyed by concept |
//! | [`client`] | `TextGenerator` trait and the OpenAI-compatible HTTP client |
//! | [`retry`] | Exponential backoff around transient generation failures |
//! | [`orchestrator`] | Stage 1: decides what to generate and runs it on a worker pool |
//! | [`render`] | Stage 2: markdown to HTML pages with Maud |
//! | [`sitemap`] | Stage 3: `sitemap.xml` from the rendered files, plus verification |
//! | [`config`] | `plc.toml` loading, validation and merging over stock defaults |
//! | [`types`] | Shared domain types (`LanguageSpec`, `ConceptSpec`, `ConceptKey`) |
//! | [`naming`] | Filesystem-safe names and URL slugs |
//! | [`output`] | CLI output formatting for every command |
//!
//! # Design Decisions
//!
//! ## Cache Before Content, Never the Reverse
//!
//! A concept counts as done only when its cache entry exists *and* its text
//! is in the content document. The orchestrator always saves the content
//! document first and updates the cache second, under one lock per language.
//! A crash between the two leaves text with no cache entry, which the next
//! run regenerates; it can never leave a cache entry pointing at nothing.
//!
//! ## Prompt Hashes Instead of Timestamps
//!
//! Each cache entry stores a SHA-256 of the prompt template it was generated
//! from. Editing a template makes exactly that concept stale for every
//! language. Nothing else is regenerated.
//!
//! ## Blocking I/O on Rayon
//!
//! Generation calls are slow and few (hundreds, not millions). A bounded
//! rayon pool of blocking reqwest calls keeps concurrency explicit and the
//! code synchronous. Retries sleep on the worker thread.
//!
//! ## Maud Over Template Engines
//!
//! HTML is produced with [Maud](https://maud.lambda.xyz/): templates are
//! checked at compile time and all interpolation is escaped. Generated
//! markdown is converted with pulldown-cmark and inserted with
//! `PreEscaped`, since it is HTML by construction at that point.

pub mod cache;
pub mod catalog;
pub mod client;
pub mod config;
pub mod content;
pub mod naming;
pub mod orchestrator;
pub mod output;
pub mod render;
pub mod retry;
pub mod sitemap;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
