//! HTML site rendering.
//!
//! The render stage reads the content documents written by the generate
//! stage and produces the static site. It never calls the generation
//! service and never touches the cache.
//!
//! ## Generated Pages
//!
//! - **Comparison index** (`/index.html`): per category, a table of concepts
//!   against languages linking to every page that exists
//! - **Language landing pages** (`/concepts/{lang}.html`): all concepts for
//!   one language, grouped by category
//! - **Concept pages** (`/concepts/{lang}/{concept}.html`): the generated
//!   explanation, with links to the same concept in other languages
//!
//! ## Output Structure
//!
//! ```text
//! docs/
//! ├── index.html
//! └── concepts/
//!     ├── go.html
//!     ├── go/
//!     │   ├── string-concatenation.html
//!     │   └── string-length.html
//!     ├── rust-155.html
//!     └── rust-155/
//!         └── ...
//! ```
//!
//! Links between pages are relative, so the site works from any base path.
//! The canonical URL on each page uses `site.base_url`.
//!
//! ## Slugs
//!
//! Language slugs come from [`slugify`] on the display name and concept
//! slugs from `"{category} {name}"`. Different names can share a slug
//! (`C`, `C++` and `C#` all become `c`); later ones, in catalog order, get a
//! numeric suffix (`c-2`, `c-3`).

use crate::catalog::Catalog;
use crate::config::SiteConfig;
use crate::content::{ContentError, ContentStore};
use crate::naming::slugify;
use crate::types::{ConceptKey, ContentEntry, LanguageContentDocument, LanguageSpec};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Options, Parser, html as md_html};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

const CSS: &str = include_str!("../static/style.css");

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Content(#[from] ContentError),
}

/// Counts of what one render wrote.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenderSummary {
    pub languages: usize,
    pub concept_pages: usize,
    pub landing_pages: usize,
    /// Languages in the catalog with no generated content yet.
    pub skipped_languages: Vec<String>,
}

/// One language with content, ready to render.
struct LanguagePages<'a> {
    language: &'a LanguageSpec,
    slug: String,
    document: LanguageContentDocument,
}

/// Everything the page templates need.
struct Site<'a> {
    config: &'a SiteConfig,
    catalog: &'a Catalog,
    languages: Vec<LanguagePages<'a>>,
    concept_slugs: BTreeMap<ConceptKey, String>,
}

impl Site<'_> {
    fn concept_slug(&self, key: &ConceptKey) -> &str {
        self.concept_slugs
            .get(key)
            .map(String::as_str)
            .unwrap_or_default()
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }
}

/// Render the whole site into `output_dir`.
pub fn render(
    catalog: &Catalog,
    content: &dyn ContentStore,
    config: &SiteConfig,
    output_dir: &Path,
) -> Result<RenderSummary, RenderError> {
    let mut summary = RenderSummary::default();

    // Slugs come from the whole catalog so a URL keeps its owner as content
    // appears for other languages.
    let language_slugs = assign_slugs(
        catalog
            .languages
            .iter()
            .map(|language| slugify(&language.display_name)),
    );
    let mut languages = Vec::new();
    for (language, slug) in catalog.languages.iter().zip(language_slugs) {
        let document = content.load(&language.display_name)?;
        if document.is_empty() {
            log::warn!("no content for {language}, skipping its pages");
            summary.skipped_languages.push(language.display_name.clone());
            continue;
        }
        languages.push(LanguagePages {
            language,
            slug,
            document,
        });
    }

    // Catalog concepts first, in catalog order, then keys only found in
    // documents (concepts since removed from the catalog).
    let mut keys: Vec<ConceptKey> = catalog.concepts.iter().map(|c| c.key()).collect();
    let mut extra: Vec<&ConceptKey> = languages
        .iter()
        .flat_map(|l| l.document.keys())
        .filter(|key| !keys.contains(*key))
        .collect();
    extra.sort();
    extra.dedup();
    keys.extend(extra.into_iter().cloned());
    let slugs = assign_slugs(keys.iter().map(|key| slugify(&concept_slug_source(key))));
    let concept_slugs: BTreeMap<ConceptKey, String> = keys.into_iter().zip(slugs).collect();

    let site = Site {
        config,
        catalog,
        languages,
        concept_slugs,
    };

    let concepts_dir = output_dir.join("concepts");
    for pages in &site.languages {
        let language_dir = concepts_dir.join(&pages.slug);
        fs::create_dir_all(&language_dir)?;

        for (key, entry) in &pages.document {
            let page = render_concept_page(&site, pages, key, entry);
            let path = language_dir.join(format!("{}.html", site.concept_slug(key)));
            fs::write(path, page.into_string())?;
            summary.concept_pages += 1;
        }

        let landing = render_landing_page(&site, pages);
        fs::write(
            concepts_dir.join(format!("{}.html", pages.slug)),
            landing.into_string(),
        )?;
        summary.landing_pages += 1;
        log::info!(
            "rendered {} concept pages for {}",
            pages.document.len(),
            pages.language
        );
    }
    summary.languages = site.languages.len();

    fs::create_dir_all(output_dir)?;
    fs::write(
        output_dir.join("index.html"),
        render_index(&site).into_string(),
    )?;

    Ok(summary)
}

/// Text a concept slug is derived from.
fn concept_slug_source(key: &ConceptKey) -> String {
    key.as_str().replacen('/', " ", 1)
}

/// Make slugs unique in input order by suffixing repeats with `-2`, `-3`, ...
/// An empty slug becomes `page`.
fn assign_slugs(slugs: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut taken = HashSet::new();
    slugs
        .into_iter()
        .map(|slug| {
            let base = if slug.is_empty() { "page".to_string() } else { slug };
            let mut candidate = base.clone();
            let mut n = 2;
            while !taken.insert(candidate.clone()) {
                candidate = format!("{base}-{n}");
                n += 1;
            }
            candidate
        })
        .collect()
}

fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut body = String::new();
    md_html::push_html(&mut body, parser);
    body
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(
    title: &str,
    description: &str,
    canonical: &str,
    head_extra: Markup,
    content: Markup,
) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                meta name="description" content=(description);
                link rel="canonical" href=(canonical);
                style { (PreEscaped(CSS)) }
                (head_extra)
            }
            body {
                div.container {
                    (content)
                    footer {
                        p { "Content generated using AI" }
                    }
                }
            }
        }
    }
}

fn breadcrumb(items: Markup) -> Markup {
    html! {
        nav.breadcrumb aria-label="Breadcrumb" {
            (items)
        }
    }
}

/// Schema.org metadata for a concept page. `</` is escaped so generated
/// text cannot close the script element.
fn structured_data(title: &str, description: &str, url: &str, publisher: &str) -> Markup {
    let data = serde_json::json!({
        "@context": "https://schema.org",
        "@type": "TechArticle",
        "headline": title,
        "description": description,
        "url": url,
        "publisher": { "@type": "Organization", "name": publisher },
    });
    let json = data.to_string().replace("</", "<\\/");
    html! {
        script type="application/ld+json" { (PreEscaped(json)) }
    }
}

// ============================================================================
// Page Renderers
// ============================================================================

fn render_concept_page(
    site: &Site,
    pages: &LanguagePages,
    key: &ConceptKey,
    entry: &ContentEntry,
) -> Markup {
    let language = &pages.language.display_name;
    let concept_slug = site.concept_slug(key);
    let title = format!("{} in {}", entry.name, language);
    let page_title = format!("{title} - {}", site.config.title);
    let description = format!(
        "Learn {} in {language}: {} with code examples and explanations.",
        entry.name.to_lowercase(),
        entry.category
    );
    let url = format!(
        "{}/concepts/{}/{}.html",
        site.base_url(),
        pages.slug,
        concept_slug
    );
    let others: Vec<&LanguagePages> = site
        .languages
        .iter()
        .filter(|other| other.slug != pages.slug && other.document.contains_key(key))
        .collect();

    let content = html! {
        (breadcrumb(html! {
            a href="../../index.html" { "Home" }
            span { "›" }
            a href={ "../" (pages.slug) ".html" } { (language) }
            span { "›" }
            span { (entry.name) }
        }))
        main {
            h1 { (title) }
            div.meta {
                strong { "Category:" } " " (entry.category)
                " | "
                strong { "Language:" } " " (language)
            }
            article.content {
                (PreEscaped(markdown_to_html(&entry.generated_text)))
            }
            @if !others.is_empty() {
                section.related-concepts {
                    h2 { "See this concept in other languages" }
                    div.related-grid {
                        @for other in &others {
                            a href={ "../" (other.slug) "/" (concept_slug) ".html" } {
                                (other.language.display_name)
                            }
                        }
                    }
                }
            }
            div.back-link {
                a href="../../index.html" { "← Back to Full Comparison Table" }
            }
        }
    };

    base_document(
        &page_title,
        &description,
        &url,
        structured_data(&title, &description, &url, &site.config.title),
        content,
    )
}

fn render_landing_page(site: &Site, pages: &LanguagePages) -> Markup {
    let language = &pages.language.display_name;
    let mut categories: BTreeMap<&str, Vec<(&ConceptKey, &ContentEntry)>> = BTreeMap::new();
    for (key, entry) in &pages.document {
        categories
            .entry(entry.category.as_str())
            .or_default()
            .push((key, entry));
    }
    for concepts in categories.values_mut() {
        concepts.sort_by(|a, b| a.1.name.cmp(&b.1.name));
    }

    let title = format!("{language} Programming Concepts");
    let description = format!(
        "{} programming concepts explained in {language} with code examples.",
        pages.document.len()
    );
    let url = format!("{}/concepts/{}.html", site.base_url(), pages.slug);

    let content = html! {
        (breadcrumb(html! {
            a href="../index.html" { "Home" }
            span { "›" }
            span { (language) }
        }))
        header {
            h1 { (title) }
            p.meta { (pages.document.len()) " concepts in " (categories.len()) " categories" }
        }
        main {
            @for (category, concepts) in &categories {
                section.category {
                    h2 { (category) }
                    div.concept-grid {
                        @for (key, entry) in concepts {
                            div.concept-card {
                                a href={ (pages.slug) "/" (site.concept_slug(key)) ".html" } {
                                    (entry.name)
                                }
                            }
                        }
                    }
                }
            }
            div.back-link {
                a href="../index.html" { "← Back to Language Comparison Table" }
            }
        }
    };

    base_document(
        &format!("{title} - {}", site.config.title),
        &description,
        &url,
        html! {},
        content,
    )
}

fn render_index(site: &Site) -> Markup {
    let description = format!(
        "Compare {} programming concepts across {} languages.",
        site.catalog.concepts.len(),
        site.languages.len()
    );
    let url = format!("{}/", site.base_url());

    let content = html! {
        header {
            h1 { (site.config.title) }
            p.meta { (description) }
        }
        nav.language-list {
            @for pages in &site.languages {
                a href={ "concepts/" (pages.slug) ".html" } { (pages.language.display_name) }
            }
        }
        main {
            @for category in site.catalog.categories() {
                section.category {
                    h2 { (category) }
                    div.table-scroll {
                        table.comparison {
                            thead {
                                tr {
                                    th { "Concept" }
                                    @for pages in &site.languages {
                                        th { (pages.language.display_name) }
                                    }
                                }
                            }
                            tbody {
                                @for concept in site.catalog.concepts.iter().filter(|c| c.category == category) {
                                    @let key = concept.key();
                                    tr {
                                        th scope="row" { (concept.name) }
                                        @for pages in &site.languages {
                                            td {
                                                @if pages.document.contains_key(&key) {
                                                    a href={ "concepts/" (pages.slug) "/" (site.concept_slug(&key)) ".html" } {
                                                        "View"
                                                    }
                                                } @else {
                                                    span.missing { "–" }
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    };

    base_document(&site.config.title, &description, &url, html! {}, content)
}

// ============================================================================
// Tests
// ============================================================================
