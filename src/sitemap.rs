//! `sitemap.xml` for the rendered site.
//!
//! The sitemap is built from the files actually on disk, not from the
//! catalog, so it always matches what the render stage wrote:
//!
//! | Page | changefreq | priority |
//! |------|------------|----------|
//! | `index.html` (as `<base>/`) | weekly | 1.0 |
//! | `concepts/<lang>.html` | weekly | 0.9 |
//! | `concepts/<lang>/<concept>.html` | monthly | 0.8 |
//!
//! `lastmod` is the file's modification date.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub const SITEMAP_FILENAME: &str = "sitemap.xml";
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

#[derive(Error, Debug)]
pub enum SitemapError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot walk site directory: {0}")]
    Walk(#[from] walkdir::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFreq {
    Weekly,
    Monthly,
}

impl fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: NaiveDate,
    pub changefreq: ChangeFreq,
    pub priority: f32,
}

fn io_error(path: &Path, source: std::io::Error) -> SitemapError {
    SitemapError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn modified_date(path: &Path) -> Result<NaiveDate, SitemapError> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| io_error(path, e))?;
    Ok(DateTime::<Utc>::from(modified).date_naive())
}

/// Collect entries for every rendered page under `site_dir`, sorted by URL.
pub fn collect(site_dir: &Path, base_url: &str) -> Result<Vec<SitemapEntry>, SitemapError> {
    let base = base_url.trim_end_matches('/');
    let mut entries = Vec::new();

    let index = site_dir.join("index.html");
    if index.is_file() {
        entries.push(SitemapEntry {
            loc: format!("{base}/"),
            lastmod: modified_date(&index)?,
            changefreq: ChangeFreq::Weekly,
            priority: 1.0,
        });
    } else {
        log::warn!("{} not found, sitemap has no home page", index.display());
    }

    let concepts = site_dir.join("concepts");
    if concepts.is_dir() {
        for entry in WalkDir::new(&concepts) {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|e| e != "html") {
                continue;
            }
            let Ok(relative) = path.strip_prefix(site_dir) else {
                continue;
            };
            let url_path: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let landing = url_path.len() == 2;
            entries.push(SitemapEntry {
                loc: format!("{base}/{}", url_path.join("/")),
                lastmod: modified_date(path)?,
                changefreq: if landing {
                    ChangeFreq::Weekly
                } else {
                    ChangeFreq::Monthly
                },
                priority: if landing { 0.9 } else { 0.8 },
            });
        }
    }

    entries.sort_by(|a, b| a.loc.cmp(&b.loc));
    Ok(entries)
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Serialize entries as a sitemap document.
pub fn to_xml(entries: &[SitemapEntry]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str(&format!("<urlset xmlns=\"{SITEMAP_NS}\">\n"));
    for entry in entries {
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", escape_xml(&entry.loc)));
        xml.push_str(&format!(
            "    <lastmod>{}</lastmod>\n",
            entry.lastmod.format("%Y-%m-%d")
        ));
        xml.push_str(&format!(
            "    <changefreq>{}</changefreq>\n",
            entry.changefreq
        ));
        xml.push_str(&format!("    <priority>{:.1}</priority>\n", entry.priority));
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

/// Collect the entries and write `<site_dir>/sitemap.xml`.
pub fn write(site_dir: &Path, base_url: &str) -> Result<Vec<SitemapEntry>, SitemapError> {
    let entries = collect(site_dir, base_url)?;
    let path = site_dir.join(SITEMAP_FILENAME);
    fs::write(&path, to_xml(&entries)).map_err(|e| io_error(&path, e))?;
    Ok(entries)
}

/// A sitemap URL with no file behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPage {
    pub url: String,
    pub expected: PathBuf,
}

/// Check that every `<loc>` in the written sitemap maps to a file.
///
/// URLs outside `base_url` are reported as missing. A site without a
/// sitemap has nothing to check.
pub fn verify(site_dir: &Path, base_url: &str) -> Result<Vec<MissingPage>, SitemapError> {
    let path = site_dir.join(SITEMAP_FILENAME);
    let xml = match fs::read_to_string(&path) {
        Ok(xml) => xml,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(SitemapError::Io { path, source }),
    };
    let base = base_url.trim_end_matches('/');

    let mut missing = Vec::new();
    for url in locations(&xml) {
        let expected = match url.strip_prefix(base) {
            Some("" | "/") => site_dir.join("index.html"),
            Some(rest) if rest.ends_with('/') => {
                site_dir.join(rest.trim_start_matches('/')).join("index.html")
            }
            Some(rest) => site_dir.join(rest.trim_start_matches('/')),
            None => PathBuf::new(),
        };
        if !expected.is_file() {
            missing.push(MissingPage { url, expected });
        }
    }
    Ok(missing)
}

/// The text of every `<loc>` element.
fn locations(xml: &str) -> Vec<String> {
    xml.split("<loc>")
        .skip(1)
        .filter_map(|chunk| chunk.split_once("</loc>"))
        .map(|(loc, _)| unescape_xml(loc.trim()))
        .collect()
}
