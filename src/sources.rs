//! Source loading: the document tree and configured web pages.
//!
//! Files are discovered with `walkdir` (sorted by file name so the order is
//! the same on every platform), filtered by exclude globs, and dispatched
//! to a [`DocumentLoader`] chosen by lower-cased extension. Unknown
//! extensions are skipped silently; a file whose loader fails is logged
//! and skipped. Only an unreadable root aborts loading.
//!
//! | Extension | Loader | Documents |
//! |-----------|--------|-----------|
//! | `.pdf` | [`PdfLoader`] | one per page, `page` (0-based) and `total_pages` |
//! | `.docx` `.pptx` `.xlsx` | [`OoxmlLoader`] | one |
//! | `.txt` `.md` | [`TextLoader`] | one |

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::SourcesConfig;
use crate::error::StartupError;
use crate::extract::{self, PdfText};
use crate::models::{Document, Metadata};
use crate::web::WebLoader;

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// Turns one file into zero or more documents.
///
/// Implementations fill in format-specific metadata only; `source`,
/// `file_name` and `modified` are added by the directory walk.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Vec<Document>>;
}

pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let bytes = std::fs::read(path)?;
        match extract::extract_pdf(&bytes)? {
            PdfText::Pages(pages) => {
                let total = pages.len();
                Ok(pages
                    .iter()
                    .enumerate()
                    .map(|(i, text)| page_document(text, i, total))
                    .collect())
            }
            PdfText::Whole(text) => Ok(vec![Document::new(text, Metadata::new())]),
        }
    }
}

fn page_document(text: &str, index: usize, total: usize) -> Document {
    let mut metadata = Metadata::new();
    metadata.insert("page".into(), json!(index));
    metadata.insert("total_pages".into(), json!(total));
    Document::new(text, metadata)
}

#[derive(Debug, Clone, Copy)]
pub enum OoxmlKind {
    Docx,
    Pptx,
    Xlsx,
}

pub struct OoxmlLoader(pub OoxmlKind);

impl DocumentLoader for OoxmlLoader {
    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let bytes = std::fs::read(path)?;
        let text = match self.0 {
            OoxmlKind::Docx => extract::extract_docx(&bytes)?,
            OoxmlKind::Pptx => extract::extract_pptx(&bytes)?,
            OoxmlKind::Xlsx => extract::extract_xlsx(&bytes)?,
        };
        Ok(vec![Document::new(text, Metadata::new())])
    }
}

pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(vec![Document::new(text, Metadata::new())])
    }
}

/// Loaders keyed by lower-cased extension (without the dot).
#[derive(Clone)]
pub struct LoaderRegistry {
    by_extension: HashMap<String, Arc<dyn DocumentLoader>>,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("pdf", Arc::new(PdfLoader));
        registry.register("docx", Arc::new(OoxmlLoader(OoxmlKind::Docx)));
        registry.register("pptx", Arc::new(OoxmlLoader(OoxmlKind::Pptx)));
        registry.register("xlsx", Arc::new(OoxmlLoader(OoxmlKind::Xlsx)));
        registry.register("txt", Arc::new(TextLoader));
        registry.register("md", Arc::new(TextLoader));
        registry
    }
}

impl LoaderRegistry {
    pub fn empty() -> Self {
        Self {
            by_extension: HashMap::new(),
        }
    }

    pub fn register(&mut self, extension: &str, loader: Arc<dyn DocumentLoader>) {
        self.by_extension
            .insert(extension.trim_start_matches('.').to_lowercase(), loader);
    }

    pub fn for_path(&self, path: &Path) -> Option<&Arc<dyn DocumentLoader>> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        self.by_extension.get(&ext)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in DEFAULT_EXCLUDES.iter().copied().chain(patterns.iter().map(String::as_str)) {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob '{}'", pattern))?);
    }
    Ok(builder.build()?)
}

/// Prunes excluded directories before descending and drops excluded files.
/// Directory patterns are written as `dir/**`, so a directory is tested by
/// the path of a hypothetical child.
fn is_excluded(excludes: &GlobSet, root: &Path, entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let path = entry.path();
    let relative = path.strip_prefix(root).unwrap_or(path);
    excludes.is_match(relative)
        || (entry.file_type().is_dir() && excludes.is_match(relative.join("_")))
}

fn source_tree_error(path: &Path, source: anyhow::Error) -> StartupError {
    StartupError::SourceTree {
        path: path.to_path_buf(),
        source,
    }
}

/// Walk the source tree and load every supported file.
pub fn load_directory(
    config: &SourcesConfig,
    registry: &LoaderRegistry,
) -> Result<Vec<Document>, StartupError> {
    let root = &config.root;
    std::fs::read_dir(root)
        .with_context(|| format!("cannot read directory {}", root.display()))
        .map_err(|e| source_tree_error(root, e))?;

    let excludes = build_globset(&config.exclude_globs).map_err(StartupError::Config)?;

    let mut docs = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded(&excludes, root, e));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(loader) = registry.for_path(path) else {
            debug!(path = %path.display(), "No loader for extension");
            continue;
        };

        match loader.load(path) {
            Ok(loaded) => {
                let common = file_metadata(path);
                docs.extend(loaded.into_iter().map(|mut doc| {
                    for (key, value) in &common {
                        doc.metadata.insert(key.clone(), value.clone());
                    }
                    doc
                }));
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping file that failed to load"),
        }
    }
    Ok(docs)
}

fn file_metadata(path: &Path) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("source".into(), json!(path.to_string_lossy()));
    if let Some(name) = path.file_name() {
        metadata.insert("file_name".into(), json!(name.to_string_lossy()));
    }
    if let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) {
        let modified: DateTime<Utc> = modified.into();
        metadata.insert("modified".into(), json!(modified.to_rfc3339()));
    }
    metadata
}

/// Load files first, then web pages, in configuration order.
pub async fn load_sources(
    config: &SourcesConfig,
    registry: &LoaderRegistry,
) -> Result<Vec<Document>, StartupError> {
    let mut docs = load_directory(config, registry)?;
    let file_docs = docs.len();

    if !config.urls.is_empty() {
        let web = WebLoader::new(config).map_err(StartupError::Config)?;
        docs.extend(web.load_all(&config.urls).await);
    }

    info!(
        files = file_docs,
        pages = docs.len() - file_docs,
        "Loaded source documents"
    );
    Ok(docs)
}

/// One row of the `sources` health table.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStatus {
    pub kind: &'static str,
    pub location: String,
    pub status: String,
    pub healthy: bool,
}

/// Report the configured root and URLs without loading anything.
pub fn source_statuses(config: &SourcesConfig, registry: &LoaderRegistry) -> Vec<SourceStatus> {
    let root = &config.root;
    let (status, healthy) = if !root.exists() {
        ("MISSING".to_string(), false)
    } else if std::fs::read_dir(root).is_err() {
        ("UNREADABLE".to_string(), false)
    } else {
        match build_globset(&config.exclude_globs) {
            Ok(excludes) => {
                let supported = WalkDir::new(root)
                    .follow_links(config.follow_symlinks)
                    .into_iter()
                    .filter_entry(|e| !is_excluded(&excludes, root, e))
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file() && registry.for_path(e.path()).is_some())
                    .count();
                (format!("OK ({} files)", supported), true)
            }
            Err(e) => (format!("BAD EXCLUDES ({})", e), false),
        }
    };

    let mut rows = vec![SourceStatus {
        kind: "directory",
        location: root.display().to_string(),
        status,
        healthy,
    }];
    rows.extend(config.urls.iter().map(|url| SourceStatus {
        kind: "url",
        location: url.clone(),
        status: "CONFIGURED".to_string(),
        healthy: true,
    }));
    rows
}

pub fn list_sources(config: &SourcesConfig) {
    let rows = source_statuses(config, &LoaderRegistry::default());
    println!("{:<10} {:<16} {:<8} LOCATION", "KIND", "STATUS", "HEALTHY");
    for row in rows {
        println!(
            "{:<10} {:<16} {:<8} {}",
            row.kind, row.status, row.healthy, row.location
        );
    }
}
