//! Startup ingestion: load → normalize → chunk, and the `index` command.

use std::sync::Arc;
use tracing::info;

use crate::chunk::TextSplitter;
use crate::config::Config;
use crate::error::StartupError;
use crate::index::build_retriever;
use crate::models::{Chunk, Document};
use crate::normalize::normalize_document;
use crate::session::Services;
use crate::sources::{load_sources, LoaderRegistry};

/// Documents and the chunks cut from them.
pub struct Prepared {
    pub documents: Vec<Document>,
    pub chunks: Vec<Chunk>,
}

/// Load every configured source, normalize it and split it into chunks.
pub async fn prepare(config: &Config, registry: &LoaderRegistry) -> Result<Prepared, StartupError> {
    let splitter =
        TextSplitter::from_config(&config.chunking).map_err(|e| StartupError::Config(e.into()))?;

    let mut documents = load_sources(&config.sources, registry).await?;
    for doc in &mut documents {
        normalize_document(doc);
    }
    let chunks = splitter.split_documents(&documents);
    info!(
        documents = documents.len(),
        chunks = chunks.len(),
        "Prepared chunks"
    );
    Ok(Prepared { documents, chunks })
}

/// Build (or, with `dry_run`, only count) the index and print a summary.
///
/// A dry run never embeds anything and needs no credential.
pub async fn run_index(config: &Config, dry_run: bool) -> Result<(), StartupError> {
    if dry_run {
        let prepared = prepare(config, &LoaderRegistry::default()).await?;
        println!("index (dry-run)");
        println!("  documents: {}", prepared.documents.len());
        println!("  chunks: {}", prepared.chunks.len());
        return Ok(());
    }

    let services = Services::from_config(config)?;
    let prepared = prepare(config, &LoaderRegistry::default()).await?;
    let documents = prepared.documents.len();
    let retriever = build_retriever(
        prepared.chunks,
        Arc::clone(&services.embedder),
        config.embedding.batch_size,
        config.retrieval.top_k,
    )
    .await?;

    println!("index");
    println!("  documents: {}", documents);
    println!("  chunks indexed: {}", retriever.len());
    println!("  top_k: {}", retriever.k());
    println!("ok");
    Ok(())
}
