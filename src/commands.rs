//! One-shot CLI commands: `docchat chunk`, `docchat search`, `docchat ask`.
//!
//! Each command builds a fresh in-memory store, ingests the files named on
//! the command line, and prints results to stdout.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::extract::mime_from_path;
use crate::generation::{create_generator, DisabledGenerator, TextGenerator};
use crate::ingest::DocumentProcessor;
use crate::models::Document;
use crate::rag::{RagVariant, Retriever};
use crate::store::{InMemoryStore, Store};

/// Generator for commands that only need it for image captioning.
fn optional_generator(config: &Config) -> Arc<dyn TextGenerator> {
    match create_generator(&config.generation) {
        Ok(g) => Arc::from(g),
        Err(e) => {
            tracing::warn!(error = %e, "generation unavailable, images will not be captioned");
            Arc::new(DisabledGenerator)
        }
    }
}

async fn ingest_file(
    processor: &DocumentProcessor,
    store: &dyn Store,
    path: &Path,
) -> Result<Document> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let content_type = mime_from_path(&filename);
    processor
        .ingest(store, &bytes, &filename, content_type)
        .await
}

async fn ingest_all(
    config: &Config,
    generator: Arc<dyn TextGenerator>,
    store: &dyn Store,
    files: &[PathBuf],
) -> Result<Vec<String>> {
    let processor = DocumentProcessor::new(config.chunking.clone(), generator);
    let mut ids = Vec::with_capacity(files.len());
    for path in files {
        let doc = ingest_file(&processor, store, path).await?;
        ids.push(doc.id);
    }
    Ok(ids)
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() > max_chars {
        let head: String = flat.chars().take(max_chars).collect();
        format!("{}…", head)
    } else {
        flat.to_string()
    }
}

pub async fn run_chunk(config: &Config, file: &Path) -> Result<()> {
    let processor = DocumentProcessor::new(config.chunking.clone(), optional_generator(config));
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file.display().to_string();
    let document_id = uuid::Uuid::new_v4().to_string();

    let processed = processor
        .process(&document_id, &bytes, &filename, mime_from_path(&filename))
        .await?;

    println!(
        "{} ({}): {} chunks",
        processed.name,
        processed.kind.as_str(),
        processed.chunks.len()
    );
    for chunk in &processed.chunks {
        let span = match (chunk.metadata.start_char, chunk.metadata.end_char) {
            (Some(start), Some(end)) => format!("{}..{}", start, end),
            _ => "-".to_string(),
        };
        println!(
            "  #{} [{}] {} chars{}",
            chunk.metadata.index,
            span,
            chunk.metadata.length,
            if chunk.metadata.error { " (error)" } else { "" }
        );
        println!("    \"{}\"", excerpt(&chunk.text, 80));
    }
    Ok(())
}

pub async fn run_search(
    config: &Config,
    query: &str,
    files: &[PathBuf],
    top_k: Option<usize>,
) -> Result<()> {
    let store = InMemoryStore::new();
    let ids = ingest_all(config, optional_generator(config), &store, files).await?;

    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let hits = store.search(query, &ids, top_k).await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} / chunk {}",
            i + 1,
            hit.score,
            hit.document_name,
            hit.chunk.metadata.index
        );
        println!("    excerpt: \"{}\"", excerpt(&hit.chunk.text, 160));
        println!("    id: {}", hit.chunk.id);
        println!();
    }
    Ok(())
}

pub async fn run_ask(
    config: &Config,
    query: &str,
    files: &[PathBuf],
    variant: RagVariant,
) -> Result<()> {
    let generator: Arc<dyn TextGenerator> = Arc::from(create_generator(&config.generation)?);
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let ids = ingest_all(config, generator.clone(), store.as_ref(), files).await?;

    let retriever = Retriever::new(store, generator, config.retrieval.clone());
    let answer = retriever
        .process_query(variant, query, &ids, &[], None)
        .await?;

    println!("{}", answer.response);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources ({}):", answer.variant.as_str());
        for source in &answer.sources {
            println!("  - {}", source);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("  one\ntwo  ", 80), "one two");
        assert_eq!(excerpt("abcdef", 3), "abc…");
    }
}
