use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::config::{DocentConfig, IngestConfig};
use crate::documents::chunk::{chunk_text, read_document};
use crate::documents::store::{replace_source, NewPassage};
use crate::embedding::EmbeddingProvider;

const EMBED_BATCH: usize = 32;

/// Ingest documentation files into the passage store.
///
/// Re-ingesting a file replaces the passages previously stored for it.
pub async fn ingest(config: &DocentConfig, files: &[PathBuf]) -> Result<()> {
    let db_path = config.resolved_db_path();
    let mut conn = crate::db::open_database(&db_path, config.embedding.dimensions)?;
    crate::db::check_embedding_meta(&conn, &config.embedding.model, config.embedding.dimensions)?;

    let provider = crate::embedding::create_provider(&config.embedding);

    let mut total = 0;
    for path in files {
        let stored = ingest_file(&mut conn, provider.as_ref(), path, &config.ingest)
            .await
            .with_context(|| format!("failed to ingest {}", path.display()))?;
        println!("  {}: {} passage(s)", path.display(), stored);
        total += stored;
    }

    println!("\nIngested {total} passage(s) from {} file(s).", files.len());
    Ok(())
}

async fn ingest_file(
    conn: &mut Connection,
    provider: &dyn EmbeddingProvider,
    path: &Path,
    config: &IngestConfig,
) -> Result<usize> {
    let text = read_document(path)?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    ingest_text(conn, provider, &source, &text, config).await
}

/// Chunk, embed, and store `text` under `source`. Returns the passage count.
pub async fn ingest_text(
    conn: &mut Connection,
    provider: &dyn EmbeddingProvider,
    source: &str,
    text: &str,
    config: &IngestConfig,
) -> Result<usize> {
    let chunks = chunk_text(text, config.chunk_size, config.chunk_overlap);
    if chunks.is_empty() {
        tracing::warn!(source, "no text to ingest");
        return Ok(0);
    }

    let mut embeddings = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(EMBED_BATCH) {
        embeddings.extend(provider.embed_batch(batch).await?);
    }

    let passages: Vec<NewPassage<'_>> = chunks
        .iter()
        .zip(&embeddings)
        .map(|(content, embedding)| NewPassage {
            content,
            source: Some(source),
            embedding,
        })
        .collect();

    let (replaced, result) = replace_source(conn, source, &passages)?;
    if replaced > 0 {
        tracing::info!(source, replaced, "replaced previously ingested passages");
    }
    Ok(result.ids.len())
}
