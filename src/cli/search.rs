use anyhow::Result;

use crate::config::DocentConfig;
use crate::documents::similar_passages;

/// Show which passages a chat query would retrieve.
pub async fn search(config: &DocentConfig, query: &str) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = crate::db::open_database(&db_path, config.embedding.dimensions)?;

    let provider = crate::embedding::create_provider(&config.embedding);
    let query_embedding = provider.embed(query).await?;

    let passages = similar_passages(
        &conn,
        &query_embedding,
        config.retrieval.top_k,
        config.retrieval.similarity_threshold,
    )?;

    if passages.is_empty() {
        println!(
            "No passages above similarity {:.2}.",
            config.retrieval.similarity_threshold
        );
        return Ok(());
    }

    println!("Found {} passage(s)\n", passages.len());
    for (i, passage) in passages.iter().enumerate() {
        println!(
            "  {}. {} [{}] (similarity: {:.4})",
            i + 1,
            passage.id,
            passage.source.as_deref().unwrap_or("-"),
            passage.similarity,
        );
        println!("     {}", super::preview(&passage.content, 120));
        println!();
    }

    Ok(())
}
