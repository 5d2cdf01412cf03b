use anyhow::Result;

use crate::config::DocentConfig;

/// Display document store statistics in the terminal.
pub fn stats(config: &DocentConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = crate::db::open_database(&db_path, config.embedding.dimensions)?;

    let stats = crate::db::store_stats(&conn)?;
    let model = crate::db::migrations::get_embedding_model(&conn)?;
    let db_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    println!("Docent Statistics");
    println!("{}", "=".repeat(40));
    println!("  Passages:            {}", stats.document_count);
    println!("  Vectors:             {}", stats.vector_count);
    println!("  Interactions:        {}", stats.interaction_count);
    println!();
    println!("Schema version:        {}", stats.schema_version);
    println!("sqlite-vec:            {}", stats.sqlite_vec_version);
    println!(
        "Embedding model:       {}",
        model.as_deref().unwrap_or("(not set)")
    );
    println!("Database:              {}", db_path.display());
    println!("Database size:         {db_size} bytes");

    if stats.document_count != stats.vector_count {
        println!();
        println!(
            "warning: {} passage(s) without a vector; re-ingest the affected files",
            stats.document_count - stats.vector_count
        );
    }

    Ok(())
}
