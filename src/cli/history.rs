use anyhow::Result;

use crate::config::DocentConfig;
use crate::interactions::recent_interactions;

/// Print a user's logged interactions, newest first.
pub fn history(config: &DocentConfig, user_id: &str, limit: usize) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = crate::db::open_database(&db_path, config.embedding.dimensions)?;

    let records = recent_interactions(&conn, user_id, limit)?;
    if records.is_empty() {
        println!("No interactions logged for {user_id}.");
        return Ok(());
    }

    for record in &records {
        println!("[{}] #{}", record.timestamp, record.id);
        println!("  Q: {}", super::preview(&record.question, 160));
        println!("  A: {}", super::preview(&record.response, 160));
        println!();
    }

    Ok(())
}
