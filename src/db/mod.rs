pub mod migrations;
pub mod pool;
pub mod schema;

pub use pool::DbPool;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the document store at the given path, with sqlite-vec
/// loaded, schema initialized and migrations applied.
pub fn open_database(path: impl AsRef<Path>, dimensions: usize) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    load_sqlite_vec();

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_millis(5000))?;

    schema::init_schema(&conn, dimensions).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;

    tracing::debug!(path = %path.display(), "database connection opened");
    Ok(conn)
}

/// Compare the configured embedding model against what the store was built with.
///
/// A different model name only warns (vectors still have the right shape); a
/// different dimension is an error because `documents_vec` cannot hold it.
pub fn check_embedding_meta(conn: &Connection, model: &str, dimensions: usize) -> Result<()> {
    if let Some(stored) = migrations::get_embedding_dims(conn)? {
        anyhow::ensure!(
            stored == dimensions,
            "document store was created with {stored}-dimension embeddings but the \
             configured model produces {dimensions}; re-create the database or fix the config"
        );
    }

    match migrations::get_embedding_model(conn)? {
        Some(stored) if stored != model => {
            tracing::warn!(
                stored = %stored,
                configured = %model,
                "embedding model changed; re-ingest documents for consistent retrieval"
            );
        }
        Some(_) => {}
        None => migrations::set_embedding_model(conn, model)?,
    }

    Ok(())
}

/// Row counts and version info for `docent stats` and the health check.
#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub schema_version: u32,
    pub sqlite_vec_version: String,
    pub document_count: i64,
    pub vector_count: i64,
    pub interaction_count: i64,
}

pub fn store_stats(conn: &Connection) -> Result<StoreStats> {
    let count = |table: &str| -> rusqlite::Result<i64> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
    };

    Ok(StoreStats {
        schema_version: migrations::get_schema_version(conn)?,
        sqlite_vec_version: conn.query_row("SELECT vec_version()", [], |r| r.get(0))?,
        document_count: count("documents")?,
        vector_count: count("documents_vec")?,
        interaction_count: count("interactions")?,
    })
}
