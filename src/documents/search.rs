//! Nearest-neighbour passage lookup over `documents_vec`.

use anyhow::Result;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::embedding::embedding_to_bytes;

/// A retrieved passage and its cosine similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct Passage {
    pub id: String,
    pub content: String,
    pub source: Option<String>,
    pub similarity: f64,
}

/// Top `limit` passages whose similarity (`1 - cosine distance`) is strictly
/// above `threshold`, best first. Equal distances keep insertion order.
pub fn similar_passages(
    conn: &Connection,
    query_embedding: &[f32],
    limit: usize,
    threshold: f64,
) -> Result<Vec<Passage>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "WITH knn AS ( \
             SELECT id, distance FROM documents_vec \
             WHERE embedding MATCH ?1 AND k = ?2 \
         ) \
         SELECT d.id, d.content, d.source, 1.0 - knn.distance AS similarity \
         FROM knn JOIN documents d ON d.id = knn.id \
         WHERE 1.0 - knn.distance > ?3 \
         ORDER BY knn.distance ASC, d.rowid ASC",
    )?;

    let passages = stmt
        .query_map(
            params![embedding_to_bytes(query_embedding), limit as i64, threshold],
            |row| {
                Ok(Passage {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    source: row.get(2)?,
                    similarity: row.get(3)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(passages)
}

/// Join passage texts into one context block, one passage per line.
pub fn join_passages(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
