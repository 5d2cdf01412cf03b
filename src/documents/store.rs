//! Write path for passages: row in `documents`, vector in `documents_vec`.

use anyhow::{ensure, Result};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::embedding::embedding_to_bytes;

/// A passage ready to be written, with its embedding.
pub struct NewPassage<'a> {
    pub content: &'a str,
    pub source: Option<&'a str>,
    pub embedding: &'a [f32],
}

#[derive(Debug, Serialize)]
pub struct IngestResult {
    pub ids: Vec<String>,
}

/// Insert passages and their vectors in one transaction.
pub fn insert_passages(conn: &mut Connection, passages: &[NewPassage<'_>]) -> Result<IngestResult> {
    let tx = conn.transaction()?;
    let ids = insert_rows(&tx, passages)?;
    tx.commit()?;
    Ok(IngestResult { ids })
}

/// Remove every passage previously ingested from `source`. Returns the number removed.
pub fn delete_source(conn: &mut Connection, source: &str) -> Result<usize> {
    let tx = conn.transaction()?;
    let removed = delete_rows(&tx, source)?;
    tx.commit()?;
    Ok(removed)
}

/// Swap the passages stored for `source` for `passages` atomically. If any
/// insert fails the previous passages are kept. Returns the number replaced
/// alongside the new ids.
pub fn replace_source(
    conn: &mut Connection,
    source: &str,
    passages: &[NewPassage<'_>],
) -> Result<(usize, IngestResult)> {
    let tx = conn.transaction()?;
    let replaced = delete_rows(&tx, source)?;
    let ids = insert_rows(&tx, passages)?;
    tx.commit()?;
    Ok((replaced, IngestResult { ids }))
}

fn insert_rows(conn: &Connection, passages: &[NewPassage<'_>]) -> Result<Vec<String>> {
    let now = chrono::Utc::now().to_rfc3339();
    let mut ids = Vec::with_capacity(passages.len());

    for passage in passages {
        ensure!(!passage.content.trim().is_empty(), "passage content must not be empty");

        let id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO documents (id, content, source, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, passage.content, passage.source, now],
        )?;
        conn.execute(
            "INSERT INTO documents_vec (id, embedding) VALUES (?1, ?2)",
            params![id, embedding_to_bytes(passage.embedding)],
        )?;
        ids.push(id);
    }

    Ok(ids)
}

fn delete_rows(conn: &Connection, source: &str) -> Result<usize> {
    let ids: Vec<String> = conn
        .prepare("SELECT id FROM documents WHERE source = ?1")?
        .query_map(params![source], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    for id in &ids {
        conn.execute("DELETE FROM documents_vec WHERE id = ?1", params![id])?;
    }
    Ok(conn.execute("DELETE FROM documents WHERE source = ?1", params![source])?)
}
