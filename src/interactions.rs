//! Append-only log of question/response pairs, written by `POST /api/log`.

use anyhow::{ensure, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/log`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInteraction {
    pub user_id: String,
    pub question: String,
    pub response: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecord {
    pub id: i64,
    pub user_id: String,
    pub question: String,
    pub response: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
}

/// Append one record, stamped with the current time.
pub fn log_interaction(conn: &Connection, entry: &NewInteraction) -> Result<InteractionRecord> {
    ensure!(!entry.user_id.trim().is_empty(), "userId must not be empty");

    let timestamp = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO interactions (user_id, question, response, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![entry.user_id, entry.question, entry.response, timestamp],
    )?;

    Ok(InteractionRecord {
        id: conn.last_insert_rowid(),
        user_id: entry.user_id.clone(),
        question: entry.question.clone(),
        response: entry.response.clone(),
        timestamp,
    })
}

/// Most recent records for a user, newest first.
pub fn recent_interactions(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> Result<Vec<InteractionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, question, response, created_at FROM interactions \
         WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
    )?;
    let records = stmt
        .query_map(params![user_id, limit as i64], |row| {
            Ok(InteractionRecord {
                id: row.get(0)?,
                user_id: row.get(1)?,
                question: row.get(2)?,
                response: row.get(3)?,
                timestamp: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(user: &str, q: &str) -> NewInteraction {
        NewInteraction {
            user_id: user.into(),
            question: q.into(),
            response: format!("answer to {q}"),
        }
    }

    #[test]
    fn log_then_read_back_newest_first() {
        let tmp = TempDir::new().unwrap();
        let conn = crate::db::open_database(tmp.path().join("docs.db"), 4).unwrap();

        log_interaction(&conn, &entry("u-1", "first")).unwrap();
        log_interaction(&conn, &entry("u-2", "other user")).unwrap();
        let last = log_interaction(&conn, &entry("u-1", "second")).unwrap();

        let records = recent_interactions(&conn, "u-1", 10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, last.id);
        assert_eq!(records[0].question, "second");
        assert_eq!(records[1].response, "answer to first");
        assert!(chrono::DateTime::parse_from_rfc3339(&records[0].timestamp).is_ok());
    }

    #[test]
    fn limit_is_respected() {
        let tmp = TempDir::new().unwrap();
        let conn = crate::db::open_database(tmp.path().join("docs.db"), 4).unwrap();
        for i in 0..5 {
            log_interaction(&conn, &entry("u-1", &format!("q{i}"))).unwrap();
        }
        assert_eq!(recent_interactions(&conn, "u-1", 3).unwrap().len(), 3);
    }

    #[test]
    fn empty_user_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let conn = crate::db::open_database(tmp.path().join("docs.db"), 4).unwrap();
        assert!(log_interaction(&conn, &entry("  ", "q")).is_err());
    }

    #[test]
    fn body_uses_camel_case() {
        let e: NewInteraction =
            serde_json::from_str(r#"{"userId":"u","question":"q","response":"r"}"#).unwrap();
        assert_eq!(e.user_id, "u");
    }
}
