//! Terminal subcommands. Each opens the database directly rather than
//! going through the server's pool.

pub mod history;
pub mod ingest;
pub mod search;
pub mod stats;

/// First `max` characters of `text`, with `...` when cut.
pub(crate) fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    match flat.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}
