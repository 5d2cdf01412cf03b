//! Splitting documentation files into passages for embedding.

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Read a `.txt` or `.md` file as plain text.
pub fn read_document(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "txt" | "md" | "markdown" => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        other => bail!("unsupported file type: .{other} (expected .txt or .md)"),
    }
}

/// Split text into passages of at most `chunk_size` characters.
///
/// Paragraphs (blank-line separated) are packed together until the next one
/// would overflow. A paragraph longer than `chunk_size` is cut into windows
/// that overlap by `overlap` characters.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size - 1);

    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let para_len = para.chars().count();

        if para_len > chunk_size {
            flush(&mut current, &mut chunks);
            chunks.extend(windows(para, chunk_size, overlap));
            continue;
        }

        let joined_len = if current.is_empty() {
            para_len
        } else {
            current.chars().count() + 2 + para_len
        };
        if joined_len > chunk_size {
            flush(&mut current, &mut chunks);
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(para);
    }

    flush(&mut current, &mut chunks);
    chunks
}

fn flush(current: &mut String, chunks: &mut Vec<String>) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}

fn windows(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = size - overlap;
    let mut out = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + size).min(chars.len());
        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }

    out
}
