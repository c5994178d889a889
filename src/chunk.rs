//! Sentence-aware sliding-window text chunker.
//!
//! Splits extracted document text into overlapping [`Chunk`]s of at most
//! `max_chars` characters. When a window would end mid-text, the cut is
//! pulled back to just after the nearest sentence terminator (`.`, `!`,
//! `?`, or newline) found within the last `boundary_window` characters of
//! the window.
//!
//! # Algorithm
//!
//! 1. If the text fits in one window, return it as a single chunk.
//! 2. Otherwise take the window `[start, start + max_chars)`.
//! 3. If the window ends before the text does, scan backward for a
//!    sentence terminator and cut right after it.
//! 4. Emit the chunk, then advance to `max(start + 1, end - overlap)`.
//! 5. Repeat until a chunk reaches the end of the text.
//!
//! All offsets and lengths are measured in characters, so multi-byte
//! UTF-8 text is never split inside a code point.
//!
//! Empty or whitespace-only text yields **no** chunks. Callers that must
//! register something (see [`crate::ingest`]) substitute an explanatory
//! chunk themselves.
//!
//! # Example
//!
//! ```rust
//! use docchat::chunk::chunk_text;
//! use docchat::config::ChunkingConfig;
//!
//! let chunks = chunk_text("doc-1", "Hello world.", &ChunkingConfig::default()).unwrap();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].id, "doc-1_chunk_0");
//! ```

use crate::config::ChunkingConfig;
use crate::models::{Chunk, ChunkMetadata};

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("invalid chunking config: {0}")]
    InvalidConfig(String),
}

fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '\n')
}

/// Split `text` into overlapping chunks owned by `document_id`.
///
/// # Guarantees
///
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
/// - Every chunk is at most `max_chars` characters long.
/// - Every character of the input is covered by at least one chunk.
/// - Consecutive chunks overlap by at most `overlap` characters.
pub fn chunk_text(
    document_id: &str,
    text: &str,
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>, ChunkError> {
    let max_chars = config.max_chars;
    let overlap = config.overlap;

    if max_chars == 0 {
        return Err(ChunkError::InvalidConfig("max_chars must be > 0".into()));
    }
    if overlap >= max_chars {
        return Err(ChunkError::InvalidConfig(format!(
            "overlap ({}) must be smaller than max_chars ({})",
            overlap, max_chars
        )));
    }

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let len = chars.len();
    let byte_at = |i: usize| if i >= len { text.len() } else { chars[i].0 };

    if len <= max_chars {
        return Ok(vec![make_chunk(document_id, 0, text, 0, len)]);
    }

    let window = config.boundary_window.min(max_chars);
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let mut end = (start + max_chars).min(len);

        if end < len {
            let floor = end - window;
            if let Some(p) = (floor..end).rev().find(|&p| is_sentence_end(chars[p].1)) {
                end = p + 1;
            }
        }

        let piece = &text[byte_at(start)..byte_at(end)];
        chunks.push(make_chunk(document_id, chunks.len(), piece, start, end));

        // The tail is covered; stepping back by `overlap` again would only
        // emit chunks nested inside this one.
        if end == len {
            break;
        }
        start = (start + 1).max(end.saturating_sub(overlap));
    }

    Ok(chunks)
}

fn make_chunk(document_id: &str, index: usize, text: &str, start: usize, end: usize) -> Chunk {
    Chunk {
        id: Chunk::key(document_id, index),
        document_id: document_id.to_string(),
        text: text.to_string(),
        metadata: ChunkMetadata {
            index,
            length: end - start,
            start_char: Some(start),
            end_char: Some(end),
            error: false,
        },
    }
}
