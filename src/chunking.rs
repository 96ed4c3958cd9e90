//! Fixed-size overlapping windows over extracted document text.
//!
//! Chunks are the unit of retrieval granularity: each window is embedded
//! independently at ingestion time and ranked independently at query time.
//! Splitting is char-based so windows never cut a UTF-8 code point, and the
//! cursor always advances by `max_len - overlap` which the config validation
//! guarantees to be positive.

use crate::types::{ChunkConfig, RagError};

/// Split `text` into windows of at most `config.max_len` chars, each window
/// after the first starting `config.overlap` chars before the previous
/// window's end.
///
/// Empty input produces an empty sequence. `overlap >= max_len` is a
/// configuration error and fails fast instead of looping.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Result<Vec<String>, RagError> {
    config.validate()?;
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.max_len).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = end - config.overlap;
    }
    Ok(chunks)
}
