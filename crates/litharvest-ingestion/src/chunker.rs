//! Fixed-size sliding-window chunker over whitespace-delimited tokens.

/// Configuration for the chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Tokens per window.
    pub chunk_size: usize,
    /// Tokens shared by consecutive windows.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkerConfig {
    pub fn chunk(&self, text: &str) -> Vec<String> {
        chunk_text(text, self.chunk_size, self.overlap)
    }
}

/// Split `text` into overlapping windows of `chunk_size` tokens.
///
/// Each window after the first starts `overlap` tokens before the end of its
/// predecessor. The final window may be shorter than `chunk_size`; no empty
/// trailing window is emitted. Whitespace-only input yields no windows.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));

        if end == words.len() {
            break;
        }
        // An overlap >= chunk_size would never advance; always move forward by one.
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Chunk the `title + "\n\n" + abstract` text of a bibliographic record.
pub fn chunk_record_text(config: &ChunkerConfig, title: &str, abstract_text: &str) -> Vec<String> {
    config.chunk(&format!("{title}\n\n{abstract_text}"))
}
