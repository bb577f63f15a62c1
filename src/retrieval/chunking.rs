//! Recursive separator text splitting.
//!
//! Windows are measured in characters, never split a UTF-8 code point, and
//! prefer to end on a paragraph, line, sentence or word boundary in that
//! order. Consecutive windows share up to `chunk_overlap` characters.

/// Separators tried from strongest to weakest boundary.
const SEPARATORS: [&str; 7] = ["\n\n", "\n", ". ", "! ", "? ", "; ", " "];

/// Splits text into bounded, overlapping windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(1000, 100)
    }
}

impl TextChunker {
    /// Creates a chunker. The overlap is clamped below the chunk size.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits `text`; blank text yields no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        // offsets[c] is the byte offset of character c; the last entry is text.len().
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = offsets.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let max_end = (start + self.chunk_size).min(total);
            let end = if max_end == total {
                total
            } else {
                self.boundary(text, &offsets, start, max_end)
            };

            let chunk = text[offsets[start]..offsets[end]].trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }
            if end >= total {
                break;
            }

            let mut next = end.saturating_sub(self.chunk_overlap);
            next = self.word_start_after(text, &offsets, next, end);
            if next <= start {
                next = end;
            }
            start = next;
        }
        chunks
    }

    /// Character index where a window starting at `start` should end.
    fn boundary(&self, text: &str, offsets: &[usize], start: usize, max_end: usize) -> usize {
        let window = &text[offsets[start]..offsets[max_end]];
        let min_len = (max_end - start) / 4;

        for separator in SEPARATORS {
            if let Some(pos) = window.rfind(separator) {
                let cut = pos + separator.len();
                let end = start + window[..cut].chars().count();
                if end > start + min_len {
                    return end;
                }
            }
        }
        max_end
    }

    /// First word start in `[from, limit)`, or `from` when there is none.
    fn word_start_after(&self, text: &str, offsets: &[usize], from: usize, limit: usize) -> usize {
        if from == 0 {
            return 0;
        }
        let mut prev_is_space = text[..offsets[from]]
            .chars()
            .next_back()
            .is_some_and(char::is_whitespace);
        for (c, ch) in text[offsets[from]..offsets[limit]].chars().enumerate() {
            if prev_is_space && !ch.is_whitespace() {
                return from + c;
            }
            prev_is_space = ch.is_whitespace();
        }
        from
    }
}
