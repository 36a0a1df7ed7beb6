//! Text chunking module
//!
//! Splits document text into overlapping windows for embedding. Windows
//! prefer to end just after a `.` or newline near the raw cut. All sizes
//! and offsets are in characters, not bytes.

use docchat_common::config::ChunkingSettings;
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
    /// Distance around the raw cut searched for a boundary
    pub boundary_window: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            boundary_window: 100,
        }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(settings: &ChunkingSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size.max(1),
            chunk_overlap: settings.chunk_overlap,
            boundary_window: settings.boundary_window,
        }
    }
}

/// A text chunk with its position in the source
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The chunk content, trimmed
    pub content: String,
    /// Index of this chunk in the document
    pub index: i32,
    /// Start character position in original text
    pub start_pos: usize,
    /// End character position (exclusive) in original text
    pub end_pos: usize,
}

/// Split text into chunks for embedding
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    let chars: Vec<char> = text.chars().collect();
    let spans = spans_of(&chars, config);

    debug!(
        input_len = chars.len(),
        chunk_count = spans.len(),
        chunk_size = config.chunk_size,
        "Text chunked"
    );

    spans
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| TextChunk {
            content: chars[start..end].iter().collect(),
            index: index as i32,
            start_pos: start,
            end_pos: end,
        })
        .collect()
}

/// Chunk contents only
pub fn split(text: &str, config: &ChunkingConfig) -> Vec<String> {
    chunk_text(text, config)
        .into_iter()
        .map(|chunk| chunk.content)
        .collect()
}

/// `(start, end)` character offsets of each trimmed chunk
pub fn chunk_spans(text: &str, config: &ChunkingConfig) -> Vec<(usize, usize)> {
    let chars: Vec<char> = text.chars().collect();
    spans_of(&chars, config)
}

fn spans_of(chars: &[char], config: &ChunkingConfig) -> Vec<(usize, usize)> {
    let total_len = chars.len();
    let chunk_size = config.chunk_size.max(1);
    let mut spans = Vec::new();

    if total_len <= chunk_size {
        spans.extend(trimmed(chars, 0, total_len));
        return spans;
    }

    let mut start = 0;
    while start < total_len {
        let mut end = (start + chunk_size).min(total_len);

        if end < total_len {
            if let Some(cut) = find_boundary(chars, start, end, config.boundary_window) {
                end = cut;
            }
        }

        spans.extend(trimmed(chars, start, end));

        if end >= total_len {
            break;
        }

        start = end.saturating_sub(config.chunk_overlap).max(start + 1);
    }

    spans
}

/// Position just after the last `.` or newline within `boundary_window` of `end`
fn find_boundary(chars: &[char], start: usize, end: usize, window: usize) -> Option<usize> {
    let lo = end.saturating_sub(window).max(start);
    let hi = (end + window).min(chars.len());

    chars[lo..hi]
        .iter()
        .rposition(|&c| c == '.' || c == '\n')
        .map(|pos| lo + pos + 1)
}

/// Span of `chars[start..end]` with surrounding whitespace removed, if any remains
fn trimmed(chars: &[char], start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = &chars[start..end];
    let lead = slice.iter().position(|c| !c.is_whitespace())?;
    let tail = slice.iter().rposition(|c| !c.is_whitespace())?;
    Some((start + lead, start + tail + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Text with no `.` or newline anywhere
    fn plain_text(len: usize) -> String {
        "abcdefghij".chars().cycle().take(len).collect()
    }

    #[test]
    fn test_short_text_is_single_trimmed_chunk() {
        let chunks = split("  hello world \n", &ChunkingConfig::default());
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_empty_text() {
        assert!(split("", &ChunkingConfig::default()).is_empty());
        assert!(split("   \n\t ", &ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn test_2500_chars_without_boundaries() {
        let config = ChunkingConfig::default();
        let text = plain_text(2500);

        let spans = chunk_spans(&text, &config);
        assert_eq!(spans.len(), 3);
        for (start, end) in &spans {
            assert!(end - start <= 1000);
        }
        // 2nd chunk starts at least 200 characters before the 1st ends
        assert!(spans[0].1 - spans[1].0 >= 200);
    }

    #[test]
    fn test_cut_prefers_sentence_boundary() {
        let config = ChunkingConfig::default();
        let mut text = plain_text(950);
        text.push('.');
        text.push_str(&plain_text(1200));

        let chunks = chunk_text(&text, &config);
        assert_eq!(chunks[0].end_pos, 951);
        assert!(chunks[0].content.ends_with('.'));
    }

    #[test]
    fn test_size_bound() {
        let config = ChunkingConfig::default();
        let text = format!("{}\n{}", plain_text(1080), plain_text(3000));

        for chunk in chunk_text(&text, &config) {
            let len = chunk.content.chars().count();
            assert!(len <= config.chunk_size + config.boundary_window, "len {len}");
        }
    }

    #[test]
    fn test_chunks_cover_text() {
        let config = ChunkingConfig {
            chunk_size: 120,
            chunk_overlap: 30,
            boundary_window: 20,
        };
        let text = "Sentence number one is here. Another line follows\nand the story goes on. "
            .repeat(20);
        let chars: Vec<char> = text.chars().collect();

        let spans = chunk_spans(&text, &config);
        let mut covered = vec![false; chars.len()];
        for (start, end) in &spans {
            covered[*start..*end].iter_mut().for_each(|c| *c = true);
        }

        for (i, c) in chars.iter().enumerate() {
            assert!(covered[i] || c.is_whitespace(), "character {i} not covered");
        }

        // Overlap removed, the chunk contents rebuild the text
        let chunks = chunk_text(&text, &config);
        let mut rebuilt = String::new();
        let mut cursor = chunks[0].start_pos;
        for chunk in &chunks {
            if chunk.start_pos > cursor {
                rebuilt.extend(&chars[cursor..chunk.start_pos]);
            }
            let skip = cursor.saturating_sub(chunk.start_pos);
            rebuilt.extend(chunk.content.chars().skip(skip));
            cursor = cursor.max(chunk.end_pos);
        }
        assert_eq!(rebuilt, text.trim());
    }

    #[test]
    fn test_deterministic() {
        let config = ChunkingConfig::default();
        let text = "Lorem ipsum dolor sit amet. ".repeat(200);
        assert_eq!(split(&text, &config), split(&text, &config));
    }

    #[test]
    fn test_multibyte_characters() {
        let config = ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 2,
            boundary_window: 3,
        };
        let text = "éééééééééééééééééééééééé";
        for chunk in chunk_text(text, &config) {
            assert!(chunk.content.chars().count() <= 13);
        }
    }

    #[test]
    fn test_overlap_larger_than_size_still_advances() {
        let config = ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 50,
            boundary_window: 0,
        };
        let chunks = chunk_text(&plain_text(40), &config);
        assert_eq!(chunks.len(), 31);
        assert!(chunks.windows(2).all(|w| w[1].start_pos > w[0].start_pos));
    }
}
