//! Bounded-size chunking of parsed blocks.
//!
//! Each block's notes are re-split into chunks no longer than the configured
//! maximum, preferring the coarsest separator that fits: paragraph breaks,
//! then line breaks, then spaces, then hard character cuts. Consecutive
//! chunks from the same block share up to `overlap` characters of context so
//! retrieval does not lose continuity at chunk boundaries. Every chunk
//! carries its source block's metadata plus a zero-based `chunk_idx`.

use crate::config::ChunkingSettings;
use crate::parsing::BlockFields;

/// Separator cascade, coarsest first. A hard character cut is the fallback.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Metadata carried by every chunk, inherited from its source block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub title: String,
    pub topic: String,
    pub guests: String,
    pub year: String,
    /// Originating file or crawl source, when known.
    pub source_file: Option<String>,
    /// Zero-based position of this chunk within its block.
    pub chunk_idx: usize,
}

/// A bounded-size piece of a block's notes, the atomic unit of embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Chunking parameters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub max_chars: usize,
    /// Characters of shared trailing/leading context between consecutive
    /// chunks of one block.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1200,
            overlap: 150,
        }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(settings: &ChunkingSettings) -> Self {
        Self {
            max_chars: settings.max_chunk_chars.max(1),
            overlap: settings.chunk_overlap,
        }
    }
}

/// Re-split blocks into bounded chunks, carrying metadata forward.
///
/// Blocks whose notes fit within the limit yield exactly one chunk with
/// `chunk_idx = 0`; empty notes yield nothing.
pub fn rechunk(
    blocks: &[BlockFields],
    config: &ChunkingConfig,
    source_file: Option<&str>,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for block in blocks {
        let pieces = split_text(&block.notes, config.max_chars.max(1), config.overlap);
        for (chunk_idx, content) in pieces.into_iter().enumerate() {
            chunks.push(Chunk {
                content,
                metadata: ChunkMetadata {
                    title: block.title.clone(),
                    topic: block.topic.clone(),
                    guests: block.guests.clone(),
                    year: block.year.clone(),
                    source_file: source_file.map(str::to_string),
                    chunk_idx,
                },
            });
        }
    }

    chunks
}

/// Split `text` into pieces of at most `max` bytes, with up to `overlap`
/// bytes of shared context between consecutive pieces.
fn split_text(text: &str, max: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= max {
        return vec![text.to_string()];
    }

    let pieces = split_pieces(text, max, 0);
    merge_with_overlap(pieces, max, overlap)
}

/// Break text into fragments no longer than `max`, recursing through the
/// separator cascade and falling back to hard character cuts.
fn split_pieces(text: &str, max: usize, sep_idx: usize) -> Vec<String> {
    if text.len() <= max {
        return vec![text.to_string()];
    }
    if sep_idx >= SEPARATORS.len() {
        return hard_cut(text, max);
    }

    let sep = SEPARATORS[sep_idx];
    if !text.contains(sep) {
        return split_pieces(text, max, sep_idx + 1);
    }

    let mut pieces = Vec::new();
    for part in text.split(sep) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if part.len() <= max {
            pieces.push(part.to_string());
        } else {
            pieces.extend(split_pieces(part, max, sep_idx + 1));
        }
    }
    pieces
}

/// Cut text into `max`-byte slices at char boundaries.
fn hard_cut(text: &str, max: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if rest.len() <= max {
            pieces.push(rest.to_string());
            break;
        }
        let mut cut = floor_char_boundary(rest, max);
        if cut == 0 {
            // A single char wider than max: emit it whole rather than loop.
            cut = rest
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
        }
        pieces.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    pieces
}

/// Greedily pack fragments into chunks of at most `max` bytes, carrying an
/// overlap tail from each flushed chunk into the next when it fits.
fn merge_with_overlap(pieces: Vec<String>, max: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf = String::new();

    for piece in pieces {
        let projected = if buf.is_empty() {
            piece.len()
        } else {
            buf.len() + 1 + piece.len()
        };

        if projected > max && !buf.is_empty() {
            let tail = overlap_tail(&buf, overlap);
            chunks.push(std::mem::take(&mut buf));
            if !tail.is_empty() && tail.len() + 1 + piece.len() <= max {
                buf = tail;
            }
        }

        if !buf.is_empty() {
            buf.push('\n');
        }
        buf.push_str(&piece);
    }

    if !buf.is_empty() {
        chunks.push(buf);
    }

    chunks.retain(|c| !c.trim().is_empty());
    chunks
}

/// The last `overlap` bytes of `s`, snapped to a char boundary and preferring
/// to start at a word boundary within the window.
fn overlap_tail(s: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    if s.len() <= overlap {
        return s.to_string();
    }

    let mut start = s.len() - overlap;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    let window = &s[start..];
    match window.find(char::is_whitespace) {
        Some(pos) => window[pos..].trim_start().to_string(),
        None => window.to_string(),
    }
}

/// Snap a byte index down to the nearest valid char boundary.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
