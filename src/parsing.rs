//! Structured block parsing for ingestion text.
//!
//! Ingested text follows a delimiter convention: a line of three or more
//! dashes starts a new block, optionally carrying the block title inline
//! (`--- Acme Sponsorship Call ---`). Otherwise the title is the first
//! non-field line after the delimiter. Blocks then hold `Field: value`
//! lines (`Topic:`, `Guests:`, `Year:`) and a `Notes:` field that runs to
//! the next delimiter.

use crate::topic::normalize_topics;
use regex::Regex;

/// One delimiter-separated segment of the input, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block title; "Untitled" when no title line was discernible, empty
    /// when the whole input was taken as a single block.
    pub title: String,
    /// Raw body of the block, delimiters excluded.
    pub raw_text: String,
}

/// Parse result: the blocks plus any text preceding the first delimiter.
#[derive(Debug, Clone, Default)]
pub struct ParsedText {
    pub blocks: Vec<Block>,
    /// Text before the first delimiter. The ingestion pipeline discards it,
    /// but callers may want it (e.g. to warn about dropped content).
    pub preamble: String,
}

/// Structured fields extracted from a block body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockFields {
    pub title: String,
    /// Normalized topic label(s), comma-joined. See [`crate::topic`].
    pub topic: String,
    /// Guest names, comma-joined.
    pub guests: String,
    pub year: String,
    /// The content that gets chunked and embedded.
    pub notes: String,
}

/// Splits raw text into titled blocks on dash delimiters.
pub struct BlockParser {
    bare_delimiter: Regex,
    inline_delimiter: Regex,
    field_line: Regex,
}

impl BlockParser {
    pub fn new() -> Self {
        // A delimiter line is dashes only; an inline-titled delimiter wraps
        // the title between two dash runs on one line.
        let bare_delimiter = Regex::new(r"^\s*-{3,}\s*$").expect("Invalid regex");
        let inline_delimiter =
            Regex::new(r"^\s*-{3,}\s*(.*?)\s*-{3,}\s*$").expect("Invalid regex");
        let field_line = Regex::new(r"^[A-Za-z][A-Za-z0-9 _/-]{0,39}:(\s|$)").expect("Invalid regex");

        Self {
            bare_delimiter,
            inline_delimiter,
            field_line,
        }
    }

    /// Split `text` into blocks.
    ///
    /// Fails soft: input without any delimiter becomes a single block with an
    /// empty title rather than an error. Block order follows document order.
    pub fn parse(&self, text: &str) -> ParsedText {
        let mut blocks = Vec::new();
        let mut preamble_lines: Vec<&str> = Vec::new();
        let mut current: Option<(Option<String>, Vec<String>)> = None;
        let mut saw_delimiter = false;

        for line in text.lines() {
            if let Some(inline_title) = self.delimiter_title(line) {
                saw_delimiter = true;
                Self::finish_block(&mut blocks, current.take());
                current = Some((inline_title, Vec::new()));
                continue;
            }

            match current.as_mut() {
                None => preamble_lines.push(line),
                Some((title, lines)) => {
                    if title.is_none() && lines.is_empty() {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        if self.field_line.is_match(trimmed) {
                            // Body starts directly with fields: no title line.
                            lines.push(line.to_string());
                        } else {
                            *title = Some(trimmed.to_string());
                        }
                    } else {
                        lines.push(line.to_string());
                    }
                }
            }
        }
        Self::finish_block(&mut blocks, current.take());

        if !saw_delimiter {
            let whole = text.trim();
            let blocks = if whole.is_empty() {
                Vec::new()
            } else {
                vec![Block {
                    title: String::new(),
                    raw_text: whole.to_string(),
                }]
            };
            return ParsedText {
                blocks,
                preamble: String::new(),
            };
        }

        ParsedText {
            blocks,
            preamble: preamble_lines.join("\n").trim().to_string(),
        }
    }

    /// Returns `Some(title)` when `line` is a delimiter. The title is `None`
    /// for a bare dash run, `Some(..)` for an inline-titled delimiter.
    #[allow(clippy::option_option)]
    fn delimiter_title(&self, line: &str) -> Option<Option<String>> {
        if self.bare_delimiter.is_match(line) {
            return Some(None);
        }
        if let Some(caps) = self.inline_delimiter.captures(line) {
            let title = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            return Some(if title.is_empty() {
                None
            } else {
                Some(title.to_string())
            });
        }
        None
    }

    fn finish_block(blocks: &mut Vec<Block>, current: Option<(Option<String>, Vec<String>)>) {
        if let Some((title, lines)) = current {
            let body = lines.join("\n").trim().to_string();
            if body.is_empty() {
                return;
            }
            blocks.push(Block {
                title: title.unwrap_or_else(|| "Untitled".to_string()),
                raw_text: body,
            });
        }
    }
}

impl Default for BlockParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract `Topic`/`Guests`/`Year`/`Notes` fields from a block body.
///
/// Missing fields fall back the way the summarizer's output conventions
/// expect: topic `misc`, year `Unknown`, empty guest list. A block without a
/// `Notes:` field keeps its whole body as notes so untagged content is still
/// embedded rather than dropped.
pub fn extract_fields(block: &Block) -> BlockFields {
    let mut topic = None;
    let mut guests = None;
    let mut year = None;
    let mut notes = None;

    let mut lines = block.raw_text.lines();
    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("Topic:") {
            topic.get_or_insert_with(|| rest.trim().to_string());
        } else if let Some(rest) = trimmed.strip_prefix("Guests:") {
            guests.get_or_insert_with(|| join_list(rest));
        } else if let Some(rest) = trimmed.strip_prefix("Year:") {
            year.get_or_insert_with(|| rest.trim().to_string());
        } else if let Some(rest) = trimmed.strip_prefix("Notes:") {
            // Notes run from here to the end of the block.
            let mut collected = rest.trim().to_string();
            for continuation in lines.by_ref() {
                collected.push('\n');
                collected.push_str(continuation);
            }
            notes = Some(collected.trim().to_string());
            break;
        }
    }

    BlockFields {
        title: block.title.clone(),
        topic: normalize_topics(topic.as_deref().unwrap_or("")),
        guests: guests.unwrap_or_default(),
        year: year.filter(|y| !y.is_empty()).unwrap_or_else(|| "Unknown".to_string()),
        notes: notes
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| block.raw_text.clone()),
    }
}

/// Re-join a comma-separated list with normalized spacing.
fn join_list(raw: &str) -> String {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
