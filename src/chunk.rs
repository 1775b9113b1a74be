//! Paragraph-boundary text chunker.
//!
//! Splits each [`Fragment`] into [`Chunk`]s that respect a configurable
//! `max_tokens` limit. Splitting occurs on paragraph boundaries (`\n\n`)
//! and falls back to line/word boundaries for oversized paragraphs.
//!
//! Each chunk carries a SHA-256 hash of its text, which the index uses to
//! skip embedding duplicate passages.

use sha2::{Digest, Sha256};

use crate::models::{Chunk, Fragment};

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Chunk every fragment, numbering chunks contiguously across the document.
pub fn chunk_fragments(fragments: &[Fragment], max_tokens: usize) -> Vec<Chunk> {
    let mut out = Vec::new();
    for fragment in fragments {
        for piece in split_text(&fragment.text, max_tokens) {
            let index = out.len() as i64;
            out.push(make_chunk(fragment.index, index, &piece));
        }
    }
    out
}

/// Split text on paragraph boundaries, respecting max_tokens.
fn split_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    let mut pieces = Vec::new();
    let mut current_buf = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current_buf.is_empty() {
            trimmed.len()
        } else {
            current_buf.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !current_buf.is_empty() {
            pieces.push(std::mem::take(&mut current_buf));
        }

        if trimmed.len() > max_chars {
            let mut remaining = trimmed;
            while !remaining.is_empty() {
                let split_at = floor_char_boundary(remaining, max_chars);
                let actual_split = if split_at < remaining.len() {
                    remaining[..split_at]
                        .rfind('\n')
                        .or_else(|| remaining[..split_at].rfind(' '))
                        .map(|pos| pos + 1)
                        .unwrap_or(split_at)
                } else {
                    split_at
                };
                let piece = remaining[..actual_split].trim();
                if !piece.is_empty() {
                    pieces.push(piece.to_string());
                }
                remaining = &remaining[actual_split..];
            }
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    if !current_buf.is_empty() {
        pieces.push(current_buf);
    }

    pieces
}

/// Largest index `<= max` that sits on a char boundary, and at least one
/// full character so the hard split always makes progress.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut idx = max;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    if idx == 0 {
        s.chars().next().map(char::len_utf8).unwrap_or(s.len())
    } else {
        idx
    }
}

fn make_chunk(fragment_index: usize, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        fragment_index,
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(index: usize, text: &str) -> Fragment {
        Fragment {
            index,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_fragments(&[fragment(0, "Hello, world!")], 700);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn test_blank_fragment_yields_nothing() {
        let chunks = chunk_fragments(&[fragment(0, "  \n\n ")], 700);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_multiple_paragraphs_exceed_limit() {
        // max_tokens=5 => max_chars=20
        let text = "This is paragraph one.\n\nThis is paragraph two.\n\nThis is paragraph three.";
        let chunks = chunk_fragments(&[fragment(0, text)], 5);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(!c.text.is_empty());
        }
    }

    #[test]
    fn test_indices_contiguous_across_fragments() {
        let text = (0..20)
            .map(|i| format!("Paragraph number {}.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_fragments(&[fragment(0, &text), fragment(1, &text)], 10);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64, "Index mismatch at position {}", i);
        }
        assert_eq!(chunks.first().unwrap().fragment_index, 0);
        assert_eq!(chunks.last().unwrap().fragment_index, 1);
    }

    #[test]
    fn test_multibyte_hard_split_does_not_panic() {
        let text = "é".repeat(50);
        let chunks = chunk_fragments(&[fragment(0, &text)], 1);
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_deterministic_text_and_hash() {
        let frags = [fragment(0, "Alpha\n\nBeta\n\nGamma\n\nDelta")];
        let c1 = chunk_fragments(&frags, 5);
        let c2 = chunk_fragments(&frags, 5);
        assert_eq!(c1.len(), c2.len());
        for (a, b) in c1.iter().zip(c2.iter()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.hash, b.hash);
        }
    }
}
