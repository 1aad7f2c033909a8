//! Semantic text splitter.
//!
//! Partitions raw document text into chunks that never exceed a
//! configured character budget, preferring semantic boundaries: blank-line
//! paragraphs first, then sentence boundaries, then word boundaries. A
//! configurable overlap carries trailing context from each chunk into the
//! next so that retrieval embeddings don't lose meaning at cut points.
//!
//! The splitter is a pure function: identical input and parameters always
//! produce the identical chunk sequence.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::WeaveError;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("static pattern"));

/// Sentence-final punctuation followed by whitespace. A boundary only
/// counts when the next character is an upper-case letter (Latin or
/// Vietnamese), checked separately since the `regex` crate has no
/// lookahead.
static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("static pattern"));

/// Upper-case Vietnamese letters with diacritics that can open a sentence.
const VIETNAMESE_CAPITALS: &str =
    "ÀÁẢÃẠĂẮẰẲẴẶÂẤẦẨẪẬĐÈÉẺẼẸÊỀẾỂỄỆÌÍỈĨỊÒÓỎÕỌÔỒỐỔỖỘƠỜỚỞỬỮỰÙÚỦŨỤƯỪỨỲÝỶỸỴ";

fn starts_sentence(c: char) -> bool {
    c.is_ascii_uppercase() || VIETNAMESE_CAPITALS.contains(c)
}

/// Lengths are measured in characters, not bytes, so Vietnamese text
/// gets the same budget as ASCII.
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split `text` into chunks of at most `chunk_size` characters with
/// `overlap` characters of carried context between consecutive chunks.
///
/// # Errors
///
/// - [`WeaveError::InvalidInput`] for empty/whitespace-only text,
///   `chunk_size == 0`, or `overlap >= chunk_size`.
/// - [`WeaveError::ChunkingFailed`] when no non-empty chunk survives.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>, WeaveError> {
    if text.trim().is_empty() {
        return Err(WeaveError::InvalidInput(
            "text is empty or whitespace-only".to_string(),
        ));
    }
    if chunk_size == 0 {
        return Err(WeaveError::InvalidInput(
            "chunk_size must be positive".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(WeaveError::InvalidInput(format!(
            "overlap ({}) must be less than chunk_size ({})",
            overlap, chunk_size
        )));
    }

    let text = text.trim();

    // Short-circuit: the whole text fits in one chunk.
    if char_len(text) <= chunk_size {
        return Ok(vec![text.to_string()]);
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for paragraph in PARAGRAPH_BREAK.split(text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if char_len(paragraph) > chunk_size {
            // Paragraph alone exceeds the budget: flush and descend to
            // sentence granularity.
            flush(&mut chunks, &mut current);

            for sentence in split_sentences(paragraph) {
                if char_len(sentence) > chunk_size {
                    flush(&mut chunks, &mut current);
                    chunks.extend(split_long_sentence(sentence, chunk_size));
                } else {
                    append_greedy(&mut chunks, &mut current, sentence, " ", chunk_size);
                }
            }
        } else {
            append_greedy(&mut chunks, &mut current, paragraph, "\n\n", chunk_size);
        }
    }

    flush(&mut chunks, &mut current);

    let mut chunks = if overlap > 0 && chunks.len() > 1 {
        apply_overlap(chunks, overlap)
    } else {
        chunks
    };

    chunks.retain(|c| !c.trim().is_empty());

    if chunks.is_empty() {
        return Err(WeaveError::ChunkingFailed(
            "no valid chunks produced from input text".to_string(),
        ));
    }

    Ok(chunks)
}

/// Append `piece` to the accumulating buffer if it fits, otherwise flush
/// the buffer and start fresh with `piece`.
fn append_greedy(
    chunks: &mut Vec<String>,
    current: &mut String,
    piece: &str,
    separator: &str,
    chunk_size: usize,
) {
    let candidate_len = if current.is_empty() {
        char_len(piece)
    } else {
        char_len(current) + char_len(separator) + char_len(piece)
    };

    if candidate_len <= chunk_size {
        if !current.is_empty() {
            current.push_str(separator);
        }
        current.push_str(piece);
    } else {
        flush(chunks, current);
        current.push_str(piece);
    }
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }
    current.clear();
}

/// Split a paragraph into sentences at `.!?` + whitespace boundaries
/// followed by a Latin or Vietnamese capital letter.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_BREAK.find_iter(text) {
        let next = text[m.end()..].chars().next();
        if next.map(starts_sentence).unwrap_or(false) {
            // The punctuation mark is a single ASCII byte at m.start().
            let sentence = text[start..m.start() + 1].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = m.end();
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

/// Split an overlong sentence at word boundaries. A single word longer
/// than `chunk_size` is truncated to exactly `chunk_size` characters;
/// the remainder of that word is dropped (accepted data loss).
fn split_long_sentence(sentence: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in sentence.split_whitespace() {
        let word_len = char_len(word);
        let candidate_len = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };

        if candidate_len <= chunk_size {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_len = candidate_len;
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            if word_len > chunk_size {
                chunks.push(word.chars().take(chunk_size).collect());
                current_len = 0;
            } else {
                current.push_str(word);
                current_len = word_len;
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Prefix every chunk after the first with the trailing `overlap`
/// characters of its predecessor, trimmed forward to the next word
/// boundary so no word is split mid-way. Chunk 0 is never modified.
fn apply_overlap(chunks: Vec<String>, overlap: usize) -> Vec<String> {
    let mut overlapped = Vec::with_capacity(chunks.len());
    overlapped.push(chunks[0].clone());

    for i in 1..chunks.len() {
        let prev = &chunks[i - 1];
        let prev_len = char_len(prev);

        let mut tail: String = if prev_len > overlap {
            prev.chars().skip(prev_len - overlap).collect()
        } else {
            prev.clone()
        };

        // Drop a leading partial word so the carried prefix starts
        // at a word boundary.
        if !tail.starts_with(' ') {
            if let Some(space_idx) = tail.find(' ') {
                if space_idx > 0 {
                    tail = tail[space_idx..].to_string();
                }
            }
        }

        overlapped.push(format!("{} {}", tail.trim(), chunks[i]));
    }

    overlapped
}
