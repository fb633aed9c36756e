//! Outbound-text safety transform: sanitize and split into message-sized chunks.
//!
//! Telegram rejects messages over 4096 characters and tries to parse
//! formatting control characters, so recognised Markdown is stripped of
//! anything the transport could misinterpret and packed into chunks sent
//! sequentially. This is a best-effort safety transform, not a
//! Markdown-preserving one — it is lossy by design (see DESIGN.md: the strip
//! set includes `.` and `-`, which also mangles decimal numbers and
//! hyphenated words).

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum characters per outbound chunk, under Telegram's 4096 hard limit.
pub const MAX_CHUNK_CHARS: usize = 4000;

/// Characters the transport could read as rich-text control sequences.
static RE_CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[*_`\[\]()~>#+=|{}.!-]").unwrap());

/// Three or more consecutive newlines.
static RE_EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Sentence boundaries: terminator run followed by whitespace.
static RE_SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s+").unwrap());

/// Strip control-sequence characters and collapse 3+ newlines to 2.
pub fn sanitize(text: &str) -> String {
    let stripped = RE_CONTROL_CHARS.replace_all(text, "");
    RE_EXCESS_NEWLINES.replace_all(&stripped, "\n\n").into_owned()
}

/// Sanitize `text` and split it into chunks of at most `limit` characters.
///
/// Sentences are packed greedily; a single sentence longer than `limit` is
/// further split on word boundaries. Chunks are trimmed and empty chunks
/// dropped. Lengths count `char`s, not bytes, so multi-byte text cannot
/// overshoot the transport limit.
pub fn split_into_chunks(text: &str, limit: usize) -> Vec<String> {
    let sanitized = sanitize(text);

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for piece in split_keeping_separators(&sanitized) {
        let piece_chars = piece.chars().count();

        if current_chars + piece_chars > limit {
            flush(&mut current, &mut current_chars, &mut chunks);

            if piece_chars > limit {
                // A single over-long sentence: fall back to word boundaries.
                for word in piece.split_whitespace() {
                    let word_chars = word.chars().count();
                    if current_chars + word_chars + 1 > limit {
                        flush(&mut current, &mut current_chars, &mut chunks);
                        current.push_str(word);
                        current_chars = word_chars;
                    } else {
                        if !current.is_empty() {
                            current.push(' ');
                            current_chars += 1;
                        }
                        current.push_str(word);
                        current_chars += word_chars;
                    }
                }
            } else {
                current.push_str(piece);
                current_chars = piece_chars;
            }
        } else {
            current.push_str(piece);
            current_chars += piece_chars;
        }
    }

    flush(&mut current, &mut current_chars, &mut chunks);
    chunks
}

/// Move the accumulator into `chunks`, trimmed; empty accumulators vanish.
fn flush(current: &mut String, current_chars: &mut usize, chunks: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
    *current_chars = 0;
}

/// Split on sentence boundaries, keeping each boundary as its own piece so
/// terminator whitespace is preserved when sentences are re-joined.
fn split_keeping_separators(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for m in RE_SENTENCE_BOUNDARY.find_iter(text) {
        if m.start() > last {
            pieces.push(&text[last..m.start()]);
        }
        pieces.push(m.as_str());
        last = m.end();
    }
    if last < text.len() {
        pieces.push(&text[last..]);
    }
    pieces
}
