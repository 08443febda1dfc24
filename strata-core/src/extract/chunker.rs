//! Deterministic text chunkers
//!
//! Two strategies: the prose chunker targets 500-1000 tokens with soft
//! breaks at paragraph and sentence boundaries, the code chunker splits on
//! top-level declaration boundaries under a hard cap. Both are pure
//! functions of their input, so re-extraction of an unchanged file yields
//! byte-identical chunks.

use regex::Regex;

use crate::types::ChunkKind;

/// A chunk boundary decision: byte span plus the owned text of that span
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSpan {
    pub text: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub token_count: usize,
    pub kind: ChunkKind,
}

/// Token estimate: one token per ~0.75 whitespace-separated words
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words * 4).div_ceil(3)
}

/// Chunk prose, preferring paragraph boundaries and falling back to
/// sentence boundaries for oversized paragraphs
pub fn chunk_prose(text: &str, min_tokens: usize, max_tokens: usize) -> Vec<ChunkSpan> {
    let mut pieces: Vec<(usize, usize)> = Vec::new();
    for (start, end) in paragraph_ranges(text) {
        let tokens = estimate_tokens(&text[start..end]);
        if tokens > max_tokens {
            pieces.extend(sentence_ranges(text, start, end, max_tokens));
        } else {
            pieces.push((start, end));
        }
    }
    let mut chunks = assemble(text, &pieces, max_tokens, ChunkKind::Prose);

    // An undersized tail folds into its predecessor when the cap allows
    if chunks.len() >= 2 {
        let last = &chunks[chunks.len() - 1];
        let prev = &chunks[chunks.len() - 2];
        if last.token_count < min_tokens
            && prev.token_count + last.token_count <= max_tokens
            && prev.end_byte <= last.start_byte
        {
            let start = prev.start_byte;
            let end = last.end_byte;
            chunks.truncate(chunks.len() - 2);
            chunks.push(make_span(text, start, end, ChunkKind::Prose));
        }
    }
    chunks
}

/// Chunk source code on top-level declaration boundaries with a hard cap
pub fn chunk_code(text: &str, max_tokens: usize) -> Vec<ChunkSpan> {
    let mut pieces: Vec<(usize, usize)> = Vec::new();
    for (start, end) in declaration_ranges(text) {
        let tokens = estimate_tokens(&text[start..end]);
        if tokens > max_tokens {
            pieces.extend(line_ranges(text, start, end, max_tokens));
        } else {
            pieces.push((start, end));
        }
    }
    // Code favors whole declarations per chunk; no tail folding
    assemble(text, &pieces, max_tokens, ChunkKind::Code)
}

/// Greedily merge adjacent pieces into chunks under the token cap
fn assemble(
    text: &str,
    pieces: &[(usize, usize)],
    max_tokens: usize,
    kind: ChunkKind,
) -> Vec<ChunkSpan> {
    let mut chunks = Vec::new();
    let mut current: Option<(usize, usize, usize)> = None; // start, end, tokens

    for &(start, end) in pieces {
        let tokens = estimate_tokens(&text[start..end]);
        if tokens == 0 {
            continue;
        }
        match current {
            None => current = Some((start, end, tokens)),
            Some((cur_start, cur_end, cur_tokens)) => {
                if cur_tokens + tokens > max_tokens {
                    chunks.push(make_span(text, cur_start, cur_end, kind));
                    current = Some((start, end, tokens));
                } else {
                    current = Some((cur_start, end, cur_tokens + tokens));
                }
            }
        }
    }

    if let Some((start, end, _)) = current {
        chunks.push(make_span(text, start, end, kind));
    }
    chunks
}

fn make_span(text: &str, start: usize, end: usize, kind: ChunkKind) -> ChunkSpan {
    let slice = &text[start..end];
    ChunkSpan {
        text: slice.to_string(),
        start_byte: start,
        end_byte: end,
        token_count: estimate_tokens(slice),
        kind,
    }
}

/// Byte ranges of paragraphs split on blank lines
fn paragraph_ranges(text: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0usize;
    let bytes = text.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] == b'\n' {
            // A blank line (possibly with \r) ends the paragraph
            let mut j = i + 1;
            while j < bytes.len() && (bytes[j] == b'\r' || bytes[j] == b' ' || bytes[j] == b'\t') {
                j += 1;
            }
            if j < bytes.len() && bytes[j] == b'\n' {
                if start < i {
                    ranges.push((start, i));
                }
                while j < bytes.len() && bytes[j] == b'\n' {
                    j += 1;
                }
                start = j;
                i = j;
                continue;
            }
        }
        i += 1;
    }
    if start < bytes.len() {
        ranges.push((start, bytes.len()));
    }
    ranges
}

/// Split an oversized paragraph on sentence terminators, grouping
/// sentences back up to the cap
fn sentence_ranges(
    text: &str,
    start: usize,
    end: usize,
    max_tokens: usize,
) -> Vec<(usize, usize)> {
    // Compiled per oversized paragraph; those are rare enough in practice
    #[allow(clippy::unwrap_used)]
    let terminator = Regex::new(r"[.!?]\s+").unwrap();
    let slice = &text[start..end];

    let mut boundaries: Vec<usize> = vec![0];
    for m in terminator.find_iter(slice) {
        boundaries.push(m.end());
    }
    boundaries.push(slice.len());

    let mut out = Vec::new();
    let mut cur_start = boundaries[0];
    let mut cur_tokens = 0usize;
    for window in boundaries.windows(2) {
        let (s, e) = (window[0], window[1]);
        if s == e {
            continue;
        }
        let tokens = estimate_tokens(&slice[s..e]);
        if tokens > max_tokens {
            // A single run-on sentence past the cap: flush what has
            // accumulated, then hard split the sentence on words
            if cur_tokens > 0 {
                out.push((start + cur_start, start + s));
            }
            out.extend(word_ranges(text, start + s, start + e, max_tokens));
            cur_start = e;
            cur_tokens = 0;
        } else if cur_tokens + tokens > max_tokens && cur_tokens > 0 {
            out.push((start + cur_start, start + s));
            cur_start = s;
            cur_tokens = tokens;
        } else {
            cur_tokens += tokens;
        }
    }
    if cur_start < slice.len() {
        out.push((start + cur_start, end));
    }
    out
}

/// Byte ranges of top-level declaration blocks
///
/// A new block begins at any non-indented line matching a declaration
/// keyword across the common languages; everything between two boundaries
/// belongs to the earlier declaration.
fn declaration_ranges(text: &str) -> Vec<(usize, usize)> {
    #[allow(clippy::unwrap_used)]
    let decl = Regex::new(
        r"^(pub\s|fn\s|struct\s|enum\s|impl[\s<]|trait\s|mod\s|class\s|def\s|func\s|function\s|interface\s|type\s|const\s|static\s|public\s|private\s|protected\s|package\s|export\s)",
    )
    .unwrap();

    let mut starts: Vec<usize> = Vec::new();
    let mut offset = 0usize;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if !trimmed.is_empty() && !line.starts_with([' ', '\t']) && decl.is_match(trimmed) {
            starts.push(offset);
        }
        offset += line.len();
    }

    if starts.is_empty() || starts[0] != 0 {
        starts.insert(0, 0);
    }
    starts.push(text.len());

    starts
        .windows(2)
        .filter(|w| w[0] < w[1])
        .map(|w| (w[0], w[1]))
        .collect()
}

/// Group lines of an oversized block up to the cap
fn line_ranges(text: &str, start: usize, end: usize, max_tokens: usize) -> Vec<(usize, usize)> {
    let slice = &text[start..end];
    let mut out = Vec::new();
    let mut cur_start = 0usize;
    let mut cur_tokens = 0usize;
    let mut offset = 0usize;

    for line in slice.split_inclusive('\n') {
        let tokens = estimate_tokens(line);
        if cur_tokens + tokens > max_tokens && cur_tokens > 0 {
            out.push((start + cur_start, start + offset));
            cur_start = offset;
            cur_tokens = 0;
        }
        cur_tokens += tokens;
        offset += line.len();
    }
    if cur_start < slice.len() {
        out.push((start + cur_start, end));
    }
    out
}

/// Hard word-boundary split, the last resort for pathological input
fn word_ranges(text: &str, start: usize, end: usize, max_tokens: usize) -> Vec<(usize, usize)> {
    let slice = &text[start..end];
    let max_words = max_tokens.saturating_mul(3) / 4;
    let mut out = Vec::new();
    let mut cur_start = 0usize;
    let mut words = 0usize;
    let mut in_word = false;

    for (i, c) in slice.char_indices() {
        if c.is_whitespace() {
            if in_word {
                words += 1;
                in_word = false;
                if words >= max_words.max(1) {
                    out.push((start + cur_start, start + i));
                    cur_start = i;
                    words = 0;
                }
            }
        } else {
            in_word = true;
        }
    }
    if cur_start < slice.len() {
        out.push((start + cur_start, end));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(words: usize) -> String {
        (0..words)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = format!("{}\n\n{}\n\n{}", paragraph(300), paragraph(300), paragraph(300));
        let a = chunk_prose(&text, 500, 1000);
        let b = chunk_prose(&text, 500, 1000);
        assert_eq!(a, b);
    }

    #[test]
    fn spans_are_disjoint_and_cover_the_text() {
        let text = format!("{}\n\n{}\n\n{}", paragraph(200), paragraph(400), paragraph(350));
        let chunks = chunk_prose(&text, 500, 1000);
        assert!(!chunks.is_empty());
        for pair in chunks.windows(2) {
            assert!(pair[0].end_byte <= pair[1].start_byte);
        }
        assert_eq!(chunks.last().map(|c| c.end_byte), Some(text.len()));
    }

    #[test]
    fn twelve_hundred_tokens_yield_at_least_two_chunks() {
        // ~900 words => ~1200 tokens split over paragraphs
        let text = (0..6)
            .map(|_| paragraph(150))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_prose(&text, 500, 1000);
        assert!(chunks.len() >= 2, "got {} chunks", chunks.len());
        for chunk in &chunks {
            assert!(chunk.token_count <= 1000 + 1);
        }
    }

    #[test]
    fn oversized_paragraph_splits_on_sentences() {
        let sentences: Vec<String> = (0..120)
            .map(|i| format!("Sentence number {i} has exactly a few words in it."))
            .collect();
        let text = sentences.join(" ");
        let chunks = chunk_prose(&text, 500, 1000);
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn code_splits_on_top_level_declarations() {
        let mut source = String::new();
        for i in 0..40 {
            source.push_str(&format!(
                "fn function_{i}() {{\n    let value = {i};\n    println!(\"{{value}}\");\n}}\n\n"
            ));
        }
        let chunks = chunk_code(&source, 120);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.kind == ChunkKind::Code);
            assert!(chunk.token_count <= 120 + 1);
        }
    }

    #[test]
    fn token_estimate_tracks_word_count() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("three small words"), 4);
        assert!(estimate_tokens(&paragraph(750)) >= 1000);
    }
}
