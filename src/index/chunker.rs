//! Splits note content into overlapping chunks for embedding.
//!
//! Cuts prefer paragraph, then sentence, then line, then word boundaries
//! within a lookback window; otherwise hard-cut at the target size. Offsets
//! are exact byte offsets into the source, and consecutive chunks repeat
//! `overlap` bytes so no context is lost at a cut.

/// Default chunk size in characters.
pub const DEFAULT_TARGET_SIZE: usize = 2000;

/// Default overlap between consecutive chunks.
pub const DEFAULT_OVERLAP: usize = 200;

/// How far back from the target position to look for a natural boundary.
const BOUNDARY_WINDOW: usize = 200;

/// One chunk of a note: exact byte range plus the literal substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpec {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Split `text` into chunks of roughly `target_size` bytes with `overlap`
/// bytes repeated between consecutive chunks.
///
/// Empty input yields a single empty chunk so an empty note still gets one
/// vector row. Overlap is capped at half the target size to guarantee
/// forward progress.
pub fn chunk(text: &str, target_size: usize, overlap: usize) -> Vec<ChunkSpec> {
    if text.is_empty() {
        return vec![ChunkSpec {
            index: 0,
            start: 0,
            end: 0,
            text: String::new(),
        }];
    }

    let target = target_size.max(1);
    let overlap = overlap.min(target / 2);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = if text.len() - start <= target {
            text.len()
        } else {
            let mut ideal = floor_char_boundary(text, start + target);
            if ideal <= start {
                ideal = ceil_char_boundary(text, start + 1);
            }
            cut_point(text, start, ideal)
        };

        chunks.push(ChunkSpec {
            index: chunks.len(),
            start,
            end,
            text: text[start..end].to_string(),
        });

        if end >= text.len() {
            break;
        }

        let mut next = ceil_char_boundary(text, end.saturating_sub(overlap));
        if next <= start {
            next = end;
        }
        start = next;
    }

    chunks
}

/// Find the best cut position in `(start, ideal]`, preferring paragraph,
/// sentence, line, then word boundaries inside the lookback window.
fn cut_point(text: &str, start: usize, ideal: usize) -> usize {
    let window_start =
        ceil_char_boundary(text, ideal.saturating_sub(BOUNDARY_WINDOW).max(start + 1));
    if window_start >= ideal {
        return ideal;
    }

    let window = &text[window_start..ideal];
    if let Some(pos) = window.rfind("\n\n") {
        return window_start + pos + 2;
    }
    if let Some(pos) = window.rfind(". ") {
        return window_start + pos + 2;
    }
    if let Some(pos) = window.rfind('\n') {
        return window_start + pos + 1;
    }
    if let Some(pos) = window.rfind(' ') {
        return window_start + pos + 1;
    }
    ideal
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
