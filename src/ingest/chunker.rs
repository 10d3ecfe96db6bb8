//! Sliding-window text splitter.
//!
//! Deterministic and order-preserving: fixed maximum segment size with a fixed
//! overlap between neighbors, preferring sentence and paragraph boundaries
//! when one falls inside the window.

/// Split text into overlapping segments of at most `max_chars` characters,
/// with `overlap` characters shared between neighbors.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    sliding_window(text, max_chars, overlap)
        .into_iter()
        .map(|(content, _, _)| content)
        .collect()
}

/// Core splitter. Returns (segment_text, start_char, end_char) tuples; offsets
/// are in characters, not bytes, so slicing stays UTF-8 safe.
pub(crate) fn sliding_window(
    text: &str,
    max_chars: usize,
    overlap: usize,
) -> Vec<(String, usize, usize)> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every char boundary, plus the end of the string.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let n_chars = boundaries.len() - 1;

    if n_chars <= max_chars {
        return vec![(text.to_string(), 0, n_chars)];
    }

    let mut segments = Vec::new();
    let mut start = 0;

    while start < n_chars {
        let end = (start + max_chars).min(n_chars);
        let window = &text[boundaries[start]..boundaries[end]];

        let seg_end = if end < n_chars {
            match find_break_point(window) {
                Some(byte_off) => start + window[..byte_off].chars().count(),
                None => end,
            }
        } else {
            end
        };

        let seg_text = text[boundaries[start]..boundaries[seg_end]].trim().to_string();
        if !seg_text.is_empty() {
            segments.push((seg_text, start, seg_end));
        }

        let step = seg_end - start;
        if step <= overlap {
            // Window advanced less than the overlap; skip it to avoid looping.
            start = seg_end;
        } else {
            start = seg_end - overlap;
        }
    }

    segments
}

/// Find a break point near the end of a window, preferring paragraph, then
/// sentence, then weaker boundaries. Returns a byte offset into `window`.
fn find_break_point(window: &str) -> Option<usize> {
    let len = window.len();

    if let Some(pos) = window.rfind("\n\n") {
        if pos > len / 3 {
            return Some(pos + 2);
        }
    }

    for pattern in &[". ", "! ", "? ", ".\n", "!\n", "?\n"] {
        if let Some(pos) = window.rfind(pattern) {
            if pos > len / 3 {
                return Some(pos + pattern.len());
            }
        }
    }

    if let Some(pos) = window.rfind('\n') {
        if pos > len / 3 {
            return Some(pos + 1);
        }
    }

    for pattern in &[", ", "; "] {
        if let Some(pos) = window.rfind(pattern) {
            if pos > len / 2 {
                return Some(pos + pattern.len());
            }
        }
    }

    window.rfind(' ').map(|pos| pos + 1)
}
