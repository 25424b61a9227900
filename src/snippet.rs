//! Bounded excerpt extraction around a match offset. The result is a
//! single whitespace-joined line of 25-45 whole words containing the
//! match, identical for identical inputs.

const WINDOW_RADIUS_BYTES: usize = 260;
const MIN_WORDS: usize = 25;
const MAX_WORDS: usize = 45;

/// Excerpt centered on `center` (a byte offset into `text`, clamped if
/// out of bounds). Words are never split; multi-byte chars are never
/// cut because selection happens on whole words only.
pub fn snippet_around(text: &str, center: usize) -> String {
    let words = collect_words(text);
    if words.is_empty() {
        return String::new();
    }

    let center = center.min(text.len());
    let target = word_index_for_offset(&words, center);

    let window_start = center.saturating_sub(WINDOW_RADIUS_BYTES);
    let window_end = (center + WINDOW_RADIUS_BYTES).min(text.len());

    // Words fully inside the byte window; the target word always stays.
    let mut lo = words
        .iter()
        .position(|(position, word)| *position >= window_start && position + word.len() <= window_end)
        .unwrap_or(target);
    let mut hi = words
        .iter()
        .rposition(|(position, word)| *position >= window_start && position + word.len() <= window_end)
        .map(|index| index + 1)
        .unwrap_or(target + 1);
    lo = lo.min(target);
    hi = hi.max(target + 1);

    // Shrink to the word band, keeping the target roughly centered.
    if hi - lo > MAX_WORDS {
        let half = MAX_WORDS / 2;
        let mut new_lo = target.saturating_sub(half).max(lo);
        let new_hi = (new_lo + MAX_WORDS).min(hi);
        new_lo = new_hi.saturating_sub(MAX_WORDS).max(lo);
        lo = new_lo;
        hi = new_hi;
    }

    // Grow past the byte window when it held too few whole words.
    while hi - lo < MIN_WORDS && (lo > 0 || hi < words.len()) {
        if lo > 0 {
            lo -= 1;
        }
        if hi - lo < MIN_WORDS && hi < words.len() {
            hi += 1;
        }
    }

    words[lo..hi]
        .iter()
        .map(|(_, word)| *word)
        .collect::<Vec<&str>>()
        .join(" ")
}

fn collect_words(text: &str) -> Vec<(usize, &str)> {
    let mut words = Vec::<(usize, &str)>::new();
    let mut cursor = 0usize;

    for word in text.split_whitespace() {
        let position = text[cursor..]
            .find(word)
            .map(|found| found + cursor)
            .unwrap_or(cursor);
        words.push((position, word));
        cursor = position + word.len();
    }

    words
}

/// Index of the word whose span contains `offset`, else the last word
/// starting before it.
fn word_index_for_offset(words: &[(usize, &str)], offset: usize) -> usize {
    let mut index = 0usize;
    for (word_index, (position, word)) in words.iter().enumerate() {
        if *position > offset {
            break;
        }
        index = word_index;
        if offset < position + word.len() {
            break;
        }
    }
    index
}
