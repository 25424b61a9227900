//! The quote locator: pin a short verbatim phrase to a page and offset.
//!
//! Layered policy, each stage tried only when the previous found
//! nothing: exact normalized substring inside the preferred section,
//! fuzzy token-window inside the preferred section, then both again over
//! the whole document. The caller's section guess narrows the search but
//! is never trusted over the document itself.

use std::collections::{HashMap, HashSet};

use crate::model::{MatchKind, MatchResult, Page, SectionRange, Tuning};
use crate::sections::range_for_page;
use crate::snippet::snippet_around;
use crate::store::DocumentPageStore;
use crate::text::{normalize, normalize_with_offsets, tokenize, tokenize_with_offsets};

const MIN_WINDOW_TOKENS: usize = 6;
const MAX_WINDOW_TOKENS: usize = 42;

pub fn locate(
    store: &DocumentPageStore,
    ranges: &[SectionRange],
    quote: &str,
    preferred: Option<&SectionRange>,
    tuning: &Tuning,
) -> Option<MatchResult> {
    let needle = normalize(quote);
    if needle.is_empty() {
        return None;
    }

    let mut quote_tokens = tokenize(quote);
    quote_tokens.sort();
    quote_tokens.dedup();

    if let Some(range) = preferred {
        let scoped = pages_in_range(store, range);
        if let Some(hit) = exact_search(&scoped, ranges, &needle) {
            return Some(hit);
        }
        if let Some(hit) = fuzzy_search(&scoped, ranges, &quote_tokens, tuning) {
            return Some(hit);
        }
    }

    let all = store.pages().iter().collect::<Vec<&Page>>();
    exact_search(&all, ranges, &needle)
        .or_else(|| fuzzy_search(&all, ranges, &quote_tokens, tuning))
}

fn pages_in_range<'a>(store: &'a DocumentPageStore, range: &SectionRange) -> Vec<&'a Page> {
    store
        .pages()
        .iter()
        .filter(|page| range.contains(page.number))
        .collect()
}

fn exact_search(pages: &[&Page], ranges: &[SectionRange], needle: &str) -> Option<MatchResult> {
    for page in pages {
        let normalized = normalize_with_offsets(&page.text);
        let Some(position) = normalized.text.find(needle) else {
            continue;
        };
        let char_offset = normalized.raw_offset(position).unwrap_or(0);

        return Some(MatchResult {
            page: page.number,
            char_offset,
            kind: MatchKind::Exact,
            snippet: snippet_around(&page.text, char_offset),
            heading: range_for_page(ranges, page.number).map(|range| range.heading.clone()),
        });
    }

    None
}

/// Best sliding token window across the candidate pages; accepted only
/// when it covers at least `fuzzy_overlap` of the quote's tokens.
fn fuzzy_search(
    pages: &[&Page],
    ranges: &[SectionRange],
    quote_tokens: &[String],
    tuning: &Tuning,
) -> Option<MatchResult> {
    if quote_tokens.is_empty() {
        return None;
    }

    let window_size = MIN_WINDOW_TOKENS.max((quote_tokens.len() + 6).min(MAX_WINDOW_TOKENS));
    let needed = tuning.fuzzy_overlap * quote_tokens.len() as f64;
    let quote_set: HashSet<&str> = quote_tokens.iter().map(String::as_str).collect();

    let mut best: Option<(usize, u32, usize)> = None;

    for page in pages {
        let page_tokens = tokenize_with_offsets(&page.text);
        if page_tokens.is_empty() {
            continue;
        }

        // Incremental distinct-overlap count over the sliding window.
        let mut counts = HashMap::<&str, usize>::new();
        let mut matched = 0usize;

        for index in 0..page_tokens.len() {
            let token = page_tokens[index].text.as_str();
            if quote_set.contains(token) {
                let entry = counts.entry(token).or_insert(0);
                if *entry == 0 {
                    matched += 1;
                }
                *entry += 1;
            }

            if index >= window_size {
                let expired = page_tokens[index - window_size].text.as_str();
                if quote_set.contains(expired) {
                    if let Some(entry) = counts.get_mut(expired) {
                        *entry -= 1;
                        if *entry == 0 {
                            matched -= 1;
                        }
                    }
                }
            }

            let window_start = index.saturating_sub(window_size.saturating_sub(1));
            let better = match best {
                Some((best_matched, _, _)) => matched > best_matched,
                None => matched > 0,
            };
            if better {
                best = Some((matched, page.number, page_tokens[window_start].offset));
            }
        }
    }

    let (matched, page_number, char_offset) = best?;
    if (matched as f64) < needed {
        return None;
    }

    let page = pages.iter().find(|page| page.number == page_number)?;
    Some(MatchResult {
        page: page_number,
        char_offset,
        kind: MatchKind::Fuzzy,
        snippet: snippet_around(&page.text, char_offset),
        heading: range_for_page(ranges, page_number).map(|range| range.heading.clone()),
    })
}
