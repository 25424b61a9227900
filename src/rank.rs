//! BM25-style page ranking used when no verbatim quote survives. The
//! hard rare-term gate excludes any page lacking every one of the one or
//! two rarest query terms; common-word volume alone can never win.

use std::collections::{HashMap, HashSet};

use crate::model::{SectionRange, Tuning};
use crate::store::DocumentPageStore;
use crate::text::{bigrams, tokenize, tokenize_with_offsets};

#[derive(Debug, Clone)]
pub struct RankedPage {
    pub page: u32,
    pub score: f64,
}

/// Query terms shared between scoring and the fallback snippet anchor.
#[derive(Debug, Clone)]
pub struct QueryTerms {
    pub unigrams: Vec<String>,
    pub bigrams: Vec<String>,
}

pub fn build_query_terms(question_text: &str, answer_text: &str) -> QueryTerms {
    let question_tokens = tokenize(question_text);
    let answer_tokens = tokenize(answer_text);

    let mut unigrams = Vec::<String>::new();
    let mut seen = HashSet::<String>::new();
    for token in question_tokens.iter().chain(answer_tokens.iter()) {
        if seen.insert(token.clone()) {
            unigrams.push(token.clone());
        }
    }

    // Bigrams built per source so no pair bridges question and answer.
    let mut pair_seen = HashSet::<String>::new();
    let mut pairs = Vec::<String>::new();
    for pair in bigrams(&question_tokens)
        .into_iter()
        .chain(bigrams(&answer_tokens))
    {
        if pair_seen.insert(pair.clone()) {
            pairs.push(pair);
        }
    }

    QueryTerms {
        unigrams,
        bigrams: pairs,
    }
}

pub fn rank_pages(
    store: &DocumentPageStore,
    ranges: &[SectionRange],
    query: &QueryTerms,
    tuning: &Tuning,
) -> Vec<RankedPage> {
    let pages = store.pages();
    if pages.is_empty() || query.unigrams.is_empty() {
        return Vec::new();
    }

    let page_tokens: Vec<Vec<String>> = pages.iter().map(|page| tokenize(&page.text)).collect();
    let page_bigrams: Vec<Vec<String>> = page_tokens.iter().map(|tokens| bigrams(tokens)).collect();

    let unigram_df = document_frequencies(&page_tokens, &query.unigrams);
    let bigram_df = document_frequencies(&page_bigrams, &query.bigrams);

    let total = pages.len() as f64;
    let average_length =
        page_tokens.iter().map(Vec::len).sum::<usize>() as f64 / pages.len() as f64;

    let gate_terms = rare_gate_terms(query, &unigram_df);
    let opening_pages: HashSet<u32> = ranges.iter().map(|range| range.start).collect();

    let mut ranked = Vec::<RankedPage>::new();
    for (index, page) in pages.iter().enumerate() {
        let tokens = &page_tokens[index];
        if !passes_rare_term_gate(tokens, &gate_terms) {
            continue;
        }

        let length = tokens.len() as f64;
        let mut score = bm25_component(
            tokens,
            &query.unigrams,
            &unigram_df,
            total,
            length,
            average_length,
            tuning,
        );
        score += tuning.bigram_weight
            * bm25_component(
                &page_bigrams[index],
                &query.bigrams,
                &bigram_df,
                total,
                length.max(1.0),
                average_length,
                tuning,
            );
        if opening_pages.contains(&page.number) {
            score += tuning.heading_bonus;
        }

        if score > 0.0 {
            ranked.push(RankedPage {
                page: page.number,
                score,
            });
        }
    }

    ranked.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then(left.page.cmp(&right.page))
    });

    let Some(top) = ranked.first().map(|entry| entry.score) else {
        return ranked;
    };
    let floor = top * (1.0 - tuning.score_band);
    ranked.retain(|entry| entry.score >= floor);
    ranked.truncate(tuning.max_candidates);
    ranked
}

/// The one or two highest-idf query unigrams that occur somewhere in the
/// corpus. Empty when no query term occurs at all.
pub fn rare_gate_terms(query: &QueryTerms, unigram_df: &HashMap<String, usize>) -> Vec<String> {
    let mut present: Vec<(&String, usize)> = query
        .unigrams
        .iter()
        .filter_map(|term| {
            let df = *unigram_df.get(term).unwrap_or(&0);
            (df > 0).then_some((term, df))
        })
        .collect();

    // Lowest document frequency first; ties stay in query order.
    present.sort_by_key(|(_, df)| *df);
    present
        .into_iter()
        .take(2)
        .map(|(term, _)| term.clone())
        .collect()
}

pub fn document_frequencies(
    page_terms: &[Vec<String>],
    query_terms: &[String],
) -> HashMap<String, usize> {
    let wanted: HashSet<&str> = query_terms.iter().map(String::as_str).collect();
    let mut frequencies = HashMap::<String, usize>::new();

    for terms in page_terms {
        let mut seen = HashSet::<&str>::new();
        for term in terms {
            if wanted.contains(term.as_str()) && seen.insert(term.as_str()) {
                *frequencies.entry(term.clone()).or_insert(0) += 1;
            }
        }
    }

    frequencies
}

/// Deterministic snippet anchor for a ranked page: the first occurrence
/// of a rare gate term, else of any query term, else the page start.
pub fn anchor_offset(page_text: &str, gate_terms: &[String], query_set: &HashSet<&str>) -> usize {
    let tokens = tokenize_with_offsets(page_text);

    tokens
        .iter()
        .find(|token| gate_terms.iter().any(|gate| gate == &token.text))
        .or_else(|| {
            tokens
                .iter()
                .find(|token| query_set.contains(token.text.as_str()))
        })
        .map(|token| token.offset)
        .unwrap_or(0)
}

fn passes_rare_term_gate(tokens: &[String], gate_terms: &[String]) -> bool {
    if gate_terms.is_empty() {
        return true;
    }
    tokens
        .iter()
        .any(|token| gate_terms.iter().any(|gate| gate == token))
}

fn bm25_component(
    terms: &[String],
    query_terms: &[String],
    frequencies: &HashMap<String, usize>,
    total_pages: f64,
    length: f64,
    average_length: f64,
    tuning: &Tuning,
) -> f64 {
    if query_terms.is_empty() || terms.is_empty() {
        return 0.0;
    }

    let mut counts = HashMap::<&str, usize>::new();
    for term in terms {
        *counts.entry(term.as_str()).or_insert(0) += 1;
    }

    let mut score = 0.0;
    for query_term in query_terms {
        let term_frequency = *counts.get(query_term.as_str()).unwrap_or(&0) as f64;
        if term_frequency == 0.0 {
            continue;
        }
        let document_frequency = *frequencies.get(query_term).unwrap_or(&0) as f64;

        let idf = (1.0 + (total_pages - document_frequency + 0.5) / (document_frequency + 0.5)).ln();
        let norm = term_frequency
            + tuning.bm25_k1 * (1.0 - tuning.bm25_b + tuning.bm25_b * length / average_length);
        score += idf * term_frequency * (tuning.bm25_k1 + 1.0) / norm;
    }

    score
}
