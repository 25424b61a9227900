//! The citation rewriter. Takes the model's free-text answer plus the
//! original question, throws away every page number the model claimed,
//! and re-derives citations from the document itself: excerpt quotes are
//! located verbatim-or-fuzzy, and when no quote survives a BM25 fallback
//! picks topically consistent pages. The rewritten answer always comes
//! back; verified links are layered on, never a precondition.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::locate::locate;
use crate::model::{
    ExcerptItem, MatchKind, MatchResult, RewrittenAnswer, SectionRange, SourceBullet, Tuning,
};
use crate::rank::{
    anchor_offset, build_query_terms, document_frequencies, rank_pages, rare_gate_terms,
};
use crate::sections::{range_for_label, range_for_page};
use crate::snippet::snippet_around;
use crate::store::DocumentPageStore;
use crate::text::tokenize;

const SOURCES_HEADER: &str = "Sources:";
const NOT_FOUND_MARKER: &str = "Sources: no supporting page found in the agreement text.";
const MAX_BLOCK_ITEMS: usize = 4;
const MIN_QUOTE_CHARS: usize = 12;

fn excerpt_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[ \t]*(?:source|supporting)?[ \t]*excerpts?[ \t]*:?[ \t]*$")
            .expect("excerpt header pattern is valid")
    })
}

fn inline_entry_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^[ \t]*(?:\d+[ \t]*[.):][ \t]*)?([^"\u{201C}\u{201D}\n]{0,80}?)[ \t]*(?:[-\u{2013}\u{2014}:][ \t]*)?["\u{201C}](.{1,400}?)["\u{201D}][ \t]*(?:\(pp?\.?[ \t]*\d+(?:[-\u{2013}]\d+)?\))?[ \t]*$"#,
        )
        .expect("inline entry pattern is valid")
    })
}

fn label_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^[ \t]*(?:\d+[ \t]*[.)][ \t]*)?((?:article|appendix|attachment|section)[ \t]+\S[^\n]{0,60}?)[ \t]*:?[ \t]*$",
        )
        .expect("label line pattern is valid")
    })
}

fn quote_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^[ \t]*["\u{201C}](.{1,400}?)["\u{201D}][ \t]*(?:\(pp?\.?[ \t]*\d+(?:[-\u{2013}]\d+)?\))?[ \t]*$"#,
        )
        .expect("quote line pattern is valid")
    })
}

// The snippet group is greedy to the last closing quote: snippets are
// verbatim page text and may themselves contain double quotes.
fn our_bullet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^[ \t]*-[ \t]*Page[ \t]+(\d+)[ \t]+\([^)]*#page=\d+\)[ \t]+\u{2014}[ \t]+"(.+)"(?:[ \t]+\u{2014}[ \t]+(.+?))?[ \t]*$"#,
        )
        .expect("bullet pattern is valid")
    })
}

fn primary_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^See\b.*#page=\d+\)\.[ \t]*$").expect("primary line pattern is valid")
    })
}

fn trailing_citation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[ \t]*\(?[ \t]*(?:sources?|citations?)[ \t]*[:\-][^\n]*$")
            .expect("trailing citation pattern is valid")
    })
}

/// Page hints like `(p. 84)` embedded in labels are always discarded.
fn page_hint_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\(pp?\.?[ \t]*\d+(?:[-\u{2013}]\d+)?\)").expect("page hint pattern is valid")
    })
}

#[derive(Debug, Clone)]
struct ParsedAnswer {
    body: String,
    items: Vec<ExcerptItem>,
}

/// The orchestrator. Infallible once the store is loaded: resolution
/// failures degrade to the ranking fallback, and total failure returns
/// the original prose with an explicit not-found marker instead of an
/// invented page.
pub fn attach_verification(
    store: &DocumentPageStore,
    ranges: &[SectionRange],
    answer_text: &str,
    question_text: &str,
    doc_link: &str,
    tuning: &Tuning,
) -> RewrittenAnswer {
    let parsed = parse_answer(answer_text);

    let mut results = Vec::<MatchResult>::new();
    let mut cited_pages = HashSet::<u32>::new();
    for item in &parsed.items {
        if results.len() == tuning.max_bullets {
            break;
        }
        let preferred = range_for_label(ranges, &item.label);
        if let Some(hit) = locate(store, ranges, &item.quote, preferred, tuning)
            && cited_pages.insert(hit.page)
        {
            results.push(hit);
        }
    }

    if results.is_empty() {
        results = fallback_results(store, ranges, &parsed.body, question_text, tuning);
        results.truncate(tuning.max_bullets);
    }

    render(&parsed.body, &results, doc_link)
}

/// Ranking fallback: the top-ranked page anchors the answer, and only
/// pages inside the same section range may join it, so one answer never
/// mixes pages from unrelated sections.
fn fallback_results(
    store: &DocumentPageStore,
    ranges: &[SectionRange],
    answer_body: &str,
    question_text: &str,
    tuning: &Tuning,
) -> Vec<MatchResult> {
    let query = build_query_terms(question_text, answer_body);
    let ranked = rank_pages(store, ranges, &query, tuning);
    let Some(top) = ranked.first() else {
        return Vec::new();
    };

    let home_range = range_for_page(ranges, top.page);
    let page_terms: Vec<Vec<String>> = store
        .pages()
        .iter()
        .map(|page| tokenize(&page.text))
        .collect();
    let frequencies = document_frequencies(&page_terms, &query.unigrams);
    let gate_terms = rare_gate_terms(&query, &frequencies);
    let query_set: HashSet<&str> = query.unigrams.iter().map(String::as_str).collect();

    ranked
        .iter()
        .filter(|entry| match home_range {
            Some(range) => range.contains(entry.page),
            None => entry.page == top.page,
        })
        .filter_map(|entry| {
            let page = store.page(entry.page)?;
            let anchor = anchor_offset(&page.text, &gate_terms, &query_set);
            Some(MatchResult {
                page: page.number,
                char_offset: anchor,
                kind: MatchKind::Fuzzy,
                snippet: snippet_around(&page.text, anchor),
                heading: range_for_page(ranges, page.number).map(|range| range.heading.clone()),
            })
        })
        .collect()
}

/// Strip every citation artifact (ours from a previous pass, or the
/// model's) out of the answer, harvesting excerpt items along the way.
fn parse_answer(answer_text: &str) -> ParsedAnswer {
    let lines: Vec<&str> = answer_text.lines().collect();
    let mut kept = Vec::<String>::new();
    let mut items = Vec::<ExcerptItem>::new();
    let mut index = 0usize;

    while index < lines.len() {
        let line = lines[index];
        let trimmed = line.trim();

        if trimmed == NOT_FOUND_MARKER || primary_line_regex().is_match(trimmed) {
            index += 1;
            continue;
        }

        if trimmed == SOURCES_HEADER {
            index += 1;
            while index < lines.len() {
                let candidate = lines[index].trim();
                if candidate.is_empty() {
                    index += 1;
                    continue;
                }
                let Some(captures) = our_bullet_regex().captures(candidate) else {
                    break;
                };
                let quote = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
                let label = captures.get(3).map(|m| m.as_str()).unwrap_or_default();
                push_item(&mut items, label, quote);
                index += 1;
            }
            continue;
        }

        if excerpt_header_regex().is_match(line) {
            index += 1;
            let mut block_items = 0usize;
            while index < lines.len() && block_items < MAX_BLOCK_ITEMS {
                let candidate = lines[index];
                if candidate.trim().is_empty() {
                    index += 1;
                    continue;
                }

                if let Some(captures) = inline_entry_regex().captures(candidate) {
                    let label = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
                    let quote = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
                    if push_item(&mut items, label, quote) {
                        block_items += 1;
                    }
                    index += 1;
                    continue;
                }

                if let Some(label_captures) = label_line_regex().captures(candidate)
                    && index + 1 < lines.len()
                    && let Some(quote_captures) = quote_line_regex().captures(lines[index + 1])
                {
                    let label = label_captures.get(1).map(|m| m.as_str()).unwrap_or_default();
                    let quote = quote_captures.get(1).map(|m| m.as_str()).unwrap_or_default();
                    if push_item(&mut items, label, quote) {
                        block_items += 1;
                    }
                    index += 2;
                    continue;
                }

                break;
            }
            continue;
        }

        kept.push(line.to_string());
        index += 1;
    }

    // Trailing "Source: ..." style lines the model tacked on.
    while let Some(last) = kept.iter().rposition(|line| !line.trim().is_empty()) {
        if trailing_citation_regex().is_match(kept[last].trim()) {
            kept.truncate(last);
        } else {
            break;
        }
    }

    ParsedAnswer {
        body: kept.join("\n").trim().to_string(),
        items,
    }
}

fn push_item(items: &mut Vec<ExcerptItem>, label: &str, quote: &str) -> bool {
    let quote = quote.trim();
    if quote.chars().count() < MIN_QUOTE_CHARS {
        return false;
    }

    let label = page_hint_regex().replace_all(label, "");
    let label = label
        .trim()
        .trim_end_matches(['-', '\u{2013}', '\u{2014}', ':', ','])
        .trim()
        .to_string();

    items.push(ExcerptItem {
        label,
        quote: quote.to_string(),
    });
    true
}

fn render(body: &str, results: &[MatchResult], doc_link: &str) -> RewrittenAnswer {
    if results.is_empty() {
        return RewrittenAnswer {
            text: format!("{body}\n\n{NOT_FOUND_MARKER}"),
            primary_page: None,
            bullets: Vec::new(),
        };
    }

    let bullets: Vec<SourceBullet> = results
        .iter()
        .map(|result| SourceBullet {
            page: result.page,
            link: format!("{doc_link}#page={}", result.page),
            snippet: result.snippet.clone(),
            heading: result.heading.clone(),
        })
        .collect();

    let primary = &bullets[0];
    let primary_line = match &primary.heading {
        Some(heading) => format!(
            "See {heading}, page {} ({}).",
            primary.page, primary.link
        ),
        None => format!("See page {} ({}).", primary.page, primary.link),
    };

    let mut text = format!("{body}\n\n{primary_line}\n\n{SOURCES_HEADER}\n");
    for bullet in &bullets {
        text.push_str(&format!(
            "- Page {} ({}) \u{2014} \"{}\"",
            bullet.page, bullet.link, bullet.snippet
        ));
        if let Some(heading) = &bullet.heading {
            text.push_str(&format!(" \u{2014} {heading}"));
        }
        text.push('\n');
    }

    RewrittenAnswer {
        text: text.trim_end().to_string(),
        primary_page: Some(primary.page),
        bullets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Page;
    use crate::sections::build_section_ranges;

    const DOC_LINK: &str = "/mlb/MLB_CBA_2022.pdf";

    fn optioned_store() -> (DocumentPageStore, Vec<SectionRange>) {
        let filler = "general provisions about scheduling travel accommodations and meal allowances repeated across many paragraphs of this page ".repeat(3);
        let store = DocumentPageStore::from_pages(vec![
            Page {
                number: 83,
                text: format!("ARTICLE XVIII\u{2014}Grievance Procedure\n{filler}"),
            },
            Page {
                number: 84,
                text: format!(
                    "ARTICLE XIX\u{2014}Optional Assignments\nSubject to the provisions hereof, a Player may be optioned in not more than three separate championship seasons, and recall from such assignment follows the notice rules stated below. {filler}"
                ),
            },
            Page {
                number: 85,
                text: format!("Continued optional assignment rules and recall procedure. {filler}"),
            },
        ]);
        let ranges = build_section_ranges(store.pages());
        (store, ranges)
    }

    #[test]
    fn scenario_article_xix_resolves_to_page_84() {
        let (store, ranges) = optioned_store();
        let answer = "A player may be optioned in up to three separate seasons.\n\nExcerpts:\n1. Article XIX \u{2014} \"may be optioned in not more than three separate championship seasons\" (p. 12)";

        let rewritten = attach_verification(
            &store,
            &ranges,
            answer,
            "How many option years does a player get?",
            DOC_LINK,
            &Tuning::default(),
        );

        assert_eq!(rewritten.primary_page, Some(84));
        assert!(rewritten.text.contains("#page=84"));
        assert!(
            rewritten
                .text
                .contains("ARTICLE XIX\u{2014}Optional Assignments")
        );
        assert!(rewritten.bullets[0].snippet.contains("championship"));
        // The model's own page hint is discarded, never echoed.
        assert!(!rewritten.text.contains("p. 12"));
        assert!(!rewritten.text.contains("#page=12"));
    }

    #[test]
    fn second_pass_resolves_the_same_pages() {
        let (store, ranges) = optioned_store();
        let answer = "A player may be optioned in up to three separate seasons.\n\nExcerpts:\nArticle XIX: \"may be optioned in not more than three separate championship seasons\"";
        let question = "How many option years does a player get?";
        let tuning = Tuning::default();

        let first = attach_verification(&store, &ranges, answer, question, DOC_LINK, &tuning);
        let second = attach_verification(&store, &ranges, &first.text, question, DOC_LINK, &tuning);

        let first_pages: Vec<u32> = first.bullets.iter().map(|b| b.page).collect();
        let second_pages: Vec<u32> = second.bullets.iter().map(|b| b.page).collect();
        assert_eq!(first_pages, second_pages);
        assert_eq!(first.primary_page, second.primary_page);
    }

    #[test]
    fn cited_snippets_are_substrings_of_the_cited_page() {
        let (store, ranges) = optioned_store();
        let answer = "Answer prose.\n\nExcerpts:\n1. Article XIX \u{2014} \"may be optioned in not more than three separate championship seasons\"";

        let rewritten = attach_verification(
            &store,
            &ranges,
            answer,
            "option years",
            DOC_LINK,
            &Tuning::default(),
        );

        for bullet in &rewritten.bullets {
            let page = store.page(bullet.page).unwrap();
            let page_condensed = crate::text::condense_whitespace(&page.text);
            assert!(
                page_condensed.contains(&bullet.snippet),
                "snippet not on page {}",
                bullet.page
            );
        }
    }

    #[test]
    fn snippets_keep_page_double_quotes_verbatim_across_passes() {
        let filler = "further provisions on assignment notices and related recall procedure follow in the numbered paragraphs of this section ".repeat(3);
        let store = DocumentPageStore::from_pages(vec![Page {
            number: 84,
            text: format!(
                "ARTICLE XIX\u{2014}Optional Assignments\nFor these purposes the phrase \"optional assignment\" covers each assignment of the Player to the Minor Leagues, and recall rights attach immediately upon notice. {filler}"
            ),
        }]);
        let ranges = build_section_ranges(store.pages());
        let answer = "Option rules cover each minor league assignment.\n\nExcerpts:\n1. Article XIX \u{2014} \"covers each assignment of the Player to the Minor Leagues\"";
        let question = "what does an optional assignment cover?";
        let tuning = Tuning::default();

        let first = attach_verification(&store, &ranges, answer, question, DOC_LINK, &tuning);
        assert_eq!(first.primary_page, Some(84));
        assert!(first.bullets[0].snippet.contains("\"optional assignment\""));
        let page_condensed = crate::text::condense_whitespace(&store.page(84).unwrap().text);
        assert!(page_condensed.contains(&first.bullets[0].snippet));

        let second = attach_verification(&store, &ranges, &first.text, question, DOC_LINK, &tuning);
        assert_eq!(second.primary_page, Some(84));
        assert_eq!(
            second.bullets.iter().map(|b| b.page).collect::<Vec<u32>>(),
            first.bullets.iter().map(|b| b.page).collect::<Vec<u32>>()
        );
    }

    #[test]
    fn fallback_ranking_stays_within_one_section_range() {
        let (store, ranges) = optioned_store();
        let answer = "Players are recalled from optional assignment under notice rules.";

        let rewritten = attach_verification(
            &store,
            &ranges,
            answer,
            "What are the optional assignment recall rules?",
            DOC_LINK,
            &Tuning::default(),
        );

        assert!(!rewritten.bullets.is_empty());
        let home = range_for_page(&ranges, rewritten.bullets[0].page).unwrap();
        for bullet in &rewritten.bullets {
            assert!(home.contains(bullet.page));
        }
    }

    #[test]
    fn malformed_excerpt_block_falls_back_to_ranking() {
        let (store, ranges) = optioned_store();
        let answer =
            "Recall from optional assignment follows notice rules.\n\nExcerpts:\nnot a parsable entry at all";

        let rewritten = attach_verification(
            &store,
            &ranges,
            answer,
            "optional assignment recall notice",
            DOC_LINK,
            &Tuning::default(),
        );

        assert!(rewritten.primary_page.is_some());
        assert!(rewritten.text.contains("#page="));
    }

    #[test]
    fn nothing_resolvable_returns_marker_not_a_page() {
        let store = DocumentPageStore::from_pages(vec![Page {
            number: 1,
            text: "scheduling travel accommodations meals".to_string(),
        }]);

        let rewritten = attach_verification(
            &store,
            &[],
            "The answer discusses quantum chromodynamics.",
            "what about quarks?",
            DOC_LINK,
            &Tuning::default(),
        );

        assert_eq!(rewritten.primary_page, None);
        assert!(rewritten.bullets.is_empty());
        assert!(rewritten.text.contains(NOT_FOUND_MARKER));
        assert!(
            rewritten
                .text
                .contains("The answer discusses quantum chromodynamics.")
        );
        assert!(!rewritten.text.contains("#page="));
    }

    #[test]
    fn model_citation_lines_are_stripped_and_recomputed() {
        let (store, ranges) = optioned_store();
        let answer = "A player gets three option seasons.\n\nExcerpts:\n1. Article XIX \u{2014} \"may be optioned in not more than three separate championship seasons\"\n\nSource: Article XIX, p. 99";

        let rewritten = attach_verification(
            &store,
            &ranges,
            answer,
            "option years",
            DOC_LINK,
            &Tuning::default(),
        );

        assert!(!rewritten.text.contains("p. 99"));
        assert_eq!(rewritten.primary_page, Some(84));
    }

    #[test]
    fn duplicate_resolutions_collapse_to_one_bullet() {
        let (store, ranges) = optioned_store();
        let answer = "Prose.\n\nExcerpts:\n1. Article XIX \u{2014} \"may be optioned in not more than three separate championship seasons\"\n2. Article XIX \u{2014} \"optioned in not more than three separate championship seasons, and recall\"";

        let rewritten = attach_verification(
            &store,
            &ranges,
            answer,
            "option years",
            DOC_LINK,
            &Tuning::default(),
        );

        assert_eq!(rewritten.bullets.len(), 1);
        assert_eq!(rewritten.bullets[0].page, 84);
    }

    #[test]
    fn parse_tolerates_numbered_and_unnumbered_entries() {
        let answer = "Body.\n\nExcerpts:\n1. Article IX \u{2014} \"first excerpt quote text here\"\nArticle X: \"second excerpt quote text here\"\nSection 3(b)\n\"third excerpt quote text here\" (p. 4)";
        let parsed = parse_answer(answer);

        assert_eq!(parsed.body, "Body.");
        assert_eq!(parsed.items.len(), 3);
        assert_eq!(parsed.items[0].label, "Article IX");
        assert_eq!(parsed.items[0].quote, "first excerpt quote text here");
        assert_eq!(parsed.items[1].label, "Article X");
        assert_eq!(parsed.items[2].label, "Section 3(b)");
        assert_eq!(parsed.items[2].quote, "third excerpt quote text here");
    }

    #[test]
    fn parse_drops_too_short_quotes() {
        let answer = "Body.\n\nExcerpts:\n1. Article IX \u{2014} \"too short\"";
        let parsed = parse_answer(answer);
        assert!(parsed.items.is_empty());
    }

    #[test]
    fn parse_reads_back_our_own_sources_block() {
        let rendered = "Body prose.\n\nSee ARTICLE XIX\u{2014}Optional Assignments, page 84 (/mlb/MLB_CBA_2022.pdf#page=84).\n\nSources:\n- Page 84 (/mlb/MLB_CBA_2022.pdf#page=84) \u{2014} \"may be optioned in not more than three separate championship seasons\" \u{2014} ARTICLE XIX\u{2014}Optional Assignments";
        let parsed = parse_answer(rendered);

        assert_eq!(parsed.body, "Body prose.");
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(
            parsed.items[0].label,
            "ARTICLE XIX\u{2014}Optional Assignments"
        );
        assert!(parsed.items[0].quote.starts_with("may be optioned"));
    }
}
