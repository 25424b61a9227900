//! Top-level heading detection and the page ranges derived from it.
//!
//! A heading only counts when it sits near the top of a page, starts a
//! line, uses the uppercase keyword form, and carries a dash-separated
//! title. The dash requirement is what rejects inline cross-references
//! like "see Article 6(b)" and bare table-of-contents lines.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Page, SectionRange};
use crate::text::condense_whitespace;

/// Only the leading slice of a page is scanned for headings.
const HEADING_SCAN_BYTES: usize = 880;

fn heading_regex() -> &'static Regex {
    static HEADING: OnceLock<Regex> = OnceLock::new();
    HEADING.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*((?:ARTICLE[ \t]+[IVXLCDM]+|APPENDIX[ \t]+[A-Z]{1,3}|ATTACHMENT[ \t]+\d{1,3})[ \t]*[-\u{2013}\u{2014}][ \t]*\S[^\r\n]*)",
        )
        .expect("heading pattern is valid")
    })
}

fn label_regex() -> &'static Regex {
    static LABEL: OnceLock<Regex> = OnceLock::new();
    LABEL.get_or_init(|| {
        Regex::new(r"(?i)\b(article|appendix|attachment)[ \t]+([ivxlcdm]+|[a-z]{1,3}|\d{1,3})\b")
            .expect("label pattern is valid")
    })
}

/// Scan every page top for a heading and turn the hits into contiguous,
/// non-overlapping ranges. Zero detected headings yields an empty list;
/// callers then fall back to whole-document search.
pub fn build_section_ranges(pages: &[Page]) -> Vec<SectionRange> {
    let mut openings = Vec::<(u32, String)>::new();

    for page in pages {
        let Some(heading) = detect_heading(&page.text) else {
            continue;
        };
        openings.push((page.number, heading));
    }

    let last_page = pages.last().map(|page| page.number).unwrap_or(0);
    let mut ranges = Vec::<SectionRange>::with_capacity(openings.len());
    for (index, (start, heading)) in openings.iter().enumerate() {
        let end = openings
            .get(index + 1)
            .map(|(next_start, _)| next_start.saturating_sub(1))
            .unwrap_or(last_page);

        ranges.push(SectionRange {
            start: *start,
            end: end.max(*start),
            heading: heading.clone(),
        });
    }

    ranges
}

/// First qualifying heading in the top-of-page scan window, verbatim.
fn detect_heading(page_text: &str) -> Option<String> {
    let mut scan_end = page_text.len().min(HEADING_SCAN_BYTES);
    while scan_end < page_text.len() && !page_text.is_char_boundary(scan_end) {
        scan_end += 1;
    }

    heading_regex()
        .captures(&page_text[..scan_end])
        .and_then(|captures| captures.get(1))
        .map(|heading| condense_whitespace(heading.as_str()))
}

pub fn range_for_page(ranges: &[SectionRange], page: u32) -> Option<&SectionRange> {
    ranges.iter().find(|range| range.contains(page))
}

/// Best-effort match of a caller-supplied label ("Article XIX",
/// "appendix B") against range headings. Used only to narrow a search,
/// never to decide the final page.
pub fn range_for_label<'a>(ranges: &'a [SectionRange], label: &str) -> Option<&'a SectionRange> {
    let captures = label_regex().captures(label)?;
    let keyword = captures.get(1)?.as_str().to_ascii_uppercase();
    let identifier = captures.get(2)?.as_str().to_ascii_uppercase();
    let prefix = format!("{keyword} {identifier}");

    ranges.iter().find(|range| {
        let heading = condense_whitespace(&range.heading).to_ascii_uppercase();
        heading.strip_prefix(&prefix).is_some_and(|rest| {
            rest.chars()
                .next()
                .is_none_or(|next| !next.is_ascii_alphanumeric())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32, text: &str) -> Page {
        Page {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn heading_at_top_of_page_opens_a_range() {
        let pages = vec![
            page(3, "ARTICLE IV\u{2014}Player Qualifications\nbody text"),
            page(4, "more body"),
            page(5, "ARTICLE V\u{2014}Scheduling\nbody"),
        ];

        let ranges = build_section_ranges(&pages);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].heading, "ARTICLE IV\u{2014}Player Qualifications");
        assert_eq!((ranges[0].start, ranges[0].end), (3, 4));
        assert_eq!((ranges[1].start, ranges[1].end), (5, 5));
    }

    #[test]
    fn inline_cross_reference_does_not_open_a_range() {
        let pages = vec![page(
            10,
            "Body paragraph noting that rights are as defined in Article IV(B)\nand continue.",
        )];
        assert!(build_section_ranges(&pages).is_empty());
    }

    #[test]
    fn heading_without_dash_separated_title_is_rejected() {
        let pages = vec![page(2, "ARTICLE VI\nSome body text")];
        assert!(build_section_ranges(&pages).is_empty());
    }

    #[test]
    fn heading_below_the_scan_window_is_ignored() {
        let mut body = "filler line\n".repeat(90);
        body.push_str("ARTICLE IX\u{2014}Buried Heading\n");
        let pages = vec![page(7, &body)];
        assert!(build_section_ranges(&pages).is_empty());
    }

    #[test]
    fn appendix_and_attachment_headings_are_detected() {
        let pages = vec![
            page(1, "APPENDIX A\u{2014}Uniform Player's Contract\nbody"),
            page(2, "ATTACHMENT 12\u{2013}Notice Form\nbody"),
        ];

        let ranges = build_section_ranges(&pages);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].heading, "APPENDIX A\u{2014}Uniform Player's Contract");
        assert_eq!(ranges[1].heading, "ATTACHMENT 12\u{2013}Notice Form");
    }

    #[test]
    fn zero_headings_yields_empty_ranges_not_an_error() {
        let pages = vec![page(1, "plain text"), page(2, "more plain text")];
        assert!(build_section_ranges(&pages).is_empty());
    }

    #[test]
    fn range_for_label_matches_keyword_and_identifier() {
        let ranges = vec![
            SectionRange {
                start: 10,
                end: 20,
                heading: "ARTICLE X\u{2014}Deferred Compensation".to_string(),
            },
            SectionRange {
                start: 84,
                end: 90,
                heading: "ARTICLE XIX\u{2014}Optional Assignments".to_string(),
            },
        ];

        let hit = range_for_label(&ranges, "Article XIX").unwrap();
        assert_eq!(hit.start, 84);

        // "Article X" must not match the XIX heading by prefix accident.
        let hit = range_for_label(&ranges, "article x").unwrap();
        assert_eq!(hit.start, 10);

        assert!(range_for_label(&ranges, "Article XXVII").is_none());
        assert!(range_for_label(&ranges, "no label here").is_none());
    }

    #[test]
    fn range_for_page_finds_the_owning_range() {
        let ranges = vec![SectionRange {
            start: 84,
            end: 90,
            heading: "ARTICLE XIX\u{2014}Optional Assignments".to_string(),
        }];

        assert_eq!(range_for_page(&ranges, 87).map(|r| r.start), Some(84));
        assert!(range_for_page(&ranges, 91).is_none());
    }
}
