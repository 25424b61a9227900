//! Pure text comparison primitives: normalization that survives curly
//! quotes and PDF whitespace, and a stopword-filtered tokenizer whose
//! tokens keep their byte offsets into the raw text.

/// Function words plus corpus-generic nouns that occur on nearly every
/// page of the agreement and would otherwise dominate any overlap score.
const STOPWORDS: &[&str] = &[
    "about",
    "above",
    "after",
    "again",
    "agreement",
    "all",
    "and",
    "any",
    "are",
    "article",
    "because",
    "been",
    "before",
    "being",
    "below",
    "between",
    "both",
    "but",
    "can",
    "club",
    "clubs",
    "could",
    "did",
    "does",
    "doing",
    "down",
    "during",
    "each",
    "few",
    "for",
    "from",
    "further",
    "had",
    "has",
    "have",
    "having",
    "her",
    "here",
    "hers",
    "him",
    "his",
    "how",
    "into",
    "its",
    "itself",
    "may",
    "more",
    "most",
    "not",
    "off",
    "once",
    "only",
    "other",
    "our",
    "ours",
    "out",
    "over",
    "own",
    "player",
    "players",
    "same",
    "season",
    "seasons",
    "shall",
    "she",
    "should",
    "some",
    "such",
    "than",
    "that",
    "the",
    "their",
    "theirs",
    "them",
    "then",
    "there",
    "these",
    "they",
    "this",
    "those",
    "through",
    "under",
    "until",
    "upon",
    "very",
    "was",
    "were",
    "what",
    "when",
    "where",
    "which",
    "while",
    "who",
    "whom",
    "why",
    "will",
    "with",
    "would",
    "you",
    "your",
    "yours",
];

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.binary_search(&token).is_ok()
}

/// Normalized text plus, per normalized char, the byte offset of the raw
/// char it came from. Lets exact-match positions in normalized space be
/// mapped back into the raw page text.
#[derive(Debug, Clone)]
pub struct NormalizedText {
    pub text: String,
    offsets: Vec<usize>,
}

impl NormalizedText {
    /// Raw byte offset for a byte position inside `self.text`.
    pub fn raw_offset(&self, normalized_byte: usize) -> Option<usize> {
        if normalized_byte >= self.text.len() {
            return self.offsets.last().copied();
        }
        let char_index = self.text[..normalized_byte].chars().count();
        self.offsets.get(char_index).copied()
    }
}

pub fn normalize(input: &str) -> String {
    normalize_with_offsets(input).text
}

pub fn normalize_with_offsets(input: &str) -> NormalizedText {
    let mut text = String::with_capacity(input.len());
    let mut offsets = Vec::with_capacity(input.len());
    let mut pending_space: Option<usize> = None;

    for (offset, character) in input.char_indices() {
        if character.is_whitespace() {
            if pending_space.is_none() {
                pending_space = Some(offset);
            }
            continue;
        }

        if let Some(space_offset) = pending_space.take() {
            // Leading whitespace is dropped entirely, runs collapse to one.
            if !text.is_empty() {
                text.push(' ');
                offsets.push(space_offset);
            }
        }

        if character == '\u{2026}' {
            for _ in 0..3 {
                text.push('.');
                offsets.push(offset);
            }
            continue;
        }

        for lowered in unify_char(character).to_lowercase() {
            text.push(lowered);
            offsets.push(offset);
        }
    }

    NormalizedText { text, offsets }
}

fn unify_char(character: char) -> char {
    match character {
        '\u{2018}' | '\u{2019}' | '\u{201B}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201F}' => '"',
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' => '-',
        other => other,
    }
}

pub fn condense_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// A comparison token carrying the byte offset of its first char in the
/// raw input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub offset: usize,
}

pub fn tokenize(input: &str) -> Vec<String> {
    tokenize_with_offsets(input)
        .into_iter()
        .map(|token| token.text)
        .collect()
}

pub fn tokenize_with_offsets(input: &str) -> Vec<Token> {
    let mut tokens = Vec::<Token>::new();
    let mut run = Vec::<(usize, char)>::new();

    for (offset, character) in input.char_indices() {
        if is_token_char(character) {
            run.push((offset, character));
            continue;
        }
        flush_token(&mut tokens, &mut run);
    }
    flush_token(&mut tokens, &mut run);

    tokens
}

fn is_token_char(character: char) -> bool {
    character.is_alphanumeric() || is_joiner(character)
}

/// Apostrophes and hyphens are kept only inside a token, never at its
/// edges.
fn is_joiner(character: char) -> bool {
    matches!(
        character,
        '\'' | '\u{2018}' | '\u{2019}' | '-' | '\u{2010}' | '\u{2011}' | '\u{2013}' | '\u{2014}'
    )
}

fn flush_token(tokens: &mut Vec<Token>, run: &mut Vec<(usize, char)>) {
    if run.is_empty() {
        return;
    }

    let mut start = 0usize;
    let mut end = run.len();
    while start < end && is_joiner(run[start].1) {
        start += 1;
    }
    while end > start && is_joiner(run[end - 1].1) {
        end -= 1;
    }

    if end - start >= 3 {
        let offset = run[start].0;
        let mut text = String::with_capacity(end - start);
        for &(_, character) in &run[start..end] {
            for lowered in unify_char(character).to_lowercase() {
                text.push(lowered);
            }
        }

        if !is_stopword(&text) {
            tokens.push(Token { text, offset });
        }
    }

    run.clear();
}

/// Adjacent token pairs joined with a single space.
pub fn bigrams(tokens: &[String]) -> Vec<String> {
    tokens
        .windows(2)
        .map(|pair| format!("{} {}", pair[0], pair[1]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopword_list_is_sorted_for_binary_search() {
        let mut sorted = STOPWORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STOPWORDS);
    }

    #[test]
    fn normalize_unifies_quotes_dashes_and_whitespace() {
        let raw = "\u{201C}Player\u{2019}s\u{201D}  rights \u{2014}\nhere\u{2026}";
        assert_eq!(normalize(raw), "\"player's\" rights - here...");
    }

    #[test]
    fn normalize_trims_leading_and_trailing_whitespace() {
        assert_eq!(normalize("  three  words  "), "three words");
    }

    #[test]
    fn raw_offset_maps_back_into_the_raw_text() {
        let raw = "AAA\u{2014}BBB   ccc";
        let normalized = normalize_with_offsets(raw);
        assert_eq!(normalized.text, "aaa-bbb ccc");

        let position = normalized.text.find("ccc").unwrap();
        let raw_position = normalized.raw_offset(position).unwrap();
        assert_eq!(&raw[raw_position..raw_position + 3], "ccc");
    }

    #[test]
    fn raw_offset_handles_multibyte_source_chars() {
        let raw = "caf\u{e9} \u{2014} option";
        let normalized = normalize_with_offsets(raw);
        let position = normalized.text.find("option").unwrap();
        let raw_position = normalized.raw_offset(position).unwrap();
        assert_eq!(&raw[raw_position..raw_position + 6], "option");
    }

    #[test]
    fn tokenize_drops_short_tokens_and_stopwords() {
        let tokens = tokenize("The Player may be optioned to a Club");
        assert_eq!(tokens, vec!["optioned".to_string()]);
    }

    #[test]
    fn tokenize_keeps_internal_apostrophes_and_hyphens() {
        let tokens = tokenize("the Commissioner\u{2019}s ten-day notice");
        assert_eq!(
            tokens,
            vec![
                "commissioner's".to_string(),
                "ten-day".to_string(),
                "notice".to_string()
            ]
        );
    }

    #[test]
    fn tokenize_trims_edge_joiners() {
        let tokens = tokenize("-optioned- 'salary'");
        assert_eq!(tokens, vec!["optioned".to_string(), "salary".to_string()]);
    }

    #[test]
    fn token_offsets_point_at_the_raw_input() {
        let raw = "no Player shall be optioned";
        let tokens = tokenize_with_offsets(raw);
        let optioned = tokens.iter().find(|t| t.text == "optioned").unwrap();
        assert_eq!(&raw[optioned.offset..optioned.offset + 8], "optioned");
    }

    #[test]
    fn bigrams_join_adjacent_tokens() {
        let tokens = vec![
            "optional".to_string(),
            "assignment".to_string(),
            "limit".to_string(),
        ];
        assert_eq!(
            bigrams(&tokens),
            vec![
                "optional assignment".to_string(),
                "assignment limit".to_string()
            ]
        );
    }
}
