use serde::{Deserialize, Serialize};

/// One physical page of the agreement. `number` is the 1-based PDF page,
/// `text` the extracted text layer with line-wrap hyphenation repaired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    #[serde(rename = "page")]
    pub number: u32,
    pub text: String,
}

/// A contiguous span of pages owned by one top-level heading, e.g.
/// "ARTICLE XIX—Optional Assignments" covering pages 84-90.
#[derive(Debug, Clone, Serialize)]
pub struct SectionRange {
    pub start: u32,
    pub end: u32,
    pub heading: String,
}

impl SectionRange {
    pub fn contains(&self, page: u32) -> bool {
        page >= self.start && page <= self.end
    }
}

/// One entry parsed out of the model's structured excerpts block: a
/// section label plus the phrase the model claims is verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcerptItem {
    pub label: String,
    pub quote: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Fuzzy,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
        }
    }
}

/// Where a quote (or ranked page) was pinned down in the document.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub page: u32,
    pub char_offset: usize,
    pub kind: MatchKind,
    pub snippet: String,
    pub heading: Option<String>,
}

/// One rendered source bullet of the rewritten answer.
#[derive(Debug, Clone, Serialize)]
pub struct SourceBullet {
    pub page: u32,
    pub link: String,
    pub snippet: String,
    pub heading: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RewrittenAnswer {
    pub text: String,
    pub primary_page: Option<u32>,
    pub bullets: Vec<SourceBullet>,
}

/// Tunable thresholds for matching and ranking. The defaults were settled
/// empirically against the 2022 Basic Agreement; the caller-facing knobs
/// are surfaced on the CLI rather than hard-coded at call sites.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// Minimum fraction of quote tokens a fuzzy window must share.
    pub fuzzy_overlap: f64,
    /// Keep ranked pages scoring at least `top * (1 - score_band)`.
    pub score_band: f64,
    /// Maximum source bullets emitted per answer.
    pub max_bullets: usize,
    /// Maximum pages surviving the ranking band.
    pub max_candidates: usize,
    pub bm25_k1: f64,
    pub bm25_b: f64,
    /// Bigram matches count this much more than unigram matches.
    pub bigram_weight: f64,
    /// Flat bonus for pages that open a section range.
    pub heading_bonus: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            fuzzy_overlap: 0.55,
            score_band: 0.45,
            max_bullets: 4,
            max_candidates: 5,
            bm25_k1: 1.5,
            bm25_b: 0.75,
            bigram_weight: 1.5,
            heading_bonus: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractCounts {
    pub page_count: usize,
    pub empty_page_count: usize,
    pub dehyphenation_merges: usize,
}

/// Provenance record written next to the page index so a later run can
/// tell which PDF the index was built from.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub pdf_path: String,
    pub pdf_sha256: String,
    pub pdftotext_version: String,
    pub index_path: String,
    pub counts: ExtractCounts,
    pub warnings: Vec<String>,
}
