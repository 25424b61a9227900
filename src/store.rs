//! The Document Page Store: the agreement as an ordered, immutable list
//! of (page number, text) pairs. Loaded once per invocation from the
//! prebuilt JSON index when possible, otherwise extracted page by page
//! from the PDF with pdftotext. Constructed explicitly and passed by
//! reference; there is no process-global cache.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{info, warn};

use crate::model::Page;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Neither the prebuilt index nor the PDF could produce pages.
    /// Callers must propagate this; answering from an empty document
    /// would fabricate page-1 citations.
    #[error("document unavailable: {reasons}")]
    DocumentUnavailable { reasons: String },
}

/// Where page text may come from, in preference order.
#[derive(Debug, Clone)]
pub enum PageIndexSource {
    /// JSON array of `{page, text}` objects.
    PrebuiltIndex(PathBuf),
    /// The PDF itself; text is extracted per page via pdftotext.
    RawDocument(PathBuf),
}

impl PageIndexSource {
    fn describe(&self) -> String {
        match self {
            Self::PrebuiltIndex(path) => format!("index {}", path.display()),
            Self::RawDocument(path) => format!("pdf {}", path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentPageStore {
    pages: Vec<Page>,
}

impl DocumentPageStore {
    /// Try each source in order; the first one that yields a non-empty
    /// page list wins.
    pub fn load(sources: &[PageIndexSource]) -> Result<Self, StoreError> {
        let mut reasons = Vec::<String>::new();

        for source in sources {
            let attempt = match source {
                PageIndexSource::PrebuiltIndex(path) => load_prebuilt_index(path),
                PageIndexSource::RawDocument(path) => extract_pages_with_pdftotext(path, None),
            };

            match attempt {
                Ok(pages) if !pages.is_empty() => {
                    info!(
                        source = %source.describe(),
                        page_count = pages.len(),
                        "loaded document pages"
                    );
                    return Ok(Self::from_pages(pages));
                }
                Ok(_) => {
                    warn!(source = %source.describe(), "source yielded zero pages");
                    reasons.push(format!("{}: zero pages", source.describe()));
                }
                Err(reason) => {
                    warn!(source = %source.describe(), reason = %reason, "source unusable");
                    reasons.push(format!("{}: {}", source.describe(), reason));
                }
            }
        }

        Err(StoreError::DocumentUnavailable {
            reasons: if reasons.is_empty() {
                "no sources configured".to_string()
            } else {
                reasons.join("; ")
            },
        })
    }

    /// Build a store from already-extracted pages. Hyphenated line wraps
    /// are repaired here so both load paths share the fix.
    pub fn from_pages(mut pages: Vec<Page>) -> Self {
        for page in &mut pages {
            let (repaired, _) = dehyphenate(&page.text);
            page.text = repaired;
        }
        pages.sort_by_key(|page| page.number);
        Self { pages }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, number: u32) -> Option<&Page> {
        self.pages.iter().find(|page| page.number == number)
    }

    pub fn last_page_number(&self) -> u32 {
        self.pages.last().map(|page| page.number).unwrap_or(0)
    }
}

fn load_prebuilt_index(path: &Path) -> Result<Vec<Page>, String> {
    let raw = fs::read(path).map_err(|error| format!("read failed: {error}"))?;
    let pages: Vec<Page> =
        serde_json::from_slice(&raw).map_err(|error| format!("parse failed: {error}"))?;

    if pages.iter().any(|page| page.number == 0) {
        return Err("page numbers must be 1-based".to_string());
    }

    Ok(pages)
}

/// Result of the slow extraction path, kept for the extract manifest.
#[derive(Debug, Clone, Default)]
pub struct ExtractionStats {
    pub empty_page_count: usize,
    pub dehyphenation_merges: usize,
}

/// Extract page texts from the PDF. Pages come back in physical order,
/// split on form feeds, so index `i` is PDF page `i + 1`.
pub fn extract_pages_with_pdftotext(
    pdf_path: &Path,
    max_pages: Option<usize>,
) -> Result<Vec<Page>, String> {
    if !pdf_path.exists() {
        return Err("file not found".to_string());
    }

    let mut command = Command::new("pdftotext");
    command.arg("-enc").arg("UTF-8").arg("-f").arg("1");
    if let Some(max_pages) = max_pages {
        command.arg("-l").arg(max_pages.to_string());
    }
    command.arg(pdf_path).arg("-");

    let output = command
        .output()
        .map_err(|error| format!("failed to execute pdftotext: {error}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "pdftotext returned non-zero exit status: {}",
            stderr.trim()
        ));
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    let mut texts: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    while let Some(last) = texts.last() {
        if last.trim().is_empty() {
            texts.pop();
            continue;
        }
        break;
    }

    Ok(texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| Page {
            number: (index + 1) as u32,
            text,
        })
        .collect())
}

pub fn extraction_stats(pages: &[Page]) -> ExtractionStats {
    let mut stats = ExtractionStats::default();
    for page in pages {
        if page.text.trim().is_empty() {
            stats.empty_page_count += 1;
        }
        let (_, merges) = dehyphenate(&page.text);
        stats.dehyphenation_merges += merges;
    }
    stats
}

/// Rejoin words split across line wraps: a line ending in `word-` whose
/// next line starts with a lowercase letter becomes `wordcontinuation`.
pub fn dehyphenate(text: &str) -> (String, usize) {
    let lines: Vec<&str> = text.lines().collect();
    let mut merged = Vec::<String>::new();
    let mut merges = 0usize;
    let mut index = 0usize;

    while index < lines.len() {
        let current = lines[index];
        if index + 1 < lines.len() && should_merge_hyphenated_pair(current, lines[index + 1]) {
            let joined = format!(
                "{}{}",
                current.trim_end().trim_end_matches('-'),
                lines[index + 1].trim_start()
            );
            merged.push(joined);
            merges += 1;
            index += 2;
            continue;
        }

        merged.push(current.to_string());
        index += 1;
    }

    (merged.join("\n"), merges)
}

fn should_merge_hyphenated_pair(current: &str, next: &str) -> bool {
    let left = current.trim_end();
    if !left.ends_with('-') {
        return false;
    }

    let starts_with_lowercase = next
        .trim_start()
        .chars()
        .next()
        .map(|character| character.is_ascii_lowercase())
        .unwrap_or(false);
    if !starts_with_lowercase {
        return false;
    }

    left.trim_end_matches('-')
        .chars()
        .last()
        .map(|character| character.is_ascii_alphabetic())
        .unwrap_or(false)
}
