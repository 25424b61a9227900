use std::collections::HashSet;
use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::RankArgs;
use crate::rank::{
    anchor_offset, build_query_terms, document_frequencies, rank_pages, rare_gate_terms,
};
use crate::sections::{build_section_ranges, range_for_page};
use crate::snippet::snippet_around;
use crate::text::tokenize;

#[derive(Debug, Serialize)]
struct RankedOutput {
    page: u32,
    score: f64,
    link: String,
    heading: Option<String>,
    snippet: String,
}

pub fn run(args: RankArgs) -> Result<()> {
    let store = super::load_store(&args.document)?;
    let ranges = build_section_ranges(store.pages());
    let tuning = args.tuning.to_tuning();

    let query = build_query_terms(&args.question, &args.answer);
    let ranked = rank_pages(&store, &ranges, &query, &tuning);
    info!(
        unigram_count = query.unigrams.len(),
        candidate_count = ranked.len(),
        "ranked pages"
    );

    // Snippets anchor the same way the verify fallback does.
    let page_terms: Vec<Vec<String>> = store
        .pages()
        .iter()
        .map(|page| tokenize(&page.text))
        .collect();
    let frequencies = document_frequencies(&page_terms, &query.unigrams);
    let gate_terms = rare_gate_terms(&query, &frequencies);
    let query_set: HashSet<&str> = query.unigrams.iter().map(String::as_str).collect();

    let rows: Vec<RankedOutput> = ranked
        .iter()
        .filter_map(|entry| {
            let page = store.page(entry.page)?;
            let anchor = anchor_offset(&page.text, &gate_terms, &query_set);
            Some(RankedOutput {
                page: entry.page,
                score: entry.score,
                link: format!("{}#page={}", args.document.doc_link, entry.page),
                heading: range_for_page(&ranges, entry.page).map(|range| range.heading.clone()),
                snippet: snippet_around(&page.text, anchor),
            })
        })
        .collect();

    let mut output = io::BufWriter::new(io::stdout().lock());

    if args.json {
        serde_json::to_writer_pretty(&mut output, &rows)
            .context("failed to serialize rank results")?;
        writeln!(output)?;
        output.flush()?;
        return Ok(());
    }

    if rows.is_empty() {
        writeln!(output, "no page passed the rare-term gate")?;
        return Ok(());
    }

    for (index, row) in rows.iter().enumerate() {
        writeln!(
            output,
            "{}.\tpage {}\tscore={:.4}\t{}",
            index + 1,
            row.page,
            row.score,
            row.heading.as_deref().unwrap_or("(no section)")
        )?;
    }
    output.flush()?;

    Ok(())
}
