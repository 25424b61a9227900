use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::SectionsArgs;
use crate::sections::build_section_ranges;

pub fn run(args: SectionsArgs) -> Result<()> {
    let store = super::load_store(&args.document)?;
    let ranges = build_section_ranges(store.pages());

    info!(
        page_count = store.pages().len(),
        range_count = ranges.len(),
        "built section ranges"
    );

    let mut output = io::BufWriter::new(io::stdout().lock());

    if args.json {
        serde_json::to_writer_pretty(&mut output, &ranges)
            .context("failed to serialize section ranges")?;
        writeln!(output)?;
        output.flush()?;
        return Ok(());
    }

    if ranges.is_empty() {
        writeln!(
            output,
            "No headings detected; section scoping is unavailable."
        )?;
        return Ok(());
    }

    for range in &ranges {
        writeln!(
            output,
            "pages {:>3}-{:<3}  {}",
            range.start, range.end, range.heading
        )?;
    }
    output.flush()?;

    Ok(())
}
