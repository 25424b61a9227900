use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::LocateArgs;
use crate::locate::locate;
use crate::sections::{build_section_ranges, range_for_label};

pub fn run(args: LocateArgs) -> Result<()> {
    let store = super::load_store(&args.document)?;
    let ranges = build_section_ranges(store.pages());
    let tuning = args.tuning.to_tuning();

    let preferred = args
        .section
        .as_deref()
        .and_then(|label| range_for_label(&ranges, label));
    if args.section.is_some() && preferred.is_none() {
        warn!(section = ?args.section, "section label matched no range; searching whole document");
    }

    let result = locate(&store, &ranges, &args.quote, preferred, &tuning);
    let mut output = io::BufWriter::new(io::stdout().lock());

    if args.json {
        serde_json::to_writer_pretty(&mut output, &result)
            .context("failed to serialize locate result")?;
        writeln!(output)?;
        output.flush()?;
        return Ok(());
    }

    match result {
        Some(hit) => {
            info!(page = hit.page, kind = hit.kind.as_str(), "quote located");
            writeln!(
                output,
                "page {} ({}#page={}) match={} offset={}",
                hit.page,
                args.document.doc_link,
                hit.page,
                hit.kind.as_str(),
                hit.char_offset
            )?;
            if let Some(heading) = &hit.heading {
                writeln!(output, "section: {heading}")?;
            }
            writeln!(output, "snippet: \"{}\"", hit.snippet)?;
        }
        None => {
            writeln!(output, "no page matched the quote")?;
        }
    }
    output.flush()?;

    Ok(())
}
