use std::fs;
use std::io::{self, Read, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::VerifyArgs;
use crate::rewrite::attach_verification;
use crate::sections::build_section_ranges;

pub fn run(args: VerifyArgs) -> Result<()> {
    let answer_text = read_answer(&args)?;

    let store = super::load_store(&args.document)?;
    let ranges = build_section_ranges(store.pages());
    let tuning = args.tuning.to_tuning();

    let rewritten = attach_verification(
        &store,
        &ranges,
        &answer_text,
        &args.question,
        &args.document.doc_link,
        &tuning,
    );

    info!(
        primary_page = ?rewritten.primary_page,
        bullet_count = rewritten.bullets.len(),
        "citations verified"
    );

    let mut output = io::BufWriter::new(io::stdout().lock());

    if args.json {
        serde_json::to_writer_pretty(&mut output, &rewritten)
            .context("failed to serialize rewritten answer")?;
        writeln!(output)?;
    } else {
        writeln!(output, "{}", rewritten.text)?;
    }
    output.flush()?;

    Ok(())
}

fn read_answer(args: &VerifyArgs) -> Result<String> {
    match &args.answer_file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read answer file {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read answer from stdin")?;
            Ok(buffer)
        }
    }
}
