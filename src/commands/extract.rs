use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::ExtractArgs;
use crate::model::{ExtractCounts, ExtractManifest};
use crate::store::{DocumentPageStore, extract_pages_with_pdftotext, extraction_stats};
use crate::util::{command_version, now_utc_string, sha256_file, write_json_pretty};

const MANIFEST_VERSION: u32 = 1;

pub fn run(args: ExtractArgs) -> Result<()> {
    info!(pdf = %args.pdf_path.display(), "starting page extraction");

    let pages = match extract_pages_with_pdftotext(&args.pdf_path, args.max_pages) {
        Ok(pages) => pages,
        Err(reason) => bail!(
            "failed to extract pages from {}: {reason}",
            args.pdf_path.display()
        ),
    };
    if pages.is_empty() {
        bail!("{} produced zero pages", args.pdf_path.display());
    }

    let stats = extraction_stats(&pages);
    let mut warnings = Vec::<String>::new();
    if stats.empty_page_count > 0 {
        let message = format!("{} pages have no text layer", stats.empty_page_count);
        warn!("{message}");
        warnings.push(message);
    }

    let store = DocumentPageStore::from_pages(pages);
    write_json_pretty(&args.index_path, &store.pages())
        .with_context(|| format!("failed to write page index {}", args.index_path.display()))?;

    let manifest = ExtractManifest {
        manifest_version: MANIFEST_VERSION,
        generated_at: now_utc_string(),
        pdf_path: args.pdf_path.display().to_string(),
        pdf_sha256: sha256_file(&args.pdf_path)?,
        pdftotext_version: command_version("pdftotext", &["-v"])?,
        index_path: args.index_path.display().to_string(),
        counts: ExtractCounts {
            page_count: store.pages().len(),
            empty_page_count: stats.empty_page_count,
            dehyphenation_merges: stats.dehyphenation_merges,
        },
        warnings,
    };

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        args.index_path.with_file_name("cba_pages_manifest.json")
    });
    write_json_pretty(&manifest_path, &manifest)
        .with_context(|| format!("failed to write manifest {}", manifest_path.display()))?;

    info!(
        index = %args.index_path.display(),
        manifest = %manifest_path.display(),
        page_count = manifest.counts.page_count,
        dehyphenation_merges = manifest.counts.dehyphenation_merges,
        "extraction complete"
    );

    let mut output = io::stdout().lock();
    writeln!(
        output,
        "Extracted {} pages from {} into {}",
        manifest.counts.page_count,
        manifest.pdf_path,
        manifest.index_path
    )?;

    Ok(())
}
