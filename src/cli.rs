use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::model::Tuning;

#[derive(Parser, Debug)]
#[command(
    name = "cbacite",
    version,
    about = "Verified page citations into the collective bargaining agreement PDF"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract the PDF into a prebuilt page-text index plus a manifest.
    Extract(ExtractArgs),
    /// Detect top-level headings and print the derived section ranges.
    Sections(SectionsArgs),
    /// Resolve one verbatim quote to a page and offset.
    Locate(LocateArgs),
    /// Rank pages against a question/answer query (the fallback path).
    Rank(RankArgs),
    /// Rewrite an LLM answer with verified, page-linked citations.
    Verify(VerifyArgs),
}

/// Flags shared by every command that reads the document.
#[derive(Args, Debug, Clone)]
pub struct DocumentArgs {
    #[arg(long, default_value = "public/mlb/cba_pages.json")]
    pub index_path: PathBuf,

    #[arg(long, default_value = "public/mlb/MLB_CBA_2022.pdf")]
    pub pdf_path: PathBuf,

    /// Link prefix rendered before `#page=<n>` fragments.
    #[arg(long, default_value = "/mlb/MLB_CBA_2022.pdf")]
    pub doc_link: String,
}

/// Matching and ranking thresholds. Tuned empirically; overridable
/// rather than baked in.
#[derive(Args, Debug, Clone)]
pub struct TuningArgs {
    /// Minimum fraction of quote tokens a fuzzy window must share.
    #[arg(long, default_value_t = 0.55)]
    pub fuzzy_overlap: f64,

    /// Keep ranked pages within this fraction below the top score.
    #[arg(long, default_value_t = 0.45)]
    pub score_band: f64,

    #[arg(long, default_value_t = 4)]
    pub max_bullets: usize,
}

impl TuningArgs {
    pub fn to_tuning(&self) -> Tuning {
        Tuning {
            fuzzy_overlap: self.fuzzy_overlap,
            score_band: self.score_band,
            max_bullets: self.max_bullets,
            ..Tuning::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long, default_value = "public/mlb/MLB_CBA_2022.pdf")]
    pub pdf_path: PathBuf,

    #[arg(long, default_value = "public/mlb/cba_pages.json")]
    pub index_path: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub max_pages: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct SectionsArgs {
    #[command(flatten)]
    pub document: DocumentArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LocateArgs {
    #[command(flatten)]
    pub document: DocumentArgs,

    #[command(flatten)]
    pub tuning: TuningArgs,

    /// The phrase to pin down, as quoted by the model.
    #[arg(long)]
    pub quote: String,

    /// Optional section label guess, e.g. "Article XIX".
    #[arg(long)]
    pub section: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RankArgs {
    #[command(flatten)]
    pub document: DocumentArgs,

    #[command(flatten)]
    pub tuning: TuningArgs,

    #[arg(long)]
    pub question: String,

    #[arg(long, default_value = "")]
    pub answer: String,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub document: DocumentArgs,

    #[command(flatten)]
    pub tuning: TuningArgs,

    #[arg(long)]
    pub question: String,

    /// Answer text file; stdin when omitted.
    #[arg(long)]
    pub answer_file: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
