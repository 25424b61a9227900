pub mod extract;
pub mod locate;
pub mod rank;
pub mod sections;
pub mod verify;

use anyhow::Result;

use crate::cli::DocumentArgs;
use crate::store::{DocumentPageStore, PageIndexSource};

/// Build the store for a query-side command: prebuilt index first, PDF
/// extraction as the fallback.
pub(crate) fn load_store(document: &DocumentArgs) -> Result<DocumentPageStore> {
    let sources = [
        PageIndexSource::PrebuiltIndex(document.index_path.clone()),
        PageIndexSource::RawDocument(document.pdf_path.clone()),
    ];

    Ok(DocumentPageStore::load(&sources)?)
}
