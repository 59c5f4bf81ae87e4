//! Bulk loading of the knowledge base from CSV.
//!
//! The source has a header row with `question`, `answer` and optionally
//! `tags` (`;`-joined) columns. Fields are trimmed, extra columns ignored.
//! The whole file is parsed before anything is written.

use std::{io::Read, path::Path};

use tracing::info;

use crate::{
    entry::EntryDraft,
    error::Result,
    knowledge_base::{KnowledgeBase, LoadReport},
};

/// Parse CSV rows into drafts.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<EntryDraft>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut drafts = Vec::new();
    for row in rdr.deserialize() {
        drafts.push(row?);
    }
    Ok(drafts)
}

/// Replace the knowledge base with the contents of a CSV file and rebuild
/// the full-text index.
pub fn load_csv(kb: &KnowledgeBase, path: &Path) -> Result<LoadReport> {
    let file = std::fs::File::open(path)?;
    let drafts = read_csv(file)?;
    info!(path = %path.display(), rows = drafts.len(), "parsed import file");
    kb.load(&drafts)
}
