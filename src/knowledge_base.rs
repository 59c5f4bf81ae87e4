use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::info;

use crate::{
    data_dir::DataDir,
    entry::{Entry, EntryDraft, EntryId},
    error::Result,
    fts_index::{FaqIndex, RankingMode},
    query::{self, SearchHit},
    store::ContentStore,
    tags::{self, TagIndex, TagMatch, TagPage},
};

/// Outcome of a completed bulk load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub inserted: usize,
    pub indexed: usize,
    pub generation: u64,
}

/// Snapshot of store and index health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub entries: u64,
    pub generation: u64,
    pub indexed_generation: Option<u64>,
    pub indexed_documents: u64,
    pub ranking: RankingMode,
}

impl Status {
    /// The index does not reflect the latest load.
    pub fn is_stale(&self) -> bool {
        self.indexed_generation.unwrap_or(0) != self.generation
    }
}

/// The content store and its full-text index, behind the operations the
/// front end is allowed to call.
///
/// Reads run concurrently. Loads and rebuilds are serialized so a query never
/// races two writers.
pub struct KnowledgeBase {
    store: ContentStore,
    index: FaqIndex,
    tag_match: TagMatch,
    writer: Mutex<()>,
}

impl KnowledgeBase {
    pub fn new(store: ContentStore, index: FaqIndex) -> Self {
        Self {
            store,
            index,
            tag_match: TagMatch::default(),
            writer: Mutex::new(()),
        }
    }

    /// Open the store and index under `data_dir`.
    pub fn open(data_dir: &DataDir) -> Result<Self> {
        let store = ContentStore::open(&data_dir.store_db())?;
        let index = FaqIndex::open(&data_dir.index_dir()?)?;
        Ok(Self::new(store, index))
    }

    /// Use `mode` for [`KnowledgeBase::list_by_tag`].
    pub fn with_tag_match(mut self, mode: TagMatch) -> Self {
        self.tag_match = mode;
        self
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn index(&self) -> &FaqIndex {
        &self.index
    }

    // -- Reads --

    pub fn search(&self, text: &str, limit: usize) -> Result<Vec<SearchHit>> {
        query::search(&self.store, &self.index, text, limit)
    }

    pub fn get_by_id(&self, id: EntryId) -> Result<Option<Entry>> {
        self.store.get_by_id(id)
    }

    pub fn all_tags(&self, limit: usize) -> Result<Vec<String>> {
        tags::all_tags(&self.store, limit)
    }

    pub fn tag_index(&self) -> Result<TagIndex> {
        TagIndex::build(&self.store)
    }

    pub fn list_by_tag(
        &self,
        tag: &str,
        page: usize,
        page_size: usize,
    ) -> Result<TagPage> {
        tags::list_by_tag(&self.store, tag, self.tag_match, page, page_size)
    }

    pub fn status(&self) -> Result<Status> {
        Ok(Status {
            entries: self.store.count()?,
            generation: self.store.generation()?,
            indexed_generation: self.index.indexed_generation()?,
            indexed_documents: self.index.num_docs()?,
            ranking: self.index.ranking(),
        })
    }

    // -- Writes --

    /// Replace every entry without touching the index, which stays stale
    /// until [`KnowledgeBase::rebuild`].
    pub fn replace_all(&self, drafts: &[EntryDraft]) -> Result<usize> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.replace_all(drafts)
    }

    /// Recompute the full-text index from the current store contents.
    pub fn rebuild(&self) -> Result<usize> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.rebuild_locked()
    }

    /// Replace every entry and rebuild the index as one critical section.
    ///
    /// A rejected load leaves both store and index as they were.
    pub fn load(&self, drafts: &[EntryDraft]) -> Result<LoadReport> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let inserted = self.store.replace_all(drafts)?;
        let indexed = self.rebuild_locked()?;
        let generation = self.store.generation()?;
        info!(inserted, indexed, generation, "load complete");
        Ok(LoadReport {
            inserted,
            indexed,
            generation,
        })
    }

    fn rebuild_locked(&self) -> Result<usize> {
        let entries = self.store.all_entries()?;
        let generation = self.store.generation()?;
        self.index.rebuild(&entries, generation)
    }
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("index", &self.index)
            .field("tag_match", &self.tag_match)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn test_kb() -> (tempfile::TempDir, KnowledgeBase) {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = DataDir::resolve(Some(tmp.path())).unwrap();
        let kb = KnowledgeBase::open(&data_dir).unwrap();
        (tmp, kb)
    }

    fn drafts() -> Vec<EntryDraft> {
        vec![
            EntryDraft::new("How to pay an invoice?", "By bank transfer.", "billing"),
            EntryDraft::new("Can I get a refund?", "Within 14 days.", "billing;refunds"),
            EntryDraft::new("Where is support?", "Chat with us 24/7.", "support"),
        ]
    }

    #[test]
    fn load_makes_entries_searchable() {
        let (_tmp, kb) = test_kb();
        let report = kb.load(&drafts()).unwrap();

        assert_eq!(report, LoadReport { inserted: 3, indexed: 3, generation: 1 });
        let hits = kb.search("refund", 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, EntryId(2));
        assert!(!kb.status().unwrap().is_stale());
    }

    #[test]
    fn replace_without_rebuild_is_stale_not_an_error() {
        let (_tmp, kb) = test_kb();
        kb.load(&drafts()).unwrap();

        kb.replace_all(&[EntryDraft::new("Brand new question", "Yes.", "")])
            .unwrap();
        let status = kb.status().unwrap();
        assert!(status.is_stale());
        assert_eq!(status.indexed_generation, Some(1));
        assert!(kb.search("brand", 5).unwrap().is_empty());

        kb.rebuild().unwrap();
        assert!(!kb.status().unwrap().is_stale());
        assert_eq!(kb.search("brand", 5).unwrap().len(), 1);
    }

    #[test]
    fn failed_load_keeps_store_and_index() {
        let (_tmp, kb) = test_kb();
        kb.load(&drafts()).unwrap();

        let mut bad = drafts();
        bad[1].question = "   ".into();
        let err = kb.load(&bad).unwrap_err();
        assert!(matches!(err, Error::Load { row: 2, .. }));

        let status = kb.status().unwrap();
        assert_eq!(status.entries, 3);
        assert_eq!(status.generation, 1);
        assert!(!status.is_stale());
        assert_eq!(kb.search("invoice", 5).unwrap()[0].id, EntryId(1));
    }

    #[test]
    fn fresh_knowledge_base_is_empty_and_current() {
        let (_tmp, kb) = test_kb();
        let status = kb.status().unwrap();

        assert_eq!(status.entries, 0);
        assert!(!status.is_stale());
        assert_eq!(status.ranking, RankingMode::Bm25);
        assert!(kb.search("anything", 5).unwrap().is_empty());
        assert!(kb.all_tags(10).unwrap().is_empty());
    }

    #[test]
    fn loaded_text_roundtrips_byte_for_byte() {
        let (_tmp, kb) = test_kb();
        let input = vec![EntryDraft::new(
            "Ünïcödé  question\twith  spacing?",
            "Line one\nLine two — «quoted» ✓",
            "i18n",
        )];
        kb.load(&input).unwrap();

        let entry = kb.get_by_id(EntryId(1)).unwrap().unwrap();
        assert_eq!(entry.question.as_bytes(), input[0].question.as_bytes());
        assert_eq!(entry.answer.as_bytes(), input[0].answer.as_bytes());
        assert_eq!(kb.get_by_id(EntryId(2)).unwrap(), None);
    }

    #[test]
    fn tag_browsing_uses_configured_mode() {
        let (_tmp, kb) = test_kb();
        kb.load(&drafts()).unwrap();

        assert_eq!(kb.list_by_tag("refund", 0, 10).unwrap().total, 1);

        let kb = kb.with_tag_match(TagMatch::Exact);
        assert_eq!(kb.list_by_tag("refund", 0, 10).unwrap().total, 0);
        assert_eq!(kb.list_by_tag("billing", 0, 10).unwrap().total, 2);
        assert_eq!(
            kb.tag_index().unwrap().entries_for("billing"),
            vec![EntryId(1), EntryId(2)]
        );
    }
}
