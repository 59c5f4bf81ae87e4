use std::{collections::BTreeSet, path::Path};

use serde::Serialize;
use tantivy::{
    DocAddress,
    Index,
    IndexReader,
    IndexWriter,
    Searcher,
    TantivyDocument,
    Term,
    collector::{DocSetCollector, TopDocs},
    doc,
    query::{BooleanQuery, Occur, Query, TermQuery},
    schema::*,
    tokenizer::{
        AsciiFoldingFilter,
        LowerCaser,
        RemoveLongFilter,
        SimpleTokenizer,
        TextAnalyzer,
        TokenStream,
    },
};
use tracing::{debug, info, warn};

use crate::{
    entry::{Entry, EntryId},
    error::Result,
};

/// Field names used in the schema.
pub mod fields {
    pub const ENTRY_ID: &str = "entry_id";
    pub const QUESTION: &str = "question";
    pub const ANSWER: &str = "answer";
}

/// Name of the analyzer applied to question and answer text.
pub const TOKENIZER: &str = "faq_text";

const WRITER_MEMORY_BUDGET: usize = 15_000_000;

/// Whether the index can order matches by relevance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMode {
    /// BM25 over term and document frequencies.
    Bm25,
    /// Matches come back in index order, unscored.
    MatchOnly,
}

/// Resolved field handles for the schema.
#[derive(Clone, Copy)]
pub struct SchemaFields {
    pub entry_id: Field,
    pub question: Field,
    pub answer: Field,
}

/// A match from the index, before it is joined with the content store.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: EntryId,
    /// Negated BM25 score: lower is more relevant. `None` when unranked.
    pub rank: Option<f32>,
}

/// Full-text projection of the content store's question and answer text,
/// keyed by entry id.
pub struct FaqIndex {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
    ranking: RankingMode,
}

fn build_schema(record_option: IndexRecordOption) -> Schema {
    let mut builder = Schema::builder();

    builder.add_u64_field(fields::ENTRY_ID, STORED | FAST);

    let text_opts = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(TOKENIZER)
            .set_index_option(record_option),
    );
    builder.add_text_field(fields::QUESTION, text_opts.clone());
    builder.add_text_field(fields::ANSWER, text_opts);

    builder.build()
}

fn register_tokenizers(index: &Index) {
    let faq_text = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(AsciiFoldingFilter)
        .build();
    index.tokenizers().register(TOKENIZER, faq_text);
}

/// Ranking is available only when every text field records term
/// frequencies.
fn detect_ranking(schema: &Schema, text_fields: &[Field]) -> RankingMode {
    let has_freqs = text_fields.iter().all(|&field| {
        match schema.get_field_entry(field).field_type() {
            FieldType::Str(opts) => opts
                .get_indexing_options()
                .is_some_and(|indexing| indexing.index_option().has_freq()),
            _ => false,
        }
    });
    if has_freqs {
        RankingMode::Bm25
    } else {
        RankingMode::MatchOnly
    }
}

impl FaqIndex {
    /// Open or create an index at the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mmap_dir = tantivy::directory::MmapDirectory::open(dir)?;
        let index = if Index::exists(&mmap_dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?
        {
            Index::open(mmap_dir)?
        } else {
            Index::create(
                mmap_dir,
                build_schema(IndexRecordOption::WithFreqsAndPositions),
                tantivy::IndexSettings::default(),
            )?
        };

        Self::from_index(index)
    }

    /// Create an in-memory index (for testing).
    pub fn open_in_ram() -> Result<Self> {
        Self::open_in_ram_with(IndexRecordOption::WithFreqsAndPositions)
    }

    pub(crate) fn open_in_ram_with(
        record_option: IndexRecordOption,
    ) -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema(record_option)))
    }

    fn from_index(index: Index) -> Result<Self> {
        register_tokenizers(&index);

        let schema = index.schema();
        let fields = SchemaFields {
            entry_id: schema.get_field(fields::ENTRY_ID)?,
            question: schema.get_field(fields::QUESTION)?,
            answer: schema.get_field(fields::ANSWER)?,
        };
        let ranking = detect_ranking(&schema, &[fields.question, fields.answer]);
        if ranking == RankingMode::MatchOnly {
            warn!("index lacks term frequencies; results will be unranked");
        }

        let reader = index.reader()?;

        Ok(Self {
            index,
            reader,
            fields,
            ranking,
        })
    }

    pub fn fields(&self) -> SchemaFields {
        self.fields
    }

    pub fn ranking(&self) -> RankingMode {
        self.ranking
    }

    /// Replace the whole index with one document per entry.
    ///
    /// `generation` is stored as the commit payload so a later
    /// [`FaqIndex::indexed_generation`] tells which load the index reflects.
    pub fn rebuild(&self, entries: &[Entry], generation: u64) -> Result<usize> {
        let f = self.fields;
        let mut writer: IndexWriter = self.index.writer(WRITER_MEMORY_BUDGET)?;
        writer.delete_all_documents()?;

        for entry in entries {
            writer.add_document(doc!(
                f.entry_id => entry.id.get(),
                f.question => entry.question.as_str(),
                f.answer => entry.answer.as_str(),
            ))?;
        }

        let mut prepared = writer.prepare_commit()?;
        prepared.set_payload(&generation.to_string());
        prepared.commit()?;
        writer.wait_merging_threads()?;
        self.reader.reload()?;

        info!(documents = entries.len(), generation, "full-text index rebuilt");
        Ok(entries.len())
    }

    /// Load generation of the last rebuild, `None` if never rebuilt.
    pub fn indexed_generation(&self) -> Result<Option<u64>> {
        let metas = self.index.load_metas()?;
        Ok(metas.payload.and_then(|p| p.parse().ok()))
    }

    pub fn num_docs(&self) -> Result<u64> {
        self.reader.reload()?;
        Ok(self.reader.searcher().num_docs())
    }

    /// Run `text` through the index analyzer.
    pub fn analyze(&self, text: &str) -> Result<Vec<String>> {
        let mut analyzer = self.index.tokenizer_for_field(self.fields.question)?;
        let mut terms = Vec::new();
        let mut stream = analyzer.token_stream(text);
        stream.process(&mut |token| terms.push(token.text.clone()));
        Ok(terms)
    }

    /// Every index term of `field` starting with `prefix`, across all
    /// segments.
    fn expand_prefix(
        &self,
        searcher: &Searcher,
        field: Field,
        prefix: &str,
    ) -> Result<BTreeSet<String>> {
        let mut found = BTreeSet::new();
        for segment in searcher.segment_readers() {
            let inverted = segment.inverted_index(field)?;
            let mut stream =
                inverted.terms().range().ge(prefix.as_bytes()).into_stream()?;
            while stream.advance() {
                let key = stream.key();
                if !key.starts_with(prefix.as_bytes()) {
                    break;
                }
                if let Ok(text) = std::str::from_utf8(key) {
                    found.insert(text.to_string());
                }
            }
        }
        Ok(found)
    }

    /// Match any indexed token starting with any of `prefixes` in either
    /// text field, returning at most `limit` hits.
    ///
    /// Ranked by BM25 when the index supports it, otherwise in index order.
    pub fn search_prefixes(
        &self,
        prefixes: &[String],
        limit: usize,
    ) -> Result<Vec<IndexHit>> {
        if prefixes.is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        let f = self.fields;
        self.reader.reload()?;
        let searcher = self.reader.searcher();

        // Collectors size their buffers from the limit.
        let limit = limit.min(searcher.num_docs() as usize);
        if limit == 0 {
            return Ok(vec![]);
        }

        let mut terms = BTreeSet::new();
        for prefix in prefixes {
            for field in [f.question, f.answer] {
                for text in self.expand_prefix(&searcher, field, prefix)? {
                    terms.insert(Term::from_field_text(field, &text));
                }
            }
        }
        if terms.is_empty() {
            return Ok(vec![]);
        }
        debug!(expanded_terms = terms.len(), "prefix query expanded");

        let record_option = match self.ranking {
            RankingMode::Bm25 => IndexRecordOption::WithFreqs,
            RankingMode::MatchOnly => IndexRecordOption::Basic,
        };
        let clauses: Vec<(Occur, Box<dyn Query>)> = terms
            .into_iter()
            .map(|term| {
                let query: Box<dyn Query> =
                    Box::new(TermQuery::new(term, record_option));
                (Occur::Should, query)
            })
            .collect();
        let query = BooleanQuery::new(clauses);

        let matched: Vec<(Option<f32>, DocAddress)> = match self.ranking {
            RankingMode::Bm25 => searcher
                .search(&query, &TopDocs::with_limit(limit))?
                .into_iter()
                .map(|(score, address)| (Some(-score), address))
                .collect(),
            RankingMode::MatchOnly => {
                let mut addresses: Vec<DocAddress> =
                    searcher.search(&query, &DocSetCollector)?.into_iter().collect();
                addresses.sort();
                addresses
                    .into_iter()
                    .take(limit)
                    .map(|address| (None, address))
                    .collect()
            }
        };

        let mut hits = Vec::with_capacity(matched.len());
        for (rank, address) in matched {
            let doc: TantivyDocument = searcher.doc(address)?;
            hits.push(IndexHit {
                id: EntryId(extract_u64(&doc, f.entry_id)),
                rank,
            });
        }
        Ok(hits)
    }
}

impl std::fmt::Debug for FaqIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaqIndex")
            .field("ranking", &self.ranking)
            .finish_non_exhaustive()
    }
}

fn extract_u64(doc: &TantivyDocument, field: Field) -> u64 {
    doc.get_first(field).and_then(|v| v.as_u64()).unwrap_or(0)
}
