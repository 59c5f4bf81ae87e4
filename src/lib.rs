//! faqdex - a question/answer knowledge base with full-text lookup.
//!
//! Entries (question, answer, `;`-separated tags) live in a
//! [redb](https://github.com/cberner/redb) content store. A
//! [Tantivy](https://github.com/quickwit-oss/tantivy) index over question
//! and answer text is rebuilt wholesale after every load and answers
//! prefix queries ranked by BM25. Tags are derived from the store on demand.
//!
//! # Quick start
//!
//! ```no_run
//! use faqdex::{DataDir, EntryDraft, KnowledgeBase};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let kb = KnowledgeBase::open(&data_dir).unwrap();
//!
//! kb.load(&[EntryDraft::new(
//!     "How do I reset my password?",
//!     "Open settings and choose reset password.",
//!     "account;security",
//! )])
//! .unwrap();
//!
//! for hit in kb.search("reset pass", 5).unwrap() {
//!     println!("{} {}", hit.id, hit.question);
//! }
//! let page = kb.list_by_tag("account", 0, 10).unwrap();
//! println!("{} tagged entries", page.total);
//! ```

pub mod cli;
pub mod data_dir;
pub mod entry;
pub mod error;
pub mod fts_index;
pub mod knowledge_base;
pub mod loader;
pub mod query;
pub mod settings;
pub mod store;
pub mod tags;

pub use data_dir::DataDir;
pub use entry::{Entry, EntryDraft, EntryId, EntrySummary};
pub use error::{Error, Result};
pub use fts_index::{FaqIndex, RankingMode};
pub use knowledge_base::{KnowledgeBase, LoadReport, Status};
pub use query::SearchHit;
pub use settings::Settings;
pub use store::ContentStore;
pub use tags::{TagIndex, TagMatch, TagPage};
