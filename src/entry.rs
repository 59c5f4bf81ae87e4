use serde::{Deserialize, Serialize};

/// Separator between tags in the raw tag field.
pub const TAG_SEPARATOR: char = ';';

/// Identifier of an entry, shared by the content store and the full-text
/// index. Assigned sequentially from 1 on every load.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl EntryId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl std::str::FromStr for EntryId {
    type Err = std::num::ParseIntError;

    /// Accepts both `42` and `#42`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('#').unwrap_or(s).parse().map(EntryId)
    }
}

/// A stored knowledge-base item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub id: EntryId,
    pub question: String,
    pub answer: String,
    /// Raw `;`-separated tag field, kept exactly as loaded.
    pub tags: String,
    /// Seconds since the Unix epoch.
    pub updated_at: u64,
}

impl Entry {
    /// The trimmed, non-empty tags of this entry, in stored order.
    ///
    /// Duplicates are kept.
    pub fn tag_list(&self) -> Vec<&str> {
        split_tags(&self.tags).collect()
    }
}

/// The (id, question) pair shown in tag listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub id: EntryId,
    pub question: String,
}

/// An entry as supplied to a load, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct EntryDraft {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub tags: String,
}

impl EntryDraft {
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        tags: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            tags: tags.into(),
        }
    }

    /// Check the non-empty question/answer invariant.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.question.trim().is_empty() {
            return Err("question is empty".into());
        }
        if self.answer.trim().is_empty() {
            return Err("answer is empty".into());
        }
        Ok(())
    }
}

/// On-disk form of an entry. The id lives in the table key.
#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    question: String,
    answer: String,
    tags: String,
    updated_at: u64,
}

/// Encode the non-key part of an entry for storage.
pub(crate) fn encode_record(
    draft: &EntryDraft,
    updated_at: u64,
) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&EntryRecord {
        question: draft.question.clone(),
        answer: draft.answer.clone(),
        tags: draft.tags.clone(),
        updated_at,
    })
}

/// Decode a stored record back into an [`Entry`].
pub(crate) fn decode_record(
    id: u64,
    bytes: &[u8],
) -> serde_json::Result<Entry> {
    let record: EntryRecord = serde_json::from_slice(bytes)?;
    Ok(Entry {
        id: EntryId(id),
        question: record.question,
        answer: record.answer,
        tags: record.tags,
        updated_at: record.updated_at,
    })
}

/// Split a raw tag field into trimmed, non-empty tags.
pub fn split_tags(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(TAG_SEPARATOR)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
