//! Tag vocabulary, tag membership and paginated tag browsing.
//!
//! Nothing here is cached: every call recomputes from the current content
//! store, so results always agree with the latest committed load.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{
    entry::{EntryId, EntrySummary, split_tags},
    error::{Error, Result},
    store::ContentStore,
};

/// How a browsed tag is compared with an entry's raw tag field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMatch {
    /// ASCII-case-insensitive containment in the raw field.
    #[default]
    Substring,
    /// Equality with one of the trimmed tags.
    Exact,
}

impl TagMatch {
    pub fn matches(self, raw_tags: &str, tag: &str) -> bool {
        match self {
            TagMatch::Substring => raw_tags
                .to_ascii_lowercase()
                .contains(&tag.to_ascii_lowercase()),
            TagMatch::Exact => split_tags(raw_tags).any(|t| t == tag.trim()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TagMatch::Substring => "substring",
            TagMatch::Exact => "exact",
        }
    }
}

impl std::str::FromStr for TagMatch {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "substring" => Ok(TagMatch::Substring),
            "exact" => Ok(TagMatch::Exact),
            other => Err(format!(
                "unknown tag match mode '{other}' (expected substring or exact)"
            )),
        }
    }
}

/// Distinct tags and the entries carrying each of them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TagIndex {
    members: BTreeMap<String, BTreeSet<EntryId>>,
}

impl TagIndex {
    pub fn build(store: &ContentStore) -> Result<Self> {
        let mut members: BTreeMap<String, BTreeSet<EntryId>> = BTreeMap::new();
        for entry in store.all_entries()? {
            for tag in split_tags(&entry.tags) {
                members.entry(tag.to_string()).or_default().insert(entry.id);
            }
        }
        Ok(Self { members })
    }

    /// Sorted distinct tags.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Ids of entries tagged exactly `tag`, ascending.
    pub fn entries_for(&self, tag: &str) -> Vec<EntryId> {
        self.members
            .get(tag)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Sorted distinct tags of the whole store, truncated to `limit`.
///
/// Case-sensitive: `Rust` and `rust` are two tags.
pub fn all_tags(store: &ContentStore, limit: usize) -> Result<Vec<String>> {
    let mut vocabulary = BTreeSet::new();
    for raw in store.all_tag_strings()? {
        for tag in split_tags(&raw) {
            vocabulary.insert(tag.to_string());
        }
    }
    Ok(vocabulary.into_iter().take(limit).collect())
}

/// One page of entries matching a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagPage {
    pub tag: String,
    /// Matches for the tag across all pages.
    pub total: usize,
    /// Zero-based page number.
    pub page: usize,
    pub page_size: usize,
    pub items: Vec<EntrySummary>,
}

impl TagPage {
    pub fn has_next(&self) -> bool {
        self.page_size > 0
            && self.page.saturating_add(1).saturating_mul(self.page_size)
                < self.total
    }

    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn page_count(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size)
    }

    /// One-based position of the first item, 0 when the page is empty.
    pub fn first_position(&self) -> usize {
        if self.items.is_empty() {
            0
        } else {
            self.page * self.page_size + 1
        }
    }

    /// One-based position of the last item, 0 when the page is empty.
    pub fn last_position(&self) -> usize {
        if self.items.is_empty() {
            0
        } else {
            self.page * self.page_size + self.items.len()
        }
    }
}

/// Page `page` (zero-based) of the entries matching `tag`.
///
/// A page past the end is empty but still reports the full `total`.
pub fn list_by_tag(
    store: &ContentStore,
    tag: &str,
    mode: TagMatch,
    page: usize,
    page_size: usize,
) -> Result<TagPage> {
    if page_size == 0 {
        return Err(Error::InvalidArgument("page size must be positive".into()));
    }
    let offset = page.saturating_mul(page_size);
    let (total, items) = store.find_by_tag(tag, mode, offset, page_size)?;
    Ok(TagPage {
        tag: tag.to_string(),
        total,
        page,
        page_size,
        items,
    })
}

/// Client-side page of an already fetched list, for paging one stable
/// snapshot of [`all_tags`].
pub fn paginate<T>(items: &[T], page: usize, per_page: usize) -> &[T] {
    if per_page == 0 {
        return &[];
    }
    let start = page.saturating_mul(per_page).min(items.len());
    let end = start.saturating_add(per_page).min(items.len());
    &items[start..end]
}
