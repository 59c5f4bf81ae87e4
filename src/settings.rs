use serde::Serialize;

use crate::{
    error::{Error, Result},
    store::ContentStore,
    tags::TagMatch,
};

/// Setting keys accepted by [`Settings::set`].
pub const KEYS: &[&str] = &[
    "search_limit",
    "min_query_chars",
    "tag_list_limit",
    "tags_per_page",
    "page_size",
    "tag_match",
];

/// Operator settings, persisted in the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Results returned by a search.
    pub search_limit: usize,
    /// Shortest free-text query the front end forwards to search.
    pub min_query_chars: usize,
    /// Tags fetched for the category listing.
    pub tag_list_limit: usize,
    /// Tags shown per page of the category listing.
    pub tags_per_page: usize,
    /// Questions shown per page when browsing a tag.
    pub page_size: usize,
    pub tag_match: TagMatch,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search_limit: 5,
            min_query_chars: 3,
            tag_list_limit: 200,
            tags_per_page: 8,
            page_size: 10,
            tag_match: TagMatch::Substring,
        }
    }
}

impl Settings {
    /// Read every setting, falling back to the default for unset keys.
    pub fn load(store: &ContentStore) -> Result<Self> {
        let mut settings = Self::default();
        for (key, value) in store.list_settings()? {
            settings.apply(&key, &value)?;
        }
        Ok(settings)
    }

    /// Validate and persist one setting.
    pub fn set(store: &ContentStore, key: &str, value: &str) -> Result<()> {
        Self::default().apply(key, value)?;
        store.set_setting(key, value)
    }

    /// Remove a persisted setting so its default applies again.
    pub fn clear(store: &ContentStore, key: &str) -> Result<bool> {
        if !KEYS.contains(&key) {
            return Err(unknown_key(key));
        }
        store.remove_setting(key)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "search_limit" => self.search_limit = positive(key, value)?,
            "min_query_chars" => self.min_query_chars = number(key, value)?,
            "tag_list_limit" => self.tag_list_limit = positive(key, value)?,
            "tags_per_page" => self.tags_per_page = positive(key, value)?,
            "page_size" => self.page_size = positive(key, value)?,
            "tag_match" => {
                self.tag_match = value.parse().map_err(Error::Config)?;
            }
            other => return Err(unknown_key(other)),
        }
        Ok(())
    }
}

fn unknown_key(key: &str) -> Error {
    Error::Config(format!(
        "unknown setting '{key}' (known: {})",
        KEYS.join(", ")
    ))
}

fn number(key: &str, value: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| {
        Error::Config(format!("setting '{key}' expects a number, got '{value}'"))
    })
}

fn positive(key: &str, value: &str) -> Result<usize> {
    match number(key, value)? {
        0 => Err(Error::Config(format!("setting '{key}' must be positive"))),
        n => Ok(n),
    }
}
