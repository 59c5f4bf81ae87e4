use std::{collections::HashMap, path::Path, time::SystemTime};

use redb::{
    Database,
    ReadableDatabase,
    ReadableTable,
    ReadableTableMetadata,
    TableDefinition,
};
use tracing::{debug, info};

use crate::{
    entry::{
        Entry,
        EntryDraft,
        EntryId,
        EntrySummary,
        decode_record,
        encode_record,
    },
    error::{Error, Result},
    tags::TagMatch,
};

const ENTRIES: TableDefinition<u64, &[u8]> = TableDefinition::new("entries");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const GENERATION_KEY: &str = "generation";

/// Durable table of entries plus operator settings, backed by redb.
///
/// Every write runs in a single redb transaction, so readers always observe
/// either the complete previous load or the complete new one.
pub struct ContentStore {
    db: Database,
}

impl ContentStore {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(ENTRIES)?;
        txn.open_table(SETTINGS)?;
        txn.open_table(META)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Entries --

    /// Discard every entry and insert `drafts` with fresh ids `1..=N`.
    ///
    /// Returns the number of inserted entries.
    pub fn replace_all(&self, drafts: &[EntryDraft]) -> Result<usize> {
        self.replace_all_at(drafts, unix_now())
    }

    /// [`ContentStore::replace_all`] with an explicit `updated_at`.
    pub fn replace_all_at(
        &self,
        drafts: &[EntryDraft],
        updated_at: u64,
    ) -> Result<usize> {
        let txn = self.db.begin_write()?;
        txn.delete_table(ENTRIES)?;
        {
            let mut table = txn.open_table(ENTRIES)?;
            for (i, draft) in drafts.iter().enumerate() {
                if let Err(reason) = draft.validate() {
                    drop(table);
                    txn.abort()?;
                    return Err(Error::Load { row: i + 1, reason });
                }
                let record = encode_record(draft, updated_at)?;
                table.insert(i as u64 + 1, record.as_slice())?;
            }
        }
        let generation = {
            let mut meta = txn.open_table(META)?;
            let next = meta
                .get(GENERATION_KEY)?
                .map(|v| v.value())
                .unwrap_or(0)
                + 1;
            meta.insert(GENERATION_KEY, next)?;
            next
        };
        txn.commit()?;

        info!(entries = drafts.len(), generation, "content store replaced");
        Ok(drafts.len())
    }

    pub fn get_by_id(&self, id: EntryId) -> Result<Option<Entry>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENTRIES)?;
        match table.get(id.get())? {
            Some(bytes) => Ok(Some(decode_record(id.get(), bytes.value())?)),
            None => Ok(None),
        }
    }

    /// Fetch several entries in one read transaction. Missing ids are
    /// absent from the returned map.
    pub fn get_many(&self, ids: &[EntryId]) -> Result<HashMap<EntryId, Entry>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENTRIES)?;
        let mut result = HashMap::with_capacity(ids.len());
        for &id in ids {
            if let Some(bytes) = table.get(id.get())? {
                result.insert(id, decode_record(id.get(), bytes.value())?);
            }
        }
        Ok(result)
    }

    /// All entries in ascending id order.
    pub fn all_entries(&self) -> Result<Vec<Entry>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENTRIES)?;
        let mut result = Vec::new();
        for row in table.iter()? {
            let (k, v) = row?;
            result.push(decode_record(k.value(), v.value())?);
        }
        Ok(result)
    }

    /// Raw tag fields of every entry that has a non-empty one.
    pub fn all_tag_strings(&self) -> Result<Vec<String>> {
        Ok(self
            .all_entries()?
            .into_iter()
            .filter(|e| !e.tags.is_empty())
            .map(|e| e.tags)
            .collect())
    }

    /// Entries whose raw tag field contains `tag`, newest first.
    ///
    /// Containment ignores ASCII case, like SQL `LIKE '%tag%'`. It also
    /// over-matches: `"ai"` hits a field holding `"said"`.
    pub fn find_by_tag_substring(
        &self,
        tag: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(usize, Vec<EntrySummary>)> {
        self.find_by_tag(tag, TagMatch::Substring, offset, limit)
    }

    /// Entries matching `tag` under `mode`, ordered by `updated_at`
    /// descending then id descending. Returns the full match count and the
    /// requested window.
    pub fn find_by_tag(
        &self,
        tag: &str,
        mode: TagMatch,
        offset: usize,
        limit: usize,
    ) -> Result<(usize, Vec<EntrySummary>)> {
        let mut matches: Vec<Entry> = self
            .all_entries()?
            .into_iter()
            .filter(|e| mode.matches(&e.tags, tag))
            .collect();
        matches.sort_by(|a, b| {
            b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id))
        });

        let total = matches.len();
        let page = matches
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|e| EntrySummary {
                id: e.id,
                question: e.question,
            })
            .collect();
        debug!(tag, ?mode, total, offset, limit, "tag lookup");
        Ok((total, page))
    }

    pub fn count(&self) -> Result<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENTRIES)?;
        Ok(table.len()?)
    }

    /// Number of completed loads. Zero for a store never loaded.
    pub fn generation(&self) -> Result<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(META)?;
        Ok(table.get(GENERATION_KEY)?.map(|v| v.value()).unwrap_or(0))
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    pub fn remove_setting(&self, key: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SETTINGS)?;
            table.remove(key)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    pub fn list_settings(&self) -> Result<Vec<(String, String)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        let mut result = Vec::new();
        for row in table.iter()? {
            let (k, v) = row?;
            result.push((k.value().to_string(), v.value().to_string()));
        }
        Ok(result)
    }
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore").finish_non_exhaustive()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
