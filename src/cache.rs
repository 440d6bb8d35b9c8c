use crate::errors::AppResult;
use crate::models::{ItemId, Record};
use crate::store;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

#[derive(Debug, Clone)]
struct CacheEntry {
    modified: SystemTime,
    len: u64,
    loaded_at: Instant,
    record: Record,
}

/// Parsed records keyed by document path.
///
/// An entry is served only while the file's modification time and length match what was
/// read and the entry is younger than the TTL. Writes made through this crate also
/// invalidate the path explicitly, since two writes can land within one mtime tick.
#[derive(Debug)]
pub struct RecordCache {
    ttl: Duration,
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl RecordCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn load(&self, root: &Path, id: &str) -> AppResult<Record> {
        let parsed = ItemId::parse(id)?;
        let Some(path) = store::find_record_path(root, &parsed) else {
            self.invalidate(&store::record_path(root, &parsed));
            return store::load_record(root, id);
        };
        let metadata = fs::metadata(&path)?;
        let modified = metadata.modified()?;
        let len = metadata.len();

        if let Some(record) = self.fresh(&path, modified, len) {
            tracing::debug!(id, "record cache hit");
            return Ok(record);
        }

        tracing::debug!(id, "record cache miss");
        let record = store::read_record_file(&path, &parsed)?;
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                path,
                CacheEntry {
                    modified,
                    len,
                    loaded_at: Instant::now(),
                    record: record.clone(),
                },
            );
        }
        Ok(record)
    }

    fn fresh(&self, path: &Path, modified: SystemTime, len: u64) -> Option<Record> {
        let mut entries = self.entries.lock().ok()?;
        let entry = entries.get(path)?;
        if entry.modified == modified && entry.len == len && entry.loaded_at.elapsed() < self.ttl {
            return Some(entry.record.clone());
        }
        entries.remove(path);
        None
    }

    pub fn invalidate(&self, path: &Path) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(path);
        }
    }

    pub fn invalidate_id(&self, root: &Path, id: &str) {
        if let Ok(parsed) = ItemId::parse(id) {
            self.invalidate(&store::record_path(root, &parsed));
            self.invalidate(&store::flat_dir(root, parsed.item_type).join(format!("{}.json", parsed)));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemStatus, ItemType, LinkedItems, PriorityQuadrant};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn seed(root: &Path, title: &str) -> Record {
        let now = Utc::now();
        let record = Record {
            id: "TASK-001".to_string(),
            item_type: ItemType::Task,
            status: ItemStatus::Draft,
            priority: PriorityQuadrant::Q2,
            title: title.to_string(),
            created: now,
            updated: now,
            linked_items: LinkedItems::default(),
            tags: Vec::new(),
            author: None,
            assignee: None,
            metadata: BTreeMap::new(),
        };
        store::save_record(root, &record).expect("save");
        record
    }

    #[test]
    fn repeated_loads_are_served_from_memory() {
        let root = tempfile::tempdir().expect("temp root");
        seed(root.path(), "first");
        let cache = RecordCache::new(Duration::from_secs(60));
        assert_eq!(cache.load(root.path(), "TASK-001").expect("load").title, "first");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.load(root.path(), "TASK-001").expect("hit").title, "first");
    }

    #[test]
    fn size_change_forces_a_reload() {
        let root = tempfile::tempdir().expect("temp root");
        seed(root.path(), "first");
        let cache = RecordCache::new(Duration::from_secs(60));
        cache.load(root.path(), "TASK-001").expect("warm");
        seed(root.path(), "a considerably longer title");
        assert_eq!(
            cache.load(root.path(), "TASK-001").expect("reload").title,
            "a considerably longer title"
        );
    }

    #[test]
    fn zero_ttl_never_serves_cached_entries() {
        let root = tempfile::tempdir().expect("temp root");
        seed(root.path(), "first");
        let cache = RecordCache::new(Duration::ZERO);
        cache.load(root.path(), "TASK-001").expect("warm");
        seed(root.path(), "fifth");
        assert_eq!(cache.load(root.path(), "TASK-001").expect("reload").title, "fifth");
    }

    #[test]
    fn explicit_invalidation_and_clear() {
        let root = tempfile::tempdir().expect("temp root");
        seed(root.path(), "first");
        let cache = RecordCache::new(Duration::from_secs(60));
        cache.load(root.path(), "TASK-001").expect("warm");
        cache.invalidate_id(root.path(), "TASK-001");
        assert!(cache.is_empty());
        cache.load(root.path(), "TASK-001").expect("warm again");
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn missing_record_is_not_found() {
        let root = tempfile::tempdir().expect("temp root");
        let cache = RecordCache::new(Duration::from_secs(60));
        assert!(cache.load(root.path(), "TASK-001").expect_err("missing").is_not_found());
    }
}
