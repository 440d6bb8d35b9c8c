//! Sharded category index.
//!
//! Three parallel shard sets live under `index/`: `by-type/<type>.json`,
//! `by-status/<status>.json` and `by-priority/<quadrant>.json`, each holding the ordered
//! IDs currently classified into that value. `index/counters.json` records the highest
//! numeric suffix issued per type prefix.
//!
//! Every shard write is write-temp-then-rename, but the three shards touched by one
//! mutation are updated one after another with no transaction around them. The index
//! assumes a single writer; an interrupted mutation can leave an ID in some dimensions
//! and not others, which `audit` reports and `rebuild_from_records` repairs.

mod query;

pub use query::{candidate_ids, query_records, CandidateSource};

use crate::errors::{AppError, AppResult};
use crate::models::{IndexAudit, ItemId, ItemStatus, ItemType, PriorityQuadrant, Record};
use crate::store::{self, read_json_file, write_json_atomic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub const INDEX_DIR: &str = "index";
pub const COUNTERS_FILE: &str = "counters.json";

/// Type prefix to highest issued suffix.
pub type Counters = BTreeMap<String, u64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Type,
    Status,
    Priority,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Self::Type, Self::Status, Self::Priority];

    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Type => "by-type",
            Self::Status => "by-status",
            Self::Priority => "by-priority",
        }
    }

    pub fn categories(self) -> Vec<&'static str> {
        match self {
            Self::Type => ItemType::ALL.iter().map(|value| value.as_str()).collect(),
            Self::Status => ItemStatus::ALL.iter().map(|value| value.as_str()).collect(),
            Self::Priority => PriorityQuadrant::ALL.iter().map(|value| value.as_str()).collect(),
        }
    }
}

/// Category values for one record, one per dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub item_type: ItemType,
    pub status: ItemStatus,
    pub priority: PriorityQuadrant,
}

impl Placement {
    pub fn of(record: &Record) -> Self {
        Self {
            item_type: record.item_type,
            status: record.status,
            priority: record.priority,
        }
    }

    fn category(&self, dimension: Dimension) -> &'static str {
        match dimension {
            Dimension::Type => self.item_type.as_str(),
            Dimension::Status => self.status.as_str(),
            Dimension::Priority => self.priority.as_str(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryShard {
    pub category: String,
    #[serde(default)]
    pub items: Vec<String>,
    pub updated: DateTime<Utc>,
}

impl CategoryShard {
    fn empty(category: &str) -> Self {
        Self {
            category: category.to_string(),
            items: Vec::new(),
            updated: Utc::now(),
        }
    }
}

pub fn index_dir(root: &Path) -> PathBuf {
    root.join(INDEX_DIR)
}

pub fn shard_path(root: &Path, dimension: Dimension, category: &str) -> PathBuf {
    index_dir(root).join(dimension.dir_name()).join(format!("{}.json", category))
}

fn counters_path(root: &Path) -> PathBuf {
    index_dir(root).join(COUNTERS_FILE)
}

pub fn has_sharded_layout(root: &Path) -> bool {
    Dimension::ALL
        .iter()
        .all(|dimension| index_dir(root).join(dimension.dir_name()).is_dir())
        && counters_path(root).is_file()
}

/// Creates every shard that does not exist yet and merges `initial_counters` into the
/// counters shard.
pub fn initialize(root: &Path, initial_counters: &Counters) -> AppResult<()> {
    for dimension in Dimension::ALL {
        for category in dimension.categories() {
            let path = shard_path(root, dimension, category);
            if !path.exists() {
                write_json_atomic(&path, &CategoryShard::empty(category))?;
            }
        }
    }

    let mut counters: Counters = ItemType::ALL
        .iter()
        .map(|item_type| (item_type.prefix().to_string(), 0))
        .collect();
    if counters_path(root).exists() {
        merge_counters(&mut counters, &read_json_file::<Counters>(&counters_path(root))?);
    }
    merge_counters(&mut counters, initial_counters);
    write_json_atomic(&counters_path(root), &counters)?;

    tracing::info!(root = %root.display(), "initialized sharded category index");
    Ok(())
}

fn ensure_layout(root: &Path) -> AppResult<()> {
    if has_sharded_layout(root) {
        return Ok(());
    }
    Err(AppError::NotInitialized(format!(
        "No sharded index under {}",
        index_dir(root).display()
    )))
}

pub fn load_shard(root: &Path, dimension: Dimension, category: &str) -> AppResult<CategoryShard> {
    ensure_layout(root)?;
    let path = shard_path(root, dimension, category);
    if !path.exists() {
        return Ok(CategoryShard::empty(category));
    }
    read_json_file(&path)
}

fn save_shard(root: &Path, dimension: Dimension, shard: &CategoryShard) -> AppResult<()> {
    write_json_atomic(&shard_path(root, dimension, &shard.category), shard)
}

fn add_id(root: &Path, dimension: Dimension, category: &str, id: &str) -> AppResult<bool> {
    let mut shard = load_shard(root, dimension, category)?;
    if shard.items.iter().any(|value| value == id) {
        return Ok(false);
    }
    shard.items.push(id.to_string());
    shard.updated = Utc::now();
    save_shard(root, dimension, &shard)?;
    Ok(true)
}

fn remove_id(root: &Path, dimension: Dimension, category: &str, id: &str) -> AppResult<bool> {
    let mut shard = load_shard(root, dimension, category)?;
    let before = shard.items.len();
    shard.items.retain(|value| value != id);
    if shard.items.len() == before {
        return Ok(false);
    }
    shard.updated = Utc::now();
    save_shard(root, dimension, &shard)?;
    Ok(true)
}

/// Appends the record's ID to its type, status and priority shards.
pub fn add_to_index(root: &Path, record: &Record) -> AppResult<()> {
    let placement = Placement::of(record);
    for dimension in Dimension::ALL {
        add_id(root, dimension, placement.category(dimension), &record.id)?;
    }
    Ok(())
}

pub fn remove_from_index(
    root: &Path,
    id: &str,
    item_type: ItemType,
    status: ItemStatus,
    priority: PriorityQuadrant,
) -> AppResult<()> {
    let placement = Placement {
        item_type,
        status,
        priority,
    };
    for dimension in Dimension::ALL {
        remove_id(root, dimension, placement.category(dimension), id)?;
    }
    Ok(())
}

/// Moves an ID between shards for the dimensions whose value changed.
pub fn reindex(root: &Path, id: &str, before: Placement, after: Placement) -> AppResult<()> {
    for dimension in Dimension::ALL {
        let old = before.category(dimension);
        let new = after.category(dimension);
        if old == new {
            continue;
        }
        remove_id(root, dimension, old, id)?;
        add_id(root, dimension, new, id)?;
        tracing::debug!(id, dimension = dimension.dir_name(), from = old, to = new, "re-bucketed");
    }
    Ok(())
}

pub fn load_by_type(root: &Path, item_type: ItemType) -> AppResult<Vec<String>> {
    Ok(load_shard(root, Dimension::Type, item_type.as_str())?.items)
}

pub fn load_by_status(root: &Path, status: ItemStatus) -> AppResult<Vec<String>> {
    Ok(load_shard(root, Dimension::Status, status.as_str())?.items)
}

pub fn load_by_priority(root: &Path, priority: PriorityQuadrant) -> AppResult<Vec<String>> {
    Ok(load_shard(root, Dimension::Priority, priority.as_str())?.items)
}

/// Union of all type shards, which is the full active-item set.
pub fn load_all_ids(root: &Path) -> AppResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for item_type in ItemType::ALL {
        for id in load_by_type(root, item_type)? {
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
    }
    Ok(ids)
}

pub fn load_counters(root: &Path) -> AppResult<Counters> {
    ensure_layout(root)?;
    read_json_file(&counters_path(root))
}

/// Counters only move forward; lower values in `counters` are ignored.
pub fn update_counters(root: &Path, counters: &Counters) -> AppResult<()> {
    let mut merged = load_counters(root)?;
    merge_counters(&mut merged, counters);
    write_json_atomic(&counters_path(root), &merged)
}

fn merge_counters(into: &mut Counters, from: &Counters) {
    for (prefix, value) in from {
        let entry = into.entry(prefix.clone()).or_insert(0);
        if *value > *entry {
            *entry = *value;
        }
    }
}

/// Issues the next ID for `item_type` and persists the counter before returning.
///
/// Numbers whose document already exists (active or archived) are skipped, so a
/// counters shard that fell behind never hands out an ID twice.
pub fn generate_id(root: &Path, item_type: ItemType) -> AppResult<ItemId> {
    let mut counters = load_counters(root)?;
    let prefix = item_type.prefix().to_string();
    let mut number = counters.get(&prefix).copied().unwrap_or(0) + 1;
    loop {
        let candidate = ItemId::new(item_type, number);
        let taken = store::find_record_path(root, &candidate).is_some()
            || store::archived_record_path(root, &candidate).exists();
        if !taken {
            break;
        }
        tracing::warn!(id = %candidate, "counter behind existing document; skipping");
        number += 1;
    }
    counters.insert(prefix, number);
    write_json_atomic(&counters_path(root), &counters)?;
    Ok(ItemId::new(item_type, number))
}

/// Per-dimension totals plus every ID that sits in more than one shard of a dimension.
pub fn audit(root: &Path) -> AppResult<IndexAudit> {
    let mut report = IndexAudit::default();
    for dimension in Dimension::ALL {
        let mut seen = HashSet::new();
        let mut total = 0usize;
        for category in dimension.categories() {
            for id in load_shard(root, dimension, category)?.items {
                total += 1;
                if !seen.insert(id.clone()) {
                    report.duplicates.push(format!("{}:{}", dimension.dir_name(), id));
                }
            }
        }
        match dimension {
            Dimension::Type => report.by_type_total = total,
            Dimension::Status => report.by_status_total = total,
            Dimension::Priority => report.by_priority_total = total,
        }
    }
    Ok(report)
}

/// Rewrites every shard from the given records. Counters are kept and raised to cover
/// the record IDs.
pub fn rebuild_from_records(root: &Path, records: &[Record]) -> AppResult<()> {
    let mut grouped: BTreeMap<(&'static str, &'static str), Vec<String>> = BTreeMap::new();
    let mut counters = Counters::new();
    for record in records {
        let placement = Placement::of(record);
        for dimension in Dimension::ALL {
            let bucket = grouped
                .entry((dimension.dir_name(), placement.category(dimension)))
                .or_default();
            if !bucket.contains(&record.id) {
                bucket.push(record.id.clone());
            }
        }
        let parsed = record.parsed_id()?;
        let entry = counters.entry(parsed.item_type.prefix().to_string()).or_insert(0);
        *entry = (*entry).max(parsed.number);
    }

    let now = Utc::now();
    for dimension in Dimension::ALL {
        for category in dimension.categories() {
            let items = grouped
                .remove(&(dimension.dir_name(), category))
                .unwrap_or_default();
            let shard = CategoryShard {
                category: category.to_string(),
                items,
                updated: now,
            };
            save_shard(root, dimension, &shard)?;
        }
    }
    initialize(root, &counters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LinkedItems;

    fn record(id: &str, item_type: ItemType, status: ItemStatus, priority: PriorityQuadrant) -> Record {
        let now = Utc::now();
        Record {
            id: id.to_string(),
            item_type,
            status,
            priority,
            title: id.to_string(),
            created: now,
            updated: now,
            linked_items: LinkedItems::default(),
            tags: Vec::new(),
            author: None,
            assignee: None,
            metadata: BTreeMap::new(),
        }
    }

    fn initialized_root() -> tempfile::TempDir {
        let root = tempfile::tempdir().expect("temp root");
        initialize(root.path(), &Counters::new()).expect("initialize");
        root
    }

    #[test]
    fn initialize_creates_every_shard_and_zero_counters() {
        let root = initialized_root();
        assert!(has_sharded_layout(root.path()));
        assert!(shard_path(root.path(), Dimension::Status, "in-progress").exists());
        assert!(shard_path(root.path(), Dimension::Priority, "q4").exists());
        let counters = load_counters(root.path()).expect("counters");
        assert_eq!(counters.get("TASK"), Some(&0));
        assert_eq!(counters.len(), ItemType::ALL.len());
    }

    #[test]
    fn layout_requires_counters_shard() {
        let root = initialized_root();
        std::fs::remove_file(root.path().join("index/counters.json")).expect("remove counters");
        assert!(!has_sharded_layout(root.path()));
        assert!(matches!(
            load_by_type(root.path(), ItemType::Task),
            Err(AppError::NotInitialized(_))
        ));
    }

    #[test]
    fn add_and_remove_touch_exactly_three_shards() {
        let root = initialized_root();
        let task = record("TASK-001", ItemType::Task, ItemStatus::Draft, PriorityQuadrant::Q1);
        add_to_index(root.path(), &task).expect("add");
        add_to_index(root.path(), &task).expect("add twice");

        assert_eq!(load_by_type(root.path(), ItemType::Task).expect("type"), vec!["TASK-001"]);
        assert_eq!(load_by_status(root.path(), ItemStatus::Draft).expect("status"), vec!["TASK-001"]);
        assert_eq!(load_by_priority(root.path(), PriorityQuadrant::Q1).expect("prio"), vec!["TASK-001"]);
        let report = audit(root.path()).expect("audit");
        assert!(report.is_consistent());
        assert_eq!(report.by_type_total, 1);

        remove_from_index(root.path(), "TASK-001", ItemType::Task, ItemStatus::Draft, PriorityQuadrant::Q1)
            .expect("remove");
        assert!(load_all_ids(root.path()).expect("all").is_empty());
    }

    #[test]
    fn reindex_moves_only_changed_dimensions() {
        let root = initialized_root();
        let task = record("TASK-002", ItemType::Task, ItemStatus::Draft, PriorityQuadrant::Q2);
        add_to_index(root.path(), &task).expect("add");
        let before = Placement::of(&task);
        let after = Placement {
            status: ItemStatus::InProgress,
            ..before
        };
        reindex(root.path(), "TASK-002", before, after).expect("reindex");

        assert!(load_by_status(root.path(), ItemStatus::Draft).expect("draft").is_empty());
        assert_eq!(
            load_by_status(root.path(), ItemStatus::InProgress).expect("in progress"),
            vec!["TASK-002"]
        );
        assert!(audit(root.path()).expect("audit").is_consistent());
    }

    #[test]
    fn counters_never_decrease() {
        let root = initialized_root();
        update_counters(root.path(), &Counters::from([("TASK".to_string(), 7)])).expect("raise");
        update_counters(root.path(), &Counters::from([("TASK".to_string(), 3)])).expect("lower");
        assert_eq!(load_counters(root.path()).expect("counters").get("TASK"), Some(&7));
        assert_eq!(generate_id(root.path(), ItemType::Task).expect("id").to_string(), "TASK-008");
    }

    #[test]
    fn generate_id_skips_numbers_with_existing_documents() {
        let root = initialized_root();
        let archived = record("BUG-001", ItemType::Bug, ItemStatus::Done, PriorityQuadrant::Q2);
        write_json_atomic(&root.path().join("archive/bugs/BUG-001.json"), &archived).expect("archived doc");
        assert_eq!(generate_id(root.path(), ItemType::Bug).expect("id").to_string(), "BUG-002");
        assert_eq!(load_counters(root.path()).expect("counters").get("BUG"), Some(&2));
    }

    #[test]
    fn audit_reports_duplicates_within_a_dimension() {
        let root = initialized_root();
        let task = record("TASK-003", ItemType::Task, ItemStatus::Draft, PriorityQuadrant::Q2);
        add_to_index(root.path(), &task).expect("add");
        add_id(root.path(), Dimension::Status, "review", "TASK-003").expect("stray add");
        let report = audit(root.path()).expect("audit");
        assert_eq!(report.duplicates, vec!["by-status:TASK-003".to_string()]);
        assert!(!report.is_consistent());
    }

    #[test]
    fn rebuild_restores_exclusivity() {
        let root = initialized_root();
        add_id(root.path(), Dimension::Status, "review", "TASK-009").expect("stray");
        let records = vec![
            record("TASK-009", ItemType::Task, ItemStatus::Done, PriorityQuadrant::Q3),
            record("EPIC-004", ItemType::Epic, ItemStatus::Planned, PriorityQuadrant::Q1),
        ];
        rebuild_from_records(root.path(), &records).expect("rebuild");
        let report = audit(root.path()).expect("audit");
        assert!(report.is_consistent());
        assert_eq!(report.by_type_total, 2);
        assert_eq!(load_counters(root.path()).expect("counters").get("EPIC"), Some(&4));
    }
}
