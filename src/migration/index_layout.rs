//! Legacy `index.json` to sharded `index/` conversion.

use super::{stamped_sibling, LEGACY_INDEX_FILE};
use crate::errors::{AppError, AppResult};
use crate::index::{self, Counters};
use crate::models::{IndexMigrationReport, ItemId, ItemType, MigrationCheck, MigrationOptions, Record};
use crate::store::{self, read_json_file};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const BACKUP_MARKER: &str = "backup";
const ARCHIVE_MARKER: &str = "archived";

#[derive(Debug, Deserialize)]
struct LegacyIndex {
    #[serde(default)]
    items: Vec<LegacyItem>,
    #[serde(default)]
    counters: Counters,
}

/// Only the ID matters; the full record is read from its own document.
#[derive(Debug, Deserialize)]
struct LegacyItem {
    id: String,
}

pub fn legacy_index_path(root: &Path) -> PathBuf {
    root.join(LEGACY_INDEX_FILE)
}

fn read_legacy(root: &Path) -> AppResult<LegacyIndex> {
    read_json_file(&legacy_index_path(root))
}

/// Legacy counters were sometimes keyed by type name instead of prefix.
fn normalize_counters(raw: &Counters) -> Counters {
    raw.iter()
        .map(|(key, value)| {
            let prefix = key
                .parse::<ItemType>()
                .map(|item_type| item_type.prefix().to_string())
                .unwrap_or_else(|_| key.to_ascii_uppercase());
            (prefix, *value)
        })
        .collect()
}

pub fn check_migration_needed(root: &Path) -> AppResult<MigrationCheck> {
    let has_legacy = legacy_index_path(root).is_file();
    let has_sharded = index::has_sharded_layout(root);
    let item_count = if has_legacy {
        read_legacy(root)?.items.len()
    } else if has_sharded {
        index::load_all_ids(root)?.len()
    } else {
        0
    };
    Ok(MigrationCheck {
        needed: has_legacy && !has_sharded,
        has_legacy,
        has_sharded,
        item_count,
    })
}

/// Converts the legacy monolithic index into the sharded layout.
///
/// Never runs when a sharded layout already exists. On any failure after the sharded
/// directory was created it is removed again, and the legacy file is left in place so
/// the migration can be retried.
pub fn migrate_index(root: &Path, options: &MigrationOptions) -> AppResult<IndexMigrationReport> {
    let check = check_migration_needed(root)?;
    if check.has_sharded {
        if check.is_ambiguous() {
            tracing::warn!(
                root = %root.display(),
                legacy_items = check.item_count,
                "legacy index.json and sharded index both present; leaving both untouched"
            );
        }
        return Ok(IndexMigrationReport {
            message: if check.is_ambiguous() {
                "Sharded index already exists alongside legacy index.json; not migrating".to_string()
            } else {
                "Sharded index already exists".to_string()
            },
            ..IndexMigrationReport::default()
        });
    }
    if !check.has_legacy {
        return Ok(IndexMigrationReport {
            message: "No legacy index to migrate".to_string(),
            ..IndexMigrationReport::default()
        });
    }

    let legacy = read_legacy(root)?;
    let legacy_path = legacy_index_path(root);
    tracing::info!(root = %root.display(), items = legacy.items.len(), "migrating legacy index");

    let backup_path = if options.skip_backup {
        None
    } else {
        let backup = stamped_sibling(&legacy_path, BACKUP_MARKER);
        fs::copy(&legacy_path, &backup)?;
        Some(backup)
    };

    let defaulted_priority = match populate_and_verify(root, &legacy) {
        Ok(defaulted) => defaulted,
        Err(error) => {
            tracing::warn!(error = %error, "index migration aborted; removing partial sharded index");
            if let Err(cleanup) = fs::remove_dir_all(index::index_dir(root)) {
                tracing::warn!(error = %cleanup, "could not remove partial sharded index");
            }
            return Err(error);
        }
    };

    let archived = stamped_sibling(&legacy_path, ARCHIVE_MARKER);
    fs::rename(&legacy_path, &archived)?;
    tracing::info!(
        items = legacy.items.len(),
        archived = %archived.display(),
        "legacy index migrated and archived"
    );

    Ok(IndexMigrationReport {
        migrated: true,
        item_count: legacy.items.len(),
        defaulted_priority,
        backup_path: backup_path.map(|path| path.display().to_string()),
        archived_legacy_path: Some(archived.display().to_string()),
        message: format!("Migrated {} items to the sharded index", legacy.items.len()),
    })
}

fn populate_and_verify(root: &Path, legacy: &LegacyIndex) -> AppResult<Vec<String>> {
    let mut counters = normalize_counters(&legacy.counters);
    index::initialize(root, &counters)?;

    let mut defaulted = Vec::new();
    for item in &legacy.items {
        let (record, had_priority) = load_for_migration(root, &item.id)?;
        if !had_priority {
            defaulted.push(record.id.clone());
        }
        let parsed = record.parsed_id()?;
        let entry = counters.entry(parsed.item_type.prefix().to_string()).or_insert(0);
        *entry = (*entry).max(parsed.number);
        index::add_to_index(root, &record)?;
    }
    index::update_counters(root, &counters)?;

    verify(root, legacy.items.len())?;
    Ok(defaulted)
}

/// Reads the full record and reports whether its document carried a priority.
fn load_for_migration(root: &Path, id: &str) -> AppResult<(Record, bool)> {
    let parsed = ItemId::parse(id)?;
    let path = store::find_record_path(root, &parsed).ok_or_else(|| {
        AppError::IntegrityViolation(format!(
            "Legacy index references {} but no record document exists",
            parsed
        ))
    })?;
    let raw: Value = read_json_file(&path)?;
    let had_priority = raw.get("priority").is_some_and(|value| !value.is_null());
    let record: Record = serde_json::from_value(raw)?;
    record.check_identity()?;
    Ok((record, had_priority))
}

fn verify(root: &Path, expected: usize) -> AppResult<()> {
    let audit = index::audit(root)?;
    if !audit.duplicates.is_empty() {
        return Err(AppError::IntegrityViolation(format!(
            "IDs present in more than one shard: {}",
            audit.duplicates.join(", ")
        )));
    }
    for (dimension, total) in [
        ("by-type", audit.by_type_total),
        ("by-status", audit.by_status_total),
        ("by-priority", audit.by_priority_total),
    ] {
        if total != expected {
            return Err(AppError::IntegrityViolation(format!(
                "{} shards hold {} items, legacy index lists {}",
                dimension, total, expected
            )));
        }
    }
    Ok(())
}

pub(crate) fn archive_legacy_file(root: &Path) -> AppResult<PathBuf> {
    let legacy_path = legacy_index_path(root);
    let archived = stamped_sibling(&legacy_path, ARCHIVE_MARKER);
    fs::rename(&legacy_path, &archived)?;
    Ok(archived)
}

/// Newest archived legacy file, falling back to the newest backup. Copies order by
/// timestamp, then by collision suffix.
pub(crate) fn latest_legacy_copy(root: &Path) -> AppResult<Option<(PathBuf, bool)>> {
    let archived_prefix = format!("{}.{}-", LEGACY_INDEX_FILE, ARCHIVE_MARKER);
    let backup_prefix = format!("{}.{}-", LEGACY_INDEX_FILE, BACKUP_MARKER);
    let mut archived = Vec::new();
    let mut backups = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if let Some(stamp) = name.strip_prefix(&archived_prefix) {
            archived.push((stamp_order(stamp), path));
        } else if let Some(stamp) = name.strip_prefix(&backup_prefix) {
            backups.push((stamp_order(stamp), path));
        }
    }
    let newest = |copies: Vec<((String, u32), PathBuf)>| {
        copies.into_iter().max_by(|left, right| left.0.cmp(&right.0)).map(|(_, path)| path)
    };
    if let Some(path) = newest(archived) {
        return Ok(Some((path, true)));
    }
    Ok(newest(backups).map(|path| (path, false)))
}

/// `20250101120000-12` sorts as `("20250101120000", 12)`; no suffix counts as attempt 0.
fn stamp_order(stamp: &str) -> (String, u32) {
    match stamp.split_once('-') {
        Some((time, attempt)) => (time.to_string(), attempt.parse().unwrap_or(0)),
        None => (stamp.to_string(), 0),
    }
}
