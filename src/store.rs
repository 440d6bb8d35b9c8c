//! One JSON document plus one markdown body per work item.
//!
//! Active records live at `items/<type-plural>/<ID>.json` with the body in a sibling
//! `<ID>.md`; archived records keep the same shape under `archive/`. Records written
//! before the nested `items/` layout existed are still readable from `<type-plural>/`
//! directly under the root until the directory migration moves them.

use crate::errors::{AppError, AppResult};
use crate::models::{ItemId, ItemType, Record};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const ITEMS_DIR: &str = "items";
pub const ARCHIVE_DIR: &str = "archive";

pub fn items_dir(root: &Path, item_type: ItemType) -> PathBuf {
    root.join(ITEMS_DIR).join(item_type.plural())
}

pub fn archive_dir(root: &Path, item_type: ItemType) -> PathBuf {
    root.join(ARCHIVE_DIR).join(item_type.plural())
}

/// Pre-migration flat directory, `<root>/<type-plural>/`.
pub fn flat_dir(root: &Path, item_type: ItemType) -> PathBuf {
    root.join(item_type.plural())
}

pub fn record_path(root: &Path, id: &ItemId) -> PathBuf {
    items_dir(root, id.item_type).join(format!("{}.json", id))
}

pub fn archived_record_path(root: &Path, id: &ItemId) -> PathBuf {
    archive_dir(root, id.item_type).join(format!("{}.json", id))
}

fn flat_record_path(root: &Path, id: &ItemId) -> PathBuf {
    flat_dir(root, id.item_type).join(format!("{}.json", id))
}

fn body_path_for(json_path: &Path) -> PathBuf {
    json_path.with_extension("md")
}

/// Resolves an active record, preferring the nested layout over the flat one.
pub fn find_record_path(root: &Path, id: &ItemId) -> Option<PathBuf> {
    let nested = record_path(root, id);
    if nested.exists() {
        return Some(nested);
    }
    let flat = flat_record_path(root, id);
    if flat.exists() {
        return Some(flat);
    }
    None
}

pub fn load_record(root: &Path, id: &str) -> AppResult<Record> {
    let parsed = ItemId::parse(id)?;
    let path = find_record_path(root, &parsed)
        .ok_or_else(|| AppError::NotFound(format!("Item '{}' not found", parsed)))?;
    read_record_file(&path, &parsed)
}

pub fn load_archived_record(root: &Path, id: &str) -> AppResult<Record> {
    let parsed = ItemId::parse(id)?;
    let path = archived_record_path(root, &parsed);
    if !path.exists() {
        return Err(AppError::NotFound(format!("Archived item '{}' not found", parsed)));
    }
    read_record_file(&path, &parsed)
}

pub fn read_record_file(path: &Path, expected: &ItemId) -> AppResult<Record> {
    let record: Record = read_json_file(path)?;
    record.check_identity()?;
    if ItemId::parse(&record.id)? != *expected {
        return Err(AppError::InvalidId(format!(
            "{} contains '{}', expected '{}'",
            path.display(),
            record.id,
            expected
        )));
    }
    Ok(record)
}

/// Overwrites the active document. Callers bump `updated` first.
pub fn save_record(root: &Path, record: &Record) -> AppResult<PathBuf> {
    record.check_identity()?;
    let parsed = record.parsed_id()?;
    let path = record_path(root, &parsed);
    write_json_atomic(&path, record)?;
    retire_flat_copy(root, &parsed, &path)?;
    Ok(path)
}

/// Drops the flat-layout copy of a record that now lives under `items/`. A flat body
/// moves along unless the nested side already has one.
fn retire_flat_copy(root: &Path, id: &ItemId, nested: &Path) -> AppResult<()> {
    let flat = flat_record_path(root, id);
    if !flat.exists() {
        return Ok(());
    }
    fs::remove_file(&flat)?;
    let flat_body = body_path_for(&flat);
    if flat_body.exists() {
        let nested_body = body_path_for(nested);
        if nested_body.exists() {
            fs::remove_file(&flat_body)?;
        } else {
            fs::rename(&flat_body, &nested_body)?;
        }
    }
    tracing::info!(id = %id, from = %flat.display(), "moved flat-layout record into items/");
    Ok(())
}

pub fn load_body(root: &Path, id: &str) -> AppResult<String> {
    let parsed = ItemId::parse(id)?;
    let json_path = find_record_path(root, &parsed)
        .ok_or_else(|| AppError::NotFound(format!("Item '{}' not found", parsed)))?;
    let path = body_path_for(&json_path);
    if !path.exists() {
        return Ok(String::new());
    }
    Ok(fs::read_to_string(path)?)
}

pub fn save_body(root: &Path, id: &str, body: &str) -> AppResult<()> {
    let parsed = ItemId::parse(id)?;
    let path = body_path_for(&record_path(root, &parsed));
    write_atomic(&path, body.as_bytes())
}

/// Moves the document and body from active storage into `archive/`.
pub fn move_to_archive(root: &Path, id: &str) -> AppResult<PathBuf> {
    let parsed = ItemId::parse(id)?;
    let source = find_record_path(root, &parsed)
        .ok_or_else(|| AppError::NotFound(format!("Item '{}' not found", parsed)))?;
    let destination = archived_record_path(root, &parsed);
    move_document(&source, &destination)?;
    Ok(destination)
}

pub fn move_from_archive(root: &Path, id: &str) -> AppResult<PathBuf> {
    let parsed = ItemId::parse(id)?;
    let source = archived_record_path(root, &parsed);
    if !source.exists() {
        return Err(AppError::NotFound(format!("Archived item '{}' not found", parsed)));
    }
    let destination = record_path(root, &parsed);
    move_document(&source, &destination)?;
    Ok(destination)
}

/// Every readable active record, type by type. Documents that fail to parse or whose
/// name disagrees with their content are skipped with a warning.
pub fn scan_active_records(root: &Path) -> AppResult<Vec<Record>> {
    let mut records = Vec::new();
    for item_type in ItemType::ALL {
        let dir = items_dir(root, item_type);
        if !dir.is_dir() {
            continue;
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        for path in paths {
            let stem = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or_default();
            let loaded = ItemId::parse(stem).and_then(|expected| read_record_file(&path, &expected));
            match loaded {
                Ok(record) => records.push(record),
                Err(error) => {
                    tracing::warn!(path = %path.display(), error = %error, "skipping unreadable record document");
                }
            }
        }
    }
    Ok(records)
}

fn move_document(source: &Path, destination: &Path) -> AppResult<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(source, destination)?;
    let body_source = body_path_for(source);
    if body_source.exists() {
        fs::rename(&body_source, body_path_for(destination))?;
    }
    Ok(())
}

pub(crate) fn read_json_file<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes)
        .map_err(|error| AppError::Internal(format!("Invalid JSON in {}: {}", path.display(), error)))
}

pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

/// Write-temp-then-rename; narrows the torn-write window to the rename itself.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemStatus, LinkedItems, PriorityQuadrant};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn sample_record(id: &str, item_type: ItemType) -> Record {
        let now = Utc::now();
        Record {
            id: id.to_string(),
            item_type,
            status: ItemStatus::Draft,
            priority: PriorityQuadrant::Q2,
            title: format!("Record {}", id),
            created: now,
            updated: now,
            linked_items: LinkedItems::default(),
            tags: vec!["core".to_string()],
            author: Some("tester".to_string()),
            assignee: None,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn save_then_load_returns_same_record() {
        let root = tempfile::tempdir().expect("temp root");
        let record = sample_record("TASK-001", ItemType::Task);
        let path = save_record(root.path(), &record).expect("save");
        assert_eq!(path, root.path().join("items/tasks/TASK-001.json"));
        assert!(!root.path().join("items/tasks/TASK-001.json.tmp").exists());

        let loaded = load_record(root.path(), "TASK-001").expect("load");
        assert_eq!(loaded, record);
    }

    #[test]
    fn load_distinguishes_invalid_id_from_missing_file() {
        let root = tempfile::tempdir().expect("temp root");
        assert!(matches!(load_record(root.path(), "NOPE"), Err(AppError::InvalidId(_))));
        assert!(matches!(load_record(root.path(), "TASK-404"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn body_is_optional_and_roundtrips() {
        let root = tempfile::tempdir().expect("temp root");
        save_record(root.path(), &sample_record("BUG-002", ItemType::Bug)).expect("save");
        assert_eq!(load_body(root.path(), "BUG-002").expect("empty body"), "");
        save_body(root.path(), "BUG-002", "Steps to reproduce").expect("save body");
        assert_eq!(load_body(root.path(), "BUG-002").expect("body"), "Steps to reproduce");
    }

    #[test]
    fn flat_layout_records_are_still_found() {
        let root = tempfile::tempdir().expect("temp root");
        let record = sample_record("STORY-003", ItemType::Story);
        write_json_atomic(&root.path().join("stories/STORY-003.json"), &record).expect("write flat");
        let loaded = load_record(root.path(), "STORY-003").expect("load flat");
        assert_eq!(loaded.id, "STORY-003");
    }

    #[test]
    fn saving_a_flat_record_moves_it_and_its_body_into_items() {
        let root = tempfile::tempdir().expect("temp root");
        let mut record = sample_record("STORY-003", ItemType::Story);
        write_json_atomic(&root.path().join("stories/STORY-003.json"), &record).expect("write flat");
        fs::write(root.path().join("stories/STORY-003.md"), "Acceptance notes").expect("write flat body");

        record.title = "Renamed".to_string();
        save_record(root.path(), &record).expect("save");

        assert!(!root.path().join("stories/STORY-003.json").exists());
        assert!(!root.path().join("stories/STORY-003.md").exists());
        assert_eq!(
            find_record_path(root.path(), &ItemId::parse("STORY-003").expect("id")),
            Some(root.path().join("items/stories/STORY-003.json"))
        );
        assert_eq!(load_body(root.path(), "STORY-003").expect("body"), "Acceptance notes");

        move_to_archive(root.path(), "STORY-003").expect("archive");
        assert!(matches!(load_record(root.path(), "STORY-003"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn document_with_foreign_id_is_rejected() {
        let root = tempfile::tempdir().expect("temp root");
        let record = sample_record("TASK-002", ItemType::Task);
        write_json_atomic(&root.path().join("items/tasks/TASK-001.json"), &record).expect("write");
        assert!(matches!(load_record(root.path(), "TASK-001"), Err(AppError::InvalidId(_))));
    }

    #[test]
    fn archive_moves_document_and_body_both_ways() {
        let root = tempfile::tempdir().expect("temp root");
        save_record(root.path(), &sample_record("EPIC-001", ItemType::Epic)).expect("save");
        save_body(root.path(), "EPIC-001", "Vision").expect("body");

        move_to_archive(root.path(), "EPIC-001").expect("archive");
        assert!(matches!(load_record(root.path(), "EPIC-001"), Err(AppError::NotFound(_))));
        assert!(root.path().join("archive/epics/EPIC-001.md").exists());
        assert_eq!(load_archived_record(root.path(), "EPIC-001").expect("archived").id, "EPIC-001");

        move_from_archive(root.path(), "EPIC-001").expect("restore");
        assert_eq!(load_body(root.path(), "EPIC-001").expect("body"), "Vision");
    }

    #[test]
    fn scan_skips_malformed_documents() {
        let root = tempfile::tempdir().expect("temp root");
        save_record(root.path(), &sample_record("TASK-001", ItemType::Task)).expect("task");
        save_record(root.path(), &sample_record("BUG-001", ItemType::Bug)).expect("bug");
        fs::write(root.path().join("items/tasks/TASK-002.json"), b"{ not json").expect("garbage");
        fs::write(root.path().join("items/tasks/notes.json"), b"{}").expect("stray");

        let ids: Vec<_> = scan_active_records(root.path())
            .expect("scan")
            .into_iter()
            .map(|record| record.id)
            .collect();
        assert_eq!(ids, vec!["TASK-001".to_string(), "BUG-001".to_string()]);
    }
}
