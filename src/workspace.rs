use crate::config::ProjectConfig;
use crate::errors::{AppError, AppResult};
use crate::index::{self, Counters, Placement};
use crate::migration;
use crate::models::{
    CreateItemRequest, IndexAudit, ItemDetail, ItemStatus, ItemSummary, ItemType, LinkedItems, ListFilter,
    PurgeReport, Record, RelationKind, TraceResult, UpdateItemRequest,
};
use crate::relations;
use crate::store::{self, ARCHIVE_DIR, ITEMS_DIR};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Child kinds that must be closed before their parent can close.
const CLOSING_CHILD_KINDS: [RelationKind; 2] = [RelationKind::ImplementedBy, RelationKind::TestedBy];

/// Creates the directory skeleton, the sharded index and `config.yaml`. Existing
/// projects are migrated first and otherwise left as they are.
pub fn init_project(root: &Path, config: &ProjectConfig) -> AppResult<()> {
    fs::create_dir_all(root)?;
    migration::ensure_full_migration(root)?;

    for item_type in ItemType::ALL {
        fs::create_dir_all(store::items_dir(root, item_type))?;
        fs::create_dir_all(store::archive_dir(root, item_type))?;
    }
    index::initialize(root, &Counters::new())?;
    if !ProjectConfig::path(root).exists() {
        config.save(root)?;
    }
    tracing::info!(root = %root.display(), methodology = config.methodology.as_str(), "initialized project");
    Ok(())
}

pub fn add_item(root: &Path, request: CreateItemRequest) -> AppResult<Record> {
    ensure_initialized(root)?;
    let CreateItemRequest {
        item_type,
        title,
        description,
        status,
        priority,
        tags,
        author,
        assignee,
        metadata,
    } = request;

    let title = title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::ValidationFailed {
            message: "Title must not be empty".to_string(),
            suggestion: None,
        });
    }

    let author = match author {
        Some(author) => Some(author),
        None => ProjectConfig::load(root)?.author,
    };
    let id = index::generate_id(root, item_type)?;
    let now = Utc::now();
    let record = Record {
        id: id.to_string(),
        item_type,
        status: status.unwrap_or_default(),
        priority: priority.unwrap_or_default(),
        title,
        created: now,
        updated: now,
        linked_items: LinkedItems::default(),
        tags,
        author,
        assignee,
        metadata: metadata.into_iter().filter(|(_, value)| !value.is_null()).collect(),
    };

    store::save_record(root, &record)?;
    store::save_body(root, &record.id, description.as_deref().unwrap_or_default())?;
    index::add_to_index(root, &record)?;
    tracing::info!(id = %record.id, item_type = item_type.as_str(), "created item");
    Ok(record)
}

pub fn update_item(root: &Path, id: &str, request: UpdateItemRequest) -> AppResult<Record> {
    ensure_initialized(root)?;
    let mut record = store::load_record(root, id)?;
    let before = Placement::of(&record);

    if let Some(status) = request.status {
        if status.is_closed() && status != record.status {
            check_children_closed(root, &record, status)?;
        }
        record.status = status;
    }
    if let Some(title) = request.title {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::ValidationFailed {
                message: "Title must not be empty".to_string(),
                suggestion: None,
            });
        }
        record.title = title;
    }
    if let Some(priority) = request.priority {
        record.priority = priority;
    }
    if let Some(tags) = request.tags {
        record.tags = tags;
    }
    if let Some(assignee) = request.assignee {
        record.assignee = Some(assignee).filter(|value| !value.trim().is_empty());
    }
    if let Some(patch) = request.metadata {
        merge_metadata(&mut record.metadata, patch);
    }

    record.touch();
    store::save_record(root, &record)?;
    if let Some(description) = request.description {
        store::save_body(root, &record.id, &description)?;
    }
    index::reindex(root, &record.id, before, Placement::of(&record))?;
    tracing::info!(id = %record.id, status = record.status.as_str(), "updated item");
    Ok(record)
}

fn merge_metadata(metadata: &mut BTreeMap<String, Value>, patch: BTreeMap<String, Value>) {
    for (key, value) in patch {
        if value.is_null() {
            metadata.remove(&key);
        } else {
            metadata.insert(key, value);
        }
    }
}

fn check_children_closed(root: &Path, record: &Record, target: ItemStatus) -> AppResult<()> {
    let mut open = Vec::new();
    for kind in CLOSING_CHILD_KINDS {
        for child_id in record.linked_items.targets(kind) {
            match store::load_record(root, child_id) {
                Ok(child) if !child.status.is_closed() => {
                    open.push(format!("{} ({})", child.id, child.status.as_str()));
                }
                Ok(_) => {}
                Err(error) if error.is_not_found() => {
                    tracing::warn!(parent = %record.id, child = %child_id, "skipping missing child while closing");
                }
                Err(error) => return Err(error),
            }
        }
    }
    if open.is_empty() {
        return Ok(());
    }
    Err(AppError::ValidationFailed {
        message: format!(
            "Cannot move {} to {}: open children {}",
            record.id,
            target.as_str(),
            open.join(", ")
        ),
        suggestion: Some("Mark the children done, cancelled or obsolete first".to_string()),
    })
}

pub fn get_item(root: &Path, id: &str) -> AppResult<ItemDetail> {
    let record = store::load_record(root, id)?;
    let body = store::load_body(root, &record.id)?;
    Ok(ItemDetail { record, body })
}

pub fn list_items(root: &Path, filter: &ListFilter) -> AppResult<Vec<ItemSummary>> {
    list_items_with(root, filter, |id| store::load_record(root, id))
}

/// Same as [`list_items`] with a caller-supplied record loader.
pub fn list_items_with<F>(root: &Path, filter: &ListFilter, load: F) -> AppResult<Vec<ItemSummary>>
where
    F: FnMut(&str) -> AppResult<Record>,
{
    ensure_initialized(root)?;
    let records = index::query_records(root, filter, load)?;
    Ok(records.iter().map(ItemSummary::from).collect())
}

/// Moves the record under `archive/` and drops it from every shard. Counters are not
/// touched, so the ID is never issued again.
pub fn archive_item(root: &Path, id: &str) -> AppResult<Record> {
    ensure_initialized(root)?;
    let record = store::load_record(root, id)?;
    store::move_to_archive(root, &record.id)?;
    index::remove_from_index(root, &record.id, record.item_type, record.status, record.priority)?;
    tracing::info!(id = %record.id, "archived item");
    Ok(record)
}

pub fn restore_item(root: &Path, id: &str) -> AppResult<Record> {
    ensure_initialized(root)?;
    let record = store::load_archived_record(root, id)?;
    if store::find_record_path(root, &record.parsed_id()?).is_some() {
        return Err(AppError::ConflictDetected(format!(
            "{} exists both in {} and in {}",
            record.id, ITEMS_DIR, ARCHIVE_DIR
        )));
    }
    store::move_from_archive(root, &record.id)?;
    index::add_to_index(root, &record)?;
    tracing::info!(id = %record.id, "restored item");
    Ok(record)
}

/// Archives every active record matching `filter`. Without a status filter only
/// closed records qualify.
pub fn purge(root: &Path, filter: &ListFilter) -> AppResult<PurgeReport> {
    ensure_initialized(root)?;
    let records = index::query_records(root, filter, |id| store::load_record(root, id))?;

    let mut report = PurgeReport::default();
    for record in records {
        if filter.status.is_none() && !record.status.is_closed() {
            continue;
        }
        match archive_item(root, &record.id) {
            Ok(_) => report.archived.push(record.id),
            Err(error) => {
                tracing::warn!(id = %record.id, error = %error, "purge could not archive item");
                report.skipped.push(record.id);
            }
        }
    }
    tracing::info!(archived = report.archived.len(), skipped = report.skipped.len(), "purge finished");
    Ok(report)
}

pub fn trace(root: &Path, id: &str, kinds: &[RelationKind], max_depth: usize) -> AppResult<TraceResult> {
    relations::walk(id, kinds, max_depth, |item_id| store::load_record(root, item_id))
}

pub fn audit_index(root: &Path) -> AppResult<IndexAudit> {
    ensure_initialized(root)?;
    index::audit(root)
}

/// Rewrites every shard from the active record documents.
pub fn rebuild_index(root: &Path) -> AppResult<IndexAudit> {
    if !root.is_dir() {
        return Err(not_initialized(root));
    }
    let records = store::scan_active_records(root)?;
    index::rebuild_from_records(root, &records)?;
    tracing::info!(root = %root.display(), items = records.len(), "rebuilt category index");
    index::audit(root)
}

fn ensure_initialized(root: &Path) -> AppResult<()> {
    if root.is_dir() && index::has_sharded_layout(root) {
        return Ok(());
    }
    Err(not_initialized(root))
}

fn not_initialized(root: &Path) -> AppError {
    AppError::NotInitialized(format!("No project found at {}", root.display()))
}
