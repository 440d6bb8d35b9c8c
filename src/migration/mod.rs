//! Layout migrations for a project root.
//!
//! Both migrations are idempotent. `ensure_full_migration` is cheap when nothing is
//! pending and runs whenever a project is opened or initialized.

mod directory_layout;
mod index_layout;

pub use directory_layout::{migrate_directories, needs_directory_migration};
pub use index_layout::{check_migration_needed, legacy_index_path, migrate_index};

use crate::errors::{AppError, AppResult};
use crate::index;
use crate::models::{FullMigrationReport, MigrationOptions, RollbackReport};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

pub const LEGACY_INDEX_FILE: &str = "index.json";

/// `<file>.<marker>-<YYYYMMDDHHMMSS>`, with a numeric suffix when that name is taken.
pub(crate) fn stamped_sibling(path: &Path, marker: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(LEGACY_INDEX_FILE);
    let stem = format!("{}.{}-{}", file_name, marker, Utc::now().format("%Y%m%d%H%M%S"));
    let mut candidate = path.with_file_name(&stem);
    let mut attempt = 1;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{}-{}", stem, attempt));
        attempt += 1;
    }
    candidate
}

pub fn ensure_full_migration(root: &Path) -> AppResult<FullMigrationReport> {
    if !root.is_dir() {
        return Err(AppError::NotInitialized(format!(
            "Project root {} does not exist",
            root.display()
        )));
    }

    let index = migrate_index(root, &MigrationOptions::default())?;
    let directories = migrate_directories(root)?;

    let mut archived_redundant_legacy = None;
    if legacy_index_path(root).is_file()
        && index::has_sharded_layout(root)
        && !index::load_all_ids(root)?.is_empty()
    {
        let archived = index_layout::archive_legacy_file(root)?;
        tracing::info!(archived = %archived.display(), "archived redundant legacy index");
        archived_redundant_legacy = Some(archived.display().to_string());
    }

    Ok(FullMigrationReport {
        index,
        directories,
        archived_redundant_legacy,
    })
}

/// Puts the newest archived (or backed up) legacy index back in place and drops the
/// sharded index. Record documents are not touched.
pub fn rollback_index_migration(root: &Path) -> AppResult<RollbackReport> {
    let legacy_path = legacy_index_path(root);
    if legacy_path.exists() {
        return Err(AppError::ConflictDetected(format!(
            "{} already exists; refusing to overwrite it",
            legacy_path.display()
        )));
    }
    let (source, is_archived) = index_layout::latest_legacy_copy(root)?.ok_or_else(|| {
        AppError::NotFound(format!("No archived or backed up legacy index under {}", root.display()))
    })?;

    if is_archived {
        fs::rename(&source, &legacy_path)?;
    } else {
        fs::copy(&source, &legacy_path)?;
    }

    let sharded = index::index_dir(root);
    let removed_sharded_index = sharded.is_dir();
    if removed_sharded_index {
        fs::remove_dir_all(&sharded)?;
    }
    tracing::info!(
        restored_from = %source.display(),
        removed_sharded_index,
        "rolled back index migration"
    );
    Ok(RollbackReport {
        restored_from: source.display().to_string(),
        removed_sharded_index,
    })
}
