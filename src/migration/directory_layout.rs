//! Flat `<type-plural>/` directories to the nested `items/<type-plural>/` layout.

use crate::errors::AppResult;
use crate::models::{DirectoryMigrationReport, ItemType};
use crate::store::{self, ITEMS_DIR};
use std::fs;
use std::path::Path;

pub fn needs_directory_migration(root: &Path) -> bool {
    !root.join(ITEMS_DIR).exists()
        && ItemType::ALL
            .iter()
            .any(|item_type| store::flat_dir(root, *item_type).is_dir())
}

/// Moves every file type by type. A destination that already exists is left alone and
/// the source file stays where it is.
pub fn migrate_directories(root: &Path) -> AppResult<DirectoryMigrationReport> {
    if !needs_directory_migration(root) {
        return Ok(DirectoryMigrationReport::default());
    }

    let mut report = DirectoryMigrationReport {
        migrated: true,
        ..DirectoryMigrationReport::default()
    };
    for item_type in ItemType::ALL {
        let old_dir = store::flat_dir(root, item_type);
        if !old_dir.is_dir() {
            continue;
        }
        let new_dir = store::items_dir(root, item_type);
        fs::create_dir_all(&new_dir)?;

        for entry in fs::read_dir(&old_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let destination = new_dir.join(entry.file_name());
            if destination.exists() {
                tracing::warn!(
                    source = %entry.path().display(),
                    destination = %destination.display(),
                    "destination already exists; leaving file in flat directory"
                );
                continue;
            }
            fs::rename(entry.path(), &destination)?;
            report.moved_files += 1;
        }

        match fs::remove_dir(&old_dir) {
            Ok(()) => report.removed_dirs.push(item_type.plural().to_string()),
            Err(error) => {
                tracing::warn!(path = %old_dir.display(), error = %error, "could not remove flat directory");
            }
        }
    }

    tracing::info!(
        root = %root.display(),
        moved_files = report.moved_files,
        "moved records into nested items/ layout"
    );
    Ok(report)
}
