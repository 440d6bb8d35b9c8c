pub mod cache;
pub mod config;
pub mod errors;
pub mod index;
pub mod migration;
pub mod models;
pub mod relations;
pub mod store;
pub mod workspace;

use crate::cache::RecordCache;
use crate::config::ProjectConfig;
use crate::errors::AppResult;
use crate::models::{
    CreateItemRequest, FullMigrationReport, IndexAudit, IndexMigrationReport, ItemDetail, ItemSummary, LinkResult,
    ListFilter, MigrationCheck, MigrationOptions, PurgeReport, Record, RelationKind, RollbackReport, TraceResult,
    UpdateItemRequest,
};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;

pub use crate::errors::AppError;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// A project root plus the read cache shared by its operations.
///
/// Opening a tracker brings the on-disk layout up to date. Every write made through
/// the tracker invalidates the cached records it touched.
#[derive(Debug)]
pub struct Tracker {
    root: PathBuf,
    cache: RecordCache,
    last_migration: FullMigrationReport,
}

impl Tracker {
    /// Initializes `root` as a project (idempotent) and opens it.
    pub fn init(root: impl Into<PathBuf>, config: &ProjectConfig) -> AppResult<Self> {
        let root = root.into();
        workspace::init_project(&root, config)?;
        Self::open(root)
    }

    pub fn open(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        let last_migration = migration::ensure_full_migration(&root)?;
        let config = ProjectConfig::load(&root)?;
        tracing::debug!(root = %root.display(), ttl_secs = config.cache_ttl_secs, "opened tracker");
        Ok(Self {
            cache: RecordCache::new(config.cache_ttl()),
            root,
            last_migration,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    /// What the migration run at open time did.
    pub fn last_migration(&self) -> &FullMigrationReport {
        &self.last_migration
    }

    pub fn config(&self) -> AppResult<ProjectConfig> {
        ProjectConfig::load(&self.root)
    }

    pub fn add(&self, request: CreateItemRequest) -> AppResult<Record> {
        workspace::add_item(&self.root, request)
    }

    pub fn update(&self, id: &str, request: UpdateItemRequest) -> AppResult<Record> {
        let result = workspace::update_item(&self.root, id, request);
        self.cache.invalidate_id(&self.root, id);
        result
    }

    pub fn get(&self, id: &str) -> AppResult<ItemDetail> {
        let record = self.cache.load(&self.root, id)?;
        let body = store::load_body(&self.root, &record.id)?;
        Ok(ItemDetail { record, body })
    }

    pub fn list(&self, filter: &ListFilter) -> AppResult<Vec<ItemSummary>> {
        workspace::list_items_with(&self.root, filter, |id| self.cache.load(&self.root, id))
    }

    pub fn link(&self, source_id: &str, kind: RelationKind, target_id: &str) -> AppResult<LinkResult> {
        let result = relations::link_items(&self.root, source_id, kind, target_id);
        self.invalidate_pair(source_id, target_id);
        result
    }

    pub fn unlink(&self, source_id: &str, kind: RelationKind, target_id: &str) -> AppResult<LinkResult> {
        let result = relations::unlink_items(&self.root, source_id, kind, target_id);
        self.invalidate_pair(source_id, target_id);
        result
    }

    pub fn archive(&self, id: &str) -> AppResult<Record> {
        let result = workspace::archive_item(&self.root, id);
        self.cache.invalidate_id(&self.root, id);
        result
    }

    pub fn restore(&self, id: &str) -> AppResult<Record> {
        let result = workspace::restore_item(&self.root, id);
        self.cache.invalidate_id(&self.root, id);
        result
    }

    pub fn purge(&self, filter: &ListFilter) -> AppResult<PurgeReport> {
        let result = workspace::purge(&self.root, filter);
        self.cache.clear();
        result
    }

    pub fn trace(&self, id: &str, kinds: &[RelationKind], max_depth: usize) -> AppResult<TraceResult> {
        relations::walk(id, kinds, max_depth, |item_id| self.cache.load(&self.root, item_id))
    }

    pub fn audit(&self) -> AppResult<IndexAudit> {
        workspace::audit_index(&self.root)
    }

    pub fn rebuild_index(&self) -> AppResult<IndexAudit> {
        workspace::rebuild_index(&self.root)
    }

    pub fn check_migration(&self) -> AppResult<MigrationCheck> {
        migration::check_migration_needed(&self.root)
    }

    pub fn migrate_index(&self, options: &MigrationOptions) -> AppResult<IndexMigrationReport> {
        let result = migration::migrate_index(&self.root, options);
        self.cache.clear();
        result
    }

    /// Restores the legacy `index.json`. The tracker stays usable for reads of record
    /// documents, but index-backed operations fail until the project is opened again.
    pub fn rollback_migration(&self) -> AppResult<RollbackReport> {
        let result = migration::rollback_index_migration(&self.root);
        self.cache.clear();
        result
    }

    fn invalidate_pair(&self, source_id: &str, target_id: &str) {
        self.cache.invalidate_id(&self.root, source_id);
        self.cache.invalidate_id(&self.root, target_id);
    }
}

/// Installs a JSON subscriber writing to a daily rolling file under `log_dir`.
pub fn init_tracing(log_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "backlog.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| anyhow::anyhow!(error.to_string()))
}
