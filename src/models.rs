use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

static ITEM_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]+)-([0-9]+)$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemType {
    Epic,
    Story,
    Task,
    Requirement,
    Feature,
    Bug,
    Spike,
    Test,
}

impl ItemType {
    pub const ALL: [ItemType; 8] = [
        Self::Epic,
        Self::Story,
        Self::Task,
        Self::Requirement,
        Self::Feature,
        Self::Bug,
        Self::Spike,
        Self::Test,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Epic => "epic",
            Self::Story => "story",
            Self::Task => "task",
            Self::Requirement => "requirement",
            Self::Feature => "feature",
            Self::Bug => "bug",
            Self::Spike => "spike",
            Self::Test => "test",
        }
    }

    /// Upper-case prefix used in item IDs and the counters shard.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Epic => "EPIC",
            Self::Story => "STORY",
            Self::Task => "TASK",
            Self::Requirement => "REQ",
            Self::Feature => "FEAT",
            Self::Bug => "BUG",
            Self::Spike => "SPIKE",
            Self::Test => "TEST",
        }
    }

    /// Directory name under `items/` and `archive/`.
    pub fn plural(self) -> &'static str {
        match self {
            Self::Epic => "epics",
            Self::Story => "stories",
            Self::Task => "tasks",
            Self::Requirement => "requirements",
            Self::Feature => "features",
            Self::Bug => "bugs",
            Self::Spike => "spikes",
            Self::Test => "tests",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|value| value.prefix() == prefix)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Epic => "Epic",
            Self::Story => "Story",
            Self::Task => "Task",
            Self::Requirement => "Requirement",
            Self::Feature => "Feature",
            Self::Bug => "Bug",
            Self::Spike => "Spike",
            Self::Test => "Test",
        }
    }
}

impl FromStr for ItemType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|item_type| item_type.as_str() == normalized)
            .ok_or_else(|| AppError::InvalidId(format!("Unknown item type '{}'", value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ItemStatus {
    #[default]
    Draft,
    Planned,
    InProgress,
    Review,
    Done,
    Blocked,
    Cancelled,
    Obsolete,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 8] = [
        Self::Draft,
        Self::Planned,
        Self::InProgress,
        Self::Review,
        Self::Done,
        Self::Blocked,
        Self::Cancelled,
        Self::Obsolete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Planned => "planned",
            Self::InProgress => "in-progress",
            Self::Review => "review",
            Self::Done => "done",
            Self::Blocked => "blocked",
            Self::Cancelled => "cancelled",
            Self::Obsolete => "obsolete",
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Obsolete)
    }
}

impl FromStr for ItemStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| AppError::ValidationFailed {
                message: format!("Unknown status '{}'", value),
                suggestion: Some(format!(
                    "Use one of: {}",
                    Self::ALL.map(Self::as_str).join(", ")
                )),
            })
    }
}

/// Eisenhower quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityQuadrant {
    /// Urgent and important.
    Q1,
    /// Important, not urgent.
    #[default]
    Q2,
    /// Urgent, not important.
    Q3,
    /// Neither urgent nor important.
    Q4,
}

impl PriorityQuadrant {
    pub const ALL: [PriorityQuadrant; 4] = [Self::Q1, Self::Q2, Self::Q3, Self::Q4];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Q1 => "q1",
            Self::Q2 => "q2",
            Self::Q3 => "q3",
            Self::Q4 => "q4",
        }
    }
}

impl FromStr for PriorityQuadrant {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|quadrant| quadrant.as_str() == normalized)
            .ok_or_else(|| AppError::ValidationFailed {
                message: format!("Unknown priority quadrant '{}'", value),
                suggestion: Some("Use one of: q1, q2, q3, q4".to_string()),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    Implements,
    ImplementedBy,
    Blocks,
    BlockedBy,
    RelatesTo,
    DependsOn,
    RequiredBy,
    TestedBy,
    Tests,
    Supersedes,
    SupersededBy,
}

impl RelationKind {
    pub const ALL: [RelationKind; 11] = [
        Self::Implements,
        Self::ImplementedBy,
        Self::Blocks,
        Self::BlockedBy,
        Self::RelatesTo,
        Self::DependsOn,
        Self::RequiredBy,
        Self::TestedBy,
        Self::Tests,
        Self::Supersedes,
        Self::SupersededBy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Implements => "implements",
            Self::ImplementedBy => "implemented-by",
            Self::Blocks => "blocks",
            Self::BlockedBy => "blocked-by",
            Self::RelatesTo => "relates-to",
            Self::DependsOn => "depends-on",
            Self::RequiredBy => "required-by",
            Self::TestedBy => "tested-by",
            Self::Tests => "tests",
            Self::Supersedes => "supersedes",
            Self::SupersededBy => "superseded-by",
        }
    }

    /// Edge materialized on the target when this edge is created on the source.
    pub fn inverse(self) -> RelationKind {
        match self {
            Self::Implements => Self::ImplementedBy,
            Self::ImplementedBy => Self::Implements,
            Self::Blocks => Self::BlockedBy,
            Self::BlockedBy => Self::Blocks,
            Self::RelatesTo => Self::RelatesTo,
            Self::DependsOn => Self::RequiredBy,
            Self::RequiredBy => Self::DependsOn,
            Self::TestedBy => Self::Tests,
            Self::Tests => Self::TestedBy,
            Self::Supersedes => Self::SupersededBy,
            Self::SupersededBy => Self::Supersedes,
        }
    }

    pub fn is_hierarchy(self) -> bool {
        matches!(
            self,
            Self::Implements | Self::ImplementedBy | Self::Blocks | Self::BlockedBy
        )
    }

    pub fn is_flexible(self) -> bool {
        !self.is_hierarchy()
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| AppError::ValidationFailed {
                message: format!("Unknown relation kind '{}'", value),
                suggestion: Some(format!(
                    "Use one of: {}",
                    Self::ALL.map(Self::as_str).join(", ")
                )),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Methodology {
    #[default]
    Scrum,
    Waterfall,
    Hybrid,
}

impl Methodology {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scrum => "scrum",
            Self::Waterfall => "waterfall",
            Self::Hybrid => "hybrid",
        }
    }
}

/// Parsed form of `<PREFIX>-<number>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId {
    pub item_type: ItemType,
    pub number: u64,
}

impl ItemId {
    pub fn new(item_type: ItemType, number: u64) -> Self {
        Self { item_type, number }
    }

    pub fn parse(value: &str) -> AppResult<Self> {
        let captures = ITEM_ID_PATTERN
            .captures(value.trim())
            .ok_or_else(|| AppError::InvalidId(format!("'{}' does not match <PREFIX>-<number>", value)))?;
        let prefix = &captures[1];
        let item_type = ItemType::from_prefix(prefix)
            .ok_or_else(|| AppError::InvalidId(format!("Unknown type prefix '{}' in '{}'", prefix, value)))?;
        let number = captures[2]
            .parse::<u64>()
            .map_err(|_| AppError::InvalidId(format!("Numeric suffix out of range in '{}'", value)))?;
        Ok(Self { item_type, number })
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:03}", self.item_type.prefix(), self.number)
    }
}

/// Relation kind to ordered, duplicate-free target IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkedItems(BTreeMap<RelationKind, Vec<String>>);

impl LinkedItems {
    pub fn targets(&self, kind: RelationKind) -> &[String] {
        self.0.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, kind: RelationKind, id: &str) -> bool {
        self.targets(kind).iter().any(|value| value == id)
    }

    /// Returns false when the edge already existed.
    pub fn insert(&mut self, kind: RelationKind, id: &str) -> bool {
        let targets = self.0.entry(kind).or_default();
        if targets.iter().any(|value| value == id) {
            return false;
        }
        targets.push(id.to_string());
        true
    }

    /// Returns false when the edge was absent.
    pub fn remove(&mut self, kind: RelationKind, id: &str) -> bool {
        let Some(targets) = self.0.get_mut(&kind) else {
            return false;
        };
        let before = targets.len();
        targets.retain(|value| value != id);
        let removed = targets.len() != before;
        if targets.is_empty() {
            self.0.remove(&kind);
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (RelationKind, &[String])> {
        self.0.iter().map(|(kind, targets)| (*kind, targets.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub priority: PriorityQuadrant,
    pub title: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub linked_items: LinkedItems,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Open-ended extension data; everything typed lives in the fields above.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl Record {
    pub fn parsed_id(&self) -> AppResult<ItemId> {
        ItemId::parse(&self.id)
    }

    /// The ID prefix must agree with the `type` field.
    pub fn check_identity(&self) -> AppResult<()> {
        let parsed = self.parsed_id()?;
        if parsed.item_type != self.item_type {
            return Err(AppError::InvalidId(format!(
                "'{}' has prefix for {} but type is {}",
                self.id,
                parsed.item_type.as_str(),
                self.item_type.as_str()
            )));
        }
        Ok(())
    }

    pub fn touch(&mut self) {
        self.updated = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ItemStatus>,
    #[serde(default)]
    pub priority: Option<PriorityQuadrant>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl CreateItemRequest {
    pub fn new(item_type: ItemType, title: impl Into<String>) -> Self {
        Self {
            item_type,
            title: title.into(),
            description: None,
            status: None,
            priority: None,
            tags: Vec::new(),
            author: None,
            assignee: None,
            metadata: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<ItemStatus>,
    pub priority: Option<PriorityQuadrant>,
    pub tags: Option<Vec<String>>,
    pub assignee: Option<String>,
    /// Merged key by key; a `null` value deletes the key.
    pub metadata: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListFilter {
    #[serde(rename = "type")]
    pub item_type: Option<ItemType>,
    pub status: Option<ItemStatus>,
    pub priority: Option<PriorityQuadrant>,
    pub assignee: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ListFilter {
    pub fn matches(&self, record: &Record) -> bool {
        if self.item_type.is_some_and(|value| value != record.item_type) {
            return false;
        }
        if self.status.is_some_and(|value| value != record.status) {
            return false;
        }
        if self.priority.is_some_and(|value| value != record.priority) {
            return false;
        }
        if let Some(assignee) = self.assignee.as_deref() {
            if record.assignee.as_deref() != Some(assignee) {
                return false;
            }
        }
        self.tags.iter().all(|tag| record.tags.contains(tag))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub status: ItemStatus,
    pub priority: PriorityQuadrant,
    pub title: String,
    pub assignee: Option<String>,
    pub tags: Vec<String>,
    pub updated: DateTime<Utc>,
}

impl From<&Record> for ItemSummary {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            item_type: record.item_type,
            status: record.status,
            priority: record.priority,
            title: record.title.clone(),
            assignee: record.assignee.clone(),
            tags: record.tags.clone(),
            updated: record.updated,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetail {
    pub record: Record,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub archived: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<String>,
    pub suggestion: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
            suggestion: None,
        }
    }

    pub fn reject(error: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            suggestion: Some(suggestion.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LinkRejection {
    Validation,
    Conflict,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkResult {
    pub valid: bool,
    /// True when nothing had to change on either side.
    pub no_op: bool,
    pub source_id: String,
    pub target_id: String,
    pub kind: RelationKind,
    pub inverse_kind: RelationKind,
    pub rejection: Option<LinkRejection>,
    pub error: Option<String>,
    pub suggestion: Option<String>,
}

impl LinkResult {
    pub fn into_result(self) -> AppResult<Self> {
        match self.rejection {
            None => Ok(self),
            Some(LinkRejection::Validation) => Err(AppError::ValidationFailed {
                message: self.error.unwrap_or_default(),
                suggestion: self.suggestion,
            }),
            Some(LinkRejection::Conflict) => Err(AppError::ConflictDetected(self.error.unwrap_or_default())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TraceNode {
    pub id: String,
    pub depth: usize,
    /// Record the walk came from, with the edge kind followed.
    pub via: Option<(String, RelationKind)>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TraceResult {
    pub nodes: Vec<TraceNode>,
    pub missing: Vec<String>,
    /// Edges pointing back at an already visited record.
    pub cycles: Vec<(String, String)>,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IndexAudit {
    pub by_type_total: usize,
    pub by_status_total: usize,
    pub by_priority_total: usize,
    /// `dimension:id` for every ID found in more than one shard of a dimension.
    pub duplicates: Vec<String>,
}

impl IndexAudit {
    pub fn is_consistent(&self) -> bool {
        self.duplicates.is_empty()
            && self.by_type_total == self.by_status_total
            && self.by_type_total == self.by_priority_total
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationCheck {
    pub needed: bool,
    pub has_legacy: bool,
    pub has_sharded: bool,
    pub item_count: usize,
}

impl MigrationCheck {
    /// Both layouts present; reported, never resolved automatically.
    pub fn is_ambiguous(&self) -> bool {
        self.has_legacy && self.has_sharded
    }
}

#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    pub skip_backup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IndexMigrationReport {
    pub migrated: bool,
    pub item_count: usize,
    pub defaulted_priority: Vec<String>,
    pub backup_path: Option<String>,
    pub archived_legacy_path: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryMigrationReport {
    pub migrated: bool,
    pub moved_files: usize,
    pub removed_dirs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FullMigrationReport {
    pub index: IndexMigrationReport,
    pub directories: DirectoryMigrationReport,
    pub archived_redundant_legacy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RollbackReport {
    pub restored_from: String,
    pub removed_sharded_index: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_roundtrips_through_display() {
        let id = ItemId::parse("TASK-014").expect("parse");
        assert_eq!(id.item_type, ItemType::Task);
        assert_eq!(id.number, 14);
        assert_eq!(id.to_string(), "TASK-014");
        assert_eq!(ItemId::new(ItemType::Requirement, 1234).to_string(), "REQ-1234");
    }

    #[test]
    fn item_id_rejects_unknown_prefix_and_shape() {
        assert!(matches!(ItemId::parse("CHORE-001"), Err(AppError::InvalidId(_))));
        assert!(matches!(ItemId::parse("task-001"), Err(AppError::InvalidId(_))));
        assert!(matches!(ItemId::parse("TASK001"), Err(AppError::InvalidId(_))));
    }

    #[test]
    fn every_relation_kind_has_an_involutive_inverse() {
        for kind in RelationKind::ALL {
            assert_eq!(kind.inverse().inverse(), kind);
            assert_eq!(kind.is_hierarchy(), kind.inverse().is_hierarchy());
        }
        assert_eq!(RelationKind::RelatesTo.inverse(), RelationKind::RelatesTo);
    }

    #[test]
    fn linked_items_insert_and_remove_are_idempotent() {
        let mut linked = LinkedItems::default();
        assert!(linked.insert(RelationKind::Implements, "STORY-001"));
        assert!(!linked.insert(RelationKind::Implements, "STORY-001"));
        assert_eq!(linked.targets(RelationKind::Implements), ["STORY-001".to_string()]);
        assert!(linked.remove(RelationKind::Implements, "STORY-001"));
        assert!(!linked.remove(RelationKind::Implements, "STORY-001"));
        assert!(linked.is_empty());
    }

    #[test]
    fn record_json_uses_kebab_case_kinds_and_defaults_priority() {
        let record: Record = serde_json::from_value(serde_json::json!({
            "id": "TASK-001",
            "type": "task",
            "status": "in-progress",
            "title": "Wire the index",
            "created": "2026-01-01T00:00:00Z",
            "updated": "2026-01-01T00:00:00Z",
            "linkedItems": {"implements": ["STORY-001"]}
        }))
        .expect("record json");
        assert_eq!(record.priority, PriorityQuadrant::Q2);
        assert_eq!(record.status, ItemStatus::InProgress);
        assert!(record.linked_items.contains(RelationKind::Implements, "STORY-001"));
        record.check_identity().expect("identity holds");
    }

    #[test]
    fn record_identity_rejects_mismatched_prefix() {
        let now = Utc::now();
        let record = Record {
            id: "BUG-001".to_string(),
            item_type: ItemType::Task,
            status: ItemStatus::Draft,
            priority: PriorityQuadrant::Q2,
            title: "Mislabelled".to_string(),
            created: now,
            updated: now,
            linked_items: LinkedItems::default(),
            tags: Vec::new(),
            author: None,
            assignee: None,
            metadata: BTreeMap::new(),
        };
        assert!(matches!(record.check_identity(), Err(AppError::InvalidId(_))));
    }

    #[test]
    fn relation_kind_parses_loose_spellings() {
        assert_eq!("implemented_by".parse::<RelationKind>().expect("kind"), RelationKind::ImplementedBy);
        assert!("affects".parse::<RelationKind>().is_err());
    }
}
