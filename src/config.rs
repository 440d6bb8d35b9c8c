use crate::errors::{AppError, AppResult};
use crate::models::{Methodology, RelationKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.yaml";
const DEFAULT_CACHE_TTL_SECS: u64 = 30;

/// Exclusivity rule checked before a new edge is written on the source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum ConflictRule {
    /// At most one target per record for this kind.
    SingleTarget { kind: RelationKind },
    /// The same pair of records may not be linked by both kinds.
    MutuallyExclusive { kinds: [RelationKind; 2] },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default)]
    pub methodology: Methodology,
    #[serde(default = "default_conflict_rules")]
    pub conflict_rules: Vec<ConflictRule>,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default)]
    pub author: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            methodology: Methodology::default(),
            conflict_rules: default_conflict_rules(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            author: None,
        }
    }
}

impl ProjectConfig {
    pub fn with_methodology(methodology: Methodology) -> Self {
        Self {
            methodology,
            ..Self::default()
        }
    }

    pub fn path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE)
    }

    /// Defaults apply when the file is absent; the root itself must exist.
    pub fn load(root: &Path) -> AppResult<Self> {
        if !root.is_dir() {
            return Err(AppError::NotInitialized(format!(
                "Project root '{}' does not exist",
                root.display()
            )));
        }
        let path = Self::path(root);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no project config; using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)?;
        serde_yaml::from_str(&text)
            .map_err(|error| AppError::Internal(format!("Invalid config in {}: {}", path.display(), error)))
    }

    pub fn save(&self, root: &Path) -> AppResult<()> {
        fs::create_dir_all(root)?;
        let rendered = serde_yaml::to_string(self)?;
        fs::write(Self::path(root), rendered)?;
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn default_conflict_rules() -> Vec<ConflictRule> {
    vec![
        ConflictRule::SingleTarget {
            kind: RelationKind::Implements,
        },
        ConflictRule::MutuallyExclusive {
            kinds: [RelationKind::Blocks, RelationKind::BlockedBy],
        },
        ConflictRule::MutuallyExclusive {
            kinds: [RelationKind::DependsOn, RelationKind::RequiredBy],
        },
        ConflictRule::MutuallyExclusive {
            kinds: [RelationKind::Supersedes, RelationKind::SupersededBy],
        },
    ]
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let root = tempfile::tempdir().expect("temp root");
        let config = ProjectConfig::load(root.path()).expect("load");
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.methodology, Methodology::Scrum);
    }

    #[test]
    fn missing_root_is_not_initialized() {
        let root = tempfile::tempdir().expect("temp root");
        let error = ProjectConfig::load(&root.path().join("absent")).expect_err("must fail");
        assert!(matches!(error, AppError::NotInitialized(_)));
    }

    #[test]
    fn yaml_rules_parse_with_partial_fields() {
        let root = tempfile::tempdir().expect("temp root");
        fs::write(
            root.path().join(CONFIG_FILE),
            "methodology: hybrid\nconflictRules:\n  - rule: single-target\n    kind: blocks\n",
        )
        .expect("write config");
        let config = ProjectConfig::load(root.path()).expect("load");
        assert_eq!(config.methodology, Methodology::Hybrid);
        assert_eq!(
            config.conflict_rules,
            vec![ConflictRule::SingleTarget {
                kind: RelationKind::Blocks
            }]
        );
        assert_eq!(config.cache_ttl_secs, DEFAULT_CACHE_TTL_SECS);
    }

    #[test]
    fn malformed_yaml_names_the_file() {
        let root = tempfile::tempdir().expect("temp root");
        fs::write(root.path().join(CONFIG_FILE), "methodology: [").expect("write config");
        let error = ProjectConfig::load(root.path()).expect_err("must fail");
        assert!(error.to_string().contains(CONFIG_FILE));
    }

    #[test]
    fn save_then_load_keeps_methodology() {
        let root = tempfile::tempdir().expect("temp root");
        ProjectConfig::with_methodology(Methodology::Waterfall)
            .save(root.path())
            .expect("save");
        let loaded = ProjectConfig::load(root.path()).expect("load");
        assert_eq!(loaded.methodology, Methodology::Waterfall);
    }
}
