use crate::config::ConflictRule;
use crate::models::{Record, RelationKind};

/// Returns a description of the first rule a new `owner --kind--> other` edge would
/// break. An edge that already exists never conflicts.
pub fn detect_conflict(
    rules: &[ConflictRule],
    owner: &Record,
    kind: RelationKind,
    other_id: &str,
) -> Option<String> {
    if owner.id == other_id {
        return Some(format!("{} cannot be linked to itself", owner.id));
    }
    if owner.linked_items.contains(kind, other_id) {
        return None;
    }

    for rule in rules {
        match rule {
            ConflictRule::SingleTarget { kind: exclusive } if *exclusive == kind => {
                if let Some(existing) = owner.linked_items.targets(kind).first() {
                    return Some(format!(
                        "{} already {} {}; only one target is allowed for \"{}\"",
                        owner.id, kind, existing, kind
                    ));
                }
            }
            ConflictRule::MutuallyExclusive { kinds: [first, second] } => {
                let opposite = if *first == kind {
                    *second
                } else if *second == kind {
                    *first
                } else {
                    continue;
                };
                if owner.linked_items.contains(opposite, other_id) {
                    return Some(format!(
                        "{} already {} {}; \"{}\" and \"{}\" cannot both link the same pair",
                        owner.id, opposite, other_id, kind, opposite
                    ));
                }
            }
            ConflictRule::SingleTarget { .. } => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::models::{ItemStatus, ItemType, LinkedItems, PriorityQuadrant};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn task_with(edges: &[(RelationKind, &str)]) -> Record {
        let now = Utc::now();
        let mut linked_items = LinkedItems::default();
        for (kind, id) in edges {
            linked_items.insert(*kind, id);
        }
        Record {
            id: "TASK-001".to_string(),
            item_type: ItemType::Task,
            status: ItemStatus::Draft,
            priority: PriorityQuadrant::Q2,
            title: "task".to_string(),
            created: now,
            updated: now,
            linked_items,
            tags: Vec::new(),
            author: None,
            assignee: None,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn second_parent_is_a_conflict_but_same_parent_is_not() {
        let rules = ProjectConfig::default().conflict_rules;
        let task = task_with(&[(RelationKind::Implements, "STORY-001")]);
        assert!(detect_conflict(&rules, &task, RelationKind::Implements, "STORY-001").is_none());
        let conflict = detect_conflict(&rules, &task, RelationKind::Implements, "STORY-002").expect("conflict");
        assert!(conflict.contains("STORY-001"));
    }

    #[test]
    fn opposite_kinds_on_the_same_pair_conflict() {
        let rules = ProjectConfig::default().conflict_rules;
        let task = task_with(&[(RelationKind::Blocks, "TASK-002")]);
        assert!(detect_conflict(&rules, &task, RelationKind::BlockedBy, "TASK-002").is_some());
        assert!(detect_conflict(&rules, &task, RelationKind::BlockedBy, "TASK-003").is_none());
    }

    #[test]
    fn self_links_always_conflict() {
        let task = task_with(&[]);
        assert!(detect_conflict(&[], &task, RelationKind::RelatesTo, "TASK-001").is_some());
    }

    #[test]
    fn empty_policy_allows_multiple_parents() {
        let task = task_with(&[(RelationKind::Implements, "STORY-001")]);
        assert!(detect_conflict(&[], &task, RelationKind::Implements, "STORY-002").is_none());
    }
}
