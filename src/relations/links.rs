//! Bidirectional edges between two records.
//!
//! A link writes the source document first and the target second. There is no
//! transaction around the pair: if the process dies between the two writes the edge is
//! one-sided until the link is repeated, which is safe because both sides are
//! idempotent. Rejections from the validator or the conflict policy happen before any
//! write.

use super::conflicts::detect_conflict;
use super::validator::validate_relationship;
use crate::config::ProjectConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{ItemId, LinkRejection, LinkResult, Record, RelationKind};
use crate::store;
use std::path::Path;

pub fn link_items(root: &Path, source_id: &str, kind: RelationKind, target_id: &str) -> AppResult<LinkResult> {
    let source_id = ItemId::parse(source_id)?.to_string();
    let target_id = ItemId::parse(target_id)?.to_string();
    let mut source = store::load_record(root, &source_id)?;
    let mut target = store::load_record(root, &target_id)?;
    let config = ProjectConfig::load(root)?;
    let inverse = kind.inverse();

    let validation = validate_relationship(source.item_type, target.item_type, kind, config.methodology);
    if !validation.valid {
        tracing::info!(
            source = %source_id,
            target = %target_id,
            kind = %kind,
            methodology = config.methodology.as_str(),
            "link rejected by hierarchy rules"
        );
        return Ok(LinkResult {
            valid: false,
            rejection: Some(LinkRejection::Validation),
            error: validation.error,
            suggestion: validation.suggestion,
            ..outcome(&source_id, kind, &target_id, false)
        });
    }

    let conflict = detect_conflict(&config.conflict_rules, &source, kind, &target_id)
        .or_else(|| detect_conflict(&config.conflict_rules, &target, inverse, &source_id));
    if let Some(message) = conflict {
        tracing::info!(source = %source_id, target = %target_id, kind = %kind, "link rejected by conflict policy");
        return Ok(LinkResult {
            valid: false,
            rejection: Some(LinkRejection::Conflict),
            error: Some(message),
            suggestion: Some(format!(
                "Unlink the existing \"{}\" relation first, or use \"relates-to\"",
                kind
            )),
            ..outcome(&source_id, kind, &target_id, false)
        });
    }

    let source_changed = add_edge(root, &mut source, kind, &target_id)?;
    let target_changed = add_edge(root, &mut target, inverse, &source_id)?;
    let no_op = !source_changed && !target_changed;
    tracing::info!(source = %source_id, target = %target_id, kind = %kind, no_op, "linked");
    Ok(outcome(&source_id, kind, &target_id, no_op))
}

/// Removes the edge and its inverse. A missing edge is a no-op; a missing target
/// document still lets the source side be cleaned up.
pub fn unlink_items(root: &Path, source_id: &str, kind: RelationKind, target_id: &str) -> AppResult<LinkResult> {
    let source_id = ItemId::parse(source_id)?.to_string();
    let target_id = ItemId::parse(target_id)?.to_string();
    let mut source = store::load_record(root, &source_id)?;
    let target = match store::load_record(root, &target_id) {
        Ok(record) => Some(record),
        Err(AppError::NotFound(_)) => {
            tracing::warn!(target = %target_id, "unlink target missing; cleaning source side only");
            None
        }
        Err(error) => return Err(error),
    };

    let source_changed = remove_edge(root, &mut source, kind, &target_id)?;
    let target_changed = match target {
        Some(mut target) => remove_edge(root, &mut target, kind.inverse(), &source_id)?,
        None => false,
    };
    let no_op = !source_changed && !target_changed;
    tracing::info!(source = %source_id, target = %target_id, kind = %kind, no_op, "unlinked");
    Ok(outcome(&source_id, kind, &target_id, no_op))
}

fn add_edge(root: &Path, record: &mut Record, kind: RelationKind, other_id: &str) -> AppResult<bool> {
    if !record.linked_items.insert(kind, other_id) {
        return Ok(false);
    }
    record.touch();
    store::save_record(root, record)?;
    Ok(true)
}

fn remove_edge(root: &Path, record: &mut Record, kind: RelationKind, other_id: &str) -> AppResult<bool> {
    if !record.linked_items.remove(kind, other_id) {
        return Ok(false);
    }
    record.touch();
    store::save_record(root, record)?;
    Ok(true)
}

fn outcome(source_id: &str, kind: RelationKind, target_id: &str, no_op: bool) -> LinkResult {
    LinkResult {
        valid: true,
        no_op,
        source_id: source_id.to_string(),
        target_id: target_id.to_string(),
        kind,
        inverse_kind: kind.inverse(),
        rejection: None,
        error: None,
        suggestion: None,
    }
}
