//! Hierarchy rules per methodology. Pure functions, no I/O.
//!
//! Only `implements` is checked; its inverse and the blocking kinds are accepted as-is,
//! and every flexible kind is always valid.

use crate::models::{ItemType, Methodology, RelationKind, ValidationResult};

pub fn validate_relationship(
    source: ItemType,
    target: ItemType,
    kind: RelationKind,
    methodology: Methodology,
) -> ValidationResult {
    if kind != RelationKind::Implements {
        return ValidationResult::ok();
    }
    match methodology {
        Methodology::Scrum => scrum_implements(source, target),
        Methodology::Waterfall => waterfall_implements(source, target),
        Methodology::Hybrid => {
            let scrum = scrum_implements(source, target);
            if scrum.valid {
                return scrum;
            }
            let waterfall = waterfall_implements(source, target);
            if waterfall.valid {
                return waterfall;
            }
            scrum
        }
    }
}

fn scrum_implements(source: ItemType, target: ItemType) -> ValidationResult {
    use ItemType::*;
    match (source, target) {
        (Task, Story | Spike | Bug) => ValidationResult::ok(),
        (Story | Spike, Epic) => ValidationResult::ok(),
        (Test, Epic | Story) => ValidationResult::ok(),
        (Bug, _) => bug_rejection(target),
        (Epic, _) => terminal_rejection(Epic),
        (Task, Epic) => ValidationResult::reject(
            "A Task cannot implement an Epic directly",
            "Create a Story first, then link Task → Story and Story → Epic",
        ),
        (Task, _) => ValidationResult::reject(
            format!("A Task cannot implement a {} in Scrum", target.display_name()),
            "Link the Task to a Story, Spike or Bug with \"implements\"",
        ),
        (Story | Spike, _) => ValidationResult::reject(
            format!(
                "A {} can only implement an Epic in Scrum",
                source.display_name()
            ),
            format!(
                "Link the {} to an Epic, or use \"relates-to\" for other context",
                source.display_name()
            ),
        ),
        (Test, _) => ValidationResult::reject(
            format!("A Test cannot implement a {} in Scrum", target.display_name()),
            "Link the Test to an Epic or Story, or use \"tests\" to cover a Task",
        ),
        (Requirement | Feature, _) => ValidationResult::reject(
            format!(
                "{} is a Waterfall type and has no place in the Scrum hierarchy",
                source.display_name()
            ),
            "Switch the project methodology to waterfall or hybrid, or use \"relates-to\"",
        ),
    }
}

fn waterfall_implements(source: ItemType, target: ItemType) -> ValidationResult {
    use ItemType::*;
    match (source, target) {
        (Task, Feature | Spike | Bug) => ValidationResult::ok(),
        (Feature | Spike, Requirement) => ValidationResult::ok(),
        (Test, Requirement | Feature) => ValidationResult::ok(),
        (Bug, _) => bug_rejection(target),
        (Requirement, _) => terminal_rejection(Requirement),
        (Task, Requirement) => ValidationResult::reject(
            "A Task cannot implement a Requirement directly",
            "Create a Feature first, then link Task → Feature and Feature → Requirement",
        ),
        (Task, _) => ValidationResult::reject(
            format!("A Task cannot implement a {} in Waterfall", target.display_name()),
            "Link the Task to a Feature, Spike or Bug with \"implements\"",
        ),
        (Feature | Spike, _) => ValidationResult::reject(
            format!(
                "A {} can only implement a Requirement in Waterfall",
                source.display_name()
            ),
            format!(
                "Link the {} to a Requirement, or use \"relates-to\" for other context",
                source.display_name()
            ),
        ),
        (Test, _) => ValidationResult::reject(
            format!("A Test cannot implement a {} in Waterfall", target.display_name()),
            "Link the Test to a Requirement or Feature, or use \"tests\" to cover a Task",
        ),
        (Epic | Story, _) => ValidationResult::reject(
            format!(
                "{} is a Scrum type and has no place in the Waterfall hierarchy",
                source.display_name()
            ),
            "Switch the project methodology to scrum or hybrid, or use \"relates-to\"",
        ),
    }
}

fn bug_rejection(target: ItemType) -> ValidationResult {
    ValidationResult::reject(
        format!("A Bug cannot implement a {}", target.display_name()),
        "Use \"relates-to\" or \"affects\" to reference the context, and create a Task that implements the Bug",
    )
}

fn terminal_rejection(source: ItemType) -> ValidationResult {
    ValidationResult::reject(
        format!("{} is a top-level type and cannot implement anything", source.display_name()),
        format!(
            "Link child items to the {} with \"implements\", or use \"relates-to\" between top-level items",
            source.display_name()
        ),
    )
}
