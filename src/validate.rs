//! Cross-entity validation.
//!
//! A single pure pass over the four dictionaries that accumulates every
//! applicable diagnostic: no early exit, no mutation of the model.
//! Dangling references are reported but left in place as-authored; the
//! author fixes them, not the tooling.

use std::collections::BTreeSet;

use crate::diagnostic::{Diagnostic, DiagnosticCode, ValidationReport};
use crate::dice::is_dice_notation;
use crate::model::{
    Action, Mechanic, StoryModel, VisibilityRequirement, ITEM_TYPES, NODE_TYPES,
    STAT_CHECK_OPERATORS, STAT_CHECK_STATS, VALID_ATTRIBUTES,
};

/// A dice cell that parses as a plain number is a valid flat expression and
/// is not flagged.
fn dice_cell_suspect(dice: &str) -> bool {
    !dice.is_empty() && !is_dice_notation(dice) && dice.parse::<f64>().is_err()
}

/// Validates the compiled model, returning all errors and warnings.
pub fn validate_model(model: &StoryModel) -> ValidationReport {
    let mut report = ValidationReport::default();

    let node_ids: BTreeSet<&str> = model.nodes.keys().map(String::as_str).collect();
    let item_ids: BTreeSet<&str> = model.items.keys().map(String::as_str).collect();
    let enemy_ids: BTreeSet<&str> = model.enemies.keys().map(String::as_str).collect();
    let encounter_ids: BTreeSet<&str> = model.encounters.keys().map(String::as_str).collect();

    for (id, node) in &model.nodes {
        if !NODE_TYPES.contains(&node.node_type.as_str()) {
            report.push(
                Diagnostic::error(
                    DiagnosticCode::InvalidEnumValue,
                    format!(
                        "Node \"{id}\": invalid type \"{}\". Must be one of: narrative, encounter, ending",
                        node.node_type
                    ),
                )
                .with_context("nodeId", id)
                .with_context("type", &node.node_type)
                .with_hint("Set type to narrative, encounter, or ending"),
            );
        }

        for choice in node.choices.iter().flatten() {
            match &choice.mechanic {
                Mechanic::Navigate { next_node_id } => {
                    if !node_ids.contains(next_node_id.as_str()) {
                        report.push(
                            Diagnostic::error(
                                DiagnosticCode::DanglingNodeRef,
                                format!(
                                    "Node \"{id}\" choice \"{}\": navigate targets missing node \"{next_node_id}\"",
                                    choice.id
                                ),
                            )
                            .with_context("nodeId", id)
                            .with_context("choiceId", &choice.id)
                            .with_context("ref", next_node_id)
                            .with_context("refType", "node"),
                        );
                    }
                }
                Mechanic::CombatInit { encounter_id } => {
                    if !encounter_ids.contains(encounter_id.as_str()) {
                        report.push(
                            Diagnostic::error(
                                DiagnosticCode::DanglingEncounterRef,
                                format!(
                                    "Node \"{id}\" choice \"{}\": combat_init targets missing encounter \"{encounter_id}\"",
                                    choice.id
                                ),
                            )
                            .with_context("nodeId", id)
                            .with_context("choiceId", &choice.id)
                            .with_context("ref", encounter_id)
                            .with_context("refType", "encounter"),
                        );
                    }
                }
                Mechanic::SkillCheck {
                    dice,
                    attribute,
                    on_success,
                    on_failure,
                    on_failure_encounter_id,
                    ..
                } => {
                    for (branch, outcome) in
                        [("onSuccess", on_success), ("onFailure", on_failure)]
                    {
                        if !node_ids.contains(outcome.next_node_id.as_str()) {
                            report.push(
                                Diagnostic::error(
                                    DiagnosticCode::DanglingNodeRef,
                                    format!(
                                        "Node \"{id}\" choice \"{}\": skill_check {branch} targets missing node \"{}\"",
                                        choice.id, outcome.next_node_id
                                    ),
                                )
                                .with_context("nodeId", id)
                                .with_context("choiceId", &choice.id)
                                .with_context("ref", &outcome.next_node_id)
                                .with_context("refType", "node"),
                            );
                        }
                    }
                    if let Some(encounter_id) = on_failure_encounter_id {
                        if !encounter_ids.contains(encounter_id.as_str()) {
                            report.push(
                                Diagnostic::error(
                                    DiagnosticCode::DanglingEncounterRef,
                                    format!(
                                        "Node \"{id}\" choice \"{}\": skill_check onFailureEncounterId missing encounter \"{encounter_id}\"",
                                        choice.id
                                    ),
                                )
                                .with_context("nodeId", id)
                                .with_context("choiceId", &choice.id)
                                .with_context("ref", encounter_id)
                                .with_context("refType", "encounter"),
                            );
                        }
                    }
                    if dice_cell_suspect(dice) {
                        report.push(
                            Diagnostic::warning(
                                DiagnosticCode::DiceNotation,
                                format!(
                                    "Node \"{id}\" choice \"{}\": skill_check dice \"{dice}\" is not valid notation",
                                    choice.id
                                ),
                            )
                            .with_context("nodeId", id)
                            .with_context("choiceId", &choice.id)
                            .with_context("value", dice)
                            .with_hint("Use e.g. 1d20+3"),
                        );
                    }
                    if let Some(attribute) = attribute {
                        if !VALID_ATTRIBUTES.contains(&attribute.as_str()) {
                            report.push(
                                Diagnostic::error(
                                    DiagnosticCode::InvalidEnumValue,
                                    format!(
                                        "Node \"{id}\" choice \"{}\": skill_check invalid attribute \"{attribute}\"",
                                        choice.id
                                    ),
                                )
                                .with_context("nodeId", id)
                                .with_context("choiceId", &choice.id)
                                .with_context("attribute", attribute)
                                .with_hint("Use strength, dexterity, or intelligence"),
                            );
                        }
                    }
                }
            }

            for requirement in choice.visibility_requirements.iter().flatten() {
                match requirement {
                    VisibilityRequirement::HasItem { item_id } => {
                        if !item_ids.contains(item_id.as_str()) {
                            report.push(
                                Diagnostic::error(
                                    DiagnosticCode::DanglingItemRef,
                                    format!(
                                        "Node \"{id}\" choice \"{}\": has_item references missing item \"{item_id}\"",
                                        choice.id
                                    ),
                                )
                                .with_context("nodeId", id)
                                .with_context("choiceId", &choice.id)
                                .with_context("ref", item_id)
                                .with_context("refType", "item"),
                            );
                        }
                    }
                    VisibilityRequirement::StatCheck { stat, operator, .. } => {
                        if !STAT_CHECK_OPERATORS.contains(&operator.as_str()) {
                            report.push(
                                Diagnostic::error(
                                    DiagnosticCode::InvalidEnumValue,
                                    format!(
                                        "Node \"{id}\" choice \"{}\": stat_check invalid operator \"{operator}\"",
                                        choice.id
                                    ),
                                )
                                .with_context("nodeId", id)
                                .with_context("choiceId", &choice.id)
                                .with_context("operator", operator),
                            );
                        }
                        if !STAT_CHECK_STATS.contains(&stat.as_str()) {
                            report.push(
                                Diagnostic::error(
                                    DiagnosticCode::InvalidEnumValue,
                                    format!(
                                        "Node \"{id}\" choice \"{}\": stat_check invalid stat \"{stat}\"",
                                        choice.id
                                    ),
                                )
                                .with_context("nodeId", id)
                                .with_context("choiceId", &choice.id)
                                .with_context("stat", stat),
                            );
                        }
                    }
                    VisibilityRequirement::HasFlag { .. }
                    | VisibilityRequirement::NotHasFlag { .. } => {}
                }
            }
        }

        for action in node.on_enter.iter().flatten() {
            let (action_name, item_id) = match action {
                Action::AddItem { item_id, .. } => ("add_item", item_id),
                Action::RemoveItem { item_id, .. } => ("remove_item", item_id),
                _ => continue,
            };
            if !item_ids.contains(item_id.as_str()) {
                report.push(
                    Diagnostic::error(
                        DiagnosticCode::DanglingItemRef,
                        format!(
                            "Node \"{id}\" onEnter: {action_name} references missing item \"{item_id}\""
                        ),
                    )
                    .with_context("nodeId", id)
                    .with_context("ref", item_id)
                    .with_context("refType", "item"),
                );
            }
        }
    }

    for (id, encounter) in &model.encounters {
        if encounter.enemies.is_empty() {
            report.push(
                Diagnostic::error(
                    DiagnosticCode::EmptyEncounter,
                    format!("Encounter \"{id}\": has no enemies"),
                )
                .with_context("encounterId", id),
            );
        }
        for spawn in &encounter.enemies {
            if !enemy_ids.contains(spawn.enemy_id.as_str()) {
                report.push(
                    Diagnostic::error(
                        DiagnosticCode::DanglingEnemyRef,
                        format!(
                            "Encounter \"{id}\": references missing enemy \"{}\"",
                            spawn.enemy_id
                        ),
                    )
                    .with_context("encounterId", id)
                    .with_context("ref", &spawn.enemy_id)
                    .with_context("refType", "enemy"),
                );
            }
        }
        for (branch, outcome) in [
            ("onVictory", &encounter.resolution.on_victory),
            ("onDefeat", &encounter.resolution.on_defeat),
        ] {
            let target = &outcome.next_node_id;
            if !target.is_empty() && !node_ids.contains(target.as_str()) {
                report.push(
                    Diagnostic::error(
                        DiagnosticCode::DanglingNodeRef,
                        format!("Encounter \"{id}\": {branch} targets missing node \"{target}\""),
                    )
                    .with_context("encounterId", id)
                    .with_context("ref", target)
                    .with_context("refType", "node"),
                );
            }
        }
    }

    for (id, item) in &model.items {
        if !ITEM_TYPES.contains(&item.item_type.as_str()) {
            report.push(
                Diagnostic::error(
                    DiagnosticCode::InvalidEnumValue,
                    format!(
                        "Item \"{id}\": invalid type \"{}\". Must be one of: weapon, consumable, tool, armor",
                        item.item_type
                    ),
                )
                .with_context("itemId", id)
                .with_context("type", &item.item_type),
            );
        }
        if item.item_type == "weapon" && item.damage.is_none() {
            report.push(
                Diagnostic::warning(
                    DiagnosticCode::MissingWeaponDamage,
                    format!("Item \"{id}\": weapon missing damage field"),
                )
                .with_context("itemId", id),
            );
        }
        if let Some(Action::AddItem { item_id, .. }) = &item.effect {
            if !item_ids.contains(item_id.as_str()) {
                report.push(
                    Diagnostic::error(
                        DiagnosticCode::DanglingItemRef,
                        format!(
                            "Item \"{id}\" effect: add_item references missing item \"{item_id}\""
                        ),
                    )
                    .with_context("itemId", id)
                    .with_context("ref", item_id)
                    .with_context("refType", "item"),
                );
            }
        }
        if let Some(attribute) = &item.scaling_attribute {
            if !VALID_ATTRIBUTES.contains(&attribute.as_str()) {
                report.push(
                    Diagnostic::error(
                        DiagnosticCode::InvalidEnumValue,
                        format!("Item \"{id}\": invalid scalingAttribute \"{attribute}\""),
                    )
                    .with_context("itemId", id)
                    .with_context("scalingAttribute", attribute),
                );
            }
        }
    }

    for (id, enemy) in &model.enemies {
        if enemy.hp <= 0 {
            report.push(
                Diagnostic::error(
                    DiagnosticCode::EnemyStatBounds,
                    format!("Enemy \"{id}\": hp must be > 0"),
                )
                .with_context("enemyId", id),
            );
        }
        if enemy.ac < 0 {
            report.push(
                Diagnostic::error(
                    DiagnosticCode::EnemyStatBounds,
                    format!("Enemy \"{id}\": ac must be >= 0"),
                )
                .with_context("enemyId", id),
            );
        }
        if dice_cell_suspect(&enemy.damage) {
            report.push(
                Diagnostic::warning(
                    DiagnosticCode::DiceNotation,
                    format!(
                        "Enemy \"{id}\": damage \"{}\" is not valid dice notation",
                        enemy.damage
                    ),
                )
                .with_context("enemyId", id)
                .with_context("value", &enemy.damage)
                .with_hint("Use e.g. 1d6+2"),
            );
        }
    }

    report
}
