//! Serializer: entity dictionaries back to table rows and CSV text.
//!
//! Deterministic inverse of the row compilers; `parse(serialize(m))` is
//! structurally equal to `m`. Authored comments and custom whitespace in
//! the source files are not preserved (accepted lossiness). Missing
//! optional fields serialize to the empty string, never a `null` literal.

use std::collections::BTreeMap;

use crate::compile::MAX_CHOICE_SLOTS;
use crate::error::GbResult;
use crate::model::{
    Action, Choice, EncounterModel, EnemyTemplate, ItemTemplate, Mechanic, StoryModel, StoryNode,
    VisibilityRequirement,
};
use crate::table;

pub const NODES_HEADERS: [&str; 17] = [
    "id",
    "type",
    "text",
    "image",
    "onEnter",
    "choice1_id",
    "choice1_label",
    "choice1_visibility",
    "choice1_mechanic",
    "choice2_id",
    "choice2_label",
    "choice2_visibility",
    "choice2_mechanic",
    "choice3_id",
    "choice3_label",
    "choice3_visibility",
    "choice3_mechanic",
];

pub const ITEMS_HEADERS: [&str; 9] = [
    "id",
    "name",
    "type",
    "damage",
    "attackBonus",
    "acBonus",
    "effect",
    "scalingAttribute",
    "aoe",
];

pub const ENEMIES_HEADERS: [&str; 8] = [
    "id",
    "name",
    "hp",
    "maxHp",
    "ac",
    "attackBonus",
    "damage",
    "xpReward",
];

pub const ENCOUNTERS_HEADERS: [&str; 5] = ["id", "name", "enemies", "onVictory", "onDefeat"];

/// Serializes an action back to its token form.
pub fn serialize_action(action: &Action) -> String {
    match action {
        Action::SetFlag { key, value } => {
            if *value {
                format!("set_flag:{key}")
            } else {
                format!("set_flag:{key}:false")
            }
        }
        Action::AddItem { item_id, qty } => format!("add_item:{item_id}:{qty}"),
        Action::RemoveItem { item_id, qty } => format!("remove_item:{item_id}:{qty}"),
        Action::AdjustHp { amount } => format!("adjust_hp:{amount}"),
        Action::AdjustCurrency { amount } => format!("adjust_currency:{amount}"),
        Action::Heal { amount } => format!("heal:{amount}"),
    }
}

/// Serializes a visibility requirement back to its token form.
pub fn serialize_visibility(requirement: &VisibilityRequirement) -> String {
    match requirement {
        VisibilityRequirement::HasFlag { key } => format!("has_flag:{key}"),
        VisibilityRequirement::NotHasFlag { key } => format!("not_has_flag:{key}"),
        VisibilityRequirement::HasItem { item_id } => format!("has_item:{item_id}"),
        VisibilityRequirement::StatCheck {
            stat,
            operator,
            value,
        } => format!("stat_check:{stat}:{operator}:{value}"),
    }
}

/// Serializes a mechanic back to its token form. When an attribute is set
/// without a failure encounter, the fifth segment is emitted empty so the
/// attribute stays in its own position on re-parse.
pub fn serialize_mechanic(mechanic: &Mechanic) -> String {
    match mechanic {
        Mechanic::Navigate { next_node_id } => format!("navigate:{next_node_id}"),
        Mechanic::CombatInit { encounter_id } => format!("combat_init:{encounter_id}"),
        Mechanic::SkillCheck {
            dice,
            dc,
            attribute,
            on_success,
            on_failure,
            on_failure_encounter_id,
        } => {
            let mut parts = vec![
                dice.clone(),
                dc.to_string(),
                on_success.next_node_id.clone(),
                on_failure.next_node_id.clone(),
            ];
            match (on_failure_encounter_id, attribute) {
                (Some(encounter_id), Some(attribute)) => {
                    parts.push(encounter_id.clone());
                    parts.push(attribute.clone());
                }
                (Some(encounter_id), None) => parts.push(encounter_id.clone()),
                (None, Some(attribute)) => {
                    parts.push(String::new());
                    parts.push(attribute.clone());
                }
                (None, None) => {}
            }
            format!("skill_check:{}", parts.join(":"))
        }
    }
}

fn join_tokens(tokens: Vec<String>) -> String {
    tokens
        .into_iter()
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

fn choice_columns(choice: Option<&Choice>) -> [String; 4] {
    match choice {
        Some(choice) => [
            choice.id.clone(),
            choice.label.clone(),
            join_tokens(
                choice
                    .visibility_requirements
                    .iter()
                    .flatten()
                    .map(serialize_visibility)
                    .collect(),
            ),
            serialize_mechanic(&choice.mechanic),
        ],
        None => Default::default(),
    }
}

/// Serializes nodes to ordered rows matching [`NODES_HEADERS`].
pub fn nodes_to_rows(nodes: &BTreeMap<String, StoryNode>) -> Vec<Vec<String>> {
    nodes
        .values()
        .map(|node| {
            let on_enter = join_tokens(
                node.on_enter
                    .iter()
                    .flatten()
                    .map(serialize_action)
                    .collect(),
            );
            let choices = node.choices.as_deref().unwrap_or(&[]);
            let mut row = vec![
                node.id.clone(),
                node.node_type.clone(),
                node.text.clone(),
                node.image.clone().unwrap_or_default(),
                on_enter,
            ];
            for slot in 0..MAX_CHOICE_SLOTS {
                row.extend(choice_columns(choices.get(slot)));
            }
            row
        })
        .collect()
}

/// Serializes items to ordered rows matching [`ITEMS_HEADERS`].
pub fn items_to_rows(items: &BTreeMap<String, ItemTemplate>) -> Vec<Vec<String>> {
    items
        .values()
        .map(|item| {
            vec![
                item.id.clone(),
                item.name.clone(),
                item.item_type.clone(),
                item.damage.clone().unwrap_or_default(),
                item.attack_bonus.map(|n| n.to_string()).unwrap_or_default(),
                item.ac_bonus.map(|n| n.to_string()).unwrap_or_default(),
                item.effect.as_ref().map(serialize_action).unwrap_or_default(),
                item.scaling_attribute.clone().unwrap_or_default(),
                match item.aoe {
                    Some(true) => "true".to_string(),
                    Some(false) => "false".to_string(),
                    None => String::new(),
                },
            ]
        })
        .collect()
}

/// Serializes enemies to ordered rows matching [`ENEMIES_HEADERS`]. The
/// `maxHp` column mirrors `hp`; the runtime derives current hp from it.
pub fn enemies_to_rows(enemies: &BTreeMap<String, EnemyTemplate>) -> Vec<Vec<String>> {
    enemies
        .values()
        .map(|enemy| {
            vec![
                enemy.id.clone(),
                enemy.name.clone(),
                enemy.hp.to_string(),
                enemy.hp.to_string(),
                enemy.ac.to_string(),
                enemy.attack_bonus.to_string(),
                enemy.damage.clone(),
                enemy.xp_reward.to_string(),
            ]
        })
        .collect()
}

/// Serializes encounters to ordered rows matching [`ENCOUNTERS_HEADERS`].
pub fn encounters_to_rows(encounters: &BTreeMap<String, EncounterModel>) -> Vec<Vec<String>> {
    encounters
        .values()
        .map(|encounter| {
            let enemies = encounter
                .enemies
                .iter()
                .map(|spawn| format!("{}:{}", spawn.enemy_id, spawn.count))
                .collect::<Vec<_>>()
                .join(" | ");
            vec![
                encounter.id.clone(),
                encounter.name.clone(),
                enemies,
                encounter.resolution.on_victory.next_node_id.clone(),
                encounter.resolution.on_defeat.next_node_id.clone(),
            ]
        })
        .collect()
}

pub fn nodes_to_csv(nodes: &BTreeMap<String, StoryNode>) -> GbResult<String> {
    table::rows_to_csv("nodes.csv", &NODES_HEADERS, &nodes_to_rows(nodes))
}

pub fn items_to_csv(items: &BTreeMap<String, ItemTemplate>) -> GbResult<String> {
    table::rows_to_csv("items.csv", &ITEMS_HEADERS, &items_to_rows(items))
}

pub fn enemies_to_csv(enemies: &BTreeMap<String, EnemyTemplate>) -> GbResult<String> {
    table::rows_to_csv("enemies.csv", &ENEMIES_HEADERS, &enemies_to_rows(enemies))
}

pub fn encounters_to_csv(encounters: &BTreeMap<String, EncounterModel>) -> GbResult<String> {
    table::rows_to_csv(
        "encounters.csv",
        &ENCOUNTERS_HEADERS,
        &encounters_to_rows(encounters),
    )
}

/// Serializes all four tables of a model.
pub fn model_to_csv_tables(model: &StoryModel) -> GbResult<[(&'static str, String); 4]> {
    Ok([
        ("nodes.csv", nodes_to_csv(&model.nodes)?),
        ("items.csv", items_to_csv(&model.items)?),
        ("enemies.csv", enemies_to_csv(&model.enemies)?),
        ("encounters.csv", encounters_to_csv(&model.encounters)?),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChoiceOutcome;

    #[test]
    fn set_flag_serializes_true_implicitly() {
        assert_eq!(
            serialize_action(&Action::SetFlag {
                key: "met_king".to_string(),
                value: true
            }),
            "set_flag:met_king"
        );
        assert_eq!(
            serialize_action(&Action::SetFlag {
                key: "met_king".to_string(),
                value: false
            }),
            "set_flag:met_king:false"
        );
    }

    #[test]
    fn heal_amount_serializes_verbatim() {
        assert_eq!(
            serialize_action(&Action::Heal {
                amount: "2d4+2".to_string()
            }),
            "heal:2d4+2"
        );
    }

    #[test]
    fn skill_check_with_attribute_only_keeps_positions() {
        let mechanic = Mechanic::SkillCheck {
            dice: "1d20".to_string(),
            dc: 12,
            attribute: Some("dexterity".to_string()),
            on_success: ChoiceOutcome {
                next_node_id: "n_win".to_string(),
            },
            on_failure: ChoiceOutcome {
                next_node_id: "n_fail".to_string(),
            },
            on_failure_encounter_id: None,
        };
        assert_eq!(
            serialize_mechanic(&mechanic),
            "skill_check:1d20:12:n_win:n_fail::dexterity"
        );
    }

    #[test]
    fn skill_check_with_both_tail_segments() {
        let mechanic = Mechanic::SkillCheck {
            dice: "1d20".to_string(),
            dc: 15,
            attribute: Some("strength".to_string()),
            on_success: ChoiceOutcome {
                next_node_id: "a".to_string(),
            },
            on_failure: ChoiceOutcome {
                next_node_id: "b".to_string(),
            },
            on_failure_encounter_id: Some("enc_trap".to_string()),
        };
        assert_eq!(
            serialize_mechanic(&mechanic),
            "skill_check:1d20:15:a:b:enc_trap:strength"
        );
    }

    #[test]
    fn visibility_tokens_round_trip_textually() {
        assert_eq!(
            serialize_visibility(&VisibilityRequirement::StatCheck {
                stat: "currency".to_string(),
                operator: ">=".to_string(),
                value: 50
            }),
            "stat_check:currency:>=:50"
        );
        assert_eq!(
            serialize_visibility(&VisibilityRequirement::NotHasFlag {
                key: "cursed".to_string()
            }),
            "not_has_flag:cursed"
        );
    }

    #[test]
    fn empty_optionals_serialize_to_empty_strings() {
        let mut items = BTreeMap::new();
        items.insert(
            "rope".to_string(),
            ItemTemplate {
                id: "rope".to_string(),
                name: "rope".to_string(),
                item_type: "tool".to_string(),
                damage: None,
                attack_bonus: None,
                ac_bonus: None,
                effect: None,
                scaling_attribute: None,
                aoe: None,
            },
        );
        let rows = items_to_rows(&items);
        assert_eq!(
            rows[0],
            vec!["rope", "rope", "tool", "", "", "", "", "", ""]
        );
    }

    #[test]
    fn csv_escapes_delimiters_quotes_and_newlines() {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "n_a".to_string(),
            StoryNode {
                id: "n_a".to_string(),
                node_type: "narrative".to_string(),
                text: "He said \"wait, stop\"\nand left".to_string(),
                image: None,
                on_enter: None,
                choices: None,
            },
        );
        let csv_text = nodes_to_csv(&nodes).unwrap();
        assert!(csv_text.contains("\"He said \"\"wait, stop\"\"\nand left\""));
        // Unquoted plain fields stay unquoted.
        assert!(csv_text.contains("n_a,narrative"));
    }
}
