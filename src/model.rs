//! The compiled story data model.
//!
//! Entities are keyed by string id and rebuilt wholesale on every
//! compile/validate pass; two passes over the same rows must produce
//! structurally identical dictionaries, so all collections are `BTreeMap`.
//!
//! Entity `type` fields (node/item kind, stat-check stat/operator,
//! skill-check attribute) stay plain strings: validation is observational,
//! and an invalid value must survive parsing so the validator can report it
//! as-authored. Mechanics, actions, and visibility requirements are proper
//! sum types because they are produced by the token parsers, which already
//! reject unknown variants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Recognized node types.
pub const NODE_TYPES: [&str; 3] = ["narrative", "encounter", "ending"];
/// Recognized item types.
pub const ITEM_TYPES: [&str; 4] = ["weapon", "consumable", "tool", "armor"];
/// Attributes a skill check or item scaling may reference.
pub const VALID_ATTRIBUTES: [&str; 3] = ["strength", "dexterity", "intelligence"];
/// Stats a stat_check visibility requirement may reference.
pub const STAT_CHECK_STATS: [&str; 2] = ["hpCurrent", "currency"];
/// Comparison operators allowed in stat_check requirements.
pub const STAT_CHECK_OPERATORS: [&str; 5] = [">=", "<=", "==", ">", "<"];

/// A state mutation applied on node entry or item use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    SetFlag {
        key: String,
        value: bool,
    },
    #[serde(rename_all = "camelCase")]
    AddItem {
        item_id: String,
        qty: i64,
    },
    #[serde(rename_all = "camelCase")]
    RemoveItem {
        item_id: String,
        qty: i64,
    },
    AdjustHp {
        amount: i64,
    },
    AdjustCurrency {
        amount: i64,
    },
    /// Healing keeps its amount as a dice string; it is resolved later by a
    /// dice roll, unlike adjust_hp which applies immediately.
    Heal {
        amount: String,
    },
}

/// A precondition gating whether a choice is shown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisibilityRequirement {
    HasFlag {
        key: String,
    },
    NotHasFlag {
        key: String,
    },
    #[serde(rename_all = "camelCase")]
    HasItem {
        item_id: String,
    },
    StatCheck {
        stat: String,
        operator: String,
        value: i64,
    },
}

/// Target of a mechanic branch or encounter resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceOutcome {
    pub next_node_id: String,
}

/// What happens when a choice is selected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mechanic {
    #[serde(rename_all = "camelCase")]
    Navigate { next_node_id: String },
    #[serde(rename_all = "camelCase")]
    CombatInit { encounter_id: String },
    #[serde(rename_all = "camelCase")]
    SkillCheck {
        dice: String,
        dc: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribute: Option<String>,
        on_success: ChoiceOutcome,
        on_failure: ChoiceOutcome,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_failure_encounter_id: Option<String>,
    },
}

/// A player-facing option attached to a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub id: String,
    pub label: String,
    /// `None` means "no requirements authored" and the choice is always
    /// visible; this is distinct from an authored-but-empty list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_requirements: Option<Vec<VisibilityRequirement>>,
    pub mechanic: Mechanic,
}

/// A unit of narrative/encounter content the player can occupy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_enter: Option<Vec<Action>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTemplate {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_bonus: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ac_bonus: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aoe: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemyTemplate {
    pub id: String,
    pub name: String,
    pub hp: i64,
    pub ac: i64,
    pub attack_bonus: i64,
    pub damage: String,
    pub xp_reward: i64,
}

/// One enemy line in an encounter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemySpawn {
    pub enemy_id: String,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatResolution {
    pub on_victory: ChoiceOutcome,
    pub on_defeat: ChoiceOutcome,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterModel {
    pub id: String,
    #[serde(rename = "type", default = "combat_kind")]
    pub kind: String,
    /// Display name; older authored models omit it, so it defaults empty.
    #[serde(default)]
    pub name: String,
    pub enemies: Vec<EnemySpawn>,
    pub resolution: CombatResolution,
}

fn combat_kind() -> String {
    "combat".to_string()
}

/// The four compiled entity dictionaries, the "current model" of a
/// compile/validate pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryModel {
    #[serde(default)]
    pub nodes: BTreeMap<String, StoryNode>,
    #[serde(default)]
    pub items: BTreeMap<String, ItemTemplate>,
    #[serde(default)]
    pub enemies: BTreeMap<String, EnemyTemplate>,
    #[serde(default)]
    pub encounters: BTreeMap<String, EncounterModel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mechanic_json_uses_snake_case_tags_and_camel_case_fields() {
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

        let value = serde_json::to_value(&mechanic).unwrap();
        assert_eq!(value["type"], "skill_check");
        assert_eq!(value["onSuccess"]["nextNodeId"], "n_win");
        assert_eq!(value["attribute"], "dexterity");
        assert!(value.get("onFailureEncounterId").is_none());
    }

    #[test]
    fn action_json_round_trips() {
        let action = Action::AddItem {
            item_id: "potion".to_string(),
            qty: 2,
        };
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains("\"action\":\"add_item\""));
        assert!(json.contains("\"itemId\":\"potion\""));
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn heal_amount_stays_a_string() {
        let action: Action =
            serde_json::from_str(r#"{"action":"heal","amount":"2d4+2"}"#).unwrap();
        assert_eq!(
            action,
            Action::Heal {
                amount: "2d4+2".to_string()
            }
        );
    }
}
