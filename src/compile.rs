//! Row compilers: ordered flat rows in, id-keyed entity dictionaries out.
//!
//! Pure and deterministic: no I/O, and re-parsing identical rows yields
//! structurally identical dictionaries; the authoring tool's live-reload
//! diffing depends on that. Rows lacking an `id` are skipped with a warning;
//! on duplicate ids the first occurrence wins and later rows are flagged at
//! the raw-row level by [`duplicate_ids`].

use std::collections::BTreeMap;

use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::model::{
    ChoiceOutcome, CombatResolution, EncounterModel, EnemyTemplate, ItemTemplate, StoryModel,
    StoryNode,
};
use crate::token::{
    as_boolean, as_number, parse_action, parse_choice, parse_encounter_enemies, parse_on_enter,
    WarnSink,
};

/// One raw table row: trimmed header keys to trimmed cell values.
pub type Row = BTreeMap<String, String>;

/// The tabular format carries a fixed number of choice column groups per
/// node row (`choice1_*` .. `choice3_*`).
pub const MAX_CHOICE_SLOTS: usize = 3;

fn field<'a>(row: &'a Row, key: &str) -> &'a str {
    row.get(key).map(String::as_str).unwrap_or("")
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn opt_number(value: &str, fallback: i64) -> Option<i64> {
    if value.is_empty() {
        None
    } else {
        Some(as_number(value, fallback))
    }
}

/// `name ?? id`: an absent column falls back to the id, but an authored
/// empty cell stays empty.
fn name_or_id(row: &Row, id: &str) -> String {
    row.get("name")
        .cloned()
        .unwrap_or_else(|| id.to_string())
}

/// Short preview of a broken row for skip warnings.
fn preview_broken_row(row: &Row) -> String {
    let text = field(row, "text");
    if !text.trim().is_empty() {
        let snippet: String = text.chars().take(30).collect();
        return format!("{snippet}...");
    }
    let serialized = serde_json::to_string(row).unwrap_or_default();
    serialized.chars().take(50).collect()
}

fn warn_missing_id(row: &Row, sink: &mut dyn WarnSink) {
    sink.warn(&format!(
        "skipped row due to missing ID. Row data: {}",
        preview_broken_row(row)
    ));
}

/// Compiles node rows into a node dictionary.
pub fn parse_nodes(rows: &[Row], sink: &mut dyn WarnSink) -> BTreeMap<String, StoryNode> {
    let mut nodes = BTreeMap::new();
    for row in rows {
        let id = field(row, "id");
        if id.is_empty() {
            warn_missing_id(row, sink);
            continue;
        }

        let mut choices = Vec::new();
        for index in 1..=MAX_CHOICE_SLOTS {
            let choice_id = field(row, &format!("choice{index}_id"));
            if choice_id.is_empty() {
                continue;
            }
            let label = field(row, &format!("choice{index}_label"));
            let mechanic_raw = field(row, &format!("choice{index}_mechanic"));
            let visibility_raw = field(row, &format!("choice{index}_visibility"));
            // A labeled choice with an unparseable mechanic is dropped
            // whole, never partially included.
            if let Some(choice) = parse_choice(choice_id, label, mechanic_raw, visibility_raw, sink)
            {
                choices.push(choice);
            }
        }

        let node = StoryNode {
            id: id.to_string(),
            node_type: field(row, "type").to_string(),
            text: field(row, "text").to_string(),
            image: non_empty(field(row, "image")),
            on_enter: parse_on_enter(field(row, "onEnter"), sink),
            choices: if choices.is_empty() {
                None
            } else {
                Some(choices)
            },
        };
        nodes.entry(node.id.clone()).or_insert(node);
    }
    nodes
}

/// Compiles item rows into an item dictionary.
pub fn parse_items(rows: &[Row], sink: &mut dyn WarnSink) -> BTreeMap<String, ItemTemplate> {
    let mut items = BTreeMap::new();
    for row in rows {
        let id = field(row, "id");
        if id.is_empty() {
            warn_missing_id(row, sink);
            continue;
        }
        let effect_raw = field(row, "effect");
        let aoe_raw = field(row, "aoe");
        let item = ItemTemplate {
            id: id.to_string(),
            name: name_or_id(row, id),
            item_type: field(row, "type").to_string(),
            damage: non_empty(field(row, "damage")),
            attack_bonus: opt_number(field(row, "attackBonus"), 0),
            ac_bonus: opt_number(field(row, "acBonus"), 0),
            effect: if effect_raw.is_empty() {
                None
            } else {
                parse_action(effect_raw, sink)
            },
            scaling_attribute: non_empty(field(row, "scalingAttribute")),
            aoe: if aoe_raw.is_empty() {
                None
            } else {
                Some(as_boolean(aoe_raw, false))
            },
        };
        items.entry(item.id.clone()).or_insert(item);
    }
    items
}

/// Compiles enemy rows into an enemy dictionary.
pub fn parse_enemies(rows: &[Row], sink: &mut dyn WarnSink) -> BTreeMap<String, EnemyTemplate> {
    let mut enemies = BTreeMap::new();
    for row in rows {
        let id = field(row, "id");
        if id.is_empty() {
            warn_missing_id(row, sink);
            continue;
        }
        let enemy = EnemyTemplate {
            id: id.to_string(),
            name: name_or_id(row, id),
            hp: as_number(field(row, "hp"), 1),
            ac: as_number(field(row, "ac"), 10),
            attack_bonus: as_number(field(row, "attackBonus"), 0),
            damage: row
                .get("damage")
                .cloned()
                .unwrap_or_else(|| "1d2".to_string()),
            xp_reward: as_number(field(row, "xpReward"), 0),
        };
        enemies.entry(enemy.id.clone()).or_insert(enemy);
    }
    enemies
}

/// Compiles encounter rows into an encounter dictionary.
pub fn parse_encounters(
    rows: &[Row],
    sink: &mut dyn WarnSink,
) -> BTreeMap<String, EncounterModel> {
    let mut encounters = BTreeMap::new();
    for row in rows {
        let id = field(row, "id");
        if id.is_empty() {
            warn_missing_id(row, sink);
            continue;
        }
        let encounter = EncounterModel {
            id: id.to_string(),
            kind: "combat".to_string(),
            name: name_or_id(row, id),
            enemies: parse_encounter_enemies(field(row, "enemies")),
            resolution: CombatResolution {
                on_victory: ChoiceOutcome {
                    next_node_id: field(row, "onVictory").to_string(),
                },
                on_defeat: ChoiceOutcome {
                    next_node_id: field(row, "onDefeat").to_string(),
                },
            },
        };
        encounters.entry(encounter.id.clone()).or_insert(encounter);
    }
    encounters
}

/// Compiles all four tables at once.
pub fn parse_model(
    node_rows: &[Row],
    item_rows: &[Row],
    enemy_rows: &[Row],
    encounter_rows: &[Row],
    sink: &mut dyn WarnSink,
) -> StoryModel {
    StoryModel {
        nodes: parse_nodes(node_rows, sink),
        items: parse_items(item_rows, sink),
        enemies: parse_enemies(enemy_rows, sink),
        encounters: parse_encounters(encounter_rows, sink),
    }
}

/// Flags duplicate ids at the raw-row level. Row numbers are 1-based CSV
/// line numbers with the header on line 1, so the first data row is 2.
pub fn duplicate_ids(rows: &[Row], file: &str) -> Vec<Diagnostic> {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    let mut diagnostics = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let id = field(row, "id").trim();
        if id.is_empty() {
            continue;
        }
        let row_number = index + 2;
        if let Some(first_row) = seen.get(id) {
            diagnostics.push(
                Diagnostic::error(
                    DiagnosticCode::DuplicateId,
                    format!("Duplicate ID \"{id}\" (also at row {first_row})"),
                )
                .with_file(file)
                .with_row(row_number)
                .with_context("id", id)
                .with_context("file", file),
            );
        } else {
            seen.insert(id, row_number);
        }
    }
    diagnostics
}
