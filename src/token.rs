//! Token parsers for the spreadsheet mini-DSL.
//!
//! Every parser is total: malformed input is reported through the injected
//! [`WarnSink`] and yields `None`, so callers can skip the offending cell
//! without aborting the surrounding row.
//!
//! The multi-token parsers return `None` (not an empty vector) when the
//! parsed set is empty. Downstream visibility resolution treats `None` as
//! "always visible"; collapsing it to an empty vector would change that
//! semantics.

use crate::model::{Action, Choice, ChoiceOutcome, EnemySpawn, Mechanic, VisibilityRequirement};

/// Receives human-readable warnings emitted while decoding tokens.
pub trait WarnSink {
    fn warn(&mut self, message: &str);
}

/// Forwards parser warnings to the `tracing` subscriber.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl WarnSink for TracingSink {
    fn warn(&mut self, message: &str) {
        tracing::warn!(target: "gamebook::parse", "{message}");
    }
}

/// Collects warnings in memory; used by tests and the authoring surface.
#[derive(Clone, Debug, Default)]
pub struct CollectSink {
    pub messages: Vec<String>,
}

impl WarnSink for CollectSink {
    fn warn(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}

/// Splits a pipe-delimited cell into trimmed, non-empty segments.
pub fn split_pipe(value: &str) -> Vec<&str> {
    value
        .split('|')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Numeric coercion: empty or unparseable input yields the fallback.
/// Never panics, never produces a sentinel the caller has to re-check.
pub fn as_number(value: &str, fallback: i64) -> i64 {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return fallback;
    }
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| {
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|parsed| parsed.is_finite())
                .map(|parsed| parsed as i64)
        })
        .unwrap_or(fallback)
}

/// Boolean coercion with the same empty-means-fallback convention.
pub fn as_boolean(value: &str, fallback: bool) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return fallback;
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => true,
        "false" => false,
        _ => fallback,
    }
}

/// Parses an action token (`action:arg1:arg2:...`).
pub fn parse_action(token: &str, sink: &mut dyn WarnSink) -> Option<Action> {
    let mut segments = token.split(':').map(str::trim);
    let action = segments.next().unwrap_or("");
    let parts: Vec<&str> = segments.collect();

    if action.is_empty() {
        sink.warn(&format!(
            "parse_action: empty or invalid action token: {token:?}"
        ));
        return None;
    }

    match action {
        "set_flag" => {
            let key = parts.first().copied().unwrap_or("");
            if key.is_empty() {
                sink.warn(&format!("parse_action: set_flag missing key. Token: {token:?}"));
                return None;
            }
            let value = match parts.get(1) {
                None => true,
                Some(raw) if raw.is_empty() => true,
                Some(raw) => as_boolean(raw, true),
            };
            Some(Action::SetFlag {
                key: key.to_string(),
                value,
            })
        }
        "add_item" | "remove_item" => {
            let item_id = parts.first().copied().unwrap_or("");
            if item_id.is_empty() {
                sink.warn(&format!(
                    "parse_action: {action} missing itemId. Token: {token:?}"
                ));
                return None;
            }
            let qty = as_number(parts.get(1).copied().unwrap_or(""), 1);
            if action == "add_item" {
                Some(Action::AddItem {
                    item_id: item_id.to_string(),
                    qty,
                })
            } else {
                Some(Action::RemoveItem {
                    item_id: item_id.to_string(),
                    qty,
                })
            }
        }
        "adjust_hp" => Some(Action::AdjustHp {
            amount: as_number(parts.first().copied().unwrap_or(""), 0),
        }),
        "adjust_currency" => Some(Action::AdjustCurrency {
            amount: as_number(parts.first().copied().unwrap_or(""), 0),
        }),
        "heal" => {
            // Kept as a dice string; resolved later by a dice roll.
            let amount = parts.first().copied().unwrap_or("");
            Some(Action::Heal {
                amount: if amount.is_empty() {
                    "0".to_string()
                } else {
                    amount.to_string()
                },
            })
        }
        _ => {
            sink.warn(&format!(
                "parse_action: unknown action type: {action}. Token: {token:?}"
            ));
            None
        }
    }
}

/// Parses a pipe-delimited onEnter cell into actions.
pub fn parse_on_enter(value: &str, sink: &mut dyn WarnSink) -> Option<Vec<Action>> {
    let actions: Vec<Action> = split_pipe(value)
        .into_iter()
        .filter_map(|token| parse_action(token, sink))
        .collect();
    if actions.is_empty() {
        None
    } else {
        Some(actions)
    }
}

/// Parses a pipe-delimited visibility cell into requirements.
pub fn parse_visibility(
    value: &str,
    sink: &mut dyn WarnSink,
) -> Option<Vec<VisibilityRequirement>> {
    let requirements: Vec<VisibilityRequirement> = split_pipe(value)
        .into_iter()
        .filter_map(|token| parse_visibility_token(token, sink))
        .collect();
    if requirements.is_empty() {
        None
    } else {
        Some(requirements)
    }
}

fn parse_visibility_token(
    token: &str,
    sink: &mut dyn WarnSink,
) -> Option<VisibilityRequirement> {
    let mut segments = token.split(':').map(str::trim);
    let kind = segments.next().unwrap_or("");
    let parts: Vec<&str> = segments.collect();

    if kind.is_empty() {
        sink.warn(&format!("parse_visibility: missing type. Token: {token:?}"));
        return None;
    }

    match kind {
        "has_flag" | "not_has_flag" => {
            let key = parts.first().copied().unwrap_or("");
            if key.is_empty() {
                sink.warn(&format!(
                    "parse_visibility: {kind} missing key. Token: {token:?}"
                ));
                return None;
            }
            if kind == "has_flag" {
                Some(VisibilityRequirement::HasFlag {
                    key: key.to_string(),
                })
            } else {
                Some(VisibilityRequirement::NotHasFlag {
                    key: key.to_string(),
                })
            }
        }
        "has_item" => {
            let item_id = parts.first().copied().unwrap_or("");
            if item_id.is_empty() {
                sink.warn(&format!(
                    "parse_visibility: has_item missing itemId. Token: {token:?}"
                ));
                return None;
            }
            Some(VisibilityRequirement::HasItem {
                item_id: item_id.to_string(),
            })
        }
        "stat_check" => {
            let stat = parts.first().copied().unwrap_or("");
            let operator = parts.get(1).copied().unwrap_or("");
            let raw_value = parts.get(2).copied().unwrap_or("");
            if stat.is_empty() || operator.is_empty() || raw_value.is_empty() {
                sink.warn(&format!(
                    "parse_visibility: stat_check missing stat/operator/value. Token: {token:?}"
                ));
                return None;
            }
            Some(VisibilityRequirement::StatCheck {
                stat: stat.to_string(),
                operator: operator.to_string(),
                value: as_number(raw_value, 0),
            })
        }
        _ => {
            sink.warn(&format!(
                "parse_visibility: unknown type: {kind}. Token: {token:?}"
            ));
            None
        }
    }
}

/// Parses a mechanic token. For skill_check the trailing segments are
/// positional; segment 5 (onFailureEncounterId) and segment 6 (attribute)
/// are each optional, and an empty segment 5 with a populated segment 6
/// must still parse; older content omits either independently.
pub fn parse_mechanic(value: &str, sink: &mut dyn WarnSink) -> Option<Mechanic> {
    let mut segments = value.split(':').map(str::trim);
    let kind = segments.next().unwrap_or("");
    let parts: Vec<&str> = segments.collect();

    if kind.is_empty() {
        sink.warn(&format!(
            "parse_mechanic: empty or missing mechanic type. Value: {value:?}"
        ));
        return None;
    }

    match kind {
        "navigate" => {
            let next_node_id = parts.first().copied().unwrap_or("");
            if next_node_id.is_empty() {
                sink.warn(&format!(
                    "parse_mechanic: navigate missing nextNodeId. Value: {value:?}"
                ));
                return None;
            }
            Some(Mechanic::Navigate {
                next_node_id: next_node_id.to_string(),
            })
        }
        "combat_init" => {
            let encounter_id = parts.first().copied().unwrap_or("");
            if encounter_id.is_empty() {
                sink.warn(&format!(
                    "parse_mechanic: combat_init missing encounterId. Value: {value:?}"
                ));
                return None;
            }
            Some(Mechanic::CombatInit {
                encounter_id: encounter_id.to_string(),
            })
        }
        "skill_check" => {
            let dice = parts.first().copied().unwrap_or("");
            let dc = parts.get(1).copied().unwrap_or("");
            let success = parts.get(2).copied().unwrap_or("");
            let failure = parts.get(3).copied().unwrap_or("");
            if dice.is_empty() || dc.is_empty() || success.is_empty() || failure.is_empty() {
                sink.warn(&format!(
                    "parse_mechanic: skill_check missing dice/dc/successNodeId/failureNodeId. Value: {value:?}"
                ));
                return None;
            }
            let on_failure_encounter_id = parts
                .get(4)
                .copied()
                .filter(|segment| !segment.is_empty())
                .map(str::to_string);
            let attribute = parts
                .get(5)
                .copied()
                .filter(|segment| !segment.is_empty())
                .map(str::to_string);
            Some(Mechanic::SkillCheck {
                dice: dice.to_string(),
                dc: as_number(dc, 0),
                attribute,
                on_success: ChoiceOutcome {
                    next_node_id: success.to_string(),
                },
                on_failure: ChoiceOutcome {
                    next_node_id: failure.to_string(),
                },
                on_failure_encounter_id,
            })
        }
        _ => {
            sink.warn(&format!(
                "parse_mechanic: unknown mechanic type: {kind}. Value: {value:?}"
            ));
            None
        }
    }
}

/// Parses an encounter's enemy roster cell (`goblin:3 | orc:1`).
pub fn parse_encounter_enemies(value: &str) -> Vec<EnemySpawn> {
    split_pipe(value)
        .into_iter()
        .filter_map(|token| {
            let mut segments = token.split(':').map(str::trim);
            let enemy_id = segments.next().unwrap_or("");
            if enemy_id.is_empty() {
                return None;
            }
            let count = as_number(segments.next().unwrap_or(""), 1);
            Some(EnemySpawn {
                enemy_id: enemy_id.to_string(),
                count,
            })
        })
        .collect()
}

/// Convenience used by the row compiler: a choice is only kept when the id
/// column is present, the label is non-empty, and the mechanic parses.
pub fn parse_choice(
    choice_id: &str,
    label: &str,
    mechanic_raw: &str,
    visibility_raw: &str,
    sink: &mut dyn WarnSink,
) -> Option<Choice> {
    let mechanic = parse_mechanic(mechanic_raw, sink)?;
    if label.is_empty() {
        return None;
    }
    Some(Choice {
        id: choice_id.to_string(),
        label: label.to_string(),
        visibility_requirements: parse_visibility(visibility_raw, sink),
        mechanic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_number_falls_back_on_empty_and_garbage() {
        assert_eq!(as_number("", 7), 7);
        assert_eq!(as_number("abc", 7), 7);
        assert_eq!(as_number("42", 7), 42);
        assert_eq!(as_number("-3", 7), -3);
    }

    #[test]
    fn as_boolean_recognizes_literals_only() {
        assert!(as_boolean("true", false));
        assert!(!as_boolean("false", true));
        assert!(as_boolean("", true));
        assert!(!as_boolean("yes", false));
    }

    #[test]
    fn split_pipe_drops_empty_segments() {
        assert_eq!(split_pipe("a | b ||c "), vec!["a", "b", "c"]);
        assert!(split_pipe("").is_empty());
        assert!(split_pipe(" | ").is_empty());
    }

    #[test]
    fn set_flag_value_defaults_to_true() {
        let mut sink = CollectSink::default();
        assert_eq!(
            parse_action("set_flag:met_king", &mut sink),
            Some(Action::SetFlag {
                key: "met_king".to_string(),
                value: true
            })
        );
        assert_eq!(
            parse_action("set_flag:met_king:false", &mut sink),
            Some(Action::SetFlag {
                key: "met_king".to_string(),
                value: false
            })
        );
        assert!(sink.messages.is_empty());
    }

    #[test]
    fn heal_amount_is_not_numerically_coerced() {
        let mut sink = CollectSink::default();
        assert_eq!(
            parse_action("heal:2d4+2", &mut sink),
            Some(Action::Heal {
                amount: "2d4+2".to_string()
            })
        );
        assert_eq!(
            parse_action("heal:", &mut sink),
            Some(Action::Heal {
                amount: "0".to_string()
            })
        );
    }

    #[test]
    fn unknown_action_warns_and_yields_none() {
        let mut sink = CollectSink::default();
        assert_eq!(parse_action("teleport:n_home", &mut sink), None);
        assert_eq!(sink.messages.len(), 1);
        assert!(sink.messages[0].contains("unknown action type"));
    }

    #[test]
    fn set_flag_without_key_warns_and_yields_none() {
        let mut sink = CollectSink::default();
        assert_eq!(parse_action("set_flag", &mut sink), None);
        assert!(sink.messages[0].contains("set_flag missing key"));
    }

    #[test]
    fn add_item_qty_defaults_to_one() {
        let mut sink = CollectSink::default();
        assert_eq!(
            parse_action("add_item:potion", &mut sink),
            Some(Action::AddItem {
                item_id: "potion".to_string(),
                qty: 1
            })
        );
        assert_eq!(
            parse_action("remove_item:potion:3", &mut sink),
            Some(Action::RemoveItem {
                item_id: "potion".to_string(),
                qty: 3
            })
        );
    }

    #[test]
    fn on_enter_is_none_when_nothing_parses() {
        let mut sink = CollectSink::default();
        assert_eq!(parse_on_enter("", &mut sink), None);
        assert_eq!(parse_on_enter("bogus:x | unknown", &mut sink), None);
        let parsed = parse_on_enter("set_flag:a | adjust_hp:-2", &mut sink).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn visibility_distinguishes_absent_from_empty() {
        let mut sink = CollectSink::default();
        // No requirements authored: None, meaning "always visible".
        assert_eq!(parse_visibility("", &mut sink), None);
        // Authored but entirely malformed also collapses to None.
        assert_eq!(parse_visibility("mystery:x", &mut sink), None);
        let parsed = parse_visibility("has_flag:brave | not_has_flag:cursed", &mut sink).unwrap();
        assert_eq!(
            parsed,
            vec![
                VisibilityRequirement::HasFlag {
                    key: "brave".to_string()
                },
                VisibilityRequirement::NotHasFlag {
                    key: "cursed".to_string()
                },
            ]
        );
    }

    #[test]
    fn stat_check_requires_all_three_parts() {
        let mut sink = CollectSink::default();
        assert_eq!(parse_visibility("stat_check:currency:>=", &mut sink), None);
        let parsed = parse_visibility("stat_check:currency:>=:50", &mut sink).unwrap();
        assert_eq!(
            parsed,
            vec![VisibilityRequirement::StatCheck {
                stat: "currency".to_string(),
                operator: ">=".to_string(),
                value: 50
            }]
        );
    }

    #[test]
    fn navigate_and_combat_init_need_targets() {
        let mut sink = CollectSink::default();
        assert_eq!(parse_mechanic("navigate", &mut sink), None);
        assert_eq!(
            parse_mechanic("navigate:n_gate", &mut sink),
            Some(Mechanic::Navigate {
                next_node_id: "n_gate".to_string()
            })
        );
        assert_eq!(
            parse_mechanic("combat_init:enc_wolves", &mut sink),
            Some(Mechanic::CombatInit {
                encounter_id: "enc_wolves".to_string()
            })
        );
    }

    #[test]
    fn skill_check_optional_tail_segments_are_independent() {
        let mut sink = CollectSink::default();

        // Empty 5th segment, populated 6th: attribute set, no encounter.
        let mechanic =
            parse_mechanic("skill_check:1d20:12:n_win:n_fail::dexterity", &mut sink).unwrap();
        match mechanic {
            Mechanic::SkillCheck {
                attribute,
                on_failure_encounter_id,
                dc,
                ..
            } => {
                assert_eq!(attribute.as_deref(), Some("dexterity"));
                assert_eq!(on_failure_encounter_id, None);
                assert_eq!(dc, 12);
            }
            other => panic!("expected skill_check, got {other:?}"),
        }

        // Populated 5th only.
        let mechanic =
            parse_mechanic("skill_check:1d20:15:n_win:n_fail:enc_trap", &mut sink).unwrap();
        match mechanic {
            Mechanic::SkillCheck {
                attribute,
                on_failure_encounter_id,
                ..
            } => {
                assert_eq!(attribute, None);
                assert_eq!(on_failure_encounter_id.as_deref(), Some("enc_trap"));
            }
            other => panic!("expected skill_check, got {other:?}"),
        }

        // Missing any of the four required segments fails.
        assert_eq!(parse_mechanic("skill_check:1d20:12:n_win", &mut sink), None);
    }

    #[test]
    fn encounter_enemies_default_count() {
        let spawns = parse_encounter_enemies("goblin:3 | orc | :5");
        assert_eq!(
            spawns,
            vec![
                EnemySpawn {
                    enemy_id: "goblin".to_string(),
                    count: 3
                },
                EnemySpawn {
                    enemy_id: "orc".to_string(),
                    count: 1
                },
            ]
        );
    }
}
