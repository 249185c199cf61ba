//! Graph analysis over the compiled story: inbound/outbound edge sets,
//! orphan and dead-end detection, and a DOT export for the authoring view.
//!
//! The analysis is deliberately local: it counts edges per node in a single
//! pass rather than running a reachability traversal from a root. A node
//! that is reachable only through another orphan is flagged once, at
//! itself, not transitively. Upgrading to full root reachability would
//! change diagnostic counts for existing content, so the local semantics
//! stay until that change is called for explicitly.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::model::{EncounterModel, Mechanic, StoryNode};

/// Synthetic graph-node prefix for encounters, keeping their ids disjoint
/// from story-node ids.
pub const ENCOUNTER_EDGE_PREFIX: &str = "enc:";

/// Caller-supplied exemptions for the defect checks.
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Legitimate entry points; never flagged as orphans.
    pub allowed_start_ids: BTreeSet<String>,
    /// Nodes exempt from dead-end detection.
    pub dead_end_allowlist: BTreeSet<String>,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            allowed_start_ids: BTreeSet::from(["n_start".to_string()]),
            dead_end_allowlist: BTreeSet::new(),
        }
    }
}

/// Result of a graph analysis pass.
#[derive(Clone, Debug, Default, Serialize)]
pub struct GraphAnalysis {
    pub orphans: Vec<String>,
    pub dead_ends: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A labeled directed edge of the story graph.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoryEdge {
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// nodeId -> set of node/encounter ids that point to it.
fn build_incoming(
    nodes: &BTreeMap<String, StoryNode>,
    encounters: &BTreeMap<String, EncounterModel>,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut incoming: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut add_edge = |to: &str, from: String| {
        if to.is_empty() {
            return;
        }
        incoming.entry(to.to_string()).or_default().insert(from);
    };

    for (node_id, node) in nodes {
        for choice in node.choices.iter().flatten() {
            match &choice.mechanic {
                Mechanic::Navigate { next_node_id } => {
                    add_edge(next_node_id, node_id.clone());
                }
                Mechanic::SkillCheck {
                    on_success,
                    on_failure,
                    ..
                } => {
                    add_edge(&on_success.next_node_id, node_id.clone());
                    add_edge(&on_failure.next_node_id, node_id.clone());
                }
                Mechanic::CombatInit { .. } => {}
            }
        }
    }

    for (encounter_id, encounter) in encounters {
        let source = format!("{ENCOUNTER_EDGE_PREFIX}{encounter_id}");
        add_edge(&encounter.resolution.on_victory.next_node_id, source.clone());
        add_edge(&encounter.resolution.on_defeat.next_node_id, source);
    }

    incoming
}

/// Node ids with at least one mechanic-bearing choice. A choices array whose
/// entries carry no mechanic still counts as zero outgoing edges.
fn nodes_with_outgoing(nodes: &BTreeMap<String, StoryNode>) -> BTreeSet<String> {
    let mut has_outgoing = BTreeSet::new();
    for (node_id, node) in nodes {
        for choice in node.choices.iter().flatten() {
            match &choice.mechanic {
                Mechanic::Navigate { .. }
                | Mechanic::CombatInit { .. }
                | Mechanic::SkillCheck { .. } => {
                    has_outgoing.insert(node_id.clone());
                }
            }
        }
    }
    has_outgoing
}

/// Detects orphans and dead ends. Both defect classes are warnings:
/// unreachable content is a design smell, not a hard failure, because a node
/// may be intentionally reachable only through content not yet authored.
pub fn analyze_graph(
    nodes: &BTreeMap<String, StoryNode>,
    encounters: &BTreeMap<String, EncounterModel>,
    options: &GraphOptions,
) -> GraphAnalysis {
    let incoming = build_incoming(nodes, encounters);
    let has_outgoing = nodes_with_outgoing(nodes);

    let mut analysis = GraphAnalysis::default();

    for id in nodes.keys() {
        let has_inbound = incoming.get(id).is_some_and(|edges| !edges.is_empty());
        if !has_inbound && !options.allowed_start_ids.contains(id) {
            analysis.orphans.push(id.clone());
            analysis.diagnostics.push(
                Diagnostic::warning(
                    DiagnosticCode::OrphanNode,
                    format!(
                        "Orphan node \"{id}\": no inbound edges (unreachable unless it is a start node)"
                    ),
                )
                .with_context("nodeId", id)
                .with_hint("Add a choice or encounter resolution that navigates to this node."),
            );
        }
    }

    for (id, node) in nodes {
        if options.dead_end_allowlist.contains(id) {
            continue;
        }
        if node.node_type == "ending" {
            continue;
        }
        if has_outgoing.contains(id) {
            continue;
        }
        analysis.dead_ends.push(id.clone());
        analysis.diagnostics.push(
            Diagnostic::warning(
                DiagnosticCode::DeadEndNode,
                format!(
                    "Dead-end node \"{id}\": no outgoing choices (player cannot leave unless type is ending)"
                ),
            )
            .with_context("nodeId", id)
            .with_hint(
                "Add at least one choice with navigate/combat_init/skill_check, or set type to ending.",
            ),
        );
    }

    analysis
}

/// The full labeled edge list implied by choices and encounter resolutions,
/// for the authoring tool's graph view.
pub fn story_edges(
    nodes: &BTreeMap<String, StoryNode>,
    encounters: &BTreeMap<String, EncounterModel>,
) -> Vec<StoryEdge> {
    let mut edges = Vec::new();
    for (node_id, node) in nodes {
        for choice in node.choices.iter().flatten() {
            match &choice.mechanic {
                Mechanic::Navigate { next_node_id } => edges.push(StoryEdge {
                    from: node_id.clone(),
                    to: next_node_id.clone(),
                    label: Some(choice.label.clone()),
                }),
                Mechanic::CombatInit { encounter_id } => edges.push(StoryEdge {
                    from: node_id.clone(),
                    to: format!("{ENCOUNTER_EDGE_PREFIX}{encounter_id}"),
                    label: Some(choice.label.clone()),
                }),
                Mechanic::SkillCheck {
                    on_success,
                    on_failure,
                    on_failure_encounter_id,
                    ..
                } => {
                    edges.push(StoryEdge {
                        from: node_id.clone(),
                        to: on_success.next_node_id.clone(),
                        label: Some("success".to_string()),
                    });
                    edges.push(StoryEdge {
                        from: node_id.clone(),
                        to: on_failure.next_node_id.clone(),
                        label: Some("failure".to_string()),
                    });
                    if let Some(encounter_id) = on_failure_encounter_id {
                        edges.push(StoryEdge {
                            from: node_id.clone(),
                            to: format!("{ENCOUNTER_EDGE_PREFIX}{encounter_id}"),
                            label: Some("failure combat".to_string()),
                        });
                    }
                }
            }
        }
    }
    for (encounter_id, encounter) in encounters {
        let source = format!("{ENCOUNTER_EDGE_PREFIX}{encounter_id}");
        for (label, outcome) in [
            ("victory", &encounter.resolution.on_victory),
            ("defeat", &encounter.resolution.on_defeat),
        ] {
            if !outcome.next_node_id.is_empty() {
                edges.push(StoryEdge {
                    from: source.clone(),
                    to: outcome.next_node_id.clone(),
                    label: Some(label.to_string()),
                });
            }
        }
    }
    edges
}

/// Exports the story graph to DOT for visualization with Graphviz.
pub fn to_dot(
    nodes: &BTreeMap<String, StoryNode>,
    encounters: &BTreeMap<String, EncounterModel>,
    options: &GraphOptions,
) -> String {
    let analysis = analyze_graph(nodes, encounters, options);
    let orphans: BTreeSet<&str> = analysis.orphans.iter().map(String::as_str).collect();

    let mut dot = String::from("digraph StoryGraph {\n");
    dot.push_str("    rankdir=TB;\n");
    dot.push_str("    node [shape=box];\n\n");

    for (id, node) in nodes {
        let color = if orphans.contains(id.as_str()) {
            "red"
        } else if options.allowed_start_ids.contains(id) {
            "green"
        } else {
            "black"
        };
        let shape = if node.node_type == "ending" {
            "doublecircle"
        } else {
            "box"
        };
        dot.push_str(&format!(
            "    \"{id}\" [label=\"{}\" shape={shape} color={color}];\n",
            id.replace('"', "'")
        ));
    }
    for id in encounters.keys() {
        dot.push_str(&format!(
            "    \"{ENCOUNTER_EDGE_PREFIX}{id}\" [label=\"{id}\" shape=diamond];\n"
        ));
    }

    dot.push('\n');
    for edge in story_edges(nodes, encounters) {
        let label = edge
            .label
            .as_ref()
            .map(|label| format!(" [label=\"{}\"]", label.replace('"', "'")))
            .unwrap_or_default();
        dot.push_str(&format!("    \"{}\" -> \"{}\"{label};\n", edge.from, edge.to));
    }

    dot.push_str("}\n");
    dot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Choice, ChoiceOutcome, CombatResolution, EnemySpawn};

    fn node(id: &str, node_type: &str) -> StoryNode {
        StoryNode {
            id: id.to_string(),
            node_type: node_type.to_string(),
            text: String::new(),
            image: None,
            on_enter: None,
            choices: None,
        }
    }

    fn navigate(choice_id: &str, target: &str) -> Choice {
        Choice {
            id: choice_id.to_string(),
            label: "go".to_string(),
            visibility_requirements: None,
            mechanic: Mechanic::Navigate {
                next_node_id: target.to_string(),
            },
        }
    }

    fn encounter(id: &str, victory: &str, defeat: &str) -> EncounterModel {
        EncounterModel {
            id: id.to_string(),
            kind: "combat".to_string(),
            name: id.to_string(),
            enemies: vec![EnemySpawn {
                enemy_id: "rat".to_string(),
                count: 1,
            }],
            resolution: CombatResolution {
                on_victory: ChoiceOutcome {
                    next_node_id: victory.to_string(),
                },
                on_defeat: ChoiceOutcome {
                    next_node_id: defeat.to_string(),
                },
            },
        }
    }

    #[test]
    fn unreferenced_node_is_an_orphan_but_start_is_not() {
        let mut nodes = BTreeMap::new();
        let mut start = node("n_start", "narrative");
        start.choices = Some(vec![navigate("c1", "n_start")]);
        nodes.insert("n_start".to_string(), start);
        nodes.insert("n_b".to_string(), node("n_b", "ending"));

        let analysis = analyze_graph(&nodes, &BTreeMap::new(), &GraphOptions::default());
        assert_eq!(analysis.orphans, vec!["n_b".to_string()]);
        assert!(analysis
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::OrphanNode
                && d.context.get("nodeId").map(String::as_str) == Some("n_b")));
    }

    #[test]
    fn start_id_never_appears_in_orphans_regardless_of_edges() {
        let mut nodes = BTreeMap::new();
        nodes.insert("n_start".to_string(), node("n_start", "ending"));
        let analysis = analyze_graph(&nodes, &BTreeMap::new(), &GraphOptions::default());
        assert!(analysis.orphans.is_empty());
    }

    #[test]
    fn ending_with_no_exits_is_not_a_dead_end() {
        let mut nodes = BTreeMap::new();
        nodes.insert("n_start".to_string(), node("n_start", "ending"));
        nodes.insert("n_stuck".to_string(), node("n_stuck", "narrative"));

        let analysis = analyze_graph(&nodes, &BTreeMap::new(), &GraphOptions::default());
        assert_eq!(analysis.dead_ends, vec!["n_stuck".to_string()]);
    }

    #[test]
    fn dead_end_allowlist_is_honored() {
        let mut nodes = BTreeMap::new();
        nodes.insert("n_start".to_string(), node("n_start", "narrative"));
        let options = GraphOptions {
            dead_end_allowlist: BTreeSet::from(["n_start".to_string()]),
            ..GraphOptions::default()
        };
        let analysis = analyze_graph(&nodes, &BTreeMap::new(), &options);
        assert!(analysis.dead_ends.is_empty());
    }

    #[test]
    fn encounter_resolution_counts_as_inbound_edge() {
        let mut nodes = BTreeMap::new();
        let mut start = node("n_start", "narrative");
        start.choices = Some(vec![Choice {
            id: "c1".to_string(),
            label: "fight".to_string(),
            visibility_requirements: None,
            mechanic: Mechanic::CombatInit {
                encounter_id: "enc_1".to_string(),
            },
        }]);
        nodes.insert("n_start".to_string(), start);
        nodes.insert("n_victory".to_string(), node("n_victory", "ending"));
        let mut encounters = BTreeMap::new();
        encounters.insert("enc_1".to_string(), encounter("enc_1", "n_victory", ""));

        let analysis = analyze_graph(&nodes, &encounters, &GraphOptions::default());
        // n_victory is fed by the encounter, so it is not an orphan; n_start
        // has combat_init, so it is not a dead end.
        assert!(analysis.orphans.is_empty());
        assert!(analysis.dead_ends.is_empty());
    }

    #[test]
    fn skill_check_branches_produce_edges_both_ways() {
        let mut nodes = BTreeMap::new();
        let mut start = node("n_start", "narrative");
        start.choices = Some(vec![Choice {
            id: "c1".to_string(),
            label: "climb".to_string(),
            visibility_requirements: None,
            mechanic: Mechanic::SkillCheck {
                dice: "1d20".to_string(),
                dc: 12,
                attribute: None,
                on_success: ChoiceOutcome {
                    next_node_id: "n_top".to_string(),
                },
                on_failure: ChoiceOutcome {
                    next_node_id: "n_fall".to_string(),
                },
                on_failure_encounter_id: None,
            },
        }]);
        nodes.insert("n_start".to_string(), start);
        nodes.insert("n_top".to_string(), node("n_top", "ending"));
        nodes.insert("n_fall".to_string(), node("n_fall", "ending"));

        let analysis = analyze_graph(&nodes, &BTreeMap::new(), &GraphOptions::default());
        assert!(analysis.orphans.is_empty());
        assert!(analysis.dead_ends.is_empty());

        let edges = story_edges(&nodes, &BTreeMap::new());
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().any(|e| e.to == "n_top"));
    }

    #[test]
    fn orphan_detection_is_local_not_transitive() {
        // n_b is only reachable through orphan n_a; only n_a is flagged.
        let mut nodes = BTreeMap::new();
        nodes.insert("n_start".to_string(), node("n_start", "ending"));
        let mut n_a = node("n_a", "narrative");
        n_a.choices = Some(vec![navigate("c1", "n_b")]);
        nodes.insert("n_a".to_string(), n_a);
        nodes.insert("n_b".to_string(), node("n_b", "ending"));

        let analysis = analyze_graph(&nodes, &BTreeMap::new(), &GraphOptions::default());
        assert_eq!(analysis.orphans, vec!["n_a".to_string()]);
    }

    #[test]
    fn dot_export_names_nodes_and_edges() {
        let mut nodes = BTreeMap::new();
        let mut start = node("n_start", "narrative");
        start.choices = Some(vec![navigate("c1", "n_end")]);
        nodes.insert("n_start".to_string(), start);
        nodes.insert("n_end".to_string(), node("n_end", "ending"));

        let dot = to_dot(&nodes, &BTreeMap::new(), &GraphOptions::default());
        assert!(dot.contains("digraph StoryGraph"));
        assert!(dot.contains("\"n_start\" -> \"n_end\""));
        assert!(dot.contains("doublecircle"));
    }
}
