//! Authoring operations: the load/validate/save contract consumed by the
//! authoring tool's server layer and the CLI.
//!
//! These functions are the whole surface the HTTP layer exposes; the
//! transport itself lives outside this crate. Every operation returns both
//! errors and warnings so the tool can always show the complete picture
//! after an edit, and `save` is all-or-nothing: a single error-severity
//! diagnostic blocks every file write, while warnings never block.

use serde::{Deserialize, Serialize};

use crate::diagnostic::{Diagnostic, Severity, ValidationReport};
use crate::error::GbResult;
use crate::graph::{analyze_graph, GraphOptions};
use crate::model::StoryModel;
use crate::serialize::model_to_csv_tables;
use crate::storage::{
    CsvStore, DRAFT_FILE, ENCOUNTERS_FILE, ENEMIES_FILE, ITEMS_FILE, NODES_FILE,
};
use crate::token::WarnSink;
use crate::validate::validate_model;

/// Response of the `load` operation.
#[derive(Clone, Debug, Serialize)]
pub struct LoadResponse {
    #[serde(flatten)]
    pub model: StoryModel,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

/// Outcome of the `save` operation.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved {
        written: Vec<String>,
        backups: Vec<String>,
        warnings: Vec<Diagnostic>,
    },
    Rejected {
        errors: Vec<Diagnostic>,
        warnings: Vec<Diagnostic>,
    },
}

/// A draft of the in-memory model, persisted without validation gating.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftEnvelope {
    pub saved_at: String,
    pub model: StoryModel,
}

/// Annotates diagnostics with the table file they refer to, derived from
/// their entity context.
pub fn attach_files(diagnostics: &mut [Diagnostic]) {
    for diagnostic in diagnostics {
        if diagnostic.file.is_some() {
            continue;
        }
        let file = if diagnostic.context.contains_key("nodeId") {
            NODES_FILE
        } else if diagnostic.context.contains_key("itemId") {
            ITEMS_FILE
        } else if diagnostic.context.contains_key("enemyId") {
            ENEMIES_FILE
        } else if diagnostic.context.contains_key("encounterId") {
            ENCOUNTERS_FILE
        } else {
            continue;
        };
        diagnostic.file = Some(file.to_string());
    }
}

/// Runs the validator and the graph analyzer over an in-memory model;
/// graph diagnostics are merged into the warnings list.
pub fn validate_story(model: &StoryModel, options: &GraphOptions) -> ValidationReport {
    let mut report = validate_model(model);
    let analysis = analyze_graph(&model.nodes, &model.encounters, options);
    report.warnings.extend(analysis.diagnostics);
    attach_files(&mut report.errors);
    attach_files(&mut report.warnings);
    report
}

/// Reads the four tables, compiles, validates, and analyzes the graph.
pub fn load_story(
    store: &CsvStore,
    options: &GraphOptions,
    sink: &mut dyn WarnSink,
) -> GbResult<LoadResponse> {
    let (model, duplicates) = store.load_model(sink)?;
    let report = validate_story(&model, options);

    let mut errors: Vec<Diagnostic> = duplicates
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .cloned()
        .collect();
    errors.extend(report.errors);
    let mut warnings: Vec<Diagnostic> = duplicates
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .cloned()
        .collect();
    warnings.extend(report.warnings);

    Ok(LoadResponse {
        model,
        errors,
        warnings,
    })
}

/// Validates, then serializes and writes all four tables with backups of any
/// previously-existing files. Any error rejects the save with nothing
/// written.
pub fn save_story(
    store: &CsvStore,
    model: &StoryModel,
    options: &GraphOptions,
    timestamp_millis: i64,
) -> GbResult<SaveOutcome> {
    let report = validate_story(model, options);
    if !report.errors.is_empty() {
        return Ok(SaveOutcome::Rejected {
            errors: report.errors,
            warnings: report.warnings,
        });
    }

    let tables = model_to_csv_tables(model)?;
    let mut written = Vec::new();
    let mut backups = Vec::new();
    for (file, content) in &tables {
        if let Some(backup) = store.backup_and_write(file, content, timestamp_millis)? {
            backups.push(backup);
        }
        written.push((*file).to_string());
    }

    Ok(SaveOutcome::Saved {
        written,
        backups,
        warnings: report.warnings,
    })
}

/// Persists the in-memory model as a draft, bypassing validation.
pub fn save_draft(store: &CsvStore, model: &StoryModel, saved_at: &str) -> GbResult<()> {
    let envelope = DraftEnvelope {
        saved_at: saved_at.to_string(),
        model: model.clone(),
    };
    let json = serde_json::to_string_pretty(&envelope)?;
    store.write_raw(DRAFT_FILE, &json)
}

/// Loads the last draft, if one exists.
pub fn load_draft(store: &CsvStore) -> GbResult<Option<DraftEnvelope>> {
    if !store.exists(DRAFT_FILE) {
        return Ok(None);
    }
    let raw = store.read_raw(DRAFT_FILE)?;
    Ok(Some(serde_json::from_str(&raw)?))
}
