//! Structured diagnostics with stable codes.
//!
//! Diagnostics are immutable value objects produced fresh on every
//! validation run. Authoring tooling and the lint CLI key off the string
//! codes, so the labels here must never change between versions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

/// Severity of a content diagnostic. Errors gate saves and builds;
/// warnings are advisory and never block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Stable diagnostic codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticCode {
    /// Duplicate id at the raw-row level (second and later occurrences).
    DuplicateId,
    /// A navigate target, skill-check branch, or encounter resolution
    /// references a node id that does not exist.
    DanglingNodeRef,
    /// A has_item requirement or add_item/remove_item action references a
    /// missing item.
    DanglingItemRef,
    /// An encounter spawn references a missing enemy.
    DanglingEnemyRef,
    /// A combat_init or onFailureEncounterId references a missing encounter.
    DanglingEncounterRef,
    /// Node/item type, attribute, stat, or operator outside its enum.
    InvalidEnumValue,
    /// Node with no inbound edges (and not an allowed start node).
    OrphanNode,
    /// Non-ending node with no outbound edges.
    DeadEndNode,
    /// Dice string is neither canonical notation nor a plain number.
    DiceNotation,
    /// Encounter with zero enemy spawns.
    EmptyEncounter,
    /// Enemy hp/ac outside bounds.
    EnemyStatBounds,
    /// Weapon item without a damage field.
    MissingWeaponDamage,
    /// Packaged asset payload is malformed (bad shape or undecodable).
    AssetShape,
    /// Packaged asset exceeds the size cap.
    AssetTooLarge,
    /// Packaged asset has no recognized magic-byte signature.
    AssetSignature,
}

impl DiagnosticCode {
    pub fn label(self) -> &'static str {
        match self {
            DiagnosticCode::DuplicateId => "DATA001",
            DiagnosticCode::DanglingNodeRef => "DATA002",
            DiagnosticCode::DanglingItemRef => "DATA003",
            DiagnosticCode::DanglingEnemyRef => "DATA004",
            DiagnosticCode::DanglingEncounterRef => "DATA005",
            DiagnosticCode::InvalidEnumValue => "DATA006",
            DiagnosticCode::OrphanNode => "DATA008",
            DiagnosticCode::DeadEndNode => "DATA009",
            DiagnosticCode::DiceNotation => "DATA010",
            DiagnosticCode::EmptyEncounter => "DATA011",
            DiagnosticCode::EnemyStatBounds => "DATA012",
            DiagnosticCode::MissingWeaponDamage => "DATA013",
            DiagnosticCode::AssetShape => "asset_shape",
            DiagnosticCode::AssetTooLarge => "asset_too_large",
            DiagnosticCode::AssetSignature => "asset_signature",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for DiagnosticCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// A single content diagnostic.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            file: None,
            row: None,
            column: None,
            message: message.into(),
            hint: None,
            context: BTreeMap::new(),
        }
    }

    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, message)
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warning, message)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Errors and warnings accumulated over a full validation pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.errors.push(diagnostic),
            Severity::Warning => self.warnings.push(diagnostic),
        }
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}
