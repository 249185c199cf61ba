//! Gamebook data engine: compiles tabular story content into a typed
//! node/choice/encounter graph, cross-validates every reference, and
//! detects structural defects before the data ships.
//!
//! Data flow: raw rows -> row compilers (token parsers) -> entity
//! dictionaries -> validator + graph analyzer -> diagnostics. The
//! serializer is the reverse arrow back to rows. The core is synchronous
//! and pure; all I/O lives in `storage` and the CLI.

mod authoring;
mod compile;
mod config;
mod diagnostic;
mod dice;
mod error;
mod graph;
mod model;
mod package;
mod serialize;
mod storage;
mod table;
mod token;
mod validate;

pub use authoring::{
    attach_files, load_draft, load_story, save_draft, save_story, validate_story, DraftEnvelope,
    LoadResponse, SaveOutcome,
};
pub use compile::{
    duplicate_ids, parse_enemies, parse_encounters, parse_items, parse_model, parse_nodes, Row,
    MAX_CHOICE_SLOTS,
};
pub use config::ProjectConfig;
pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, ValidationReport};
pub use dice::{is_dice_notation, parse as parse_dice, roll as roll_dice, DiceExpr, DiceRoll};
pub use error::{GbError, GbResult};
pub use graph::{
    analyze_graph, story_edges, to_dot, GraphAnalysis, GraphOptions, StoryEdge,
    ENCOUNTER_EDGE_PREFIX,
};
pub use model::{
    Action, Choice, ChoiceOutcome, CombatResolution, EncounterModel, EnemySpawn, EnemyTemplate,
    ItemTemplate, Mechanic, StoryModel, StoryNode, VisibilityRequirement, ITEM_TYPES, NODE_TYPES,
    STAT_CHECK_OPERATORS, STAT_CHECK_STATS, VALID_ATTRIBUTES,
};
pub use package::{
    export_package, has_known_signature, import_package, sanitize_model, sanitize_text,
    validate_assets, PackageManifest, PackagedAsset, StoryPackage, MAX_ASSET_BYTES,
};
pub use serialize::{
    encounters_to_csv, encounters_to_rows, enemies_to_csv, enemies_to_rows, items_to_csv,
    items_to_rows, model_to_csv_tables, nodes_to_csv, nodes_to_rows, serialize_action,
    serialize_mechanic, serialize_visibility, ENCOUNTERS_HEADERS, ENEMIES_HEADERS, ITEMS_HEADERS,
    NODES_HEADERS,
};
pub use storage::{
    CsvStore, DRAFT_FILE, ENCOUNTERS_FILE, ENEMIES_FILE, ITEMS_FILE, NODES_FILE,
};
pub use table::{rows_from_csv, rows_to_csv};
pub use token::{
    as_boolean, as_number, parse_action, parse_encounter_enemies, parse_mechanic, parse_on_enter,
    parse_visibility, split_pipe, CollectSink, TracingSink, WarnSink,
};
pub use validate::validate_model;
