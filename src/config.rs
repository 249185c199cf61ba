//! Project configuration (`gamebook.toml`).
//!
//! Names the data directory and the graph-analysis exemptions. Anything not
//! declared here uses the defaults below.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::GbResult;
use crate::graph::GraphOptions;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Directory containing the four CSV tables.
    pub data_dir: PathBuf,
    /// Legitimate entry-point node ids, exempt from orphan detection.
    pub start_node_ids: Vec<String>,
    /// Node ids exempt from dead-end detection.
    pub dead_end_allowlist: Vec<String>,
    /// Linter warning cap; exceeding it fails the lint run.
    pub max_warnings: Option<usize>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/csv"),
            start_node_ids: vec!["n_start".to_string()],
            dead_end_allowlist: Vec::new(),
            max_warnings: None,
        }
    }
}

impl ProjectConfig {
    pub fn load(path: &Path) -> GbResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> GbResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Loads `gamebook.toml` from the given directory when present,
    /// otherwise falls back to defaults.
    pub fn load_or_default(dir: &Path) -> GbResult<Self> {
        let path = dir.join("gamebook.toml");
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn graph_options(&self) -> GraphOptions {
        GraphOptions {
            allowed_start_ids: self.start_node_ids.iter().cloned().collect::<BTreeSet<_>>(),
            dead_end_allowlist: self
                .dead_end_allowlist
                .iter()
                .cloned()
                .collect::<BTreeSet<_>>(),
        }
    }
}
