//! Filesystem store for the four CSV tables.
//!
//! All reads return fully-materialized row snapshots; the compiler and
//! validator never touch the filesystem themselves. Writes create a
//! timestamped backup of any previously-existing file before overwriting.

use std::fs;
use std::path::{Path, PathBuf};

use crate::compile::{self, Row};
use crate::diagnostic::Diagnostic;
use crate::error::GbResult;
use crate::model::StoryModel;
use crate::token::WarnSink;

pub const NODES_FILE: &str = "nodes.csv";
pub const ITEMS_FILE: &str = "items.csv";
pub const ENEMIES_FILE: &str = "enemies.csv";
pub const ENCOUNTERS_FILE: &str = "encounters.csv";
pub const DRAFT_FILE: &str = ".authoring-draft.json";

/// A directory holding the four story tables.
#[derive(Clone, Debug)]
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    pub fn exists(&self, file: &str) -> bool {
        self.path(file).is_file()
    }

    pub fn read_raw(&self, file: &str) -> GbResult<String> {
        Ok(fs::read_to_string(self.path(file))?)
    }

    pub fn write_raw(&self, file: &str, content: &str) -> GbResult<()> {
        fs::write(self.path(file), content)?;
        Ok(())
    }

    /// Reads and tokenizes one table into trimmed row maps.
    pub fn read_rows(&self, file: &str) -> GbResult<Vec<Row>> {
        let text = self.read_raw(file)?;
        crate::table::rows_from_csv(file, &text)
    }

    /// Backs up the existing file (if any) as `<name>.bak.<millis>`, then
    /// overwrites it. Returns the backup file name when one was made.
    pub fn backup_and_write(
        &self,
        file: &str,
        content: &str,
        timestamp_millis: i64,
    ) -> GbResult<Option<String>> {
        let backup = if self.exists(file) {
            let backup_name = format!("{file}.bak.{timestamp_millis}");
            let previous = self.read_raw(file)?;
            self.write_raw(&backup_name, &previous)?;
            Some(backup_name)
        } else {
            None
        };
        self.write_raw(file, content)?;
        Ok(backup)
    }

    /// Reads and compiles all four tables. Returns the model together with
    /// the raw-row duplicate-id diagnostics, which are only detectable
    /// before rows collapse into id-keyed dictionaries.
    pub fn load_model(&self, sink: &mut dyn WarnSink) -> GbResult<(StoryModel, Vec<Diagnostic>)> {
        let node_rows = self.read_rows(NODES_FILE)?;
        let item_rows = self.read_rows(ITEMS_FILE)?;
        let enemy_rows = self.read_rows(ENEMIES_FILE)?;
        let encounter_rows = self.read_rows(ENCOUNTERS_FILE)?;

        let mut duplicates = compile::duplicate_ids(&node_rows, NODES_FILE);
        duplicates.extend(compile::duplicate_ids(&item_rows, ITEMS_FILE));
        duplicates.extend(compile::duplicate_ids(&enemy_rows, ENEMIES_FILE));
        duplicates.extend(compile::duplicate_ids(&encounter_rows, ENCOUNTERS_FILE));

        let model = compile::parse_model(
            &node_rows,
            &item_rows,
            &enemy_rows,
            &encounter_rows,
            sink,
        );
        Ok((model, duplicates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::CollectSink;

    fn seed_store(dir: &Path) -> CsvStore {
        let store = CsvStore::new(dir);
        store
            .write_raw(
                NODES_FILE,
                "id,type,text,choice1_id,choice1_label,choice1_mechanic\n\
                 n_start,narrative,Begin,c1,Onward,navigate:n_end\n\
                 n_end,ending,Done,,,\n",
            )
            .unwrap();
        store.write_raw(ITEMS_FILE, "id,name,type\n").unwrap();
        store.write_raw(ENEMIES_FILE, "id,name,hp,ac\n").unwrap();
        store
            .write_raw(ENCOUNTERS_FILE, "id,enemies,onVictory,onDefeat\n")
            .unwrap();
        store
    }

    #[test]
    fn loads_a_model_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = seed_store(dir.path());
        let mut sink = CollectSink::default();
        let (model, duplicates) = store.load_model(&mut sink).unwrap();
        assert_eq!(model.nodes.len(), 2);
        assert!(duplicates.is_empty());
        assert!(model.items.is_empty());
    }

    #[test]
    fn backup_is_created_only_when_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());

        let first = store.backup_and_write("items.csv", "id,name,type\n", 1111).unwrap();
        assert_eq!(first, None);

        let second = store
            .backup_and_write("items.csv", "id,name,type\nrope,Rope,tool\n", 2222)
            .unwrap();
        assert_eq!(second.as_deref(), Some("items.csv.bak.2222"));
        assert_eq!(store.read_raw("items.csv.bak.2222").unwrap(), "id,name,type\n");
        assert!(store.read_raw("items.csv").unwrap().contains("rope"));
    }

    #[test]
    fn missing_table_is_a_fatal_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        let mut sink = CollectSink::default();
        assert!(store.load_model(&mut sink).is_err());
    }
}
