//! Configuration persistence
//!
//! The store talks to storage through [`ConfigurationRepository`]. A commit
//! applies a whole [`ChangeSet`] or nothing.

use crate::configuration::StoredConfiguration;
use crate::errors::RepositoryError;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Rows to delete and rows to save, applied atomically (deletes first)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub deletes: Vec<Uuid>,
    pub saves: Vec<StoredConfiguration>,
}

impl ChangeSet {
    pub fn new() -> Self {
        ChangeSet::default()
    }

    pub fn save(mut self, row: StoredConfiguration) -> Self {
        self.saves.push(row);
        self
    }

    pub fn delete(mut self, id: Uuid) -> Self {
        self.deletes.push(id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.saves.is_empty()
    }

    /// Apply to an ordered row list. Saved rows replace in place or append.
    pub fn apply_to(&self, rows: &mut Vec<StoredConfiguration>) {
        rows.retain(|row| !self.deletes.contains(&row.id));
        for save in &self.saves {
            match rows.iter_mut().find(|row| row.id == save.id) {
                Some(existing) => *existing = save.clone(),
                None => rows.push(save.clone()),
            }
        }
    }
}

pub trait ConfigurationRepository: Send + Sync {
    fn find(&self, id: Uuid) -> Result<Option<StoredConfiguration>, RepositoryError>;

    fn find_all(&self) -> Result<Vec<StoredConfiguration>, RepositoryError>;

    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError>;
}

// =============================================================================
// IN MEMORY
// =============================================================================

#[derive(Debug, Default)]
pub struct InMemoryConfigurationRepository {
    rows: RwLock<Vec<StoredConfiguration>>,
}

impl InMemoryConfigurationRepository {
    pub fn new() -> Self {
        InMemoryConfigurationRepository::default()
    }
}

impl ConfigurationRepository for InMemoryConfigurationRepository {
    fn find(&self, id: Uuid) -> Result<Option<StoredConfiguration>, RepositoryError> {
        Ok(self.rows.read().iter().find(|row| row.id == id).cloned())
    }

    fn find_all(&self) -> Result<Vec<StoredConfiguration>, RepositoryError> {
        Ok(self.rows.read().clone())
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        changes.apply_to(&mut self.rows.write());
        Ok(())
    }
}

// =============================================================================
// JSON FILE
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    configurations: Vec<StoredConfiguration>,
}

/// Rows kept in one JSON file, rewritten atomically on every commit
#[derive(Debug)]
pub struct FileConfigurationRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileConfigurationRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileConfigurationRepository {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoreFile, RepositoryError> {
        if !self.path.exists() {
            return Ok(StoreFile::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(StoreFile::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self, file: &StoreFile) -> Result<(), RepositoryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(file)?;

        // Atomic write: temp file then rename
        let temp_path = self.path.with_extension("json.tmp");
        {
            let handle = std::fs::File::create(&temp_path)?;
            let mut writer = std::io::BufWriter::new(handle);
            writer.write_all(content.as_bytes())?;
            writer.flush()?;
        }
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl ConfigurationRepository for FileConfigurationRepository {
    fn find(&self, id: Uuid) -> Result<Option<StoredConfiguration>, RepositoryError> {
        Ok(self
            .read()?
            .configurations
            .into_iter()
            .find(|row| row.id == id))
    }

    fn find_all(&self) -> Result<Vec<StoredConfiguration>, RepositoryError> {
        Ok(self.read()?.configurations)
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        if changes.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock();
        let mut file = self.read()?;
        changes.apply_to(&mut file.configurations);
        self.write(&file)?;
        debug!(
            path = %self.path.display(),
            saved = changes.saves.len(),
            deleted = changes.deletes.len(),
            "configuration file committed"
        );
        Ok(())
    }
}
