//! Definition catalog file
//!
//! TOML snapshot of the registered plugin definitions. Used to inspect what a
//! deployment offers without loading any plugin code.

use crate::errors::DefinitionError;
use crate::types::PluginDefinition;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub const CATALOG_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub version: Arc<str>,
    pub generated_at: Arc<str>,
    #[serde(default)]
    pub plugins: Vec<PluginDefinition>,

    /// Runtime only - rebuilt on load for O(1) lookup
    #[serde(skip)]
    index: AHashMap<Arc<str>, usize>,
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog::new(Vec::new())
    }
}

impl Catalog {
    pub fn new(plugins: Vec<PluginDefinition>) -> Self {
        let mut catalog = Catalog {
            version: Arc::from(CATALOG_VERSION),
            generated_at: Arc::from(chrono::Utc::now().to_rfc3339()),
            plugins,
            index: AHashMap::new(),
        };
        catalog.rebuild_index();
        catalog
    }

    pub fn rebuild_index(&mut self) {
        self.index = self
            .plugins
            .iter()
            .enumerate()
            .map(|(idx, plugin)| (plugin.key.clone(), idx))
            .collect();
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&PluginDefinition> {
        self.index.get(key).map(|&idx| &self.plugins[idx])
    }

    pub fn load_from_path(path: &Path) -> Result<Self, DefinitionError> {
        let content = std::fs::read_to_string(path)?;
        let mut catalog: Catalog = toml::from_str(&content)?;
        catalog.rebuild_index();
        debug!(path = %path.display(), plugins = catalog.plugins.len(), "catalog loaded");
        Ok(catalog)
    }

    /// Save with an atomic write
    pub fn save_to_path(&self, path: &Path) -> Result<(), DefinitionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;

        let temp_path = path.with_extension("toml.tmp");
        {
            let file = std::fs::File::create(&temp_path)?;
            let mut writer = std::io::BufWriter::new(file);
            writer.write_all(content.as_bytes())?;
            writer.flush()?;
        }

        std::fs::rename(&temp_path, path)?;
        debug!(path = %path.display(), "catalog written");
        Ok(())
    }
}
