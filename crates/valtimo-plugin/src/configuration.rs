//! Configuration records
//!
//! `PluginConfiguration` carries decrypted properties and is what callers see.
//! `StoredConfiguration` is the persisted row with secrets still encrypted.

use crate::errors::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use valtimo_definitions::{ActivityType, ConfigurationView};

/// Configured instance of a plugin definition (decrypted)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfiguration {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "pluginDefinitionKey")]
    pub definition_key: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl PluginConfiguration {
    pub fn view(&self) -> ConfigurationView<'_> {
        ConfigurationView {
            id: self.id,
            title: &self.title,
            definition_key: &self.definition_key,
            properties: &self.properties,
        }
    }
}

/// Persisted configuration row; secret properties hold encrypted text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredConfiguration {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "pluginDefinitionKey")]
    pub definition_key: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Search criteria; every set field must match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationFilter {
    pub category: Option<String>,
    pub activity_type: Option<ActivityType>,
    pub definition_key: Option<String>,
}

impl ConfigurationFilter {
    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn activity_type(mut self, activity_type: ActivityType) -> Self {
        self.activity_type = Some(activity_type);
        self
    }

    pub fn definition_key(mut self, key: &str) -> Self {
        self.definition_key = Some(key.to_string());
        self
    }
}

/// Export and deployment file entry
///
/// ```json
/// {"id": "...", "title": "...", "pluginDefinitionKey": "...", "properties": {}}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub title: String,
    pub plugin_definition_key: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl ConfigurationEntry {
    /// Read an entry from a JSON value after placeholder expansion.
    pub fn from_value(value: Value) -> Result<Self, StoreError> {
        serde_json::from_value(value).map_err(|e| StoreError::InvalidEntry(e.to_string()))
    }
}

// =============================================================================
// BATCH RESULTS
// =============================================================================

/// Item that could not be produced, e.g. because a secret failed to decrypt
#[derive(Debug)]
pub struct BatchFailure {
    pub id: Uuid,
    pub error: StoreError,
}

/// Results of a multi-row operation with per-item failures kept apart
#[derive(Debug)]
pub struct Batch<T> {
    pub items: Vec<T>,
    pub failures: Vec<BatchFailure>,
}

impl<T> Default for Batch<T> {
    fn default() -> Self {
        Batch {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> Batch<T> {
    pub fn push(&mut self, id: Uuid, result: Result<T, StoreError>) {
        match result {
            Ok(item) => self.items.push(item),
            Err(error) => self.failures.push(BatchFailure { id, error }),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// All items, or the first failure
    pub fn into_result(self) -> Result<Vec<T>, StoreError> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(self.items),
        }
    }
}
