//! Configuration store
//!
//! Validates, encrypts and persists plugin configurations, and runs the
//! plugin's lifecycle hooks around each mutation. Mutations are serialized by
//! one store-wide lock because an identifier change rewrites references in
//! arbitrary other rows. Reads go straight to the repository.
//!
//! Order within a mutation: validation, encryption, persistence, hooks, event.
//! A failing hook is undone by committing the previous rows back.

use crate::codec::Encryptor;
use crate::configuration::{
    Batch, ConfigurationEntry, ConfigurationFilter, PluginConfiguration, StoredConfiguration,
};
use crate::errors::{CodecError, StoreError};
use crate::lifecycle::{run_hooks, ConfigurationEvent, EventPublisher, NoopEventPublisher};
use crate::placeholder::{expand_value, PlaceholderSource};
use crate::repository::{ChangeSet, ConfigurationRepository};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use valtimo_definitions::{coerce, EventType, PluginDefinition, PluginDescriptor, PluginRegistry};

pub struct ConfigurationStore {
    registry: Arc<PluginRegistry>,
    repository: Arc<dyn ConfigurationRepository>,
    encryptor: Arc<Encryptor>,
    publisher: Arc<dyn EventPublisher>,
    mutation_lock: Mutex<()>,
}

impl std::fmt::Debug for ConfigurationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationStore")
            .field("definitions", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl ConfigurationStore {
    pub fn new(
        registry: Arc<PluginRegistry>,
        repository: Arc<dyn ConfigurationRepository>,
        encryptor: Arc<Encryptor>,
    ) -> Self {
        ConfigurationStore {
            registry,
            repository,
            encryptor,
            publisher: Arc::new(NoopEventPublisher),
            mutation_lock: Mutex::new(()),
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    fn descriptor(&self, key: &str) -> Result<&Arc<PluginDescriptor>, StoreError> {
        self.registry
            .find_descriptor(key)
            .ok_or_else(|| StoreError::DefinitionNotFound(key.to_string()))
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub fn find(&self, id: Uuid) -> Result<Option<PluginConfiguration>, StoreError> {
        self.repository
            .find(id)?
            .map(|row| self.decrypt(&row))
            .transpose()
    }

    pub fn get(&self, id: Uuid) -> Result<PluginConfiguration, StoreError> {
        self.find(id)?
            .ok_or(StoreError::ConfigurationNotFound(id))
    }

    pub fn list(&self) -> Result<Batch<PluginConfiguration>, StoreError> {
        self.search(&ConfigurationFilter::default())
    }

    /// Decrypted configurations matching `filter`. Rows that fail to load are
    /// reported in the batch failures and do not affect the others.
    pub fn search(&self, filter: &ConfigurationFilter) -> Result<Batch<PluginConfiguration>, StoreError> {
        let mut batch = Batch::default();
        for row in self.repository.find_all()? {
            if let Some(key) = &filter.definition_key {
                if &row.definition_key != key {
                    continue;
                }
            }
            let Some(descriptor) = self.registry.find_descriptor(&row.definition_key) else {
                batch.push(row.id, Err(StoreError::DefinitionNotFound(row.definition_key.clone())));
                continue;
            };
            if !matches_definition(descriptor.definition(), filter) {
                continue;
            }
            batch.push(row.id, self.decrypt_with(descriptor.definition(), &row));
        }

        if !batch.is_complete() {
            warn!(
                failures = batch.failures.len(),
                "some plugin configurations could not be loaded"
            );
        }
        Ok(batch)
    }

    /// Every configuration with its secrets replaced by `${TITLE_PROPERTY}` tokens.
    pub fn export(&self) -> Result<Batch<ConfigurationEntry>, StoreError> {
        let mut batch = Batch::default();
        for row in self.repository.find_all()? {
            let entry = self
                .descriptor(&row.definition_key)
                .map(|descriptor| export_entry(descriptor.definition(), row.clone()));
            batch.push(row.id, entry);
        }
        Ok(batch)
    }

    fn decrypt(&self, row: &StoredConfiguration) -> Result<PluginConfiguration, StoreError> {
        let descriptor = self.descriptor(&row.definition_key)?;
        self.decrypt_with(descriptor.definition(), row)
    }

    fn decrypt_with(
        &self,
        definition: &PluginDefinition,
        row: &StoredConfiguration,
    ) -> Result<PluginConfiguration, StoreError> {
        let properties = self
            .encryptor
            .decrypt_properties(definition, &row.properties)
            .map_err(|source| codec_error(row.id, source))?;
        Ok(PluginConfiguration {
            id: row.id,
            title: row.title.clone(),
            definition_key: row.definition_key.clone(),
            properties,
        })
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    pub fn create(
        &self,
        id: Option<Uuid>,
        title: &str,
        properties: Map<String, Value>,
        definition_key: &str,
    ) -> Result<PluginConfiguration, StoreError> {
        let _guard = self.mutation_lock.lock();
        self.create_locked(id, title, properties, definition_key)
    }

    fn create_locked(
        &self,
        id: Option<Uuid>,
        title: &str,
        properties: Map<String, Value>,
        definition_key: &str,
    ) -> Result<PluginConfiguration, StoreError> {
        let descriptor = self.descriptor(definition_key)?;
        let definition = descriptor.definition();
        let id = id.unwrap_or_else(Uuid::new_v4);
        if self.repository.find(id)?.is_some() {
            return Err(StoreError::AlreadyExists(id));
        }

        let properties = validate(definition, title, properties)?;
        let configuration = PluginConfiguration {
            id,
            title: title.to_string(),
            definition_key: definition_key.to_string(),
            properties,
        };
        let plugin = descriptor.create_plugin(&configuration.view())?;
        let row = self.encrypt(definition, &configuration)?;

        self.repository.commit(ChangeSet::new().save(row))?;

        if let Err(err) = run_hooks(descriptor, plugin.as_ref(), EventType::Create, id) {
            self.compensate(ChangeSet::new().delete(id));
            return Err(err);
        }

        info!(
            configuration_id = %id,
            definition_key = %definition_key,
            "plugin configuration created"
        );
        self.publisher
            .publish(&ConfigurationEvent::Created(configuration.clone()));
        Ok(configuration)
    }

    /// Replace title and properties, optionally moving the configuration to a
    /// new identifier. Secret properties left out (or null) keep their value.
    pub fn update(
        &self,
        old_id: Uuid,
        new_id: Option<Uuid>,
        title: &str,
        properties: Map<String, Value>,
    ) -> Result<PluginConfiguration, StoreError> {
        let _guard = self.mutation_lock.lock();
        self.update_locked(old_id, new_id, title, properties)
    }

    fn update_locked(
        &self,
        old_id: Uuid,
        new_id: Option<Uuid>,
        title: &str,
        mut properties: Map<String, Value>,
    ) -> Result<PluginConfiguration, StoreError> {
        let previous_row = self
            .repository
            .find(old_id)?
            .ok_or(StoreError::ConfigurationNotFound(old_id))?;
        let descriptor = self.descriptor(&previous_row.definition_key)?;
        let definition = descriptor.definition();
        let previous = self.decrypt_with(definition, &previous_row)?;

        let new_id = new_id.unwrap_or(old_id);
        let moved = new_id != old_id;
        if moved && self.repository.find(new_id)?.is_some() {
            return Err(StoreError::AlreadyExists(new_id));
        }

        for property in definition.secret_properties() {
            let name = property.name.as_ref();
            let omitted = properties.get(name).map_or(true, Value::is_null);
            if omitted {
                if let Some(kept) = previous.properties.get(name).filter(|v| !v.is_null()) {
                    properties.insert(name.to_string(), kept.clone());
                }
            }
        }

        let properties = validate(definition, title, properties)?;
        let configuration = PluginConfiguration {
            id: new_id,
            title: title.to_string(),
            definition_key: previous.definition_key.clone(),
            properties,
        };
        let plugin = descriptor.create_plugin(&configuration.view())?;
        let row = self.encrypt(definition, &configuration)?;

        let mut changes = ChangeSet::new();
        let mut compensation = ChangeSet::new();
        if moved {
            changes = changes.delete(old_id);
            compensation = compensation.delete(new_id);
            for other in self.repository.find_all()? {
                if other.id == old_id {
                    continue;
                }
                if let Some(rewritten) = rewrite_references(&other.properties, old_id, new_id) {
                    debug!(
                        configuration_id = %other.id,
                        from = %old_id,
                        to = %new_id,
                        "rewriting configuration reference"
                    );
                    changes = changes.save(StoredConfiguration {
                        properties: rewritten,
                        ..other.clone()
                    });
                    compensation = compensation.save(other);
                }
            }
        }
        changes = changes.save(row);
        compensation = compensation.save(previous_row);

        self.repository.commit(changes).map_err(|source| {
            if moved {
                StoreError::ReferenceRewrite {
                    old_id,
                    new_id,
                    source,
                }
            } else {
                StoreError::Repository(source)
            }
        })?;

        if let Err(err) = run_hooks(descriptor, plugin.as_ref(), EventType::Update, new_id) {
            self.compensate(compensation);
            return Err(err);
        }

        info!(
            configuration_id = %new_id,
            previous_id = %old_id,
            definition_key = %configuration.definition_key,
            "plugin configuration updated"
        );
        self.publisher.publish(&ConfigurationEvent::Updated {
            previous_id: old_id,
            configuration: configuration.clone(),
        });
        Ok(configuration)
    }

    /// Run the delete hooks, then remove the row. Returns the removed snapshot.
    pub fn delete(&self, id: Uuid) -> Result<PluginConfiguration, StoreError> {
        let _guard = self.mutation_lock.lock();

        let row = self
            .repository
            .find(id)?
            .ok_or(StoreError::ConfigurationNotFound(id))?;
        let descriptor = self.descriptor(&row.definition_key)?;
        let configuration = self.decrypt_with(descriptor.definition(), &row)?;
        let plugin = descriptor.create_plugin(&configuration.view())?;

        run_hooks(descriptor, plugin.as_ref(), EventType::Delete, id)?;
        self.repository.commit(ChangeSet::new().delete(id))?;

        info!(
            configuration_id = %id,
            definition_key = %configuration.definition_key,
            "plugin configuration deleted"
        );
        self.publisher
            .publish(&ConfigurationEvent::Deleted(configuration.clone()));
        Ok(configuration)
    }

    /// Expand placeholders in a deployment document (one entry or an array of
    /// entries) and create or update each entry.
    pub fn deploy(
        &self,
        document: &Value,
        source: &dyn PlaceholderSource,
    ) -> Result<Vec<PluginConfiguration>, StoreError> {
        let expanded = expand_value(document, source)?;
        let entries = match expanded {
            Value::Array(items) => items,
            Value::Object(_) => vec![expanded],
            _ => {
                return Err(StoreError::InvalidEntry(
                    "expected an object or an array of objects".to_string(),
                ))
            }
        };
        let entries = entries
            .into_iter()
            .map(ConfigurationEntry::from_value)
            .collect::<Result<Vec<_>, _>>()?;

        let _guard = self.mutation_lock.lock();
        let mut deployed = Vec::with_capacity(entries.len());
        for entry in entries {
            let existing = match entry.id {
                Some(id) => self.repository.find(id)?,
                None => None,
            };
            let configuration = match existing {
                Some(row) => {
                    if row.definition_key != entry.plugin_definition_key {
                        return Err(StoreError::InvalidEntry(format!(
                            "configuration '{}' belongs to '{}', not '{}'",
                            row.id, row.definition_key, entry.plugin_definition_key
                        )));
                    }
                    self.update_locked(row.id, None, &entry.title, entry.properties)?
                }
                None => self.create_locked(
                    entry.id,
                    &entry.title,
                    entry.properties,
                    &entry.plugin_definition_key,
                )?,
            };
            deployed.push(configuration);
        }
        Ok(deployed)
    }

    fn encrypt(
        &self,
        definition: &PluginDefinition,
        configuration: &PluginConfiguration,
    ) -> Result<StoredConfiguration, StoreError> {
        let properties = self
            .encryptor
            .encrypt_properties(definition, &configuration.properties)
            .map_err(|source| codec_error(configuration.id, source))?;
        Ok(StoredConfiguration {
            id: configuration.id,
            title: configuration.title.clone(),
            definition_key: configuration.definition_key.clone(),
            properties,
        })
    }

    fn compensate(&self, changes: ChangeSet) {
        if let Err(err) = self.repository.commit(changes) {
            error!(error = %err, "failed to roll back plugin configuration change");
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn codec_error(id: Uuid, source: CodecError) -> StoreError {
    StoreError::Codec { id, source }
}

fn matches_definition(definition: &PluginDefinition, filter: &ConfigurationFilter) -> bool {
    if let Some(category) = &filter.category {
        if !definition.has_category(category) {
            return false;
        }
    }
    if let Some(activity_type) = filter.activity_type {
        if !definition.supports_activity(activity_type) {
            return false;
        }
    }
    true
}

/// Check required properties and coerce every declared value to its type.
fn validate(
    definition: &PluginDefinition,
    title: &str,
    mut properties: Map<String, Value>,
) -> Result<Map<String, Value>, StoreError> {
    for property in &definition.properties {
        let name = property.name.as_ref();
        let missing = match properties.get(name) {
            None | Some(Value::Null) => true,
            Some(Value::String(text)) => text.is_empty(),
            Some(_) => false,
        };
        if missing {
            if property.required {
                return Err(StoreError::PropertyRequired {
                    property: name.to_string(),
                    title: definition.title.to_string(),
                });
            }
            continue;
        }

        if let Some(value) = properties.get_mut(name) {
            *value = coerce(&property.value_type, value).map_err(|cause| StoreError::PropertyParse {
                property: name.to_string(),
                title: definition.title.to_string(),
                cause,
            })?;
        }
    }

    debug!(
        definition_key = %definition.key,
        title = %title,
        "plugin properties validated"
    );
    Ok(properties)
}

/// Rewrite string values equal to `old_id`, at any depth. `None` when nothing matched.
fn rewrite_references(
    properties: &Map<String, Value>,
    old_id: Uuid,
    new_id: Uuid,
) -> Option<Map<String, Value>> {
    fn rewrite(value: &mut Value, old_id: Uuid, new_id: &str) -> bool {
        match value {
            Value::String(text) => {
                let matches = text.len() >= 32 && Uuid::parse_str(text).is_ok_and(|id| id == old_id);
                if matches {
                    *text = new_id.to_string();
                }
                matches
            }
            Value::Array(items) => items
                .iter_mut()
                .fold(false, |changed, item| rewrite(item, old_id, new_id) | changed),
            Value::Object(map) => map
                .values_mut()
                .fold(false, |changed, item| rewrite(item, old_id, new_id) | changed),
            _ => false,
        }
    }

    let mut rewritten = Value::Object(properties.clone());
    if rewrite(&mut rewritten, old_id, &new_id.to_string()) {
        match rewritten {
            Value::Object(map) => Some(map),
            _ => None,
        }
    } else {
        None
    }
}

/// `Documenten API` + `clientSecret` -> `DOCUMENTEN_API_CLIENT_SECRET`
pub fn export_token(title: &str, property: &str) -> String {
    format!(
        "${{{}_{}}}",
        screaming_snake(title),
        screaming_snake(property)
    )
}

fn screaming_snake(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut previous: Option<char> = None;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            let boundary = ch.is_uppercase()
                && previous.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit());
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_uppercase());
            previous = Some(ch);
        } else {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            previous = None;
        }
    }
    out.trim_end_matches('_').to_string()
}

fn export_entry(definition: &PluginDefinition, row: StoredConfiguration) -> ConfigurationEntry {
    let mut properties = row.properties;
    for property in definition.secret_properties() {
        if let Some(value) = properties.get_mut(property.name.as_ref()) {
            if !value.is_null() {
                *value = Value::String(export_token(&row.title, &property.name));
            }
        }
    }
    ConfigurationEntry {
        id: Some(row.id),
        title: row.title,
        plugin_definition_key: row.definition_key,
        properties,
    }
}
