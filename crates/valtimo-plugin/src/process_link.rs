//! Process links bind a process activity to a configured plugin action.

use crate::configuration::PluginConfiguration;
use crate::errors::ProcessLinkError;
use crate::store::ConfigurationStore;
use parking_lot::{RwLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;
use valtimo_definitions::ActivityType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PluginProcessLink {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub process_definition_id: String,
    pub activity_id: String,
    pub activity_type: ActivityType,
    pub plugin_configuration_id: Uuid,
    pub plugin_action_definition_key: String,
    /// Literal values, `<prefix>:<path>` references, or nested structures of both
    #[serde(default = "empty_object")]
    pub action_properties: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl PluginProcessLink {
    pub fn new(
        process_definition_id: &str,
        activity_id: &str,
        activity_type: ActivityType,
        plugin_configuration_id: Uuid,
        plugin_action_definition_key: &str,
    ) -> Self {
        PluginProcessLink {
            id: Uuid::new_v4(),
            process_definition_id: process_definition_id.to_string(),
            activity_id: activity_id.to_string(),
            activity_type,
            plugin_configuration_id,
            plugin_action_definition_key: plugin_action_definition_key.to_string(),
            action_properties: empty_object(),
        }
    }

    pub fn with_properties(mut self, action_properties: Value) -> Self {
        self.action_properties = action_properties;
        self
    }
}

/// In-process link store validated against the configuration store.
///
/// Links are validated while the write lock is held, so a configuration
/// mutation performed under [`ProcessLinkStore::write`] never races a link
/// that was checked against the previous state.
#[derive(Debug)]
pub struct ProcessLinkStore {
    store: Arc<ConfigurationStore>,
    links: RwLock<Vec<PluginProcessLink>>,
}

impl ProcessLinkStore {
    pub fn new(store: Arc<ConfigurationStore>) -> Self {
        ProcessLinkStore {
            store,
            links: RwLock::new(Vec::new()),
        }
    }

    fn validate(&self, link: &PluginProcessLink) -> Result<PluginConfiguration, ProcessLinkError> {
        if !link.action_properties.is_object() {
            return Err(ProcessLinkError::InvalidActionProperties);
        }
        let configuration = self
            .store
            .find(link.plugin_configuration_id)?
            .ok_or(ProcessLinkError::ConfigurationNotFound(link.plugin_configuration_id))?;
        let entries = self
            .store
            .registry()
            .find_action_entries(&configuration.definition_key, &link.plugin_action_definition_key)?;
        if !entries.iter().any(|entry| entry.applies_to(link.activity_type)) {
            return Err(ProcessLinkError::UnsupportedActivity {
                definition: configuration.definition_key.clone(),
                action: link.plugin_action_definition_key.clone(),
                activity_type: link.activity_type,
            });
        }
        Ok(configuration)
    }

    pub fn create(&self, link: PluginProcessLink) -> Result<PluginProcessLink, ProcessLinkError> {
        let mut links = self.links.write();
        self.validate(&link)?;
        if links.iter().any(|existing| existing.id == link.id) {
            return Err(ProcessLinkError::AlreadyExists(link.id));
        }
        debug!(
            link_id = %link.id,
            activity_id = %link.activity_id,
            action = %link.plugin_action_definition_key,
            "process link created"
        );
        links.push(link.clone());
        Ok(link)
    }

    pub fn update(&self, id: Uuid, mut link: PluginProcessLink) -> Result<PluginProcessLink, ProcessLinkError> {
        link.id = id;
        let mut links = self.links.write();
        self.validate(&link)?;
        let existing = links
            .iter_mut()
            .find(|existing| existing.id == id)
            .ok_or(ProcessLinkError::NotFound(id))?;
        *existing = link.clone();
        Ok(link)
    }

    pub fn delete(&self, id: Uuid) -> Result<PluginProcessLink, ProcessLinkError> {
        let mut links = self.links.write();
        let position = links
            .iter()
            .position(|link| link.id == id)
            .ok_or(ProcessLinkError::NotFound(id))?;
        Ok(links.remove(position))
    }

    pub fn find(&self, id: Uuid) -> Option<PluginProcessLink> {
        self.links.read().iter().find(|link| link.id == id).cloned()
    }

    pub fn find_for_activity(&self, process_definition_id: &str, activity_id: &str) -> Vec<PluginProcessLink> {
        self.links
            .read()
            .iter()
            .filter(|link| {
                link.process_definition_id == process_definition_id && link.activity_id == activity_id
            })
            .cloned()
            .collect()
    }

    pub fn find_for_configuration(&self, configuration_id: Uuid) -> Vec<PluginProcessLink> {
        self.links
            .read()
            .iter()
            .filter(|link| link.plugin_configuration_id == configuration_id)
            .cloned()
            .collect()
    }

    /// Point links at a configuration's new identifier. Returns the number changed.
    pub fn rewrite_configuration_reference(&self, old_id: Uuid, new_id: Uuid) -> usize {
        rewrite_reference(&mut self.links.write(), old_id, new_id)
    }

    /// Drop every link of a configuration. Returns the removed links.
    pub fn remove_for_configuration(&self, configuration_id: Uuid) -> Vec<PluginProcessLink> {
        remove_configuration(&mut self.links.write(), configuration_id)
    }

    /// Exclusive access to the links; creates and updates wait until it is dropped.
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Vec<PluginProcessLink>> {
        self.links.write()
    }
}

pub(crate) fn rewrite_reference(links: &mut [PluginProcessLink], old_id: Uuid, new_id: Uuid) -> usize {
    let mut changed = 0;
    for link in links.iter_mut().filter(|link| link.plugin_configuration_id == old_id) {
        link.plugin_configuration_id = new_id;
        changed += 1;
    }
    changed
}

pub(crate) fn remove_configuration(
    links: &mut Vec<PluginProcessLink>,
    configuration_id: Uuid,
) -> Vec<PluginProcessLink> {
    let (removed, kept): (Vec<_>, Vec<_>) = links
        .drain(..)
        .partition(|link| link.plugin_configuration_id == configuration_id);
    *links = kept;
    removed
}
