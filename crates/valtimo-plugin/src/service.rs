//! Plugin service facade
//!
//! Ties the configuration store, process links and the invoker together so
//! that configuration identifier changes and deletions carry over to links.

use crate::configuration::PluginConfiguration;
use crate::context::ActivityContext;
use crate::errors::{InvocationError, StoreError};
use crate::invoker::ActionInvoker;
use crate::process_link::{remove_configuration, rewrite_reference, PluginProcessLink, ProcessLinkStore};
use crate::resolution::ValueResolverService;
use crate::store::ConfigurationStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Result of one link run by [`PluginService::invoke_activity`]
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub link_id: Uuid,
    pub action: String,
    pub result: Option<Value>,
}

#[derive(Debug)]
pub struct PluginService {
    store: Arc<ConfigurationStore>,
    links: ProcessLinkStore,
    invoker: ActionInvoker,
}

impl PluginService {
    pub fn new(store: Arc<ConfigurationStore>, resolvers: ValueResolverService) -> Self {
        PluginService {
            links: ProcessLinkStore::new(store.clone()),
            invoker: ActionInvoker::new(store.clone(), resolvers),
            store,
        }
    }

    pub fn store(&self) -> &ConfigurationStore {
        &self.store
    }

    pub fn links(&self) -> &ProcessLinkStore {
        &self.links
    }

    pub fn invoker(&self) -> &ActionInvoker {
        &self.invoker
    }

    pub fn create_configuration(
        &self,
        id: Option<Uuid>,
        title: &str,
        properties: Map<String, Value>,
        definition_key: &str,
    ) -> Result<PluginConfiguration, StoreError> {
        self.store.create(id, title, properties, definition_key)
    }

    /// Update a configuration; links follow an identifier change. Link
    /// creation waits until the links have been moved.
    pub fn update_configuration(
        &self,
        old_id: Uuid,
        new_id: Option<Uuid>,
        title: &str,
        properties: Map<String, Value>,
    ) -> Result<PluginConfiguration, StoreError> {
        let mut links = self.links.write();
        let configuration = self.store.update(old_id, new_id, title, properties)?;
        if configuration.id != old_id {
            let moved = rewrite_reference(&mut links, old_id, configuration.id);
            debug!(
                from = %old_id,
                to = %configuration.id,
                links = moved,
                "process links moved to new configuration id"
            );
        }
        Ok(configuration)
    }

    /// Delete a configuration together with the process links that use it.
    pub fn delete_configuration(&self, id: Uuid) -> Result<PluginConfiguration, StoreError> {
        let mut links = self.links.write();
        let configuration = self.store.delete(id)?;
        let removed = remove_configuration(&mut links, id);
        if !removed.is_empty() {
            warn!(
                configuration_id = %id,
                links = removed.len(),
                "removed process links of deleted plugin configuration"
            );
        }
        Ok(configuration)
    }

    pub fn invoke(
        &self,
        context: &ActivityContext,
        link: &PluginProcessLink,
    ) -> Result<Option<Value>, InvocationError> {
        self.invoker.invoke(context, link)
    }

    /// Run every link bound to the context's activity and activity type, in
    /// creation order. The first failure stops the run.
    pub fn invoke_activity(&self, context: &ActivityContext) -> Result<Vec<ActionOutcome>, InvocationError> {
        let links = self
            .links
            .find_for_activity(context.process_definition_id(), context.activity_id());

        let mut outcomes = Vec::new();
        for link in links
            .iter()
            .filter(|link| link.activity_type == context.activity_type())
        {
            let result = self.invoker.invoke(context, link)?;
            outcomes.push(ActionOutcome {
                link_id: link.id,
                action: link.plugin_action_definition_key.clone(),
                result,
            });
        }
        Ok(outcomes)
    }
}
