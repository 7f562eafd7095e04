//! Plugin definition registry
//!
//! Built once from descriptors and immutable afterwards. Share it through an
//! `Arc`.

use crate::catalog::Catalog;
use crate::descriptor::{ActionEntry, PluginDescriptor};
use crate::errors::DefinitionError;
use crate::types::{ActivityType, PluginActionDefinition, PluginDefinition};
use ahash::AHashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct PluginRegistry {
    descriptors: Vec<Arc<PluginDescriptor>>,
    /// Definition key -> position in `descriptors`
    index: AHashMap<Arc<str>, usize>,
}

#[derive(Debug, Default)]
pub struct PluginRegistryBuilder {
    descriptors: Vec<PluginDescriptor>,
}

impl PluginRegistryBuilder {
    pub fn register(mut self, descriptor: PluginDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn build(self) -> Result<PluginRegistry, DefinitionError> {
        let mut registry = PluginRegistry::default();
        for descriptor in self.descriptors {
            let key: Arc<str> = descriptor.definition().key.clone();
            if registry.index.contains_key(&key) {
                return Err(DefinitionError::DuplicateDefinition(key.to_string()));
            }
            debug!(
                definition_key = %key,
                actions = descriptor.actions().len(),
                "registered plugin definition"
            );
            registry.index.insert(key, registry.descriptors.len());
            registry.descriptors.push(Arc::new(descriptor));
        }
        Ok(registry)
    }
}

impl PluginRegistry {
    pub fn builder() -> PluginRegistryBuilder {
        PluginRegistryBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    #[inline]
    pub fn find_descriptor(&self, key: &str) -> Option<&Arc<PluginDescriptor>> {
        self.index.get(key).map(|&idx| &self.descriptors[idx])
    }

    pub fn descriptor(&self, key: &str) -> Result<&Arc<PluginDescriptor>, DefinitionError> {
        self.find_descriptor(key)
            .ok_or_else(|| DefinitionError::NotFound(key.to_string()))
    }

    pub fn find_definition(&self, key: &str) -> Option<&PluginDefinition> {
        self.find_descriptor(key).map(|d| d.definition())
    }

    /// Actions of a definition, filtered by activity type when one is given.
    pub fn find_actions(
        &self,
        key: &str,
        activity_type: Option<ActivityType>,
    ) -> Result<Vec<&PluginActionDefinition>, DefinitionError> {
        let definition = self.descriptor(key)?.definition();
        Ok(definition
            .actions
            .iter()
            .filter(|action| activity_type.map_or(true, |at| action.applies_to(at)))
            .collect())
    }

    /// Invoker entries for an action key (one per overload)
    pub fn find_action_entries<'a>(
        &'a self,
        key: &str,
        action_key: &'a str,
    ) -> Result<Vec<&'a ActionEntry>, DefinitionError> {
        Ok(self.descriptor(key)?.action_entries(action_key).collect())
    }

    pub fn all_definitions(&self) -> impl Iterator<Item = &PluginDefinition> {
        self.descriptors.iter().map(|d| d.definition())
    }

    pub fn definitions_in_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a PluginDefinition> {
        self.all_definitions()
            .filter(move |definition| definition.has_category(category))
    }

    pub fn definitions_for_activity(
        &self,
        activity_type: ActivityType,
    ) -> impl Iterator<Item = &PluginDefinition> {
        self.all_definitions()
            .filter(move |definition| definition.supports_activity(activity_type))
    }

    /// Snapshot of the registered definitions for export
    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.all_definitions().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ActionCall;
    use crate::types::{PluginProperty, ValueType};
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Dummy {}

    fn descriptor(key: &str, category: &str) -> PluginDescriptor {
        PluginDescriptor::builder::<Dummy>(key, key)
            .category(category)
            .property(PluginProperty::new("url", ValueType::Uri).required())
            .action(
                crate::types::PluginActionDefinition::new("start", "Start")
                    .activity(ActivityType::ServiceTaskStart),
                |_: &Dummy, _: &ActionCall<'_>| Ok(None),
            )
            .action(
                crate::types::PluginActionDefinition::new("assign", "Assign")
                    .activity(ActivityType::UserTaskCreate)
                    .activity(ActivityType::UserTaskAssignment),
                |_: &Dummy, _: &ActionCall<'_>| Ok(None),
            )
            .deserialize_properties()
            .build()
            .unwrap()
    }

    fn registry() -> PluginRegistry {
        PluginRegistry::builder()
            .register(descriptor("documenten-api", "documenten-api"))
            .register(descriptor("smtp-mail", "notification"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_find_definition() {
        let registry = registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.find_definition("smtp-mail").is_some());
        assert!(registry.find_definition("absent").is_none());
        assert!(matches!(
            registry.find_actions("absent", None),
            Err(DefinitionError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let result = PluginRegistry::builder()
            .register(descriptor("smtp-mail", "notification"))
            .register(descriptor("smtp-mail", "notification"))
            .build();
        assert!(matches!(result, Err(DefinitionError::DuplicateDefinition(k)) if k == "smtp-mail"));
    }

    #[test]
    fn test_find_actions_by_activity() {
        let registry = registry();
        let all = registry.find_actions("smtp-mail", None).unwrap();
        assert_eq!(all.len(), 2);

        let user_task = registry
            .find_actions("smtp-mail", Some(ActivityType::UserTaskAssignment))
            .unwrap();
        assert_eq!(user_task.len(), 1);
        assert_eq!(user_task[0].key.as_ref(), "assign");

        let none = registry
            .find_actions("smtp-mail", Some(ActivityType::EndEventStart))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_find_action_entries() {
        let registry = registry();
        let entries = {
            let action_key = String::from("assign");
            registry
                .find_action_entries("smtp-mail", &action_key)
                .unwrap()
                .len()
        };
        assert_eq!(entries, 1);
        assert!(registry
            .find_action_entries("smtp-mail", "absent")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_category_and_activity_queries() {
        let registry = registry();
        let keys: Vec<&str> = registry
            .definitions_in_category("notification")
            .map(|d| d.key.as_ref())
            .collect();
        assert_eq!(keys, vec!["smtp-mail"]);
        assert_eq!(
            registry
                .definitions_for_activity(ActivityType::ServiceTaskStart)
                .count(),
            2
        );
        assert_eq!(registry.catalog().plugins.len(), 2);
    }
}
