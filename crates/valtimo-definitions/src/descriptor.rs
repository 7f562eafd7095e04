//! Plugin descriptors
//!
//! A descriptor is the declarative table registered for one plugin type: the
//! definition metadata, a factory that turns a decrypted property bag into a
//! plugin instance, the invoker for every action, and the lifecycle hooks.

use crate::errors::DefinitionError;
use crate::types::{
    ActivityType, EventType, PluginActionDefinition, PluginDefinition, PluginProperty,
};
use ahash::AHashSet;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

/// Type-erased plugin instance produced by a factory
pub type PluginObject = Box<dyn Any + Send + Sync>;

/// Invoker bound to one action entry
pub type ActionHandler =
    Arc<dyn Fn(&dyn Any, &ActionCall<'_>) -> anyhow::Result<Option<Value>> + Send + Sync>;

/// Handler run for a lifecycle event
pub type HookHandler = Arc<dyn Fn(&dyn Any) -> anyhow::Result<()> + Send + Sync>;

// =============================================================================
// FACTORY
// =============================================================================

/// Decrypted configuration handed to a factory
#[derive(Debug, Clone, Copy)]
pub struct ConfigurationView<'a> {
    pub id: Uuid,
    pub title: &'a str,
    pub definition_key: &'a str,
    pub properties: &'a Map<String, Value>,
}

/// Creates plugin instances from configurations
pub trait PluginFactory: Send + Sync {
    fn can_create(&self, view: &ConfigurationView<'_>) -> bool;

    fn create(&self, view: &ConfigurationView<'_>) -> anyhow::Result<PluginObject>;
}

/// Injects the property bag into `P` through serde
pub struct DeserializeFactory<P> {
    definition_key: Arc<str>,
    marker: PhantomData<fn() -> P>,
}

impl<P> DeserializeFactory<P> {
    pub fn new(definition_key: &str) -> Self {
        DeserializeFactory {
            definition_key: Arc::from(definition_key),
            marker: PhantomData,
        }
    }
}

impl<P> PluginFactory for DeserializeFactory<P>
where
    P: DeserializeOwned + Send + Sync + 'static,
{
    fn can_create(&self, view: &ConfigurationView<'_>) -> bool {
        view.definition_key == self.definition_key.as_ref()
    }

    fn create(&self, view: &ConfigurationView<'_>) -> anyhow::Result<PluginObject> {
        let plugin: P = serde_json::from_value(Value::Object(view.properties.clone()))?;
        Ok(Box::new(plugin))
    }
}

/// Factory backed by a closure
pub struct FnFactory<P, F> {
    definition_key: Arc<str>,
    build: F,
    marker: PhantomData<fn() -> P>,
}

impl<P, F> PluginFactory for FnFactory<P, F>
where
    P: Send + Sync + 'static,
    F: Fn(&ConfigurationView<'_>) -> anyhow::Result<P> + Send + Sync,
{
    fn can_create(&self, view: &ConfigurationView<'_>) -> bool {
        view.definition_key == self.definition_key.as_ref()
    }

    fn create(&self, view: &ConfigurationView<'_>) -> anyhow::Result<PluginObject> {
        Ok(Box::new((self.build)(view)?))
    }
}

// =============================================================================
// ACTION CALL
// =============================================================================

/// Bound arguments of one action invocation
#[derive(Debug, Clone, Copy)]
pub struct ActionCall<'a> {
    pub configuration_id: Uuid,
    pub process_instance_id: &'a str,
    pub activity_id: &'a str,
    pub activity_type: ActivityType,
    /// Coerced parameter values keyed by parameter name
    pub arguments: &'a Map<String, Value>,
}

impl ActionCall<'_> {
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name).filter(|v| !v.is_null())
    }

    pub fn get<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        let value = self
            .argument(name)
            .ok_or_else(|| anyhow::anyhow!("argument '{}' is not bound", name))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn get_optional<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<Option<T>> {
        self.argument(name)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(Into::into)
    }
}

// =============================================================================
// ENTRIES
// =============================================================================

#[derive(Clone)]
pub struct ActionEntry {
    pub definition: PluginActionDefinition,
    pub handler: ActionHandler,
}

impl ActionEntry {
    pub fn applies_to(&self, activity_type: ActivityType) -> bool {
        self.definition.applies_to(activity_type)
    }
}

impl fmt::Debug for ActionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionEntry")
            .field("key", &self.definition.key)
            .field("method", &self.definition.method)
            .field("activity_types", &self.definition.activity_types)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct LifecycleHook {
    pub name: Arc<str>,
    pub events: Vec<EventType>,
    pub handler: HookHandler,
}

impl LifecycleHook {
    pub fn handles(&self, event: EventType) -> bool {
        self.events.contains(&event)
    }
}

impl fmt::Debug for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHook")
            .field("name", &self.name)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// DESCRIPTOR
// =============================================================================

#[derive(Clone)]
pub struct PluginDescriptor {
    definition: PluginDefinition,
    factory: Arc<dyn PluginFactory>,
    actions: Vec<ActionEntry>,
    hooks: Vec<LifecycleHook>,
}

impl PluginDescriptor {
    /// Start a descriptor for the plugin type `P`.
    pub fn builder<P>(key: &str, title: &str) -> PluginDescriptorBuilder<P>
    where
        P: Send + Sync + 'static,
    {
        PluginDescriptorBuilder {
            definition: PluginDefinition::new(key, title, std::any::type_name::<P>()),
            factory: None,
            actions: Vec::new(),
            hooks: Vec::new(),
            marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.definition.key
    }

    pub fn definition(&self) -> &PluginDefinition {
        &self.definition
    }

    pub fn actions(&self) -> &[ActionEntry] {
        &self.actions
    }

    /// Invoker entries registered under an action key, in declaration order
    pub fn action_entries<'a>(&'a self, action_key: &'a str) -> impl Iterator<Item = &'a ActionEntry> {
        self.actions
            .iter()
            .filter(move |entry| entry.definition.key.as_ref() == action_key)
    }

    pub fn hooks_for(&self, event: EventType) -> impl Iterator<Item = &LifecycleHook> {
        self.hooks.iter().filter(move |hook| hook.handles(event))
    }

    /// Instantiate the plugin with the decrypted configuration injected.
    pub fn create_plugin(&self, view: &ConfigurationView<'_>) -> Result<PluginObject, DefinitionError> {
        if !self.factory.can_create(view) {
            return Err(DefinitionError::Instantiation {
                key: self.definition.key.to_string(),
                reason: format!(
                    "factory cannot create plugins for definition '{}'",
                    view.definition_key
                ),
            });
        }
        self.factory
            .create(view)
            .map_err(|e| DefinitionError::Instantiation {
                key: self.definition.key.to_string(),
                reason: format!("{:#}", e),
            })
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("definition", &self.definition)
            .field("actions", &self.actions)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

pub struct PluginDescriptorBuilder<P> {
    definition: PluginDefinition,
    factory: Option<Arc<dyn PluginFactory>>,
    actions: Vec<ActionEntry>,
    hooks: Vec<LifecycleHook>,
    marker: PhantomData<fn() -> P>,
}

impl<P> PluginDescriptorBuilder<P>
where
    P: Send + Sync + 'static,
{
    pub fn description(mut self, description: &str) -> Self {
        self.definition.description = Some(Arc::from(description));
        self
    }

    pub fn implementation(mut self, implementation: &str) -> Self {
        self.definition.implementation = Arc::from(implementation);
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        if !self.definition.has_category(category) {
            self.definition.categories.push(Arc::from(category));
        }
        self
    }

    pub fn property(mut self, property: PluginProperty) -> Self {
        self.definition.properties.push(property);
        self
    }

    /// Register an action and the closure that runs it.
    pub fn action<F>(mut self, definition: PluginActionDefinition, handler: F) -> Self
    where
        F: Fn(&P, &ActionCall<'_>) -> anyhow::Result<Option<Value>> + Send + Sync + 'static,
    {
        let method = definition.method.clone();
        let handler: ActionHandler = Arc::new(move |plugin: &dyn Any, call: &ActionCall<'_>| {
            let plugin = plugin.downcast_ref::<P>().ok_or_else(|| {
                anyhow::anyhow!(
                    "plugin instance is not a {} (method '{}')",
                    std::any::type_name::<P>(),
                    method
                )
            })?;
            handler(plugin, call)
        });
        self.definition.actions.push(definition.clone());
        self.actions.push(ActionEntry {
            definition,
            handler,
        });
        self
    }

    /// Register a hook run on each of `events`.
    pub fn on_event<F>(mut self, name: &str, events: &[EventType], handler: F) -> Self
    where
        F: Fn(&P) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let hook_name: Arc<str> = Arc::from(name);
        let label = hook_name.clone();
        let handler: HookHandler = Arc::new(move |plugin: &dyn Any| {
            let plugin = plugin.downcast_ref::<P>().ok_or_else(|| {
                anyhow::anyhow!(
                    "plugin instance is not a {} (hook '{}')",
                    std::any::type_name::<P>(),
                    label
                )
            })?;
            handler(plugin)
        });
        self.hooks.push(LifecycleHook {
            name: hook_name,
            events: events.to_vec(),
            handler,
        });
        self
    }

    pub fn factory(mut self, factory: Arc<dyn PluginFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn factory_fn<F>(self, build: F) -> Self
    where
        F: Fn(&ConfigurationView<'_>) -> anyhow::Result<P> + Send + Sync + 'static,
    {
        let key = self.definition.key.clone();
        self.factory(Arc::new(FnFactory {
            definition_key: key,
            build,
            marker: PhantomData,
        }))
    }

    pub fn build(self) -> Result<PluginDescriptor, DefinitionError> {
        let key = self.definition.key.to_string();
        let invalid = |reason: String| DefinitionError::InvalidDefinition {
            key: key.clone(),
            reason,
        };

        if key.trim().is_empty() {
            return Err(invalid("definition key is empty".to_string()));
        }

        let Some(factory) = self.factory else {
            return Err(invalid("no plugin factory registered".to_string()));
        };

        let mut property_names = AHashSet::new();
        for property in &self.definition.properties {
            if !property_names.insert(property.name.clone()) {
                return Err(invalid(format!(
                    "property '{}' is declared more than once",
                    property.name
                )));
            }
        }

        for entry in &self.actions {
            if entry.definition.activity_types.is_empty() {
                return Err(invalid(format!(
                    "action '{}' declares no activity types",
                    entry.definition.key
                )));
            }
        }

        let mut hook_names = AHashSet::new();
        for hook in &self.hooks {
            if hook.events.is_empty() {
                return Err(invalid(format!("hook '{}' has no events", hook.name)));
            }
            if !hook_names.insert(hook.name.clone()) {
                return Err(invalid(format!(
                    "hook '{}' is declared more than once",
                    hook.name
                )));
            }
        }

        Ok(PluginDescriptor {
            definition: self.definition,
            factory,
            actions: self.actions,
            hooks: self.hooks,
        })
    }
}

impl<P> PluginDescriptorBuilder<P>
where
    P: DeserializeOwned + Send + Sync + 'static,
{
    /// Use serde to inject the decrypted properties into `P`.
    pub fn deserialize_properties(self) -> Self {
        let key = self.definition.key.clone();
        self.factory(Arc::new(DeserializeFactory::<P>::new(&key)))
    }
}
