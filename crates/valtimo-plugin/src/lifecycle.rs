//! Configuration lifecycle: plugin hooks and domain events
//!
//! Hooks run after a mutation is persisted. Domain events are published only
//! once the hooks succeeded.

use crate::configuration::PluginConfiguration;
use crate::errors::StoreError;
use parking_lot::Mutex;
use std::any::Any;
use tracing::{debug, info};
use uuid::Uuid;
use valtimo_definitions::{EventType, PluginDescriptor};

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationEvent {
    Created(PluginConfiguration),
    Updated {
        previous_id: Uuid,
        configuration: PluginConfiguration,
    },
    Deleted(PluginConfiguration),
}

impl ConfigurationEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            ConfigurationEvent::Created(_) => EventType::Create,
            ConfigurationEvent::Updated { .. } => EventType::Update,
            ConfigurationEvent::Deleted(_) => EventType::Delete,
        }
    }

    pub fn configuration(&self) -> &PluginConfiguration {
        match self {
            ConfigurationEvent::Created(configuration)
            | ConfigurationEvent::Updated { configuration, .. }
            | ConfigurationEvent::Deleted(configuration) => configuration,
        }
    }
}

pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &ConfigurationEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventPublisher;

impl EventPublisher for NoopEventPublisher {
    fn publish(&self, _event: &ConfigurationEvent) {}
}

/// Emits each event as a structured log record. Properties are never logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventPublisher;

impl EventPublisher for TracingEventPublisher {
    fn publish(&self, event: &ConfigurationEvent) {
        let configuration = event.configuration();
        info!(
            event = %event.event_type(),
            configuration_id = %configuration.id,
            definition_key = %configuration.definition_key,
            title = %configuration.title,
            "plugin configuration event"
        );
    }
}

/// Keeps published events in memory
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<ConfigurationEvent>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        RecordingEventPublisher::default()
    }

    pub fn events(&self) -> Vec<ConfigurationEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<ConfigurationEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventPublisher for RecordingEventPublisher {
    fn publish(&self, event: &ConfigurationEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Run every hook subscribed to `event`, in declaration order. The first
/// failure stops the run.
pub fn run_hooks(
    descriptor: &PluginDescriptor,
    plugin: &(dyn Any + Send + Sync),
    event: EventType,
    configuration_id: Uuid,
) -> Result<(), StoreError> {
    for hook in descriptor.hooks_for(event) {
        debug!(
            hook = %hook.name,
            event = %event,
            configuration_id = %configuration_id,
            "running plugin hook"
        );
        (hook.handler)(plugin).map_err(|source| StoreError::PluginEventInvocation {
            id: configuration_id,
            hook: hook.name.to_string(),
            event,
            source,
        })?;
    }
    Ok(())
}
