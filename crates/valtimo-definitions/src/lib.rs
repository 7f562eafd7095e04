//! Plugin definitions for the valtimo plugin framework
//!
//! Definitions describe what a plugin type offers: configurable properties,
//! actions bound to workflow activities, and lifecycle hooks. This crate holds
//! the schema types, the value coercion table shared by validation and
//! argument binding, the descriptor tables plugins register with, and the
//! immutable registry built from them.

pub mod catalog;
pub mod coercion;
pub mod descriptor;
pub mod errors;
pub mod registry;
pub mod types;

pub use catalog::Catalog;
pub use coercion::{coerce, CoercionError};
pub use descriptor::{
    ActionCall, ActionEntry, ConfigurationView, LifecycleHook, PluginDescriptor,
    PluginDescriptorBuilder, PluginFactory, PluginObject,
};
pub use errors::DefinitionError;
pub use registry::{PluginRegistry, PluginRegistryBuilder};
pub use types::{
    ActionParameter, ActivityType, EventType, PluginActionDefinition, PluginDefinition,
    PluginProperty, ValueType,
};
