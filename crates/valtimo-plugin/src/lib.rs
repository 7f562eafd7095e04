//! Plugin configuration and invocation for the valtimo plugin framework
//!
//! - [`codec`] encrypts and decrypts secret properties
//! - [`store`] validates and persists configurations and runs lifecycle hooks
//! - [`placeholder`] expands `${NAME}` placeholders when deploying configurations
//! - [`resolution`] resolves `<prefix>:<path>` references at invocation time
//! - [`invoker`] binds arguments and calls plugin actions for a process link
//! - [`service`] ties configurations, process links and invocation together

pub mod codec;
pub mod configuration;
pub mod context;
pub mod errors;
pub mod invoker;
pub mod lifecycle;
pub mod placeholder;
pub mod process_link;
pub mod repository;
pub mod resolution;
pub mod service;
pub mod store;

pub use codec::Encryptor;
pub use configuration::{
    Batch, BatchFailure, ConfigurationEntry, ConfigurationFilter, PluginConfiguration,
    StoredConfiguration,
};
pub use context::{ActivityContext, ExecutionContext, TaskContext};
pub use errors::{
    CodecError, InvocationError, PlaceholderError, ProcessLinkError, RepositoryError,
    ResolutionError, StoreError,
};
pub use invoker::ActionInvoker;
pub use lifecycle::{
    ConfigurationEvent, EventPublisher, NoopEventPublisher, RecordingEventPublisher,
    TracingEventPublisher,
};
pub use process_link::{PluginProcessLink, ProcessLinkStore};
pub use repository::{
    ChangeSet, ConfigurationRepository, FileConfigurationRepository,
    InMemoryConfigurationRepository,
};
pub use resolution::{ProcessVariableResolver, ValueResolver, ValueResolverService};
pub use service::{ActionOutcome, PluginService};
pub use store::ConfigurationStore;
