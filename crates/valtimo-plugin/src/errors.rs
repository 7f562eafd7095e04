use std::io;
use thiserror::Error;
use uuid::Uuid;
use valtimo_definitions::{ActivityType, CoercionError, DefinitionError, EventType};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Encryption key must be 16 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Failed to decrypt value: {0}")]
    DecryptionFailed(String),

    #[error("Failed to encrypt value: {0}")]
    EncryptionFailed(String),
}

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read configuration file: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderError {
    #[error("Placeholder '${{{name}}}' could not be resolved")]
    Unresolved { name: String },

    #[error("Invalid placeholder pattern: {0}")]
    InvalidPattern(String),
}

#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("No value resolver registered for prefix '{0}'")]
    UnknownPrefix(String),

    #[error("Failed to resolve '{reference}': {source}")]
    Resolver {
        reference: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Plugin definition with key '{0}' not found")]
    DefinitionNotFound(String),

    #[error("Plugin configuration with id '{0}' not found")]
    ConfigurationNotFound(Uuid),

    #[error("Plugin configuration with id '{0}' already exists")]
    AlreadyExists(Uuid),

    #[error("Plugin property with name '{property}' is required for plugin '{title}'")]
    PropertyRequired { property: String, title: String },

    #[error("Plugin property with name '{property}' failed to parse for plugin '{title}': {cause}")]
    PropertyParse {
        property: String,
        title: String,
        cause: CoercionError,
    },

    #[error("Plugin configuration '{id}': {source}")]
    Codec {
        id: Uuid,
        #[source]
        source: CodecError,
    },

    #[error(transparent)]
    Instantiation(#[from] DefinitionError),

    #[error("Plugin hook '{hook}' failed on {event} of configuration '{id}': {source}")]
    PluginEventInvocation {
        id: Uuid,
        hook: String,
        event: EventType,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to rewrite references from '{old_id}' to '{new_id}': {source}")]
    ReferenceRewrite {
        old_id: Uuid,
        new_id: Uuid,
        #[source]
        source: RepositoryError,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),

    #[error("Invalid configuration entry: {0}")]
    InvalidEntry(String),
}

#[derive(Error, Debug)]
pub enum ProcessLinkError {
    #[error("Process link with id '{0}' not found")]
    NotFound(Uuid),

    #[error("Process link with id '{0}' already exists")]
    AlreadyExists(Uuid),

    #[error("Plugin configuration with id '{0}' not found")]
    ConfigurationNotFound(Uuid),

    #[error("Plugin action '{action}' of '{definition}' does not support activity type {activity_type}")]
    UnsupportedActivity {
        definition: String,
        action: String,
        activity_type: ActivityType,
    },

    #[error("Action properties must be a JSON object")]
    InvalidActionProperties,

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("No action '{action}' of plugin '{definition}' applies to activity type {activity_type}")]
    ActionNotFound {
        definition: String,
        action: String,
        activity_type: ActivityType,
    },

    #[error("Action '{action}' of plugin '{definition}' has {count} candidates for activity type {activity_type}")]
    AmbiguousAction {
        definition: String,
        action: String,
        activity_type: ActivityType,
        count: usize,
    },

    #[error("Required parameter '{parameter}' of action '{action}' has no value")]
    RequiredParameterMissing { action: String, parameter: String },

    #[error("Parameter '{parameter}' of action '{action}' could not be converted: {cause}")]
    ArgumentCoercion {
        action: String,
        parameter: String,
        cause: CoercionError,
    },

    #[error("Action properties of '{action}' must be a JSON object")]
    InvalidActionProperties { action: String },

    #[error("Action '{action}' failed: {source:#}")]
    ActionFailed {
        action: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
