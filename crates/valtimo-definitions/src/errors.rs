use std::io;
use thiserror::Error;

/// Errors that can occur while building or querying plugin definitions
#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize catalog: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Plugin definition with key '{0}' not found")]
    NotFound(String),

    #[error("Plugin definition with key '{0}' is registered more than once")]
    DuplicateDefinition(String),

    #[error("Invalid plugin definition '{key}': {reason}")]
    InvalidDefinition { key: String, reason: String },

    #[error("Invalid value type '{0}'")]
    InvalidValueType(String),

    #[error("Invalid activity type '{0}'")]
    InvalidActivityType(String),

    #[error("Failed to create plugin '{key}': {reason}")]
    Instantiation { key: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = DefinitionError::NotFound("smtp-mail".to_string());
        assert_eq!(
            err.to_string(),
            "Plugin definition with key 'smtp-mail' not found"
        );
    }
}
