pub mod config;
pub mod definitions;
pub mod invoke;
pub mod secret;

use crate::errors::CliError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

/// Read a JSON or YAML document; `.yaml` and `.yml` files are parsed as YAML.
pub fn read_document(path: &Path) -> Result<Value, CliError> {
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let what = path.display().to_string();

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext, "yaml" | "yml"));
    if is_yaml {
        serde_yaml::from_str(&content).map_err(|source| CliError::Yaml { what, source })
    } else {
        serde_json::from_str(&content).map_err(|source| CliError::Json { what, source })
    }
}

/// Parse a JSON object given on the command line.
pub fn parse_object(text: &str, what: &str) -> Result<Map<String, Value>, CliError> {
    let value: Value = serde_json::from_str(text).map_err(|source| CliError::Json {
        what: what.to_string(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(CliError::NotAnObject {
            what: what.to_string(),
        }),
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_object() {
        let map = parse_object(r#"{"a": 1}"#, "--properties").unwrap();
        assert_eq!(map["a"], serde_json::json!(1));
        assert!(matches!(
            parse_object("[1]", "--properties"),
            Err(CliError::NotAnObject { .. })
        ));
        assert!(matches!(
            parse_object("{", "--properties"),
            Err(CliError::Json { .. })
        ));
    }

    #[test]
    fn test_read_document_by_extension() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("deploy.yaml");
        std::fs::write(&yaml, "title: chat\nproperties:\n  channel: loans\n").unwrap();
        let json = dir.path().join("deploy.json");
        std::fs::write(&json, r#"{"title": "chat"}"#).unwrap();

        assert_eq!(read_document(&yaml).unwrap()["properties"]["channel"], "loans");
        assert_eq!(read_document(&json).unwrap()["title"], "chat");
        assert!(matches!(
            read_document(&dir.path().join("absent.json")),
            Err(CliError::Read { .. })
        ));
    }
}
