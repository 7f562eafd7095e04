//! `${NAME}` placeholder expansion for deployed configuration files
//!
//! Every string in a JSON document is scanned, through nested objects and
//! arrays. `${NAME:fallback}` uses the fallback when no source knows `NAME`.
//! Expanded text is not scanned again.

use crate::errors::PlaceholderError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

static PLACEHOLDER: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"\$\{([^}:]+)(?::([^}]*))?\}"));

fn pattern() -> Result<&'static Regex, PlaceholderError> {
    PLACEHOLDER
        .as_ref()
        .map_err(|e| PlaceholderError::InvalidPattern(e.to_string()))
}

/// Supplies placeholder values by name
pub trait PlaceholderSource: Send + Sync {
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl PlaceholderSource for EnvSource {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed name/value table, e.g. the `[placeholders]` section of the config file
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    values: HashMap<String, String>,
}

impl MapSource {
    pub fn new<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        MapSource {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<&BTreeMap<String, String>> for MapSource {
    fn from(values: &BTreeMap<String, String>) -> Self {
        MapSource::new(values.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

impl PlaceholderSource for MapSource {
    fn lookup(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// Consults sources in order; the first hit wins
#[derive(Default)]
pub struct ChainSource {
    sources: Vec<Box<dyn PlaceholderSource>>,
}

impl ChainSource {
    pub fn new() -> Self {
        ChainSource::default()
    }

    pub fn with(mut self, source: impl PlaceholderSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl PlaceholderSource for ChainSource {
    fn lookup(&self, name: &str) -> Option<String> {
        self.sources.iter().find_map(|source| source.lookup(name))
    }
}

/// Expand every placeholder in a string.
pub fn expand_str(input: &str, source: &dyn PlaceholderSource) -> Result<String, PlaceholderError> {
    let mut unresolved = None;
    let expanded = pattern()?.replace_all(input, |caps: &Captures<'_>| {
        let name = caps.get(1).map_or("", |m| m.as_str()).trim();
        match source.lookup(name) {
            Some(value) => value,
            None => match caps.get(2) {
                Some(fallback) => fallback.as_str().to_string(),
                None => {
                    unresolved.get_or_insert_with(|| name.to_string());
                    String::new()
                }
            },
        }
    });

    match unresolved {
        Some(name) => Err(PlaceholderError::Unresolved { name }),
        None => Ok(expanded.into_owned()),
    }
}

/// Expand placeholders in all string values of a JSON document. Keys are kept.
pub fn expand_value(value: &Value, source: &dyn PlaceholderSource) -> Result<Value, PlaceholderError> {
    match value {
        Value::String(text) => Ok(Value::String(expand_str(text, source)?)),
        Value::Array(items) => items
            .iter()
            .map(|item| expand_value(item, source))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut expanded = Map::with_capacity(map.len());
            for (key, item) in map {
                expanded.insert(key.clone(), expand_value(item, source)?);
            }
            Ok(Value::Object(expanded))
        }
        _ => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> MapSource {
        MapSource::new([
            ("MY_URL_PLACEHOLDER", "https://www.example.com/"),
            ("API_VERSION", "v2"),
        ])
    }

    #[test]
    fn test_single_placeholder() {
        assert_eq!(
            expand_str("${MY_URL_PLACEHOLDER}api/v1/something", &source()).unwrap(),
            "https://www.example.com/api/v1/something"
        );
    }

    #[test]
    fn test_multiple_placeholders_in_one_string() {
        assert_eq!(
            expand_str("${MY_URL_PLACEHOLDER}api/${API_VERSION}/something", &source()).unwrap(),
            "https://www.example.com/api/v2/something"
        );
    }

    #[test]
    fn test_unresolved_fails() {
        assert_eq!(
            expand_str("${MISSING}/x", &source()),
            Err(PlaceholderError::Unresolved {
                name: "MISSING".to_string()
            })
        );
    }

    #[test]
    fn test_fallback() {
        assert_eq!(
            expand_str("${MISSING:http://localhost:8080}/x", &source()).unwrap(),
            "http://localhost:8080/x"
        );
        assert_eq!(
            expand_str("${API_VERSION:v1}", &source()).unwrap(),
            "v2"
        );
        assert_eq!(expand_str("${EMPTY:}", &source()).unwrap(), "");
    }

    #[test]
    fn test_nested_documents() {
        let document = json!({
            "url": "${MY_URL_PLACEHOLDER}zaken",
            "retries": 3,
            "paths": ["${API_VERSION}/a", {"deep": "${API_VERSION}"}]
        });
        assert_eq!(
            expand_value(&document, &source()).unwrap(),
            json!({
                "url": "https://www.example.com/zaken",
                "retries": 3,
                "paths": ["v2/a", {"deep": "v2"}]
            })
        );
    }

    #[test]
    fn test_chain_prefers_first_source() {
        let chain = ChainSource::new()
            .with(MapSource::new([("API_VERSION", "v3")]))
            .with(source());
        assert_eq!(expand_str("${API_VERSION}", &chain).unwrap(), "v3");
        assert_eq!(
            expand_str("${MY_URL_PLACEHOLDER}", &chain).unwrap(),
            "https://www.example.com/"
        );
    }
}
