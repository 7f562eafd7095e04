//! Deferred value references in action properties
//!
//! A string of the form `<prefix>:<path>` whose prefix has a registered
//! resolver is a reference, e.g. `pv:loanAmount`. All references in a document
//! are collected first, resolved once per prefix, and merged back into the
//! document. Anything else is a literal.

use crate::context::ActivityContext;
use crate::errors::ResolutionError;
use ahash::AHashMap;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub trait ValueResolver: Send + Sync {
    fn prefix(&self) -> &str;

    fn resolve(&self, context: &ActivityContext, path: &str) -> anyhow::Result<Value>;

    /// Resolve several paths at once; results are keyed by path.
    fn resolve_all(
        &self,
        context: &ActivityContext,
        paths: &[&str],
    ) -> anyhow::Result<AHashMap<String, Value>> {
        paths
            .iter()
            .map(|path| -> anyhow::Result<(String, Value)> {
                Ok(((*path).to_string(), self.resolve(context, path)?))
            })
            .collect()
    }
}

/// `pv:<name>` reads a process variable. Unknown variables resolve to null.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessVariableResolver;

impl ValueResolver for ProcessVariableResolver {
    fn prefix(&self) -> &str {
        "pv"
    }

    fn resolve(&self, context: &ActivityContext, path: &str) -> anyhow::Result<Value> {
        Ok(context.variable(path).cloned().unwrap_or(Value::Null))
    }
}

#[derive(Default, Clone)]
pub struct ValueResolverService {
    resolvers: AHashMap<String, Arc<dyn ValueResolver>>,
}

impl std::fmt::Debug for ValueResolverService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut prefixes: Vec<&String> = self.resolvers.keys().collect();
        prefixes.sort();
        f.debug_struct("ValueResolverService")
            .field("prefixes", &prefixes)
            .finish()
    }
}

impl ValueResolverService {
    pub fn new() -> Self {
        ValueResolverService::default()
    }

    /// Service with the built-in `pv:` resolver
    pub fn with_defaults() -> Self {
        ValueResolverService::new().register(Arc::new(ProcessVariableResolver))
    }

    pub fn register(mut self, resolver: Arc<dyn ValueResolver>) -> Self {
        self.resolvers.insert(resolver.prefix().to_string(), resolver);
        self
    }

    fn split<'a>(&self, text: &'a str) -> Option<(&'a str, &'a str)> {
        text.split_once(':')
            .filter(|(prefix, _)| self.resolvers.contains_key(*prefix))
    }

    pub fn is_reference(&self, text: &str) -> bool {
        self.split(text).is_some()
    }

    /// Resolve a single reference expression.
    pub fn resolve(&self, context: &ActivityContext, reference: &str) -> Result<Value, ResolutionError> {
        let (prefix, path) = reference
            .split_once(':')
            .ok_or_else(|| ResolutionError::UnknownPrefix(reference.to_string()))?;
        let resolver = self
            .resolvers
            .get(prefix)
            .ok_or_else(|| ResolutionError::UnknownPrefix(prefix.to_string()))?;
        resolver
            .resolve(context, path)
            .map_err(|source| ResolutionError::Resolver {
                reference: reference.to_string(),
                source,
            })
    }

    /// Resolve every reference in `document`; the result keeps its shape.
    pub fn resolve_document(
        &self,
        context: &ActivityContext,
        document: &Value,
    ) -> Result<Value, ResolutionError> {
        let mut references = Vec::new();
        self.collect(document, &mut references);
        if references.is_empty() {
            return Ok(document.clone());
        }

        let mut by_prefix: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for reference in &references {
            if let Some((prefix, path)) = self.split(reference) {
                let paths = by_prefix.entry(prefix).or_default();
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }

        let mut resolved: AHashMap<String, Value> = AHashMap::new();
        for (prefix, paths) in by_prefix {
            let resolver = self
                .resolvers
                .get(prefix)
                .ok_or_else(|| ResolutionError::UnknownPrefix(prefix.to_string()))?;
            let values = resolver
                .resolve_all(context, &paths)
                .map_err(|source| ResolutionError::Resolver {
                    reference: format!("{}:{}", prefix, paths.join(",")),
                    source,
                })?;
            for path in paths {
                let value = values.get(path).cloned().unwrap_or(Value::Null);
                resolved.insert(format!("{}:{}", prefix, path), value);
            }
        }

        debug!(
            references = resolved.len(),
            activity_id = context.activity_id(),
            "resolved action property references"
        );
        Ok(merge(document, &resolved))
    }

    fn collect<'a>(&self, value: &'a Value, out: &mut Vec<&'a str>) {
        match value {
            Value::String(text) if self.is_reference(text) => out.push(text),
            Value::Array(items) => items.iter().for_each(|item| self.collect(item, out)),
            Value::Object(map) => map.values().for_each(|item| self.collect(item, out)),
            _ => {}
        }
    }
}

fn merge(value: &Value, resolved: &AHashMap<String, Value>) -> Value {
    match value {
        Value::String(text) => resolved.get(text.as_str()).cloned().unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(|item| merge(item, resolved)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), merge(item, resolved)))
                .collect::<Map<String, Value>>(),
        ),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use valtimo_definitions::ActivityType;

    struct DocumentResolver {
        calls: AtomicUsize,
    }

    impl ValueResolver for DocumentResolver {
        fn prefix(&self) -> &str {
            "doc"
        }

        fn resolve(&self, _context: &ActivityContext, path: &str) -> anyhow::Result<Value> {
            match path {
                "/applicant/name" => Ok(json!("Ada")),
                other => anyhow::bail!("no such path {}", other),
            }
        }

        fn resolve_all(
            &self,
            context: &ActivityContext,
            paths: &[&str],
        ) -> anyhow::Result<AHashMap<String, Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            paths
                .iter()
                .map(|path| -> anyhow::Result<(String, Value)> {
                    Ok(((*path).to_string(), self.resolve(context, path)?))
                })
                .collect()
        }
    }

    fn context() -> ActivityContext {
        ExecutionContext::new("pi-1", "loan:1", "send", ActivityType::ServiceTaskStart)
            .variable("amount", json!(2500))
            .into()
    }

    #[test]
    fn test_references_resolved_in_place() {
        let documents = Arc::new(DocumentResolver {
            calls: AtomicUsize::new(0),
        });
        let service = ValueResolverService::with_defaults().register(documents.clone());

        let properties = json!({
            "amount": "pv:amount",
            "recipient": {"name": "doc:/applicant/name", "cc": ["doc:/applicant/name", "literal"]},
            "url": "https://example.com/a",
            "missing": "pv:nothing",
            "count": 3
        });

        let resolved = service.resolve_document(&context(), &properties).unwrap();
        assert_eq!(
            resolved,
            json!({
                "amount": 2500,
                "recipient": {"name": "Ada", "cc": ["Ada", "literal"]},
                "url": "https://example.com/a",
                "missing": null,
                "count": 3
            })
        );
        // one batched call for both occurrences
        assert_eq!(documents.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregistered_prefix_is_literal() {
        let service = ValueResolverService::with_defaults();
        assert!(service.is_reference("pv:amount"));
        assert!(!service.is_reference("doc:/applicant/name"));
        assert!(!service.is_reference("mailto:someone@example.com"));
    }

    #[test]
    fn test_resolver_failure_surfaces() {
        let service = ValueResolverService::new().register(Arc::new(DocumentResolver {
            calls: AtomicUsize::new(0),
        }));
        let err = service
            .resolve_document(&context(), &json!({"x": "doc:/unknown"}))
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Resolver { .. }));
        assert!(matches!(
            service.resolve(&context(), "zaak:status"),
            Err(ResolutionError::UnknownPrefix(p)) if p == "zaak"
        ));
    }
}
