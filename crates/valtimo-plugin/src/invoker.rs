//! Action invocation
//!
//! Runs the plugin action a process link points at: load the configuration,
//! pick the single action entry that applies to the current activity, build
//! the plugin, resolve references in the link's action properties, bind and
//! coerce the declared parameters, then call the handler. No retries.

use crate::context::ActivityContext;
use crate::errors::{InvocationError, StoreError};
use crate::process_link::PluginProcessLink;
use crate::resolution::ValueResolverService;
use crate::store::ConfigurationStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use valtimo_definitions::{coerce, ActionCall, ActionEntry, PluginActionDefinition};

#[derive(Debug, Clone)]
pub struct ActionInvoker {
    store: Arc<ConfigurationStore>,
    resolvers: ValueResolverService,
}

impl ActionInvoker {
    pub fn new(store: Arc<ConfigurationStore>, resolvers: ValueResolverService) -> Self {
        ActionInvoker { store, resolvers }
    }

    pub fn resolvers(&self) -> &ValueResolverService {
        &self.resolvers
    }

    /// Run the linked action. The handler's return value is passed through as is.
    pub fn invoke(
        &self,
        context: &ActivityContext,
        link: &PluginProcessLink,
    ) -> Result<Option<Value>, InvocationError> {
        let configuration = self.store.get(link.plugin_configuration_id)?;
        let descriptor = self
            .store
            .registry()
            .find_descriptor(&configuration.definition_key)
            .ok_or_else(|| StoreError::DefinitionNotFound(configuration.definition_key.clone()))?;

        let activity_type = context.activity_type();
        let action_key = link.plugin_action_definition_key.as_str();
        let candidates: Vec<&ActionEntry> = descriptor
            .action_entries(action_key)
            .filter(|entry| entry.applies_to(activity_type))
            .collect();
        let entry = match candidates.as_slice() {
            [entry] => *entry,
            [] => {
                return Err(InvocationError::ActionNotFound {
                    definition: configuration.definition_key.clone(),
                    action: action_key.to_string(),
                    activity_type,
                })
            }
            many => {
                return Err(InvocationError::AmbiguousAction {
                    definition: configuration.definition_key.clone(),
                    action: action_key.to_string(),
                    activity_type,
                    count: many.len(),
                })
            }
        };

        let plugin = descriptor
            .create_plugin(&configuration.view())
            .map_err(StoreError::from)?;

        let resolved = self
            .resolvers
            .resolve_document(context, &link.action_properties)?;
        let arguments = bind_arguments(&entry.definition, resolved)?;

        let call = ActionCall {
            configuration_id: configuration.id,
            process_instance_id: context.process_instance_id(),
            activity_id: context.activity_id(),
            activity_type,
            arguments: &arguments,
        };

        debug!(
            configuration_id = %configuration.id,
            definition_key = %configuration.definition_key,
            action = %action_key,
            method = %entry.definition.method,
            activity_id = %context.activity_id(),
            "invoking plugin action"
        );

        (entry.handler)(plugin.as_ref(), &call).map_err(|source| {
            warn!(
                action = %action_key,
                process_instance_id = %context.process_instance_id(),
                error = %source,
                "plugin action failed"
            );
            InvocationError::ActionFailed {
                action: action_key.to_string(),
                source,
            }
        })
    }
}

/// Bind resolved action properties to the declared parameters.
///
/// Undeclared properties are passed along unchanged.
pub fn bind_arguments(
    action: &PluginActionDefinition,
    resolved: Value,
) -> Result<Map<String, Value>, InvocationError> {
    let Value::Object(mut arguments) = resolved else {
        return Err(InvocationError::InvalidActionProperties {
            action: action.key.to_string(),
        });
    };

    for parameter in &action.parameters {
        let name = parameter.name.as_ref();
        match arguments.get(name) {
            None | Some(Value::Null) => {
                if parameter.required {
                    return Err(InvocationError::RequiredParameterMissing {
                        action: action.key.to_string(),
                        parameter: name.to_string(),
                    });
                }
            }
            Some(value) => {
                let coerced = coerce(&parameter.value_type, value).map_err(|cause| {
                    InvocationError::ArgumentCoercion {
                        action: action.key.to_string(),
                        parameter: name.to_string(),
                        cause,
                    }
                })?;
                arguments.insert(name.to_string(), coerced);
            }
        }
    }
    Ok(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use valtimo_definitions::{ActionParameter, ActivityType, ValueType};

    fn action() -> PluginActionDefinition {
        PluginActionDefinition::new("send-mail", "Send mail")
            .activity(ActivityType::ServiceTaskStart)
            .parameter(ActionParameter::required("to", ValueType::String))
            .parameter(ActionParameter::optional("retries", ValueType::Integer))
    }

    #[test]
    fn test_bind_coerces_declared_parameters() {
        let arguments = bind_arguments(
            &action(),
            json!({"to": "ada@example.com", "retries": "3", "extra": [1]}),
        )
        .unwrap();
        assert_eq!(arguments["retries"], json!(3));
        assert_eq!(arguments["extra"], json!([1]));
    }

    #[test]
    fn test_bind_missing_required() {
        let err = bind_arguments(&action(), json!({"to": null})).unwrap_err();
        assert!(matches!(
            err,
            InvocationError::RequiredParameterMissing { parameter, .. } if parameter == "to"
        ));
    }

    #[test]
    fn test_bind_optional_may_be_absent() {
        let arguments = bind_arguments(&action(), json!({"to": "a@b.c"})).unwrap();
        assert!(!arguments.contains_key("retries"));
    }

    #[test]
    fn test_bind_rejects_non_object_properties() {
        for resolved in [json!(["a@b.c"]), json!("a@b.c"), Value::Null] {
            let err = bind_arguments(&action(), resolved).unwrap_err();
            assert!(matches!(
                err,
                InvocationError::InvalidActionProperties { action } if action == "send-mail"
            ));
        }
    }

    #[test]
    fn test_bind_coercion_failure() {
        let err = bind_arguments(&action(), json!({"to": "a@b.c", "retries": "many"})).unwrap_err();
        assert!(matches!(
            err,
            InvocationError::ArgumentCoercion { parameter, .. } if parameter == "retries"
        ));
    }
}
