//! Plugin definition schema
//!
//! A plugin definition is the static catalog entry for a plugin type: its
//! configurable properties and the actions it exposes to process activities.
//! Definitions are immutable once the registry is built.

use crate::errors::DefinitionError;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

// =============================================================================
// PLUGIN DEFINITION
// =============================================================================

/// Static schema of a plugin type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginDefinition {
    pub key: Arc<str>,
    pub title: Arc<str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Arc<str>>,
    /// Opaque handle of the implementing type, used for diagnostics only
    pub implementation: Arc<str>,
    /// Capability tags, e.g. "documenten-api" or "notification"
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub categories: SmallVec<[Arc<str>; 2]>,
    #[serde(default)]
    pub properties: Vec<PluginProperty>,
    #[serde(default)]
    pub actions: Vec<PluginActionDefinition>,
}

impl PluginDefinition {
    pub fn new(key: &str, title: &str, implementation: &str) -> Self {
        PluginDefinition {
            key: Arc::from(key),
            title: Arc::from(title),
            description: None,
            implementation: Arc::from(implementation),
            categories: SmallVec::new(),
            properties: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&PluginProperty> {
        self.properties.iter().find(|p| p.name.as_ref() == name)
    }

    pub fn secret_properties(&self) -> impl Iterator<Item = &PluginProperty> {
        self.properties.iter().filter(|p| p.secret)
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c.as_ref() == category)
    }

    /// Actions applicable to the activity type, in declaration order
    pub fn actions_for(&self, activity_type: ActivityType) -> impl Iterator<Item = &PluginActionDefinition> {
        self.actions
            .iter()
            .filter(move |action| action.applies_to(activity_type))
    }

    pub fn supports_activity(&self, activity_type: ActivityType) -> bool {
        self.actions_for(activity_type).next().is_some()
    }
}

// =============================================================================
// PLUGIN PROPERTY
// =============================================================================

/// Configurable property of a plugin definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginProperty {
    /// Key in the configuration property bag
    pub name: Arc<str>,
    pub title: Arc<str>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub secret: bool,
    #[serde(rename = "type")]
    pub value_type: ValueType,
}

impl PluginProperty {
    pub fn new(name: &str, value_type: ValueType) -> Self {
        PluginProperty {
            name: Arc::from(name),
            title: Arc::from(name),
            required: false,
            secret: false,
            value_type,
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Arc::from(title);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }
}

// =============================================================================
// ACTION DEFINITION
// =============================================================================

/// Action a plugin exposes to process activities
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginActionDefinition {
    pub key: Arc<str>,
    pub title: Arc<str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Arc<str>>,
    /// Name of the bound method, used in logs and errors
    pub method: Arc<str>,
    #[serde(default)]
    pub activity_types: SmallVec<[ActivityType; 4]>,
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub parameters: SmallVec<[ActionParameter; 4]>,
}

impl PluginActionDefinition {
    pub fn new(key: &str, title: &str) -> Self {
        PluginActionDefinition {
            key: Arc::from(key),
            title: Arc::from(title),
            description: None,
            method: Arc::from(key),
            activity_types: SmallVec::new(),
            parameters: SmallVec::new(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(Arc::from(description));
        self
    }

    pub fn method(mut self, method: &str) -> Self {
        self.method = Arc::from(method);
        self
    }

    pub fn activity(mut self, activity_type: ActivityType) -> Self {
        if !self.activity_types.contains(&activity_type) {
            self.activity_types.push(activity_type);
        }
        self
    }

    pub fn parameter(mut self, parameter: ActionParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn applies_to(&self, activity_type: ActivityType) -> bool {
        self.activity_types.contains(&activity_type)
    }
}

/// Formal parameter of an action method
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionParameter {
    pub name: Arc<str>,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub required: bool,
}

impl ActionParameter {
    pub fn required(name: &str, value_type: ValueType) -> Self {
        ActionParameter {
            name: Arc::from(name),
            value_type,
            required: true,
        }
    }

    pub fn optional(name: &str, value_type: ValueType) -> Self {
        ActionParameter {
            name: Arc::from(name),
            value_type,
            required: false,
        }
    }
}

// =============================================================================
// VALUE TYPE - declared type of properties and parameters
// =============================================================================

/// Declared type of a property or parameter.
///
/// Textual form: `string`, `integer`, `float`, `boolean`, `uri`, `uuid`,
/// `object`, `any`, `configuration`, `list<T>`, `enum<A|B|C>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
    Uri,
    Uuid,
    Object,
    Any,
    /// Identifier of another plugin configuration
    Configuration,
    List(Box<ValueType>),
    Enum(Arc<[Arc<str>]>),
}

impl ValueType {
    pub fn list(inner: ValueType) -> Self {
        ValueType::List(Box::new(inner))
    }

    pub fn enumeration(variants: &[&str]) -> Self {
        ValueType::Enum(variants.iter().map(|v| Arc::from(*v)).collect())
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "string"),
            ValueType::Integer => write!(f, "integer"),
            ValueType::Float => write!(f, "float"),
            ValueType::Boolean => write!(f, "boolean"),
            ValueType::Uri => write!(f, "uri"),
            ValueType::Uuid => write!(f, "uuid"),
            ValueType::Object => write!(f, "object"),
            ValueType::Any => write!(f, "any"),
            ValueType::Configuration => write!(f, "configuration"),
            ValueType::List(inner) => write!(f, "list<{}>", inner),
            ValueType::Enum(variants) => {
                let joined = variants
                    .iter()
                    .map(|v| v.as_ref())
                    .collect::<Vec<_>>()
                    .join("|");
                write!(f, "enum<{}>", joined)
            }
        }
    }
}

impl FromStr for ValueType {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value_type = match trimmed {
            "string" => ValueType::String,
            "integer" => ValueType::Integer,
            "float" => ValueType::Float,
            "boolean" => ValueType::Boolean,
            "uri" => ValueType::Uri,
            "uuid" => ValueType::Uuid,
            "object" => ValueType::Object,
            "any" => ValueType::Any,
            "configuration" => ValueType::Configuration,
            other => {
                if let Some(inner) = other
                    .strip_prefix("list<")
                    .and_then(|rest| rest.strip_suffix('>'))
                {
                    ValueType::list(inner.parse()?)
                } else if let Some(body) = other
                    .strip_prefix("enum<")
                    .and_then(|rest| rest.strip_suffix('>'))
                {
                    let variants: Arc<[Arc<str>]> = body
                        .split('|')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(Arc::from)
                        .collect();
                    if variants.is_empty() {
                        return Err(DefinitionError::InvalidValueType(s.to_string()));
                    }
                    ValueType::Enum(variants)
                } else {
                    return Err(DefinitionError::InvalidValueType(s.to_string()));
                }
            }
        };
        Ok(value_type)
    }
}

impl TryFrom<String> for ValueType {
    type Error = DefinitionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ValueType> for String {
    fn from(value: ValueType) -> Self {
        value.to_string()
    }
}

// =============================================================================
// ACTIVITY TYPE
// =============================================================================

/// Workflow activity plus the event on which a plugin action runs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, PartialEq, Eq)]
pub enum ActivityType {
    #[serde(rename = "bpmn:ServiceTask:start")]
    ServiceTaskStart,
    #[serde(rename = "bpmn:SendTask:start")]
    SendTaskStart,
    #[serde(rename = "bpmn:ScriptTask:start")]
    ScriptTaskStart,
    #[serde(rename = "bpmn:CallActivity:start")]
    CallActivityStart,
    #[serde(rename = "bpmn:StartEvent:start")]
    StartEventStart,
    #[serde(rename = "bpmn:EndEvent:start")]
    EndEventStart,
    #[serde(rename = "bpmn:IntermediateThrowEvent:start")]
    IntermediateThrowEventStart,
    #[serde(rename = "bpmn:IntermediateCatchEvent:start")]
    IntermediateCatchEventStart,
    #[serde(rename = "bpmn:IntermediateCatchEvent:end")]
    IntermediateCatchEventEnd,
    #[serde(rename = "bpmn:UserTask:create")]
    UserTaskCreate,
    #[serde(rename = "bpmn:UserTask:assignment")]
    UserTaskAssignment,
    #[serde(rename = "bpmn:UserTask:complete")]
    UserTaskComplete,
}

impl ActivityType {
    pub const ALL: [ActivityType; 12] = [
        ActivityType::ServiceTaskStart,
        ActivityType::SendTaskStart,
        ActivityType::ScriptTaskStart,
        ActivityType::CallActivityStart,
        ActivityType::StartEventStart,
        ActivityType::EndEventStart,
        ActivityType::IntermediateThrowEventStart,
        ActivityType::IntermediateCatchEventStart,
        ActivityType::IntermediateCatchEventEnd,
        ActivityType::UserTaskCreate,
        ActivityType::UserTaskAssignment,
        ActivityType::UserTaskComplete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::ServiceTaskStart => "bpmn:ServiceTask:start",
            ActivityType::SendTaskStart => "bpmn:SendTask:start",
            ActivityType::ScriptTaskStart => "bpmn:ScriptTask:start",
            ActivityType::CallActivityStart => "bpmn:CallActivity:start",
            ActivityType::StartEventStart => "bpmn:StartEvent:start",
            ActivityType::EndEventStart => "bpmn:EndEvent:start",
            ActivityType::IntermediateThrowEventStart => "bpmn:IntermediateThrowEvent:start",
            ActivityType::IntermediateCatchEventStart => "bpmn:IntermediateCatchEvent:start",
            ActivityType::IntermediateCatchEventEnd => "bpmn:IntermediateCatchEvent:end",
            ActivityType::UserTaskCreate => "bpmn:UserTask:create",
            ActivityType::UserTaskAssignment => "bpmn:UserTask:assignment",
            ActivityType::UserTaskComplete => "bpmn:UserTask:complete",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityType::ALL
            .into_iter()
            .find(|at| at.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DefinitionError::InvalidActivityType(s.to_string()))
    }
}

// =============================================================================
// EVENT TYPE
// =============================================================================

/// Configuration lifecycle event a plugin hook can subscribe to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Create,
    Update,
    Delete,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Create => write!(f, "create"),
            EventType::Update => write!(f, "update"),
            EventType::Delete => write!(f, "delete"),
        }
    }
}
