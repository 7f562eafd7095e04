//! Workflow activity context handed in by the process engine

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use valtimo_definitions::ActivityType;

/// Automatic step of a running process instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    pub process_instance_id: String,
    pub process_definition_id: String,
    pub activity_id: String,
    pub activity_type: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_key: Option<String>,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

impl ExecutionContext {
    pub fn new(
        process_instance_id: &str,
        process_definition_id: &str,
        activity_id: &str,
        activity_type: ActivityType,
    ) -> Self {
        ExecutionContext {
            process_instance_id: process_instance_id.to_string(),
            process_definition_id: process_definition_id.to_string(),
            activity_id: activity_id.to_string(),
            activity_type,
            business_key: None,
            variables: Map::new(),
        }
    }

    pub fn variable(mut self, name: &str, value: Value) -> Self {
        self.variables.insert(name.to_string(), value);
        self
    }
}

/// User task event; task-local variables shadow execution variables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskContext {
    pub task_id: String,
    #[serde(flatten)]
    pub execution: ExecutionContext,
    #[serde(default)]
    pub local_variables: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActivityContext {
    Execution(ExecutionContext),
    Task(TaskContext),
}

impl ActivityContext {
    pub fn task(task_id: &str, execution: ExecutionContext) -> Self {
        ActivityContext::Task(TaskContext {
            task_id: task_id.to_string(),
            execution,
            local_variables: Map::new(),
        })
    }

    /// Add a task-local variable. Ignored for execution contexts.
    pub fn local_variable(mut self, name: &str, value: Value) -> Self {
        if let ActivityContext::Task(task) = &mut self {
            task.local_variables.insert(name.to_string(), value);
        }
        self
    }

    pub fn execution(&self) -> &ExecutionContext {
        match self {
            ActivityContext::Execution(execution) => execution,
            ActivityContext::Task(task) => &task.execution,
        }
    }

    pub fn activity_type(&self) -> ActivityType {
        self.execution().activity_type
    }

    pub fn activity_id(&self) -> &str {
        &self.execution().activity_id
    }

    pub fn process_instance_id(&self) -> &str {
        &self.execution().process_instance_id
    }

    pub fn process_definition_id(&self) -> &str {
        &self.execution().process_definition_id
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            ActivityContext::Execution(_) => None,
            ActivityContext::Task(task) => Some(&task.task_id),
        }
    }

    /// Variable visible from this activity
    pub fn variable(&self, name: &str) -> Option<&Value> {
        match self {
            ActivityContext::Execution(execution) => execution.variables.get(name),
            ActivityContext::Task(task) => task
                .local_variables
                .get(name)
                .or_else(|| task.execution.variables.get(name)),
        }
    }
}

impl From<ExecutionContext> for ActivityContext {
    fn from(execution: ExecutionContext) -> Self {
        ActivityContext::Execution(execution)
    }
}
