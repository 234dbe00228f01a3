//! Shape normalization: map the envelopes models like to invent onto one
//! ordered list of plan records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One task-like item proposed by the model
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanRecord {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl PlanRecord {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self {
                title: map.get("title").and_then(Value::as_str).map(str::to_owned),
                description: map
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
            },
            Value::String(title) => Self {
                title: Some(title.clone()),
                description: None,
            },
            _ => Self::default(),
        }
    }
}

/// Recognized top-level shapes, in priority order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanShape<'a> {
    /// `{"project": {"tasks": [...]}}`
    Project(Option<&'a Value>),
    /// `{"tasks": [...]}`
    Tasks(&'a Value),
    /// `{"subtasks": [...]}`
    Subtasks(&'a Value),
    /// `[...]`
    List(&'a [Value]),
    Unrecognized,
}

impl<'a> PlanShape<'a> {
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => {
                if let Some(Value::Object(project)) = map.get("project") {
                    return Self::Project(project.get("tasks"));
                }
                if let Some(tasks) = map.get("tasks") {
                    return Self::Tasks(tasks);
                }
                if let Some(subtasks) = map.get("subtasks") {
                    return Self::Subtasks(subtasks);
                }
                Self::Unrecognized
            }
            Value::Array(items) => Self::List(items),
            _ => Self::Unrecognized,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Project(_) => "project",
            Self::Tasks(_) => "tasks",
            Self::Subtasks(_) => "subtasks",
            Self::List(_) => "list",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// The items carried by this shape; anything that is not a list is empty.
    pub fn items(&self) -> &'a [Value] {
        match *self {
            Self::List(items) => items,
            Self::Project(Some(value)) | Self::Tasks(value) | Self::Subtasks(value) => {
                value.as_array().map(Vec::as_slice).unwrap_or(&[])
            }
            Self::Project(None) | Self::Unrecognized => &[],
        }
    }
}

/// Normalize a parsed model answer into ordered plan records. Never fails:
/// an unrecognized shape is an empty plan.
pub fn normalize(value: &Value) -> Vec<PlanRecord> {
    let shape = PlanShape::classify(value);
    let records: Vec<PlanRecord> = shape.items().iter().map(PlanRecord::from_value).collect();
    tracing::debug!(shape = shape.name(), count = records.len(), "Normalized plan");
    records
}
