//! goalplan planner: turns a goal or task into an AI-generated task plan
//!
//! Pipeline, leaves first:
//! - `prompt` renders the instruction text
//! - `completion` calls the text completion endpoint
//! - `extract` digs a JSON value out of the model's answer
//! - `normalize` maps the known answer shapes onto plan records
//! - `materialize` builds unpersisted tasks with sibling order
//!
//! `PlanGenerator` wires them together. Nothing in this crate persists
//! anything or holds shared state.

pub mod completion;
pub mod error;
pub mod extract;
pub mod generator;
pub mod materialize;
pub mod model;
pub mod normalize;
pub mod prompt;

pub use completion::{CompletionBackend, GenerationOptions, HttpCompletionClient};
pub use error::PlanError;
pub use generator::PlanGenerator;
pub use materialize::TaskMaterializer;
pub use model::{
    Goal, GoalId, NewTask, ParentTask, PlanContext, Principal, Task, TaskId, TaskNode, TaskStatus,
    User, UserId,
};
pub use normalize::{PlanRecord, PlanShape};
