//! Prompt construction for plan generation
//!
//! Only the instruction text lives here. Whatever the model sends back is
//! validated downstream by the extractor and normalizer.

use crate::model::PlanContext;

/// Render the prompt for `context`: a project plan when there is no parent
/// task, a subtask list otherwise.
pub fn build_prompt(context: &PlanContext) -> String {
    match &context.parent {
        None => goal_prompt(&context.goal_title),
        Some(parent) => subtask_prompt(
            &context.goal_title,
            &parent.title,
            parent.description.as_deref().unwrap_or(""),
        ),
    }
}

fn goal_prompt(goal_title: &str) -> String {
    format!(
        r#"Generate a concise project plan for the following goal as valid JSON.
Only output JSON. No explanations, no markdown, and no comments.

Goal: "{goal}"

Respond with a JSON array of tasks in the order they should be done.
Each task must have:
- "title": a short imperative phrase
- "description": one or two sentences
"#,
        goal = quoted(goal_title),
    )
}

fn subtask_prompt(goal_title: &str, task_title: &str, task_description: &str) -> String {
    format!(
        r#"Generate a concise list of subtasks for this task as valid JSON.
Only output JSON. No explanations, no markdown, and no comments.

Goal: "{goal}"
Task: "{task}"
Description: "{description}"

Respond with a JSON array of subtasks in the order they should be done.
Each subtask must have:
- "title": a short imperative phrase
- "description": one or two sentences
"#,
        goal = quoted(goal_title),
        task = quoted(task_title),
        description = quoted(task_description),
    )
}

/// Keep user text on one line and unable to close the surrounding quotes.
fn quoted(text: &str) -> String {
    text.trim()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(|c: char| c == '\r' || c == '\n', " ")
}
