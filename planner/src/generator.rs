//! Plan generator: runs prompt → completion → extraction → normalization →
//! materialization for one goal or task.
//!
//! One call issues exactly one completion request. Any failure aborts the
//! whole plan; callers never see a partial task list.

use std::time::Instant;

use tracing::{info, warn};

use crate::completion::{completion_text, CompletionBackend, GenerationOptions, DEFAULT_MODEL};
use crate::error::PlanError;
use crate::extract::extract_json;
use crate::materialize::TaskMaterializer;
use crate::model::{NewTask, PlanContext, Principal};
use crate::normalize::normalize;
use crate::prompt::build_prompt;

pub struct PlanGenerator<C> {
    backend: C,
    model: String,
    options: GenerationOptions,
}

impl<C: CompletionBackend> PlanGenerator<C> {
    pub fn new(backend: C) -> Self {
        Self {
            backend,
            model: DEFAULT_MODEL.to_string(),
            options: GenerationOptions::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate a plan whose tasks are ordered from 0.
    pub async fn generate_plan(
        &self,
        principal: &Principal,
        context: &PlanContext,
    ) -> Result<Vec<NewTask>, PlanError> {
        self.generate_plan_after(principal, context, 0).await
    }

    /// Generate a plan whose first task gets `order_idx == base_order`, for
    /// appending to a goal or task that already has children.
    pub async fn generate_plan_after(
        &self,
        principal: &Principal,
        context: &PlanContext,
        base_order: i64,
    ) -> Result<Vec<NewTask>, PlanError> {
        let start = Instant::now();
        let prompt = build_prompt(context);

        info!(
            user = %principal.username,
            goal_id = context.goal_id,
            parent_id = ?context.parent_id(),
            model = %self.model,
            "Generating plan"
        );

        let result = self.run(&prompt, context, base_order).await;

        match &result {
            Ok(tasks) => info!(
                goal_id = context.goal_id,
                tasks = tasks.len(),
                latency_ms = start.elapsed().as_millis() as u64,
                "Plan generated"
            ),
            Err(e) => warn!(goal_id = context.goal_id, "Plan generation failed: {e}"),
        }

        result
    }

    async fn run(
        &self,
        prompt: &str,
        context: &PlanContext,
        base_order: i64,
    ) -> Result<Vec<NewTask>, PlanError> {
        let body = self
            .backend
            .complete(&self.model, prompt, &self.options)
            .await?;
        let text = completion_text(&body)?;
        let value = extract_json(&text)?;
        let records = normalize(&value);

        Ok(TaskMaterializer::new(context.goal_id)
            .under(context.parent_id())
            .starting_at(base_order)
            .materialize(&records))
    }
}
