//! REST routes: AI plan generation and the task tree it feeds

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use goalplan_planner::{
    Goal, GoalId, HttpCompletionClient, PlanContext, PlanGenerator, Principal, Task, TaskId,
    TaskNode,
};
use goalplan_store::{Store, StoreError};
use serde::Serialize;
use tracing::info;

use crate::auth::AuthUser;
use crate::error::ApiError;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub planner: Arc<PlanGenerator<HttpCompletionClient>>,
}

impl AppState {
    pub fn new(store: Store, planner: PlanGenerator<HttpCompletionClient>) -> Self {
        Self {
            store: Arc::new(store),
            planner: Arc::new(planner),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/goals/:goal_id/generate-plan", post(generate_goal_plan))
        .route("/api/tasks/:task_id/generate-plan", post(generate_task_plan))
        .route("/api/goals/:goal_id/tasks", get(goal_task_tree))
        .route("/api/health", get(health_check))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model: String,
}

/// The goal, if it exists and belongs to `principal`. Someone else's goal is
/// reported as missing.
fn owned_goal(store: &Store, principal: &Principal, goal_id: GoalId) -> Result<Goal, ApiError> {
    let goal = store.get_goal(goal_id)?;
    if goal.user_id != principal.user_id {
        return Err(StoreError::NotFound { entity: "goal", id: goal_id }.into());
    }
    Ok(goal)
}

/// Generate tasks for `context` and append them after the existing siblings.
/// The offset is taken inside the insert transaction, not before the model
/// call.
async fn generate_and_store(
    state: &AppState,
    principal: &Principal,
    context: &PlanContext,
) -> Result<Vec<Task>, ApiError> {
    let start = Instant::now();
    let tasks = state.planner.generate_plan(principal, context).await?;
    let stored = state.store.append_tasks(&tasks)?;

    info!(
        user = %principal.username,
        goal_id = context.goal_id,
        parent_id = ?context.parent_id(),
        tasks = stored.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Plan stored"
    );
    Ok(stored)
}

/// Break a goal into top-level tasks
async fn generate_goal_plan(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(goal_id): Path<GoalId>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let goal = owned_goal(&state.store, &principal, goal_id)?;
    let context = PlanContext::for_goal(&goal);
    Ok(Json(generate_and_store(&state, &principal, &context).await?))
}

/// Break a task into subtasks within the same goal
async fn generate_task_plan(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(task_id): Path<TaskId>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let task = state.store.get_task(task_id)?;
    let goal = state.store.get_goal(task.goal_id)?;
    if goal.user_id != principal.user_id {
        return Err(StoreError::NotFound { entity: "task", id: task_id }.into());
    }
    let context = PlanContext::for_task(&goal, &task);
    Ok(Json(generate_and_store(&state, &principal, &context).await?))
}

async fn goal_task_tree(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(goal_id): Path<GoalId>,
) -> Result<Json<Vec<TaskNode>>, ApiError> {
    owned_goal(&state.store, &principal, goal_id)?;
    Ok(Json(state.store.task_tree(goal_id)?))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        model: state.planner.model().to_string(),
    })
}
