use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::task::{CreateTaskRequest, Task, TaskStats};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ModuleQuery {
    pub module: Option<String>,
}

/// POST /api/v1/tasks
pub async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Envelope<Task>), ApiError> {
    // An unparseable body still gets the error envelope.
    let Json(request) =
        payload.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
    let task = state.engine.create_task(request).await?;
    Ok((
        StatusCode::CREATED,
        Envelope::new("Task created successfully", task),
    ))
}

/// GET /api/v1/tasks?module=<name>
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ModuleQuery>,
) -> Envelope<Vec<Task>> {
    let tasks = state.engine.list_tasks(query.module.as_deref()).await;
    Envelope::new("Tasks retrieved", tasks)
}

/// GET /api/v1/tasks/stats?module=<name>
pub async fn task_stats(
    State(state): State<AppState>,
    Query(query): Query<ModuleQuery>,
) -> Envelope<TaskStats> {
    let stats = state.engine.stats(query.module.as_deref()).await;
    Envelope::new("Task statistics retrieved", stats)
}

/// GET /api/v1/tasks/:id
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Envelope<Task>, ApiError> {
    let task = state.engine.get_task(&id).await?;
    Ok(Envelope::new("Task retrieved", task))
}

/// POST /api/v1/tasks/:id/process
pub async fn process_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Envelope<Task>, ApiError> {
    let task = state.engine.enqueue(&id).await?;
    Ok(Envelope::new("Task processing requested", task))
}
