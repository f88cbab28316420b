use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use tokio_stream::wrappers::BroadcastStream;

use crate::task::{Task, TaskStatus};
use crate::AppState;

/// Broadcast on every lifecycle transition so connected clients can
/// follow progress without polling.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    pub task_id: String,
    pub module: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,
}

impl From<&Task> for TaskEvent {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            module: task.module.clone(),
            status: task.status,
            progress: task.progress,
            message: task.message.clone(),
        }
    }
}

/// GET /api/v1/events - stream of task updates as Server-Sent Events.
pub async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!("New SSE connection established");
    let rx = state.engine.subscribe();

    let stream = BroadcastStream::new(rx).map(|msg| match msg {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Ok(Event::default().data(data))
        }
        Err(_) => {
            tracing::warn!("SSE client lagged behind event stream");
            Ok(Event::default().comment("lagged"))
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
