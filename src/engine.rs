use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::error::ApiError;
use crate::events::TaskEvent;
use crate::store::TaskStore;
use crate::task::{CreateTaskRequest, Task, TaskStats, TaskStatus};

/// Drives the task lifecycle over an injected store and announces every
/// transition on the broadcast channel. All status changes in the system
/// go through here.
pub struct TaskEngine {
    store: Arc<dyn TaskStore>,
    events: broadcast::Sender<TaskEvent>,
}

impl TaskEngine {
    pub fn new(store: Arc<dyn TaskStore>, events: broadcast::Sender<TaskEvent>) -> Self {
        Self { store, events }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    fn notify(&self, task: &Task) {
        tracing::debug!("Task {} is now {}", task.id, task.status);
        // Nobody listening is fine.
        let _ = self.events.send(TaskEvent::from(task));
    }

    /// Validates the request, stores a fresh record in the created state
    /// and returns it.
    pub async fn create_task(&self, request: CreateTaskRequest) -> Result<Task, ApiError> {
        let module = request
            .module
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ApiError::Validation("module is required".to_string()))?
            .to_string();
        let name = request
            .task_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ApiError::Validation("taskName is required".to_string()))?
            .to_string();

        let task = Task::new(
            module,
            name,
            request.instructions,
            request.options,
            request.files,
        );
        tracing::info!("Created task {} ({})", task.id, task.module);
        self.store.put(task.clone()).await;
        self.notify(&task);
        Ok(task)
    }

    pub async fn get_task(&self, id: &str) -> Result<Task, ApiError> {
        self.store
            .get(id)
            .await
            .ok_or_else(|| ApiError::NotFound(format!("Task {id} not found")))
    }

    pub async fn list_tasks(&self, module: Option<&str>) -> Vec<Task> {
        self.store.list(module).await
    }

    pub async fn stats(&self, module: Option<&str>) -> TaskStats {
        self.store.stats(module).await
    }

    /// Moves a created task into the queue for the background worker.
    /// Calling it again while the task is queued, processing or finished
    /// changes nothing and returns the record as-is.
    pub async fn enqueue(&self, id: &str) -> Result<Task, ApiError> {
        let mut task = self.get_task(id).await?;
        if task.status != TaskStatus::Created {
            return Ok(task);
        }
        task.status = TaskStatus::Queued;
        task.message = "Task queued for processing".to_string();
        task.updated_at = Utc::now().to_rfc3339();
        self.store.put(task.clone()).await;
        self.notify(&task);
        Ok(task)
    }

    /// Claims the oldest queued task for the worker, marking it as
    /// processing. Returns None when the queue is empty.
    pub async fn start_next(&self) -> Option<Task> {
        let task = self.store.claim_next_queued().await?;
        self.notify(&task);
        Some(task)
    }

    /// Records intermediate progress on a processing task. Progress only
    /// moves forward and is capped at 100.
    pub async fn report_progress(
        &self,
        id: &str,
        progress: u8,
        message: &str,
    ) -> Result<Task, ApiError> {
        let mut task = self.get_task(id).await?;
        if task.status != TaskStatus::Processing {
            return Ok(task);
        }
        task.progress = progress.min(100).max(task.progress);
        task.message = message.to_string();
        task.updated_at = Utc::now().to_rfc3339();
        self.store.put(task.clone()).await;
        self.notify(&task);
        Ok(task)
    }

    /// Finishes a task successfully. No-op once the task is terminal.
    pub async fn complete(&self, id: &str, message: &str) -> Result<Task, ApiError> {
        let mut task = self.get_task(id).await?;
        if task.status.is_terminal() {
            return Ok(task);
        }
        task.status = TaskStatus::Completed;
        task.progress = 100;
        task.message = message.to_string();
        task.updated_at = Utc::now().to_rfc3339();
        self.store.put(task.clone()).await;
        self.notify(&task);
        Ok(task)
    }

    /// Finishes a task as failed, keeping the error description on the
    /// record. No-op once the task is terminal.
    pub async fn fail(&self, id: &str, error: &str) -> Result<Task, ApiError> {
        let mut task = self.get_task(id).await?;
        if task.status.is_terminal() {
            return Ok(task);
        }
        task.status = TaskStatus::Failed;
        task.message = "Task failed".to_string();
        task.error = Some(error.to_string());
        task.updated_at = Utc::now().to_rfc3339();
        self.store.put(task.clone()).await;
        self.notify(&task);
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn engine() -> TaskEngine {
        let (tx, _) = broadcast::channel(100);
        TaskEngine::new(Arc::new(MemoryStore::new()), tx)
    }

    fn request(module: &str, name: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            module: Some(module.into()),
            task_name: Some(name.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_requires_module_and_name() {
        let engine = engine();

        let missing_module = CreateTaskRequest {
            task_name: Some("demo".into()),
            ..Default::default()
        };
        let err = engine.create_task(missing_module).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let blank_name = CreateTaskRequest {
            module: Some("translation".into()),
            task_name: Some("   ".into()),
            ..Default::default()
        };
        let err = engine.create_task(blank_name).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        // Nothing reached the store.
        assert_eq!(engine.stats(None).await.total_tasks, 0);
    }

    #[tokio::test]
    async fn create_stores_created_record() {
        let engine = engine();
        let task = engine.create_task(request("translation", "doc")).await.unwrap();
        assert_eq!(task.status, TaskStatus::Created);
        assert_eq!(task.progress, 0);

        let stored = engine.get_task(&task.id).await.unwrap();
        assert_eq!(stored.status, TaskStatus::Created);
        assert_eq!(engine.stats(None).await.total_tasks, 1);
    }

    #[tokio::test]
    async fn enqueue_is_idempotent() {
        let engine = engine();
        let task = engine.create_task(request("translation", "doc")).await.unwrap();

        let queued = engine.enqueue(&task.id).await.unwrap();
        assert_eq!(queued.status, TaskStatus::Queued);

        let again = engine.enqueue(&task.id).await.unwrap();
        assert_eq!(again.status, TaskStatus::Queued);
        assert_eq!(again.updated_at, queued.updated_at);
    }

    #[tokio::test]
    async fn enqueue_unknown_id_is_not_found() {
        let engine = engine();
        let err = engine.enqueue("nope").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn full_lifecycle_reaches_completed() {
        let engine = engine();
        let task = engine.create_task(request("video", "clip")).await.unwrap();

        engine.enqueue(&task.id).await.unwrap();
        let claimed = engine.start_next().await.unwrap();
        assert_eq!(claimed.id, task.id);
        assert_eq!(claimed.status, TaskStatus::Processing);

        engine.report_progress(&task.id, 40, "halfway").await.unwrap();
        let done = engine.complete(&task.id, "done").await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.progress, 100);

        let stats = engine.stats(None).await;
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.processing_tasks, 0);
    }

    #[tokio::test]
    async fn progress_never_moves_backwards() {
        let engine = engine();
        let task = engine.create_task(request("subtitle", "ep1")).await.unwrap();
        engine.enqueue(&task.id).await.unwrap();
        engine.start_next().await.unwrap();

        engine.report_progress(&task.id, 60, "step").await.unwrap();
        let after = engine.report_progress(&task.id, 30, "late step").await.unwrap();
        assert_eq!(after.progress, 60);

        let capped = engine.report_progress(&task.id, 250, "overshoot").await.unwrap();
        assert_eq!(capped.progress, 100);
    }

    #[tokio::test]
    async fn terminal_states_are_frozen() {
        let engine = engine();
        let task = engine.create_task(request("translation", "doc")).await.unwrap();
        engine.enqueue(&task.id).await.unwrap();
        engine.start_next().await.unwrap();
        let failed = engine.fail(&task.id, "upstream unavailable").await.unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("upstream unavailable"));

        let still_failed = engine.complete(&task.id, "too late").await.unwrap();
        assert_eq!(still_failed.status, TaskStatus::Failed);
        assert_eq!(still_failed.updated_at, failed.updated_at);

        // Re-enqueueing a finished task does nothing either.
        let unchanged = engine.enqueue(&task.id).await.unwrap();
        assert_eq!(unchanged.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn start_next_claims_in_fifo_order() {
        let engine = engine();
        let first = engine.create_task(request("translation", "one")).await.unwrap();
        let second = engine.create_task(request("translation", "two")).await.unwrap();
        engine.enqueue(&first.id).await.unwrap();
        engine.enqueue(&second.id).await.unwrap();

        assert_eq!(engine.start_next().await.unwrap().id, first.id);
        assert_eq!(engine.start_next().await.unwrap().id, second.id);
        assert!(engine.start_next().await.is_none());
    }

    #[tokio::test]
    async fn transitions_are_broadcast() {
        let (tx, mut rx) = broadcast::channel(100);
        let engine = TaskEngine::new(Arc::new(MemoryStore::new()), tx);

        let task = engine.create_task(request("translation", "doc")).await.unwrap();
        engine.enqueue(&task.id).await.unwrap();

        let created = rx.recv().await.unwrap();
        assert_eq!(created.status, TaskStatus::Created);
        let queued = rx.recv().await.unwrap();
        assert_eq!(queued.status, TaskStatus::Queued);
        assert_eq!(queued.task_id, task.id);
    }
}
