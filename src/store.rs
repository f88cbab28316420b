use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::task::{MemoryEntry, Task, TaskStats, TaskStatus, UploadedFile};

/// Storage backend for tasks plus the auxiliary upload and memory maps.
/// The server owns exactly one implementation at runtime; the trait exists
/// so tests and future backends can swap it out.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Inserts or overwrites the record with `task.id`.
    async fn put(&self, task: Task);

    async fn get(&self, id: &str) -> Option<Task>;

    /// All tasks in insertion order, optionally narrowed to one module.
    async fn list(&self, module: Option<&str>) -> Vec<Task>;

    /// Counts recomputed by scanning the map. Never cached.
    async fn stats(&self, module: Option<&str>) -> TaskStats;

    /// Flips the oldest queued task to processing and returns it. The
    /// whole claim happens under one write lock so a task is handed out
    /// at most once.
    async fn claim_next_queued(&self) -> Option<Task>;

    async fn put_upload(&self, record: UploadedFile);

    async fn get_upload(&self, id: &str) -> Option<UploadedFile>;

    async fn put_memory(&self, entry: MemoryEntry);

    async fn get_memory(&self, key: &str) -> Option<MemoryEntry>;
}

#[derive(Default)]
struct TaskMap {
    by_id: HashMap<String, Task>,
    // Ids in first-insertion order, so listings are stable.
    order: Vec<String>,
}

/// Process-local store. Everything lives in maps behind async locks and
/// is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tasks: RwLock<TaskMap>,
    uploads: RwLock<HashMap<String, UploadedFile>>,
    memory: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn put(&self, task: Task) {
        let mut tasks = self.tasks.write().await;
        if !tasks.by_id.contains_key(&task.id) {
            tasks.order.push(task.id.clone());
        }
        tasks.by_id.insert(task.id.clone(), task);
    }

    async fn get(&self, id: &str) -> Option<Task> {
        self.tasks.read().await.by_id.get(id).cloned()
    }

    async fn list(&self, module: Option<&str>) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        tasks
            .order
            .iter()
            .filter_map(|id| tasks.by_id.get(id))
            .filter(|task| module.map_or(true, |m| task.module == m))
            .cloned()
            .collect()
    }

    async fn stats(&self, module: Option<&str>) -> TaskStats {
        let tasks = self.tasks.read().await;
        let mut stats = TaskStats::default();
        for task in tasks.by_id.values() {
            if module.is_some_and(|m| task.module != m) {
                continue;
            }
            stats.total_tasks += 1;
            match task.status {
                TaskStatus::Completed => stats.completed_tasks += 1,
                TaskStatus::Failed => stats.failed_tasks += 1,
                TaskStatus::Processing => stats.processing_tasks += 1,
                _ => {}
            }
        }
        stats
    }

    async fn claim_next_queued(&self) -> Option<Task> {
        let mut tasks = self.tasks.write().await;
        let id = tasks
            .order
            .iter()
            .find(|id| {
                tasks
                    .by_id
                    .get(id.as_str())
                    .is_some_and(|task| task.status == TaskStatus::Queued)
            })
            .cloned()?;
        let task = tasks.by_id.get_mut(&id)?;
        task.status = TaskStatus::Processing;
        task.message = "Processing started".to_string();
        task.updated_at = Utc::now().to_rfc3339();
        Some(task.clone())
    }

    async fn put_upload(&self, record: UploadedFile) {
        self.uploads.write().await.insert(record.id.clone(), record);
    }

    async fn get_upload(&self, id: &str) -> Option<UploadedFile> {
        self.uploads.read().await.get(id).cloned()
    }

    async fn put_memory(&self, entry: MemoryEntry) {
        self.memory.write().await.insert(entry.key.clone(), entry);
    }

    async fn get_memory(&self, key: &str) -> Option<MemoryEntry> {
        self.memory.read().await.get(key).cloned()
    }
}
