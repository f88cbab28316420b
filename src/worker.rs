use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{sleep, Duration};

use crate::engine::TaskEngine;
use crate::task::Task;

/// Performs the actual work for a claimed task. The worker loop calls this
/// once per task; implementations report intermediate progress through the
/// engine and return the final completion message or an error description.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    async fn process(&self, engine: &TaskEngine, task: &Task) -> Result<String, String>;
}

/// Stand-in processor that walks each task through a scripted progress
/// sequence for its module. Real translation backends plug in here.
pub struct SimulatedProcessor {
    step_delay: Duration,
}

impl SimulatedProcessor {
    pub fn new(step_delay: Duration) -> Self {
        Self { step_delay }
    }
}

impl Default for SimulatedProcessor {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

fn steps_for(module: &str) -> &'static [(u8, &'static str)] {
    match module {
        "translation" => &[
            (20, "Loading source content"),
            (55, "Translating segments"),
            (85, "Assembling translated output"),
        ],
        "video" => &[
            (15, "Extracting audio track"),
            (45, "Transcribing speech"),
            (80, "Generating translated captions"),
        ],
        "subtitle" => &[
            (25, "Parsing subtitle file"),
            (60, "Translating subtitle lines"),
            (90, "Rebuilding subtitle timing"),
        ],
        _ => &[(50, "Processing task")],
    }
}

fn completion_message(module: &str) -> &'static str {
    match module {
        "translation" => "Translation completed successfully",
        "video" => "Video processing completed successfully",
        "subtitle" => "Subtitle translation completed successfully",
        _ => "Task completed successfully",
    }
}

#[async_trait]
impl TaskProcessor for SimulatedProcessor {
    async fn process(&self, engine: &TaskEngine, task: &Task) -> Result<String, String> {
        for (progress, message) in steps_for(&task.module) {
            if !self.step_delay.is_zero() {
                sleep(self.step_delay).await;
            }
            engine
                .report_progress(&task.id, *progress, message)
                .await
                .map_err(|e| format!("Failed to record progress: {}", e))?;
        }
        Ok(completion_message(&task.module).to_string())
    }
}

/// Background loop that drains the queue one task at a time. Claims the
/// oldest queued task, runs the processor and settles the task as
/// completed or failed. Sleeps briefly when the queue is empty.
pub async fn run_worker(engine: Arc<TaskEngine>, processor: Arc<dyn TaskProcessor>) {
    tracing::info!("Worker started, polling for queued tasks...");

    loop {
        match engine.start_next().await {
            Some(task) => {
                tracing::info!("Processing task {} ({})", task.id, task.module);

                match processor.process(&engine, &task).await {
                    Ok(message) => {
                        if let Err(e) = engine.complete(&task.id, &message).await {
                            tracing::error!("Failed to mark task as completed: {}", e);
                        } else {
                            tracing::info!("Task {} completed successfully", task.id);
                        }
                    }
                    Err(error) => {
                        tracing::error!("Task {} failed: {}", task.id, error);
                        if let Err(e) = engine.fail(&task.id, &error).await {
                            tracing::error!("Failed to mark task as failed: {}", e);
                        }
                    }
                }
            }
            None => {
                sleep(Duration::from_millis(1000)).await;
            }
        }
    }
}
