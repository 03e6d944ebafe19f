//! In-process registry of ingestion task progress
//!
//! One coarse lock guards the whole map. It is held only while a single field
//! is read or updated, never across I/O. Entries live until the process exits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::{ProgressSnapshot, Stage, TaskProgress};

#[derive(Clone, Default)]
pub struct ProgressRegistry {
    tasks: Arc<Mutex<HashMap<String, TaskProgress>>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TaskProgress>> {
        // A panicked writer leaves plain data behind; keep serving it
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_task<F>(&self, task_id: &str, f: F)
    where
        F: FnOnce(&mut TaskProgress),
    {
        let mut tasks = self.lock();
        match tasks.get_mut(task_id) {
            Some(task) => {
                f(task);
                task.updated_at = chrono::Utc::now().timestamp_millis();
            }
            None => tracing::debug!(task_id = %task_id, "Progress update for unknown task"),
        }
    }

    /// Register a new task and return its id
    pub fn create(&self) -> String {
        let task_id = uuid::Uuid::new_v4().to_string();
        self.lock().insert(task_id.clone(), TaskProgress::new());
        task_id
    }

    /// Set one stage's percentage (clamped to 0..=100) and recompute the overall mean.
    /// Ignored once the task has failed.
    pub fn update_stage(&self, task_id: &str, stage: Stage, percent: f64) {
        self.with_task(task_id, |task| {
            if task.error.is_some() {
                return;
            }
            task.stages.set(stage, percent.clamp(0.0, 100.0));
            task.overall_percent = task.stages.mean();
        });
    }

    pub fn set_status_label(&self, task_id: &str, label: &str) {
        self.with_task(task_id, |task| task.stage_label = label.to_string());
    }

    /// Terminal failure: marks the task complete at 100%. A later call replaces the message.
    pub fn set_error(&self, task_id: &str, message: &str) {
        self.with_task(task_id, |task| {
            task.error = Some(message.to_string());
            task.is_complete = true;
            task.overall_percent = 100.0;
        });
    }

    pub fn complete(&self, task_id: &str) {
        self.with_task(task_id, |task| {
            task.is_complete = true;
            task.overall_percent = 100.0;
        });
    }

    pub fn get(&self, task_id: &str) -> Option<ProgressSnapshot> {
        let tasks = self.lock();
        let task = tasks.get(task_id)?;
        let now = chrono::Utc::now().timestamp_millis();

        Some(ProgressSnapshot {
            task_id: task_id.to_string(),
            stage_label: task.stage_label.clone(),
            stages: task.stages,
            overall_percent: task.overall_percent,
            is_complete: task.is_complete,
            error: task.error.clone(),
            started_at: task.started_at,
            updated_at: task.updated_at,
            elapsed_ms: now - task.started_at,
        })
    }

    /// Number of tasks currently tracked
    pub fn task_count(&self) -> usize {
        self.lock().len()
    }
}
