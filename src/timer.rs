//! Single-active-timer control.
//!
//! The running timer is process-wide state: one optional value behind a
//! mutex. The same lock serializes the stop-then-start sequence, so two
//! interleaved starts cannot leave two running logs behind.

use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};

use crate::store::{Store, TaskPatch, TaskStatus, TimeLog};

/// The one running timer, if any.
#[derive(Debug, Clone)]
pub struct ActiveTimer {
    pub log_id: String,
    pub task_id: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct TimerController {
    active: Mutex<Option<ActiveTimer>>,
}

impl TimerController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a timer on `task_id`, stopping any other running timer first.
    ///
    /// The store is the ground truth for "running": every log with no end
    /// time gets finalized, which also covers a log left behind by an
    /// earlier process that never stopped its timer. Then the new running
    /// log is inserted. A task at `TODO` or `BLOCKED` is promoted to
    /// `IN_PROGRESS`; other statuses stay put.
    pub fn start(&self, store: &Store, task_id: &str) -> Result<TimeLog> {
        let mut active = self
            .active
            .lock()
            .map_err(|_| anyhow!("timer state poisoned"))?;
        let now = Utc::now();

        for log in store.running_time_logs()? {
            let started = DateTime::parse_from_rfc3339(&log.start_time)
                .with_context(|| format!("time log {} has an unreadable start time", log.id))?;
            let duration = (now - started.with_timezone(&Utc)).num_seconds().max(0);
            store.finalize_time_log(&log.id, &now.to_rfc3339(), duration)?;
        }

        let task = store.get_task(task_id)?;
        let log = store.insert_time_log(task_id, &now.to_rfc3339())?;
        if matches!(task.status, TaskStatus::Todo | TaskStatus::Blocked) {
            store.update_task(
                task_id,
                &TaskPatch {
                    status: Some(TaskStatus::InProgress),
                    ..Default::default()
                },
            )?;
        }

        *active = Some(ActiveTimer {
            log_id: log.id.clone(),
            task_id: task_id.to_string(),
            started_at: now,
        });
        Ok(log)
    }

    /// Stop the identified log with a caller-computed duration in whole
    /// seconds. An unknown or already-stopped log is a reported error and
    /// leaves stored values untouched.
    pub fn stop(&self, store: &Store, log_id: &str, duration: i64) -> Result<TimeLog> {
        let mut active = self
            .active
            .lock()
            .map_err(|_| anyhow!("timer state poisoned"))?;
        let log = store.finalize_time_log(log_id, &Utc::now().to_rfc3339(), duration)?;
        if active.as_ref().is_some_and(|a| a.log_id == log_id) {
            *active = None;
        }
        Ok(log)
    }

    /// The currently running timer, if any.
    pub fn active(&self) -> Option<ActiveTimer> {
        self.active.lock().ok().and_then(|guard| (*guard).clone())
    }
}
