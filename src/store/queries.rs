use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Row, params, params_from_iter};
use uuid::Uuid;

use super::Store;
use super::models::{NewTask, Task, TaskPatch, TaskStatus, TimeLog};

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    let status: String = row.get(3)?;
    Ok(Task {
        id: row.get(0)?,
        jira_tag: row.get(1)?,
        title: row.get(2)?,
        status: TaskStatus::from_str(&status),
        jira_url: row.get(4)?,
        pr_url: row.get(5)?,
        parent_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        time_logs: Vec::new(),
    })
}

fn row_to_log(row: &Row) -> rusqlite::Result<TimeLog> {
    Ok(TimeLog {
        id: row.get(0)?,
        task_id: row.get(1)?,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
        duration: row.get(4)?,
    })
}

/// `?1, ?2, …` placeholder list for an `IN` clause.
pub(super) fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Store {
    // ── Tasks ──

    pub fn create_task(&self, new: &NewTask) -> Result<Task> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"INSERT INTO "Task" ("id", "jiraTag", "title", "status", "parentId", "createdAt", "updatedAt")
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"#,
            params![
                id,
                new.jira_tag,
                new.title,
                TaskStatus::Todo.as_str(),
                new.parent_id,
                now
            ],
        )?;
        self.get_task(&id)
    }

    pub fn find_task(&self, id: &str) -> Result<Option<Task>> {
        let result = self.conn.query_row(
            r#"SELECT "id", "jiraTag", "title", "status", "jiraUrl", "prUrl", "parentId",
                      "createdAt", "updatedAt"
               FROM "Task" WHERE "id" = ?1"#,
            params![id],
            row_to_task,
        );
        let mut task = match result {
            Ok(task) => task,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        task.time_logs = self.time_logs_for_task(id)?;
        Ok(Some(task))
    }

    pub fn get_task(&self, id: &str) -> Result<Task> {
        self.find_task(id)?
            .with_context(|| format!("task {id} not found"))
    }

    /// All tasks, newest first, each carrying its time logs.
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT "id", "jiraTag", "title", "status", "jiraUrl", "prUrl", "parentId",
                      "createdAt", "updatedAt"
               FROM "Task" ORDER BY "createdAt" DESC"#,
        )?;
        let mut tasks = stmt
            .query_map([], row_to_task)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            r#"SELECT "id", "taskId", "startTime", "endTime", "duration"
               FROM "TimeLog" ORDER BY "startTime""#,
        )?;
        let logs = stmt
            .query_map([], row_to_log)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut by_task: HashMap<String, Vec<TimeLog>> = HashMap::new();
        for log in logs {
            by_task.entry(log.task_id.clone()).or_default().push(log);
        }
        for task in &mut tasks {
            task.time_logs = by_task.remove(&task.id).unwrap_or_default();
        }
        Ok(tasks)
    }

    /// Partial update: fields absent from the patch keep their prior value;
    /// `updatedAt` is always refreshed.
    pub fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
        let current = self.get_task(id)?;
        let now = Utc::now().to_rfc3339();

        let jira_tag = patch.jira_tag.clone().unwrap_or(current.jira_tag);
        let title = patch.title.clone().unwrap_or(current.title);
        let status = patch.status.unwrap_or(current.status);
        let jira_url = patch.jira_url.clone().unwrap_or(current.jira_url);
        let pr_url = patch.pr_url.clone().unwrap_or(current.pr_url);
        let parent_id = patch.parent_id.clone().unwrap_or(current.parent_id);

        self.conn.execute(
            r#"UPDATE "Task"
               SET "jiraTag" = ?1, "title" = ?2, "status" = ?3, "jiraUrl" = ?4,
                   "prUrl" = ?5, "parentId" = ?6, "updatedAt" = ?7
               WHERE "id" = ?8"#,
            params![
                jira_tag,
                title,
                status.as_str(),
                jira_url,
                pr_url,
                parent_id,
                now,
                id
            ],
        )?;
        self.get_task(id)
    }

    // ── Time logs ──

    pub fn insert_time_log(&self, task_id: &str, start_time: &str) -> Result<TimeLog> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            r#"INSERT INTO "TimeLog" ("id", "taskId", "startTime") VALUES (?1, ?2, ?3)"#,
            params![id, task_id, start_time],
        )?;
        self.get_time_log(&id)
    }

    pub fn get_time_log(&self, id: &str) -> Result<TimeLog> {
        let result = self.conn.query_row(
            r#"SELECT "id", "taskId", "startTime", "endTime", "duration"
               FROM "TimeLog" WHERE "id" = ?1"#,
            params![id],
            row_to_log,
        );
        match result {
            Ok(log) => Ok(log),
            Err(rusqlite::Error::QueryReturnedNoRows) => bail!("time log {id} not found"),
            Err(e) => Err(e.into()),
        }
    }

    pub fn time_logs_for_task(&self, task_id: &str) -> Result<Vec<TimeLog>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT "id", "taskId", "startTime", "endTime", "duration"
               FROM "TimeLog" WHERE "taskId" = ?1 ORDER BY "startTime""#,
        )?;
        let logs = stmt
            .query_map(params![task_id], row_to_log)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    /// Logs that have not been stopped yet. The timer controller keeps this
    /// at one row at most; more than one means an interrupted run.
    pub fn running_time_logs(&self) -> Result<Vec<TimeLog>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT "id", "taskId", "startTime", "endTime", "duration"
               FROM "TimeLog" WHERE "endTime" IS NULL ORDER BY "startTime""#,
        )?;
        let logs = stmt
            .query_map([], row_to_log)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    /// Stop a running log: sets `endTime` and `duration` exactly once.
    /// Erroring on an unknown or already-stopped id never touches stored
    /// values.
    pub fn finalize_time_log(&self, id: &str, end_time: &str, duration: i64) -> Result<TimeLog> {
        let updated = self.conn.execute(
            r#"UPDATE "TimeLog" SET "endTime" = ?1, "duration" = ?2
               WHERE "id" = ?3 AND "endTime" IS NULL"#,
            params![end_time, duration, id],
        )?;
        if updated == 0 {
            // Unknown id and already-stopped log are different failures;
            // get_time_log tells them apart.
            self.get_time_log(id)?;
            bail!("time log {id} is already stopped");
        }
        self.get_time_log(id)
    }

    // ── Bulk deletes ──

    pub fn delete_time_logs_for_tasks(&self, task_ids: &[String]) -> Result<usize> {
        if task_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            r#"DELETE FROM "TimeLog" WHERE "taskId" IN ({})"#,
            placeholders(task_ids.len())
        );
        Ok(self.conn.execute(&sql, params_from_iter(task_ids.iter()))?)
    }

    pub fn delete_tasks(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            r#"DELETE FROM "Task" WHERE "id" IN ({})"#,
            placeholders(ids.len())
        );
        Ok(self.conn.execute(&sql, params_from_iter(ids.iter()))?)
    }
}
