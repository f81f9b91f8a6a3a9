use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Pr,
    Blocked,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Pr => "PR",
            TaskStatus::Blocked => "BLOCKED",
            TaskStatus::Done => "DONE",
        }
    }

    /// Decode a stored status value. Unknown text falls back to `Todo` so a
    /// row written by a newer version still loads.
    pub fn from_str(s: &str) -> Self {
        match s {
            "IN_PROGRESS" => TaskStatus::InProgress,
            "PR" => TaskStatus::Pr,
            "BLOCKED" => TaskStatus::Blocked,
            "DONE" => TaskStatus::Done,
            _ => TaskStatus::Todo,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "☐",
            TaskStatus::InProgress => "●",
            TaskStatus::Pr => "◐",
            TaskStatus::Blocked => "⊘",
            TaskStatus::Done => "✓",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub jira_tag: String,
    pub title: Option<String>,
    pub status: TaskStatus,
    pub jira_url: Option<String>,
    pub pr_url: Option<String>,
    pub parent_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Read-time join; never stored on the task row itself.
    pub time_logs: Vec<TimeLog>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeLog {
    pub id: String,
    pub task_id: String,
    pub start_time: String,
    /// Null while the log is running; set exactly once when stopped.
    pub end_time: Option<String>,
    /// Elapsed whole seconds, set together with `end_time`.
    pub duration: Option<i64>,
}

impl TimeLog {
    pub fn is_running(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Input for task creation. Status always starts at `Todo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub jira_tag: String,
    pub title: Option<String>,
    pub parent_id: Option<String>,
}

/// Partial update for a task. An outer `None` leaves the field untouched;
/// for nullable columns the inner `Option` distinguishes "set to this value"
/// from "clear".
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub jira_tag: Option<String>,
    pub title: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub jira_url: Option<Option<String>>,
    pub pr_url: Option<Option<String>>,
    pub parent_id: Option<Option<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.jira_tag.is_none()
            && self.title.is_none()
            && self.status.is_none()
            && self.jira_url.is_none()
            && self.pr_url.is_none()
            && self.parent_id.is_none()
    }
}
