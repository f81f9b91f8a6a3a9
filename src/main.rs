use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use tempo::app::App;
use tempo::config;
use tempo::store::{self, NewTask, TaskPatch, TaskStatus, TimeLog};

#[derive(Parser)]
#[command(
    name = "tempo",
    version = env!("TEMPO_VERSION"),
    about = "Track tasks and the time spent on them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the tempo data directory (and a template database if none
    /// is installed)
    Init,
    /// Write an empty template database, the file shipped alongside installs
    Template {
        /// Output path
        #[arg(default_value = "template.db")]
        output: PathBuf,
    },
    /// Add a task
    Add {
        /// Ticket reference, e.g. OPS-1
        jira_tag: String,
        /// Display title
        #[arg(short, long)]
        title: Option<String>,
        /// Parent task id for nesting
        #[arg(short, long)]
        parent: Option<String>,
    },
    /// List all tasks with their logged time
    List {
        /// Emit JSON instead of the human-readable listing
        #[arg(long)]
        json: bool,
    },
    /// Update fields on a task; omitted flags keep their current value
    Update {
        id: String,
        #[arg(long)]
        jira_tag: Option<String>,
        #[arg(long)]
        title: Option<String>,
        /// One of: todo, in_progress, pr, blocked, done
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        jira_url: Option<String>,
        #[arg(long)]
        pr_url: Option<String>,
        /// Move under another task
        #[arg(long)]
        parent: Option<String>,
        /// Clear the title
        #[arg(long)]
        clear_title: bool,
        /// Clear the jira URL
        #[arg(long)]
        clear_jira_url: bool,
        /// Clear the PR URL
        #[arg(long)]
        clear_pr_url: bool,
        /// Detach from the parent task
        #[arg(long)]
        clear_parent: bool,
    },
    /// Delete a task, its subtree, and all their time logs
    Delete { id: String },
    /// Start a timer on a task (stops any running timer first)
    Start {
        /// Task id
        task_id: String,
    },
    /// Stop the running timer
    Stop {
        /// Stop a specific log instead of the running one
        #[arg(long)]
        log_id: Option<String>,
    },
    /// Export all tasks to a JSON file
    Export {
        /// Output path (default: tasks.json in the data directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Init => {
            config::ensure_dirs()?;
            let template = config::base_dir()?.join("template.db");
            if !template.exists() {
                store::write_template(&template)?;
            }
            println!("tempo initialized at {}", config::base_dir()?.display());
            Ok(())
        }
        Commands::Template { output } => {
            store::write_template(&output)?;
            println!("Template database written to {}", output.display());
            Ok(())
        }
        Commands::Add {
            jira_tag,
            title,
            parent,
        } => {
            let app = open_app()?;
            let task = app.create_task(&NewTask {
                jira_tag,
                title,
                parent_id: parent,
            })?;
            println!("Created task {} [{}]", task.jira_tag, task.id);
            Ok(())
        }
        Commands::List { json } => {
            let app = open_app()?;
            let tasks = app.list_tasks()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks. Use `tempo add <jira-tag>` to create one.");
            } else {
                for t in &tasks {
                    let total: i64 = t.time_logs.iter().filter_map(|l| l.duration).sum();
                    let running = t.time_logs.iter().any(TimeLog::is_running);
                    println!(
                        "  {} {} — {} [{}] {}{}",
                        t.status.symbol(),
                        t.jira_tag,
                        t.title.as_deref().unwrap_or("(untitled)"),
                        t.id,
                        format_duration(total),
                        if running { " (timer running)" } else { "" },
                    );
                }
            }
            Ok(())
        }
        Commands::Update {
            id,
            jira_tag,
            title,
            status,
            jira_url,
            pr_url,
            parent,
            clear_title,
            clear_jira_url,
            clear_pr_url,
            clear_parent,
        } => {
            let app = open_app()?;
            let patch = TaskPatch {
                jira_tag,
                title: patch_field(title, clear_title),
                status: status.as_deref().map(parse_status).transpose()?,
                jira_url: patch_field(jira_url, clear_jira_url),
                pr_url: patch_field(pr_url, clear_pr_url),
                parent_id: patch_field(parent, clear_parent),
            };
            if patch.is_empty() {
                bail!("nothing to update; pass at least one field flag");
            }
            let task = app.update_task(&id, &patch)?;
            println!(
                "Updated task {} [{}] — status {}",
                task.jira_tag,
                task.id,
                task.status.as_str()
            );
            Ok(())
        }
        Commands::Delete { id } => {
            let app = open_app()?;
            app.delete_task(&id)?;
            println!("Deleted task {id} and its subtree");
            Ok(())
        }
        Commands::Start { task_id } => {
            let app = open_app()?;
            let log = app.start_timer(&task_id)?;
            println!("Timer started on task {} (log {})", log.task_id, log.id);
            Ok(())
        }
        Commands::Stop { log_id } => {
            let app = open_app()?;
            let log = match log_id {
                Some(id) => app.store().get_time_log(&id)?,
                None => {
                    let mut running = app.store().running_time_logs()?;
                    match running.pop() {
                        Some(log) => log,
                        None => bail!("no timer is running"),
                    }
                }
            };
            let started = DateTime::parse_from_rfc3339(&log.start_time)
                .with_context(|| format!("time log {} has an unreadable start time", log.id))?;
            let duration = (Utc::now() - started.with_timezone(&Utc))
                .num_seconds()
                .max(0);
            let log = app.stop_timer(&log.id, duration)?;
            println!(
                "Stopped timer on task {} after {}",
                log.task_id,
                format_duration(log.duration.unwrap_or(0))
            );
            Ok(())
        }
        Commands::Export { output } => {
            let app = open_app()?;
            let tasks = app.list_tasks()?;
            let export = serde_json::json!({
                "exported_at": Utc::now().to_rfc3339(),
                "tasks": tasks,
            });
            let json = serde_json::to_string_pretty(&export)?;
            let output_path = match output {
                Some(path) => path,
                None => config::base_dir()?.join("tasks.json"),
            };
            fs::write(&output_path, &json)
                .with_context(|| format!("failed to write {}", output_path.display()))?;
            println!("Exported {} tasks to {}", tasks.len(), output_path.display());
            Ok(())
        }
    }
}

fn open_app() -> Result<App> {
    config::ensure_dirs()?;
    App::open()
}

/// Merge a value flag with its `--clear-*` counterpart into a patch field.
fn patch_field(value: Option<String>, clear: bool) -> Option<Option<String>> {
    if clear { Some(None) } else { value.map(Some) }
}

/// Strict status parse for user input; the store-side decoder is the lenient
/// one.
fn parse_status(s: &str) -> Result<TaskStatus> {
    match s.to_uppercase().replace('-', "_").as_str() {
        "TODO" => Ok(TaskStatus::Todo),
        "IN_PROGRESS" => Ok(TaskStatus::InProgress),
        "PR" => Ok(TaskStatus::Pr),
        "BLOCKED" => Ok(TaskStatus::Blocked),
        "DONE" => Ok(TaskStatus::Done),
        _ => bail!("unknown status '{s}' (expected todo, in_progress, pr, blocked, or done)"),
    }
}

fn format_duration(total_seconds: i64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
