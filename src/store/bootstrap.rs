//! Schema bootstrap: first-run creation of the writable database from a
//! packaged template, plus additive forward-patching of older on-disk
//! schemas. Runs to completion inside `Store::open` before any query.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rusqlite::Connection;

/// Current full schema. Also exactly what `write_template` ships, so a
/// template-initialized file and a migrated legacy file end up identical.
pub(crate) const TEMPLATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "Task" (
    "id" TEXT NOT NULL PRIMARY KEY,
    "jiraTag" TEXT NOT NULL,
    "title" TEXT,
    "status" TEXT NOT NULL DEFAULT 'TODO',
    "jiraUrl" TEXT,
    "prUrl" TEXT,
    "parentId" TEXT,
    "createdAt" TEXT NOT NULL,
    "updatedAt" TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS "Task_parentId_idx" ON "Task"("parentId");

CREATE TABLE IF NOT EXISTS "TimeLog" (
    "id" TEXT NOT NULL PRIMARY KEY,
    "taskId" TEXT NOT NULL REFERENCES "Task"("id"),
    "startTime" TEXT NOT NULL,
    "endTime" TEXT,
    "duration" INTEGER
);
CREATE INDEX IF NOT EXISTS "TimeLog_taskId_idx" ON "TimeLog"("taskId");
"#;

/// One additive schema patch. `applied` inspects the live schema; `sql` runs
/// only when that check reports the patch missing. New steps append to
/// `MIGRATIONS`; none may rewrite or drop existing data.
struct Migration {
    name: &'static str,
    applied: fn(&Connection) -> Result<bool>,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    name: "task-parent-id",
    applied: task_has_parent_id,
    sql: r#"
        ALTER TABLE "Task" ADD COLUMN "parentId" TEXT;
        CREATE INDEX IF NOT EXISTS "Task_parentId_idx" ON "Task"("parentId");
    "#,
}];

fn task_has_parent_id(conn: &Connection) -> Result<bool> {
    let mut stmt = conn.prepare(r#"PRAGMA table_info("Task")"#)?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == "parentId" {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Make sure the writable database file exists, copying it byte-for-byte
/// from the first available template when missing. A pre-existing file is
/// left untouched.
pub(crate) fn ensure_database(db_path: &Path, template_candidates: &[PathBuf]) -> Result<()> {
    if db_path.exists() {
        return Ok(());
    }
    if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let Some(template) = template_candidates.iter().find(|p| p.exists()) else {
        bail!(
            "no template database found (searched: {})",
            template_candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    };
    fs::copy(template, db_path).with_context(|| {
        format!(
            "failed to copy template {} to {}",
            template.display(),
            db_path.display()
        )
    })?;
    tracing::info!(
        "initialized database at {} from {}",
        db_path.display(),
        template.display()
    );
    relax_permissions(db_path);
    Ok(())
}

// Best effort; a packaged template can arrive read-only and the copy keeps
// its mode bits.
#[cfg(unix)]
fn relax_permissions(db_path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(db_path, fs::Permissions::from_mode(0o666)) {
        tracing::warn!("failed to relax permissions on {}: {e}", db_path.display());
    }
}

#[cfg(not(unix))]
fn relax_permissions(_db_path: &Path) {}

/// Apply any missing additive schema patches. Idempotent, safe on every
/// startup.
pub(crate) fn migrate(conn: &Connection) -> Result<()> {
    for step in MIGRATIONS {
        if (step.applied)(conn).with_context(|| format!("schema check failed for {}", step.name))? {
            continue;
        }
        conn.execute_batch(step.sql)
            .with_context(|| format!("schema patch {} failed", step.name))?;
        tracing::info!("applied schema patch {}", step.name);
    }
    Ok(())
}

/// Write a fresh, empty template database at `path`: the packaging step that
/// produces the read-only template shipped next to the binary.
pub fn write_template(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("failed to create template at {}", path.display()))?;
    conn.execute_batch(TEMPLATE_SCHEMA)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use tempfile::TempDir;

    fn has_column(conn: &Connection, table: &str, column: &str) -> bool {
        let mut stmt = conn
            .prepare(&format!(r#"PRAGMA table_info("{table}")"#))
            .unwrap();
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(1))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        names.iter().any(|n| n == column)
    }

    fn has_index(conn: &Connection, name: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
                params![name],
                |row| row.get(0),
            )
            .unwrap();
        count > 0
    }

    #[test]
    fn test_first_run_copies_template() {
        let tmp = TempDir::new().unwrap();
        let template = tmp.path().join("template.db");
        write_template(&template).unwrap();

        let db = tmp.path().join("data").join("tempo.db");
        ensure_database(&db, &[template]).unwrap();
        assert!(db.exists());

        let conn = Connection::open(&db).unwrap();
        migrate(&conn).unwrap();
        assert!(has_column(&conn, "Task", "parentId"));
        assert!(has_index(&conn, "Task_parentId_idx"));
    }

    #[test]
    fn test_missing_template_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("tempo.db");
        let err = ensure_database(&db, &[tmp.path().join("nope.db")]).unwrap_err();
        assert!(err.to_string().contains("no template database found"));
        assert!(!db.exists());
    }

    #[test]
    fn test_existing_file_left_untouched() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("tempo.db");
        write_template(&db).unwrap();
        let conn = Connection::open(&db).unwrap();
        conn.execute(
            r#"INSERT INTO "Task" ("id", "jiraTag", "createdAt", "updatedAt")
               VALUES ('t1', 'OPS-1', '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00')"#,
            [],
        )
        .unwrap();
        drop(conn);

        // No candidates at all: must still succeed because the file exists.
        ensure_database(&db, &[]).unwrap();

        let conn = Connection::open(&db).unwrap();
        let tag: String = conn
            .query_row(
                r#"SELECT "jiraTag" FROM "Task" WHERE "id" = 't1'"#,
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tag, "OPS-1");
    }

    #[test]
    fn test_patches_legacy_schema_and_keeps_rows() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("tempo.db");
        let conn = Connection::open(&db).unwrap();
        // Schema from before tasks could nest: no parentId, no index.
        conn.execute_batch(
            r#"
            CREATE TABLE "Task" (
                "id" TEXT NOT NULL PRIMARY KEY,
                "jiraTag" TEXT NOT NULL,
                "title" TEXT,
                "status" TEXT NOT NULL DEFAULT 'TODO',
                "jiraUrl" TEXT,
                "prUrl" TEXT,
                "createdAt" TEXT NOT NULL,
                "updatedAt" TEXT NOT NULL
            );
            CREATE TABLE "TimeLog" (
                "id" TEXT NOT NULL PRIMARY KEY,
                "taskId" TEXT NOT NULL REFERENCES "Task"("id"),
                "startTime" TEXT NOT NULL,
                "endTime" TEXT,
                "duration" INTEGER
            );
            "#,
        )
        .unwrap();
        conn.execute(
            r#"INSERT INTO "Task" ("id", "jiraTag", "title", "status", "createdAt", "updatedAt")
               VALUES ('t1', 'OPS-7', 'legacy row', 'DONE',
                       '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00')"#,
            [],
        )
        .unwrap();
        assert!(!has_column(&conn, "Task", "parentId"));

        migrate(&conn).unwrap();

        assert!(has_column(&conn, "Task", "parentId"));
        assert!(has_index(&conn, "Task_parentId_idx"));
        let (tag, status): (String, String) = conn
            .query_row(
                r#"SELECT "jiraTag", "status" FROM "Task" WHERE "id" = 't1'"#,
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(tag, "OPS-7");
        assert_eq!(status, "DONE");
        let parent: Option<String> = conn
            .query_row(
                r#"SELECT "parentId" FROM "Task" WHERE "id" = 't1'"#,
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(parent.is_none());
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(TEMPLATE_SCHEMA).unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert!(has_column(&conn, "Task", "parentId"));
    }
}
