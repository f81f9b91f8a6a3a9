//! Descendant resolution and cascading deletion over the task forest.

use anyhow::Result;
use rusqlite::params_from_iter;

use super::Store;
use super::queries::placeholders;

impl Store {
    /// Every transitive descendant of `root_id`, found by iterative frontier
    /// expansion: fetch the children of the current frontier, accumulate
    /// them, make them the next frontier, stop when a round finds nothing.
    /// Non-recursive, so depth is bounded by row count rather than stack;
    /// termination relies on the write paths refusing cycle-forming parents.
    pub fn collect_descendant_ids(&self, root_id: &str) -> Result<Vec<String>> {
        let mut descendants = Vec::new();
        let mut frontier = vec![root_id.to_string()];
        while !frontier.is_empty() {
            let sql = format!(
                r#"SELECT "id" FROM "Task" WHERE "parentId" IN ({})"#,
                placeholders(frontier.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let children = stmt
                .query_map(params_from_iter(frontier.iter()), |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            if children.is_empty() {
                break;
            }
            descendants.extend(children.iter().cloned());
            frontier = children;
        }
        Ok(descendants)
    }

    /// Delete `root_id` together with its whole subtree. Logs are deleted
    /// before tasks so no TimeLog ever references a vanished task id. The
    /// two steps are not atomic together; re-running after a partial failure
    /// recomputes the remaining set and deletes it.
    pub fn delete_task_cascade(&self, root_id: &str) -> Result<()> {
        let mut ids = vec![root_id.to_string()];
        ids.extend(self.collect_descendant_ids(root_id)?);
        self.delete_time_logs_for_tasks(&ids)?;
        self.delete_tasks(&ids)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::super::models::NewTask;
    use super::*;

    fn task(store: &Store, tag: &str, parent: Option<&str>) -> String {
        store
            .create_task(&NewTask {
                jira_tag: tag.into(),
                title: None,
                parent_id: parent.map(String::from),
            })
            .unwrap()
            .id
    }

    #[test]
    fn test_descendants_of_leaf_is_empty() {
        let store = Store::open_in_memory().unwrap();
        let a = task(&store, "OPS-1", None);
        assert!(store.collect_descendant_ids(&a).unwrap().is_empty());
    }

    #[test]
    fn test_descendants_cover_deep_and_wide_nesting() {
        let store = Store::open_in_memory().unwrap();
        let root = task(&store, "OPS-1", None);
        let left = task(&store, "OPS-2", Some(&root));
        let right = task(&store, "OPS-3", Some(&root));
        let grandchild = task(&store, "OPS-4", Some(&left));
        let great = task(&store, "OPS-5", Some(&grandchild));
        // A sibling tree that must not be picked up.
        let other = task(&store, "OPS-6", None);
        task(&store, "OPS-7", Some(&other));

        let mut found = store.collect_descendant_ids(&root).unwrap();
        found.sort();
        let mut expected = vec![left, right, grandchild, great];
        expected.sort();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_cascade_removes_subtree_and_logs() {
        let store = Store::open_in_memory().unwrap();
        let root = task(&store, "OPS-1", None);
        let child = task(&store, "OPS-2", Some(&root));
        let grandchild = task(&store, "OPS-3", Some(&child));
        let bystander = task(&store, "OPS-4", None);
        store
            .insert_time_log(&root, &Utc::now().to_rfc3339())
            .unwrap();
        store
            .insert_time_log(&grandchild, &Utc::now().to_rfc3339())
            .unwrap();
        let kept = store
            .insert_time_log(&bystander, &Utc::now().to_rfc3339())
            .unwrap();

        store.delete_task_cascade(&root).unwrap();

        let tasks = store.list_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, bystander);
        // Every surviving log references a surviving task.
        assert_eq!(tasks[0].time_logs.len(), 1);
        assert_eq!(tasks[0].time_logs[0].id, kept.id);
        let orphans: i64 = store
            .conn
            .query_row(
                r#"SELECT COUNT(*) FROM "TimeLog"
                   WHERE "taskId" NOT IN (SELECT "id" FROM "Task")"#,
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn test_cascade_of_unknown_id_is_a_no_op() {
        let store = Store::open_in_memory().unwrap();
        let a = task(&store, "OPS-1", None);
        store.delete_task_cascade("missing").unwrap();
        assert!(store.find_task(&a).unwrap().is_some());
    }
}
