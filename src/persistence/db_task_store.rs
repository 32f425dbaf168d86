use crate::domain;
use crate::domain::subtask::Subtask;
use crate::domain::task::{NewTask, Task, TaskWithSubtasks};
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error};
use chrono::{DateTime, Utc};

pub struct DbTaskReader;

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: i32,
    user_id: String,
    title: String,
    created_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(value: TaskRow) -> Self {
        Task {
            id: value.id,
            owner_user_id: value.user_id,
            title: value.title,
            created_at: value.created_at,
        }
    }
}

/// One row of the task list query: a task joined against its subtasks, with
/// the subtask columns nullable for tasks that have none yet.
#[derive(sqlx::FromRow)]
struct TaskSubtaskRow {
    id: i32,
    user_id: String,
    title: String,
    created_at: DateTime<Utc>,
    subtask_id: Option<i32>,
    subtask_title: Option<String>,
    subtask_completed: Option<bool>,
    subtask_photo_url: Option<String>,
    subtask_completed_at: Option<DateTime<Utc>>,
}

impl domain::task::driven_ports::TaskReader for DbTaskReader {
    async fn tasks_for_user(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Vec<TaskWithSubtasks>, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let rows: Vec<TaskSubtaskRow> = sqlx::query_as(
            "SELECT t.id, t.user_id, t.title, t.created_at, \
                    st.id AS subtask_id, st.title AS subtask_title, \
                    st.completed AS subtask_completed, st.photo_url AS subtask_photo_url, \
                    st.completed_at AS subtask_completed_at \
             FROM task t \
             LEFT JOIN subtask st ON st.task_id = t.id \
             WHERE t.user_id = $1 \
             ORDER BY t.created_at DESC, t.id DESC, st.id ASC",
        )
        .bind(user_id)
        .fetch_all(cxn.borrow_connection())
        .await
        .context("fetching a user's tasks with subtasks")?;

        // Rows arrive grouped by task, so a single pass can fold them
        let mut tasks: Vec<TaskWithSubtasks> = Vec::new();
        for row in rows {
            if tasks.last().map(|entry| entry.task.id) != Some(row.id) {
                tasks.push(TaskWithSubtasks {
                    task: Task {
                        id: row.id,
                        owner_user_id: row.user_id.clone(),
                        title: row.title.clone(),
                        created_at: row.created_at,
                    },
                    subtasks: Vec::new(),
                });
            }
            if let Some(subtask_id) = row.subtask_id {
                let current_task = tasks
                    .last_mut()
                    .expect("a task entry was just pushed for this row");
                current_task.subtasks.push(Subtask {
                    id: subtask_id,
                    task_id: row.id,
                    title: row.subtask_title.unwrap_or_default(),
                    completed: row.subtask_completed.unwrap_or(false),
                    photo_url: row.subtask_photo_url,
                    completed_at: row.subtask_completed_at,
                });
            }
        }

        Ok(tasks)
    }

    async fn task_owned_by(
        &self,
        task_id: i32,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<Task>, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let task: Option<TaskRow> = sqlx::query_as(
            "SELECT t.id, t.user_id, t.title, t.created_at \
             FROM task t WHERE t.id = $1 AND t.user_id = $2",
        )
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(cxn.borrow_connection())
        .await
        .context("checking task ownership")?;

        Ok(task.map(Task::from))
    }
}

pub struct DbTaskWriter;

impl domain::task::driven_ports::TaskWriter for DbTaskWriter {
    async fn create_task(
        &self,
        user_id: &str,
        new_task: &NewTask,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Task, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let task: TaskRow = sqlx::query_as(
            "INSERT INTO task (user_id, title) VALUES ($1, $2) \
             RETURNING id, user_id, title, created_at",
        )
        .bind(user_id)
        .bind(&new_task.title)
        .fetch_one(cxn.borrow_connection())
        .await
        .context("inserting a new task")?;

        Ok(task.into())
    }

    async fn delete_owned_task(
        &self,
        task_id: i32,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        // Ownership and deletion in one filtered statement; subtasks go with
        // the task via the FK cascade
        let delete_result = sqlx::query("DELETE FROM task WHERE id = $1 AND user_id = $2")
            .bind(task_id)
            .bind(user_id)
            .execute(cxn.borrow_connection())
            .await
            .context("deleting a task")?;

        Ok(delete_result.rows_affected() > 0)
    }
}
