use crate::domain::subtask::Subtask;
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use chrono::{DateTime, Utc};

/// A user-defined goal, the container for subtasks
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Task {
    pub id: i32,
    pub owner_user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A task with its subtasks attached, ordered by subtask id
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct TaskWithSubtasks {
    pub task: Task,
    pub subtasks: Vec<Subtask>,
}

#[derive(Clone)]
pub struct NewTask {
    pub title: String,
}

pub mod driven_ports {
    use super::*;

    pub trait TaskReader: Sync {
        /// All tasks owned by the user, newest first, subtasks ordered by id
        async fn tasks_for_user(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Vec<TaskWithSubtasks>, anyhow::Error>;

        /// Ownership lookup: resolves only when the task exists AND belongs
        /// to the given user.
        async fn task_owned_by(
            &self,
            task_id: i32,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<Task>, anyhow::Error>;
    }

    pub trait TaskWriter: Sync {
        async fn create_task(
            &self,
            user_id: &str,
            new_task: &NewTask,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Task, anyhow::Error>;

        /// Deletes the task only when it belongs to the given user; the
        /// returned bool reports whether a row was actually removed.
        async fn delete_owned_task(
            &self,
            task_id: i32,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum TaskError {
        /// The task does not exist or belongs to somebody else. The two cases
        /// are deliberately indistinguishable to callers.
        #[error("the task does not exist or is not owned by the caller")]
        NotOwned,
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    pub trait TaskPort {
        async fn tasks_for_user(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            task_read: &impl driven_ports::TaskReader,
        ) -> Result<Vec<TaskWithSubtasks>, anyhow::Error>;

        async fn create_task(
            &self,
            user_id: &str,
            new_task: &NewTask,
            ext_cxn: &mut impl ExternalConnectivity,
            task_write: &impl driven_ports::TaskWriter,
        ) -> Result<Task, anyhow::Error>;

        async fn delete_task(
            &self,
            user_id: &str,
            task_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
            task_write: &impl driven_ports::TaskWriter,
        ) -> Result<(), TaskError>;
    }
}

pub struct TaskService {}

impl driving_ports::TaskPort for TaskService {
    async fn tasks_for_user(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl driven_ports::TaskReader,
    ) -> Result<Vec<TaskWithSubtasks>, anyhow::Error> {
        task_read
            .tasks_for_user(user_id, &mut *ext_cxn)
            .await
            .context("listing a user's tasks")
    }

    async fn create_task(
        &self,
        user_id: &str,
        new_task: &NewTask,
        ext_cxn: &mut impl ExternalConnectivity,
        task_write: &impl driven_ports::TaskWriter,
    ) -> Result<Task, anyhow::Error> {
        task_write
            .create_task(user_id, new_task, &mut *ext_cxn)
            .await
            .context("creating a task")
    }

    async fn delete_task(
        &self,
        user_id: &str,
        task_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
        task_write: &impl driven_ports::TaskWriter,
    ) -> Result<(), driving_ports::TaskError> {
        let removed = task_write
            .delete_owned_task(task_id, user_id, &mut *ext_cxn)
            .await
            .context("deleting a task")?;

        if removed {
            Ok(())
        } else {
            Err(driving_ports::TaskError::NotOwned)
        }
    }
}


#[cfg(test)]
pub mod test_util {
    use super::*;
    use crate::domain::test_util::Connectivity;
    use std::sync::RwLock;

    pub struct InMemoryTaskPersistence {
        pub tasks: Vec<TaskWithSubtasks>,
        pub connectivity: Connectivity,
        highest_task_id: i32,
    }

    pub struct NewTaskWithOwner {
        pub owner: &'static str,
        pub title: &'static str,
    }

    impl InMemoryTaskPersistence {
        pub fn new() -> InMemoryTaskPersistence {
            InMemoryTaskPersistence {
                tasks: Vec::new(),
                connectivity: Connectivity::Connected,
                highest_task_id: 0,
            }
        }

        pub fn new_with_tasks(tasks: &[NewTaskWithOwner]) -> InMemoryTaskPersistence {
            InMemoryTaskPersistence {
                tasks: tasks
                    .iter()
                    .enumerate()
                    .map(|(index, task_with_owner)| TaskWithSubtasks {
                        task: Task {
                            id: index as i32 + 1,
                            owner_user_id: task_with_owner.owner.to_owned(),
                            title: task_with_owner.title.to_owned(),
                            // Later ids are newer
                            created_at: Utc::now() + chrono::Duration::seconds(index as i64),
                        },
                        subtasks: Vec::new(),
                    })
                    .collect(),
                connectivity: Connectivity::Connected,
                highest_task_id: tasks.len() as i32,
            }
        }

        pub fn new_locked() -> RwLock<InMemoryTaskPersistence> {
            RwLock::new(Self::new())
        }
    }

    impl driven_ports::TaskReader for RwLock<InMemoryTaskPersistence> {
        async fn tasks_for_user(
            &self,
            user_id: &str,
            _: &mut impl ExternalConnectivity,
        ) -> Result<Vec<TaskWithSubtasks>, anyhow::Error> {
            let persistence = self.read().expect("task rwlock poisoned");
            persistence.connectivity.blow_up_if_disconnected()?;

            let mut matching: Vec<TaskWithSubtasks> = persistence
                .tasks
                .iter()
                .filter(|entry| entry.task.owner_user_id == user_id)
                .cloned()
                .collect();
            matching.sort_by(|a, b| b.task.created_at.cmp(&a.task.created_at));

            Ok(matching)
        }

        async fn task_owned_by(
            &self,
            task_id: i32,
            user_id: &str,
            _: &mut impl ExternalConnectivity,
        ) -> Result<Option<Task>, anyhow::Error> {
            let persistence = self.read().expect("task rwlock poisoned");
            persistence.connectivity.blow_up_if_disconnected()?;

            Ok(persistence
                .tasks
                .iter()
                .find(|entry| entry.task.id == task_id && entry.task.owner_user_id == user_id)
                .map(|entry| entry.task.clone()))
        }
    }

    impl driven_ports::TaskWriter for RwLock<InMemoryTaskPersistence> {
        async fn create_task(
            &self,
            user_id: &str,
            new_task: &NewTask,
            _: &mut impl ExternalConnectivity,
        ) -> Result<Task, anyhow::Error> {
            let mut persistence = self.write().expect("task rwlock poisoned");
            persistence.connectivity.blow_up_if_disconnected()?;

            persistence.highest_task_id += 1;
            let task = Task {
                id: persistence.highest_task_id,
                owner_user_id: user_id.to_owned(),
                title: new_task.title.clone(),
                created_at: Utc::now(),
            };
            persistence.tasks.push(TaskWithSubtasks {
                task: task.clone(),
                subtasks: Vec::new(),
            });
            Ok(task)
        }

        async fn delete_owned_task(
            &self,
            task_id: i32,
            user_id: &str,
            _: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error> {
            let mut persistence = self.write().expect("task rwlock poisoned");
            persistence.connectivity.blow_up_if_disconnected()?;

            let before = persistence.tasks.len();
            persistence
                .tasks
                .retain(|entry| !(entry.task.id == task_id && entry.task.owner_user_id == user_id));
            Ok(persistence.tasks.len() != before)
        }
    }
}
