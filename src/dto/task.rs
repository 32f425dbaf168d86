use crate::domain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// DTO for creating a new task via the API
#[derive(Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct NewTask {
    #[validate(length(min = 1, max = 200))]
    #[schema(example = "Run a 10k")]
    pub title: String,
}

impl From<NewTask> for domain::task::NewTask {
    fn from(value: NewTask) -> Self {
        domain::task::NewTask { title: value.title }
    }
}

/// DTO for creating a new subtask under a task via the API
#[derive(Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct NewSubtask {
    #[validate(length(min = 1, max = 200))]
    #[schema(example = "Run 3 times this week")]
    pub title: String,
}

impl From<NewSubtask> for domain::subtask::NewSubtask {
    fn from(value: NewSubtask) -> Self {
        domain::subtask::NewSubtask { title: value.title }
    }
}

/// DTO for a returned subtask on the API
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, PartialEq, Eq, Debug))]
pub struct Subtask {
    #[schema(example = 15)]
    pub id: i32,
    #[schema(example = 4)]
    pub task_id: i32,
    #[schema(example = "Run 3 times this week")]
    pub title: String,
    pub completed: bool,
    #[schema(example = "/uploads/1717171717000-0a1b2c3d.jpeg")]
    pub photo_url: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<domain::subtask::Subtask> for Subtask {
    fn from(value: domain::subtask::Subtask) -> Self {
        Subtask {
            id: value.id,
            task_id: value.task_id,
            title: value.title,
            completed: value.completed,
            photo_url: value.photo_url,
            completed_at: value.completed_at,
        }
    }
}

/// DTO for a returned task with its subtasks attached
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, PartialEq, Eq, Debug))]
pub struct TaskWithSubtasks {
    #[schema(example = 4)]
    pub id: i32,
    #[schema(example = "Run a 10k")]
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub subtasks: Vec<Subtask>,
}

impl From<domain::task::TaskWithSubtasks> for TaskWithSubtasks {
    fn from(value: domain::task::TaskWithSubtasks) -> Self {
        TaskWithSubtasks {
            id: value.task.id,
            title: value.task.title,
            created_at: value.task.created_at,
            subtasks: value.subtasks.into_iter().map(Subtask::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod new_task {
        use super::*;

        #[test]
        fn empty_title_gets_rejected() {
            let bad_task = NewTask {
                title: String::new(),
            };
            let validation_result = bad_task.validate();
            assert!(validation_result.is_err());
            let validation_errors = validation_result.unwrap_err();
            assert!(validation_errors.field_errors().contains_key("title"));
        }

        #[test]
        fn oversized_title_gets_rejected() {
            let bad_task = NewTask {
                title: (0..250).map(|_| "A").collect(),
            };
            let validation_result = bad_task.validate();
            assert!(validation_result.is_err());
        }
    }

    mod new_subtask {
        use super::*;

        #[test]
        fn empty_title_gets_rejected() {
            let bad_subtask = NewSubtask {
                title: String::new(),
            };
            let validation_result = bad_subtask.validate();
            assert!(validation_result.is_err());
            let validation_errors = validation_result.unwrap_err();
            assert!(validation_errors.field_errors().contains_key("title"));
        }
    }
}
