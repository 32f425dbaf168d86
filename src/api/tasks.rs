use crate::domain::auth::driven_ports::SessionStore;
use crate::domain::auth::driving_ports::AuthPort;
use crate::domain::subtask::driven_ports::{PhotoStore, SubtaskReader, SubtaskWriter};
use crate::domain::subtask::driving_ports::{SubtaskError, SubtaskPort};
use crate::domain::subtask::{CompletionUpdate, PhotoUpload};
use crate::domain::task::driven_ports::{TaskReader, TaskWriter};
use crate::domain::task::driving_ports::{TaskError, TaskPort};
use crate::dto::task::{NewSubtask, NewTask, Subtask, TaskWithSubtasks};
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{
    GenericErrorResponse, Json, MultipartErrorResponse, NotOwnedResponse, UnsupportedImageResponse,
    ValidationErrorResponse,
};
use crate::{domain, persistence, AppState, SharedData};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::ErrorResponse;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use axum_extra::extract::SignedCookieJar;
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;
use validator::Validate;

use super::auth::{require_session, session_token};

#[derive(OpenApi)]
#[openapi(paths(
    list_tasks,
    create_task,
    delete_task,
    create_subtask,
    update_subtask
))]
/// Defines the OpenAPI documentation for the task and subtask API
pub struct TasksApi;
/// Constant used to group task endpoints in OpenAPI documentation
pub const TASKS_API_GROUP: &str = "Tasks";

/// Completion photos may not exceed this many bytes on the wire
const PHOTO_UPLOAD_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Adds routes under "/tasks" and "/subtasks" to the application router
pub fn task_routes() -> Router<SharedData> {
    Router::new()
        .route(
            "/tasks",
            get(|State(app_state): AppState, jar: SignedCookieJar| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let task_service = domain::task::TaskService {};

                list_tasks(
                    session_token(&jar),
                    &mut ext_cxn,
                    &domain::auth::AuthService {},
                    &persistence::db_session_store::DbSessionStore,
                    &task_service,
                    &persistence::db_task_store::DbTaskReader,
                )
                .await
            }),
        )
        .route(
            "/tasks",
            post(
                |State(app_state): AppState, jar: SignedCookieJar, Json(new_task): Json<NewTask>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::task::TaskService {};

                    create_task(
                        session_token(&jar),
                        new_task,
                        &mut ext_cxn,
                        &domain::auth::AuthService {},
                        &persistence::db_session_store::DbSessionStore,
                        &task_service,
                        &persistence::db_task_store::DbTaskWriter,
                    )
                    .await
                },
            ),
        )
        .route(
            "/tasks/:task_id",
            delete(
                |State(app_state): AppState, jar: SignedCookieJar, Path(task_id): Path<i32>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::task::TaskService {};

                    delete_task(
                        session_token(&jar),
                        task_id,
                        &mut ext_cxn,
                        &domain::auth::AuthService {},
                        &persistence::db_session_store::DbSessionStore,
                        &task_service,
                        &persistence::db_task_store::DbTaskWriter,
                    )
                    .await
                },
            ),
        )
        .route(
            "/tasks/:task_id/subtasks",
            post(
                |State(app_state): AppState,
                 jar: SignedCookieJar,
                 Path(task_id): Path<i32>,
                 Json(new_subtask): Json<NewSubtask>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let subtask_service = domain::subtask::SubtaskService {};

                    create_subtask(
                        session_token(&jar),
                        task_id,
                        new_subtask,
                        &mut ext_cxn,
                        &domain::auth::AuthService {},
                        &persistence::db_session_store::DbSessionStore,
                        &subtask_service,
                        &persistence::db_task_store::DbTaskReader,
                        &persistence::db_subtask_store::DbSubtaskWriter,
                    )
                    .await
                },
            ),
        )
        .route(
            "/subtasks/:subtask_id",
            patch(
                |State(app_state): AppState,
                 jar: SignedCookieJar,
                 Path(subtask_id): Path<i32>,
                 multipart: Multipart| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let subtask_service = domain::subtask::SubtaskService {};
                    let photo_store = persistence::fs_photo_store::FsPhotoStore::new(
                        &app_state.config.uploads_dir,
                    );

                    let update = read_completion_form(multipart).await?;
                    update_subtask(
                        session_token(&jar),
                        subtask_id,
                        update,
                        &mut ext_cxn,
                        &domain::auth::AuthService {},
                        &persistence::db_session_store::DbSessionStore,
                        &subtask_service,
                        &persistence::db_subtask_store::DbSubtaskReader,
                        &persistence::db_subtask_store::DbSubtaskWriter,
                        &photo_store,
                    )
                    .await
                },
            )
            .layer(DefaultBodyLimit::max(PHOTO_UPLOAD_LIMIT_BYTES)),
        )
}

/// Reads the multipart body of a completion request: a `completed` boolean
/// field, plus an optional `photo` file. An empty photo field (a form
/// submitted with no file chosen) counts as no photo.
async fn read_completion_form(mut multipart: Multipart) -> Result<CompletionUpdate, ErrorResponse> {
    let mut completed: Option<bool> = None;
    let mut photo: Option<PhotoUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(MultipartErrorResponse::from)?
    {
        // Reading a field's content consumes it, so detach the name first
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("completed") => {
                let raw_value = field.text().await.map_err(MultipartErrorResponse::from)?;
                match raw_value.trim() {
                    "true" => completed = Some(true),
                    "false" => completed = Some(false),
                    other => {
                        return Err(MultipartErrorResponse::message(format!(
                            "the completed field must be \"true\" or \"false\", got \"{other}\""
                        ))
                        .into())
                    }
                }
            }
            Some("photo") => {
                let content_type = field.content_type().map(str::to_owned).unwrap_or_default();
                let bytes = field.bytes().await.map_err(MultipartErrorResponse::from)?;
                if !bytes.is_empty() {
                    photo = Some(PhotoUpload {
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => continue,
        }
    }

    match (completed, photo) {
        // An attached photo is proof, so the subtask completes no matter what
        // the flag said
        (_, Some(photo)) => Ok(CompletionUpdate {
            completed: true,
            photo: Some(photo),
        }),
        (Some(completed), None) => Ok(CompletionUpdate {
            completed,
            photo: None,
        }),
        (None, None) => Err(MultipartErrorResponse::message(
            "the completed field is required when no photo is attached",
        )
        .into()),
    }
}

/// Maps subtask domain failures onto API error responses
fn subtask_error_response(err: SubtaskError) -> ErrorResponse {
    match err {
        SubtaskError::NotOwned => NotOwnedResponse.into(),
        SubtaskError::UnsupportedPhotoType { content_type } => {
            UnsupportedImageResponse { content_type }.into()
        }
        SubtaskError::PortError(err) => GenericErrorResponse(err).into(),
    }
}

#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = TASKS_API_GROUP,
    responses(
        (status = 200, description = "The session user's tasks, newest first", body = Vec<TaskWithSubtasks>),
        (status = 401, description = "No active session"),
    ),
)]
/// Lists the session user's tasks with their subtasks attached
async fn list_tasks(
    token: Option<Uuid>,
    ext_cxn: &mut impl ExternalConnectivity,
    auth_service: &impl AuthPort,
    session_read: &impl SessionStore,
    task_service: &impl TaskPort,
    task_read: &impl TaskReader,
) -> Result<Json<Vec<TaskWithSubtasks>>, ErrorResponse> {
    let user = require_session(token, &mut *ext_cxn, auth_service, session_read).await?;
    info!("Listing tasks for user {}", user.id);

    let tasks = task_service
        .tasks_for_user(&user.id, &mut *ext_cxn, task_read)
        .await
        .map_err(GenericErrorResponse)?;

    Ok(Json(tasks.into_iter().map(TaskWithSubtasks::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    tag = TASKS_API_GROUP,
    request_body = NewTask,
    responses(
        (status = 201, description = "The created task with an empty subtask list", body = TaskWithSubtasks),
        (status = 400, description = "Invalid title"),
        (status = 401, description = "No active session"),
    ),
)]
/// Creates a task owned by the session user
async fn create_task(
    token: Option<Uuid>,
    new_task: NewTask,
    ext_cxn: &mut impl ExternalConnectivity,
    auth_service: &impl AuthPort,
    session_read: &impl SessionStore,
    task_service: &impl TaskPort,
    task_write: &impl TaskWriter,
) -> Result<(StatusCode, Json<TaskWithSubtasks>), ErrorResponse> {
    let user = require_session(token, &mut *ext_cxn, auth_service, session_read).await?;
    new_task.validate().map_err(ValidationErrorResponse::from)?;
    info!("Creating a task for user {}", user.id);

    let created = task_service
        .create_task(&user.id, &new_task.into(), &mut *ext_cxn, task_write)
        .await
        .map_err(GenericErrorResponse)?;

    Ok((
        StatusCode::CREATED,
        Json(TaskWithSubtasks::from(domain::task::TaskWithSubtasks {
            task: created,
            subtasks: Vec::new(),
        })),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{task_id}",
    tag = TASKS_API_GROUP,
    params(("task_id" = i32, Path, description = "ID of the task to delete")),
    responses(
        (status = 200, description = "The task and its subtasks are gone"),
        (status = 401, description = "No active session"),
        (status = 403, description = "The task is missing or not owned by the caller"),
    ),
)]
/// Deletes one of the session user's tasks, subtasks included
async fn delete_task(
    token: Option<Uuid>,
    task_id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    auth_service: &impl AuthPort,
    session_read: &impl SessionStore,
    task_service: &impl TaskPort,
    task_write: &impl TaskWriter,
) -> Result<StatusCode, ErrorResponse> {
    let user = require_session(token, &mut *ext_cxn, auth_service, session_read).await?;
    info!("Deleting task {task_id} for user {}", user.id);

    let delete_result = task_service
        .delete_task(&user.id, task_id, &mut *ext_cxn, task_write)
        .await;
    match delete_result {
        Ok(()) => Ok(StatusCode::OK),
        Err(TaskError::NotOwned) => Err(NotOwnedResponse.into()),
        Err(TaskError::PortError(err)) => Err(GenericErrorResponse(err).into()),
    }
}

#[utoipa::path(
    post,
    path = "/api/tasks/{task_id}/subtasks",
    tag = TASKS_API_GROUP,
    params(("task_id" = i32, Path, description = "ID of the task gaining a subtask")),
    request_body = NewSubtask,
    responses(
        (status = 201, description = "The created subtask", body = Subtask),
        (status = 400, description = "Invalid title"),
        (status = 401, description = "No active session"),
        (status = 403, description = "The task is missing or not owned by the caller"),
    ),
)]
/// Creates a subtask under one of the session user's tasks
async fn create_subtask(
    token: Option<Uuid>,
    task_id: i32,
    new_subtask: NewSubtask,
    ext_cxn: &mut impl ExternalConnectivity,
    auth_service: &impl AuthPort,
    session_read: &impl SessionStore,
    subtask_service: &impl SubtaskPort,
    task_read: &impl TaskReader,
    subtask_write: &impl SubtaskWriter,
) -> Result<(StatusCode, Json<Subtask>), ErrorResponse> {
    let user = require_session(token, &mut *ext_cxn, auth_service, session_read).await?;
    new_subtask
        .validate()
        .map_err(ValidationErrorResponse::from)?;
    info!("Creating a subtask under task {task_id} for user {}", user.id);

    let created = subtask_service
        .create_subtask(
            &user.id,
            task_id,
            &new_subtask.into(),
            &mut *ext_cxn,
            task_read,
            subtask_write,
        )
        .await
        .map_err(subtask_error_response)?;

    Ok((StatusCode::CREATED, Json(Subtask::from(created))))
}

#[utoipa::path(
    patch,
    path = "/api/subtasks/{subtask_id}",
    tag = TASKS_API_GROUP,
    params(("subtask_id" = i32, Path, description = "ID of the subtask being toggled")),
    responses(
        (status = 200, description = "The updated subtask", body = Subtask),
        (status = 400, description = "Malformed multipart body"),
        (status = 401, description = "No active session"),
        (status = 403, description = "The subtask is missing or not owned by the caller"),
        (status = 415, description = "The attached photo is not an accepted image type"),
    ),
)]
/// Toggles a subtask's completion, optionally attaching a photo as proof
async fn update_subtask(
    token: Option<Uuid>,
    subtask_id: i32,
    update: CompletionUpdate,
    ext_cxn: &mut impl ExternalConnectivity,
    auth_service: &impl AuthPort,
    session_read: &impl SessionStore,
    subtask_service: &impl SubtaskPort,
    subtask_read: &impl SubtaskReader,
    subtask_write: &impl SubtaskWriter,
    photo_store: &impl PhotoStore,
) -> Result<Json<Subtask>, ErrorResponse> {
    let user = require_session(token, &mut *ext_cxn, auth_service, session_read).await?;
    info!("Updating completion of subtask {subtask_id} for user {}", user.id);

    let updated = subtask_service
        .set_completion(
            &user.id,
            subtask_id,
            update,
            &mut *ext_cxn,
            subtask_read,
            subtask_write,
            photo_store,
        )
        .await
        .map_err(subtask_error_response)?;

    Ok(Json(Subtask::from(updated)))
}
