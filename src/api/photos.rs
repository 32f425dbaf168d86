use crate::domain::auth::driven_ports::SessionStore;
use crate::domain::auth::driving_ports::AuthPort;
use crate::domain::subtask::driven_ports::SubtaskReader;
use crate::domain::subtask::driving_ports::SubtaskPort;
use crate::dto::photo::GalleryPhoto;
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{GenericErrorResponse, Json};
use crate::{domain, persistence, AppState, SharedData};
use axum::extract::State;
use axum::response::ErrorResponse;
use axum::routing::get;
use axum::Router;
use axum_extra::extract::SignedCookieJar;
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;

use super::auth::{require_session, session_token};

#[derive(OpenApi)]
#[openapi(paths(list_photos))]
/// Defines the OpenAPI documentation for the photo gallery API
pub struct PhotosApi;
/// Constant used to group gallery endpoints in OpenAPI documentation
pub const PHOTOS_API_GROUP: &str = "Photos";

/// Adds routes under "/photos" to the application router
pub fn photo_routes() -> Router<SharedData> {
    Router::new().route(
        "/photos",
        get(|State(app_state): AppState, jar: SignedCookieJar| async move {
            let mut ext_cxn = app_state.ext_cxn.clone();
            let subtask_service = domain::subtask::SubtaskService {};

            list_photos(
                session_token(&jar),
                &mut ext_cxn,
                &domain::auth::AuthService {},
                &persistence::db_session_store::DbSessionStore,
                &subtask_service,
                &persistence::db_subtask_store::DbSubtaskReader,
            )
            .await
        }),
    )
}

#[utoipa::path(
    get,
    path = "/api/photos",
    tag = PHOTOS_API_GROUP,
    responses(
        (status = 200, description = "The session user's completion photos, newest first", body = Vec<GalleryPhoto>),
        (status = 401, description = "No active session"),
    ),
)]
/// Lists every completion photo the session user has taken, annotated with
/// its task title, newest completion first
async fn list_photos(
    token: Option<Uuid>,
    ext_cxn: &mut impl ExternalConnectivity,
    auth_service: &impl AuthPort,
    session_read: &impl SessionStore,
    subtask_service: &impl SubtaskPort,
    subtask_read: &impl SubtaskReader,
) -> Result<Json<Vec<GalleryPhoto>>, ErrorResponse> {
    let user = require_session(token, &mut *ext_cxn, auth_service, session_read).await?;
    info!("Listing photos for user {}", user.id);

    let photos = subtask_service
        .photos_for_user(&user.id, &mut *ext_cxn, subtask_read)
        .await
        .map_err(GenericErrorResponse)?;

    Ok(Json(photos.into_iter().map(GalleryPhoto::from).collect()))
}
