use crate::domain::auth::driven_ports::SessionStore;
use crate::domain::auth::driving_ports::AuthPort;
use crate::domain::user::driven_ports::{SettingsStore, UserStore};
use crate::domain::user::driving_ports::SettingsPort;
use crate::dto::settings::AdsStatus;
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{GenericErrorResponse, Json};
use crate::{domain, persistence, AppState, SharedData};
use axum::extract::State;
use axum::response::ErrorResponse;
use axum::routing::{get, post};
use axum::Router;
use axum_extra::extract::SignedCookieJar;
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;

use super::auth::{require_session, session_token};

#[derive(OpenApi)]
#[openapi(paths(get_settings, remove_ads))]
/// Defines the OpenAPI documentation for the settings API
pub struct SettingsApi;
/// Constant used to group settings endpoints in OpenAPI documentation
pub const SETTINGS_API_GROUP: &str = "Settings";

/// Adds routes under "/settings" to the application router
pub fn settings_routes() -> Router<SharedData> {
    Router::new()
        .route(
            "/settings",
            get(|State(app_state): AppState, jar: SignedCookieJar| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let settings_service = domain::user::SettingsService {};

                get_settings(
                    session_token(&jar),
                    &mut ext_cxn,
                    &domain::auth::AuthService {},
                    &persistence::db_session_store::DbSessionStore,
                    &settings_service,
                    &persistence::db_user_store::DbSettingsStore,
                )
                .await
            }),
        )
        .route(
            "/settings/remove-ads",
            post(|State(app_state): AppState, jar: SignedCookieJar| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let settings_service = domain::user::SettingsService {};

                remove_ads(
                    session_token(&jar),
                    &mut ext_cxn,
                    &domain::auth::AuthService {},
                    &persistence::db_session_store::DbSessionStore,
                    &settings_service,
                    &persistence::db_user_store::DbUserStore,
                )
                .await
            }),
        )
}

#[utoipa::path(
    get,
    path = "/api/settings",
    tag = SETTINGS_API_GROUP,
    responses(
        (status = 200, description = "The caller's ads flag (per-user when logged in, global otherwise)", body = AdsStatus),
    ),
)]
/// Reports whether ads are removed for the caller. Anonymous visitors see the
/// global singleton value.
async fn get_settings(
    token: Option<Uuid>,
    ext_cxn: &mut impl ExternalConnectivity,
    auth_service: &impl AuthPort,
    session_read: &impl SessionStore,
    settings_service: &impl SettingsPort,
    settings_read: &impl SettingsStore,
) -> Result<Json<AdsStatus>, ErrorResponse> {
    // Settings are readable anonymously, so a missing or dead session is not
    // an error here
    let current_user = match token {
        Some(token) => auth_service
            .resolve_session(token, &mut *ext_cxn, session_read)
            .await
            .map_err(GenericErrorResponse)?,
        None => None,
    };

    let ads_removed = settings_service
        .ads_status(current_user.as_ref(), &mut *ext_cxn, settings_read)
        .await
        .map_err(GenericErrorResponse)?;

    Ok(Json(AdsStatus { ads_removed }))
}

#[utoipa::path(
    post,
    path = "/api/settings/remove-ads",
    tag = SETTINGS_API_GROUP,
    responses(
        (status = 200, description = "Ads are now removed for the session user", body = AdsStatus),
        (status = 401, description = "No active session"),
    ),
)]
/// Flips the session user's ads-removed flag to true. Idempotent.
async fn remove_ads(
    token: Option<Uuid>,
    ext_cxn: &mut impl ExternalConnectivity,
    auth_service: &impl AuthPort,
    session_read: &impl SessionStore,
    settings_service: &impl SettingsPort,
    user_write: &impl UserStore,
) -> Result<Json<AdsStatus>, ErrorResponse> {
    let user = require_session(token, &mut *ext_cxn, auth_service, session_read).await?;
    info!("Removing ads for user {}", user.id);

    settings_service
        .remove_ads(&user.id, &mut *ext_cxn, user_write)
        .await
        .map_err(GenericErrorResponse)?;

    Ok(Json(AdsStatus { ads_removed: true }))
}
