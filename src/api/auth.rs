use crate::domain::auth::driven_ports::{IdentityProvider, SessionStore};
use crate::domain::auth::driving_ports::{AuthPort, LoginError};
use crate::domain::user::AppUser;
use crate::dto::auth::{AuthorizeUrl, CurrentUser};
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{GenericErrorResponse, Json, NoSessionResponse};
use crate::{domain, dto, persistence, AppState, SharedData};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{ErrorResponse, Html, IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::Router;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::SignedCookieJar;
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

#[derive(OpenApi)]
#[openapi(paths(get_authorize_url, login_callback, current_user, logout))]
/// Defines the OpenAPI documentation for the authentication API
pub struct AuthApi;
/// Constant used to group authentication endpoints in OpenAPI documentation
pub const AUTH_API_GROUP: &str = "Auth";

/// Name of the signed cookie carrying the session token
pub const SESSION_COOKIE: &str = "stride_session";

/// Small page served after a successful login. A popup notifies the window
/// that opened it and closes; a full-page navigation falls back to the root.
const LOGIN_COMPLETE_PAGE: &str = r#"<!doctype html>
<html>
  <body>
    <script>
      if (window.opener) {
        window.opener.postMessage("stride:login-complete", window.location.origin);
        window.close();
      } else {
        window.location.replace("/");
      }
    </script>
  </body>
</html>
"#;

/// Reads the session token out of the signed cookie jar, if one is present
/// and intact
pub fn session_token(jar: &SignedCookieJar) -> Option<Uuid> {
    let cookie = jar.get(SESSION_COOKIE)?;
    Uuid::parse_str(cookie.value()).ok()
}

/// Builds the session cookie. The cookie requires HTTPS and is delivered on
/// cross-site requests so the popup login flow works; scripts never see it.
fn session_cookie(token: Uuid) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .build()
}

/// Cookie used to clear the session cookie on logout
fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// Resolves the session user behind the given token, producing the standard
/// 401 response when there is no live session. Every authenticated endpoint
/// funnels through here.
pub async fn require_session(
    token: Option<Uuid>,
    ext_cxn: &mut impl ExternalConnectivity,
    auth_service: &impl AuthPort,
    session_read: &impl SessionStore,
) -> Result<AppUser, ErrorResponse> {
    let Some(token) = token else {
        return Err(NoSessionResponse.into());
    };

    let maybe_user = auth_service
        .resolve_session(token, &mut *ext_cxn, session_read)
        .await
        .map_err(GenericErrorResponse)?;

    maybe_user.ok_or_else(|| NoSessionResponse.into())
}

/// Adds routes under "/auth" to the application router
pub fn auth_routes() -> Router<SharedData> {
    Router::new()
        .route(
            "/auth/google/url",
            get(|State(app_state): AppState| async move {
                let identity = persistence::google_identity::GoogleIdentity::new(&app_state.config);
                get_authorize_url(&identity).await
            }),
        )
        .route(
            "/auth/google/callback",
            get(
                |State(app_state): AppState,
                 jar: SignedCookieJar,
                 Query(params): Query<CallbackParams>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let auth_service = domain::auth::AuthService {};
                    let identity =
                        persistence::google_identity::GoogleIdentity::new(&app_state.config);
                    let user_store = persistence::db_user_store::DbUserStore;
                    let session_store = persistence::db_session_store::DbSessionStore;

                    let login_result = login_callback(
                        params.code.as_deref(),
                        &mut ext_cxn,
                        &auth_service,
                        &identity,
                        &user_store,
                        &session_store,
                    )
                    .await;

                    match login_result {
                        Ok(token) => {
                            (jar.add(session_cookie(token)), Html(LOGIN_COMPLETE_PAGE))
                                .into_response()
                        }
                        Err(CallbackError::MissingCode) => {
                            warn!("Login callback arrived without an authorization code");
                            Redirect::to("/auth-error.html").into_response()
                        }
                        Err(CallbackError::Upstream(err)) => {
                            warn!("Identity provider exchange failed: {err:#}");
                            Redirect::to("/auth-error.html").into_response()
                        }
                        Err(CallbackError::Internal(err)) => {
                            GenericErrorResponse(err).into_response()
                        }
                    }
                },
            ),
        )
        .route(
            "/auth/me",
            get(|State(app_state): AppState, jar: SignedCookieJar| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let auth_service = domain::auth::AuthService {};
                let session_store = persistence::db_session_store::DbSessionStore;

                current_user(
                    session_token(&jar),
                    &mut ext_cxn,
                    &auth_service,
                    &session_store,
                )
                .await
            }),
        )
        .route(
            "/auth/logout",
            post(|State(app_state): AppState, jar: SignedCookieJar| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let auth_service = domain::auth::AuthService {};
                let session_store = persistence::db_session_store::DbSessionStore;

                let logout_result = logout(
                    session_token(&jar),
                    &mut ext_cxn,
                    &auth_service,
                    &session_store,
                )
                .await;
                (jar.remove(expired_session_cookie()), logout_result)
            }),
        )
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/auth/google/url",
    tag = AUTH_API_GROUP,
    responses(
        (status = 200, description = "The provider's authorization URL", body = AuthorizeUrl),
    ),
)]
/// Builds the identity provider's authorization URL for the client to open
async fn get_authorize_url(
    identity: &impl IdentityProvider,
) -> Result<Json<dto::auth::AuthorizeUrl>, ErrorResponse> {
    Ok(Json(dto::auth::AuthorizeUrl {
        url: identity.authorize_url(),
    }))
}

/// Ways the login callback can go wrong. Upstream failures redirect to a
/// static error page; internal ones surface as generic server errors.
#[derive(Debug)]
enum CallbackError {
    MissingCode,
    Upstream(anyhow::Error),
    Internal(anyhow::Error),
}

#[utoipa::path(
    get,
    path = "/api/auth/google/callback",
    tag = AUTH_API_GROUP,
    params(("code" = Option<String>, Query, description = "Authorization code issued by the provider")),
    responses(
        (status = 200, description = "Login succeeded, session cookie set, notifier page returned"),
        (status = 303, description = "The exchange failed; redirected to the error page"),
    ),
)]
/// Exchanges the provider's authorization code for a session
async fn login_callback(
    code: Option<&str>,
    ext_cxn: &mut impl ExternalConnectivity,
    auth_service: &impl AuthPort,
    identity: &impl IdentityProvider,
    user_write: &impl domain::user::driven_ports::UserStore,
    session_write: &impl SessionStore,
) -> Result<Uuid, CallbackError> {
    let Some(code) = code else {
        return Err(CallbackError::MissingCode);
    };

    let login_result = auth_service
        .login(code, &mut *ext_cxn, identity, user_write, session_write)
        .await;
    match login_result {
        Ok((token, user)) => {
            info!("User {} logged in", user.id);
            Ok(token)
        }
        Err(LoginError::IdentityExchange(err)) => Err(CallbackError::Upstream(err)),
        Err(LoginError::PortError(err)) => Err(CallbackError::Internal(err)),
    }
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = AUTH_API_GROUP,
    responses(
        (status = 200, description = "The session user, or null when logged out", body = CurrentUser),
    ),
)]
/// Reports the user behind the current session, or null for anonymous callers
async fn current_user(
    token: Option<Uuid>,
    ext_cxn: &mut impl ExternalConnectivity,
    auth_service: &impl AuthPort,
    session_read: &impl SessionStore,
) -> Result<Json<Option<dto::auth::CurrentUser>>, ErrorResponse> {
    let Some(token) = token else {
        return Ok(Json(None));
    };

    let maybe_user = auth_service
        .resolve_session(token, &mut *ext_cxn, session_read)
        .await
        .map_err(GenericErrorResponse)?;

    Ok(Json(maybe_user.map(dto::auth::CurrentUser::from)))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = AUTH_API_GROUP,
    responses(
        (status = 200, description = "The session is gone (even if it never existed)"),
    ),
)]
/// Destroys the current session. Safe to call repeatedly.
async fn logout(
    token: Option<Uuid>,
    ext_cxn: &mut impl ExternalConnectivity,
    auth_service: &impl AuthPort,
    session_write: &impl SessionStore,
) -> Result<StatusCode, ErrorResponse> {
    if let Some(token) = token {
        auth_service
            .logout(token, &mut *ext_cxn, session_write)
            .await
            .map_err(GenericErrorResponse)?;
    }

    Ok(StatusCode::OK)
}
