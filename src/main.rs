use crate::app_env::AppConfig;
use axum::extract::{FromRef, State};
use axum::Router;
use axum_extra::extract::cookie::Key;
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::time::Duration;
use tower_http::services::{ServeDir, ServeFile};
use tracing::info;

mod api;
mod app_env;
mod domain;
mod dto;
mod external_connections;
mod persistence;
mod routing_utils;
mod telemetry;

/// State shared across every request handler. Everything inside is cheap to
/// clone (pools and keys are internally reference-counted).
#[derive(Clone)]
pub struct SharedData {
    pub ext_cxn: persistence::ExternalConnectivity,
    pub config: AppConfig,
    pub cookie_key: Key,
}

/// Extractor alias for the app's shared state
pub type AppState = State<SharedData>;

impl FromRef<SharedData> for Key {
    fn from_ref(state: &SharedData) -> Self {
        state.cookie_key.clone()
    }
}

#[tokio::main]
async fn main() {
    if dotenv().is_err() {
        println!("Starting server without .env file.");
    }
    telemetry::init_subscriber(telemetry::exporters_from_env());

    let config = AppConfig::from_env();
    let cookie_key = {
        let raw_key = env::var(app_env::SESSION_SIGNING_KEY).unwrap_or_else(|_| {
            panic!(
                "Required environment variable {} is not set",
                app_env::SESSION_SIGNING_KEY
            )
        });
        Key::from(raw_key.as_bytes())
    };

    let db_url = env::var(app_env::DB_URL).unwrap_or_else(|_| {
        panic!(
            "Required environment variable {} is not set",
            app_env::DB_URL
        )
    });
    let db_pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&db_url)
        .await
        .expect("Could not connect to the database");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Database migration failed");

    let port = config.port;
    let uploads_dir = config.uploads_dir.clone();
    let shared_data = SharedData {
        ext_cxn: persistence::ExternalConnectivity::new(db_pool),
        config,
        cookie_key,
    };

    let api_routes = Router::new()
        .merge(api::auth::auth_routes())
        .merge(api::tasks::task_routes())
        .merge(api::settings::settings_routes())
        .merge(api::photos::photo_routes());

    let router = Router::new()
        .merge(api::swagger_main::build_documentation())
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(&uploads_dir))
        .fallback_service(
            ServeDir::new("static").fallback(ServeFile::new("static/index.html")),
        )
        .with_state(shared_data);
    let traced_router = telemetry::attach_http_tracing(router);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .unwrap_or_else(|err| panic!("Could not listen on port {port}: {err}"));
    info!("Starting server on port {port}.");
    axum::serve(listener, traced_router)
        .await
        .expect("The HTTP server crashed");
}
