use std::env;

/// URL for accessing the PostgreSQL database (should contain a schema name in the path)
pub const DB_URL: &str = "DATABASE_URL";
/// Log level configuration for the application. Follows tracing-subscriber's
/// [EnvFilter](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html) syntax.
pub const LOG_LEVEL: &str = "LOG_LEVEL";

/// Externally visible base URL of the application, used to build the OAuth redirect URI
pub const BASE_URL: &str = "BASE_URL";
/// OAuth client ID issued by the Google Cloud console
pub const GOOGLE_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
/// OAuth client secret issued by the Google Cloud console
pub const GOOGLE_CLIENT_SECRET: &str = "GOOGLE_CLIENT_SECRET";
/// Secret used to sign the session cookie. Must be at least 64 bytes long.
pub const SESSION_SIGNING_KEY: &str = "SESSION_SIGNING_KEY";
/// Directory completion photos are written to. Defaults to "uploads".
pub const UPLOADS_DIR: &str = "UPLOADS_DIR";
/// Port the HTTP listener binds. Defaults to 8080.
pub const PORT: &str = "PORT";

/// OpenTelemetry span export URL. Should be http://localhost:4317 by default, as the service should
/// have an OpenTelemetry collector sidecar which directs metrics to the correct place
pub const OTEL_SPAN_EXPORT_URL: &str = "OTEL_SPAN_EXPORT_URL";
/// OpenTelemetry metrics export URL. Should be http://localhost:4317 by default, as the service should
/// have an OpenTelemetry collector sidecar which directs metrics to the correct place
pub const OTEL_METRIC_EXPORT_URL: &str = "OTEL_METRIC_EXPORT_URL";

/// Configuration the service reads once at startup. Everything here comes from
/// the environment (or a .env file in development).
#[derive(Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub uploads_dir: String,
    pub port: u16,
}

impl AppConfig {
    /// Reads the required configuration from the environment, panicking with a
    /// descriptive message when a required variable is absent. Startup is the
    /// only caller.
    pub fn from_env() -> AppConfig {
        AppConfig {
            base_url: require(BASE_URL),
            google_client_id: require(GOOGLE_CLIENT_ID),
            google_client_secret: require(GOOGLE_CLIENT_SECRET),
            uploads_dir: env::var(UPLOADS_DIR).unwrap_or_else(|_| "uploads".to_owned()),
            port: env::var(PORT)
                .ok()
                .map(|raw_port| {
                    raw_port
                        .parse()
                        .unwrap_or_else(|_| panic!("{PORT} must be a number, got {raw_port}"))
                })
                .unwrap_or(8080),
        }
    }
}

fn require(var_name: &str) -> String {
    env::var(var_name)
        .unwrap_or_else(|_| panic!("Required environment variable {var_name} is not set"))
}
