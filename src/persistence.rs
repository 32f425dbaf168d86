pub mod db_session_store;
pub mod db_subtask_store;
pub mod db_task_store;
pub mod db_user_store;
pub mod fs_photo_store;
pub mod google_identity;

use crate::external_connections;
use crate::external_connections::ConnectionHandle;
use anyhow::anyhow;
use reqwest_middleware::ClientBuilder;
use reqwest_tracing::TracingMiddleware;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres};
use std::fmt::{Debug, Display};

/// Data structure which owns clients for connecting to external systems.
/// Allows business logic to be agnostic of the external systems it communicates with
/// so driven adapters can easily be swapped out for other implementations
#[derive(Clone)]
pub struct ExternalConnectivity {
    db: PgPool,
    http_client: reqwest_middleware::ClientWithMiddleware,
}

impl ExternalConnectivity {
    /// Accepts the database pool used to connect to external systems and constructs
    /// an instance of ExternalConnectivity owning it, plus a traced outbound HTTP client
    pub fn new(db: PgPool) -> Self {
        let base_client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .expect("the outbound HTTP client failed to initialize");
        let http_client = ClientBuilder::new(base_client)
            .with(TracingMiddleware::default())
            .build();
        ExternalConnectivity { db, http_client }
    }
}

/// A handle from ExternalConnectivity which can connect to a database
pub struct PoolConnectionHandle {
    active_connection: PoolConnection<Postgres>,
}

impl ConnectionHandle for PoolConnectionHandle {
    fn borrow_connection(&mut self) -> &mut PgConnection {
        &mut self.active_connection
    }
}

impl external_connections::ExternalConnectivity for ExternalConnectivity {
    type DbHandle<'cxn_borrow> = PoolConnectionHandle;

    async fn database_cxn(&mut self) -> Result<Self::DbHandle<'_>, anyhow::Error> {
        let handle = PoolConnectionHandle {
            active_connection: self.db.acquire().await?,
        };

        Ok(handle)
    }

    fn http_client(&self) -> &reqwest_middleware::ClientWithMiddleware {
        &self.http_client
    }
}

/// Converts anything implementing Debug and Display into an [anyhow::Error]
fn anyhowify<T: Debug + Display>(errorish: T) -> anyhow::Error {
    anyhow!(format!("{}", errorish))
}
