use sqlx::PgConnection;

/// Abstracts away the set of clients used to communicate with systems outside
/// the process (the database, outbound HTTP). Business logic and driven
/// adapters accept an implementation of this trait so tests can substitute
/// [test_util::FakeExternalConnectivity] without touching real infrastructure.
pub trait ExternalConnectivity: Sync {
    type DbHandle<'cxn_borrow>: ConnectionHandle
    where
        Self: 'cxn_borrow;

    /// Acquires a handle which can lease a database connection
    async fn database_cxn(&mut self) -> Result<Self::DbHandle<'_>, anyhow::Error>;

    /// Borrows the shared outbound HTTP client (trace-propagating)
    fn http_client(&self) -> &reqwest_middleware::ClientWithMiddleware;
}

/// A leased database connection from [ExternalConnectivity::database_cxn]
pub trait ConnectionHandle {
    fn borrow_connection(&mut self) -> &mut PgConnection;
}

#[cfg(test)]
pub mod test_util {
    use super::*;

    /// Stand-in connectivity for unit tests. The in-memory driven port fakes
    /// never touch the database, so requesting a connection from this type is
    /// a test bug and fails the test immediately.
    #[derive(Clone)]
    pub struct FakeExternalConnectivity {
        http_client: reqwest_middleware::ClientWithMiddleware,
    }

    impl FakeExternalConnectivity {
        pub fn new() -> FakeExternalConnectivity {
            FakeExternalConnectivity {
                http_client: reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
                    .build(),
            }
        }
    }

    pub struct NoDbHandle;

    impl ConnectionHandle for NoDbHandle {
        fn borrow_connection(&mut self) -> &mut PgConnection {
            unreachable!("unit tests must not lease a real database connection")
        }
    }

    impl ExternalConnectivity for FakeExternalConnectivity {
        type DbHandle<'cxn_borrow> = NoDbHandle;

        async fn database_cxn(&mut self) -> Result<NoDbHandle, anyhow::Error> {
            panic!("unit tests must not lease a real database connection")
        }

        fn http_client(&self) -> &reqwest_middleware::ClientWithMiddleware {
            &self.http_client
        }
    }
}
