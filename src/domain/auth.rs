use crate::domain::user::driven_ports::UserStore;
use crate::domain::user::{AppUser, UpsertUser};
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use uuid::Uuid;

/// Profile data returned by the identity provider after a successful
/// code exchange.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct ProviderProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

pub mod driven_ports {
    use super::*;

    /// The external identity provider consumed during login
    pub trait IdentityProvider: Sync {
        /// Builds the provider's authorization URL. No side effects.
        fn authorize_url(&self) -> String;

        /// Exchanges an authorization code for the user's profile via the
        /// provider's token and userinfo endpoints.
        async fn exchange_code(
            &self,
            code: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<ProviderProfile, anyhow::Error>;
    }

    /// Server-side session state keyed by the token carried in the cookie
    pub trait SessionStore: Sync {
        async fn create(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Uuid, anyhow::Error>;

        async fn user_for_token(
            &self,
            token: Uuid,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<AppUser>, anyhow::Error>;

        async fn delete(
            &self,
            token: Uuid,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum LoginError {
        /// The token or userinfo exchange with the identity provider failed.
        /// No session state exists when this is returned.
        #[error("identity provider exchange failed: {0}")]
        IdentityExchange(#[source] anyhow::Error),
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    pub trait AuthPort {
        /// Performs the full login flow: code exchange, user upsert, and
        /// session creation. Returns the session token and the stored user.
        async fn login(
            &self,
            code: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            identity: &impl driven_ports::IdentityProvider,
            user_write: &impl UserStore,
            session_write: &impl driven_ports::SessionStore,
        ) -> Result<(Uuid, AppUser), LoginError>;

        /// Looks up the user owning the given session token, if any.
        async fn resolve_session(
            &self,
            token: Uuid,
            ext_cxn: &mut impl ExternalConnectivity,
            session_read: &impl driven_ports::SessionStore,
        ) -> Result<Option<AppUser>, anyhow::Error>;

        /// Destroys the session. Deleting an unknown token is a no-op.
        async fn logout(
            &self,
            token: Uuid,
            ext_cxn: &mut impl ExternalConnectivity,
            session_write: &impl driven_ports::SessionStore,
        ) -> Result<(), anyhow::Error>;
    }
}

pub struct AuthService {}

impl driving_ports::AuthPort for AuthService {
    async fn login(
        &self,
        code: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        identity: &impl driven_ports::IdentityProvider,
        user_write: &impl UserStore,
        session_write: &impl driven_ports::SessionStore,
    ) -> Result<(Uuid, AppUser), driving_ports::LoginError> {
        let profile = identity
            .exchange_code(code, &mut *ext_cxn)
            .await
            .map_err(driving_ports::LoginError::IdentityExchange)?;

        let user = user_write
            .upsert_from_login(
                &UpsertUser {
                    id: profile.id,
                    email: profile.email,
                    display_name: profile.name,
                    picture_url: profile.picture,
                },
                &mut *ext_cxn,
            )
            .await
            .context("storing the logged-in user")?;

        let token = session_write
            .create(&user.id, &mut *ext_cxn)
            .await
            .context("opening a session for the logged-in user")?;

        Ok((token, user))
    }

    async fn resolve_session(
        &self,
        token: Uuid,
        ext_cxn: &mut impl ExternalConnectivity,
        session_read: &impl driven_ports::SessionStore,
    ) -> Result<Option<AppUser>, anyhow::Error> {
        session_read
            .user_for_token(token, &mut *ext_cxn)
            .await
            .context("resolving a session token")
    }

    async fn logout(
        &self,
        token: Uuid,
        ext_cxn: &mut impl ExternalConnectivity,
        session_write: &impl driven_ports::SessionStore,
    ) -> Result<(), anyhow::Error> {
        session_write
            .delete(token, &mut *ext_cxn)
            .await
            .context("destroying a session")
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;
    use crate::domain::auth::driving_ports::{AuthPort, LoginError};
    use crate::domain::test_util::Connectivity;
    use crate::domain::user::test_util::InMemoryUserPersistence;
    use crate::external_connections;
    use speculoos::prelude::*;
    use std::sync::RwLock;

    fn provider_with_profile() -> InMemoryIdentityProvider {
        InMemoryIdentityProvider::new(ProviderProfile {
            id: "108296714927451".to_owned(),
            email: "person@example.com".to_owned(),
            name: "Test Person".to_owned(),
            picture: Some("https://lh3.example.com/photo.jpg".to_owned()),
        })
    }

    mod login {
        use super::*;

        #[tokio::test]
        async fn creates_user_and_session() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let identity = provider_with_profile();
            let users = InMemoryUserPersistence::new_locked();
            let sessions = InMemorySessionPersistence::new_locked();

            let login_result = AuthService {}
                .login("auth-code-123", &mut ext_cxn, &identity, &users, &sessions)
                .await;
            let (token, user) = match login_result {
                Ok(parts) => parts,
                Err(err) => panic!("Login should have succeeded: {err}"),
            };

            assert_eq!("108296714927451", user.id);
            assert!(!user.ads_removed);

            let locked_sessions = sessions.read().expect("session rwlock poisoned");
            assert!(
                matches!(locked_sessions.open_sessions.as_slice(), [
                    (open_token, owner)
                ] if *open_token == token && owner == "108296714927451")
            );
        }

        #[tokio::test]
        async fn login_overwrites_profile_but_keeps_ads_flag() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let identity = provider_with_profile();
            let sessions = InMemorySessionPersistence::new_locked();
            let users = InMemoryUserPersistence::new_locked();

            // First login, then the user pays to remove ads
            AuthService {}
                .login("first-code", &mut ext_cxn, &identity, &users, &sessions)
                .await
                .expect("first login should succeed");
            {
                let mut locked_users = users.write().expect("user rwlock poisoned");
                locked_users.created_users[0].ads_removed = true;
            }

            let second_login = AuthService {}
                .login("second-code", &mut ext_cxn, &identity, &users, &sessions)
                .await;
            let (_, user) = second_login.expect("second login should succeed");

            assert!(user.ads_removed);
            let locked_users = users.read().expect("user rwlock poisoned");
            assert_eq!(1, locked_users.created_users.len());
        }

        #[tokio::test]
        async fn no_session_appears_when_exchange_fails() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let identity = InMemoryIdentityProvider::failing();
            let users = InMemoryUserPersistence::new_locked();
            let sessions = InMemorySessionPersistence::new_locked();

            let login_result = AuthService {}
                .login("bad-code", &mut ext_cxn, &identity, &users, &sessions)
                .await;
            let Err(LoginError::IdentityExchange(_)) = login_result else {
                panic!("Expected an identity exchange failure, got: {login_result:#?}");
            };

            let locked_users = users.read().expect("user rwlock poisoned");
            assert_that!(locked_users.created_users).is_empty();
            let locked_sessions = sessions.read().expect("session rwlock poisoned");
            assert_that!(locked_sessions.open_sessions).is_empty();
        }

        #[tokio::test]
        async fn session_store_failure_is_a_port_error() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let identity = provider_with_profile();
            let users = InMemoryUserPersistence::new_locked();
            let mut sessions_raw = InMemorySessionPersistence::new();
            sessions_raw.connectivity = Connectivity::Disconnected;
            let sessions = RwLock::new(sessions_raw);

            let login_result = AuthService {}
                .login("auth-code", &mut ext_cxn, &identity, &users, &sessions)
                .await;
            let Err(LoginError::PortError(_)) = login_result else {
                panic!("Expected a port error, got: {login_result:#?}");
            };
        }
    }

    mod resolve_session {
        use super::*;
        use crate::domain::auth::driven_ports::SessionStore;

        #[tokio::test]
        async fn finds_the_session_owner() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let identity = provider_with_profile();
            let users = InMemoryUserPersistence::new_locked();
            let sessions = InMemorySessionPersistence::new_locked();
            let (token, user) = AuthService {}
                .login("auth-code", &mut ext_cxn, &identity, &users, &sessions)
                .await
                .expect("login should succeed");

            let resolved = AuthService {}
                .resolve_session(token, &mut ext_cxn, &sessions)
                .await;
            assert_that!(resolved)
                .is_ok()
                .is_some()
                .matches(|resolved_user| resolved_user.id == user.id);
        }

        #[tokio::test]
        async fn unknown_token_resolves_to_nobody() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let sessions = InMemorySessionPersistence::new_locked();

            let resolved = AuthService {}
                .resolve_session(uuid::Uuid::new_v4(), &mut ext_cxn, &sessions)
                .await;
            assert_that!(resolved).is_ok().is_none();
        }

        #[tokio::test]
        async fn logged_out_token_resolves_to_nobody() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let identity = provider_with_profile();
            let users = InMemoryUserPersistence::new_locked();
            let sessions = InMemorySessionPersistence::new_locked();
            let (token, _) = AuthService {}
                .login("auth-code", &mut ext_cxn, &identity, &users, &sessions)
                .await
                .expect("login should succeed");

            AuthService {}
                .logout(token, &mut ext_cxn, &sessions)
                .await
                .expect("logout should succeed");
            // A second logout of the same token is fine
            AuthService {}
                .logout(token, &mut ext_cxn, &sessions)
                .await
                .expect("repeated logout should succeed");

            let resolved = sessions.user_for_token(token, &mut ext_cxn).await;
            assert_that!(resolved).is_ok().is_none();
        }
    }
}
