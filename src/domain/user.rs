use crate::external_connections::ExternalConnectivity;
use anyhow::Context;

/// A user as stored by the application. The ID is issued by the identity
/// provider, so it is an opaque string rather than a database sequence.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct AppUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub picture_url: Option<String>,
    pub ads_removed: bool,
}

/// Profile data written on every successful login. Insert when the ID is new,
/// otherwise overwrite email/name/picture while leaving the ads flag alone.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct UpsertUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub picture_url: Option<String>,
}

pub mod driven_ports {
    use super::*;

    pub trait UserStore: Sync {
        async fn upsert_from_login(
            &self,
            profile: &UpsertUser,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<AppUser, anyhow::Error>;

        async fn get_by_id(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<AppUser>, anyhow::Error>;

        async fn set_ads_removed(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
    }

    /// Access to the global settings singleton consulted for anonymous visitors
    pub trait SettingsStore: Sync {
        async fn global_ads_removed(
            &self,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;

    pub trait SettingsPort {
        /// Resolves the ads-removed flag for the caller: an authenticated
        /// user's own flag, or the global singleton for anonymous visitors.
        async fn ads_status(
            &self,
            current_user: Option<&AppUser>,
            ext_cxn: &mut impl ExternalConnectivity,
            settings_read: &impl driven_ports::SettingsStore,
        ) -> Result<bool, anyhow::Error>;

        /// Flips the session user's ads-removed flag to true. Idempotent.
        async fn remove_ads(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            user_write: &impl driven_ports::UserStore,
        ) -> Result<(), anyhow::Error>;
    }
}

pub struct SettingsService {}

impl driving_ports::SettingsPort for SettingsService {
    async fn ads_status(
        &self,
        current_user: Option<&AppUser>,
        ext_cxn: &mut impl ExternalConnectivity,
        settings_read: &impl driven_ports::SettingsStore,
    ) -> Result<bool, anyhow::Error> {
        match current_user {
            Some(user) => Ok(user.ads_removed),
            None => settings_read
                .global_ads_removed(&mut *ext_cxn)
                .await
                .context("reading the global ads flag"),
        }
    }

    async fn remove_ads(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        user_write: &impl driven_ports::UserStore,
    ) -> Result<(), anyhow::Error> {
        user_write
            .set_ads_removed(user_id, &mut *ext_cxn)
            .await
            .context("removing ads for a user")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;
    use crate::domain::test_util::Connectivity;
    use crate::domain::user::driving_ports::SettingsPort;
    use crate::external_connections;
    use speculoos::prelude::*;
    use std::sync::RwLock;

    mod ads_status {
        use super::*;

        #[tokio::test]
        async fn authenticated_user_sees_own_flag_not_global() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let mut persistence_raw = InMemoryUserPersistence::new();
            persistence_raw.global_ads_removed = true;
            let persistence = RwLock::new(persistence_raw);
            let user = AppUser {
                ads_removed: false,
                ..user_from_profile(&profile_default())
            };

            let status = SettingsService {}
                .ads_status(Some(&user), &mut ext_cxn, &persistence)
                .await;
            assert_that!(status).is_ok_containing(false);
        }

        #[tokio::test]
        async fn anonymous_visitor_sees_global_flag() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let mut persistence_raw = InMemoryUserPersistence::new();
            persistence_raw.global_ads_removed = true;
            let persistence = RwLock::new(persistence_raw);

            let status = SettingsService {}
                .ads_status(None, &mut ext_cxn, &persistence)
                .await;
            assert_that!(status).is_ok_containing(true);
        }

        #[tokio::test]
        async fn propagates_port_error() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let mut persistence_raw = InMemoryUserPersistence::new();
            persistence_raw.connectivity = Connectivity::Disconnected;
            let persistence = RwLock::new(persistence_raw);

            let status = SettingsService {}
                .ads_status(None, &mut ext_cxn, &persistence)
                .await;
            assert_that!(status).is_err();
        }
    }

    mod remove_ads {
        use super::*;
        use crate::domain::user::driven_ports::UserStore;

        #[tokio::test]
        async fn flips_flag_and_stays_true_on_repeat() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let persistence = InMemoryUserPersistence::new_locked();
            let stored = persistence
                .upsert_from_login(&profile_default(), &mut ext_cxn)
                .await
                .expect("seeding a user should not fail");
            assert!(!stored.ads_removed);

            let service = SettingsService {};
            let first = service
                .remove_ads(&stored.id, &mut ext_cxn, &persistence)
                .await;
            assert_that!(first).is_ok();
            let second = service
                .remove_ads(&stored.id, &mut ext_cxn, &persistence)
                .await;
            assert_that!(second).is_ok();

            let user_after = persistence
                .get_by_id(&stored.id, &mut ext_cxn)
                .await
                .expect("user lookup should not fail");
            assert_that!(user_after)
                .is_some()
                .matches(|user| user.ads_removed);
        }

        #[tokio::test]
        async fn propagates_port_error() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let mut persistence_raw = InMemoryUserPersistence::new();
            persistence_raw.connectivity = Connectivity::Disconnected;
            let persistence = RwLock::new(persistence_raw);

            let remove_result = SettingsService {}
                .remove_ads("user-1", &mut ext_cxn, &persistence)
                .await;
            assert_that!(remove_result).is_err();
        }
    }
}
