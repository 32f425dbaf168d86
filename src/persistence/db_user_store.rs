use crate::domain;
use crate::domain::user::{AppUser, UpsertUser};
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error};

pub struct DbUserStore;

#[derive(sqlx::FromRow)]
struct AppUserRow {
    id: String,
    email: String,
    display_name: String,
    picture_url: Option<String>,
    ads_removed: bool,
}

impl From<AppUserRow> for AppUser {
    fn from(value: AppUserRow) -> Self {
        AppUser {
            id: value.id,
            email: value.email,
            display_name: value.display_name,
            picture_url: value.picture_url,
            ads_removed: value.ads_removed,
        }
    }
}

impl domain::user::driven_ports::UserStore for DbUserStore {
    async fn upsert_from_login(
        &self,
        profile: &UpsertUser,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<AppUser, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let user: AppUserRow = sqlx::query_as(
            "INSERT INTO app_user (id, email, display_name, picture_url) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET \
               email = EXCLUDED.email, \
               display_name = EXCLUDED.display_name, \
               picture_url = EXCLUDED.picture_url \
             RETURNING id, email, display_name, picture_url, ads_removed",
        )
        .bind(&profile.id)
        .bind(&profile.email)
        .bind(&profile.display_name)
        .bind(&profile.picture_url)
        .fetch_one(cxn.borrow_connection())
        .await
        .context("upserting a user at login")?;

        Ok(user.into())
    }

    async fn get_by_id(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<AppUser>, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let user: Option<AppUserRow> = sqlx::query_as(
            "SELECT au.id, au.email, au.display_name, au.picture_url, au.ads_removed \
             FROM app_user au WHERE au.id = $1",
        )
        .bind(user_id)
        .fetch_optional(cxn.borrow_connection())
        .await
        .context("fetching a user by id")?;

        Ok(user.map(AppUser::from))
    }

    async fn set_ads_removed(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        sqlx::query("UPDATE app_user SET ads_removed = TRUE WHERE id = $1")
            .bind(user_id)
            .execute(cxn.borrow_connection())
            .await
            .context("setting a user's ads_removed flag")?;

        Ok(())
    }
}

pub struct DbSettingsStore;

#[derive(sqlx::FromRow)]
struct SettingValueRow {
    value: bool,
}

impl domain::user::driven_ports::SettingsStore for DbSettingsStore {
    async fn global_ads_removed(
        &self,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let setting: Option<SettingValueRow> =
            sqlx::query_as("SELECT s.value FROM app_settings s WHERE s.key = 'ads_removed'")
                .fetch_optional(cxn.borrow_connection())
                .await
                .context("fetching the global ads flag")?;

        // The row is seeded by the schema migration; treat a missing row the
        // same as the seeded default.
        Ok(setting.map(|row| row.value).unwrap_or(false))
    }
}
