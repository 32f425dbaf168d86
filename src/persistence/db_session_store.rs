use crate::domain;
use crate::domain::user::AppUser;
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error};
use uuid::Uuid;

pub struct DbSessionStore;

#[derive(sqlx::FromRow)]
struct SessionTokenRow {
    token: Uuid,
}

#[derive(sqlx::FromRow)]
struct SessionUserRow {
    id: String,
    email: String,
    display_name: String,
    picture_url: Option<String>,
    ads_removed: bool,
}

impl domain::auth::driven_ports::SessionStore for DbSessionStore {
    async fn create(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Uuid, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let session: SessionTokenRow = sqlx::query_as(
            "INSERT INTO user_session (token, user_id) VALUES ($1, $2) RETURNING token",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(cxn.borrow_connection())
        .await
        .context("opening a session")?;

        Ok(session.token)
    }

    async fn user_for_token(
        &self,
        token: Uuid,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<AppUser>, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let user: Option<SessionUserRow> = sqlx::query_as(
            "SELECT au.id, au.email, au.display_name, au.picture_url, au.ads_removed \
             FROM user_session us \
             JOIN app_user au ON au.id = us.user_id \
             WHERE us.token = $1",
        )
        .bind(token)
        .fetch_optional(cxn.borrow_connection())
        .await
        .context("resolving a session token")?;

        Ok(user.map(|row| AppUser {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            picture_url: row.picture_url,
            ads_removed: row.ads_removed,
        }))
    }

    async fn delete(&self, token: Uuid, ext_cxn: &mut impl ExternalConnectivity) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        sqlx::query("DELETE FROM user_session WHERE token = $1")
            .bind(token)
            .execute(cxn.borrow_connection())
            .await
            .context("closing a session")?;

        Ok(())
    }
}
