use crate::domain;
use crate::domain::subtask::{CompletionChange, GalleryPhoto, NewSubtask, Subtask};
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error};
use chrono::{DateTime, Utc};

pub struct DbSubtaskReader;

#[derive(sqlx::FromRow)]
struct SubtaskRow {
    id: i32,
    task_id: i32,
    title: String,
    completed: bool,
    photo_url: Option<String>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<SubtaskRow> for Subtask {
    fn from(value: SubtaskRow) -> Self {
        Subtask {
            id: value.id,
            task_id: value.task_id,
            title: value.title,
            completed: value.completed,
            photo_url: value.photo_url,
            completed_at: value.completed_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct GalleryPhotoRow {
    id: i32,
    task_id: i32,
    title: String,
    completed: bool,
    photo_url: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    task_title: String,
}

impl From<GalleryPhotoRow> for GalleryPhoto {
    fn from(value: GalleryPhotoRow) -> Self {
        GalleryPhoto {
            subtask: Subtask {
                id: value.id,
                task_id: value.task_id,
                title: value.title,
                completed: value.completed,
                photo_url: value.photo_url,
                completed_at: value.completed_at,
            },
            task_title: value.task_title,
        }
    }
}

impl domain::subtask::driven_ports::SubtaskReader for DbSubtaskReader {
    async fn subtask_owned_by(
        &self,
        subtask_id: i32,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<Subtask>, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        // Ownership is re-derived from the session user through the parent
        // task; the client-supplied subtask id is never trusted on its own
        let subtask: Option<SubtaskRow> = sqlx::query_as(
            "SELECT st.id, st.task_id, st.title, st.completed, st.photo_url, st.completed_at \
             FROM subtask st \
             JOIN task t ON t.id = st.task_id \
             WHERE st.id = $1 AND t.user_id = $2",
        )
        .bind(subtask_id)
        .bind(user_id)
        .fetch_optional(cxn.borrow_connection())
        .await
        .context("checking subtask ownership")?;

        Ok(subtask.map(Subtask::from))
    }

    async fn photos_for_user(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Vec<GalleryPhoto>, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let photos: Vec<GalleryPhotoRow> = sqlx::query_as(
            "SELECT st.id, st.task_id, st.title, st.completed, st.photo_url, st.completed_at, \
                    t.title AS task_title \
             FROM subtask st \
             JOIN task t ON t.id = st.task_id \
             WHERE t.user_id = $1 AND st.photo_url IS NOT NULL \
             ORDER BY st.completed_at DESC NULLS LAST",
        )
        .bind(user_id)
        .fetch_all(cxn.borrow_connection())
        .await
        .context("fetching a user's completion photos")?;

        Ok(photos.into_iter().map(GalleryPhoto::from).collect())
    }
}

pub struct DbSubtaskWriter;

impl domain::subtask::driven_ports::SubtaskWriter for DbSubtaskWriter {
    async fn create_subtask(
        &self,
        task_id: i32,
        new_subtask: &NewSubtask,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Subtask, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let subtask: SubtaskRow = sqlx::query_as(
            "INSERT INTO subtask (task_id, title) VALUES ($1, $2) \
             RETURNING id, task_id, title, completed, photo_url, completed_at",
        )
        .bind(task_id)
        .bind(&new_subtask.title)
        .fetch_one(cxn.borrow_connection())
        .await
        .context("inserting a new subtask")?;

        Ok(subtask.into())
    }

    async fn apply_completion(
        &self,
        subtask_id: i32,
        change: &CompletionChange,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Subtask, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        // COALESCE keeps the stored photo when the change does not carry one,
        // so toggling a subtask back off never drops its proof
        let subtask: SubtaskRow = sqlx::query_as(
            "UPDATE subtask SET \
               completed = $2, \
               photo_url = COALESCE($3, photo_url), \
               completed_at = $4 \
             WHERE id = $1 \
             RETURNING id, task_id, title, completed, photo_url, completed_at",
        )
        .bind(subtask_id)
        .bind(change.completed)
        .bind(&change.photo_url)
        .bind(change.completed_at)
        .fetch_one(cxn.borrow_connection())
        .await
        .context("updating a subtask's completion state")?;

        Ok(subtask.into())
    }
}
