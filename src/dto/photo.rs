use crate::domain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// DTO for one gallery entry: a photo-bearing subtask plus the title of the
/// task it belongs to
#[derive(Serialize, Deserialize, ToSchema)]
#[cfg_attr(test, derive(PartialEq, Eq, Debug))]
pub struct GalleryPhoto {
    #[schema(example = 15)]
    pub subtask_id: i32,
    #[schema(example = "Run 3 times this week")]
    pub subtask_title: String,
    #[schema(example = "Run a 10k")]
    pub task_title: String,
    #[schema(example = "/uploads/1717171717000-0a1b2c3d.jpeg")]
    pub photo_url: String,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<domain::subtask::GalleryPhoto> for GalleryPhoto {
    fn from(value: domain::subtask::GalleryPhoto) -> Self {
        GalleryPhoto {
            subtask_id: value.subtask.id,
            subtask_title: value.subtask.title,
            task_title: value.task_title,
            // The gallery query filters on a stored photo, so the URL is
            // always present by the time a row reaches this conversion
            photo_url: value.subtask.photo_url.unwrap_or_default(),
            completed_at: value.subtask.completed_at,
        }
    }
}
