use crate::domain::task::driven_ports::TaskReader;
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use chrono::{DateTime, Utc};

/// An actionable step within a task, optionally evidenced by a photo
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Subtask {
    pub id: i32,
    pub task_id: i32,
    pub title: String,
    pub completed: bool,
    pub photo_url: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct NewSubtask {
    pub title: String,
}

/// A raw image received alongside a completion request
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct PhotoUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// The caller's requested completion state, possibly carrying proof
pub struct CompletionUpdate {
    pub completed: bool,
    pub photo: Option<PhotoUpload>,
}

/// The resolved column changes applied to a subtask row. `photo_url: None`
/// means "leave the stored value untouched", never "clear it" — a photo
/// reference survives un-completion.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct CompletionChange {
    pub completed: bool,
    pub photo_url: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A completed-with-proof subtask annotated for the gallery
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct GalleryPhoto {
    pub subtask: Subtask,
    pub task_title: String,
}

pub mod driven_ports {
    use super::*;
    use thiserror::Error;

    pub trait SubtaskReader: Sync {
        /// Ownership lookup via the subtask's parent task: resolves only when
        /// the subtask exists AND its task belongs to the given user.
        async fn subtask_owned_by(
            &self,
            subtask_id: i32,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<Subtask>, anyhow::Error>;

        /// Every photo-bearing subtask owned (transitively) by the user,
        /// newest completion first.
        async fn photos_for_user(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Vec<GalleryPhoto>, anyhow::Error>;
    }

    pub trait SubtaskWriter: Sync {
        async fn create_subtask(
            &self,
            task_id: i32,
            new_subtask: &NewSubtask,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Subtask, anyhow::Error>;

        async fn apply_completion(
            &self,
            subtask_id: i32,
            change: &CompletionChange,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Subtask, anyhow::Error>;
    }

    #[derive(Debug, Error)]
    pub enum PhotoStoreError {
        #[error("images of type {content_type} are not accepted")]
        UnsupportedType { content_type: String },
        #[error(transparent)]
        StorageFailure(#[from] anyhow::Error),
    }

    /// Content-addressed storage for completion photos
    pub trait PhotoStore: Sync {
        /// Persists the image and returns the public URL it will be served
        /// from.
        async fn store_photo(&self, upload: &PhotoUpload) -> Result<String, PhotoStoreError>;
    }
}

pub mod driving_ports {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum SubtaskError {
        /// The target (task or subtask) does not exist or belongs to somebody
        /// else; the two cases are indistinguishable to callers.
        #[error("the target does not exist or is not owned by the caller")]
        NotOwned,
        #[error("images of type {content_type} are not accepted")]
        UnsupportedPhotoType { content_type: String },
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    impl From<driven_ports::PhotoStoreError> for SubtaskError {
        fn from(value: driven_ports::PhotoStoreError) -> Self {
            match value {
                driven_ports::PhotoStoreError::UnsupportedType { content_type } => {
                    SubtaskError::UnsupportedPhotoType { content_type }
                }
                driven_ports::PhotoStoreError::StorageFailure(err) => {
                    SubtaskError::PortError(err.context("storing a completion photo"))
                }
            }
        }
    }

    pub trait SubtaskPort {
        /// Creates a subtask under a task the user owns
        async fn create_subtask(
            &self,
            user_id: &str,
            task_id: i32,
            new_subtask: &NewSubtask,
            ext_cxn: &mut impl ExternalConnectivity,
            task_read: &impl TaskReader,
            subtask_write: &impl driven_ports::SubtaskWriter,
        ) -> Result<Subtask, SubtaskError>;

        /// Applies a completion toggle, storing the attached photo first when
        /// one is present.
        async fn set_completion(
            &self,
            user_id: &str,
            subtask_id: i32,
            update: CompletionUpdate,
            ext_cxn: &mut impl ExternalConnectivity,
            subtask_read: &impl driven_ports::SubtaskReader,
            subtask_write: &impl driven_ports::SubtaskWriter,
            photo_store: &impl driven_ports::PhotoStore,
        ) -> Result<Subtask, SubtaskError>;

        async fn photos_for_user(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            subtask_read: &impl driven_ports::SubtaskReader,
        ) -> Result<Vec<GalleryPhoto>, anyhow::Error>;
    }
}

pub struct SubtaskService {}

impl driving_ports::SubtaskPort for SubtaskService {
    async fn create_subtask(
        &self,
        user_id: &str,
        task_id: i32,
        new_subtask: &NewSubtask,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl TaskReader,
        subtask_write: &impl driven_ports::SubtaskWriter,
    ) -> Result<Subtask, driving_ports::SubtaskError> {
        let owned_task = task_read
            .task_owned_by(task_id, user_id, &mut *ext_cxn)
            .await
            .context("checking task ownership before adding a subtask")?;
        if owned_task.is_none() {
            return Err(driving_ports::SubtaskError::NotOwned);
        }

        let subtask = subtask_write
            .create_subtask(task_id, new_subtask, &mut *ext_cxn)
            .await
            .context("creating a subtask")?;
        Ok(subtask)
    }

    async fn set_completion(
        &self,
        user_id: &str,
        subtask_id: i32,
        update: CompletionUpdate,
        ext_cxn: &mut impl ExternalConnectivity,
        subtask_read: &impl driven_ports::SubtaskReader,
        subtask_write: &impl driven_ports::SubtaskWriter,
        photo_store: &impl driven_ports::PhotoStore,
    ) -> Result<Subtask, driving_ports::SubtaskError> {
        let owned_subtask = subtask_read
            .subtask_owned_by(subtask_id, user_id, &mut *ext_cxn)
            .await
            .context("checking subtask ownership before completion")?;
        if owned_subtask.is_none() {
            return Err(driving_ports::SubtaskError::NotOwned);
        }

        // The photo file is written before the row update. A crash between
        // the two orphans a file, which is acceptable; the reverse order
        // could leave a row pointing at nothing.
        let change = match update.photo {
            Some(ref photo) => {
                let photo_url = photo_store.store_photo(photo).await?;
                CompletionChange {
                    completed: true,
                    photo_url: Some(photo_url),
                    completed_at: Some(Utc::now()),
                }
            }
            None => CompletionChange {
                completed: update.completed,
                photo_url: None,
                completed_at: update.completed.then(Utc::now),
            },
        };

        let updated = subtask_write
            .apply_completion(subtask_id, &change, &mut *ext_cxn)
            .await
            .context("applying a completion change")?;
        Ok(updated)
    }

    async fn photos_for_user(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        subtask_read: &impl driven_ports::SubtaskReader,
    ) -> Result<Vec<GalleryPhoto>, anyhow::Error> {
        subtask_read
            .photos_for_user(user_id, &mut *ext_cxn)
            .await
            .context("listing a user's completion photos")
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;
    use crate::domain::subtask::driving_ports::{SubtaskError, SubtaskPort};
    use crate::domain::task::test_util::{InMemoryTaskPersistence, NewTaskWithOwner};
    use crate::external_connections;
    use speculoos::prelude::*;
    use std::sync::RwLock;

    fn task_persistence_for_user_a() -> RwLock<InMemoryTaskPersistence> {
        RwLock::new(InMemoryTaskPersistence::new_with_tasks(&[
            NewTaskWithOwner {
                owner: "user-a",
                title: "Get outside more",
            },
            NewTaskWithOwner {
                owner: "user-b",
                title: "Somebody else's goal",
            },
        ]))
    }

    mod create_subtask {
        use super::*;

        #[tokio::test]
        async fn happy_path() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let tasks = task_persistence_for_user_a();
            let subtasks = InMemorySubtaskPersistence::new_locked();

            let created = SubtaskService {}
                .create_subtask(
                    "user-a",
                    1,
                    &NewSubtask {
                        title: "Hike on Saturday".to_owned(),
                    },
                    &mut ext_cxn,
                    &tasks,
                    &subtasks,
                )
                .await;
            assert_that!(created).is_ok().matches(|subtask| {
                subtask.task_id == 1
                    && subtask.title == "Hike on Saturday"
                    && !subtask.completed
                    && subtask.photo_url.is_none()
                    && subtask.completed_at.is_none()
            });
        }

        #[tokio::test]
        async fn rejects_tasks_owned_by_others() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let tasks = task_persistence_for_user_a();
            let subtasks = InMemorySubtaskPersistence::new_locked();

            let created = SubtaskService {}
                .create_subtask(
                    "user-a",
                    2,
                    &NewSubtask {
                        title: "Sneaky".to_owned(),
                    },
                    &mut ext_cxn,
                    &tasks,
                    &subtasks,
                )
                .await;
            let Err(SubtaskError::NotOwned) = created else {
                panic!("Expected an ownership failure, got: {created:#?}");
            };

            let locked_subtasks = subtasks.read().expect("subtask rwlock poisoned");
            assert_that!(locked_subtasks.subtasks).is_empty();
        }
    }

    mod set_completion {
        use super::*;

        #[tokio::test]
        async fn completing_without_photo_sets_timestamp_only() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let subtasks = RwLock::new(InMemorySubtaskPersistence::new_with_subtasks(&[
                SeedSubtask {
                    task_id: 1,
                    owner: "user-a",
                    title: "step1",
                },
            ]));
            let photos = InMemoryPhotoStore::new();

            let updated = SubtaskService {}
                .set_completion(
                    "user-a",
                    1,
                    CompletionUpdate {
                        completed: true,
                        photo: None,
                    },
                    &mut ext_cxn,
                    &subtasks,
                    &subtasks,
                    &photos,
                )
                .await;
            assert_that!(updated).is_ok().matches(|subtask| {
                subtask.completed && subtask.photo_url.is_none() && subtask.completed_at.is_some()
            });
        }

        #[tokio::test]
        async fn completing_with_photo_records_url_and_timestamp() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let subtasks = RwLock::new(InMemorySubtaskPersistence::new_with_subtasks(&[
                SeedSubtask {
                    task_id: 1,
                    owner: "user-a",
                    title: "step1",
                },
            ]));
            let photos = InMemoryPhotoStore::new();

            let updated = SubtaskService {}
                .set_completion(
                    "user-a",
                    1,
                    CompletionUpdate {
                        // Attaching proof forces completion regardless of the flag
                        completed: false,
                        photo: Some(PhotoUpload {
                            content_type: "image/jpeg".to_owned(),
                            bytes: vec![0xFF, 0xD8, 0xFF],
                        }),
                    },
                    &mut ext_cxn,
                    &subtasks,
                    &subtasks,
                    &photos,
                )
                .await;
            assert_that!(updated).is_ok().matches(|subtask| {
                subtask.completed
                    && subtask.photo_url.as_deref() == Some("/uploads/photo-1.jpeg")
                    && subtask.completed_at.is_some()
            });
        }

        #[tokio::test]
        async fn uncompleting_clears_timestamp_but_keeps_photo() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let subtasks = RwLock::new(InMemorySubtaskPersistence::new_with_subtasks(&[
                SeedSubtask {
                    task_id: 1,
                    owner: "user-a",
                    title: "step1",
                },
            ]));
            let photos = InMemoryPhotoStore::new();
            let service = SubtaskService {};

            service
                .set_completion(
                    "user-a",
                    1,
                    CompletionUpdate {
                        completed: true,
                        photo: Some(PhotoUpload {
                            content_type: "image/png".to_owned(),
                            bytes: vec![0x89, 0x50],
                        }),
                    },
                    &mut ext_cxn,
                    &subtasks,
                    &subtasks,
                    &photos,
                )
                .await
                .expect("completion with photo should succeed");

            let toggled_off = service
                .set_completion(
                    "user-a",
                    1,
                    CompletionUpdate {
                        completed: false,
                        photo: None,
                    },
                    &mut ext_cxn,
                    &subtasks,
                    &subtasks,
                    &photos,
                )
                .await;
            assert_that!(toggled_off).is_ok().matches(|subtask| {
                !subtask.completed
                    && subtask.completed_at.is_none()
                    && subtask.photo_url.as_deref() == Some("/uploads/photo-1.png")
            });
        }

        #[tokio::test]
        async fn rejects_subtasks_owned_by_others() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let subtasks = RwLock::new(InMemorySubtaskPersistence::new_with_subtasks(&[
                SeedSubtask {
                    task_id: 2,
                    owner: "user-b",
                    title: "step1",
                },
            ]));
            let photos = InMemoryPhotoStore::new();

            let updated = SubtaskService {}
                .set_completion(
                    "user-a",
                    1,
                    CompletionUpdate {
                        completed: true,
                        photo: None,
                    },
                    &mut ext_cxn,
                    &subtasks,
                    &subtasks,
                    &photos,
                )
                .await;
            let Err(SubtaskError::NotOwned) = updated else {
                panic!("Expected an ownership failure, got: {updated:#?}");
            };
        }

        #[tokio::test]
        async fn unsupported_image_type_is_rejected_before_any_write() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let subtasks = RwLock::new(InMemorySubtaskPersistence::new_with_subtasks(&[
                SeedSubtask {
                    task_id: 1,
                    owner: "user-a",
                    title: "step1",
                },
            ]));
            let photos = InMemoryPhotoStore::new();

            let updated = SubtaskService {}
                .set_completion(
                    "user-a",
                    1,
                    CompletionUpdate {
                        completed: true,
                        photo: Some(PhotoUpload {
                            content_type: "application/pdf".to_owned(),
                            bytes: vec![0x25, 0x50],
                        }),
                    },
                    &mut ext_cxn,
                    &subtasks,
                    &subtasks,
                    &photos,
                )
                .await;
            let Err(SubtaskError::UnsupportedPhotoType { ref content_type }) = updated else {
                panic!("Expected a content type rejection, got: {updated:#?}");
            };
            assert_eq!("application/pdf", content_type);

            let locked_subtasks = subtasks.read().expect("subtask rwlock poisoned");
            assert!(!locked_subtasks.subtasks[0].subtask.completed);
        }
    }

    mod photos_for_user {
        use super::*;

        #[tokio::test]
        async fn only_photo_bearing_subtasks_appear() {
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let subtasks = RwLock::new(InMemorySubtaskPersistence::new_with_subtasks(&[
                SeedSubtask {
                    task_id: 1,
                    owner: "user-a",
                    title: "with photo",
                },
                SeedSubtask {
                    task_id: 1,
                    owner: "user-a",
                    title: "no photo",
                },
            ]));
            {
                let mut locked = subtasks.write().expect("subtask rwlock poisoned");
                locked.subtasks[0].subtask.completed = true;
                locked.subtasks[0].subtask.photo_url = Some("/uploads/proof.jpeg".to_owned());
                locked.subtasks[0].subtask.completed_at = Some(Utc::now());
            }

            let gallery = SubtaskService {}
                .photos_for_user("user-a", &mut ext_cxn, &subtasks)
                .await;
            assert_that!(gallery).is_ok().matches(|photos| {
                matches!(photos.as_slice(), [GalleryPhoto { subtask, task_title }]
                    if subtask.title == "with photo" && task_title == "Task 1")
            });
        }
    }
}
