use utoipa::OpenApi;

pub mod auth;
pub mod photo;
pub mod settings;
pub mod task;

/// Collects the OpenAPI schemas for every DTO in this package so the swagger
/// endpoint can merge them in one call
#[derive(OpenApi)]
#[openapi(components(schemas(
    auth::AuthorizeUrl,
    auth::CurrentUser,
    settings::AdsStatus,
    task::NewTask,
    task::NewSubtask,
    task::Subtask,
    task::TaskWithSubtasks,
    photo::GalleryPhoto,
)))]
pub struct OpenApiSchemas;
