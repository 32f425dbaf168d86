use crate::domain;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// DTO carrying the identity provider's authorization URL
#[derive(Serialize, Deserialize, ToSchema)]
#[cfg_attr(test, derive(Debug))]
pub struct AuthorizeUrl {
    #[schema(example = "https://accounts.google.com/o/oauth2/v2/auth?client_id=...")]
    pub url: String,
}

/// DTO for the user behind the current session
#[derive(Serialize, Deserialize, Display, ToSchema)]
#[display("{display_name} <{email}>")]
#[cfg_attr(test, derive(PartialEq, Eq, Debug))]
pub struct CurrentUser {
    #[schema(example = "108296714927451")]
    pub id: String,
    #[schema(example = "person@example.com")]
    pub email: String,
    #[schema(example = "Jamie Doe")]
    pub display_name: String,
    #[schema(example = "https://lh3.googleusercontent.com/a/photo")]
    pub picture_url: Option<String>,
    pub ads_removed: bool,
}

impl From<domain::user::AppUser> for CurrentUser {
    fn from(value: domain::user::AppUser) -> Self {
        CurrentUser {
            id: value.id,
            email: value.email,
            display_name: value.display_name,
            picture_url: value.picture_url,
            ads_removed: value.ads_removed,
        }
    }
}
