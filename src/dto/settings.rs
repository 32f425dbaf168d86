use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// DTO reporting whether ads are removed for the caller
#[derive(Serialize, Deserialize, ToSchema)]
#[cfg_attr(test, derive(PartialEq, Eq, Debug))]
pub struct AdsStatus {
    pub ads_removed: bool,
}
