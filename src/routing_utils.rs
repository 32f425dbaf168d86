use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_macros::FromRequest;

use serde::Serialize;
use tracing::error;
use utoipa::openapi::{RefOr, Schema};
use utoipa::{openapi, ToResponse, ToSchema};

use validator::ValidationErrors;

/// Contains diagnostic information about an API failure
#[derive(Serialize, Debug, ToResponse)]
#[response(examples(
    ("No Session" = (
        summary = "The caller has no active session (401)",
        value = json!({
            "error_code": "no_session",
            "error_description": "You must be logged in to do that.",
            "extra_info": null
        })
    )),

    ("Forbidden" = (
        summary = "The resource is missing or owned by somebody else (403)",
        value = json!({
            "error_code": "forbidden",
            "error_description": "The requested item does not exist or does not belong to you.",
            "extra_info": null
        })
    )),

    ("Internal Failure" = (
        summary = "Something unexpected went wrong inside the server (500)",
        value = json!({
            "error_code": "internal_error",
            "error_description": "Could not access data to complete your request",
            "extra_info": null
        })
    )),

    ("Invalid Input" = (
        summary = "Invalid request body was passed (400)",
        value = json!({
            "error_code": "invalid_input",
            "error_description": "Submitted data was invalid.",
            "extra_info": {
                "title": [
                    {
                        "code": "length",
                        "message": null,
                        "params": {
                            "value": "",
                            "min": 1
                        }
                    }
                ]
            }
        })
    ))
))]
pub struct BasicErrorResponse {
    pub error_code: String,
    pub error_description: String,
    pub extra_info: Option<ExtraInfo>,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(untagged)]
pub enum ExtraInfo {
    ValidationIssues(ValidationErrorSchema),
    Message(String),
}

/// Stand-in OpenAPI schema for [ValidationErrors] which just provides an empty object
#[derive(Serialize, Debug)]
#[serde(transparent)]
pub struct ValidationErrorSchema(pub ValidationErrors);

impl<'schem> ToSchema<'schem> for ValidationErrorSchema {
    fn schema() -> (&'schem str, RefOr<Schema>) {
        (
            "ValidationErrorSchema",
            openapi::ObjectBuilder::new().into(),
        )
    }
}

/// Response type for endpoints which require a session when the caller does
/// not have one (401)
pub struct NoSessionResponse;

impl IntoResponse for NoSessionResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(BasicErrorResponse {
                error_code: "no_session".into(),
                error_description: "You must be logged in to do that.".into(),
                extra_info: None,
            }),
        )
            .into_response()
    }
}

/// Response type for ownership failures (403). Missing resources produce the
/// same response so callers cannot probe for other users' data.
pub struct NotOwnedResponse;

impl IntoResponse for NotOwnedResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::FORBIDDEN,
            Json(BasicErrorResponse {
                error_code: "forbidden".into(),
                error_description:
                    "The requested item does not exist or does not belong to you.".into(),
                extra_info: None,
            }),
        )
            .into_response()
    }
}

/// Response type for uploads with a content type outside the image
/// allowlist (415)
pub struct UnsupportedImageResponse {
    pub content_type: String,
}

impl IntoResponse for UnsupportedImageResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Json(BasicErrorResponse {
                error_code: "unsupported_media_type".into(),
                error_description: "Completion photos must be JPEG, PNG, GIF, or WebP images."
                    .into(),
                extra_info: Some(ExtraInfo::Message(format!(
                    "received content type: {}",
                    self.content_type
                ))),
            }),
        )
            .into_response()
    }
}

/// Response type that logs an unexpected error chain and reports a generic
/// failure to the caller (500)
pub struct GenericErrorResponse(pub anyhow::Error);

impl IntoResponse for GenericErrorResponse {
    fn into_response(self) -> Response {
        error!("Unexpected failure while serving a request: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(BasicErrorResponse {
                error_code: "internal_error".into(),
                error_description: "Could not access data to complete your request".into(),
                extra_info: None,
            }),
        )
            .into_response()
    }
}

/// Response type that wraps validation errors and turns them into [BasicErrorResponse]s
pub struct ValidationErrorResponse(ValidationErrors);

impl IntoResponse for ValidationErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(BasicErrorResponse {
                error_code: "invalid_input".into(),
                error_description: "Submitted data was invalid.".to_owned(),
                extra_info: Some(ExtraInfo::ValidationIssues(ValidationErrorSchema(self.0))),
            }),
        )
            .into_response()
    }
}

impl From<ValidationErrors> for ValidationErrorResponse {
    fn from(value: ValidationErrors) -> Self {
        Self(value)
    }
}

/// Wrapper for [axum::Json] which customizes the error response to use our
/// data structure for API errors
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(JsonErrorResponse))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Response type representing JSON parse errors
pub struct JsonErrorResponse {
    parse_problem: String,
}

impl From<JsonRejection> for JsonErrorResponse {
    fn from(value: JsonRejection) -> Self {
        JsonErrorResponse {
            parse_problem: value.body_text(),
        }
    }
}

impl IntoResponse for JsonErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            axum::Json(BasicErrorResponse {
                error_code: "invalid_json".into(),
                error_description:
                    "The passed request body contained malformed or unreadable JSON.".into(),
                extra_info: Some(ExtraInfo::Message(self.parse_problem)),
            }),
        )
            .into_response()
    }
}

/// Response type representing unreadable multipart bodies
pub struct MultipartErrorResponse {
    parse_problem: String,
}

impl MultipartErrorResponse {
    /// Builds a multipart error for a body that parsed but did not carry the
    /// fields the endpoint needs
    pub fn message(problem: impl Into<String>) -> Self {
        MultipartErrorResponse {
            parse_problem: problem.into(),
        }
    }
}

impl From<MultipartError> for MultipartErrorResponse {
    fn from(value: MultipartError) -> Self {
        MultipartErrorResponse {
            parse_problem: value.body_text(),
        }
    }
}

impl IntoResponse for MultipartErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            axum::Json(BasicErrorResponse {
                error_code: "invalid_multipart".into(),
                error_description:
                    "The passed request body contained a malformed multipart form.".into(),
                extra_info: Some(ExtraInfo::Message(self.parse_problem)),
            }),
        )
            .into_response()
    }
}
