use axum::body;
use axum::response::Response;
use serde::de::DeserializeOwned;

/// Used in tests to both extract the raw bytes from the HTTP response body and then deserialize them into the
/// requested type. Will panic and fail the test if either step fails somehow.
pub async fn deserialize_body<T: DeserializeOwned>(response_body: body::Body) -> T {
    let bytes = body::to_bytes(response_body, usize::MAX)
        .await
        .expect("Could not read data from response body!");

    serde_json::from_slice(&bytes).unwrap_or_else(|err| {
        panic!(
            "Could not parse body content into data structure! Error: {}, Received body: {:?}",
            err, bytes
        )
    })
}

/// Extracts the `error_code` field from an error response produced by
/// [crate::routing_utils::BasicErrorResponse]
pub async fn error_code_of(response: Response) -> String {
    let body_json: serde_json::Value = deserialize_body(response.into_body()).await;
    body_json["error_code"]
        .as_str()
        .unwrap_or_else(|| panic!("The response body had no error_code: {body_json}"))
        .to_owned()
}
