use axum::{http::header, response::IntoResponse};
use std::sync::LazyLock;

const OPENAPI_TEMPLATE: &str = include_str!("../../openapi.yaml");

static OPENAPI_DOCUMENT: LazyLock<String> = LazyLock::new(|| {
    OPENAPI_TEMPLATE.replacen("version: 0.0.0", concat!("version: ", env!("CARGO_PKG_VERSION")), 1)
});

/// Serves the `OpenAPI` description of the chat API, stamped with the running version.
pub async fn openapi_yaml() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/yaml")], OPENAPI_DOCUMENT.as_str())
}
