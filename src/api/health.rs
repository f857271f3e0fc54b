use crate::api::MgmtState;
use crate::api::schemas::health::HealthResponse;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

/// Liveness probe: returns 200 OK as long as the server is running.
pub async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe: checks the database and the pub/sub connection.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    let (db_res, pubsub_res) = tokio::join!(state.health_service.check_db(), state.health_service.check_pubsub());

    let component_status = |component: &str, result: Result<(), String>| match result {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, component, "Readiness probe failed");
            "error"
        }
    };

    let database = component_status("database", db_res);
    let pubsub = component_status("pubsub", pubsub_res);
    let healthy = database == "ok" && pubsub == "ok";

    let response = HealthResponse {
        status: if healthy { "ok" } else { "error" }.to_string(),
        database: database.to_string(),
        pubsub: pubsub.to_string(),
    };
    let status_code = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (status_code, Json(response))
}
