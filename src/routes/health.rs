use axum::{response::IntoResponse, response::Json};
use serde::{Deserialize, Serialize};

pub const SERVICE_MESSAGE: &str = "Tuberculosis Detection API is running";

#[derive(Serialize, Deserialize)]
pub struct ServiceMessage {
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
}

pub async fn root() -> impl IntoResponse {
    Json(ServiceMessage {
        message: SERVICE_MESSAGE.into(),
    })
}

// The server only binds once the model is loaded, so this is a liveness
// answer and never re-checks the model.
pub async fn healthcheck() -> impl IntoResponse {
    Json(HealthStatus {
        status: "healthy".into(),
        model_loaded: true,
    })
}
