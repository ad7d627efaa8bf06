use crate::{
    model_service::{check_score, InferenceError},
    prediction::PredictionResult,
    preprocessing::{preprocess, PreprocessError},
    server::SharedState,
};
use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::instrument;

pub const FILE_FIELD: &str = "file";

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Invalid multipart request: {0}")]
    Rejected(#[from] MultipartRejection),
    #[error("Failed to read upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("No `file` field in upload")]
    MissingFile,
    #[error("Uploaded file is empty")]
    EmptyFile,
    #[error("{0}")]
    Preprocess(#[from] PreprocessError),
    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),
    #[error("Inference task failed: {0}")]
    Task(#[from] JoinError),
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

// Failures are reported in the body with a 200, which is what existing
// clients of this endpoint expect.
impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        tracing::error!("Prediction error: {}", self);
        (
            StatusCode::OK,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[instrument(skip(state, multipart))]
pub async fn predict(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResult>, PredictError> {
    let image_data = read_file_field(multipart?).await?;
    tracing::debug!("Received upload of {} bytes", image_data.len());

    let input = preprocess(&image_data)?;

    let model_service = state.model_service.clone();
    let score = tokio::task::spawn_blocking(move || model_service.predict(&input)).await??;
    let score = check_score(score)?;

    let result = PredictionResult::from_score(score as f64);
    tracing::info!(
        "Prediction {} (raw={:.4}, confidence={:.4})",
        result.label.as_str(),
        result.raw_prediction,
        result.confidence
    );

    Ok(Json(result))
}

async fn read_file_field(mut multipart: Multipart) -> Result<Bytes, PredictError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            let data = field.bytes().await?;
            if data.is_empty() {
                return Err(PredictError::EmptyFile);
            }
            return Ok(data);
        }
    }

    Err(PredictError::MissingFile)
}
