//! `POST /process-audio/`: one full voice round trip

use std::sync::Arc;

use axum::{
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use super::ApiState;
use crate::pipeline::{Fatal, ProcessingResult};

/// Multipart field carrying the recording
pub const AUDIO_FIELD: &str = "audio_file";

/// Build the audio processing router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/process-audio/", post(process_audio))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .with_state(state)
}

/// Transcribe, answer and synthesize one uploaded clip
async fn process_audio(
    State(state): State<Arc<ApiState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessingResult>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("process_audio", %request_id);

    handle(&state, multipart).instrument(span).await.map(Json)
}

async fn handle(
    state: &ApiState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ProcessingResult, ApiError> {
    // Engine checks come first so a broken deployment never reads the body
    state.pipeline.preflight()?;

    let audio = read_audio(multipart.map_err(ApiError::rejected)?).await?;
    tracing::info!(bytes = audio.len(), "audio received");

    Ok(state.pipeline.process(&audio).await?)
}

/// Bytes of the `audio_file` field, or of the first file field otherwise
async fn read_audio(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    let mut fallback = None;

    while let Some(field) = multipart.next_field().await.map_err(ApiError::upload)? {
        let named = field.name() == Some(AUDIO_FIELD);
        let is_file = field.file_name().is_some();
        if !named && (!is_file || fallback.is_some()) {
            continue;
        }

        let bytes = field.bytes().await.map_err(ApiError::upload)?;
        if named {
            return Ok(bytes.to_vec());
        }
        fallback = Some(bytes.to_vec());
    }

    fallback.ok_or(ApiError::MissingAudio)
}

/// Audio endpoint errors
#[derive(Debug)]
pub enum ApiError {
    /// A request-fatal pipeline failure
    Fatal(Fatal),
    /// No audio field in the form
    MissingAudio,
    /// The body exceeded the configured limit
    TooLarge(String),
    /// The request is not a readable multipart form
    BadRequest(StatusCode, String),
}

impl ApiError {
    fn rejected(rejection: MultipartRejection) -> Self {
        Self::BadRequest(rejection.status(), rejection.body_text())
    }

    fn upload(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::TooLarge(err.body_text())
        } else {
            Self::Fatal(Fatal::AudioSave(err.body_text()))
        }
    }
}

impl From<Fatal> for ApiError {
    fn from(fatal: Fatal) -> Self {
        Self::Fatal(fatal)
    }
}

/// Error body shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Fatal(fatal) => {
                tracing::error!(error = %fatal, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, fatal.to_string())
            }
            Self::MissingAudio => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("missing multipart field `{AUDIO_FIELD}`"),
            ),
            Self::TooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            Self::BadRequest(status, msg) => (status, msg),
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}
