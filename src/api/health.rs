//! Health check endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use super::ApiState;
use crate::pipeline::{Engine, Pipeline};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub language: &'static str,
    pub checks: ReadinessChecks,
}

/// Individual readiness checks
#[derive(Serialize)]
pub struct ReadinessChecks {
    pub transcriber: CheckResult,
    pub voice_model: CheckResult,
    pub chat: CheckResult,
}

/// Result of a single health check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    const fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            status: "fail",
            message: Some(message.into()),
        }
    }

    fn of<T: ?Sized>(engine: &Engine<T>) -> Self {
        match engine.get() {
            Ok(_) => Self::ok(),
            Err(reason) => Self::fail(reason),
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe - can `/process-audio/` succeed?
///
/// The chat check is informational: without it requests still complete with
/// the apology reply.
async fn ready(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let response = readiness(&state.pipeline);

    let http_status = if response.status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (http_status, Json(response))
}

fn readiness(pipeline: &Pipeline) -> ReadinessResponse {
    let checks = ReadinessChecks {
        transcriber: CheckResult::of(pipeline.transcriber()),
        voice_model: CheckResult::of(pipeline.synthesizer()),
        chat: CheckResult::of(pipeline.chat()),
    };

    let all_ok = checks.transcriber.is_ok() && checks.voice_model.is_ok();

    ReadinessResponse {
        status: if all_ok { "ok" } else { "degraded" },
        language: pipeline.language().code(),
        checks,
    }
}

/// Build health router (liveness only, no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Build readiness router
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ready", get(ready)).with_state(state)
}
