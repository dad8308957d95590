//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling lesson generation and speech
//! recognition requests. It uses `utoipa` doc comments to generate OpenAPI
//! documentation.

use axum::{
    extract::{Multipart, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use tutor_core::protocol::{
    ErrorBody, LessonPayload, LessonRequest, PayloadError, ReplyResponse, StepsResponse,
    TRANSCRIPTION_FIELD, TranscriptResponse, VersionResponse,
};
use utoipa::ToSchema;

use crate::{speech::AudioUpload, state::AppState};

pub const VERSION_MESSAGE: &str = "Ollama Lesson API running";
const LESSON_FAILED: &str = "Ollama lesson failed";
const RECOGNITION_FAILED: &str = "Speech recognition failed";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// The message is shown to the client; the error is only logged.
    InternalServerError(&'static str, anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(error) => {
                (StatusCode::BAD_REQUEST, Json(ErrorBody { error })).into_response()
            }
            ApiError::InternalServerError(message, err) => {
                error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: message.to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl From<PayloadError> for ApiError {
    fn from(err: PayloadError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

fn lesson_failed(err: anyhow::Error) -> ApiError {
    ApiError::InternalServerError(LESSON_FAILED, err)
}

/// Body of a successful lesson request: steps for `start`, a reply for
/// `teach` and `doubt`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum LessonResponse {
    Steps(StepsResponse),
    Reply(ReplyResponse),
}

/// Multipart body of a transcription request.
#[derive(ToSchema)]
pub struct AudioForm {
    #[schema(value_type = String, format = Binary)]
    pub audio: Vec<u8>,
}

/// Report that the lesson API is up.
#[utoipa::path(
    get,
    path = "/api/ollama/version",
    responses(
        (status = 200, description = "Service is running", body = VersionResponse)
    )
)]
pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        message: VERSION_MESSAGE.to_string(),
    })
}

/// Generate lesson content. The `mode` field selects step generation
/// (`start`), step narration (`teach`) or a doubt answer (`doubt`).
#[utoipa::path(
    post,
    path = "/api/ollama/lesson",
    request_body = LessonPayload,
    responses(
        (status = 200, description = "Generated lesson content", body = LessonResponse),
        (status = 400, description = "Missing fields or unknown mode", body = ErrorBody),
        (status = 500, description = "Generation failed", body = ErrorBody)
    )
)]
pub async fn lesson(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LessonPayload>, JsonRejection>,
) -> Result<Json<LessonResponse>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let request = LessonRequest::try_from(payload)?;
    info!(mode = request.mode(), topic = request.topic(), "Lesson request");

    let response = match request {
        LessonRequest::Start { topic } => {
            let plan = state
                .planner
                .plan_steps(&topic)
                .await
                .map_err(lesson_failed)?;
            if plan.fallback {
                warn!(%topic, "Serving fallback curriculum");
            }
            LessonResponse::Steps(StepsResponse {
                steps: plan.steps,
                fallback: plan.fallback,
            })
        }
        LessonRequest::Teach { topic, step } => {
            let reply = state
                .planner
                .teach_step(&topic, &step)
                .await
                .map_err(lesson_failed)?;
            LessonResponse::Reply(ReplyResponse {
                reply: reply.trim().to_string(),
            })
        }
        LessonRequest::Doubt {
            topic,
            current_step,
            question,
        } => {
            let reply = state
                .planner
                .answer_doubt(&topic, &current_step, &question)
                .await
                .map_err(lesson_failed)?;
            LessonResponse::Reply(ReplyResponse {
                reply: reply.trim().to_string(),
            })
        }
    };

    Ok(Json(response))
}

/// Transcribe a recorded clip, uploaded as multipart field `audio`.
#[utoipa::path(
    post,
    path = "/api/speech/speech-to-text",
    request_body(content = AudioForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Transcribed text", body = TranscriptResponse),
        (status = 400, description = "No audio file received", body = ErrorBody),
        (status = 500, description = "Speech recognition failed", body = ErrorBody)
    )
)]
pub async fn speech_to_text(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let mut upload = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some(TRANSCRIPTION_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("speech.m4a").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| {
            warn!(error = %e, "Failed to read audio upload");
            ApiError::BadRequest("No audio file received".to_string())
        })?;
        upload = Some(AudioUpload {
            data: data.to_vec(),
            file_name,
            content_type,
        });
        break;
    }

    let upload = upload
        .filter(|upload| !upload.data.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No audio file received".to_string()))?;

    let text = state
        .recognizer
        .recognize(upload)
        .await
        .map_err(|err| ApiError::InternalServerError(RECOGNITION_FAILED, err))?;
    Ok(Json(TranscriptResponse { text: Some(text) }))
}
