//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the lesson API, the speech proxy and the OpenAPI documentation.

use crate::{
    handlers::{self, AudioForm, LessonResponse},
    state::AppState,
};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tutor_core::protocol::{
    ErrorBody, LessonPayload, ReplyResponse, StepsResponse, TranscriptResponse, VersionResponse,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Largest accepted audio upload.
const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::version,
        handlers::lesson,
        handlers::speech_to_text,
    ),
    components(
        schemas(LessonPayload, LessonResponse, StepsResponse, ReplyResponse, TranscriptResponse, VersionResponse, ErrorBody, AudioForm)
    ),
    tags(
        (name = "Lesson API", description = "Lesson generation and speech recognition for the tutoring client")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let lesson_router = Router::new()
        .route("/version", get(handlers::version))
        .route("/lesson", post(handlers::lesson));

    let speech_router = Router::new()
        .route("/speech-to-text", post(handlers::speech_to_text))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES));

    // Apply the state ONLY to the API routes.
    let api_router = Router::new()
        .nest("/api/ollama", lesson_router)
        .nest("/api/speech", speech_router)
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
