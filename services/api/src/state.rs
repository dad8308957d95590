//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared service
//! clients every handler needs.

use crate::speech::SpeechRecognizer;
use std::sync::Arc;
use tutor_core::curriculum::LessonPlanner;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub planner: Arc<dyn LessonPlanner>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
}
