use crate::session::LessonMode;

/// Every failure the lesson engine can report.
///
/// Collaborator failures (`Network`, `MalformedResponse`, `Device`, `Speech`)
/// are recovered inside the engine and only ever surface as inline text.
/// The remaining variants are returned to the view layer when it invokes an
/// operation the current state does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LessonError {
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("doubt text is empty")]
    EmptyInput,
    #[error("a recording is already in progress")]
    AlreadyRecording,
    #[error("no recording is in progress")]
    NotRecording,
    #[error("topic is empty")]
    EmptyTopic,
    #[error("`{operation}` is not allowed while {mode:?}")]
    InvalidOperation {
        operation: &'static str,
        mode: LessonMode,
    },
    #[error("a request is still in flight")]
    Busy,
    #[error("the lesson session has been closed")]
    SessionClosed,
    #[error("audio device error: {0}")]
    Device(String),
    #[error("speech output error: {0}")]
    Speech(String),
}

impl LessonError {
    pub(crate) fn invalid(operation: &'static str, mode: LessonMode) -> Self {
        Self::InvalidOperation { operation, mode }
    }
}

impl From<reqwest::Error> for LessonError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}
