//! Wire contract of the lesson backend.
//!
//! A single endpoint is multiplexed by a `mode` field. Requests arrive as a
//! loosely-typed [`LessonPayload`] and are validated into a [`LessonRequest`];
//! the client serializes [`LessonRequest`] directly, which produces the same
//! JSON shape.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Multipart field name of the uploaded audio clip.
pub const TRANSCRIPTION_FIELD: &str = "audio";
/// File name the client attaches to every uploaded clip.
pub const TRANSCRIPTION_FILE_NAME: &str = "speech.m4a";
/// Content type of the uploaded clip.
pub const TRANSCRIPTION_MIME_TYPE: &str = "audio/m4a";

/// A validated lesson request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum LessonRequest {
    /// Generate the ordered step titles for a topic.
    Start { topic: String },
    /// Generate the narration for one step.
    Teach { topic: String, step: String },
    /// Answer a learner's question about the current step.
    Doubt {
        topic: String,
        #[serde(rename = "currentStep")]
        current_step: String,
        question: String,
    },
}

impl LessonRequest {
    pub fn topic(&self) -> &str {
        match self {
            LessonRequest::Start { topic }
            | LessonRequest::Teach { topic, .. }
            | LessonRequest::Doubt { topic, .. } => topic,
        }
    }

    /// The value of the `mode` discriminator.
    pub fn mode(&self) -> &'static str {
        match self {
            LessonRequest::Start { .. } => "start",
            LessonRequest::Teach { .. } => "teach",
            LessonRequest::Doubt { .. } => "doubt",
        }
    }
}

/// The raw body of a lesson request, before validation.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonPayload {
    #[schema(example = "start")]
    pub mode: Option<String>,
    #[schema(example = "Deadlock in Operating Systems")]
    pub topic: Option<String>,
    pub step: Option<String>,
    pub current_step: Option<String>,
    pub question: Option<String>,
}

/// Why a [`LessonPayload`] was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("mode and topic required")]
    MissingModeOrTopic,
    #[error("step required")]
    MissingStep,
    #[error("question and currentStep required")]
    MissingDoubtFields,
    #[error("Invalid mode")]
    InvalidMode(String),
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<LessonPayload> for LessonRequest {
    type Error = PayloadError;

    fn try_from(payload: LessonPayload) -> Result<Self, Self::Error> {
        let (Some(mode), Some(topic)) = (present(payload.mode), present(payload.topic)) else {
            return Err(PayloadError::MissingModeOrTopic);
        };

        match mode.as_str() {
            "start" => Ok(LessonRequest::Start { topic }),
            "teach" => {
                let step = present(payload.step).ok_or(PayloadError::MissingStep)?;
                Ok(LessonRequest::Teach { topic, step })
            }
            "doubt" => match (present(payload.question), present(payload.current_step)) {
                (Some(question), Some(current_step)) => Ok(LessonRequest::Doubt {
                    topic,
                    current_step,
                    question,
                }),
                _ => Err(PayloadError::MissingDoubtFields),
            },
            _ => Err(PayloadError::InvalidMode(mode)),
        }
    }
}

/// Response to `mode: "start"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StepsResponse {
    pub steps: Vec<String>,
    /// Set when the generator's own output was unusable and the deterministic
    /// curriculum was substituted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

/// Response to `mode: "teach"` and `mode: "doubt"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReplyResponse {
    pub reply: String,
}

/// Response of the transcription endpoint. A missing `text` is an empty
/// transcript, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TranscriptResponse {
    #[serde(default)]
    pub text: Option<String>,
}

impl TranscriptResponse {
    pub fn into_text(self) -> String {
        self.text.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VersionResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> LessonPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn doubt_request_uses_camel_case_current_step() {
        let request = LessonRequest::Doubt {
            topic: "Deadlock".into(),
            current_step: "Working of Deadlock".into(),
            question: "why does it happen".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["mode"], "doubt");
        assert_eq!(json["currentStep"], "Working of Deadlock");
        assert_eq!(json["question"], "why does it happen");
    }

    #[test]
    fn start_request_carries_only_mode_and_topic() {
        let json = serde_json::to_string(&LessonRequest::Start {
            topic: "Rust".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"mode":"start","topic":"Rust"}"#);
    }

    #[test]
    fn client_requests_validate_on_the_server_side() {
        let request = LessonRequest::Teach {
            topic: "Rust".into(),
            step: "Ownership".into(),
        };
        let wire = serde_json::to_string(&request).unwrap();
        let parsed = LessonRequest::try_from(payload(&wire)).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn missing_topic_is_rejected() {
        let err = LessonRequest::try_from(payload(r#"{"mode":"start"}"#)).unwrap_err();
        assert_eq!(err, PayloadError::MissingModeOrTopic);
        assert_eq!(err.to_string(), "mode and topic required");
    }

    #[test]
    fn blank_topic_counts_as_missing() {
        let err =
            LessonRequest::try_from(payload(r#"{"mode":"start","topic":"  "}"#)).unwrap_err();
        assert_eq!(err, PayloadError::MissingModeOrTopic);
    }

    #[test]
    fn teach_without_step_is_rejected() {
        let err = LessonRequest::try_from(payload(r#"{"mode":"teach","topic":"Rust"}"#))
            .unwrap_err();
        assert_eq!(err.to_string(), "step required");
    }

    #[test]
    fn doubt_requires_question_and_current_step() {
        let err = LessonRequest::try_from(payload(
            r#"{"mode":"doubt","topic":"Rust","question":"why?"}"#,
        ))
        .unwrap_err();
        assert_eq!(err, PayloadError::MissingDoubtFields);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = LessonRequest::try_from(payload(r#"{"mode":"quiz","topic":"Rust"}"#))
            .unwrap_err();
        assert_eq!(err, PayloadError::InvalidMode("quiz".into()));
        assert_eq!(err.to_string(), "Invalid mode");
    }

    #[test]
    fn fallback_flag_is_omitted_when_false() {
        let body = StepsResponse {
            steps: vec!["a".into()],
            fallback: false,
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"steps":["a"]}"#);

        let parsed: StepsResponse =
            serde_json::from_str(r#"{"steps":["a","b"],"fallback":true}"#).unwrap();
        assert!(parsed.fallback);
    }

    #[test]
    fn transcript_without_text_is_empty() {
        let parsed: TranscriptResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.into_text(), "");
    }
}
