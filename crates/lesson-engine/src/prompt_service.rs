//! Client side of the lesson backend.

use crate::error::LessonError;
use crate::machine::Reply;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;
use tutor_core::curriculum::StepPlan;
use tutor_core::protocol::{ErrorBody, LessonRequest, ReplyResponse, StepsResponse};

/// Generates lesson content: step titles, step narration and doubt answers.
#[async_trait]
pub trait PromptService: Send + Sync {
    async fn start(&self, topic: &str) -> Result<StepPlan, LessonError>;

    async fn teach(&self, topic: &str, step: &str) -> Result<String, LessonError>;

    async fn doubt(&self, topic: &str, step: &str, question: &str)
    -> Result<String, LessonError>;
}

#[async_trait]
impl<T: PromptService + ?Sized> PromptService for Arc<T> {
    async fn start(&self, topic: &str) -> Result<StepPlan, LessonError> {
        (**self).start(topic).await
    }

    async fn teach(&self, topic: &str, step: &str) -> Result<String, LessonError> {
        (**self).teach(topic, step).await
    }

    async fn doubt(
        &self,
        topic: &str,
        step: &str,
        question: &str,
    ) -> Result<String, LessonError> {
        (**self).doubt(topic, step, question).await
    }
}

/// Runs `request` against `service` and wraps the outcome for the machine.
pub async fn perform(service: &dyn PromptService, request: &LessonRequest) -> Reply {
    match request {
        LessonRequest::Start { topic } => Reply::Steps(service.start(topic).await),
        LessonRequest::Teach { topic, step } => Reply::Text(service.teach(topic, step).await),
        LessonRequest::Doubt {
            topic,
            current_step,
            question,
        } => Reply::Text(service.doubt(topic, current_step, question).await),
    }
}

/// Talks to `POST {base}/api/ollama/lesson`.
#[derive(Debug, Clone)]
pub struct HttpPromptService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPromptService {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/ollama/lesson", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post<T: DeserializeOwned>(&self, request: &LessonRequest) -> Result<T, LessonError> {
        debug!(mode = request.mode(), topic = request.topic(), "Posting lesson request");
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        decode(status, &body)
    }
}

#[async_trait]
impl PromptService for HttpPromptService {
    async fn start(&self, topic: &str) -> Result<StepPlan, LessonError> {
        let request = LessonRequest::Start {
            topic: topic.to_string(),
        };
        let body: StepsResponse = self.post(&request).await?;
        if body.steps.is_empty() {
            return Err(LessonError::MalformedResponse("empty step list".into()));
        }
        Ok(StepPlan {
            steps: body.steps,
            fallback: body.fallback,
        })
    }

    async fn teach(&self, topic: &str, step: &str) -> Result<String, LessonError> {
        let request = LessonRequest::Teach {
            topic: topic.to_string(),
            step: step.to_string(),
        };
        let body: ReplyResponse = self.post(&request).await?;
        non_blank(body.reply)
    }

    async fn doubt(
        &self,
        topic: &str,
        step: &str,
        question: &str,
    ) -> Result<String, LessonError> {
        let request = LessonRequest::Doubt {
            topic: topic.to_string(),
            current_step: step.to_string(),
            question: question.to_string(),
        };
        let body: ReplyResponse = self.post(&request).await?;
        non_blank(body.reply)
    }
}

fn non_blank(reply: String) -> Result<String, LessonError> {
    if reply.trim().is_empty() {
        Err(LessonError::MalformedResponse("empty reply".into()))
    } else {
        Ok(reply)
    }
}

/// Interprets a backend response. HTTP errors and bodies that do not match
/// the expected shape are both malformed responses.
pub(crate) fn decode<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, LessonError> {
    if !status.is_success() {
        let detail = serde_json::from_str::<ErrorBody>(body)
            .map(|body| body.error)
            .unwrap_or_else(|_| status.to_string());
        return Err(LessonError::MalformedResponse(format!(
            "HTTP {}: {detail}",
            status.as_u16()
        )));
    }
    serde_json::from_str(body).map_err(|err| LessonError::MalformedResponse(err.to_string()))
}
