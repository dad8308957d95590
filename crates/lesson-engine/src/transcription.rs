use crate::dictation::{AudioClip, Transcriber};
use crate::error::LessonError;
use crate::prompt_service::decode;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::debug;
use tutor_core::protocol::{TRANSCRIPTION_FIELD, TranscriptResponse};

/// Uploads clips to `POST {base}/api/speech/speech-to-text`.
#[derive(Debug, Clone)]
pub struct HttpTranscriber {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTranscriber {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/api/speech/speech-to-text",
                base_url.trim_end_matches('/')
            ),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, clip: AudioClip) -> Result<String, LessonError> {
        debug!(bytes = clip.data.len(), "Uploading clip for transcription");
        let part = Part::bytes(clip.data)
            .file_name(clip.file_name)
            .mime_str(&clip.mime_type)?;
        let form = Form::new().part(TRANSCRIPTION_FIELD, part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        let transcript: TranscriptResponse = decode(status, &body)?;
        Ok(transcript.into_text())
    }
}
