//! Speech Recognition Proxy
//!
//! Uploaded clips are forwarded unchanged to an external recognizer (a local
//! Whisper server by default), which answers with `{ "text": ... }`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::debug;
use tutor_core::protocol::{TRANSCRIPTION_FIELD, TranscriptResponse};

/// An audio file received from a client.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub data: Vec<u8>,
    pub file_name: String,
    pub content_type: Option<String>,
}

/// Defines the contract for any service that can transcribe speech.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn recognize(&self, audio: AudioUpload) -> Result<String>;
}

pub struct WhisperProxy {
    client: reqwest::Client,
    url: String,
}

impl WhisperProxy {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl SpeechRecognizer for WhisperProxy {
    async fn recognize(&self, audio: AudioUpload) -> Result<String> {
        debug!(bytes = audio.data.len(), file_name = %audio.file_name, "Forwarding audio to recognizer");
        let mut part = Part::bytes(audio.data).file_name(audio.file_name);
        if let Some(content_type) = &audio.content_type {
            part = part
                .mime_str(content_type)
                .context("Invalid audio content type")?;
        }
        let form = Form::new().part(TRANSCRIPTION_FIELD, part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .context("Speech recognizer is unreachable")?
            .error_for_status()
            .context("Speech recognizer rejected the clip")?;

        let transcript: TranscriptResponse = response
            .json()
            .await
            .context("Speech recognizer returned an unreadable body")?;
        Ok(transcript.into_text())
    }
}
