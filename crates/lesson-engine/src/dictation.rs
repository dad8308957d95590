//! Dictation Pipeline
//!
//! Records the learner's spoken doubt, uploads the clip and resolves to the
//! transcribed text. The microphone and the narration share one audio
//! resource: starting a recording silences narration first.

use crate::DoubtEntry;
use crate::error::LessonError;
use crate::narration::NarrationController;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tutor_core::protocol::{TRANSCRIPTION_FILE_NAME, TRANSCRIPTION_MIME_TYPE};

/// A finalized audio recording, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub data: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl AudioClip {
    /// A clip in the format the transcription endpoint expects.
    pub fn m4a(data: Vec<u8>) -> Self {
        Self {
            data,
            file_name: TRANSCRIPTION_FILE_NAME.to_string(),
            mime_type: TRANSCRIPTION_MIME_TYPE.to_string(),
        }
    }
}

/// An audio input device.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Asks the user for microphone access. `false` means denied.
    async fn request_permission(&self) -> bool;

    /// Starts capturing audio.
    async fn begin(&self) -> Result<Box<dyn Recording>, LessonError>;
}

/// An in-progress capture. Dropping it discards the audio.
#[async_trait]
pub trait Recording: Send + Sync {
    /// Stops capturing and finalizes the clip.
    async fn finish(self: Box<Self>) -> Result<AudioClip, LessonError>;
}

/// Converts recorded speech to text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, clip: AudioClip) -> Result<String, LessonError>;
}

pub struct DictationPipeline {
    microphone: Arc<dyn Microphone>,
    transcriber: Arc<dyn Transcriber>,
    /// The doubt entry whose microphone is still being opened.
    opening: Option<DoubtEntry>,
    recording: Option<(DoubtEntry, Box<dyn Recording>)>,
}

impl DictationPipeline {
    pub fn new(microphone: Arc<dyn Microphone>, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            microphone,
            transcriber,
            opening: None,
            recording: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn is_opening(&self) -> bool {
        self.opening.is_some()
    }

    /// Stops any narration and hands back the work of opening the microphone
    /// for `entry`. The result must be passed to [`DictationPipeline::opened`].
    pub fn start(
        &mut self,
        entry: DoubtEntry,
        narration: &mut NarrationController,
    ) -> Result<OpeningMicrophone, LessonError> {
        if self.recording.is_some() || self.opening.is_some() {
            return Err(LessonError::AlreadyRecording);
        }
        narration.stop();
        self.opening = Some(entry);
        debug!(?entry, "Opening microphone");
        Ok(OpeningMicrophone {
            entry,
            microphone: Arc::clone(&self.microphone),
        })
    }

    /// Applies the outcome of [`OpeningMicrophone::open`].
    ///
    /// Returns `None` when the start was cancelled in the meantime; a late
    /// recording is dropped without being used.
    pub fn opened(
        &mut self,
        entry: DoubtEntry,
        result: Result<Box<dyn Recording>, LessonError>,
    ) -> Option<Result<(), LessonError>> {
        if self.opening != Some(entry) {
            debug!(?entry, "Discarding microphone opened for a cancelled start");
            return None;
        }
        self.opening = None;
        Some(result.map(|recording| {
            debug!(?entry, "Recording started");
            self.recording = Some((entry, recording));
        }))
    }

    /// Releases the active recording and hands back the work of turning it
    /// into text. Returns `None` when nothing was being recorded; a start that
    /// is still opening the microphone is cancelled.
    pub fn stop(&mut self) -> Option<PendingTranscript> {
        self.opening = None;
        let (entry, recording) = self.recording.take()?;
        debug!(?entry, "Recording stopped");
        Some(PendingTranscript {
            entry,
            recording,
            transcriber: Arc::clone(&self.transcriber),
        })
    }

    /// Discards a start or recording made for any entry other than `current`.
    pub fn retain(&mut self, current: DoubtEntry) -> bool {
        let stale_recording = self
            .recording
            .as_ref()
            .is_some_and(|(entry, _)| *entry != current);
        let stale_opening = self.opening.is_some_and(|entry| entry != current);
        if stale_recording {
            self.recording = None;
        }
        if stale_opening {
            self.opening = None;
        }
        if stale_recording || stale_opening {
            debug!(?current, "Dropped dictation for a finished doubt entry");
        }
        stale_recording || stale_opening
    }

    /// Discards the active recording, or a start still in progress, without
    /// uploading anything.
    pub fn cancel(&mut self) -> bool {
        let recording = self.recording.take().is_some();
        let opening = self.opening.take().is_some();
        let cancelled = recording || opening;
        if cancelled {
            debug!("Recording cancelled");
        }
        cancelled
    }
}

/// Permission request and device start for one doubt entry.
pub struct OpeningMicrophone {
    entry: DoubtEntry,
    microphone: Arc<dyn Microphone>,
}

impl OpeningMicrophone {
    pub fn entry(&self) -> DoubtEntry {
        self.entry
    }

    /// Asks for microphone access, then starts capturing.
    pub async fn open(self) -> Result<Box<dyn Recording>, LessonError> {
        if !self.microphone.request_permission().await {
            info!("Microphone permission denied");
            return Err(LessonError::PermissionDenied);
        }
        self.microphone.begin().await
    }
}

/// A stopped recording on its way to becoming text.
pub struct PendingTranscript {
    entry: DoubtEntry,
    recording: Box<dyn Recording>,
    transcriber: Arc<dyn Transcriber>,
}

impl PendingTranscript {
    /// The doubt entry the audio was recorded for.
    pub fn entry(&self) -> DoubtEntry {
        self.entry
    }

    /// Finalizes and uploads the clip. Any failure yields an empty transcript.
    pub async fn resolve(self) -> String {
        let clip = match self.recording.finish().await {
            Ok(clip) => clip,
            Err(err) => {
                warn!(error = %err, "Could not finalize recording");
                return String::new();
            }
        };

        match self.transcriber.transcribe(clip).await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "Transcription failed");
                String::new()
            }
        }
    }
}
