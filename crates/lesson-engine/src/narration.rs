//! Narration Controller
//!
//! Turns text into speech through a [`SpeechSynthesizer`] and reports the
//! progress of each utterance as [`NarrationEvent`]s: `Started`, zero or more
//! `Frame` ticks for the mouth animation, then exactly one terminal event.
//!
//! At most one utterance is active. Every utterance carries a generation
//! number; events are only delivered while their generation is the active
//! one, so a superseded or stopped utterance can never report again.

use crate::error::LessonError;
use crate::viseme::{FRAME_PERIOD, MouthAnimator};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Voice parameters passed to the synthesizer with every utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            rate: 0.9,
            pitch: 1.0,
        }
    }
}

/// A text-to-speech engine.
///
/// `say` resolves once the text has been spoken completely. Dropping the
/// future must silence the speech.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn say(&self, text: &str, voice: &VoiceSettings) -> Result<(), LessonError>;
}

#[async_trait]
impl<T: SpeechSynthesizer + ?Sized> SpeechSynthesizer for Arc<T> {
    async fn say(&self, text: &str, voice: &VoiceSettings) -> Result<(), LessonError> {
        (**self).say(text, voice).await
    }
}

/// A silent synthesizer that takes as long as reading the text aloud would.
///
/// Used when no audio output is attached, e.g. in headless sessions.
#[derive(Debug, Clone)]
pub struct PacedSynthesizer {
    per_word: Duration,
}

impl PacedSynthesizer {
    pub fn new(per_word: Duration) -> Self {
        Self { per_word }
    }
}

impl Default for PacedSynthesizer {
    fn default() -> Self {
        Self::new(Duration::from_millis(350))
    }
}

#[async_trait]
impl SpeechSynthesizer for PacedSynthesizer {
    async fn say(&self, text: &str, voice: &VoiceSettings) -> Result<(), LessonError> {
        let words = text.split_whitespace().count().max(1) as f32;
        let rate = voice.rate.max(0.1);
        tokio::time::sleep(self.per_word.mul_f32(words / rate)).await;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum NarrationEventKind {
    Started,
    /// The mouth frame to display.
    Frame(u8),
    Done,
    Stopped,
    Failed(String),
}

impl NarrationEventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NarrationEventKind::Done | NarrationEventKind::Stopped | NarrationEventKind::Failed(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NarrationEvent {
    pub utterance: UtteranceId,
    pub kind: NarrationEventKind,
}

#[derive(Debug, Default)]
struct Shared {
    generation: u64,
    active: Option<u64>,
}

/// Emits events for one utterance, as long as it is still the active one.
#[derive(Clone)]
struct Emitter {
    id: u64,
    shared: Arc<Mutex<Shared>>,
    events: mpsc::UnboundedSender<NarrationEvent>,
}

impl Emitter {
    fn emit(&self, kind: NarrationEventKind) -> bool {
        let mut shared = lock(&self.shared);
        if shared.active != Some(self.id) {
            return false;
        }
        if kind.is_terminal() {
            shared.active = None;
        }
        self.events
            .send(NarrationEvent {
                utterance: UtteranceId(self.id),
                kind,
            })
            .is_ok()
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct NarrationController {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice: VoiceSettings,
    frame_period: Duration,
    shared: Arc<Mutex<Shared>>,
    events: mpsc::UnboundedSender<NarrationEvent>,
    task: Option<JoinHandle<()>>,
}

impl NarrationController {
    /// Creates a controller and the receiver its events are delivered on.
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        voice: VoiceSettings,
    ) -> (Self, mpsc::UnboundedReceiver<NarrationEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Self {
            synthesizer,
            voice,
            frame_period: FRAME_PERIOD,
            shared: Arc::new(Mutex::new(Shared::default())),
            events,
            task: None,
        };
        (controller, rx)
    }

    pub fn with_frame_period(mut self, frame_period: Duration) -> Self {
        self.frame_period = frame_period;
        self
    }

    pub fn speak(&mut self, text: impl Into<String>) -> UtteranceId {
        self.speak_sequence(vec![text.into()])
    }

    /// Speaks `parts` back-to-back as a single utterance, replacing whatever
    /// is currently being said.
    pub fn speak_sequence(&mut self, parts: Vec<String>) -> UtteranceId {
        self.abort_task();

        let id = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.active = Some(shared.generation);
            shared.generation
        };
        let emitter = Emitter {
            id,
            shared: Arc::clone(&self.shared),
            events: self.events.clone(),
        };
        emitter.emit(NarrationEventKind::Started);
        debug!(utterance = id, parts = parts.len(), "Narration started");

        self.task = Some(tokio::spawn(run_utterance(
            emitter,
            parts,
            Arc::clone(&self.synthesizer),
            self.voice.clone(),
            self.frame_period,
        )));
        UtteranceId(id)
    }

    /// Silences the active utterance, reporting it as `Stopped`.
    ///
    /// Returns `false` when nothing was being said.
    pub fn stop(&mut self) -> bool {
        self.abort_task();

        let mut shared = lock(&self.shared);
        let Some(id) = shared.active.take() else {
            return false;
        };
        debug!(utterance = id, "Narration stopped");
        let _ = self.events.send(NarrationEvent {
            utterance: UtteranceId(id),
            kind: NarrationEventKind::Stopped,
        });
        true
    }

    pub fn is_speaking(&self) -> bool {
        lock(&self.shared).active.is_some()
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for NarrationController {
    fn drop(&mut self) {
        self.abort_task();
    }
}

async fn run_utterance(
    emitter: Emitter,
    parts: Vec<String>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice: VoiceSettings,
    frame_period: Duration,
) {
    let speech = async {
        for part in &parts {
            synthesizer.say(part, &voice).await?;
        }
        Ok::<(), LessonError>(())
    };
    tokio::pin!(speech);

    let mut ticker = tokio::time::interval(frame_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;
    let mut animator = MouthAnimator::new();

    let outcome = loop {
        tokio::select! {
            biased;
            result = &mut speech => break result,
            _ = ticker.tick() => {
                if !emitter.emit(NarrationEventKind::Frame(animator.advance())) {
                    return;
                }
            }
        }
    };

    match outcome {
        Ok(()) => {
            emitter.emit(NarrationEventKind::Done);
        }
        Err(err) => {
            warn!(utterance = emitter.id, error = %err, "Narration failed");
            emitter.emit(NarrationEventKind::Failed(err.to_string()));
        }
    }
}
