//! Hand-written collaborator fakes for tests that need to hold a request in
//! flight or observe what was said.

use crate::dictation::{AudioClip, Microphone, Recording, Transcriber};
use crate::error::LessonError;
use crate::lifecycle::OrientationLock;
use crate::machine::Reply;
use crate::narration::{SpeechSynthesizer, VoiceSettings};
use crate::prompt_service::PromptService;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tutor_core::curriculum::StepPlan;
use tutor_core::protocol::LessonRequest;

/// Records every text it is asked to say.
///
/// Each text takes `duration` to say; `None` means it is never finished and
/// only ends when the narration is stopped.
pub struct RecordingSynthesizer {
    duration: Option<Duration>,
    fail: bool,
    spoken: Mutex<Vec<String>>,
}

impl RecordingSynthesizer {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            fail: false,
            spoken: Mutex::new(Vec::new()),
        }
    }

    pub fn endless() -> Self {
        Self {
            duration: None,
            fail: false,
            spoken: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            duration: None,
            fail: true,
            spoken: Mutex::new(Vec::new()),
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSynthesizer {
    async fn say(&self, text: &str, _voice: &VoiceSettings) -> Result<(), LessonError> {
        self.spoken.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(LessonError::Speech("no voice available".into()));
        }
        match self.duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
        Ok(())
    }
}

/// A recording that finishes with a fixed outcome.
pub struct StaticRecording(Result<AudioClip, LessonError>);

impl StaticRecording {
    pub fn ok(data: Vec<u8>) -> Self {
        Self(Ok(AudioClip::m4a(data)))
    }

    pub fn failing(err: LessonError) -> Self {
        Self(Err(err))
    }
}

#[async_trait]
impl Recording for StaticRecording {
    async fn finish(self: Box<Self>) -> Result<AudioClip, LessonError> {
        self.0
    }
}

#[derive(Clone, Copy)]
enum Permission {
    Granted,
    Denied,
    /// The prompt is never answered.
    Pending,
}

pub struct FakeMicrophone {
    permission: Permission,
}

impl FakeMicrophone {
    pub fn permitted() -> Self {
        Self {
            permission: Permission::Granted,
        }
    }

    pub fn denied() -> Self {
        Self {
            permission: Permission::Denied,
        }
    }

    pub fn unanswered() -> Self {
        Self {
            permission: Permission::Pending,
        }
    }
}

#[async_trait]
impl Microphone for FakeMicrophone {
    async fn request_permission(&self) -> bool {
        match self.permission {
            Permission::Granted => true,
            Permission::Denied => false,
            Permission::Pending => std::future::pending().await,
        }
    }

    async fn begin(&self) -> Result<Box<dyn Recording>, LessonError> {
        Ok(Box::new(StaticRecording::ok(b"voice".to_vec())))
    }
}

#[derive(Default)]
pub struct FakeOrientation {
    locks: AtomicUsize,
    unlocks: AtomicUsize,
    refuse_lock: bool,
    stall_unlock: bool,
}

impl FakeOrientation {
    /// Counts lock attempts but fails every one of them.
    pub fn refusing() -> Self {
        Self {
            refuse_lock: true,
            ..Self::default()
        }
    }

    /// Unlocking never completes.
    pub fn stalled() -> Self {
        Self {
            stall_unlock: true,
            ..Self::default()
        }
    }

    pub fn locks(&self) -> usize {
        self.locks.load(Ordering::SeqCst)
    }

    pub fn unlocks(&self) -> usize {
        self.unlocks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrientationLock for FakeOrientation {
    async fn lock_landscape(&self) -> Result<(), LessonError> {
        self.locks.fetch_add(1, Ordering::SeqCst);
        if self.refuse_lock {
            return Err(LessonError::Device("orientation lock unsupported".into()));
        }
        Ok(())
    }

    async fn unlock(&self) -> Result<(), LessonError> {
        self.unlocks.fetch_add(1, Ordering::SeqCst);
        if self.stall_unlock {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

/// A transcriber that holds every upload until the test opens the gate.
pub struct GatedTranscriber {
    text: String,
    gate: tokio::sync::Semaphore,
}

impl GatedTranscriber {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            gate: tokio::sync::Semaphore::new(0),
        }
    }

    /// Lets one held upload finish.
    pub fn open(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl Transcriber for GatedTranscriber {
    async fn transcribe(&self, _clip: AudioClip) -> Result<String, LessonError> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| LessonError::Network("gate closed".into()))?;
        permit.forget();
        Ok(self.text.clone())
    }
}

/// A prompt-service request waiting for the test to answer it.
pub struct PromptCall {
    pub request: LessonRequest,
    reply: oneshot::Sender<Reply>,
}

impl PromptCall {
    pub fn steps(self, titles: &[&str]) {
        let steps = titles.iter().map(|t| t.to_string()).collect();
        let _ = self.reply.send(Reply::Steps(Ok(StepPlan::generated(steps))));
    }

    pub fn text(self, text: &str) {
        let _ = self.reply.send(Reply::Text(Ok(text.to_string())));
    }

    pub fn fail(self, err: LessonError) {
        let reply = match self.request {
            LessonRequest::Start { .. } => Reply::Steps(Err(err)),
            _ => Reply::Text(Err(err)),
        };
        let _ = self.reply.send(reply);
    }
}

/// A prompt service whose calls are handed to the test one by one.
pub struct ChannelPromptService {
    calls: mpsc::UnboundedSender<PromptCall>,
}

impl ChannelPromptService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PromptCall>) {
        let (calls, rx) = mpsc::unbounded_channel();
        (Self { calls }, rx)
    }

    async fn call(&self, request: LessonRequest) -> Reply {
        let (tx, rx) = oneshot::channel();
        let failed = |request: &LessonRequest, reason: &str| match request {
            LessonRequest::Start { .. } => Reply::Steps(Err(LessonError::Network(reason.into()))),
            _ => Reply::Text(Err(LessonError::Network(reason.into()))),
        };
        let echo = request.clone();
        if self.calls.send(PromptCall { request, reply: tx }).is_err() {
            return failed(&echo, "test desk closed");
        }
        rx.await.unwrap_or_else(|_| failed(&echo, "call dropped"))
    }
}

#[async_trait]
impl PromptService for ChannelPromptService {
    async fn start(&self, topic: &str) -> Result<StepPlan, LessonError> {
        match self
            .call(LessonRequest::Start {
                topic: topic.to_string(),
            })
            .await
        {
            Reply::Steps(result) => result,
            Reply::Text(_) => Err(LessonError::MalformedResponse("expected steps".into())),
        }
    }

    async fn teach(&self, topic: &str, step: &str) -> Result<String, LessonError> {
        match self
            .call(LessonRequest::Teach {
                topic: topic.to_string(),
                step: step.to_string(),
            })
            .await
        {
            Reply::Text(result) => result,
            Reply::Steps(_) => Err(LessonError::MalformedResponse("expected text".into())),
        }
    }

    async fn doubt(
        &self,
        topic: &str,
        step: &str,
        question: &str,
    ) -> Result<String, LessonError> {
        match self
            .call(LessonRequest::Doubt {
                topic: topic.to_string(),
                current_step: step.to_string(),
                question: question.to_string(),
            })
            .await
        {
            Reply::Text(result) => result,
            Reply::Steps(_) => Err(LessonError::MalformedResponse("expected text".into())),
        }
    }
}
