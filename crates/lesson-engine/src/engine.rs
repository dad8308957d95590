//! The lesson engine runtime.
//!
//! One task owns the [`LessonStateMachine`] and every collaborator. The view
//! talks to it through a cloneable [`LessonHandle`]: operations travel over
//! an `mpsc` channel with a `oneshot` reply, and the current state is
//! published on a `watch` channel as a [`LessonSnapshot`]. Prompt-service
//! calls, microphone starts and transcript uploads run in a `JoinSet` and
//! report back to the task, tagged so that stale results can be discarded.
//! The task never waits on a device or a remote service itself.
//!
//! Exiting tears the task down: in-flight work is aborted, narration is
//! stopped, the orientation is released, and every later operation fails
//! with [`LessonError::SessionClosed`].

use crate::config::ClientConfig;
use crate::dictation::{DictationPipeline, Microphone, Recording, Transcriber};
use crate::error::LessonError;
use crate::lifecycle::{LifecycleGuard, OrientationLock};
use crate::machine::{LessonStateMachine, Reply};
use crate::narration::{
    NarrationController, NarrationEvent, NarrationEventKind, SpeechSynthesizer,
};
use crate::prompt_service::{HttpPromptService, PromptService, perform};
use crate::session::{LessonMode, LessonSession};
use crate::transcription::HttpTranscriber;
use crate::viseme::NEUTRAL_FRAME;
use crate::{Command, DoubtEntry, Ticket};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

/// The external services and devices a lesson depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub prompts: Arc<dyn PromptService>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub microphone: Arc<dyn Microphone>,
    pub transcriber: Arc<dyn Transcriber>,
    pub orientation: Arc<dyn OrientationLock>,
}

impl Collaborators {
    /// Uses the lesson backend at `config.base_url` for generation and
    /// transcription, and the given platform devices for everything else.
    pub fn http(
        config: &ClientConfig,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        microphone: Arc<dyn Microphone>,
        orientation: Arc<dyn OrientationLock>,
    ) -> Self {
        let client = reqwest::Client::new();
        Self {
            prompts: Arc::new(HttpPromptService::new(client.clone(), &config.base_url)),
            synthesizer,
            microphone,
            transcriber: Arc::new(HttpTranscriber::new(client, &config.base_url)),
            orientation,
        }
    }
}

/// Everything the view renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LessonSnapshot {
    pub topic: String,
    pub steps: Vec<String>,
    pub current_step: usize,
    pub mode: LessonMode,
    pub narration_text: String,
    pub doubt_draft: String,
    pub notice: Option<String>,
    pub used_fallback: bool,
    pub is_speaking: bool,
    pub mouth_frame: u8,
    pub is_recording: bool,
}

impl LessonSnapshot {
    fn capture(session: &LessonSession) -> Self {
        Self {
            topic: session.topic().to_string(),
            steps: session.steps().to_vec(),
            current_step: session.current_step(),
            mode: session.mode(),
            narration_text: session.narration_text().to_string(),
            doubt_draft: session.doubt_draft().to_string(),
            notice: session.notice().map(str::to_string),
            used_fallback: session.used_fallback(),
            ..Self::default()
        }
    }
}

#[derive(Debug)]
enum Operation {
    Start(String),
    Continue,
    RaiseDoubt,
    SetDraft(String),
    SubmitDoubt(String),
    StartDictation,
    StopDictation,
    CancelDictation,
    FocusLost,
    FocusGained,
    Exit,
}

struct Envelope {
    operation: Operation,
    reply: oneshot::Sender<Result<(), LessonError>>,
}

enum Completion {
    Reply(Ticket, Reply),
    RecordingStarted(DoubtEntry, Result<Box<dyn Recording>, LessonError>),
    Transcript(DoubtEntry, String),
}

/// The view's connection to a running lesson.
#[derive(Clone)]
pub struct LessonHandle {
    operations: mpsc::Sender<Envelope>,
    snapshot: watch::Receiver<LessonSnapshot>,
}

impl LessonHandle {
    pub async fn start(&self, topic: impl Into<String>) -> Result<(), LessonError> {
        self.call(Operation::Start(topic.into())).await
    }

    pub async fn continue_lesson(&self) -> Result<(), LessonError> {
        self.call(Operation::Continue).await
    }

    pub async fn raise_doubt(&self) -> Result<(), LessonError> {
        self.call(Operation::RaiseDoubt).await
    }

    pub async fn set_draft(&self, text: impl Into<String>) -> Result<(), LessonError> {
        self.call(Operation::SetDraft(text.into())).await
    }

    pub async fn submit_doubt(&self, text: impl Into<String>) -> Result<(), LessonError> {
        self.call(Operation::SubmitDoubt(text.into())).await
    }

    /// Asks for the microphone and starts recording a spoken doubt.
    ///
    /// Returns once the request is under way: `is_recording` turns on when
    /// the device is open, and a refusal shows up as the snapshot's notice.
    pub async fn start_dictation(&self) -> Result<(), LessonError> {
        self.call(Operation::StartDictation).await
    }

    /// Stops recording; the transcript lands in the doubt draft once uploaded.
    /// Fails with [`LessonError::NotRecording`] when no dictation is active.
    pub async fn stop_dictation(&self) -> Result<(), LessonError> {
        self.call(Operation::StopDictation).await
    }

    pub async fn cancel_dictation(&self) -> Result<(), LessonError> {
        self.call(Operation::CancelDictation).await
    }

    pub async fn focus_lost(&self) -> Result<(), LessonError> {
        self.call(Operation::FocusLost).await
    }

    pub async fn focus_gained(&self) -> Result<(), LessonError> {
        self.call(Operation::FocusGained).await
    }

    /// Ends the lesson. Calling it again after the session closed is fine.
    pub async fn exit(&self) -> Result<(), LessonError> {
        match self.call(Operation::Exit).await {
            Err(LessonError::SessionClosed) => Ok(()),
            other => other,
        }
    }

    pub fn snapshot(&self) -> LessonSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LessonSnapshot> {
        self.snapshot.clone()
    }

    /// Waits until the published state satisfies `predicate`.
    pub async fn wait_until(
        &self,
        predicate: impl FnMut(&LessonSnapshot) -> bool,
    ) -> Result<LessonSnapshot, LessonError> {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| LessonError::SessionClosed)?;
        Ok(snapshot.clone())
    }

    async fn call(&self, operation: Operation) -> Result<(), LessonError> {
        let (reply, rx) = oneshot::channel();
        self.operations
            .send(Envelope { operation, reply })
            .await
            .map_err(|_| LessonError::SessionClosed)?;
        rx.await.map_err(|_| LessonError::SessionClosed)?
    }
}

pub struct LessonEngine {
    machine: LessonStateMachine,
    prompts: Arc<dyn PromptService>,
    narration: NarrationController,
    narration_events: mpsc::UnboundedReceiver<NarrationEvent>,
    mouth_frame: u8,
    dictation: DictationPipeline,
    guard: LifecycleGuard,
    tasks: JoinSet<Completion>,
    snapshot: watch::Sender<LessonSnapshot>,
}

impl LessonEngine {
    /// Enters the lesson view: takes the orientation lock and spawns the
    /// engine task.
    pub fn launch(
        config: ClientConfig,
        collaborators: Collaborators,
    ) -> (LessonHandle, JoinHandle<()>) {
        let guard = LifecycleGuard::acquire(collaborators.orientation);
        let (narration, narration_events) =
            NarrationController::new(collaborators.synthesizer, config.voice);
        let (operations, operations_rx) = mpsc::channel(32);
        let (snapshot, snapshot_rx) = watch::channel(LessonSnapshot::default());

        let engine = Self {
            machine: LessonStateMachine::new(config.script),
            prompts: collaborators.prompts,
            narration: narration.with_frame_period(config.frame_period),
            narration_events,
            mouth_frame: NEUTRAL_FRAME,
            dictation: DictationPipeline::new(collaborators.microphone, collaborators.transcriber),
            guard,
            tasks: JoinSet::new(),
            snapshot,
        };
        let task = tokio::spawn(engine.run(operations_rx));

        let handle = LessonHandle {
            operations,
            snapshot: snapshot_rx,
        };
        (handle, task)
    }

    async fn run(mut self, mut operations: mpsc::Receiver<Envelope>) {
        info!("Lesson engine running");
        loop {
            tokio::select! {
                envelope = operations.recv() => {
                    let Some(Envelope { operation, reply }) = envelope else {
                        debug!("All lesson handles dropped");
                        break;
                    };
                    if matches!(operation, Operation::Exit) {
                        self.teardown().await;
                        let _ = reply.send(Ok(()));
                        break;
                    }
                    let result = self.handle(operation);
                    self.publish();
                    let _ = reply.send(result);
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    match joined {
                        Ok(completion) => self.complete(completion),
                        Err(err) if err.is_cancelled() => {}
                        Err(err) => error!(error = %err, "Lesson task panicked"),
                    }
                    self.publish();
                }
                Some(event) = self.narration_events.recv() => {
                    self.on_narration(event);
                    self.publish();
                }
            }
        }

        if !self.machine.is_closed() {
            self.teardown().await;
        }
        info!("Lesson engine stopped");
    }

    fn handle(&mut self, operation: Operation) -> Result<(), LessonError> {
        debug!(?operation, "Handling lesson operation");
        let result = match operation {
            Operation::Start(topic) => self.machine.start(&topic),
            Operation::Continue => self.machine.continue_lesson(),
            Operation::RaiseDoubt => self.machine.raise_doubt(),
            Operation::SetDraft(text) => self.machine.set_draft(&text),
            Operation::SubmitDoubt(text) => self.machine.submit_doubt(&text),
            Operation::StartDictation => self.start_dictation(),
            Operation::StopDictation => self.stop_dictation(),
            Operation::CancelDictation => {
                self.dictation.cancel();
                Ok(())
            }
            Operation::FocusLost => {
                self.suspend();
                Ok(())
            }
            Operation::FocusGained => {
                self.resume();
                Ok(())
            }
            Operation::Exit => Ok(()),
        };
        self.execute();
        result
    }

    fn execute(&mut self) {
        self.dictation.retain(self.machine.doubt_entry());
        for command in self.machine.take_commands() {
            match command {
                Command::Fetch { ticket, request } => {
                    let prompts = Arc::clone(&self.prompts);
                    self.tasks.spawn(async move {
                        let reply = perform(prompts.as_ref(), &request).await;
                        Completion::Reply(ticket, reply)
                    });
                }
                Command::Speak(parts) => {
                    if self.dictation.cancel() {
                        debug!("Recording cancelled to narrate");
                    }
                    self.narration.speak_sequence(parts);
                }
                Command::StopSpeaking => {
                    self.narration.stop();
                }
            }
        }
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Reply(ticket, reply) => self.machine.receive(ticket, reply),
            Completion::RecordingStarted(entry, result) => self.recording_started(entry, result),
            Completion::Transcript(entry, text) => self.machine.transcript_received(entry, &text),
        }
        self.execute();
    }

    fn on_narration(&mut self, event: NarrationEvent) {
        self.mouth_frame = match event.kind {
            NarrationEventKind::Frame(frame) => frame,
            _ => NEUTRAL_FRAME,
        };
    }

    fn start_dictation(&mut self) -> Result<(), LessonError> {
        let mode = self.machine.session().mode();
        if mode != LessonMode::AwaitingDoubt {
            return Err(LessonError::invalid("start_dictation", mode));
        }
        let entry = self.machine.doubt_entry();
        let opening = self.dictation.start(entry, &mut self.narration)?;
        self.tasks.spawn(async move {
            let result = opening.open().await;
            Completion::RecordingStarted(entry, result)
        });
        Ok(())
    }

    fn recording_started(
        &mut self,
        entry: DoubtEntry,
        result: Result<Box<dyn Recording>, LessonError>,
    ) {
        if !self.machine.accepts_dictation(entry) {
            debug!(?entry, "Microphone opened after its doubt entry ended");
            return;
        }
        match self.dictation.opened(entry, result) {
            None | Some(Ok(())) => {}
            Some(Err(LessonError::PermissionDenied)) => self.machine.permission_denied(entry),
            Some(Err(err)) => self.machine.recording_failed(entry, &err),
        }
    }

    fn stop_dictation(&mut self) -> Result<(), LessonError> {
        if !self.dictation.is_recording() && !self.dictation.is_opening() {
            return Err(LessonError::NotRecording);
        }
        if let Some(pending) = self.dictation.stop() {
            let entry = pending.entry();
            self.tasks.spawn(async move {
                let text = pending.resolve().await;
                Completion::Transcript(entry, text)
            });
        }
        Ok(())
    }

    fn suspend(&mut self) {
        info!("Lesson view lost focus");
        self.machine.suspend();
        self.dictation.cancel();
        self.execute();
        self.guard.focus_lost();
    }

    fn resume(&mut self) {
        info!("Lesson view regained focus");
        self.guard.focus_gained();
        self.machine.resume();
        self.execute();
    }

    async fn teardown(&mut self) {
        self.machine.exit();
        self.execute();
        self.dictation.cancel();
        self.tasks.shutdown().await;
        self.guard.release().await;
        self.publish();
    }

    fn publish(&self) {
        let is_speaking = self.narration.is_speaking();
        let snapshot = LessonSnapshot {
            is_speaking,
            mouth_frame: if is_speaking {
                self.mouth_frame
            } else {
                NEUTRAL_FRAME
            },
            is_recording: self.dictation.is_recording(),
            ..LessonSnapshot::capture(self.machine.session())
        };
        self.snapshot.send_replace(snapshot);
    }
}
