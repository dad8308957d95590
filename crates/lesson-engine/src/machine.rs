//! The lesson state machine.
//!
//! The machine performs no I/O. Each operation validates the current mode,
//! mutates the [`LessonSession`] and queues [`Command`]s for the runtime,
//! which drains them with [`LessonStateMachine::take_commands`]. Replies to
//! collaborator requests come back through [`LessonStateMachine::receive`]
//! carrying the [`Ticket`] they were issued with; a reply whose ticket is not
//! the one currently awaited is discarded.

use crate::error::LessonError;
use crate::session::{LessonMode, LessonSession, Script};
use crate::{Command, DoubtEntry, Ticket};
use tracing::{debug, info, warn};
use tutor_core::curriculum::{StepPlan, fallback_steps};
use tutor_core::protocol::LessonRequest;

/// The outcome of a prompt-service request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Steps(Result<StepPlan, LessonError>),
    Text(Result<String, LessonError>),
}

impl Reply {
    fn into_steps(self) -> Result<StepPlan, LessonError> {
        match self {
            Reply::Steps(result) => result,
            Reply::Text(_) => Err(LessonError::MalformedResponse(
                "expected a step list".into(),
            )),
        }
    }

    fn into_text(self) -> Result<String, LessonError> {
        match self {
            Reply::Text(result) => result,
            Reply::Steps(_) => Err(LessonError::MalformedResponse("expected a reply".into())),
        }
    }
}

#[derive(Debug)]
struct Pending {
    ticket: Ticket,
    request: LessonRequest,
}

#[derive(Debug)]
pub struct LessonStateMachine {
    session: LessonSession,
    script: Script,
    next_ticket: u64,
    doubt_entry: u64,
    pending: Option<Pending>,
    /// A request invalidated by suspension, re-issued on resume.
    interrupted: Option<LessonRequest>,
    suspended: bool,
    closed: bool,
    outbox: Vec<Command>,
}

impl LessonStateMachine {
    pub fn new(script: Script) -> Self {
        Self {
            session: LessonSession::default(),
            script,
            next_ticket: 1,
            doubt_entry: 0,
            pending: None,
            interrupted: None,
            suspended: false,
            closed: false,
            outbox: Vec::new(),
        }
    }

    pub fn session(&self) -> &LessonSession {
        &self.session
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Drains the commands queued by the operations since the last call.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.outbox)
    }

    /// `true` while a prompt-service request is outstanding or parked.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some() || self.interrupted.is_some()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The current round of doubt entry. It changes whenever a doubt is
    /// raised, submitted, or the session closes.
    pub fn doubt_entry(&self) -> DoubtEntry {
        DoubtEntry(self.doubt_entry)
    }

    /// `true` while `entry` is the doubt the learner is still composing.
    pub fn accepts_dictation(&self, entry: DoubtEntry) -> bool {
        !self.closed
            && self.session.mode == LessonMode::AwaitingDoubt
            && entry == self.doubt_entry()
    }

    // --- Operations ---

    pub fn start(&mut self, topic: &str) -> Result<(), LessonError> {
        self.ensure_open()?;
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(LessonError::EmptyTopic);
        }
        match self.session.mode {
            LessonMode::Idle | LessonMode::Completed => {}
            mode => return Err(LessonError::invalid("start", mode)),
        }

        info!(%topic, "Starting lesson");
        self.session = LessonSession::new(topic.to_string());
        self.session.mode = LessonMode::Loading;
        self.session.narration_text = self.script.loading_steps.clone();
        self.outbox.push(Command::StopSpeaking);
        self.dispatch(LessonRequest::Start {
            topic: topic.to_string(),
        });
        Ok(())
    }

    pub fn continue_lesson(&mut self) -> Result<(), LessonError> {
        self.ensure_open()?;
        match self.session.mode {
            LessonMode::Completed => return Ok(()),
            LessonMode::Teaching if self.is_busy() => return Err(LessonError::Busy),
            LessonMode::Teaching => {}
            LessonMode::Loading => return Err(LessonError::Busy),
            mode => return Err(LessonError::invalid("continue", mode)),
        }

        self.outbox.push(Command::StopSpeaking);
        if self.session.is_last_step() {
            info!(topic = %self.session.topic, "Lesson completed");
            self.session.mode = LessonMode::Completed;
            self.session.narration_text = self.script.completed.clone();
            self.speak(self.script.completion_speech.clone());
        } else {
            self.teach(self.session.current_step + 1);
        }
        Ok(())
    }

    pub fn raise_doubt(&mut self) -> Result<(), LessonError> {
        self.ensure_open()?;
        match self.session.mode {
            LessonMode::Teaching if self.is_busy() => return Err(LessonError::Busy),
            LessonMode::Teaching => {}
            LessonMode::Loading => return Err(LessonError::Busy),
            mode => return Err(LessonError::invalid("raise_doubt", mode)),
        }

        self.outbox.push(Command::StopSpeaking);
        self.doubt_entry += 1;
        self.session.mode = LessonMode::AwaitingDoubt;
        self.session.doubt_draft.clear();
        self.session.notice = None;
        self.speak(vec![self.script.doubt_invitation.clone()]);
        Ok(())
    }

    /// Replaces the pending doubt text, e.g. while the learner types.
    pub fn set_draft(&mut self, text: &str) -> Result<(), LessonError> {
        self.ensure_open()?;
        if self.session.mode != LessonMode::AwaitingDoubt {
            return Err(LessonError::invalid("set_draft", self.session.mode));
        }
        self.session.doubt_draft = text.to_string();
        Ok(())
    }

    pub fn submit_doubt(&mut self, text: &str) -> Result<(), LessonError> {
        self.ensure_open()?;
        match self.session.mode {
            LessonMode::AwaitingDoubt => {}
            LessonMode::AnsweringDoubt => return Err(LessonError::Busy),
            mode => return Err(LessonError::invalid("submit_doubt", mode)),
        }

        let question = text.trim();
        if question.is_empty() {
            self.speak(vec![self.script.empty_doubt.clone()]);
            return Err(LessonError::EmptyInput);
        }

        let Some(step) = self.session.current_step_title().map(str::to_string) else {
            return Err(LessonError::invalid("submit_doubt", self.session.mode));
        };

        self.outbox.push(Command::StopSpeaking);
        self.doubt_entry += 1;
        self.session.mode = LessonMode::AnsweringDoubt;
        self.session.narration_text = self.script.answering.clone();
        self.session.doubt_draft.clear();
        self.dispatch(LessonRequest::Doubt {
            topic: self.session.topic.clone(),
            current_step: step,
            question: question.to_string(),
        });
        Ok(())
    }

    /// Ends the session. Every later reply is discarded and every later
    /// operation fails with [`LessonError::SessionClosed`].
    pub fn exit(&mut self) {
        if self.closed {
            return;
        }
        info!(topic = %self.session.topic, "Lesson session closed");
        self.closed = true;
        self.doubt_entry += 1;
        self.pending = None;
        self.interrupted = None;
        self.outbox.push(Command::StopSpeaking);
    }

    /// The view lost focus: silence narration and park any in-flight request.
    pub fn suspend(&mut self) {
        if self.closed || self.suspended {
            return;
        }
        self.suspended = true;
        self.outbox.push(Command::StopSpeaking);
        if let Some(pending) = self.pending.take() {
            debug!(ticket = ?pending.ticket, mode = pending.request.mode(), "Parking in-flight request");
            self.interrupted = Some(pending.request);
        }
    }

    /// The view regained focus: re-issue whatever was parked.
    pub fn resume(&mut self) {
        if self.closed || !self.suspended {
            return;
        }
        self.suspended = false;
        if let Some(request) = self.interrupted.take() {
            self.dispatch(request);
        }
    }

    // --- Collaborator results ---

    pub fn receive(&mut self, ticket: Ticket, reply: Reply) {
        let Some(request) = self.claim(ticket) else {
            debug!(?ticket, "Discarding stale reply");
            return;
        };

        match request {
            LessonRequest::Start { .. } => self.apply_steps(reply.into_steps()),
            LessonRequest::Teach { .. } => self.apply_teaching(reply.into_text()),
            LessonRequest::Doubt { .. } => self.apply_answer(reply.into_text()),
        }
    }

    /// A dictated doubt has been transcribed. An empty transcript asks the
    /// learner to try again. Transcripts recorded for an earlier doubt are
    /// dropped.
    pub fn transcript_received(&mut self, entry: DoubtEntry, text: &str) {
        if !self.accepts_dictation(entry) {
            debug!(?entry, "Ignoring transcript for a finished doubt entry");
            return;
        }
        let text = text.trim();
        if text.is_empty() {
            self.session.notice = Some(self.script.nothing_heard.clone());
            self.speak(vec![self.script.nothing_heard.clone()]);
        } else {
            self.session.notice = None;
            self.session.doubt_draft = text.to_string();
        }
    }

    pub fn permission_denied(&mut self, entry: DoubtEntry) {
        if self.accepts_dictation(entry) {
            self.session.notice = Some(self.script.permission_denied.clone());
        }
    }

    pub fn recording_failed(&mut self, entry: DoubtEntry, err: &LessonError) {
        warn!(error = %err, "Recording could not be started");
        if self.accepts_dictation(entry) {
            self.session.notice = Some(err.to_string());
        }
    }

    // --- Internals ---

    fn ensure_open(&self) -> Result<(), LessonError> {
        if self.closed {
            Err(LessonError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn claim(&mut self, ticket: Ticket) -> Option<LessonRequest> {
        if self.closed {
            return None;
        }
        match self.pending.take() {
            Some(pending) if pending.ticket == ticket => Some(pending.request),
            other => {
                self.pending = other;
                None
            }
        }
    }

    fn dispatch(&mut self, request: LessonRequest) {
        if self.suspended {
            self.interrupted = Some(request);
            return;
        }
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        debug!(?ticket, mode = request.mode(), "Dispatching request");
        self.pending = Some(Pending {
            ticket,
            request: request.clone(),
        });
        self.outbox.push(Command::Fetch { ticket, request });
    }

    fn speak(&mut self, parts: Vec<String>) {
        if !self.suspended {
            self.outbox.push(Command::Speak(parts));
        }
    }

    fn teach(&mut self, index: usize) {
        self.session.current_step = index;
        self.session.mode = LessonMode::Teaching;
        self.session.narration_text = self.script.teaching.clone();
        let step = self.session.steps[index].clone();
        info!(step_index = index, %step, "Teaching step");
        self.dispatch(LessonRequest::Teach {
            topic: self.session.topic.clone(),
            step,
        });
    }

    fn apply_steps(&mut self, result: Result<StepPlan, LessonError>) {
        let topic = self.session.topic.clone();
        let plan = match result {
            Ok(plan) if !plan.steps.is_empty() => plan,
            Ok(_) => {
                warn!(%topic, "Prompt service returned no steps; using fallback curriculum");
                StepPlan::fallback(&topic)
            }
            Err(err) => {
                warn!(%topic, error = %err, "Step generation failed; using fallback curriculum");
                StepPlan {
                    steps: fallback_steps(&topic),
                    fallback: true,
                }
            }
        };

        self.session.steps = plan.steps;
        self.session.used_fallback = plan.fallback;
        self.teach(0);
    }

    fn apply_teaching(&mut self, result: Result<String, LessonError>) {
        match result {
            Ok(text) => {
                self.session.narration_text = text.clone();
                self.speak(vec![text]);
            }
            Err(err) => {
                warn!(step = ?self.session.current_step_title(), error = %err, "Teaching failed");
                self.session.narration_text = self.script.teach_failed.clone();
            }
        }
    }

    fn apply_answer(&mut self, result: Result<String, LessonError>) {
        self.session.mode = LessonMode::Teaching;
        let text = match result {
            Ok(text) => text,
            Err(err @ LessonError::MalformedResponse(_)) => {
                warn!(error = %err, "Doubt answer was unreadable");
                self.script.doubt_malformed.clone()
            }
            Err(err) => {
                warn!(error = %err, "Doubt request failed");
                self.script.doubt_network.clone()
            }
        };
        self.session.narration_text = text.clone();
        self.speak(vec![text]);
    }
}

impl Default for LessonStateMachine {
    fn default() -> Self {
        Self::new(Script::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "Deadlock in Operating Systems";

    fn fetch(commands: &[Command]) -> (Ticket, LessonRequest) {
        commands
            .iter()
            .find_map(|command| match command {
                Command::Fetch { ticket, request } => Some((*ticket, request.clone())),
                _ => None,
            })
            .expect("expected a fetch command")
    }

    fn spoken(commands: &[Command]) -> Vec<Vec<String>> {
        commands
            .iter()
            .filter_map(|command| match command {
                Command::Speak(parts) => Some(parts.clone()),
                _ => None,
            })
            .collect()
    }

    fn steps(titles: &[&str]) -> Reply {
        Reply::Steps(Ok(StepPlan::generated(
            titles.iter().map(|t| t.to_string()).collect(),
        )))
    }

    fn text(reply: &str) -> Reply {
        Reply::Text(Ok(reply.to_string()))
    }

    /// Starts a lesson and answers the step request; returns the teach ticket.
    fn started(machine: &mut LessonStateMachine, titles: &[&str]) -> Ticket {
        machine.start(TOPIC).unwrap();
        let (ticket, _) = fetch(&machine.take_commands());
        machine.receive(ticket, steps(titles));
        fetch(&machine.take_commands()).0
    }

    fn teaching(machine: &mut LessonStateMachine) {
        let ticket = started(machine, &["A", "B", "C"]);
        machine.receive(ticket, text("Step A explained"));
        machine.take_commands();
    }

    #[test]
    fn start_requests_steps_and_enters_loading() {
        let mut machine = LessonStateMachine::default();
        machine.start(TOPIC).unwrap();

        assert_eq!(machine.session().mode(), LessonMode::Loading);
        assert_eq!(machine.session().narration_text(), "Generating lesson steps...");
        let (_, request) = fetch(&machine.take_commands());
        assert_eq!(
            request,
            LessonRequest::Start {
                topic: TOPIC.into()
            }
        );
    }

    #[test]
    fn start_rejects_blank_topic() {
        let mut machine = LessonStateMachine::default();
        assert_eq!(machine.start("   "), Err(LessonError::EmptyTopic));
        assert_eq!(machine.session().mode(), LessonMode::Idle);
        assert!(machine.take_commands().is_empty());
    }

    #[test]
    fn steps_arrival_teaches_first_step() {
        let mut machine = LessonStateMachine::default();
        machine.start(TOPIC).unwrap();
        let (ticket, _) = fetch(&machine.take_commands());
        machine.receive(ticket, steps(&["One", "Two", "Three", "Four", "Five"]));

        assert_eq!(machine.session().mode(), LessonMode::Teaching);
        assert_eq!(machine.session().current_step(), 0);
        assert_eq!(machine.session().narration_text(), "Teaching...");
        let (_, request) = fetch(&machine.take_commands());
        assert_eq!(
            request,
            LessonRequest::Teach {
                topic: TOPIC.into(),
                step: "One".into()
            }
        );
    }

    #[test]
    fn failed_step_generation_uses_fallback_curriculum() {
        let mut machine = LessonStateMachine::default();
        machine.start(TOPIC).unwrap();
        let (ticket, _) = fetch(&machine.take_commands());
        machine.receive(
            ticket,
            Reply::Steps(Err(LessonError::Network("connection refused".into()))),
        );

        assert_eq!(machine.session().steps(), fallback_steps(TOPIC).as_slice());
        assert!(machine.session().used_fallback());
        assert_eq!(machine.session().mode(), LessonMode::Teaching);
    }

    #[test]
    fn empty_step_list_uses_fallback_curriculum() {
        let mut machine = LessonStateMachine::default();
        machine.start(TOPIC).unwrap();
        let (ticket, _) = fetch(&machine.take_commands());
        machine.receive(ticket, steps(&[]));
        assert_eq!(machine.session().steps().len(), 5);
    }

    #[test]
    fn short_step_list_is_used_as_returned() {
        let mut machine = LessonStateMachine::default();
        let ticket = started(&mut machine, &["Only", "Two"]);
        machine.receive(ticket, text("first"));
        machine.continue_lesson().unwrap();
        let (ticket, _) = fetch(&machine.take_commands());
        machine.receive(ticket, text("second"));

        machine.continue_lesson().unwrap();
        assert_eq!(machine.session().mode(), LessonMode::Completed);
    }

    #[test]
    fn teaching_reply_is_shown_and_spoken() {
        let mut machine = LessonStateMachine::default();
        let ticket = started(&mut machine, &["A", "B"]);
        machine.receive(ticket, text("A deadlock is..."));

        assert_eq!(machine.session().narration_text(), "A deadlock is...");
        assert_eq!(
            spoken(&machine.take_commands()),
            vec![vec!["A deadlock is...".to_string()]]
        );
    }

    #[test]
    fn teaching_failure_shows_placeholder_without_speaking() {
        let mut machine = LessonStateMachine::default();
        let ticket = started(&mut machine, &["A", "B"]);
        machine.receive(
            ticket,
            Reply::Text(Err(LessonError::MalformedResponse("not json".into()))),
        );

        assert_eq!(
            machine.session().narration_text(),
            "Teaching failed. Press continue to move on."
        );
        assert!(spoken(&machine.take_commands()).is_empty());
        assert_eq!(machine.session().mode(), LessonMode::Teaching);
        machine.continue_lesson().unwrap();
        assert_eq!(machine.session().current_step(), 1);
    }

    #[test]
    fn continue_while_teaching_request_in_flight_is_busy() {
        let mut machine = LessonStateMachine::default();
        started(&mut machine, &["A", "B"]);
        assert_eq!(machine.continue_lesson(), Err(LessonError::Busy));
        assert_eq!(machine.raise_doubt(), Err(LessonError::Busy));
        assert_eq!(machine.session().current_step(), 0);
    }

    #[test]
    fn continue_while_loading_is_busy() {
        let mut machine = LessonStateMachine::default();
        machine.start(TOPIC).unwrap();
        assert_eq!(machine.continue_lesson(), Err(LessonError::Busy));
    }

    #[test]
    fn continue_before_start_is_invalid() {
        let mut machine = LessonStateMachine::default();
        assert_eq!(
            machine.continue_lesson(),
            Err(LessonError::InvalidOperation {
                operation: "continue",
                mode: LessonMode::Idle
            })
        );
    }

    #[test]
    fn stale_reply_is_discarded() {
        let mut machine = LessonStateMachine::default();
        let first = started(&mut machine, &["A", "B", "C"]);
        machine.receive(first, text("A text"));
        machine.take_commands();
        machine.continue_lesson().unwrap();
        machine.take_commands();

        machine.receive(first, text("late duplicate"));
        assert_eq!(machine.session().narration_text(), "Teaching...");
        assert!(machine.take_commands().is_empty());
    }

    #[test]
    fn full_walkthrough_completes_with_spoken_message() {
        let mut machine = LessonStateMachine::default();
        let ticket = started(&mut machine, &["1", "2", "3", "4", "5"]);
        machine.receive(ticket, text("step 1"));

        for expected in 1..5 {
            machine.continue_lesson().unwrap();
            let (ticket, _) = fetch(&machine.take_commands());
            assert_eq!(machine.session().current_step(), expected);
            machine.receive(ticket, text("step"));
        }
        machine.take_commands();

        machine.continue_lesson().unwrap();
        assert_eq!(machine.session().mode(), LessonMode::Completed);
        assert_eq!(machine.session().narration_text(), "Lesson completed!");
        assert_eq!(
            spoken(&machine.take_commands()),
            vec![vec!["Lesson completed!".to_string(), "Great job!".to_string()]]
        );

        machine.continue_lesson().unwrap();
        assert_eq!(machine.session().mode(), LessonMode::Completed);
        assert!(machine.take_commands().is_empty());
        assert_eq!(machine.session().current_step(), 4);
    }

    #[test]
    fn completed_lesson_can_restart() {
        let mut machine = LessonStateMachine::default();
        let ticket = started(&mut machine, &["only"]);
        machine.receive(ticket, text("only step"));
        machine.continue_lesson().unwrap();
        machine.take_commands();

        machine.start("Graphs").unwrap();
        assert_eq!(machine.session().topic(), "Graphs");
        assert_eq!(machine.session().mode(), LessonMode::Loading);
        assert!(machine.session().steps().is_empty());
    }

    #[test]
    fn start_during_lesson_is_invalid() {
        let mut machine = LessonStateMachine::default();
        teaching(&mut machine);
        assert!(matches!(
            machine.start("Other"),
            Err(LessonError::InvalidOperation { operation: "start", .. })
        ));
    }

    #[test]
    fn raise_doubt_stops_narration_and_invites() {
        let mut machine = LessonStateMachine::default();
        teaching(&mut machine);

        machine.raise_doubt().unwrap();
        let commands = machine.take_commands();
        assert_eq!(commands[0], Command::StopSpeaking);
        assert_eq!(
            spoken(&commands),
            vec![vec!["Tell me your doubt. You can type or speak.".to_string()]]
        );
        assert_eq!(machine.session().mode(), LessonMode::AwaitingDoubt);
        assert_eq!(machine.session().narration_text(), "Step A explained");
    }

    #[test]
    fn blank_doubt_never_reaches_prompt_service() {
        let mut machine = LessonStateMachine::default();
        teaching(&mut machine);
        machine.raise_doubt().unwrap();
        machine.take_commands();

        for blank in ["", "   "] {
            assert_eq!(machine.submit_doubt(blank), Err(LessonError::EmptyInput));
            let commands = machine.take_commands();
            assert!(
                !commands
                    .iter()
                    .any(|c| matches!(c, Command::Fetch { .. }))
            );
            assert_eq!(
                spoken(&commands),
                vec![vec!["Please tell me your doubt first".to_string()]]
            );
            assert_eq!(machine.session().mode(), LessonMode::AwaitingDoubt);
        }
    }

    #[test]
    fn doubt_round_trip_returns_to_teaching() {
        let mut machine = LessonStateMachine::default();
        teaching(&mut machine);
        machine.raise_doubt().unwrap();
        machine.set_draft("why does X happen").unwrap();
        machine.take_commands();

        machine.submit_doubt("why does X happen").unwrap();
        assert_eq!(machine.session().mode(), LessonMode::AnsweringDoubt);
        assert_eq!(machine.session().doubt_draft(), "");
        let (ticket, request) = fetch(&machine.take_commands());
        assert_eq!(
            request,
            LessonRequest::Doubt {
                topic: TOPIC.into(),
                current_step: "A".into(),
                question: "why does X happen".into()
            }
        );
        assert_eq!(machine.submit_doubt("again"), Err(LessonError::Busy));

        machine.receive(ticket, text("Because of circular wait."));
        assert_eq!(machine.session().mode(), LessonMode::Teaching);
        assert_eq!(
            machine.session().narration_text(),
            "Because of circular wait."
        );
        assert_eq!(machine.session().current_step(), 0);
    }

    #[test]
    fn doubt_failures_return_to_teaching_with_message() {
        let mut machine = LessonStateMachine::default();
        teaching(&mut machine);

        for (error, message) in [
            (
                LessonError::MalformedResponse("bad".into()),
                "Server error. Please try again.",
            ),
            (
                LessonError::Network("down".into()),
                "Network error while answering doubt.",
            ),
        ] {
            machine.raise_doubt().unwrap();
            machine.submit_doubt("why?").unwrap();
            let (ticket, _) = fetch(&machine.take_commands());
            machine.receive(ticket, Reply::Text(Err(error)));
            assert_eq!(machine.session().mode(), LessonMode::Teaching);
            assert_eq!(machine.session().narration_text(), message);
            assert_eq!(spoken(&machine.take_commands()), vec![vec![message.to_string()]]);
        }
    }

    #[test]
    fn transcript_fills_draft_or_asks_again() {
        let mut machine = LessonStateMachine::default();
        teaching(&mut machine);
        machine.raise_doubt().unwrap();
        machine.take_commands();
        let entry = machine.doubt_entry();

        machine.transcript_received(entry, "");
        assert_eq!(
            machine.session().notice(),
            Some("I couldn't hear that. Please try again.")
        );
        assert_eq!(spoken(&machine.take_commands()).len(), 1);

        machine.transcript_received(entry, "  what is a wait-for graph ");
        assert_eq!(machine.session().doubt_draft(), "what is a wait-for graph");
        assert_eq!(machine.session().notice(), None);
    }

    #[test]
    fn transcript_from_an_earlier_doubt_is_dropped() {
        let mut machine = LessonStateMachine::default();
        teaching(&mut machine);
        machine.raise_doubt().unwrap();
        let first = machine.doubt_entry();
        machine.submit_doubt("typed instead").unwrap();
        let (ticket, _) = fetch(&machine.take_commands());
        machine.receive(ticket, text("answered"));

        machine.raise_doubt().unwrap();
        machine.take_commands();
        assert_ne!(machine.doubt_entry(), first);
        machine.transcript_received(first, "old dictated question");
        machine.permission_denied(first);
        assert_eq!(machine.session().doubt_draft(), "");
        assert_eq!(machine.session().notice(), None);
        assert!(machine.take_commands().is_empty());

        machine.transcript_received(machine.doubt_entry(), "new question");
        assert_eq!(machine.session().doubt_draft(), "new question");
    }

    #[test]
    fn exit_ends_the_doubt_entry() {
        let mut machine = LessonStateMachine::default();
        teaching(&mut machine);
        machine.raise_doubt().unwrap();
        let entry = machine.doubt_entry();
        assert!(machine.accepts_dictation(entry));

        machine.exit();
        assert!(!machine.accepts_dictation(entry));
        assert!(!machine.accepts_dictation(machine.doubt_entry()));
    }

    #[test]
    fn exit_discards_in_flight_reply_and_closes() {
        let mut machine = LessonStateMachine::default();
        let ticket = started(&mut machine, &["A", "B"]);
        machine.exit();
        assert_eq!(machine.take_commands(), vec![Command::StopSpeaking]);

        machine.receive(ticket, text("too late"));
        assert_eq!(machine.session().narration_text(), "Teaching...");
        assert!(machine.take_commands().is_empty());
        assert_eq!(machine.continue_lesson(), Err(LessonError::SessionClosed));

        machine.exit();
        assert!(machine.take_commands().is_empty());
    }

    #[test]
    fn suspension_parks_and_resume_reissues_request() {
        let mut machine = LessonStateMachine::default();
        let ticket = started(&mut machine, &["A", "B"]);

        machine.suspend();
        assert_eq!(machine.take_commands(), vec![Command::StopSpeaking]);
        machine.receive(ticket, text("arrived while away"));
        assert_eq!(machine.session().narration_text(), "Teaching...");
        assert!(machine.is_busy());

        machine.resume();
        let (new_ticket, request) = fetch(&machine.take_commands());
        assert_ne!(new_ticket, ticket);
        assert_eq!(
            request,
            LessonRequest::Teach {
                topic: TOPIC.into(),
                step: "A".into()
            }
        );
        machine.receive(new_ticket, text("A again"));
        assert_eq!(machine.session().narration_text(), "A again");
    }

    #[test]
    fn nothing_is_spoken_while_suspended() {
        let mut machine = LessonStateMachine::default();
        teaching(&mut machine);
        machine.suspend();
        machine.take_commands();
        machine.raise_doubt().unwrap();
        assert_eq!(machine.take_commands(), vec![Command::StopSpeaking]);
    }
}
