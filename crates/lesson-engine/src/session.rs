//! In-memory state of one lesson.

use serde::Serialize;

/// The single active phase of a lesson.
///
/// ```text
/// Idle ──start──▶ Loading ──steps──▶ Teaching(0)
/// Teaching(i) ──continue──▶ Teaching(i+1) | Completed
/// Teaching(i) ──raise_doubt──▶ AwaitingDoubt ──submit──▶ AnsweringDoubt ──answer──▶ Teaching(i)
/// Completed ──start──▶ Loading
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LessonMode {
    #[default]
    Idle,
    Loading,
    Teaching,
    AwaitingDoubt,
    AnsweringDoubt,
    Completed,
}

/// One lesson: its topic, the generated steps and the learner's position.
///
/// Only the state machine mutates a session; everything else reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LessonSession {
    pub(crate) topic: String,
    pub(crate) steps: Vec<String>,
    pub(crate) current_step: usize,
    pub(crate) mode: LessonMode,
    pub(crate) narration_text: String,
    pub(crate) doubt_draft: String,
    pub(crate) notice: Option<String>,
    pub(crate) used_fallback: bool,
}

impl LessonSession {
    pub(crate) fn new(topic: String) -> Self {
        Self {
            topic,
            ..Self::default()
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn current_step_title(&self) -> Option<&str> {
        self.steps.get(self.current_step).map(String::as_str)
    }

    pub fn mode(&self) -> LessonMode {
        self.mode
    }

    /// The text currently shown to the learner.
    pub fn narration_text(&self) -> &str {
        &self.narration_text
    }

    pub fn doubt_draft(&self) -> &str {
        &self.doubt_draft
    }

    /// A transient message about the last failed device interaction.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// `true` when the steps are the deterministic fallback curriculum.
    pub fn used_fallback(&self) -> bool {
        self.used_fallback
    }

    pub fn is_last_step(&self) -> bool {
        self.current_step + 1 >= self.steps.len()
    }
}

/// Every message the engine shows or speaks on its own behalf.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub loading_steps: String,
    pub teaching: String,
    pub teach_failed: String,
    pub doubt_invitation: String,
    pub empty_doubt: String,
    pub answering: String,
    pub doubt_malformed: String,
    pub doubt_network: String,
    pub completed: String,
    /// Spoken back-to-back when the lesson finishes.
    pub completion_speech: Vec<String>,
    pub nothing_heard: String,
    pub permission_denied: String,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            loading_steps: "Generating lesson steps...".into(),
            teaching: "Teaching...".into(),
            teach_failed: "Teaching failed. Press continue to move on.".into(),
            doubt_invitation: "Tell me your doubt. You can type or speak.".into(),
            empty_doubt: "Please tell me your doubt first".into(),
            answering: "Thinking about your doubt...".into(),
            doubt_malformed: "Server error. Please try again.".into(),
            doubt_network: "Network error while answering doubt.".into(),
            completed: "Lesson completed!".into(),
            completion_speech: vec!["Lesson completed!".into(), "Great job!".into()],
            nothing_heard: "I couldn't hear that. Please try again.".into(),
            permission_denied: "Microphone access is needed".into(),
        }
    }
}
