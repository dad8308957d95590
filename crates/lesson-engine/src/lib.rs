//! Lesson Orchestration Engine
//!
//! Walks a learner through a generated, multi-step lesson: fetches the steps,
//! narrates each one, lets the learner interrupt with a typed or dictated
//! doubt, and resumes teaching after the answer. Narration and dictation share
//! one audio resource and never run at the same time.

pub mod config;
pub mod dictation;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod machine;
pub mod narration;
pub mod prompt_service;
pub mod session;
pub mod transcription;
pub mod viseme;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ClientConfig;
pub use engine::{Collaborators, LessonEngine, LessonHandle, LessonSnapshot};
pub use error::LessonError;
pub use machine::LessonStateMachine;
pub use session::{LessonMode, LessonSession, Script};

use tutor_core::protocol::LessonRequest;

/// Identifies one prompt-service request so its reply can be matched to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

/// Identifies one round of doubt entry. Recordings and transcripts carry the
/// entry they were made for and are dropped once it is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DoubtEntry(pub u64);

/// Represents commands that the state machine issues to the engine runtime.
///
/// The machine decides; the runtime performs the side effects.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Issue a prompt-service request; the reply must be returned with `ticket`.
    Fetch {
        ticket: Ticket,
        request: LessonRequest,
    },
    /// Speak the given parts back-to-back, replacing any current narration.
    Speak(Vec<String>),
    /// Silence narration immediately.
    StopSpeaking,
}
