//! Shared lesson domain for the tutoring client and its backend.
//!
//! - `protocol`: the JSON contract of the multiplexed lesson endpoint and the
//!   transcription upload.
//! - `curriculum`: step-list parsing, the deterministic fallback curriculum,
//!   and the LLM-backed `LessonPlanner` used by the backend.
//! - `llm_client`: a minimal completion client over any OpenAI-compatible API.

pub mod curriculum;
pub mod llm_client;
pub mod protocol;
