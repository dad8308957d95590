//! Lesson API Library Crate
//!
//! This library contains the core logic of the lesson backend: configuration,
//! shared state, the HTTP handlers for lesson generation and speech
//! recognition, and routing. The binaries are thin wrappers around it.

pub mod config;
pub mod handlers;
pub mod router;
pub mod speech;
pub mod state;
