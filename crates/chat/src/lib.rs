#![deny(unsafe_code)]

/// Line-based terminal front end.
pub mod app;
/// Conversation state, submission control and the session actor.
pub mod chat;
/// Layered settings and their persistence.
pub mod settings;
