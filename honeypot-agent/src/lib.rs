//! Conversation logic for the honeypot engine
//!
//! This crate provides the session orchestrator, context assembly,
//! stalling replies, termination rules and the idle sweeper.

pub mod context;
pub mod orchestrator;
pub mod stalling;
pub mod sweeper;
pub mod termination;

pub use context::ContextBuilder;
pub use orchestrator::{OrchestratorSettings, SessionOrchestrator};
pub use stalling::StallingReplies;
pub use sweeper::SessionSweeper;
pub use termination::{EndMarker, EndSignal, TerminationPolicy};
