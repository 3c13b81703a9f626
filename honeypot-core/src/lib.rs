//! Core types for the honeypot engine
//!
//! This crate holds the pieces every other honeypot crate builds on:
//! configuration, logging, inbound/outbound message shapes, and the
//! in-memory session state (store, history buffer, rate limiter).

pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod session;
pub mod utils;

pub use error::{Error, Result};
pub use message::{InboundMessage, OutboundReply};
