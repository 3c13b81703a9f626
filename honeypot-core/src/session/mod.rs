//! Conversation state
//!
//! Sessions live in memory only. They are created on the first inbound
//! message and dropped by the idle sweep or a process restart.

pub mod extract;
pub mod manager;
pub mod rate_limit;
pub mod store;

pub use extract::ExtractedDetails;
pub use manager::{SessionHandle, SessionStore};
pub use rate_limit::RateLimiter;
pub use store::{HistoryBuffer, Role, Session, SessionSummary, Turn};
