//! Session data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::extract::ExtractedDetails;

/// Turns included in a session summary
const SUMMARY_TURNS: usize = 10;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The remote party
    User,
    /// The decoy
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a conversation. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// Every turn of a session, plus a bounded read view for model context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryBuffer {
    turns: Vec<Turn>,
    window: usize,
}

impl HistoryBuffer {
    /// `window` is the number of most recent turns returned by [`window`](Self::window)
    pub fn new(window: usize) -> Self {
        Self {
            turns: Vec::new(),
            window: window.max(1),
        }
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The most recent turns, oldest first. Never longer than the window.
    pub fn window(&self) -> &[Turn] {
        self.recent(self.window)
    }

    /// The last `n` turns, oldest first
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Texts of the last `n` turns produced by `role`, newest first
    pub fn last_by_role(&self, role: Role, n: usize) -> Vec<&str> {
        self.turns
            .iter()
            .rev()
            .filter(|t| t.role == role)
            .take(n)
            .map(|t| t.text.as_str())
            .collect()
    }

    /// Drop the turns appended since the buffer held `len` turns. Used to
    /// undo an exchange that is not kept.
    pub fn rollback(&mut self, len: usize) {
        self.turns.truncate(len);
    }

    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    pub fn window_size(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// A conversation with one remote party
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub history: HistoryBuffer,
    /// Counted exchanges. Only ever grows.
    pub turn_count: u32,
    /// Stalling replies issued so far
    pub stall_count: u32,
    /// Exchanges where every provider failed. Never counted as turns.
    #[serde(default)]
    pub degraded_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub last_llm_call: Option<DateTime<Utc>>,
    pub ended: bool,
}

impl Session {
    pub fn new(id: impl Into<String>, history_window: usize) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            history: HistoryBuffer::new(history_window),
            turn_count: 0,
            stall_count: 0,
            degraded_count: 0,
            created_at: now,
            last_activity: now,
            last_llm_call: None,
            ended: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Whether the session has been quiet for at least `idle`
    pub fn is_idle(&self, now: DateTime<Utc>, idle: std::time::Duration) -> bool {
        now.signed_duration_since(self.last_activity)
            .to_std()
            .map(|elapsed| elapsed >= idle)
            .unwrap_or(false)
    }

    /// Describe the first broken state invariant, if any
    pub fn invariant_violation(&self, max_turns: u32) -> Option<String> {
        if !self.ended && self.turn_count >= max_turns {
            return Some(format!(
                "live session at {} turns with a limit of {}",
                self.turn_count, max_turns
            ));
        }
        let counted_turns = self.turn_count as usize * 2;
        if self.history.len() < counted_turns {
            return Some(format!(
                "{} retained turns for {} counted exchanges",
                self.history.len(),
                self.turn_count
            ));
        }
        None
    }

    /// Details found in everything the remote party has said
    pub fn extracted(&self) -> ExtractedDetails {
        ExtractedDetails::from_texts(
            self.history
                .all()
                .iter()
                .filter(|t| t.role == Role::User)
                .map(|t| t.text.as_str()),
        )
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            turn_count: self.turn_count,
            retained_turns: self.history.len(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            last_llm_call: self.last_llm_call,
            ended: self.ended,
            recent_turns: self.history.recent(SUMMARY_TURNS).to_vec(),
            extracted: self.extracted(),
        }
    }
}

/// Read-only view of a session for inspection endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub turn_count: u32,
    pub retained_turns: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub last_llm_call: Option<DateTime<Utc>>,
    pub ended: bool,
    pub recent_turns: Vec<Turn>,
    pub extracted: ExtractedDetails,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let session = Session::new("abc", 8);
        assert_eq!(session.id, "abc");
        assert_eq!(session.turn_count, 0);
        assert!(session.history.is_empty());
        assert!(!session.ended);
        assert!(session.last_llm_call.is_none());
    }

    #[test]
    fn test_window_is_bounded_and_keeps_everything() {
        let mut history = HistoryBuffer::new(4);
        for i in 0..10 {
            history.append(Turn::user(format!("m{}", i)));
        }

        let window: Vec<&str> = history.window().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(window, vec!["m6", "m7", "m8", "m9"]);
        assert_eq!(history.len(), 10);
        assert_eq!(history.all()[0].text, "m0");
    }

    #[test]
    fn test_window_shorter_than_limit() {
        let mut history = HistoryBuffer::new(12);
        history.append(Turn::user("only"));
        assert_eq!(history.window().len(), 1);
    }

    #[test]
    fn test_last_by_role() {
        let mut history = HistoryBuffer::new(4);
        history.append(Turn::user("u1"));
        history.append(Turn::assistant("a1"));
        history.append(Turn::user("u2"));
        history.append(Turn::assistant("a2"));
        assert_eq!(history.last_by_role(Role::Assistant, 5), vec!["a2", "a1"]);
        assert_eq!(history.last_by_role(Role::User, 1), vec!["u2"]);
    }

    #[test]
    fn test_is_idle() {
        let session = Session::new("s", 4);
        let later = session.last_activity + chrono::Duration::seconds(61);
        assert!(session.is_idle(later, std::time::Duration::from_secs(60)));
        assert!(!session.is_idle(later, std::time::Duration::from_secs(120)));
    }

    #[test]
    fn test_invariant_violation() {
        let mut session = Session::new("s", 4);
        assert!(session.invariant_violation(5).is_none());

        session.turn_count = 1;
        assert!(session.invariant_violation(5).is_some());

        session.history.append(Turn::user("a"));
        session.history.append(Turn::assistant("b"));
        assert!(session.invariant_violation(5).is_none());

        session.turn_count = 5;
        assert!(session.invariant_violation(5).is_some());
        session.ended = true;
        session.turn_count = 1;
        assert!(session.invariant_violation(5).is_none());
    }

    #[test]
    fn test_rollback_only_drops_newer_turns() {
        let mut history = HistoryBuffer::new(4);
        history.append(Turn::user("kept"));
        let mark = history.len();
        history.append(Turn::user("dropped"));
        history.append(Turn::assistant("dropped too"));
        history.rollback(mark);
        assert_eq!(history.len(), 1);
        assert_eq!(history.all()[0].text, "kept");

        history.rollback(5);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_summary_extracts_from_user_turns_only() {
        let mut session = Session::new("s", 4);
        session.history.append(Turn::user("pay the fee to agent.rk@ybl now"));
        session.history.append(Turn::assistant("is 9876543210 your number?"));
        session.history.append(Turn::user("open http://kyc-update.example.com fast"));

        let summary = session.summary();
        assert_eq!(summary.extracted.upi_ids, vec!["agent.rk@ybl"]);
        assert_eq!(summary.extracted.links, vec!["http://kyc-update.example.com"]);
        assert!(summary.extracted.phones.is_empty());

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["extracted"]["upi_ids"][0], "agent.rk@ybl");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let turn = Turn::assistant("hi");
        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value["role"], "assistant");
    }
}
