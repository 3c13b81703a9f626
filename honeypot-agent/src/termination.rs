//! When a conversation should end

use honeypot_core::session::Session;

/// Content-based end condition evaluated on every generated reply.
///
/// `inspect` may rewrite the reply (for example to strip a control token)
/// and returns whether the session should end.
pub trait EndSignal: Send + Sync {
    fn inspect(&self, reply: &mut String) -> bool;
}

/// Ends the session when the model emits a marker token. The marker is
/// removed from the reply before it is returned.
#[derive(Debug, Clone)]
pub struct EndMarker {
    marker: String,
}

impl EndMarker {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl EndSignal for EndMarker {
    fn inspect(&self, reply: &mut String) -> bool {
        if self.marker.is_empty() || !reply.contains(&self.marker) {
            return false;
        }
        *reply = reply
            .replace(&self.marker, " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        true
    }
}

/// Turn limit plus optional content signals
pub struct TerminationPolicy {
    max_turns: u32,
    signals: Vec<Box<dyn EndSignal>>,
}

impl TerminationPolicy {
    pub fn new(max_turns: u32) -> Self {
        Self {
            max_turns,
            signals: Vec::new(),
        }
    }

    pub fn with_signal(mut self, signal: Box<dyn EndSignal>) -> Self {
        self.signals.push(signal);
        self
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    /// Run the content signals over a generated reply
    pub fn inspect_reply(&self, reply: &mut String) -> bool {
        // every signal runs so each can clean up its own token
        self.signals
            .iter()
            .fold(false, |ended, signal| signal.inspect(reply) || ended)
    }

    pub fn limit_reached(&self, session: &Session) -> bool {
        session.turn_count >= self.max_turns
    }
}
