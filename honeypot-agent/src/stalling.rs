//! Canned replies used when no model reply is available

use honeypot_core::config::default_stall_replies;
use honeypot_core::session::{Role, Session};
use honeypot_core::utils::normalize_text;

/// Assistant turns checked for repeats
const RECENT_REPLIES: usize = 6;

/// Rotates through a pool of stalling lines without repeating what the
/// session said recently
#[derive(Debug, Clone)]
pub struct StallingReplies {
    pool: Vec<String>,
}

impl StallingReplies {
    /// Blank lines are dropped. An empty pool falls back to the built-in lines.
    pub fn new(lines: Vec<String>) -> Self {
        let pool: Vec<String> = lines
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if pool.is_empty() {
            Self {
                pool: default_stall_replies(),
            }
        } else {
            Self { pool }
        }
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Choose a line for `session`. Deterministic for a given session state.
    pub fn pick(&self, session: &Session) -> String {
        let offset = seed(&session.id).wrapping_add(session.stall_count as usize) % self.pool.len();
        let recent: Vec<String> = session
            .history
            .last_by_role(Role::Assistant, RECENT_REPLIES)
            .into_iter()
            .map(normalize_text)
            .collect();

        (0..self.pool.len())
            .map(|i| &self.pool[(offset + i) % self.pool.len()])
            .find(|line| !recent.contains(&normalize_text(line)))
            .unwrap_or(&self.pool[offset])
            .clone()
    }
}

impl Default for StallingReplies {
    fn default() -> Self {
        Self::new(default_stall_replies())
    }
}

fn seed(session_id: &str) -> usize {
    session_id
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use honeypot_core::session::Turn;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_pool_uses_defaults() {
        let stalls = StallingReplies::new(lines(&["", "   "]));
        assert_eq!(stalls.len(), default_stall_replies().len());
    }

    #[test]
    fn test_pick_is_deterministic() {
        let stalls = StallingReplies::default();
        let session = Session::new("abc", 4);
        assert_eq!(stalls.pick(&session), stalls.pick(&session));
    }

    #[test]
    fn test_pick_avoids_recent_replies() {
        let stalls = StallingReplies::new(lines(&["one sec", "wait what", "hmm ok"]));
        let mut session = Session::new("abc", 4);

        let mut said = Vec::new();
        for _ in 0..3 {
            let line = stalls.pick(&session);
            session.history.append(Turn::user("?"));
            session.history.append(Turn::assistant(line.clone()));
            session.stall_count += 1;
            said.push(line);
        }
        said.sort();
        said.dedup();
        assert_eq!(said.len(), 3);
    }

    #[test]
    fn test_repeats_match_after_normalization() {
        let stalls = StallingReplies::new(lines(&["One sec!", "Hmm, ok."]));
        let mut session = Session::new("x", 4);
        session.history.append(Turn::assistant("one sec"));
        assert_eq!(stalls.pick(&session), "Hmm, ok.");
    }

    #[test]
    fn test_exhausted_pool_still_answers() {
        let stalls = StallingReplies::new(lines(&["only line"]));
        let mut session = Session::new("x", 4);
        session.history.append(Turn::assistant("only line"));
        assert_eq!(stalls.pick(&session), "only line");
    }
}
