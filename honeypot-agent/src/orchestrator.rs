//! Session orchestration: one inbound message in, one reply out

use chrono::Utc;
use futures::FutureExt;
use honeypot_core::config::Config;
use honeypot_core::session::{RateLimiter, Session, SessionStore, Turn};
use honeypot_core::utils::{redact_sensitive, truncate};
use honeypot_core::{InboundMessage, OutboundReply};
use honeypot_providers::{build_router, FallbackRouter};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::context::ContextBuilder;
use crate::stalling::StallingReplies;
use crate::termination::{EndMarker, TerminationPolicy};

const PREVIEW_LEN: usize = 120;

/// Knobs for [`SessionOrchestrator`], usually taken from [`Config`]
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_turns: u32,
    pub history_window: usize,
    pub min_call_delay_secs: f64,
    pub adopt_client_ids: bool,
    pub end_marker: Option<String>,
    pub system_prompt: String,
    pub closing_message: String,
    pub stall_replies: Vec<String>,
    pub redact_replies: bool,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_turns: config.session.max_turns,
            history_window: config.session.history_window,
            min_call_delay_secs: config.session.min_call_delay_secs,
            adopt_client_ids: config.session.adopt_client_ids,
            end_marker: config
                .session
                .end_marker
                .clone()
                .filter(|m| !m.trim().is_empty()),
            system_prompt: config.persona.system_prompt.clone(),
            closing_message: config.persona.closing_message.clone(),
            stall_replies: config.persona.stall_replies.clone(),
            redact_replies: config.persona.redact_replies,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// How the reply for one exchange was obtained
enum Outcome {
    Generated(String),
    RateLimited,
    Degraded,
}

/// Top-level coordinator.
///
/// Each call to [`handle`](Self::handle) holds the session's own lock for
/// the whole exchange, provider call included, so messages for one session
/// are processed strictly one after another while different sessions run
/// in parallel.
pub struct SessionOrchestrator {
    store: Arc<SessionStore>,
    limiter: Arc<RateLimiter>,
    router: FallbackRouter,
    context: ContextBuilder,
    stalls: StallingReplies,
    termination: TerminationPolicy,
    closing_message: String,
    redact_replies: bool,
}

impl SessionOrchestrator {
    pub fn new(settings: OrchestratorSettings, router: FallbackRouter) -> Self {
        let mut termination = TerminationPolicy::new(settings.max_turns.max(1));
        if let Some(marker) = settings.end_marker {
            termination = termination.with_signal(Box::new(EndMarker::new(marker)));
        }

        Self {
            store: Arc::new(SessionStore::new(
                settings.history_window,
                settings.adopt_client_ids,
            )),
            limiter: Arc::new(RateLimiter::from_secs_f64(settings.min_call_delay_secs)),
            router,
            context: ContextBuilder::new(settings.system_prompt),
            stalls: StallingReplies::new(settings.stall_replies),
            termination,
            closing_message: settings.closing_message,
            redact_replies: settings.redact_replies,
        }
    }

    /// Build the orchestrator and its provider chain from configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            OrchestratorSettings::from_config(config),
            build_router(&config.providers),
        )
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn router(&self) -> &FallbackRouter {
        &self.router
    }

    /// Process one inbound message. Always returns a well-formed reply.
    pub async fn handle(&self, inbound: InboundMessage) -> OutboundReply {
        let (session_id, handle) = self.store.get_or_create(inbound.session_id.as_deref());
        debug!(
            session_id = %session_id,
            "Inbound: {}",
            truncate(&inbound.text, PREVIEW_LEN)
        );

        // the guard outlives a panic in `process`, so the reset below happens
        // before any queued request for this session gets the lock
        let mut session = handle.lock().await;
        let processed = AssertUnwindSafe(self.process(&session_id, &mut session, inbound.text))
            .catch_unwind()
            .await;

        match processed {
            Ok(reply) => reply,
            Err(_) => {
                error!(session_id = %session_id, "panic while handling message, resetting session");
                self.limiter.forget(&session_id);
                *session = Session::new(session_id.as_str(), self.store.history_window());
                let line = self.stalls.pick(&session);
                OutboundReply::new(line, session_id, false)
            }
        }
    }

    /// Convenience wrapper around [`handle`](Self::handle)
    pub async fn handle_text(&self, session_id: Option<&str>, text: &str) -> OutboundReply {
        self.handle(InboundMessage::new(session_id.map(ToString::to_string), text))
            .await
    }

    async fn process(&self, session_id: &str, session: &mut Session, text: String) -> OutboundReply {
        if session.ended {
            debug!(session_id = %session_id, "session already ended, sending closing message");
            return OutboundReply::new(self.closing_message.clone(), session_id, true);
        }

        if let Some(problem) = session.invariant_violation(self.termination.max_turns()) {
            error!(session_id = %session_id, "corrupted session state ({}), resetting", problem);
            *session = Session::new(session_id, self.store.history_window());
            self.limiter.forget(session_id);
        }

        let mark = session.history.len();
        session.history.append(Turn::user(text));
        session.touch();

        let outcome = if self.limiter.allow(session_id) {
            self.limiter.record(session_id, Instant::now());
            session.last_llm_call = Some(Utc::now());
            let request = self.context.build_request(session);
            match self.router.generate(&request).await {
                Ok(reply) => {
                    debug!(session_id = %session_id, provider = %reply.provider, "reply generated");
                    Outcome::Generated(reply.text)
                }
                Err(err) => {
                    warn!(session_id = %session_id, "all providers failed: {}", err);
                    Outcome::Degraded
                }
            }
        } else {
            debug!(session_id = %session_id, "call inside minimum delay, stalling");
            Outcome::RateLimited
        };

        let (reply, counted, signalled) = match outcome {
            Outcome::Generated(mut text) => {
                let signalled = self.termination.inspect_reply(&mut text);
                if text.trim().is_empty() {
                    text = if signalled {
                        self.closing_message.clone()
                    } else {
                        self.stall(session)
                    };
                }
                (text, true, signalled)
            }
            Outcome::RateLimited => (self.stall(session), true, false),
            Outcome::Degraded => (self.stall(session), false, false),
        };

        let reply = if self.redact_replies {
            redact_sensitive(&reply)
        } else {
            reply
        };

        session.history.append(Turn::assistant(reply.clone()));
        session.touch();

        // exhaustion is not an exchange: no count and no termination check.
        // Only the first `max_turns` failed exchanges are retained.
        if !counted {
            session.degraded_count = session.degraded_count.saturating_add(1);
            if session.degraded_count > self.termination.max_turns() {
                session.history.rollback(mark);
            }
        }
        if counted {
            session.turn_count += 1;
            if signalled || self.termination.limit_reached(session) {
                session.ended = true;
                info!(
                    session_id = %session_id,
                    turns = session.turn_count,
                    "session ended"
                );
            }
        }

        info!(
            session_id = %session_id,
            turn = session.turn_count,
            "Reply: {}",
            truncate(&reply, PREVIEW_LEN)
        );

        OutboundReply::new(reply, session_id, session.ended)
    }

    fn stall(&self, session: &mut Session) -> String {
        let line = self.stalls.pick(session);
        session.stall_count += 1;
        line
    }

    /// Evict sessions idle for at least `idle` together with their pacing
    /// and provider-side state. Returns the evicted ids.
    pub fn sweep_idle(&self, idle: Duration) -> Vec<String> {
        let removed = self.store.sweep(idle);
        for id in &removed {
            self.limiter.forget(id);
            self.router.forget_session(id);
        }
        removed
    }
}
