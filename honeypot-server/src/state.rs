use std::sync::Arc;
use std::time::Duration;

use honeypot_agent::SessionOrchestrator;
use honeypot_core::config::Config;
use rand::Rng;

/// Random pause applied before a reply leaves the HTTP shell
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplyDelay {
    pub min: Duration,
    pub max: Duration,
}

impl ReplyDelay {
    pub fn from_secs(min: f64, max: f64) -> Self {
        let min = Duration::from_secs_f64(min.max(0.0));
        let max = Duration::from_secs_f64(max.max(0.0));
        Self { min, max }
    }

    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SessionOrchestrator>,
    /// Shared secret expected in `x-api-key`; `None` disables the check
    pub api_key: Option<String>,
    pub reply_delay: ReplyDelay,
}

impl AppState {
    pub fn new(orchestrator: Arc<SessionOrchestrator>, api_key: Option<String>) -> Self {
        Self {
            orchestrator,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            reply_delay: ReplyDelay::default(),
        }
    }

    /// Build the state the `serve` command runs with. Platform callers own
    /// their conversation ids, so ids they send are always adopted.
    pub fn from_config(config: &Config) -> Self {
        let mut config = config.clone();
        config.session.adopt_client_ids = true;
        let orchestrator = Arc::new(SessionOrchestrator::from_config(&config));
        Self::new(orchestrator, config.server.api_key.clone()).with_reply_delay(
            ReplyDelay::from_secs(
                config.session.reply_delay_min_secs,
                config.session.reply_delay_max_secs,
            ),
        )
    }

    pub fn with_reply_delay(mut self, delay: ReplyDelay) -> Self {
        self.reply_delay = delay;
        self
    }

    /// Whether a presented key satisfies the configured one
    pub fn authorized(&self, presented: Option<&str>) -> bool {
        match &self.api_key {
            None => true,
            Some(expected) => presented.map(str::trim) == Some(expected.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_delay_sample_stays_in_bounds() {
        let delay = ReplyDelay::from_secs(0.1, 0.3);
        for _ in 0..200 {
            let pause = delay.sample();
            assert!(pause >= Duration::from_millis(100));
            assert!(pause <= Duration::from_millis(300));
        }
    }

    #[test]
    fn test_reply_delay_collapsed_range() {
        let delay = ReplyDelay::from_secs(0.5, 0.5);
        assert_eq!(delay.sample(), Duration::from_millis(500));
        assert_eq!(ReplyDelay::default().sample(), Duration::ZERO);
    }

    #[test]
    fn test_from_config_adopts_client_ids() {
        let config = Config::default();
        assert!(!config.session.adopt_client_ids);
        let state = AppState::from_config(&config);
        assert_eq!(state.orchestrator.store().len(), 0);
        assert_eq!(
            state.reply_delay,
            ReplyDelay::from_secs(
                config.session.reply_delay_min_secs,
                config.session.reply_delay_max_secs
            )
        );
    }
}
