//! Background eviction of idle sessions

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::orchestrator::SessionOrchestrator;

/// Periodically evicts sessions that have been idle for too long
pub struct SessionSweeper {
    orchestrator: Arc<SessionOrchestrator>,
    interval: Duration,
    idle_timeout: Duration,
    running: Arc<RwLock<bool>>,
    task: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl SessionSweeper {
    /// Create a new sweeper
    pub fn new(
        orchestrator: Arc<SessionOrchestrator>,
        interval: Duration,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            interval,
            idle_timeout,
            running: Arc::new(RwLock::new(false)),
            task: Arc::new(RwLock::new(None)),
        }
    }

    /// Start the sweep loop
    pub async fn start(&self) {
        {
            let running_guard = self.running.read().await;
            if *running_guard {
                debug!("Session sweeper already running");
                return;
            }
        }

        *self.running.write().await = true;

        let handle = SweeperHandle {
            orchestrator: Arc::clone(&self.orchestrator),
            idle_timeout: self.idle_timeout,
            running: Arc::clone(&self.running),
        };
        let interval = self.interval;
        let task = tokio::spawn(async move {
            handle.run_loop(interval).await;
        });

        *self.task.write().await = Some(task);
        info!(
            "Session sweeper started (every {:?}, idle after {:?})",
            self.interval, self.idle_timeout
        );
    }

    /// Stop the sweep loop
    pub async fn stop(&self) {
        *self.running.write().await = false;

        let mut task_guard = self.task.write().await;
        if let Some(task) = task_guard.take() {
            task.abort();
        }
    }

    /// Check if the sweeper is running
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Run one sweep immediately
    pub fn sweep_now(&self) -> Vec<String> {
        sweep(&self.orchestrator, self.idle_timeout)
    }
}

/// State moved into the background task
struct SweeperHandle {
    orchestrator: Arc<SessionOrchestrator>,
    idle_timeout: Duration,
    running: Arc<RwLock<bool>>,
}

impl SweeperHandle {
    async fn run_loop(&self, interval: Duration) {
        loop {
            tokio::time::sleep(interval).await;

            if !*self.running.read().await {
                break;
            }

            sweep(&self.orchestrator, self.idle_timeout);
        }
    }
}

fn sweep(orchestrator: &SessionOrchestrator, idle_timeout: Duration) -> Vec<String> {
    let removed = orchestrator.sweep_idle(idle_timeout);
    if !removed.is_empty() {
        info!(
            "Evicted {} idle session(s), {} remaining",
            removed.len(),
            orchestrator.store().len()
        );
    }
    removed
}
