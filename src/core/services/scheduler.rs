// src/core/services/scheduler.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use super::state_machine::{TickOutcome, VerificationStateMachine};

/// Shared between a session's timer and the ticks it spawned. Once set, no
/// tick may change the session any more.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct TimerHandle {
    cancel: CancelFlag,
    task: JoinHandle<()>,
}

/// One timer per session: polls on a fixed cadence, enforces the absolute
/// deadline, and removes finished sessions after the grace period.
pub struct PollScheduler {
    machine: Arc<VerificationStateMachine>,
    poll_interval: Duration,
    grace_period: Duration,
    timers: Arc<Mutex<HashMap<String, TimerHandle>>>,
}

impl PollScheduler {
    pub fn new(
        machine: Arc<VerificationStateMachine>,
        poll_interval: Duration,
        grace_period: Duration,
    ) -> Self {
        Self {
            machine,
            poll_interval,
            grace_period,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Starts the session's timer. Must be called from within a Tokio runtime.
    pub fn start(&self, session_id: &str, deadline: Instant) {
        let cancel = CancelFlag::new();
        let timer = SessionTimer {
            machine: self.machine.clone(),
            session_id: session_id.to_string(),
            cancel: cancel.clone(),
            poll_interval: self.poll_interval,
            grace_period: self.grace_period,
            deadline,
            timers: self.timers.clone(),
        };

        // hold the lock across spawn so the task cannot deregister before it is registered
        let mut timers = self.timers.lock();
        let task = tokio::spawn(timer.run());
        if let Some(previous) = timers.insert(session_id.to_string(), TimerHandle { cancel, task }) {
            previous.cancel.cancel();
            previous.task.abort();
        }
        debug!(session_id, "Timer started");
    }

    /// Cancels a session's timer. In-flight ticks finish but cannot commit.
    pub fn stop(&self, session_id: &str) -> bool {
        match self.timers.lock().remove(session_id) {
            Some(handle) => {
                handle.cancel.cancel();
                handle.task.abort();
                debug!(session_id, "Timer stopped");
                true
            }
            None => false,
        }
    }

    pub fn active_timers(&self) -> usize {
        self.timers.lock().len()
    }

    /// Cancels every timer and waits for the tasks to wind down.
    pub async fn shutdown(&self) {
        let handles: Vec<TimerHandle> = self.timers.lock().drain().map(|(_, h)| h).collect();
        info!("Stopping {} session timers", handles.len());

        let tasks = handles.into_iter().map(|handle| {
            handle.cancel.cancel();
            handle.task.abort();
            handle.task
        });
        futures::future::join_all(tasks).await;
    }
}

struct SessionTimer {
    machine: Arc<VerificationStateMachine>,
    session_id: String,
    cancel: CancelFlag,
    poll_interval: Duration,
    grace_period: Duration,
    deadline: Instant,
    timers: Arc<Mutex<HashMap<String, TimerHandle>>>,
}

impl SessionTimer {
    async fn run(self) {
        let finished = tokio::select! {
            biased;
            _ = sleep_until(self.deadline) => {
                self.cancel.cancel();
                if self.machine.expire(&self.session_id).await {
                    None
                } else {
                    // a tick reached a terminal state just before the deadline
                    self.machine.finished_status(&self.session_id)
                }
            }
            outcome = self.poll_until_finished() => match outcome {
                TickOutcome::Finished(status) => Some(status),
                _ => None,
            },
        };

        if let Some(status) = finished {
            debug!(session_id = %self.session_id, %status, "Session finished, removing after grace period");
            sleep(self.grace_period).await;
            self.machine.retire(&self.session_id);
        }

        self.timers.lock().remove(&self.session_id);
    }

    async fn poll_until_finished(&self) -> TickOutcome {
        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if self.cancel.is_cancelled() {
                return TickOutcome::Gone;
            }

            // A tick runs as its own task: if the deadline fires while it is
            // blocked on the agent, it still completes, and its commit is refused.
            let machine = self.machine.clone();
            let session_id = self.session_id.clone();
            let cancel = self.cancel.clone();
            let tick = tokio::spawn(async move { machine.poll(&session_id, &cancel).await });

            match tick.await {
                Ok(TickOutcome::Pending) => {}
                Ok(outcome) => return outcome,
                Err(e) => error!(session_id = %self.session_id, "Poll tick aborted: {}", e),
            }
        }
    }
}
