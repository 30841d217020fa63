//! The lock decision loop.
//!
//! Each cycle samples idle time, optionally waits out a nearby companion
//! device, warns, re-checks and finally locks:
//!
//! - Not idle yet: sleep exactly until the threshold would be reached
//! - Idle, companion connected: block until it disconnects, then lock at once
//! - Idle otherwise: warn, wait the grace period, lock only if still idle
//!
//! Everything runs sequentially; the loop never waits on a sleep and the
//! companion at the same time.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::config::Settings;
use crate::config::Timings;
use crate::domain::Urgency;
use crate::idle;
use crate::idle::IdlePolicy;
use crate::idle::IdleProbe;
use crate::lock::LockInvoker;
use crate::lock::LockOutcome;
use crate::notify::Notifier;
use crate::proximity;
use crate::proximity::ProximityProbe;

/// Phase of the current cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Waiting,
    CheckingIdle,
    CheckingProximity,
    Warning,
    Locking,
}

/// State threaded from one cycle to the next.
#[derive(Debug, Default)]
pub struct LoopState {
    /// Phase the last cycle reached.
    pub phase: Phase,

    /// Id of the last notification shown, 0 if none.
    pub replace_id: u32,
}

/// How a cycle ended.
#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Not idle yet; slept for the remaining time.
    Waited(Duration),
    /// Idle query failed; slept for the retry backoff.
    QueryFailed,
    /// Warned, but the user came back before the grace period ended.
    Abandoned,
    /// Lock command was run. `warned` is false when the companion left.
    Locked { warned: bool, outcome: LockOutcome },
}

/// Decision loop owning all components.
pub struct Autolocker<I, P, N, L> {
    idle: I,
    companion: Option<P>,
    notifier: N,
    locker: L,
    max_idle: Duration,
    policy: IdlePolicy,
    timings: Timings,
}

impl<I, P, N, L> Autolocker<I, P, N, L>
where
    I: IdleProbe,
    P: ProximityProbe,
    N: Notifier,
    L: LockInvoker,
{
    /// Create a loop from its components and validated settings.
    pub fn new(idle: I, companion: Option<P>, notifier: N, locker: L, settings: &Settings) -> Self {
        Self {
            idle,
            companion,
            notifier,
            locker,
            max_idle: settings.max_idle,
            policy: settings.idle_policy,
            timings: settings.timings,
        }
    }

    /// Run forever.
    pub async fn run(mut self) {
        let mut state = LoopState::default();
        self.announce(&mut state).await;

        loop {
            let outcome = self.run_cycle(&mut state).await;
            trace!("Cycle finished: {:?}", outcome);
        }
    }

    /// Send the one-time startup notification.
    pub async fn announce(&mut self, state: &mut LoopState) {
        self.send_notification(state, "Autolocker started", Urgency::Normal)
            .await;
    }

    /// Run a single cycle of the decision loop.
    pub async fn run_cycle(&mut self, state: &mut LoopState) -> CycleOutcome {
        state.phase = Phase::CheckingIdle;
        let sample = match self.idle.sample() {
            Ok(sample) => sample,
            Err(e) => {
                warn!(
                    "Failed to query idle time: {}. Retrying in {:?}",
                    e, self.timings.idle_retry
                );
                state.phase = Phase::Waiting;
                sleep(self.timings.idle_retry).await;
                return CycleOutcome::QueryFailed;
            }
        };

        let remaining = self.policy.remaining(&sample, self.max_idle);
        if !remaining.is_zero() {
            state.phase = Phase::Waiting;
            debug!(
                "Idle for {:?}, sleeping for {:?}",
                sample.since_input, remaining
            );
            sleep(remaining).await;
            return CycleOutcome::Waited(remaining);
        }

        let mut warned = true;
        if let Some(companion) = &self.companion {
            state.phase = Phase::CheckingProximity;
            warned = !proximity::companion_was_present(companion).await;
        }

        if warned {
            state.phase = Phase::Warning;
            let message = format!("Locking in {} seconds", self.timings.warning.as_secs());
            self.send_notification(state, &message, Urgency::Critical)
                .await;
            sleep(self.timings.warning).await;

            if let Err(resume_in) = self.recheck_idle() {
                info!("Activity during warning period, not locking");
                sleep(resume_in).await;
                return CycleOutcome::Abandoned;
            }
        }

        state.phase = Phase::Locking;
        let outcome = self.locker.invoke().await;
        sleep(self.timings.debounce).await;

        CycleOutcome::Locked { warned, outcome }
    }

    /// Re-sample idle time against the plain threshold.
    ///
    /// When not idle, returns how long to wait before the next cycle. Under the
    /// screensaver policy an active screensaver would report idle again at
    /// once, so the wait runs until the threshold could be reached.
    fn recheck_idle(&mut self) -> Result<(), Duration> {
        match self.idle.sample() {
            Ok(sample) => {
                debug!("Idle time after warning: {:?}", sample.since_input);
                if idle::is_idle(&sample, self.max_idle) {
                    return Ok(());
                }
                match self.policy {
                    IdlePolicy::Threshold => Err(Duration::ZERO),
                    IdlePolicy::Screensaver => {
                        Err(self.max_idle.saturating_sub(sample.since_input))
                    }
                }
            }
            Err(e) => {
                warn!("Failed to re-check idle time: {}", e);
                Err(Duration::ZERO)
            }
        }
    }

    /// Send a notification, replacing the previous one. Delivery is best effort.
    async fn send_notification(&mut self, state: &mut LoopState, message: &str, urgency: Urgency) {
        match self
            .notifier
            .notify(message, urgency, state.replace_id)
            .await
        {
            Ok(id) => state.replace_id = id,
            Err(e) => warn!("{}", e),
        }
    }
}
