//! Idle detection.
//!
//! Raw samples come from the display server (see [`x11`]); an [`IdlePolicy`]
//! turns a sample into the time left until the session counts as idle.

pub mod x11;

use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub use x11::X11IdleProbe;

/// Remaining time reported when the screensaver state cannot be trusted.
pub const UNTRUSTED_STATE_POLL: Duration = Duration::from_millis(60_000);

/// Screensaver state accompanying an idle sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreensaverState {
    /// Screensaver not active, normal operation.
    Off,
    /// Screensaver active, screen blanked.
    On,
    /// Screensaver cycling.
    Cycle,
    /// Screensaver disabled on the display server.
    Disabled,
    /// State code not recognized.
    Unknown(u8),
}

impl From<u8> for ScreensaverState {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Off,
            1 => Self::On,
            2 => Self::Cycle,
            3 => Self::Disabled,
            other => Self::Unknown(other),
        }
    }
}

/// A single idle reading from the display server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleSample {
    /// Time since the last user input.
    pub since_input: Duration,

    /// Screensaver state at the time of the sample.
    pub screensaver: ScreensaverState,
}

#[cfg(test)]
impl IdleSample {
    /// Create a sample with the screensaver off.
    pub fn from_millis(ms_since_input: u64) -> Self {
        Self {
            since_input: Duration::from_millis(ms_since_input),
            screensaver: ScreensaverState::Off,
        }
    }
}

/// How an [`IdleSample`] is turned into remaining idle time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IdlePolicy {
    /// Only time since last input counts (default).
    #[default]
    Threshold,
    /// An active screensaver means idle now; a disabled or unknown
    /// screensaver state falls back to polling every minute.
    Screensaver,
}

impl IdlePolicy {
    /// Time left until `max_idle` is reached. Zero means idle now.
    pub fn remaining(self, sample: &IdleSample, max_idle: Duration) -> Duration {
        match self {
            Self::Threshold => max_idle.saturating_sub(sample.since_input),
            Self::Screensaver => match sample.screensaver {
                ScreensaverState::On | ScreensaverState::Cycle => Duration::ZERO,
                ScreensaverState::Off => max_idle.saturating_sub(sample.since_input),
                ScreensaverState::Disabled | ScreensaverState::Unknown(_) => UNTRUSTED_STATE_POLL,
            },
        }
    }
}

/// Whether the threshold has been reached, ignoring the screensaver state.
pub fn is_idle(sample: &IdleSample, max_idle: Duration) -> bool {
    sample.since_input >= max_idle
}

/// Errors from the idle query.
#[derive(Error, Debug)]
pub enum IdleError {
    #[error("Failed to connect to X display: {0}")]
    Connect(#[from] x11rb::errors::ConnectError),

    #[error("X connection failed: {0}")]
    Connection(#[from] x11rb::errors::ConnectionError),

    #[error("Screensaver query failed: {0}")]
    Reply(#[from] x11rb::errors::ReplyError),

    #[error("X screen {0} not found")]
    NoScreen(usize),
}

/// Source of raw idle samples.
pub trait IdleProbe: Send {
    /// Query the display server for the current idle sample.
    fn sample(&mut self) -> Result<IdleSample, IdleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_IDLE: Duration = Duration::from_millis(30_000);

    fn sample(ms: u64, screensaver: ScreensaverState) -> IdleSample {
        IdleSample {
            since_input: Duration::from_millis(ms),
            screensaver,
        }
    }

    #[test]
    fn test_threshold_below_limit() {
        for ms in [0, 1, 15_000, 29_999] {
            assert_eq!(
                IdlePolicy::Threshold.remaining(&IdleSample::from_millis(ms), MAX_IDLE),
                Duration::from_millis(30_000 - ms)
            );
        }
    }

    #[test]
    fn test_threshold_at_and_past_limit() {
        for ms in [30_000, 30_001, 120_000] {
            assert_eq!(
                IdlePolicy::Threshold.remaining(&IdleSample::from_millis(ms), MAX_IDLE),
                Duration::ZERO
            );
        }
    }

    #[test]
    fn test_threshold_ignores_screensaver() {
        let s = sample(10_000, ScreensaverState::Disabled);
        assert_eq!(
            IdlePolicy::Threshold.remaining(&s, MAX_IDLE),
            Duration::from_millis(20_000)
        );
    }

    #[test]
    fn test_screensaver_active_is_idle_now() {
        for state in [ScreensaverState::On, ScreensaverState::Cycle] {
            assert_eq!(
                IdlePolicy::Screensaver.remaining(&sample(0, state), MAX_IDLE),
                Duration::ZERO
            );
        }
    }

    #[test]
    fn test_screensaver_off_uses_threshold() {
        let policy = IdlePolicy::Screensaver;
        assert_eq!(
            policy.remaining(&sample(12_000, ScreensaverState::Off), MAX_IDLE),
            Duration::from_millis(18_000)
        );
        assert_eq!(
            policy.remaining(&sample(45_000, ScreensaverState::Off), MAX_IDLE),
            Duration::ZERO
        );
    }

    #[test]
    fn test_screensaver_untrusted_falls_back() {
        let policy = IdlePolicy::Screensaver;
        for state in [ScreensaverState::Disabled, ScreensaverState::Unknown(9)] {
            assert_eq!(
                policy.remaining(&sample(90_000, state), MAX_IDLE),
                UNTRUSTED_STATE_POLL
            );
        }
    }

    #[test]
    fn test_state_codes() {
        assert_eq!(ScreensaverState::from(0), ScreensaverState::Off);
        assert_eq!(ScreensaverState::from(1), ScreensaverState::On);
        assert_eq!(ScreensaverState::from(2), ScreensaverState::Cycle);
        assert_eq!(ScreensaverState::from(3), ScreensaverState::Disabled);
        assert_eq!(ScreensaverState::from(7), ScreensaverState::Unknown(7));
    }

    #[test]
    fn test_is_idle() {
        assert!(!is_idle(&IdleSample::from_millis(29_999), MAX_IDLE));
        assert!(is_idle(&IdleSample::from_millis(30_000), MAX_IDLE));
        assert!(is_idle(&IdleSample::from_millis(35_000), MAX_IDLE));
    }
}
