use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_ALERT_COOLDOWN: Duration = Duration::from_secs(60 * 60);

/// Outcome of one [`AlertGate::evaluate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    /// Nothing required was missing.
    NotRequired,
    /// Send the alert now. The gate has already recorded it.
    Fire,
    /// An alert went out recently; this one is dropped.
    Suppressed { remaining: Duration },
}

impl AlertDecision {
    pub fn should_fire(&self) -> bool {
        matches!(self, AlertDecision::Fire)
    }
}

/// Read-only view of the gate, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertSnapshot {
    pub alerts_fired: u64,
    pub alerts_suppressed: u64,
    pub last_alert_at: Option<Instant>,
}

// `last_alert_at == None` is the quiet state: no alert has ever been sent.
#[derive(Debug, Default)]
struct AlertState {
    last_alert_at: Option<Instant>,
    fired: u64,
    suppressed: u64,
}

/// Cooldown gate for missing-parameter alerts.
///
/// The first alert always fires. After that an alert fires only once more than `cooldown`
/// has elapsed since the previous one. The check and the update happen under one lock, so
/// concurrent callers can never both fire for the same window.
#[derive(Debug)]
pub struct AlertGate {
    cooldown: Duration,
    state: Mutex<AlertState>,
}

impl AlertGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            state: Mutex::new(AlertState::default()),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn evaluate(&self, missing_required: bool, now: Instant) -> AlertDecision {
        if !missing_required {
            return AlertDecision::NotRequired;
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let decision = match state.last_alert_at {
            None => AlertDecision::Fire,
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                if elapsed > self.cooldown {
                    AlertDecision::Fire
                } else {
                    AlertDecision::Suppressed {
                        remaining: self.cooldown - elapsed,
                    }
                }
            }
        };

        match decision {
            AlertDecision::Fire => {
                state.last_alert_at = Some(now);
                state.fired += 1;
            }
            AlertDecision::Suppressed { .. } => state.suppressed += 1,
            AlertDecision::NotRequired => {}
        }
        decision
    }

    pub fn snapshot(&self) -> AlertSnapshot {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        AlertSnapshot {
            alerts_fired: state.fired,
            alerts_suppressed: state.suppressed,
            last_alert_at: state.last_alert_at,
        }
    }
}

impl Default for AlertGate {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_COOLDOWN)
    }
}
