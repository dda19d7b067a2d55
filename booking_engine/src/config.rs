use std::time::Duration;

pub const DEFAULT_FAN_OUT: usize = 5;
pub const DEFAULT_OFFER_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HANDOFF_MAX_ATTEMPTS: i64 = 5;

/// Tunable policy for dispatch and handoff.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The maximum number of providers offered a single booking
    pub fan_out: usize,
    /// How long offers stay open
    pub offer_timeout: Duration,
    /// Wrong handoff codes tolerated before the gate locks
    pub handoff_max_attempts: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fan_out: DEFAULT_FAN_OUT,
            offer_timeout: DEFAULT_OFFER_TIMEOUT,
            handoff_max_attempts: DEFAULT_HANDOFF_MAX_ATTEMPTS,
        }
    }
}

impl EngineConfig {
    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out.max(1);
        self
    }

    pub fn with_offer_timeout(mut self, offer_timeout: Duration) -> Self {
        self.offer_timeout = offer_timeout;
        self
    }

    pub fn with_handoff_max_attempts(mut self, attempts: i64) -> Self {
        self.handoff_max_attempts = attempts.max(1);
        self
    }
}
