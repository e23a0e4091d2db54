//! Probabilistic fault injection applied between hello inspection and dial.

use crate::error::ConfigError;
use rand::Rng;
use std::time::Duration;

/// Verdict for a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultDecision {
    None,
    /// Drop the client without dialing the backend.
    Abort,
    /// Stall before dialing, then proceed normally.
    Delay(Duration),
}

/// Process-wide fault settings. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultConfig {
    rate: f64,
    delay: Duration,
}

impl FaultConfig {
    /// A zero `delay` selects the abort policy, anything else the delay policy.
    pub fn new(rate: f64, delay: Duration) -> Result<Self, ConfigError> {
        if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
            return Err(ConfigError::InvalidFaultRate(rate));
        }
        Ok(Self { rate, delay })
    }

    /// Never injects anything.
    pub fn disabled() -> Self {
        Self {
            rate: 0.0,
            delay: Duration::ZERO,
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Draw one sample and turn it into a verdict.
    pub fn decide(&self, rng: &mut impl Rng) -> FaultDecision {
        if !should_inject(self.rate, rng) {
            return FaultDecision::None;
        }
        if self.delay.is_zero() {
            FaultDecision::Abort
        } else {
            FaultDecision::Delay(self.delay)
        }
    }
}

fn should_inject(probability: f64, rng: &mut impl Rng) -> bool {
    rng.gen::<f64>() < probability
}

/// Perform the pause for a `Delay` verdict; no-op otherwise.
pub async fn apply_delay(decision: FaultDecision) {
    if let FaultDecision::Delay(duration) = decision {
        tokio::time::sleep(duration).await;
    }
}
