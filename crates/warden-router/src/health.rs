//! Per-provider health bookkeeping.
//!
//! A circuit breaker per profile: Closed (healthy), Open (failing, skip),
//! HalfOpen (one probe allowed). This state is the only router state
//! shared across requests, and it lives behind one mutex.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use warden_core::{ProfileName, Timestamp};

/// Consecutive transient failures before a provider's circuit opens.
pub const OPEN_THRESHOLD: u32 = 5;

/// Seconds an open circuit waits before allowing a probe attempt.
pub const RECOVERY_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Health snapshot for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub consecutive_failures: u32,
    pub circuit_state: CircuitState,
    pub last_success: Option<Timestamp>,
    pub last_failure: Option<Timestamp>,
    pub total_attempts: u64,
    pub total_failures: u64,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            circuit_state: CircuitState::Closed,
            last_success: None,
            last_failure: None,
            total_attempts: 0,
            total_failures: 0,
        }
    }
}

struct Breaker {
    health: ProviderHealth,
    opened_at: Option<Timestamp>,
}

/// Thread-safe health registry for all configured providers.
pub struct HealthRegistry {
    breakers: Mutex<HashMap<ProfileName, Breaker>>,
    threshold: u32,
    recovery_timeout_secs: u64,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            threshold: OPEN_THRESHOLD,
            recovery_timeout_secs: RECOVERY_TIMEOUT_SECS,
        }
    }

    /// Custom thresholds, for tests.
    pub fn with_limits(threshold: u32, recovery_timeout_secs: u64) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            threshold,
            recovery_timeout_secs,
        }
    }

    /// Whether the provider should be attempted. An open circuit whose
    /// recovery window has elapsed transitions to HalfOpen and allows one
    /// probe.
    pub fn should_attempt(&self, provider: &ProfileName) -> bool {
        let mut breakers = match self.breakers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let breaker = breakers.entry(provider.clone()).or_insert_with(|| Breaker {
            health: ProviderHealth::default(),
            opened_at: None,
        });
        match breaker.health.circuit_state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = breaker
                    .opened_at
                    .map(|t| Timestamp::now().seconds_since_epoch >= t.seconds_since_epoch + self.recovery_timeout_secs)
                    .unwrap_or(true);
                if elapsed {
                    breaker.health.circuit_state = CircuitState::HalfOpen;
                    tracing::info!(provider = %provider, "provider circuit half-open, probing");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self, provider: &ProfileName) {
        let mut breakers = match self.breakers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let breaker = breakers.entry(provider.clone()).or_insert_with(|| Breaker {
            health: ProviderHealth::default(),
            opened_at: None,
        });
        breaker.health.consecutive_failures = 0;
        breaker.health.last_success = Some(Timestamp::now());
        breaker.health.total_attempts += 1;
        if breaker.health.circuit_state != CircuitState::Closed {
            tracing::info!(provider = %provider, "provider circuit closed");
        }
        breaker.health.circuit_state = CircuitState::Closed;
        breaker.opened_at = None;
    }

    pub fn record_failure(&self, provider: &ProfileName) {
        let now = Timestamp::now();
        let mut breakers = match self.breakers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let breaker = breakers.entry(provider.clone()).or_insert_with(|| Breaker {
            health: ProviderHealth::default(),
            opened_at: None,
        });
        breaker.health.consecutive_failures += 1;
        breaker.health.last_failure = Some(now);
        breaker.health.total_attempts += 1;
        breaker.health.total_failures += 1;
        match breaker.health.circuit_state {
            CircuitState::Closed => {
                if breaker.health.consecutive_failures >= self.threshold {
                    breaker.health.circuit_state = CircuitState::Open;
                    breaker.opened_at = Some(now);
                    tracing::warn!(
                        provider = %provider,
                        consecutive_failures = breaker.health.consecutive_failures,
                        "provider circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                breaker.health.circuit_state = CircuitState::Open;
                breaker.opened_at = Some(now);
                tracing::warn!(provider = %provider, "provider circuit reopened after failed probe");
            }
            CircuitState::Open => {
                breaker.opened_at = Some(now);
            }
        }
    }

    /// Health snapshot for one provider, if it has been attempted.
    pub fn health(&self, provider: &ProfileName) -> Option<ProviderHealth> {
        let breakers = match self.breakers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        breakers.get(provider).map(|b| b.health.clone())
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> ProfileName {
        ProfileName::new(n)
    }

    #[test]
    fn test_fresh_provider_is_attemptable() {
        let registry = HealthRegistry::new();
        assert!(registry.should_attempt(&name("a")));
    }

    #[test]
    fn test_circuit_opens_at_threshold() {
        let registry = HealthRegistry::with_limits(3, 60);
        let provider = name("a");
        for _ in 0..2 {
            registry.record_failure(&provider);
            assert!(registry.should_attempt(&provider));
        }
        registry.record_failure(&provider);
        assert!(!registry.should_attempt(&provider));
        assert_eq!(
            registry.health(&provider).unwrap().circuit_state,
            CircuitState::Open
        );
    }

    #[test]
    fn test_success_resets_failures() {
        let registry = HealthRegistry::with_limits(3, 60);
        let provider = name("a");
        registry.record_failure(&provider);
        registry.record_failure(&provider);
        registry.record_success(&provider);
        let health = registry.health(&provider).unwrap();
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.circuit_state, CircuitState::Closed);
        assert_eq!(health.total_failures, 2);
    }

    #[test]
    fn test_open_circuit_probes_after_recovery_window() {
        let registry = HealthRegistry::with_limits(1, 0);
        let provider = name("a");
        registry.record_failure(&provider);
        // Zero-second recovery window: first re-check transitions HalfOpen.
        assert!(registry.should_attempt(&provider));
        assert_eq!(
            registry.health(&provider).unwrap().circuit_state,
            CircuitState::HalfOpen
        );
        // A failed probe reopens.
        registry.record_failure(&provider);
        assert_eq!(
            registry.health(&provider).unwrap().circuit_state,
            CircuitState::Open
        );
    }

    #[test]
    fn test_successful_probe_closes_circuit() {
        let registry = HealthRegistry::with_limits(1, 0);
        let provider = name("a");
        registry.record_failure(&provider);
        assert!(registry.should_attempt(&provider));
        registry.record_success(&provider);
        assert_eq!(
            registry.health(&provider).unwrap().circuit_state,
            CircuitState::Closed
        );
    }
}
