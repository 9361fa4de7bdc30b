//! Reconnect delay policy

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectPolicy {
    /// Same delay before every attempt
    Constant(Duration),
    /// `initial * factor^(attempt-1)`, capped at `max`
    Exponential {
        initial: Duration,
        max: Duration,
        factor: f64,
    },
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            ReconnectPolicy::Constant(delay) => *delay,
            ReconnectPolicy::Exponential {
                initial,
                max,
                factor,
            } => {
                let exponent = attempt.saturating_sub(1).min(63) as i32;
                let scaled = initial.as_secs_f64() * factor.max(1.0).powi(exponent);
                if !scaled.is_finite() || scaled >= max.as_secs_f64() {
                    *max
                } else {
                    Duration::from_secs_f64(scaled)
                }
            }
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Constant(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(5));
        assert_eq!(policy.delay(50), Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_caps_at_max() {
        let policy = ReconnectPolicy::Exponential {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(10),
            factor: 2.0,
        };
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_secs(1));
        assert_eq!(policy.delay(4), Duration::from_secs(4));
        assert_eq!(policy.delay(6), Duration::from_secs(10));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(10));
    }
}
