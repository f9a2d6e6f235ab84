//! Per-worker difficulty adjustment
//!
//! Steers each worker toward one share every 15 to 60 seconds by scaling its
//! difficulty after each accepted share.

use crate::config::VardiffConfig;
use std::time::Duration;

/// Vardiff controller anchored at the pool base difficulty
#[derive(Debug, Clone)]
pub struct VardiffController {
    config: VardiffConfig,
    base_difficulty: f64,
}

impl VardiffController {
    /// Create a controller
    pub fn new(config: VardiffConfig, base_difficulty: f64) -> Self {
        Self {
            config,
            base_difficulty,
        }
    }

    /// Lowest difficulty a worker can be assigned
    pub fn min_difficulty(&self) -> f64 {
        self.base_difficulty * self.config.min_multiplier
    }

    /// Highest difficulty a worker can be assigned
    pub fn max_difficulty(&self) -> f64 {
        self.base_difficulty * self.config.max_multiplier
    }

    /// New difficulty after a share, or `None` when unchanged
    pub fn adjust(&self, current: f64, since_last: Option<Duration>) -> Option<f64> {
        if !self.config.enabled {
            return None;
        }
        let gap = since_last?;

        let scaled = if gap < Duration::from_secs(self.config.fast_share_secs) {
            current * self.config.increase_factor
        } else if gap > Duration::from_secs(self.config.slow_share_secs) {
            current * self.config.decrease_factor
        } else {
            current
        };

        let next = scaled.clamp(self.min_difficulty(), self.max_difficulty());
        ((next - current).abs() > f64::EPSILON).then_some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn controller() -> VardiffController {
        VardiffController::new(VardiffConfig::default(), 1000.0)
    }

    #[test_case(5, Some(1100.0) ; "fast share raises")]
    #[test_case(30, None ; "in window unchanged")]
    #[test_case(90, Some(900.0) ; "slow share lowers")]
    fn test_adjust(gap_secs: u64, expected: Option<f64>) {
        let next = controller().adjust(1000.0, Some(Duration::from_secs(gap_secs)));
        match (next, expected) {
            (Some(n), Some(e)) => assert!((n - e).abs() < 1e-9, "{} != {}", n, e),
            (n, e) => assert_eq!(n, e),
        }
    }

    #[test]
    fn test_first_share_keeps_difficulty() {
        assert_eq!(controller().adjust(1000.0, None), None);
    }

    #[test]
    fn test_clamped_to_bounds() {
        let vardiff = controller();
        assert_eq!(
            vardiff.adjust(9_500.0, Some(Duration::from_secs(1))),
            Some(10_000.0)
        );
        assert_eq!(vardiff.adjust(10_000.0, Some(Duration::from_secs(1))), None);
        assert_eq!(
            vardiff.adjust(105.0, Some(Duration::from_secs(120))),
            Some(100.0)
        );
    }

    #[test]
    fn test_disabled() {
        let config = VardiffConfig {
            enabled: false,
            ..VardiffConfig::default()
        };
        let vardiff = VardiffController::new(config, 1000.0);
        assert_eq!(vardiff.adjust(1000.0, Some(Duration::from_secs(1))), None);
    }
}
