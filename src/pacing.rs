use std::time::Duration;

use rand::Rng;

use crate::config::PacingConfig;

/// Decides how long to wait between requests.
///
/// Stateless: every delay is drawn fresh from the configured ranges, the only
/// input from history is the retry attempt number passed to [`retry_delay`].
///
/// [`retry_delay`]: PacingPolicy::retry_delay
#[derive(Debug, Clone)]
pub struct PacingPolicy {
    config: PacingConfig,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::new(PacingConfig::default())
    }
}

impl PacingPolicy {
    pub fn new(config: PacingConfig) -> Self {
        Self { config }
    }

    /// Delay between two page requests: base range, plus an occasional extra pause.
    pub fn next_delay(&self) -> Duration {
        self.next_delay_with(&mut rand::thread_rng())
    }

    pub fn next_delay_with<R: Rng>(&self, rng: &mut R) -> Duration {
        let c = &self.config;
        let mut secs = uniform(rng, c.base_min_secs, c.base_max_secs);
        if rng.gen_bool(c.long_pause_probability) {
            secs += uniform(rng, c.extra_min_secs, c.extra_max_secs);
        }
        Duration::from_secs_f64(secs)
    }

    /// Delay after the page turned out to be a bot challenge.
    pub fn block_detected(&self) -> Duration {
        self.block_detected_with(&mut rand::thread_rng())
    }

    pub fn block_detected_with<R: Rng>(&self, rng: &mut R) -> Duration {
        Duration::from_secs_f64(uniform(rng, self.config.block_min_secs, self.config.block_max_secs))
    }

    /// Delay before retrying a page that failed `attempt` times in a row (1-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.next_delay() + self.backoff(attempt)
    }

    /// Exponential part of [`retry_delay`](PacingPolicy::retry_delay), capped at `backoff_max_secs`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(30) as i32;
        let secs = (self.config.backoff_base_secs * 2f64.powi(exp)).min(self.config.backoff_max_secs);
        Duration::from_secs_f64(secs)
    }
}

#[inline]
fn uniform<R: Rng>(rng: &mut R, min: f64, max: f64) -> f64 {
    if max <= min {
        min
    } else {
        rng.gen_range(min..=max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn secs(d: Duration) -> f64 {
        d.as_secs_f64()
    }

    #[test]
    fn base_delay_stays_in_range_without_long_pauses() {
        let policy = PacingPolicy::new(PacingConfig {
            long_pause_probability: 0.0,
            ..PacingConfig::default()
        });
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let d = secs(policy.next_delay_with(&mut rng));
            assert!((2.0..=4.0).contains(&d), "{d}");
        }
    }

    #[test]
    fn long_pause_adds_second_interval() {
        let policy = PacingPolicy::new(PacingConfig {
            long_pause_probability: 1.0,
            ..PacingConfig::default()
        });
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let d = secs(policy.next_delay_with(&mut rng));
            assert!((4.0..=8.0).contains(&d), "{d}");
        }
    }

    #[test]
    fn default_delays_stay_within_outer_bounds() {
        let policy = PacingPolicy::default();
        let mut rng = StdRng::seed_from_u64(3);
        let delays: Vec<f64> = (0..2000).map(|_| secs(policy.next_delay_with(&mut rng))).collect();
        assert!(delays.iter().all(|d| (2.0..=8.0).contains(d)));
        // With p = 0.1 some, but not most, delays get the extra pause.
        let long = delays.iter().filter(|d| **d > 4.0).count();
        assert!(long > 50 && long < 400, "{long}");
    }

    #[test]
    fn block_delay_range() {
        let policy = PacingPolicy::default();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..500 {
            let d = secs(policy.block_detected_with(&mut rng));
            assert!((20.0..=30.0).contains(&d), "{d}");
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = PacingPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(10), Duration::from_secs(60));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn immediate_config_never_waits() {
        let policy = PacingPolicy::new(PacingConfig::immediate());
        assert_eq!(policy.next_delay(), Duration::ZERO);
        assert_eq!(policy.block_detected(), Duration::ZERO);
        assert_eq!(policy.retry_delay(4), Duration::ZERO);
    }
}
