use rand::Rng;
use std::time::Duration;

/// Exponential backoff with jitter for (re)connecting to a sample server.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStrategy {
    pub initial_delay: Duration,
    pub max_retry: u32,
    pub max_delay: Duration,
    /// Fraction of the delay added or removed at random.
    pub randomisation_factor: f64,
}

impl Default for ConnectionStrategy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_retry: 5,
            max_delay: Duration::from_secs(30),
            randomisation_factor: 0.5,
        }
    }
}

impl ConnectionStrategy {
    /// Delay before retry number `attempt` (1-based), or `None` once retries
    /// are exhausted.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retry {
            return None;
        }
        let factor = self.randomisation_factor.abs();
        let jitter = if factor > 0.0 {
            rand::thread_rng().gen_range(-factor..=factor)
        } else {
            0.0
        };
        Some(self.delay_with_jitter(attempt, jitter))
    }

    pub fn delay_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as i32;
        let base = self.initial_delay.as_secs_f64() * 2f64.powi(exponent);
        let delay = (base * (1.0 + jitter)).clamp(0.0, self.max_delay.as_secs_f64());
        Duration::from_secs_f64(delay)
    }
}
