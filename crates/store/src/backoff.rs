//! Bounded exponential backoff shared by the batched writer's chunk-upload
//! retries and (via `edgegraph-manifest`) R2 sync retries, per spec §4.4 /
//! §4.5's shared requirement for "bounded exponential backoff".

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

/// Tracks attempt count and hands back the delay to sleep before the next
/// retry. Jitter is full-range (`[0, computed_delay]`) to avoid thundering
/// herds across shards retrying the same upload target concurrently.
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.config.max_attempts
    }

    /// Returns the delay for the next retry and advances the attempt
    /// counter, or `None` if `max_attempts` has been reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.exhausted() {
            return None;
        }
        let exp = self.config.multiplier.powi(self.attempt as i32);
        let base = self.config.initial.mul_f64(exp).min(self.config.max);
        self.attempt += 1;
        let jittered_millis = rand::thread_rng().gen_range(0..=base.as_millis().max(1) as u64);
        Some(Duration::from_millis(jittered_millis))
    }
}
