//! Retry configuration and write counters
//!
//! `add` retries a whole read-modify-write cycle when the backend reports
//! that another writer advanced the version chain. `RetryConfig` supplies
//! the default budget and the backoff between attempts; `WriteMetrics`
//! exposes how often that happened.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// ============================================================================
// Retry Configuration
// ============================================================================

/// Default retry budget for `add`
pub const DEFAULT_MAX_RETRIES: usize = 3;
/// Default sleep after the first conflict, in milliseconds
pub const DEFAULT_BASE_DELAY_MS: u64 = 1;
/// Default ceiling on the sleep between attempts, in milliseconds
pub const DEFAULT_MAX_DELAY_MS: u64 = 50;

/// Retry budget and backoff for `add`
///
/// After the `n`-th consecutive conflict an `add` sleeps
/// `base_delay * 2^(n-1)`, capped at `max_delay`, before re-reading.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use aspectdb_engine::RetryConfig;
///
/// let config = RetryConfig::default()
///     .with_max_retries(5)
///     .with_backoff(Duration::from_millis(2), Duration::from_millis(20));
/// assert_eq!(config.attempts(), 6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Conflicts tolerated before `ConcurrencyExhausted` (0 = a single attempt)
    pub max_retries: usize,
    /// Sleep after the first conflict
    pub base_delay: Duration,
    /// Ceiling on any single sleep
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryConfig {
    /// Default budget, re-reading at once after a conflict
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Replace the retry budget
    pub fn with_max_retries(self, max_retries: usize) -> Self {
        Self {
            max_retries,
            ..self
        }
    }

    /// Replace the backoff curve
    pub fn with_backoff(self, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            ..self
        }
    }

    /// Read-modify-write cycles an `add` may run
    pub fn attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }

    /// Sleep owed after `conflicts` consecutive conflicts (1-based)
    pub(crate) fn backoff(&self, conflicts: u32) -> Duration {
        let factor = 2u32
            .checked_pow(conflicts.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

// ============================================================================
// Write Metrics
// ============================================================================

/// Live counters owned by a store; all use Relaxed ordering
#[derive(Debug, Default)]
pub(crate) struct WriteCounters {
    saves: AtomicU64,
    add_calls: AtomicU64,
    add_attempts: AtomicU64,
    commits: AtomicU64,
    conflicts: AtomicU64,
    unchanged: AtomicU64,
    exhausted: AtomicU64,
}

impl WriteCounters {
    pub(crate) fn record_save(&self) {
        self.saves.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_add_call(&self) {
        self.add_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_attempt(&self) {
        self.add_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unchanged(&self) {
        self.unchanged.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> WriteMetrics {
        WriteMetrics {
            saves: self.saves.load(Ordering::Relaxed),
            add_calls: self.add_calls.load(Ordering::Relaxed),
            add_attempts: self.add_attempts.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }
}

/// Write metrics
///
/// Point-in-time copy of a store's write counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteMetrics {
    /// Successful `save` calls
    pub saves: u64,
    /// `add` calls, whatever their outcome
    pub add_calls: u64,
    /// Read-modify-write cycles started by `add`
    pub add_attempts: u64,
    /// `add` cycles that committed a new latest value
    pub commits: u64,
    /// `add` cycles rejected because the chain advanced
    pub conflicts: u64,
    /// `add` calls whose updater returned the current value
    pub unchanged: u64,
    /// `add` calls that ran out of retries
    pub exhausted: u64,
}

impl WriteMetrics {
    /// Conflict rate (conflicts / attempts)
    pub fn conflict_rate(&self) -> f64 {
        if self.add_attempts > 0 {
            self.conflicts as f64 / self.add_attempts as f64
        } else {
            0.0
        }
    }
}
