//! # Fibonacci Backoff
//!
//! Progressive backoff for the few errors that escape a reconciliation cycle
//! and reach the scheduler. Handled failures never come here; they are
//! requeued after the fixed delay instead.
//!
//! ```rust
//! use grafana_operator::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(5, 300);
//! assert_eq!(backoff.next_backoff_seconds(), 5);
//! assert_eq!(backoff.next_backoff_seconds(), 5);
//! assert_eq!(backoff.next_backoff_seconds(), 10);
//! assert_eq!(backoff.next_backoff_seconds(), 15);
//! ```

/// Fibonacci backoff calculator, in seconds
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    prev_secs: u64,
    current_secs: u64,
    max_secs: u64,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min_secs` and capped at `max_secs`
    ///
    /// A zero minimum is raised to one second so the sequence can grow.
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        Self {
            min_secs,
            prev_secs: 0,
            current_secs: min_secs,
            max_secs: max_secs.max(min_secs),
        }
    }

    /// Get the next backoff duration in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_secs;
        let next = self.prev_secs.saturating_add(self.current_secs);
        self.prev_secs = self.current_secs;
        self.current_secs = next.min(self.max_secs);
        result
    }

    /// Restart the sequence after a successful cycle
    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.min_secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_capped() {
        let mut backoff = FibonacciBackoff::new(5, 30);
        let seq: Vec<u64> = (0..7).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(seq, vec![5, 5, 10, 15, 25, 30, 30]);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = FibonacciBackoff::new(5, 300);
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.reset();
        assert_eq!(backoff.next_backoff_seconds(), 5);
        assert_eq!(backoff.next_backoff_seconds(), 5);
        assert_eq!(backoff.next_backoff_seconds(), 10);
    }

    #[test]
    fn test_degenerate_bounds() {
        let mut backoff = FibonacciBackoff::new(0, 0);
        assert_eq!(backoff.next_backoff_seconds(), 1);
        assert_eq!(backoff.next_backoff_seconds(), 1);
        assert_eq!(backoff.next_backoff_seconds(), 1);
    }
}
