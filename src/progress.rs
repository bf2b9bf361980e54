//! Progress reporting and cooperative cancellation.
//!
//! The core never touches the terminal; it publishes progress through a
//! [`ProgressSink`] owned by the host and checks a [`CancelToken`] between
//! chunks and phases. The sink contract is a fraction in `[0, 1]`, a short
//! info string (percentage or `i/n` counts), and a status line.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Receives progress updates from a running operation.
pub trait ProgressSink {
    /// Reports overall completion and a short info string such as
    /// `"42.00%"` or `"3/17"`.
    fn progress(&self, fraction: f32, info: &str);

    /// Reports the current phase or throughput status line.
    fn status(&self, message: &str);
}

/// A sink that discards everything. Useful for tests and scripting.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn progress(&self, _fraction: f32, _info: &str) {}

    fn status(&self, _message: &str) {}
}

/// Monotonic cancellation flag shared between the host and the worker.
///
/// Cancellation is cooperative: the pipeline polls the token at chunk and
/// phase boundaries, never mid-block.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Irreversible for the lifetime of the token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Tracks throughput for the main streaming phase and renders the
/// `"Working at X.XX MB/s (ETA: HH:MM:SS)"` status line.
pub struct RateMeter {
    started: Instant,
    total: u64,
}

impl RateMeter {
    /// Starts the meter for `total` bytes of work.
    #[must_use]
    pub fn new(total: u64) -> Self {
        Self { started: Instant::now(), total }
    }

    /// Fraction of the work done, clamped to `[0, 1]`.
    #[must_use]
    pub fn fraction(&self, done: u64) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = done as f32 / self.total as f32;
        fraction.min(1.0)
    }

    /// Renders the throughput status line for `done` bytes processed.
    #[must_use]
    pub fn status(&self, done: u64) -> String {
        let elapsed = self.started.elapsed().as_secs_f64();
        #[allow(clippy::cast_precision_loss)]
        let speed = if elapsed > 0.0 { done as f64 / elapsed / 1e6 } else { 0.0 };
        let remaining = self.total.saturating_sub(done);
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let eta = if speed > 0.0 { (remaining as f64 / (speed * 1e6)).floor() as u64 } else { 0 };
        format!("Working at {speed:.2} MB/s (ETA: {})", humanize(eta))
    }
}

/// Converts seconds to `HH:MM:SS`.
#[must_use]
pub fn humanize(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize(0), "00:00:00");
        assert_eq!(humanize(61), "00:01:01");
        assert_eq!(humanize(3661), "01:01:01");
        assert_eq!(humanize(90_000), "25:00:00");
    }

    #[test]
    fn test_fraction_clamped() {
        let meter = RateMeter::new(100);
        assert_eq!(meter.fraction(50), 0.5);
        assert_eq!(meter.fraction(200), 1.0);

        let empty = RateMeter::new(0);
        assert_eq!(empty.fraction(0), 1.0);
    }
}
