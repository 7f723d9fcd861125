//! Time sources for stream pacing.
//!
//! Streams never read the wall clock directly. Production code uses
//! [`SystemClock`]; tests drive pacing through [`ManualClock`] so delays are
//! observed without actually sleeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Source of monotonic time and blocking delays.
pub trait Clock: Send {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Real monotonic clock backed by [`Instant::now`] and [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug)]
struct ManualClockState {
    current_time: Instant,
    start_time: Instant,
    sleeps: Vec<Duration>,
}

/// Controllable clock for deterministic pacing tests.
///
/// Time only moves when [`ManualClock::advance`] or [`Clock::sleep`] is
/// called. Sleeping returns immediately after moving virtual time forward and
/// recording the requested duration. Clones share the same timeline, so a test
/// can keep one handle while a stream owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualClockState>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Creates a manual clock starting at virtual time zero.
    pub fn new() -> Self {
        let start = Instant::now();
        Self {
            state: Arc::new(Mutex::new(ManualClockState {
                current_time: start,
                start_time: start,
                sleeps: Vec::new(),
            })),
        }
    }

    /// Moves virtual time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        self.state.lock().current_time += duration;
    }

    /// Returns virtual time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        let state = self.state.lock();
        state.current_time.duration_since(state.start_time)
    }

    /// Returns every duration passed to [`Clock::sleep`], in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().sleeps.clone()
    }

    /// Returns the sum of all recorded sleeps.
    pub fn total_slept(&self) -> Duration {
        self.state.lock().sleeps.iter().sum()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.state.lock().current_time
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.current_time += duration;
        state.sleeps.push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advancement() {
        let clock = ManualClock::new();
        let start = clock.now();

        clock.advance(Duration::from_secs(10));
        assert_eq!(clock.elapsed(), Duration::from_secs(10));

        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.elapsed(), Duration::from_secs(15));
        assert!(clock.now() > start);

        // Advancing is not a sleep
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_manual_clock_sleep_records_duration() {
        let clock = ManualClock::new();

        clock.sleep(Duration::from_millis(250));
        clock.sleep(Duration::from_millis(750));

        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(250), Duration::from_millis(750)]
        );
        assert_eq!(clock.total_slept(), Duration::from_secs(1));
        assert_eq!(clock.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn test_manual_clock_clones_share_timeline() {
        let clock = ManualClock::new();
        let handle = clock.clone();

        handle.sleep(Duration::from_secs(2));

        assert_eq!(clock.elapsed(), Duration::from_secs(2));
        assert_eq!(clock.total_slept(), Duration::from_secs(2));
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
