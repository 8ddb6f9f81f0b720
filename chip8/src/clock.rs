//! CPU Clock.
use std::{
    sync::atomic::{AtomicU64, Ordering},
    thread,
    time::{Duration, Instant},
};

/// Source of time for the virtual CPU.
///
/// Time is measured from the clock's own epoch, so the cycle cadence and timers
/// can be driven by a fake clock in tests.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's epoch.
    fn now(&self) -> Duration;

    /// Block the current thread for the given duration.
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the monotonic system timer.
pub struct SystemClock(Instant);

impl SystemClock {
    /// Threads are not woken with enough resolution for short waits,
    /// so only the remainder past this margin is slept.
    const SLEEP_MARGIN: Duration = Duration::from_millis(2);

    /// Creates a new clock with the current time as epoch.
    pub fn new() -> Self {
        Self(Instant::now())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.0.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;

        if duration > Self::SLEEP_MARGIN {
            thread::sleep(duration - Self::SLEEP_MARGIN);
        }

        // Sleep does not have enough resolution, and causes
        // the clock to run at 30 FPS.
        //
        // Spinning a loop causes high CPU usage and fan madness.
        //
        // Yielding in a loop is the best alternative.
        while Instant::now() < deadline {
            thread::yield_now();
        }
    }
}

/// Clock that only moves when told to.
///
/// Sleeping advances the clock instantly, so throttled loops run at full speed
/// while still observing the configured cadence.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Timer to synchronize a thread with the software clock of the virtual CPU.
///
/// When the VM is paused, time elapses until it is resumed. Once resumed,
/// the elapsed time is ignored and the next cycle starts immediately.
pub(crate) struct Throttle {
    interval: Duration,
    last: Duration,
}

impl Throttle {
    pub(crate) fn new(interval: Duration, clock: &dyn Clock) -> Self {
        Self {
            interval,
            last: clock.now(),
        }
    }

    /// Block the current thread until the next clock cycle.
    pub(crate) fn wait(&mut self, clock: &dyn Clock) {
        if self.interval.is_zero() {
            return;
        }

        let elapsed = clock.now().saturating_sub(self.last);
        if elapsed < self.interval {
            clock.sleep(self.interval - elapsed);
        }

        // Reset back to zero, rather than trying to catch up.
        //
        // If the VM was blocked on a key press, and a large
        // amount of time has elapsed until it is resumed,
        // it should simply continue at the next cycle running
        // at its usual speed.
        self.last = clock.now();
    }
}
