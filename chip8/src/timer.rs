//! 60Hz countdown timers.
use std::time::Duration;

use crate::constants::*;

const TIMER_PERIOD: Duration = Duration::from_nanos(TIMER_CYCLE_TIME);

/// Countdown register that decrements at most once every 1/60th of a second.
///
/// Used for both the delay timer (DT) and the sound timer (ST).
#[derive(Debug, Default, Clone)]
pub struct Timer {
    value: u8,
    /// Clock time of the last period boundary.
    last_tick: Duration,
}

impl Timer {
    pub fn new() -> Self {
        Default::default()
    }

    #[inline(always)]
    pub fn get(&self) -> u8 {
        self.value
    }

    #[inline(always)]
    pub fn set(&mut self, value: u8) {
        self.value = value;
    }

    /// Count down once if a full period has elapsed since the last tick.
    ///
    /// The period boundary moves even when the timer is already zero.
    #[inline]
    pub fn tick(&mut self, now: Duration) {
        if now.saturating_sub(self.last_tick) >= TIMER_PERIOD {
            self.value = self.value.saturating_sub(1);
            self.last_tick = now;
        }
    }

    pub fn reset(&mut self, now: Duration) {
        self.value = 0;
        self.last_tick = now;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tick_waits_for_period() {
        let mut timer = Timer::new();
        timer.set(3);

        timer.tick(Duration::from_millis(10));
        assert_eq!(timer.get(), 3);

        timer.tick(TIMER_PERIOD);
        assert_eq!(timer.get(), 2);

        // At most one decrement, no matter how much time passed.
        timer.tick(Duration::from_secs(5));
        assert_eq!(timer.get(), 1);

        timer.tick(Duration::from_secs(5) + TIMER_PERIOD / 2);
        assert_eq!(timer.get(), 1);
    }

    #[test]
    fn test_never_below_zero() {
        let mut timer = Timer::new();
        timer.set(1);
        timer.tick(TIMER_PERIOD);
        timer.tick(TIMER_PERIOD * 2);
        timer.tick(TIMER_PERIOD * 3);
        assert_eq!(timer.get(), 0);
    }

    #[test]
    fn test_reset() {
        let mut timer = Timer::new();
        timer.set(200);
        timer.reset(Duration::from_secs(1));
        assert_eq!(timer.get(), 0);

        timer.set(5);
        timer.tick(Duration::from_secs(1) + TIMER_PERIOD / 2);
        assert_eq!(timer.get(), 5);
    }
}
