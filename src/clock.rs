use std::time::{Duration, Instant};

/// A span of time reported by `HighResolutionClock`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TimeDelta {
    nanoseconds: u64,
}

impl TimeDelta {
    pub fn nanoseconds(&self) -> u64 {
        self.nanoseconds
    }

    pub fn microseconds(&self) -> u64 {
        self.nanoseconds / 1_000
    }

    pub fn milliseconds(&self) -> u64 {
        self.nanoseconds / 1_000_000
    }

    pub fn seconds(&self) -> u64 {
        self.nanoseconds / 1_000_000_000
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.nanoseconds as f64 / 1_000_000_000.0
    }
}

impl From<Duration> for TimeDelta {
    fn from(d: Duration) -> TimeDelta {
        TimeDelta {
            nanoseconds: d.as_nanos().min(u64::MAX as u128) as u64,
        }
    }
}

/// Tracks the time between ticks (`delta`) and the time accumulated since the last reset
/// (`sigma`), used for animation pacing and fps reporting.
#[derive(Debug)]
pub struct HighResolutionClock {
    delta: TimeDelta,
    sigma: TimeDelta,
    t0: Instant,
}

impl HighResolutionClock {
    pub fn new() -> Self {
        Self {
            delta: TimeDelta::default(),
            sigma: TimeDelta::default(),
            t0: Instant::now(),
        }
    }

    /// Time between the two most recent ticks.
    pub fn delta(&self) -> TimeDelta {
        self.delta
    }

    /// Accumulated time since creation or the last reset.
    pub fn sigma(&self) -> TimeDelta {
        self.sigma
    }

    pub fn tick(&mut self) {
        let t1 = Instant::now();
        self.delta = TimeDelta::from(t1 - self.t0);
        self.sigma.nanoseconds = self.sigma.nanoseconds.saturating_add(self.delta.nanoseconds);
        self.t0 = t1;
    }

    pub fn reset(&mut self) {
        self.delta = TimeDelta::default();
        self.sigma = TimeDelta::default();
        self.t0 = Instant::now();
    }
}

impl Default for HighResolutionClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_delta_units() {
        let d = TimeDelta::from(Duration::from_millis(2500));
        assert_eq!(d.nanoseconds(), 2_500_000_000);
        assert_eq!(d.microseconds(), 2_500_000);
        assert_eq!(d.milliseconds(), 2_500);
        assert_eq!(d.seconds(), 2);
    }

    #[test]
    fn tick_accumulates_and_reset_clears() {
        let mut clock = HighResolutionClock::new();
        std::thread::sleep(Duration::from_millis(2));
        clock.tick();
        let first = clock.delta();
        assert!(first.milliseconds() >= 2);
        assert_eq!(clock.sigma(), first);

        std::thread::sleep(Duration::from_millis(1));
        clock.tick();
        assert!(clock.sigma() >= first);
        assert_eq!(clock.sigma().nanoseconds(), first.nanoseconds() + clock.delta().nanoseconds());

        clock.reset();
        assert_eq!(clock.delta().nanoseconds(), 0);
        assert_eq!(clock.sigma().nanoseconds(), 0);
    }
}
