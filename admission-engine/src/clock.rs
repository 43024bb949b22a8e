use std::time::SystemTime;

use quanta::Instant;

/// Source of "now" for [`crate::Engine::allow`].
///
/// Wall-clock time is read once at construction. After that, time advances by
/// the monotonic `quanta` clock, so a system clock step never makes `allow()`
/// observe time running backwards. Use [`Clock::from_quanta`] with
/// `quanta::Clock::mock()` for deterministic tests.
#[derive(Debug, Clone)]
pub struct Clock {
    clock: quanta::Clock,
    /// A fixed point in time (TSC tick) to calculate deltas from.
    anchor: Instant,
    wall: SystemTime,
}

impl Clock {
    pub fn new() -> Self {
        Self::from_quanta(quanta::Clock::new())
    }

    pub fn from_quanta(clock: quanta::Clock) -> Self {
        Self::with_origin(clock, SystemTime::now())
    }

    /// Pin the wall-clock reading that corresponds to the clock's current tick.
    pub fn with_origin(clock: quanta::Clock, wall: SystemTime) -> Self {
        let anchor = clock.now();
        Self {
            clock,
            anchor,
            wall,
        }
    }

    #[inline]
    pub fn now(&self) -> SystemTime {
        self.wall + self.clock.now().duration_since(self.anchor)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn mock_clock_advances_from_origin() {
        let (quanta, mock) = quanta::Clock::mock();
        let origin = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let clock = Clock::with_origin(quanta, origin);

        assert_eq!(clock.now(), origin);

        mock.increment(Duration::from_millis(250));
        assert_eq!(clock.now(), origin + Duration::from_millis(250));
    }

    #[test]
    fn real_clock_never_goes_backwards() {
        let clock = Clock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
