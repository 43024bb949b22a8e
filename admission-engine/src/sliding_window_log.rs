use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::SystemTime;

use tracing::warn;

use crate::Clock;
use crate::Engine;
use crate::EngineError;
use crate::RingBuffer;

/// An exact sliding window.
///
/// Keeps the arrival time of every admitted request still inside the window.
/// Entries older than `window` are evicted on each call, so memory and the
/// worst-case eviction scan are both bounded by `capacity`.
#[derive(Debug)]
pub struct SlidingWindowLog {
    window: Duration,
    log: Mutex<RingBuffer<SystemTime>>,
    clock: Clock,
}

impl Engine for SlidingWindowLog {
    fn allow(&self) -> bool {
        self.allow_at(self.clock.now())
    }

    fn allow_at(&self, arrival: SystemTime) -> bool {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(&newest) = log.peek_back()
            && arrival < newest
        {
            warn!(
                engine = "sliding-window-log",
                ?arrival,
                ?newest,
                "negative elapsed time detected; possible clock skew"
            );
            return false;
        }

        while let Some(&oldest) = log.peek_front() {
            match arrival.duration_since(oldest) {
                Ok(age) if age > self.window => {
                    log.pop_front();
                }
                _ => break,
            }
        }

        log.push_back(arrival).is_ok()
    }
}

impl SlidingWindowLog {
    /// Creates a new `SlidingWindowLog` engine.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The maximum number of requests admitted in any trailing `window`.
    /// * `window` - The length of the trailing time span.
    pub fn new(capacity: NonZeroUsize, window: Duration) -> Result<Self, EngineError> {
        Self::with_clock(capacity, window, Clock::new())
    }

    pub fn with_clock(
        capacity: NonZeroUsize,
        window: Duration,
        clock: Clock,
    ) -> Result<Self, EngineError> {
        if window.is_zero() {
            return Err(EngineError::InvalidWindow);
        }
        Ok(Self {
            window,
            log: Mutex::new(RingBuffer::new(capacity)),
            clock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_735_689_600 + secs)
    }

    fn log(capacity: usize, window: Duration) -> SlidingWindowLog {
        SlidingWindowLog::new(NonZeroUsize::new(capacity).unwrap(), window).unwrap()
    }

    #[test]
    fn it_enforces_limits() {
        let rl = log(3, Duration::from_secs(1));

        for i in 0..3 {
            assert!(rl.allow_at(at(0)), "request {} should be allowed", i + 1);
        }
        assert!(!rl.allow_at(at(0)), "4th request should be denied");
        assert!(rl.allow_at(at(2)), "request after window should be allowed");
    }

    #[test]
    fn test_request_at_boundary() {
        let rl = log(3, Duration::from_secs(10));

        assert!(rl.allow_at(at(0)));
        assert!(rl.allow_at(at(9)));
        assert!(rl.allow_at(at(9)));

        // Only the 0s entry has expired, leaving room for exactly one
        assert!(rl.allow_at(at(11)));
        assert!(!rl.allow_at(at(11)));
        assert!(!rl.allow_at(at(11)));
    }

    #[test]
    fn test_entry_exactly_window_old_is_kept() {
        let rl = log(1, Duration::from_secs(10));

        assert!(rl.allow_at(at(0)));
        assert!(!rl.allow_at(at(10)));
        assert!(rl.allow_at(at(10) + Duration::from_millis(1)));
    }

    #[test]
    fn test_negative_elapsed_is_denied_without_logging() {
        let rl = log(3, Duration::from_secs(1));

        assert!(rl.allow_at(at(100)));
        assert!(rl.allow_at(at(100)));

        // There is room, but the arrival predates the newest entry
        assert!(!rl.allow_at(at(50)), "skewed request should be denied");
        assert_eq!(rl.log.lock().unwrap().len(), 2);

        assert!(rl.allow_at(at(100)));
        assert!(!rl.allow_at(at(100)));
        assert!(rl.allow_at(at(102)));
    }

    #[test]
    fn test_log_memory_is_bounded_by_capacity() {
        let rl = log(4, Duration::from_secs(2));
        assert_eq!(rl.log.lock().unwrap().capacity(), 4);

        // Ten arrivals per second for a minute
        for tick in 0..600 {
            rl.allow_at(at(0) + Duration::from_millis(100 * tick));
            let log = rl.log.lock().unwrap();
            assert!(log.len() <= log.capacity());
        }
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let err =
            SlidingWindowLog::new(NonZeroUsize::new(5).unwrap(), Duration::ZERO).unwrap_err();
        assert_eq!(err, EngineError::InvalidWindow);
    }
}
