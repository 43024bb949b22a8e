use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use arc_swap::ArcSwap;
use tracing::warn;

use crate::Clock;
use crate::Engine;
use crate::EngineError;

/// Published snapshot of the two counted windows.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Counters {
    /// Current window's request count
    current: usize,
    /// Previous window's request count, or 0 if it saw no requests
    previous: usize,
    /// Index of the current window, counted from the engine origin
    index: u64,
}

/// A Sliding Window Counter implementation.
///
/// Time is cut into fixed windows aligned to an origin captured at
/// construction. The engine keeps the count for the current window and the one
/// before it. The effective count is:
/// `(previous_count * fraction_of_window_left) + current_count`.
///
/// This is an approximation. A burst can slightly overshoot `capacity` compared
/// to [`crate::SlidingWindowLog`], in exchange for constant memory.
#[derive(Debug)]
pub struct SlidingWindowCounter {
    capacity: usize,
    window_ns: u128,
    origin: SystemTime,
    state: ArcSwap<Counters>,
    clock: Clock,
}

impl Engine for SlidingWindowCounter {
    #[inline]
    fn allow(&self) -> bool {
        self.allow_at(self.clock.now())
    }

    fn allow_at(&self, arrival: SystemTime) -> bool {
        let Ok(elapsed) = arrival.duration_since(self.origin) else {
            warn!(
                engine = "sliding-window-counter",
                ?arrival,
                origin = ?self.origin,
                "arrival precedes engine origin; possible clock skew"
            );
            return false;
        };
        let elapsed_ns = elapsed.as_nanos();
        let index = (elapsed_ns / self.window_ns) as u64;

        // 1. Weight of the previous window decays linearly across the current one
        let into_window = (elapsed_ns % self.window_ns) as f64;
        let weight = 1.0 - into_window / self.window_ns as f64;

        loop {
            let current = self.state.load();

            if index < current.index {
                warn!(
                    engine = "sliding-window-counter",
                    ?arrival,
                    window = index,
                    current_window = current.index,
                    "stale arrival for an earlier window; possible clock skew"
                );
                return false;
            }

            // 2. Slide if this arrival belongs to a later window
            let mut next = *current.as_ref();
            if index > current.index {
                // If we moved at least two windows forward, previous is 0
                next.previous = if index == current.index + 1 {
                    current.current
                } else {
                    0
                };
                next.current = 0;
                next.index = index;
            }

            // 3. Enforcement
            let estimate = next.previous as f64 * weight + next.current as f64;
            if estimate >= self.capacity as f64 {
                return false;
            }

            next.current += 1;
            let previous = self.state.compare_and_swap(&*current, Arc::new(next));
            if Arc::ptr_eq(&*current, &*previous) {
                return true;
            }
        }
    }
}

impl SlidingWindowCounter {
    /// Creates a new `SlidingWindowCounter` whose windows start now.
    pub fn new(capacity: NonZeroUsize, window: Duration) -> Result<Self, EngineError> {
        Self::with_clock(capacity, window, Clock::new())
    }

    pub fn with_clock(
        capacity: NonZeroUsize,
        window: Duration,
        clock: Clock,
    ) -> Result<Self, EngineError> {
        let origin = clock.now();
        Self::with_origin(capacity, window, origin, clock)
    }

    /// Aligns window boundaries to `origin` instead of the construction time.
    ///
    /// Arrivals before `origin` are always denied.
    pub fn with_origin(
        capacity: NonZeroUsize,
        window: Duration,
        origin: SystemTime,
        clock: Clock,
    ) -> Result<Self, EngineError> {
        if window.is_zero() {
            return Err(EngineError::InvalidWindow);
        }
        Ok(Self {
            capacity: capacity.get(),
            window_ns: window.as_nanos(),
            origin,
            state: ArcSwap::from_pointee(Counters {
                current: 0,
                previous: 0,
                index: 0,
            }),
            clock,
        })
    }
}
