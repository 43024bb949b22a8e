use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use arc_swap::ArcSwap;
use tracing::warn;

use crate::Clock;
use crate::Engine;
use crate::EngineError;

/// Published snapshot of the current window.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Window {
    count: usize,
    /// `None` until the first request arrives.
    start: Option<SystemTime>,
}

/// A simple window-based limiter.
///
/// A window opens at the first request and lasts `window`. Any request
/// arriving strictly later than that opens a new window at its own arrival
/// time. This is susceptible to "boundary bursts" where double the limit is
/// allowed in a short period spanning two windows.
#[derive(Debug)]
pub struct FixedWindow {
    capacity: usize,
    window: Duration,
    state: ArcSwap<Window>,
    clock: Clock,
}

impl Engine for FixedWindow {
    fn allow(&self) -> bool {
        self.allow_at(self.clock.now())
    }

    fn allow_at(&self, arrival: SystemTime) -> bool {
        loop {
            let current = self.state.load();

            let next = match current.start {
                None => Window {
                    count: 1,
                    start: Some(arrival),
                },
                Some(start) => {
                    let Ok(elapsed) = arrival.duration_since(start) else {
                        warn!(
                            engine = "fixed-window",
                            ?arrival,
                            window_start = ?start,
                            "negative elapsed time detected; possible clock skew"
                        );
                        return false;
                    };

                    if elapsed > self.window {
                        Window {
                            count: 1,
                            start: Some(arrival),
                        }
                    } else if current.count < self.capacity {
                        Window {
                            count: current.count + 1,
                            start: Some(start),
                        }
                    } else {
                        return false;
                    }
                }
            };

            let previous = self.state.compare_and_swap(&*current, Arc::new(next));
            if Arc::ptr_eq(&*current, &*previous) {
                return true;
            }
            // Another caller published first; start again from its snapshot.
        }
    }
}

impl FixedWindow {
    /// Creates a new `FixedWindow` engine.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The maximum number of requests allowed within a single window.
    /// * `window` - The duration of the fixed time window.
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
            capacity: capacity.get(),
            window,
            state: ArcSwap::from_pointee(Window {
                count: 0,
                start: None,
            }),
            clock,
        })
    }
}
