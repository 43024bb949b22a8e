use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use crate::AnyEngine;
use crate::Clock;
use crate::EngineError;
use crate::FixedWindow;
use crate::LeakyBucket;
use crate::Shutdown;
use crate::SlidingWindowCounter;
use crate::SlidingWindowLog;
use crate::TokenBucket;

/// The closed set of algorithms [`EngineConfig::build`] can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    FixedWindow,
    SlidingWindowLog,
    SlidingWindowCounter,
    TokenBucket,
    LeakyBucket,
}

impl EngineKind {
    pub const ALL: [EngineKind; 5] = [
        EngineKind::FixedWindow,
        EngineKind::SlidingWindowLog,
        EngineKind::SlidingWindowCounter,
        EngineKind::TokenBucket,
        EngineKind::LeakyBucket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::FixedWindow => "fixed-window",
            EngineKind::SlidingWindowLog => "sliding-window-log",
            EngineKind::SlidingWindowCounter => "sliding-window-counter",
            EngineKind::TokenBucket => "token-bucket",
            EngineKind::LeakyBucket => "leaky-bucket",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EngineKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EngineError::UnknownKind(s.to_string()))
    }
}

/// Parameters for constructing one engine.
///
/// Only the fields used by `kind` are validated, so a fixed window does not
/// care about a token bucket's fill rate.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub kind: EngineKind,
    /// Requests per window, bucket size, or queue length.
    pub capacity: usize,
    /// Token bucket refill, in tokens per second.
    pub fill_rate: f64,
    /// Tokens consumed by each admitted request.
    pub consume_rate: f64,
    /// Leaky bucket drain cadence.
    pub leak_period: Duration,
    /// Window length for the three window engines.
    pub window: Duration,
    pub clock: Clock,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::TokenBucket,
            capacity: 5,
            // 1 token per hour
            fill_rate: 1.0 / 3600.0,
            consume_rate: 1.0,
            leak_period: Duration::from_millis(500),
            window: Duration::from_secs(1),
            clock: Clock::new(),
        }
    }
}

impl EngineConfig {
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_fill_rate(mut self, fill_rate: f64) -> Self {
        self.fill_rate = fill_rate;
        self
    }

    pub fn with_consume_rate(mut self, consume_rate: f64) -> Self {
        self.consume_rate = consume_rate;
        self
    }

    pub fn with_leak_period(mut self, leak_period: Duration) -> Self {
        self.leak_period = leak_period;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Constructs the configured engine.
    ///
    /// `shutdown` is only consumed by the leaky bucket, whose drain task must
    /// be spawned inside a tokio runtime with timers enabled.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter found for `kind`.
    pub fn build(&self, shutdown: Shutdown) -> Result<AnyEngine, EngineError> {
        let capacity = NonZeroUsize::new(self.capacity).ok_or(EngineError::InvalidCapacity)?;
        let clock = self.clock.clone();

        let engine = match self.kind {
            EngineKind::FixedWindow => {
                AnyEngine::FixedWindow(FixedWindow::with_clock(capacity, self.window, clock)?)
            }
            EngineKind::SlidingWindowLog => AnyEngine::SlidingWindowLog(
                SlidingWindowLog::with_clock(capacity, self.window, clock)?,
            ),
            EngineKind::SlidingWindowCounter => AnyEngine::SlidingWindowCounter(
                SlidingWindowCounter::with_clock(capacity, self.window, clock)?,
            ),
            EngineKind::TokenBucket => AnyEngine::TokenBucket(TokenBucket::with_clock(
                capacity,
                self.fill_rate,
                self.consume_rate,
                clock,
            )?),
            EngineKind::LeakyBucket => AnyEngine::LeakyBucket(LeakyBucket::with_clock(
                capacity,
                self.leak_period,
                shutdown,
                clock,
            )?),
        };
        Ok(engine)
    }
}
