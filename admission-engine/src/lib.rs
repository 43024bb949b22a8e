//! # admission-engine
//!
//! `admission-engine` provides interchangeable admission-control engines: each
//! one decides, for a stream of time-stamped requests, whether a request may
//! proceed under a configured rate budget.
//!
//! ## Engines
//!
//! * [`FixedWindow`]: counts requests in a window opened by the first arrival.
//! * [`SlidingWindowLog`]: exact trailing window over logged arrival times.
//! * [`SlidingWindowCounter`]: two fixed counters blended by a linear weight.
//! * [`TokenBucket`]: continuous refill with burst capacity.
//! * [`LeakyBucket`]: bounded queue drained by a background task.
//!
//! ## Core Philosophy
//!
//! The fixed window, sliding counter and token bucket keep their state in an
//! immutable snapshot published through an atomic compare-and-swap. A losing
//! caller recomputes from the winner's snapshot and retries, so no caller ever
//! blocks. The sliding log and leaky bucket need a scan-then-mutate step over
//! a [`RingBuffer`] and guard it with a single `Mutex`.
//!
//! Every engine accepts a caller-supplied arrival time through
//! [`Engine::allow_at`]. An arrival earlier than the time the engine last
//! recorded is treated as clock skew and denied without touching state.
//!
//! ## Example
//!
//! ```rust
//! use admission_engine::Engine;
//! use admission_engine::EngineConfig;
//! use admission_engine::EngineKind;
//! use admission_engine::Shutdown;
//! use std::time::Duration;
//!
//! let engine = EngineConfig::new(EngineKind::FixedWindow)
//!     .with_capacity(100)
//!     .with_window(Duration::from_secs(60))
//!     .build(Shutdown::never())
//!     .unwrap();
//!
//! if engine.allow() {
//!     // Request admitted
//! }
//! ```

use std::fmt::Debug;
use std::time::SystemTime;

mod clock;
mod config;
mod error;
mod fixed_window;
mod leaky_bucket;
mod ring_buffer;
pub mod shutdown;
mod sliding_window_counter;
mod sliding_window_log;
mod token_bucket;

#[cfg(test)]
mod tests;

pub use clock::Clock;
pub use config::EngineConfig;
pub use config::EngineKind;
pub use error::EngineError;
pub use fixed_window::FixedWindow;
pub use leaky_bucket::LeakyBucket;
pub use ring_buffer::RingBuffer;
pub use shutdown::Shutdown;
pub use shutdown::ShutdownTrigger;
pub use sliding_window_counter::SlidingWindowCounter;
pub use sliding_window_log::SlidingWindowLog;
pub use token_bucket::TokenBucket;

/// The contract shared by all admission engines.
///
/// Engines must be `Send` and `Sync` to allow sharing across thread boundaries
/// via `Arc`. Neither method needs external locking.
pub trait Engine: Debug + Send + Sync {
    /// Decides for a request arriving now.
    fn allow(&self) -> bool;

    /// Decides as if the request arrived at `arrival`.
    ///
    /// `false` is an ordinary outcome: over budget, queue full, or an arrival
    /// that runs backwards relative to the engine's recorded time.
    fn allow_at(&self, arrival: SystemTime) -> bool;
}

/// One engine of any kind, as produced by [`EngineConfig::build`].
#[derive(Debug)]
pub enum AnyEngine {
    FixedWindow(FixedWindow),
    SlidingWindowLog(SlidingWindowLog),
    SlidingWindowCounter(SlidingWindowCounter),
    TokenBucket(TokenBucket),
    LeakyBucket(LeakyBucket),
}

impl AnyEngine {
    pub fn kind(&self) -> EngineKind {
        match self {
            AnyEngine::FixedWindow(_) => EngineKind::FixedWindow,
            AnyEngine::SlidingWindowLog(_) => EngineKind::SlidingWindowLog,
            AnyEngine::SlidingWindowCounter(_) => EngineKind::SlidingWindowCounter,
            AnyEngine::TokenBucket(_) => EngineKind::TokenBucket,
            AnyEngine::LeakyBucket(_) => EngineKind::LeakyBucket,
        }
    }
}

impl Engine for AnyEngine {
    #[inline]
    fn allow(&self) -> bool {
        match self {
            AnyEngine::FixedWindow(e) => e.allow(),
            AnyEngine::SlidingWindowLog(e) => e.allow(),
            AnyEngine::SlidingWindowCounter(e) => e.allow(),
            AnyEngine::TokenBucket(e) => e.allow(),
            AnyEngine::LeakyBucket(e) => e.allow(),
        }
    }

    #[inline]
    fn allow_at(&self, arrival: SystemTime) -> bool {
        match self {
            AnyEngine::FixedWindow(e) => e.allow_at(arrival),
            AnyEngine::SlidingWindowLog(e) => e.allow_at(arrival),
            AnyEngine::SlidingWindowCounter(e) => e.allow_at(arrival),
            AnyEngine::TokenBucket(e) => e.allow_at(arrival),
            AnyEngine::LeakyBucket(e) => e.allow_at(arrival),
        }
    }
}
