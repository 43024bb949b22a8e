use std::num::NonZeroUsize;
use std::panic;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::SystemTime;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Interval;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::Clock;
use crate::Engine;
use crate::EngineError;
use crate::RingBuffer;
use crate::Shutdown;

#[derive(Debug)]
struct Queue {
    pending: RingBuffer<SystemTime>,
    /// Latest admitted arrival, kept after it drains for the skew check.
    newest: Option<SystemTime>,
}

/// A bounded queue drained at a fixed cadence.
///
/// Admission only asks whether the queue has room, so `capacity` caps the
/// burst and `leak_period` caps the sustained throughput, independently.
/// A background task started at construction removes one queued request per
/// `leak_period` until the [`Shutdown`] signal fires.
///
/// The drain task holds the queue for as long as it runs. Trigger the
/// shutdown before discarding the engine. Dropping the engine also aborts the
/// task, as a last resort.
#[derive(Debug)]
pub struct LeakyBucket {
    queue: Arc<Mutex<Queue>>,
    drain: JoinHandle<()>,
    clock: Clock,
}

impl Engine for LeakyBucket {
    fn allow(&self) -> bool {
        self.allow_at(self.clock.now())
    }

    fn allow_at(&self, arrival: SystemTime) -> bool {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(newest) = queue.newest
            && arrival < newest
        {
            warn!(
                engine = "leaky-bucket",
                ?arrival,
                ?newest,
                "negative elapsed time detected; possible clock skew"
            );
            return false;
        }

        if queue.pending.push_back(arrival).is_err() {
            debug!(engine = "leaky-bucket", "queue is full");
            return false;
        }
        queue.newest = Some(arrival);
        true
    }
}

impl LeakyBucket {
    /// Creates a new `LeakyBucket` and spawns its drain task on the current
    /// tokio runtime.
    ///
    /// The runtime must have its time driver enabled (`enable_time` or
    /// `enable_all`), since the drain is driven by a tokio interval.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of queued requests (the burst size).
    /// * `leak_period` - Time between two drained requests.
    /// * `shutdown` - Stops the drain task when it fires.
    pub fn new(
        capacity: NonZeroUsize,
        leak_period: Duration,
        shutdown: Shutdown,
    ) -> Result<Self, EngineError> {
        Self::with_clock(capacity, leak_period, shutdown, Clock::new())
    }

    pub fn with_clock(
        capacity: NonZeroUsize,
        leak_period: Duration,
        shutdown: Shutdown,
        clock: Clock,
    ) -> Result<Self, EngineError> {
        if leak_period.is_zero() {
            return Err(EngineError::InvalidLeakPeriod);
        }
        let handle = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let ticker = drain_interval(leak_period)?;

        let queue = Arc::new(Mutex::new(Queue {
            pending: RingBuffer::new(capacity),
            newest: None,
        }));
        let drain = handle.spawn(leak(Arc::clone(&queue), ticker, shutdown));

        Ok(Self { queue, drain, clock })
    }

    /// `true` once the drain task has exited.
    pub fn is_stopped(&self) -> bool {
        self.drain.is_finished()
    }
}

impl Drop for LeakyBucket {
    fn drop(&mut self) {
        self.drain.abort();
    }
}

// Tokio panics when an interval is created on a runtime without a time driver.
fn drain_interval(leak_period: Duration) -> Result<Interval, EngineError> {
    let start = tokio::time::Instant::now() + leak_period;
    let ticker = panic::catch_unwind(|| tokio::time::interval_at(start, leak_period))
        .map_err(|_| EngineError::NoTimer)?;
    Ok(ticker)
}

async fn leak(queue: Arc<Mutex<Queue>>, mut ticker: Interval, mut shutdown: Shutdown) {
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => {
                info!(engine = "leaky-bucket", "leaky bucket stopped");
                return;
            }
            _ = ticker.tick() => {
                let drained = queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pending
                    .pop_front();
                if let Some(arrival) = drained {
                    debug!(engine = "leaky-bucket", ?arrival, "processed request");
                }
            }
        }
    }
}
