use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use admission_engine::Engine;
use admission_engine::Shutdown;
use hdrhistogram::Histogram;
use rand::Rng;
use tokio::task::JoinSet;
use tracing::debug;
use tracing::info;

use crate::Decisions;
use crate::SimError;

/// Drives an engine with concurrent synthetic traffic.
///
/// `workers` tasks share a budget of `requests` calls to [`Engine::allow`].
/// Each worker claims the next request id, asks the engine, then pauses for
/// `wait` shifted by a uniformly random offset in `[-jitter, +jitter)`,
/// clamped at zero. Workers stop when the budget is spent or the
/// [`Shutdown`] signal fires.
#[derive(Debug)]
pub struct Simulator<E: ?Sized> {
    engine: Arc<E>,
    workers: usize,
    requests: usize,
    wait: Duration,
    jitter: Duration,
    shutdown: Shutdown,
    quiet: bool,
}

/// Outcome of a [`Simulator::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub decisions: Decisions,
    /// Time from the first worker start to the last worker exit, on the
    /// tokio clock.
    pub elapsed: Duration,
    /// Median latency of a single admission decision.
    pub p50: Duration,
    pub p99: Duration,
}

impl SimulationReport {
    /// Admission decisions per second of simulated wall time.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.decisions.total() as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Duration:  {:.2?}", self.elapsed)?;
        writeln!(f, "{}", self.decisions)?;
        writeln!(f, "Denied:          {}", self.decisions.denied)?;
        writeln!(f, "Total Rate:      {:.2} req/sec", self.throughput())?;
        if self.decisions.total() > 0 {
            writeln!(f, "P50 (Decision):  {:?}", self.p50)?;
            writeln!(f, "P99 (Decision):  {:?}", self.p99)?;
        }
        Ok(())
    }
}

impl<E> Simulator<E>
where
    E: Engine + ?Sized + 'static,
{
    pub fn new(engine: Arc<E>, shutdown: Shutdown) -> Self {
        Self {
            engine,
            workers: 4,
            requests: 100,
            wait: Duration::from_millis(10),
            jitter: Duration::from_millis(5),
            shutdown,
            quiet: false,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_requests(mut self, requests: usize) -> Self {
        self.requests = requests;
        self
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Suppress the per-request `ALLOWED`/`DENIED` output.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Runs every worker to completion and merges their results.
    ///
    /// With zero workers or zero requests this returns an empty report
    /// without consulting the engine.
    pub async fn run(self) -> Result<SimulationReport, SimError> {
        let mut latencies = Histogram::<u64>::new(3)?;
        let mut decisions = Decisions::default();
        let next_request = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();

        info!(
            workers = self.workers,
            requests = self.requests,
            "starting simulation"
        );
        let start = tokio::time::Instant::now();

        for worker in 0..self.workers {
            let worker = Worker {
                id: worker,
                engine: Arc::clone(&self.engine),
                next_request: Arc::clone(&next_request),
                requests: self.requests,
                wait: self.wait,
                jitter: self.jitter,
                shutdown: self.shutdown.clone(),
                quiet: self.quiet,
            };
            tasks.spawn(worker.run());
        }

        while let Some(task) = tasks.join_next().await {
            let outcomes = task?;
            for (allowed, latency) in outcomes {
                decisions.record(allowed);
                latencies.saturating_record(u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX));
            }
        }

        let report = SimulationReport {
            decisions,
            elapsed: start.elapsed(),
            p50: Duration::from_nanos(latencies.value_at_quantile(0.5)),
            p99: Duration::from_nanos(latencies.value_at_quantile(0.99)),
        };
        info!(
            allowed = report.decisions.allowed,
            denied = report.decisions.denied,
            "simulation finished"
        );
        Ok(report)
    }
}

struct Worker<E: ?Sized> {
    id: usize,
    engine: Arc<E>,
    next_request: Arc<AtomicUsize>,
    requests: usize,
    wait: Duration,
    jitter: Duration,
    shutdown: Shutdown,
    quiet: bool,
}

impl<E> Worker<E>
where
    E: Engine + ?Sized,
{
    async fn run(mut self) -> Vec<(bool, Duration)> {
        let mut outcomes = Vec::new();

        loop {
            if self.shutdown.is_triggered() {
                debug!(worker = self.id, "shutdown requested; worker exiting");
                break;
            }
            let request = self.next_request.fetch_add(1, Ordering::Relaxed);
            if request >= self.requests {
                break;
            }

            let started = Instant::now();
            let allowed = self.engine.allow();
            outcomes.push((allowed, started.elapsed()));

            if !self.quiet {
                println!(
                    "Request {}.{} {}",
                    self.id,
                    request,
                    if allowed { "ALLOWED" } else { "DENIED" }
                );
            }

            let delay = pause(self.wait, self.jitter);
            if delay.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                biased;
                _ = self.shutdown.wait() => {
                    debug!(worker = self.id, "shutdown requested; worker exiting");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        outcomes
    }
}

/// `wait` moved by a random offset in `[-jitter, +jitter)`, never negative.
fn pause(wait: Duration, jitter: Duration) -> Duration {
    let spread = u64::try_from(jitter.as_nanos())
        .unwrap_or(u64::MAX)
        .saturating_mul(2);
    if spread == 0 {
        return wait;
    }
    let offset = Duration::from_nanos(rand::rng().random_range(0..spread));
    wait.saturating_add(offset).saturating_sub(jitter)
}
