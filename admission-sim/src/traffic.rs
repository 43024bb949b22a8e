use std::fmt;
use std::path::Path;
use std::time::Duration;

use admission_engine::Engine;
use admission_engine::Shutdown;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tracing::info;

use crate::SimError;

/// Tally of admission decisions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Decisions {
    pub allowed: usize,
    pub denied: usize,
}

impl Decisions {
    pub fn record(&mut self, allowed: bool) {
        if allowed {
            self.allowed += 1;
        } else {
            self.denied += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.allowed + self.denied
    }
}

impl fmt::Display for Decisions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Allowed/Total:   {}/{}",
            self.allowed,
            self.total()
        )
    }
}

/// Feeds recorded request timestamps to an engine, one per line.
///
/// Each non-empty line is an RFC 3339 timestamp handed to
/// [`Engine::allow_at`]. The decision is printed as `ALLOWED` or `BLOCKED`,
/// then the replay pauses for `pace` before the next line.
#[derive(Debug)]
pub struct TrafficReplay<'a, E: ?Sized> {
    engine: &'a E,
    pace: Duration,
    shutdown: Shutdown,
    quiet: bool,
}

impl<'a, E> TrafficReplay<'a, E>
where
    E: Engine + ?Sized,
{
    pub fn new(engine: &'a E, shutdown: Shutdown) -> Self {
        Self {
            engine,
            pace: Duration::from_millis(500),
            shutdown,
            quiet: false,
        }
    }

    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    /// Suppress the per-line `ALLOWED`/`BLOCKED` output.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub async fn replay_file(self, path: impl AsRef<Path>) -> Result<Decisions, SimError> {
        let file = tokio::fs::File::open(path).await?;
        self.replay(BufReader::new(file)).await
    }

    /// Replays until the input is exhausted or shutdown fires.
    ///
    /// # Errors
    ///
    /// Stops at the first unreadable input or malformed timestamp.
    pub async fn replay<R>(mut self, reader: R) -> Result<Decisions, SimError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut decisions = Decisions::default();
        let mut line_no = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.wait() => {
                    info!("shutdown requested; stopping traffic replay");
                    break;
                }
                next = lines.next_line() => next?,
            };
            let Some(line) = next else {
                break;
            };
            line_no += 1;

            let value = line.trim();
            if value.is_empty() {
                continue;
            }
            let arrival =
                humantime::parse_rfc3339_weak(value).map_err(|source| SimError::Timestamp {
                    line: line_no,
                    value: value.to_string(),
                    source,
                })?;

            let allowed = self.engine.allow_at(arrival);
            decisions.record(allowed);
            if !self.quiet {
                println!("{}", if allowed { "ALLOWED" } else { "BLOCKED" });
            }

            if !self.pace.is_zero() {
                tokio::select! {
                    biased;
                    _ = self.shutdown.wait() => {
                        info!("shutdown requested; stopping traffic replay");
                        break;
                    }
                    _ = tokio::time::sleep(self.pace) => {}
                }
            }
        }

        Ok(decisions)
    }
}
