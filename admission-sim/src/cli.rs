use std::path::PathBuf;
use std::time::Duration;

use admission_engine::EngineConfig;
use admission_engine::EngineKind;
use clap::Args;
use clap::Parser;
use clap::Subcommand;

/// Replay or simulate traffic against an admission-control engine.
#[derive(Debug, Parser)]
#[command(name = "rate-limiter", version, about)]
pub struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub engine: EngineArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Feed a traffic log of RFC 3339 timestamps to the engine.
    Run {
        /// One timestamp per line; blank lines are skipped.
        #[arg(short, long)]
        log: PathBuf,

        /// Pause between two lines.
        #[arg(long, default_value = "500ms", value_parser = humantime::parse_duration)]
        pace: Duration,
    },
    /// Hammer the engine from concurrent workers.
    Simulate {
        #[arg(long, default_value_t = 4)]
        workers: usize,

        #[arg(long, default_value_t = 100)]
        requests: usize,

        /// Base pause after each request.
        #[arg(long, default_value = "10ms", value_parser = humantime::parse_duration)]
        wait: Duration,

        /// Maximum random shift of each pause, earlier or later.
        #[arg(long, default_value = "5ms", value_parser = humantime::parse_duration)]
        jitter: Duration,
    },
}

/// Engine selection and parameters shared by every command.
#[derive(Debug, Clone, Args)]
pub struct EngineArgs {
    #[arg(
        short = 'e',
        long = "engine",
        env = "RATE_LIMITER_ENGINE",
        default_value_t = EngineKind::TokenBucket
    )]
    pub kind: EngineKind,

    /// Requests per window, bucket size, or queue length.
    #[arg(long, default_value_t = 5)]
    pub capacity: usize,

    /// Token bucket refill in tokens per second.
    #[arg(long, default_value_t = 1.0 / 3600.0)]
    pub fill_rate: f64,

    /// Tokens taken by each admitted request.
    #[arg(long, default_value_t = 1.0)]
    pub consume_rate: f64,

    #[arg(long, default_value = "500ms", value_parser = humantime::parse_duration)]
    pub leak_period: Duration,

    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    pub window: Duration,
}

impl EngineArgs {
    pub fn to_config(&self) -> EngineConfig {
        EngineConfig::new(self.kind)
            .with_capacity(self.capacity)
            .with_fill_rate(self.fill_rate)
            .with_consume_rate(self.consume_rate)
            .with_leak_period(self.leak_period)
            .with_window(self.window)
    }
}
