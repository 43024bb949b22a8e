use std::sync::Arc;

use admission_engine::shutdown;
use admission_sim::Simulator;
use admission_sim::TrafficReplay;
use admission_sim::cli::Cli;
use admission_sim::cli::Command;
use admission_sim::signal;
use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let (trigger, stopping) = shutdown::channel();
    let stop = trigger.subscribe();

    let engine = cli
        .engine
        .to_config()
        .build(stopping.clone())
        .with_context(|| format!("failed to build {} engine", cli.engine.kind))?;
    info!(engine = %engine.kind(), capacity = cli.engine.capacity, "engine ready");

    signal::install(trigger).context("failed to install signal handlers")?;

    match cli.command {
        Command::Run { log, pace } => {
            let decisions = TrafficReplay::new(&engine, stopping)
                .with_pace(pace)
                .replay_file(&log)
                .await
                .with_context(|| format!("failed to replay {}", log.display()))?;
            println!("--- {} ---", engine.kind());
            println!("{decisions}");
        }
        Command::Simulate {
            workers,
            requests,
            wait,
            jitter,
        } => {
            let engine = Arc::new(engine);
            let report = Simulator::new(Arc::clone(&engine), stopping)
                .with_workers(workers)
                .with_requests(requests)
                .with_wait(wait)
                .with_jitter(jitter)
                .run()
                .await?;
            println!("--- {} ---", engine.kind());
            print!("{report}");
        }
    }

    if stop.is_triggered() {
        info!("stopped by signal");
    }
    Ok(())
}
