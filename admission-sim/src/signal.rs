//! Process signals mapped onto a [`ShutdownTrigger`].

use admission_engine::ShutdownTrigger;
use tracing::info;
use tracing::warn;

/// Fires `trigger` on Ctrl+C, and on SIGTERM where available.
///
/// The listener runs as a background task on the current runtime.
pub fn install(trigger: ShutdownTrigger) -> std::io::Result<()> {
    #[cfg(unix)]
    let mut sigterm = {
        use tokio::signal::unix::SignalKind;
        use tokio::signal::unix::signal;
        signal(SignalKind::terminate())?
    };

    tokio::spawn(async move {
        #[cfg(unix)]
        let terminate = async {
            sigterm.recv().await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            res = tokio::signal::ctrl_c() => match res {
                Ok(()) => info!("Received interrupt signal (Ctrl+C)"),
                Err(e) => {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    return;
                }
            },
            _ = terminate => info!("Received SIGTERM signal"),
        }
        trigger.trigger();
    });

    info!("Signal handlers installed");
    Ok(())
}
