//! One-shot, broadcast shutdown notification.
//!
//! A [`ShutdownTrigger`] fires once and every cloned [`Shutdown`] observes it.
//! Triggering twice is harmless, and dropping the trigger counts as firing.

use std::sync::Arc;

use tokio::sync::watch;

/// Creates a connected trigger/signal pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (
        ShutdownTrigger { tx },
        Shutdown {
            rx,
            _keepalive: None,
        },
    )
}

#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Another signal connected to this trigger.
    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
            _keepalive: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
    // Owns the sender for signals that have no external trigger.
    _keepalive: Option<Arc<watch::Sender<bool>>>,
}

impl Shutdown {
    /// A signal nobody can trigger.
    ///
    /// The sender lives as long as any clone of the signal, so waiting on it
    /// never resolves.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _keepalive: Some(Arc::new(tx)),
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the trigger fires or is dropped.
    pub async fn wait(&mut self) {
        // An Err means the sender is gone, which is also a shutdown.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn every_reader_observes_the_trigger() {
        let (trigger, shutdown) = channel();
        let mut a = shutdown.clone();
        let mut b = trigger.subscribe();

        assert!(!shutdown.is_triggered());

        let waiters = tokio::spawn(async move {
            a.wait().await;
            b.wait().await;
        });

        trigger.trigger();
        trigger.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiters)
            .await
            .expect("waiters should wake")
            .unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn dropping_the_trigger_counts_as_shutdown() {
        let (trigger, mut shutdown) = channel();
        drop(trigger);

        assert!(shutdown.is_triggered());
        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .expect("closed channel should resolve");
    }

    #[tokio::test(start_paused = true)]
    async fn never_does_not_fire() {
        let mut shutdown = Shutdown::never();
        assert!(!shutdown.is_triggered());

        let fired = tokio::time::timeout(Duration::from_secs(60), shutdown.wait()).await;
        assert!(fired.is_err());
    }
}
