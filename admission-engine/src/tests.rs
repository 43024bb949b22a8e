use std::sync::Arc;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;
use std::time::SystemTime;

use more_asserts::assert_le;

use super::*;

fn config(kind: EngineKind, capacity: usize) -> EngineConfig {
    EngineConfig::new(kind)
        .with_capacity(capacity)
        .with_window(Duration::from_secs(60))
        .with_fill_rate(1.0 / 3600.0)
        .with_leak_period(Duration::from_secs(60))
}

// Arrivals must not precede the sliding counter's origin, which is "now".
fn arrival() -> SystemTime {
    SystemTime::now() + Duration::from_secs(1)
}

fn admitted_until_denied(engine: &AnyEngine, at: SystemTime) -> usize {
    let mut count = 0;
    while engine.allow_at(at) {
        count += 1;
    }
    count
}

macro_rules! test_engine_contract {
    ($name:ident, $kind:expr) => {
        #[cfg(test)]
        mod $name {
            use super::*;

            #[tokio::test]
            async fn test_capacity_bound() {
                let capacity = 10;
                let engine = config($kind, capacity).build(Shutdown::never()).unwrap();
                let at = arrival();

                let admitted = (0..capacity * 2).filter(|_| engine.allow_at(at)).count();
                assert_eq!(admitted, capacity);
            }

            #[tokio::test]
            async fn test_clock_skew_is_denied_without_side_effects() {
                let capacity = 5;
                let at = arrival();

                let skewed = config($kind, capacity).build(Shutdown::never()).unwrap();
                assert!(skewed.allow_at(at));
                assert!(!skewed.allow_at(at - Duration::from_secs(10)));

                let reference = config($kind, capacity).build(Shutdown::never()).unwrap();
                assert!(reference.allow_at(at));

                // Both continue exactly as if the skewed call never happened
                assert_eq!(
                    admitted_until_denied(&skewed, at),
                    admitted_until_denied(&reference, at)
                );
            }

            #[tokio::test]
            async fn test_concurrency_bound() {
                let capacity = 50;
                let callers = capacity * 2;
                let engine = Arc::new(config($kind, capacity).build(Shutdown::never()).unwrap());
                let barrier = Arc::new(Barrier::new(callers));
                let at = arrival();

                let handles: Vec<_> = (0..callers)
                    .map(|_| {
                        let engine = Arc::clone(&engine);
                        let barrier = Arc::clone(&barrier);
                        thread::spawn(move || {
                            barrier.wait();
                            engine.allow_at(at)
                        })
                    })
                    .collect();

                let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
                let admitted = results.iter().filter(|r| **r).count();
                let denied = results.len() - admitted;

                assert_eq!(admitted + denied, callers);
                assert_le!(admitted, capacity);
                // Every engine here is deterministic within a single instant
                assert_eq!(admitted, capacity);
            }

            #[tokio::test]
            async fn test_live_allow_admits_first_request() {
                let engine = config($kind, 1).build(Shutdown::never()).unwrap();
                assert!(engine.allow());
                assert!(!engine.allow());
            }
        }
    };
}

test_engine_contract!(fixed_window_contract, EngineKind::FixedWindow);

test_engine_contract!(sliding_window_log_contract, EngineKind::SlidingWindowLog);

test_engine_contract!(
    sliding_window_counter_contract,
    EngineKind::SlidingWindowCounter
);

test_engine_contract!(token_bucket_contract, EngineKind::TokenBucket);

test_engine_contract!(leaky_bucket_contract, EngineKind::LeakyBucket);
