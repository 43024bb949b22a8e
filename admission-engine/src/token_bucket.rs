use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::SystemTime;

use arc_swap::ArcSwap;
use tracing::warn;

use crate::Clock;
use crate::Engine;
use crate::EngineError;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tokens {
    available: f64,
    /// Arrival time of the last admitted request, `None` before the first.
    last_refill: Option<SystemTime>,
}

/// A continuously refilling token bucket.
///
/// The bucket starts full. Each admitted request removes `consume_rate`
/// tokens, and tokens flow back at `fill_rate` per second up to `capacity`.
/// A denied request does not move `last_refill`, so the refill accrued since
/// the last admission is never thrown away.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    fill_rate: f64,
    consume_rate: f64,
    state: ArcSwap<Tokens>,
    clock: Clock,
}

impl Engine for TokenBucket {
    fn allow(&self) -> bool {
        self.allow_at(self.clock.now())
    }

    fn allow_at(&self, arrival: SystemTime) -> bool {
        loop {
            let current = self.state.load();

            let available = match current.last_refill {
                None => current.available,
                Some(last) => {
                    let Ok(elapsed) = arrival.duration_since(last) else {
                        warn!(
                            engine = "token-bucket",
                            ?arrival,
                            last_refill = ?last,
                            "negative elapsed time detected; possible clock skew"
                        );
                        return false;
                    };
                    (current.available + self.fill_rate * elapsed.as_secs_f64()).min(self.capacity)
                }
            };

            if available < self.consume_rate {
                return false;
            }

            let next = Tokens {
                available: available - self.consume_rate,
                last_refill: Some(arrival),
            };
            let previous = self.state.compare_and_swap(&*current, Arc::new(next));
            if Arc::ptr_eq(&*current, &*previous) {
                return true;
            }
        }
    }
}

impl TokenBucket {
    /// Creates a new `TokenBucket`.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of tokens the bucket holds (the burst size).
    /// * `fill_rate` - Tokens regenerated per second.
    /// * `consume_rate` - Tokens removed by each admitted request.
    pub fn new(
        capacity: NonZeroUsize,
        fill_rate: f64,
        consume_rate: f64,
    ) -> Result<Self, EngineError> {
        Self::with_clock(capacity, fill_rate, consume_rate, Clock::new())
    }

    pub fn with_clock(
        capacity: NonZeroUsize,
        fill_rate: f64,
        consume_rate: f64,
        clock: Clock,
    ) -> Result<Self, EngineError> {
        let max = capacity.get() as f64;
        // Written so that NaN fails both checks.
        if !(consume_rate > 0.0 && consume_rate <= max) {
            return Err(EngineError::InvalidConsumeRate {
                consume_rate,
                capacity: capacity.get(),
            });
        }
        if !(fill_rate > 0.0 && fill_rate.is_finite()) {
            return Err(EngineError::InvalidFillRate(fill_rate));
        }
        Ok(Self {
            capacity: max,
            fill_rate,
            consume_rate,
            state: ArcSwap::from_pointee(Tokens {
                available: max,
                last_refill: None,
            }),
            clock,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn at_ms(ms: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_735_689_600) + Duration::from_millis(ms)
    }

    fn bucket(capacity: usize, fill_rate: f64, consume_rate: f64) -> TokenBucket {
        TokenBucket::new(NonZeroUsize::new(capacity).unwrap(), fill_rate, consume_rate).unwrap()
    }

    #[test]
    fn it_enforces_limits_starting_full() {
        // 1 token per millisecond
        let rl = bucket(3, 1_000.0, 1.0);

        for i in 0..3 {
            assert!(rl.allow_at(at_ms(0)), "request {} should be allowed", i + 1);
        }
        assert!(!rl.allow_at(at_ms(0)), "tokens should be exhausted");

        // 2ms later, 2 tokens have been refilled
        assert!(rl.allow_at(at_ms(2)));
        assert!(rl.allow_at(at_ms(2)));
        assert!(!rl.allow_at(at_ms(2)));
    }

    #[test]
    fn test_refill_is_capped_at_capacity() {
        let rl = bucket(3, 1_000.0, 1.0);
        assert!(rl.allow_at(at_ms(0)));

        // A long idle refills to capacity, not beyond
        for _ in 0..3 {
            assert!(rl.allow_at(at_ms(60_000)));
        }
        assert!(!rl.allow_at(at_ms(60_000)));
    }

    #[test]
    fn test_denial_does_not_advance_refill_time() {
        // 1 token per 10ms
        let rl = bucket(1, 100.0, 1.0);
        assert!(rl.allow_at(at_ms(0)));

        // Probes before a full token has accrued are denied...
        assert!(!rl.allow_at(at_ms(4)));
        assert!(!rl.allow_at(at_ms(8)));

        // ...but their time still counts from the last admission
        assert!(rl.allow_at(at_ms(10)));
    }

    #[test]
    fn test_consume_rate_is_not_hardwired_to_one() {
        let rl = bucket(10, 1.0, 4.0);

        assert!(rl.allow_at(at_ms(0)));
        assert!(rl.allow_at(at_ms(0)));
        // 2 tokens left, 4 needed
        assert!(!rl.allow_at(at_ms(0)));
        // 2 seconds refill 2 tokens
        assert!(rl.allow_at(at_ms(2_000)));
    }

    #[test]
    fn test_negative_elapsed_time() {
        let rl = bucket(5, 1_000.0, 1.0);

        assert!(rl.allow_at(at_ms(86_400_000)), "first request should be allowed");
        let before = **rl.state.load();

        assert!(!rl.allow_at(at_ms(86_399_000)), "skewed request should fail");
        assert_eq!(**rl.state.load(), before);
    }

    #[test]
    fn test_construction_validation() {
        let five = NonZeroUsize::new(5).unwrap();

        assert_eq!(
            TokenBucket::new(five, 0.0, 1.0).unwrap_err(),
            EngineError::InvalidFillRate(0.0)
        );
        assert!(matches!(
            TokenBucket::new(five, -1.0, 1.0),
            Err(EngineError::InvalidFillRate(_))
        ));
        assert!(matches!(
            TokenBucket::new(five, f64::INFINITY, 1.0),
            Err(EngineError::InvalidFillRate(_))
        ));
        assert!(matches!(
            TokenBucket::new(five, 1.0, 0.0),
            Err(EngineError::InvalidConsumeRate { .. })
        ));
        assert!(matches!(
            TokenBucket::new(five, 1.0, f64::NAN),
            Err(EngineError::InvalidConsumeRate { .. })
        ));
        assert_eq!(
            TokenBucket::new(five, 1.0, 10.0).unwrap_err(),
            EngineError::InvalidConsumeRate {
                consume_rate: 10.0,
                capacity: 5
            }
        );
        assert!(TokenBucket::new(five, 1.0, 5.0).is_ok());
    }

    #[tokio::test]
    async fn test_token_accumulation_deterministic() {
        let (quanta, mock) = quanta::Clock::mock();
        // 10 tokens per second, i.e. one per 100ms
        let rl = TokenBucket::with_clock(
            NonZeroUsize::new(10).unwrap(),
            10.0,
            1.0,
            Clock::from_quanta(quanta),
        )
        .unwrap();

        for _ in 0..10 {
            assert!(rl.allow());
        }

        // Probe every 30ms; denials must not swallow the accrued refill
        for _ in 0..3 {
            mock.increment(Duration::from_millis(30));
            assert!(!rl.allow());
        }

        // Total 90ms. Advance 11ms to hit 101ms.
        mock.increment(Duration::from_millis(11));
        assert!(rl.allow(), "Token should have accumulated at 101ms");
    }
}
