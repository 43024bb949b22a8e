/// Errors produced while constructing an engine.
///
/// Admission decisions never fail: a denied request is a plain `false`.
/// These errors only surface from constructors and [`crate::EngineConfig::build`],
/// and no engine instance exists when one is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Capacity must be at least one request.
    #[error("capacity must be greater than 0")]
    InvalidCapacity,

    /// Window length must be a non-zero duration.
    #[error("window size must be greater than 0")]
    InvalidWindow,

    /// Token bucket fill rate must be positive and finite.
    #[error("fill rate must be > 0, got {0}")]
    InvalidFillRate(f64),

    /// Token bucket consume rate must lie in `(0, capacity]`.
    #[error("consume rate must be > 0 and <= capacity ({capacity}), got {consume_rate}")]
    InvalidConsumeRate {
        /// The rejected per-request consumption.
        consume_rate: f64,
        /// The configured bucket capacity.
        capacity: usize,
    },

    /// Leaky bucket drain period must be a non-zero duration.
    #[error("leak period must be greater than 0")]
    InvalidLeakPeriod,

    /// The engine kind string did not name a known algorithm.
    #[error("invalid rate-limiter engine type: {0:?}")]
    UnknownKind(String),

    /// The leaky bucket drain task needs a tokio runtime to be spawned on.
    #[error("leaky bucket must be constructed inside a tokio runtime")]
    NoRuntime,

    /// The current tokio runtime was built without its time driver, so the
    /// leaky bucket drain interval cannot be scheduled.
    #[error("leaky bucket requires a tokio runtime with timers enabled")]
    NoTimer,
}
