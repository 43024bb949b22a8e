/// Errors produced by traffic replay and load simulation.
///
/// Admission denials are never errors; they are tallied in the results.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The traffic log could not be opened or read.
    #[error("failed to read traffic log: {0}")]
    Io(#[from] std::io::Error),

    /// A line was not an RFC 3339 timestamp.
    ///
    /// `line` is 1-based, counting blank lines.
    #[error("line {line}: invalid timestamp {value:?}: {source}")]
    Timestamp {
        line: usize,
        value: String,
        #[source]
        source: humantime::TimestampError,
    },

    #[error("failed to create latency histogram: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),

    /// A simulated worker panicked.
    #[error("simulation worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
