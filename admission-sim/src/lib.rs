//! # admission-sim
//!
//! Drives [`admission_engine`] engines with traffic, either replayed from a
//! log of recorded arrival times or generated by a pool of concurrent workers.
//!
//! * [`TrafficReplay`] feeds RFC 3339 timestamps to [`Engine::allow_at`] and
//!   tallies the decisions.
//! * [`Simulator`] spreads a request budget over tokio tasks calling
//!   [`Engine::allow`], recording decision latency in an HDR histogram.
//!
//! Both stop early when their [`Shutdown`] fires. The `rate-limiter` binary
//! wires that signal to Ctrl+C and SIGTERM through [`signal::install`].
//!
//! [`Engine::allow_at`]: admission_engine::Engine::allow_at
//! [`Engine::allow`]: admission_engine::Engine::allow
//! [`Shutdown`]: admission_engine::Shutdown

pub mod cli;
mod error;
pub mod signal;
mod simulator;
mod traffic;


pub use error::SimError;
pub use simulator::SimulationReport;
pub use simulator::Simulator;
pub use traffic::Decisions;
pub use traffic::TrafficReplay;
