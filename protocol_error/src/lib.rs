//! Fatal error signalling for cryptographic protocol runs.

pub mod audit;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod report;

pub use context::FatalContext;
pub use error::{find_fatal, is_fatal, Cause, Chain, FatalProtocolError};
pub use report::{run_unit, FatalReport, UnitOutcome};

/// Result of protocol code whose only failure mode is fatal.
pub type Result<T> = std::result::Result<T, FatalProtocolError>;
