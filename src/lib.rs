//! LeaveChain - transaction lifecycle coordination for an on-chain
//! leave-request contract.
//!
//! Turns a caller intent (apply / approve / reject) into a submission through
//! an external write transport, tracks it from submission through
//! confirmation, and keeps a read-through cache of contract facts fresh
//! across confirmed transactions.

pub mod chain;
pub mod config;
pub mod coordinator;
pub mod error;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::LifecycleCoordinator;
pub use error::{LeaveChainError, Result};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Default runtime values
pub mod defaults {
    use std::time::Duration;

    /// Default request timeout for the external transport
    pub const RPC_TIMEOUT: Duration = Duration::from_secs(10);

    /// Interval at which `settled` re-checks the state machine
    pub const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// Default confirmation delay of the simulated backend
    pub const SIM_CONFIRM_DELAY: Duration = Duration::from_millis(250);
}
