//! Coordination Module
//!
//! Cancellation plumbing shared by the subscription pollers, the position
//! monitor and the orchestrator loop.

pub mod shutdown;

pub use shutdown::{wait_for_os_signal, Shutdown, ShutdownSignal, ShutdownToken};
