//! # tether-core
//!
//! Orchestration for keeping a user branch in sync with a repository's
//! default branch: retries, a rate-limited call queue, the
//! [`BranchMerger`] that owns sync status and polling, and the
//! [`UpdateGate`] that decides when an update may run.

pub mod config;
pub mod error;
pub mod gate;
pub mod merger;
pub mod queue;
pub mod retry;

#[cfg(test)]
mod test_mocks;

pub use config::{Config, DEFAULT_CONFIG_FILE, ServerConfig, SyncConfig};
pub use error::{Error, Result};
pub use gate::{ClickOutcome, DIALOG_LINK_TOOLTIP, Dialog, GateView, TargetFile, UpdateGate};
pub use merger::{BranchMerger, MergerConfig, MergerState};
pub use queue::RateLimitedQueue;
pub use retry::RetryPolicy;
