//! # tether-gitea
//!
//! Gitea API integration for Tether: divergence checks between a user branch
//! and the default branch, pull request reuse, merges and branch cleanup.
//!
//! # Security
//!
//! Access tokens are stored using `SecretString` which automatically
//! zeroizes memory when dropped, reducing credential exposure in memory dumps.

mod auth;
mod client;
mod error;
mod traits;
mod types;

pub use auth::{Auth, TOKEN_ENV_VARS};
pub use client::{GiteaClient, MergeOutcome};
pub use error::{Error, Result};
// Re-export SecretString for constructing Auth::Token and SyncParams
pub use secrecy::SecretString;
pub use traits::BranchSyncApi;
pub use types::{
    CreatePullRequest, MergePullRequest, PullRequest, RequestExtras, SyncParams, SyncStatus,
};
