//! Trait abstraction for the four branch sync operations.
//!
//! The orchestrator only ever talks to [`BranchSyncApi`], so tests and
//! alternative backends can stand in for the real [`crate::GiteaClient`].

use crate::{Result, SyncParams, SyncStatus};

/// Branch sync operations against a git-hosting server.
///
/// Every method is plain request/response: no retries and no rate limiting.
/// An `Err` means transport, authentication or an unexpected API failure.
/// Conflicts and up-to-date branches come back as `Ok(SyncStatus)`.
pub trait BranchSyncApi: Send + Sync {
    /// Does the default branch have commits the user branch lacks?
    fn check_pull_from_default(
        &self,
        params: &SyncParams,
    ) -> impl std::future::Future<Output = Result<SyncStatus>> + Send;

    /// Merge the default branch into the user branch.
    fn pull_from_default(
        &self,
        params: &SyncParams,
    ) -> impl std::future::Future<Output = Result<SyncStatus>> + Send;

    /// Can the user branch be merged into the default branch cleanly?
    fn check_push_to_default(
        &self,
        params: &SyncParams,
    ) -> impl std::future::Future<Output = Result<SyncStatus>> + Send;

    /// Merge the user branch into the default branch.
    ///
    /// `pr_description` becomes the body of the pull request. When the user
    /// branch no longer diverges afterwards it may be deleted, which is
    /// reported through `user_branch_deleted`.
    fn push_to_default(
        &self,
        params: &SyncParams,
        pr_description: &str,
    ) -> impl std::future::Future<Output = Result<SyncStatus>> + Send;
}
