//! Mock implementation of `BranchSyncApi` for testing.
//!
//! Responses are scripted per operation; every call is recorded with the
//! (paused) tokio clock so tests can assert ordering and spacing.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tether_gitea::{BranchSyncApi, Error, Result, SyncParams, SyncStatus};
use tokio::time::Instant;

/// The four sync operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CheckPull,
    Pull,
    CheckPush,
    Push,
}

/// One recorded call.
#[derive(Debug, Clone)]
pub struct Call {
    pub op: Op,
    pub at: Instant,
    pub user_branch: String,
    pub default_branch: Option<String>,
    pub description: Option<String>,
}

#[derive(Default)]
struct Inner {
    scripted: HashMap<Op, VecDeque<std::result::Result<SyncStatus, String>>>,
    defaults: HashMap<Op, SyncStatus>,
    calls: Vec<Call>,
}

/// Scriptable `BranchSyncApi`. Clones share the same script and call log.
#[derive(Clone, Default)]
pub struct MockSyncApi {
    inner: Arc<Mutex<Inner>>,
    latency: Duration,
}

impl MockSyncApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one response for `op`. `Err` becomes a 503 API error.
    pub fn respond(self, op: Op, response: std::result::Result<SyncStatus, &str>) -> Self {
        self.lock()
            .scripted
            .entry(op)
            .or_default()
            .push_back(response.map_err(str::to_string));
        self
    }

    /// Response for `op` once its script is exhausted.
    pub fn default_response(self, op: Op, status: SyncStatus) -> Self {
        self.lock().defaults.insert(op, status);
        self
    }

    /// Time each call takes after dispatch.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, op: Op) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn answer(&self, op: Op, params: &SyncParams, description: Option<&str>) -> Result<SyncStatus> {
        let response = {
            let mut inner = self.lock();
            inner.calls.push(Call {
                op,
                at: Instant::now(),
                user_branch: params.user_branch.clone(),
                default_branch: params.default_branch().map(str::to_string),
                description: description.map(str::to_string),
            });
            let scripted = inner.scripted.get_mut(&op).and_then(VecDeque::pop_front);
            scripted.unwrap_or_else(|| {
                Ok(inner
                    .defaults
                    .get(&op)
                    .cloned()
                    .unwrap_or_else(SyncStatus::up_to_date))
            })
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        response.map_err(|message| Error::ApiError {
            status: 503,
            message,
        })
    }
}

impl BranchSyncApi for MockSyncApi {
    async fn check_pull_from_default(&self, params: &SyncParams) -> Result<SyncStatus> {
        self.answer(Op::CheckPull, params, None).await
    }

    async fn pull_from_default(&self, params: &SyncParams) -> Result<SyncStatus> {
        self.answer(Op::Pull, params, None).await
    }

    async fn check_push_to_default(&self, params: &SyncParams) -> Result<SyncStatus> {
        self.answer(Op::CheckPush, params, None).await
    }

    async fn push_to_default(&self, params: &SyncParams, pr_description: &str) -> Result<SyncStatus> {
        self.answer(Op::Push, params, Some(pr_description)).await
    }
}
