//! Branch merge orchestration.
//!
//! [`BranchMerger`] owns the merge/update status for one identity tuple
//! (server, owner, repo, user branch, token). Every action runs the matching
//! [`BranchSyncApi`] call through a [`RetryPolicy`] whose attempts each pass
//! through the merger's own [`RateLimitedQueue`], then folds the outcome
//! into a [`SyncStatus`]. Nothing network-related escapes as an error.
//!
//! A changed identity tuple means a new merger: callers compare
//! [`BranchMerger::params`] against the new identity and rebuild.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tether_gitea::{BranchSyncApi, RequestExtras, SyncParams, SyncStatus};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::queue::RateLimitedQueue;
use crate::retry::RetryPolicy;

/// Shortest polling period accepted; `tokio::time::interval` rejects zero.
const MIN_AUTO_CHECK_INTERVAL: Duration = Duration::from_millis(1);

/// Construction-time settings for a [`BranchMerger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergerConfig {
    /// Poll the update status from [`BranchMerger::mount`] onwards.
    pub auto_check: bool,
    /// Polling period.
    pub auto_check_interval: Duration,
    /// Retry budget for each action.
    pub retry: RetryPolicy,
    /// Minimum gap between dispatched API calls.
    pub rate_limit_delay: Duration,
}

impl MergerConfig {
    /// Default polling period.
    pub const DEFAULT_AUTO_CHECK_INTERVAL: Duration = Duration::from_millis(30_000);
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            auto_check: false,
            auto_check_interval: Self::DEFAULT_AUTO_CHECK_INTERVAL,
            retry: RetryPolicy::default(),
            rate_limit_delay: RateLimitedQueue::DEFAULT_SPACING,
        }
    }
}

/// Snapshot of a merger's observable state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergerState {
    /// Result of the last merge check or merge (user -> default).
    pub merge_status: SyncStatus,
    /// Result of the last update check or update (default -> user).
    pub update_status: SyncStatus,
    /// An update-direction action is in flight.
    pub loading_update: bool,
    /// A merge-direction action is in flight.
    pub loading_merge: bool,
    /// The polling timer is live.
    pub is_auto_checking: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Update,
    Merge,
}

/// State shared between the merger and its polling task.
struct Shared<C> {
    client: C,
    params: SyncParams,
    retry: RetryPolicy,
    queue: RateLimitedQueue,
    state: watch::Sender<MergerState>,
    update_in_flight: AtomicUsize,
    merge_in_flight: AtomicUsize,
    disposed: AtomicBool,
}

impl<C: BranchSyncApi> Shared<C> {
    fn validate(&self) -> Option<SyncStatus> {
        let missing = self.params.missing();
        if missing.is_empty() {
            return None;
        }
        Some(SyncStatus::failure(format!(
            "Missing required parameters: {}",
            missing.join(", ")
        )))
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn counter(&self, direction: Direction) -> &AtomicUsize {
        match direction {
            Direction::Update => &self.update_in_flight,
            Direction::Merge => &self.merge_in_flight,
        }
    }

    /// Raise the loading flag until the returned guard drops.
    fn begin(&self, direction: Direction) -> LoadingGuard<'_, C> {
        // Counters only change inside `send_modify`, which serializes them.
        self.state.send_modify(|state| {
            self.counter(direction).fetch_add(1, Ordering::SeqCst);
            set_loading(state, direction, true);
        });
        LoadingGuard {
            shared: self,
            direction,
        }
    }

    fn finish(&self, direction: Direction) {
        self.state.send_modify(|state| {
            let remaining = self.counter(direction).fetch_sub(1, Ordering::SeqCst) - 1;
            set_loading(state, direction, remaining > 0);
        });
    }

    /// Normalize an API result and store it unless the merger was disposed.
    fn settle(&self, direction: Direction, result: tether_gitea::Result<SyncStatus>) -> SyncStatus {
        let status = result.unwrap_or_else(|e| SyncStatus::failure(e.to_string()));

        if self.is_disposed() {
            debug!(?direction, "merger disposed, dropping late result");
            return status;
        }

        let stored = status.clone();
        self.state.send_modify(|state| match direction {
            Direction::Update => state.update_status = stored,
            Direction::Merge => state.merge_status = stored,
        });
        status
    }

    async fn check_update_status(&self, extras: &RequestExtras) -> SyncStatus {
        if let Some(invalid) = self.validate() {
            return invalid;
        }
        let params = &self.params.merged(extras);
        let _loading = self.begin(Direction::Update);

        let result = self
            .retry
            .run(move || self.queue.submit(self.client.check_pull_from_default(params)))
            .await;
        self.settle(Direction::Update, result)
    }

    async fn update_user_branch(&self, extras: &RequestExtras) -> SyncStatus {
        if let Some(invalid) = self.validate() {
            return invalid;
        }
        let params = &self.params.merged(extras);
        let _loading = self.begin(Direction::Update);

        let result = self
            .retry
            .run(move || self.queue.submit(self.client.pull_from_default(params)))
            .await;
        self.settle(Direction::Update, result)
    }

    async fn check_merge_status(&self, extras: &RequestExtras) -> SyncStatus {
        if let Some(invalid) = self.validate() {
            return invalid;
        }
        let params = &self.params.merged(extras);
        let _loading = self.begin(Direction::Merge);

        let result = self
            .retry
            .run(move || self.queue.submit(self.client.check_push_to_default(params)))
            .await;
        self.settle(Direction::Merge, result)
    }

    async fn merge_master_branch(&self, pr_description: &str, extras: &RequestExtras) -> SyncStatus {
        if let Some(invalid) = self.validate() {
            return invalid;
        }
        let params = &self.params.merged(extras);
        let _loading = self.begin(Direction::Merge);

        let result = self
            .retry
            .run(move || {
                self.queue
                    .submit(self.client.push_to_default(params, pr_description))
            })
            .await;
        self.settle(Direction::Merge, result)
    }
}

const fn set_loading(state: &mut MergerState, direction: Direction, loading: bool) {
    match direction {
        Direction::Update => state.loading_update = loading,
        Direction::Merge => state.loading_merge = loading,
    }
}

/// Clears a loading flag on drop, including when the action is cancelled.
struct LoadingGuard<'a, C: BranchSyncApi> {
    shared: &'a Shared<C>,
    direction: Direction,
}

impl<C: BranchSyncApi> Drop for LoadingGuard<'_, C> {
    fn drop(&mut self) {
        self.shared.finish(self.direction);
    }
}

/// Orchestrates update and merge actions for one user branch.
///
/// Polling requires a running tokio runtime. Dropping the merger disposes
/// it: polling stops and late results are no longer stored.
pub struct BranchMerger<C: BranchSyncApi + 'static> {
    shared: Arc<Shared<C>>,
    auto_check: bool,
    auto_check_interval: Mutex<Duration>,
    /// Held while polling. Dropping it ends the polling loop.
    poller: Mutex<Option<watch::Sender<()>>>,
}

impl<C: BranchSyncApi + 'static> BranchMerger<C> {
    /// Create a merger. No request is made until an action or
    /// [`BranchMerger::mount`] is called.
    pub fn new(client: C, params: SyncParams, config: MergerConfig) -> Self {
        let (state, _) = watch::channel(MergerState::default());
        Self {
            shared: Arc::new(Shared {
                client,
                params,
                retry: config.retry,
                queue: RateLimitedQueue::new(config.rate_limit_delay),
                state,
                update_in_flight: AtomicUsize::new(0),
                merge_in_flight: AtomicUsize::new(0),
                disposed: AtomicBool::new(false),
            }),
            auto_check: config.auto_check,
            auto_check_interval: Mutex::new(config.auto_check_interval),
            poller: Mutex::new(None),
        }
    }

    /// The identity this merger serves.
    #[must_use]
    pub fn params(&self) -> &SyncParams {
        &self.shared.params
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> MergerState {
        self.shared.state.borrow().clone()
    }

    /// Receive every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MergerState> {
        self.shared.state.subscribe()
    }

    /// Initial checks: the merge status always, and the update status either
    /// directly or through the first tick of the poller when auto-checking.
    pub async fn mount(&self) {
        let none = RequestExtras::default();
        if self.auto_check {
            self.start_auto_check();
            self.check_merge_status(&none).await;
        } else {
            tokio::join!(self.check_merge_status(&none), self.check_update_status(&none));
        }
    }

    /// Does the default branch have commits the user branch lacks?
    pub async fn check_update_status(&self, extras: &RequestExtras) -> SyncStatus {
        self.shared.check_update_status(extras).await
    }

    /// Merge the default branch into the user branch.
    pub async fn update_user_branch(&self, extras: &RequestExtras) -> SyncStatus {
        self.shared.update_user_branch(extras).await
    }

    /// Can the user branch be merged into the default branch?
    pub async fn check_merge_status(&self, extras: &RequestExtras) -> SyncStatus {
        self.shared.check_merge_status(extras).await
    }

    /// Merge the user branch into the default branch.
    pub async fn merge_master_branch(
        &self,
        pr_description: &str,
        extras: &RequestExtras,
    ) -> SyncStatus {
        self.shared.merge_master_branch(pr_description, extras).await
    }

    /// Start polling the update status. No-op while already polling or
    /// after disposal.
    pub fn start_auto_check(&self) {
        let mut poller = lock(&self.poller);
        if poller.is_some() || self.shared.is_disposed() {
            return;
        }

        let period = (*lock(&self.auto_check_interval)).max(MIN_AUTO_CHECK_INTERVAL);
        let (stop, stopped) = watch::channel(());
        tokio::spawn(poll(Arc::downgrade(&self.shared), period, stopped));
        *poller = Some(stop);
        self.shared
            .state
            .send_modify(|state| state.is_auto_checking = true);
        info!(interval_ms = period.as_millis(), "auto-check started");
    }

    /// Stop polling. No check fires after this returns; a check already in
    /// flight still settles.
    pub fn stop_auto_check(&self) {
        if lock(&self.poller).take().is_some() {
            info!("auto-check stopped");
        }
        if !self.shared.is_disposed() {
            self.shared
                .state
                .send_modify(|state| state.is_auto_checking = false);
        }
    }

    /// Current polling period.
    #[must_use]
    pub fn auto_check_interval(&self) -> Duration {
        *lock(&self.auto_check_interval)
    }

    /// Change the polling period. A live poller restarts at once with the
    /// new period, starting with an immediate check.
    pub fn set_auto_check_interval(&self, interval: Duration) {
        *lock(&self.auto_check_interval) = interval;
        if self.state().is_auto_checking {
            self.stop_auto_check();
            self.start_auto_check();
        }
    }

    /// Stop polling and stop storing results. Idempotent.
    pub fn dispose(&self) {
        self.stop_auto_check();
        if !self.shared.disposed.swap(true, Ordering::SeqCst) {
            debug!("merger disposed");
        }
    }
}

impl<C: BranchSyncApi + 'static> Drop for BranchMerger<C> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<C: BranchSyncApi + 'static> std::fmt::Debug for BranchMerger<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchMerger")
            .field("owner", &self.shared.params.owner)
            .field("repo", &self.shared.params.repo)
            .field("user_branch", &self.shared.params.user_branch)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Polling loop: an immediate check, then one per `period`.
///
/// Holds only a weak reference so it never keeps a dropped merger alive.
/// Ends once the sender behind `stopped` is dropped. Only the wait for the
/// next tick is cancelled; a running check is never interrupted.
async fn poll<C: BranchSyncApi + 'static>(
    shared: Weak<Shared<C>>,
    period: Duration,
    mut stopped: watch::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let none = RequestExtras::default();

    loop {
        tokio::select! {
            biased;
            _ = stopped.changed() => break,
            _ = ticker.tick() => {}
        }
        if stopped.has_changed().is_err() {
            break;
        }
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if shared.is_disposed() {
            break;
        }
        debug!("auto-check tick");
        shared.check_update_status(&none).await;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tether_gitea::SecretString;
    use tokio::time::{Instant, sleep};

    use super::*;
    use crate::test_mocks::{MockSyncApi, Op};

    fn params() -> SyncParams {
        SyncParams::new("s", "o", "r", "u", SecretString::from("t"))
    }

    fn merger(mock: MockSyncApi) -> BranchMerger<MockSyncApi> {
        BranchMerger::new(mock, params(), MergerConfig::default())
    }

    fn none() -> RequestExtras {
        RequestExtras::default()
    }

    // === Validation ===

    #[tokio::test(start_paused = true)]
    async fn test_missing_params_short_circuit_every_action() {
        let mock = MockSyncApi::new();
        let mut p = params();
        p.owner.clear();
        p.tokenid = SecretString::from("");
        let merger = BranchMerger::new(mock.clone(), p, MergerConfig::default());
        let start = Instant::now();

        let results = [
            merger.check_update_status(&none()).await,
            merger.update_user_branch(&none()).await,
            merger.check_merge_status(&none()).await,
            merger.merge_master_branch("desc", &none()).await,
        ];

        for status in results {
            assert!(status.error);
            assert_eq!(status.message, "Missing required parameters: owner, tokenid");
        }
        assert_eq!(Instant::now(), start);
        assert!(mock.calls().is_empty());
        assert_eq!(merger.state(), MergerState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_missing_field_is_named() {
        let fields = ["server", "owner", "repo", "userBranch", "tokenid"];
        for field in fields {
            let mut p = params();
            match field {
                "server" => p.server.clear(),
                "owner" => p.owner.clear(),
                "repo" => p.repo.clear(),
                "userBranch" => p.user_branch.clear(),
                _ => p.tokenid = SecretString::from(""),
            }
            let mock = MockSyncApi::new();
            let merger = BranchMerger::new(mock.clone(), p, MergerConfig::default());

            let status = merger.check_merge_status(&none()).await;

            assert_eq!(status.message, format!("Missing required parameters: {field}"));
            assert!(mock.calls().is_empty());
        }
    }

    // === Actions ===

    #[tokio::test(start_paused = true)]
    async fn test_check_merge_status_stores_result() {
        let expected = SyncStatus {
            merge_needed: true,
            success: true,
            ..SyncStatus::default()
        };
        let mock = MockSyncApi::new().respond(Op::CheckPush, Ok(expected.clone()));
        let merger = merger(mock);

        let status = merger.check_merge_status(&none()).await;

        assert_eq!(status, expected);
        let state = merger.state();
        assert_eq!(state.merge_status, expected);
        assert!(!state.loading_merge);
        assert_eq!(state.update_status, SyncStatus::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_flag_raised_while_in_flight() {
        let mock = MockSyncApi::new().with_latency(Duration::from_millis(200));
        let merger = merger(mock);
        let none = none();

        let (_, during) = tokio::join!(merger.update_user_branch(&none), async {
            sleep(Duration::from_millis(50)).await;
            merger.state()
        });

        assert!(during.loading_update);
        assert!(!during.loading_merge);
        assert!(!merger.state().loading_update);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_actions_keep_flag_until_last_settles() {
        let mock = MockSyncApi::new().with_latency(Duration::from_millis(100));
        let merger = merger(mock);
        let none = none();

        // Second check dispatches 1s after the first and finishes at 1.1s.
        let (_, _, mid) = tokio::join!(
            merger.check_update_status(&none),
            merger.check_update_status(&none),
            async {
                sleep(Duration::from_millis(500)).await;
                merger.state()
            }
        );

        assert!(mid.loading_update);
        assert!(!merger.state().loading_update);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried_through_queue() {
        let mock = MockSyncApi::new()
            .respond(Op::CheckPull, Err("unavailable"))
            .respond(Op::CheckPull, Err("unavailable"))
            .respond(Op::CheckPull, Ok(SyncStatus::up_to_date()));
        let merger = merger(mock.clone());

        let status = merger.check_update_status(&none()).await;

        assert_eq!(status, SyncStatus::up_to_date());
        let calls = mock.calls();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1].at - pair[0].at >= Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_queues_behind_work_submitted_during_its_delay() {
        let mock = MockSyncApi::new().respond(Op::CheckPull, Err("unavailable"));
        let merger = merger(mock.clone());
        let none = none();
        let start = Instant::now();

        let (update, merge) = tokio::join!(merger.check_update_status(&none), async {
            sleep(Duration::from_millis(500)).await;
            merger.check_merge_status(&none).await
        });

        assert_eq!(update, SyncStatus::up_to_date());
        assert!(merge.success);
        let calls: Vec<(Op, Duration)> = mock
            .calls()
            .iter()
            .map(|c| (c.op, c.at - start))
            .collect();
        assert_eq!(
            calls,
            vec![
                (Op::CheckPull, Duration::ZERO),
                (Op::CheckPush, Duration::from_secs(1)),
                (Op::CheckPull, Duration::from_secs(2)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_become_error_status() {
        let mock = MockSyncApi::new()
            .respond(Op::Push, Err("unavailable"))
            .respond(Op::Push, Err("unavailable"))
            .respond(Op::Push, Err("still unavailable"));
        let merger = merger(mock.clone());

        let status = merger.merge_master_branch("desc", &none()).await;

        assert!(status.error);
        assert!(!status.success);
        assert_eq!(status.message, "API error (503): still unavailable");
        assert_eq!(merger.state().merge_status, status);
        assert!(!merger.state().loading_merge);
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflict_is_not_retried() {
        let mock = MockSyncApi::new().respond(Op::Pull, Ok(SyncStatus::conflict("http://pr/3")));
        let merger = merger(mock.clone());

        let status = merger.update_user_branch(&none()).await;

        assert!(status.conflict);
        assert!(!status.error);
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_actions_share_one_rate_limit() {
        let mock = MockSyncApi::new();
        let merger = merger(mock.clone());
        let none = none();

        tokio::join!(
            merger.check_merge_status(&none),
            merger.check_update_status(&none),
            merger.update_user_branch(&none),
            merger.merge_master_branch("desc", &none),
        );

        let calls = mock.calls();
        let ops: Vec<Op> = calls.iter().map(|c| c.op).collect();
        assert_eq!(ops, vec![Op::CheckPush, Op::CheckPull, Op::Pull, Op::Push]);
        for pair in calls.windows(2) {
            assert!(pair[1].at - pair[0].at >= Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_mergers_do_not_share_a_queue() {
        let mock = MockSyncApi::new();
        let first = merger(mock.clone());
        let second = merger(mock.clone());
        let none = none();
        let start = Instant::now();

        tokio::join!(
            first.check_merge_status(&none),
            second.check_merge_status(&none),
        );

        assert_eq!(Instant::now(), start);
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checks_are_idempotent() {
        let mock = MockSyncApi::new().default_response(Op::CheckPull, SyncStatus::merge_needed(""));
        let merger = merger(mock);

        let first = merger.check_update_status(&none()).await;
        let second = merger.check_update_status(&none()).await;

        assert_eq!(first, second);
        assert_eq!(merger.state().update_status, first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extras_are_merged_over_identity() {
        let mock = MockSyncApi::new();
        let merger = merger(mock.clone());
        let extras = RequestExtras::new()
            .with("userBranch", "other")
            .with(SyncParams::DEFAULT_BRANCH, "main");

        merger.check_update_status(&extras).await;

        let call = &mock.calls()[0];
        assert_eq!(call.user_branch, "other");
        assert_eq!(call.default_branch.as_deref(), Some("main"));
        assert_eq!(merger.params().user_branch, "u");
    }

    #[tokio::test(start_paused = true)]
    async fn test_merge_passes_description() {
        let mock = MockSyncApi::new();
        let merger = merger(mock.clone());

        merger.merge_master_branch("Chapter 3 review", &none()).await;

        assert_eq!(mock.calls()[0].description.as_deref(), Some("Chapter 3 review"));
    }

    // === Polling ===

    #[tokio::test(start_paused = true)]
    async fn test_auto_check_fires_immediately_then_on_interval() {
        let mock = MockSyncApi::new();
        let merger = merger(mock.clone());
        let start = Instant::now();

        merger.start_auto_check();
        assert!(merger.state().is_auto_checking);
        sleep(Duration::from_secs(65)).await;

        let offsets: Vec<Duration> = mock
            .calls_of(Op::CheckPull)
            .iter()
            .map(|c| c.at - start)
            .collect();
        assert_eq!(
            offsets,
            vec![
                Duration::ZERO,
                Duration::from_secs(30),
                Duration::from_secs(60)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_auto_check_stops_all_checks() {
        let mock = MockSyncApi::new();
        let merger = merger(mock.clone());

        merger.start_auto_check();
        sleep(Duration::from_secs(31)).await;
        merger.stop_auto_check();
        let fired = mock.calls().len();
        sleep(Duration::from_secs(600)).await;

        assert_eq!(fired, 2);
        assert_eq!(mock.calls().len(), fired);
        assert!(!merger.state().is_auto_checking);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_lets_running_check_settle() {
        let mock = MockSyncApi::new()
            .with_latency(Duration::from_millis(500))
            .respond(Op::CheckPull, Ok(SyncStatus::merge_needed("http://pr/9")));
        let merger = merger(mock.clone());

        merger.start_auto_check();
        sleep(Duration::from_millis(100)).await;
        assert!(merger.state().loading_update);
        merger.stop_auto_check();
        sleep(Duration::from_secs(5)).await;

        let state = merger.state();
        assert_eq!(mock.calls().len(), 1);
        assert_eq!(state.update_status, SyncStatus::merge_needed("http://pr/9"));
        assert!(!state.loading_update);
        assert!(!state.is_auto_checking);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_auto_check_is_idempotent() {
        let mock = MockSyncApi::new();
        let merger = merger(mock.clone());

        merger.start_auto_check();
        merger.start_auto_check();
        sleep(Duration::from_secs(1)).await;

        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_restarts_poller() {
        let mock = MockSyncApi::new();
        let merger = merger(mock.clone());
        let start = Instant::now();

        merger.start_auto_check();
        sleep(Duration::from_secs(2)).await;
        merger.set_auto_check_interval(Duration::from_secs(5));
        sleep(Duration::from_secs(11)).await;

        let offsets: Vec<u64> = mock
            .calls()
            .iter()
            .map(|c| (c.at - start).as_secs())
            .collect();
        assert_eq!(offsets, vec![0, 2, 7, 12]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_while_idle_does_not_start() {
        let mock = MockSyncApi::new();
        let merger = merger(mock.clone());

        merger.set_auto_check_interval(Duration::from_secs(5));
        sleep(Duration::from_secs(20)).await;

        assert!(mock.calls().is_empty());
        assert_eq!(merger.auto_check_interval(), Duration::from_secs(5));
    }

    // === Lifecycle ===

    #[tokio::test(start_paused = true)]
    async fn test_mount_without_auto_check() {
        let mock = MockSyncApi::new();
        let merger = merger(mock.clone());

        merger.mount().await;

        let ops: Vec<Op> = mock.calls().iter().map(|c| c.op).collect();
        assert_eq!(ops, vec![Op::CheckPush, Op::CheckPull]);
        assert!(!merger.state().is_auto_checking);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_with_auto_check_does_not_double_check() {
        let mock = MockSyncApi::new();
        let config = MergerConfig {
            auto_check: true,
            ..MergerConfig::default()
        };
        let merger = BranchMerger::new(mock.clone(), params(), config);

        merger.mount().await;
        sleep(Duration::from_secs(5)).await;

        assert_eq!(mock.calls_of(Op::CheckPush).len(), 1);
        assert_eq!(mock.calls_of(Op::CheckPull).len(), 1);
        assert!(merger.state().is_auto_checking);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_poller() {
        let mock = MockSyncApi::new();
        let merger = merger(mock.clone());

        merger.start_auto_check();
        sleep(Duration::from_secs(1)).await;
        drop(merger);
        sleep(Duration::from_secs(600)).await;

        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_after_dispose_is_not_stored() {
        let mock = MockSyncApi::new()
            .with_latency(Duration::from_millis(500))
            .respond(Op::CheckPull, Ok(SyncStatus::conflict("http://pr/1")));
        let merger = merger(mock);
        let none = none();

        let (status, ()) = tokio::join!(merger.check_update_status(&none), async {
            sleep(Duration::from_millis(100)).await;
            merger.dispose();
        });

        assert!(status.conflict);
        assert_eq!(merger.state().update_status, SyncStatus::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_auto_check_after_dispose() {
        let mock = MockSyncApi::new();
        let merger = merger(mock.clone());

        merger.dispose();
        merger.start_auto_check();
        sleep(Duration::from_secs(60)).await;

        assert!(mock.calls().is_empty());
        assert!(!merger.state().is_auto_checking);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_status_changes() {
        let mock = MockSyncApi::new().respond(Op::CheckPush, Ok(SyncStatus::merge_needed("x")));
        let merger = merger(mock);
        let mut rx = merger.subscribe();

        merger.check_merge_status(&none()).await;

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().merge_status.merge_needed);
    }
}
