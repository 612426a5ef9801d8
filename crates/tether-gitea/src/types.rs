//! Sync request and result types.

use std::collections::BTreeMap;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Outcome of a single sync operation.
///
/// Conflicts and "nothing to merge" are ordinary outcomes, not errors.
/// A status is never both `success` and `error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncStatus {
    /// The target branch has commits the source branch lacks.
    pub merge_needed: bool,

    /// An automatic merge is not possible.
    pub conflict: bool,

    /// The most recent operation completed.
    pub success: bool,

    /// Syncing deleted the (fully merged) user branch.
    pub user_branch_deleted: bool,

    /// The operation failed; see `message`.
    pub error: bool,

    /// Failure detail, empty unless `error` is set.
    pub message: String,

    /// URL of the pull request relevant to this status, empty if none.
    pub pull_request: String,
}

impl SyncStatus {
    /// A failed operation.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            ..Self::default()
        }
    }

    /// Branches have diverged and cannot be merged automatically.
    #[must_use]
    pub fn conflict(pull_request: impl Into<String>) -> Self {
        Self {
            merge_needed: true,
            conflict: true,
            pull_request: pull_request.into(),
            ..Self::default()
        }
    }

    /// Nothing to merge in the direction asked about.
    #[must_use]
    pub fn up_to_date() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// The source branch has commits to bring over and they merge cleanly.
    #[must_use]
    pub fn merge_needed(pull_request: impl Into<String>) -> Self {
        Self {
            merge_needed: true,
            success: true,
            pull_request: pull_request.into(),
            ..Self::default()
        }
    }

    /// A mutating operation finished.
    #[must_use]
    pub fn completed() -> Self {
        Self::up_to_date()
    }

    /// Whether this status asks the user or an administrator to act.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.merge_needed || self.conflict
    }
}

/// Identity of one user branch on one repository, plus per-request extras.
///
/// Equality compares the identity tuple only; extras are ignored.
#[derive(Debug, Clone)]
pub struct SyncParams {
    /// Base URL of the git-hosting server.
    pub server: String,
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// The user's working branch.
    pub user_branch: String,
    /// Access token.
    pub tokenid: SecretString,
    /// Additional request parameters.
    pub extras: RequestExtras,
}

impl SyncParams {
    /// Extra naming the default branch, skipping the repository lookup.
    pub const DEFAULT_BRANCH: &'static str = "defaultBranch";
    /// Extra naming the title of a pull request the client creates.
    pub const PR_TITLE: &'static str = "prTitle";

    /// Create params with no extras.
    #[must_use]
    pub fn new(
        server: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        user_branch: impl Into<String>,
        tokenid: SecretString,
    ) -> Self {
        Self {
            server: server.into(),
            owner: owner.into(),
            repo: repo.into(),
            user_branch: user_branch.into(),
            tokenid,
            extras: RequestExtras::default(),
        }
    }

    /// Names of the identity fields that are empty, in declaration order.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("server", self.server.is_empty()),
            ("owner", self.owner.is_empty()),
            ("repo", self.repo.is_empty()),
            ("userBranch", self.user_branch.is_empty()),
            ("tokenid", self.tokenid.expose_secret().is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect()
    }

    /// Merge `extras` over these params.
    ///
    /// Identity keys replace the matching field; every other key lands in
    /// `extras`, replacing an existing value.
    #[must_use]
    pub fn merged(&self, extras: &RequestExtras) -> Self {
        let mut params = self.clone();
        for (key, value) in extras.iter() {
            match key {
                "server" => params.server = value.to_string(),
                "owner" => params.owner = value.to_string(),
                "repo" => params.repo = value.to_string(),
                "userBranch" => params.user_branch = value.to_string(),
                "tokenid" => params.tokenid = SecretString::from(value),
                _ => {
                    params.extras.insert(key, value);
                }
            }
        }
        params
    }

    /// Default branch supplied by the caller, if any.
    #[must_use]
    pub fn default_branch(&self) -> Option<&str> {
        self.extras.get(Self::DEFAULT_BRANCH).filter(|b| !b.is_empty())
    }

    /// Pull request title supplied by the caller, if any.
    #[must_use]
    pub fn pr_title(&self) -> Option<&str> {
        self.extras.get(Self::PR_TITLE).filter(|t| !t.is_empty())
    }

    /// API root for this server.
    #[must_use]
    pub fn api_base(&self) -> String {
        format!("{}/api/v1", self.server.trim_end_matches('/'))
    }
}

impl PartialEq for SyncParams {
    fn eq(&self, other: &Self) -> bool {
        self.server == other.server
            && self.owner == other.owner
            && self.repo == other.repo
            && self.user_branch == other.user_branch
            && self.tokenid.expose_secret() == other.tokenid.expose_secret()
    }
}

impl Eq for SyncParams {}

/// Additional request parameters merged over [`SyncParams`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestExtras(BTreeMap<String, String>);

impl RequestExtras {
    /// Empty set of extras.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterate over key/value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether no extras are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestExtras {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A pull request as seen by the sync client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// PR index within the repository.
    pub number: u64,

    /// PR URL.
    pub html_url: String,

    /// Head branch name.
    pub head_branch: String,

    /// Base branch name.
    pub base_branch: String,

    /// Whether the PR can be merged (None if the server has not decided yet).
    pub mergeable: Option<bool>,
}

impl PullRequest {
    /// Only an explicit `false` from the server counts as a conflict.
    #[must_use]
    pub const fn has_conflict(&self) -> bool {
        matches!(self.mergeable, Some(false))
    }
}

/// Request to create a pull request.
#[derive(Debug, Serialize)]
pub struct CreatePullRequest {
    /// PR title.
    pub title: String,

    /// PR body.
    pub body: String,

    /// Head branch.
    pub head: String,

    /// Base branch.
    pub base: String,
}

/// Request to merge a pull request.
#[derive(Debug, Serialize)]
pub struct MergePullRequest {
    /// Merge style (`merge`, `rebase`, `squash`, ...).
    #[serde(rename = "Do")]
    pub style: String,

    /// Commit message body.
    #[serde(rename = "MergeMessageField", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Default for MergePullRequest {
    fn default() -> Self {
        Self {
            style: "merge".into(),
            message: None,
        }
    }
}
