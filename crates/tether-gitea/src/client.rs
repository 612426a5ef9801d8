//! Gitea API client.

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::BranchSyncApi;
use crate::types::{CreatePullRequest, MergePullRequest, PullRequest, SyncParams, SyncStatus};

/// Page size used when listing open pull requests.
const PR_PAGE_LIMIT: usize = 50;

/// Escape a branch name for use in a URL path. Slashes stay as separators.
fn branch_path(name: &str) -> String {
    name.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

// === Internal API response types ===

/// Internal representation of a PR from the Gitea API.
#[derive(serde::Deserialize)]
struct ApiPullRequest {
    number: u64,
    html_url: String,
    head: ApiBranch,
    base: ApiBranch,
    #[serde(default)]
    mergeable: Option<bool>,
}

/// Internal representation of a branch ref on a PR.
#[derive(serde::Deserialize)]
struct ApiBranch {
    #[serde(rename = "ref")]
    ref_name: String,
}

impl ApiPullRequest {
    fn into_pull_request(self) -> PullRequest {
        PullRequest {
            number: self.number,
            html_url: self.html_url,
            head_branch: self.head.ref_name,
            base_branch: self.base.ref_name,
            mergeable: self.mergeable,
        }
    }
}

#[derive(serde::Deserialize)]
struct ApiRepository {
    default_branch: String,
}

#[derive(serde::Deserialize)]
struct ApiCompare {
    #[serde(default)]
    total_commits: u64,
}

/// Result of asking the server to merge a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The PR was merged.
    Merged,
    /// The server refused because the branches conflict.
    Blocked,
}

/// Gitea API client.
///
/// The server URL and token travel with every request in [`SyncParams`], so
/// one client can serve any number of identities.
pub struct GiteaClient {
    client: Client,
}

impl GiteaClient {
    /// Create a new Gitea client.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("tether-cli"));

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self { client })
    }

    fn url(params: &SyncParams, path: &str) -> String {
        format!("{}{}", params.api_base(), path)
    }

    fn bearer(params: &SyncParams) -> String {
        format!("Bearer {}", params.tokenid.expose_secret())
    }

    /// Make a GET request.
    async fn get<T: DeserializeOwned>(&self, params: &SyncParams, path: &str) -> Result<T> {
        let url = Self::url(params, path);
        debug!(%url, "GET");
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, Self::bearer(params))
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make a POST request.
    async fn post<T: DeserializeOwned, B: serde::Serialize + Sync>(
        &self,
        params: &SyncParams,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = Self::url(params, path);
        debug!(%url, "POST");
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, Self::bearer(params))
            .json(body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make a DELETE request.
    async fn delete(&self, params: &SyncParams, path: &str) -> Result<()> {
        let url = Self::url(params, path);
        debug!(%url, "DELETE");
        let response = self
            .client
            .delete(&url)
            .header(AUTHORIZATION, Self::bearer(params))
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::error_from(response).await)
    }

    /// Handle API response.
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if response.status().is_success() {
            let body = response.json().await?;
            return Ok(body);
        }
        Err(Self::error_from(response).await)
    }

    /// Map a non-success response to an [`Error`].
    async fn error_from(response: reqwest::Response) -> Error {
        let status_code = response.status().as_u16();

        match status_code {
            401 => Error::AuthenticationFailed,
            429 => Error::RateLimited,
            403 if response
                .headers()
                .get("x-ratelimit-remaining")
                .is_some_and(|v| v == "0") =>
            {
                Error::RateLimited
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                Error::ApiError {
                    status: status_code,
                    message: text,
                }
            }
        }
    }

    // === Repository queries ===

    /// Get the repository's default branch name.
    ///
    /// A `defaultBranch` extra in `params` short-circuits the lookup.
    ///
    /// # Errors
    /// Returns error if the repository is missing or the API call fails.
    pub async fn get_default_branch(&self, params: &SyncParams) -> Result<String> {
        if let Some(branch) = params.default_branch() {
            return Ok(branch.to_string());
        }

        let (owner, repo) = (&params.owner, &params.repo);
        match self
            .get::<ApiRepository>(params, &format!("/repos/{owner}/{repo}"))
            .await
        {
            Ok(info) => Ok(info.default_branch),
            Err(Error::ApiError { status: 404, .. }) => {
                Err(Error::RepoNotFound(format!("{owner}/{repo}")))
            }
            Err(e) => Err(e),
        }
    }

    /// Count commits on `head` that `base` does not have.
    ///
    /// # Errors
    /// Returns error if API call fails.
    pub async fn commits_ahead(&self, params: &SyncParams, base: &str, head: &str) -> Result<u64> {
        let (owner, repo) = (&params.owner, &params.repo);
        let (base, head) = (branch_path(base), branch_path(head));
        let compare: ApiCompare = self
            .get(params, &format!("/repos/{owner}/{repo}/compare/{base}...{head}"))
            .await?;
        Ok(compare.total_commits)
    }

    // === PR Operations ===

    /// Find the open PR merging `head` into `base`, if one exists.
    ///
    /// Pages through the open PRs until a short page comes back.
    ///
    /// # Errors
    /// Returns error if API call fails.
    pub async fn find_open_pr(
        &self,
        params: &SyncParams,
        head: &str,
        base: &str,
    ) -> Result<Option<PullRequest>> {
        let (owner, repo) = (&params.owner, &params.repo);

        for page in 1.. {
            let prs: Vec<ApiPullRequest> = self
                .get(
                    params,
                    &format!(
                        "/repos/{owner}/{repo}/pulls?state=open&limit={PR_PAGE_LIMIT}&page={page}"
                    ),
                )
                .await?;
            let last_page = prs.len() < PR_PAGE_LIMIT;

            if let Some(pr) = prs
                .into_iter()
                .find(|pr| pr.head.ref_name == head && pr.base.ref_name == base)
            {
                return Ok(Some(pr.into_pull_request()));
            }
            if last_page {
                break;
            }
        }
        Ok(None)
    }

    /// Create a pull request.
    ///
    /// # Errors
    /// Returns error if PR creation fails.
    pub async fn create_pr(
        &self,
        params: &SyncParams,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest> {
        let (owner, repo) = (&params.owner, &params.repo);
        let api_pr: ApiPullRequest = self
            .post(params, &format!("/repos/{owner}/{repo}/pulls"), pr)
            .await?;

        Ok(api_pr.into_pull_request())
    }

    /// Reuse the open PR from `head` into `base`, or open a new one.
    async fn ensure_pr(
        &self,
        params: &SyncParams,
        head: &str,
        base: &str,
        title: String,
        body: &str,
    ) -> Result<PullRequest> {
        if let Some(pr) = self.find_open_pr(params, head, base).await? {
            debug!(number = pr.number, "reusing open pull request");
            return Ok(pr);
        }

        let request = CreatePullRequest {
            title,
            body: body.to_string(),
            head: head.to_string(),
            base: base.to_string(),
        };
        self.create_pr(params, &request).await
    }

    /// Merge a pull request.
    ///
    /// HTTP 405 and 409 mean the server will not merge it automatically.
    ///
    /// # Errors
    /// Returns error for any other failure.
    pub async fn merge_pr(
        &self,
        params: &SyncParams,
        number: u64,
        merge: &MergePullRequest,
    ) -> Result<MergeOutcome> {
        let (owner, repo) = (&params.owner, &params.repo);
        let url = Self::url(params, &format!("/repos/{owner}/{repo}/pulls/{number}/merge"));
        debug!(%url, "POST");
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, Self::bearer(params))
            .json(merge)
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(MergeOutcome::Merged),
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::CONFLICT => Ok(MergeOutcome::Blocked),
            _ => Err(Self::error_from(response).await),
        }
    }

    /// Delete a branch.
    ///
    /// # Errors
    /// Returns error if API call fails.
    pub async fn delete_branch(&self, params: &SyncParams, branch: &str) -> Result<()> {
        let (owner, repo) = (&params.owner, &params.repo);
        let branch = branch_path(branch);
        self.delete(params, &format!("/repos/{owner}/{repo}/branches/{branch}"))
            .await
    }

    // === Sync operations ===

    /// Is the user branch behind the default branch?
    ///
    /// # Errors
    /// Returns error if any API call fails.
    pub async fn check_pull_from_default(&self, params: &SyncParams) -> Result<SyncStatus> {
        let default = self.get_default_branch(params).await?;
        let user = params.user_branch.as_str();

        let behind = self.commits_ahead(params, user, &default).await?;
        let open = self.find_open_pr(params, &default, user).await?;
        let url = open.as_ref().map(|pr| pr.html_url.clone()).unwrap_or_default();

        Ok(match open {
            Some(pr) if pr.has_conflict() => SyncStatus::conflict(url),
            _ if behind > 0 => SyncStatus::merge_needed(url),
            _ => SyncStatus::up_to_date(),
        })
    }

    /// Merge the default branch into the user branch.
    ///
    /// # Errors
    /// Returns error if any API call fails.
    pub async fn pull_from_default(&self, params: &SyncParams) -> Result<SyncStatus> {
        let default = self.get_default_branch(params).await?;
        let user = params.user_branch.as_str();

        if self.commits_ahead(params, user, &default).await? == 0 {
            return Ok(SyncStatus::up_to_date());
        }

        let title = params
            .pr_title()
            .map_or_else(|| format!("Update {user} from {default}"), str::to_string);
        let pr = self.ensure_pr(params, &default, user, title, "").await?;

        match self.merge_pr(params, pr.number, &MergePullRequest::default()).await? {
            MergeOutcome::Merged => Ok(SyncStatus::completed()),
            MergeOutcome::Blocked => Ok(SyncStatus::conflict(pr.html_url)),
        }
    }

    /// Can the user branch be merged into the default branch?
    ///
    /// # Errors
    /// Returns error if any API call fails.
    pub async fn check_push_to_default(&self, params: &SyncParams) -> Result<SyncStatus> {
        let default = self.get_default_branch(params).await?;
        let user = params.user_branch.as_str();

        let ahead = self.commits_ahead(params, &default, user).await?;
        let open = self.find_open_pr(params, user, &default).await?;
        let url = open.as_ref().map(|pr| pr.html_url.clone()).unwrap_or_default();

        Ok(match open {
            Some(pr) if pr.has_conflict() => SyncStatus::conflict(url),
            _ if ahead > 0 => SyncStatus::merge_needed(url),
            _ => SyncStatus::up_to_date(),
        })
    }

    /// Merge the user branch into the default branch.
    ///
    /// # Errors
    /// Returns error if any API call fails.
    pub async fn push_to_default(
        &self,
        params: &SyncParams,
        pr_description: &str,
    ) -> Result<SyncStatus> {
        let default = self.get_default_branch(params).await?;
        let user = params.user_branch.as_str();

        if self.commits_ahead(params, &default, user).await? == 0 {
            return Ok(SyncStatus::up_to_date());
        }

        let title = params
            .pr_title()
            .map_or_else(|| format!("Merge {user} into {default}"), str::to_string);
        let pr = self
            .ensure_pr(params, user, &default, title, pr_description)
            .await?;

        if self.merge_pr(params, pr.number, &MergePullRequest::default()).await?
            == MergeOutcome::Blocked
        {
            return Ok(SyncStatus::conflict(pr.html_url));
        }

        let mut status = SyncStatus::completed();
        if self.commits_ahead(params, &default, user).await? == 0 {
            self.delete_branch(params, user).await?;
            status.user_branch_deleted = true;
        }
        Ok(status)
    }
}

impl std::fmt::Debug for GiteaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GiteaClient").finish_non_exhaustive()
    }
}

// === Trait Implementation ===

impl BranchSyncApi for GiteaClient {
    async fn check_pull_from_default(&self, params: &SyncParams) -> Result<SyncStatus> {
        self.check_pull_from_default(params).await
    }

    async fn pull_from_default(&self, params: &SyncParams) -> Result<SyncStatus> {
        self.pull_from_default(params).await
    }

    async fn check_push_to_default(&self, params: &SyncParams) -> Result<SyncStatus> {
        self.check_push_to_default(params).await
    }

    async fn push_to_default(&self, params: &SyncParams, pr_description: &str) -> Result<SyncStatus> {
        self.push_to_default(params, pr_description).await
    }
}
