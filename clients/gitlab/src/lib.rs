//! GitLab REST API v4 client, for gitlab.com and self-hosted instances.

mod builder;
mod payload;

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use clients::path_segment;
use clients::RateLimiter;
use clients::RestClient;
use clients::Result;
use clients::RetryPolicy;
use clients::GITLAB_HEADERS;
use log::debug;
use repo_metrics::api::{Client, CommitHistory, Release, RepositoryInfo, RepositoryReference};

pub use builder::GitlabClientBuilder;

const PER_PAGE: u32 = 100;

pub struct GitlabClient {
    http: reqwest::Client,
    api_url: Option<String>,
    policy: RetryPolicy,
    /// One rate limit per API base.
    hosts: Mutex<HashMap<String, Arc<RestClient>>>,
}

impl GitlabClient {
    fn api_base(&self, repo: &RepositoryReference) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| format!("https://{}/api/v4", repo.host))
    }

    fn rest(&self, base: &str) -> Arc<RestClient> {
        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        hosts
            .entry(base.to_string())
            .or_insert_with(|| {
                debug!("New GitLab API host {}", base);
                Arc::new(RestClient::new(
                    self.http.clone(),
                    RateLimiter::new(GITLAB_HEADERS),
                    self.policy,
                ))
            })
            .clone()
    }

    /// Client of the repository's host and the project's API URL.
    fn project(&self, repo: &RepositoryReference) -> (Arc<RestClient>, String) {
        let base = self.api_base(repo);
        let project_url = format!("{}/projects/{}", base, path_segment(&repo.full_name()));
        (self.rest(&base), project_url)
    }
}

#[async_trait]
impl Client for GitlabClient {
    async fn repository(&self, repo: &RepositoryReference) -> Result<RepositoryInfo> {
        let (rest, project_url) = self.project(repo);
        let project = rest.get_json::<payload::Project>(&project_url).await?;
        Ok(RepositoryInfo::new(project.default_branch))
    }

    async fn list_releases(&self, repo: &RepositoryReference) -> Result<Vec<Release>> {
        let (rest, project_url) = self.project(repo);
        let request_url = format!("{}/releases?per_page={}", project_url, PER_PAGE);
        let releases = rest.get_all::<payload::Release>(&request_url).await?;
        Ok(releases.into_iter().map(Release::from).collect())
    }

    /// Same one-commit-per-page walk as on GitHub. GitLab drops the page total on large
    /// listings, then every page is read.
    async fn list_commits(&self, repo: &RepositoryReference) -> Result<CommitHistory> {
        let (rest, project_url) = self.project(repo);
        let request_url = format!("{}/repository/commits?per_page=1", project_url);
        let first_page = rest.get_page::<payload::Commit>(&request_url).await?;
        let latest = match first_page.items.first() {
            Some(commit) => commit.committed_at(),
            None => return Ok(CommitHistory::empty()),
        };
        let history = match first_page.last_page {
            Some(count) if count > 1 => {
                let last_page = rest
                    .get_page::<payload::Commit>(&format!("{}&page={}", request_url, count))
                    .await?;
                let earliest = last_page.items.last().and_then(payload::Commit::committed_at);
                CommitHistory::new(count, earliest, latest)
            }
            Some(_) => CommitHistory::new(1, latest, latest),
            None if first_page.next.is_none() => CommitHistory::new(1, latest, latest),
            None => {
                debug!("{}: commit total not reported, reading all pages", repo);
                let all_url = format!("{}/repository/commits?per_page={}", project_url, PER_PAGE);
                let commits = rest.get_all::<payload::Commit>(&all_url).await?;
                let earliest = commits.last().and_then(payload::Commit::committed_at);
                CommitHistory::new(commits.len() as u64, earliest, latest)
            }
        };
        debug!("{}: {} commits", repo, history.count);
        Ok(history)
    }

    async fn list_contributors(&self, repo: &RepositoryReference) -> Result<HashSet<String>> {
        let (rest, project_url) = self.project(repo);
        let request_url = format!("{}/repository/contributors?per_page={}", project_url, PER_PAGE);
        let contributors = rest.get_all::<payload::Contributor>(&request_url).await?;
        Ok(contributors.into_iter().filter_map(payload::Contributor::identifier).collect())
    }

    async fn branch_protection(&self, repo: &RepositoryReference, branch: &str) -> Result<bool> {
        let (rest, project_url) = self.project(repo);
        let request_url = format!("{}/repository/branches/{}", project_url, path_segment(branch));
        let branch = rest.get_json::<payload::Branch>(&request_url).await?;
        Ok(branch.protected)
    }
}
