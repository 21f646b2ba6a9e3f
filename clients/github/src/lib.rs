//! GitHub REST API v3 client.

mod builder;
mod payload;

use std::collections::HashSet;

use async_trait::async_trait;
use clients::path_segment;
use clients::RestClient;
use clients::Result;
use log::debug;
use repo_metrics::api::{Client, CommitHistory, Release, RepositoryInfo, RepositoryReference};

pub use builder::GithubClientBuilder;

const PER_PAGE: u32 = 100;

pub struct GithubClient {
    rest: RestClient,
    github_url: String,
}

impl GithubClient {
    fn repo_url(&self, repo: &RepositoryReference) -> String {
        format!("{}/repos/{}/{}", self.github_url, repo.owner, repo.name)
    }
}

#[async_trait]
impl Client for GithubClient {
    async fn repository(&self, repo: &RepositoryReference) -> Result<RepositoryInfo> {
        let body = self.rest.get_json::<payload::Repo>(&self.repo_url(repo)).await?;
        Ok(RepositoryInfo::new(body.default_branch))
    }

    async fn list_releases(&self, repo: &RepositoryReference) -> Result<Vec<Release>> {
        let request_url = format!("{}/releases?per_page={}", self.repo_url(repo), PER_PAGE);
        let releases = self.rest.get_all::<payload::Release>(&request_url).await?;
        Ok(releases.into_iter().map(Release::from).collect())
    }

    /// Newest commit comes first, so with one commit per page the last page holds the
    /// oldest commit and its number is the commit count.
    async fn list_commits(&self, repo: &RepositoryReference) -> Result<CommitHistory> {
        let request_url = format!("{}/commits?per_page=1", self.repo_url(repo));
        let first_page = self.rest.get_page::<payload::Commit>(&request_url).await?;
        let latest = match first_page.items.first() {
            Some(commit) => commit.committed_at(),
            None => return Ok(CommitHistory::empty()),
        };
        let count = first_page.last_page.unwrap_or(1);
        let earliest = if count > 1 {
            let last_page = self
                .rest
                .get_page::<payload::Commit>(&format!("{}&page={}", request_url, count))
                .await?;
            last_page.items.last().and_then(payload::Commit::committed_at)
        } else {
            latest
        };
        debug!("{}: {} commits", repo, count);
        Ok(CommitHistory::new(count, earliest, latest))
    }

    async fn list_contributors(&self, repo: &RepositoryReference) -> Result<HashSet<String>> {
        let request_url = format!("{}/contributors?per_page={}", self.repo_url(repo), PER_PAGE);
        let contributors = self.rest.get_all::<payload::Contributor>(&request_url).await?;
        Ok(contributors.into_iter().filter_map(|contributor| contributor.login).collect())
    }

    async fn branch_protection(&self, repo: &RepositoryReference, branch: &str) -> Result<bool> {
        let request_url = format!("{}/branches/{}", self.repo_url(repo), path_segment(branch));
        let branch = self.rest.get_json::<payload::Branch>(&request_url).await?;
        Ok(branch.protected)
    }
}
