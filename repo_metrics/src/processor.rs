use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::api::{Client, CommitHistory, Error, ErrorKind, Platform, RepositoryInfo, RepositoryReference, Result};
use crate::detector::PlatformDetector;
use crate::metrics::{self, Metric};
use crate::result::{MetricResult, ProcessingState};

/// A fetched fact, or the kind of error its fetch ended with.
pub type Fact<T> = std::result::Result<T, ErrorKind>;

/// Facts fetched for one repository.
#[derive(Debug)]
pub struct RawFacts {
    pub releases: Fact<Vec<DateTime<Utc>>>,
    pub commits: Fact<CommitHistory>,
    pub contributors: Fact<HashSet<String>>,
    pub branch_protected: Fact<bool>,
}

impl Default for RawFacts {
    fn default() -> Self {
        RawFacts {
            releases: Err(ErrorKind::MissingData),
            commits: Err(ErrorKind::MissingData),
            contributors: Err(ErrorKind::MissingData),
            branch_protected: Err(ErrorKind::MissingData),
        }
    }
}

/// Computes the metrics of single repositories through the platform clients.
pub struct RepositoryProcessor<GITHUB, GITLAB>
where
    GITHUB: Client,
    GITLAB: Client,
{
    github: GITHUB,
    gitlab: GITLAB,
    detector: PlatformDetector,
}

impl<GITHUB, GITLAB> RepositoryProcessor<GITHUB, GITLAB>
where
    GITHUB: 'static + Client,
    GITLAB: 'static + Client,
{
    pub fn new(github: GITHUB, gitlab: GITLAB, detector: PlatformDetector) -> Self {
        RepositoryProcessor {
            github,
            gitlab,
            detector,
        }
    }

    /// Never fails: detection and lookup failures produce a `Failed` record.
    pub async fn process(&self, url: &str) -> MetricResult {
        let repo = match self.detector.detect(url) {
            Ok(repo) => repo,
            Err(err) => {
                warn!("Skipping '{}': {}", url, err);
                return MetricResult::failed(url, None, err.kind());
            }
        };
        info!("Processing repository: {}/{} ({})", repo.owner, repo.name, repo.platform);
        transition(&repo, ProcessingState::Pending, ProcessingState::Fetching);

        let client = self.client(repo.platform);
        let info = match client.repository(&repo).await {
            Ok(info) => Ok(info),
            Err(err @ Error::RepositoryNotFound(_)) => {
                warn!("{}: {}", repo, err);
                transition(&repo, ProcessingState::Fetching, ProcessingState::Failed);
                return MetricResult::failed(url, Some(&repo), err.kind());
            }
            Err(err) => {
                warn!("{}: repository metadata unavailable: {}", repo, err);
                Err(err.kind())
            }
        };
        let facts = fetch_facts(client, &repo, info).await;

        transition(&repo, ProcessingState::Fetching, ProcessingState::Computing);
        let result = compute_metrics(url, &repo, &facts, Utc::now());
        transition(&repo, ProcessingState::Computing, result.status);
        result
    }

    fn client(&self, platform: Platform) -> &dyn Client {
        match platform {
            Platform::GitHub => &self.github,
            Platform::GitLab => &self.gitlab,
        }
    }
}

async fn fetch_facts(client: &dyn Client, repo: &RepositoryReference, info: Fact<RepositoryInfo>) -> RawFacts {
    let default_branch = info.map(|info| info.default_branch);
    let protection = async {
        match &default_branch {
            Ok(Some(branch)) => client.branch_protection(repo, branch).await.map_err(|err| {
                warn!("{}: branch protection unavailable: {}", repo, err);
                err.kind()
            }),
            Ok(None) => Err(ErrorKind::MissingData),
            Err(kind) => Err(*kind),
        }
    };
    let (releases, commits, contributors, protection) = futures::join!(
        client.list_releases(repo),
        client.list_commits(repo),
        client.list_contributors(repo),
        protection,
    );
    RawFacts {
        releases: fact(repo, "releases", releases)
            .map(|releases| releases.into_iter().map(|release| release.created_at).collect()),
        commits: fact(repo, "commits", commits),
        contributors: fact(repo, "contributors", contributors),
        branch_protected: protection,
    }
}

fn fact<T>(repo: &RepositoryReference, name: &str, fetched: Result<T>) -> Fact<T> {
    fetched.map_err(|err| {
        warn!("{}: {} unavailable ({}): {}", repo, name, err.kind(), err);
        err.kind()
    })
}

/// Runs every extractor on the available facts.
///
/// A metric without its fact is recorded as `MissingData`, with the kind of the failed fetch kept in
/// `fetch_errors`.
pub fn compute_metrics(url: &str, repo: &RepositoryReference, facts: &RawFacts, now: DateTime<Utc>) -> MetricResult {
    let mut result = MetricResult::pending(url, Some(repo));

    match &facts.contributors {
        Ok(contributors) => result.contributors = Some(metrics::number_of_contributors(contributors)),
        Err(cause) => result.record_missing(Metric::Nc, *cause),
    }
    match &facts.releases {
        Ok(releases) => result.mean_time_to_update = metrics::mean_time_to_update(releases),
        Err(cause) => result.record_missing(Metric::Mttu, *cause),
    }
    match &facts.commits {
        Ok(history) => {
            result.mean_time_to_commit = metrics::mean_time_to_commit(history);
            result.inactive_period = metrics::inactive_period(history, now);
            if result.inactive_period.is_none() {
                result.record_missing(Metric::Ip, ErrorKind::MissingData);
            }
        }
        Err(cause) => {
            result.record_missing(Metric::Mttc, *cause);
            result.record_missing(Metric::Ip, *cause);
        }
    }
    match facts.branch_protected {
        Ok(protected) => result.branch_protection = Some(protected),
        Err(cause) => result.record_missing(Metric::Bp, cause),
    }

    result.status = ProcessingState::Done;
    result
}

fn transition(repo: &RepositoryReference, from: ProcessingState, to: ProcessingState) {
    debug!("{}: {} -> {}", repo, from, to);
}
