mod args;

use clients::RetryPolicy;
use github_client::GithubClientBuilder;
use gitlab_client::GitlabClientBuilder;
use log::{info, warn};
use repo_metrics::api::{Error, Result};
use repo_metrics::{BatchRunner, BatchSummary, JsonFileStore, PlatformDetector, RepositoryProcessor};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub use args::Args;

/// Computes metrics of every repository in the input and writes them to the output file.
pub async fn collect_metrics(args: Args) -> Result<BatchSummary> {
    let urls = if args.urls.is_empty() {
        read_urls(&args.input)?
    } else {
        args.urls
    };
    if urls.is_empty() {
        return Err(Error::Configuration("No repository URLs given".to_string()));
    }
    info!("Processing {} repositories", urls.len());

    let policy = RetryPolicy {
        max_attempts: args.max_attempts,
        base_delay: Duration::from_millis(args.retry_delay_ms),
        ..RetryPolicy::default()
    };
    let timeout = Duration::from_secs(args.request_timeout);

    let mut github = GithubClientBuilder::default()
        .with_github_url(&args.github_api_url)
        .with_retry_policy(policy)
        .with_timeout(timeout);
    match args.github_token {
        Some(token) => github = github.try_with_token(token)?,
        None => warn!("No GitHub token. Anonymous rate limit applies."),
    }
    let github = github.build().await?;

    let mut gitlab = GitlabClientBuilder::default()
        .with_retry_policy(policy)
        .with_timeout(timeout);
    if let Some(api_url) = &args.gitlab_api_url {
        gitlab = gitlab.with_api_url(api_url);
    }
    if let Some(token) = args.gitlab_token {
        gitlab = gitlab.try_with_token(token)?;
    }
    let gitlab = gitlab.build()?;

    let detector = args
        .gitlab_hosts
        .iter()
        .fold(PlatformDetector::default(), |detector, host| detector.with_gitlab_host(host));

    let mut store = if args.resume {
        JsonFileStore::resume(&args.output)?
    } else {
        JsonFileStore::create(&args.output)?
    };

    let runner = BatchRunner::new(RepositoryProcessor::new(github, gitlab, detector)).with_concurrency(args.concurrency);
    runner.run(urls, &mut store).await
}

/// One URL per line. Blank lines and `#` comments are skipped.
pub fn read_urls<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|err| Error::Configuration(format!("Cannot read {}: {}", path.display(), err)))?;
    Ok(parse_urls(&content))
}

fn parse_urls(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[test]
fn skips_blank_lines_and_comments() {
    let content = "# popular\nhttps://github.com/octo/hello\n\n   \n  https://gitlab.com/group/project  \n";
    assert_eq!(
        parse_urls(content),
        vec!["https://github.com/octo/hello", "https://gitlab.com/group/project"]
    );
}
