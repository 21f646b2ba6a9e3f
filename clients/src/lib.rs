//! Rate-limited REST plumbing shared by the platform clients.

mod limiter;
mod pagination;
mod retry;
mod rest;

pub use limiter::{RateLimit, RateLimitHeaders, RateLimiter, GITHUB_HEADERS, GITLAB_HEADERS};
pub use pagination::Page;
pub use repo_metrics::api::{Error, Result};
pub use retry::RetryPolicy;
pub use rest::RestClient;

/// Percent-encodes a value for use as a single URL path segment, e.g. `group/project` or `release/1.x`.
pub fn path_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[test]
fn path_segment_encodes_slashes() {
    assert_eq!(path_segment("gitlab-org/charts/gitlab"), "gitlab-org%2Fcharts%2Fgitlab");
    assert_eq!(path_segment("main"), "main");
}
