use crate::limiter::RateLimiter;
use crate::pagination::{self, Page};
use crate::retry::{classify, RetryBudget, RetryPolicy, Verdict};
use crate::{Error, Result};
use layered::{Execute, Service, Stack};
use log::{debug, info, warn};
use reqwest::{Response, StatusCode};
use seatbelt::retry::{Backoff, Retry};
use seatbelt::ResilienceContext;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tick::Clock;

/// HTTP GET client honoring the rate limit of one API host.
///
/// 404 and 410 fail right away, rate-limited requests are repeated after the reset,
/// server and network failures are repeated up to [`RetryPolicy::max_attempts`].
#[derive(Debug)]
pub struct RestClient {
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl RestClient {
    pub fn new(http: reqwest::Client, limiter: RateLimiter, policy: RetryPolicy) -> Self {
        RestClient {
            http,
            limiter: Arc::new(limiter),
            policy,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        let clock = Clock::new_tokio();
        let context = ResilienceContext::new(&clock).name("rest_get");
        let budget = Arc::new(RetryBudget::new(self.policy, self.limiter.headers()));

        let recovery = Arc::clone(&budget);
        let http = self.http.clone();
        let limiter = Arc::clone(&self.limiter);
        let service = (
            Retry::layer("retry", &context)
                .clone_input()
                .recovery_with(move |outcome: &reqwest::Result<Response>, _| recovery.recovery(outcome))
                .max_retry_attempts(u32::MAX)
                .base_delay(self.policy.base_delay)
                .backoff(Backoff::Exponential)
                .on_retry(|_output, args| {
                    info!(
                        "Retrying GET (attempt {}, delay {} ms)",
                        args.attempt().index() + 1,
                        args.retry_delay().as_millis()
                    );
                }),
            Execute::new(move |url: String| {
                let http = http.clone();
                let limiter = Arc::clone(&limiter);
                async move {
                    limiter.wait().await;
                    debug!("GET {}", url);
                    let response = http.get(&url).send().await?;
                    limiter.update(response.headers()).await;
                    let verdict = classify(response.status(), response.headers(), limiter.headers());
                    if verdict == Verdict::RateLimited && limiter.block_until_reset(response.headers()).await {
                        info!("Rate limited on {}, waiting for reset", url);
                    }
                    Ok::<_, reqwest::Error>(response)
                }
            }),
        )
            .into_service();

        let outcome = service.execute(url.to_string()).await;
        let attempts = budget.transient_failures();
        match outcome {
            Ok(response) => {
                let status = response.status();
                match classify(status, response.headers(), self.limiter.headers()) {
                    Verdict::Success => Ok(response),
                    Verdict::NotFound => Err(Error::RepositoryNotFound(url.to_string())),
                    Verdict::Rejected => Err(Error::InvalidResponse(format!("{} for {}", status, url))),
                    Verdict::RateLimited => Err(Error::RateLimitExceeded(format!("{} for {}", status, url))),
                    Verdict::Transient => {
                        warn!("GET {} failed after {} attempts: {}", url, attempts, status);
                        Err(Error::TransientApiFailure {
                            attempts,
                            reason: format!("{} for {}", status, url),
                        })
                    }
                }
            }
            Err(err) if err.is_builder() => Err(Error::Configuration(err.to_string())),
            Err(err) => {
                warn!("GET {} failed after {} attempts: {}", url, attempts, err);
                Err(Error::TransientApiFailure {
                    attempts,
                    reason: format!("{} for {}", err, url),
                })
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get(url).await?;
        read_response(response, url).await
    }

    pub async fn get_page<T: DeserializeOwned>(&self, url: &str) -> Result<Page<T>> {
        let response = self.get(url).await?;
        let next = pagination::link(response.headers(), "next");
        let last_page = pagination::last_page(response.headers());
        let items = if response.status() == StatusCode::NO_CONTENT {
            Vec::new()
        } else {
            read_response(response, url).await?
        };
        Ok(Page { items, next, last_page })
    }

    /// Follows `next` links until the listing is exhausted.
    pub async fn get_all<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());
        while let Some(url) = next {
            let page = self.get_page::<T>(&url).await?;
            debug!("{} items from {}", page.items.len(), url);
            items.extend(page.items);
            next = page.next.filter(|next| *next != url);
        }
        Ok(items)
    }
}

async fn read_response<T: DeserializeOwned>(response: Response, url: &str) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|err| Error::InvalidResponse(format!("{}: {}", url, err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::GITHUB_HEADERS;
    use repo_metrics::api::ErrorKind;
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Deserialize, Debug, PartialEq)]
    struct Item {
        id: u32,
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(10),
            max_rate_limit_retries: 2,
            ..RetryPolicy::default()
        }
    }

    fn client() -> RestClient {
        RestClient::new(reqwest::Client::new(), RateLimiter::new(GITHUB_HEADERS), policy())
    }

    async fn respond_once(server: &MockServer, status: u16) {
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(status))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(server)
            .await;
    }

    async fn respond_ok(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn rate_limited_request_is_retried() {
        let server = MockServer::start().await;
        respond_once(&server, 429).await;
        respond_ok(&server).await;

        let items: Vec<Item> = client().get_json(&format!("{}/items", server.uri())).await.unwrap();
        assert_eq!(items, vec![Item { id: 1 }]);
    }

    #[tokio::test]
    async fn rate_limited_request_waits_for_reset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(403).insert_header("retry-after", "1"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        respond_ok(&server).await;

        let started = std::time::Instant::now();
        let items: Vec<Item> = client().get_json(&format!("{}/items", server.uri())).await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn rate_limit_without_reset_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(403))
            .expect(3)
            .mount(&server)
            .await;

        let err = client().get(&format!("{}/items", server.uri())).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
    }

    #[tokio::test]
    async fn server_errors_are_retried_three_times() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let err = client().get(&format!("{}/items", server.uri())).await.unwrap_err();
        assert!(matches!(err, Error::TransientApiFailure { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn forbidden_with_budget_left_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "4999")
                    .insert_header("x-ratelimit-reset", "9999999999"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client().get(&format!("{}/items", server.uri())).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn timeouts_are_retried_three_times() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .expect(3)
            .mount(&server)
            .await;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let client = RestClient::new(http, RateLimiter::new(GITHUB_HEADERS), policy());
        let err = client.get(&format!("{}/items", server.uri())).await.unwrap_err();
        assert!(matches!(err, Error::TransientApiFailure { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn server_error_then_success() {
        let server = MockServer::start().await;
        respond_once(&server, 500).await;
        respond_ok(&server).await;

        let items: Vec<Item> = client().get_json(&format!("{}/items", server.uri())).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = client().get(&format!("{}/items", server.uri())).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RepositoryNotFound);
    }

    #[tokio::test]
    async fn other_client_errors_are_rejected() {
        let server = MockServer::start().await;
        respond_once(&server, 401).await;

        let err = client().get(&format!("{}/items", server.uri())).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn undecodable_body_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client()
            .get_json::<Vec<Item>>(&format!("{}/items", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn follows_next_links() {
        let server = MockServer::start().await;
        let second = format!("{}/items?page=2", server.uri());
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 3 }])))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", format!("<{}>; rel=\"next\", <{}>; rel=\"last\"", second, second).as_str())
                    .set_body_json(json!([{ "id": 1 }, { "id": 2 }])),
            )
            .mount(&server)
            .await;

        let items: Vec<Item> = client().get_all(&format!("{}/items", server.uri())).await.unwrap();
        assert_eq!(items, vec![Item { id: 1 }, Item { id: 2 }, Item { id: 3 }]);
    }

    #[tokio::test]
    async fn no_content_is_empty() {
        let server = MockServer::start().await;
        respond_once(&server, 204).await;

        let items: Vec<Item> = client().get_all(&format!("{}/items", server.uri())).await.unwrap();
        assert!(items.is_empty());
    }
}
