use crate::payload::RateLimitBody;
use crate::payload::RateLimitResource;
use crate::GithubClient;
use clients::Error;
use clients::RateLimit;
use clients::RateLimiter;
use clients::RestClient;
use clients::Result;
use clients::RetryPolicy;
use clients::GITHUB_HEADERS;
use log::debug;
use log::warn;
use reqwest::header;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::Client;
use reqwest::ClientBuilder;
use secrecy::ExposeSecret;
use std::time::Duration;

pub struct GithubClientBuilder {
    client_builder: ClientBuilder,
    github_url: String,
    headers: HeaderMap,
    policy: RetryPolicy,
}

impl Default for GithubClientBuilder {
    fn default() -> Self {
        let mut headers = HeaderMap::default();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("repo-metrics"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));
        Self {
            client_builder: ClientBuilder::default(),
            github_url: "https://api.github.com".to_string(),
            headers,
            policy: RetryPolicy::default(),
        }
    }
}

impl GithubClientBuilder {
    pub fn try_with_token(self, token: secrecy::SecretString) -> Result<GithubClientBuilder> {
        self.try_with_header(header::AUTHORIZATION, format!("token {}", token.expose_secret()), true)
    }

    pub fn try_with_user_agent<STR: AsRef<str>>(self, user_agent: STR) -> Result<GithubClientBuilder> {
        self.try_with_header(header::USER_AGENT, user_agent, false)
    }

    pub fn with_github_url<STR: AsRef<str>>(mut self, url: STR) -> GithubClientBuilder {
        self.github_url = url.as_ref().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> GithubClientBuilder {
        self.policy = policy;
        self
    }

    /// Timeout of every single HTTP request.
    pub fn with_timeout(mut self, timeout: Duration) -> GithubClientBuilder {
        self.client_builder = self.client_builder.timeout(timeout);
        self
    }

    fn try_with_header(mut self, key: HeaderName, val: impl AsRef<str>, sensitive: bool) -> Result<GithubClientBuilder> {
        let mut val = HeaderValue::from_str(val.as_ref())
            .map_err(|_| Error::Configuration(format!("Invalid value of header {}", key)))?;
        val.set_sensitive(sensitive);
        self.headers.insert(key, val);
        Ok(self)
    }

    /// Seeds the rate limiter from `GET /rate_limit`; the limiter starts unseeded if that fails.
    pub async fn build(self) -> Result<GithubClient> {
        let client = self
            .client_builder
            .default_headers(self.headers)
            .build()
            .map_err(anyhow::Error::from)?;
        let github_url = self.github_url;
        let limit = match rate_limit(&client, &github_url).await {
            Ok(core) => {
                debug!("GitHub rate limit: {} remaining until {}", core.remaining, core.reset);
                RateLimit::new(Some(core.remaining), Some(core.reset))
            }
            Err(err) => {
                warn!("Could not read GitHub rate limit: {}", err);
                RateLimit::default()
            }
        };
        let limiter = RateLimiter::seeded(GITHUB_HEADERS, limit);
        Ok(GithubClient {
            rest: RestClient::new(client, limiter, self.policy),
            github_url,
        })
    }
}

async fn rate_limit(client: &Client, github_url: impl Into<String>) -> reqwest::Result<RateLimitResource> {
    let request_url = format!("{}/rate_limit", github_url.into());
    let response = client.get(request_url).send().await?.error_for_status()?;
    response
        .json::<RateLimitBody>()
        .await
        .map(|body| body.resources.core)
}
