use crate::GitlabClient;
use clients::Error;
use clients::Result;
use clients::RetryPolicy;
use reqwest::header;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::ClientBuilder;
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

const PRIVATE_TOKEN: &str = "private-token";

pub struct GitlabClientBuilder {
    client_builder: ClientBuilder,
    api_url: Option<String>,
    headers: HeaderMap,
    policy: RetryPolicy,
}

impl Default for GitlabClientBuilder {
    fn default() -> Self {
        let mut headers = HeaderMap::default();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("repo-metrics"));
        Self {
            client_builder: ClientBuilder::default(),
            api_url: None,
            headers,
            policy: RetryPolicy::default(),
        }
    }
}

impl GitlabClientBuilder {
    pub fn try_with_token(self, token: secrecy::SecretString) -> Result<GitlabClientBuilder> {
        self.try_with_header(HeaderName::from_static(PRIVATE_TOKEN), token.expose_secret(), true)
    }

    pub fn try_with_user_agent<STR: AsRef<str>>(self, user_agent: STR) -> Result<GitlabClientBuilder> {
        self.try_with_header(header::USER_AGENT, user_agent, false)
    }

    /// API base used for every host instead of `https://<host>/api/v4`.
    pub fn with_api_url<STR: AsRef<str>>(mut self, url: STR) -> GitlabClientBuilder {
        self.api_url = Some(url.as_ref().trim_end_matches('/').to_string());
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> GitlabClientBuilder {
        self.policy = policy;
        self
    }

    /// Timeout of every single HTTP request.
    pub fn with_timeout(mut self, timeout: Duration) -> GitlabClientBuilder {
        self.client_builder = self.client_builder.timeout(timeout);
        self
    }

    fn try_with_header(mut self, key: HeaderName, val: impl AsRef<str>, sensitive: bool) -> Result<GitlabClientBuilder> {
        let mut val = HeaderValue::from_str(val.as_ref())
            .map_err(|_| Error::Configuration(format!("Invalid value of header {}", key)))?;
        val.set_sensitive(sensitive);
        self.headers.insert(key, val);
        Ok(self)
    }

    pub fn build(self) -> Result<GitlabClient> {
        let http = self
            .client_builder
            .default_headers(self.headers)
            .build()
            .map_err(anyhow::Error::from)?;
        Ok(GitlabClient {
            http,
            api_url: self.api_url,
            policy: self.policy,
            hosts: Mutex::new(HashMap::new()),
        })
    }
}
