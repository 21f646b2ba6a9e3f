use crate::limiter::{has_budget_left, reset_delay, RateLimitHeaders};
use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode};
use seatbelt::RecoveryInfo;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// How persistently requests are repeated.
///
/// Rate-limited requests with a known reset time are retried without bound; the other
/// limits only apply to failures whose end cannot be predicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts for server errors and network failures.
    pub max_attempts: u32,
    /// First delay of the exponential backoff.
    pub base_delay: Duration,
    /// Consecutive rate-limit responses without reset time before giving up.
    pub max_rate_limit_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_rate_limit_retries: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Success,
    NotFound,
    RateLimited,
    Transient,
    Rejected,
}

/// A 403 is a rate limit unless the response shows budget left and asks for no wait.
pub(crate) fn classify(status: StatusCode, headers: &HeaderMap, names: RateLimitHeaders) -> Verdict {
    match status {
        status if status.is_success() => Verdict::Success,
        StatusCode::NOT_FOUND | StatusCode::GONE => Verdict::NotFound,
        StatusCode::FORBIDDEN if has_budget_left(headers, names) => Verdict::Rejected,
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => Verdict::RateLimited,
        status if status.is_server_error() => Verdict::Transient,
        _ => Verdict::Rejected,
    }
}

/// Failures counted against a [`RetryPolicy`] during one request.
#[derive(Debug)]
pub(crate) struct RetryBudget {
    policy: RetryPolicy,
    names: RateLimitHeaders,
    transient: AtomicU32,
    blind_rate_limits: AtomicU32,
}

impl RetryBudget {
    pub(crate) fn new(policy: RetryPolicy, names: RateLimitHeaders) -> Self {
        RetryBudget {
            policy,
            names,
            transient: AtomicU32::new(0),
            blind_rate_limits: AtomicU32::new(0),
        }
    }

    /// Failed attempts so far that were not rate limits.
    pub(crate) fn transient_failures(&self) -> u32 {
        self.transient.load(Ordering::Relaxed)
    }

    /// Decides whether the outcome of an attempt is worth another one.
    pub(crate) fn recovery(&self, outcome: &reqwest::Result<Response>) -> RecoveryInfo {
        let response = match outcome {
            Err(err) if err.is_builder() => return RecoveryInfo::never(),
            Err(_) => return self.transient_failure(),
            Ok(response) => response,
        };
        match classify(response.status(), response.headers(), self.names) {
            Verdict::Success | Verdict::NotFound | Verdict::Rejected => RecoveryInfo::never(),
            Verdict::Transient => self.transient_failure(),
            Verdict::RateLimited => match reset_delay(response.headers(), self.names, Utc::now().timestamp()) {
                Some(delay) => {
                    self.blind_rate_limits.store(0, Ordering::Relaxed);
                    RecoveryInfo::retry().delay(delay)
                }
                None => {
                    let blind = self.blind_rate_limits.fetch_add(1, Ordering::Relaxed) + 1;
                    if blind > self.policy.max_rate_limit_retries {
                        RecoveryInfo::never()
                    } else {
                        RecoveryInfo::retry()
                    }
                }
            },
        }
    }

    fn transient_failure(&self) -> RecoveryInfo {
        let failures = self.transient.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.policy.max_attempts {
            RecoveryInfo::never()
        } else {
            RecoveryInfo::retry()
        }
    }
}
