use chrono::Utc;
use derive_more::Constructor;
use log::debug;
use log::info;
use reqwest::header::HeaderMap;
use reqwest::header::RETRY_AFTER;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;

/// Response headers a platform reports its rate limit in.
#[derive(Constructor, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub remaining: &'static str,
    pub reset: &'static str,
}

pub const GITHUB_HEADERS: RateLimitHeaders = RateLimitHeaders {
    remaining: "x-ratelimit-remaining",
    reset: "x-ratelimit-reset",
};

pub const GITLAB_HEADERS: RateLimitHeaders = RateLimitHeaders {
    remaining: "ratelimit-remaining",
    reset: "ratelimit-reset",
};

/// Remaining request budget and the epoch second it resets at. `None` is unknown.
///
/// `blocked_until` is a pause requested by `Retry-After`, kept apart from the budget window.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    remaining: Option<u32>,
    reset: Option<i64>,
    blocked_until: Option<i64>,
}

impl RateLimit {
    pub fn new(remaining: Option<u32>, reset: Option<i64>) -> Self {
        RateLimit {
            remaining,
            reset,
            blocked_until: None,
        }
    }

    /// Takes one request from the budget, or returns how long to wait.
    fn acquire(&mut self, now: i64) -> Option<Duration> {
        match self.blocked_until {
            Some(until) if until >= now => return Some(Duration::from_secs((until - now + 1) as u64)),
            Some(_) => self.blocked_until = None,
            None => {}
        }
        match (self.remaining, self.reset) {
            (Some(0), Some(reset)) if reset >= now => Some(Duration::from_secs((reset - now + 1) as u64)),
            (Some(0), _) => {
                debug!("Old reset. Budget unknown until next response.");
                self.remaining = None;
                None
            }
            (Some(remaining), _) => {
                self.remaining = Some(remaining - 1);
                None
            }
            (None, _) => None,
        }
    }

    fn update(&mut self, remaining: u32, reset: i64) {
        match self.reset {
            Some(current) if reset < current => debug!("Ignoring limits of a past window."),
            Some(current) if reset == current => {
                // Min `remaining` because in case of parallel requests late response may arrive with old `remaining`
                self.remaining = Some(self.remaining.map_or(remaining, |current| current.min(remaining)));
            }
            _ => {
                self.remaining = Some(remaining);
                self.reset = Some(reset);
            }
        }
    }

    fn block(&mut self, until: i64) {
        self.blocked_until = Some(self.blocked_until.map_or(until, |current| current.max(until)));
    }
}

/// Shared request budget of one API host.
#[derive(Debug)]
pub struct RateLimiter {
    limit: Mutex<RateLimit>,
    headers: RateLimitHeaders,
}

impl RateLimiter {
    pub fn new(headers: RateLimitHeaders) -> Self {
        Self::seeded(headers, RateLimit::default())
    }

    pub fn seeded(headers: RateLimitHeaders, limit: RateLimit) -> Self {
        RateLimiter {
            limit: Mutex::new(limit),
            headers,
        }
    }

    pub fn headers(&self) -> RateLimitHeaders {
        self.headers
    }

    /// Suspends until the budget allows another request.
    pub async fn wait(&self) {
        while let Some(delay) = self.time_to_wait().await {
            info!("Rate limiting wait: {} sec", delay.as_secs());
            tokio::time::sleep(delay).await;
        }
    }

    async fn time_to_wait(&self) -> Option<Duration> {
        self.limit.lock().await.acquire(Utc::now().timestamp())
    }

    pub async fn update(&self, headers: &HeaderMap) {
        let remaining = read_header::<u32>(headers, self.headers.remaining);
        let reset = read_header::<i64>(headers, self.headers.reset);
        if let (Some(remaining), Some(reset)) = (remaining, reset) {
            let mut limit = self.limit.lock().await;
            limit.update(remaining, reset);
            debug!("Updated limits: {:?}", limit);
        }
    }

    /// Holds back every request until the reset announced by a rate-limited response.
    ///
    /// `Retry-After` pauses for exactly that long, whatever the budget window says.
    /// Returns `false` when the response carries no usable reset time.
    pub async fn block_until_reset(&self, headers: &HeaderMap) -> bool {
        let now = Utc::now().timestamp();
        match retry_after(headers) {
            Some(seconds) => self.limit.lock().await.block(now + seconds),
            None => match spent_window_reset(headers, self.headers, now) {
                Some(reset) => self.limit.lock().await.update(0, reset),
                None => return false,
            },
        }
        true
    }

    pub async fn current(&self) -> RateLimit {
        *self.limit.lock().await
    }
}

/// How long a rate-limited response asks to wait: one second past `Retry-After`, or past the reset of a spent budget.
pub(crate) fn reset_delay(headers: &HeaderMap, names: RateLimitHeaders, now: i64) -> Option<Duration> {
    let reset = retry_after(headers)
        .map(|seconds| now + seconds)
        .or_else(|| spent_window_reset(headers, names, now))?;
    Some(Duration::from_secs((reset - now + 1) as u64))
}

/// A 403 that neither asks to wait nor reports a spent budget is a plain refusal.
pub(crate) fn has_budget_left(headers: &HeaderMap, names: RateLimitHeaders) -> bool {
    retry_after(headers).is_none() && read_header::<u32>(headers, names.remaining).map_or(false, |remaining| remaining > 0)
}

fn retry_after(headers: &HeaderMap) -> Option<i64> {
    read_header::<i64>(headers, RETRY_AFTER.as_str()).map(|seconds| seconds.max(0))
}

fn spent_window_reset(headers: &HeaderMap, names: RateLimitHeaders, now: i64) -> Option<i64> {
    match (
        read_header::<u32>(headers, names.remaining),
        read_header::<i64>(headers, names.reset),
    ) {
        (Some(0), Some(reset)) if reset >= now => Some(reset),
        _ => None,
    }
}

fn read_header<T: FromStr>(headers: &HeaderMap, header: &str) -> Option<T> {
    headers.get(header)?.to_str().ok()?.trim().parse::<T>().ok()
}
