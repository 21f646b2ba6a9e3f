use std::collections::HashSet;
use std::fmt::{self, Display};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::Constructor;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed repository URL '{0}': {1}")]
    MalformedUrl(String, &'static str),
    #[error("Unsupported platform '{0}'")]
    UnsupportedPlatform(String),
    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),
    #[error("Transient API failure after {attempts} attempts: {reason}")]
    TransientApiFailure { attempts: u32, reason: String },
    #[error("Missing data: {0}")]
    MissingData(&'static str),
    #[error("Rate limit not reset: {0}")]
    RateLimitExceeded(String),
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
    #[error("Duplicate record for {0}")]
    DuplicateRecord(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedUrl(..) => ErrorKind::MalformedUrl,
            Error::UnsupportedPlatform(_) => ErrorKind::UnsupportedPlatform,
            Error::RepositoryNotFound(_) => ErrorKind::RepositoryNotFound,
            Error::TransientApiFailure { .. } => ErrorKind::TransientApiFailure,
            Error::MissingData(_) => ErrorKind::MissingData,
            Error::RateLimitExceeded(_) => ErrorKind::RateLimitExceeded,
            Error::InvalidResponse(_) | Error::Json(_) => ErrorKind::InvalidResponse,
            Error::DuplicateRecord(_) | Error::Configuration(_) | Error::Io(_) | Error::Other(_) => {
                ErrorKind::Internal
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error classification recorded in the output. Names are part of the output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay, EnumString, AsRefStr)]
pub enum ErrorKind {
    #[serde(rename = "MalformedURL")]
    #[strum(serialize = "MalformedURL")]
    MalformedUrl,
    UnsupportedPlatform,
    RepositoryNotFound,
    #[serde(rename = "TransientAPIFailure")]
    #[strum(serialize = "TransientAPIFailure")]
    TransientApiFailure,
    MissingData,
    RateLimitExceeded,
    InvalidResponse,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay, EnumString)]
pub enum Platform {
    GitHub,
    GitLab,
}

/// Repository identified by a supported hosting platform.
///
/// For GitLab `owner` holds the full namespace path, which may contain `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryReference {
    pub url: String,
    pub platform: Platform,
    pub host: String,
    pub owner: String,
    pub name: String,
}

impl RepositoryReference {
    /// `owner/name`, the path GitLab uses as project id.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct RepositoryInfo {
    pub default_branch: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Constructor)]
pub struct Release {
    pub created_at: DateTime<Utc>,
}

/// Commit count of the default branch with its first and last commit timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Constructor)]
pub struct CommitHistory {
    pub count: u64,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

impl CommitHistory {
    pub fn empty() -> Self {
        CommitHistory::new(0, None, None)
    }
}

/// Read-only view of a hosting platform needed to compute repository metrics.
///
/// Implementations are expected to handle rate limiting, retries and pagination
/// themselves, so every returned collection is complete.
#[async_trait]
pub trait Client: Send + Sync {
    async fn repository(&self, repo: &RepositoryReference) -> Result<RepositoryInfo>;

    async fn list_releases(&self, repo: &RepositoryReference) -> Result<Vec<Release>>;

    async fn list_commits(&self, repo: &RepositoryReference) -> Result<CommitHistory>;

    async fn list_contributors(&self, repo: &RepositoryReference) -> Result<HashSet<String>>;

    async fn branch_protection(&self, repo: &RepositoryReference, branch: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn error_kind_names() {
        assert_eq!(ErrorKind::MalformedUrl.to_string(), "MalformedURL");
        assert_eq!(ErrorKind::TransientApiFailure.as_ref(), "TransientAPIFailure");
        assert_eq!(ErrorKind::from_str("MissingData").unwrap(), ErrorKind::MissingData);
        assert_eq!(
            serde_json::to_string(&ErrorKind::MalformedUrl).unwrap(),
            r#""MalformedURL""#
        );
    }

    #[test]
    fn error_kinds() {
        let err = Error::TransientApiFailure {
            attempts: 3,
            reason: "502 Bad Gateway".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::TransientApiFailure);
        assert_eq!(err.to_string(), "Transient API failure after 3 attempts: 502 Bad Gateway");
        assert_eq!(Error::RepositoryNotFound("x".into()).kind(), ErrorKind::RepositoryNotFound);
        assert_eq!(Error::Configuration("x".into()).kind(), ErrorKind::Internal);
    }
}
