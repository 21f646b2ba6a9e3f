use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use strum_macros::Display as StrumDisplay;

use crate::api::{ErrorKind, Platform, RepositoryReference};
use crate::metrics::{Metric, Seconds};

const SECONDS_PER_DAY: Seconds = 86_400.0;

/// Lifecycle of a single repository within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, StrumDisplay)]
pub enum ProcessingState {
    Pending,
    Fetching,
    Computing,
    Done,
    Failed,
}

/// Metrics of one input repository URL.
///
/// `None` means the metric could not be computed, which is not the same as zero.
/// Metrics missing because a prerequisite could not be fetched are listed in `errors`,
/// and in `fetch_errors` with the kind of error the fetch failed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub url: String,
    pub status: ProcessingState,
    pub platform: Option<Platform>,
    pub owner: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "NC")]
    pub contributors: Option<u64>,
    #[serde(rename = "MTTU")]
    pub mean_time_to_update: Option<Seconds>,
    #[serde(rename = "MTTC")]
    pub mean_time_to_commit: Option<Seconds>,
    #[serde(rename = "IP")]
    pub inactive_period: Option<Seconds>,
    #[serde(rename = "BP")]
    pub branch_protection: Option<bool>,
    #[serde(default)]
    pub errors: BTreeMap<Metric, ErrorKind>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fetch_errors: BTreeMap<Metric, ErrorKind>,
    #[serde(default)]
    pub error: Option<ErrorKind>,
}

impl MetricResult {
    pub fn pending(url: impl Into<String>, repo: Option<&RepositoryReference>) -> Self {
        MetricResult {
            url: url.into(),
            status: ProcessingState::Pending,
            platform: repo.map(|repo| repo.platform),
            owner: repo.map(|repo| repo.owner.clone()),
            name: repo.map(|repo| repo.name.clone()),
            contributors: None,
            mean_time_to_update: None,
            mean_time_to_commit: None,
            inactive_period: None,
            branch_protection: None,
            errors: BTreeMap::new(),
            fetch_errors: BTreeMap::new(),
            error: None,
        }
    }

    pub fn failed(url: impl Into<String>, repo: Option<&RepositoryReference>, error: ErrorKind) -> Self {
        let mut result = Self::pending(url, repo);
        result.status = ProcessingState::Failed;
        result.error = Some(error);
        result
    }

    pub fn record_error(&mut self, metric: Metric, kind: ErrorKind) {
        self.errors.insert(metric, kind);
    }

    /// Records `metric` as `MissingData`, keeping `cause` when a fetch failed for another reason.
    pub fn record_missing(&mut self, metric: Metric, cause: ErrorKind) {
        self.record_error(metric, ErrorKind::MissingData);
        if cause != ErrorKind::MissingData {
            self.fetch_errors.insert(metric, cause);
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self.status {
            ProcessingState::Done if self.errors.is_empty() => Outcome::Succeeded,
            ProcessingState::Done => Outcome::Partial,
            _ => Outcome::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Partial,
    Failed,
}

impl Display for MetricResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(error) = self.error {
            return write!(f, "repository: {}\terror: {}", self.url, error);
        }
        write!(
            f,
            "repository: {}\tNC: {}\tMTTU: {}\tMTTC: {}\tIP: {}\tBP: {}",
            self.url,
            or_na(self.contributors),
            days(self.mean_time_to_update),
            days(self.mean_time_to_commit),
            days(self.inactive_period),
            or_na(self.branch_protection),
        )
    }
}

fn or_na<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "n/a".to_string(), |value| value.to_string())
}

fn days(seconds: Option<Seconds>) -> String {
    seconds.map_or_else(
        || "n/a".to_string(),
        |seconds| format!("{:.2} days", seconds / SECONDS_PER_DAY),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> RepositoryReference {
        RepositoryReference {
            url: "https://github.com/o/r".to_string(),
            platform: Platform::GitHub,
            host: "github.com".to_string(),
            owner: "o".to_string(),
            name: "r".to_string(),
        }
    }

    fn done() -> MetricResult {
        let mut result = MetricResult::pending("https://github.com/o/r", Some(&repo()));
        result.status = ProcessingState::Done;
        result.contributors = Some(12);
        result.mean_time_to_update = Some(172_800.0);
        result.mean_time_to_commit = Some(800.0);
        result.inactive_period = Some(0.1 + 0.2);
        result.branch_protection = Some(true);
        result
    }

    #[test]
    fn outcomes() {
        assert_eq!(done().outcome(), Outcome::Succeeded);

        let mut partial = done();
        partial.branch_protection = None;
        partial.record_error(Metric::Bp, ErrorKind::MissingData);
        assert_eq!(partial.outcome(), Outcome::Partial);

        let failed = MetricResult::failed("nope", None, ErrorKind::MalformedUrl);
        assert_eq!(failed.outcome(), Outcome::Failed);
        assert_eq!(failed.platform, None);
    }

    #[test]
    fn serialized_field_names() {
        let mut result = done();
        result.mean_time_to_update = None;
        result.record_error(Metric::Mttu, ErrorKind::MissingData);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["url"], "https://github.com/o/r");
        assert_eq!(value["platform"], "GitHub");
        assert_eq!(value["status"], "Done");
        assert_eq!(value["NC"], 12);
        assert!(value["MTTU"].is_null());
        assert_eq!(value["MTTC"], 800.0);
        assert_eq!(value["BP"], true);
        assert_eq!(value["errors"]["MTTU"], "MissingData");
        assert!(value["error"].is_null());
        assert!(value.get("fetch_errors").is_none());
    }

    #[test]
    fn fetch_error_kept_next_to_missing_data() {
        let mut result = done();
        result.mean_time_to_commit = None;
        result.record_missing(Metric::Mttc, ErrorKind::TransientApiFailure);
        result.record_missing(Metric::Ip, ErrorKind::MissingData);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["errors"]["MTTC"], "MissingData");
        assert_eq!(value["errors"]["IP"], "MissingData");
        assert_eq!(value["fetch_errors"]["MTTC"], "TransientAPIFailure");
        assert!(value["fetch_errors"].get("IP").is_none());
    }

    #[test]
    fn batch_json_round_trip() {
        let mut partial = done();
        partial.contributors = None;
        partial.record_missing(Metric::Nc, ErrorKind::RateLimitExceeded);
        let batch = vec![
            done(),
            partial,
            MetricResult::failed("https://github.com/o/missing", Some(&repo()), ErrorKind::RepositoryNotFound),
            MetricResult::failed("not a url", None, ErrorKind::MalformedUrl),
        ];
        let json = serde_json::to_string_pretty(&batch).unwrap();
        let parsed: Vec<MetricResult> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, batch);
    }

    #[test]
    fn display_rounds_to_days() {
        let text = done().to_string();
        assert!(text.contains("NC: 12"), "{}", text);
        assert!(text.contains("MTTU: 2.00 days"), "{}", text);
        assert!(text.contains("BP: true"), "{}", text);

        let text = MetricResult::failed("x", None, ErrorKind::UnsupportedPlatform).to_string();
        assert_eq!(text, "repository: x\terror: UnsupportedPlatform");
    }
}
