//! Metric extractors.
//!
//! Every extractor is a pure function over already fetched facts. Durations are
//! reported in seconds without rounding.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::api::CommitHistory;

/// Duration in seconds.
pub type Seconds = f64;

/// Metric names as they appear in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
pub enum Metric {
    /// Number of contributors
    #[serde(rename = "NC")]
    #[strum(serialize = "NC")]
    Nc,
    /// Mean time to update
    #[serde(rename = "MTTU")]
    #[strum(serialize = "MTTU")]
    Mttu,
    /// Mean time to commit
    #[serde(rename = "MTTC")]
    #[strum(serialize = "MTTC")]
    Mttc,
    /// Inactive period
    #[serde(rename = "IP")]
    #[strum(serialize = "IP")]
    Ip,
    /// Branch protection
    #[serde(rename = "BP")]
    #[strum(serialize = "BP")]
    Bp,
}

pub fn number_of_contributors(contributors: &HashSet<String>) -> u64 {
    contributors.len() as u64
}

/// Mean interval between consecutive releases, `None` for fewer than two releases.
pub fn mean_time_to_update(releases: &[DateTime<Utc>]) -> Option<Seconds> {
    if releases.len() < 2 {
        return None;
    }
    let mut releases = releases.to_vec();
    releases.sort();
    let intervals: Vec<Seconds> = releases.windows(2).map(|w| seconds_between(w[0], w[1])).collect();
    Some(intervals.iter().sum::<Seconds>() / intervals.len() as Seconds)
}

/// Commit history span divided by commit count, `None` for one commit or less.
pub fn mean_time_to_commit(history: &CommitHistory) -> Option<Seconds> {
    match (history.count, history.earliest, history.latest) {
        (count, Some(earliest), Some(latest)) if count > 1 => {
            Some(seconds_between(earliest, latest) / count as Seconds)
        }
        _ => None,
    }
}

pub fn inactive_period(history: &CommitHistory, now: DateTime<Utc>) -> Option<Seconds> {
    history.latest.map(|latest| seconds_between(latest, now))
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Seconds {
    (to - from).num_milliseconds() as Seconds / 1000.0
}
