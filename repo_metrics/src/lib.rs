//! Repository quality metrics
//!
//! # Overview
//!
//! Library computes software-engineering quality metrics for GitHub and GitLab repositories
//! from their REST APIs:
//!
//! * `NC` - number of contributors,
//! * `MTTU` - mean time to update, the average interval between releases,
//! * `MTTC` - mean time to commit, the commit history span divided by the number of commits,
//! * `IP` - inactive period, the time since the latest commit,
//! * `BP` - whether the default branch is protected.
//!
//! Platform access goes through the [`api::Client`] trait, implemented by the platform client crates.
//! With the `calculator` feature the library also provides the [`processor::RepositoryProcessor`],
//! which turns a repository URL into a [`result::MetricResult`], and the [`runner::BatchRunner`],
//! which processes a list of URLs and persists every result as soon as it is computed.
//! A repository whose metrics cannot be computed still produces a record with its errors,
//! so a batch always yields one record per input URL.

pub mod api;
pub mod detector;
pub mod metrics;
#[cfg(feature = "calculator")]
pub mod processor;
pub mod result;
#[cfg(feature = "calculator")]
pub mod runner;
#[cfg(feature = "calculator")]
pub mod store;

pub use detector::PlatformDetector;
pub use result::MetricResult;
#[cfg(feature = "calculator")]
pub use processor::RepositoryProcessor;
#[cfg(feature = "calculator")]
pub use runner::{BatchRunner, BatchSummary};
#[cfg(feature = "calculator")]
pub use store::{JsonFileStore, OutputStore};
