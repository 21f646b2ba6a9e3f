use std::collections::HashSet;
use std::fmt::{self, Display};

use futures::{stream, StreamExt};
use log::{error, info, warn};

use crate::api::{Client, Result};
use crate::processor::RepositoryProcessor;
use crate::result::Outcome;
use crate::store::OutputStore;

/// Counts of repositories by outcome for one batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
    /// Already present in a resumed output.
    pub skipped: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.partial + self.failed + self.skipped
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Succeeded => self.succeeded += 1,
            Outcome::Partial => self.partial += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

impl Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} repositories: {} succeeded, {} partially succeeded, {} failed",
            self.total(),
            self.succeeded,
            self.partial,
            self.failed
        )?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        Ok(())
    }
}

/// Processes a list of repository URLs and appends each result to an output store.
pub struct BatchRunner<GITHUB, GITLAB>
where
    GITHUB: Client,
    GITLAB: Client,
{
    processor: RepositoryProcessor<GITHUB, GITLAB>,
    concurrency: usize,
}

impl<GITHUB, GITLAB> BatchRunner<GITHUB, GITLAB>
where
    GITHUB: 'static + Client,
    GITLAB: 'static + Client,
{
    pub fn new(processor: RepositoryProcessor<GITHUB, GITLAB>) -> Self {
        BatchRunner {
            processor,
            concurrency: 1,
        }
    }

    /// Number of repositories processed at the same time. Results are still stored in input order.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fails only if the store cannot be written; repository failures end up in the store.
    pub async fn run<STORE: OutputStore>(&self, urls: Vec<String>, store: &mut STORE) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();
        let mut seen = HashSet::new();
        let mut pending = Vec::with_capacity(urls.len());
        for url in urls {
            if !seen.insert(url.clone()) {
                warn!("Ignoring duplicate input: {}", url);
            } else if store.contains(&url) {
                info!("Already processed: {}", url);
                summary.skipped += 1;
            } else {
                pending.push(url);
            }
        }

        let processor = &self.processor;
        let mut results = stream::iter(pending)
            .map(|url| async move { processor.process(&url).await })
            .buffered(self.concurrency);
        while let Some(result) = results.next().await {
            info!("{}", result);
            summary.record(result.outcome());
            if let Err(err) = store.append(result) {
                error!("Failed to write output: {}", err);
                return Err(err);
            }
        }
        Ok(summary)
    }
}
