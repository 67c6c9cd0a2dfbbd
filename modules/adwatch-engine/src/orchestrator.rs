use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

use adwatch_store::ComplianceStore;
use apify_client::{AdLibraryScraperInput, StartUrl};

use crate::ingest;
use crate::traits::{JobState, ScrapeJobClient};

/// Polling cadence for the external scrape job. Defaults match production;
/// tests inject millisecond values.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub ceiling: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            ceiling: Duration::from_secs(300),
        }
    }
}

/// How many dataset items to request from the scrape job.
const RESULTS_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Job submission failed: {0}")]
    Submission(String),

    #[error("Scrape job failed upstream: {0}")]
    Upstream(String),

    #[error("Scrape job timed out after {}s", .0.as_secs())]
    PollTimeout(Duration),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Result of one scrape run. Cancellation is an outcome, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeOutcome {
    Completed { ads_ingested: usize },
    NoAds,
    Cancelled { ads_collected: usize },
}

/// Drives one external scrape job for one domain: submit, poll to a
/// terminal state under a wall-clock ceiling, ingest the dataset. Never
/// retries the job itself — retry is a user-initiated resume.
pub struct ScrapeOrchestrator {
    jobs: Arc<dyn ScrapeJobClient>,
    store: Arc<dyn ComplianceStore>,
    poll: PollConfig,
}

impl ScrapeOrchestrator {
    pub fn new(
        jobs: Arc<dyn ScrapeJobClient>,
        store: Arc<dyn ComplianceStore>,
        poll: PollConfig,
    ) -> Self {
        Self { jobs, store, poll }
    }

    /// Job spec with two seed strategies: the advertiser's likely page
    /// handle, and a keyword search on the domain name itself.
    fn build_input(domain: &str) -> AdLibraryScraperInput {
        let handle = domain.split('.').next().unwrap_or(domain);
        AdLibraryScraperInput {
            start_urls: vec![StartUrl {
                url: format!("https://www.facebook.com/{handle}"),
            }],
            search_terms: vec![domain.to_string()],
            results_limit: RESULTS_LIMIT,
            active_status: "active".to_string(),
            countries: vec!["US".to_string()],
        }
    }

    pub async fn run(
        &self,
        domain: &str,
        cancelled: &AtomicBool,
    ) -> Result<ScrapeOutcome, ScrapeError> {
        let input = Self::build_input(domain);

        let job_id = self
            .jobs
            .submit(&input)
            .await
            .map_err(|e| ScrapeError::Submission(e.to_string()))?;
        info!(domain, job_id, "Scrape job submitted");

        let started = Instant::now();
        loop {
            if started.elapsed() >= self.poll.ceiling {
                warn!(domain, job_id, "Scrape job exceeded poll ceiling");
                return Err(ScrapeError::PollTimeout(started.elapsed()));
            }

            tokio::time::sleep(self.poll.interval).await;

            // Check the flag first thing on every wake. A pause or cancel
            // always wins the race against a fresh status result.
            if cancelled.load(Ordering::Relaxed) {
                let ads_collected = self.store.count_ads(domain).await? as usize;
                info!(domain, ads_collected, "Scrape cancelled during polling");
                return Ok(ScrapeOutcome::Cancelled { ads_collected });
            }

            match self.jobs.status(&job_id).await {
                Ok(JobState::Succeeded) => break,
                Ok(JobState::Failed(detail)) => {
                    return Err(ScrapeError::Upstream(detail));
                }
                Ok(JobState::Running) => continue,
                Err(e) => {
                    // A single failed status poll is not terminal; the next
                    // iteration retries until the ceiling.
                    warn!(domain, job_id, error = %e, "Status poll failed");
                    continue;
                }
            }
        }

        let records = self.jobs.results(&job_id).await?;
        info!(domain, count = records.len(), "Scrape job dataset fetched");

        let candidates: Vec<_> = records
            .iter()
            .filter_map(|r| ingest::map_record(domain, r))
            .collect();

        if candidates.is_empty() {
            return Ok(ScrapeOutcome::NoAds);
        }

        if cancelled.load(Ordering::Relaxed) {
            let ads_collected = self.store.count_ads(domain).await? as usize;
            return Ok(ScrapeOutcome::Cancelled { ads_collected });
        }

        let ads_ingested = ingest::ingest_batch(self.store.as_ref(), candidates).await?;
        Ok(ScrapeOutcome::Completed { ads_ingested })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_seeds_handle_and_keyword_search() {
        let input = ScrapeOrchestrator::build_input("shop.example");
        assert_eq!(input.start_urls[0].url, "https://www.facebook.com/shop");
        assert_eq!(input.search_terms, vec!["shop.example".to_string()]);
    }
}
