use anyhow::Result;
use async_trait::async_trait;

use apify_client::{AdArchiveRecord, AdLibraryScraperInput, ApifyClient};

// --- ScrapeJobClient trait ---

/// Terminal-or-not view of an external scrape job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Running,
    Succeeded,
    Failed(String),
}

/// The external scrape-job collaborator: submit a job spec, poll its state,
/// fetch its result dataset. Polling cadence and cancellation live in the
/// orchestrator, not here.
#[async_trait]
pub trait ScrapeJobClient: Send + Sync {
    async fn submit(&self, input: &AdLibraryScraperInput) -> Result<String>;
    async fn status(&self, job_id: &str) -> Result<JobState>;
    async fn results(&self, job_id: &str) -> Result<Vec<AdArchiveRecord>>;
}

// --- ScrapeJobClient impl for ApifyClient ---

#[async_trait]
impl ScrapeJobClient for ApifyClient {
    async fn submit(&self, input: &AdLibraryScraperInput) -> Result<String> {
        let run = self.start_ad_library_scrape(input).await?;
        Ok(run.id)
    }

    async fn status(&self, job_id: &str) -> Result<JobState> {
        let run = self.run_status(job_id).await?;
        if run.succeeded() {
            Ok(JobState::Succeeded)
        } else if run.is_terminal() {
            Ok(JobState::Failed(run.status))
        } else {
            Ok(JobState::Running)
        }
    }

    async fn results(&self, job_id: &str) -> Result<Vec<AdArchiveRecord>> {
        let run = self.run_status(job_id).await?;
        let records = self.get_dataset_items(&run.default_dataset_id).await?;
        Ok(records)
    }
}
