use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};

use adwatch_common::{AdWatchError, Domain, ProcessingStatus};
use adwatch_store::ComplianceStore;

use crate::analysis::CompliancePipeline;
use crate::ingest;
use crate::orchestrator::{PollConfig, ScrapeError, ScrapeOrchestrator, ScrapeOutcome};
use crate::tasks::{TaskHandle, TaskRegistry};
use crate::traits::ScrapeJobClient;

/// What a control action left behind: the domain's resulting processing
/// state and its message, as written (or found) by the action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlOutcome {
    pub status: ProcessingStatus,
    pub message: String,
}

/// The per-domain control surface: start, pause, resume, cancel and
/// force-complete. Owns the task registry; every background run for a
/// domain goes through here.
pub struct DomainMonitor {
    store: Arc<dyn ComplianceStore>,
    jobs: Arc<dyn ScrapeJobClient>,
    pipeline: Arc<CompliancePipeline>,
    registry: Arc<TaskRegistry>,
    poll: PollConfig,
}

impl DomainMonitor {
    pub fn new(
        store: Arc<dyn ComplianceStore>,
        jobs: Arc<dyn ScrapeJobClient>,
        pipeline: Arc<CompliancePipeline>,
        poll: PollConfig,
    ) -> Self {
        Self {
            store,
            jobs,
            pipeline,
            registry: Arc::new(TaskRegistry::new()),
            poll,
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    async fn require_domain(&self, name: &str) -> Result<Domain, AdWatchError> {
        self.store
            .find_domain(name)
            .await?
            .ok_or_else(|| AdWatchError::DomainNotFound(name.to_string()))
    }

    /// Kick off a scrape-and-analyze run. No-op when a run is already
    /// active. `seed` marks placeholder runs whose purge must never
    /// destroy genuinely scraped rows.
    pub async fn start(&self, name: &str, seed: bool) -> Result<ControlOutcome, AdWatchError> {
        let domain = match self.store.find_domain(name).await? {
            Some(d) => d,
            None => {
                let d = Domain::new(name);
                self.store.upsert_domain(&d).await?;
                d
            }
        };

        if self.registry.is_active(name) || domain.processing_status.is_active() {
            info!(domain = name, "Start requested but a run is already active");
            return Ok(ControlOutcome {
                status: domain.processing_status,
                message: "Domain is already being processed".to_string(),
            });
        }

        ingest::prepare_fresh_run(self.store.as_ref(), name, seed).await?;

        let message = "Fetching ads...";
        self.store
            .set_processing_state(name, ProcessingStatus::FetchingAds, message)
            .await?;

        let cancelled = Arc::new(AtomicBool::new(false));
        let join = tokio::spawn(run_domain_task(
            self.store.clone(),
            self.jobs.clone(),
            self.pipeline.clone(),
            self.registry.clone(),
            self.poll,
            name.to_string(),
            cancelled.clone(),
        ));
        self.registry
            .register(name, TaskHandle::new(cancelled, join));

        Ok(ControlOutcome {
            status: ProcessingStatus::FetchingAds,
            message: message.to_string(),
        })
    }

    /// Stop the run but keep the domain resumable. The control action, not
    /// the stopping task, writes the PAUSED state, so pause always wins the
    /// race for the final recorded state.
    pub async fn pause(&self, name: &str) -> Result<ControlOutcome, AdWatchError> {
        let domain = self.require_domain(name).await?;

        if !self.registry.request_cancel(name) {
            return Ok(ControlOutcome {
                status: domain.processing_status,
                message: "No active task to pause".to_string(),
            });
        }

        let message = "Processing paused by user";
        self.store
            .set_processing_state(name, ProcessingStatus::Paused, message)
            .await?;
        Ok(ControlOutcome {
            status: ProcessingStatus::Paused,
            message: message.to_string(),
        })
    }

    /// Restart a paused domain from a clean slate for new results. Prior
    /// analyses stay until replaced.
    pub async fn resume(&self, name: &str) -> Result<ControlOutcome, AdWatchError> {
        let domain = self.require_domain(name).await?;

        if domain.processing_status != ProcessingStatus::Paused {
            return Ok(ControlOutcome {
                status: domain.processing_status,
                message: "Domain is not paused".to_string(),
            });
        }

        self.start(name, false).await
    }

    /// Stop the run for good. Cancellation is a deliberate stop, so the
    /// domain finalizes as COMPLETED with whatever was collected, never
    /// FAILED.
    pub async fn cancel(&self, name: &str) -> Result<ControlOutcome, AdWatchError> {
        let domain = self.require_domain(name).await?;

        if !self.registry.request_cancel(name) {
            return Ok(ControlOutcome {
                status: domain.processing_status,
                message: "No active task to cancel".to_string(),
            });
        }

        let count = self.store.count_ads(name).await?;
        let message = format!("Scrape cancelled: {count} ads collected");
        self.store
            .set_processing_state(name, ProcessingStatus::Completed, &message)
            .await?;
        Ok(ControlOutcome {
            status: ProcessingStatus::Completed,
            message,
        })
    }

    /// Operator override for stuck domains: finalize as COMPLETED from any
    /// state, cancelling any live task on the way.
    pub async fn force_complete(&self, name: &str) -> Result<ControlOutcome, AdWatchError> {
        self.require_domain(name).await?;
        self.registry.request_cancel(name);

        let count = self.store.count_ads(name).await?;
        let message = format!("Manually marked complete: {count} ads on record");
        self.store
            .set_processing_state(name, ProcessingStatus::Completed, &message)
            .await?;
        Ok(ControlOutcome {
            status: ProcessingStatus::Completed,
            message,
        })
    }
}

/// The spawned per-domain run. Observing cancellation means writing no
/// state at all: the control action that set the flag owns the domain's
/// final recorded state.
async fn run_domain_task(
    store: Arc<dyn ComplianceStore>,
    jobs: Arc<dyn ScrapeJobClient>,
    pipeline: Arc<CompliancePipeline>,
    registry: Arc<TaskRegistry>,
    poll: PollConfig,
    name: String,
    cancelled: Arc<AtomicBool>,
) {
    let orchestrator = ScrapeOrchestrator::new(jobs, store.clone(), poll);

    let outcome = orchestrator.run(&name, &cancelled).await;
    let result = match outcome {
        Ok(ScrapeOutcome::Cancelled { ads_collected }) => {
            info!(domain = name, ads_collected, "Run stopped by pause/cancel");
            Ok(())
        }
        Ok(ScrapeOutcome::NoAds) => {
            write_unless_cancelled(
                &store,
                &cancelled,
                &name,
                ProcessingStatus::Completed,
                "No ads found",
            )
            .await
        }
        Ok(ScrapeOutcome::Completed { ads_ingested }) => {
            scan_phase(&store, &pipeline, &cancelled, &name, ads_ingested).await
        }
        Err(e) => {
            let message = match &e {
                ScrapeError::Submission(detail) => {
                    format!("Failed to submit scrape job: {detail}")
                }
                ScrapeError::Upstream(detail) => format!("Scrape job failed: {detail}"),
                ScrapeError::PollTimeout(elapsed) => {
                    format!("Scrape job timed out after {}s", elapsed.as_secs())
                }
                ScrapeError::Internal(detail) => format!("Processing failed: {detail}"),
            };
            write_unless_cancelled(&store, &cancelled, &name, ProcessingStatus::Failed, &message)
                .await
        }
    };

    if let Err(e) = result {
        error!(domain = name, error = %e, "Failed to record run outcome");
    }

    if !cancelled.load(Ordering::Relaxed) {
        registry.remove(&name);
    }
}

async fn scan_phase(
    store: &Arc<dyn ComplianceStore>,
    pipeline: &Arc<CompliancePipeline>,
    cancelled: &AtomicBool,
    name: &str,
    ads_ingested: usize,
) -> anyhow::Result<()> {
    if cancelled.load(Ordering::Relaxed) {
        return Ok(());
    }

    store
        .set_processing_state(
            name,
            ProcessingStatus::ScanningCompliance,
            &format!("Scanning {ads_ingested} ads for compliance..."),
        )
        .await?;

    // Re-read the row: tracking_param may have changed since start.
    let Some(domain) = store.find_domain(name).await? else {
        anyhow::bail!("Domain row disappeared mid-run: {name}");
    };

    match pipeline.run_batch(&domain).await {
        Ok(processed) => {
            write_unless_cancelled(
                store,
                cancelled,
                name,
                ProcessingStatus::Completed,
                &format!("Compliance check complete: processed {processed} ads"),
            )
            .await
        }
        Err(e) => {
            write_unless_cancelled(
                store,
                cancelled,
                name,
                ProcessingStatus::Failed,
                &format!("Compliance scan failed: {e}"),
            )
            .await
        }
    }
}

/// Commit a state transition only when no pause/cancel raced in first.
async fn write_unless_cancelled(
    store: &Arc<dyn ComplianceStore>,
    cancelled: &AtomicBool,
    name: &str,
    status: ProcessingStatus,
    message: &str,
) -> anyhow::Result<()> {
    if cancelled.load(Ordering::Relaxed) {
        info!(domain = name, skipped = %status, "Skipping state write after cancellation");
        return Ok(());
    }
    store.set_processing_state(name, status, message).await
}

