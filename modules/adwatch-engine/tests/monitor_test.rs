//! End-to-end control-surface tests: start, pause, resume, cancel and
//! force-complete against the in-memory store with scripted collaborators.

use std::sync::Arc;
use std::time::Duration;

use adwatch_common::ProcessingStatus;
use adwatch_engine::analysis::CompliancePipeline;
use adwatch_engine::monitor::DomainMonitor;
use adwatch_engine::orchestrator::PollConfig;
use adwatch_engine::testing::{
    archive_record, test_ad, test_domain, textless_record, MemoryStore, MockPageFetcher,
    ScriptedJobClient, ScriptedJudge,
};
use adwatch_engine::traits::JobState;

fn fast_poll() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(10),
        ceiling: Duration::from_secs(2),
    }
}

fn build_monitor(store: Arc<MemoryStore>, jobs: ScriptedJobClient) -> DomainMonitor {
    build_monitor_with_poll(store, jobs, fast_poll())
}

fn build_monitor_with_poll(
    store: Arc<MemoryStore>,
    jobs: ScriptedJobClient,
    poll: PollConfig,
) -> DomainMonitor {
    let judge = Arc::new(ScriptedJudge::new());
    let fetcher = Arc::new(MockPageFetcher::new());
    let pipeline = Arc::new(CompliancePipeline::new(store.clone(), judge, fetcher));
    DomainMonitor::new(store, Arc::new(jobs), pipeline, poll)
}

/// Wait until the domain's background task is gone and its status has left
/// the active states.
async fn wait_for_idle(monitor: &DomainMonitor, store: &MemoryStore, name: &str) {
    for _ in 0..300 {
        let settled = !monitor.registry().is_active(name)
            && store
                .domain_state(name)
                .is_some_and(|(status, _)| !status.is_active());
        if settled {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("domain {name} never settled");
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn three_records_one_textless_yields_two_analyzed_ads() {
    let store = Arc::new(MemoryStore::new().with_domain(test_domain("shop.example")));
    let jobs = ScriptedJobClient::new()
        .with_states(vec![JobState::Running, JobState::Succeeded])
        .with_records(vec![
            archive_record("a1", "Trail runners, 30% off"),
            archive_record("a2", "Waterproof hiking boots"),
            textless_record(),
        ]);
    let monitor = build_monitor(store.clone(), jobs);

    let outcome = monitor.start("shop.example", false).await.unwrap();
    assert_eq!(outcome.status, ProcessingStatus::FetchingAds);

    wait_for_idle(&monitor, &store, "shop.example").await;

    assert_eq!(store.ad_count("shop.example"), 2);
    assert_eq!(store.analysis_count("shop.example"), 2);

    let (status, message) = store.domain_state("shop.example").unwrap();
    assert_eq!(status, ProcessingStatus::Completed);
    assert!(message.contains('2'), "message should mention 2: {message}");

    // Both ads judged compliant, so the aggregate is 100
    assert_eq!(store.domain_score("shop.example"), Some(100.0));

    // The run moved through both working phases in order
    let statuses: Vec<_> = store
        .state_log("shop.example")
        .into_iter()
        .map(|(s, _)| s)
        .collect();
    assert_eq!(
        statuses,
        vec![
            ProcessingStatus::FetchingAds,
            ProcessingStatus::ScanningCompliance,
            ProcessingStatus::Completed,
        ]
    );
}

#[tokio::test]
async fn dataset_without_ads_completes_with_no_ads_found() {
    let store = Arc::new(MemoryStore::new().with_domain(test_domain("quiet.example")));
    let jobs = ScriptedJobClient::new().with_records(vec![textless_record()]);
    let monitor = build_monitor(store.clone(), jobs);

    monitor.start("quiet.example", false).await.unwrap();
    wait_for_idle(&monitor, &store, "quiet.example").await;

    let (status, message) = store.domain_state("quiet.example").unwrap();
    assert_eq!(status, ProcessingStatus::Completed);
    assert_eq!(message, "No ads found");
    assert_eq!(store.analysis_count("quiet.example"), 0);
}

#[tokio::test]
async fn start_creates_unknown_domain() {
    let store = Arc::new(MemoryStore::new());
    let jobs = ScriptedJobClient::new().with_records(vec![archive_record("a1", "New shoes")]);
    let monitor = build_monitor(store.clone(), jobs);

    monitor.start("fresh.example", false).await.unwrap();
    wait_for_idle(&monitor, &store, "fresh.example").await;

    assert_eq!(store.ad_count("fresh.example"), 1);
    let (status, _) = store.domain_state("fresh.example").unwrap();
    assert_eq!(status, ProcessingStatus::Completed);
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submission_failure_marks_domain_failed() {
    let store = Arc::new(MemoryStore::new().with_domain(test_domain("shop.example")));
    let jobs = ScriptedJobClient::new().failing_submit("actor quota exceeded");
    let monitor = build_monitor(store.clone(), jobs);

    monitor.start("shop.example", false).await.unwrap();
    wait_for_idle(&monitor, &store, "shop.example").await;

    let (status, message) = store.domain_state("shop.example").unwrap();
    assert_eq!(status, ProcessingStatus::Failed);
    assert!(message.contains("Failed to submit scrape job"));
    assert!(message.contains("actor quota exceeded"));
}

#[tokio::test]
async fn upstream_job_failure_marks_domain_failed_with_detail() {
    let store = Arc::new(MemoryStore::new().with_domain(test_domain("shop.example")));
    let jobs = ScriptedJobClient::new().with_states(vec![
        JobState::Running,
        JobState::Failed("ABORTED".to_string()),
    ]);
    let monitor = build_monitor(store.clone(), jobs);

    monitor.start("shop.example", false).await.unwrap();
    wait_for_idle(&monitor, &store, "shop.example").await;

    let (status, message) = store.domain_state("shop.example").unwrap();
    assert_eq!(status, ProcessingStatus::Failed);
    assert!(message.contains("ABORTED"), "message: {message}");
}

#[tokio::test]
async fn poll_ceiling_marks_domain_failed_with_elapsed_time() {
    let store = Arc::new(MemoryStore::new().with_domain(test_domain("slow.example")));
    let jobs = ScriptedJobClient::new().with_states(vec![JobState::Running]);
    let poll = PollConfig {
        interval: Duration::from_millis(10),
        ceiling: Duration::from_millis(40),
    };
    let monitor = build_monitor_with_poll(store.clone(), jobs, poll);

    monitor.start("slow.example", false).await.unwrap();
    wait_for_idle(&monitor, &store, "slow.example").await;

    let (status, message) = store.domain_state("slow.example").unwrap();
    assert_eq!(status, ProcessingStatus::Failed);
    assert!(message.contains("timed out"), "message: {message}");
}

// ---------------------------------------------------------------------------
// Pause / resume
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pause_mid_run_preserves_rows_and_is_resumable() {
    // Seed start against existing scraped rows skips the purge, so the two
    // pre-existing ads represent partial results of an earlier run.
    let store = Arc::new(
        MemoryStore::new()
            .with_domain(test_domain("shop.example"))
            .with_ad(test_ad("shop.example", "a1", "Old ad one"))
            .with_ad(test_ad("shop.example", "a2", "Old ad two")),
    );
    let jobs = ScriptedJobClient::new().with_states(vec![JobState::Running]);
    let monitor = build_monitor(store.clone(), jobs);

    monitor.start("shop.example", true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let outcome = monitor.pause("shop.example").await.unwrap();
    assert_eq!(outcome.status, ProcessingStatus::Paused);
    assert_eq!(outcome.message, "Processing paused by user");

    // Give the cancelled task time to wake and observe the flag
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Rows ingested so far survive, and the task wrote nothing after the
    // pause took the final state
    assert_eq!(store.ad_count("shop.example"), 2);
    let (status, message) = store.domain_state("shop.example").unwrap();
    assert_eq!(status, ProcessingStatus::Paused);
    assert!(!message.is_empty());
    assert!(!monitor.registry().is_active("shop.example"));
}

#[tokio::test]
async fn resume_requires_paused_state() {
    let store = Arc::new(MemoryStore::new().with_domain(test_domain("shop.example")));
    let monitor = build_monitor(store.clone(), ScriptedJobClient::new());

    let outcome = monitor.resume("shop.example").await.unwrap();
    assert_eq!(outcome.status, ProcessingStatus::Pending);
    assert_eq!(outcome.message, "Domain is not paused");
    assert!(!monitor.registry().is_active("shop.example"));
}

#[tokio::test]
async fn resume_from_paused_runs_to_completion() {
    let mut domain = test_domain("shop.example");
    domain.processing_status = ProcessingStatus::Paused;
    domain.processing_message = "Processing paused by user".to_string();

    let store = Arc::new(MemoryStore::new().with_domain(domain));
    let jobs =
        ScriptedJobClient::new().with_records(vec![archive_record("a1", "Fresh sneakers")]);
    let monitor = build_monitor(store.clone(), jobs);

    let outcome = monitor.resume("shop.example").await.unwrap();
    assert_eq!(outcome.status, ProcessingStatus::FetchingAds);
    wait_for_idle(&monitor, &store, "shop.example").await;

    let (status, _) = store.domain_state("shop.example").unwrap();
    assert_eq!(status, ProcessingStatus::Completed);
    assert_eq!(store.ad_count("shop.example"), 1);
}

#[tokio::test]
async fn pause_without_active_task_is_a_noop() {
    let store = Arc::new(MemoryStore::new().with_domain(test_domain("idle.example")));
    let monitor = build_monitor(store.clone(), ScriptedJobClient::new());

    let outcome = monitor.pause("idle.example").await.unwrap();
    assert_eq!(outcome.status, ProcessingStatus::Pending);
    assert_eq!(outcome.message, "No active task to pause");
    assert!(store.state_log("idle.example").is_empty());
}

// ---------------------------------------------------------------------------
// Cancel / force-complete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_finalizes_as_completed_with_ad_count() {
    let store = Arc::new(
        MemoryStore::new()
            .with_domain(test_domain("shop.example"))
            .with_ad(test_ad("shop.example", "a1", "One"))
            .with_ad(test_ad("shop.example", "a2", "Two"))
            .with_ad(test_ad("shop.example", "a3", "Three")),
    );
    let jobs = ScriptedJobClient::new().with_states(vec![JobState::Running]);
    let monitor = build_monitor(store.clone(), jobs);

    monitor.start("shop.example", true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let outcome = monitor.cancel("shop.example").await.unwrap();
    assert_eq!(outcome.status, ProcessingStatus::Completed);
    assert_eq!(outcome.message, "Scrape cancelled: 3 ads collected");

    // The stopping task must not overwrite the cancel's final state
    tokio::time::sleep(Duration::from_millis(50)).await;
    let (status, message) = store.domain_state("shop.example").unwrap();
    assert_eq!(status, ProcessingStatus::Completed);
    assert_eq!(message, "Scrape cancelled: 3 ads collected");
}

#[tokio::test]
async fn cancel_without_active_task_is_a_noop() {
    let store = Arc::new(MemoryStore::new().with_domain(test_domain("idle.example")));
    let monitor = build_monitor(store.clone(), ScriptedJobClient::new());

    let outcome = monitor.cancel("idle.example").await.unwrap();
    assert_eq!(outcome.message, "No active task to cancel");
    assert_eq!(outcome.status, ProcessingStatus::Pending);
}

#[tokio::test]
async fn force_complete_overrides_a_failed_domain() {
    let mut domain = test_domain("stuck.example");
    domain.processing_status = ProcessingStatus::Failed;
    domain.processing_message = "Scrape job failed: ABORTED".to_string();

    let store = Arc::new(
        MemoryStore::new()
            .with_domain(domain)
            .with_ad(test_ad("stuck.example", "a1", "One")),
    );
    let monitor = build_monitor(store.clone(), ScriptedJobClient::new());

    let outcome = monitor.force_complete("stuck.example").await.unwrap();
    assert_eq!(outcome.status, ProcessingStatus::Completed);
    assert_eq!(outcome.message, "Manually marked complete: 1 ads on record");
}

// ---------------------------------------------------------------------------
// Single-task invariant
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_start_is_a_noop_while_a_run_is_active() {
    let store = Arc::new(MemoryStore::new().with_domain(test_domain("shop.example")));
    let jobs = ScriptedJobClient::new().with_states(vec![JobState::Running]);
    let monitor = build_monitor(store.clone(), jobs);

    monitor.start("shop.example", false).await.unwrap();
    let second = monitor.start("shop.example", false).await.unwrap();

    assert_eq!(second.message, "Domain is already being processed");
    assert_eq!(monitor.registry().live_count(), 1);

    monitor.cancel("shop.example").await.unwrap();
}
