//! Compliance pipeline tests: batch isolation, judge-failure degradation,
//! persistence fallback, keyword gating and aggregate scoring.

use std::sync::Arc;

use adwatch_engine::analysis::CompliancePipeline;
use adwatch_engine::testing::{
    test_ad, test_domain, test_domain_with_param, MemoryStore, MockPageFetcher, ScriptedJudge,
};
use adwatch_store::ComplianceStore;

fn pipeline(
    store: Arc<MemoryStore>,
    judge: Arc<ScriptedJudge>,
    fetcher: Arc<MockPageFetcher>,
) -> CompliancePipeline {
    CompliancePipeline::new(store, judge, fetcher)
}

#[tokio::test]
async fn analyze_is_total_when_the_judge_fails() {
    let store = Arc::new(MemoryStore::new());
    let judge = Arc::new(ScriptedJudge::new().failing_for("poison"));
    let fetcher = Arc::new(MockPageFetcher::new());
    let pipeline = pipeline(store, judge, fetcher);

    let domain = test_domain("shop.example");
    let ad = test_ad("shop.example", "a1", "poison pill creative");

    let analysis = pipeline.analyze(&ad, &domain).await;
    assert!(!analysis.overall_compliant);
    assert!(!analysis.creative_compliant);
    assert!(!analysis.landing_relevant);
    assert_eq!(analysis.score, 0);
    assert!(analysis
        .notes
        .as_deref()
        .is_some_and(|n| n.contains("AI judgment failed")));
}

#[tokio::test]
async fn one_failing_ad_does_not_affect_the_rest_of_the_batch() {
    let store = Arc::new(MemoryStore::new().with_domain(test_domain("shop.example")));
    let store_rows = store.clone();
    let judge = Arc::new(ScriptedJudge::new().failing_for("broken"));
    let fetcher = Arc::new(MockPageFetcher::new());

    for (id, text) in [
        ("a1", "Good ad one"),
        ("a2", "Good ad two"),
        ("a3", "broken creative"),
        ("a4", "Good ad four"),
        ("a5", "Good ad five"),
    ] {
        store.insert_ad(&test_ad("shop.example", id, text)).await.unwrap();
    }

    let pipeline = pipeline(store, judge, fetcher);
    let domain = test_domain("shop.example");

    let processed = pipeline.run_batch(&domain).await.unwrap();
    assert_eq!(processed, 5);

    let failed = store_rows.analysis("shop.example", "a3").unwrap();
    assert!(!failed.overall_compliant);
    assert!(failed.keyword_reason.contains("turned off") || failed.notes.is_some());
    assert!(failed.notes.is_some());

    for id in ["a1", "a2", "a4", "a5"] {
        let analysis = store_rows.analysis("shop.example", id).unwrap();
        assert!(analysis.overall_compliant, "ad {id} should be unaffected");
        assert_eq!(analysis.score, 100);
    }

    // 4 × 100 + 1 × 0
    assert_eq!(store_rows.domain_score("shop.example"), Some(80.0));
}

#[tokio::test]
async fn disabled_keyword_check_pins_the_axis_and_skips_the_cascade() {
    let store = Arc::new(MemoryStore::new().with_domain(test_domain("shop.example")));
    let judge = Arc::new(ScriptedJudge::new());
    let fetcher = Arc::new(
        MockPageFetcher::new().on_text("https://shop.example/lp", "Landing page about shoes"),
    );
    let judge_log = judge.clone();
    let fetcher_calls = fetcher.clone();
    let pipeline = pipeline(store.clone(), judge, fetcher);

    // No tracking_param → keyword checking disabled
    let domain = test_domain("shop.example");
    let mut ad = test_ad("shop.example", "a1", "Buy shoes");
    ad.landing_url = Some("https://shop.example/lp".to_string());
    store.insert_ad(&ad).await.unwrap();

    pipeline.run_batch(&domain).await.unwrap();

    let analysis = store.analysis("shop.example", "a1").unwrap();
    assert!(analysis.keyword_relevant);
    assert!(analysis.keyword_reason.contains("turned off"));

    // Exactly one fetch: the landing page text. The extraction cascade
    // never ran.
    assert_eq!(fetcher_calls.fetch_count(), 1);

    let requests = judge_log.requests();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].keyword_check_enabled);
    assert!(requests[0].keyword_value.is_none());
}

#[tokio::test]
async fn enabled_keyword_check_resolves_the_value_from_the_landing_url() {
    let store = Arc::new(
        MemoryStore::new().with_domain(test_domain_with_param("shop.example", "rac")),
    );
    let judge = Arc::new(ScriptedJudge::new());
    let fetcher = Arc::new(MockPageFetcher::new());
    let judge_log = judge.clone();
    let pipeline = pipeline(store.clone(), judge, fetcher);

    let domain = test_domain_with_param("shop.example", "rac");
    let mut ad = test_ad("shop.example", "a1", "Buy running shoes");
    ad.landing_url = Some("https://shop.example/lp?rac=running+shoes&q=generic".to_string());
    store.insert_ad(&ad).await.unwrap();

    pipeline.run_batch(&domain).await.unwrap();

    let requests = judge_log.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].keyword_check_enabled);
    // The configured parameter wins over the generic "q" probe
    assert_eq!(requests[0].keyword_value.as_deref(), Some("running shoes"));
}

#[tokio::test]
async fn full_save_failure_falls_back_to_a_minimal_record() {
    let store = Arc::new(
        MemoryStore::new()
            .with_domain(test_domain("shop.example"))
            .failing_full_analysis_saves(),
    );
    let judge = Arc::new(ScriptedJudge::new());
    let fetcher = Arc::new(MockPageFetcher::new());
    let pipeline = pipeline(store.clone(), judge, fetcher);

    let domain = test_domain("shop.example");
    let ad = test_ad("shop.example", "a1", "Fine creative");

    let analysis = pipeline.process_ad(&ad, &domain).await.unwrap();
    assert!(!analysis.overall_compliant);
    assert!(analysis
        .notes
        .as_deref()
        .is_some_and(|n| n.contains("Failed to save analysis")));

    // The fallback row is what got persisted
    let stored = store.analysis("shop.example", "a1").unwrap();
    assert!(!stored.overall_compliant);
    assert!(stored.notes.is_some());
}

#[tokio::test]
async fn aggregate_score_is_the_mean_of_legacy_scores() {
    let store = Arc::new(MemoryStore::new().with_domain(test_domain("shop.example")));
    let judge = Arc::new(ScriptedJudge::new().non_compliant_for("sketchy"));
    let fetcher = Arc::new(MockPageFetcher::new());
    let pipeline = pipeline(store.clone(), judge, fetcher);

    store
        .insert_ad(&test_ad("shop.example", "a1", "Honest ad"))
        .await
        .unwrap();
    store
        .insert_ad(&test_ad("shop.example", "a2", "sketchy miracle cure"))
        .await
        .unwrap();

    let domain = test_domain("shop.example");
    pipeline.run_batch(&domain).await.unwrap();

    assert_eq!(store.domain_score("shop.example"), Some(50.0));
}

#[tokio::test]
async fn reanalysis_replaces_the_prior_row() {
    let store = Arc::new(MemoryStore::new().with_domain(test_domain("shop.example")));
    let judge = Arc::new(ScriptedJudge::new());
    let fetcher = Arc::new(MockPageFetcher::new());
    let pipeline = pipeline(store.clone(), judge, fetcher);

    let domain = test_domain("shop.example");
    store
        .insert_ad(&test_ad("shop.example", "a1", "Same ad"))
        .await
        .unwrap();

    pipeline.run_batch(&domain).await.unwrap();
    pipeline.run_batch(&domain).await.unwrap();

    assert_eq!(store.analysis_count("shop.example"), 1);
}

#[tokio::test]
async fn rule_hits_are_recorded_as_violations() {
    let store = Arc::new(MemoryStore::new().with_domain(test_domain("shop.example")));
    let judge = Arc::new(ScriptedJudge::new());
    let fetcher = Arc::new(MockPageFetcher::new());
    let pipeline = pipeline(store.clone(), judge, fetcher);

    let domain = test_domain("shop.example");
    let ad = test_ad(
        "shop.example",
        "a1",
        "Act now! Guaranteed results in one week.",
    );

    pipeline.process_ad(&ad, &domain).await.unwrap();
    assert_eq!(store.violation_count(), 2);
}
