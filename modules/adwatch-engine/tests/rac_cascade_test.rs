//! Cascade-order tests for the keyword resolver against a scripted page
//! fetcher.

use std::sync::Arc;

use adwatch_engine::rac::RacResolver;
use adwatch_engine::testing::MockPageFetcher;

#[tokio::test]
async fn configured_parameter_wins_over_generic_probe() {
    let fetcher = Arc::new(MockPageFetcher::new());
    let calls = fetcher.clone();
    let resolver = RacResolver::new(fetcher);

    let value = resolver
        .resolve(
            "shop.example",
            "https://shop.example/lp?rac=blue+sneakers&q=generic",
            Some("rac"),
        )
        .await;

    assert_eq!(value.as_deref(), Some("blue sneakers"));
    // Strategy 1 hit, so no page was ever fetched
    assert_eq!(calls.fetch_count(), 0);
}

#[tokio::test]
async fn auto_detected_parameter_is_cached_per_domain() {
    let sample_html = r#"<script>
        const params = new URLSearchParams(window.location.search);
        var searchKeyword = params.get('ref_kw');
    </script>"#;
    let fetcher = Arc::new(
        MockPageFetcher::new().on_html("https://shop.example/", sample_html),
    );
    let calls = fetcher.clone();
    let resolver = RacResolver::new(fetcher);

    let first = resolver
        .resolve(
            "shop.example",
            "https://shop.example/lp?ref_kw=trail+shoes",
            None,
        )
        .await;
    assert_eq!(first.as_deref(), Some("trail shoes"));
    let fetches_after_first = calls.fetch_count();

    // Second resolution reads the cached parameter name without refetching
    // the sample page
    let second = resolver
        .resolve(
            "shop.example",
            "https://shop.example/lp?ref_kw=road+shoes",
            None,
        )
        .await;
    assert_eq!(second.as_deref(), Some("road shoes"));
    assert_eq!(calls.fetch_count(), fetches_after_first);
}

#[tokio::test]
async fn generic_probe_is_reached_when_detection_finds_nothing() {
    let fetcher = Arc::new(MockPageFetcher::new());
    let resolver = RacResolver::new(fetcher);

    let value = resolver
        .resolve(
            "shop.example",
            "https://shop.example/lp?utm_term=hiking+poles",
            None,
        )
        .await;

    assert_eq!(value.as_deref(), Some("hiking poles"));
}

#[tokio::test]
async fn content_heuristics_are_the_last_resort() {
    let landing_html =
        "<html><head><title>Insulated camping tents</title></head><body></body></html>";
    let fetcher = Arc::new(
        MockPageFetcher::new().on_html("https://shop.example/lp", landing_html),
    );
    let resolver = RacResolver::new(fetcher);

    let value = resolver
        .resolve("shop.example", "https://shop.example/lp", None)
        .await;

    assert_eq!(value.as_deref(), Some("Insulated camping tents"));
}

#[tokio::test]
async fn every_strategy_failing_yields_none() {
    let fetcher = Arc::new(MockPageFetcher::new());
    let resolver = RacResolver::new(fetcher);

    let value = resolver
        .resolve("shop.example", "https://shop.example/lp?id=12345", None)
        .await;

    assert!(value.is_none());
}
