pub mod migrate;
pub mod pg;

pub use migrate::migrate;
pub use pg::PgStore;

use anyhow::Result;
use async_trait::async_trait;

use adwatch_common::{AdAnalysis, Domain, ProcessingStatus, ScrapedAd, Violation};

/// Persistence contract consumed by the engine. Implemented by `PgStore`
/// and by the engine's in-memory test store.
#[async_trait]
pub trait ComplianceStore: Send + Sync {
    // --- Domains ---

    async fn find_domain(&self, name: &str) -> Result<Option<Domain>>;

    async fn upsert_domain(&self, domain: &Domain) -> Result<()>;

    /// Write processing status and message in one statement. Every
    /// transition goes through here so the two can never drift apart.
    async fn set_processing_state(
        &self,
        name: &str,
        status: ProcessingStatus,
        message: &str,
    ) -> Result<()>;

    async fn set_tracking_param(&self, name: &str, param: Option<&str>) -> Result<()>;

    /// Record the aggregate score and bump `last_checked_at`.
    async fn record_check_result(&self, name: &str, score: Option<f64>) -> Result<()>;

    // --- Scraped ads ---

    async fn find_ad(&self, external_id: &str) -> Result<Option<ScrapedAd>>;

    async fn insert_ad(&self, ad: &ScrapedAd) -> Result<()>;

    /// Update mutable presentation fields only. Enrichment fields
    /// (extracted media text, rac_value) are never touched here.
    async fn update_ad_presentation(&self, ad: &ScrapedAd) -> Result<()>;

    /// Most-recent-first ads for a domain.
    async fn list_ads(&self, domain: &str, limit: i64) -> Result<Vec<ScrapedAd>>;

    async fn count_ads(&self, domain: &str) -> Result<i64>;

    /// True when the domain has any row tagged `source = scraped`.
    /// Guards the fresh-run purge against destroying genuine data.
    async fn has_scraped_ads(&self, domain: &str) -> Result<bool>;

    /// Delete all ads and analyses for a domain.
    async fn purge_domain_data(&self, domain: &str) -> Result<()>;

    // --- Analyses ---

    /// Delete any prior analysis for (domain, external id), then insert the
    /// new one, in a single transaction. An analysis row is always a
    /// complete snapshot.
    async fn replace_analysis(&self, analysis: &AdAnalysis) -> Result<()>;

    async fn find_analysis(&self, domain: &str, external_id: &str)
        -> Result<Option<AdAnalysis>>;

    async fn list_analyses(&self, domain: &str) -> Result<Vec<AdAnalysis>>;

    /// Mean of the legacy per-ad scores across all live analyses.
    async fn mean_ad_score(&self, domain: &str) -> Result<Option<f64>>;

    // --- Violations ---

    async fn insert_violation(&self, violation: &Violation) -> Result<()>;
}
