use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};

use adwatch_common::{
    AdAnalysis, AdSource, AnalysisStatus, Domain, MonitoringStatus, ProcessingStatus, ScrapedAd,
    Violation,
};

use crate::ComplianceStore;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ComplianceStore for PgStore {
    async fn find_domain(&self, name: &str) -> Result<Option<Domain>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, monitoring_status, processing_status, processing_message,
                   tracking_param, compliance_score, last_checked_at, created_at
            FROM domains
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_domain))
    }

    async fn upsert_domain(&self, domain: &Domain) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO domains (id, name, monitoring_status, processing_status,
                                 processing_message, tracking_param, compliance_score,
                                 last_checked_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (name) DO UPDATE SET
                monitoring_status = EXCLUDED.monitoring_status,
                tracking_param = EXCLUDED.tracking_param
            "#,
        )
        .bind(domain.id)
        .bind(&domain.name)
        .bind(domain.monitoring_status.to_string())
        .bind(domain.processing_status.to_string())
        .bind(&domain.processing_message)
        .bind(&domain.tracking_param)
        .bind(domain.compliance_score)
        .bind(domain.last_checked_at)
        .bind(domain.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_processing_state(
        &self,
        name: &str,
        status: ProcessingStatus,
        message: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE domains SET processing_status = $2, processing_message = $3 WHERE name = $1",
        )
        .bind(name)
        .bind(status.to_string())
        .bind(message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_tracking_param(&self, name: &str, param: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE domains SET tracking_param = $2 WHERE name = $1")
            .bind(name)
            .bind(param)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn record_check_result(&self, name: &str, score: Option<f64>) -> Result<()> {
        sqlx::query(
            "UPDATE domains SET compliance_score = $2, last_checked_at = $3 WHERE name = $1",
        )
        .bind(name)
        .bind(score)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_ad(&self, external_id: &str) -> Result<Option<ScrapedAd>> {
        let row = sqlx::query(&format!("{AD_COLUMNS} WHERE external_id = $1"))
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(row_to_ad))
    }

    async fn insert_ad(&self, ad: &ScrapedAd) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scraped_ads (id, domain_name, external_id, headline, primary_text,
                                     cta_text, landing_url, media_urls, local_media_paths,
                                     extracted_image_text, extracted_video_text, rac_value,
                                     source, is_active, scraped_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(ad.id)
        .bind(&ad.domain_name)
        .bind(&ad.external_id)
        .bind(&ad.headline)
        .bind(&ad.primary_text)
        .bind(&ad.cta_text)
        .bind(&ad.landing_url)
        .bind(&ad.media_urls)
        .bind(&ad.local_media_paths)
        .bind(&ad.extracted_image_text)
        .bind(&ad.extracted_video_text)
        .bind(&ad.rac_value)
        .bind(ad.source.to_string())
        .bind(ad.is_active)
        .bind(ad.scraped_at)
        .bind(ad.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_ad_presentation(&self, ad: &ScrapedAd) -> Result<()> {
        // Enrichment columns deliberately absent from the SET list.
        sqlx::query(
            r#"
            UPDATE scraped_ads
            SET headline = $2, primary_text = $3, cta_text = $4, landing_url = $5,
                media_urls = $6, is_active = $7, updated_at = $8
            WHERE external_id = $1
            "#,
        )
        .bind(&ad.external_id)
        .bind(&ad.headline)
        .bind(&ad.primary_text)
        .bind(&ad.cta_text)
        .bind(&ad.landing_url)
        .bind(&ad.media_urls)
        .bind(ad.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_ads(&self, domain: &str, limit: i64) -> Result<Vec<ScrapedAd>> {
        let rows = sqlx::query(&format!(
            "{AD_COLUMNS} WHERE domain_name = $1 ORDER BY scraped_at DESC LIMIT $2"
        ))
        .bind(domain)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_ad).collect())
    }

    async fn count_ads(&self, domain: &str) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM scraped_ads WHERE domain_name = $1",
        )
        .bind(domain)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn has_scraped_ads(&self, domain: &str) -> Result<bool> {
        let row = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS (SELECT 1 FROM scraped_ads WHERE domain_name = $1 AND source = 'scraped')",
        )
        .bind(domain)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn purge_domain_data(&self, domain: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM ad_analyses WHERE domain_name = $1")
            .bind(domain)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM scraped_ads WHERE domain_name = $1")
            .bind(domain)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn replace_analysis(&self, analysis: &AdAnalysis) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM ad_analyses WHERE domain_name = $1 AND external_id = $2")
            .bind(&analysis.domain_name)
            .bind(&analysis.external_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO ad_analyses (id, domain_name, external_id,
                                     creative_compliant, creative_reason,
                                     landing_relevant, landing_reason,
                                     keyword_relevant, keyword_reason,
                                     overall_compliant, score, status, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(analysis.id)
        .bind(&analysis.domain_name)
        .bind(&analysis.external_id)
        .bind(analysis.creative_compliant)
        .bind(&analysis.creative_reason)
        .bind(analysis.landing_relevant)
        .bind(&analysis.landing_reason)
        .bind(analysis.keyword_relevant)
        .bind(&analysis.keyword_reason)
        .bind(analysis.overall_compliant)
        .bind(analysis.score)
        .bind(analysis.status.to_string())
        .bind(&analysis.notes)
        .bind(analysis.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_analysis(
        &self,
        domain: &str,
        external_id: &str,
    ) -> Result<Option<AdAnalysis>> {
        let row = sqlx::query(&format!(
            "{ANALYSIS_COLUMNS} WHERE domain_name = $1 AND external_id = $2"
        ))
        .bind(domain)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_analysis))
    }

    async fn list_analyses(&self, domain: &str) -> Result<Vec<AdAnalysis>> {
        let rows = sqlx::query(&format!(
            "{ANALYSIS_COLUMNS} WHERE domain_name = $1 ORDER BY created_at DESC"
        ))
        .bind(domain)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_analysis).collect())
    }

    async fn mean_ad_score(&self, domain: &str) -> Result<Option<f64>> {
        let row = sqlx::query_as::<_, (Option<f64>,)>(
            "SELECT AVG(score::double precision) FROM ad_analyses WHERE domain_name = $1",
        )
        .bind(domain)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn insert_violation(&self, violation: &Violation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO violations (id, analysis_id, rule_code, severity, matched_text, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(violation.id)
        .bind(violation.analysis_id)
        .bind(&violation.rule_code)
        .bind(violation.severity.to_string())
        .bind(&violation.matched_text)
        .bind(violation.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Internal
// ---------------------------------------------------------------------------

const AD_COLUMNS: &str = r#"
    SELECT id, domain_name, external_id, headline, primary_text, cta_text,
           landing_url, media_urls, local_media_paths, extracted_image_text,
           extracted_video_text, rac_value, source, is_active, scraped_at, updated_at
    FROM scraped_ads
"#;

const ANALYSIS_COLUMNS: &str = r#"
    SELECT id, domain_name, external_id, creative_compliant, creative_reason,
           landing_relevant, landing_reason, keyword_relevant, keyword_reason,
           overall_compliant, score, status, notes, created_at
    FROM ad_analyses
"#;

fn row_to_domain(r: sqlx::postgres::PgRow) -> Domain {
    Domain {
        id: r.get("id"),
        name: r.get("name"),
        monitoring_status: MonitoringStatus::from_str_loose(r.get::<String, _>("monitoring_status").as_str()),
        processing_status: ProcessingStatus::from_str_loose(r.get::<String, _>("processing_status").as_str()),
        processing_message: r.get("processing_message"),
        tracking_param: r.get("tracking_param"),
        compliance_score: r.get("compliance_score"),
        last_checked_at: r.get("last_checked_at"),
        created_at: r.get("created_at"),
    }
}

fn row_to_ad(r: sqlx::postgres::PgRow) -> ScrapedAd {
    ScrapedAd {
        id: r.get("id"),
        domain_name: r.get("domain_name"),
        external_id: r.get("external_id"),
        headline: r.get("headline"),
        primary_text: r.get("primary_text"),
        cta_text: r.get("cta_text"),
        landing_url: r.get("landing_url"),
        media_urls: r.get("media_urls"),
        local_media_paths: r.get("local_media_paths"),
        extracted_image_text: r.get("extracted_image_text"),
        extracted_video_text: r.get("extracted_video_text"),
        rac_value: r.get("rac_value"),
        source: AdSource::from_str_loose(r.get::<String, _>("source").as_str()),
        is_active: r.get("is_active"),
        scraped_at: r.get("scraped_at"),
        updated_at: r.get("updated_at"),
    }
}

fn row_to_analysis(r: sqlx::postgres::PgRow) -> AdAnalysis {
    AdAnalysis {
        id: r.get("id"),
        domain_name: r.get("domain_name"),
        external_id: r.get("external_id"),
        creative_compliant: r.get("creative_compliant"),
        creative_reason: r.get("creative_reason"),
        landing_relevant: r.get("landing_relevant"),
        landing_reason: r.get("landing_reason"),
        keyword_relevant: r.get("keyword_relevant"),
        keyword_reason: r.get("keyword_reason"),
        overall_compliant: r.get("overall_compliant"),
        score: r.get("score"),
        status: AnalysisStatus::from_str_loose(r.get::<String, _>("status").as_str()),
        notes: r.get("notes"),
        created_at: r.get("created_at"),
    }
}
