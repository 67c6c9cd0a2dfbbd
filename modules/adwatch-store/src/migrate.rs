use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

/// Create tables and indexes if they don't exist. Idempotent.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS domains (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            monitoring_status TEXT NOT NULL DEFAULT 'active',
            processing_status TEXT NOT NULL DEFAULT 'pending',
            processing_message TEXT NOT NULL DEFAULT '',
            tracking_param TEXT,
            compliance_score DOUBLE PRECISION,
            last_checked_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scraped_ads (
            id UUID PRIMARY KEY,
            domain_name TEXT NOT NULL,
            external_id TEXT NOT NULL UNIQUE,
            headline TEXT,
            primary_text TEXT,
            cta_text TEXT,
            landing_url TEXT,
            media_urls TEXT[] NOT NULL DEFAULT '{}',
            local_media_paths TEXT[] NOT NULL DEFAULT '{}',
            extracted_image_text TEXT,
            extracted_video_text TEXT,
            rac_value TEXT,
            source TEXT NOT NULL DEFAULT 'scraped',
            is_active BOOLEAN NOT NULL DEFAULT true,
            scraped_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_scraped_ads_domain ON scraped_ads (domain_name, scraped_at DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ad_analyses (
            id UUID PRIMARY KEY,
            domain_name TEXT NOT NULL,
            external_id TEXT NOT NULL,
            creative_compliant BOOLEAN NOT NULL,
            creative_reason TEXT NOT NULL DEFAULT '',
            landing_relevant BOOLEAN NOT NULL,
            landing_reason TEXT NOT NULL DEFAULT '',
            keyword_relevant BOOLEAN NOT NULL,
            keyword_reason TEXT NOT NULL DEFAULT '',
            overall_compliant BOOLEAN NOT NULL,
            score INTEGER NOT NULL,
            status TEXT NOT NULL,
            notes TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            UNIQUE (domain_name, external_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS violations (
            id UUID PRIMARY KEY,
            analysis_id UUID NOT NULL REFERENCES ad_analyses (id) ON DELETE CASCADE,
            rule_code TEXT NOT NULL,
            severity TEXT NOT NULL,
            matched_text TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Database migrations complete");
    Ok(())
}
