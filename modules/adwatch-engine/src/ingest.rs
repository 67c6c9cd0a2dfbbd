use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use adwatch_common::{AdSource, ScrapedAd};
use adwatch_store::ComplianceStore;
use apify_client::AdArchiveRecord;

/// Map one raw archive record into a ScrapedAd candidate. Returns `None`
/// for rows with no usable creative text — the dataset mixes ads with
/// page-info and summary rows.
pub fn map_record(domain: &str, record: &AdArchiveRecord) -> Option<ScrapedAd> {
    if !record.has_creative_text() {
        debug!(domain, "Skipping dataset row without creative text");
        return None;
    }

    let snapshot = record.snapshot.as_ref();
    let external_id = match record.ad_archive_id.as_deref() {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => synthesize_external_id(domain),
    };

    let mut media_urls = Vec::new();
    if let Some(snap) = snapshot {
        media_urls.extend(
            snap.images
                .iter()
                .filter_map(|i| i.original_image_url.clone().or_else(|| i.resized_image_url.clone())),
        );
        media_urls.extend(snap.videos.iter().filter_map(|v| v.video_hd_url.clone()));
    }

    let now = Utc::now();
    Some(ScrapedAd {
        id: Uuid::new_v4(),
        domain_name: domain.to_string(),
        external_id,
        headline: snapshot.and_then(|s| s.title.clone()),
        primary_text: record.body_text().map(String::from),
        cta_text: snapshot.and_then(|s| s.cta_text.clone()),
        landing_url: snapshot.and_then(|s| s.link_url.clone()),
        media_urls,
        local_media_paths: Vec::new(),
        extracted_image_text: None,
        extracted_video_text: None,
        rac_value: None,
        source: AdSource::Scraped,
        is_active: record.is_active.unwrap_or(true),
        scraped_at: now,
        updated_at: now,
    })
}

/// Archive records occasionally lack a stable id. Synthesize one from the
/// domain, the current time, and a random suffix rather than dropping the ad.
fn synthesize_external_id(domain: &str) -> String {
    let suffix: u32 = rand::rng().random_range(0..0xff_ffff);
    format!("{domain}-{}-{suffix:06x}", Utc::now().timestamp_millis())
}

/// Idempotently upsert a batch of candidates. Existing rows (matched by
/// external id) get only their presentation fields refreshed; enrichment
/// fields stay as they are. Returns how many rows were written.
pub async fn ingest_batch(store: &dyn ComplianceStore, candidates: Vec<ScrapedAd>) -> Result<usize> {
    let mut written = 0usize;

    for candidate in candidates {
        match store.find_ad(&candidate.external_id).await? {
            Some(_) => {
                store.update_ad_presentation(&candidate).await?;
            }
            None => {
                store.insert_ad(&candidate).await?;
            }
        }
        written += 1;
    }

    info!(written, "Ingested scraped ads");
    Ok(written)
}

/// Clear a domain's prior ads and analyses ahead of a fresh run.
///
/// Seed runs are a no-op when the domain already holds genuinely scraped
/// rows: placeholder data must never destroy real data.
pub async fn prepare_fresh_run(
    store: &dyn ComplianceStore,
    domain: &str,
    seed: bool,
) -> Result<()> {
    if seed && store.has_scraped_ads(domain).await? {
        info!(domain, "Seed run requested but scraped data exists, keeping rows");
        return Ok(());
    }

    store.purge_domain_data(domain).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use apify_client::{AdSnapshot, BodyText};

    fn record_with_body(id: Option<&str>, text: &str) -> AdArchiveRecord {
        AdArchiveRecord {
            ad_archive_id: id.map(String::from),
            snapshot: Some(AdSnapshot {
                body: Some(BodyText {
                    text: Some(text.to_string()),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn textless_record_is_skipped() {
        let record = AdArchiveRecord::default();
        assert!(map_record("shop.example", &record).is_none());
    }

    #[test]
    fn record_keeps_archive_id() {
        let record = record_with_body(Some("123456"), "Great shoes, buy now");
        let ad = map_record("shop.example", &record).unwrap();
        assert_eq!(ad.external_id, "123456");
        assert_eq!(ad.primary_text.as_deref(), Some("Great shoes, buy now"));
        assert_eq!(ad.domain_name, "shop.example");
    }

    #[test]
    fn missing_id_is_synthesized() {
        let record = record_with_body(None, "Great shoes");
        let ad = map_record("shop.example", &record).unwrap();
        assert!(ad.external_id.starts_with("shop.example-"));

        // Two synthesized ids must not collide
        let other = map_record("shop.example", &record).unwrap();
        assert_ne!(ad.external_id, other.external_id);
    }

    #[test]
    fn blank_id_is_synthesized() {
        let record = record_with_body(Some("  "), "Great shoes");
        let ad = map_record("shop.example", &record).unwrap();
        assert!(ad.external_id.starts_with("shop.example-"));
    }

    #[test]
    fn enrichment_fields_start_empty() {
        let record = record_with_body(Some("1"), "text");
        let ad = map_record("shop.example", &record).unwrap();
        assert!(ad.extracted_image_text.is_none());
        assert!(ad.extracted_video_text.is_none());
        assert!(ad.rac_value.is_none());
    }
}
