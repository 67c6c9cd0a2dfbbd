use std::sync::Arc;
use std::sync::OnceLock;

use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use regex::Regex;
use tracing::{error, info, warn};
use uuid::Uuid;

use adwatch_common::{AdAnalysis, AnalysisStatus, Domain, ScrapedAd, Violation};
use adwatch_store::ComplianceStore;

use crate::fetcher::PageFetcher;
use crate::judge::{ComplianceJudge, JudgeOutcome, JudgeRequest};
use crate::rac::RacResolver;
use crate::rules::{self, RuleDefinition};

/// A domain-level run analyzes a bounded most-recent-first prefix of ads.
const MAX_ADS_PER_RUN: i64 = 20;

/// Ads within a batch are independent rows; analyze a few at a time.
const MAX_CONCURRENT_ANALYSES: usize = 4;

const LANDING_FETCH_FAILED: &str = "Could not fetch landing page content.";
const KEYWORD_CHECK_OFF_REASON: &str = "Keyword check turned off for this domain.";

/// Scans a domain's ads for compliance: composite ad text, landing page,
/// keyword resolution, AI judgment, rule catalog, persistence.
pub struct CompliancePipeline {
    store: Arc<dyn ComplianceStore>,
    judge: Arc<dyn ComplianceJudge>,
    fetcher: Arc<dyn PageFetcher>,
    resolver: RacResolver,
    rules: Vec<RuleDefinition>,
}

impl CompliancePipeline {
    pub fn new(
        store: Arc<dyn ComplianceStore>,
        judge: Arc<dyn ComplianceJudge>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            store,
            judge,
            fetcher: fetcher.clone(),
            resolver: RacResolver::new(fetcher),
            rules: rules::default_catalog(),
        }
    }

    pub fn with_rules(mut self, rules: Vec<RuleDefinition>) -> Self {
        self.rules = rules;
        self
    }

    /// Analyze one ad. Total: every code path yields a complete
    /// `AdAnalysis`, including judge failure.
    pub async fn analyze(&self, ad: &ScrapedAd, domain: &Domain) -> AdAnalysis {
        let ad_text = composite_ad_text(ad);

        let landing_page_text = match ad.landing_url.as_deref() {
            Some(url) => match self.fetcher.fetch_text(url).await {
                Ok(Some(text)) => text,
                Ok(None) => LANDING_FETCH_FAILED.to_string(),
                Err(e) => {
                    warn!(url, error = %e, "Landing page fetch failed");
                    LANDING_FETCH_FAILED.to_string()
                }
            },
            None => "Ad has no landing page URL.".to_string(),
        };

        let keyword_check_enabled = domain.tracking_param.is_some();
        let keyword_value = if keyword_check_enabled {
            match (ad.rac_value.clone(), ad.landing_url.as_deref()) {
                (Some(value), _) => Some(value),
                (None, Some(url)) => {
                    self.resolver
                        .resolve(&domain.name, url, domain.tracking_param.as_deref())
                        .await
                }
                (None, None) => None,
            }
        } else {
            None
        };

        let request = JudgeRequest {
            ad_text,
            landing_page_text,
            keyword_value,
            keyword_check_enabled,
        };

        let mut analysis = match self.judge.evaluate(&request).await {
            JudgeOutcome::Verdict(verdict) => {
                let overall = verdict.overall_compliant;
                AdAnalysis {
                    id: Uuid::new_v4(),
                    domain_name: domain.name.clone(),
                    external_id: ad.external_id.clone(),
                    creative_compliant: verdict.ad_creative.passed,
                    creative_reason: verdict.ad_creative.reason,
                    landing_relevant: verdict.landing_page.passed,
                    landing_reason: verdict.landing_page.reason,
                    keyword_relevant: verdict.keyword.passed,
                    keyword_reason: verdict.keyword.reason,
                    overall_compliant: overall,
                    score: AdAnalysis::legacy_score(overall),
                    status: if overall {
                        AnalysisStatus::Compliant
                    } else {
                        AnalysisStatus::NonCompliant
                    },
                    notes: None,
                    created_at: Utc::now(),
                }
            }
            JudgeOutcome::Failed { reason } => failed_analysis(domain, ad, &reason),
        };

        // The disabled axis is pinned regardless of what the judge said,
        // and the overall verdict is recomputed from the other two.
        if !keyword_check_enabled {
            analysis.keyword_relevant = true;
            analysis.keyword_reason = KEYWORD_CHECK_OFF_REASON.to_string();
            if analysis.notes.is_none() {
                let overall = analysis.creative_compliant && analysis.landing_relevant;
                analysis.overall_compliant = overall;
                analysis.score = AdAnalysis::legacy_score(overall);
                analysis.status = if overall {
                    AnalysisStatus::Compliant
                } else {
                    AnalysisStatus::NonCompliant
                };
            }
        }

        analysis
    }

    /// Analyze and persist one ad. A full-save failure falls back to a
    /// minimal non-compliant record; only a second failure escalates, and
    /// then only for this ad.
    pub async fn process_ad(&self, ad: &ScrapedAd, domain: &Domain) -> Result<AdAnalysis> {
        let analysis = self.analyze(ad, domain).await;

        if let Err(e) = self.store.replace_analysis(&analysis).await {
            error!(
                domain = domain.name,
                external_id = ad.external_id,
                error = %e,
                "Failed to persist analysis, writing fallback record"
            );
            let fallback = failed_analysis(domain, ad, &format!("Failed to save analysis: {e}"));
            self.store.replace_analysis(&fallback).await?;
            return Ok(fallback);
        }

        for hit in rules::scan(&self.rules, &composite_ad_text(ad)) {
            let violation = Violation {
                id: Uuid::new_v4(),
                analysis_id: analysis.id,
                rule_code: hit.rule_code,
                severity: hit.severity,
                matched_text: hit.matched_text,
                created_at: Utc::now(),
            };
            if let Err(e) = self.store.insert_violation(&violation).await {
                warn!(
                    domain = domain.name,
                    rule = violation.rule_code,
                    error = %e,
                    "Failed to record rule violation"
                );
            }
        }

        Ok(analysis)
    }

    /// Run one analysis batch for a domain and recompute its aggregate
    /// score. One ad's failure never affects the others. Returns the number
    /// of ads analyzed.
    pub async fn run_batch(&self, domain: &Domain) -> Result<usize> {
        let ads = self.store.list_ads(&domain.name, MAX_ADS_PER_RUN).await?;
        info!(domain = domain.name, count = ads.len(), "Starting analysis batch");

        let futures: Vec<_> = ads
            .iter()
            .map(|ad| async move { (ad, self.process_ad(ad, domain).await) })
            .collect();
        let results: Vec<_> = stream::iter(futures)
            .buffer_unordered(MAX_CONCURRENT_ANALYSES)
            .collect()
            .await;

        let mut processed = 0usize;
        for (ad, result) in results {
            match result {
                Ok(_) => processed += 1,
                Err(e) => {
                    error!(
                        domain = domain.name,
                        external_id = ad.external_id,
                        error = %e,
                        "Ad analysis could not be persisted"
                    );
                }
            }
        }

        let mean = self.store.mean_ad_score(&domain.name).await?;
        self.store.record_check_result(&domain.name, mean).await?;
        info!(domain = domain.name, processed, score = ?mean, "Analysis batch finished");

        Ok(processed)
    }
}

/// Complete non-compliant analysis carrying a failure note. Used both for
/// judge failures and as the minimal persistence fallback.
fn failed_analysis(domain: &Domain, ad: &ScrapedAd, reason: &str) -> AdAnalysis {
    AdAnalysis {
        id: Uuid::new_v4(),
        domain_name: domain.name.clone(),
        external_id: ad.external_id.clone(),
        creative_compliant: false,
        creative_reason: reason.to_string(),
        landing_relevant: false,
        landing_reason: reason.to_string(),
        keyword_relevant: false,
        keyword_reason: reason.to_string(),
        overall_compliant: false,
        score: AdAnalysis::legacy_score(false),
        status: AnalysisStatus::NonCompliant,
        notes: Some(reason.to_string()),
        created_at: Utc::now(),
    }
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("invalid placeholder regex")
    })
}

/// Turn catalog-template placeholders like `{{product.name}}` into
/// human-readable bracketed tokens like `[product name]` so the judge sees
/// intent instead of template syntax.
pub fn normalize_placeholders(text: &str) -> String {
    placeholder_regex()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            format!("[{}]", caps[1].replace(['.', '_'], " "))
        })
        .into_owned()
}

/// Composite blob the judge sees: headline + body, then media-extracted
/// text sections only when they exist.
pub fn composite_ad_text(ad: &ScrapedAd) -> String {
    let mut sections = Vec::new();

    let mut creative = String::new();
    if let Some(headline) = ad.headline.as_deref() {
        creative.push_str(&normalize_placeholders(headline));
    }
    if let Some(body) = ad.primary_text.as_deref() {
        if !creative.is_empty() {
            creative.push_str("\n\n");
        }
        creative.push_str(&normalize_placeholders(body));
    }
    if let Some(cta) = ad.cta_text.as_deref() {
        if !cta.trim().is_empty() {
            if !creative.is_empty() {
                creative.push('\n');
            }
            creative.push_str("CTA: ");
            creative.push_str(cta);
        }
    }
    sections.push(creative);

    if let Some(image_text) = ad.extracted_image_text.as_deref() {
        if !image_text.trim().is_empty() {
            sections.push(format!("IMAGE TEXT:\n{image_text}"));
        }
    }
    if let Some(video_text) = ad.extracted_video_text.as_deref() {
        if !video_text.trim().is_empty() {
            sections.push(format!("VIDEO CONTENT:\n{video_text}"));
        }
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use adwatch_common::AdSource;

    fn ad_with(
        headline: Option<&str>,
        body: Option<&str>,
        image_text: Option<&str>,
        video_text: Option<&str>,
    ) -> ScrapedAd {
        let now = Utc::now();
        ScrapedAd {
            id: Uuid::new_v4(),
            domain_name: "shop.example".to_string(),
            external_id: "1".to_string(),
            headline: headline.map(String::from),
            primary_text: body.map(String::from),
            cta_text: None,
            landing_url: None,
            media_urls: Vec::new(),
            local_media_paths: Vec::new(),
            extracted_image_text: image_text.map(String::from),
            extracted_video_text: video_text.map(String::from),
            rac_value: None,
            source: AdSource::Scraped,
            is_active: true,
            scraped_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn placeholders_become_bracketed_tokens() {
        assert_eq!(
            normalize_placeholders("Get {{product.name}} for {{ product.price }}!"),
            "Get [product name] for [product price]!"
        );
    }

    #[test]
    fn text_without_placeholders_is_untouched() {
        assert_eq!(normalize_placeholders("Plain text"), "Plain text");
    }

    #[test]
    fn composite_text_skips_empty_media_sections() {
        let ad = ad_with(Some("Headline"), Some("Body"), None, Some("   "));
        let text = composite_ad_text(&ad);
        assert!(text.contains("Headline"));
        assert!(text.contains("Body"));
        assert!(!text.contains("IMAGE TEXT:"));
        assert!(!text.contains("VIDEO CONTENT:"));
    }

    #[test]
    fn composite_text_includes_media_sections_when_present() {
        let ad = ad_with(
            Some("Headline"),
            Some("Body"),
            Some("50% OFF"),
            Some("A runner ties their shoes"),
        );
        let text = composite_ad_text(&ad);
        assert!(text.contains("IMAGE TEXT:\n50% OFF"));
        assert!(text.contains("VIDEO CONTENT:\nA runner ties their shoes"));
    }
}
