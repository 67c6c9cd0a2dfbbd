// Test mocks for the engine's trait boundaries:
// - MemoryStore (ComplianceStore) — stateful in-memory row store
// - ScriptedJobClient (ScrapeJobClient) — scripted job states + dataset
// - MockPageFetcher (PageFetcher) — HashMap-based URL→content with a call counter
// - ScriptedJudge (ComplianceJudge) — fixed verdicts, optional per-ad failures
//
// Plus helpers for constructing Domain, ScrapedAd and AdArchiveRecord rows.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use adwatch_common::{
    AdAnalysis, AdSource, AnalysisStatus, Domain, ProcessingStatus, ScrapedAd, Violation,
};
use adwatch_store::ComplianceStore;
use apify_client::{AdArchiveRecord, AdLibraryScraperInput, AdSnapshot, BodyText};

use crate::fetcher::PageFetcher;
use crate::judge::{ComplianceJudge, JudgeAxis, JudgeOutcome, JudgeRequest, JudgeVerdict};
use crate::traits::{JobState, ScrapeJobClient};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryStoreInner {
    domains: HashMap<String, Domain>,
    /// external_id → ad, plus insertion order for recency
    ads: HashMap<String, ScrapedAd>,
    ad_order: Vec<String>,
    /// (domain, external_id) → analysis
    analyses: HashMap<(String, String), AdAnalysis>,
    violations: Vec<Violation>,
    /// Every (status, message) ever written, for transition assertions
    state_log: Vec<(String, ProcessingStatus, String)>,
    /// Make replace_analysis fail for full results (notes == None) while
    /// letting fallback records (notes == Some) through
    fail_full_analysis_saves: bool,
}

/// Stateful in-memory store. Thread-safe via interior Mutex.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(self, domain: Domain) -> Self {
        self.inner
            .lock()
            .unwrap()
            .domains
            .insert(domain.name.clone(), domain);
        self
    }

    pub fn with_ad(self, ad: ScrapedAd) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.ad_order.push(ad.external_id.clone());
            inner.ads.insert(ad.external_id.clone(), ad);
        }
        self
    }

    /// Full analysis saves fail; fallback records still succeed.
    pub fn failing_full_analysis_saves(self) -> Self {
        self.inner.lock().unwrap().fail_full_analysis_saves = true;
        self
    }

    // --- Assertion helpers ---

    pub fn domain_state(&self, name: &str) -> Option<(ProcessingStatus, String)> {
        let inner = self.inner.lock().unwrap();
        inner
            .domains
            .get(name)
            .map(|d| (d.processing_status, d.processing_message.clone()))
    }

    pub fn state_log(&self, name: &str) -> Vec<(ProcessingStatus, String)> {
        let inner = self.inner.lock().unwrap();
        inner
            .state_log
            .iter()
            .filter(|(n, _, _)| n == name)
            .map(|(_, s, m)| (*s, m.clone()))
            .collect()
    }

    pub fn ad_count(&self, domain: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .ads
            .values()
            .filter(|a| a.domain_name == domain)
            .count()
    }

    pub fn ad(&self, external_id: &str) -> Option<ScrapedAd> {
        self.inner.lock().unwrap().ads.get(external_id).cloned()
    }

    pub fn analysis(&self, domain: &str, external_id: &str) -> Option<AdAnalysis> {
        let inner = self.inner.lock().unwrap();
        inner
            .analyses
            .get(&(domain.to_string(), external_id.to_string()))
            .cloned()
    }

    pub fn analysis_count(&self, domain: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.analyses.keys().filter(|(d, _)| d == domain).count()
    }

    pub fn domain_score(&self, name: &str) -> Option<f64> {
        let inner = self.inner.lock().unwrap();
        inner.domains.get(name).and_then(|d| d.compliance_score)
    }

    pub fn violation_count(&self) -> usize {
        self.inner.lock().unwrap().violations.len()
    }
}

#[async_trait]
impl ComplianceStore for MemoryStore {
    async fn find_domain(&self, name: &str) -> Result<Option<Domain>> {
        Ok(self.inner.lock().unwrap().domains.get(name).cloned())
    }

    async fn upsert_domain(&self, domain: &Domain) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .domains
            .insert(domain.name.clone(), domain.clone());
        Ok(())
    }

    async fn set_processing_state(
        &self,
        name: &str,
        status: ProcessingStatus,
        message: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let Some(domain) = inner.domains.get_mut(name) else {
            bail!("MemoryStore: no domain named {name}");
        };
        domain.processing_status = status;
        domain.processing_message = message.to_string();
        inner
            .state_log
            .push((name.to_string(), status, message.to_string()));
        Ok(())
    }

    async fn set_tracking_param(&self, name: &str, param: Option<&str>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(domain) = inner.domains.get_mut(name) {
            domain.tracking_param = param.map(String::from);
        }
        Ok(())
    }

    async fn record_check_result(&self, name: &str, score: Option<f64>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(domain) = inner.domains.get_mut(name) {
            domain.compliance_score = score;
            domain.last_checked_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn find_ad(&self, external_id: &str) -> Result<Option<ScrapedAd>> {
        Ok(self.inner.lock().unwrap().ads.get(external_id).cloned())
    }

    async fn insert_ad(&self, ad: &ScrapedAd) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.ads.contains_key(&ad.external_id) {
            bail!("MemoryStore: duplicate external id {}", ad.external_id);
        }
        inner.ad_order.push(ad.external_id.clone());
        inner.ads.insert(ad.external_id.clone(), ad.clone());
        Ok(())
    }

    async fn update_ad_presentation(&self, ad: &ScrapedAd) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let Some(existing) = inner.ads.get_mut(&ad.external_id) else {
            bail!("MemoryStore: no ad with external id {}", ad.external_id);
        };
        existing.headline = ad.headline.clone();
        existing.primary_text = ad.primary_text.clone();
        existing.cta_text = ad.cta_text.clone();
        existing.landing_url = ad.landing_url.clone();
        existing.media_urls = ad.media_urls.clone();
        existing.is_active = ad.is_active;
        existing.updated_at = ad.updated_at;
        Ok(())
    }

    async fn list_ads(&self, domain: &str, limit: i64) -> Result<Vec<ScrapedAd>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .ad_order
            .iter()
            .rev()
            .filter_map(|id| inner.ads.get(id))
            .filter(|a| a.domain_name == domain)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_ads(&self, domain: &str) -> Result<i64> {
        Ok(self.ad_count(domain) as i64)
    }

    async fn has_scraped_ads(&self, domain: &str) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .ads
            .values()
            .any(|a| a.domain_name == domain && a.source == AdSource::Scraped))
    }

    async fn purge_domain_data(&self, domain: &str) -> Result<()> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        inner.ads.retain(|_, a| a.domain_name != domain);
        let ads = &inner.ads;
        inner.ad_order.retain(|id| ads.contains_key(id));
        inner.analyses.retain(|(d, _), _| d != domain);
        Ok(())
    }

    async fn replace_analysis(&self, analysis: &AdAnalysis) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_full_analysis_saves && analysis.notes.is_none() {
            bail!("MemoryStore: replace_analysis forced failure");
        }
        inner.analyses.insert(
            (analysis.domain_name.clone(), analysis.external_id.clone()),
            analysis.clone(),
        );
        Ok(())
    }

    async fn find_analysis(
        &self,
        domain: &str,
        external_id: &str,
    ) -> Result<Option<AdAnalysis>> {
        Ok(self.analysis(domain, external_id))
    }

    async fn list_analyses(&self, domain: &str) -> Result<Vec<AdAnalysis>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .analyses
            .iter()
            .filter(|((d, _), _)| d == domain)
            .map(|(_, a)| a.clone())
            .collect())
    }

    async fn mean_ad_score(&self, domain: &str) -> Result<Option<f64>> {
        let inner = self.inner.lock().unwrap();
        let scores: Vec<f64> = inner
            .analyses
            .iter()
            .filter(|((d, _), _)| d == domain)
            .map(|(_, a)| a.score as f64)
            .collect();
        if scores.is_empty() {
            return Ok(None);
        }
        Ok(Some(scores.iter().sum::<f64>() / scores.len() as f64))
    }

    async fn insert_violation(&self, violation: &Violation) -> Result<()> {
        self.inner.lock().unwrap().violations.push(violation.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedJobClient
// ---------------------------------------------------------------------------

struct ScriptedJobClientInner {
    /// Status answers served in order; the last one repeats.
    states: Vec<JobState>,
    cursor: usize,
    submitted: Vec<AdLibraryScraperInput>,
}

/// Scrape-job mock with a scripted status sequence and a fixed dataset.
pub struct ScriptedJobClient {
    inner: Mutex<ScriptedJobClientInner>,
    records: Vec<AdArchiveRecord>,
    submit_error: Option<String>,
}

impl ScriptedJobClient {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ScriptedJobClientInner {
                states: vec![JobState::Succeeded],
                cursor: 0,
                submitted: Vec::new(),
            }),
            records: Vec::new(),
            submit_error: None,
        }
    }

    pub fn with_states(mut self, states: Vec<JobState>) -> Self {
        self.inner.lock().unwrap().states = states;
        self
    }

    pub fn with_records(mut self, records: Vec<AdArchiveRecord>) -> Self {
        self.records = records;
        self
    }

    pub fn failing_submit(mut self, message: &str) -> Self {
        self.submit_error = Some(message.to_string());
        self
    }

    pub fn submissions(&self) -> usize {
        self.inner.lock().unwrap().submitted.len()
    }
}

impl Default for ScriptedJobClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScrapeJobClient for ScriptedJobClient {
    async fn submit(&self, input: &AdLibraryScraperInput) -> Result<String> {
        if let Some(message) = &self.submit_error {
            bail!("{message}");
        }
        self.inner.lock().unwrap().submitted.push(input.clone());
        Ok("job-1".to_string())
    }

    async fn status(&self, _job_id: &str) -> Result<JobState> {
        let mut inner = self.inner.lock().unwrap();
        let index = inner.cursor.min(inner.states.len() - 1);
        inner.cursor += 1;
        Ok(inner.states[index].clone())
    }

    async fn results(&self, _job_id: &str) -> Result<Vec<AdArchiveRecord>> {
        Ok(self.records.clone())
    }
}

// ---------------------------------------------------------------------------
// MockPageFetcher
// ---------------------------------------------------------------------------

/// HashMap-based page fetcher. Unregistered URLs yield `Ok(None)`. Counts
/// every call so tests can assert a fetch never happened.
#[derive(Default)]
pub struct MockPageFetcher {
    texts: HashMap<String, String>,
    htmls: HashMap<String, String>,
    calls: AtomicUsize,
}

impl MockPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_text(mut self, url: &str, text: &str) -> Self {
        self.texts.insert(url.to_string(), text.to_string());
        self
    }

    pub fn on_html(mut self, url: &str, html: &str) -> Self {
        self.htmls.insert(url.to_string(), html.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch_text(&self, url: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.texts.get(url).cloned())
    }

    async fn fetch_html(&self, url: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.htmls.get(url).cloned())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// ScriptedJudge
// ---------------------------------------------------------------------------

/// Judge mock: compliant by default, failing for ads whose text contains a
/// registered marker. Records every request it sees.
#[derive(Default)]
pub struct ScriptedJudge {
    fail_markers: Vec<String>,
    non_compliant_markers: Vec<String>,
    requests: Mutex<Vec<JudgeRequest>>,
}

impl ScriptedJudge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ads whose text contains `marker` get `JudgeOutcome::Failed`.
    pub fn failing_for(mut self, marker: &str) -> Self {
        self.fail_markers.push(marker.to_string());
        self
    }

    /// Ads whose text contains `marker` get a fully non-compliant verdict.
    pub fn non_compliant_for(mut self, marker: &str) -> Self {
        self.non_compliant_markers.push(marker.to_string());
        self
    }

    pub fn requests(&self) -> Vec<JudgeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn axis(passed: bool, reason: &str) -> JudgeAxis {
    JudgeAxis {
        passed,
        reason: reason.to_string(),
    }
}

#[async_trait]
impl ComplianceJudge for ScriptedJudge {
    async fn evaluate(&self, request: &JudgeRequest) -> JudgeOutcome {
        self.requests.lock().unwrap().push(request.clone());

        if self
            .fail_markers
            .iter()
            .any(|m| request.ad_text.contains(m))
        {
            return JudgeOutcome::Failed {
                reason: "AI judgment failed: scripted failure".to_string(),
            };
        }

        if self
            .non_compliant_markers
            .iter()
            .any(|m| request.ad_text.contains(m))
        {
            return JudgeOutcome::Verdict(JudgeVerdict {
                ad_creative: axis(false, "Misleading claim"),
                landing_page: axis(false, "Page does not match the ad"),
                keyword: axis(false, "Keyword unrelated"),
                overall_compliant: false,
            });
        }

        JudgeOutcome::Verdict(JudgeVerdict {
            ad_creative: axis(true, "No problematic claims"),
            landing_page: axis(true, "Page matches the ad"),
            keyword: axis(true, "Keyword matches"),
            overall_compliant: true,
        })
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

/// Domain with keyword checking disabled (no tracking parameter).
pub fn test_domain(name: &str) -> Domain {
    Domain::new(name)
}

/// Domain with keyword checking enabled via a configured parameter name.
pub fn test_domain_with_param(name: &str, param: &str) -> Domain {
    let mut domain = Domain::new(name);
    domain.tracking_param = Some(param.to_string());
    domain
}

pub fn test_ad(domain: &str, external_id: &str, text: &str) -> ScrapedAd {
    let now = Utc::now();
    ScrapedAd {
        id: Uuid::new_v4(),
        domain_name: domain.to_string(),
        external_id: external_id.to_string(),
        headline: None,
        primary_text: Some(text.to_string()),
        cta_text: None,
        landing_url: None,
        media_urls: Vec::new(),
        local_media_paths: Vec::new(),
        extracted_image_text: None,
        extracted_video_text: None,
        rac_value: None,
        source: AdSource::Scraped,
        is_active: true,
        scraped_at: now,
        updated_at: now,
    }
}

pub fn seed_ad(domain: &str, external_id: &str, text: &str) -> ScrapedAd {
    let mut ad = test_ad(domain, external_id, text);
    ad.source = AdSource::Seed;
    ad
}

pub fn test_analysis(domain: &str, external_id: &str, compliant: bool) -> AdAnalysis {
    AdAnalysis {
        id: Uuid::new_v4(),
        domain_name: domain.to_string(),
        external_id: external_id.to_string(),
        creative_compliant: compliant,
        creative_reason: String::new(),
        landing_relevant: compliant,
        landing_reason: String::new(),
        keyword_relevant: compliant,
        keyword_reason: String::new(),
        overall_compliant: compliant,
        score: AdAnalysis::legacy_score(compliant),
        status: if compliant {
            AnalysisStatus::Compliant
        } else {
            AnalysisStatus::NonCompliant
        },
        notes: None,
        created_at: Utc::now(),
    }
}

/// Archive record carrying usable creative text.
pub fn archive_record(id: &str, text: &str) -> AdArchiveRecord {
    AdArchiveRecord {
        ad_archive_id: Some(id.to_string()),
        snapshot: Some(AdSnapshot {
            body: Some(BodyText {
                text: Some(text.to_string()),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Dataset row with no creative text (page-info/summary row).
pub fn textless_record() -> AdArchiveRecord {
    AdArchiveRecord::default()
}
