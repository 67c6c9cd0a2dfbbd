use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Status enums ---

/// User intent for a domain: should it be monitored at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringStatus {
    Active,
    Paused,
    Inactive,
}

impl std::fmt::Display for MonitoringStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitoringStatus::Active => write!(f, "active"),
            MonitoringStatus::Paused => write!(f, "paused"),
            MonitoringStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl MonitoringStatus {
    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "paused" => Self::Paused,
            "inactive" => Self::Inactive,
            _ => Self::Active,
        }
    }
}

/// Operational lifecycle of a domain's scrape-and-analyze run.
/// Distinct from `MonitoringStatus`, which is user intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    FetchingAds,
    ScanningCompliance,
    Paused,
    Completed,
    Failed,
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStatus::Pending => write!(f, "pending"),
            ProcessingStatus::FetchingAds => write!(f, "fetching_ads"),
            ProcessingStatus::ScanningCompliance => write!(f, "scanning_compliance"),
            ProcessingStatus::Paused => write!(f, "paused"),
            ProcessingStatus::Completed => write!(f, "completed"),
            ProcessingStatus::Failed => write!(f, "failed"),
        }
    }
}

impl ProcessingStatus {
    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "fetching_ads" => Self::FetchingAds,
            "scanning_compliance" => Self::ScanningCompliance,
            "paused" => Self::Paused,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// True while a background task may legitimately be running.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::FetchingAds | Self::ScanningCompliance)
    }

    /// States from which a new run may be started.
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Paused | Self::Completed | Self::Failed
        )
    }
}

/// Where an ad row came from. Seed rows are placeholder/demo data and may
/// be purged freely; scraped rows are genuine and guard the purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdSource {
    Scraped,
    Seed,
}

impl std::fmt::Display for AdSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdSource::Scraped => write!(f, "scraped"),
            AdSource::Seed => write!(f, "seed"),
        }
    }
}

impl AdSource {
    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "seed" => Self::Seed,
            _ => Self::Scraped,
        }
    }
}

/// Legacy status bucket carried on every analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Compliant,
    NonCompliant,
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisStatus::Compliant => write!(f, "compliant"),
            AnalysisStatus::NonCompliant => write!(f, "non_compliant"),
        }
    }
}

impl AnalysisStatus {
    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "compliant" => Self::Compliant,
            _ => Self::NonCompliant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl Severity {
    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Low,
        }
    }
}

// --- Rows ---

/// A monitored advertiser domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub id: Uuid,
    /// Unique per owner. All ad and analysis rows key off this name,
    /// not the row id.
    pub name: String,
    pub monitoring_status: MonitoringStatus,
    pub processing_status: ProcessingStatus,
    /// Human-readable companion to `processing_status`. The two are always
    /// written together; a stale message is a bug.
    pub processing_message: String,
    /// Landing-page query parameter carrying the tracking keyword.
    /// `None` disables the keyword-relevance axis for this domain.
    pub tracking_param: Option<String>,
    /// Mean of per-ad legacy scores, recomputed after each analysis batch.
    pub compliance_score: Option<f64>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Domain {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            monitoring_status: MonitoringStatus::Active,
            processing_status: ProcessingStatus::Pending,
            processing_message: "Not yet checked".to_string(),
            tracking_param: None,
            compliance_score: None,
            last_checked_at: None,
            created_at: Utc::now(),
        }
    }
}

/// One scraped ad creative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedAd {
    pub id: Uuid,
    pub domain_name: String,
    /// Globally unique id from the ad archive (or synthesized when the
    /// archive record lacks one).
    pub external_id: String,
    pub headline: Option<String>,
    pub primary_text: Option<String>,
    pub cta_text: Option<String>,
    pub landing_url: Option<String>,
    pub media_urls: Vec<String>,
    pub local_media_paths: Vec<String>,
    /// Filled out-of-band by the media-text pipeline. Never cleared by
    /// re-ingestion.
    pub extracted_image_text: Option<String>,
    pub extracted_video_text: Option<String>,
    /// Resolved tracking-keyword value from the landing page.
    pub rac_value: Option<String>,
    pub source: AdSource,
    pub is_active: bool,
    pub scraped_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A complete compliance judgment for one ad. Replaced wholesale on
/// re-analysis; at most one live row per (domain, external ad id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdAnalysis {
    pub id: Uuid,
    pub domain_name: String,
    pub external_id: String,
    pub creative_compliant: bool,
    pub creative_reason: String,
    pub landing_relevant: bool,
    pub landing_reason: String,
    pub keyword_relevant: bool,
    pub keyword_reason: String,
    pub overall_compliant: bool,
    /// Legacy numeric score: 100 if overall-compliant, else 0.
    pub score: i32,
    pub status: AnalysisStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AdAnalysis {
    pub fn legacy_score(overall_compliant: bool) -> i32 {
        if overall_compliant {
            100
        } else {
            0
        }
    }
}

/// A rule-catalog hit attached to an analysis. Purely additive alongside
/// the AI-judgment axes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub id: Uuid,
    pub analysis_id: Uuid,
    pub rule_code: String,
    pub severity: Severity,
    pub matched_text: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_status_round_trips_through_display() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::FetchingAds,
            ProcessingStatus::ScanningCompliance,
            ProcessingStatus::Paused,
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
        ] {
            assert_eq!(
                ProcessingStatus::from_str_loose(&status.to_string()),
                status
            );
        }
    }

    #[test]
    fn active_states_are_exactly_the_two_working_phases() {
        assert!(ProcessingStatus::FetchingAds.is_active());
        assert!(ProcessingStatus::ScanningCompliance.is_active());
        assert!(!ProcessingStatus::Paused.is_active());
        assert!(!ProcessingStatus::Completed.is_active());
    }

    #[test]
    fn start_is_not_reachable_from_active_states() {
        assert!(!ProcessingStatus::FetchingAds.can_start());
        assert!(!ProcessingStatus::ScanningCompliance.can_start());
        assert!(ProcessingStatus::Paused.can_start());
        assert!(ProcessingStatus::Failed.can_start());
    }

    #[test]
    fn legacy_score_buckets() {
        assert_eq!(AdAnalysis::legacy_score(true), 100);
        assert_eq!(AdAnalysis::legacy_score(false), 0);
    }
}
