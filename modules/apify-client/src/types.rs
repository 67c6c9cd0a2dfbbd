use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunData {
    pub fn succeeded(&self) -> bool {
        self.status == "SUCCEEDED"
    }

    /// True once the run can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "SUCCEEDED" | "FAILED" | "ABORTED" | "TIMED-OUT")
    }
}

// --- Ad library scraper types ---

/// A start URL entry for the ad library scraper input.
#[derive(Debug, Clone, Serialize)]
pub struct StartUrl {
    pub url: String,
}

/// Input for the ad-library scraper actor. Seeds the crawl with explicit
/// advertiser page URLs and/or free-text keyword searches.
#[derive(Debug, Clone, Serialize)]
pub struct AdLibraryScraperInput {
    #[serde(rename = "startUrls")]
    pub start_urls: Vec<StartUrl>,
    #[serde(rename = "searchTerms")]
    pub search_terms: Vec<String>,
    #[serde(rename = "resultsLimit")]
    pub results_limit: u32,
    #[serde(rename = "activeStatus")]
    pub active_status: String,
    pub countries: Vec<String>,
}

/// A single raw row from the ad-library dataset. Not every row is an ad:
/// the actor also emits page-info and summary rows with no snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdArchiveRecord {
    #[serde(rename = "adArchiveId")]
    pub ad_archive_id: Option<String>,
    #[serde(rename = "pageName")]
    pub page_name: Option<String>,
    #[serde(rename = "pageId")]
    pub page_id: Option<String>,
    #[serde(rename = "isActive")]
    pub is_active: Option<bool>,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    pub snapshot: Option<AdSnapshot>,
}

/// Creative snapshot nested inside an ad record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdSnapshot {
    pub title: Option<String>,
    pub body: Option<BodyText>,
    #[serde(rename = "ctaText")]
    pub cta_text: Option<String>,
    #[serde(rename = "linkUrl")]
    pub link_url: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageAsset>,
    #[serde(default)]
    pub videos: Vec<VideoAsset>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BodyText {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageAsset {
    #[serde(rename = "originalImageUrl")]
    pub original_image_url: Option<String>,
    #[serde(rename = "resizedImageUrl")]
    pub resized_image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoAsset {
    #[serde(rename = "videoHdUrl")]
    pub video_hd_url: Option<String>,
    #[serde(rename = "videoPreviewImageUrl")]
    pub video_preview_image_url: Option<String>,
}

impl AdArchiveRecord {
    /// Returns the primary body text if present and non-empty.
    pub fn body_text(&self) -> Option<&str> {
        let text = self.snapshot.as_ref()?.body.as_ref()?.text.as_deref()?;
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// True when the record carries any usable creative text.
    /// Rows without it are dataset noise, not ads.
    pub fn has_creative_text(&self) -> bool {
        if self.body_text().is_some() {
            return true;
        }
        self.snapshot
            .as_ref()
            .and_then(|s| s.title.as_deref())
            .is_some_and(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_without_snapshot_has_no_creative_text() {
        let record = AdArchiveRecord::default();
        assert!(!record.has_creative_text());
        assert!(record.body_text().is_none());
    }

    #[test]
    fn title_only_record_counts_as_creative() {
        let record = AdArchiveRecord {
            snapshot: Some(AdSnapshot {
                title: Some("Summer Sale".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(record.has_creative_text());
    }

    #[test]
    fn blank_body_is_ignored() {
        let record = AdArchiveRecord {
            snapshot: Some(AdSnapshot {
                body: Some(BodyText {
                    text: Some("   ".to_string()),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(record.body_text().is_none());
    }
}
