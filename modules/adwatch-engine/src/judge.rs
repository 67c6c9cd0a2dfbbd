use ai_client::claude::Claude;
use ai_client::util::truncate_to_char_boundary;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Landing-page text is truncated to stay well inside the judge's context.
const MAX_LANDING_TEXT_BYTES: usize = 30_000;

// --- Request / outcome types ---

#[derive(Debug, Clone)]
pub struct JudgeRequest {
    pub ad_text: String,
    pub landing_page_text: String,
    pub keyword_value: Option<String>,
    pub keyword_check_enabled: bool,
}

/// One boolean+reason judgment axis.
#[derive(Debug, Clone)]
pub struct JudgeAxis {
    pub passed: bool,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct JudgeVerdict {
    pub ad_creative: JudgeAxis,
    pub landing_page: JudgeAxis,
    pub keyword: JudgeAxis,
    pub overall_compliant: bool,
}

/// Tagged judge result. A failed judgment is an expected degraded outcome,
/// not an error to propagate.
#[derive(Debug, Clone)]
pub enum JudgeOutcome {
    Verdict(JudgeVerdict),
    Failed { reason: String },
}

/// The AI compliance judge collaborator. Implementations swallow their own
/// failures into `JudgeOutcome::Failed`.
#[async_trait]
pub trait ComplianceJudge: Send + Sync {
    async fn evaluate(&self, request: &JudgeRequest) -> JudgeOutcome;
}

// --- Claude-backed judge ---

/// What the LLM returns for each judged ad.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JudgeResponse {
    /// Whether the ad creative itself is free of compliance problems
    pub ad_creative_compliant: bool,
    pub ad_creative_reason: String,
    /// Whether the landing page matches what the ad promises
    pub landing_page_relevant: bool,
    pub landing_page_reason: String,
    /// Whether the tracking keyword matches the ad and landing page
    pub keyword_relevant: bool,
    pub keyword_reason: String,
    pub overall_compliant: bool,
}

const JUDGE_SYSTEM_PROMPT: &str = r#"You are an advertising compliance reviewer.

You are given the full text of one advertising creative, the text content of its landing page, and optionally a tracking keyword extracted from the landing page URL.

Judge three independent axes:

1. **Ad creative compliance**: Does the ad text avoid misleading claims, unsubstantiated superlatives, fake urgency, prohibited health/financial promises, and impersonation? Judge only what the text says, not the product category.
2. **Landing page relevance**: Does the landing page deliver what the ad promises? An ad for a specific product pointing at an unrelated page, a parked domain, or an empty page is not relevant.
3. **Keyword relevance**: Does the tracking keyword plausibly describe the ad creative and the landing page content? If the keyword check is marked disabled, return true with a short note.

Rules:
- Every axis gets a boolean verdict AND a one-or-two sentence reason grounded in the provided text.
- overall_compliant is true only when every enabled axis passes.
- If the landing page text is an error note rather than real content, judge landing page relevance false and say why.
- Be strict but fair: absence of evidence for a claim is a failure, ambiguity alone is not."#;

pub struct AiJudge {
    claude: Claude,
}

impl AiJudge {
    pub fn new(anthropic_api_key: &str, model: &str) -> Self {
        Self {
            claude: Claude::new(anthropic_api_key, model),
        }
    }

    fn build_user_prompt(request: &JudgeRequest) -> String {
        let landing = truncate_to_char_boundary(&request.landing_page_text, MAX_LANDING_TEXT_BYTES);

        let keyword_section = if !request.keyword_check_enabled {
            "Keyword check: DISABLED for this advertiser.".to_string()
        } else {
            match &request.keyword_value {
                Some(value) => format!("Tracking keyword: {value}"),
                None => "Tracking keyword: (not resolved — no value found on the landing page)"
                    .to_string(),
            }
        };

        format!(
            "Judge this ad for compliance.\n\n=== AD CREATIVE ===\n{}\n\n=== LANDING PAGE TEXT ===\n{}\n\n=== KEYWORD ===\n{}",
            request.ad_text, landing, keyword_section
        )
    }
}

#[async_trait]
impl ComplianceJudge for AiJudge {
    async fn evaluate(&self, request: &JudgeRequest) -> JudgeOutcome {
        let user_prompt = Self::build_user_prompt(request);

        let response: JudgeResponse = match self
            .claude
            .extract(JUDGE_SYSTEM_PROMPT, &user_prompt)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Compliance judge call failed");
                return JudgeOutcome::Failed {
                    reason: format!("AI judgment failed: {e}"),
                };
            }
        };

        info!(
            overall = response.overall_compliant,
            creative = response.ad_creative_compliant,
            landing = response.landing_page_relevant,
            keyword = response.keyword_relevant,
            "Judge verdict"
        );

        JudgeOutcome::Verdict(JudgeVerdict {
            ad_creative: JudgeAxis {
                passed: response.ad_creative_compliant,
                reason: response.ad_creative_reason,
            },
            landing_page: JudgeAxis {
                passed: response.landing_page_relevant,
                reason: response.landing_page_reason,
            },
            keyword: JudgeAxis {
                passed: response.keyword_relevant,
                reason: response.keyword_reason,
            },
            overall_compliant: response.overall_compliant,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_marks_disabled_keyword_check() {
        let request = JudgeRequest {
            ad_text: "Buy shoes".to_string(),
            landing_page_text: "Shoes for sale".to_string(),
            keyword_value: None,
            keyword_check_enabled: false,
        };
        let prompt = AiJudge::build_user_prompt(&request);
        assert!(prompt.contains("DISABLED"));
    }

    #[test]
    fn prompt_includes_keyword_value_when_present() {
        let request = JudgeRequest {
            ad_text: "Buy shoes".to_string(),
            landing_page_text: "Shoes for sale".to_string(),
            keyword_value: Some("running shoes".to_string()),
            keyword_check_enabled: true,
        };
        let prompt = AiJudge::build_user_prompt(&request);
        assert!(prompt.contains("Tracking keyword: running shoes"));
    }
}
