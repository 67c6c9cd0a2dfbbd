use regex::Regex;
use tracing::debug;

use adwatch_common::Severity;

/// One regex rule in the catalog. Catalog content is supplied by the
/// caller; the engine only applies it.
pub struct RuleDefinition {
    pub code: String,
    pub pattern: Regex,
    pub severity: Severity,
}

impl RuleDefinition {
    pub fn new(code: &str, pattern: &str, severity: Severity) -> Result<Self, regex::Error> {
        Ok(Self {
            code: code.to_string(),
            pattern: Regex::new(pattern)?,
            severity,
        })
    }
}

/// A rule hit against a piece of ad text.
#[derive(Debug, Clone)]
pub struct RuleHit {
    pub rule_code: String,
    pub severity: Severity,
    pub matched_text: String,
}

/// Apply every rule against the composite ad text. One hit per rule at
/// most (the first match), so a repeated phrase doesn't inflate counts.
pub fn scan(rules: &[RuleDefinition], text: &str) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    for rule in rules {
        if let Some(matched) = rule.pattern.find(text) {
            debug!(rule = rule.code, "Rule matched ad text");
            hits.push(RuleHit {
                rule_code: rule.code.clone(),
                severity: rule.severity,
                matched_text: matched.as_str().to_string(),
            });
        }
    }
    hits
}

/// Built-in starter catalog covering the most common prohibited claim
/// shapes. Deployments extend or replace this list.
pub fn default_catalog() -> Vec<RuleDefinition> {
    [
        (
            "fake-urgency",
            r"(?i)\b(only \d+ left|ends (tonight|today)|act now|last chance)\b",
            Severity::Medium,
        ),
        (
            "guaranteed-results",
            r"(?i)\b(guaranteed (results|weight loss|income)|100% (effective|success))\b",
            Severity::High,
        ),
        (
            "medical-claim",
            r"(?i)\b(cures?|treats?|prevents?)\s+(cancer|diabetes|covid|alzheimer)",
            Severity::Critical,
        ),
        (
            "income-promise",
            r"(?i)\b(earn|make)\s+\$\d[\d,]*\s*(a|per)\s+(day|week|month)\b",
            Severity::High,
        ),
    ]
    .into_iter()
    .filter_map(|(code, pattern, severity)| RuleDefinition::new(code, pattern, severity).ok())
    .collect()
}
