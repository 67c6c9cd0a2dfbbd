use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};
use url::Url;

use crate::fetcher::PageFetcher;

/// Parameter names tried by the generic probe, in order.
const PROBE_PARAMS: [&str; 11] = [
    "q",
    "query",
    "search",
    "keyword",
    "kw",
    "k",
    "term",
    "s",
    "utm_term",
    "search_term",
    "searchterm",
];

/// Resolves the referrer ad creative (tracking keyword) for a landing page
/// URL through an ordered cascade of strategies. Each strategy swallows its
/// own errors and falls through; `None` means "not available", never an
/// error.
pub struct RacResolver {
    fetcher: Arc<dyn PageFetcher>,
    /// Auto-detected parameter names, keyed by domain. In-process cache
    /// only; re-detection after a restart is cheap.
    detected: Mutex<HashMap<String, String>>,
}

impl RacResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            detected: Mutex::new(HashMap::new()),
        }
    }

    /// Run the cascade. `configured_param` is the domain's user-configured
    /// parameter name, when one exists; it (or a previously detected name)
    /// always wins over every heuristic.
    pub async fn resolve(
        &self,
        domain: &str,
        landing_url: &str,
        configured_param: Option<&str>,
    ) -> Option<String> {
        let known_param = configured_param
            .map(String::from)
            .or_else(|| self.cached_param(domain));

        if let Some(param) = known_param {
            if let Some(value) = param_from_url(landing_url, &param) {
                debug!(domain, param, "Keyword resolved from known parameter");
                return Some(value);
            }
        }

        if let Some(value) = self.detect_and_extract(domain, landing_url).await {
            return Some(value);
        }

        let html = match self.fetcher.fetch_html(landing_url).await {
            Ok(Some(html)) => Some(html),
            Ok(None) => None,
            Err(e) => {
                debug!(domain, error = %e, "Landing page fetch failed during extraction");
                None
            }
        };

        if let Some(html) = html.as_deref() {
            if let Some(value) = ad_unit_json_keyword(html) {
                debug!(domain, "Keyword resolved from ad-unit inline JSON");
                return Some(value);
            }
        }

        if let Some(value) = probe_common_params(landing_url) {
            debug!(domain, "Keyword resolved from generic parameter probe");
            return Some(value);
        }

        if let Some(html) = html.as_deref() {
            if let Some(value) = content_heuristics(html) {
                debug!(domain, "Keyword resolved from page content heuristics");
                return Some(value);
            }
        }

        None
    }

    fn cached_param(&self, domain: &str) -> Option<String> {
        self.detected
            .lock()
            .expect("detected param lock poisoned")
            .get(domain)
            .cloned()
    }

    /// Auto-detect strategy: fetch a same-domain sample page and scan its
    /// scripts for a variable assignment fed from a URL-query accessor. The
    /// parameter name the page reads is the one the advertiser uses.
    async fn detect_and_extract(&self, domain: &str, landing_url: &str) -> Option<String> {
        let sample_url = format!("https://{domain}/");
        let html = match self.fetcher.fetch_html(&sample_url).await {
            Ok(Some(html)) => html,
            Ok(None) => return None,
            Err(e) => {
                debug!(domain, error = %e, "Sample page fetch failed during auto-detect");
                return None;
            }
        };

        let param = detect_query_param(&html)?;
        info!(domain, param, "Auto-detected keyword parameter");
        self.detected
            .lock()
            .expect("detected param lock poisoned")
            .insert(domain.to_string(), param.clone());

        param_from_url(landing_url, &param)
    }
}

/// Extract one query parameter's decoded value from a URL, filtered for
/// plausibility.
pub fn param_from_url(raw_url: &str, param: &str) -> Option<String> {
    let url = Url::parse(raw_url).ok()?;
    let value = url
        .query_pairs()
        .find(|(name, _)| name == param)
        .map(|(_, value)| value.into_owned())?;
    plausible(&value).then_some(value)
}

fn query_accessor_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // var kw = params.get('keyword')  /  searchTerm = url.searchParams.get("q")
        Regex::new(
            r#"(?i)(?:var|let|const)?\s*\w*(?:keyword|search|query|term|kw)\w*\s*=\s*[^;\n]*\.get\(\s*['"]([A-Za-z0-9_\-]+)['"]\s*\)"#,
        )
        .expect("invalid query accessor regex")
    })
}

/// Scan script text for the URL parameter name a keyword-like variable is
/// read from.
pub fn detect_query_param(html: &str) -> Option<String> {
    query_accessor_regex()
        .captures(html)
        .map(|c| c[1].to_string())
}

fn ad_unit_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Ad-unit elements carry their config as inline JSON in a name/id
        // attribute, e.g. <div id='{"pubId":"x","styleId":"y","query":"red shoes"}'>
        Regex::new(r#"(?:name|id|data-ad-config)=['"](\{[^'"]+\})['"]"#)
            .expect("invalid ad unit regex")
    })
}

/// Find an embedded ad-unit element whose name attribute holds inline JSON
/// and pull a nested keyword field out of it.
pub fn ad_unit_json_keyword(html: &str) -> Option<String> {
    for captures in ad_unit_regex().captures_iter(html) {
        let Ok(config) = serde_json::from_str::<serde_json::Value>(&captures[1]) else {
            continue;
        };
        if let Some(value) = find_keyword_field(&config) {
            if plausible(&value) {
                return Some(value);
            }
        }
    }
    None
}

/// Depth-first search of a JSON value for the first keyword-like string
/// field.
fn find_keyword_field(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                let lower = key.to_ascii_lowercase();
                if lower.contains("keyword") || lower.contains("query") || lower == "terms" {
                    if let Some(s) = child.as_str() {
                        return Some(s.to_string());
                    }
                }
            }
            map.values().find_map(find_keyword_field)
        }
        serde_json::Value::Array(items) => items.iter().find_map(find_keyword_field),
        _ => None,
    }
}

/// Try the fixed list of common parameter names against the URL.
pub fn probe_common_params(raw_url: &str) -> Option<String> {
    PROBE_PARAMS
        .iter()
        .find_map(|param| param_from_url(raw_url, param))
}

fn script_var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)(?:var|let|const)\s+\w*(?:keyword|search|query|term)\w*\s*=\s*['"]([^'"]{3,120})['"]"#,
        )
        .expect("invalid script var regex")
    })
}

fn meta_keywords_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)<meta[^>]+name=['"](?:keywords|search[-_]?term|query)['"][^>]+content=['"]([^'"]+)['"]"#,
        )
        .expect("invalid meta keywords regex")
    })
}

fn data_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)data-(?:keyword|search-term|query)=['"]([^'"]+)['"]"#)
            .expect("invalid data attribute regex")
    })
}

fn hidden_input_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)<input[^>]+type=['"]hidden['"][^>]+name=['"](?:keyword|search|query|term|q)['"][^>]+value=['"]([^'"]+)['"]"#,
        )
        .expect("invalid hidden input regex")
    })
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<(title|h1)[^>]*>([^<]+)</").expect("invalid title regex"))
}

/// Last-resort extraction from page content: script variables, meta tags,
/// data attributes, hidden inputs, then title or first heading.
pub fn content_heuristics(html: &str) -> Option<String> {
    let candidates = [
        script_var_regex().captures(html).map(|c| c[1].to_string()),
        meta_keywords_regex().captures(html).map(|c| c[1].to_string()),
        data_attr_regex().captures(html).map(|c| c[1].to_string()),
        hidden_input_regex().captures(html).map(|c| c[1].to_string()),
        title_regex().captures(html).map(|c| c[2].trim().to_string()),
    ];

    candidates
        .into_iter()
        .flatten()
        .find(|value| plausible(value))
}

/// Reject values that cannot be a real keyword: too short, no letters, or
/// boolean/placeholder tokens.
pub fn plausible(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.len() < 3 || !trimmed.chars().any(|c| c.is_alphabetic()) {
        return false;
    }
    let lower = trimmed.to_ascii_lowercase();
    if matches!(lower.as_str(), "true" | "false" | "null" | "none" | "undefined") {
        return false;
    }
    // Unexpanded template placeholders like {keyword} or %%QUERY%%
    !(trimmed.starts_with('{') || trimmed.starts_with('%') || trimmed.starts_with('['))
}
