use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // AI provider
    pub anthropic_api_key: String,
    pub judge_model: String,

    // Scraping
    pub apify_token: String,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            judge_model: env::var("JUDGE_MODEL")
                .unwrap_or_else(|_| "claude-haiku-4-5-20251001".to_string()),
            apify_token: required_env("APIFY_TOKEN"),
            browserless_url: env::var("BROWSERLESS_URL").ok(),
            browserless_token: env::var("BROWSERLESS_TOKEN").ok(),
        }
    }

    /// Log the active configuration without leaking secrets.
    pub fn log_redacted(&self) {
        info!(
            judge_model = %self.judge_model,
            browserless = self.browserless_url.is_some(),
            anthropic_key = redact(&self.anthropic_api_key),
            apify_token = redact(&self.apify_token),
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn redact(secret: &str) -> String {
    if secret.len() <= 8 {
        return "***".to_string();
    }
    format!("{}...", &secret[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_keeps_prefix_only() {
        assert_eq!(redact("sk-ant-abcdef123456"), "sk-ant...");
        assert_eq!(redact("short"), "***");
    }
}
