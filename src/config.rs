use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Value shipped in sample configuration; the client refuses to call the API with it.
pub const PLACEHOLDER_API_KEY: &str = "YOUR_GEMINI_API_KEY_HERE";

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Connection settings for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }

    /// True when the key is blank or still the shipped placeholder.
    pub fn has_placeholder_key(&self) -> bool {
        let key = self.api_key.trim();
        key.is_empty() || key == PLACEHOLDER_API_KEY
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini: GeminiConfig,
    pub bind_addr: String,
}

impl AppConfig {
    /// Reads configuration from the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY").unwrap_or_else(|_| {
            log::warn!("⚠️ GEMINI_API_KEY not set, label analysis will be refused until it is configured");
            PLACEHOLDER_API_KEY.to_string()
        });

        let mut gemini = GeminiConfig::new(api_key);

        if let Ok(model) = env::var("GEMINI_MODEL") {
            gemini.model = model;
        }
        if let Ok(base) = env::var("GEMINI_API_BASE") {
            gemini.api_base = base;
        }
        if let Ok(secs) = env::var("GEMINI_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("GEMINI_TIMEOUT_SECS must be a number of seconds, got '{}'", secs))?;
            gemini.timeout = Duration::from_secs(secs);
        }

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        Ok(Self { gemini, bind_addr })
    }
}
