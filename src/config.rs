use std::time::Duration;

use reqwest::Url;
use thiserror::Error;
use tracing::warn;

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_PACING_DELAY_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CHAT_API_BASE_URL '{value}' is not a valid URL: {source}")]
    InvalidBaseUrl {
        value: String,
        #[source]
        source: <Url as std::str::FromStr>::Err,
    },

    #[error("CHAT_API_BASE_URL '{value}' must use http or https")]
    UnsupportedScheme { value: String },
}

/// What to do with an assistant reply that resolves after the user has
/// moved to another conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaleReplyPolicy {
    /// Drop it; the backend stored it and it shows up when the origin chat
    /// is opened again.
    #[default]
    Discard,
    /// Append it to whatever conversation is on screen.
    AppendToActive,
}

impl StaleReplyPolicy {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discard" => Some(StaleReplyPolicy::Discard),
            "append" | "append_to_active" => Some(StaleReplyPolicy::AppendToActive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: Url,
    /// Sent as `X-API-Key` when present.
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    /// Delay before the loading indicator moves from thinking to generating.
    pub pacing_delay: Duration,
    pub stale_reply_policy: StaleReplyPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_BASE_URL).expect("default base URL is valid"),
            api_key: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            pacing_delay: Duration::from_millis(DEFAULT_PACING_DELAY_MS),
            stale_reply_policy: StaleReplyPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Reads `CHAT_*` variables from the process environment. Call
    /// `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_base_url = match lookup("CHAT_API_BASE_URL") {
            Some(raw) => parse_base_url(&raw)?,
            None => defaults.api_base_url,
        };

        let api_key = lookup("CHAT_API_KEY").filter(|k| !k.trim().is_empty());

        let request_timeout = lookup("CHAT_REQUEST_TIMEOUT_SECS")
            .and_then(|raw| parse_number("CHAT_REQUEST_TIMEOUT_SECS", &raw))
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let pacing_delay = lookup("CHAT_PACING_DELAY_MS")
            .and_then(|raw| parse_number("CHAT_PACING_DELAY_MS", &raw))
            .map(Duration::from_millis)
            .unwrap_or(defaults.pacing_delay);

        let stale_reply_policy = match lookup("CHAT_STALE_REPLY_POLICY") {
            Some(raw) => StaleReplyPolicy::parse(&raw).unwrap_or_else(|| {
                warn!("Ignoring unknown CHAT_STALE_REPLY_POLICY '{raw}', using discard");
                StaleReplyPolicy::Discard
            }),
            None => defaults.stale_reply_policy,
        };

        Ok(Self {
            api_base_url,
            api_key,
            request_timeout,
            pacing_delay,
            stale_reply_policy,
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidBaseUrl {
        value: raw.to_string(),
        source,
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme { value: raw.to_string() });
    }
    Ok(url)
}

fn parse_number(key: &str, raw: &str) -> Option<u64> {
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("Ignoring malformed {key}='{raw}': {e}");
            None
        }
    }
}
