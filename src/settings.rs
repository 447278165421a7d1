use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const MIN_IDLE_THRESHOLD_MINUTES: u32 = 1;
pub const MAX_IDLE_THRESHOLD_MINUTES: u32 = 120;
pub const DEFAULT_IDLE_THRESHOLD_MINUTES: u32 = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("idle threshold must be between 1 and 120 minutes, got {0}")]
    IdleThresholdOutOfRange(u32),

    #[error("invalid server URL '{url}': {reason}")]
    InvalidServerUrl { url: String, reason: String },

    #[error("server URL must use http:// or https://, got '{0}'")]
    UnsupportedScheme(String),
}

/// Process-wide user configuration, persisted wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub idle_threshold_minutes: u32,
    pub excluded_domains: Vec<String>,
    pub pause_capture: bool,
    /// Base URL of the classifier service. Remote grouping and labeling only run when set.
    pub server_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            idle_threshold_minutes: DEFAULT_IDLE_THRESHOLD_MINUTES,
            excluded_domains: Vec::new(),
            pause_capture: false,
            server_url: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(MIN_IDLE_THRESHOLD_MINUTES..=MAX_IDLE_THRESHOLD_MINUTES)
            .contains(&self.idle_threshold_minutes)
        {
            return Err(SettingsError::IdleThresholdOutOfRange(
                self.idle_threshold_minutes,
            ));
        }

        if let Some(raw) = self.server_url() {
            let parsed = Url::parse(raw).map_err(|err| SettingsError::InvalidServerUrl {
                url: raw.to_string(),
                reason: err.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(SettingsError::UnsupportedScheme(raw.to_string()));
            }
        }

        Ok(())
    }

    /// Trim user input: blank server URL becomes `None`, excluded domains are lowercased
    /// and stripped of leading dots.
    pub fn normalized(mut self) -> Self {
        self.server_url = self
            .server_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        self.excluded_domains = self
            .excluded_domains
            .into_iter()
            .map(|domain| domain.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|domain| !domain.is_empty())
            .collect();
        self
    }

    pub fn server_url(&self) -> Option<&str> {
        self.server_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}
