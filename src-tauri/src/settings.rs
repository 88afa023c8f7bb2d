use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::{WebPushSubscription, CONNECTIVITY_POLL_MS, CONNECTIVITY_TIMEOUT_MS, CONTENT_URL};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ShellSettings {
    pub content_url: String,
    pub connectivity_poll_ms: u64,
    pub connectivity_timeout_ms: u64,
    pub token_endpoint: Option<String>,
    pub notifications_enabled: bool,
    /// Without one the push backend cannot obtain a registration token.
    pub push_subscription: Option<WebPushSubscription>,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            content_url: CONTENT_URL.to_string(),
            connectivity_poll_ms: CONNECTIVITY_POLL_MS,
            connectivity_timeout_ms: CONNECTIVITY_TIMEOUT_MS,
            token_endpoint: None,
            notifications_enabled: true,
            push_subscription: None,
        }
    }
}

impl ShellSettings {
    pub fn content_url(&self) -> Result<reqwest::Url, String> {
        normalize_content_url(&self.content_url)
    }

    pub fn token_endpoint(&self) -> Result<Option<reqwest::Url>, String> {
        match self.token_endpoint.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => normalize_content_url(raw).map(Some),
        }
    }
}

pub fn read_settings(path: &Path) -> Result<ShellSettings, String> {
    if !path.exists() {
        return Ok(ShellSettings::default());
    }

    let content =
        fs::read_to_string(path).map_err(|error| format!("Failed to read settings: {error}"))?;
    let settings = serde_json::from_str::<ShellSettings>(&content)
        .map_err(|error| format!("Failed to parse settings: {error}"))?;
    settings.content_url()?;
    settings.token_endpoint()?;
    Ok(settings)
}

pub fn normalize_content_url(input: &str) -> Result<reqwest::Url, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("Content URL is required".to_string());
    }

    let url = reqwest::Url::parse(trimmed).map_err(|error| format!("Invalid URL: {error}"))?;

    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err("URL must start with http:// or https://".to_string());
    }

    Ok(url)
}

/// Push/analytics backend project identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
    pub measurement_id: String,
}

const FIREBASE_ENV_VARS: [&str; 7] = [
    "FIREBASE_API_KEY",
    "FIREBASE_AUTH_DOMAIN",
    "FIREBASE_PROJECT_ID",
    "FIREBASE_STORAGE_BUCKET",
    "FIREBASE_MESSAGING_SENDER_ID",
    "FIREBASE_APP_ID",
    "FIREBASE_MEASUREMENT_ID",
];

impl FirebaseConfig {
    pub fn from_env() -> Result<Option<Self>, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// `Ok(None)` when no identifier is set at all; an error when only some are.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let values: Vec<Option<String>> = FIREBASE_ENV_VARS
            .iter()
            .map(|name| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
            .collect();

        if values.iter().all(Option::is_none) {
            return Ok(None);
        }

        let missing: Vec<&str> = FIREBASE_ENV_VARS
            .iter()
            .zip(&values)
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(format!(
                "Missing push backend configuration: {}",
                missing.join(", ")
            ));
        }

        let mut values = values.into_iter().flatten();
        let mut next = || values.next().unwrap_or_default();
        Ok(Some(Self {
            api_key: next(),
            auth_domain: next(),
            project_id: next(),
            storage_bucket: next(),
            messaging_sender_id: next(),
            app_id: next(),
            measurement_id: next(),
        }))
    }
}
